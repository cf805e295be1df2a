//! Build requests handed to the analyzer.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

/// What to analyze: a primary file plus the compiler arguments.
///
/// The arguments are opaque to this crate and forwarded unchanged. Two
/// invocations are the same build request exactly when both file and
/// arguments are equal, which is what request coalescing keys on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Invocation {
    primary_file: Arc<str>,
    args: Arc<[SmolStr]>,
}

impl Invocation {
    pub fn new<I, S>(primary_file: impl Into<Arc<str>>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            primary_file: primary_file.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn primary_file(&self) -> &str {
        &self.primary_file
    }

    pub fn args(&self) -> &[SmolStr] {
        &self.args
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invocation({}", self.primary_file)?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}
