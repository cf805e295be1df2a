//! String interning for declaration base names.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;

/// An interned declaration base name.
///
/// Two declarations are overload candidates of each other exactly when their
/// base names intern to the same `Name`, which makes the unqualified lookup
/// behind related declarations a `u32` comparison.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub(crate) const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// String interner owned by one analysis tree.
///
/// Thread-safe via internal locking, so analyzers may intern from parallel
/// workers while the tree is being built.
#[derive(Default)]
pub struct Interner {
    inner: RwLock<InternerInner>,
}

#[derive(Default)]
struct InternerInner {
    map: FxHashMap<SmolStr, u32>,
    strings: Vec<SmolStr>,
}

impl Interner {
    /// Create a new empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning a `Name` handle.
    pub fn intern(&self, s: &str) -> Name {
        {
            let inner = self.inner.read();
            if let Some(&index) = inner.map.get(s) {
                return Name::from_raw(index);
            }
        }

        let mut inner = self.inner.write();

        // Another writer may have won the race between the two locks.
        if let Some(&index) = inner.map.get(s) {
            return Name::from_raw(index);
        }

        let smol = SmolStr::new(s);
        let index = inner.strings.len() as u32;
        inner.strings.push(smol.clone());
        inner.map.insert(smol, index);

        Name::from_raw(index)
    }

    /// Look up a string without interning it.
    pub fn find(&self, s: &str) -> Option<Name> {
        self.inner.read().map.get(s).map(|&index| Name::from_raw(index))
    }

    /// Look up the string for a `Name`.
    ///
    /// Returns `None` if the `Name` was created by a different interner.
    pub fn lookup(&self, name: Name) -> Option<SmolStr> {
        self.inner.read().strings.get(name.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Interner")
            .field("count", &inner.strings.len())
            .finish()
    }
}
