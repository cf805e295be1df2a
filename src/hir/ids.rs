//! Identifiers for entities inside one analysis tree.

use std::fmt;

macro_rules! tree_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Get the raw index.
            #[inline]
            pub const fn index(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

tree_id!(
    /// A declaration in an [`AnalysisTree`](super::AnalysisTree).
    ///
    /// Identity is per tree: comparing `DeclId`s from two different trees is
    /// meaningless. Related-identifier matching relies on this identity, never
    /// on names.
    DeclId,
    "DeclId"
);

tree_id!(
    /// A syntax node (scope, declaration site, reference or module reference).
    NodeId,
    "NodeId"
);

tree_id!(
    /// A module known to the tree: the main module or an imported one.
    ModuleId,
    "ModuleId"
);
