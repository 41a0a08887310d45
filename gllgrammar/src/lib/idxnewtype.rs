// Each index newtype wraps a (possibly small) `StorageT`, but exposes a `usize` API.

use std::{fmt, mem::size_of};

use num_traits::{self, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n<StorageT>(pub StorageT);

        impl<StorageT: PrimInt + Unsigned> From<$n<StorageT>> for usize {
            fn from($n(st): $n<StorageT>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<StorageT>());
                num_traits::cast(st).unwrap()
            }
        }

        impl<StorageT: PrimInt + Unsigned> $n<StorageT> {
            /// Convert `x` into this index type.
            ///
            /// # Panics
            ///
            /// If `x` cannot be represented as a `StorageT`.
            pub fn from_usize(x: usize) -> Self {
                match num_traits::cast(x) {
                    Some(st) => $n(st),
                    None => panic!("{} does not fit into {}", x, std::any::type_name::<StorageT>()),
                }
            }

            pub fn as_storaget(&self) -> StorageT {
                self.0
            }
        }

        impl<StorageT: PrimInt + Unsigned> fmt::Display for $n<StorageT> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", usize::from(*self))
            }
        }
    }
}

IdxNewtype!(
    /// A rule (i.e. nonterminal) index.
    ///
    /// `RIdx` converts to `usize` without loss of precision via `usize::from(ridx)`. Building an
    /// `RIdx` from a `usize` (`RIdx(x.as_())`) is only safe for values the grammar has already
    /// checked fit into `StorageT`.
    RIdx);
IdxNewtype!(
    /// A production index. A rule `E: A | B;` has two productions, one per alternate.
    PIdx);
IdxNewtype!(
    /// A symbol index within a production's body. Slot positions are also stored as `SIdx`s,
    /// with `SIdx(prod_len)` denoting end of rule.
    SIdx);
IdxNewtype!(
    /// A token (i.e. terminal) index.
    TIdx);
