use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Grammar, PIdx, RIdx, SIdx, Symbol};

/// A grammar slot `X : α • β`: a production and a position in its body. `pos == 0` is the slot
/// before any symbol has been recognised; `pos == prod_len` is end of rule.
///
/// A slot does not own its grammar: the head, alternate index, and body are found via the
/// `Grammar` it was created from.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Slot<StorageT> {
    pidx: PIdx<StorageT>,
    pos: SIdx<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Slot<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create the slot at position `pos` of production `pidx`. `pos` must be no greater than
    /// the production's length.
    ///
    /// # Panics
    ///
    /// If `pos` does not fit into `StorageT`.
    pub fn new(pidx: PIdx<StorageT>, pos: usize) -> Self {
        Slot {
            pidx,
            pos: SIdx::from_usize(pos),
        }
    }

    /// The end-of-rule slot of production `pidx`.
    pub fn end(grm: &Grammar<StorageT>, pidx: PIdx<StorageT>) -> Self {
        Slot {
            pidx,
            pos: grm.prod_len(pidx),
        }
    }

    pub fn pidx(&self) -> PIdx<StorageT> {
        self.pidx
    }

    pub fn pos(&self) -> usize {
        usize::from(self.pos)
    }

    /// The nonterminal this slot's production belongs to.
    pub fn head(&self, grm: &Grammar<StorageT>) -> RIdx<StorageT> {
        grm.prod_to_rule(self.pidx)
    }

    /// The index of this slot's production amongst its head's alternates.
    pub fn alternate(&self, grm: &Grammar<StorageT>) -> usize {
        grm.prod_alternate(self.pidx)
    }

    pub fn body<'a>(&self, grm: &'a Grammar<StorageT>) -> &'a [Symbol<StorageT>] {
        grm.prod(self.pidx)
    }

    /// The symbols recognised so far, i.e. `α` in `X : α • β`.
    pub fn prefix<'a>(&self, grm: &'a Grammar<StorageT>) -> &'a [Symbol<StorageT>] {
        &grm.prod(self.pidx)[..self.pos()]
    }

    pub fn is_eor(&self, grm: &Grammar<StorageT>) -> bool {
        self.pos == grm.prod_len(self.pidx)
    }

    /// The slot one symbol earlier in the same production, or `None` at position 0.
    pub fn pred(&self) -> Option<Self> {
        match self.pos() {
            0 => None,
            p => Some(Slot::new(self.pidx, p - 1)),
        }
    }
}
