#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! Grammars for GLL parsing, and the *slots* that a GLL recognizer moves through them.
//!
//! We use the following terminology throughout:
//!
//!   * A *grammar* is an ordered sequence of *productions* (also called *alternates*).
//!   * A *production* is an ordered sequence of *symbols* (its *body*).
//!   * A *rule* (or *nonterminal*) maps a name to one or more productions.
//!   * A *token* (or *terminal*) is the name of a syntactic element.
//!   * A *slot* is a production together with a position in its body: `X : α • β` is the slot
//!     where `α` has been recognised and `β` has not. A slot whose position is at the end of its
//!     body is *end of rule*.
//!
//! For example, in the following grammar:
//!
//! ```text
//! %%
//! R1: 'a' 'b' | R2;
//! R2: 'c';
//! ```
//!
//! there are 3 productions (`'a' 'b'`, `R2`, `'c'`), two rules (`R1` with productions 0 and 1;
//! `R2` with production 2), and three tokens (`a`, `b`, and `c`).
//!
//! gllgrammar makes the following guarantees about grammars:
//!
//!   * Productions are numbered from `0` to `prods_len() - 1` (inclusive) in source order.
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive) in order of first appearance.
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive) in order of first
//!     appearance.
//!   * The `StorageT` type used to store production, rule, symbol, and token indices can be
//!     infallibly converted into `usize` (see [`TIdx`] and friends).
//!
//! Unlike an LR grammar, no augmented start rule is added: GLL parsers start directly from the
//! user's start rule.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod ast;
pub mod grammar;
mod idxnewtype;
pub mod newlinecache;
mod parser;
pub mod slot;
pub mod span;

pub use crate::{
    grammar::Grammar,
    idxnewtype::{PIdx, RIdx, SIdx, TIdx},
    newlinecache::NewlineCache,
    parser::{GrammarError, GrammarErrorKind},
    slot::Slot,
    span::Span,
};

/// A grammar symbol: either a nonterminal (`Rule`) or a terminal (`Token`).
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Rule(RIdx<StorageT>),
    Token(TIdx<StorageT>),
}

impl<StorageT> Symbol<StorageT> {
    pub fn is_rule(&self) -> bool {
        matches!(self, Symbol::Rule(_))
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Symbol::Token(_))
    }
}
