#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

//! `gllbsr` stores the output of a GLL recognizer as a *binary subtree representation* (BSR) set,
//! and turns such a set into parse trees or a shared packed parse forest (SPPF).
//!
//! A recognizer records what it has found by calling [Set::insert_derivation] (and
//! [Set::insert_empty] for empty alternates) for each slot it completes. Only two sorts of
//! fact are stored:
//!
//!   * a [Derivation] for each complete alternate: `X : α •` derives `[left, right)` and its last
//!     symbol derives `[pivot, right)`;
//!   * a [PartialSplit] for each proper body prefix of length 2 or more, recording where the
//!     prefix's last symbol starts.
//!
//! From these the extent of every body symbol can be recovered, however long the body, without
//! storing every split of every body. Once recognition is complete the set is queried:
//! [Set::roots], [Set::nt_children_at], [Set::terminal_at], [Set::is_ambiguous],
//! [Set::parse_tree], and [Set::to_forest].
//!
//! ```rust
//! use gllbsr::{Set, lexer::LexerDef};
//! use gllgrammar::{Grammar, Slot};
//!
//! let grm = Grammar::new("%% S: A A; A: 'a';").unwrap();
//! let lexerdef = LexerDef::from_grammar(&grm).unwrap();
//! let lexer = lexerdef.lexer("a a").unwrap();
//! let mut set = Set::new(&grm, &lexer);
//! let s = grm.rule_to_prods(grm.rule_idx("S").unwrap())[0];
//! let a = grm.rule_to_prods(grm.rule_idx("A").unwrap())[0];
//! set.insert_derivation(Slot::end(&grm, a), 0, 0, 1);
//! set.insert_derivation(Slot::end(&grm, a), 1, 1, 2);
//! set.insert_derivation(Slot::end(&grm, s), 0, 1, 2);
//! assert!(!set.is_ambiguous());
//! let root = set.get_root().unwrap();
//! assert_eq!(set.pp_derivation(&root), "S : A A •,0,1,2 - a a");
//! let forest = set.to_forest().unwrap();
//! assert_eq!(forest.children(forest.root()).len(), 1);
//! ```

mod ambiguity;
pub mod bsr;
pub mod lex_api;
pub mod lexer;
mod navigate;
pub mod sppf;
#[cfg(test)]
mod test_utils;
pub mod tree;

pub use crate::{
    ambiguity::{Ambiguity, AmbiguityKind, AmbiguityReport},
    bsr::{BsrError, Derivation, PartialSplit, Set},
    lex_api::{LexError, Lexeme, NonStreamingLexer},
    lexer::{DefaultLexeme, GllLexError, GllLexer, LexerDef},
    sppf::{Forest, ForestBuilder, ForestNode, NodeIdx, WorkOrder},
    tree::Node,
};
pub use gllgrammar::Span;
