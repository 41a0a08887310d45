//! Reconstructing the children of a [Derivation] from a [Set].
//!
//! A derivation only records where its last body symbol starts. The extent of any other body
//! symbol is recovered by walking backwards through the partial splits of ever shorter prefixes
//! of the body, each split giving the extent of its prefix's last symbol and of everything before
//! it.

use std::{fmt::Debug, hash::Hash};

use gllgrammar::{RIdx, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    bsr::{BsrError, Derivation, Set},
    lex_api::NonStreamingLexer,
};

impl<StorageT, LexerT> Set<'_, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    /// The extent of body symbol `i` of `d`. `i` must be a valid body position.
    pub(crate) fn extent_at(&self, d: &Derivation<StorageT>, i: usize) -> (usize, usize) {
        let body = d.slot().body(self.grammar());
        let len = body.len();
        debug_assert!(i < len);
        if len == 1 || i == len - 1 {
            return (d.pivot(), d.right_extent());
        }
        if len == 2 {
            return (d.left_extent(), d.pivot());
        }
        let mut prefix = &body[..len - 1];
        let mut split = self.lookup_partial(prefix, d.left_extent(), d.pivot());
        while prefix.len() > i + 1 && prefix.len() > 2 {
            prefix = &prefix[..prefix.len() - 1];
            split = self.lookup_partial(prefix, split.left_extent(), split.pivot());
        }
        if i == 0 {
            (split.left_extent(), split.pivot())
        } else {
            (split.pivot(), split.right_extent())
        }
    }

    /// All the derivations of the nonterminal at body position `i` of `d`. More than one means
    /// that symbol is ambiguous.
    pub fn nt_children_at(
        &self,
        d: &Derivation<StorageT>,
        i: usize,
    ) -> Result<&[Derivation<StorageT>], BsrError<StorageT>> {
        match d.slot().body(self.grammar()).get(i) {
            Some(Symbol::Rule(ridx)) => {
                let (l, r) = self.extent_at(d, i);
                Ok(self.lookup_children(*ridx, l, r))
            }
            Some(Symbol::Token(_)) => Err(BsrError::NotANonterminal {
                derivation: *d,
                desc: self.pp_derivation(d),
                idx: i,
                line_col: self.line_col(d.left_extent()),
            }),
            None => Err(self.no_such_symbol(d, format!("at position {}", i))),
        }
    }

    /// The derivation of the nonterminal at body position `i` of `d`, failing with
    /// `AmbiguousChild` unless there is exactly one.
    pub fn nt_child_at(
        &self,
        d: &Derivation<StorageT>,
        i: usize,
    ) -> Result<Derivation<StorageT>, BsrError<StorageT>> {
        match self.nt_children_at(d, i)? {
            [c] => Ok(*c),
            cs => Err(BsrError::AmbiguousChild {
                derivation: *d,
                desc: self.pp_derivation(d),
                idx: i,
                candidates: cs.to_vec(),
                line_col: self.line_col(d.left_extent()),
            }),
        }
    }

    /// All the derivations of the `occurrence`th (counting from 0) instance of `nt` in `d`'s
    /// body.
    pub fn nt_children_by_occurrence(
        &self,
        d: &Derivation<StorageT>,
        nt: RIdx<StorageT>,
        occurrence: usize,
    ) -> Result<&[Derivation<StorageT>], BsrError<StorageT>> {
        let i = self.occurrence_pos(d, nt, occurrence)?;
        self.nt_children_at(d, i)
    }

    /// The derivation of the `occurrence`th instance of `nt` in `d`'s body, failing with
    /// `AmbiguousChild` unless there is exactly one.
    pub fn nt_child_by_occurrence(
        &self,
        d: &Derivation<StorageT>,
        nt: RIdx<StorageT>,
        occurrence: usize,
    ) -> Result<Derivation<StorageT>, BsrError<StorageT>> {
        let i = self.occurrence_pos(d, nt, occurrence)?;
        self.nt_child_at(d, i)
    }

    fn occurrence_pos(
        &self,
        d: &Derivation<StorageT>,
        nt: RIdx<StorageT>,
        occurrence: usize,
    ) -> Result<usize, BsrError<StorageT>> {
        d.slot()
            .body(self.grammar())
            .iter()
            .enumerate()
            .filter(|(_, sym)| **sym == Symbol::Rule(nt))
            .map(|(i, _)| i)
            .nth(occurrence)
            .ok_or_else(|| {
                self.no_such_symbol(
                    d,
                    format!("{} (occurrence {})", self.grammar().rule_name_str(nt), occurrence),
                )
            })
    }

    /// The lexeme matched by the terminal at body position `i` of `d`. Every nonterminal before
    /// `i` must have exactly one derivation.
    ///
    /// # Panics
    ///
    /// If the derivation claims a token beyond the end of the lexer's input.
    pub fn terminal_at(
        &self,
        d: &Derivation<StorageT>,
        i: usize,
    ) -> Result<LexerT::LexemeT, BsrError<StorageT>> {
        let body = d.slot().body(self.grammar());
        match body.get(i) {
            Some(Symbol::Token(_)) => (),
            Some(Symbol::Rule(_)) => {
                return Err(BsrError::NotATerminal {
                    derivation: *d,
                    desc: self.pp_derivation(d),
                    idx: i,
                    line_col: self.line_col(d.left_extent()),
                });
            }
            None => return Err(self.no_such_symbol(d, format!("at position {}", i))),
        }
        let mut tok_idx = d.left_extent();
        for (j, sym) in body[..i].iter().enumerate() {
            match sym {
                Symbol::Token(_) => tok_idx += 1,
                Symbol::Rule(_) => {
                    let c = self.nt_child_at(d, j)?;
                    tok_idx += c.right_extent() - c.left_extent();
                }
            }
        }
        match self.lexer().token_at(tok_idx) {
            Some(lexeme) => Ok(lexeme),
            None => panic!(
                "Internal inconsistency: token {} of {} is beyond the input",
                tok_idx,
                self.pp_derivation(d)
            ),
        }
    }

    /// The candidate derivations of every nonterminal in `d`'s body, in body order. Ambiguous
    /// positions have more than one candidate.
    pub fn all_nt_children(&self, d: &Derivation<StorageT>) -> Vec<&[Derivation<StorageT>]> {
        d.slot()
            .body(self.grammar())
            .iter()
            .enumerate()
            .filter_map(|(i, sym)| match sym {
                Symbol::Rule(ridx) => {
                    let (l, r) = self.extent_at(d, i);
                    Some(self.lookup_children(*ridx, l, r))
                }
                Symbol::Token(_) => None,
            })
            .collect()
    }

    fn no_such_symbol(&self, d: &Derivation<StorageT>, symbol: String) -> BsrError<StorageT> {
        BsrError::NoSuchSymbol {
            derivation: *d,
            desc: self.pp_derivation(d),
            symbol,
            line_col: self.line_col(d.left_extent()),
        }
    }
}
