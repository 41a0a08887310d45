//! An exhaustive (and exponential) recognizer for tiny inputs. It stands in for a GLL
//! recognizer: it fills a [Set] with every derivation and partial split consistent with a grammar
//! and a token sequence.

use std::collections::HashSet;

use gllgrammar::{Grammar, RIdx, Slot, Symbol, TIdx};

use crate::{
    bsr::Set,
    lex_api::{Lexeme, NonStreamingLexer},
};

pub(crate) struct Recogniser<'a> {
    grm: &'a Grammar<u32>,
    toks: Vec<TIdx<u32>>,
    /// `(nt, i, j)` is present iff `nt` derives `toks[i..j]`.
    derives: HashSet<(RIdx<u32>, usize, usize)>,
}

impl<'a> Recogniser<'a> {
    pub(crate) fn new(grm: &'a Grammar<u32>, toks: Vec<TIdx<u32>>) -> Self {
        let mut r = Recogniser {
            grm,
            toks,
            derives: HashSet::new(),
        };
        let n = r.toks.len();
        loop {
            let mut changed = false;
            for pidx in grm.iter_pidxs() {
                let head = grm.prod_to_rule(pidx);
                for i in 0..=n {
                    for j in i..=n {
                        if !r.derives.contains(&(head, i, j)) && r.seq_matches(grm.prod(pidx), i, j) {
                            r.derives.insert((head, i, j));
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        r
    }

    pub(crate) fn derives(&self, nt: RIdx<u32>, i: usize, j: usize) -> bool {
        self.derives.contains(&(nt, i, j))
    }

    fn sym_matches(&self, sym: Symbol<u32>, i: usize, j: usize) -> bool {
        match sym {
            Symbol::Token(tidx) => j == i + 1 && self.toks.get(i) == Some(&tidx),
            Symbol::Rule(ridx) => self.derives(ridx, i, j),
        }
    }

    fn seq_matches(&self, syms: &[Symbol<u32>], i: usize, j: usize) -> bool {
        match syms.split_first() {
            None => i == j,
            Some((sym, rest)) => (i..=j).any(|k| self.sym_matches(*sym, i, k) && self.seq_matches(rest, k, j)),
        }
    }

    /// Every way of splitting `[i, j)` into one extent per symbol of `syms`.
    pub(crate) fn decompositions(&self, syms: &[Symbol<u32>], i: usize, j: usize) -> Vec<Vec<(usize, usize)>> {
        match syms.split_first() {
            None if i == j => vec![vec![]],
            None => vec![],
            Some((sym, rest)) => {
                let mut out = Vec::new();
                for k in i..=j {
                    if self.sym_matches(*sym, i, k) {
                        for mut tail in self.decompositions(rest, k, j) {
                            tail.insert(0, (i, k));
                            out.push(tail);
                        }
                    }
                }
                out
            }
        }
    }

    /// Insert into `set` everything a complete GLL recognizer could have found.
    pub(crate) fn fill<LexerT: NonStreamingLexer<u32>>(&self, set: &mut Set<'_, u32, LexerT>) {
        let n = self.toks.len();
        for pidx in self.grm.iter_pidxs() {
            let body = self.grm.prod(pidx);
            if body.is_empty() {
                for i in 0..=n {
                    set.insert_empty(Slot::end(self.grm, pidx), i);
                }
                continue;
            }
            for pos in 1..=body.len() {
                for i in 0..=n {
                    for j in i..=n {
                        for k in i..=j {
                            if self.seq_matches(&body[..pos - 1], i, k) && self.sym_matches(body[pos - 1], k, j) {
                                set.insert_derivation(Slot::new(pidx, pos), i, k, j);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Build a fully populated set for `lexer`'s tokens.
pub(crate) fn recognise<'a, LexerT: NonStreamingLexer<u32>>(
    grm: &'a Grammar<u32>,
    lexer: &'a LexerT,
) -> Set<'a, u32, LexerT> {
    let toks = lexer
        .lexemes()
        .iter()
        .map(|l| TIdx(l.tok_id()))
        .collect::<Vec<_>>();
    let mut set = Set::new(grm, lexer);
    Recogniser::new(grm, toks).fill(&mut set);
    set
}
