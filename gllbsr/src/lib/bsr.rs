use std::{
    cmp,
    fmt::{self, Debug, Write as _},
    hash::Hash,
};

use fnv::FnvHashMap;
use gllgrammar::{Grammar, RIdx, Slot, Symbol};
use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lex_api::NonStreamingLexer;

/// The rendering used for a derivation or split which covers no input.
const EMPTY_TEXT: &str = "ℇ";

/// A binary subtree representation of one complete alternate: production `slot.pidx()` derives
/// the tokens `[left, right)`, with its last symbol deriving `[pivot, right)`. An empty
/// alternate has `left == pivot == right`; a single-symbol alternate has `left == pivot`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Derivation<StorageT> {
    slot: Slot<StorageT>,
    left: usize,
    pivot: usize,
    right: usize,
}

impl<StorageT: 'static + PrimInt + Unsigned> Derivation<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// The end-of-rule slot this derivation completes.
    pub fn slot(&self) -> Slot<StorageT> {
        self.slot
    }

    pub fn left_extent(&self) -> usize {
        self.left
    }

    pub fn pivot(&self) -> usize {
        self.pivot
    }

    pub fn right_extent(&self) -> usize {
        self.right
    }

    /// The nonterminal this derivation is for.
    pub fn head(&self, grm: &Grammar<StorageT>) -> RIdx<StorageT> {
        self.slot.head(grm)
    }

    /// The index of this derivation's production amongst its head's alternates.
    pub fn alternate(&self, grm: &Grammar<StorageT>) -> usize {
        self.slot.alternate(grm)
    }
}

/// How a proper prefix (of length at least 2) of some body splits: the prefix minus its last
/// symbol derives `[left, pivot)` and the prefix's last symbol derives `[pivot, right)`.
///
/// The prefix itself is interned by the [Set] which stored the split: see [Set::split_prefix].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialSplit {
    prefix: usize,
    left: usize,
    pivot: usize,
    right: usize,
}

impl PartialSplit {
    pub fn left_extent(&self) -> usize {
        self.left
    }

    pub fn pivot(&self) -> usize {
        self.pivot
    }

    pub fn right_extent(&self) -> usize {
        self.right
    }
}

/// The errors a query over a [Set] can produce. Each carries enough context (the derivation
/// involved, rendered, and the line/column its left extent starts at) to be reported to a user
/// without further reference to the set.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BsrError<StorageT> {
    /// There was not exactly one root (zero roots means nothing derived the whole input).
    #[error("{} parse trees exist for the start rule", .roots.len())]
    AmbiguousParse {
        start: RIdx<StorageT>,
        roots: Vec<Derivation<StorageT>>,
    },
    /// A query which needed exactly one child derivation found a different number.
    #[error(
        "{}:{}: {} candidates for symbol {} of {}",
        .line_col.0,
        .line_col.1,
        .candidates.len(),
        .idx,
        .desc
    )]
    AmbiguousChild {
        derivation: Derivation<StorageT>,
        desc: String,
        idx: usize,
        candidates: Vec<Derivation<StorageT>>,
        line_col: (usize, usize),
    },
    /// The requested symbol (by position or by occurrence) is not in the derivation's body.
    #[error("{}:{}: {} has no symbol {}", .line_col.0, .line_col.1, .desc, .symbol)]
    NoSuchSymbol {
        derivation: Derivation<StorageT>,
        desc: String,
        symbol: String,
        line_col: (usize, usize),
    },
    #[error("{}:{}: symbol {} of {} is not a terminal", .line_col.0, .line_col.1, .idx, .desc)]
    NotATerminal {
        derivation: Derivation<StorageT>,
        desc: String,
        idx: usize,
        line_col: (usize, usize),
    },
    #[error("{}:{}: symbol {} of {} is not a nonterminal", .line_col.0, .line_col.1, .idx, .desc)]
    NotANonterminal {
        derivation: Derivation<StorageT>,
        desc: String,
        idx: usize,
        line_col: (usize, usize),
    },
}

/// The set of derivations and partial splits produced by one GLL parse of one input.
///
/// A recognizer populates the set with [insert_derivation](Set::insert_derivation) and
/// [insert_empty](Set::insert_empty); once it has finished, the set is only queried. Storage is
/// append only and insertion is idempotent.
pub struct Set<'a, StorageT, LexerT> {
    grm: &'a Grammar<StorageT>,
    lexer: &'a LexerT,
    start: RIdx<StorageT>,
    pub(crate) derivations: IndexSet<Derivation<StorageT>>,
    /// Derivations keyed by `(head, left, right)`.
    nt_index: FnvHashMap<(RIdx<StorageT>, usize, usize), Vec<Derivation<StorageT>>>,
    /// Interned body prefixes: a [PartialSplit]'s `prefix` is an index into this.
    prefixes: IndexSet<Vec<Symbol<StorageT>>>,
    partials: IndexSet<PartialSplit>,
    /// Splits keyed by `(prefix, left, right)`, in insertion order.
    partial_index: FnvHashMap<(usize, usize, usize), Vec<PartialSplit>>,
    right_extent: usize,
}

impl<'a, StorageT, LexerT> Set<'a, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    /// Create an empty set whose roots are derivations of `grm`'s start rule.
    pub fn new(grm: &'a Grammar<StorageT>, lexer: &'a LexerT) -> Self {
        Set::with_start(grm, grm.start_rule_idx(), lexer)
    }

    /// Create an empty set whose roots are derivations of `start`.
    pub fn with_start(grm: &'a Grammar<StorageT>, start: RIdx<StorageT>, lexer: &'a LexerT) -> Self {
        Set {
            grm,
            lexer,
            start,
            derivations: IndexSet::new(),
            nt_index: FnvHashMap::default(),
            prefixes: IndexSet::new(),
            partials: IndexSet::new(),
            partial_index: FnvHashMap::default(),
            right_extent: 0,
        }
    }

    /// Record that the symbols before `slot`'s position derive `[left, right)`, with the last of
    /// them deriving `[pivot, right)`. At end of rule this stores a [Derivation]; for a prefix of
    /// length at least 2 it stores a [PartialSplit]; otherwise nothing is stored. Nothing is
    /// stored either unless `left <= pivot <= right`.
    pub fn insert_derivation(&mut self, slot: Slot<StorageT>, left: usize, pivot: usize, right: usize) {
        if left > pivot || pivot > right {
            return;
        }
        let grm = self.grm;
        if slot.is_eor(grm) {
            let d = Derivation {
                slot,
                left,
                pivot,
                right,
            };
            if self.derivations.insert(d) {
                self.nt_index
                    .entry((slot.head(grm), left, right))
                    .or_default()
                    .push(d);
                self.right_extent = cmp::max(self.right_extent, right);
            }
        } else if slot.pos() > 1 {
            let prefix = slot.prefix(grm);
            let prefix = match self.prefixes.get_index_of(prefix) {
                Some(i) => i,
                None => self.prefixes.insert_full(prefix.to_vec()).0,
            };
            let s = PartialSplit {
                prefix,
                left,
                pivot,
                right,
            };
            if self.partials.insert(s) {
                self.partial_index
                    .entry((prefix, left, right))
                    .or_default()
                    .push(s);
                self.right_extent = cmp::max(self.right_extent, right);
            }
        }
    }

    /// Record that the empty alternate `slot` derives the empty input at `pos`. Nothing is
    /// stored if `slot`'s production is not empty.
    pub fn insert_empty(&mut self, slot: Slot<StorageT>, pos: usize) {
        if slot.body(self.grm).is_empty() {
            self.insert_derivation(slot, pos, pos, pos);
        }
    }

    /// Does any derivation of `nt` cover exactly `[left, right)`?
    pub fn contains(&self, nt: RIdx<StorageT>, left: usize, right: usize) -> bool {
        self.derivations
            .iter()
            .any(|d| d.head(self.grm) == nt && d.left == left && d.right == right)
    }

    /// All stored derivations, in insertion order.
    pub fn all_derivations(&self) -> impl Iterator<Item = &Derivation<StorageT>> {
        self.derivations.iter()
    }

    /// All stored partial splits, in insertion order.
    pub fn all_partials(&self) -> impl Iterator<Item = &PartialSplit> {
        self.partials.iter()
    }

    /// The derivations of the start rule which cover `[0, right_extent)`. There are zero if the
    /// parse failed and more than one if it was ambiguous at the top level.
    pub fn roots(&self) -> &[Derivation<StorageT>] {
        self.lookup_children(self.start, 0, self.right_extent)
    }

    /// The sole root, or `AmbiguousParse` if there isn't exactly one.
    pub fn get_root(&self) -> Result<Derivation<StorageT>, BsrError<StorageT>> {
        match self.roots() {
            [d] => Ok(*d),
            roots => Err(BsrError::AmbiguousParse {
                start: self.start,
                roots: roots.to_vec(),
            }),
        }
    }

    /// The canonical (i.e. first stored) split of `prefix` over `[left, right)`.
    ///
    /// # Panics
    ///
    /// If no such split exists: navigation only asks for splits a correct recognizer must have
    /// stored.
    pub fn lookup_partial(&self, prefix: &[Symbol<StorageT>], left: usize, right: usize) -> &PartialSplit {
        match self.partials_for(prefix, left, right).first() {
            Some(s) => s,
            None => panic!(
                "Internal inconsistency: no split for '{}' over [{}, {})",
                self.grm.pp_symbols(prefix),
                left,
                right
            ),
        }
    }

    /// Every split of `prefix` over `[left, right)`, in insertion order.
    pub fn partials_for(&self, prefix: &[Symbol<StorageT>], left: usize, right: usize) -> &[PartialSplit] {
        match self.prefixes.get_index_of(prefix) {
            Some(i) => self
                .partial_index
                .get(&(i, left, right))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            None => &[],
        }
    }

    /// Every derivation of `nt` over `[left, right)`.
    pub fn lookup_children(&self, nt: RIdx<StorageT>, left: usize, right: usize) -> &[Derivation<StorageT>] {
        self.nt_index
            .get(&(nt, left, right))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The body prefix `split` is a split of.
    ///
    /// # Panics
    ///
    /// If `split` was not stored by this set.
    pub fn split_prefix(&self, split: &PartialSplit) -> &[Symbol<StorageT>] {
        match self.prefixes.get_index(split.prefix) {
            Some(p) => p,
            None => panic!("Internal inconsistency: split from a different set"),
        }
    }

    pub fn grammar(&self) -> &'a Grammar<StorageT> {
        self.grm
    }

    pub fn lexer(&self) -> &'a LexerT {
        self.lexer
    }

    pub fn start(&self) -> RIdx<StorageT> {
        self.start
    }

    /// The largest right extent of anything stored: how much of the input has been parsed.
    pub fn right_extent(&self) -> usize {
        self.right_extent
    }

    fn source_text(&self, left: usize, right: usize) -> &str {
        match self.lexer.source_text(left, right) {
            "" => EMPTY_TEXT,
            s => s,
        }
    }

    /// Render `d` as `X : α •,left,pivot,right - text`.
    pub fn pp_derivation(&self, d: &Derivation<StorageT>) -> String {
        format!(
            "{},{},{},{} - {}",
            self.grm.pp_slot(d.slot),
            d.left,
            d.pivot,
            d.right,
            self.source_text(d.left, d.right)
        )
    }

    /// Render `s` as `α,left,pivot,right - text`.
    pub fn pp_partial(&self, s: &PartialSplit) -> String {
        format!(
            "{},{},{},{} - {}",
            self.grm.pp_symbols(self.split_prefix(s)),
            s.left,
            s.pivot,
            s.right,
            self.source_text(s.left, s.right)
        )
    }

    /// Return a pretty-printed listing of the roots, all derivations, and all partial splits.
    /// Each section is sorted by label (or prefix), then left extent, then right extent.
    pub fn dump(&self) -> String {
        let mut derivs = self
            .derivations
            .iter()
            .map(|d| (self.grm.pp_slot(d.slot), d.left, d.right, self.pp_derivation(d)))
            .collect::<Vec<_>>();
        derivs.sort();
        let mut partials = self
            .partials
            .iter()
            .map(|s| {
                (
                    self.grm.pp_symbols(self.split_prefix(s)),
                    s.left,
                    s.right,
                    self.pp_partial(s),
                )
            })
            .collect::<Vec<_>>();
        partials.sort();
        let mut roots = self
            .roots()
            .iter()
            .map(|d| self.pp_derivation(d))
            .collect::<Vec<_>>();
        roots.sort();

        let mut s = String::new();
        s.push_str("Roots:\n");
        for r in roots {
            writeln!(s, "{}", r).ok();
        }
        s.push_str("\nDerivations:\n");
        for (_, _, _, d) in derivs {
            writeln!(s, "{}", d).ok();
        }
        s.push_str("\nPartial splits:\n");
        for (_, _, _, p) in partials {
            writeln!(s, "{}", p).ok();
        }
        s
    }

    /// The line/column of token `idx`, for error messages.
    pub(crate) fn line_col(&self, idx: usize) -> (usize, usize) {
        self.lexer.line_column_of(idx)
    }
}

impl<StorageT, LexerT> fmt::Display for Set<'_, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.dump())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        lexer::{GllLexer, LexerDef},
        test_utils::recognise,
    };
    use gllgrammar::PIdx;

    fn lex<'a>(lexerdef: &'a LexerDef<u32>, s: &'a str) -> GllLexer<'a, 'a, u32> {
        lexerdef.lexer(s).unwrap()
    }

    #[test]
    fn test_idempotent_insertion() {
        let grm = Grammar::new("%% S: A A; A: 'a';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a a");
        let mut set = Set::new(&grm, &lexer);
        let a = grm.rule_idx("A").unwrap();
        let ap = grm.rule_to_prods(a)[0];
        set.insert_derivation(Slot::end(&grm, ap), 0, 0, 1);
        set.insert_derivation(Slot::end(&grm, ap), 0, 0, 1);
        assert_eq!(set.all_derivations().count(), 1);
        assert_eq!(set.lookup_children(a, 0, 1).len(), 1);
        assert!(set.contains(a, 0, 1));
        assert!(!set.contains(a, 1, 2));
    }

    #[test]
    fn test_malformed_extents_ignored() {
        let grm = Grammar::new("%% S: 'a' 'b' 'c';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a b c");
        let mut set = Set::new(&grm, &lexer);
        let p = PIdx(0);
        set.insert_derivation(Slot::end(&grm, p), 0, 3, 2);
        set.insert_derivation(Slot::new(p, 2), 2, 1, 2);
        set.insert_empty(Slot::end(&grm, p), 0);
        assert_eq!(set.all_derivations().count(), 0);
        assert_eq!(set.all_partials().count(), 0);
        assert_eq!(set.right_extent(), 0);
    }

    #[test]
    fn test_right_extent_monotonic() {
        let grm = Grammar::new("%% S: A A; A: 'a';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a a");
        let mut set = Set::new(&grm, &lexer);
        let ap = grm.rule_to_prods(grm.rule_idx("A").unwrap())[0];
        let sp = grm.rule_to_prods(grm.start_rule_idx())[0];
        let mut last = set.right_extent();
        for (slot, l, k, r) in [
            (Slot::end(&grm, ap), 1, 1, 2),
            (Slot::end(&grm, ap), 0, 0, 1),
            (Slot::new(sp, 1), 0, 0, 1),
            (Slot::end(&grm, sp), 0, 1, 2),
        ] {
            set.insert_derivation(slot, l, k, r);
            assert!(set.right_extent() >= last);
            last = set.right_extent();
        }
        assert_eq!(set.right_extent(), 2);
        // A slot at position 1 which isn't end of rule stores nothing.
        assert_eq!(set.all_derivations().count(), 3);
        assert_eq!(set.all_partials().count(), 0);
    }

    #[test]
    fn test_roots() {
        let grm = Grammar::new("%% S: A | B; A: 'x'; B: 'x';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "x");
        let set = recognise(&grm, &lexer);
        assert_eq!(set.roots().len(), 2);
        for r in set.roots() {
            assert_eq!(r.head(&grm), grm.start_rule_idx());
            assert_eq!((r.left_extent(), r.right_extent()), (0, 1));
        }
        match set.get_root() {
            Err(BsrError::AmbiguousParse { start, roots }) => {
                assert_eq!(start, grm.start_rule_idx());
                assert_eq!(roots.len(), 2);
            }
            _ => panic!("Expected an ambiguous parse"),
        }
    }

    #[test]
    fn test_no_roots() {
        let grm = Grammar::new("%% S: 'a' 'b';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a a");
        let set = recognise(&grm, &lexer);
        assert!(set.roots().is_empty());
        assert!(matches!(
            set.get_root(),
            Err(BsrError::AmbiguousParse { ref roots, .. }) if roots.is_empty()
        ));
    }

    #[test]
    fn test_with_start() {
        let grm = Grammar::new("%% S: A A; A: 'a';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a");
        let a = grm.rule_idx("A").unwrap();
        let mut set = Set::with_start(&grm, a, &lexer);
        set.insert_derivation(Slot::end(&grm, grm.rule_to_prods(a)[0]), 0, 0, 1);
        assert_eq!(set.start(), a);
        assert_eq!(set.get_root().unwrap().head(&grm), a);
    }

    #[test]
    fn test_empty_alternate() {
        let grm = Grammar::new("%% S: 'a' | ;").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "");
        let mut set = Set::new(&grm, &lexer);
        let empty = PIdx(1);
        set.insert_empty(Slot::end(&grm, empty), 0);
        let root = set.get_root().unwrap();
        assert_eq!((root.left_extent(), root.pivot(), root.right_extent()), (0, 0, 0));
        assert_eq!(root.alternate(&grm), 1);
        assert_eq!(set.pp_derivation(&root), "S : •,0,0,0 - ℇ");
    }

    #[test]
    fn test_partials() {
        let grm = Grammar::new("%% S: 'a' 'b' 'c';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a b c");
        let mut set = Set::new(&grm, &lexer);
        let p = PIdx(0);
        set.insert_derivation(Slot::new(p, 2), 0, 1, 2);
        // A second split with the same key.
        set.insert_derivation(Slot::new(p, 2), 0, 0, 2);
        set.insert_derivation(Slot::new(p, 2), 0, 1, 2);
        let prefix = &grm.prod(p)[..2];
        assert_eq!(set.all_partials().count(), 2);
        let splits = set.partials_for(prefix, 0, 2);
        assert_eq!(splits.len(), 2);
        assert_eq!(set.lookup_partial(prefix, 0, 2), &splits[0]);
        assert_eq!(splits[0].pivot(), 1);
        assert_eq!(set.split_prefix(&splits[0]), prefix);
        assert_eq!(set.pp_partial(&splits[0]), "'a' 'b',0,1,2 - a b");
        assert!(set.partials_for(prefix, 0, 1).is_empty());
        assert!(set.partials_for(&grm.prod(p)[1..], 0, 2).is_empty());
        assert_eq!(set.right_extent(), 2);
    }

    #[test]
    #[should_panic(expected = "Internal inconsistency:")]
    fn test_lookup_partial_miss() {
        let grm = Grammar::new("%% S: 'a' 'b' 'c';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a b c");
        let set = Set::new(&grm, &lexer);
        set.lookup_partial(&grm.prod(PIdx(0))[..2], 0, 2);
    }

    #[test]
    fn test_dump() {
        let grm = Grammar::new("%% S: A A; A: 'a';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lex(&lexerdef, "a a");
        let set = recognise(&grm, &lexer);
        assert_eq!(
            set.dump(),
            "Roots:
S : A A •,0,1,2 - a a

Derivations:
A : 'a' •,0,0,1 - a
A : 'a' •,1,1,2 - a
S : A A •,0,1,2 - a a

Partial splits:
"
        );
        assert_eq!(set.to_string(), set.dump());
    }
}
