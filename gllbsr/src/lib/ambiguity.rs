use std::{
    cmp,
    fmt::{Debug, Write as _},
    hash::Hash,
};

use fnv::FnvHashSet;
use gllgrammar::{RIdx, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{
    bsr::{Derivation, PartialSplit, Set},
    lex_api::NonStreamingLexer,
};

/// One point at which a derivation has more than one subtree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ambiguity<StorageT> {
    /// The derivation whose body is ambiguous.
    pub derivation: Derivation<StorageT>,
    /// The line/column at which `derivation` starts.
    pub line_col: (usize, usize),
    pub kind: AmbiguityKind<StorageT>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AmbiguityKind<StorageT> {
    /// The nonterminal at body position `idx` does not have exactly one derivation.
    Child {
        idx: usize,
        candidates: Vec<Derivation<StorageT>>,
    },
    /// The first `prefix_len` body symbols split in more than one way.
    Split {
        prefix_len: usize,
        splits: Vec<PartialSplit>,
    },
}

/// The ambiguities reachable from each root of a [Set]. See [Set::report_ambiguous].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AmbiguityReport<StorageT> {
    roots: Vec<(Derivation<StorageT>, Vec<Ambiguity<StorageT>>)>,
}

impl<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> AmbiguityReport<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// How many roots the set had. Anything other than 1 is itself an ambiguity (or, for 0, a
    /// failed parse).
    pub fn roots_len(&self) -> usize {
        self.roots.len()
    }

    /// True iff there was exactly one root and nothing below it is ambiguous.
    pub fn is_empty(&self) -> bool {
        self.roots.len() == 1 && self.roots[0].1.is_empty()
    }

    /// Each root, with the ambiguities reachable from it.
    pub fn iter(&self) -> impl Iterator<Item = &(Derivation<StorageT>, Vec<Ambiguity<StorageT>>)> {
        self.roots.iter()
    }

    /// Render this report in terms of `set` (which must be the set it was created from).
    pub fn pp<LexerT: NonStreamingLexer<StorageT>>(&self, set: &Set<'_, StorageT, LexerT>) -> String {
        let grm = set.grammar();
        let mut s = String::new();
        if self.roots.len() != 1 {
            writeln!(s, "{} roots for start rule {}", self.roots.len(), grm.rule_name_str(set.start())).ok();
        }
        for (i, (root, ambs)) in self.roots.iter().enumerate() {
            writeln!(s, "In root {}: {}", i, set.pp_derivation(root)).ok();
            if ambs.is_empty() {
                s.push_str("  No ambiguities\n");
            }
            for amb in ambs {
                let (line, col) = amb.line_col;
                match &amb.kind {
                    AmbiguityKind::Child { idx, candidates } => {
                        let sym = amb.derivation.slot().body(grm)[*idx];
                        writeln!(
                            s,
                            "  Ambiguous {} (symbol {}) in {} at line {} col {}",
                            grm.pp_sym(sym),
                            idx,
                            set.pp_derivation(&amb.derivation),
                            line,
                            col
                        )
                        .ok();
                        for c in candidates {
                            writeln!(s, "    {}", set.pp_derivation(c)).ok();
                        }
                    }
                    AmbiguityKind::Split { prefix_len, splits } => {
                        let prefix = &amb.derivation.slot().body(grm)[..*prefix_len];
                        writeln!(
                            s,
                            "  Ambiguous split of {} in {} at line {} col {}",
                            grm.pp_symbols(prefix),
                            set.pp_derivation(&amb.derivation),
                            line,
                            col
                        )
                        .ok();
                        for sp in splits {
                            writeln!(s, "    {}", set.pp_partial(sp)).ok();
                        }
                    }
                }
            }
        }
        s
    }
}

impl<StorageT, LexerT> Set<'_, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    /// Is there anything other than exactly one parse tree? This is the case if there isn't
    /// exactly one root, or if any derivation reachable from the root has a nonterminal with
    /// other than one derivation, or a prefix with more than one split.
    pub fn is_ambiguous(&self) -> bool {
        let root = match self.roots() {
            [r] => *r,
            _ => return true,
        };
        let mut seen = Vob::from_elem(false, self.derivations.len());
        self.mark_seen(&mut seen, &root);
        let mut todo = vec![root];
        while let Some(d) = todo.pop() {
            let (splits, nts) = self.body_extents(&d);
            if !splits.is_empty() {
                return true;
            }
            for (_, ridx, l, r) in nts {
                match self.lookup_children(ridx, l, r) {
                    [c] => {
                        if self.mark_seen(&mut seen, c) {
                            todo.push(*c);
                        }
                    }
                    _ => return true,
                }
            }
        }
        false
    }

    /// Find every ambiguity reachable from each root. Unlike [is_ambiguous](Set::is_ambiguous)
    /// this descends into every candidate of an ambiguous nonterminal, and through every split of
    /// an ambiguous prefix. Each derivation is examined at most once per root.
    pub fn report_ambiguous(&self) -> AmbiguityReport<StorageT> {
        let mut roots = Vec::with_capacity(self.roots().len());
        for root in self.roots() {
            let mut ambs = Vec::new();
            let mut seen = Vob::from_elem(false, self.derivations.len());
            self.mark_seen(&mut seen, root);
            let mut todo = vec![*root];
            while let Some(d) = todo.pop() {
                let line_col = self.line_col(d.left_extent());
                let (splits, nts) = self.body_extents(&d);
                for (prefix_len, splits) in splits {
                    ambs.push(Ambiguity {
                        derivation: d,
                        line_col,
                        kind: AmbiguityKind::Split {
                            prefix_len,
                            splits: splits.to_vec(),
                        },
                    });
                }
                for (idx, ridx, l, r) in nts {
                    let cs = self.lookup_children(ridx, l, r);
                    if cs.len() != 1 {
                        ambs.push(Ambiguity {
                            derivation: d,
                            line_col,
                            kind: AmbiguityKind::Child {
                                idx,
                                candidates: cs.to_vec(),
                            },
                        });
                    }
                    for c in cs {
                        if self.mark_seen(&mut seen, c) {
                            todo.push(*c);
                        }
                    }
                }
            }
            roots.push((*root, ambs));
        }
        AmbiguityReport { roots }
    }

    /// Walk every stored split of every prefix of `d`'s body. Returns the prefixes (by length)
    /// with more than one split over the same extent, and each distinct `(body position,
    /// nonterminal, left, right)` those splits give a nonterminal of the body. Without ambiguous
    /// splits there is exactly one extent per nonterminal, as found by navigation.
    fn body_extents(
        &self,
        d: &Derivation<StorageT>,
    ) -> (Vec<(usize, &[PartialSplit])>, Vec<(usize, RIdx<StorageT>, usize, usize)>) {
        let body = d.slot().body(self.grammar());
        let mut extents = Vec::with_capacity(body.len());
        let mut splits = Vec::new();
        match body.len() {
            0 => (),
            1 => extents.push((0, d.pivot(), d.right_extent())),
            len => {
                extents.push((len - 1, d.pivot(), d.right_extent()));
                if len == 2 {
                    extents.push((0, d.left_extent(), d.pivot()));
                } else {
                    // States are (prefix length, left, right) still to be split.
                    let mut seen = FnvHashSet::default();
                    let mut todo = vec![(len - 1, d.left_extent(), d.pivot())];
                    while let Some((n, l, r)) = todo.pop() {
                        if !seen.insert((n, l, r)) {
                            continue;
                        }
                        let ss = self.partials_for(&body[..n], l, r);
                        if ss.len() > 1 {
                            splits.push((n, ss));
                        }
                        for s in ss {
                            extents.push((n - 1, s.pivot(), s.right_extent()));
                            if n == 2 {
                                extents.push((0, s.left_extent(), s.pivot()));
                            } else {
                                todo.push((n - 1, s.left_extent(), s.pivot()));
                            }
                        }
                    }
                }
            }
        }
        splits.sort_by_key(|(n, _)| cmp::Reverse(*n));
        let mut nts = extents
            .into_iter()
            .filter_map(|(i, l, r)| match body[i] {
                Symbol::Rule(ridx) => Some((i, ridx, l, r)),
                Symbol::Token(_) => None,
            })
            .collect::<Vec<_>>();
        nts.sort();
        nts.dedup();
        (splits, nts)
    }

    /// Mark `d` as seen, returning true if it had not been seen before.
    fn mark_seen(&self, seen: &mut Vob, d: &Derivation<StorageT>) -> bool {
        match self.derivations.get_index_of(d) {
            Some(i) if seen.get(i) == Some(false) => {
                seen.set(i, true);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use gllgrammar::{Grammar, Slot};

    use super::AmbiguityKind;
    use crate::{bsr::Set, lexer::LexerDef, test_utils::recognise};

    #[test]
    fn test_unambiguous() {
        let grm = Grammar::new("%% S: A A; A: 'a';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("aa").unwrap();
        let set = recognise(&grm, &lexer);
        assert!(!set.is_ambiguous());
        let report = set.report_ambiguous();
        assert!(report.is_empty());
        assert_eq!(report.roots_len(), 1);
        assert_eq!(
            report.pp(&set),
            "In root 0: S : A A •,0,1,2 - aa\n  No ambiguities\n"
        );
    }

    #[test]
    fn test_ambiguous_roots() {
        let grm = Grammar::new("%% S: A | B; A: 'x'; B: 'x';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("x").unwrap();
        let set = recognise(&grm, &lexer);
        assert!(set.is_ambiguous());
        let report = set.report_ambiguous();
        assert!(!report.is_empty());
        assert_eq!(report.roots_len(), 2);
        // Each root on its own is unambiguous.
        assert!(report.iter().all(|(_, ambs)| ambs.is_empty()));
        assert!(report.pp(&set).starts_with("2 roots for start rule S\n"));
    }

    #[test]
    fn test_no_roots() {
        let grm = Grammar::new("%% S: 'a';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("a").unwrap();
        let set = Set::new(&grm, &lexer);
        assert!(set.is_ambiguous());
        let report = set.report_ambiguous();
        assert_eq!(report.roots_len(), 0);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_ambiguous_child() {
        let grm = Grammar::new("%% S: 'y' E; E: E '+' E | 'n';").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("y n+n+n").unwrap();
        let set = recognise(&grm, &lexer);
        assert_eq!(set.roots().len(), 1);
        assert!(set.is_ambiguous());
        let report = set.report_ambiguous();
        let (_, ambs) = report.iter().next().unwrap();
        let e = grm.rule_idx("E").unwrap();
        // 'y' E: E over [1, 6) has two derivations.
        assert!(ambs.iter().any(|a| matches!(
            &a.kind,
            AmbiguityKind::Child { idx: 1, candidates } if candidates.len() == 2
                && candidates.iter().all(|c| c.head(&grm) == e)
        )));
        let pp = report.pp(&set);
        assert!(pp.contains("  Ambiguous E (symbol 1) in S : 'y' E •,0,1,6 - y n+n+n at line 1 col 1\n"));
    }

    #[test]
    fn test_ambiguous_split() {
        // One derivation of S, but the prefix "A A" splits two ways.
        let grm = Grammar::new("%% S: A A 'c'; A: 'a' | 'a' 'a' | ;").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("aac").unwrap();
        let mut set = Set::new(&grm, &lexer);
        let s = grm.rule_to_prods(grm.rule_idx("S").unwrap())[0];
        let a = grm.rule_to_prods(grm.rule_idx("A").unwrap()).to_vec();
        set.insert_derivation(Slot::end(&grm, a[0]), 0, 0, 1);
        set.insert_derivation(Slot::end(&grm, a[0]), 1, 1, 2);
        set.insert_derivation(Slot::end(&grm, a[1]), 0, 1, 2);
        set.insert_empty(Slot::end(&grm, a[2]), 2);
        set.insert_derivation(Slot::new(s, 2), 0, 1, 2);
        set.insert_derivation(Slot::new(s, 2), 0, 2, 2);
        set.insert_derivation(Slot::end(&grm, s), 0, 2, 3);
        assert_eq!(set.roots().len(), 1);
        assert!(set.is_ambiguous());
        let report = set.report_ambiguous();
        let (_, ambs) = report.iter().next().unwrap();
        assert_eq!(ambs.len(), 1);
        match &ambs[0].kind {
            AmbiguityKind::Split { prefix_len, splits } => {
                assert_eq!(*prefix_len, 2);
                assert_eq!(splits.len(), 2);
            }
            _ => panic!(),
        }
    }
}
