use std::collections::HashMap;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    ast,
    parser::{GrammarError, GrammarParser},
    PIdx, RIdx, SIdx, Slot, Span, Symbol, TIdx,
};

/// Representation of a grammar. See the [top-level documentation](../../index.html) for the
/// guarantees this struct makes about rules, tokens, and productions.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar<StorageT = u32> {
    /// How many rules does this grammar have?
    rules_len: RIdx<StorageT>,
    /// A mapping from `RIdx` -> `(String, Span)`.
    rule_names: Box<[(String, Span)]>,
    /// How many tokens does this grammar have?
    tokens_len: TIdx<StorageT>,
    /// A mapping from `TIdx` -> `(String, Span)`.
    token_names: Box<[(String, Span)]>,
    /// How many productions does this grammar have?
    prods_len: PIdx<StorageT>,
    /// A list of all productions.
    prods: Box<[Box<[Symbol<StorageT>]>]>,
    /// A mapping from rules to their productions, in source order.
    rules_prods: Box<[Box<[PIdx<StorageT>]>]>,
    /// A mapping from productions to their corresponding rule indexes.
    prods_rules: Box<[RIdx<StorageT>]>,
    /// For each production, its position within its rule's productions.
    prods_alternates: Box<[usize]>,
    start_rule: RIdx<StorageT>,
}

impl Grammar<u32> {
    /// Takes as input a grammar `s` and returns a `Grammar` (or every error found in `s`). See
    /// [`new_with_storaget`](#method.new_with_storaget) for the grammar format.
    pub fn new(s: &str) -> Result<Self, Vec<GrammarError>> {
        Grammar::new_with_storaget(s)
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Takes as input a Yacc-style grammar `s` and returns a `Grammar` (or every error found in
    /// `s`). The grammar has an optional declarations section (`%start R` and `%token t1 t2
    /// ...`), then `%%`, then rules of the form `R: s1 s2 | s3 | ;`. Quoted names, and unquoted
    /// names declared with `%token`, are tokens; other unquoted names are rule references. If no
    /// `%start` is given, the first rule is the start rule.
    ///
    /// # Panics
    ///
    /// If `StorageT` is not big enough to index this grammar's rules, tokens, productions, or
    /// the symbols of a production.
    pub fn new_with_storaget(s: &str) -> Result<Self, Vec<GrammarError>> {
        let mut gp = GrammarParser::new(s.to_string());
        gp.parse()?;
        let mut ast = gp.ast();
        ast.complete_and_validate()?;
        Ok(Grammar::new_from_ast(&ast))
    }

    fn new_from_ast(ast: &ast::GrammarAST) -> Self {
        // After these checks we can guarantee that things like RIdx(ast.rules.len().as_()) are
        // safe.
        let max: usize = num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX);
        if ast.rules.len() > max {
            panic!("StorageT is not big enough to store this grammar's rules.");
        }
        if ast.tokens.len() > max {
            panic!("StorageT is not big enough to store this grammar's tokens.");
        }
        if ast.prods.len() > max {
            panic!("StorageT is not big enough to store this grammar's productions.");
        }
        if ast.prods.iter().any(|p| p.symbols.len() > max) {
            panic!(
                "StorageT is not big enough to store the symbols of at least one of this grammar's productions."
            );
        }

        let rule_names = ast
            .rules
            .values()
            .map(|r| r.name.clone())
            .collect::<Box<[_]>>();
        let token_names = ast
            .tokens
            .iter()
            .zip(ast.spans.iter())
            .map(|(n, span)| (n.clone(), *span))
            .collect::<Box<[_]>>();

        let mut prods = vec![None; ast.prods.len()];
        let mut prods_rules = vec![None; ast.prods.len()];
        let mut prods_alternates = vec![0; ast.prods.len()];
        let mut rules_prods = Vec::with_capacity(ast.rules.len());
        for (ridx, rule) in ast.rules.values().enumerate() {
            let ridx = RIdx(ridx.as_());
            let mut pidxs = Vec::with_capacity(rule.pidxs.len());
            for (alt, &pidx) in rule.pidxs.iter().enumerate() {
                let prod = ast.prods[pidx]
                    .symbols
                    .iter()
                    .map(|sym| match sym {
                        ast::Symbol::Rule(n, _) => {
                            Symbol::Rule(RIdx(ast.rules.get_index_of(n.as_str()).unwrap().as_()))
                        }
                        ast::Symbol::Token(n, _) => {
                            Symbol::Token(TIdx(ast.tokens.get_index_of(n.as_str()).unwrap().as_()))
                        }
                    })
                    .collect::<Box<[_]>>();
                prods[pidx] = Some(prod);
                prods_rules[pidx] = Some(ridx);
                prods_alternates[pidx] = alt;
                pidxs.push(PIdx(pidx.as_()));
            }
            rules_prods.push(pidxs.into_boxed_slice());
        }

        // complete_and_validate has guaranteed that the start rule exists.
        let start_rule = ast
            .start
            .as_ref()
            .and_then(|(n, _)| ast.rules.get_index_of(n.as_str()))
            .unwrap();

        Grammar {
            rules_len: RIdx(rule_names.len().as_()),
            rule_names,
            tokens_len: TIdx(token_names.len().as_()),
            token_names,
            prods_len: PIdx(prods.len().as_()),
            prods: prods.into_iter().map(Option::unwrap).collect(),
            rules_prods: rules_prods.into_boxed_slice(),
            prods_rules: prods_rules.into_iter().map(Option::unwrap).collect(),
            prods_alternates: prods_alternates.into_boxed_slice(),
            start_rule: RIdx(start_rule.as_()),
        }
    }

    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> PIdx<StorageT> {
        self.prods_len
    }

    /// Return an iterator which produces (in order from `0..self.prods_len()`) all this
    /// grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx<StorageT>> + use<StorageT> {
        // We can use as_ safely, because we know that we're only generating integers from
        // 0..self.prods_len() and, since prods_len() is a PIdx<StorageT>, then by definition the
        // integers we're creating fit within StorageT.
        Box::new((0..usize::from(self.prods_len())).map(|x| PIdx(x.as_())))
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod(&self, pidx: PIdx<StorageT>) -> &[Symbol<StorageT>] {
        &self.prods[usize::from(pidx)]
    }

    /// How many symbols does production `pidx` have? Panics if `pidx` doesn't exist.
    pub fn prod_len(&self, pidx: PIdx<StorageT>) -> SIdx<StorageT> {
        // Since we've already checked that StorageT can store all the symbols for every production
        // in the grammar, the call to as_ is safe.
        SIdx(self.prods[usize::from(pidx)].len().as_())
    }

    /// Return the rule index of the production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_to_rule(&self, pidx: PIdx<StorageT>) -> RIdx<StorageT> {
        self.prods_rules[usize::from(pidx)]
    }

    /// Return the position of production `pidx` amongst its rule's productions (i.e. its
    /// alternate index). Panics if `pidx` doesn't exist.
    pub fn prod_alternate(&self, pidx: PIdx<StorageT>) -> usize {
        self.prods_alternates[usize::from(pidx)]
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        self.rules_len
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx<StorageT>> + use<StorageT> {
        // We can use as_ safely, because we know that we're only generating integers from
        // 0..self.rules_len() and, since rules_len() is an RIdx<StorageT>, then by definition the
        // integers we're creating fit within StorageT.
        Box::new((0..usize::from(self.rules_len())).map(|x| RIdx(x.as_())))
    }

    /// Return the productions for rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_to_prods(&self, ridx: RIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_str(&self, ridx: RIdx<StorageT>) -> &str {
        &self.rule_names[usize::from(ridx)].0
    }

    /// Return the span of the first definition of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_span(&self, ridx: RIdx<StorageT>) -> Span {
        self.rule_names[usize::from(ridx)].1
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_names
            .iter()
            .position(|(x, _)| x == n)
            // The call to as_() is safe because rule_names is guaranteed to be small enough to
            // fit into StorageT
            .map(|x| RIdx(x.as_()))
    }

    /// What is the index of the start rule?
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.start_rule
    }

    /// How many tokens are in this grammar?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        self.tokens_len
    }

    /// Return an iterator which produces (in order from `0..self.tokens_len()`) all this
    /// grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> + use<StorageT> {
        // We can use as_ safely, because we know that we're only generating integers from
        // 0..self.tokens_len() and, since tokens_len() is a TIdx<StorageT>, then by definition
        // the integers we're creating fit within StorageT.
        Box::new((0..usize::from(self.tokens_len())).map(|x| TIdx(x.as_())))
    }

    /// Return the name of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> &str {
        &self.token_names[usize::from(tidx)].0
    }

    /// Return the span of the first occurrence of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_span(&self, tidx: TIdx<StorageT>) -> Span {
        self.token_names[usize::from(tidx)].1
    }

    /// Return the index of the token named `n` or `None` if it doesn't exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_names
            .iter()
            .position(|(x, _)| x == n)
            // The call to as_() is safe because token_names is guaranteed to be small enough to
            // fit into StorageT
            .map(|x| TIdx(x.as_()))
    }

    /// Return a map from token names to token indexes.
    pub fn tokens_map(&self) -> HashMap<&str, TIdx<StorageT>> {
        self.token_names
            .iter()
            .enumerate()
            .map(|(i, (n, _))| (n.as_str(), TIdx(i.as_())))
            .collect()
    }

    /// Returns the string representation of `sym`: rules by name, tokens by quoted name.
    pub fn pp_sym(&self, sym: Symbol<StorageT>) -> String {
        match sym {
            Symbol::Rule(ridx) => self.rule_name_str(ridx).to_string(),
            Symbol::Token(tidx) => format!("'{}'", self.token_name(tidx)),
        }
    }

    /// Returns the string representation of a sequence of symbols, separated by spaces.
    pub fn pp_symbols(&self, syms: &[Symbol<StorageT>]) -> String {
        syms.iter()
            .map(|sym| self.pp_sym(*sym))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Returns the string representation of a given production `pidx` e.g. `R : 'a' S`.
    pub fn pp_prod(&self, pidx: PIdx<StorageT>) -> String {
        let mut sprod = format!("{} :", self.rule_name_str(self.prod_to_rule(pidx)));
        for sym in self.prod(pidx) {
            sprod.push(' ');
            sprod.push_str(&self.pp_sym(*sym));
        }
        sprod
    }

    /// Returns the string representation of `slot` e.g. `R : 'a' • S`.
    pub fn pp_slot(&self, slot: Slot<StorageT>) -> String {
        let mut s = format!("{} :", self.rule_name_str(slot.head(self)));
        let body = slot.body(self);
        for (i, sym) in body.iter().enumerate() {
            if i == slot.pos() {
                s.push_str(" •");
            }
            s.push(' ');
            s.push_str(&self.pp_sym(*sym));
        }
        if slot.pos() == body.len() {
            s.push_str(" •");
        }
        s
    }
}

#[cfg(test)]
mod test {
    use super::{Grammar, PIdx, RIdx, SIdx, Slot, Symbol, TIdx};
    use crate::GrammarErrorKind;

    #[test]
    fn test_minimal() {
        let grm = Grammar::new("%start R %token T %% R: 'T';").unwrap();
        assert_eq!(grm.start_rule_idx(), RIdx(0));
        assert_eq!(grm.rule_idx("R").unwrap(), RIdx(0));
        assert_eq!(grm.token_idx("T").unwrap(), TIdx(0));
        assert_eq!(grm.prod(PIdx(0)), &[Symbol::Token(TIdx(0))]);
        assert_eq!(grm.prods_len(), PIdx(1));
        assert_eq!(grm.rules_len(), RIdx(1));
        assert_eq!(grm.tokens_len(), TIdx(1));
    }

    #[test]
    fn test_rule_and_prod_ordering() {
        let grm = Grammar::new(
            "%start S
             %%
             A: 'a' | ;
             S: A 'b' A | 'c';
             A: 'd';",
        )
        .unwrap();
        let a = grm.rule_idx("A").unwrap();
        let s = grm.rule_idx("S").unwrap();
        assert_eq!(a, RIdx(0));
        assert_eq!(grm.start_rule_idx(), s);
        assert_eq!(grm.rule_to_prods(a), &[PIdx(0), PIdx(1), PIdx(4)]);
        assert_eq!(grm.rule_to_prods(s), &[PIdx(2), PIdx(3)]);
        assert_eq!(grm.prod_alternate(PIdx(4)), 2);
        assert_eq!(grm.prod_alternate(PIdx(3)), 1);
        assert_eq!(grm.prod_len(PIdx(1)), SIdx(0));
        assert_eq!(grm.prod_to_rule(PIdx(2)), s);
        assert_eq!(
            grm.iter_tidxs().map(|t| grm.token_name(t)).collect::<Vec<_>>(),
            vec!["a", "b", "c", "d"]
        );
        assert_eq!(grm.iter_rules().count(), 2);
        assert_eq!(grm.iter_pidxs().count(), 5);
    }

    #[test]
    fn test_pp() {
        let grm = Grammar::new("%% S: A 'b' A; A: 'a';").unwrap();
        let p = grm.rule_to_prods(grm.start_rule_idx())[0];
        assert_eq!(grm.pp_prod(p), "S : A 'b' A");
        assert_eq!(grm.pp_slot(Slot::new(p, 0)), "S : • A 'b' A");
        assert_eq!(grm.pp_slot(Slot::new(p, 2)), "S : A 'b' • A");
        assert_eq!(grm.pp_slot(Slot::end(&grm, p)), "S : A 'b' A •");
        assert_eq!(grm.pp_symbols(&grm.prod(p)[..2]), "A 'b'");
        assert_eq!(grm.pp_symbols(&[]), "");
    }

    #[test]
    fn test_pp_empty_prod() {
        let grm = Grammar::new("%% S: ;").unwrap();
        let p = PIdx(0);
        assert_eq!(grm.pp_prod(p), "S :");
        assert_eq!(grm.pp_slot(Slot::end(&grm, p)), "S : •");
    }

    #[test]
    fn test_tokens_map() {
        let grm = Grammar::new("%token x %% S: x 'y';").unwrap();
        let m = grm.tokens_map();
        assert_eq!(m.len(), 2);
        assert_eq!(m["x"], TIdx(0));
        assert_eq!(m["y"], TIdx(1));
    }

    #[test]
    fn test_small_storaget() {
        let grm = Grammar::<u8>::new_with_storaget("%% S: 'a' S | ;").unwrap();
        assert_eq!(usize::from(grm.prods_len()), 2);
        assert_eq!(grm.prod(PIdx(0u8)), &[Symbol::Token(TIdx(0u8)), Symbol::Rule(RIdx(0u8))]);
    }

    #[test]
    fn test_validation_errors() {
        let errs = Grammar::new("%start X %% S: T;").unwrap_err();
        let kinds = errs.into_iter().map(|e| e.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                GrammarErrorKind::InvalidStartRule("X".to_string()),
                GrammarErrorKind::UnknownRuleRef("T".to_string())
            ]
        );
    }
}
