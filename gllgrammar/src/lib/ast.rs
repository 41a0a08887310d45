use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::{
    parser::{GrammarError, GrammarErrorKind},
    Span,
};

/// An AST representing a grammar. This is built up gradually by the parser: when it is finished,
/// `complete_and_validate` must be called exactly once in order to check that it describes a
/// usable grammar.
#[derive(Debug)]
pub struct GrammarAST {
    pub start: Option<(String, Span)>,
    // Using an IndexMap means that we retain the order of rules as they're found in the input.
    pub rules: IndexMap<String, Rule>,
    pub prods: Vec<Production>,
    pub tokens: IndexSet<String>,
    /// The span of each entry in `tokens`, in the same order.
    pub spans: Vec<Span>,
}

#[derive(Debug)]
pub struct Rule {
    pub name: (String, Span),
    /// Indexes into `GrammarAST::prods`.
    pub pidxs: Vec<usize>,
}

#[derive(Debug, Eq, PartialEq)]
pub struct Production {
    pub symbols: Vec<Symbol>,
}

#[derive(Clone, Debug)]
pub enum Symbol {
    Rule(String, Span),
    Token(String, Span),
}

/// Symbols compare by kind and name only: where they appear in the input is irrelevant.
impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool {
        match (self, other) {
            (Symbol::Rule(x, _), Symbol::Rule(y, _)) => x == y,
            (Symbol::Token(x, _), Symbol::Token(y, _)) => x == y,
            _ => false,
        }
    }
}

impl Eq for Symbol {}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Rule(s, _) => write!(f, "{}", s),
            Symbol::Token(s, _) => write!(f, "'{}'", s),
        }
    }
}

impl GrammarAST {
    pub fn new() -> GrammarAST {
        GrammarAST {
            start: None,
            rules: IndexMap::new(),
            prods: Vec::new(),
            tokens: IndexSet::new(),
            spans: Vec::new(),
        }
    }

    pub fn add_rule(&mut self, name: (String, Span)) {
        self.rules.insert(
            name.0.clone(),
            Rule {
                name,
                pidxs: Vec::new(),
            },
        );
    }

    /// Add a production to the (already added) rule `rule_name`.
    pub fn add_prod(&mut self, rule_name: &str, symbols: Vec<Symbol>) {
        let pidx = self.prods.len();
        self.rules[rule_name].pidxs.push(pidx);
        self.prods.push(Production { symbols });
    }

    /// Record `name` as a token, returning `true` if it had not been seen before.
    pub fn add_token(&mut self, name: String, span: Span) -> bool {
        if self.tokens.insert(name) {
            self.spans.push(span);
            true
        } else {
            false
        }
    }

    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn has_token(&self, name: &str) -> bool {
        self.tokens.contains(name)
    }

    /// After the AST has been populated, check that:
    ///   1) there is a start rule and it references a rule in the grammar;
    ///   2) every rule reference references a rule in the grammar.
    ///
    /// Every problem found is reported, not just the first.
    pub(crate) fn complete_and_validate(&mut self) -> Result<(), Vec<GrammarError>> {
        let mut errs = Vec::new();
        match self.start {
            None => errs.push(GrammarError {
                kind: GrammarErrorKind::NoStartRule,
                span: Span::new(0, 0),
            }),
            Some((ref s, span)) => {
                if !self.rules.contains_key(s) {
                    errs.push(GrammarError {
                        kind: GrammarErrorKind::InvalidStartRule(s.clone()),
                        span,
                    });
                }
            }
        }
        for rule in self.rules.values() {
            for &pidx in &rule.pidxs {
                for sym in &self.prods[pidx].symbols {
                    if let Symbol::Rule(name, span) = sym {
                        if !self.rules.contains_key(name) {
                            errs.push(GrammarError {
                                kind: GrammarErrorKind::UnknownRuleRef(name.clone()),
                                span: *span,
                            });
                        }
                    }
                }
            }
        }
        if errs.is_empty() { Ok(()) } else { Err(errs) }
    }
}
