use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
    marker::PhantomData,
    slice::Iter,
};

use gllgrammar::{Grammar, NewlineCache, Span};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use regex::{self, Regex, RegexBuilder};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lex_api::{LexError, Lexeme, NonStreamingLexer};

/// A simple lexeme: a token ID and the span of input it covers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DefaultLexeme<StorageT = u32> {
    start: usize,
    len: usize,
    tok_id: StorageT,
}

impl<StorageT: Copy + fmt::Debug + Hash + Eq> Lexeme<StorageT> for DefaultLexeme<StorageT> {
    fn new(tok_id: StorageT, start: usize, len: usize) -> Self {
        DefaultLexeme { start, len, tok_id }
    }

    fn tok_id(&self) -> StorageT {
        self.tok_id
    }

    fn span(&self) -> Span {
        Span::new(self.start, self.start + self.len)
    }
}

impl<StorageT: Copy + fmt::Debug + Hash + Eq> fmt::Display for DefaultLexeme<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "DefaultLexeme[{}..{}]",
            self.span().start(),
            self.span().end()
        )
    }
}

/// Input that no rule matches (or that matches a named rule with no token ID).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Couldn't lex input starting at byte {}", .span.start())]
pub struct GllLexError {
    span: Span,
}

impl LexError for GllLexError {
    fn span(&self) -> Span {
        self.span
    }
}

pub struct Rule<StorageT> {
    /// If `Some`, the ID that lexemes created against this rule will be given. If `None`, then
    /// this rule specifies lexemes which should not appear in the user's input.
    pub tok_id: Option<StorageT>,
    /// This rule's name. If None, then text which matches this rule will be skipped (i.e. will not
    /// create a lexeme).
    pub name: Option<String>,
    pub re_str: String,
    pub re: Regex,
}

impl<StorageT> Rule<StorageT> {
    /// Create a new `Rule`. `re_str` is anchored to the start of the remaining input.
    pub fn new(
        tok_id: Option<StorageT>,
        name: Option<String>,
        re_str: String,
    ) -> Result<Rule<StorageT>, regex::Error> {
        let re = RegexBuilder::new(&format!("\\A(?:{})", &re_str))
            .multi_line(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(Rule {
            tok_id,
            name,
            re_str,
            re,
        })
    }
}

/// An ordered set of lexing rules from which one can produce a [GllLexer] for a given input.
pub struct LexerDef<StorageT> {
    rules: Vec<Rule<StorageT>>,
}

impl<StorageT: 'static + Copy + fmt::Debug + Eq + Hash + PrimInt + Unsigned> LexerDef<StorageT> {
    pub fn new(rules: Vec<Rule<StorageT>>) -> LexerDef<StorageT> {
        LexerDef { rules }
    }

    /// Create a lexer definition with one rule per token in `grm`, each matching the token's
    /// name literally, plus a rule which skips whitespace. Longer token names win over their
    /// prefixes, so `'if'` and `'i'` can coexist.
    pub fn from_grammar(grm: &Grammar<StorageT>) -> Result<LexerDef<StorageT>, regex::Error>
    where
        usize: AsPrimitive<StorageT>,
    {
        let mut rules = grm
            .iter_tidxs()
            .map(|tidx| {
                let name = grm.token_name(tidx);
                Rule::new(
                    Some(tidx.as_storaget()),
                    Some(name.to_string()),
                    regex::escape(name),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        rules.push(Rule::new(None, None, "[ \\t\\r\\n]+".to_string())?);
        Ok(LexerDef::new(rules))
    }

    /// Get the `Rule` at index `idx`.
    pub fn get_rule(&self, idx: usize) -> Option<&Rule<StorageT>> {
        self.rules.get(idx)
    }

    /// Get the `Rule` instance associated with a particular lexeme ID.
    pub fn get_rule_by_id(&self, tok_id: StorageT) -> Option<&Rule<StorageT>> {
        self.rules.iter().find(|r| r.tok_id == Some(tok_id))
    }

    /// Get the `Rule` instance associated with a particular name.
    pub fn get_rule_by_name(&self, n: &str) -> Option<&Rule<StorageT>> {
        self.rules.iter().find(|r| r.name.as_deref() == Some(n))
    }

    /// Set the id attribute on rules to the corresponding value in `map`, synchronising a
    /// grammar's notion of token IDs with the lexer's. Returns `(missing_from_lexer,
    /// missing_from_parser)`: the names referenced in `map` but not defined by any rule, and the
    /// names defined by rules but absent from `map`. Since in most cases both sets are expected to
    /// be empty, `None` is returned instead of an empty `HashSet`.
    ///
    /// Rules whose names are missing from `map` have their `tok_id` cleared, so lexing input
    /// they match is an error.
    pub fn set_rule_ids<'a>(
        &'a mut self,
        rule_ids_map: &HashMap<&'a str, StorageT>,
    ) -> (Option<HashSet<&'a str>>, Option<HashSet<&'a str>>) {
        for r in self.rules.iter_mut() {
            if let Some(n) = &r.name {
                r.tok_id = rule_ids_map.get(n.as_str()).copied();
            }
        }

        let defined = self
            .rules
            .iter()
            .filter_map(|r| r.name.as_deref())
            .collect::<HashSet<&str>>();
        let missing_from_parser = defined
            .iter()
            .filter(|n| !rule_ids_map.contains_key(*n))
            .copied()
            .collect::<HashSet<&str>>();
        let missing_from_lexer = rule_ids_map
            .keys()
            .filter(|n| !defined.contains(*n))
            .copied()
            .collect::<HashSet<&str>>();

        (
            Some(missing_from_lexer).filter(|s| !s.is_empty()),
            Some(missing_from_parser).filter(|s| !s.is_empty()),
        )
    }

    /// Returns an iterator over all rules in this definition.
    pub fn iter_rules(&self) -> Iter<Rule<StorageT>> {
        self.rules.iter()
    }

    /// Lex `s` against this definition. At each point in the input the longest match wins; if
    /// two rules match the same length, the earlier rule wins.
    pub fn lexer<'lexer, 'input: 'lexer>(
        &'lexer self,
        s: &'input str,
    ) -> Result<GllLexer<'lexer, 'input, StorageT>, GllLexError> {
        let mut lexemes = vec![];
        let mut i = 0;
        while i < s.len() {
            let mut longest = 0; // Length of the longest match
            let mut longest_ridx = 0; // This is only valid iff longest != 0
            for (ridx, r) in self.iter_rules().enumerate() {
                if let Some(m) = r.re.find(&s[i..]) {
                    let len = m.end();
                    if len > longest {
                        longest = len;
                        longest_ridx = ridx;
                    }
                }
            }
            if longest == 0 {
                return Err(GllLexError {
                    span: Span::new(i, i),
                });
            }
            let r = &self.rules[longest_ridx];
            if r.name.is_some() {
                match r.tok_id {
                    Some(tok_id) => lexemes.push(DefaultLexeme::new(tok_id, i, longest)),
                    None => {
                        return Err(GllLexError {
                            span: Span::new(i, i),
                        });
                    }
                }
            }
            i += longest;
        }

        let mut newlines = NewlineCache::new();
        newlines.feed(s);
        Ok(GllLexer {
            s,
            lexemes,
            newlines,
            phantom: PhantomData,
        })
    }
}

/// A lexer holds a reference to a string and the lexemes found in it.
pub struct GllLexer<'lexer, 'input: 'lexer, StorageT> {
    s: &'input str,
    lexemes: Vec<DefaultLexeme<StorageT>>,
    newlines: NewlineCache,
    phantom: PhantomData<&'lexer ()>,
}

impl<'lexer, 'input: 'lexer, StorageT: Copy + fmt::Debug + Hash + PrimInt + Unsigned>
    GllLexer<'lexer, 'input, StorageT>
{
    fn check_span(&self, span: Span) {
        if span.end() > self.s.len() {
            panic!(
                "Span {:?} exceeds known input length {}",
                span,
                self.s.len()
            );
        }
    }

    fn line_col_byte(&self, i: usize) -> (usize, usize) {
        match self.newlines.byte_to_line_col(self.s, i) {
            Some(lc) => lc,
            None => panic!("Offset {} is not a character boundary in the input", i),
        }
    }
}

impl<'lexer, 'input: 'lexer, StorageT: Copy + fmt::Debug + Hash + PrimInt + Unsigned>
    NonStreamingLexer<StorageT> for GllLexer<'lexer, 'input, StorageT>
{
    type LexemeT = DefaultLexeme<StorageT>;

    fn lexemes(&self) -> &[DefaultLexeme<StorageT>] {
        &self.lexemes
    }

    fn span_str(&self, span: Span) -> &str {
        self.check_span(span);
        &self.s[span.start()..span.end()]
    }

    fn span_lines_str(&self, span: Span) -> &str {
        self.check_span(span);
        let start_line = self.line_col_byte(span.start()).0;
        let end_line = self.line_col_byte(span.end()).0;
        // Both lines are known to exist since they were derived from in-bounds offsets.
        let st = self.newlines.line_to_byte(start_line).unwrap_or(0);
        let en = self
            .newlines
            .line_end_byte(end_line)
            .unwrap_or(self.s.len());
        &self.s[st..en]
    }

    fn line_col(&self, span: Span) -> ((usize, usize), (usize, usize)) {
        self.check_span(span);
        (
            self.line_col_byte(span.start()),
            self.line_col_byte(span.end()),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn def(rules: &[(Option<&str>, &str)]) -> LexerDef<u8> {
        let mut tok_id = 0;
        LexerDef::new(
            rules
                .iter()
                .map(|(n, re)| {
                    let id = n.map(|_| {
                        tok_id += 1;
                        tok_id - 1
                    });
                    Rule::new(id, n.map(|s| s.to_string()), re.to_string()).unwrap()
                })
                .collect(),
        )
    }

    #[test]
    fn test_basic() {
        let lexerdef = def(&[(Some("int"), "[0-9]+"), (Some("id"), "[a-zA-Z]+"), (None, "[ \\t]")]);
        let lexer = lexerdef.lexer("abc 123").unwrap();
        let lexemes = lexer.lexemes();
        assert_eq!(lexemes.len(), 2);
        assert_eq!(lexemes[0].tok_id(), 1u8);
        assert_eq!(lexemes[0].span(), Span::new(0, 3));
        assert_eq!(lexemes[1].tok_id(), 0);
        assert_eq!(lexemes[1].span(), Span::new(4, 7));
        assert_eq!(lexer.token_at(1), Some(lexemes[1]));
        assert_eq!(lexer.token_at(2), None);
    }

    #[test]
    fn test_basic_error() {
        let lexerdef = def(&[(Some("int"), "[0-9]+")]);
        match lexerdef.lexer("12abc") {
            Ok(_) => panic!("Invalid input lexed"),
            Err(e) => assert_eq!(e.span(), Span::new(2, 2)),
        }
    }

    #[test]
    fn test_longest_match() {
        let lexerdef = def(&[(Some("IF"), "if"), (Some("ID"), "[a-z]+"), (None, "[ ]")]);
        let lexer = lexerdef.lexer("iff if").unwrap();
        let lexemes = lexer.lexemes();
        assert_eq!(lexemes.len(), 2);
        assert_eq!(lexemes[0].tok_id(), 1);
        assert_eq!(lexemes[0].span().len(), 3);
        assert_eq!(lexemes[1].tok_id(), 0);
        assert_eq!(lexemes[1].span(), Span::new(4, 6));
    }

    #[test]
    fn test_multibyte() {
        let lexerdef = def(&[(Some("ID"), "[a❤]+"), (None, "[ ]")]);
        let lexer = lexerdef.lexer("a ❤ a").unwrap();
        let lexemes = lexer.lexemes();
        assert_eq!(lexemes.len(), 3);
        assert_eq!(lexer.span_str(lexemes[1].span()), "❤");
        assert_eq!(lexemes[2].span(), Span::new(6, 7));
        assert_eq!(lexer.line_col(lexemes[2].span()), ((1, 5), (1, 6)));
    }

    #[test]
    fn test_line_col_and_lines() {
        let lexerdef = def(&[(Some("ID"), "[a-z]+"), (None, "[ \\n]")]);
        let lexer = lexerdef.lexer("a b\n c\nd").unwrap();
        let lexemes = lexer.lexemes();
        assert_eq!(lexer.line_col(lexemes[2].span()), ((2, 2), (2, 3)));
        assert_eq!(lexer.line_column_of(3), (3, 1));
        // One past the last lexeme is the end of the input.
        assert_eq!(lexer.line_column_of(4), (3, 2));
        assert_eq!(lexer.span_lines_str(lexemes[2].span()), " c");
        assert_eq!(lexer.span_lines_str(lexemes[1].span().cover(lexemes[2].span())), "a b\n c");
    }

    #[test]
    fn test_source_text() {
        let lexerdef = def(&[(Some("ID"), "[a-z]+"), (None, "[ ]+")]);
        let lexer = lexerdef.lexer("ab  cd e").unwrap();
        assert_eq!(lexer.source_text(0, 2), "ab  cd");
        assert_eq!(lexer.source_text(1, 3), "cd e");
        assert_eq!(lexer.source_text(2, 2), "");
        assert_eq!(lexer.source_text(2, 9), "");
    }

    #[test]
    fn test_from_grammar() {
        let grm = Grammar::<u8>::new_with_storaget("%% S: 'i' 'if' S | ;").unwrap();
        let lexerdef = LexerDef::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("i if\n i").unwrap();
        let ids = lexer.lexemes().iter().map(|l| l.tok_id()).collect::<Vec<_>>();
        let i = grm.token_idx("i").unwrap().as_storaget();
        let iff = grm.token_idx("if").unwrap().as_storaget();
        assert_eq!(ids, vec![i, iff, i]);
        assert!(lexerdef.get_rule_by_id(iff).is_some());
        assert!(lexerdef.lexer("x").is_err());
    }

    #[test]
    fn test_set_rule_ids() {
        let mut lexerdef = def(&[(Some("a"), "a"), (Some("b"), "b"), (None, " ")]);
        let mut map = HashMap::new();
        map.insert("b", 0u8);
        map.insert("c", 1u8);
        let (missing_from_lexer, missing_from_parser) = lexerdef.set_rule_ids(&map);
        assert_eq!(missing_from_lexer, Some(["c"].into_iter().collect()));
        assert_eq!(missing_from_parser, Some(["a"].into_iter().collect()));
        assert_eq!(lexerdef.get_rule_by_name("b").unwrap().tok_id, Some(0));
        assert_eq!(lexerdef.get_rule_by_name("a").unwrap().tok_id, None);
        // 'a' is now known to the lexer but not the parser.
        assert!(lexerdef.lexer("a").is_err());
        assert_eq!(lexerdef.lexer("b b").unwrap().lexemes().len(), 2);
    }
}
