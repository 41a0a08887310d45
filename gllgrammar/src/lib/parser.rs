use lazy_static::lazy_static;
use regex::Regex;
use std::{error::Error, fmt};

use crate::{
    ast::{GrammarAST, Symbol},
    Span,
};

type GrammarResult<T> = Result<T, GrammarError>;

/// The various different possible grammar errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind {
    IllegalName,
    IllegalString,
    IncompleteRule,
    IncompleteComment,
    MissingColon,
    PrematureEnd,
    UnknownDeclaration,
    /// Contains the spans of all duplicate start declarations.
    DuplicateStartDeclaration(Vec<Span>),
    NoStartRule,
    InvalidStartRule(String),
    UnknownRuleRef(String),
}

/// Any error from parsing or validating a grammar returns an instance of this struct.
#[derive(Debug, PartialEq, Eq)]
pub struct GrammarError {
    pub kind: GrammarErrorKind,
    pub span: Span,
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for GrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            GrammarErrorKind::IllegalName => "Illegal name",
            GrammarErrorKind::IllegalString => "Illegal string",
            GrammarErrorKind::IncompleteRule => "Incomplete rule",
            GrammarErrorKind::IncompleteComment => "Incomplete comment",
            GrammarErrorKind::MissingColon => "Missing ':'",
            GrammarErrorKind::PrematureEnd => "File ends prematurely",
            GrammarErrorKind::UnknownDeclaration => "Unknown declaration",
            GrammarErrorKind::DuplicateStartDeclaration(_) => "Duplicated %start declaration",
            GrammarErrorKind::NoStartRule => "No start rule specified",
            GrammarErrorKind::InvalidStartRule(name) => {
                return write!(f, "Start rule '{}' does not appear in grammar", name);
            }
            GrammarErrorKind::UnknownRuleRef(name) => {
                return write!(f, "Unknown reference to rule '{}'", name);
            }
        };
        write!(f, "{}", s)
    }
}

lazy_static! {
    static ref RE_NAME: Regex = Regex::new(r"^[a-zA-Z_.][a-zA-Z0-9_.]*").unwrap();
    static ref RE_TOKEN: Regex =
        Regex::new("^(?:(\".+?\")|('.+?')|([a-zA-Z_][a-zA-Z_0-9]*))").unwrap();
}

/// A parser for Yacc-style grammars without actions or precedences:
///
/// ```text
/// %start S
/// %token x
/// %%
/// S: A x | ;
/// A: 'a';
/// ```
pub(crate) struct GrammarParser {
    src: String,
    ast: GrammarAST,
    duplicate_start_declarations: Option<(Span, Vec<Span>)>,
}

impl GrammarParser {
    pub(crate) fn new(src: String) -> GrammarParser {
        GrammarParser {
            src,
            ast: GrammarAST::new(),
            duplicate_start_declarations: None,
        }
    }

    /// Parse the whole input. `self.src` is indexed by *byte*: every index we pass around points
    /// to the beginning of a UTF-8 character.
    pub(crate) fn parse(&mut self) -> Result<usize, Vec<GrammarError>> {
        let mut errors = Vec::new();
        let r = self.parse_declarations(0);
        if let Some((orig_span, spans)) = &self.duplicate_start_declarations {
            errors.push(GrammarError {
                kind: GrammarErrorKind::DuplicateStartDeclaration(spans.clone()),
                span: *orig_span,
            });
        }
        let i = match r {
            Ok(i) => i,
            Err(e) => {
                errors.push(e);
                return Err(errors);
            }
        };
        match self.parse_rules(i) {
            Ok(i) if errors.is_empty() => Ok(i),
            Ok(_) => Err(errors),
            Err(e) => {
                errors.push(e);
                Err(errors)
            }
        }
    }

    pub(crate) fn ast(self) -> GrammarAST {
        self.ast
    }

    fn parse_declarations(&mut self, mut i: usize) -> GrammarResult<usize> {
        i = self.parse_ws(i)?;
        while i < self.src.len() {
            if self.lookahead_is("%%", i).is_some() {
                return Ok(i);
            }
            if let Some(j) = self.lookahead_is("%token", i) {
                i = self.parse_ws(j)?;
                while i < self.src.len() && self.lookahead_is("%", i).is_none() {
                    let (j, n, span) = self.parse_token(i)?;
                    self.ast.add_token(n, span);
                    i = self.parse_ws(j)?;
                }
                continue;
            }
            if let Some(j) = self.lookahead_is("%start", i) {
                i = self.parse_ws(j)?;
                let (j, n) = self.parse_name(i)?;
                let span = Span::new(i, j);
                if let Some((_, orig_span)) = self.ast.start {
                    self.duplicate_start_declarations
                        .get_or_insert_with(|| (orig_span, Vec::new()))
                        .1
                        .push(span);
                } else {
                    self.ast.start = Some((n, span));
                }
                i = self.parse_ws(j)?;
                continue;
            }
            return Err(self.mk_error(GrammarErrorKind::UnknownDeclaration, i));
        }
        Err(self.mk_error(GrammarErrorKind::PrematureEnd, i))
    }

    fn parse_rules(&mut self, mut i: usize) -> GrammarResult<usize> {
        // parse_declarations only returns successfully when the input is at '%%'.
        i += "%%".len();
        i = self.parse_ws(i)?;
        while i < self.src.len() {
            i = self.parse_rule(i)?;
            i = self.parse_ws(i)?;
        }
        Ok(i)
    }

    fn parse_rule(&mut self, mut i: usize) -> GrammarResult<usize> {
        let (j, rn) = self.parse_name(i)?;
        let span = Span::new(i, j);
        if self.ast.start.is_none() {
            self.ast.start = Some((rn.clone(), span));
        }
        if self.ast.get_rule(&rn).is_none() {
            self.ast.add_rule((rn.clone(), span));
        }
        i = self.parse_ws(j)?;
        match self.lookahead_is(":", i) {
            Some(j) => i = j,
            None => return Err(self.mk_error(GrammarErrorKind::MissingColon, i)),
        }
        let mut syms = Vec::new();
        i = self.parse_ws(i)?;
        while i < self.src.len() {
            if let Some(j) = self.lookahead_is("|", i) {
                self.ast.add_prod(&rn, syms);
                syms = Vec::new();
                i = self.parse_ws(j)?;
                continue;
            } else if let Some(j) = self.lookahead_is(";", i) {
                self.ast.add_prod(&rn, syms);
                return Ok(j);
            }

            let quoted = self.lookahead_is("'", i).is_some() || self.lookahead_is("\"", i).is_some();
            let (j, sym, span) = self.parse_token(i)?;
            if quoted {
                self.ast.add_token(sym.clone(), span);
                syms.push(Symbol::Token(sym, span));
            } else if self.ast.has_token(&sym) {
                syms.push(Symbol::Token(sym, span));
            } else {
                syms.push(Symbol::Rule(sym, span));
            }
            i = self.parse_ws(j)?;
        }
        Err(self.mk_error(GrammarErrorKind::IncompleteRule, i))
    }

    fn parse_name(&self, i: usize) -> GrammarResult<(usize, String)> {
        match RE_NAME.find(&self.src[i..]) {
            Some(m) => {
                debug_assert_eq!(m.start(), 0);
                Ok((i + m.end(), self.src[i..i + m.end()].to_string()))
            }
            None => Err(self.mk_error(GrammarErrorKind::IllegalName, i)),
        }
    }

    /// Parse a token name, which is either quoted (in which case the returned name and span
    /// exclude the quotes) or a bare name.
    fn parse_token(&self, i: usize) -> GrammarResult<(usize, String, Span)> {
        match RE_TOKEN.find(&self.src[i..]) {
            Some(m) => {
                debug_assert!(m.start() == 0 && m.end() > 0);
                if self.src[i..].starts_with(['"', '\'']) {
                    let start = i + 1;
                    let end = i + m.end() - 1;
                    Ok((
                        i + m.end(),
                        self.src[start..end].to_string(),
                        Span::new(start, end),
                    ))
                } else {
                    Ok((
                        i + m.end(),
                        self.src[i..i + m.end()].to_string(),
                        Span::new(i, i + m.end()),
                    ))
                }
            }
            None => Err(self.mk_error(GrammarErrorKind::IllegalString, i)),
        }
    }

    /// Skip whitespace and comments from `i` onwards.
    fn parse_ws(&self, mut i: usize) -> GrammarResult<usize> {
        while i < self.src.len() {
            let rest = &self.src[i..];
            if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
                i += c.len_utf8();
            } else if rest.starts_with("//") {
                i += rest.find('\n').map(|off| off + 1).unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(off) => i += 2 + off + 2,
                    None => return Err(self.mk_error(GrammarErrorKind::IncompleteComment, i)),
                }
            } else {
                break;
            }
        }
        Ok(i)
    }

    fn lookahead_is(&self, s: &'static str, i: usize) -> Option<usize> {
        if self.src[i..].starts_with(s) {
            Some(i + s.len())
        } else {
            None
        }
    }

    fn mk_error(&self, kind: GrammarErrorKind, off: usize) -> GrammarError {
        GrammarError {
            kind,
            span: Span::new(off, off),
        }
    }
}
