use std::{fmt::Debug, hash::Hash};

use gllgrammar::{Grammar, PIdx, RIdx, Symbol, TIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    bsr::{BsrError, Derivation, Set},
    lex_api::{Lexeme, NonStreamingLexer},
};

/// A generic parse tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node<LexemeT, StorageT> {
    /// Terminals store a single lexeme.
    Term { lexeme: LexemeT },
    /// Nonterminals reference a rule, the production used, and have zero or more `Node`s as
    /// children.
    Nonterm {
        ridx: RIdx<StorageT>,
        pidx: PIdx<StorageT>,
        nodes: Vec<Node<LexemeT, StorageT>>,
    },
}

impl<LexemeT: Lexeme<StorageT>, StorageT: 'static + Debug + Hash + PrimInt + Unsigned> Node<LexemeT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return a pretty-printed version of this node.
    pub fn pp<LexerT: NonStreamingLexer<StorageT>>(&self, grm: &Grammar<StorageT>, lexer: &LexerT) -> String {
        let mut st = vec![(0, self)]; // Stack of (indent level, node) pairs
        let mut s = String::new();
        while let Some((indent, e)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            match *e {
                Node::Term { lexeme } => {
                    let tn = grm.token_name(TIdx(lexeme.tok_id()));
                    let lt = lexer.span_str(lexeme.span());
                    s.push_str(&format!("{} {}\n", tn, lt));
                }
                Node::Nonterm { ridx, ref nodes, .. } => {
                    s.push_str(&format!("{}\n", grm.rule_name_str(ridx)));
                    for x in nodes.iter().rev() {
                        st.push((indent + 1, x));
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
    /// The parse tree under the sole root. Fails if there is not exactly one parse tree.
    pub fn parse_tree(&self) -> Result<Node<LexerT::LexemeT, StorageT>, BsrError<StorageT>> {
        let root = self.get_root()?;
        self.tree_of(&root)
    }

    /// The parse tree under `d`. Fails if there is not exactly one parse tree.
    pub fn tree_of(&self, d: &Derivation<StorageT>) -> Result<Node<LexerT::LexemeT, StorageT>, BsrError<StorageT>> {
        let grm = self.grammar();
        // Stack of (derivation, next body position, children built so far) triples.
        let mut st = vec![(*d, 0, Vec::with_capacity(d.slot().body(grm).len()))];
        while let Some((cur, i, mut nodes)) = st.pop() {
            match cur.slot().body(grm).get(i) {
                Some(Symbol::Token(_)) => {
                    nodes.push(Node::Term {
                        lexeme: self.terminal_at(&cur, i)?,
                    });
                    st.push((cur, i + 1, nodes));
                }
                Some(Symbol::Rule(_)) => {
                    let c = self.nt_child_at(&cur, i)?;
                    st.push((cur, i + 1, nodes));
                    st.push((c, 0, Vec::with_capacity(c.slot().body(grm).len())));
                }
                None => {
                    let n = Node::Nonterm {
                        ridx: cur.head(grm),
                        pidx: cur.slot().pidx(),
                        nodes,
                    };
                    match st.last_mut() {
                        Some((_, _, parent)) => parent.push(n),
                        None => return Ok(n),
                    }
                }
            }
        }
        unreachable!()
    }
}
