//! Shared packed parse forests built from a [Set].
//!
//! A forest is an arena of [ForestNode]s addressed by [NodeIdx]. Every node is identified by its
//! key (symbol or slot, plus extents), so building the same key twice yields the same node: the
//! forest is a DAG whose size is bounded by the number of distinct extents, not the number of
//! parse trees.

use std::{collections::VecDeque, fmt::Debug, hash::Hash, iter};

use fnv::FnvHashMap;
use gllgrammar::{Grammar, RIdx, Slot, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{
    bsr::{BsrError, Set},
    lex_api::NonStreamingLexer,
};

/// The index of a node in a [Forest].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeIdx(pub usize);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum NodeKey<StorageT> {
    Symbol(Option<Symbol<StorageT>>, usize, usize),
    Intermediate(Slot<StorageT>, usize, usize),
    Packed(Slot<StorageT>, usize, usize, usize),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ForestNode<StorageT> {
    /// `sym` derives `[left, right)`. `sym` is `None` for the empty string. Only nonterminals have
    /// packed children, one per derivation.
    Symbol {
        sym: Option<Symbol<StorageT>>,
        left: usize,
        right: usize,
        packed: Vec<NodeIdx>,
    },
    /// The symbols before `slot`'s position derive `[left, right)`.
    Intermediate {
        slot: Slot<StorageT>,
        left: usize,
        right: usize,
        packed: Vec<NodeIdx>,
    },
    /// One way of deriving the symbols before `slot`'s position: `right_child` is the symbol
    /// immediately before the position over `[pivot, right)`; `left_child`, if there are earlier
    /// symbols, covers `[left, pivot)`.
    Packed {
        slot: Slot<StorageT>,
        left: usize,
        pivot: usize,
        right: usize,
        left_child: Option<NodeIdx>,
        right_child: NodeIdx,
    },
}

/// The order in which extendable nodes are expanded. This affects only node numbering, never the
/// shape of the forest.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WorkOrder {
    /// Last in, first out.
    #[default]
    Stack,
    /// First in, first out.
    Queue,
}

#[derive(Clone, Debug)]
pub struct Forest<StorageT> {
    nodes: Vec<ForestNode<StorageT>>,
    keys: FnvHashMap<NodeKey<StorageT>, NodeIdx>,
    root: NodeIdx,
}

impl<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> Forest<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// The symbol node the forest was built from.
    pub fn root(&self) -> NodeIdx {
        self.root
    }

    pub fn node(&self, idx: NodeIdx) -> &ForestNode<StorageT> {
        &self.nodes[idx.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &ForestNode<StorageT>)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIdx(i), n))
    }

    /// The packed children of a symbol or intermediate node, or the (left, if any, then right)
    /// children of a packed node.
    pub fn children(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        match self.node(idx) {
            ForestNode::Symbol { packed, .. } | ForestNode::Intermediate { packed, .. } => packed.clone(),
            ForestNode::Packed {
                left_child,
                right_child,
                ..
            } => left_child.iter().copied().chain(iter::once(*right_child)).collect(),
        }
    }

    /// The symbol and intermediate nodes with more than one packed child.
    pub fn ambiguities(&self) -> Vec<NodeIdx> {
        self.iter()
            .filter(|(_, n)| match n {
                ForestNode::Symbol { packed, .. } | ForestNode::Intermediate { packed, .. } => packed.len() > 1,
                ForestNode::Packed { .. } => false,
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguities().is_empty()
    }

    /// The symbol node for `sym` (`None` for the empty string) over `[left, right)`.
    pub fn find_symbol(&self, sym: Option<Symbol<StorageT>>, left: usize, right: usize) -> Option<NodeIdx> {
        self.keys.get(&NodeKey::Symbol(sym, left, right)).copied()
    }

    pub fn find_intermediate(&self, slot: Slot<StorageT>, left: usize, right: usize) -> Option<NodeIdx> {
        self.keys.get(&NodeKey::Intermediate(slot, left, right)).copied()
    }

    pub fn find_packed(&self, slot: Slot<StorageT>, left: usize, pivot: usize, right: usize) -> Option<NodeIdx> {
        self.keys
            .get(&NodeKey::Packed(slot, left, pivot, right))
            .copied()
    }

    /// Return a pretty-printed version of the forest, one node per line, children indented below
    /// their parent. A node reachable along more than one path has its children printed only the
    /// first time it is encountered.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut seen = Vob::from_elem(false, self.nodes.len());
        let mut st = vec![(0, self.root)]; // Stack of (indent level, node) pairs
        let mut s = String::new();
        while let Some((indent, idx)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            s.push_str(&self.pp_node(grm, idx));
            let children = self.children(idx);
            if seen.get(idx.0) == Some(true) && !children.is_empty() {
                s.push_str(" ...\n");
                continue;
            }
            seen.set(idx.0, true);
            s.push('\n');
            for c in children.into_iter().rev() {
                st.push((indent + 1, c));
            }
        }
        s
    }

    fn pp_node(&self, grm: &Grammar<StorageT>, idx: NodeIdx) -> String {
        match self.node(idx) {
            ForestNode::Symbol {
                sym: Some(sym),
                left,
                right,
                ..
            } => format!("{},{},{}", grm.pp_sym(*sym), left, right),
            ForestNode::Symbol {
                sym: None,
                left,
                right,
                ..
            } => format!("ℇ,{},{}", left, right),
            ForestNode::Intermediate {
                slot, left, right, ..
            } => format!("{},{},{}", grm.pp_slot(*slot), left, right),
            ForestNode::Packed {
                slot,
                left,
                pivot,
                right,
                ..
            } => format!("{},{},{},{}", grm.pp_slot(*slot), left, pivot, right),
        }
    }
}

/// Build a [Forest] from a [Set].
///
/// ```rust,ignore
/// let forest = ForestBuilder::new(&set).worklist(WorkOrder::Queue).build()?;
/// ```
pub struct ForestBuilder<'a, StorageT, LexerT> {
    set: &'a Set<'a, StorageT, LexerT>,
    order: WorkOrder,
}

impl<'a, StorageT, LexerT> ForestBuilder<'a, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    pub fn new(set: &'a Set<'a, StorageT, LexerT>) -> Self {
        ForestBuilder {
            set,
            order: WorkOrder::default(),
        }
    }

    /// Set the order in which extendable nodes are expanded. Defaults to [WorkOrder::Stack].
    pub fn worklist(mut self, order: WorkOrder) -> Self {
        self.order = order;
        self
    }

    /// Build the forest of the set's start rule over the whole parsed input. Fails with
    /// `AmbiguousParse` (with no roots) if nothing derives it.
    pub fn build(&self) -> Result<Forest<StorageT>, BsrError<StorageT>> {
        if self.set.roots().is_empty() {
            return Err(BsrError::AmbiguousParse {
                start: self.set.start(),
                roots: Vec::new(),
            });
        }
        Ok(self.build_from(self.set.start(), 0, self.set.right_extent()))
    }

    /// Build the forest of `nt` over `[left, right)`. If `nt` has no derivations over that extent,
    /// the forest consists only of its root.
    pub fn build_from(&self, nt: RIdx<StorageT>, left: usize, right: usize) -> Forest<StorageT> {
        let mut b = Build {
            set: self.set,
            order: self.order,
            nodes: Vec::new(),
            keys: FnvHashMap::default(),
            todo: VecDeque::new(),
        };
        let root = b.symbol(Some(Symbol::Rule(nt)), left, right);
        b.run();
        Forest {
            nodes: b.nodes,
            keys: b.keys,
            root,
        }
    }
}

/// The state of a single forest construction.
struct Build<'a, StorageT, LexerT> {
    set: &'a Set<'a, StorageT, LexerT>,
    order: WorkOrder,
    nodes: Vec<ForestNode<StorageT>>,
    keys: FnvHashMap<NodeKey<StorageT>, NodeIdx>,
    /// Registered nodes whose packed children are yet to be added.
    todo: VecDeque<(NodeIdx, NodeKey<StorageT>)>,
}

impl<StorageT, LexerT> Build<'_, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    fn run(&mut self) {
        let set = self.set;
        loop {
            let next = match self.order {
                WorkOrder::Stack => self.todo.pop_back(),
                WorkOrder::Queue => self.todo.pop_front(),
            };
            let Some((idx, key)) = next else { break };
            let new_packed = match key {
                NodeKey::Symbol(Some(Symbol::Rule(ridx)), left, right) => set
                    .lookup_children(ridx, left, right)
                    .iter()
                    .map(|d| self.packed(d.slot(), d.left_extent(), d.pivot(), d.right_extent()))
                    .collect::<Vec<_>>(),
                NodeKey::Intermediate(slot, left, right) => set
                    .partials_for(slot.prefix(set.grammar()), left, right)
                    .iter()
                    .map(|s| self.packed(slot, s.left_extent(), s.pivot(), s.right_extent()))
                    .collect::<Vec<_>>(),
                NodeKey::Symbol(..) | NodeKey::Packed(..) => continue,
            };
            match &mut self.nodes[idx.0] {
                ForestNode::Symbol { packed, .. } | ForestNode::Intermediate { packed, .. } => {
                    packed.extend(new_packed)
                }
                ForestNode::Packed { .. } => (),
            }
        }
    }

    fn register(&mut self, key: NodeKey<StorageT>, node: ForestNode<StorageT>) -> NodeIdx {
        let idx = NodeIdx(self.nodes.len());
        self.nodes.push(node);
        self.keys.insert(key, idx);
        idx
    }

    fn symbol(&mut self, sym: Option<Symbol<StorageT>>, left: usize, right: usize) -> NodeIdx {
        let key = NodeKey::Symbol(sym, left, right);
        if let Some(idx) = self.keys.get(&key) {
            return *idx;
        }
        let idx = self.register(
            key,
            ForestNode::Symbol {
                sym,
                left,
                right,
                packed: Vec::new(),
            },
        );
        if let Some(Symbol::Rule(_)) = sym {
            self.todo.push_back((idx, key));
        }
        idx
    }

    /// Intermediate nodes are only made for prefixes of length 2 or more, whose splits the set
    /// stores.
    fn intermediate(&mut self, slot: Slot<StorageT>, left: usize, right: usize) -> NodeIdx {
        let key = NodeKey::Intermediate(slot, left, right);
        if let Some(idx) = self.keys.get(&key) {
            return *idx;
        }
        let idx = self.register(
            key,
            ForestNode::Intermediate {
                slot,
                left,
                right,
                packed: Vec::new(),
            },
        );
        self.todo.push_back((idx, key));
        idx
    }

    fn packed(&mut self, slot: Slot<StorageT>, left: usize, pivot: usize, right: usize) -> NodeIdx {
        let key = NodeKey::Packed(slot, left, pivot, right);
        if let Some(idx) = self.keys.get(&key) {
            return *idx;
        }
        let body = slot.body(self.set.grammar());
        let pos = slot.pos();
        let right_child = match pos {
            0 => self.symbol(None, left, left),
            _ => self.symbol(Some(body[pos - 1]), pivot, right),
        };
        let left_child = match (pos, slot.pred()) {
            (2, _) => Some(self.symbol(Some(body[0]), left, pivot)),
            (3.., Some(pred)) => Some(self.intermediate(pred, left, pivot)),
            _ => None,
        };
        self.register(
            key,
            ForestNode::Packed {
                slot,
                left,
                pivot,
                right,
                left_child,
                right_child,
            },
        )
    }
}

impl<StorageT, LexerT> Set<'_, StorageT, LexerT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    LexerT: NonStreamingLexer<StorageT>,
{
    /// Build the forest of this set with the default [ForestBuilder] settings.
    pub fn to_forest(&self) -> Result<Forest<StorageT>, BsrError<StorageT>> {
        ForestBuilder::new(self).build()
    }
}
