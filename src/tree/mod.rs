//! Arena-indexed statement tree
//!
//! The planner walks a generic statement tree produced by an external
//! parsing collaborator. Nodes live in a contiguous arena and reference each
//! other by index, so the planner can hold a node handle while mutating
//! sibling lists without fighting the borrow checker or an object graph.
//!
//! The tree is deliberately opaque to the rest of the crate: the planner only
//! needs structural recursion over a closed set of statement kinds plus the
//! three insertion primitives (insert-before, insert-after,
//! insert-as-first-child).

use crate::domain::TrapId;

/// Handle to a node in a [`StatementTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Label of one `switch` case arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseLabel {
    /// `case <code>:` keyed by an instruction byte.
    Code(u8),
    /// `default:`
    Default,
}

/// One `switch` case: label plus body block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCase {
    pub label: CaseLabel,
    pub body: NodeId,
}

/// Closed set of statement kinds the planner understands.
///
/// Compound kinds reference their nested bodies by node id; plain statement
/// lists exist only inside `Block` nodes (switch case bodies, catch bodies
/// and finalizers are all blocks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `{ ... }`
    Block,
    If {
        then_block: NodeId,
        else_block: Option<NodeId>,
    },
    /// Any loop form; only the body matters for trap placement.
    Loop { body: NodeId },
    Switch { cases: Vec<SwitchCase> },
    Try {
        body: NodeId,
        catches: Vec<NodeId>,
        finalizer: Option<NodeId>,
    },
    Return,
    Throw,
    Break,
    Continue,
    /// Expression statement. `call` is an opaque label the injected
    /// always-throws predicate may inspect; `constructor_delegation` marks a
    /// same-class constructor-delegation call, which must execute before any
    /// observable checkpoint.
    Expression {
        call: Option<String>,
        constructor_delegation: bool,
    },
    /// Checkpoint inserted by the planner.
    Trap(TrapId),
}

impl StatementKind {
    /// Plain expression statement without a call label.
    pub fn expr() -> Self {
        Self::Expression { call: None, constructor_delegation: false }
    }

    /// Expression statement calling the named routine.
    pub fn call(name: impl Into<String>) -> Self {
        Self::Expression { call: Some(name.into()), constructor_delegation: false }
    }

    /// Same-class constructor-delegation call.
    pub fn delegation() -> Self {
        Self::Expression { call: None, constructor_delegation: true }
    }
}

#[derive(Debug)]
struct Node {
    kind: StatementKind,
    parent: Option<NodeId>,
    /// Statement list; only populated for `Block` nodes.
    children: Vec<NodeId>,
}

/// Mutable statement tree backed by a contiguous node arena.
#[derive(Debug, Default)]
pub struct StatementTree {
    nodes: Vec<Node>,
}

impl StatementTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: StatementKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, parent, children: Vec::new() });
        id
    }

    /// Creates a detached block node. Compound statements adopt it via their
    /// kind fields; [`Self::push`] attaches statements into it.
    pub fn new_block(&mut self) -> NodeId {
        self.alloc(StatementKind::Block, None)
    }

    /// Appends a statement to a block and returns its handle.
    ///
    /// Compound kinds must reference blocks created beforehand; this call
    /// fixes up the parent pointers of those nested blocks.
    pub fn push(&mut self, block: NodeId, kind: StatementKind) -> NodeId {
        debug_assert!(matches!(self.nodes[block.0].kind, StatementKind::Block));
        let id = self.alloc(kind, Some(block));
        self.adopt_nested_blocks(id);
        self.nodes[block.0].children.push(id);
        id
    }

    /// Inserts a statement immediately before `anchor` in its parent block.
    pub fn insert_before(&mut self, anchor: NodeId, kind: StatementKind) -> NodeId {
        self.insert_relative(anchor, kind, 0)
    }

    /// Inserts a statement immediately after `anchor` in its parent block.
    pub fn insert_after(&mut self, anchor: NodeId, kind: StatementKind) -> NodeId {
        self.insert_relative(anchor, kind, 1)
    }

    /// Inserts a statement as the first child of a block.
    pub fn push_front_child(&mut self, block: NodeId, kind: StatementKind) -> NodeId {
        debug_assert!(matches!(self.nodes[block.0].kind, StatementKind::Block));
        let id = self.alloc(kind, Some(block));
        self.adopt_nested_blocks(id);
        self.nodes[block.0].children.insert(0, id);
        id
    }

    fn insert_relative(&mut self, anchor: NodeId, kind: StatementKind, offset: usize) -> NodeId {
        let parent = self.nodes[anchor.0]
            .parent
            .expect("insertion anchor must live inside a block");
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == anchor)
            .expect("anchor not found in its parent block");
        let id = self.alloc(kind, Some(parent));
        self.adopt_nested_blocks(id);
        self.nodes[parent.0].children.insert(pos + offset, id);
        id
    }

    /// Points the parent links of blocks referenced by a compound node at it.
    fn adopt_nested_blocks(&mut self, id: NodeId) {
        let blocks: Vec<NodeId> = match &self.nodes[id.0].kind {
            StatementKind::If { then_block, else_block } => {
                std::iter::once(*then_block).chain(*else_block).collect()
            }
            StatementKind::Loop { body } => vec![*body],
            StatementKind::Switch { cases } => cases.iter().map(|c| c.body).collect(),
            StatementKind::Try { body, catches, finalizer } => std::iter::once(*body)
                .chain(catches.iter().copied())
                .chain(*finalizer)
                .collect(),
            _ => Vec::new(),
        };
        for block in blocks {
            self.nodes[block.0].parent = Some(id);
        }
    }

    /// Prepends a case to a switch so it is consulted before any
    /// pre-existing dispatch logic.
    pub fn insert_switch_case_front(&mut self, switch: NodeId, case: SwitchCase) {
        self.nodes[case.body.0].parent = Some(switch);
        match &mut self.nodes[switch.0].kind {
            StatementKind::Switch { cases } => cases.insert(0, case),
            other => panic!("cannot insert a case into {other:?}"),
        }
    }

    pub fn kind(&self, id: NodeId) -> &StatementKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Statement list of a block node.
    pub fn statements(&self, block: NodeId) -> &[NodeId] {
        &self.nodes[block.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order listing of a block's statements, descending into nested
    /// bodies. Used by reporting to map traps back onto "source lines".
    pub fn flatten(&self, block: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.flatten_into(block, &mut out);
        out
    }

    fn flatten_into(&self, block: NodeId, out: &mut Vec<NodeId>) {
        for &stmt in self.statements(block) {
            out.push(stmt);
            match self.kind(stmt) {
                StatementKind::Block => self.flatten_into(stmt, out),
                StatementKind::If { then_block, else_block } => {
                    self.flatten_into(*then_block, out);
                    if let Some(e) = else_block {
                        self.flatten_into(*e, out);
                    }
                }
                StatementKind::Loop { body } => self.flatten_into(*body, out),
                StatementKind::Switch { cases } => {
                    for case in cases {
                        self.flatten_into(case.body, out);
                    }
                }
                StatementKind::Try { body, catches, finalizer } => {
                    self.flatten_into(*body, out);
                    for &c in catches {
                        self.flatten_into(c, out);
                    }
                    if let Some(f) = finalizer {
                        self.flatten_into(*f, out);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_statement_order() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        let a = t.push(body, StatementKind::expr());
        let b = t.push(body, StatementKind::Return);
        assert_eq!(t.statements(body), &[a, b]);
        assert_eq!(t.parent(a), Some(body));
    }

    #[test]
    fn insert_before_and_after_keep_order() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        let a = t.push(body, StatementKind::expr());
        let before = t.insert_before(a, StatementKind::Trap(TrapId(2)));
        let after = t.insert_after(a, StatementKind::Trap(TrapId(3)));
        assert_eq!(t.statements(body), &[before, a, after]);
    }

    #[test]
    fn nested_blocks_get_adopted() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        let then_block = t.new_block();
        let if_stmt = t.push(body, StatementKind::If { then_block, else_block: None });
        assert_eq!(t.parent(then_block), Some(if_stmt));
    }

    #[test]
    fn flatten_descends_into_compounds() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        let then_block = t.new_block();
        t.push(body, StatementKind::If { then_block, else_block: None });
        let inner = t.push(then_block, StatementKind::Return);
        let flat = t.flatten(body);
        assert!(flat.contains(&inner));
    }
}
