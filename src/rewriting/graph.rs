//! Hash-consed expression graph.
//!
//! Rewriting happens on an [`ExprGraph`]: every distinct subexpression
//! reachable from the root is stored exactly once under a [`NodeId`].
//! Replacing a node rebuilds only its ancestors, so unrelated nodes keep their
//! ids, and anything no longer reachable from the root is dropped.
//!
//! Every node also knows its parents. Children are always interned before
//! their parents, so a child's id is smaller than the id of any parent.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::EngineError;
use crate::language::expression::Expr;
use crate::seen::Seen;

pub type NodeId = usize;

#[derive(Clone, Debug)]
struct Node {
    expr: Expr,
    /// Positional arguments followed by keyword values
    children: Vec<NodeId>,
    parents: HashSet<NodeId>,
}

#[derive(Clone, Debug)]
pub struct ExprGraph {
    nodes: HashMap<NodeId, Node>,
    index: HashMap<Expr, NodeId>,
    next_id: NodeId,
    root: NodeId,
    validate: bool,
}

impl ExprGraph {
    pub fn from_expression(expr: Expr) -> Self {
        let mut graph = Self {
            nodes: HashMap::new(),
            index: HashMap::new(),
            next_id: 0,
            root: 0,
            validate: false,
        };
        graph.root = graph.intern(&expr).any();
        graph
    }

    /// Turns invariant checking after every replacement on or off.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    fn intern(&mut self, expr: &Expr) -> Seen<NodeId> {
        if let Some(&id) = self.index.get(expr) {
            return Seen::Old(id);
        }
        let children = expr
            .children()
            .map(|child| self.intern(child).any())
            .collect();
        let id = self.next_id;
        self.next_id += 1;
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parents.insert(id);
            }
        }
        self.index.insert(expr.clone(), id);
        self.nodes.insert(
            id,
            Node {
                expr: expr.clone(),
                children,
                parents: HashSet::new(),
            },
        );
        Seen::New(id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_expression(&self) -> &Expr {
        &self.nodes[&self.root].expr
    }

    /// A reference that follows the root across replacements.
    pub fn root_ref(&mut self) -> Reference<'_> {
        Reference {
            graph: self,
            cursor: Cursor::Root,
        }
    }

    pub fn reference(&mut self, node: NodeId) -> Reference<'_> {
        let cursor = if node == self.root {
            Cursor::Root
        } else {
            Cursor::Node(node)
        };
        Reference {
            graph: self,
            cursor,
        }
    }

    /// # Panics
    ///
    /// When the node is not in the graph.
    pub fn expression(&self, node: NodeId) -> &Expr {
        &self.nodes[&node].expr
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[&node].children
    }

    pub fn parents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[&node].parents.iter().copied()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn node_id(&self, expr: &Expr) -> Option<NodeId> {
        self.index.get(expr).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.keys().copied()
    }

    /// Nodes below `from` (inclusive) with every child before its parents.
    pub fn postorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(from, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for &child in self.nodes[&id].children.iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Nodes below `from` (inclusive), each before its children.
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.nodes[&id].children.iter().rev());
        }
        order
    }

    /// Nodes from which `target` is reachable, excluding `target` itself,
    /// children before parents.
    fn ancestors(&self, target: NodeId) -> Vec<NodeId> {
        let mut ancestors = HashSet::new();
        let mut stack = vec![target];
        while let Some(id) = stack.pop() {
            for &parent in &self.nodes[&id].parents {
                if ancestors.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        let mut ancestors: Vec<NodeId> = ancestors.into_iter().collect();
        ancestors.sort_unstable();
        ancestors
    }

    /// Replaces `target` by `replacement`, rebuilding its ancestors.
    ///
    /// # Returns
    ///
    /// The node holding `replacement`, [`Seen::Old`] when an equal expression
    /// was already in the graph.
    pub fn replace(&mut self, target: NodeId, replacement: Expr) -> Result<Seen<NodeId>, EngineError> {
        if !self.contains(target) {
            return Err(EngineError::GraphInvariantViolation(format!(
                "replacing missing node {target}"
            )));
        }

        let ancestors = self.ancestors(target);
        let seen = self.intern(&replacement);
        let new_id = seen.any();
        trace!(
            node = target,
            fresh = seen.is_new(),
            ancestors = ancestors.len(),
            from = %self.nodes[&target].expr,
            to = %replacement,
            "replacing node"
        );

        let mut rebuilt = HashMap::from([(target, new_id)]);
        for &id in &ancestors {
            let node = &self.nodes[&id];
            let Some(call) = node.expr.as_call() else {
                continue;
            };
            let children = node
                .children
                .iter()
                .map(|child| {
                    let child = rebuilt.get(child).copied().unwrap_or(*child);
                    self.nodes[&child].expr.clone()
                })
                .collect();
            let expr = Expr::from_call(call.with_children(children));
            let new_parent = self.intern(&expr).any();
            rebuilt.insert(id, new_parent);
        }
        self.root = rebuilt.get(&self.root).copied().unwrap_or(self.root);

        let mut candidates = ancestors;
        candidates.push(target);
        self.collect_garbage(candidates);
        if self.validate {
            self.validate()?;
        }
        Ok(seen)
    }

    /// Drops candidates without parents, and then whatever only they referenced.
    fn collect_garbage(&mut self, mut candidates: Vec<NodeId>) {
        while let Some(id) = candidates.pop() {
            let orphan = id != self.root
                && self.nodes.get(&id).is_some_and(|node| node.parents.is_empty());
            if !orphan {
                continue;
            }
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            self.index.remove(&node.expr);
            for child in node.children {
                if let Some(child_node) = self.nodes.get_mut(&child)
                    && child_node.parents.remove(&id)
                {
                    candidates.push(child);
                }
            }
        }
    }

    /// Checks that the graph is a hash-consed DAG of reachable nodes.
    pub fn validate(&self) -> Result<(), EngineError> {
        let violation = |message: String| Err(EngineError::GraphInvariantViolation(message));

        if !self.nodes.contains_key(&self.root) {
            return violation(format!("root {} is missing", self.root));
        }
        if self.index.len() != self.nodes.len() {
            return violation(format!(
                "{} index entries for {} nodes",
                self.index.len(),
                self.nodes.len()
            ));
        }
        for (&id, node) in &self.nodes {
            if self.index.get(&node.expr) != Some(&id) {
                return violation(format!("node {id} is not indexed under its expression"));
            }
            let expected: Vec<&Expr> = node.expr.children().collect();
            if expected.len() != node.children.len() {
                return violation(format!("node {id} has the wrong number of children"));
            }
            for (child, expr) in node.children.iter().zip(expected) {
                match self.nodes.get(child) {
                    Some(child_node) if child_node.expr != *expr => {
                        return violation(format!("child {child} of node {id} is stale"));
                    }
                    Some(child_node) if !child_node.parents.contains(&id) => {
                        return violation(format!("node {child} does not list its parent {id}"));
                    }
                    Some(_) => {}
                    None => return violation(format!("child {child} of node {id} is missing")),
                }
            }
            for parent in &node.parents {
                if !self.nodes.get(parent).is_some_and(|p| p.children.contains(&id)) {
                    return violation(format!("node {id} lists {parent}, which is not its parent"));
                }
            }
        }

        let order = self.postorder(self.root);
        if order.len() != self.nodes.len() {
            return violation(format!(
                "{} of {} nodes are unreachable",
                self.nodes.len() - order.len(),
                self.nodes.len()
            ));
        }
        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for id in &order {
            if self.nodes[id]
                .children
                .iter()
                .any(|child| position[child] >= position[id])
            {
                return violation(format!("cycle through node {id}"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    Root,
    Node(NodeId),
}

/// A cursor into an [`ExprGraph`], handed to strategies.
///
/// A reference at the root keeps pointing at the root when the root is
/// replaced; any other reference moves to the replacement node.
pub struct Reference<'g> {
    graph: &'g mut ExprGraph,
    cursor: Cursor,
}

impl Reference<'_> {
    pub fn node(&self) -> NodeId {
        match self.cursor {
            Cursor::Root => self.graph.root,
            Cursor::Node(id) => id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.node() == self.graph.root
    }

    pub fn expression(&self) -> &Expr {
        self.graph.expression(self.node())
    }

    pub fn graph(&self) -> &ExprGraph {
        &*self.graph
    }

    /// Structural hash of the expression at this reference.
    pub fn hash(&self) -> u64 {
        self.expression().hash_value()
    }

    /// Nodes a traversal visits from here: leaves first when at the root,
    /// otherwise parents before children.
    pub fn descendants(&self) -> Vec<NodeId> {
        if self.is_root() {
            self.graph.postorder(self.graph.root)
        } else {
            self.graph.preorder(self.node())
        }
    }

    /// A reference to another node of the same graph.
    pub fn at(&mut self, node: NodeId) -> Reference<'_> {
        self.graph.reference(node)
    }

    pub fn replace(&mut self, replacement: Expr) -> Result<(), EngineError> {
        let new_id = self.graph.replace(self.node(), replacement)?.any();
        if let Cursor::Node(_) = self.cursor {
            self.cursor = if new_id == self.graph.root {
                Cursor::Root
            } else {
                Cursor::Node(new_id)
            };
        }
        Ok(())
    }
}
