//! The in-memory HSM document model.
//!
//! A [`Document`] exclusively owns its [`StateMachine`]s; a state machine
//! owns one node tree rooted in a [`NodeKind::StateMachine`] node plus an
//! edge list. Ownership is strictly tree-shaped, so deep copy is `Clone`
//! and drop releases every entity exactly once. Cross-references (edge
//! endpoints, submachine links) are identifier strings resolved on
//! demand.

mod action;
mod edge;
mod node;

pub use action::{Action, ActionKind, actions_equal};
pub use edge::{CommentSubject, CommentSubjectKind, Edge, EdgeKind};
pub use node::{CommentData, Link, Node, NodeKind, NodeKindMask};

use std::fmt;

use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::{GeometryFormats, Rect};
use crate::meta::Metadata;

/// One state machine: a node tree and an edge list.
#[derive(Clone, Debug, PartialEq)]
pub struct StateMachine {
    /// The tree root; always of kind [`NodeKind::StateMachine`].
    pub root: Node,
    pub edges: Vec<Edge>,
}

impl StateMachine {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root: Node::with_kind(root_id, NodeKind::StateMachine),
            edges: Vec::new(),
        }
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.root.find_by_id(id)
    }

    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.root.find_by_id_mut(id)
    }

    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Append a transition edge, rejecting duplicate non-empty ids.
    pub fn add_edge(
        &mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        external: bool,
    ) -> Result<&mut Edge> {
        let id = id.into();
        if !id.is_empty() && self.find_edge(&id).is_some() {
            warn!(edge = %id, "edge id already exists in the state machine");
            return Err(CyberiadaError::format(format!(
                "duplicate edge id {id}"
            )));
        }
        self.edges.push(Edge::new(id, source, target, external));
        Ok(self.edges.last_mut().unwrap())
    }

    /// Vertex and edge counts, optionally skipping comments. The root
    /// node itself is not counted.
    pub fn size(&self, ignore_comments: bool) -> (usize, usize) {
        let vertices = self.root.descendant_count(ignore_comments);
        let edges = self
            .edges
            .iter()
            .filter(|e| !(ignore_comments && e.kind == EdgeKind::CommentEdge))
            .count();
        (vertices, edges)
    }

    /// Incoming and outgoing edge counts of the node with the given id.
    pub fn degrees(&self, node_id: &str) -> (usize, usize) {
        let mut incoming = 0;
        let mut outgoing = 0;
        for edge in &self.edges {
            if edge.source == node_id {
                outgoing += 1;
            }
            if edge.target == node_id {
                incoming += 1;
            }
        }
        (incoming, outgoing)
    }
}

/// A complete GraphML document: metadata plus one or more state machines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// Document format tag, e.g. `Cyberiada-GraphML-1.0`.
    pub format: Option<String>,
    pub meta: Option<Metadata>,
    pub state_machines: Vec<StateMachine>,
    pub bounding_rect: Option<Rect>,
    /// Conventions the stored geometry is currently expressed in.
    pub formats: GeometryFormats,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node by id anywhere in the document.
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.state_machines.iter().find_map(|sm| sm.find_node(id))
    }

    /// True when any node or edge carries a geometry object.
    pub fn has_geometry(&self) -> bool {
        if self.bounding_rect.is_some() {
            return true;
        }
        for sm in &self.state_machines {
            let mut found = false;
            sm.root.visit(&mut |node| {
                found |= node.geometry.is_some();
            });
            if found {
                return true;
            }
            if sm.edges.iter().any(|e| {
                e.polyline.is_some()
                    || e.source_point.is_some()
                    || e.target_point.is_some()
                    || e.label.is_some()
            }) {
                return true;
            }
        }
        false
    }

    /// Erase every geometry object in the document.
    pub fn clean_geometry(&mut self) {
        self.bounding_rect = None;
        for sm in &mut self.state_machines {
            sm.root.visit_mut(&mut |node| node.geometry = None);
            for edge in &mut sm.edges {
                edge.polyline = None;
                edge.source_point = None;
                edge.target_point = None;
                edge.label = None;
            }
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Document [{}]",
            self.format.as_deref().unwrap_or("untagged")
        )?;
        for sm in &self.state_machines {
            sm.root.dump(f, 1)?;
            for edge in &sm.edges {
                writeln!(f, "  {edge}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{NodeGeometry, Point};

    #[test]
    fn add_edge_rejects_duplicate_id() {
        let mut sm = StateMachine::new("g0");
        sm.add_edge("e1", "a", "b", false).unwrap();
        assert!(sm.add_edge("e1", "b", "c", false).is_err());
        // empty ids are allowed to repeat until reconstruction names them
        sm.add_edge("", "a", "c", false).unwrap();
        sm.add_edge("", "c", "a", false).unwrap();
        assert_eq!(sm.edges.len(), 3);
    }

    #[test]
    fn degrees_count_both_directions() {
        let mut sm = StateMachine::new("g0");
        sm.add_edge("e1", "a", "b", false).unwrap();
        sm.add_edge("e2", "b", "a", false).unwrap();
        sm.add_edge("e3", "a", "c", false).unwrap();
        assert_eq!(sm.degrees("a"), (1, 2));
        assert_eq!(sm.degrees("c"), (1, 0));
    }

    #[test]
    fn clean_geometry_erases_everything() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut node = Node::with_kind("i1", NodeKind::Initial);
        node.geometry = Some(NodeGeometry::Point(Point::new(1.0, 2.0)));
        sm.root.children.push(node);
        let edge = sm.add_edge("e1", "i1", "s1", false).unwrap();
        edge.source_point = Some(Point::new(0.0, 0.0));
        doc.state_machines.push(sm);
        assert!(doc.has_geometry());

        doc.clean_geometry();
        assert!(!doc.has_geometry());
    }
}
