//! Edges: transitions and comment links.

use std::fmt;

use crate::geometry::{LabelGeometry, Point, Polyline};
use crate::model::action::Action;

/// The closed set of edge kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    #[default]
    LocalTransition,
    ExternalTransition,
    /// Links a comment node to its subject.
    CommentEdge,
}

/// What part of the target a comment edge annotates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommentSubjectKind {
    /// The whole node.
    #[default]
    Node,
    /// A fragment of the node's title.
    NameFragment,
    /// A fragment of the node's data text.
    DataFragment,
}

/// Subject descriptor carried by comment edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentSubject {
    pub kind: CommentSubjectKind,
    pub fragment: Option<String>,
}

impl CommentSubject {
    pub fn new(kind: CommentSubjectKind) -> Self {
        Self { kind, fragment: None }
    }
}

/// A directed edge between two nodes of the same state machine.
///
/// `source`/`target` are node identifiers; the reconstruction pass
/// guarantees they resolve inside the owning machine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Edge {
    pub id: String,
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    /// At most one action per transition.
    pub action: Option<Action>,
    pub comment_subject: Option<CommentSubject>,
    pub polyline: Option<Polyline>,
    pub source_point: Option<Point>,
    pub target_point: Option<Point>,
    pub label: Option<LabelGeometry>,
    pub color: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        external: bool,
    ) -> Self {
        Self {
            id: id.into(),
            kind: if external {
                EdgeKind::ExternalTransition
            } else {
                EdgeKind::LocalTransition
            },
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} \"{}\": {} -> {}",
            self.kind, self.id, self.source, self.target
        )?;
        if let Some(action) = &self.action {
            write!(
                f,
                " on \"{}\" [{}] / \"{}\"",
                action.trigger, action.guard, action.behavior
            )?;
        }
        Ok(())
    }
}
