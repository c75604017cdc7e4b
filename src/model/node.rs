//! Nodes of the state-machine tree.

use std::fmt;
use std::ops::BitOr;

use crate::geometry::{NodeGeometry, Point, Rect};
use crate::model::action::Action;

/// The closed set of node kinds.
///
/// `StateMachine` marks the single root node of each state machine's
/// tree; it never appears deeper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    StateMachine,
    #[default]
    SimpleState,
    CompositeState,
    SubmachineState,
    Comment,
    FormalComment,
    Initial,
    Final,
    Choice,
    Terminate,
    EntryPoint,
    ExitPoint,
    ShallowHistory,
    DeepHistory,
    Fork,
    Join,
}

impl NodeKind {
    const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Comment kinds carry comment data instead of actions.
    pub fn is_comment(self) -> bool {
        matches!(self, NodeKind::Comment | NodeKind::FormalComment)
    }

    /// Kinds whose geometry is a point rather than a rectangle.
    pub fn has_point_geometry(self) -> bool {
        matches!(self, NodeKind::Initial | NodeKind::Final | NodeKind::Terminate)
    }

    /// Kinds whose geometry, when present, is a rectangle.
    pub fn has_rect_geometry(self) -> bool {
        matches!(
            self,
            NodeKind::StateMachine
                | NodeKind::SimpleState
                | NodeKind::CompositeState
                | NodeKind::SubmachineState
                | NodeKind::Choice
        )
    }

    pub fn is_pseudostate(self) -> bool {
        matches!(
            self,
            NodeKind::Initial
                | NodeKind::Choice
                | NodeKind::Terminate
                | NodeKind::EntryPoint
                | NodeKind::ExitPoint
                | NodeKind::ShallowHistory
                | NodeKind::DeepHistory
                | NodeKind::Fork
                | NodeKind::Join
        )
    }
}

impl BitOr for NodeKind {
    type Output = NodeKindMask;

    fn bitor(self, rhs: NodeKind) -> NodeKindMask {
        NodeKindMask::of(self) | NodeKindMask::of(rhs)
    }
}

/// A set of node kinds used by type-directed lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeKindMask(u32);

impl NodeKindMask {
    pub const fn of(kind: NodeKind) -> Self {
        Self(kind.bit())
    }

    pub fn contains(self, kind: NodeKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl BitOr for NodeKindMask {
    type Output = NodeKindMask;

    fn bitor(self, rhs: NodeKindMask) -> NodeKindMask {
        NodeKindMask(self.0 | rhs.0)
    }
}

impl BitOr<NodeKind> for NodeKindMask {
    type Output = NodeKindMask;

    fn bitor(self, rhs: NodeKind) -> NodeKindMask {
        NodeKindMask(self.0 | rhs.bit())
    }
}

impl From<NodeKind> for NodeKindMask {
    fn from(kind: NodeKind) -> Self {
        Self::of(kind)
    }
}

/// Free-text comment content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentData {
    pub body: Option<String>,
    pub markup: Option<String>,
}

/// A reference to another state machine, carried by submachine states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub r#ref: String,
}

impl Link {
    pub fn new(r#ref: impl Into<String>) -> Self {
        Self { r#ref: r#ref.into() }
    }
}

/// A vertex of the state-machine tree.
///
/// A node exclusively owns its children; parent and edge endpoint
/// references elsewhere in the model are identifier strings. Children
/// keep their document order through round-trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub title: Option<String>,
    /// Machine-readable title, reserved for formal annotations. Not
    /// serialized by either dialect.
    pub formal_title: Option<String>,
    pub actions: Vec<Action>,
    /// Present on comment and formal-comment nodes.
    pub comment_data: Option<CommentData>,
    /// Present on submachine states.
    pub link: Option<Link>,
    pub geometry: Option<NodeGeometry>,
    pub color: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn geometry_point(&self) -> Option<Point> {
        match self.geometry {
            Some(NodeGeometry::Point(p)) => Some(p),
            _ => None,
        }
    }

    pub fn geometry_rect(&self) -> Option<Rect> {
        match self.geometry {
            Some(NodeGeometry::Rect(r)) => Some(r),
            _ => None,
        }
    }

    /// Depth-first search through this node and its subtree, siblings
    /// before children.
    pub fn find_by_id(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }

    /// Mutable variant of [`find_by_id`](Self::find_by_id).
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_by_id_mut(id))
    }

    /// First node (in depth-first order) whose kind intersects the mask.
    pub fn find_by_kind(&self, mask: NodeKindMask) -> Option<&Node> {
        if mask.contains(self.kind) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_kind(mask))
    }

    /// Number of nodes in the subtree rooted here, excluding this node;
    /// comments are skipped when requested.
    pub fn descendant_count(&self, ignore_comments: bool) -> usize {
        let mut count = 0;
        for child in &self.children {
            if ignore_comments && child.kind.is_comment() {
                continue;
            }
            count += 1 + child.descendant_count(ignore_comments);
        }
        count
    }

    /// Visit this node and every descendant in depth-first order.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Visit this node and every descendant, mutably.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    pub(crate) fn dump(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let pad = "  ".repeat(level);
        writeln!(f, "{pad}{:?} \"{}\"", self.kind, self.id)?;
        if let Some(title) = &self.title {
            writeln!(f, "{pad}  title: \"{title}\"")?;
        }
        if let Some(link) = &self.link {
            writeln!(f, "{pad}  link: \"{}\"", link.r#ref)?;
        }
        for action in &self.actions {
            writeln!(
                f,
                "{pad}  action {} \"{}\" [{}] / \"{}\"",
                action.kind, action.trigger, action.guard, action.behavior
            )?;
        }
        if let Some(data) = &self.comment_data {
            if let Some(body) = &data.body {
                writeln!(f, "{pad}  comment: \"{body}\"")?;
            }
        }
        for child in &self.children {
            child.dump(f, level + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(f, 0)
    }
}
