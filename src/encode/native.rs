//! Writer for the native Cyberiada-GraphML 1.0 dialect.

use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::{LabelGeometry, NodeGeometry, Point, Rect};
use crate::keys::{
    CYB_KEYS, FORMAT_CYBERIADA10, GRAPHML_NS, META_NODE_DEFAULT_ID, META_NODE_TITLE, VERTEX_KINDS,
};
use crate::meta::encode_meta;
use crate::model::{
    CommentData, CommentSubjectKind, Document, Edge, EdgeKind, Node, NodeKind, StateMachine,
};

use super::{XmlWriter, action_text, coord};

/// Serialize a document to native GraphML. The document is the
/// encoder's private copy; the metadata comment is synchronized in
/// place before writing.
pub(super) fn write(doc: &mut Document) -> Result<Vec<u8>> {
    if doc.format.is_none() {
        doc.format = Some(FORMAT_CYBERIADA10.to_string());
    }
    sync_meta_comment(doc)?;

    let mut w = XmlWriter::new();
    w.decl()?;
    w.start("graphml", &[("xmlns", GRAPHML_NS)])?;
    w.text_element("data", &[("key", "gFormat")], FORMAT_CYBERIADA10)?;

    for key in CYB_KEYS {
        let mut attrs = vec![
            ("id", key.id),
            ("for", key.for_element),
            ("attr.name", key.name),
        ];
        if let Some(attr_type) = key.attr_type {
            attrs.push(("attr.type", attr_type));
        }
        w.empty("key", &attrs)?;
    }

    for sm in &doc.state_machines {
        write_sm(&mut w, sm)?;
    }

    w.end("graphml")?;
    Ok(w.into_bytes())
}

/// Locate (or prepend) the `CGML_META` formal comment of the first
/// state machine and refresh its body from the metadata record.
fn sync_meta_comment(doc: &mut Document) -> Result<()> {
    let meta = doc.meta.clone().unwrap_or_default();
    let body = encode_meta(&meta);
    let Some(sm) = doc.state_machines.first_mut() else {
        warn!("at least one state machine is required");
        return Err(CyberiadaError::bad_parameter("document has no state machines"));
    };
    let root = &mut sm.root;
    let has_meta_comment = root.children.first().is_some_and(|node| {
        node.kind == NodeKind::FormalComment && node.title.as_deref() == Some(META_NODE_TITLE)
    });
    if has_meta_comment {
        let node = root.children.first_mut().unwrap();
        let data = node.comment_data.get_or_insert_with(CommentData::default);
        data.body = Some(body);
    } else {
        let mut node = Node::with_kind(META_NODE_DEFAULT_ID, NodeKind::FormalComment);
        node.title = Some(META_NODE_TITLE.to_string());
        node.comment_data = Some(CommentData {
            body: Some(body),
            markup: None,
        });
        root.children.insert(0, node);
    }
    Ok(())
}

fn write_sm(w: &mut XmlWriter, sm: &StateMachine) -> Result<()> {
    let Some(title) = sm.root.title.as_deref() else {
        warn!(sm = %sm.root.id, "a state machine title is required");
        return Err(CyberiadaError::bad_parameter("state machine without a title"));
    };

    w.start(
        "graph",
        &[("id", sm.root.id.as_str()), ("edgedefault", "directed")],
    )?;
    w.empty("data", &[("key", "dStateMachine")])?;
    w.text_element("data", &[("key", "dName")], title)?;
    if let Some(rect) = sm.root.geometry_rect() {
        w.start("data", &[("key", "dGeometry")])?;
        write_rect(w, rect)?;
        w.end("data")?;
    }

    for node in &sm.root.children {
        write_node(w, node)?;
    }
    for edge in &sm.edges {
        write_edge(w, edge)?;
    }

    w.end("graph")
}

fn write_node(w: &mut XmlWriter, node: &Node) -> Result<()> {
    w.start("node", &[("id", node.id.as_str())])?;

    match node.kind {
        NodeKind::StateMachine => {
            warn!(node = %node.id, "embedded state machine nodes are not supported");
            return Err(CyberiadaError::bad_parameter("embedded state machine node"));
        }
        NodeKind::Comment => {
            w.text_element("data", &[("key", "dNote")], "informal")?;
        }
        NodeKind::FormalComment => {
            w.text_element("data", &[("key", "dNote")], "formal")?;
        }
        NodeKind::SubmachineState => {
            let Some(link) = node.link.as_ref() else {
                warn!(node = %node.id, "submachine state without a link");
                return Err(CyberiadaError::bad_parameter("submachine state without a link"));
            };
            w.text_element("data", &[("key", "dSubmachineState")], &link.r#ref)?;
        }
        NodeKind::SimpleState | NodeKind::CompositeState => {}
        other => {
            let Some((name, _)) = VERTEX_KINDS.iter().find(|(_, kind)| *kind == other) else {
                warn!(node = %node.id, "unsupported node kind");
                return Err(CyberiadaError::bad_parameter("unsupported node kind"));
            };
            w.text_element("data", &[("key", "dVertex")], name)?;
        }
    }

    if let Some(title) = node.title.as_deref() {
        w.text_element("data", &[("key", "dName")], title)?;
    }

    if node.kind.is_comment() {
        if let Some(data) = node.comment_data.as_ref() {
            if let Some(body) = data.body.as_deref() {
                w.text_element("data", &[("key", "dData")], body)?;
            }
            if let Some(markup) = data.markup.as_deref() {
                w.text_element("data", &[("key", "dMarkup")], markup)?;
            }
        }
    }

    if !node.actions.is_empty() {
        w.text_element("data", &[("key", "dData")], &action_text(&node.actions))?;
    }

    match node.geometry {
        Some(NodeGeometry::Rect(rect)) => {
            w.start("data", &[("key", "dGeometry")])?;
            write_rect(w, rect)?;
            w.end("data")?;
        }
        Some(NodeGeometry::Point(point)) => {
            w.start("data", &[("key", "dGeometry")])?;
            write_point(w, point)?;
            w.end("data")?;
        }
        None => {}
    }

    if let Some(color) = node.color.as_deref() {
        w.text_element("data", &[("key", "dColor")], color)?;
    }

    if node.kind == NodeKind::CompositeState {
        let graph_id = format!("{}:", node.id);
        w.start(
            "graph",
            &[("id", graph_id.as_str()), ("edgedefault", "directed")],
        )?;
        for child in &node.children {
            write_node(w, child)?;
        }
        w.end("graph")?;
    }

    w.end("node")
}

fn write_edge(w: &mut XmlWriter, edge: &Edge) -> Result<()> {
    w.start(
        "edge",
        &[
            ("id", edge.id.as_str()),
            ("source", edge.source.as_str()),
            ("target", edge.target.as_str()),
        ],
    )?;

    if let Some(action) = edge.action.as_ref() {
        w.text_element(
            "data",
            &[("key", "dData")],
            &action_text(std::slice::from_ref(action)),
        )?;
    }

    if edge.kind == EdgeKind::CommentEdge {
        if let Some(subject) = edge.comment_subject.as_ref() {
            match subject.kind {
                CommentSubjectKind::Node => w.empty("data", &[("key", "dPivot")])?,
                CommentSubjectKind::NameFragment => {
                    w.text_element("data", &[("key", "dPivot")], "dName")?
                }
                CommentSubjectKind::DataFragment => {
                    w.text_element("data", &[("key", "dPivot")], "dData")?
                }
            }
            if let Some(fragment) = subject.fragment.as_deref() {
                w.text_element("data", &[("key", "dChunk")], fragment)?;
            }
        }
    }

    if let Some(polyline) = edge.polyline.as_ref() {
        w.start("data", &[("key", "dGeometry")])?;
        for point in polyline {
            write_point(w, *point)?;
        }
        w.end("data")?;
    }
    if let Some(point) = edge.source_point {
        w.start("data", &[("key", "dSourcePoint")])?;
        write_point(w, point)?;
        w.end("data")?;
    }
    if let Some(point) = edge.target_point {
        w.start("data", &[("key", "dTargetPoint")])?;
        write_point(w, point)?;
        w.end("data")?;
    }
    match edge.label {
        Some(LabelGeometry::Point(point)) => {
            w.start("data", &[("key", "dLabelGeometry")])?;
            write_point(w, point)?;
            w.end("data")?;
        }
        Some(LabelGeometry::Rect(rect)) => {
            w.start("data", &[("key", "dLabelGeometry")])?;
            write_rect(w, rect)?;
            w.end("data")?;
        }
        None => {}
    }

    if let Some(color) = edge.color.as_deref() {
        w.text_element("data", &[("key", "dColor")], color)?;
    }

    w.end("edge")
}

fn write_point(w: &mut XmlWriter, point: Point) -> Result<()> {
    w.empty(
        "point",
        &[("x", coord(point.x).as_str()), ("y", coord(point.y).as_str())],
    )
}

fn write_rect(w: &mut XmlWriter, rect: Rect) -> Result<()> {
    w.empty(
        "rect",
        &[
            ("x", coord(rect.x).as_str()),
            ("y", coord(rect.y).as_str()),
            ("width", coord(rect.width).as_str()),
            ("height", coord(rect.height).as_str()),
        ],
    )
}
