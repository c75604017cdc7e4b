//! Handlers and transition table for the native Cyberiada-GraphML 1.0
//! dialect.

use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::NodeGeometry;
use crate::grammar::ActionGrammar;
use crate::keys::{CYB_KEYS, FORMAT_CYBERIADA10, META_NODE_TITLE, VERTEX_KINDS};
use crate::meta::decode_meta;
use crate::model::{
    CommentData, CommentSubject, CommentSubjectKind, Document, EdgeKind, Link, NodeKind,
};
use crate::text::{cap_str, is_blank, trim_trailing};
use crate::xml::XmlElement;

use super::{
    Decoder, Handler, ParserState, Transition, handle_edge_point, handle_new_edge,
    handle_new_graph, handle_new_node, read_point, read_rect,
};

/// The key-id table of one decode: library defaults plus the overrides a
/// document declares with its own `<key>` elements. Owned by the
/// decoder, so the defaults are untouched for concurrent decodes and
/// restored trivially when the decoder is dropped.
pub(super) struct KeyTable {
    overrides: Vec<Option<String>>,
}

impl KeyTable {
    pub(super) fn new() -> Self {
        Self {
            overrides: vec![None; CYB_KEYS.len()],
        }
    }

    /// Resolve a key id (default or overridden) to its logical name.
    fn find_name(&self, id: &str) -> Option<&'static str> {
        CYB_KEYS.iter().enumerate().find_map(|(i, key)| {
            let effective = self.overrides[i].as_deref().unwrap_or(key.id);
            (effective == id).then_some(key.name)
        })
    }

    /// Record a document-supplied id for a known (element, name) pair.
    fn register(&mut self, for_element: &str, name: &str, id: &str) {
        if let Some(i) = CYB_KEYS
            .iter()
            .position(|key| key.for_element == for_element && key.name == name)
        {
            if CYB_KEYS[i].id != id {
                self.overrides[i] = Some(id.to_string());
            }
        }
    }
}

static TABLE: &[Transition] = &[
    Transition { state: ParserState::Init, element: "data", handler: handle_init_data as Handler },
    Transition { state: ParserState::Init, element: "key", handler: handle_init_key },
    Transition { state: ParserState::Init, element: "graph", handler: handle_new_graph },
    Transition { state: ParserState::Graph, element: "node", handler: handle_new_node },
    Transition { state: ParserState::Graph, element: "edge", handler: handle_new_edge },
    Transition { state: ParserState::Graph, element: "data", handler: handle_node_data },
    Transition { state: ParserState::Node, element: "data", handler: handle_node_data },
    Transition { state: ParserState::Node, element: "node", handler: handle_new_node },
    Transition { state: ParserState::Node, element: "edge", handler: handle_new_edge },
    Transition { state: ParserState::Node, element: "graph", handler: handle_new_graph },
    Transition { state: ParserState::Edge, element: "data", handler: handle_edge_data },
    Transition { state: ParserState::Edge, element: "edge", handler: handle_new_edge },
    Transition { state: ParserState::Edge, element: "graph", handler: handle_new_graph },
    Transition { state: ParserState::NodeGeometry, element: "point", handler: handle_node_point },
    Transition { state: ParserState::NodeGeometry, element: "rect", handler: handle_node_rect },
    Transition { state: ParserState::EdgeGeometry, element: "point", handler: handle_edge_point },
    Transition { state: ParserState::EdgeGeometry, element: "data", handler: handle_edge_data },
    Transition { state: ParserState::EdgeGeometry, element: "edge", handler: handle_new_edge },
    Transition { state: ParserState::EdgeGeometry, element: "graph", handler: handle_new_graph },
    Transition { state: ParserState::EdgeSourcePoint, element: "point", handler: handle_edge_source_point },
    Transition { state: ParserState::EdgeTargetPoint, element: "point", handler: handle_edge_target_point },
    Transition { state: ParserState::EdgeLabelGeometry, element: "point", handler: handle_edge_label_point },
    Transition { state: ParserState::EdgeLabelGeometry, element: "rect", handler: handle_edge_label_rect },
];

/// Decode a native document rooted at `root`.
pub(super) fn decode(root: &XmlElement, grammar: &ActionGrammar) -> Result<Document> {
    let mut decoder = Decoder::new(grammar);
    decoder.walk(root, TABLE)?;

    if decoder.format.as_deref() != Some(FORMAT_CYBERIADA10) {
        match &decoder.format {
            None => warn!("format tag not found"),
            Some(tag) => warn!(tag = %tag, "wrong format tag"),
        }
        return Err(CyberiadaError::format("missing or wrong format tag"));
    }

    let format = decoder.format.take();
    let meta = Some(decoder.meta.take().unwrap_or_default());
    let state_machines = decoder.into_state_machines()?;
    Ok(Document {
        format,
        meta,
        state_machines,
        ..Document::default()
    })
}

fn handle_init_data(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(key) = e.attr("key") else {
        warn!("top-level data element without a key attribute");
        return Err(CyberiadaError::format("data element without key"));
    };
    if d.keys.find_name(key).is_none() {
        warn!(key, "cannot resolve format key id");
        return Err(CyberiadaError::format(format!("unknown key id {key}")));
    }
    let text = e.text.trim();
    if text != FORMAT_CYBERIADA10 {
        warn!(format = text, "bad document format tag");
        return Err(CyberiadaError::format(format!("bad format tag {text:?}")));
    }
    d.format = Some(FORMAT_CYBERIADA10.to_string());
    Ok(ParserState::Init)
}

fn handle_init_key(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let (Some(for_element), Some(name)) = (e.attr("for"), e.attr("attr.name")) else {
        return Ok(ParserState::Init);
    };
    if CYB_KEYS
        .iter()
        .any(|key| key.for_element == for_element && key.name == name)
    {
        let Some(id) = e.attr("id") else {
            warn!("key element without an id attribute");
            return Err(CyberiadaError::format("key element without id"));
        };
        d.keys.register(for_element, name, id);
    }
    Ok(ParserState::Init)
}

fn handle_node_data(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(key) = e.attr("key") else {
        warn!("data element without a key attribute");
        return Err(CyberiadaError::format("data element without key"));
    };
    let Some(name) = d.keys.find_name(key) else {
        warn!(key, "cannot resolve data key id");
        return Err(CyberiadaError::format(format!("unknown key id {key}")));
    };
    let text = e.text.clone();
    let node_ref = d.current_node_ref().ok_or_else(|| {
        warn!("data element outside of a node context");
        CyberiadaError::format("data element outside of a node context")
    })?;

    match name {
        "name" => {
            let node = d.node_mut(node_ref);
            if node.title.is_some() {
                warn!(node = %node.id, "node title set twice");
                return Err(CyberiadaError::format("node title set twice"));
            }
            let mut title = cap_str(&text);
            trim_trailing(&mut title);
            node.title = Some(title);
        }
        "stateMachine" => {
            let node = d.node_mut(node_ref);
            if node.kind != NodeKind::StateMachine {
                warn!(node = %node.id, "state machine marker inside a node");
                return Err(CyberiadaError::format(
                    "state machine marker outside of a graph",
                ));
            }
            return Ok(ParserState::Graph);
        }
        "data" => {
            let kind = {
                let node = d.node_mut(node_ref);
                if !node.actions.is_empty() {
                    warn!(node = %node.id, "node data set twice");
                    return Err(CyberiadaError::format("node data set twice"));
                }
                node.kind
            };
            if kind.is_comment() {
                let is_meta = {
                    let node = d.node_mut(node_ref);
                    let is_meta = node.kind == NodeKind::FormalComment
                        && node.title.as_deref() == Some(META_NODE_TITLE);
                    let data = node.comment_data.get_or_insert_with(CommentData::default);
                    if data.body.is_some() {
                        warn!(node = %node.id, "comment body set twice");
                        return Err(CyberiadaError::format("comment body set twice"));
                    }
                    data.body = Some(cap_str(&text));
                    is_meta
                };
                if is_meta {
                    if d.meta.is_some() {
                        warn!("document metadata defined twice");
                        return Err(CyberiadaError::metadata("metadata defined twice"));
                    }
                    d.meta = Some(decode_meta(&text)?);
                }
            } else {
                let actions = d.grammar.decode_state_actions(&text)?;
                d.node_mut(node_ref).actions = actions;
            }
        }
        "vertex" => {
            let value = text.trim().to_string();
            let Some((_, kind)) = VERTEX_KINDS.iter().find(|(name, _)| *name == value) else {
                warn!(vertex = %value, "unknown vertex kind");
                return Err(CyberiadaError::format(format!(
                    "unknown vertex kind {value:?}"
                )));
            };
            let node = d.node_mut(node_ref);
            if !node.actions.is_empty() {
                warn!(node = %node.id, "vertex node carries actions");
                return Err(CyberiadaError::format("vertex node carries actions"));
            }
            node.kind = *kind;
        }
        "note" => {
            let value = text.trim();
            let kind = match value {
                "formal" => NodeKind::FormalComment,
                "informal" => NodeKind::Comment,
                _ if is_blank(value) => NodeKind::Comment,
                other => {
                    warn!(note = other, "bad comment type");
                    return Err(CyberiadaError::format(format!(
                        "bad comment type {other:?}"
                    )));
                }
            };
            d.node_mut(node_ref).kind = kind;
        }
        "color" => {
            let node = d.node_mut(node_ref);
            if node.color.is_some() {
                warn!(node = %node.id, "node color set twice");
                return Err(CyberiadaError::format("node color set twice"));
            }
            node.color = Some(cap_str(text.trim()));
        }
        "markup" => {
            let node = d.node_mut(node_ref);
            if node.kind != NodeKind::Comment {
                warn!(node = %node.id, "markup on a non-comment node");
                return Err(CyberiadaError::format("markup on a non-comment node"));
            }
            let data = node.comment_data.get_or_insert_with(CommentData::default);
            if data.markup.is_some() {
                warn!(node = %node.id, "comment markup set twice");
                return Err(CyberiadaError::format("comment markup set twice"));
            }
            data.markup = Some(cap_str(text.trim()));
        }
        "submachineState" => {
            let node = d.node_mut(node_ref);
            if node.link.is_some() {
                warn!(node = %node.id, "submachine link set twice");
                return Err(CyberiadaError::format("submachine link set twice"));
            }
            if is_blank(&text) {
                warn!(node = %node.id, "empty submachine link");
                return Err(CyberiadaError::format("empty submachine link"));
            }
            node.link = Some(Link::new(cap_str(text.trim())));
            node.kind = NodeKind::SubmachineState;
        }
        "geometry" => return Ok(ParserState::NodeGeometry),
        other => {
            warn!(key = other, "bad data key on a node");
            return Err(CyberiadaError::format(format!("bad data key {other:?}")));
        }
    }
    Ok(ParserState::Node)
}

fn handle_node_point(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let point = read_point(e);
    let node = d.current_node_mut()?;
    if node.geometry.is_some() {
        warn!(node = %node.id, "node geometry set twice");
        return Err(CyberiadaError::format("node geometry set twice"));
    }
    node.geometry = Some(NodeGeometry::Point(point));
    Ok(ParserState::Node)
}

fn handle_node_rect(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let rect = read_rect(e);
    let node = d.current_node_mut()?;
    if node.geometry.is_some() {
        warn!(node = %node.id, "node geometry set twice");
        return Err(CyberiadaError::format("node geometry set twice"));
    }
    if !rect.is_empty() {
        node.geometry = Some(NodeGeometry::Rect(rect));
    }
    Ok(ParserState::Node)
}

fn handle_edge_data(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(key) = e.attr("key") else {
        warn!("data element without a key attribute");
        return Err(CyberiadaError::format("data element without key"));
    };
    let Some(name) = d.keys.find_name(key) else {
        warn!(key, "cannot resolve data key id");
        return Err(CyberiadaError::format(format!("unknown key id {key}")));
    };
    let text = e.text.clone();

    match name {
        "data" => {
            let action = d.grammar.decode_edge_action(&text)?;
            let edge = d.last_edge_mut()?;
            if edge.action.is_some() {
                warn!(edge = %edge.id, "edge action set twice");
                return Err(CyberiadaError::format("edge action set twice"));
            }
            edge.action = action;
        }
        "geometry" => return Ok(ParserState::EdgeGeometry),
        "sourcePoint" => return Ok(ParserState::EdgeSourcePoint),
        "targetPoint" => return Ok(ParserState::EdgeTargetPoint),
        "labelGeometry" => return Ok(ParserState::EdgeLabelGeometry),
        "color" => {
            let edge = d.last_edge_mut()?;
            edge.color = Some(cap_str(text.trim()));
        }
        "pivot" => {
            let subject = if is_blank(&text) {
                CommentSubject::new(CommentSubjectKind::Node)
            } else {
                match d.keys.find_name(text.trim()) {
                    Some("name") => CommentSubject::new(CommentSubjectKind::NameFragment),
                    Some("data") => CommentSubject::new(CommentSubjectKind::DataFragment),
                    _ => {
                        warn!(pivot = text.trim(), "unsupported comment subject");
                        return Err(CyberiadaError::format(format!(
                            "unsupported comment subject {:?}",
                            text.trim()
                        )));
                    }
                }
            };
            let edge = d.last_edge_mut()?;
            if edge.comment_subject.is_some() {
                warn!(edge = %edge.id, "comment subject set twice");
                return Err(CyberiadaError::format("comment subject set twice"));
            }
            edge.kind = EdgeKind::CommentEdge;
            edge.comment_subject = Some(subject);
        }
        "chunk" => {
            let edge = d.last_edge_mut()?;
            let Some(subject) = edge.comment_subject.as_mut() else {
                warn!(edge = %edge.id, "comment chunk without a subject");
                return Err(CyberiadaError::format("comment chunk without a subject"));
            };
            if matches!(
                subject.kind,
                CommentSubjectKind::NameFragment | CommentSubjectKind::DataFragment
            ) {
                if subject.fragment.is_some() {
                    warn!(edge = %edge.id, "comment fragment set twice");
                    return Err(CyberiadaError::format("comment fragment set twice"));
                }
                subject.fragment = Some(cap_str(&text));
            }
        }
        other => {
            warn!(key = other, "bad data key on an edge");
            return Err(CyberiadaError::format(format!("bad data key {other:?}")));
        }
    }
    Ok(ParserState::Edge)
}

fn handle_edge_source_point(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let point = read_point(e);
    let edge = d.last_edge_mut()?;
    if edge.source_point.is_some() {
        warn!(edge = %edge.id, "edge source point set twice");
        return Err(CyberiadaError::format("edge source point set twice"));
    }
    edge.source_point = Some(point);
    Ok(ParserState::Edge)
}

fn handle_edge_target_point(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let point = read_point(e);
    let edge = d.last_edge_mut()?;
    if edge.target_point.is_some() {
        warn!(edge = %edge.id, "edge target point set twice");
        return Err(CyberiadaError::format("edge target point set twice"));
    }
    edge.target_point = Some(point);
    Ok(ParserState::Edge)
}

fn handle_edge_label_point(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let point = read_point(e);
    let edge = d.last_edge_mut()?;
    if edge.label.is_some() {
        warn!(edge = %edge.id, "edge label geometry set twice");
        return Err(CyberiadaError::format("edge label geometry set twice"));
    }
    edge.label = Some(crate::geometry::LabelGeometry::Point(point));
    Ok(ParserState::Edge)
}

fn handle_edge_label_rect(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let rect = read_rect(e);
    let edge = d.last_edge_mut()?;
    if edge.label.is_some() {
        warn!(edge = %edge.id, "edge label geometry set twice");
        return Err(CyberiadaError::format("edge label geometry set twice"));
    }
    edge.label = Some(crate::geometry::LabelGeometry::Rect(rect));
    Ok(ParserState::Edge)
}
