//! Handlers and transition table for the legacy yEd-based dialect.
//!
//! yFiles wraps the semantic content in graphics elements: node shape
//! and geometry live under `<y:GenericNode>` / `<y:GroupNode>` /
//! `<y:UMLNoteNode>`, titles and action text are `<y:NodeLabel>`s, edge
//! routing is a `<y:Path>` with `<y:Point>` children and the action text
//! sits in a `<y:EdgeLabel>`.

use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::{LabelGeometry, NodeGeometry, Point};
use crate::grammar::ActionGrammar;
use crate::keys::{FORMAT_BERLOGA, FORMAT_OSTRANNA};
use crate::meta::Metadata;
use crate::model::{CommentData, Document, NodeKind};
use crate::text::{cap_str, trim_trailing};
use crate::xml::XmlElement;

use super::{
    Decoder, Handler, ParserState, Transition, handle_edge_point, handle_new_edge,
    handle_new_graph, handle_new_node, read_rect,
};

const SCHEME_NAME_ATTR: &str = "SchemeName";
const NODE_CONFIG_START: &str = "com.yworks.bpmn.Event";
const NODE_CONFIG_START_SHADOW: &str = "com.yworks.bpmn.Event.withShadow";
const PROP_VALUE_START: &str = "EVENT_CHARACTERISTIC_START";

static TABLE: &[Transition] = &[
    Transition { state: ParserState::Init, element: "graph", handler: handle_new_graph as Handler },
    Transition { state: ParserState::Graph, element: "node", handler: handle_new_node },
    Transition { state: ParserState::Graph, element: "edge", handler: handle_new_edge },
    Transition { state: ParserState::Graph, element: "graph", handler: handle_new_graph },
    Transition { state: ParserState::Node, element: "UMLNoteNode", handler: handle_comment_node },
    Transition { state: ParserState::Node, element: "GroupNode", handler: handle_group_node },
    Transition { state: ParserState::Node, element: "GenericNode", handler: handle_generic_node },
    Transition { state: ParserState::NodeGeometry, element: "Geometry", handler: handle_node_geometry },
    Transition { state: ParserState::NodeStart, element: "Property", handler: handle_property },
    Transition { state: ParserState::NodeStart, element: "node", handler: handle_new_node },
    Transition { state: ParserState::NodeTitle, element: "NodeLabel", handler: handle_node_title },
    Transition { state: ParserState::NodeAction, element: "NodeLabel", handler: handle_node_action },
    Transition { state: ParserState::NodeAction, element: "node", handler: handle_new_node },
    Transition { state: ParserState::Edge, element: "edge", handler: handle_new_edge },
    Transition { state: ParserState::Edge, element: "Path", handler: handle_edge_geometry },
    Transition { state: ParserState::EdgeGeometry, element: "Point", handler: handle_edge_point },
    Transition { state: ParserState::EdgeGeometry, element: "EdgeLabel", handler: handle_edge_label },
    Transition { state: ParserState::EdgeGeometry, element: "edge", handler: handle_new_edge },
];

/// Decode a legacy yEd document rooted at `root`.
pub(super) fn decode(root: &XmlElement, grammar: &ActionGrammar) -> Result<Document> {
    let scheme_name = root.attr(SCHEME_NAME_ATTR).map(str::to_string);

    let mut decoder = Decoder::new(grammar);
    decoder.walk(root, TABLE)?;

    let format = if scheme_name.is_some() {
        FORMAT_BERLOGA
    } else {
        FORMAT_OSTRANNA
    };
    let mut state_machines = decoder.into_state_machines()?;

    // the scheme name doubles as the SM and document name; without one,
    // the first composite state's title is the best label available
    let sm_name = match &scheme_name {
        Some(name) => name.clone(),
        None => state_machines
            .first()
            .and_then(|sm| sm.root.find_by_kind(NodeKind::CompositeState.into()))
            .and_then(|node| node.title.clone())
            .unwrap_or_default(),
    };
    for sm in &mut state_machines {
        if sm.root.title.is_none() {
            sm.root.title = Some(cap_str(&sm_name));
        }
    }

    Ok(Document {
        format: Some(format.to_string()),
        meta: Some(Metadata::with_name(&sm_name)),
        state_machines,
        ..Document::default()
    })
}

fn handle_group_node(d: &mut Decoder<'_>, _e: &XmlElement) -> Result<ParserState> {
    let node = d.current_node_mut()?;
    node.kind = NodeKind::CompositeState;
    Ok(ParserState::NodeGeometry)
}

fn handle_comment_node(d: &mut Decoder<'_>, _e: &XmlElement) -> Result<ParserState> {
    let node = d.current_node_mut()?;
    node.kind = NodeKind::Comment;
    Ok(ParserState::NodeGeometry)
}

fn handle_generic_node(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let config = e.attr("configuration");
    let node = d.current_node_mut()?;
    if matches!(config, Some(NODE_CONFIG_START) | Some(NODE_CONFIG_START_SHADOW)) {
        node.kind = NodeKind::Initial;
        if node.title.is_some() {
            warn!(node = %node.id, "start node label set twice");
            return Err(CyberiadaError::format("start node label set twice"));
        }
        node.title = Some(String::new());
    } else {
        node.kind = NodeKind::SimpleState;
    }
    Ok(ParserState::NodeGeometry)
}

fn handle_node_geometry(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let rect = read_rect(e);
    let node = d.current_node_mut()?;
    if node.kind.has_point_geometry() {
        // yEd stores pseudostates as little rectangles; only the center
        // is meaningful. An all-zero rectangle means no geometry at all.
        if !(rect.is_empty() && rect.x == 0.0 && rect.y == 0.0) {
            node.geometry = Some(NodeGeometry::Point(rect.center()));
        }
        return Ok(ParserState::NodeStart);
    }
    if !rect.is_empty() {
        node.geometry = Some(NodeGeometry::Rect(rect));
    }
    if node.kind == NodeKind::Comment {
        Ok(ParserState::NodeAction)
    } else {
        Ok(ParserState::NodeTitle)
    }
}

fn handle_property(_d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(value) = e.attr("value") else {
        warn!("property element without a value attribute");
        return Err(CyberiadaError::format("property element without value"));
    };
    if value == PROP_VALUE_START {
        Ok(ParserState::Graph)
    } else {
        Ok(ParserState::NodeStart)
    }
}

fn handle_node_title(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let text = e.text.clone();
    let node = d.current_node_mut()?;
    if node.title.is_some() {
        warn!(node = %node.id, "node label set twice");
        return Err(CyberiadaError::format("node label set twice"));
    }
    let mut title = cap_str(&text);
    trim_trailing(&mut title);
    node.title = Some(title);
    Ok(ParserState::NodeAction)
}

fn handle_node_action(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let text = e.text.clone();
    let node_ref = d.current_node_ref().ok_or_else(|| {
        warn!("node label outside of a node context");
        CyberiadaError::format("node label outside of a node context")
    })?;
    let kind = {
        let node = d.node_mut(node_ref);
        if !node.actions.is_empty() {
            warn!(node = %node.id, "node actions set twice");
            return Err(CyberiadaError::format("node actions set twice"));
        }
        node.kind
    };
    if kind == NodeKind::Comment {
        let node = d.node_mut(node_ref);
        let data = node.comment_data.get_or_insert_with(CommentData::default);
        if data.body.is_some() {
            warn!(node = %node.id, "comment body set twice");
            return Err(CyberiadaError::format("comment body set twice"));
        }
        data.body = Some(cap_str(&text));
    } else {
        let actions = d.grammar.decode_state_actions_legacy(&text)?;
        d.node_mut(node_ref).actions = actions;
    }
    Ok(ParserState::Graph)
}

fn handle_edge_geometry(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let coords = (
        e.coord("sx"),
        e.coord("sy"),
        e.coord("tx"),
        e.coord("ty"),
    );
    let edge = d.last_edge_mut()?;
    let (Some(sx), Some(sy), Some(tx), Some(ty)) = coords else {
        warn!(edge = %edge.id, "path element without endpoint coordinates");
        return Err(CyberiadaError::format(
            "path element without endpoint coordinates",
        ));
    };
    edge.source_point = Some(Point::new(sx, sy));
    edge.target_point = Some(Point::new(tx, ty));
    Ok(ParserState::EdgeGeometry)
}

fn handle_edge_label(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let text = e.text.clone();
    let label_point = match (e.coord("x"), e.coord("y")) {
        (Some(x), Some(y)) => Some(Point::new(x, y)),
        _ => None,
    };
    let action = d.grammar.decode_edge_action(&text)?;
    let edge = d.last_edge_mut()?;
    if edge.action.is_some() {
        warn!(edge = %edge.id, "edge label set twice");
        return Err(CyberiadaError::format("edge label set twice"));
    }
    let has_action = action.is_some();
    edge.action = action;
    if has_action {
        if let Some(point) = label_point {
            if edge.label.is_some() {
                warn!(edge = %edge.id, "edge label coordinates set twice");
                return Err(CyberiadaError::format(
                    "edge label coordinates set twice",
                ));
            }
            edge.label = Some(LabelGeometry::Point(point));
        }
    }
    Ok(ParserState::Graph)
}
