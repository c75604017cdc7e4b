//! The dialect-aware GraphML decoder.
//!
//! Decoding is a push-down finite-state machine: an explicit stack of
//! frames follows the XML element nesting while a state/element
//! transition table picks the handler for each element. The two
//! dialects share the machinery and differ only in their transition
//! tables (see [`native`] and [`legacy`]).

mod legacy;
mod native;

use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::{GeometryConverter, Point, Rect};
use crate::grammar::ActionGrammar;
use crate::meta::Metadata;
use crate::model::{Document, Edge, Node, NodeKind, StateMachine};
use crate::options::{Dialect, ReadOptions};
use crate::reconstruct;
use crate::keys::{GRAPHML_NS, YED_NS};
use crate::xml::{self, XmlElement};

/// Decode a GraphML document with an explicit geometry collaborator.
///
/// `dialect` may be `None` to auto-detect from the root namespace
/// declarations; a hint that conflicts with the detected namespaces is
/// an XML error.
pub fn decode_document_with_geometry(
    input: &[u8],
    dialect: Option<Dialect>,
    opts: &ReadOptions,
    geometry: &dyn GeometryConverter,
) -> Result<Document> {
    opts.validate()?;

    let flattened = match dialect {
        Some(Dialect::Cyberiada10) => false,
        _ => opts.flatten.resolve(input),
    };

    let root = xml::parse(input)?;
    if root.name != "graphml" {
        warn!("could not find the GraphML root element");
        return Err(CyberiadaError::xml("missing graphml root element"));
    }
    let dialect = detect_dialect(&root, dialect)?;

    let mut doc = match dialect {
        Dialect::Cyberiada10 => {
            let grammar = ActionGrammar::new(false, false);
            native::decode(&root, &grammar)?
        }
        Dialect::LegacyYed => {
            let berloga = root.has_attr("SchemeName");
            let grammar = ActionGrammar::new(flattened, berloga);
            legacy::decode(&root, &grammar)?
        }
    };

    reconstruct::reconstruct_document(&mut doc, opts)?;

    if opts.skip_geometry {
        doc.clean_geometry();
    } else if opts.reconstruct_geometry || opts.reconstruct_sm_geometry {
        geometry.reconstruct(&mut doc, opts.reconstruct_sm_geometry)?;
        geometry.convert(&mut doc, opts.target_formats())?;
    } else if doc.has_geometry() {
        geometry.convert(&mut doc, opts.target_formats())?;
    } else {
        doc.formats = opts.target_formats();
    }

    Ok(doc)
}

/// Decode a GraphML document without coordinate conversion; stored
/// geometry keeps the source conventions and only the format descriptors
/// are retagged.
pub fn decode_document(
    input: &[u8],
    dialect: Option<Dialect>,
    opts: &ReadOptions,
) -> Result<Document> {
    decode_document_with_geometry(input, dialect, opts, &crate::geometry::NullGeometry)
}

/// Pick the dialect from the root namespace declarations and check it
/// against the caller's hint.
fn detect_dialect(root: &XmlElement, hint: Option<Dialect>) -> Result<Dialect> {
    if root.namespaces.is_empty() {
        warn!("GraphML root element has no namespace declarations");
        return Err(CyberiadaError::xml("missing GraphML namespace"));
    }
    let graphml = root.namespaces.iter().any(|ns| ns == GRAPHML_NS);
    let yed = root.namespaces.iter().any(|ns| ns == YED_NS);
    if !graphml {
        warn!("no GraphML namespace on the root element");
        return Err(CyberiadaError::xml("missing GraphML namespace"));
    }
    match hint {
        None => Ok(if yed {
            Dialect::LegacyYed
        } else {
            Dialect::Cyberiada10
        }),
        Some(Dialect::LegacyYed) if !yed => {
            warn!("yEd dialect requested but the yFiles namespace is absent");
            Err(CyberiadaError::xml("missing yFiles namespace"))
        }
        Some(dialect) => Ok(dialect),
    }
}

// ----------------------------------------------------------------------------
// Shared parser machinery
// ----------------------------------------------------------------------------

/// States of the element-context machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParserState {
    Init,
    Graph,
    Node,
    NodeGeometry,
    NodeTitle,
    NodeAction,
    NodeStart,
    Edge,
    EdgeGeometry,
    EdgeSourcePoint,
    EdgeTargetPoint,
    EdgeLabelGeometry,
}

type Handler = fn(&mut Decoder<'_>, &XmlElement) -> Result<ParserState>;

/// One row of a dialect's transition table.
struct Transition {
    state: ParserState,
    element: &'static str,
    handler: Handler,
}

/// Reference to a node slot while the trees are still flat.
#[derive(Clone, Copy)]
struct NodeRef {
    sm: usize,
    slot: usize,
}

/// One stack frame per XML element; a frame carries the semantic node it
/// introduced, if any.
#[derive(Default)]
struct Frame {
    node: Option<NodeRef>,
}

/// Nodes of one state machine in creation order; children are attached
/// by index and the owned tree is assembled at the end of the walk.
#[derive(Default)]
struct SmBuild {
    slots: Vec<Slot>,
    root: Option<usize>,
    edges: Vec<Edge>,
}

struct Slot {
    node: Node,
    children: Vec<usize>,
}

impl SmBuild {
    fn assemble(self) -> Option<StateMachine> {
        let root = self.root?;
        let (mut nodes, children): (Vec<Option<Node>>, Vec<Vec<usize>>) = self
            .slots
            .into_iter()
            .map(|slot| (Some(slot.node), slot.children))
            .unzip();
        // children are always created after their parent, so assembling
        // back-to-front sees every child completed
        for i in (0..nodes.len()).rev() {
            let kids: Vec<Node> = children[i]
                .iter()
                .map(|&child| nodes[child].take().unwrap())
                .collect();
            if let Some(node) = nodes[i].as_mut() {
                node.children = kids;
            }
        }
        Some(StateMachine {
            root: nodes[root].take().unwrap(),
            edges: self.edges,
        })
    }
}

struct Decoder<'g> {
    grammar: &'g ActionGrammar,
    format: Option<String>,
    meta: Option<Metadata>,
    sms: Vec<SmBuild>,
    stack: Vec<Frame>,
    state: ParserState,
    keys: native::KeyTable,
}

impl<'g> Decoder<'g> {
    fn new(grammar: &'g ActionGrammar) -> Self {
        Self {
            grammar,
            format: None,
            meta: None,
            sms: vec![SmBuild::default()],
            stack: Vec::new(),
            state: ParserState::Init,
            keys: native::KeyTable::new(),
        }
    }

    /// Drive the state machine over the DOM.
    fn walk(&mut self, element: &XmlElement, table: &[Transition]) -> Result<()> {
        self.stack.push(Frame::default());
        let transition = table
            .iter()
            .find(|t| t.state == self.state && t.element == element.name);
        if let Some(transition) = transition {
            self.state = (transition.handler)(self, element)?;
        }
        for child in &element.children {
            self.walk(child, table)?;
        }
        self.stack.pop();
        Ok(())
    }

    /// The nearest enclosing frame that introduced a semantic node.
    fn current_node_ref(&self) -> Option<NodeRef> {
        self.stack.iter().rev().find_map(|frame| frame.node)
    }

    fn set_top_node(&mut self, node: NodeRef) {
        if let Some(frame) = self.stack.last_mut() {
            frame.node = Some(node);
        }
    }

    fn node_mut(&mut self, node: NodeRef) -> &mut Node {
        &mut self.sms[node.sm].slots[node.slot].node
    }

    fn current_node_mut(&mut self) -> Result<&mut Node> {
        let node = self.current_node_ref().ok_or_else(|| {
            warn!("no current node");
            CyberiadaError::format("element outside of a node context")
        })?;
        Ok(self.node_mut(node))
    }

    fn last_edge_mut(&mut self) -> Result<&mut Edge> {
        self.sms
            .last_mut()
            .and_then(|sm| sm.edges.last_mut())
            .ok_or_else(|| {
                warn!("no current edge");
                CyberiadaError::format("element outside of an edge context")
            })
    }

    /// Collect the built trees into state machines.
    fn into_state_machines(self) -> Result<Vec<StateMachine>> {
        let sms: Vec<StateMachine> = self
            .sms
            .into_iter()
            .filter_map(SmBuild::assemble)
            .collect();
        if sms.is_empty() {
            warn!("document contains no graphs");
            return Err(CyberiadaError::format("document has no state machines"));
        }
        Ok(sms)
    }
}

// ----------------------------------------------------------------------------
// Handlers shared by both dialects
// ----------------------------------------------------------------------------

fn handle_new_graph(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(id) = e.attr("id") else {
        warn!("graph element without an id attribute");
        return Err(CyberiadaError::format("graph element without id"));
    };
    // nested graph elements keep feeding the enclosing composite node
    if d.current_node_ref().is_none() {
        if d.sms.last().is_none_or(|sm| sm.root.is_some()) {
            d.sms.push(SmBuild::default());
        }
        let sm = d.sms.len() - 1;
        let build = d.sms.last_mut().unwrap();
        build.slots.push(Slot {
            node: Node::with_kind(id, NodeKind::StateMachine),
            children: Vec::new(),
        });
        build.root = Some(build.slots.len() - 1);
        let slot = build.slots.len() - 1;
        d.set_top_node(NodeRef { sm, slot });
    }
    Ok(ParserState::Graph)
}

fn handle_new_node(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(id) = e.attr("id") else {
        warn!("node element without an id attribute");
        return Err(CyberiadaError::format("node element without id"));
    };
    let parent = d.current_node_ref().ok_or_else(|| {
        warn!("node element outside of a graph");
        CyberiadaError::format("node element outside of a graph")
    })?;
    let build = &mut d.sms[parent.sm];
    build.slots.push(Slot {
        node: Node::new(id),
        children: Vec::new(),
    });
    let slot = build.slots.len() - 1;
    build.slots[parent.slot].children.push(slot);
    d.set_top_node(NodeRef { sm: parent.sm, slot });
    Ok(ParserState::Node)
}

fn handle_new_edge(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let Some(source) = e.attr("source") else {
        warn!("edge element without a source attribute");
        return Err(CyberiadaError::format("edge element without source"));
    };
    let Some(target) = e.attr("target") else {
        warn!("edge element without a target attribute");
        return Err(CyberiadaError::format("edge element without target"));
    };
    let id = e.attr("id").unwrap_or_default();
    let build = d.sms.last_mut().unwrap();
    if !id.is_empty() && build.edges.iter().any(|edge| edge.id == id) {
        warn!(edge = id, "edge id already exists in the state machine");
        return Err(CyberiadaError::format(format!("duplicate edge id {id}")));
    }
    build.edges.push(Edge::new(id, source, target, false));
    Ok(ParserState::Edge)
}

/// A `<point>` (native) or `<y:Point>` (legacy) inside edge geometry
/// extends the polyline.
fn handle_edge_point(d: &mut Decoder<'_>, e: &XmlElement) -> Result<ParserState> {
    let point = read_point(e);
    let edge = d.last_edge_mut()?;
    edge.polyline.get_or_insert_with(Vec::new).push(point);
    Ok(ParserState::EdgeGeometry)
}

/// Read a point from `x`/`y` attributes; missing coordinates are zero.
fn read_point(e: &XmlElement) -> Point {
    Point::new(e.coord("x").unwrap_or(0.0), e.coord("y").unwrap_or(0.0))
}

/// Read a rectangle from `x`/`y`/`width`/`height` attributes; missing
/// coordinates are zero.
fn read_rect(e: &XmlElement) -> Rect {
    Rect::new(
        e.coord("x").unwrap_or(0.0),
        e.coord("y").unwrap_or(0.0),
        e.coord("width").unwrap_or(0.0),
        e.coord("height").unwrap_or(0.0),
    )
}
