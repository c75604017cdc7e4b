//! Writer for the legacy yEd-based dialect.
//!
//! The yFiles schema is graphics-first: every node carries a geometry
//! element (zero-sized when the model has none, so readers can keep
//! their place), titles and action text are labels, and edges are
//! polyline elements with a path and an optional label.

use tracing::warn;

use crate::error::Result;
use crate::geometry::{LabelGeometry, NodeGeometry, Point, Rect};
use crate::keys::{GRAPHML_NS, YED_KEYS, YED_NS};
use crate::model::{Document, Edge, Node, NodeKind};

use super::{XmlWriter, action_text, coord};

/// Diameter of the rectangle a pseudostate point is stored as.
const PSEUDO_NODE_SIZE: f64 = 20.0;

const YED_ROOT_ATTRS: &[(&str, &str)] = &[
    ("xmlns", GRAPHML_NS),
    ("xmlns:java", "http://www.yworks.com/xml/yfiles-common/1.0/java"),
    ("xmlns:sys", "http://www.yworks.com/xml/yfiles-common/markup/primitives/2.0"),
    ("xmlns:x", "http://www.yworks.com/xml/yfiles-common/markup/2.0"),
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ("xmlns:y", YED_NS),
    ("xmlns:yed", "http://www.yworks.com/xml/yed/3"),
    (
        "yed:schemaLocation",
        "http://graphml.graphdrawing.org/xmlns http://www.yworks.com/xml/schema/graphml/1.1/ygraphml.xsd",
    ),
];

const TITLE_LABEL_ATTRS: &[(&str, &str)] = &[
    ("alignment", "center"),
    ("backgroundColor", "#EBEBEB"),
    ("fontSize", "15"),
    ("fontStyle", "bold"),
    ("textColor", "#000000"),
    ("xml:space", "preserve"),
    ("hasLineColor", "false"),
    ("visible", "true"),
    ("horizontalTextPosition", "center"),
    ("verticalTextPosition", "top"),
    ("autoSizePolicy", "node_width"),
    ("y", "0"),
    ("height", "20"),
    ("configuration", "com.yworks.entityRelationship.label.name"),
    ("modelName", "internal"),
    ("modelPosition", "t"),
];

const ACTION_LABEL_ATTRS: &[(&str, &str)] = &[
    ("alignment", "left"),
    ("hasBackgroundColor", "false"),
    ("fontSize", "12"),
    ("fontStyle", "plain"),
    ("textColor", "#000000"),
    ("xml:space", "preserve"),
    ("hasLineColor", "false"),
    ("visible", "true"),
    ("horizontalTextPosition", "center"),
    ("verticalTextPosition", "bottom"),
    ("autoSizePolicy", "node_size"),
];

const EDGE_LABEL_ATTRS: &[(&str, &str)] = &[
    ("alignment", "center"),
    ("fontSize", "12"),
    ("fontStyle", "plain"),
    ("textColor", "#000000"),
    ("backgroundColor", "#F5F5F5"),
    ("configuration", "AutoFlippingLabel"),
    ("distance", "2.0"),
    ("hasLineColor", "false"),
    ("visible", "true"),
    ("xml:space", "preserve"),
    ("modelName", "centered"),
    ("modelPosition", "center"),
    ("preferredPlacement", "center_on_edge"),
];

/// Serialize a single-machine document to the legacy yEd schema.
pub(super) fn write(doc: &Document) -> Result<Vec<u8>> {
    let sm = &doc.state_machines[0];

    let mut w = XmlWriter::new();
    w.decl()?;

    let scheme_name = doc.meta.as_ref().and_then(|meta| meta.name.clone());
    let mut root_attrs: Vec<(&str, &str)> = YED_ROOT_ATTRS.to_vec();
    if let Some(name) = scheme_name.as_deref() {
        if !name.is_empty() {
            root_attrs.push(("SchemeName", name));
        }
    }
    w.start("graphml", &root_attrs)?;

    for key in YED_KEYS {
        let mut attrs = vec![("id", key.id), ("for", key.for_element)];
        if let (Some(name), Some(attr_type)) = (key.name, key.attr_type) {
            attrs.push(("attr.name", name));
            attrs.push(("attr.type", attr_type));
        }
        if let Some(yfiles_type) = key.yfiles_type {
            attrs.push(("yfiles.type", yfiles_type));
        }
        w.empty("key", &attrs)?;
    }

    w.start("graph", &[("id", "G"), ("edgedefault", "directed")])?;
    w.empty("data", &[("key", "d0"), ("xml:space", "preserve")])?;

    write_node(&mut w, &sm.root)?;
    for edge in &sm.edges {
        write_edge(&mut w, edge)?;
    }

    w.end("graph")?;
    w.end("graphml")?;
    Ok(w.into_bytes())
}

fn write_node(w: &mut XmlWriter, node: &Node) -> Result<()> {
    match node.kind {
        NodeKind::StateMachine => {
            for child in &node.children {
                write_node(w, child)?;
            }
            Ok(())
        }
        NodeKind::Initial => write_initial(w, node),
        NodeKind::SimpleState | NodeKind::SubmachineState => write_simple(w, node),
        NodeKind::CompositeState => write_composite(w, node),
        NodeKind::Comment | NodeKind::FormalComment => write_comment(w, node),
        _ => {
            // kinds the legacy schema cannot express are kept as bare
            // node elements
            warn!(node = %node.id, kind = ?node.kind, "node kind not expressible in the legacy dialect");
            w.empty("node", &[("id", node.id.as_str())])
        }
    }
}

fn write_initial(w: &mut XmlWriter, node: &Node) -> Result<()> {
    w.start("node", &[("id", node.id.as_str())])?;
    w.start("data", &[("key", "d6")])?;
    w.start(
        "y:GenericNode",
        &[("configuration", "com.yworks.bpmn.Event.withShadow")],
    )?;

    let rect = match node.geometry {
        Some(NodeGeometry::Point(p)) => Rect::new(
            p.x - PSEUDO_NODE_SIZE / 2.0,
            p.y - PSEUDO_NODE_SIZE / 2.0,
            PSEUDO_NODE_SIZE,
            PSEUDO_NODE_SIZE,
        ),
        _ => Rect::default(),
    };
    write_geometry(w, rect)?;
    w.empty(
        "y:Fill",
        &[("color", "#333333"), ("color2", "#000000"), ("transparent", "false")],
    )?;
    write_border(w)?;
    write_title_label(w, node.title.as_deref().unwrap_or_default())?;
    w.empty("y:Property", &[("value", "EVENT_CHARACTERISTIC_START")])?;

    w.end("y:GenericNode")?;
    w.end("data")?;
    w.end("node")
}

fn write_simple(w: &mut XmlWriter, node: &Node) -> Result<()> {
    w.start("node", &[("id", node.id.as_str())])?;
    w.start("data", &[("key", "d6")])?;
    w.start("y:GenericNode", &[])?;

    write_geometry(w, node.geometry_rect().unwrap_or_default())?;
    write_border(w)?;
    write_title_label(w, node.title.as_deref().unwrap_or_default())?;
    write_action_label(w, &node.actions)?;

    w.end("y:GenericNode")?;
    w.end("data")?;
    w.end("node")
}

fn write_composite(w: &mut XmlWriter, node: &Node) -> Result<()> {
    w.start(
        "node",
        &[("id", node.id.as_str()), ("yfiles.foldertype", "group")],
    )?;
    w.empty("data", &[("key", "d5"), ("xml:space", "preserve")])?;
    w.start("data", &[("key", "d6")])?;
    w.start("y:ProxyAutoBoundsNode", &[])?;
    w.start("y:Realizers", &[("active", "0")])?;
    w.start("y:GroupNode", &[])?;

    write_geometry(w, node.geometry_rect().unwrap_or_default())?;
    w.empty(
        "y:Fill",
        &[("color", "#E8EEF7"), ("color2", "#B7C9E3"), ("transparent", "false")],
    )?;
    write_border(w)?;
    write_title_label(w, node.title.as_deref().unwrap_or_default())?;
    write_action_label(w, &node.actions)?;
    w.empty("y:Shape", &[("type", "roundrectangle")])?;

    w.end("y:GroupNode")?;
    w.end("y:Realizers")?;
    w.end("y:ProxyAutoBoundsNode")?;
    w.end("data")?;

    let graph_id = format!("{}:", node.id);
    w.start(
        "graph",
        &[("id", graph_id.as_str()), ("edgedefault", "directed")],
    )?;
    for child in &node.children {
        write_node(w, child)?;
    }
    w.end("graph")?;

    w.end("node")
}

fn write_comment(w: &mut XmlWriter, node: &Node) -> Result<()> {
    w.start("node", &[("id", node.id.as_str())])?;
    w.start("data", &[("key", "d6")])?;
    w.start("y:UMLNoteNode", &[])?;

    write_geometry(w, node.geometry_rect().unwrap_or_default())?;
    write_border(w)?;
    let body = node
        .comment_data
        .as_ref()
        .and_then(|data| data.body.as_deref())
        .unwrap_or_default();
    w.start("y:NodeLabel", &[])?;
    if !body.is_empty() {
        w.text(body)?;
    }
    w.end("y:NodeLabel")?;

    w.end("y:UMLNoteNode")?;
    w.end("data")?;
    w.end("node")
}

fn write_edge(w: &mut XmlWriter, edge: &Edge) -> Result<()> {
    w.start(
        "edge",
        &[
            ("source", edge.source.as_str()),
            ("target", edge.target.as_str()),
        ],
    )?;
    w.start("data", &[("key", "d10")])?;
    w.start("y:PolyLineEdge", &[])?;

    let source = edge.source_point.unwrap_or_default();
    let target = edge.target_point.unwrap_or_default();
    w.empty(
        "y:Path",
        &[
            ("sx", coord(source.x).as_str()),
            ("sy", coord(source.y).as_str()),
            ("tx", coord(target.x).as_str()),
            ("ty", coord(target.y).as_str()),
        ],
    )?;
    if let Some(polyline) = edge.polyline.as_ref() {
        for point in polyline {
            write_path_point(w, *point)?;
        }
    }

    w.empty(
        "y:LineStyle",
        &[("color", "#000000"), ("type", "line"), ("width", "1.0")],
    )?;
    w.empty("y:Arrows", &[("source", "none"), ("target", "standard")])?;

    let mut label_attrs: Vec<(&str, &str)> = EDGE_LABEL_ATTRS.to_vec();
    let label_point = match edge.label {
        Some(LabelGeometry::Point(p)) => Some(p),
        _ => None,
    };
    let (x, y);
    if let Some(point) = label_point {
        x = coord(point.x);
        y = coord(point.y);
        label_attrs.push(("x", x.as_str()));
        label_attrs.push(("y", y.as_str()));
    }
    w.start("y:EdgeLabel", &label_attrs)?;
    if let Some(action) = edge.action.as_ref() {
        w.text(&action_text(std::slice::from_ref(action)))?;
    }
    w.end("y:EdgeLabel")?;

    w.end("y:PolyLineEdge")?;
    w.end("data")?;
    w.end("edge")
}

fn write_geometry(w: &mut XmlWriter, rect: Rect) -> Result<()> {
    w.empty(
        "y:Geometry",
        &[
            ("x", coord(rect.x).as_str()),
            ("y", coord(rect.y).as_str()),
            ("width", coord(rect.width).as_str()),
            ("height", coord(rect.height).as_str()),
        ],
    )
}

fn write_path_point(w: &mut XmlWriter, point: Point) -> Result<()> {
    w.empty(
        "y:Point",
        &[("x", coord(point.x).as_str()), ("y", coord(point.y).as_str())],
    )
}

fn write_border(w: &mut XmlWriter) -> Result<()> {
    w.empty(
        "y:BorderStyle",
        &[("color", "#000000"), ("type", "line"), ("width", "1.0")],
    )
}

fn write_title_label(w: &mut XmlWriter, title: &str) -> Result<()> {
    if title.is_empty() {
        w.start("y:NodeLabel", &[])?;
    } else {
        w.start("y:NodeLabel", TITLE_LABEL_ATTRS)?;
        w.text(title)?;
    }
    w.end("y:NodeLabel")
}

fn write_action_label(w: &mut XmlWriter, actions: &[crate::model::Action]) -> Result<()> {
    w.start("y:NodeLabel", ACTION_LABEL_ATTRS)?;
    w.text("\n\n")?;
    let text = action_text(actions);
    if !text.is_empty() {
        w.text(&text)?;
    }
    w.end("y:NodeLabel")?;
    Ok(())
}
