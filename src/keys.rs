//! Shared wire-format vocabulary: format tags, GraphML key tables and
//! the vertex-kind names of the native dialect.

use crate::model::NodeKind;

pub(crate) const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";
pub(crate) const YED_NS: &str = "http://www.yworks.com/xml/graphml";

pub(crate) const FORMAT_CYBERIADA10: &str = "Cyberiada-GraphML-1.0";
pub(crate) const FORMAT_BERLOGA: &str = "yEd Berloga";
pub(crate) const FORMAT_OSTRANNA: &str = "yEd Ostranna";

/// Title of the formal comment that carries the document metadata.
pub(crate) const META_NODE_TITLE: &str = "CGML_META";
/// Default id of a freshly created metadata comment node.
pub(crate) const META_NODE_DEFAULT_ID: &str = "nMeta";

/// One `<key>` declaration: default id, owning element, logical
/// attribute name and optional attribute type.
pub(crate) struct GraphmlKey {
    pub id: &'static str,
    pub for_element: &'static str,
    pub name: &'static str,
    pub attr_type: Option<&'static str>,
}

/// The native dialect's key table, in declaration order.
pub(crate) const CYB_KEYS: &[GraphmlKey] = &[
    GraphmlKey { id: "gFormat", for_element: "graphml", name: "format", attr_type: Some("string") },
    GraphmlKey { id: "dName", for_element: "graph", name: "name", attr_type: Some("string") },
    GraphmlKey { id: "dName", for_element: "node", name: "name", attr_type: Some("string") },
    GraphmlKey { id: "dStateMachine", for_element: "graph", name: "stateMachine", attr_type: Some("string") },
    GraphmlKey { id: "dSubmachineState", for_element: "node", name: "submachineState", attr_type: Some("string") },
    GraphmlKey { id: "dGeometry", for_element: "graph", name: "geometry", attr_type: None },
    GraphmlKey { id: "dGeometry", for_element: "node", name: "geometry", attr_type: None },
    GraphmlKey { id: "dGeometry", for_element: "edge", name: "geometry", attr_type: None },
    GraphmlKey { id: "dSourcePoint", for_element: "edge", name: "sourcePoint", attr_type: None },
    GraphmlKey { id: "dTargetPoint", for_element: "edge", name: "targetPoint", attr_type: None },
    GraphmlKey { id: "dLabelGeometry", for_element: "edge", name: "labelGeometry", attr_type: None },
    GraphmlKey { id: "dNote", for_element: "node", name: "note", attr_type: Some("string") },
    GraphmlKey { id: "dVertex", for_element: "node", name: "vertex", attr_type: Some("string") },
    GraphmlKey { id: "dData", for_element: "node", name: "data", attr_type: Some("string") },
    GraphmlKey { id: "dData", for_element: "edge", name: "data", attr_type: Some("string") },
    GraphmlKey { id: "dMarkup", for_element: "node", name: "markup", attr_type: Some("string") },
    GraphmlKey { id: "dColor", for_element: "node", name: "color", attr_type: Some("string") },
    GraphmlKey { id: "dColor", for_element: "edge", name: "color", attr_type: Some("string") },
    GraphmlKey { id: "dPivot", for_element: "edge", name: "pivot", attr_type: Some("string") },
    GraphmlKey { id: "dChunk", for_element: "edge", name: "chunk", attr_type: Some("string") },
];

/// One `<key>` declaration of the legacy yFiles schema; `yfiles_type`
/// replaces the attribute name/type pair for graphics keys.
pub(crate) struct YedKey {
    pub id: &'static str,
    pub for_element: &'static str,
    pub name: Option<&'static str>,
    pub attr_type: Option<&'static str>,
    pub yfiles_type: Option<&'static str>,
}

pub(crate) const YED_KEYS: &[YedKey] = &[
    YedKey { id: "d0", for_element: "graph", name: Some("description"), attr_type: Some("string"), yfiles_type: None },
    YedKey { id: "d1", for_element: "port", name: None, attr_type: None, yfiles_type: Some("portgraphics") },
    YedKey { id: "d2", for_element: "port", name: None, attr_type: None, yfiles_type: Some("portgeometry") },
    YedKey { id: "d3", for_element: "port", name: None, attr_type: None, yfiles_type: Some("portuserdata") },
    YedKey { id: "d4", for_element: "node", name: Some("url"), attr_type: Some("string"), yfiles_type: None },
    YedKey { id: "d5", for_element: "node", name: Some("description"), attr_type: Some("string"), yfiles_type: None },
    YedKey { id: "d6", for_element: "node", name: None, attr_type: None, yfiles_type: Some("nodegraphics") },
    YedKey { id: "d7", for_element: "graphml", name: None, attr_type: None, yfiles_type: Some("resources") },
    YedKey { id: "d8", for_element: "edge", name: Some("url"), attr_type: Some("string"), yfiles_type: None },
    YedKey { id: "d9", for_element: "edge", name: Some("description"), attr_type: Some("string"), yfiles_type: None },
    YedKey { id: "d10", for_element: "edge", name: None, attr_type: None, yfiles_type: Some("edgegraphics") },
];

/// Wire names of the pseudostate and vertex kinds of the native dialect.
pub(crate) const VERTEX_KINDS: &[(&str, NodeKind)] = &[
    ("initial", NodeKind::Initial),
    ("final", NodeKind::Final),
    ("choice", NodeKind::Choice),
    ("terminate", NodeKind::Terminate),
    ("shallowHistory", NodeKind::ShallowHistory),
    ("deepHistory", NodeKind::DeepHistory),
    ("entryPoint", NodeKind::EntryPoint),
    ("exitPoint", NodeKind::ExitPoint),
    ("fork", NodeKind::Fork),
    ("join", NodeKind::Join),
];
