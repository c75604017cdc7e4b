//! Post-decode normalization: identifier reconstruction, composite
//! promotion, structural checks and action hygiene.
//!
//! The passes run in a fixed order and are idempotent as a whole:
//! normalizing an already-normalized document changes nothing.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::NodeGeometry;
use crate::model::{ActionKind, Document, Node, NodeKind, StateMachine};
use crate::options::{DoubleActionPolicy, ReadOptions};
use crate::text::append_str;

/// Run all passes in order.
pub fn reconstruct_document(doc: &mut Document, opts: &ReadOptions) -> Result<()> {
    reconstruct_identifiers(doc)?;
    promote_composites(doc);
    check_structure(doc, opts.skip_geometry, opts.check_initial)?;
    action_hygiene(doc, opts.double_actions)?;
    Ok(())
}

/// Synthesize ids for unnamed nodes and edges and make every edge
/// endpoint resolve.
///
/// Naming policy: `g<n>` for top-level state-machine nodes, `n<n>` for
/// their direct children, `<parent>::n<n>` deeper down. The counter is
/// per sibling group and skips over ids already taken anywhere in the
/// document.
pub fn reconstruct_identifiers(doc: &mut Document) -> Result<()> {
    let mut used = FxHashSet::default();
    let mut duplicate = None;
    for sm in &doc.state_machines {
        sm.root.visit(&mut |node| {
            if !node.id.is_empty() && !used.insert(node.id.clone()) && duplicate.is_none() {
                duplicate = Some(node.id.clone());
            }
        });
    }
    if let Some(id) = duplicate {
        warn!(id = %id, "node id is not unique within the document");
        return Err(CyberiadaError::format(format!("duplicate node id {id}")));
    }

    // old-id -> new-id; several nodes may share the old empty id, edges
    // that referenced it are rewired to the first renamed node
    let mut renamed = FxHashMap::default();
    for sm in &mut doc.state_machines {
        rename_group(
            std::slice::from_mut(&mut sm.root),
            0,
            None,
            &mut used,
            &mut renamed,
        );
    }

    for sm in &mut doc.state_machines {
        let StateMachine { root, edges } = sm;

        for edge in edges.iter_mut() {
            for endpoint in [&mut edge.source, &mut edge.target] {
                if endpoint.is_empty() {
                    let Some(new_id) = renamed.get(endpoint.as_str()) else {
                        warn!("cannot find a replacement for an empty endpoint id");
                        return Err(CyberiadaError::format(
                            "unresolved empty edge endpoint",
                        ));
                    };
                    *endpoint = new_id.clone();
                }
            }
        }

        let mut edge_ids: FxHashSet<String> = edges
            .iter()
            .filter(|e| !e.id.is_empty())
            .map(|e| e.id.clone())
            .collect();
        let mut num = 0u32;
        for edge in edges.iter_mut() {
            if root.find_by_id(&edge.source).is_none() || root.find_by_id(&edge.target).is_none() {
                warn!(
                    source = %edge.source,
                    target = %edge.target,
                    "cannot find the source/target node for an edge"
                );
                return Err(CyberiadaError::format(format!(
                    "unresolved edge {} -> {}",
                    edge.source, edge.target
                )));
            }
            if edge.id.is_empty() {
                let mut id = format!("{}-{}", edge.source, edge.target);
                while edge_ids.contains(&id) {
                    id = format!("{}-{}#{num}", edge.source, edge.target);
                    num += 1;
                }
                edge_ids.insert(id.clone());
                edge.id = id;
            }
        }
    }
    Ok(())
}

fn rename_group(
    nodes: &mut [Node],
    level: usize,
    parent_id: Option<&str>,
    used: &mut FxHashSet<String>,
    renamed: &mut FxHashMap<String, String>,
) {
    let mut num = 0u32;
    for node in nodes.iter_mut() {
        if node.id.is_empty() {
            let id = loop {
                let candidate = match (level, parent_id) {
                    (0, _) => format!("g{num}"),
                    (1, _) => format!("n{num}"),
                    (_, Some(parent)) => format!("{parent}::n{num}"),
                    (_, None) => format!("n{num}"),
                };
                num += 1;
                if used.insert(candidate.clone()) {
                    break candidate;
                }
            };
            renamed
                .entry(node.id.clone())
                .or_insert_with(|| id.clone());
            node.id = id;
        }
        let id = node.id.clone();
        rename_group(&mut node.children, level + 1, Some(&id), used, renamed);
    }
}

/// A simple state that gained a non-comment child is a composite state.
pub fn promote_composites(doc: &mut Document) {
    for sm in &mut doc.state_machines {
        sm.root.visit_mut(&mut |node| {
            if node.kind == NodeKind::SimpleState
                && node.children.iter().any(|child| !child.kind.is_comment())
            {
                node.kind = NodeKind::CompositeState;
            }
        });
    }
}

/// Structural invariants: initial pseudostate discipline per region and
/// geometry kind discipline per node. Zero-sized rectangles are cleaned
/// up along the way.
pub fn check_structure(
    doc: &mut Document,
    skip_geometry: bool,
    check_initial: bool,
) -> Result<()> {
    for sm in &mut doc.state_machines {
        check_region(&sm.root, &sm.edges, check_initial, true)?;
        if !skip_geometry {
            check_geometry(&mut sm.root)?;
        }
    }
    Ok(())
}

fn check_region(
    node: &Node,
    edges: &[crate::model::Edge],
    check_initial: bool,
    toplevel: bool,
) -> Result<()> {
    let initials: Vec<&Node> = node
        .children
        .iter()
        .filter(|child| child.kind == NodeKind::Initial)
        .collect();
    if initials.len() > 1 {
        warn!(region = %node.id, count = initials.len(), "too many initial pseudostates");
        return Err(CyberiadaError::format(format!(
            "{} initial pseudostates inside {}",
            initials.len(),
            node.id
        )));
    }
    if let Some(initial) = initials.first() {
        let outgoing = edges.iter().filter(|e| e.source == initial.id).count();
        if outgoing > 1 {
            warn!(initial = %initial.id, outgoing, "too many edges from an initial pseudostate");
            return Err(CyberiadaError::format(format!(
                "{} edges from the initial pseudostate {}",
                outgoing, initial.id
            )));
        }
    }
    if check_initial && toplevel && initials.len() != 1 {
        warn!(sm = %node.id, "the top level must contain a single initial pseudostate");
        return Err(CyberiadaError::format(
            "missing initial pseudostate on the top level",
        ));
    }
    for child in &node.children {
        check_region(child, edges, check_initial, false)?;
    }
    Ok(())
}

fn check_geometry(node: &mut Node) -> Result<()> {
    if node.kind.has_point_geometry() {
        if matches!(node.geometry, Some(NodeGeometry::Rect(_))) {
            warn!(node = %node.id, "point node carries rect geometry");
            return Err(CyberiadaError::format(format!(
                "point node {} carries rect geometry",
                node.id
            )));
        }
    } else if node.kind.has_rect_geometry() {
        if matches!(node.geometry, Some(NodeGeometry::Point(_))) {
            warn!(node = %node.id, "rect node carries point geometry");
            return Err(CyberiadaError::format(format!(
                "rect node {} carries point geometry",
                node.id
            )));
        }
        if matches!(node.geometry, Some(NodeGeometry::Rect(rect)) if rect.is_empty()) {
            node.geometry = None;
        }
    }
    for child in &mut node.children {
        check_geometry(child)?;
    }
    Ok(())
}

/// Duplicate entry/exit detection and empty-action removal.
pub fn action_hygiene(doc: &mut Document, policy: DoubleActionPolicy) -> Result<()> {
    for sm in &mut doc.state_machines {
        hygiene_node(&mut sm.root, policy)?;
    }
    Ok(())
}

fn hygiene_node(node: &mut Node, policy: DoubleActionPolicy) -> Result<()> {
    match policy {
        DoubleActionPolicy::Reject => check_action_doubles(node)?,
        DoubleActionPolicy::Merge => join_action_doubles(node),
    }
    node.actions.retain(|action| !action.is_empty());
    for child in &mut node.children {
        hygiene_node(child, policy)?;
    }
    Ok(())
}

fn check_action_doubles(node: &Node) -> Result<()> {
    for kind in [ActionKind::Entry, ActionKind::Exit] {
        let count = node.actions.iter().filter(|a| a.kind == kind).count();
        if count > 1 {
            warn!(node = %node.id, kind = %kind, "multiple entry/exit actions");
            return Err(CyberiadaError::format(format!(
                "multiple {kind} actions on node {}",
                node.id
            )));
        }
    }
    Ok(())
}

fn join_action_doubles(node: &mut Node) {
    for kind in [ActionKind::Entry, ActionKind::Exit] {
        let Some(first) = node.actions.iter().position(|a| a.kind == kind) else {
            continue;
        };
        let mut merged = Vec::new();
        let mut i = first + 1;
        while i < node.actions.len() {
            if node.actions[i].kind == kind {
                merged.push(node.actions.remove(i).behavior);
            } else {
                i += 1;
            }
        }
        for behavior in merged {
            append_str(&mut node.actions[first].behavior, &behavior, Some("\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;

    fn doc_with_unnamed_children() -> Document {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        sm.root.children.push(Node::new(""));
        sm.root.children.push(Node::new(""));
        sm.root.children.push(Node::new(""));
        doc.state_machines.push(sm);
        doc
    }

    #[test]
    fn unnamed_nodes_get_sequential_ids() {
        let mut doc = doc_with_unnamed_children();
        reconstruct_identifiers(&mut doc).unwrap();
        let ids: Vec<&str> = doc.state_machines[0]
            .root
            .children
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["n0", "n1", "n2"]);
    }

    #[test]
    fn edges_with_empty_endpoints_are_rewired() {
        let mut doc = doc_with_unnamed_children();
        doc.state_machines[0].root.children.push(Node::new("s1"));
        doc.state_machines[0]
            .add_edge("", "", "s1", false)
            .unwrap();
        reconstruct_identifiers(&mut doc).unwrap();
        let edge = &doc.state_machines[0].edges[0];
        assert_eq!(edge.source, "n0");
        assert_eq!(edge.id, "n0-s1");
    }

    #[test]
    fn synthesized_ids_avoid_collisions() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        sm.root.children.push(Node::new("n0"));
        sm.root.children.push(Node::new(""));
        doc.state_machines.push(sm);
        reconstruct_identifiers(&mut doc).unwrap();
        assert_eq!(doc.state_machines[0].root.children[1].id, "n1");
    }

    #[test]
    fn deep_ids_carry_the_parent_prefix() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut composite = Node::with_kind("c", NodeKind::CompositeState);
        composite.children.push(Node::new(""));
        sm.root.children.push(composite);
        doc.state_machines.push(sm);
        reconstruct_identifiers(&mut doc).unwrap();
        assert_eq!(
            doc.state_machines[0].root.children[0].children[0].id,
            "c::n0"
        );
    }

    #[test]
    fn duplicate_node_ids_are_a_format_error() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        sm.root.children.push(Node::new("dup"));
        sm.root.children.push(Node::new("dup"));
        doc.state_machines.push(sm);
        assert!(reconstruct_identifiers(&mut doc).is_err());
    }

    #[test]
    fn unresolved_edges_are_a_format_error() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        sm.root.children.push(Node::new("a"));
        sm.add_edge("e1", "a", "ghost", false).unwrap();
        doc.state_machines.push(sm);
        assert!(reconstruct_identifiers(&mut doc).is_err());
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let mut doc = doc_with_unnamed_children();
        doc.state_machines[0]
            .add_edge("", "", "", false)
            .unwrap();
        let opts = ReadOptions::default();
        reconstruct_document(&mut doc, &opts).unwrap();
        let once = doc.clone();
        reconstruct_document(&mut doc, &opts).unwrap();
        assert_eq!(doc, once);
    }

    #[test]
    fn simple_states_with_children_become_composite() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut state = Node::new("c");
        state.children.push(Node::new("inner"));
        let mut commented = Node::new("s");
        commented
            .children
            .push(Node::with_kind("note", NodeKind::Comment));
        sm.root.children.push(state);
        sm.root.children.push(commented);
        doc.state_machines.push(sm);
        promote_composites(&mut doc);
        assert_eq!(
            doc.state_machines[0].root.children[0].kind,
            NodeKind::CompositeState
        );
        // a comment child alone does not promote
        assert_eq!(
            doc.state_machines[0].root.children[1].kind,
            NodeKind::SimpleState
        );
    }

    #[test]
    fn two_initials_in_one_region_are_rejected() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        sm.root
            .children
            .push(Node::with_kind("i1", NodeKind::Initial));
        sm.root
            .children
            .push(Node::with_kind("i2", NodeKind::Initial));
        doc.state_machines.push(sm);
        assert!(check_structure(&mut doc, false, false).is_err());
    }

    #[test]
    fn check_initial_requires_a_top_level_initial() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        sm.root.children.push(Node::new("s1"));
        doc.state_machines.push(sm);
        assert!(check_structure(&mut doc, false, false).is_ok());
        assert!(check_structure(&mut doc, false, true).is_err());
    }

    #[test]
    fn geometry_kind_discipline_is_enforced() {
        use crate::geometry::{NodeGeometry, Point, Rect};

        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut initial = Node::with_kind("i1", NodeKind::Initial);
        initial.geometry = Some(NodeGeometry::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        sm.root.children.push(initial);
        doc.state_machines.push(sm);
        assert!(check_structure(&mut doc, false, false).is_err());
        // skipping geometry skips the discipline check as well
        assert!(check_structure(&mut doc, true, false).is_ok());

        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut state = Node::new("s1");
        state.geometry = Some(NodeGeometry::Point(Point::new(1.0, 2.0)));
        sm.root.children.push(state);
        doc.state_machines.push(sm);
        assert!(check_structure(&mut doc, false, false).is_err());
    }

    #[test]
    fn empty_rects_are_cleaned_up() {
        use crate::geometry::{NodeGeometry, Rect};

        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut state = Node::new("s1");
        state.geometry = Some(NodeGeometry::Rect(Rect::new(5.0, 5.0, 0.0, 0.0)));
        sm.root.children.push(state);
        doc.state_machines.push(sm);
        check_structure(&mut doc, false, false).unwrap();
        assert!(doc.state_machines[0].root.children[0].geometry.is_none());
    }

    #[test]
    fn duplicate_entry_actions_reject_or_merge() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut state = Node::new("s1");
        state.actions.push(Action::for_node("entry", "", "a()"));
        state.actions.push(Action::for_node("entry", "", "b()"));
        sm.root.children.push(state);
        doc.state_machines.push(sm);

        let mut rejected = doc.clone();
        assert!(action_hygiene(&mut rejected, DoubleActionPolicy::Reject).is_err());

        action_hygiene(&mut doc, DoubleActionPolicy::Merge).unwrap();
        let actions = &doc.state_machines[0].root.children[0].actions;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].behavior, "a()\nb()");
    }

    #[test]
    fn empty_actions_are_removed() {
        let mut doc = Document::new();
        let mut sm = StateMachine::new("g0");
        let mut state = Node::new("s1");
        state.actions.push(Action::for_node("entry", "", ""));
        state.actions.push(Action::for_node("exit", "", "x()"));
        sm.root.children.push(state);
        doc.state_machines.push(sm);
        action_hygiene(&mut doc, DoubleActionPolicy::Reject).unwrap();
        let actions = &doc.state_machines[0].root.children[0].actions;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Exit);
    }
}
