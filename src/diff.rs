//! Graph-isomorphism check and structured difference between two state
//! machines.
//!
//! Comparison classifies rather than rejects: two well-formed machines
//! always produce a verdict plus the node/edge lists explaining it. Only
//! the `require_initial` precondition can fail.

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::model::{Action, ActionKind, Edge, EdgeKind, Node, NodeKind, StateMachine, actions_equal};

/// Comparison options.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiffOptions {
    /// Leave comment nodes and comment edges out of the comparison.
    pub ignore_comments: bool,
    /// Require a single top-level initial pseudostate with one outgoing
    /// edge in both machines and report initial-target changes.
    pub require_initial: bool,
}

/// The comparison verdict, strongest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Same structure, same ids, no differences at all.
    Identical,
    /// Same structure; only identifiers differ.
    Equal,
    /// A node bijection exists but matched pairs differ beyond ids.
    Isomorphic,
    /// No full bijection; states, edges or the initial target differ.
    NonIsomorphic,
}

/// What made two machines non-isomorphic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffFlags {
    pub states: bool,
    pub initial: bool,
    pub edges: bool,
}

/// Per-pair node difference flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeDiff {
    pub id: bool,
    pub kind: bool,
    pub title: bool,
    pub actions: bool,
    pub sm_link: bool,
    pub children: bool,
    pub edges: bool,
}

impl NodeDiff {
    pub fn any(&self) -> bool {
        self.id || self.kind || self.title || self.actions || self.sm_link || self.children
            || self.edges
    }

    fn only_id(&self) -> bool {
        self.id
            && !(self.kind || self.title || self.actions || self.sm_link || self.children
                || self.edges)
    }
}

/// Per-pair edge difference flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeDiff {
    pub id: bool,
    pub action: bool,
}

impl EdgeDiff {
    pub fn any(&self) -> bool {
        self.id || self.action
    }
}

/// The full comparison result. Node and edge references borrow from the
/// compared machines.
pub struct IsomorphismResult<'a> {
    pub verdict: Verdict,
    pub flags: DiffFlags,
    /// Target of the second machine's initial transition when it moved.
    pub new_initial: Option<&'a Node>,
    /// Matched node pairs with their difference flags.
    pub diff_nodes: Vec<(&'a Node, &'a Node, NodeDiff)>,
    /// Nodes of the second machine with no counterpart in the first.
    pub sm2_new_nodes: Vec<&'a Node>,
    /// Nodes of the first machine with no counterpart in the second.
    pub sm1_missing_nodes: Vec<&'a Node>,
    /// Matched edge pairs with their difference flags.
    pub diff_edges: Vec<(&'a Edge, &'a Edge, EdgeDiff)>,
    pub sm2_new_edges: Vec<&'a Edge>,
    pub sm1_missing_edges: Vec<&'a Edge>,
}

struct Vertex<'a> {
    node: &'a Node,
    deg_in: usize,
    deg_out: usize,
    matched: bool,
}

/// Compare two state machines up to node-identifier renaming.
pub fn check_isomorphism<'a>(
    sm1: &'a StateMachine,
    sm2: &'a StateMachine,
    opts: DiffOptions,
) -> Result<IsomorphismResult<'a>> {
    let initial1 = top_initial(sm1, opts.require_initial)?;
    let initial2 = top_initial(sm2, opts.require_initial)?;

    let mut v1 = enumerate(sm1, opts.ignore_comments);
    let mut v2 = enumerate(sm2, opts.ignore_comments);
    if v1.is_empty() || v2.is_empty() {
        warn!("cannot compare empty state machines");
        return Err(CyberiadaError::bad_parameter("empty state machine"));
    }
    let (_, e1_count) = sm1.size(opts.ignore_comments);
    let (_, e2_count) = sm2.size(opts.ignore_comments);

    let perm = permutation_matrix(&v1, &v2);

    let mut verdict = if v1.len() == v2.len() && e1_count == e2_count {
        Verdict::Identical
    } else {
        Verdict::NonIsomorphic
    };
    let mut flags = DiffFlags::default();
    let mut diff_nodes = Vec::new();
    let mut sm1_missing_nodes = Vec::new();
    let mut sm2_new_nodes = Vec::new();

    for i in 0..v1.len() {
        let matched_j = (0..v2.len()).find(|&j| perm[i][j]);
        match matched_j {
            Some(j) => {
                let node_diff = compare_nodes(&v1[i], &v2[j]);
                if node_diff.any() {
                    diff_nodes.push((v1[i].node, v2[j].node, node_diff));
                    if !flags.states {
                        if verdict == Verdict::Identical {
                            verdict = Verdict::Equal;
                        }
                        if !node_diff.only_id() {
                            verdict = Verdict::Isomorphic;
                        }
                    }
                }
                v1[i].matched = true;
                v2[j].matched = true;
            }
            None => {
                flags.states = true;
                sm1_missing_nodes.push(v1[i].node);
            }
        }
    }
    for vertex in &v2 {
        if !vertex.matched {
            flags.states = true;
            sm2_new_nodes.push(vertex.node);
        }
    }

    let mut diff_edges = Vec::new();
    let mut sm1_missing_edges = Vec::new();
    let mut sm2_new_edges = Vec::new();
    let mut consumed: FxHashSet<&str> = FxHashSet::default();

    for e1 in &sm1.edges {
        if opts.ignore_comments && e1.kind == EdgeKind::CommentEdge {
            continue;
        }
        let mapped_source = map_through(&v1, &v2, &perm, &e1.source);
        let mapped_target = map_through(&v1, &v2, &perm, &e1.target);
        let (Some(source), Some(target)) = (mapped_source, mapped_target) else {
            flags.edges = true;
            sm1_missing_edges.push(e1);
            continue;
        };
        let found = sm2.edges.iter().find(|e2| {
            !(opts.ignore_comments && e2.kind == EdgeKind::CommentEdge)
                && e2.source == source.id
                && e2.target == target.id
                && !consumed.contains(e2.id.as_str())
        });
        match found {
            Some(e2) => {
                let mut edge_diff = EdgeDiff::default();
                if e1.id != e2.id {
                    edge_diff.id = true;
                    if verdict == Verdict::Identical {
                        verdict = Verdict::Equal;
                    }
                }
                if !edge_actions_equal(&e1.action, &e2.action) {
                    edge_diff.action = true;
                    if matches!(verdict, Verdict::Identical | Verdict::Equal) {
                        verdict = Verdict::Isomorphic;
                    }
                }
                if edge_diff.any() {
                    diff_edges.push((e1, e2, edge_diff));
                }
                consumed.insert(e2.id.as_str());
            }
            None => {
                flags.edges = true;
                sm1_missing_edges.push(e1);
            }
        }
    }
    for e2 in &sm2.edges {
        if opts.ignore_comments && e2.kind == EdgeKind::CommentEdge {
            continue;
        }
        if !consumed.contains(e2.id.as_str()) {
            flags.edges = true;
            sm2_new_edges.push(e2);
        }
    }

    // initial transition retargeting
    let mut new_initial = None;
    if opts.require_initial {
        let edge1 = initial1.1.expect("checked by top_initial");
        let edge2 = initial2.1.expect("checked by top_initial");
        let mapped = map_through(&v1, &v2, &perm, &edge1.target);
        if mapped.map(|node| node.id.as_str()) != Some(edge2.target.as_str()) {
            flags.initial = true;
            new_initial = sm2.find_node(&edge2.target);
        }
    }

    let verdict = if flags.states || flags.edges || flags.initial {
        Verdict::NonIsomorphic
    } else {
        verdict
    };

    Ok(IsomorphismResult {
        verdict,
        flags,
        new_initial,
        diff_nodes,
        sm2_new_nodes,
        sm1_missing_nodes,
        diff_edges,
        sm2_new_edges,
        sm1_missing_edges,
    })
}

/// The top-level initial pseudostate and its outgoing edge. With
/// `check` set, exactly one of each is required.
fn top_initial<'a>(
    sm: &'a StateMachine,
    check: bool,
) -> Result<(Option<&'a Node>, Option<&'a Edge>)> {
    let initials: Vec<&Node> = sm
        .root
        .children
        .iter()
        .filter(|n| n.kind == NodeKind::Initial)
        .collect();
    if check && initials.len() != 1 {
        warn!(sm = %sm.root.id, "a single top-level initial pseudostate is required");
        return Err(CyberiadaError::format(
            "comparison requires a single top-level initial pseudostate",
        ));
    }
    let initial = initials.first().copied();
    let edge = initial.and_then(|node| sm.edges.iter().find(|e| e.source == node.id));
    if check && edge.is_none() {
        warn!(sm = %sm.root.id, "no edge from the top-level initial pseudostate");
        return Err(CyberiadaError::format(
            "no edge from the top-level initial pseudostate",
        ));
    }
    Ok((initial, edge))
}

fn enumerate<'a>(sm: &'a StateMachine, ignore_comments: bool) -> Vec<Vertex<'a>> {
    fn collect<'a>(
        sm: &'a StateMachine,
        nodes: &'a [Node],
        ignore_comments: bool,
        out: &mut Vec<Vertex<'a>>,
    ) {
        for node in nodes {
            if ignore_comments && node.kind.is_comment() {
                continue;
            }
            let (deg_in, deg_out) = sm.degrees(&node.id);
            out.push(Vertex {
                node,
                deg_in,
                deg_out,
                matched: false,
            });
            collect(sm, &node.children, ignore_comments, out);
        }
    }
    let mut out = Vec::new();
    collect(sm, &sm.root.children, ignore_comments, &mut out);
    out
}

fn kinds_compatible(a: NodeKind, b: NodeKind) -> bool {
    a == b
        || (a == NodeKind::SimpleState && b == NodeKind::CompositeState)
        || (a == NodeKind::CompositeState && b == NodeKind::SimpleState)
}

/// Build the node permutation matrix: the compatibility matrix when it
/// is unambiguous, otherwise the best greedy matching over all starting
/// cells.
fn permutation_matrix(v1: &[Vertex<'_>], v2: &[Vertex<'_>]) -> Vec<Vec<bool>> {
    let n1 = v1.len();
    let n2 = v2.len();
    let mut m = vec![vec![false; n2]; n1];
    let mut row_count = vec![0usize; n1];
    let mut col_count = vec![0usize; n2];
    for i in 0..n1 {
        for j in 0..n2 {
            if kinds_compatible(v1[i].node.kind, v2[j].node.kind)
                && v1[i].deg_in <= v2[j].deg_in
                && v1[i].deg_out <= v2[j].deg_out
            {
                m[i][j] = true;
                row_count[i] += 1;
                col_count[j] += 1;
            }
        }
    }

    let ambiguous =
        row_count.iter().any(|&c| c > 1) || col_count.iter().any(|&c| c > 1);
    if !ambiguous {
        return m;
    }

    let mut best = vec![vec![false; n2]; n1];
    let mut best_total = 0usize;
    for i in 0..n1 {
        for j in 0..n2 {
            if !m[i][j] {
                continue;
            }
            let mut p = vec![vec![false; n2]; n1];
            let mut row_used = vec![false; n1];
            let mut col_used = vec![false; n2];
            p[i][j] = true;
            row_used[i] = true;
            col_used[j] = true;
            let mut total = 1usize;
            for x in 0..n1 {
                for y in 0..n2 {
                    if (x == i && y == j) || !m[x][y] || row_used[x] || col_used[y] {
                        continue;
                    }
                    p[x][y] = true;
                    row_used[x] = true;
                    col_used[y] = true;
                    total += 1;
                }
            }
            if total > best_total {
                best = p;
                best_total = total;
            }
        }
    }
    best
}

fn map_through<'a>(
    v1: &[Vertex<'_>],
    v2: &[Vertex<'a>],
    perm: &[Vec<bool>],
    id: &str,
) -> Option<&'a Node> {
    let i = v1.iter().position(|v| v.node.id == id)?;
    let j = (0..v2.len()).find(|&j| perm[i][j])?;
    Some(v2[j].node)
}

fn compare_nodes(a: &Vertex<'_>, b: &Vertex<'_>) -> NodeDiff {
    let mut diff = NodeDiff::default();
    if a.node.id != b.node.id {
        diff.id = true;
    }
    if !kinds_compatible(a.node.kind, b.node.kind) {
        diff.kind = true;
    }
    if let (Some(t1), Some(t2)) = (&a.node.title, &b.node.title) {
        if t1 != t2 {
            diff.title = true;
        }
    }
    if !actions_equal(&a.node.actions, &b.node.actions) {
        diff.actions = true;
    }
    if let (Some(l1), Some(l2)) = (&a.node.link, &b.node.link) {
        if l1.r#ref != l2.r#ref {
            diff.sm_link = true;
        }
    }
    if a.node.children.len() != b.node.children.len() {
        diff.children = true;
    }
    if a.deg_in != b.deg_in || a.deg_out != b.deg_out {
        diff.edges = true;
    }
    diff
}

fn edge_actions_equal(a: &Option<Action>, b: &Option<Action>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => actions_equal(std::slice::from_ref(a), std::slice::from_ref(b)),
        _ => false,
    }
}

// ----------------------------------------------------------------------------
// Fine-grained action-list comparison
// ----------------------------------------------------------------------------

/// How two action lists differ, beyond plain inequality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionListDiff {
    /// Different number of actions.
    pub count: bool,
    /// Different sets of action kinds.
    pub kinds: bool,
    /// A matching action pair differs only in its guard.
    pub guards: bool,
    /// The same behavior commands appear in a different order.
    pub behavior_order: bool,
    /// A behavior command differs only in its arguments.
    pub behavior_args: bool,
    /// A behavior command is present on one side only.
    pub behavior_actions: bool,
}

impl ActionListDiff {
    pub fn any(&self) -> bool {
        self.count
            || self.kinds
            || self.guards
            || self.behavior_order
            || self.behavior_args
            || self.behavior_actions
    }
}

/// Report how two node action lists differ; an empty result means they
/// match.
pub fn compare_action_lists(a: &[Action], b: &[Action]) -> ActionListDiff {
    let mut diff = ActionListDiff::default();
    if a.is_empty() && b.is_empty() {
        return diff;
    }
    if a.is_empty() != b.is_empty() {
        diff.count = true;
        diff.kinds = true;
        diff.behavior_actions = true;
        return diff;
    }

    if a.len() != b.len() {
        diff.count = true;
    }
    let kind_set = |actions: &[Action]| -> FxHashSet<ActionKind> {
        actions.iter().map(|action| action.kind).collect()
    };
    if kind_set(a) != kind_set(b) {
        diff.kinds = true;
    }

    for a1 in a {
        let mut found = false;
        for a2 in b {
            let triggers_match =
                a1.kind == a2.kind && (a2.kind != ActionKind::Transition || a1.trigger == a2.trigger);
            if !triggers_match {
                continue;
            }
            if a1.guard == a2.guard {
                found = true;
                if a1.behavior != a2.behavior {
                    compare_behaviors(&a1.behavior, &a2.behavior, &mut diff);
                }
                break;
            } else if a1.behavior == a2.behavior {
                diff.guards = true;
            }
        }
        if !found {
            diff.behavior_actions = true;
            return diff;
        }
    }
    diff
}

/// Behaviors are newline-separated command lists; detect reordering,
/// argument changes and added/removed commands.
fn compare_behaviors(b1: &str, b2: &str, diff: &mut ActionListDiff) {
    let commands1: Vec<&str> = b1.split('\n').collect();
    let mut commands2: Vec<Option<&str>> = b2.split('\n').map(Some).collect();
    if commands1.len() != commands2.len() {
        diff.behavior_actions = true;
    }
    for (i, command1) in commands1.iter().enumerate() {
        for (j, slot) in commands2.iter_mut().enumerate() {
            let Some(command2) = *slot else { continue };
            if command1 == &command2 {
                if i != j {
                    diff.behavior_order = true;
                }
                *slot = None;
                break;
            } else if command_arguments_differ(command1, command2) {
                diff.behavior_args = true;
                *slot = None;
                break;
            }
        }
    }
    if commands2.iter().any(Option::is_some) {
        diff.behavior_actions = true;
    }
}

/// Two commands "differ by arguments" when they share an equal prefix
/// up to an opening parenthesis and diverge after it.
fn command_arguments_differ(c1: &str, c2: &str) -> bool {
    let mut bracket = false;
    for (a, b) in c1.chars().zip(c2.chars()) {
        if a == b {
            if !bracket && a == '(' {
                bracket = true;
            }
        } else {
            return bracket;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;

    /// initial -> on -> off with an internal entry action on `on`
    fn sample_sm(ids: [&str; 3]) -> StateMachine {
        let [initial, on, off] = ids;
        let mut sm = StateMachine::new("g0");
        sm.root
            .children
            .push(Node::with_kind(initial, NodeKind::Initial));
        let mut on_node = Node::new(on);
        on_node.actions.push(Action::for_node("entry", "", "led_on()"));
        sm.root.children.push(on_node);
        sm.root.children.push(Node::new(off));
        sm.add_edge("init", initial, on, false).unwrap();
        sm.add_edge("toggle", on, off, false).unwrap();
        sm.add_edge("back", off, on, false).unwrap();
        sm
    }

    #[test]
    fn identical_machines() {
        let sm1 = sample_sm(["i1", "on", "off"]);
        let sm2 = sample_sm(["i1", "on", "off"]);
        let result = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        assert_eq!(result.verdict, Verdict::Identical);
        assert!(result.diff_nodes.is_empty());
        assert!(result.diff_edges.is_empty());
    }

    #[test]
    fn renamed_machines_are_equal() {
        let sm1 = sample_sm(["i1", "on", "off"]);
        let sm2 = sample_sm(["start", "bright", "dark"]);
        let result = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        assert_eq!(result.verdict, Verdict::Equal);
        assert_eq!(result.flags, DiffFlags::default());
        // every pair reports exactly the id difference
        assert_eq!(result.diff_nodes.len(), 3);
        assert!(result.diff_nodes.iter().all(|(_, _, d)| d.only_id()));
    }

    #[test]
    fn extra_state_is_non_isomorphic() {
        let sm1 = sample_sm(["i1", "on", "off"]);
        let mut sm2 = sample_sm(["i1", "on", "off"]);
        sm2.root.children.push(Node::new("orphan"));
        let result = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        assert_eq!(result.verdict, Verdict::NonIsomorphic);
        assert!(result.flags.states);
        assert!(!result.flags.edges);
        assert_eq!(result.sm2_new_nodes.len(), 1);
        assert_eq!(result.sm2_new_nodes[0].id, "orphan");
        assert!(result.sm1_missing_nodes.is_empty());
    }

    #[test]
    fn changed_action_is_isomorphic() {
        let sm1 = sample_sm(["i1", "on", "off"]);
        let mut sm2 = sample_sm(["i1", "on", "off"]);
        sm2.root.children[1].actions[0].behavior = "lamp_on()".into();
        let result = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        assert_eq!(result.verdict, Verdict::Isomorphic);
        let (_, _, node_diff) = result
            .diff_nodes
            .iter()
            .find(|(n1, _, _)| n1.id == "on")
            .unwrap();
        assert!(node_diff.actions);
    }

    #[test]
    fn comments_can_be_ignored() {
        let sm1 = sample_sm(["i1", "on", "off"]);
        let mut sm2 = sample_sm(["i1", "on", "off"]);
        sm2.root
            .children
            .push(Node::with_kind("note", NodeKind::Comment));
        let opts = DiffOptions {
            ignore_comments: true,
            ..DiffOptions::default()
        };
        let result = check_isomorphism(&sm1, &sm2, opts).unwrap();
        assert_eq!(result.verdict, Verdict::Identical);

        let strict = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        assert_eq!(strict.verdict, Verdict::NonIsomorphic);
    }

    #[test]
    fn diff_is_symmetric_on_isomorphic_machines() {
        let sm1 = sample_sm(["i1", "on", "off"]);
        let mut sm2 = sample_sm(["start", "bright", "dark"]);
        sm2.root.children[1].actions[0].behavior = "lamp_on()".into();
        let forward = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        let backward = check_isomorphism(&sm2, &sm1, DiffOptions::default()).unwrap();
        assert_eq!(forward.verdict, Verdict::Isomorphic);
        assert_eq!(backward.verdict, Verdict::Isomorphic);
        let flags = |r: &IsomorphismResult<'_>| {
            let mut pairs: Vec<NodeDiff> = r.diff_nodes.iter().map(|(_, _, d)| *d).collect();
            pairs.sort_by_key(|d| (d.id, d.actions, d.title));
            pairs
        };
        assert_eq!(flags(&forward), flags(&backward));
    }

    #[test]
    fn retargeted_initial_is_reported() {
        // the self-loop pins `on` under any degree-compatible mapping,
        // so redirecting the initial transition cannot hide behind a
        // node permutation
        let mut sm1 = sample_sm(["i1", "on", "off"]);
        sm1.add_edge("self", "on", "on", false).unwrap();
        let mut sm2 = sample_sm(["i1", "on", "off"]);
        sm2.add_edge("self", "on", "on", false).unwrap();
        sm2.edges[0].target = "off".into();
        let opts = DiffOptions {
            require_initial: true,
            ..DiffOptions::default()
        };
        let result = check_isomorphism(&sm1, &sm2, opts).unwrap();
        assert_eq!(result.verdict, Verdict::NonIsomorphic);
        assert!(result.flags.initial);
        assert!(result.flags.edges);
        assert_eq!(result.new_initial.map(|n| n.id.as_str()), Some("off"));
    }

    #[test]
    fn require_initial_enforces_the_precondition() {
        let mut sm1 = sample_sm(["i1", "on", "off"]);
        let sm2 = sample_sm(["i1", "on", "off"]);
        sm1.root.children.remove(0);
        sm1.edges.remove(0);
        let opts = DiffOptions {
            require_initial: true,
            ..DiffOptions::default()
        };
        assert!(check_isomorphism(&sm1, &sm2, opts).is_err());
    }

    #[test]
    fn action_order_does_not_affect_node_comparison() {
        let mut sm1 = sample_sm(["i1", "on", "off"]);
        let mut sm2 = sample_sm(["i1", "on", "off"]);
        sm1.root.children[1]
            .actions
            .push(Action::for_node("exit", "", "led_off()"));
        sm2.root.children[1]
            .actions
            .push(Action::for_node("exit", "", "led_off()"));
        sm2.root.children[1].actions.reverse();
        let result = check_isomorphism(&sm1, &sm2, DiffOptions::default()).unwrap();
        assert_eq!(result.verdict, Verdict::Identical);
    }

    #[test]
    fn action_list_diff_flags() {
        let a = vec![Action::for_node("entry", "", "a()\nb()")];
        let reordered = vec![Action::for_node("entry", "", "b()\na()")];
        let diff = compare_action_lists(&a, &reordered);
        assert!(diff.behavior_order);
        assert!(!diff.behavior_args);

        let args = vec![Action::for_node("entry", "", "a(1)\nb()")];
        let diff = compare_action_lists(&a, &args);
        assert!(diff.behavior_args);

        let guard_a = vec![Action::for_node("click", "armed", "fire()")];
        let guard_b = vec![Action::for_node("click", "ready", "fire()")];
        let diff = compare_action_lists(&guard_a, &guard_b);
        assert!(diff.guards);

        let missing = compare_action_lists(&a, &[]);
        assert!(missing.count && missing.behavior_actions);
    }
}
