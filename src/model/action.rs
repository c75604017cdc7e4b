//! Actions attached to states and transitions.

use std::fmt;

/// What role an action plays on its owner.
///
/// `Entry`, `Exit` and `Do` appear only in node action lists. A
/// `Transition` action on a node is an internal transition; on an edge it
/// is the transition's trigger/guard/behavior triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActionKind {
    #[default]
    Transition,
    Entry,
    Exit,
    Do,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Transition => "transition",
            ActionKind::Entry => "entry",
            ActionKind::Exit => "exit",
            ActionKind::Do => "do",
        };
        f.write_str(name)
    }
}

/// A trigger/guard/behavior triple.
///
/// Empty strings stand for absent parts. For comparison purposes the
/// behavior is a newline-separated list of commands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub trigger: String,
    pub guard: String,
    pub behavior: String,
}

impl Action {
    pub fn new(
        kind: ActionKind,
        trigger: impl Into<String>,
        guard: impl Into<String>,
        behavior: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            trigger: trigger.into(),
            guard: guard.into(),
            behavior: behavior.into(),
        }
    }

    /// Build a node action, mapping the reserved triggers `entry`, `exit`
    /// and `do` to their kinds; any other trigger becomes an internal
    /// transition.
    pub fn for_node(
        trigger: impl Into<String>,
        guard: impl Into<String>,
        behavior: impl Into<String>,
    ) -> Self {
        let trigger = trigger.into();
        let kind = match trigger.as_str() {
            "entry" => ActionKind::Entry,
            "exit" => ActionKind::Exit,
            "do" => ActionKind::Do,
            _ => ActionKind::Transition,
        };
        Self::new(kind, trigger, guard, behavior)
    }

    /// An action with neither guard nor behavior carries no information.
    pub fn is_empty(&self) -> bool {
        self.guard.is_empty() && self.behavior.is_empty()
    }
}

/// Multiset equality of two action lists over the full
/// (kind, trigger, guard, behavior) tuples; the order inside the lists is
/// irrelevant.
pub fn actions_equal(a: &[Action], b: &[Action]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for action in a {
        let found = b
            .iter()
            .enumerate()
            .find(|(i, candidate)| !used[*i] && *candidate == action);
        match found {
            Some((i, _)) => used[i] = true,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_triggers_select_the_kind() {
        assert_eq!(Action::for_node("entry", "", "x = 1").kind, ActionKind::Entry);
        assert_eq!(Action::for_node("exit", "", "").kind, ActionKind::Exit);
        assert_eq!(Action::for_node("do", "", "poll()").kind, ActionKind::Do);
        assert_eq!(
            Action::for_node("click", "armed", "fire()").kind,
            ActionKind::Transition
        );
    }

    #[test]
    fn equality_ignores_order() {
        let a = vec![
            Action::for_node("entry", "", "a()"),
            Action::for_node("exit", "", "b()"),
        ];
        let mut b = a.clone();
        b.reverse();
        assert!(actions_equal(&a, &b));
    }

    #[test]
    fn equality_is_multiset_not_set() {
        let twice = vec![
            Action::for_node("click", "", "x()"),
            Action::for_node("click", "", "x()"),
        ];
        let once = vec![Action::for_node("click", "", "x()")];
        assert!(!actions_equal(&twice, &once));
        assert!(actions_equal(&twice, &twice.clone()));
    }
}
