//! The action-text mini-language.
//!
//! Triggers, guards, propagation hints and behavior bodies are parsed out
//! of GraphML text nodes with a small set of regular expressions compiled
//! once per parsing session. Two surface variants exist: the current
//! dialect (blank-line separated blocks, mandatory `/` on node actions)
//! and the legacy editor dialect (single-newline blocks, optionally
//! "flattened" files with no whitespace runs at all).

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CyberiadaError, Result};
use crate::model::{Action, ActionKind};
use crate::text::{is_blank, split_blank_lines, trim_trailing};

/// A trigger is a word, optionally extended with inner words, spaces and
/// dots, optionally followed by an argument list in parentheses.
const TRIGGER: &str = r"\w(?:[\w .]*\w)?(?:\(\w+\))?";

/// Compiled patterns for one parsing session.
pub struct ActionGrammar {
    /// Legacy input with no adjacent whitespace; `/` and `)` delimit
    /// action blocks instead of newlines.
    flattened: bool,
    /// The legacy flavor produced by the Berloga editor; its edge labels
    /// use the relaxed legacy grammar.
    berloga: bool,
    edge_action: Regex,
    node_action: Regex,
    legacy_node_action: Regex,
    legacy_edge_action: Regex,
}

impl ActionGrammar {
    pub fn new(flattened: bool, berloga: bool) -> Self {
        let edge_action = format!(
            r"^\s*(?P<trigger>{TRIGGER})?\s*(?:\[(?P<guard>[^\]]+)\])?\s*(?P<prop>propagate|block)?\s*(?:/\s*(?P<body>(?s:.*)))?\s*$"
        );
        let node_action = format!(
            r"^\s*(?P<trigger>{TRIGGER})\s*(?:\[(?P<guard>[^\]]+)\])?\s*(?P<prop>propagate|block)?\s*/\s*(?P<body>(?s:.*))?\s*$"
        );
        let legacy_node_action =
            format!(r"^\s*(?P<trigger>{TRIGGER})\s*(?:\[(?P<guard>[^\]]+)\])?\s*/");
        let legacy_edge_action = format!(
            r"^\s*(?P<trigger>{TRIGGER})?\s*/?\s*(?:\[(?P<guard>[^\]]+)\])?(?:\s*(?P<body>(?s:.*)))?\s*$"
        );
        Self {
            flattened,
            berloga,
            edge_action: Regex::new(&edge_action).expect("edge action pattern"),
            node_action: Regex::new(&node_action).expect("node action pattern"),
            legacy_node_action: Regex::new(&legacy_node_action).expect("legacy node pattern"),
            legacy_edge_action: Regex::new(&legacy_edge_action).expect("legacy edge pattern"),
        }
    }

    /// Parse the label of a transition edge. An empty triple yields no
    /// action at all.
    pub fn decode_edge_action(&self, text: &str) -> Result<Option<Action>> {
        if text.is_empty() {
            return Ok(None);
        }
        let pattern = if self.berloga {
            &self.legacy_edge_action
        } else {
            &self.edge_action
        };
        let Some(captures) = pattern.captures(text) else {
            warn!(text, "edge action text did not match the grammar");
            return Err(CyberiadaError::action(format!(
                "unparsable edge action {text:?}"
            )));
        };
        let (trigger, guard, behavior) = extract_parts(&captures);
        if let Some(hint) = captures.name("prop") {
            // the document-level event propagation flag supersedes it
            debug!(hint = hint.as_str(), "propagation hint on edge action");
        }
        if trigger.is_empty() && guard.is_empty() && behavior.is_empty() {
            return Ok(None);
        }
        Ok(Some(Action::new(
            ActionKind::Transition,
            trigger,
            guard,
            behavior,
        )))
    }

    /// Parse one node action block (`trigger [guard]/ behavior`).
    fn decode_node_block(&self, block: &str, actions: &mut Vec<Action>) -> Result<()> {
        let Some(captures) = self.node_action.captures(block) else {
            warn!(block, "node action block did not match the grammar");
            return Err(CyberiadaError::action(format!(
                "unparsable node action block {block:?}"
            )));
        };
        let (trigger, guard, behavior) = extract_parts(&captures);
        actions.push(Action::for_node(trigger, guard, behavior));
        Ok(())
    }

    /// Parse the action text of a state in the current dialect: blocks
    /// separated by blank lines, whitespace-only blocks skipped.
    pub fn decode_state_actions(&self, text: &str) -> Result<Vec<Action>> {
        let mut actions = Vec::new();
        for block in split_blank_lines(text) {
            if is_blank(block) {
                continue;
            }
            self.decode_node_block(block, &mut actions)?;
        }
        Ok(actions)
    }

    /// Parse the action text of a state in the legacy dialect.
    ///
    /// Editor text is not blank-line separated. In flattened files the
    /// `/` and `)` characters delimit blocks; otherwise every line where
    /// the legacy action header matches starts a new block and the lines
    /// in between are body continuations.
    pub fn decode_state_actions_legacy(&self, text: &str) -> Result<Vec<Action>> {
        let blocks = if self.flattened {
            self.split_flattened(text)
        } else {
            self.split_by_headers(text)
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        let mut actions = Vec::new();
        for block in &blocks {
            if is_blank(block) {
                continue;
            }
            self.decode_node_block(block, &mut actions)?;
        }
        Ok(actions)
    }

    /// Rebuild block structure from a file with all whitespace collapsed:
    /// a `/` closes the previous block and both `/` and `)` get a
    /// newline appended so the block parser sees its usual shape.
    fn split_flattened(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut start = 0;
        for (i, ch) in text.char_indices() {
            if ch == '/' || ch == ')' {
                if ch == '/' && !current.is_empty() {
                    sections.push(std::mem::take(&mut current));
                }
                let end = i + ch.len_utf8();
                current.push_str(&text[start..end]);
                current.push('\n');
                start = end;
            }
        }
        if !current.is_empty() {
            sections.push(current);
        }
        sections
    }

    /// Cut blocks at the lines where the legacy action header matches.
    fn split_by_headers<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut starts = Vec::new();
        let mut pos = 0;
        for line in text.split_inclusive('\n') {
            if !is_blank(line) && self.legacy_node_action.is_match(&text[pos..]) {
                starts.push(pos);
            }
            pos += line.len();
        }
        let mut blocks = Vec::new();
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            blocks.push(&text[start..end]);
        }
        blocks
    }
}

/// Pull the (trigger, guard, behavior) triple out of a match, with
/// trailing whitespace removed from every part.
fn extract_parts(captures: &regex::Captures<'_>) -> (String, String, String) {
    let part = |name: &str| {
        let mut value = captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        trim_trailing(&mut value);
        value
    };
    (part("trigger"), part("guard"), part("body"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn grammar() -> ActionGrammar {
        ActionGrammar::new(false, false)
    }

    #[rstest]
    #[case("click [ready] / counter = counter + 1", "click", "ready", "counter = counter + 1")]
    #[case("click/", "click", "", "")]
    #[case("timeout(5)/ stop()", "timeout(5)", "", "stop()")]
    #[case("[armed] / fire()", "", "armed", "fire()")]
    #[case("/ reset()", "", "", "reset()")]
    fn edge_action_grammar(
        #[case] text: &str,
        #[case] trigger: &str,
        #[case] guard: &str,
        #[case] behavior: &str,
    ) {
        let action = grammar().decode_edge_action(text).unwrap().unwrap();
        assert_eq!(action.kind, ActionKind::Transition);
        assert_eq!(action.trigger, trigger);
        assert_eq!(action.guard, guard);
        assert_eq!(action.behavior, behavior);
    }

    #[test]
    fn empty_edge_label_yields_no_action() {
        assert!(grammar().decode_edge_action("").unwrap().is_none());
        assert!(grammar().decode_edge_action("   \n ").unwrap().is_none());
    }

    #[test]
    fn propagation_hint_is_recognized_but_not_stored() {
        let action = grammar()
            .decode_edge_action("[armed] propagate / beep()")
            .unwrap()
            .unwrap();
        assert_eq!(action.trigger, "");
        assert_eq!(action.guard, "armed");
        assert_eq!(action.behavior, "beep()");
    }

    #[test]
    fn state_actions_split_on_blank_lines() {
        let text = "entry/ led_on()\n\nexit/ led_off()\n\nclick [armed]/ fire()";
        let actions = grammar().decode_state_actions(text).unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].kind, ActionKind::Entry);
        assert_eq!(actions[0].behavior, "led_on()");
        assert_eq!(actions[1].kind, ActionKind::Exit);
        assert_eq!(actions[2].kind, ActionKind::Transition);
        assert_eq!(actions[2].trigger, "click");
        assert_eq!(actions[2].guard, "armed");
    }

    #[test]
    fn multiline_behavior_stays_in_one_block() {
        let text = "entry/\nfirst()\nsecond()";
        let actions = grammar().decode_state_actions(text).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].behavior, "first()\nsecond()");
    }

    #[test]
    fn node_action_without_slash_is_an_error() {
        let result = grammar().decode_state_actions("just words here");
        assert!(matches!(result, Err(CyberiadaError::ActionFormat(_))));
    }

    #[test]
    fn do_trigger_maps_to_do_kind_on_nodes_only() {
        let actions = grammar().decode_state_actions("do/ poll()").unwrap();
        assert_eq!(actions[0].kind, ActionKind::Do);

        // on an edge the same trigger stays a transition
        let action = grammar().decode_edge_action("do / poll()").unwrap().unwrap();
        assert_eq!(action.kind, ActionKind::Transition);
    }

    #[test]
    fn legacy_blocks_cut_at_header_lines() {
        let grammar = ActionGrammar::new(false, false);
        let text = "entry/\nled_on()\nexit/\nled_off()";
        let actions = grammar.decode_state_actions_legacy(text).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind, ActionKind::Entry);
        assert_eq!(actions[0].behavior, "led_on()");
        assert_eq!(actions[1].kind, ActionKind::Exit);
        assert_eq!(actions[1].behavior, "led_off()");
    }

    #[test]
    fn flattened_blocks_cut_at_slash_and_paren() {
        let grammar = ActionGrammar::new(true, true);
        let text = "entry/on()off()exit/done()";
        let actions = grammar.decode_state_actions_legacy(text).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind, ActionKind::Entry);
        assert_eq!(actions[0].behavior, "on()\noff()");
        assert_eq!(actions[1].kind, ActionKind::Exit);
        assert_eq!(actions[1].behavior, "done()");
    }

    #[test]
    fn berloga_edge_labels_use_the_relaxed_grammar() {
        let grammar = ActionGrammar::new(false, true);
        let action = grammar
            .decode_edge_action("Скачок/")
            .unwrap()
            .unwrap();
        assert_eq!(action.trigger, "Скачок");
    }
}
