//! The GraphML encoder.
//!
//! Encoding never mutates the caller's document: a deep copy is taken,
//! geometry is stripped or converted on the copy, the metadata comment
//! is re-synthesized (native dialect) and the copy is serialized with
//! two-space indentation.

mod legacy;
mod native;

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::geometry::{GeometryConverter, GeometryFormats, LabelGeometry, NodeGeometry};
use crate::model::Document;
use crate::options::{Dialect, WriteOptions};
use crate::reconstruct;

/// Encode a document with an explicit geometry collaborator.
pub fn encode_document_with_geometry(
    doc: &Document,
    dialect: Dialect,
    opts: &WriteOptions,
    geometry: &dyn GeometryConverter,
) -> Result<Vec<u8>> {
    opts.validate(dialect)?;
    if dialect == Dialect::LegacyYed && doc.state_machines.len() != 1 {
        warn!(
            count = doc.state_machines.len(),
            "the legacy dialect supports single-machine documents only"
        );
        return Err(CyberiadaError::bad_parameter(
            "legacy export requires exactly one state machine",
        ));
    }
    if doc.state_machines.is_empty() {
        return Err(CyberiadaError::bad_parameter(
            "document has no state machines",
        ));
    }

    let mut copy = doc.clone();
    reconstruct::check_structure(&mut copy, opts.skip_geometry, opts.check_initial)?;

    if opts.skip_geometry {
        copy.clean_geometry();
    } else {
        let target = match dialect {
            Dialect::Cyberiada10 => GeometryFormats::native_export(),
            Dialect::LegacyYed => GeometryFormats::legacy_export(),
        };
        geometry.convert(&mut copy, target)?;
        if opts.round_geometry {
            round_geometry(&mut copy);
        }
    }

    match dialect {
        Dialect::Cyberiada10 => native::write(&mut copy),
        Dialect::LegacyYed => legacy::write(&copy),
    }
}

/// Encode a document without coordinate conversion; stored geometry is
/// written as-is in whatever conventions it currently uses.
pub fn encode_document(doc: &Document, dialect: Dialect, opts: &WriteOptions) -> Result<Vec<u8>> {
    encode_document_with_geometry(doc, dialect, opts, &crate::geometry::NullGeometry)
}

/// Round every stored coordinate to the nearest integer.
fn round_geometry(doc: &mut Document) {
    let round_point = |p: &mut crate::geometry::Point| {
        p.x = p.x.round();
        p.y = p.y.round();
    };
    let round_rect = |r: &mut crate::geometry::Rect| {
        r.x = r.x.round();
        r.y = r.y.round();
        r.width = r.width.round();
        r.height = r.height.round();
    };
    if let Some(rect) = doc.bounding_rect.as_mut() {
        round_rect(rect);
    }
    for sm in &mut doc.state_machines {
        sm.root.visit_mut(&mut |node| match node.geometry.as_mut() {
            Some(NodeGeometry::Point(p)) => round_point(p),
            Some(NodeGeometry::Rect(r)) => round_rect(r),
            None => {}
        });
        for edge in &mut sm.edges {
            if let Some(polyline) = edge.polyline.as_mut() {
                polyline.iter_mut().for_each(round_point);
            }
            if let Some(p) = edge.source_point.as_mut() {
                round_point(p);
            }
            if let Some(p) = edge.target_point.as_mut() {
                round_point(p);
            }
            match edge.label.as_mut() {
                Some(LabelGeometry::Point(p)) => round_point(p),
                Some(LabelGeometry::Rect(r)) => round_rect(r),
                None => {}
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Writer plumbing shared by both dialects
// ----------------------------------------------------------------------------

/// Thin wrapper over the indented quick-xml writer with the error type
/// mapped to the crate taxonomy.
pub(super) struct XmlWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub(super) fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    pub(super) fn decl(&mut self) -> Result<()> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_err)
    }

    pub(super) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut elem = BytesStart::new(name);
        for attr in attrs {
            elem.push_attribute(*attr);
        }
        self.inner.write_event(Event::Start(elem)).map_err(write_err)
    }

    pub(super) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut elem = BytesStart::new(name);
        for attr in attrs {
            elem.push_attribute(*attr);
        }
        self.inner.write_event(Event::Empty(elem)).map_err(write_err)
    }

    pub(super) fn end(&mut self, name: &str) -> Result<()> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_err)
    }

    pub(super) fn text(&mut self, content: &str) -> Result<()> {
        self.inner
            .write_event(Event::Text(BytesText::new(content)))
            .map_err(write_err)
    }

    /// An element with attributes and a text body on one line.
    pub(super) fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        content: &str,
    ) -> Result<()> {
        self.start(name, attrs)?;
        self.text(content)?;
        self.end(name)
    }

    pub(super) fn into_bytes(self) -> Vec<u8> {
        let mut output = self.inner.into_inner().into_inner();
        output.push(b'\n');
        output
    }
}

fn write_err(e: impl std::fmt::Display) -> CyberiadaError {
    CyberiadaError::xml(format!("write error: {e}"))
}

/// Coordinates are written in the shortest form that parses back to the
/// same value.
pub(super) fn coord(value: f64) -> String {
    format!("{value}")
}

/// Serialize an action list into the surface syntax of the grammar.
pub(super) fn action_text(actions: &[crate::model::Action]) -> String {
    use crate::model::ActionKind;

    let written: Vec<&crate::model::Action> = actions
        .iter()
        .filter(|a| {
            a.kind != ActionKind::Transition
                || !a.trigger.is_empty()
                || !a.guard.is_empty()
                || !a.behavior.is_empty()
        })
        .collect();

    let mut out = String::new();
    for (i, action) in written.iter().enumerate() {
        match action.kind {
            ActionKind::Entry => out.push_str("entry/"),
            ActionKind::Exit => out.push_str("exit/"),
            ActionKind::Do => out.push_str("do/"),
            ActionKind::Transition => {
                if !action.guard.is_empty() {
                    if !action.trigger.is_empty() {
                        out.push_str(&format!("{} [{}]/", action.trigger, action.guard));
                    } else {
                        out.push_str(&format!("[{}]/", action.guard));
                    }
                } else {
                    out.push_str(&format!("{}/", action.trigger));
                }
            }
        }
        let has_next = i + 1 < written.len();
        if has_next || !action.behavior.is_empty() {
            out.push('\n');
            if !action.behavior.is_empty() {
                out.push_str(&action.behavior);
                out.push('\n');
            }
            if has_next {
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionKind};

    #[test]
    fn action_text_layout() {
        let actions = vec![
            Action::for_node("entry", "", "led_on()"),
            Action::for_node("exit", "", "led_off()"),
        ];
        assert_eq!(action_text(&actions), "entry/\nled_on()\n\nexit/\nled_off()\n");
    }

    #[test]
    fn action_text_with_guard() {
        let actions = vec![Action::new(
            ActionKind::Transition,
            "click",
            "armed",
            "fire()",
        )];
        assert_eq!(action_text(&actions), "click [armed]/\nfire()\n");
    }

    #[test]
    fn empty_transition_actions_are_skipped() {
        let actions = vec![Action::new(ActionKind::Transition, "", "", "")];
        assert_eq!(action_text(&actions), "");
    }

    #[test]
    fn do_actions_are_written() {
        let actions = vec![Action::for_node("do", "", "poll()")];
        assert_eq!(action_text(&actions), "do/\npoll()\n");
    }
}
