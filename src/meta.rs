//! Document metadata and the formal-comment body codec.
//!
//! Metadata travels inside the body of a formal comment titled
//! `CGML_META`: blocks of the form `key/ value` separated by blank
//! lines. The recognized keys, their order on encode, and the flag
//! values are fixed by the format.

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{CyberiadaError, Result};
use crate::text::{is_blank, split_blank_lines};

/// The only supported standard version.
pub const STANDARD_VERSION: &str = "1.0";

/// Relative order of transition and exit activities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionOrder {
    #[default]
    TransitionFirst,
    ExitFirst,
}

/// Whether unconsumed events propagate to outer states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventPropagation {
    #[default]
    Block,
    Propagate,
}

/// The document metadata record.
///
/// `standard_version` is mandatory and must equal [`STANDARD_VERSION`]
/// after a successful decode. The two flags are tri-valued: `None` means
/// the document did not state them, and the accessors fall back to the
/// format defaults (transition-first, block).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub standard_version: String,
    pub transition_order: Option<TransitionOrder>,
    pub event_propagation: Option<EventPropagation>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub platform_language: Option<String>,
    pub target_system: Option<String>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub markup_language: Option<String>,
    /// Additional name/value pairs, written after the table keys on
    /// encode. Set through the API only: the decoder rejects keys it
    /// does not recognize.
    pub extensions: IndexMap<String, String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            standard_version: STANDARD_VERSION.to_string(),
            transition_order: Some(TransitionOrder::TransitionFirst),
            event_propagation: Some(EventPropagation::Block),
            platform: None,
            platform_version: None,
            platform_language: None,
            target_system: None,
            name: None,
            author: None,
            contact: None,
            description: None,
            version: None,
            date: None,
            markup_language: None,
            extensions: IndexMap::new(),
        }
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default metadata carrying a document name; used when a legacy
    /// document provides nothing but a scheme name.
    pub fn with_name(name: &str) -> Self {
        let mut meta = Self::default();
        if !name.is_empty() {
            meta.name = Some(name.to_string());
        }
        meta
    }

    pub fn transition_order(&self) -> TransitionOrder {
        self.transition_order.unwrap_or_default()
    }

    pub fn event_propagation(&self) -> EventPropagation {
        self.event_propagation.unwrap_or_default()
    }
}

const KEY_STANDARD_VERSION: &str = "standardVersion";
const KEY_TRANSITION_ORDER: &str = "transitionOrder";
const KEY_EVENT_PROPAGATION: &str = "eventPropagation";
const VALUE_TRANSITION_FIRST: &str = "transitionFirst";
const VALUE_EXIT_FIRST: &str = "exitFirst";
const VALUE_PROPAGATE: &str = "propagate";
const VALUE_BLOCK: &str = "block";

/// One recognized string-valued metadata key with its accessors. The
/// table drives both decode and encode, keeping the key order in one
/// place.
struct MetaField {
    key: &'static str,
    get: fn(&Metadata) -> Option<&str>,
    set: fn(&mut Metadata, String),
    is_set: fn(&Metadata) -> bool,
}

macro_rules! meta_field {
    ($key:literal, $field:ident) => {
        MetaField {
            key: $key,
            get: |m| m.$field.as_deref(),
            set: |m, v| m.$field = Some(v),
            is_set: |m| m.$field.is_some(),
        }
    };
}

const META_FIELDS: &[MetaField] = &[
    MetaField {
        key: KEY_STANDARD_VERSION,
        get: |m| {
            if m.standard_version.is_empty() {
                None
            } else {
                Some(&m.standard_version)
            }
        },
        set: |m, v| m.standard_version = v,
        is_set: |m| !m.standard_version.is_empty(),
    },
    meta_field!("platform", platform),
    meta_field!("platformVersion", platform_version),
    meta_field!("platformLanguage", platform_language),
    meta_field!("target", target_system),
    meta_field!("name", name),
    meta_field!("author", author),
    meta_field!("contact", contact),
    meta_field!("description", description),
    meta_field!("version", version),
    meta_field!("date", date),
    meta_field!("markupLanguage", markup_language),
];

/// Decode a formal-comment body into a metadata record.
///
/// Duplicate keys, keys outside the recognized set, bad flag values and
/// a missing or unsupported standard version are metadata-format
/// errors.
pub fn decode_meta(body: &str) -> Result<Metadata> {
    let mut meta = Metadata {
        standard_version: String::new(),
        transition_order: None,
        event_propagation: None,
        ..Metadata::default()
    };

    for block in split_blank_lines(body) {
        if is_blank(block) {
            continue;
        }
        let Some(sep) = block.find('/') else {
            warn!("metadata block without a key/value separator");
            return Err(CyberiadaError::metadata(format!(
                "no separator in block {block:?}"
            )));
        };
        let key = block[..sep].trim();
        let value = block[sep + 1..].trim();

        if let Some(field) = META_FIELDS.iter().find(|f| f.key == key) {
            if (field.is_set)(&meta) {
                warn!(key, "duplicate metadata parameter");
                return Err(CyberiadaError::metadata(format!(
                    "duplicate parameter {key}"
                )));
            }
            (field.set)(&mut meta, value.to_string());
        } else if key == KEY_TRANSITION_ORDER {
            meta.transition_order = Some(match value {
                VALUE_TRANSITION_FIRST => TransitionOrder::TransitionFirst,
                VALUE_EXIT_FIRST => TransitionOrder::ExitFirst,
                other => {
                    warn!(value = other, "bad transition order flag");
                    return Err(CyberiadaError::metadata(format!(
                        "bad transition order value {other:?}"
                    )));
                }
            });
        } else if key == KEY_EVENT_PROPAGATION {
            meta.event_propagation = Some(match value {
                VALUE_BLOCK => EventPropagation::Block,
                VALUE_PROPAGATE => EventPropagation::Propagate,
                other => {
                    warn!(value = other, "bad event propagation flag");
                    return Err(CyberiadaError::metadata(format!(
                        "bad event propagation value {other:?}"
                    )));
                }
            });
        } else {
            warn!(key, "unknown metadata key");
            return Err(CyberiadaError::metadata(format!("bad key {key:?}")));
        }
    }

    if meta.standard_version.is_empty() {
        return Err(CyberiadaError::metadata("standard version is not set"));
    }
    if meta.standard_version != STANDARD_VERSION {
        return Err(CyberiadaError::metadata(format!(
            "unsupported standard version {}",
            meta.standard_version
        )));
    }

    if meta.transition_order.is_none() {
        meta.transition_order = Some(TransitionOrder::TransitionFirst);
    }
    if meta.event_propagation.is_none() {
        meta.event_propagation = Some(EventPropagation::Block);
    }

    Ok(meta)
}

/// Encode a metadata record back into a formal-comment body. Keys appear
/// in the fixed table order, then the two flags, then extensions; every
/// block is followed by a blank line.
pub fn encode_meta(meta: &Metadata) -> String {
    let mut out = String::new();
    for field in META_FIELDS {
        if let Some(value) = (field.get)(meta) {
            out.push_str(field.key);
            out.push_str("/ ");
            out.push_str(value);
            out.push_str("\n\n");
        }
    }
    out.push_str(KEY_TRANSITION_ORDER);
    out.push_str("/ ");
    out.push_str(match meta.transition_order() {
        TransitionOrder::TransitionFirst => VALUE_TRANSITION_FIRST,
        TransitionOrder::ExitFirst => VALUE_EXIT_FIRST,
    });
    out.push_str("\n\n");
    out.push_str(KEY_EVENT_PROPAGATION);
    out.push_str("/ ");
    out.push_str(match meta.event_propagation() {
        EventPropagation::Block => VALUE_BLOCK,
        EventPropagation::Propagate => VALUE_PROPAGATE,
    });
    out.push_str("\n\n");
    for (key, value) in &meta.extensions {
        out.push_str(key);
        out.push_str("/ ");
        out.push_str(value);
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_minimal() {
        let meta = decode_meta("standardVersion/ 1.0").unwrap();
        assert_eq!(meta.standard_version, "1.0");
        assert_eq!(meta.transition_order(), TransitionOrder::TransitionFirst);
        assert_eq!(meta.event_propagation(), EventPropagation::Block);
    }

    #[test]
    fn decode_full_record() {
        let body = "standardVersion/ 1.0\n\nname/ Demo\n\ntransitionOrder/ exitFirst\n\neventPropagation/ propagate";
        let meta = decode_meta(body).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Demo"));
        assert_eq!(meta.transition_order(), TransitionOrder::ExitFirst);
        assert_eq!(meta.event_propagation(), EventPropagation::Propagate);
    }

    #[test]
    fn decode_rejects_duplicates() {
        let body = "standardVersion/ 1.0\n\nname/ A\n\nname/ B";
        assert!(matches!(
            decode_meta(body),
            Err(CyberiadaError::MetadataFormat(_))
        ));
    }

    #[test]
    fn decode_rejects_unknown_keys() {
        let body = "standardVersion/ 1.0\n\nlapkiVisual/ true";
        assert!(matches!(
            decode_meta(body),
            Err(CyberiadaError::MetadataFormat(_))
        ));
    }

    #[test]
    fn extensions_are_encoded_after_the_table_keys() {
        let mut meta = Metadata::new();
        meta.name = Some("Demo".into());
        meta.extensions
            .insert("lapkiVisual".to_string(), "true".to_string());
        let body = encode_meta(&meta);
        let name_pos = body.find("name/ Demo").unwrap();
        let flags_pos = body.find("eventPropagation/").unwrap();
        let ext_pos = body.find("lapkiVisual/ true").unwrap();
        assert!(name_pos < flags_pos);
        assert!(flags_pos < ext_pos);
    }

    #[test]
    fn decode_rejects_missing_or_wrong_version() {
        assert!(decode_meta("name/ Demo").is_err());
        assert!(decode_meta("standardVersion/ 2.0").is_err());
    }

    #[test]
    fn decode_rejects_bad_flag_values() {
        assert!(decode_meta("standardVersion/ 1.0\n\ntransitionOrder/ sideways").is_err());
        assert!(decode_meta("standardVersion/ 1.0\n\neventPropagation/ maybe").is_err());
    }

    #[test]
    fn encode_then_decode_reproduces_the_record() {
        let mut meta = Metadata::new();
        meta.name = Some("Demo".into());
        meta.author = Some("K. Ada".into());
        meta.transition_order = Some(TransitionOrder::ExitFirst);
        meta.event_propagation = Some(EventPropagation::Propagate);

        let body = encode_meta(&meta);
        let decoded = decode_meta(&body).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn encode_emits_keys_in_table_order() {
        let mut meta = Metadata::new();
        meta.author = Some("A".into());
        meta.platform = Some("P".into());
        let body = encode_meta(&meta);
        let platform_pos = body.find("platform/").unwrap();
        let author_pos = body.find("author/").unwrap();
        assert!(platform_pos < author_pos);
        assert!(body.ends_with("\n\n"));
    }

    #[test]
    fn value_may_contain_separator_char() {
        let meta = decode_meta("standardVersion/ 1.0\n\ndescription/ on/off logic").unwrap();
        assert_eq!(meta.description.as_deref(), Some("on/off logic"));
    }
}
