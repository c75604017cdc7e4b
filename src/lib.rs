//! # cyberiadaml
//!
//! Core library for reading, writing, comparing and normalizing
//! hierarchical state machine (HSM) diagrams serialized as GraphML.
//!
//! Two dialects are supported: the native Cyberiada-GraphML 1.0 schema
//! and the legacy yEd-based editor schema (Berloga / Ostranna).
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! diff        → graph isomorphism check and structured difference
//!   ↓
//! encode      → native + legacy GraphML writers
//! decode      → push-down GraphML parsers, native + legacy
//!   ↓
//! reconstruct → id synthesis, composite promotion, structural checks
//!   ↓
//! meta        → metadata comment codec
//! grammar     → action-text regular-expression grammar
//! xml         → minimal owned DOM over the quick-xml tokenizer
//!   ↓
//! model       → document / state machine / node / edge / action
//! geometry    → primitives, coordinate formats, converter seam
//! text        → capped strings, trailing trim, __x_HH escape codec
//! error       → closed error taxonomy
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use cyberiadaml::{decode_document, encode_document, Dialect, ReadOptions, WriteOptions};
//!
//! let bytes = std::fs::read("machine.graphml")?;
//! let doc = decode_document(&bytes, None, &ReadOptions::default())?;
//! let out = encode_document(&doc, Dialect::Cyberiada10, &WriteOptions::default())?;
//! ```

pub mod diff;
pub mod error;
pub mod geometry;
pub mod grammar;
pub mod meta;
pub mod model;
pub mod reconstruct;
pub mod text;
pub mod xml;

mod decode;
mod encode;
mod keys;
mod options;

pub use decode::{decode_document, decode_document_with_geometry};
pub use encode::{encode_document, encode_document_with_geometry};
pub use error::{CyberiadaError, Result};
pub use options::{Dialect, DoubleActionPolicy, FlattenHint, ReadOptions, WriteOptions};

// Commonly needed model and comparison types
pub use diff::{DiffOptions, IsomorphismResult, Verdict, check_isomorphism};
pub use geometry::{GeometryConverter, GeometryFormats, NullGeometry};
pub use meta::Metadata;
pub use model::{Document, StateMachine};
