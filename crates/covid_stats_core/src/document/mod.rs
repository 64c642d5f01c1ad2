//! Document codecs: XML feed reader/writer and JSON bridge.
//!
//! # Responsibility
//! - Translate between the XML feed, the JSON document and the typed model.
//! - Normalize the legacy `{years: [...]}` layout before it reaches the store.
//!
//! # Invariants
//! - Codecs are pure string transforms; file access lives in `pipeline`.

pub mod json;
pub mod xml;
