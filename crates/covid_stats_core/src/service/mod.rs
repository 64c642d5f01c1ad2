//! Import/export use-cases over the statistics repository.
//!
//! # Responsibility
//! - Upsert documents into the store as one atomic unit.
//! - Reassemble documents from stored rows.
//!
//! # Invariants
//! - Import is all-or-nothing per call.
//! - Export never mutates the store.

pub mod export_service;
pub mod import_service;
