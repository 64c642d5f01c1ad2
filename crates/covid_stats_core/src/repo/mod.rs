//! Repository layer for the statistics store.
//!
//! # Responsibility
//! - Define explicit query functions over `years`, `unemployment` and `deaths`.
//! - Isolate SQLite query details from import/export orchestration.
//!
//! # Invariants
//! - Repositories return plain row structs; there is no lazy relation loading.
//! - Repository calls never open or commit transactions themselves.

pub mod stats_repo;
