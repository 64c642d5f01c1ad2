//! Domain model for yearly unemployment and mortality statistics.
//!
//! # Responsibility
//! - Define the nested document shape shared by the XML, JSON and store layers.
//! - Define the flat record shape produced by the XML reader.
//!
//! # Invariants
//! - Every numeric statistic is optional; absent source values stay `None`.
//! - A `(year, month name)` pair identifies one month entry.

pub mod stats;
