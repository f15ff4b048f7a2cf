//! Benchmark support crate for sewernet.
//!
//! Provides seeded synthetic drainage trees and parameter types used by the
//! Criterion benchmarks for topology assembly, design, and verification.

pub mod error;
pub mod network;
pub mod params;
