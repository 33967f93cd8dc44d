//! Integration tests for tracealloc
//!
//! These tests exercise the simulation engine through its public API
//! together with the core allocator, trace and configuration types.

#[path = "integration/parameter_files.rs"]
mod parameter_files;

#[path = "integration/replay_properties.rs"]
mod replay_properties;

#[path = "integration/trace_extraction.rs"]
mod trace_extraction;
