//! Alpha Infinity: lane-runner trading game engine and market event pipeline.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod data;
pub mod llm;
pub mod market;
pub mod engine;
pub mod pipeline;
pub mod storage;
pub mod dashboard;
