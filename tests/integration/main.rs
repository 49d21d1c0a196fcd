//! Integration tests: full pipeline and session flows against
//! deterministic in-memory collaborators.

mod mocks;
mod pipeline_flow;
mod session_flow;
