//! Lane-runner engine: projection, per-frame state, news and the session runner.

pub mod geometry;
pub mod state;
pub mod news;
pub mod session;
