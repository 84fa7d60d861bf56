//! scm-daemon library target.
//!
//! Exposes the router, session state and refresh orchestration for
//! integration tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod kv;
pub mod refresh;
pub mod routes;
pub mod state;
