//! HTTP API for the goal tree

pub mod handlers;
pub mod routes;
pub mod tree_handlers;

pub use routes::create_router;
