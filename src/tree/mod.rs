//! Goal tree: projects, nodes and the edges between them
//!
//! - `models`: entities and request/response DTOs
//! - `traits`: `TreeStore` persistence interface
//! - `memory`: in-memory `TreeStore`
//! - `context`: ancestor/sibling reader used by the question subsystem
//! - `manager`: validated tree operations

pub mod context;
pub mod manager;
pub mod memory;
pub mod models;
pub mod traits;

pub use context::TreeContext;
pub use manager::{NodeManager, TreeError};
pub use memory::MemoryTreeStore;
pub use traits::TreeStore;
