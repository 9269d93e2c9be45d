//! Document store implementations for docmodel.
//!
//! [`MemoryStore`] is an in-process [`DocumentStore`](docmodel_model::DocumentStore)
//! that honours everything a compiled schema declares: defaults, required
//! fields, strict mode, timestamps, unique indexes and lifecycle middleware.
//! [`StoreConfig`] carries the connection settings a networked backend
//! would need.

mod config;
mod memory;

pub use config::StoreConfig;
pub use memory::MemoryStore;
