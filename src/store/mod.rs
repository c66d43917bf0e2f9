//! Store module
//!
//! This module defines the boundary to the data store under test: the
//! `DocumentStore` trait, the document/filter/update data model, the store
//! error taxonomy with its distinguished handle-invalid condition, and an
//! in-memory implementation.

// Re-export error types and result type
pub mod error;
pub use error::{StoreError, StoreResult};

// Re-export interface traits and data model
pub mod interface;
pub use interface::{Document, DocumentStore, Filter, UpdateSpec};

// Re-export in-memory implementation
pub mod memory;
pub use memory::MemoryStore;

// Re-export failure-injection decorator
pub mod faulty;
pub use faulty::{FaultyStore, FAIL_ALWAYS};
