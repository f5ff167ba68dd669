//! # Pregraph Store
//!
//! Storage abstraction for the pregraph access-control core. Provides a
//! trait-based interface for permission graph persistence with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts graph storage behind the [`GraphStore`]
//! trait, allowing the service to be storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`GraphStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Design Notes
//!
//! - **Upsert semantics**: re-putting a node or edge replaces it; re-grants
//!   overwrite old key material
//! - **Edge key**: (subject, object) is unique; role is an attribute
//! - **Validation lives above**: the store persists what it is given, the
//!   service enforces graph invariants before writing

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::GraphStore;
