//! # Pregraph Authz
//!
//! Authorization for the pregraph access-control core: decides what a
//! principal may do, and resolves the transform chains that make document
//! decryption possible.
//!
//! ## Key Types
//!
//! - [`Action`] - What a principal wants to do
//! - [`Decision`] - Allowed or denied
//! - [`TransformChain`] - An ordered sequence of re-encryption transforms
//! - [`resolve`] - Breadth-first chain search over the permission graph
//!
//! The engine never mutates the graph; it reads through [`GraphStore`]
//! and leaves all writes to the service layer.
//!
//! [`GraphStore`]: pregraph_store::GraphStore

pub mod engine;
pub mod error;
pub mod resolver;

pub use engine::{authorize, is_document_admin, is_group_admin, Action, Decision, DenyReason};
pub use error::{AuthzError, Result};
pub use resolver::{resolve, TransformChain, MAX_CHAIN_LEN};
