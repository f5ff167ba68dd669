//! # Pregraph Testkit
//!
//! Testing utilities for the pregraph workspace.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-process service with deterministic primitives
//!   that clients connect to through the normal endpoint seam
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up end-to-end scenarios:
//!
//! ```rust,ignore
//! use pregraph_testkit::{seed_document, TestNet};
//!
//! let net = TestNet::new();
//! let alice = net.registered_client().await;
//! let (doc, ciphertext) = seed_document(&alice, b"content").await;
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use pregraph_testkit::generators::subject_ref;
//!
//! proptest! {
//!     #[test]
//!     fn subjects_display(subject in subject_ref()) {
//!         prop_assert!(!subject.to_string().is_empty());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{seed_document, TestNet};
