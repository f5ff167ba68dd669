//! Client SDK for the access-control service.
//!
//! A [`Client`] holds device and account keys, mints all transform keys
//! and encrypted key material locally, and talks to the service through
//! the [`pregraph_service::Endpoint`] abstraction.

pub mod client;
pub mod error;

pub use client::{AccountKeys, Client};
pub use error::{ClientError, Result};
