//! Endpoint abstraction between clients and the service.
//!
//! The client SDK talks to an [`Endpoint`], not to the service struct
//! directly, so the same client code runs against an in-process service
//! in tests and a remote transport in production.

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{BatchResponse, SignedRequest};

/// Anything that can accept a signed request batch.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Submit a batch and wait for its response.
    ///
    /// Per-operation failures come back inside the response; an `Err`
    /// means the request as a whole was rejected (bad signature,
    /// transport failure, internal error).
    async fn submit(&self, request: SignedRequest) -> Result<BatchResponse>;
}
