//! Batched request protocol and service loop.
//!
//! Clients build signed operation batches ([`protocol::SignedRequest`])
//! and submit them through an [`Endpoint`]. The [`AccessService`]
//! verifies the device signature, authorizes each operation against the
//! permission graph, and applies it. Key material only ever crosses the
//! boundary encrypted or as transform keys.

pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod service;

pub use endpoint::Endpoint;
pub use error::{Result, ServiceError};
pub use protocol::{
    signing_bytes, BatchResponse, ErrorCode, OpKind, OpResult, Operation, ResultPayload,
    SignedRequest,
};
pub use service::AccessService;
