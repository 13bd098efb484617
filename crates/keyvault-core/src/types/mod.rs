//! Core types for secret lifecycle management
//!
//! This module contains the shared data model used by the store, the poller
//! and every backend.

mod secret;
mod operation;
mod cancellation;

pub use secret::{
    SecretValue, SecretState, SecretProperties, SecretVersion, SecretAttributes,
    PropertiesUpdate, DeletedSecret,
};
pub use operation::{OperationToken, OperationStatus, PollResponse, OperationOutcome};
pub use cancellation::CancellationToken;
