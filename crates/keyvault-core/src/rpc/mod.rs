//! RPC module for out-of-process vaults
//!
//! This module provides the JSON-RPC plumbing behind `RpcVaultBackend`, plus a
//! server that can host any `VaultBackend` on a socket.
//!
//! The RPC protocol uses:
//! - Unix sockets
//! - JSON-RPC 2.0 with Content-Length headers (LSP-style)
//! - An `auth` token inside the params object, taken from a `CredentialProvider`
//!
//! ```rust,ignore
//! let server = Arc::new(RpcVaultServer::new(backend, Some(token), logger));
//! let listener = tokio::net::UnixListener::bind(&socket_path)?;
//! tokio::spawn(server.serve(listener, shutdown.clone()));
//!
//! let client = RpcEndpoint::new("local", &socket_path).client();
//! assert!(client.ping().await?);
//! ```

mod client;
pub mod endpoint;
pub mod protocol;
mod server;

pub use client::{RpcClient, RpcError, RpcResult, DEFAULT_REQUEST_TIMEOUT};
pub use endpoint::{RpcEndpoint, default_socket_path};
pub use server::RpcVaultServer;
