//! JSON-RPC client for talking to an out-of-process vault
//!
//! Uses the LSP-style protocol with Content-Length headers over Unix sockets.
//! Each call opens a fresh connection, so one client can be shared freely
//! between tasks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::BufReader;

use super::protocol::{self, PingResult, METHOD_PING};
use crate::error::VaultError;
use crate::logging;

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,
}

pub type RpcResult<T> = Result<T, RpcError>;

impl From<RpcError> for VaultError {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::Remote { code, message, data } => {
                protocol::vault_error_from(code, message, data.as_ref())
            }
            other => VaultError::BackendUnavailable(other.to_string()),
        }
    }
}

/// JSON-RPC client
#[derive(Debug)]
pub struct RpcClient {
    socket_path: PathBuf,
    request_timeout: Duration,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_id: AtomicU64::new(1),
        }
    }

    /// Set the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Make a JSON-RPC request, attaching `auth` to the params object
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        auth: Option<&str>,
    ) -> RpcResult<R> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let params_value = serde_json::to_value(params)?;
        let params_with_auth = match (params_value, auth) {
            (Value::Object(mut map), Some(token)) => {
                map.insert("auth".to_string(), json!(token));
                Value::Object(map)
            }
            (Value::Null, Some(token)) => json!({ "auth": token }),
            (Value::Null, None) => json!({}),
            (value @ Value::Object(_), None) => value,
            (value, token) => json!({ "auth": token, "data": value }),
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params_with_auth,
        });

        let response = tokio::time::timeout(self.request_timeout, self.send_request(&request))
            .await
            .map_err(|_| {
                logging::warn("rpc::client", &format!("Request timed out: method={}", method));
                RpcError::Timeout
            })??;

        self.parse_response(response)
    }

    /// Send a request and receive a response
    #[cfg(unix)]
    async fn send_request(&self, request: &Value) -> RpcResult<Value> {
        use tokio::net::UnixStream;

        logging::debug(
            "rpc::client",
            &format!("Connecting to socket: {}", self.socket_path.display()),
        );

        let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            logging::error("rpc::client", &format!("Connection failed: {}", e));
            RpcError::ConnectionFailed(e.to_string())
        })?;

        // Hide params (they carry the auth token and secret values)
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("unknown");
        logging::debug("rpc::client", &format!("Sending request: method={}", method));

        protocol::write_frame(&mut stream, request).await?;

        let mut reader = BufReader::new(stream);
        let result = protocol::read_frame(&mut reader)
            .await?
            .ok_or_else(|| RpcError::InvalidResponse("Connection closed".to_string()));

        match &result {
            Ok(_) => logging::debug("rpc::client", "Response received successfully"),
            Err(e) => logging::error("rpc::client", &format!("Response read failed: {}", e)),
        }

        result
    }

    #[cfg(not(unix))]
    async fn send_request(&self, _request: &Value) -> RpcResult<Value> {
        Err(RpcError::ConnectionFailed(
            "Unix domain sockets are not available on this platform".to_string(),
        ))
    }

    fn parse_response<R: DeserializeOwned>(&self, response: Value) -> RpcResult<R> {
        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            return Err(RpcError::Remote {
                code,
                message,
                data: error.get("data").cloned(),
            });
        }

        let result = response
            .get("result")
            .ok_or_else(|| RpcError::InvalidResponse("Missing result field".to_string()))?;

        serde_json::from_value(result.clone()).map_err(|e| e.into())
    }

    /// Check if the endpoint is reachable
    pub async fn ping(&self) -> RpcResult<bool> {
        // Fast-fail: check if socket file exists first
        if !self.socket_path.exists() {
            return Err(RpcError::ConnectionFailed("Socket does not exist".to_string()));
        }

        let result: PingResult = self.call(METHOD_PING, json!({}), None).await?;
        Ok(result.ok)
    }
}
