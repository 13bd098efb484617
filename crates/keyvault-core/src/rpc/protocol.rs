//! Wire protocol shared by the RPC vault client and server
//!
//! JSON-RPC 2.0 messages framed LSP-style with a `Content-Length` header.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::client::{RpcError, RpcResult};
use crate::error::VaultError;
use crate::types::{OperationToken, SecretAttributes, SecretValue};

pub const METHOD_PING: &str = "lifecycle/ping";
pub const METHOD_CAPABILITIES: &str = "vault/capabilities";
pub const METHOD_SET: &str = "secrets/set";
pub const METHOD_GET: &str = "secrets/get";
pub const METHOD_LIST: &str = "secrets/list";
pub const METHOD_VERSIONS: &str = "secrets/versions";
pub const METHOD_UPDATE: &str = "secrets/update";
pub const METHOD_DELETE: &str = "secrets/delete";
pub const METHOD_PURGE: &str = "secrets/purge";
pub const METHOD_GET_DELETED: &str = "secrets/deleted/get";
pub const METHOD_LIST_DELETED: &str = "secrets/deleted/list";
pub const METHOD_RECOVER: &str = "secrets/recover";
pub const METHOD_POLL: &str = "operations/poll";
pub const METHOD_CANCEL: &str = "operations/cancel";

pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
pub const CODE_INVALID_PARAMS: i64 = -32602;
pub const CODE_INTERNAL: i64 = -32603;
pub const CODE_UNAUTHORIZED: i64 = -32001;
pub const CODE_NOT_FOUND: i64 = -32004;
pub const CODE_INVALID_STATE: i64 = -32009;
pub const CODE_UNSUPPORTED: i64 = -32010;
pub const CODE_OPERATION: i64 = -32011;

/// Largest frame either side accepts
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct SetParams {
    pub name: String,
    pub value: SecretValue,
    #[serde(default)]
    pub attributes: SecretAttributes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetParams {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateParams {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub attributes: SecretAttributes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenParams {
    pub token: OperationToken,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResult {
    pub ok: bool,
}

/// JSON-RPC error code for a vault error
pub fn error_code(error: &VaultError) -> i64 {
    match error {
        VaultError::NotFound(_) => CODE_NOT_FOUND,
        VaultError::InvalidState(_) => CODE_INVALID_STATE,
        VaultError::InvalidArgument(_) => CODE_INVALID_PARAMS,
        VaultError::Unsupported { .. } => CODE_UNSUPPORTED,
        VaultError::Unauthorized(_) => CODE_UNAUTHORIZED,
        VaultError::Timeout { .. } | VaultError::OperationFailed { .. } | VaultError::Cancelled => {
            CODE_OPERATION
        }
        VaultError::BackendUnavailable(_) => CODE_INTERNAL,
    }
}

/// Build the `error` member of a response, carrying the typed error as `data`
pub fn error_object(error: &VaultError) -> Value {
    json!({
        "code": error_code(error),
        "message": error.to_string(),
        "data": error,
    })
}

/// Rebuild a vault error from a JSON-RPC error object
///
/// Prefers the typed `data` member; falls back to the code when the peer
/// sent none.
pub fn vault_error_from(code: i64, message: String, data: Option<&Value>) -> VaultError {
    if let Some(error) = data.and_then(|d| serde_json::from_value::<VaultError>(d.clone()).ok()) {
        return error;
    }

    match code {
        CODE_NOT_FOUND => VaultError::NotFound(message),
        CODE_INVALID_STATE => VaultError::InvalidState(message),
        CODE_INVALID_PARAMS => VaultError::InvalidArgument(message),
        CODE_UNAUTHORIZED => VaultError::Unauthorized(message),
        CODE_UNSUPPORTED => VaultError::unsupported("rpc", message),
        _ => VaultError::BackendUnavailable(format!("RPC error {}: {}", code, message)),
    }
}

/// Write one framed message
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> RpcResult<()> {
    let content = serde_json::to_string(message)?;
    let frame = format!("Content-Length: {}\r\n\r\n{}", content.len(), content);
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message; `Ok(None)` on a clean end of stream
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> RpcResult<Option<Value>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut saw_header = false;

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if saw_header {
                return Err(RpcError::InvalidResponse("Connection closed".to_string()));
            }
            return Ok(None);
        }
        saw_header = true;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                len_str
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::InvalidResponse("Invalid Content-Length".to_string()))?,
            );
        }
    }

    let length = content_length
        .ok_or_else(|| RpcError::InvalidResponse("Missing Content-Length header".to_string()))?;
    if length > MAX_FRAME_LEN {
        return Err(RpcError::InvalidResponse(format!("Frame of {} bytes exceeds limit", length)));
    }

    let mut content = vec![0u8; length];
    reader.read_exact(&mut content).await?;

    Ok(Some(serde_json::from_slice(&content)?))
}
