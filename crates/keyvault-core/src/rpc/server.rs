//! JSON-RPC server exposing a vault backend over a Unix socket
//!
//! Pairs with `RpcVaultBackend`: any `VaultBackend` (typically the memory
//! backend) can be hosted out of process and driven remotely.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use super::client::RpcResult;
use super::protocol::*;
use crate::backend::VaultBackend;
use crate::error::{VaultError, VaultResult};
use crate::logging::Logger;
use crate::types::CancellationToken;

/// Serves one backend to RPC clients
pub struct RpcVaultServer {
    backend: Arc<dyn VaultBackend>,
    auth_token: Option<String>,
    logger: Arc<dyn Logger>,
}

impl RpcVaultServer {
    /// Create a server; with an `auth_token`, requests must present it
    pub fn new(backend: Arc<dyn VaultBackend>, auth_token: Option<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            backend,
            auth_token,
            logger,
        }
    }

    /// Accept connections until `shutdown` is cancelled
    #[cfg(unix)]
    pub async fn serve(
        self: Arc<Self>,
        listener: tokio::net::UnixListener,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        loop {
            let (stream, _) = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.logger.info("RpcVaultServer: shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => accepted?,
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    server.logger.warn(&format!("RpcVaultServer: connection error: {}", e));
                }
            });
        }
    }

    /// Answer framed requests on one connection until the peer hangs up
    pub async fn handle_connection<S>(&self, stream: S) -> RpcResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        while let Some(request) = read_frame(&mut reader).await? {
            let response = self.handle_request(request).await;
            write_frame(&mut write_half, &response).await?;
        }
        Ok(())
    }

    /// Turn one request object into one response object
    pub async fn handle_request(&self, request: Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

        self.logger.debug(&format!("RpcVaultServer: {}", method));

        match self.dispatch(&method, params).await {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(DispatchError::UnknownMethod) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": CODE_METHOD_NOT_FOUND, "message": format!("Method not found: {}", method) },
            }),
            Err(DispatchError::Vault(e)) => {
                if !e.is_not_found() && !e.is_invalid_state() {
                    self.logger.warn(&format!("RpcVaultServer: {} failed: {}", method, e));
                }
                json!({ "jsonrpc": "2.0", "id": id, "error": error_object(&e) })
            }
        }
    }

    fn check_auth(&self, params: &Value) -> VaultResult<()> {
        let Some(expected) = &self.auth_token else {
            return Ok(());
        };
        match params.get("auth").and_then(|a| a.as_str()) {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(VaultError::Unauthorized("invalid token".to_string())),
            None => Err(VaultError::Unauthorized("missing token".to_string())),
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, DispatchError> {
        if method == METHOD_PING {
            return Ok(json!(PingResult { ok: true }));
        }
        self.check_auth(&params)?;

        let backend = &self.backend;
        let value = match method {
            METHOD_CAPABILITIES => to_value(backend.capabilities().await?)?,
            METHOD_SET => {
                let p: SetParams = parse(params)?;
                to_value(backend.put_secret_version(&p.name, p.value, p.attributes).await?)?
            }
            METHOD_GET => {
                let p: GetParams = parse(params)?;
                to_value(backend.get_secret_version(&p.name, p.version.as_deref()).await?)?
            }
            METHOD_LIST => {
                let p: ListParams = parse(params)?;
                to_value(backend.list_current_properties(p.name.as_deref()).await?)?
            }
            METHOD_VERSIONS => {
                let p: NameParams = parse(params)?;
                to_value(backend.list_versions(&p.name).await?)?
            }
            METHOD_UPDATE => {
                let p: UpdateParams = parse(params)?;
                to_value(backend.update_properties(&p.name, &p.version, p.attributes).await?)?
            }
            METHOD_DELETE => {
                let p: NameParams = parse(params)?;
                to_value(backend.start_delete(&p.name).await?)?
            }
            METHOD_PURGE => {
                let p: NameParams = parse(params)?;
                backend.purge(&p.name).await?;
                Value::Null
            }
            METHOD_GET_DELETED => {
                let p: NameParams = parse(params)?;
                to_value(backend.get_deleted(&p.name).await?)?
            }
            METHOD_LIST_DELETED => to_value(backend.list_deleted().await?)?,
            METHOD_RECOVER => {
                let p: NameParams = parse(params)?;
                to_value(backend.start_recover(&p.name).await?)?
            }
            METHOD_POLL => {
                let p: TokenParams = parse(params)?;
                to_value(backend.poll_operation(&p.token).await?)?
            }
            METHOD_CANCEL => {
                let p: TokenParams = parse(params)?;
                backend.cancel_operation(&p.token).await?;
                Value::Null
            }
            _ => return Err(DispatchError::UnknownMethod),
        };
        Ok(value)
    }
}

impl std::fmt::Debug for RpcVaultServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcVaultServer")
            .field("backend", &self.backend.name())
            .field("auth_required", &self.auth_token.is_some())
            .finish()
    }
}

enum DispatchError {
    UnknownMethod,
    Vault(VaultError),
}

impl From<VaultError> for DispatchError {
    fn from(error: VaultError) -> Self {
        DispatchError::Vault(error)
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> VaultResult<T> {
    serde_json::from_value(params).map_err(|e| VaultError::invalid_argument(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> VaultResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| VaultError::unavailable(format!("failed to encode result: {}", e)))
}
