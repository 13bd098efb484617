//! RPC endpoint description and socket path discovery

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use super::client::{RpcClient, DEFAULT_REQUEST_TIMEOUT};

pub const DEFAULT_SOCKET_FILENAME: &str = "keyvault.sock";

/// Environment variable that overrides the socket path on the client side
pub const SOCKET_ENV_VAR: &str = "KEYVAULT_SOCKET";

/// Information about an RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    /// Human-readable name (e.g., "local", "staging")
    pub name: String,
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Per-request deadline
    pub request_timeout: Duration,
}

impl RpcEndpoint {
    pub fn new(name: impl Into<String>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            socket_path: socket_path.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build a client for this endpoint
    pub fn client(&self) -> RpcClient {
        RpcClient::new(&self.socket_path).with_timeout(self.request_timeout)
    }
}

/// Resolve the socket path
///
/// Servers should pass `allow_env_override = false` so the environment cannot
/// redirect where they listen.
pub fn default_socket_path(allow_env_override: bool) -> PathBuf {
    if allow_env_override {
        if let Ok(p) = std::env::var(SOCKET_ENV_VAR) {
            return PathBuf::from(p);
        }
    }

    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        let dir_path = Path::new(&dir);
        // Reject non-absolute or paths with `..` components.
        if dir_path.is_absolute() && !dir_path.components().any(|c| c == Component::ParentDir) {
            return dir_path.join("keyvault").join(DEFAULT_SOCKET_FILENAME);
        }
    }

    let home = std::env::var_os("HOME").unwrap_or_else(|| OsString::from("."));
    PathBuf::from(home)
        .join(".keyvault")
        .join("run")
        .join(DEFAULT_SOCKET_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_client() {
        let endpoint = RpcEndpoint::new("test", "/tmp/test.sock").with_timeout(Duration::from_secs(1));
        let client = endpoint.client();
        assert_eq!(client.socket_path(), Path::new("/tmp/test.sock"));
    }

    #[test]
    fn test_default_socket_path_file_name() {
        let path = default_socket_path(false);
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(DEFAULT_SOCKET_FILENAME)
        );
    }
}
