//! Credentials consumed by vault backends
//!
//! How a token is obtained (OAuth flows, managed identities) is up to the
//! provider. Backends call `get_token()` and treat the result as opaque.

mod traits;
mod env;

pub use traits::{AccessToken, CredentialProvider, StaticCredentialProvider};
pub use env::{EnvCredentialProvider, TOKEN_ENV_VARS};
