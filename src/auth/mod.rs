//! Request authentication
//!
//! Identity is verified, never issued, by this service. A [`TokenVerifier`]
//! turns an opaque bearer token into an [`AuthUser`]; the middleware applies
//! it to every protected route and exposes the identity as a request
//! extension.

mod middleware;
mod verifier;

pub use middleware::require_auth;
pub use verifier::{AuthUser, Claims, JwtVerifier, TokenVerifier};
