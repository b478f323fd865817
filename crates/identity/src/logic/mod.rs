//! Core of the kubectl login relay: scope negotiation, stateless CSRF state,
//! the two-leg OIDC handshake, claim extraction and kubeconfig templating.

pub mod claims;
pub mod error;
pub mod handshake;
pub mod kubeconfig;
pub mod oidc;
pub mod params;
pub mod request;
pub mod scope;
pub mod state;

pub use error::AuthFlowError;
