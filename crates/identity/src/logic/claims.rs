use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::logic::params::AuthenticationParams;

/// OAuth2 client settings used for both legs of the handshake. Fixed for the
/// lifetime of the process.
#[derive(Debug, Clone)]
pub struct AuthRequestConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Only usernames ending in `@<email_domain>` are accepted when set.
    pub email_domain: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("cannot exchange code for token: {0:#}")]
    Exchange(anyhow::Error),
    #[error("response missing ID token")]
    MissingIdToken,
    #[error("cannot verify ID token: {0:#}")]
    Verification(anyhow::Error),
    #[error("cannot extract claims from ID token: missing email claim")]
    MissingUsername,
    #[error("invalid email domain, expecting {expected}")]
    EmailDomain { expected: String },
}

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Claims of an ID token whose signature, issuer, audience and expiry have
/// been checked.
#[derive(Debug, Clone, Default)]
pub struct VerifiedIdToken {
    pub issuer: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        request: &AuthRequestConfig,
        redirect_url: &str,
        code: &str,
    ) -> Result<TokenSet, ClaimsError>;
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, raw_id_token: &str) -> Result<VerifiedIdToken, ClaimsError>;
}

/// Turns an authorization code into verified kubectl credentials.
#[derive(Clone)]
pub struct ClaimsExtractor {
    exchanger: Arc<dyn TokenExchanger>,
    verifier: Arc<dyn IdTokenVerifier>,
    config: ExtractorConfig,
}

impl ClaimsExtractor {
    pub fn new(
        exchanger: Arc<dyn TokenExchanger>,
        verifier: Arc<dyn IdTokenVerifier>,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            exchanger,
            verifier,
            config,
        }
    }

    pub async fn process(
        &self,
        request: &AuthRequestConfig,
        redirect_url: &str,
        code: &str,
    ) -> Result<AuthenticationParams, ClaimsError> {
        let tokens = self.exchanger.exchange(request, redirect_url, code).await?;
        let id_token = tokens.id_token.ok_or(ClaimsError::MissingIdToken)?;

        let verified = self.verifier.verify(&id_token).await?;
        let username = verified
            .email
            .filter(|email| !email.is_empty())
            .ok_or(ClaimsError::MissingUsername)?;

        if let Some(domain) = &self.config.email_domain {
            if !username.ends_with(&format!("@{domain}")) {
                return Err(ClaimsError::EmailDomain {
                    expected: domain.clone(),
                });
            }
        }

        debug!(
            username = %username,
            issuer = %verified.issuer,
            has_refresh_token = tokens.refresh_token.is_some(),
            "extracted claims"
        );

        Ok(AuthenticationParams {
            username,
            client_id: request.client_id.clone(),
            client_secret: request.client_secret.clone(),
            id_token,
            refresh_token: tokens.refresh_token.unwrap_or_default(),
            issuer_url: verified.issuer,
        })
    }
}
