//! OpenID Connect provider backed by the `openidconnect` crate.
//!
//! Discovery runs once at startup; the resulting endpoints, advertised scopes
//! and signing keys are reused for every request.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use oauth2::{AuthorizationCode, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use openidconnect::core::{
    CoreClient, CoreIdToken, CoreIdTokenVerifier, CoreJsonWebKeySet, CoreProviderMetadata,
};
use openidconnect::{IssuerUrl, Nonce, OAuth2TokenResponse, TokenResponse};
use shared::error::CommonError;
use tracing::{debug, info};

use crate::logic::claims::{
    AuthRequestConfig, ClaimsError, IdTokenVerifier, TokenExchanger, TokenSet, VerifiedIdToken,
};

/// Create an HTTP client for calls to the identity provider
pub fn create_http_client(timeout: Duration) -> Result<reqwest::Client, CommonError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| CommonError::Unknown(anyhow::anyhow!("Failed to create HTTP client: {e}")))
}

pub struct OidcProvider {
    issuer: IssuerUrl,
    jwks: CoreJsonWebKeySet,
    auth_url: String,
    token_url: String,
    scopes_supported: Vec<String>,
    verifier: CoreIdTokenVerifier<'static>,
    http_client: reqwest::Client,
}

impl OidcProvider {
    /// Fetches the provider's discovery document and signing keys.
    pub async fn discover(
        issuer_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self, CommonError> {
        let issuer =
            IssuerUrl::new(issuer_url.to_string()).map_err(|e| CommonError::InvalidRequest {
                msg: format!("Invalid issuer URL: {e}"),
                source: None,
            })?;

        let http_client = create_http_client(timeout)?;

        let metadata = CoreProviderMetadata::discover_async(issuer.clone(), &http_client)
            .await
            .map_err(|e| {
                CommonError::Unknown(anyhow::anyhow!(
                    "Failed to discover OIDC provider metadata for {issuer_url}: {e}"
                ))
            })?;

        let token_url = metadata
            .token_endpoint()
            .map(|url| url.to_string())
            .ok_or_else(|| CommonError::InvalidResponse {
                msg: format!("OIDC provider {issuer_url} advertises no token endpoint"),
                source: None,
            })?;
        let scopes_supported = metadata
            .scopes_supported()
            .map(|scopes| scopes.iter().map(|scope| scope.to_string()).collect())
            .unwrap_or_default();

        let issuer = metadata.issuer().clone();
        let jwks = metadata.jwks().clone();
        let verifier = CoreIdTokenVerifier::new_confidential_client(
            ClientId::new(client_id.to_string()),
            ClientSecret::new(client_secret.to_string()),
            issuer.clone(),
            jwks.clone(),
        );

        let provider = Self {
            issuer,
            jwks,
            auth_url: metadata.authorization_endpoint().to_string(),
            token_url,
            scopes_supported,
            verifier,
            http_client,
        };
        info!(
            issuer = %provider.issuer.as_str(),
            token_url = %provider.token_url,
            "established OIDC provider"
        );
        Ok(provider)
    }

    pub fn issuer(&self) -> &str {
        self.issuer.as_str()
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// `scopes_supported` from the discovery document, empty when absent.
    pub fn scopes_supported(&self) -> &[String] {
        &self.scopes_supported
    }
}

#[async_trait]
impl TokenExchanger for OidcProvider {
    async fn exchange(
        &self,
        request: &AuthRequestConfig,
        redirect_url: &str,
        code: &str,
    ) -> Result<TokenSet, ClaimsError> {
        let token_url = TokenUrl::new(request.token_url.clone())
            .map_err(|e| ClaimsError::Exchange(anyhow::anyhow!("Invalid token endpoint: {e}")))?;
        let redirect_url = RedirectUrl::new(redirect_url.to_string())
            .map_err(|e| ClaimsError::Exchange(anyhow::anyhow!("Invalid redirect URI: {e}")))?;

        let client = CoreClient::new(
            ClientId::new(request.client_id.clone()),
            self.issuer.clone(),
            self.jwks.clone(),
        )
        .set_client_secret(ClientSecret::new(request.client_secret.clone()))
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url);

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| ClaimsError::Exchange(anyhow::anyhow!("Token exchange failed: {e}")))?;

        debug!(
            has_id_token = token_response.id_token().is_some(),
            has_refresh_token = token_response.refresh_token().is_some(),
            "exchanged authorization code"
        );

        Ok(TokenSet {
            id_token: token_response.id_token().map(|token| token.to_string()),
            refresh_token: token_response
                .refresh_token()
                .map(|token| token.secret().to_string()),
        })
    }
}

#[async_trait]
impl IdTokenVerifier for OidcProvider {
    async fn verify(&self, raw_id_token: &str) -> Result<VerifiedIdToken, ClaimsError> {
        let id_token = CoreIdToken::from_str(raw_id_token)
            .map_err(|e| ClaimsError::Verification(anyhow::anyhow!("Malformed ID token: {e}")))?;

        let claims = id_token
            .claims(&self.verifier, |_: Option<&Nonce>| {
                // No nonce is sent with the authorization request
                Ok(())
            })
            .map_err(|e| ClaimsError::Verification(anyhow::anyhow!("{e}")))?;

        Ok(VerifiedIdToken {
            issuer: claims.issuer().as_str().to_string(),
            email: claims.email().map(|email| email.as_str().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_http_client() {
        assert!(create_http_client(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_discover_rejects_invalid_issuer() {
        let result =
            OidcProvider::discover("not a url", "client", "secret", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CommonError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_discover_unreachable_provider() {
        // port 9 (discard) is never an OIDC provider
        let result = OidcProvider::discover(
            "http://127.0.0.1:9/dex",
            "client",
            "secret",
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(CommonError::Unknown(_))));
    }
}
