//! The two-leg login handshake.
//!
//! `login` redirects the browser to the provider with a `state` bound to the
//! browser's fingerprint. `callback` checks that state, then trades the
//! authorization code for credentials. Nothing is stored between the legs.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::logic::AuthFlowError;
use crate::logic::claims::{AuthRequestConfig, ClaimsExtractor};
use crate::logic::params::AuthenticationParams;
use crate::logic::request::RequestContext;
use crate::logic::scope::auth_code_params;
use crate::logic::state::{FingerprintPolicy, StateGenerator};

/// Endpoint, relative to the request's base URL, the provider redirects the
/// browser to after authentication.
pub const DEFAULT_KUBECFG_ENDPOINT: &str = "ui";

pub const PARAM_STATE: &str = "state";
pub const PARAM_CODE: &str = "code";
pub const PARAM_ERROR: &str = "error";
pub const PARAM_ERROR_DESCRIPTION: &str = "error_description";
pub const PARAM_ERROR_URI: &str = "error_uri";

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub request: AuthRequestConfig,
    pub kubecfg_endpoint: String,
    pub fingerprint: FingerprintPolicy,
    /// Whether the listener itself terminates TLS.
    pub tls: bool,
}

/// Query parameters the provider appends to the callback.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

pub struct AuthHandshake {
    config: HandshakeConfig,
    state: Arc<dyn StateGenerator>,
    extractor: ClaimsExtractor,
}

impl AuthHandshake {
    pub fn new(
        config: HandshakeConfig,
        state: Arc<dyn StateGenerator>,
        extractor: ClaimsExtractor,
    ) -> Self {
        Self {
            config,
            state,
            extractor,
        }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// First leg: the provider authorization URL to redirect the browser to.
    pub fn login(&self, ctx: &RequestContext) -> Result<Url, AuthFlowError> {
        let redirect_url = ctx.redirect_url(&self.config.kubecfg_endpoint, self.config.tls)?;
        let state = self.state.generate(&ctx.fingerprint(self.config.fingerprint));
        let url = self.authorization_url(redirect_url.as_str(), &state)?;
        debug!(url = %url, "redirect");
        Ok(url)
    }

    /// Builds the authorization code request URL. Query parameters are
    /// emitted in sorted key order.
    pub fn authorization_url(&self, redirect_url: &str, state: &str) -> Result<Url, AuthFlowError> {
        let request = &self.config.request;
        let mut url = Url::parse(&request.auth_url)
            .map_err(|e| AuthFlowError::InvalidRedirect(format!("invalid auth URL: {e}")))?;

        let scope = request.scopes.join(" ");
        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", request.client_id.as_str()),
            ("redirect_uri", redirect_url),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            (PARAM_STATE, state),
        ];
        params.extend(auth_code_params(&request.scopes));
        params.sort_by_key(|(key, _)| *key);

        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Second leg: validate the callback and extract credentials.
    pub async fn callback(
        &self,
        ctx: &RequestContext,
        params: CallbackParams,
    ) -> Result<AuthenticationParams, AuthFlowError> {
        let supplied = params.state.unwrap_or_default();
        if !self
            .state
            .validate(&ctx.fingerprint(self.config.fingerprint), &supplied)
        {
            return Err(AuthFlowError::InvalidState);
        }

        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            let mut msg = error;
            if let Some(desc) = params.error_description.filter(|d| !d.is_empty()) {
                msg = format!("{msg}: {desc}");
            }
            if let Some(uri) = params.error_uri.filter(|u| !u.is_empty()) {
                msg = format!("{msg} (see {uri})");
            }
            return Err(AuthFlowError::ProviderDenied(msg));
        }

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(AuthFlowError::MissingCode)?;

        let redirect_url = ctx.redirect_url(&self.config.kubecfg_endpoint, self.config.tls)?;
        let authenticated = self
            .extractor
            .process(&self.config.request, redirect_url.as_str(), &code)
            .await?;
        Ok(authenticated)
    }
}
