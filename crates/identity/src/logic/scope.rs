//! Scope negotiation across providers that disagree on how refresh tokens
//! are requested.
//!
//! Providers advertising `offline_access` (or advertising nothing at all) get
//! it as an explicit scope. Others, notably Google, only issue a refresh
//! token when the authorization request carries `access_type=offline`.

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Scopes sent with every authentication request.
pub const DEFAULT_SCOPES: &[&str] = &[SCOPE_OPENID];

pub const PARAM_ACCESS_TYPE: &str = "access_type";
pub const ACCESS_TYPE_OFFLINE: &str = "offline";
pub const PARAM_PROMPT: &str = "prompt";
pub const PROMPT_CONSENT: &str = "consent";

/// Whether offline access should be requested as a scope, given the
/// provider's advertised `scopes_supported`.
pub fn offline_as_scope(scopes_supported: &[String]) -> bool {
    scopes_supported.is_empty()
        || scopes_supported
            .iter()
            .any(|scope| scope == SCOPE_OFFLINE_ACCESS)
}

#[derive(Debug, Clone, Default)]
pub struct ScopeRequests {
    pub offline_as_scope: bool,
    /// Additional scopes, requested after the defaults in the given order.
    pub scopes: Vec<String>,
}

impl ScopeRequests {
    /// The scopes to request during authentication.
    pub fn get(&self) -> Vec<String> {
        let mut scopes: Vec<String> = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
        if self.offline_as_scope {
            scopes.push(SCOPE_OFFLINE_ACCESS.to_string());
        }
        scopes.extend(self.scopes.iter().cloned());
        scopes
    }
}

/// Extra authorization parameters for a request with the given scopes.
///
/// Consent is always prompted for since most providers only hand out a
/// refresh token on consent. `access_type=offline` is added exactly when
/// offline access is not already requested as a scope.
pub fn auth_code_params(scopes: &[String]) -> Vec<(&'static str, &'static str)> {
    let mut params = vec![(PARAM_PROMPT, PROMPT_CONSENT)];
    if !scopes.iter().any(|scope| scope == SCOPE_OFFLINE_ACCESS) {
        params.push((PARAM_ACCESS_TYPE, ACCESS_TYPE_OFFLINE));
    }
    params
}
