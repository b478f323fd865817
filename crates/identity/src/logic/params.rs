use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::logic::AuthFlowError;

pub const PARAM_EMAIL: &str = "email";
pub const PARAM_CLIENT_ID: &str = "clientID";
pub const PARAM_CLIENT_SECRET: &str = "clientSecret";
pub const PARAM_ID_TOKEN: &str = "idToken";
pub const PARAM_REFRESH_TOKEN: &str = "refreshToken";
pub const PARAM_ISSUER: &str = "issuer";

/// Wire names of [`AuthenticationParams`], shared by the JSON body of the
/// callback and the query string of the kubeconfig download.
pub const AUTHENTICATION_PARAM_FIELDS: [&str; 6] = [
    PARAM_EMAIL,
    PARAM_CLIENT_ID,
    PARAM_CLIENT_SECRET,
    PARAM_ID_TOKEN,
    PARAM_REFRESH_TOKEN,
    PARAM_ISSUER,
];

/// Everything kubectl needs to authenticate through the OIDC auth provider.
///
/// Produced once per successful callback and handed to the browser; the
/// browser echoes it back as query parameters to download a kubeconfig.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticationParams {
    #[serde(rename = "email")]
    pub username: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "idToken")]
    pub id_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "issuer")]
    pub issuer_url: String,
}

impl AuthenticationParams {
    /// Decodes a raw (still percent-encoded) query string. The first value of
    /// a repeated key wins; unknown keys and a missing `email` are rejected.
    pub fn from_query(query: &str) -> Result<Self, AuthFlowError> {
        let mut params = AuthenticationParams::default();
        let mut seen = BTreeSet::new();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let Some(field) = params.field_mut(&key) else {
                return Err(AuthFlowError::ParamDecodeFailed(format!(
                    "unknown parameter {key}"
                )));
            };
            if seen.insert(key.into_owned()) {
                *field = value.into_owned();
            }
        }

        if params.username.is_empty() {
            return Err(AuthFlowError::ParamDecodeFailed(format!(
                "missing required parameter {PARAM_EMAIL}"
            )));
        }

        Ok(params)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            PARAM_EMAIL => Some(&mut self.username),
            PARAM_CLIENT_ID => Some(&mut self.client_id),
            PARAM_CLIENT_SECRET => Some(&mut self.client_secret),
            PARAM_ID_TOKEN => Some(&mut self.id_token),
            PARAM_REFRESH_TOKEN => Some(&mut self.refresh_token),
            PARAM_ISSUER => Some(&mut self.issuer_url),
            _ => None,
        }
    }

    /// Inverse of [`AuthenticationParams::from_query`].
    pub fn to_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair(PARAM_EMAIL, &self.username)
            .append_pair(PARAM_CLIENT_ID, &self.client_id)
            .append_pair(PARAM_CLIENT_SECRET, &self.client_secret)
            .append_pair(PARAM_ID_TOKEN, &self.id_token)
            .append_pair(PARAM_REFRESH_TOKEN, &self.refresh_token)
            .append_pair(PARAM_ISSUER, &self.issuer_url)
            .finish()
    }
}
