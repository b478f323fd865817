use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::logic::AuthFlowError;
use crate::logic::handshake::CallbackParams;
use crate::logic::params::AuthenticationParams;
use crate::logic::request::RequestContext;
use crate::service::RelayService;

use super::SERVICE_ROUTE_KEY;

pub fn create_auth_routes() -> OpenApiRouter<RelayService> {
    OpenApiRouter::new()
        .routes(routes!(route_login))
        .routes(routes!(route_callback))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    /// State parameter for CSRF validation
    #[param(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    state: Option<String>,
    /// Authorization code from the IdP
    #[param(example = "abc123")]
    code: Option<String>,
    /// Error from the IdP (if any)
    #[param(example = "access_denied")]
    error: Option<String>,
    /// Error description from the IdP
    #[param(example = "User denied access")]
    error_description: Option<String>,
    /// Page describing the error
    error_uri: Option<String>,
}

impl From<CallbackQuery> for CallbackParams {
    fn from(query: CallbackQuery) -> Self {
        CallbackParams {
            state: query.state,
            code: query.code,
            error: query.error,
            error_description: query.error_description,
            error_uri: query.error_uri,
        }
    }
}

/// Start the login flow - redirects to the IdP
#[utoipa::path(
    get,
    path = "/",
    tags = [SERVICE_ROUTE_KEY],
    responses(
        (status = 303, description = "Redirect to the IdP authorization endpoint"),
        (status = 400, description = "Request has no usable Host header", body = String, content_type = "text/plain"),
    ),
    summary = "Login",
    description = "Redirects the browser to the OIDC provider with a state parameter bound to the browser's fingerprint",
)]
async fn route_login(State(service): State<RelayService>, ctx: RequestContext) -> Response {
    match service.handshake.login(&ctx) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Callback from the IdP - exchanges the code for kubectl credentials
#[utoipa::path(
    get,
    path = "/kubecfg",
    tags = [SERVICE_ROUTE_KEY],
    params(
        CallbackQuery
    ),
    responses(
        (status = 200, description = "Credentials for the kubectl OIDC auth provider", body = AuthenticationParams),
        (status = 400, description = "Missing authorization code", body = String, content_type = "text/plain"),
        (status = 403, description = "Invalid state, IdP error or rejected code", body = String, content_type = "text/plain"),
    ),
    summary = "OAuth callback",
    description = "Validates the state parameter, exchanges the authorization code and verifies the returned ID token",
)]
async fn route_callback(
    State(service): State<RelayService>,
    ctx: RequestContext,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<AuthenticationParams>, AuthFlowError> {
    let params = service.handshake.callback(&ctx, query.into()).await?;
    Ok(Json(params))
}
