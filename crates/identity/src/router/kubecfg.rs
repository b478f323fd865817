use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use http::header;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::logic::AuthFlowError;
use crate::logic::kubeconfig::template::render_yaml;
use crate::logic::params::AuthenticationParams;
use crate::service::RelayService;

use super::SERVICE_ROUTE_KEY;

pub fn create_kubecfg_routes() -> OpenApiRouter<RelayService> {
    OpenApiRouter::new().routes(routes!(route_kubecfg_yaml))
}

#[utoipa::path(
    get,
    path = "/kubecfg.yaml",
    tags = [SERVICE_ROUTE_KEY],
    params(
        ("email" = String, Query, description = "Username the generated user and contexts are keyed by"),
        ("clientID" = Option<String>, Query, description = "OAuth2 client ID"),
        ("clientSecret" = Option<String>, Query, description = "OAuth2 client secret"),
        ("idToken" = Option<String>, Query, description = "Raw ID token"),
        ("refreshToken" = Option<String>, Query, description = "Refresh token"),
        ("issuer" = Option<String>, Query, description = "ID token issuer URL"),
    ),
    responses(
        (status = 200, description = "Kubeconfig with a user and one context per cluster", body = String, content_type = "text/x-yaml"),
        (status = 400, description = "Malformed or missing parameters", body = String, content_type = "text/plain"),
        (status = 500, description = "Kubeconfig could not be serialized", body = String, content_type = "text/plain"),
    ),
    summary = "Download kubeconfig",
    description = "Populates the cluster template with an OIDC user built from the callback's credentials",
)]
async fn route_kubecfg_yaml(
    State(service): State<RelayService>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, AuthFlowError> {
    let params = AuthenticationParams::from_query(query.as_deref().unwrap_or_default())?;
    let yaml = render_yaml(&service.template, &params, service.file_reader.as_ref())?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/x-yaml; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment"),
        ],
        yaml,
    ))
}
