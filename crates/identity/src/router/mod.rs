mod auth;
mod kubecfg;

use utoipa::openapi::tag::TagBuilder;
use utoipa::openapi::{Info, OpenApi};
use utoipa_axum::router::OpenApiRouter;

use crate::service::RelayService;

pub const SERVICE_ROUTE_KEY: &str = "kubecfg-relay";

pub fn create_router() -> OpenApiRouter<RelayService> {
    OpenApiRouter::new()
        .merge(auth::create_auth_routes())
        .merge(kubecfg::create_kubecfg_routes())
}

pub fn generate_openapi_spec() -> OpenApi {
    let (_, mut spec) = create_router().split_for_parts();

    let mut info = Info::new(
        "kubecfg-relay",
        "OIDC login relay that hands kubectl its credentials",
    );
    info.version = env!("CARGO_PKG_VERSION").to_string();
    spec.info = info;

    spec.tags = Some(vec![
        TagBuilder::new()
            .name(SERVICE_ROUTE_KEY)
            .description(Some(
                "Login, OAuth callback and kubeconfig download endpoints",
            ))
            .build(),
    ]);

    spec
}
