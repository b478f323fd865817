use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::logic::AuthFlowError;
use crate::logic::kubeconfig::{AuthInfo, AuthProviderConfig, Context, KubeConfig};
use crate::logic::params::AuthenticationParams;

/// CA bundle mounted into every pod with a service account token.
pub const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

pub const AUTH_PROVIDER_OIDC: &str = "oidc";
pub const OIDC_CLIENT_ID: &str = "client-id";
pub const OIDC_CLIENT_SECRET: &str = "client-secret";
pub const OIDC_ID_TOKEN: &str = "id-token";
pub const OIDC_REFRESH_TOKEN: &str = "refresh-token";
pub const OIDC_ISSUER: &str = "idp-issuer-url";

/// Read access to local files, injectable for tests.
pub trait FileReader: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Builds a kubeconfig for `params.username` from the clusters of `template`.
///
/// Every template cluster gets a context bound to the single generated user.
/// Clusters naming no CA are backfilled from the service account CA when it
/// can be read; failing that they are copied unchanged.
pub fn render(
    template: &KubeConfig,
    params: &AuthenticationParams,
    files: &dyn FileReader,
) -> KubeConfig {
    let provider_config = BTreeMap::from([
        (OIDC_CLIENT_ID.to_string(), params.client_id.clone()),
        (OIDC_CLIENT_SECRET.to_string(), params.client_secret.clone()),
        (OIDC_ID_TOKEN.to_string(), params.id_token.clone()),
        (OIDC_REFRESH_TOKEN.to_string(), params.refresh_token.clone()),
        (OIDC_ISSUER.to_string(), params.issuer_url.clone()),
    ]);

    let mut config = KubeConfig {
        current_context: template.current_context.clone(),
        ..Default::default()
    };
    config.auth_infos.insert(
        params.username.clone(),
        AuthInfo {
            auth_provider: Some(AuthProviderConfig {
                name: AUTH_PROVIDER_OIDC.to_string(),
                config: provider_config,
            }),
        },
    );

    for (name, cluster) in &template.clusters {
        let mut cluster = cluster.clone();
        if !cluster.has_certificate_authority() {
            match files.read(Path::new(SERVICE_ACCOUNT_CA_PATH)) {
                Ok(ca) => cluster.certificate_authority_data = Some(ca),
                Err(e) => debug!(
                    cluster = %name,
                    path = SERVICE_ACCOUNT_CA_PATH,
                    error = %e,
                    "cannot backfill cluster CA"
                ),
            }
        }

        config.clusters.insert(name.clone(), cluster);
        config.contexts.insert(
            name.clone(),
            Context {
                cluster: name.clone(),
                auth_info: params.username.clone(),
                namespace: None,
            },
        );
    }

    config
}

/// [`render`] serialized as a kubeconfig YAML document.
pub fn render_yaml(
    template: &KubeConfig,
    params: &AuthenticationParams,
    files: &dyn FileReader,
) -> Result<String, AuthFlowError> {
    render(template, params, files)
        .to_yaml()
        .map_err(AuthFlowError::SerializationFailed)
}
