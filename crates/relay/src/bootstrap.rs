use std::path::Path;
use std::sync::Arc;

use identity::logic::claims::{AuthRequestConfig, ClaimsExtractor, ExtractorConfig};
use identity::logic::handshake::{AuthHandshake, DEFAULT_KUBECFG_ENDPOINT, HandshakeConfig};
use identity::logic::kubeconfig::KubeConfig;
use identity::logic::kubeconfig::template::OsFileReader;
use identity::logic::oidc::OidcProvider;
use identity::logic::scope::{ScopeRequests, offline_as_scope};
use identity::logic::state::StateValidator;
use identity::service::{RelayService, RelayServiceParams};
use shared::error::CommonError;
use tracing::{debug, info};

use crate::cli::Cli;

/// Reads the OAuth2 client secret, ignoring surrounding whitespace.
pub fn read_client_secret(path: &Path) -> Result<String, CommonError> {
    let secret = std::fs::read_to_string(path)?;
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: format!("client secret file {} is empty", path.display()),
            source: None,
        });
    }
    Ok(secret.to_string())
}

/// Discovers the provider and assembles everything the handlers share.
pub async fn build_service(cli: &Cli) -> Result<RelayService, CommonError> {
    let client_secret = read_client_secret(&cli.client_secret_file)?;

    let provider = Arc::new(
        OidcProvider::discover(
            &cli.issuer_url,
            &cli.client_id,
            &client_secret,
            cli.provider_timeout,
        )
        .await?,
    );

    let scopes = ScopeRequests {
        offline_as_scope: offline_as_scope(provider.scopes_supported()),
        scopes: cli.extra_scopes.clone(),
    }
    .get();
    debug!(scopes = ?scopes, "negotiated scopes");

    let template = KubeConfig::load(&cli.kubecfg_template)?;
    info!(
        clusters = template.clusters.len(),
        path = %cli.kubecfg_template.display(),
        "loaded kubecfg template"
    );

    let handshake = AuthHandshake::new(
        HandshakeConfig {
            request: AuthRequestConfig {
                client_id: cli.client_id.clone(),
                client_secret: client_secret.clone(),
                auth_url: provider.auth_url().to_string(),
                token_url: provider.token_url().to_string(),
                scopes,
            },
            kubecfg_endpoint: DEFAULT_KUBECFG_ENDPOINT.to_string(),
            fingerprint: cli.state_client_address,
            tls: cli.tls_cert.is_some() && cli.tls_key.is_some(),
        },
        Arc::new(StateValidator::new(client_secret)),
        ClaimsExtractor::new(
            provider.clone(),
            provider,
            ExtractorConfig {
                email_domain: cli.email_domain.clone(),
            },
        ),
    );

    Ok(RelayService::new(RelayServiceParams {
        handshake,
        template,
        file_reader: Arc::new(OsFileReader),
    }))
}
