use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use identity::logic::state::FingerprintPolicy;
use shared::error::CommonError;
use tracing::error;

use crate::bootstrap::build_service;
use crate::server::{ServeParams, TlsFiles, serve};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provides OIDC authentication configuration for kubectl.
#[derive(Parser, Debug)]
#[command(name = "kubecfg-relay", version = CLI_VERSION)]
pub struct Cli {
    /// Directory from which to serve the Javascript UI
    #[arg(long, env = "KUBECFG_RELAY_UI", default_value = "/kubecfg-relay/frontend")]
    pub ui: PathBuf,

    /// Address at which to expose the HTTP endpoints
    #[arg(long, env = "KUBECFG_RELAY_LISTEN", default_value = "0.0.0.0:10003")]
    pub listen: SocketAddr,

    /// Run with debug logging
    #[arg(short, long, env = "KUBECFG_RELAY_DEBUG")]
    pub debug: bool,

    /// Wait this long at shutdown before closing HTTP connections
    #[arg(long, env = "KUBECFG_RELAY_CLOSE_AFTER", default_value = "1m", value_parser = humantime::parse_duration)]
    pub close_after: Duration,

    /// Wait this long at shutdown before exiting
    #[arg(long, env = "KUBECFG_RELAY_KILL_AFTER", default_value = "2m", value_parser = humantime::parse_duration)]
    pub kill_after: Duration,

    /// TLS certificate file
    #[arg(long, env = "KUBECFG_RELAY_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key file
    #[arg(long, env = "KUBECFG_RELAY_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Only accept users whose email address belongs to this domain
    #[arg(long, env = "KUBECFG_RELAY_EMAIL_DOMAIN")]
    pub email_domain: Option<String>,

    /// Additional scope to request, may be repeated
    #[arg(long = "extra-scope", env = "KUBECFG_RELAY_EXTRA_SCOPES", value_delimiter = ',')]
    pub extra_scopes: Vec<String>,

    /// Client address bound into the state parameter: none, forwarded-for or remote-addr
    #[arg(long, env = "KUBECFG_RELAY_STATE_CLIENT_ADDRESS", default_value = "none")]
    pub state_client_address: FingerprintPolicy,

    /// Timeout for calls to the identity provider
    #[arg(long, env = "KUBECFG_RELAY_PROVIDER_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub provider_timeout: Duration,

    /// OpenID Connect issuer URL
    #[arg(env = "KUBECFG_RELAY_ISSUER_URL")]
    pub issuer_url: String,

    /// OAuth2 client ID
    #[arg(env = "KUBECFG_RELAY_CLIENT_ID")]
    pub client_id: String,

    /// File containing the OAuth2 client secret
    #[arg(env = "KUBECFG_RELAY_CLIENT_SECRET_FILE")]
    pub client_secret_file: PathBuf,

    /// A kubecfg file containing clusters to populate with a user and contexts
    #[arg(env = "KUBECFG_RELAY_KUBECFG_TEMPLATE")]
    pub kubecfg_template: PathBuf,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    fn tls_files(&self) -> Option<TlsFiles> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}

fn error_causes(err: &dyn Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current: Option<&dyn Error> = err.source();

    while let Some(e) = current {
        causes.push(e.to_string());
        current = e.source();
    }
    causes
}

fn handle_error(err: &CommonError) -> ! {
    error!("Error: {err}");
    for cause in error_causes(err) {
        error!("Caused by: {cause}");
    }
    ::std::process::exit(1);
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    let tls = cli.tls_files();
    let service = match build_service(&cli).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start kubecfg-relay");
            handle_error(&e);
        }
    };

    let res = serve(ServeParams {
        listen: cli.listen,
        ui_dir: cli.ui,
        tls,
        close_after: cli.close_after,
        kill_after: cli.kill_after,
        service,
    })
    .await;

    if let Err(e) = res {
        handle_error(&e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITIONAL: [&str; 4] = [
        "https://accounts.google.com",
        "kubecfg-client",
        "/etc/kubecfg-relay/secret",
        "/etc/kubecfg-relay/template.yaml",
    ];

    fn parse(flags: &[&str]) -> Result<Cli, clap::Error> {
        let args = std::iter::once("kubecfg-relay")
            .chain(flags.iter().copied())
            .chain(POSITIONAL);
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.ui, PathBuf::from("/kubecfg-relay/frontend"));
        assert_eq!(cli.listen, "0.0.0.0:10003".parse().unwrap());
        assert!(!cli.debug);
        assert_eq!(cli.log_level(), "info");
        assert_eq!(cli.close_after, Duration::from_secs(60));
        assert_eq!(cli.kill_after, Duration::from_secs(120));
        assert_eq!(cli.provider_timeout, Duration::from_secs(30));
        assert_eq!(cli.state_client_address, FingerprintPolicy::None);
        assert!(cli.extra_scopes.is_empty());
        assert!(cli.tls_files().is_none());
        assert_eq!(cli.issuer_url, "https://accounts.google.com");
        assert_eq!(cli.client_id, "kubecfg-client");
        assert_eq!(
            cli.kubecfg_template,
            PathBuf::from("/etc/kubecfg-relay/template.yaml")
        );
    }

    #[test]
    fn test_flags() {
        let cli = parse(&[
            "-d",
            "--close-after",
            "5s",
            "--kill-after",
            "1m 30s",
            "--extra-scope",
            "email",
            "--extra-scope",
            "groups",
            "--state-client-address",
            "remote-addr",
            "--email-domain",
            "example.org",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.close_after, Duration::from_secs(5));
        assert_eq!(cli.kill_after, Duration::from_secs(90));
        assert_eq!(cli.extra_scopes, vec!["email", "groups"]);
        assert_eq!(cli.state_client_address, FingerprintPolicy::RemoteAddr);
        assert_eq!(cli.email_domain.as_deref(), Some("example.org"));
    }

    #[test]
    fn test_tls_requires_both_files() {
        assert!(parse(&["--tls-cert", "/tls/crt.pem"]).is_err());

        let cli = parse(&["--tls-cert", "/tls/crt.pem", "--tls-key", "/tls/key.pem"]).unwrap();
        let tls = cli.tls_files().unwrap();
        assert_eq!(tls.cert, PathBuf::from("/tls/crt.pem"));
        assert_eq!(tls.key, PathBuf::from("/tls/key.pem"));
    }

    #[test]
    fn test_rejects_unknown_fingerprint_policy() {
        assert!(parse(&["--state-client-address", "cookie"]).is_err());
    }

    #[test]
    fn test_error_causes_walks_source_chain() {
        let err = CommonError::InvalidRequest {
            msg: "cannot parse kubeconfig".to_string(),
            source: Some(anyhow::anyhow!("missing field `server`")),
        };
        assert_eq!(error_causes(&err), vec!["missing field `server`"]);

        let io: CommonError = std::io::Error::other("permission denied").into();
        assert_eq!(error_causes(&io), vec!["permission denied"]);
    }

    #[test]
    fn test_requires_positional_args() {
        assert!(Cli::try_parse_from(["kubecfg-relay", "https://accounts.google.com"]).is_err());
    }
}
