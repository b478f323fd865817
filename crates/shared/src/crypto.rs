use tokio_rustls::rustls::crypto::CryptoProvider;

/// Installs the ring provider as the process-wide rustls default, used by the
/// HTTPS listener and by outbound calls to the identity provider.
pub fn configure_crypto_provider() -> Result<(), anyhow::Error> {
    if CryptoProvider::get_default().is_some() {
        return Ok(());
    }

    tokio_rustls::rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install rustls crypto provider: {e:?}"))?;

    Ok(())
}
