//! TLS configuration and certificate loading.

use std::io::{Error, ErrorKind};
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load a rustls server config from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("{what} file not found: {}", path.display()),
            ));
        }
    }

    tracing::debug!(cert = %cert_path.display(), key = %key_path.display(), "Loading TLS material");
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
