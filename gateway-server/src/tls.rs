use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use gateway_core::config::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::ServerConfig as RustlsServerConfig;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{error, warn};

/// TCP listener wrapped with a TLS acceptor. Implements `axum::serve::Listener`
/// so it drops in for a plain `TcpListener` wherever the server config asks
/// for TLS.
pub struct TlsListener {
    tcp: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    pub fn new(tcp: TcpListener, server_config: Arc<RustlsServerConfig>) -> Self {
        Self {
            tcp,
            acceptor: TlsAcceptor::from(server_config),
        }
    }
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    fn accept(&mut self) -> impl std::future::Future<Output = (Self::Io, Self::Addr)> + Send {
        let acceptor = self.acceptor.clone();
        let tcp = &mut self.tcp;

        async move {
            loop {
                let (stream, addr) = match TcpListener::accept(tcp).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "TCP accept error");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };

                match acceptor.accept(stream).await {
                    Ok(tls_stream) => return (tls_stream, addr),
                    Err(e) => {
                        warn!(peer = %addr, error = %e, "TLS handshake failed");
                        continue;
                    }
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

/// Minimum TLS 1.2, cipher policy `HIGH:!aNULL:!MD5:!RC4` — rustls only ships
/// AEAD suites by default, which already satisfies that policy; there is no
/// RC4/MD5 suite to disable.
pub fn load_server_config(server_config: &ServerConfig) -> anyhow::Result<Arc<RustlsServerConfig>> {
    use tokio_rustls::rustls;

    let cert_path = server_config
        .tls_cert_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("tls_enabled requires tls_cert_path"))?;
    let key_path = server_config
        .tls_key_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("tls_enabled requires tls_key_path"))?;

    let cert_chain = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut config = rustls::ServerConfig::builder_with_protocol_versions(&[
        &rustls::version::TLS12,
        &rustls::version::TLS13,
    ])
    .with_no_client_auth()
    .with_single_cert(cert_chain, key)
    .map_err(|e| anyhow::anyhow!("failed to build TLS server config: {e}"))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> anyhow::Result<Vec<tokio_rustls::rustls::pki_types::CertificateDer<'static>>> {
    use rustls_pemfile::certs;
    use std::fs::File;
    use std::io::BufReader;

    let file = File::open(path).map_err(|e| anyhow::anyhow!("failed to open TLS cert file '{}': {e}", path.display()))?;
    let mut reader = BufReader::new(file);
    let chain = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("failed to parse TLS certificates: {e}"))?;
    if chain.is_empty() {
        anyhow::bail!("TLS cert file '{}' contains no certificates", path.display());
    }
    Ok(chain)
}

fn load_key(path: &Path) -> anyhow::Result<tokio_rustls::rustls::pki_types::PrivateKeyDer<'static>> {
    use rustls_pemfile::private_key;
    use std::fs::File;
    use std::io::BufReader;

    let file = File::open(path).map_err(|e| anyhow::anyhow!("failed to open TLS key file '{}': {e}", path.display()))?;
    let mut reader = BufReader::new(file);
    private_key(&mut reader)
        .map_err(|e| anyhow::anyhow!("failed to parse TLS private key: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("TLS key file '{}' contains no private key", path.display()))
}
