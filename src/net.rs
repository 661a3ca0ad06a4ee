/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, an HTTP/1.1 client and server library.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Socket plumbing: a unified plain/TLS stream, resolve+connect with a
//! deadline, and rustls configuration for both sides.
//!
//! Trust roots come from the platform store (`rustls-native-certs`, which
//! also honors `SSL_CERT_FILE`) with the Mozilla bundle as fallback.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::server::ServerConfig;
use tokio_rustls::rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::{Error, ErrorKind, Result};

/// TLS peer verification mode for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslVerify {
    /// Verify the certificate chain and host name (the default).
    #[default]
    HostName,
    /// Accept any certificate. For test setups only.
    None,
}

/// Build a root certificate store: platform native certs first, then
/// webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Accepts any server certificate (SslVerify::None).
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}

/// Client TLS config for the requested verification mode.
pub fn client_config(verify: SslVerify) -> Arc<ClientConfig> {
    let config = match verify {
        SslVerify::HostName => ClientConfig::builder()
            .with_root_certificates(build_root_store())
            .with_no_client_auth(),
        SslVerify::None => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth(),
    };
    Arc::new(config)
}

/// Server TLS config from PEM files: a certificate chain and a PKCS#8/RSA
/// private key.
pub fn server_config(cert_file: &Path, key_file: &Path) -> Result<Arc<ServerConfig>> {
    let cert_data = std::fs::read(cert_file)
        .map_err(|e| Error::file(format!("{}: {}", cert_file.display(), e)))?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_data.as_slice())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::file(format!("{}: {}", cert_file.display(), e)))?;

    let key_data = std::fs::read(key_file)
        .map_err(|e| Error::file(format!("{}: {}", key_file.display(), e)))?;
    let key = rustls_pemfile::private_key(&mut key_data.as_slice())
        .map_err(|e| Error::file(format!("{}: {}", key_file.display(), e)))?
        .ok_or_else(|| Error::file(format!("{}: no private key found", key_file.display())))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::new(ErrorKind::Handshake, format!("TLS server config: {}", e)))?;
    Ok(Arc::new(config))
}

/// One stream type for plain TCP and both TLS directions.
#[derive(Debug)]
pub enum MaybeTlsStream {
    Plain(TcpStream),
    ClientTls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    ServerTls(Box<tokio_rustls::server::TlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    /// Graceful shutdown then drop. Safe to call more than once; errors on
    /// an already-closed socket are ignored.
    pub async fn shutdown(&mut self) {
        let _ = AsyncWriteExt::shutdown(self).await;
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::ClientTls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            MaybeTlsStream::ServerTls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::ClientTls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            MaybeTlsStream::ServerTls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::ClientTls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            MaybeTlsStream::ServerTls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::ClientTls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            MaybeTlsStream::ServerTls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Resolve the host and connect within the deadline. Resolution failures
/// report `Resolve`; connect failures and deadline expiry report `Connect`
/// (the latter with the timeout overlay set).
pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let deadline = async {
        tracing::debug!("resolving {}", host);
        let addrs: Vec<_> = lookup_host((host, port))
            .await
            .map_err(|e| Error::new(ErrorKind::Resolve, format!("{}: {}", host, e)))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::new(ErrorKind::Resolve, format!("{}: no addresses", host)));
        }

        let mut last_error = None;
        for addr in addrs {
            tracing::debug!("connecting to {}", addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(Error::new(
            ErrorKind::Connect,
            format!(
                "{}:{}: {}",
                host,
                port,
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        ))
    };

    match timeout(connect_timeout, deadline).await {
        Ok(result) => result,
        Err(_) => {
            Err(Error::new(ErrorKind::Connect, format!("{}:{}: connect timed out", host, port))
                .with_timeout())
        }
    }
}

/// Client-side TLS handshake with SNI over an established TCP stream.
pub async fn tls_handshake(
    tcp: TcpStream,
    host: &str,
    config: Arc<ClientConfig>,
) -> Result<MaybeTlsStream> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| Error::new(ErrorKind::Handshake, format!("invalid host name: {}", host)))?;
    let connector = TlsConnector::from(config);
    let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::new(ErrorKind::Handshake, format!("TLS handshake: {}", e)))?;
    Ok(MaybeTlsStream::ClientTls(Box::new(tls)))
}

/// Server-side TLS accept.
pub async fn tls_accept(tcp: TcpStream, config: Arc<ServerConfig>) -> Result<MaybeTlsStream> {
    let acceptor = TlsAcceptor::from(config);
    let tls = acceptor
        .accept(tcp)
        .await
        .map_err(|e| Error::new(ErrorKind::Handshake, format!("TLS accept: {}", e)))?;
    Ok(MaybeTlsStream::ServerTls(Box::new(tls)))
}
