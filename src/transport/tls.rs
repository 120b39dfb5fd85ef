//! Blocking TLS handshake on top of an open TCP socket.

use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme, StreamOwned};

use super::VerifyMode;
use crate::error::TransportError;

/// Run the handshake to completion with `timeout` as the per-operation
/// socket timeout, then hand back the stream with timeouts cleared.
pub(super) fn handshake(
    host: &str,
    mut sock: TcpStream,
    verify: VerifyMode,
    timeout: Duration,
) -> Result<StreamOwned<ClientConnection, TcpStream>, TransportError> {
    let config = match verify {
        VerifyMode::Full => verified_config(),
        VerifyMode::None => insecure_config(),
    };
    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|e| TransportError::Tls(format!("invalid server name {host}: {e}")))?;
    let mut conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    sock.set_read_timeout(Some(timeout))?;
    sock.set_write_timeout(Some(timeout))?;
    while conn.is_handshaking() {
        conn.complete_io(&mut sock)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
    }
    sock.set_read_timeout(None)?;
    sock.set_write_timeout(None)?;

    Ok(StreamOwned::new(conn, sock))
}

fn verified_config() -> ClientConfig {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn insecure_config() -> ClientConfig {
    let _ = rustls::crypto::ring::default_provider().install_default();
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth()
}

#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configs_build() {
        let _ = verified_config();
        let _ = insecure_config();
    }

    #[test]
    fn test_handshake_against_plaintext_peer_fails() {
        use std::io::Write;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let _ = sock.write_all(b"NOTICE * :this is not tls\r\n");
        });

        let sock = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let result = handshake("localhost", sock, VerifyMode::None, Duration::from_secs(5));
        assert!(matches!(result, Err(TransportError::Tls(_))));
        server.join().unwrap();
    }
}
