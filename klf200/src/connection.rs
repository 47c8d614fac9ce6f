//! Gateway session management.
//!
//! One [`Connection`] owns the TLS stream to the gateway and a reader task
//! that decodes incoming frames and fans them out on a broadcast channel.
//! Request/confirm calls subscribe to that channel before writing, so a
//! confirm can never be missed between send and receive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, DigitallySignedStruct, SignatureScheme};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::messages::{self, IncomingMessage};
use crate::position::Position;
use crate::product::Product;
use crate::slip::SlipDecoder;

/// TCP port of the gateway API socket.
pub const DEFAULT_PORT: u16 = 51200;

/// How long to wait for a request's confirm frame.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a full node enumeration may take.
const ENUMERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Fan-out capacity for incoming gateway messages.
const CHANNEL_CAPACITY: usize = 64;

/// A live session to a KLF-200 gateway.
pub struct Connection {
    writer: Mutex<WriteHalf<TlsStream<TcpStream>>>,
    incoming: broadcast::Sender<IncomingMessage>,
    next_session: AtomicU16,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Open the TLS session and start the frame reader.
    ///
    /// `host` is a hostname or IP, optionally with an explicit `:port`.
    /// This performs no login; call [`Connection::login`] next.
    pub async fn connect(host: &str) -> Result<Self> {
        let (server_name, address) = gateway_address(host)?;

        let tcp = TcpStream::connect(&address).await?;

        let tls_config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(tls_config));

        let name = ServerName::try_from(server_name).map_err(|_| Error::Address(host.into()))?;
        let stream = connector.connect(name, tcp).await?;

        info!(gateway = %address, "Connected to gateway");

        let (read_half, write_half) = tokio::io::split(stream);
        let (incoming, _) = broadcast::channel(CHANNEL_CAPACITY);

        let reader = tokio::spawn(read_loop(read_half, incoming.clone()));

        Ok(Self {
            writer: Mutex::new(write_half),
            incoming,
            next_session: AtomicU16::new(1),
            reader,
        })
    }

    /// Authenticate with the gateway password.
    pub async fn login(&self, password: &str) -> Result<()> {
        let mut rx = self.incoming.subscribe();
        self.send(messages::password_enter(password)).await?;

        let accepted = self
            .wait_for(&mut rx, "GW_PASSWORD_ENTER_CFM", |msg| match msg {
                IncomingMessage::PasswordEnterCfm { accepted } => Some(accepted),
                _ => None,
            })
            .await?;

        if accepted {
            debug!("Gateway accepted the password");
            Ok(())
        } else {
            Err(Error::Rejected("the password"))
        }
    }

    /// Enumerate all products in the gateway's system table.
    pub async fn get_all_products(&self) -> Result<Vec<Product>> {
        let mut rx = self.incoming.subscribe();
        self.send(messages::get_all_nodes_information()).await?;

        let node_count = self
            .wait_for(&mut rx, "GW_GET_ALL_NODES_INFORMATION_CFM", |msg| match msg {
                IncomingMessage::GetAllNodesInformationCfm { node_count } => Some(node_count),
                _ => None,
            })
            .await?;

        if node_count == 0 {
            return Ok(Vec::new());
        }

        let mut products = Vec::with_capacity(usize::from(node_count));
        let collect = async {
            loop {
                match rx.recv().await {
                    Ok(IncomingMessage::NodeInformation(product)) => products.push(product),
                    Ok(IncomingMessage::GetAllNodesInformationFinished) => return Ok(()),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {skipped} gateway messages during enumeration");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(Error::ConnectionClosed),
                }
            }
        };
        tokio::time::timeout(ENUMERATION_TIMEOUT, collect)
            .await
            .map_err(|_| Error::Timeout("GW_GET_ALL_NODES_INFORMATION_FINISHED_NTF"))??;

        Ok(products)
    }

    /// Drive a node's main parameter to the given position.
    ///
    /// Resolves once the gateway has accepted the command; the actual
    /// movement completes (or fails) on its own and is reported through
    /// state-change notifications.
    pub async fn set_target_position(&self, node_id: u8, position: Position) -> Result<()> {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let mut rx = self.incoming.subscribe();
        self.send(messages::command_send(session_id, node_id, position))
            .await?;

        let accepted = self
            .wait_for(&mut rx, "GW_COMMAND_SEND_CFM", |msg| match msg {
                IncomingMessage::CommandSendCfm {
                    session_id: confirmed,
                    accepted,
                } if confirmed == session_id => Some(accepted),
                _ => None,
            })
            .await?;

        if accepted {
            debug!(node_id, %position, "Gateway accepted position command");
            Ok(())
        } else {
            Err(Error::Rejected("the position command"))
        }
    }

    /// Subscribe to incoming gateway messages (state changes in particular).
    pub fn notifications(&self) -> broadcast::Receiver<IncomingMessage> {
        self.incoming.subscribe()
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        let bytes = crate::slip::encode(&frame.encode());
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Wait until `select` accepts an incoming message, bounded by the
    /// response timeout.
    async fn wait_for<T>(
        &self,
        rx: &mut broadcast::Receiver<IncomingMessage>,
        what: &'static str,
        mut select: impl FnMut(IncomingMessage) -> Option<T>,
    ) -> Result<T> {
        let recv = async {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if let Some(value) = select(msg) {
                            return Ok(value);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {skipped} gateway messages while waiting for {what}");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(Error::ConnectionClosed),
                }
            }
        };
        tokio::time::timeout(RESPONSE_TIMEOUT, recv)
            .await
            .map_err(|_| Error::Timeout(what))?
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Read the TLS stream, SLIP-decode it, and fan out parsed messages.
async fn read_loop(
    mut reader: ReadHalf<TlsStream<TcpStream>>,
    incoming: broadcast::Sender<IncomingMessage>,
) {
    let mut decoder = SlipDecoder::new();
    let mut buf = [0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("Gateway closed the connection");
                break;
            }
            Ok(n) => {
                for raw in decoder.push(&buf[..n]) {
                    let msg = match Frame::decode(&raw).and_then(|f| IncomingMessage::parse(&f)) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("Dropping bad frame from gateway: {e}");
                            continue;
                        }
                    };
                    if let IncomingMessage::GatewayError { code } = msg {
                        warn!("Gateway error notification (code {code})");
                    }
                    // No receivers is fine; notifications are best-effort.
                    let _ = incoming.send(msg);
                }
            }
            Err(e) => {
                warn!("Gateway read failed: {e}");
                break;
            }
        }
    }
}

/// Split `host[:port]` into the TLS server name and the socket address.
fn gateway_address(host: &str) -> Result<(String, String)> {
    if host.is_empty() {
        return Err(Error::Address(host.into()));
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() && !name.is_empty() => {
            Ok((name.to_string(), host.to_string()))
        }
        Some(_) => Err(Error::Address(host.into())),
        None => Ok((host.to_string(), format!("{host}:{DEFAULT_PORT}"))),
    }
}

/// Accepts whatever certificate the gateway presents.
///
/// The KLF-200 ships with a factory self-signed certificate that cannot be
/// replaced, so there is nothing meaningful to verify against.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
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
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
