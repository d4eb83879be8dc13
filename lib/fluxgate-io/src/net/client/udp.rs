//! UDP write client.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use fluxgate_event::Batch;
use snafu::{OptionExt as _, ResultExt as _};
use tokio::{
    net::{lookup_host, UdpSocket},
    sync::OnceCell,
};
use tracing::debug;

use super::{Bind, Encode, NoAddress, Resolve, SendDatagram, TransportError};
use crate::ser::line_protocol::{LineProtocolEncoder, TimestampEncoding};

/// Maximum datagram payload size, in bytes.
///
/// A single line larger than this is still sent, alone in its own datagram.
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// A UDP write client.
///
/// Writes are fire-and-forget: a successful write means every datagram was handed to the operating system, not that
/// the store received or persisted anything. There is no write parameter for precision over UDP, so timestamps are
/// rounded to the batch precision and written in nanoseconds. The database and retention policy are configured on the
/// store's UDP listener rather than per write.
#[derive(Debug)]
pub struct UdpClient {
    address: String,
    socket: OnceCell<UdpSocket>,
}

impl UdpClient {
    /// Creates a new `UdpClient` targeting `host:port`.
    ///
    /// No socket is opened until the first write.
    pub fn new(host: &str, port: u16) -> Self {
        let address = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };

        Self {
            address,
            socket: OnceCell::new(),
        }
    }

    /// Returns the target address.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket
            .get_or_try_init(|| async {
                let target = lookup_host(self.address.as_str())
                    .await
                    .context(Resolve { address: &self.address })?
                    .next()
                    .context(NoAddress { address: &self.address })?;

                let local: SocketAddr = if target.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local).await.context(Bind { address: &self.address })?;
                socket.connect(target).await.context(Bind { address: &self.address })?;

                debug!(address = %self.address, %target, "Opened UDP socket.");
                Ok::<_, TransportError>(socket)
            })
            .await
    }

    /// Writes a batch.
    ///
    /// # Errors
    ///
    /// If the batch cannot be encoded, the target cannot be resolved, or a datagram cannot be sent, an error is
    /// returned. Datagrams sent before the failure are not recalled.
    pub async fn write(&self, batch: &Batch) -> Result<(), TransportError> {
        let lines = LineProtocolEncoder::new(batch.precision())
            .with_timestamp_encoding(TimestampEncoding::RoundedNanoseconds)
            .encode_batch(batch)
            .context(Encode)?;
        if lines.is_empty() {
            return Ok(());
        }

        let socket = self.socket().await?;
        let datagrams = pack_datagrams(&lines, MAX_PAYLOAD_SIZE);
        for datagram in &datagrams {
            socket
                .send(datagram.as_bytes())
                .await
                .context(SendDatagram { address: &self.address })?;
        }

        debug!(points = batch.len(), datagrams = datagrams.len(), address = %self.address, "Sent batch.");
        Ok(())
    }
}

/// Packs newline-terminated lines into as few datagrams as possible without exceeding `payload_size`.
fn pack_datagrams(lines: &[String], payload_size: usize) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();

    for line in lines {
        if !current.is_empty() && current.len() + line.len() + 1 > payload_size {
            datagrams.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        datagrams.push(current);
    }

    datagrams
}
