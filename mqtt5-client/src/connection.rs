use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use mqtt5_core::{codec::Encoder, protocol::ProtocolVersion};
use mqtt5_packets::ControlPacket;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::{
    error::{ClientError, Result},
    options::{Address, TlsOptions},
    reassemble::Reassembler,
    tls::build_tls_connector,
};

/// Either half of the transport the connection was opened over.
pub enum Stream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A connection to an MQTT broker with packet framing.
///
/// Wraps the raw duplex byte stream with a [`Reassembler`] so callers only
/// ever see whole packets, never partial frames.
pub struct Connection {
    stream: Stream,
    reassembler: Reassembler,
    pending: VecDeque<ControlPacket>,
    max_packet_size: Option<u32>,
}

/// Open a transport to `address` (§4.4: tcp/mqtt connect with nodelay;
/// ws/wss are recognized by the scheme matrix but not implemented by this
/// connection layer — see DESIGN.md).
pub async fn connect(address: &Address, tls: Option<&TlsOptions>) -> Result<Connection> {
    match address {
        Address::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
            stream.set_nodelay(true).ok();
            Ok(Connection::new(Stream::Tcp(stream), ProtocolVersion::V5))
        }
        Address::Tls { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
            stream.set_nodelay(true).ok();

            let tls_options = tls.cloned().unwrap_or_default();
            let (connector, server_name) = build_tls_connector(&tls_options, host)?;
            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| ClientError::Tls(e.to_string()))?;

            Ok(Connection::new(
                Stream::Tls(Box::new(tls_stream)),
                ProtocolVersion::V5,
            ))
        }
        Address::WebSocket { .. } => Err(ClientError::Protocol(
            "ws:// and wss:// transports are not implemented by this client".into(),
        )),
    }
}

impl Connection {
    fn new(stream: Stream, protocol_version: ProtocolVersion) -> Self {
        Self {
            stream,
            reassembler: Reassembler::new(protocol_version),
            pending: VecDeque::new(),
            max_packet_size: None,
        }
    }

    /// Set the protocol version for version-aware packet parsing (e.g.
    /// after negotiating MQTT 3.1.1 in CONNACK).
    pub fn set_protocol_version(&mut self, version: ProtocolVersion) {
        self.reassembler.set_protocol_version(version);
    }

    /// Set the Maximum Packet Size the broker negotiated in CONNACK
    /// (applies to the writer: outgoing packets exceeding it are rejected
    /// locally instead of being sent).
    pub fn set_max_packet_size(&mut self, size: u32) {
        self.max_packet_size = Some(size);
    }

    /// Write a control packet to the connection.
    pub async fn write_packet(&mut self, packet: &ControlPacket) -> Result<()> {
        packet.validate()?;

        let mut buffer = BytesMut::new();
        packet.encode(&mut buffer);

        if let Some(max_packet_size) = self.max_packet_size {
            if buffer.len() > max_packet_size as usize {
                return Err(ClientError::Packet(mqtt5_core::error::Error::PolicyViolation(
                    format!(
                        "encoded packet size {} exceeds negotiated Maximum Packet Size {}",
                        buffer.len(),
                        max_packet_size
                    ),
                )));
            }
        }

        self.stream.write_all(&buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next whole control packet from the connection.
    /// Returns `None` if the peer closed the connection.
    pub async fn read_packet(&mut self) -> Result<Option<ControlPacket>> {
        if let Some(packet) = self.pending.pop_front() {
            return Ok(Some(packet));
        }

        loop {
            let mut temp_buf = [0u8; 4096];
            let n = self.stream.read(&mut temp_buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let packets = self.reassembler.feed(&temp_buf[..n])?;
            self.pending.extend(packets);
            if let Some(packet) = self.pending.pop_front() {
                return Ok(Some(packet));
            }
        }
    }
}
