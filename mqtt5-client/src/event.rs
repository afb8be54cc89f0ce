//! Events delivered to the application on the client's inbound stream.
//!
//! The stream carries both ordinary MQTT packets and `Custom` events the
//! engine synthesizes itself for lifecycle signalling. SubAck/UnsubAck/
//! PingResp never reach this stream — the engine intercepts them for
//! reply correlation and keepalive tracking.

use mqtt5_packets::ControlPacket;

/// Why a connection was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    /// `close()` was called by the application.
    ClosedLocally,
    /// The broker closed the transport or sent DISCONNECT.
    ClosedRemotely,
    /// No PINGRESP arrived within the soft deadline.
    PingFailed,
}

/// Lifecycle events the engine produces itself; never parsed from the wire.
#[derive(Debug, Clone)]
pub enum CustomEvent {
    /// The transport closed and the supervisor is about to retry (or has
    /// stopped, if the client is no longer active).
    ConnectionClosed { reason: ClosedReason },
    /// A connection or CONNACK attempt failed before a session was
    /// established.
    FailedConnectionAttempt { reason: String },
    /// The keepalive soft deadline elapsed with no PINGRESP.
    PingFailed,
    /// An otherwise-unrecoverable error occurred in the engine.
    Error { message: String },
}

/// An item on the client's inbound event stream.
#[derive(Debug)]
pub enum InboundEvent {
    /// An MQTT packet forwarded from the broker (SubAck, UnsubAck, and
    /// PingResp are intercepted and never appear here).
    Packet(ControlPacket),
    /// A lifecycle event synthesized by the engine.
    Custom(CustomEvent),
}
