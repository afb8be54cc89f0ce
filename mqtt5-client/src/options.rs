use std::time::Duration;

use bytes::Bytes;
use mqtt5_core::{payload::PayloadData, protocol::ProtocolVersion, qos::QoS};
use url::Url;

use crate::error::{ClientError, Result};

/// Will message configuration.
#[derive(Debug, Clone)]
pub struct Will {
    pub topic: String,
    pub payload: PayloadData,
    pub qos: QoS,
    pub retain: bool,
}

impl Will {
    pub fn new(topic: impl Into<String>, payload: impl Into<PayloadData>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}

/// TLS configuration for `mqtts`/`wss`-style secure connections.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub(crate) ca_path: Option<String>,
    pub(crate) danger_skip_verify: bool,
}

impl TlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust a custom CA certificate instead of the system/webpki roots.
    pub fn ca_path(mut self, path: impl Into<String>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// Disable certificate verification entirely. For local testing only.
    pub fn danger_skip_verify(mut self, skip: bool) -> Self {
        self.danger_skip_verify = skip;
        self
    }
}

/// The transport scheme and address a [`ConnectOptions`] resolves to.
///
/// Mirrors the scheme matrix: `tcp`/`mqtt` connect over plain TCP (default
/// port 1883, nodelay on); `mqtts`/`ssl` do the same over TLS; `ws`/`wss`
/// are accepted at the API boundary but rejected at connect time — this
/// repo implements the two transports the teacher's connection layer
/// actually drives.
#[derive(Debug, Clone)]
pub enum Address {
    Tcp { host: String, port: u16 },
    Tls { host: String, port: u16 },
    WebSocket { url: Url, secure: bool },
}

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTTS_PORT: u16 = 8883;

impl Address {
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| ClientError::Protocol(format!("invalid broker URL '{url}': {e}")))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| ClientError::Protocol(format!("URL '{url}' has no host")))?
            .to_string();

        match parsed.scheme() {
            "tcp" | "mqtt" => Ok(Address::Tcp {
                host,
                port: parsed.port().unwrap_or(DEFAULT_MQTT_PORT),
            }),
            "mqtts" | "ssl" => Ok(Address::Tls {
                host,
                port: parsed.port().unwrap_or(DEFAULT_MQTTS_PORT),
            }),
            "ws" => Ok(Address::WebSocket {
                url: parsed,
                secure: false,
            }),
            "wss" => Ok(Address::WebSocket {
                url: parsed,
                secure: true,
            }),
            other => Err(ClientError::Protocol(format!(
                "unsupported broker URL scheme '{other}'"
            ))),
        }
    }
}

/// Options for connecting to an MQTT broker.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub(crate) address: Address,
    pub(crate) client_id: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<Bytes>,
    pub(crate) keep_alive: u16,
    pub(crate) clean_start: bool,
    pub(crate) will: Option<Will>,
    pub(crate) protocol_version: ProtocolVersion,
    pub(crate) tls: Option<TlsOptions>,
}

impl ConnectOptions {
    /// Create new connection options for the given host and port, using
    /// plain TCP (the `tcp://` scheme).
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            address: Address::Tcp {
                host: host.into(),
                port,
            },
            client_id: None,
            username: None,
            password: None,
            keep_alive: 0,
            clean_start: true,
            will: None,
            protocol_version: ProtocolVersion::V5,
            tls: None,
        }
    }

    /// Create connection options from a broker URL
    /// (`tcp://`, `mqtt://`, `mqtts://`, `ws://`, `wss://`).
    pub fn from_url(url: &str) -> Result<Self> {
        let address = Address::parse(url)?;
        let tls = matches!(address, Address::Tls { .. }).then(TlsOptions::new);

        Ok(Self {
            address,
            client_id: None,
            username: None,
            password: None,
            keep_alive: 0,
            clean_start: true,
            will: None,
            protocol_version: ProtocolVersion::V5,
            tls,
        })
    }

    /// Set the client ID. If not set, the broker will assign one.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password for authentication.
    pub fn password(mut self, password: impl Into<Bytes>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the keep-alive interval in seconds. 0 disables keepalive.
    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    /// Set clean start flag. If true, the broker will discard any existing session.
    pub fn clean_start(mut self, clean: bool) -> Self {
        self.clean_start = clean;
        self
    }

    /// Set the will message to be published if the client disconnects unexpectedly.
    pub fn will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }

    /// Set the MQTT protocol version to use.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Configure TLS. Implied already when the address is `mqtts://`/`ssl://`.
    pub fn tls(mut self, options: TlsOptions) -> Self {
        self.tls = Some(options);
        self
    }
}

/// How a received PUBLISH payload is exposed to the application.
///
/// `DataReader` and `Uint8Array` are kept distinct in the contract because
/// some language bindings distinguish a borrowed view from an owned copy;
/// under `bytes::Bytes`'s refcounted-slice model both collapse to the same
/// representation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDeserializeOptions {
    /// Interpret as UTF-8 when `payload_format_indicator == 1`, otherwise
    /// leave as raw bytes.
    PayloadFormatIndicator,
    /// Always interpret as a UTF-8 string, regardless of the indicator.
    Utf8String,
    /// Always expose raw bytes.
    DataReader,
    /// Always expose raw bytes.
    Uint8Array,
}

impl Default for PublishDeserializeOptions {
    fn default() -> Self {
        Self::PayloadFormatIndicator
    }
}

/// Options governing the session engine itself, as opposed to a single
/// connection attempt (`ConnectOptions`).
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub(crate) reconnect_time: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) publish_deserialize_options: PublishDeserializeOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect_time: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(10_000),
            publish_deserialize_options: PublishDeserializeOptions::default(),
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay between reconnect attempts. 0 disables automatic reconnect.
    pub fn reconnect_time(mut self, duration: Duration) -> Self {
        self.reconnect_time = duration;
        self
    }

    /// How long to await the ConnAck after writing Connect.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// How received PUBLISH payloads are exposed on the event stream.
    /// Defaults to [`PublishDeserializeOptions::PayloadFormatIndicator`].
    pub fn publish_deserialize_options(mut self, options: PublishDeserializeOptions) -> Self {
        self.publish_deserialize_options = options;
        self
    }
}
