use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mqtt5_core::payload::{derive_payload_format, PayloadData};
use mqtt5_core::qos::QoS;
use mqtt5_core::reason::ReasonCode;
use mqtt5_packets::auth::AuthPacket;
use mqtt5_packets::connect::{ConnectFlags, ConnectPacket, ConnectPayload, WillProperties};
use mqtt5_packets::disconnect::DisconnectPacket;
use mqtt5_packets::pingreq::PingReqPacket;
use mqtt5_packets::publish::PublishPacket;
use mqtt5_packets::suback::SubAckPacket;
use mqtt5_packets::subscribe::{SubscribePacket, SubscribePayload, SubscriptionOptions};
use mqtt5_packets::unsuback::UnsubAckPacket;
use mqtt5_packets::unsubscribe::{UnsubscribePacket, UnsubscribePayload};
use mqtt5_packets::ControlPacket;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::warn;

use crate::connection::{self, Connection};
use crate::error::{ClientError, Result};
use crate::event::{ClosedReason, CustomEvent, InboundEvent};
use crate::options::{ClientOptions, ConnectOptions, PublishDeserializeOptions};
use crate::pending::PendingReplies;

/// Command sent from a user-facing call to the supervisor task.
enum Command {
    Publish {
        topic: String,
        payload: PayloadData,
        qos: QoS,
        retain: bool,
        response: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        payload: Vec<SubscribePayload>,
        response: oneshot::Sender<Result<SubAckPacket>>,
    },
    Unsubscribe {
        payload: Vec<UnsubscribePayload>,
        response: oneshot::Sender<Result<UnsubAckPacket>>,
    },
    Auth {
        packet: AuthPacket,
        response: oneshot::Sender<Result<()>>,
    },
    Close {
        disconnect: Option<DisconnectPacket>,
        response: oneshot::Sender<()>,
    },
}

/// An asynchronous MQTT client owning a single session with a broker.
///
/// Connection loss is handled transparently: the supervisor reconnects and
/// re-sends CONNECT according to [`ClientOptions::reconnect_time`], carrying
/// forward the broker-assigned client id. [`MqttClient::recv`] yields both
/// forwarded MQTT packets and `Custom` lifecycle events, so the application
/// can tell a fresh session apart from a resumed one and resubscribe when
/// needed.
pub struct MqttClient {
    command_tx: mpsc::Sender<Command>,
    event_rx: Mutex<mpsc::Receiver<InboundEvent>>,
    active: Arc<AtomicBool>,
    assigned_client_id: Arc<Mutex<Option<String>>>,
}

impl MqttClient {
    /// Start the session engine. Returns immediately; the first connection
    /// attempt runs in the background and its outcome is reported on the
    /// event stream.
    pub fn connect(connect_options: ConnectOptions, client_options: ClientOptions) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(256);
        let active = Arc::new(AtomicBool::new(true));
        let assigned_client_id = Arc::new(Mutex::new(connect_options.client_id.clone()));

        let supervisor = Supervisor {
            connect_options,
            client_options,
            command_rx,
            event_tx,
            active: active.clone(),
            assigned_client_id: assigned_client_id.clone(),
        };

        tokio::spawn(supervisor.run());

        MqttClient {
            command_tx,
            event_rx: Mutex::new(event_rx),
            active,
            assigned_client_id,
        }
    }

    /// The client id in use: either what the caller supplied, or the one
    /// the broker assigned in CONNACK once a session has been established.
    pub async fn client_id(&self) -> Option<String> {
        self.assigned_client_id.lock().await.clone()
    }

    /// Receive the next item from the inbound event stream. Returns `None`
    /// once the client has been closed and the stream drained.
    pub async fn recv(&self) -> Option<InboundEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }

    /// Publish a message. Fire-and-forget: QoS 1/2 acknowledgement packets
    /// arrive through the event stream like any other inbound packet, this
    /// client does not run a retransmission state machine on top of them.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        payload: impl Into<PayloadData>,
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        let topic = topic.into();
        let payload = payload.into();

        self.send_command(|response| Command::Publish {
            topic,
            payload,
            qos,
            retain,
            response,
        })
        .await
    }

    /// Subscribe to one or more topic filters and await the matching SubAck.
    pub async fn subscribe(&self, topics: &[(&str, QoS)]) -> Result<SubAckPacket> {
        let payload = topics
            .iter()
            .map(|(topic, qos)| SubscribePayload {
                topic_filter: topic.to_string(),
                subs_opt: SubscriptionOptions::new(*qos),
            })
            .collect();

        self.send_command(|response| Command::Subscribe { payload, response })
            .await
    }

    /// Unsubscribe from one or more topic filters and await the matching
    /// UnsubAck.
    pub async fn unsubscribe(&self, topics: &[&str]) -> Result<UnsubAckPacket> {
        let payload = topics
            .iter()
            .map(|topic| UnsubscribePayload {
                topic_filter: topic.to_string(),
            })
            .collect();

        self.send_command(|response| Command::Unsubscribe { payload, response })
            .await
    }

    /// Send an AUTH packet, used to continue a broker-initiated enhanced
    /// authentication exchange.
    pub async fn auth(&self, packet: AuthPacket) -> Result<()> {
        self.send_command(|response| Command::Auth { packet, response })
            .await
    }

    /// Close the client. Best-effort sends `disconnect` (default: normal
    /// disconnection), stops the supervisor, and waits for it to finish
    /// tearing down. Safe to call more than once.
    pub async fn close(&self, disconnect: Option<DisconnectPacket>) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let (response_tx, response_rx) = oneshot::channel();
        if self
            .command_tx
            .send(Command::Close {
                disconnect,
                response: response_tx,
            })
            .await
            .is_ok()
        {
            let _ = response_rx.await;
        }
    }

    async fn send_command<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(make(response_tx))
            .await
            .map_err(|_| ClientError::NotConnected)?;

        response_rx.await.map_err(|_| ClientError::Disconnected)?
    }
}

/// Keepalive used when neither the caller nor the broker requests one.
const DEFAULT_KEEP_ALIVE_SECS: u16 = 5;

struct Supervisor {
    connect_options: ConnectOptions,
    client_options: ClientOptions,
    command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<InboundEvent>,
    active: Arc<AtomicBool>,
    assigned_client_id: Arc<Mutex<Option<String>>>,
}

impl Supervisor {
    async fn run(mut self) {
        while self.active.load(Ordering::SeqCst) {
            let connection = match self.acquire_connection().await {
                Some(connection) => connection,
                None => continue,
            };

            let reason = self.run_session(connection).await;
            let _ = self
                .event_tx
                .send(InboundEvent::Custom(CustomEvent::ConnectionClosed {
                    reason,
                }))
                .await;
        }
    }

    /// Step 1 of the supervisor loop: keep trying to open a transport and
    /// complete the CONNECT/CONNACK handshake until one succeeds or the
    /// client is closed.
    async fn acquire_connection(&mut self) -> Option<Connection> {
        loop {
            if !self.active.load(Ordering::SeqCst) {
                return None;
            }

            match self.try_connect_and_handshake().await {
                Ok(connection) => return Some(connection),
                Err(reason) => {
                    let _ = self
                        .event_tx
                        .send(InboundEvent::Custom(CustomEvent::FailedConnectionAttempt {
                            reason,
                        }))
                        .await;

                    if self.client_options.reconnect_time.is_zero() {
                        self.active.store(false, Ordering::SeqCst);
                        return None;
                    }

                    tokio::time::sleep(self.client_options.reconnect_time).await;
                }
            }
        }
    }

    async fn try_connect_and_handshake(&mut self) -> std::result::Result<Connection, String> {
        let mut connection = connection::connect(
            &self.connect_options.address,
            self.connect_options.tls.as_ref(),
        )
        .await
        .map_err(|e| e.to_string())?;

        connection.set_protocol_version(self.connect_options.protocol_version);

        let client_id = self.assigned_client_id.lock().await.clone();
        let connect_packet = build_connect_packet(&self.connect_options, client_id);

        connection
            .write_packet(&ControlPacket::Connect(connect_packet))
            .await
            .map_err(|e| e.to_string())?;

        let connack = timeout(
            self.client_options.connect_timeout,
            connection.read_packet(),
        )
        .await
        .map_err(|_| "timed out waiting for ConnAck".to_string())?
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "connection closed before ConnAck".to_string())?;

        match connack {
            ControlPacket::ConnAck(ack) if ack.reason_code == ReasonCode::Success => {
                if let Some(assigned) = ack
                    .properties
                    .as_ref()
                    .and_then(|p| p.assigned_client_id.as_ref())
                {
                    *self.assigned_client_id.lock().await = Some(assigned.value.clone());
                }

                if let Some(max_packet_size) = ack
                    .properties
                    .as_ref()
                    .and_then(|p| p.maximum_packet_size.as_ref())
                {
                    connection.set_max_packet_size(max_packet_size.value);
                }

                let _ = self
                    .event_tx
                    .send(InboundEvent::Packet(ControlPacket::ConnAck(ack)))
                    .await;

                Ok(connection)
            }
            ControlPacket::ConnAck(ack) => {
                Err(format!("broker refused connection: {:?}", ack.reason_code))
            }
            _ => Err("broker sent a non-ConnAck packet in response to Connect".to_string()),
        }
    }

    /// Steps 3-5 of the supervisor loop: run one connected session until it
    /// ends, for whatever reason, dispatching commands and inbound packets
    /// as they arrive.
    async fn run_session(&mut self, mut connection: Connection) -> ClosedReason {
        let keep_alive_secs = if self.connect_options.keep_alive > 0 {
            self.connect_options.keep_alive
        } else {
            DEFAULT_KEEP_ALIVE_SECS
        };
        let keep_alive = Duration::from_secs(keep_alive_secs as u64);
        let ping_interval = keep_alive.saturating_sub(Duration::from_millis(100));
        let soft_deadline = keep_alive.mul_f64(1.5);

        let mut pending = PendingReplies::new();
        let mut last_pingresp_at = Instant::now();
        let mut ping_timer = tokio::time::interval(ping_interval.max(Duration::from_millis(1)));
        ping_timer.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = ping_timer.tick() => {
                    if last_pingresp_at.elapsed() > soft_deadline {
                        let _ = self.event_tx.send(InboundEvent::Custom(CustomEvent::PingFailed)).await;
                        pending.reject_all();
                        return ClosedReason::PingFailed;
                    }

                    if connection.write_packet(&ControlPacket::PingReq(PingReqPacket {})).await.is_err() {
                        pending.reject_all();
                        return ClosedReason::ClosedRemotely;
                    }
                }

                packet = connection.read_packet() => {
                    match packet {
                        Ok(Some(ControlPacket::SubAck(ack))) => {
                            if !pending.resolve(ack.packet_id, ControlPacket::SubAck(ack)) {
                                warn!("SUBACK for unknown packet identifier");
                            }
                        }
                        Ok(Some(ControlPacket::UnsubAck(ack))) => {
                            if !pending.resolve(ack.packet_id, ControlPacket::UnsubAck(ack)) {
                                warn!("UNSUBACK for unknown packet identifier");
                            }
                        }
                        Ok(Some(ControlPacket::PingResp(_))) => {
                            last_pingresp_at = Instant::now();
                        }
                        Ok(Some(ControlPacket::Disconnect(_))) => {
                            pending.reject_all();
                            return ClosedReason::ClosedRemotely;
                        }
                        Ok(Some(ControlPacket::Publish(mut packet))) => {
                            apply_deserialize_options(
                                &mut packet,
                                self.client_options.publish_deserialize_options,
                            );
                            let _ = self
                                .event_tx
                                .send(InboundEvent::Packet(ControlPacket::Publish(packet)))
                                .await;
                        }
                        Ok(Some(packet)) => {
                            let _ = self.event_tx.send(InboundEvent::Packet(packet)).await;
                        }
                        Ok(None) => {
                            pending.reject_all();
                            return ClosedReason::ClosedRemotely;
                        }
                        Err(e) => {
                            let _ = self.event_tx.send(InboundEvent::Custom(CustomEvent::Error {
                                message: e.to_string(),
                            })).await;
                            pending.reject_all();
                            return ClosedReason::ClosedRemotely;
                        }
                    }
                }

                Some(command) = self.command_rx.recv() => {
                    if let HandleOutcome::CloseRequested = self.handle_command(&mut connection, &mut pending, command).await {
                        return ClosedReason::ClosedLocally;
                    }
                }
            }
        }
    }

    async fn handle_command(
        &self,
        connection: &mut Connection,
        pending: &mut PendingReplies,
        command: Command,
    ) -> HandleOutcome {
        match command {
            Command::Publish {
                topic,
                payload,
                qos,
                retain,
                response,
            } => {
                let packet_id = if qos == QoS::AtMostOnce {
                    None
                } else {
                    match pending.register() {
                        Ok((id, _receiver)) => {
                            pending.release(id);
                            Some(id)
                        }
                        Err(e) => {
                            let _ = response.send(Err(e));
                            return HandleOutcome::Continue;
                        }
                    }
                };

                let packet = PublishPacket {
                    dup: false,
                    qos_level: qos,
                    retain,
                    topic_name: topic,
                    packet_id,
                    properties: None,
                    payload: Some(payload),
                };
                // `payload_format_indicator` is derived automatically from
                // `payload`'s logical type when the packet is encoded.

                let result = connection.write_packet(&ControlPacket::Publish(packet)).await;
                let _ = response.send(result);
            }
            Command::Subscribe { payload, response } => match pending.register() {
                Ok((packet_id, receiver)) => {
                    let packet = SubscribePacket {
                        packet_id,
                        properties: None,
                        payload,
                    };
                    if let Err(e) = connection
                        .write_packet(&ControlPacket::Subscribe(packet))
                        .await
                    {
                        let _ = response.send(Err(e));
                    } else {
                        tokio::spawn(async move {
                            let result = receiver
                                .await
                                .map_err(|_| ClientError::Disconnected)
                                .and_then(|packet| match packet {
                                    ControlPacket::SubAck(ack) => Ok(ack),
                                    _ => Err(ClientError::Protocol(
                                        "unexpected reply to Subscribe".into(),
                                    )),
                                });
                            let _ = response.send(result);
                        });
                    }
                }
                Err(e) => {
                    let _ = response.send(Err(e));
                }
            },
            Command::Unsubscribe { payload, response } => match pending.register() {
                Ok((packet_id, receiver)) => {
                    let packet = UnsubscribePacket {
                        packet_id,
                        properties: None,
                        payload,
                    };
                    if let Err(e) = connection
                        .write_packet(&ControlPacket::Unsubscribe(packet))
                        .await
                    {
                        let _ = response.send(Err(e));
                    } else {
                        tokio::spawn(async move {
                            let result = receiver
                                .await
                                .map_err(|_| ClientError::Disconnected)
                                .and_then(|packet| match packet {
                                    ControlPacket::UnsubAck(ack) => Ok(ack),
                                    _ => Err(ClientError::Protocol(
                                        "unexpected reply to Unsubscribe".into(),
                                    )),
                                });
                            let _ = response.send(result);
                        });
                    }
                }
                Err(e) => {
                    let _ = response.send(Err(e));
                }
            },
            Command::Auth { packet, response } => {
                let result = connection.write_packet(&ControlPacket::Auth(packet)).await;
                let _ = response.send(result);
            }
            Command::Close {
                disconnect,
                response,
            } => {
                let disconnect = disconnect.unwrap_or(DisconnectPacket {
                    reason: ReasonCode::NormalDisconnection,
                    properties: None,
                });
                let _ = connection
                    .write_packet(&ControlPacket::Disconnect(disconnect))
                    .await;
                pending.reject_all();
                let _ = response.send(());
                return HandleOutcome::CloseRequested;
            }
        }

        HandleOutcome::Continue
    }
}

enum HandleOutcome {
    Continue,
    CloseRequested,
}

/// Applies the configured `PublishDeserializeOptions` to a decoded PUBLISH,
/// reinterpreting its raw wire bytes as UTF-8 when called for. The codec
/// always decodes to raw bytes (it has no access to `ClientOptions`); this
/// is the one place that representation is resolved for the application.
fn apply_deserialize_options(packet: &mut PublishPacket, options: PublishDeserializeOptions) {
    let Some(payload) = packet.payload.take() else {
        return;
    };

    let as_utf8 = match options {
        PublishDeserializeOptions::PayloadFormatIndicator => packet
            .properties
            .as_ref()
            .and_then(|p| p.payload_format_indicator.as_ref())
            .map(|indicator| indicator.value == 1)
            .unwrap_or(false),
        PublishDeserializeOptions::Utf8String => true,
        PublishDeserializeOptions::DataReader | PublishDeserializeOptions::Uint8Array => false,
    };

    packet.payload = Some(if as_utf8 {
        PayloadData::Utf8(String::from_utf8_lossy(payload.as_bytes()).into_owned())
    } else {
        payload
    });
}

fn build_connect_packet(options: &ConnectOptions, client_id: Option<String>) -> ConnectPacket {
    let flags = ConnectFlags {
        user_name: options.username.is_some(),
        password: options.password.is_some(),
        will_retain: options.will.as_ref().map(|w| w.retain).unwrap_or(false),
        will_qos: options
            .will
            .as_ref()
            .map(|w| w.qos)
            .unwrap_or(QoS::AtMostOnce),
        will_flag: options.will.is_some(),
        clean_start: options.clean_start,
    };

    let will_properties = options.will.as_ref().map(|w| WillProperties {
        payload_format_indicator: derive_payload_format(&w.payload),
        ..Default::default()
    });

    let payload = ConnectPayload {
        client_id: client_id.unwrap_or_default(),
        will_properties,
        will_topic: options.will.as_ref().map(|w| w.topic.clone()),
        will_payload: options.will.as_ref().map(|w| w.payload.clone().into_bytes()),
        user_name: options.username.clone(),
        password: options.password.clone(),
    };

    ConnectPacket {
        protocol_version: options.protocol_version,
        flags,
        keepalive: options.keep_alive,
        properties: None,
        payload,
    }
}
