//! Asynchronous MQTT 5 client library.
//!
//! This crate provides an asynchronous MQTT client for connecting to MQTT
//! brokers over `tcp://`/`mqtt://` and `mqtts://`/`ssl://`. A connected
//! [`MqttClient`] reconnects on its own and exposes both ordinary MQTT
//! packets and engine lifecycle events on a single inbound stream.
//!
//! # Example
//!
//! ```no_run
//! use mqtt5_client::{ClientOptions, ConnectOptions, InboundEvent, MqttClient};
//! use mqtt5_core::qos::QoS;
//!
//! #[tokio::main]
//! async fn main() {
//!     let connect_options = ConnectOptions::new("localhost", 1883)
//!         .client_id("my-client")
//!         .clean_start(true);
//!
//!     let client = MqttClient::connect(connect_options, ClientOptions::default());
//!
//!     client
//!         .subscribe(&[("test/topic", QoS::AtLeastOnce)])
//!         .await
//!         .unwrap();
//!
//!     client
//!         .publish("test/topic", "Hello, MQTT!", QoS::AtLeastOnce, false)
//!         .await
//!         .unwrap();
//!
//!     while let Some(event) = client.recv().await {
//!         if let InboundEvent::Packet(packet) = event {
//!             println!("received {packet:?}");
//!         }
//!     }
//! }
//! ```

mod client;
mod connection;
mod error;
mod event;
mod options;
mod pending;
mod reassemble;
mod tls;

pub use client::MqttClient;
pub use error::{ClientError, Result};
pub use event::{ClosedReason, CustomEvent, InboundEvent};
pub use options::{Address, ClientOptions, ConnectOptions, PublishDeserializeOptions, TlsOptions, Will};

// Re-export commonly used types from mqtt5-core
pub use mqtt5_core::payload::PayloadData;
pub use mqtt5_core::protocol::ProtocolVersion;
pub use mqtt5_core::qos::QoS;
