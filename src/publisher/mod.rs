//! # Meeting State Publisher
//!
//! Forwards the boolean "meeting active" signal to an MQTT broker as a
//! retained topic message, so any subscriber (a busy light, a home automation
//! rule) sees the current call state the moment it connects.
//!
//! ## Module Architecture
//!
//! ```text
//! publisher/
//! ├── config.rs          - environment configuration and broker address parsing
//! ├── call_state.rs      - dedup/defer/republish decision state
//! └── state_publisher.rs - connection driving and retained publishes
//! ```
//!
//! ## Runtime Shape
//!
//! ```text
//! bridge events ─[StateUpdate]→ state actor ─publish→ AsyncClient
//!                                   ↑                     │
//!                         [ConnectionEvent]          (requests)
//!                                   │                     ↓
//!                          connection driver ──── rumqttc EventLoop ── broker
//! ```
//!
//! The state actor is the only writer of the publish bookkeeping; transport
//! notifications and bridge events both reach it over channels. The
//! connection driver owns the event loop and handles reconnect backoff, so a
//! broker outage never stalls the event source: requested values are recorded
//! and the stored value is republished once the connection returns.
//!
//! Configuration comes from the environment once at startup. A missing or
//! invalid `MQTT_URL` disables the publisher for the process lifetime rather
//! than failing the host.

pub mod call_state;
pub mod config;
pub mod state_publisher;

pub use call_state::{CallState, PublishDecision, PublishReason};
pub use config::{ConfigError, MqttSettings};
pub use state_publisher::{PublisherHandle, StateUpdate};
