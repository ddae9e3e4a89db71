//! # Browser Bridge Intake
//!
//! The browser extension side of the pipeline reports meeting activity as
//! line-delimited JSON events on this process's stdin. This module decodes
//! that stream at the boundary into a tagged event type and forwards the
//! meeting-state changes to the publisher; everything else on the stream is
//! ignored here.

pub mod browser_event;
pub mod event_reader;

pub use browser_event::BrowserEvent;
pub use event_reader::{forward_events, BridgeError};
