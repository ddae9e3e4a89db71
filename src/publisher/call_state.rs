use std::fmt;

/// Why a publish was requested. Shows up verbatim in the publish log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishReason {
    /// A meeting-state event arrived from the browser bridge.
    Browser,
    /// Every upstream browser connection is gone.
    NoBrowsers,
    /// The broker connection came (back) up with a stored value.
    Reconnect,
}

impl fmt::Display for PublishReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PublishReason::Browser => write!(f, "browser"),
            PublishReason::NoBrowsers => write!(f, "no_browsers"),
            PublishReason::Reconnect => write!(f, "reconnect"),
        }
    }
}

/// Outcome of a publish request against the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishDecision {
    /// Same value already on the wire and the connection is up; nothing to do.
    Unchanged,
    /// Value recorded, but the connection is down; resent on the next connect.
    Deferred,
    /// Value recorded and a retained publish should go out now.
    Publish,
}

/// Bookkeeping for the call-active topic: the last value handed to the broker
/// (or pending for it) and whether the transport is currently up.
///
/// Resets to `(None, false)` on every process start; nothing is persisted.
#[derive(Debug, Default)]
pub struct CallState {
    last_active: Option<bool>,
    connected: bool,
}

impl CallState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides what to do with a requested value.
    ///
    /// `last_active` is updated before any network write is attempted, so a
    /// failed write is not repeated for the next identical request; the next
    /// connect republishes whatever is stored here.
    pub fn request(&mut self, active: bool) -> PublishDecision {
        if self.last_active == Some(active) && self.connected {
            return PublishDecision::Unchanged;
        }
        self.last_active = Some(active);
        if !self.connected {
            return PublishDecision::Deferred;
        }
        PublishDecision::Publish
    }

    /// Marks the transport as up and hands back the value that needs
    /// republishing, if one was recorded. Skips the dedup check: after an
    /// outage the broker's retained value cannot be trusted to match.
    pub fn connection_up(&mut self) -> Option<bool> {
        self.connected = true;
        self.last_active
    }

    pub fn connection_down(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_active(&self) -> Option<bool> {
        self.last_active
    }
}

/// Wire payload for the retained topic message.
pub fn payload(active: bool) -> &'static str {
    if active {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_publishes_while_connected() {
        let mut state = CallState::new();
        assert_eq!(state.connection_up(), None);
        assert_eq!(state.request(true), PublishDecision::Publish);
        assert_eq!(state.last_active(), Some(true));
    }

    #[test]
    fn identical_requests_dedup_while_connected() {
        let mut state = CallState::new();
        state.connection_up();
        assert_eq!(state.request(true), PublishDecision::Publish);
        assert_eq!(state.request(true), PublishDecision::Unchanged);
        assert_eq!(state.request(true), PublishDecision::Unchanged);
    }

    #[test]
    fn changed_value_publishes_again() {
        let mut state = CallState::new();
        state.connection_up();
        assert_eq!(state.request(true), PublishDecision::Publish);
        assert_eq!(state.request(false), PublishDecision::Publish);
        assert_eq!(state.request(true), PublishDecision::Publish);
    }

    #[test]
    fn disconnected_request_defers_and_records() {
        let mut state = CallState::new();
        assert_eq!(state.request(true), PublishDecision::Deferred);
        assert_eq!(state.last_active(), Some(true));
        assert!(!state.is_connected());
    }

    #[test]
    fn reconnect_returns_stored_value_for_republish() {
        let mut state = CallState::new();
        assert_eq!(state.request(true), PublishDecision::Deferred);
        assert_eq!(state.connection_up(), Some(true));
    }

    #[test]
    fn dedup_does_not_swallow_requests_while_disconnected() {
        let mut state = CallState::new();
        state.connection_up();
        assert_eq!(state.request(true), PublishDecision::Publish);
        state.connection_down();
        // Same value as last time, but the retained message may be stale.
        assert_eq!(state.request(true), PublishDecision::Deferred);
        assert_eq!(state.connection_up(), Some(true));
    }

    #[test]
    fn failed_write_is_not_retried_for_identical_request() {
        let mut state = CallState::new();
        state.connection_up();
        // The caller attempts the write after this and it fails on the wire;
        // last_active was already updated, so the repeat stays a no-op.
        assert_eq!(state.request(true), PublishDecision::Publish);
        assert_eq!(state.request(true), PublishDecision::Unchanged);
    }

    #[test]
    fn no_browsers_request_is_idempotent() {
        let mut state = CallState::new();
        state.connection_up();
        assert_eq!(state.request(false), PublishDecision::Publish);
        assert_eq!(state.request(false), PublishDecision::Unchanged);
    }

    #[test]
    fn meeting_sequence_across_an_outage() {
        let mut state = CallState::new();

        // Broker reachable from the start, nothing recorded yet.
        assert_eq!(state.connection_up(), None);

        // Meeting starts: one write of "true".
        assert_eq!(state.request(true), PublishDecision::Publish);

        // Broker drops, meeting ends: recorded but not written.
        state.connection_down();
        assert_eq!(state.request(false), PublishDecision::Deferred);
        assert_eq!(state.last_active(), Some(false));

        // Broker returns: exactly one republish of the stored "false".
        assert_eq!(state.connection_up(), Some(false));
        assert_eq!(state.request(false), PublishDecision::Unchanged);
    }

    #[test]
    fn payload_is_exact_ascii() {
        assert_eq!(payload(true), "true");
        assert_eq!(payload(false), "false");
    }

    #[test]
    fn reason_tags_match_log_format() {
        assert_eq!(PublishReason::Browser.to_string(), "browser");
        assert_eq!(PublishReason::NoBrowsers.to_string(), "no_browsers");
        assert_eq!(PublishReason::Reconnect.to_string(), "reconnect");
    }
}
