use serde::{Deserialize, Deserializer};

use crate::publisher::{PublishReason, StateUpdate};

/// Events arriving from the browser extension bridge, decoded once at the
/// process boundary. The wire format is JSON with an `"event"` discriminator;
/// kinds this process does not handle collapse into `Other`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event")]
pub enum BrowserEvent {
    #[serde(rename = "meetingState")]
    MeetingState {
        // Absent or null reads as "not in a meeting".
        #[serde(default, deserialize_with = "null_is_false")]
        active: bool,
    },
    #[serde(other)]
    Other,
}

impl BrowserEvent {
    /// Maps a decoded event onto the publisher update it implies, if any.
    pub fn into_update(self) -> Option<StateUpdate> {
        match self {
            BrowserEvent::MeetingState { active } => Some(StateUpdate {
                active,
                reason: PublishReason::Browser,
            }),
            BrowserEvent::Other => None,
        }
    }
}

fn null_is_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
