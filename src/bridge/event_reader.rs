use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use super::browser_event::BrowserEvent;
use crate::publisher::{PublishReason, PublisherHandle};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to read browser event stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Forwards browser events from a line-delimited JSON stream to the
/// publisher until the stream ends. Malformed lines are skipped; they never
/// abort the stream. Stream end means every upstream browser connection is
/// gone, which is reported as an inactive meeting.
pub async fn forward_events<R>(
    reader: R,
    publisher: &PublisherHandle,
) -> Result<(), BridgeError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(event) = decode_line(&line) else {
            continue;
        };
        if let Some(update) = event.into_update() {
            publisher.publish(update.active, update.reason);
        }
    }

    info!("Browser event stream closed; reporting meeting inactive");
    publisher.publish(false, PublishReason::NoBrowsers);
    Ok(())
}

fn decode_line(line: &str) -> Option<BrowserEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => {
            debug!(?event, "Decoded browser event");
            Some(event)
        }
        Err(err) => {
            warn!("Ignoring malformed browser event: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   "), None);
        assert_eq!(decode_line("{not json"), None);
        assert_eq!(decode_line(r#"{"active":true}"#), None); // no discriminator
    }

    #[test]
    fn event_lines_decode() {
        assert_eq!(
            decode_line(r#" {"event":"meetingState","active":true} "#),
            Some(BrowserEvent::MeetingState { active: true })
        );
        assert_eq!(
            decode_line(r#"{"event":"streamDeckConnected"}"#),
            Some(BrowserEvent::Other)
        );
    }

    #[tokio::test]
    async fn stream_end_completes_cleanly() {
        let stream: &[u8] =
            b"{\"event\":\"meetingState\",\"active\":true}\nnot json\n{\"event\":\"other\"}\n";
        let publisher = PublisherHandle::disabled();
        forward_events(stream, &publisher).await.unwrap();
        publisher.shutdown().await;
    }
}
