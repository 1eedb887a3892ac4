use std::io::Write;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use tiny_http::Request;

use crate::dashboard::state::{lock, DashboardEvent, SharedState};

const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

/// Response head for a streaming SSE body. Written by hand because the
/// stream goes straight onto the socket via `into_writer`.
const SSE_HEAD: &str = "HTTP/1.1 200 OK\r\n\
                        Content-Type: text/event-stream\r\n\
                        Cache-Control: no-cache\r\n\
                        Connection: keep-alive\r\n\
                        X-Accel-Buffering: no\r\n\
                        \r\n";

/// Formats a named SSE event with a JSON data payload.
///
/// ```text
/// event: <name>
/// data: <json>
///
/// ```
pub fn format_sse_event(event_name: &str, json_data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event_name, json_data)
}

/// SSE comment; ignored by `EventSource` but keeps idle proxies from
/// closing the connection.
pub const SSE_KEEPALIVE: &str = ": ping\n\n";

fn encode(event: &DashboardEvent) -> Option<String> {
    serde_json::to_string(event)
        .ok()
        .map(|json| format_sse_event(event.name(), &json))
}

/// `GET /events` — replays the event history, then streams new events
/// until the client disconnects or the dashboard shuts down.
pub fn handle(request: Request, state: SharedState) {
    let mut writer = request.into_writer();
    if write_all(&mut writer, SSE_HEAD.as_bytes()).is_err() {
        return;
    }

    let (history, rx) = lock(&state).subscribe();
    log::debug!("sse client connected, replaying {} events", history.len());

    for event in &history {
        if let Some(msg) = encode(event) {
            if write_all(&mut writer, msg.as_bytes()).is_err() {
                return;
            }
        }
    }

    loop {
        let msg = match rx.recv_timeout(KEEPALIVE_INTERVAL) {
            Ok(event) => match encode(&event) {
                Some(msg) => msg,
                None => continue,
            },
            Err(RecvTimeoutError::Timeout) => SSE_KEEPALIVE.to_owned(),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = write_all(&mut writer, format_sse_event("closed", "{}").as_bytes());
                return;
            }
        };
        if write_all(&mut writer, msg.as_bytes()).is_err() {
            log::debug!("sse client disconnected");
            return;
        }
    }
}

fn write_all<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    w.write_all(data)?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_layout() {
        let ev = DashboardEvent::Line { window: 0, x: 1.0, y: 0.5 };
        let frame = encode(&ev).unwrap();
        assert!(frame.starts_with("event: line\ndata: {"));
        assert!(frame.contains("\"kind\":\"line\""));
        assert!(frame.ends_with("\n\n"));
    }
}
