use crate::{Event, StreamDecoder};

/// Render every event decoded from `input`, one per line.
pub fn snapshot_from_bytes(input: &[u8]) -> String {
    let mut decoder = StreamDecoder::new();
    let events: Vec<String> = decoder.feed(input).map(|event| render(&event)).collect();
    if events.is_empty() {
        "<none>".to_string()
    } else {
        events.join("\n")
    }
}

pub fn snapshot_from_str(input: &str) -> String {
    snapshot_from_bytes(input.as_bytes())
}

fn render(event: &Event) -> String {
    match event {
        Event::Error(err) => format!("reply: {err}"),
        other => format!("{other:?}"),
    }
}
