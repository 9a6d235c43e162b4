//! Messages exchanged between a controlling context and an engine.
//!
//! Both directions are plain serde enums with an adjacent `{"type", "payload"}`
//! layout, so they can cross a process or FFI boundary as JSON. Byte buffers
//! travel as base64 strings.
//!
//! For a single run an engine delivers zero or more `progress`/`log` messages
//! followed by exactly one terminal message: `result`, `error` or `cancelled`.

use crate::config::{ClampPolicy, RawRenderConfig};
use crate::convert::ConversionRequest;
use crate::error::{ErrorKind, Pdf2PptxError};
use crate::output::ConversionResult;
use crate::progress::{ConversionProgressCallback, ProgressEvent};
use serde::{Deserialize, Serialize};

/// Controller → engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Start(StartPayload),
    Cancel,
}

/// Body of [`ClientMessage::Start`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    #[serde(with = "base64_bytes")]
    pub source_bytes: Vec<u8>,
    #[serde(default)]
    pub source_name: Option<String>,
    /// Unvalidated render settings; see [`RawRenderConfig::normalize`].
    #[serde(default)]
    pub render: RawRenderConfig,
    #[serde(default)]
    pub password: Option<String>,
}

impl StartPayload {
    /// Normalise the raw settings into an executable request.
    pub fn into_request(self, policy: &ClampPolicy) -> ConversionRequest {
        ConversionRequest {
            render: self.render.normalize(policy),
            clamp_policy: *policy,
            source_bytes: self.source_bytes,
            source_name: self.source_name,
            password: self.password,
        }
    }
}

/// Engine → controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineMessage {
    Progress(ProgressEvent),
    Log { message: String },
    Result(ConversionResult),
    Error { message: String, kind: ErrorKind },
    Cancelled,
}

impl EngineMessage {
    /// Whether this message ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineMessage::Result(_) | EngineMessage::Error { .. } | EngineMessage::Cancelled
        )
    }

    pub fn progress(label: impl Into<String>, percent: u8) -> Self {
        EngineMessage::Progress(ProgressEvent::new(label, percent))
    }

    pub fn log(message: impl Into<String>) -> Self {
        EngineMessage::Log {
            message: message.into(),
        }
    }

    /// Surface a fatal error verbatim.
    pub fn from_error(err: &Pdf2PptxError) -> Self {
        EngineMessage::Error {
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// Where an engine delivers its messages.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: EngineMessage);
}

impl MessageSink for tokio::sync::mpsc::UnboundedSender<EngineMessage> {
    fn deliver(&self, message: EngineMessage) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(message);
    }
}

impl MessageSink for std::sync::mpsc::Sender<EngineMessage> {
    fn deliver(&self, message: EngineMessage) {
        let _ = self.send(message);
    }
}

/// Adapts a closure into a [`MessageSink`].
pub struct FnSink<F>(pub F);

impl<F> MessageSink for FnSink<F>
where
    F: Fn(EngineMessage) + Send + Sync,
{
    fn deliver(&self, message: EngineMessage) {
        (self.0)(message)
    }
}

/// Turns pipeline progress callbacks into engine messages, optionally
/// mirroring them to a caller-supplied callback.
pub(crate) struct SinkProgress<'a> {
    pub sink: &'a dyn MessageSink,
    pub mirror: Option<&'a dyn ConversionProgressCallback>,
}

impl ConversionProgressCallback for SinkProgress<'_> {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(cb) = self.mirror {
            cb.on_progress(event);
        }
        self.sink.deliver(EngineMessage::Progress(event.clone()));
    }

    fn on_log(&self, message: &str) {
        if let Some(cb) = self.mirror {
            cb.on_log(message);
        }
        self.sink.deliver(EngineMessage::log(message));
    }
}

/// `#[serde(with = "base64_bytes")]` for `Vec<u8>` fields.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageEncoding, RenderMode};
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn start_message_wire_shape() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "start",
            "payload": {
                "source_bytes": "JVBERi0=",
                "source_name": "talk.pdf",
                "render": { "scale": "7", "image_format": "jpeg", "jpeg_quality": "x" }
            }
        }))
        .expect("valid start message");

        let ClientMessage::Start(payload) = msg else {
            panic!("expected start");
        };
        assert_eq!(payload.source_bytes, b"%PDF-");
        let req = payload.into_request(&ClampPolicy::default());
        assert_eq!(req.render.scale, 3.0);
        assert_eq!(req.render.image_format, ImageEncoding::Jpeg { quality: 0.82 });
        assert_eq!(req.render.mode, RenderMode::Image);
        assert_eq!(req.source_name.as_deref(), Some("talk.pdf"));
    }

    #[test]
    fn cancel_message_has_no_payload() {
        let json = serde_json::to_value(ClientMessage::Cancel).unwrap();
        assert_eq!(json, json!({ "type": "cancel" }));
    }

    #[test]
    fn error_message_carries_kind() {
        let msg = EngineMessage::from_error(&Pdf2PptxError::EmptyDeck);
        assert!(msg.is_terminal());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["kind"], "encoding");
    }

    #[test]
    fn progress_and_log_are_not_terminal() {
        assert!(!EngineMessage::progress("x", 10).is_terminal());
        assert!(!EngineMessage::log("x").is_terminal());
        assert!(EngineMessage::Cancelled.is_terminal());
    }

    #[test]
    fn sink_progress_forwards_and_mirrors() {
        struct Count(Mutex<usize>);
        impl ConversionProgressCallback for Count {
            fn on_log(&self, _: &str) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let seen = Mutex::new(Vec::new());
        let sink = FnSink(|m: EngineMessage| seen.lock().unwrap().push(m));
        let mirror = Count(Mutex::new(0));
        let fwd = SinkProgress {
            sink: &sink,
            mirror: Some(&mirror),
        };
        fwd.on_progress(&ProgressEvent::new("Load", 5));
        fwd.on_log("hello");

        assert_eq!(*mirror.0.lock().unwrap(), 1);
        let seen = seen.lock().unwrap();
        assert!(matches!(&seen[0], EngineMessage::Progress(e) if e.percent == 5));
        assert!(matches!(&seen[1], EngineMessage::Log { message } if message == "hello"));
    }

    #[test]
    fn unbounded_sender_is_a_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.deliver(EngineMessage::Cancelled);
        assert!(matches!(rx.try_recv(), Ok(EngineMessage::Cancelled)));
    }
}
