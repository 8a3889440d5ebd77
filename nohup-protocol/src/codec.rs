//! JSON text codec for backend frames
//!
//! The transport carries one JSON object per WebSocket text message. Decoding
//! is two-staged: first into a generic JSON value, then into the typed frame
//! only when the `type` is recognized, so unknown frames degrade to
//! [`InboundFrame::Unrecognized`] instead of a parse error.

use serde_json::Value;

use crate::frames::{InboundFrame, OutboundFrame};

/// Maximum accepted inbound frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Malformed '{frame_type}' frame: {source}")]
    Malformed {
        frame_type: String,
        source: serde_json::Error,
    },

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Decode one inbound text frame
pub fn decode_inbound(text: &str) -> Result<InboundFrame, CodecError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let value: Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(CodecError::NotAnObject)?;

    let frame_type = object
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match frame_type {
        Some(frame_type) if InboundFrame::is_known_type(&frame_type) => {
            serde_json::from_value(value).map_err(|source| CodecError::Malformed {
                frame_type,
                source,
            })
        }
        frame_type => {
            let response = object
                .get("response")
                .and_then(Value::as_str)
                .map(str::to_owned);
            Ok(InboundFrame::Unrecognized {
                frame_type,
                response,
            })
        }
    }
}

/// Encode one outbound frame as JSON text
pub fn encode_outbound(frame: &OutboundFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}
