//! Payload codec for broker ingress and egress.
//!
//! Broker payloads travel as raw bytes. The configured format decides the
//! structured representation; the configured encoding decides the byte-level
//! wrapping. Both ends of a flow must agree, so the codec lives here rather
//! than in the individual broker components.

// Layer 1: Standard library imports
use std::fmt;
use std::str::FromStr;

// Layer 2: Third-party crate imports
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Structured representation of a broker payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    /// JSON document (default)
    #[default]
    Json,
    /// YAML document
    Yaml,
    /// Plain text
    Text,
    /// Raw bytes, surfaced as text
    Bytes,
}

/// Byte-level wrapping of a formatted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
    /// UTF-8 text (default)
    #[default]
    Utf8,
    /// Base64 over the formatted bytes
    Base64,
    /// No re-encoding; bytes pass through untouched
    None,
}

/// Codec failure, carrying the direction and the underlying cause.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Payload bytes could not be decoded with the configured format
    #[error("Failed to decode {format:?} payload: {reason}")]
    Decode {
        format: PayloadFormat,
        reason: String,
    },

    /// Payload value could not be encoded with the configured format
    #[error("Failed to encode {format:?} payload: {reason}")]
    Encode {
        format: PayloadFormat,
        reason: String,
    },

    /// Unknown format or encoding name in configuration
    #[error("Unknown payload {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },
}

impl FromStr for PayloadFormat {
    type Err = EncodingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "text" => Ok(Self::Text),
            "bytes" => Ok(Self::Bytes),
            other => Err(EncodingError::UnknownName {
                kind: "format",
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Text => "text",
            Self::Bytes => "bytes",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PayloadEncoding {
    type Err = EncodingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "base64" => Ok(Self::Base64),
            "none" => Ok(Self::None),
            other => Err(EncodingError::UnknownName {
                kind: "encoding",
                name: other.to_string(),
            }),
        }
    }
}

/// Render a value as text without quoting plain strings.
fn value_to_text(value: &Value) -> Result<String, EncodingError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        other => serde_json::to_string(other).map_err(|e| EncodingError::Encode {
            format: PayloadFormat::Text,
            reason: e.to_string(),
        }),
    }
}

/// Encode a structured payload to wire bytes.
pub fn encode_payload(
    value: &Value,
    format: PayloadFormat,
    encoding: PayloadEncoding,
) -> Result<Vec<u8>, EncodingError> {
    let formatted = match format {
        PayloadFormat::Json => serde_json::to_vec(value).map_err(|e| EncodingError::Encode {
            format,
            reason: e.to_string(),
        })?,
        PayloadFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| EncodingError::Encode {
                format,
                reason: e.to_string(),
            })?
            .into_bytes(),
        PayloadFormat::Text | PayloadFormat::Bytes => value_to_text(value)?.into_bytes(),
    };

    Ok(match encoding {
        PayloadEncoding::Utf8 | PayloadEncoding::None => formatted,
        PayloadEncoding::Base64 => BASE64.encode(&formatted).into_bytes(),
    })
}

/// Decode wire bytes back into a structured payload.
///
/// `bytes` payloads have no structured form; they are surfaced as a string
/// with lossy UTF-8 so the expression layer can address them.
pub fn decode_payload(
    bytes: &[u8],
    format: PayloadFormat,
    encoding: PayloadEncoding,
) -> Result<Value, EncodingError> {
    let unwrapped: Vec<u8> = match encoding {
        PayloadEncoding::Utf8 | PayloadEncoding::None => bytes.to_vec(),
        PayloadEncoding::Base64 => BASE64.decode(bytes).map_err(|e| EncodingError::Decode {
            format,
            reason: e.to_string(),
        })?,
    };

    match format {
        PayloadFormat::Json => {
            serde_json::from_slice(&unwrapped).map_err(|e| EncodingError::Decode {
                format,
                reason: e.to_string(),
            })
        }
        PayloadFormat::Yaml => {
            serde_yaml::from_slice(&unwrapped).map_err(|e| EncodingError::Decode {
                format,
                reason: e.to_string(),
            })
        }
        PayloadFormat::Text | PayloadFormat::Bytes => {
            Ok(Value::String(String::from_utf8_lossy(&unwrapped).into_owned()))
        }
    }
}
