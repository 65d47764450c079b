//! `template:` rendering with optional placeholder encoders.
//!
//! Tokens of the form `{{expr}}` are replaced by the evaluated inner
//! expression; an optional scheme prefix selects an encoding:
//! `{{json://input.payload}}`, `{{yaml://input.payload:item}}`,
//! `{{base64://input.payload}}`, `{{datauri:image/png://input.payload}}`.
//! Rendering is deterministic and side-effect-free; missing values render
//! as the empty string.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::ExpressionError;
use super::evaluator::Evaluator;
use super::functions::stringify;
use crate::message::Message;
use crate::util::ComponentIdentity;

#[derive(Debug, PartialEq, Eq)]
enum Encoder {
    Plain,
    Json,
    Yaml,
    Base64,
    DataUri(String),
}

fn split_encoder(token: &str) -> (Encoder, &str) {
    if let Some(rest) = token.strip_prefix("json://") {
        return (Encoder::Json, rest);
    }
    if let Some(rest) = token.strip_prefix("yaml://") {
        return (Encoder::Yaml, rest);
    }
    if let Some(rest) = token.strip_prefix("base64://") {
        return (Encoder::Base64, rest);
    }
    if let Some(after) = token.strip_prefix("datauri:") {
        if let Some((mime, rest)) = after.split_once("://") {
            return (Encoder::DataUri(mime.to_string()), rest);
        }
    }
    (Encoder::Plain, token)
}

fn encode(value: &Value, encoder: &Encoder) -> Result<String, ExpressionError> {
    // Missing values always render empty, regardless of encoder
    if value.is_null() {
        return Ok(String::new());
    }
    match encoder {
        Encoder::Plain => Ok(stringify(value)),
        Encoder::Json => {
            serde_json::to_string(value).map_err(|e| ExpressionError::Template(e.to_string()))
        }
        Encoder::Yaml => {
            serde_yaml::to_string(value).map_err(|e| ExpressionError::Template(e.to_string()))
        }
        Encoder::Base64 => Ok(BASE64.encode(stringify(value).as_bytes())),
        Encoder::DataUri(mime) => Ok(format!(
            "data:{mime};base64,{}",
            BASE64.encode(stringify(value).as_bytes())
        )),
    }
}

/// Render a template body against a message.
pub fn render(
    evaluator: &Evaluator,
    text: &str,
    message: &Message,
    identity: Option<&ComponentIdentity>,
) -> Result<String, ExpressionError> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(ExpressionError::Template(format!(
                "unterminated placeholder in template: {text}"
            )));
        };
        let token = after_open[..end].trim();
        let (encoder, expression) = split_encoder(token);
        let value = evaluator.evaluate_str(expression, message, identity)?;
        output.push_str(&encode(&value, &encoder)?);
        rest = &after_open[end + 2..];
    }
    output.push_str(rest);
    Ok(output)
}
