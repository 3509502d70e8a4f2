//! Wire codecs for crawl requests.
//!
//! A codec turns a [`CrawlRequest`] into bytes for the backing store and back.
//! Two formats are shipped: MessagePack (binary, the compact default) and
//! JSON (text, readable and diffable). [`CompatCodec`] reads both, so a fleet
//! can be migrated between formats without draining its queues first.
//!
//! Every codec upholds the round-trip law: decoding an encoded request yields
//! a value equal to the original.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::CrawlRequest;

/// Encode/decode strategy for queue payloads.
pub trait RequestCodec: Send + Sync {
    /// Serialize a request for the wire.
    fn encode(&self, request: &CrawlRequest) -> Result<Vec<u8>>;

    /// Reconstruct a request from a wire payload.
    fn decode(&self, payload: &[u8]) -> Result<CrawlRequest>;

    /// Short format name for logs.
    fn name(&self) -> &'static str;
}

/// Codec choice as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    Msgpack,
    Json,
    #[default]
    Compat,
}

impl CodecKind {
    /// Instantiate the configured codec.
    pub fn build(self) -> Arc<dyn RequestCodec> {
        match self {
            CodecKind::Msgpack => Arc::new(MsgpackCodec),
            CodecKind::Json => Arc::new(JsonCodec),
            CodecKind::Compat => Arc::new(CompatCodec),
        }
    }
}

/// Binary codec: MessagePack maps with named fields.
///
/// The body travels byte for byte, so any payload a request can hold is
/// representable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl RequestCodec for MsgpackCodec {
    fn encode(&self, request: &CrawlRequest) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(request).map_err(|e| Error::Encode(format!("msgpack: {}", e)))
    }

    fn decode(&self, payload: &[u8]) -> Result<CrawlRequest> {
        rmp_serde::from_slice(payload).map_err(|e| Error::Decode(format!("msgpack: {}", e)))
    }

    fn name(&self) -> &'static str {
        "msgpack"
    }
}

/// Wire shape of the text format. Identical to [`CrawlRequest`] except that
/// the body is carried as text in the request's declared encoding. Fields
/// other than the URL are optional, matching what sparse producers write.
#[derive(Serialize, Deserialize)]
struct TextEnvelope {
    url: String,
    #[serde(default = "crate::request::default_method")]
    method: String,
    #[serde(default)]
    headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    cookies: std::collections::HashMap<String, String>,
    #[serde(default)]
    meta: std::collections::HashMap<String, serde_json::Value>,
    #[serde(default)]
    callback: Option<String>,
    #[serde(default)]
    priority: i32,
    #[serde(rename = "_encoding", default = "crate::request::default_encoding")]
    encoding: String,
}

/// Text codec: the request as a JSON object.
///
/// The raw body bytes are not valid JSON content, so they are converted to
/// text using the request's `_encoding` on encode and back to bytes on
/// decode. A body that is not valid text under its declared encoding cannot
/// be represented and is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RequestCodec for JsonCodec {
    fn encode(&self, request: &CrawlRequest) -> Result<Vec<u8>> {
        let body = body_to_text(&request.body, &request.encoding).map_err(Error::Encode)?;
        let envelope = TextEnvelope {
            url: request.url.clone(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body,
            cookies: request.cookies.clone(),
            meta: request.meta.clone(),
            callback: request.callback.clone(),
            priority: request.priority,
            encoding: request.encoding.clone(),
        };
        serde_json::to_vec(&envelope).map_err(|e| Error::Encode(format!("json: {}", e)))
    }

    fn decode(&self, payload: &[u8]) -> Result<CrawlRequest> {
        let envelope: TextEnvelope =
            serde_json::from_slice(payload).map_err(|e| Error::Decode(format!("json: {}", e)))?;
        let body = text_to_body(&envelope.body, &envelope.encoding).map_err(Error::Decode)?;
        Ok(CrawlRequest {
            url: envelope.url,
            method: envelope.method,
            headers: envelope.headers,
            body,
            cookies: envelope.cookies,
            meta: envelope.meta,
            callback: envelope.callback,
            priority: envelope.priority,
            encoding: envelope.encoding,
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Compatibility codec: writes the binary format, reads both.
///
/// Decoding tries MessagePack first and falls back to JSON, which covers
/// payloads written by producers still configured for the text format. Only
/// when both formats reject the payload does a decode error surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatCodec;

impl RequestCodec for CompatCodec {
    fn encode(&self, request: &CrawlRequest) -> Result<Vec<u8>> {
        MsgpackCodec.encode(request)
    }

    fn decode(&self, payload: &[u8]) -> Result<CrawlRequest> {
        let primary = match MsgpackCodec.decode(payload) {
            Ok(request) => return Ok(request),
            Err(Error::Decode(message)) => message,
            Err(other) => return Err(other),
        };
        debug!(error = %primary, "binary decode failed, trying text fallback");
        match JsonCodec.decode(payload) {
            Ok(request) => Ok(request),
            Err(Error::Decode(fallback)) => Err(Error::Decode(format!(
                "payload matched no supported format ({}; {})",
                primary, fallback
            ))),
            Err(other) => Err(other),
        }
    }

    fn name(&self) -> &'static str {
        "compat"
    }
}

fn body_to_text(body: &[u8], encoding: &str) -> std::result::Result<String, String> {
    match normalize_encoding(encoding).as_str() {
        "utf-8" | "utf8" => std::str::from_utf8(body)
            .map(str::to_owned)
            .map_err(|e| format!("body is not valid utf-8: {}", e)),
        "ascii" | "us-ascii" => {
            if body.is_ascii() {
                // Safe to go through utf-8, ascii is a strict subset.
                std::str::from_utf8(body)
                    .map(str::to_owned)
                    .map_err(|e| format!("body is not valid ascii: {}", e))
            } else {
                Err("body contains non-ascii bytes".to_string())
            }
        }
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => {
            Ok(body.iter().map(|&b| char::from(b)).collect())
        }
        other => Err(format!("unsupported body encoding '{}'", other)),
    }
}

fn text_to_body(text: &str, encoding: &str) -> std::result::Result<Vec<u8>, String> {
    match normalize_encoding(encoding).as_str() {
        "utf-8" | "utf8" => Ok(text.as_bytes().to_vec()),
        "ascii" | "us-ascii" => {
            if text.is_ascii() {
                Ok(text.as_bytes().to_vec())
            } else {
                Err("body text contains non-ascii characters".to_string())
            }
        }
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => {
            let mut bytes = Vec::with_capacity(text.len());
            for ch in text.chars() {
                let code = u32::from(ch);
                if code > 0xFF {
                    return Err(format!("character {:?} is outside latin-1", ch));
                }
                bytes.push(code as u8);
            }
            Ok(bytes)
        }
        other => Err(format!("unsupported body encoding '{}'", other)),
    }
}

fn normalize_encoding(encoding: &str) -> String {
    encoding.trim().to_ascii_lowercase()
}
