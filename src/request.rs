//! The crawl request carried by the queue.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) fn default_method() -> String {
    "GET".to_string()
}

pub(crate) fn default_encoding() -> String {
    "utf-8".to_string()
}

/// A single unit of crawl work.
///
/// Requests are value types: two requests with equal fields are equal, which
/// is what the codec round-trip guarantee is stated in terms of. The queue
/// does not interpret the payload beyond `priority` and `encoding`; duplicate
/// suppression and fetching are the business of the surrounding application.
///
/// The `encoding` field travels on the wire as `_encoding` and names the text
/// encoding of `body`. Text codecs use it to convert the body between bytes
/// and characters at every serialize/deserialize boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// Absolute URL to fetch
    pub url: String,
    /// HTTP method, `GET` by default
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw request body
    #[serde(default)]
    pub body: Vec<u8>,
    /// Cookies sent with the request
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    /// Metadata handed to the response handler
    #[serde(default)]
    pub meta: HashMap<String, Value>,
    /// Name of a non-default response handler, if any
    #[serde(default)]
    pub callback: Option<String>,
    /// Scheduling priority, higher is served first
    #[serde(default)]
    pub priority: i32,
    /// Text encoding of `body`, `utf-8` by default
    #[serde(rename = "_encoding", default = "default_encoding")]
    pub encoding: String,
}

impl CrawlRequest {
    /// Create a GET request for `url` with default fields.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: HashMap::new(),
            body: Vec::new(),
            cookies: HashMap::new(),
            meta: HashMap::new(),
            callback: None,
            priority: 0,
            encoding: default_encoding(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Route the response to a named handler instead of the default one.
    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declare the text encoding of the body.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }
}
