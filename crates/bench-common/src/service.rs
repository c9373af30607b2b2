//! Target service definitions and their wire shape.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BenchError, BenchResult, JsonField};

/// Default request body offered for a new JSON service.
pub const DEFAULT_REQUEST_BODY: &str = r#"{"key1": "value1", "key2": "value2"}"#;

/// Default headers offered for a new service.
pub const DEFAULT_HEADERS: &str = r#"{"Content-Type": "application/json"}"#;

/// Which payload a service sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    #[default]
    Json,
    Image,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Json => "json",
            RequestType::Image => "image",
        }
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(RequestType::Json),
            "image" => Ok(RequestType::Image),
            other => Err(format!("unknown request type '{}'", other)),
        }
    }
}

/// A binary file attached to an image service.
///
/// Attachments live only in memory; they are never written to the
/// persisted configuration token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Initial values for a newly created service.
#[derive(Debug, Clone)]
pub struct ServiceDefaults {
    pub name: String,
    pub url: String,
    pub request_type: RequestType,
    pub headers: String,
    pub request_body: String,
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            request_type: RequestType::Json,
            headers: DEFAULT_HEADERS.to_string(),
            request_body: DEFAULT_REQUEST_BODY.to_string(),
        }
    }
}

/// One editable field of a service.
#[derive(Debug, Clone)]
pub enum ServiceField {
    Name(String),
    Url(String),
    RequestType(RequestType),
    Headers(String),
    RequestBody(String),
    Attachment(Option<Attachment>),
}

/// One target HTTP endpoint under test.
///
/// Headers and body are kept as the JSON text the user entered and are
/// only parsed when the wire shape is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceModel {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub request_type: RequestType,
    #[serde(default = "default_headers")]
    pub headers: String,
    #[serde(default = "default_request_body")]
    pub request_body: String,
    #[serde(skip)]
    pub image_payload: Option<Attachment>,
}

fn default_headers() -> String {
    DEFAULT_HEADERS.to_string()
}

fn default_request_body() -> String {
    DEFAULT_REQUEST_BODY.to_string()
}

impl Default for ServiceModel {
    fn default() -> Self {
        Self::new(ServiceDefaults::default())
    }
}

/// Serialized form of a service inside the `config` part of a run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceWire {
    pub name: String,
    pub url: String,
    pub request_type: RequestType,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// One line of the service overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    pub display_name: String,
    pub display_url: String,
    pub request_type: RequestType,
}

impl ServiceModel {
    pub fn new(defaults: ServiceDefaults) -> Self {
        Self {
            name: defaults.name,
            url: defaults.url,
            request_type: defaults.request_type,
            headers: defaults.headers,
            request_body: defaults.request_body,
            image_payload: None,
        }
    }

    /// Shorthand for a JSON service with the default headers and body.
    pub fn json(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ServiceDefaults {
            name: name.into(),
            url: url.into(),
            ..ServiceDefaults::default()
        })
    }

    /// Shorthand for an image service without an attachment.
    pub fn image(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ServiceDefaults {
            name: name.into(),
            url: url.into(),
            request_type: RequestType::Image,
            ..ServiceDefaults::default()
        })
    }

    pub fn set_field(&mut self, field: ServiceField) {
        match field {
            ServiceField::Name(name) => self.name = name,
            ServiceField::Url(url) => self.url = url,
            ServiceField::RequestType(request_type) => self.request_type = request_type,
            ServiceField::Headers(text) => self.headers = text,
            ServiceField::RequestBody(text) => self.request_body = text,
            ServiceField::Attachment(attachment) => self.image_payload = attachment,
        }
    }

    /// Builder-style variant of [`set_field`](Self::set_field).
    pub fn with(mut self, field: ServiceField) -> Self {
        self.set_field(field);
        self
    }

    /// Attachment identifier used for the service at `index`.
    pub fn attachment_key(index: usize) -> String {
        format!("image_{}", index)
    }

    /// The attachment that will actually be sent, if any.
    ///
    /// Returns `None` for JSON services even when a file was selected earlier.
    pub fn active_attachment(&self) -> Option<&Attachment> {
        match self.request_type {
            RequestType::Image => self.image_payload.as_ref(),
            RequestType::Json => None,
        }
    }

    /// Produce the wire shape for the service at position `index`.
    pub fn to_wire_shape(&self, index: usize) -> BenchResult<ServiceWire> {
        let headers = parse_headers(&self.headers)
            .map_err(|msg| BenchError::malformed(index, JsonField::Headers, msg))?;

        let (request_body, image_path) = match self.request_type {
            RequestType::Json => {
                let body = parse_object(&self.request_body)
                    .map_err(|msg| BenchError::malformed(index, JsonField::RequestBody, msg))?;
                (Some(body), None)
            }
            RequestType::Image => (
                None,
                self.image_payload.as_ref().map(|_| Self::attachment_key(index)),
            ),
        };

        Ok(ServiceWire {
            name: self.name.clone(),
            url: self.url.clone(),
            request_type: self.request_type,
            headers,
            request_body,
            image_path,
        })
    }

    pub fn summary(&self, index: usize) -> ServiceSummary {
        let display_name = if self.name.trim().is_empty() {
            format!("Service {}", index + 1)
        } else {
            self.name.clone()
        };
        let display_url = if self.url.trim().is_empty() {
            "URL not set".to_string()
        } else {
            self.url.clone()
        };

        ServiceSummary {
            display_name,
            display_url,
            request_type: self.request_type,
        }
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, found {}", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_headers(text: &str) -> Result<BTreeMap<String, String>, String> {
    let map = parse_object(text)?;
    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            other => Err(format!(
                "header '{}' must be a string, found {}",
                key,
                json_kind(&other)
            )),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
