use http_body_util::StreamBody;
use hyper::body::{Bytes, Frame};
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use hyper::http::request::Parts;
use hyper::{Method, Response, StatusCode, Uri};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use vercel_runtime::{Error, ResponseBody};

use crate::config::ConfigError;
use crate::error::AppError;

/// An incoming request with its body already collected.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Inbound {
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self { method: parts.method, uri: parts.uri, headers: parts.headers, body }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri, Bytes::new())
    }

    pub fn new(method: Method, uri: &str, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri: uri.parse().unwrap_or_else(|_| Uri::from_static("/")),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
        self
    }

    /// Decoded query parameter; the first occurrence wins.
    pub fn query(&self, name: &str) -> Option<String> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then(|| decode_component(value))
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The decoded path segment following the first segment named `after`.
    pub fn path_param(&self, after: &str) -> Option<String> {
        let mut segments = self.uri.path().split('/').filter(|segment| !segment.is_empty());
        segments.by_ref().find(|segment| *segment == after)?;
        segments.next().map(decode_component)
    }
}

pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Json(Value),
    Pdf(Vec<u8>),
    Empty,
}

/// A handler's answer, independent of the serverless runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, String)>,
    pub body: ReplyBody,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self { status, headers: Vec::new(), body: ReplyBody::Json(body) }
    }

    pub fn error(status: StatusCode, error: &str) -> Self {
        Self::json(status, json!({ "error": error }))
    }

    pub fn method_not_allowed(allow: &str) -> Self {
        Self::error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed").header(ALLOW, allow)
    }

    pub fn rate_limited(body: Value, retry_after_secs: u64) -> Self {
        Self::json(StatusCode::TOO_MANY_REQUESTS, body).header(RETRY_AFTER, &retry_after_secs.max(1).to_string())
    }

    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self { status: StatusCode::OK, headers: Vec::new(), body: ReplyBody::Pdf(bytes) }
    }

    pub fn redirect(status: StatusCode, location: &str) -> Self {
        Self { status, headers: Vec::new(), body: ReplyBody::Empty }.header(hyper::header::LOCATION, location)
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn header_value(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ReplyBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_response(self) -> Result<Response<ResponseBody>, Error> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name, value.as_str());
        }

        match self.body {
            ReplyBody::Json(value) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(ResponseBody::from(value))
                .map_err(Into::into),
            ReplyBody::Empty => builder.body(ResponseBody::from(String::new())).map_err(Into::into),
            ReplyBody::Pdf(bytes) => {
                let (tx, rx) = mpsc::channel::<Result<Frame<Bytes>, Error>>(1);
                // Capacity 1 and a fresh channel: this send cannot fail.
                let _ = tx.try_send(Ok(Frame::data(Bytes::from(bytes))));
                drop(tx);
                builder
                    .header(CONTENT_TYPE, "application/pdf")
                    .body(ResponseBody::from(StreamBody::new(ReceiverStream::new(rx))))
                    .map_err(Into::into)
            }
        }
    }
}

impl From<ConfigError> for Reply {
    fn from(error: ConfigError) -> Self {
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "missing_config", "message": error.to_string() }),
        )
    }
}

impl From<&AppError> for Reply {
    fn from(error: &AppError) -> Self {
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "startup_failed", "message": error.to_string() }),
        )
    }
}
