//! Error boundary for mounted handlers.
//!
//! Handlers return [`HandlerResult`]; any `Err` (or a panic caught by
//! `CatchPanicLayer`) is carried out of the handler as a [`HandlerFailure`]
//! response extension. [`error_boundary`] is the single place that renders it
//! as the JSON error envelope:
//!
//! ```json
//! { "errorName": "...", "message": "...", "stack": "..." }
//! ```
//!
//! The boundary sits outermost in the API stage, so failures produced by the
//! stage itself also come out as the envelope: a request timeout, an oversized
//! body, or an extractor rejection (malformed JSON, wrong content type). Those
//! are told apart from deliberate handler responses by the [`Dispatched`]
//! marker that [`mark_dispatched`] puts on everything routing returns.
//!
//! Proxy failures and CORS denials are answered by their own stages and never
//! reach this boundary.

use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::borrow::Cow;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::observability::metrics;

/// Label used when an error carries no classification of its own.
pub const GENERIC_ERROR_NAME: &str = "Error";

/// Stack value used when no trace was captured.
pub const NO_STACK: &str = "no stack defined";

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Uniform JSON body for unhandled handler errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_name: String,
    pub message: String,
    pub stack: String,
}

impl ErrorEnvelope {
    pub fn new(error_name: Option<&str>, message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            error_name: error_name
                .filter(|name| !name.is_empty())
                .unwrap_or(GENERIC_ERROR_NAME)
                .to_string(),
            message: message.into(),
            stack: stack.filter(|s| !s.is_empty()).unwrap_or_else(|| NO_STACK.to_string()),
        }
    }

    /// Serialize with `spaces` of indentation (0 = compact).
    pub fn to_json(&self, spaces: usize) -> Vec<u8> {
        let result = if spaces == 0 {
            serde_json::to_vec(self)
        } else {
            let indent = vec![b' '; spaces];
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            self.serialize(&mut serializer).map(|_| buf)
        };

        // Serializing three strings cannot fail; keep the boundary infallible anyway
        result.unwrap_or_else(|_| {
            br#"{"errorName":"Error","message":"unserializable error","stack":"no stack defined"}"#.to_vec()
        })
    }
}

/// An error raised by a mounted handler.
#[derive(Debug)]
pub struct HandlerError {
    name: Cow<'static, str>,
    message: String,
    stack: Option<String>,
}

impl HandlerError {
    /// An error with an explicit classification label.
    pub fn new(name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// An unclassified error.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(GENERIC_ERROR_NAME, message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(Some(&self.name), self.message.clone(), self.stack.clone())
    }
}

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error> + 'static,
{
    fn from(err: E) -> Self {
        let name = short_type_name(std::any::type_name::<E>());
        let err: anyhow::Error = err.into();
        let backtrace = err.backtrace();
        let stack = (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());

        Self {
            name: Cow::Borrowed(name),
            message: err.to_string(),
            stack,
        }
    }
}

/// Marker carried from a failed handler to the boundary.
#[derive(Debug, Clone)]
pub struct HandlerFailure(pub ErrorEnvelope);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(HandlerFailure(self.envelope()));
        response
    }
}

/// Pointer types whose own name says nothing about the error.
const WRAPPER_TYPES: [&str; 3] = ["Box", "Arc", "Rc"];

/// `std::io::error::Error` → `Error`, `my_crate::NotFound<T>` → `NotFound`,
/// `Box<my_crate::NotFound>` → `NotFound`, `Box<dyn Error>` → `Error`.
fn short_type_name(full: &'static str) -> &'static str {
    let (base, inner) = match full.split_once('<') {
        Some((base, rest)) => (base, rest.strip_suffix('>')),
        None => (full, None),
    };
    let name = base.rsplit("::").next().unwrap_or(base);
    if !WRAPPER_TYPES.contains(&name) {
        return name;
    }

    match inner {
        Some(inner) if !inner.starts_with("dyn ") => short_type_name(inner),
        _ => GENERIC_ERROR_NAME,
    }
}

/// Set on every response that came out of route dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Dispatched;

/// Innermost API layer (`middleware::map_response`): tag dispatch output.
pub async fn mark_dispatched(mut response: Response) -> Response {
    response.extensions_mut().insert(Dispatched);
    response
}

/// Statuses the timeout and body-limit layers answer with.
const STAGE_STATUSES: [StatusCode; 2] = [StatusCode::REQUEST_TIMEOUT, StatusCode::PAYLOAD_TOO_LARGE];

/// Statuses axum's extractors answer with, as `text/plain`.
const REJECTION_STATUSES: [StatusCode; 4] = [
    StatusCode::BAD_REQUEST,
    StatusCode::PAYLOAD_TOO_LARGE,
    StatusCode::UNSUPPORTED_MEDIA_TYPE,
    StatusCode::UNPROCESSABLE_ENTITY,
];

/// Upper bound on a rejection body read back as the envelope message.
const MAX_REJECTION_BODY: usize = 4 * 1024;

fn status_error_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BadRequestError",
        StatusCode::REQUEST_TIMEOUT => "TimeoutError",
        StatusCode::PAYLOAD_TOO_LARGE => "PayloadTooLargeError",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UnsupportedMediaTypeError",
        StatusCode::UNPROCESSABLE_ENTITY => "UnprocessableEntityError",
        _ => GENERIC_ERROR_NAME,
    }
}

fn is_rejection(response: &Response) -> bool {
    let plain_text = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain"));
    plain_text && REJECTION_STATUSES.contains(&response.status())
}

/// Pass a response through, or pull out the failure it stands for.
async fn classify(response: Response) -> Result<Response, ErrorEnvelope> {
    if let Some(HandlerFailure(envelope)) = response.extensions().get::<HandlerFailure>().cloned() {
        return Err(envelope);
    }

    let status = response.status();
    let dispatched = response.extensions().get::<Dispatched>().is_some();
    let stage_failure = !dispatched && STAGE_STATUSES.contains(&status);
    if !stage_failure && !(dispatched && is_rejection(&response)) {
        return Ok(response);
    }

    let message = match axum::body::to_bytes(response.into_body(), MAX_REJECTION_BODY).await {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
        _ => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(ErrorEnvelope::new(Some(status_error_name(status)), message, None))
}

/// Rendering options for the boundary.
#[derive(Debug, Clone, Copy)]
pub struct ErrorBoundary {
    pub json_spaces: usize,
}

impl ErrorBoundary {
    /// Render an envelope as the boundary's 500 response.
    pub fn render(&self, envelope: &ErrorEnvelope) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"))],
            envelope.to_json(self.json_spaces),
        )
            .into_response()
    }
}

/// Outermost API layer: turns any failure below it into the envelope.
pub async fn error_boundary(
    State(boundary): State<ErrorBoundary>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match classify(next.run(req).await).await {
        Ok(response) => response,
        Err(envelope) => {
            tracing::error!(
                method = %method,
                path = %path,
                error_name = %envelope.error_name,
                message = %envelope.message,
                "Handler failed"
            );
            metrics::record_handler_failure(&envelope.error_name);
            boundary.render(&envelope)
        }
    };

    metrics::record_request("api", method.as_str(), response.status().as_u16(), start);
    response
}

/// `CatchPanicLayer` hook: a panicking handler becomes a carried failure.
pub fn panic_failure(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    HandlerError::msg(message).into_response()
}
