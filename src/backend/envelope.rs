use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Uniform result of a backend call.
///
/// `ok == false` never carries a payload. Serialized, the payload fields sit next
/// to `ok` and `msg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub msg: String,
    #[serde(flatten)]
    payload: Option<T>,
}

/// Successful backend bodies wrap the payload in `data`.
#[derive(Deserialize)]
pub(super) struct DataBody<T> {
    pub(super) data: T,
}

impl<T> Envelope<T> {
    pub fn success(status: StatusCode, payload: T) -> Self {
        Self {
            ok: true,
            msg: status_line(status),
            payload: Some(payload),
        }
    }

    pub fn failure(status: StatusCode) -> Self {
        Self {
            ok: false,
            msg: status_line(status),
            payload: None,
        }
    }

    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            ok: self.ok,
            msg: self.msg,
            payload: self.payload.map(f),
        }
    }
}

/// `"<code> <reason>"`, e.g. `"401 Unauthorized"`.
fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}
