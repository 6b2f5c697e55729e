//! Typed request and response bodies for every backend route.
//!
//! Bodies are decoded into concrete structs so schema drift fails at the
//! transport boundary instead of deep inside a presenter. Unknown fields are
//! ignored; missing required fields surface as
//! [`IpcError::MalformedFrame`](crate::IpcError::MalformedFrame).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{IpcError, Rejection};

mod admin;
mod body;
mod jobs;
mod query;
mod routes;
mod sources;

pub use admin::{
    DependencyCheck, HealthRequest, HealthResult, HealthSummary, InitRequest, InitResponse,
};
pub use body::ResponseBody;
pub(crate) use jobs::JobEnvelope;
pub use jobs::{IngestionJob, JobStatus, ReindexRequest, ReindexTrigger};
pub use query::{
    DEFAULT_MAX_CONTEXT_TOKENS, QueryCitation, QueryReference, QueryRequest, QueryResponse,
};
pub use routes::{HEALTH_PATH, INIT_PATH, QUERY_PATH, REINDEX_PATH, Route, SOURCES_PATH};
pub use sources::{
    QuarantineInfo, SourceCreateRequest, SourceKind, SourceListRequest, SourceListResponse,
    SourceMutationResponse, SourceRecord, SourceRemoveRequest, SourceStatus, SourceUpdateRequest,
};

/// Error body attached to statuses of 400 and above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    /// Human-readable message.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorBody {
    /// Builds the rejection for an error reply, tolerating bodies that do not
    /// follow the error schema.
    #[must_use]
    pub fn rejection(path: &str, status: u16, body: &Value) -> Rejection {
        let parsed = Self::deserialize(body).unwrap_or_else(|_| Self {
            code: String::from("unknown"),
            message: body.to_string(),
            remediation: None,
        });
        Rejection {
            path: path.to_owned(),
            status,
            code: if parsed.code.trim().is_empty() {
                String::from("unknown")
            } else {
                parsed.code
            },
            message: parsed.message,
            remediation: parsed
                .remediation
                .filter(|remediation| !remediation.trim().is_empty()),
        }
    }
}

pub(crate) fn decode_body<T: DeserializeOwned>(path: &str, body: &Value) -> Result<T, IpcError> {
    T::deserialize(body)
        .map_err(|error| IpcError::malformed(format!("unexpected {path} response body: {error}")))
}

pub(crate) fn encode_body<T: Serialize>(path: &str, body: &T) -> Result<Value, IpcError> {
    serde_json::to_value(body)
        .map_err(|error| IpcError::malformed(format!("cannot encode {path} request body: {error}")))
}

/// Reads `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Returns `None` for blank strings and the trimmed text otherwise.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}
