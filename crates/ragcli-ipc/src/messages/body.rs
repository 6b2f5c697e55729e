use serde::Serialize;
use serde_json::Value;

use super::admin::{HealthSummary, InitResponse};
use super::jobs::{IngestionJob, JobEnvelope};
use super::query::QueryResponse;
use super::routes::Route;
use super::sources::{SourceListResponse, SourceMutationResponse};
use super::{ErrorBody, decode_body};
use crate::codec::{STATUS_ACCEPTED, STATUS_CREATED, STATUS_OK};
use crate::error::IpcError;

/// A decoded success body, discriminated by route and status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ResponseBody {
    /// `/v1/admin/health`
    Health(HealthSummary),
    /// `/v1/query`
    Query(QueryResponse),
    /// `/v1/index/reindex`
    Job(IngestionJob),
    /// `/v1/admin/init`
    Init(InitResponse),
    /// Listing on `/v1/sources`.
    SourceList(SourceListResponse),
    /// Create on `/v1/sources` or any `/v1/sources/<alias>` mutation.
    SourceMutation(SourceMutationResponse),
}

impl ResponseBody {
    /// Decodes the body of a reply to `route`.
    ///
    /// Error statuses become [`IpcError::Rejected`]; a success status the
    /// route never produces is [`IpcError::MalformedFrame`].
    pub fn decode(route: &Route, status: u16, body: &Value) -> Result<Self, IpcError> {
        let path = route.path();
        if status >= crate::codec::STATUS_ERROR_THRESHOLD {
            return Err(IpcError::Rejected(Box::new(ErrorBody::rejection(
                &path, status, body,
            ))));
        }
        match (route, status) {
            (Route::Health, STATUS_OK) => decode_body(&path, body).map(Self::Health),
            (Route::Query, STATUS_OK) => decode_body(&path, body).map(Self::Query),
            (Route::Init, STATUS_OK) => decode_body(&path, body).map(Self::Init),
            (Route::Reindex, STATUS_ACCEPTED) => decode_body::<JobEnvelope>(&path, body)
                .map(|envelope| Self::Job(envelope.job)),
            (Route::Sources, STATUS_OK) => decode_body(&path, body).map(Self::SourceList),
            (Route::Sources, STATUS_CREATED) | (Route::Source(_), STATUS_OK | STATUS_ACCEPTED) => {
                decode_body(&path, body).map(Self::SourceMutation)
            }
            _ => Err(IpcError::malformed(format!(
                "unexpected status {status} for {path}"
            ))),
        }
    }
}
