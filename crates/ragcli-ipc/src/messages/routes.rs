use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::IpcError;

/// Route for natural-language queries.
pub const QUERY_PATH: &str = "/v1/query";
/// Route for the aggregated health check.
pub const HEALTH_PATH: &str = "/v1/admin/health";
/// Route for first-run initialisation.
pub const INIT_PATH: &str = "/v1/admin/init";
/// Route for the source catalog.
pub const SOURCES_PATH: &str = "/v1/sources";
/// Route for index rebuilds.
pub const REINDEX_PATH: &str = "/v1/index/reindex";

/// Characters escaped in a source alias path segment: everything except
/// unreserved characters and the sub-delimiters legal inside a segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// A backend route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/v1/query`
    Query,
    /// `/v1/admin/health`
    Health,
    /// `/v1/admin/init`
    Init,
    /// `/v1/sources`
    Sources,
    /// `/v1/sources/<alias>`, alias kept unescaped.
    Source(String),
    /// `/v1/index/reindex`
    Reindex,
}

impl Route {
    /// Route for one source, rejecting blank aliases.
    pub fn source(alias: &str) -> Result<Self, IpcError> {
        let trimmed = alias.trim();
        if trimmed.is_empty() {
            return Err(IpcError::InvalidArgument(String::from(
                "source alias must be provided",
            )));
        }
        Ok(Self::Source(trimmed.to_owned()))
    }

    /// Wire path, with the source alias percent-encoded.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Query => QUERY_PATH.to_owned(),
            Self::Health => HEALTH_PATH.to_owned(),
            Self::Init => INIT_PATH.to_owned(),
            Self::Sources => SOURCES_PATH.to_owned(),
            Self::Source(alias) => {
                format!("{SOURCES_PATH}/{}", utf8_percent_encode(alias, SEGMENT))
            }
            Self::Reindex => REINDEX_PATH.to_owned(),
        }
    }

    /// Parses a wire path; the inverse of [`Route::path`].
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        match path {
            QUERY_PATH => Some(Self::Query),
            HEALTH_PATH => Some(Self::Health),
            INIT_PATH => Some(Self::Init),
            SOURCES_PATH => Some(Self::Sources),
            REINDEX_PATH => Some(Self::Reindex),
            other => {
                let segment = other.strip_prefix(SOURCES_PATH)?.strip_prefix('/')?;
                if segment.is_empty() || segment.contains('/') {
                    return None;
                }
                let alias = percent_decode_str(segment).decode_utf8().ok()?;
                Some(Self::Source(alias.into_owned()))
            }
        }
    }
}
