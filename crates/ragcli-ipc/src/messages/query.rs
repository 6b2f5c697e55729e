use serde::{Deserialize, Serialize};

use super::{non_blank, null_as_default};
use crate::error::IpcError;

/// Context budget used when a query does not set one.
pub const DEFAULT_MAX_CONTEXT_TOKENS: u32 = 4096;

/// Body of a `/v1/query` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
    /// The question to answer.
    pub question: String,
    /// Conversation to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Upper bound on retrieved context, in tokens.
    pub max_context_tokens: u32,
}

impl QueryRequest {
    /// Builds a request with the default context budget.
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            trace_id: String::new(),
            question: question.into(),
            conversation_id: None,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
        }
    }

    /// Trims the question and conversation id and applies the default
    /// context budget, rejecting blank questions.
    pub fn normalized(self) -> Result<Self, IpcError> {
        let question = self.question.trim().to_owned();
        if question.is_empty() {
            return Err(IpcError::InvalidArgument(String::from(
                "question must not be empty",
            )));
        }
        Ok(Self {
            trace_id: self.trace_id.trim().to_owned(),
            question,
            conversation_id: non_blank(self.conversation_id),
            max_context_tokens: if self.max_context_tokens == 0 {
                DEFAULT_MAX_CONTEXT_TOKENS
            } else {
                self.max_context_tokens
            },
        })
    }
}

/// Answer returned by `/v1/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Short answer.
    pub summary: String,
    /// Step-by-step guidance.
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<String>,
    /// Links for further reading.
    #[serde(default, deserialize_with = "null_as_default")]
    pub references: Vec<QueryReference>,
    /// Passages the answer is grounded on.
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<QueryCitation>,
    /// Model confidence between 0 and 1.
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    /// Trace identifier of the query.
    #[serde(default, deserialize_with = "null_as_default")]
    pub trace_id: String,
    /// End-to-end latency in milliseconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub latency_ms: u64,
    /// Retrieval latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_latency_ms: Option<u64>,
    /// Generation latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_latency_ms: Option<u64>,
    /// Version of the index that served the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_version: Option<String>,
    /// Long-form answer, when the model produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Set when the backend found nothing to ground an answer on.
    #[serde(default, deserialize_with = "null_as_default")]
    pub no_answer: bool,
}

/// A reference link attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReference {
    /// Display label.
    pub label: String,
    /// Target location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Extra context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A passage an answer cites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCitation {
    /// Alias of the cited source.
    pub alias: String,
    /// Document within the source.
    pub document_ref: String,
    /// Quoted passage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}
