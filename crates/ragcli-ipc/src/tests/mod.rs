//! Behavioural coverage for the transport against a fake backend.

pub(crate) mod support;
