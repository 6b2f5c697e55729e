//! Behavioural coverage for both front ends against a fake backend.

mod support;
