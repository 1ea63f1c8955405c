//! Test doubles for the execution backend and tracking store.
//!
//! These mocks stand in for a real launch mechanism in unit and
//! integration tests: the backend records every submission and hands out
//! scriptable handles, and the store serves the run records the backend
//! registers.

mod fixtures;
mod mocks;

pub use fixtures::{active_run, step};
pub use mocks::{MockBackend, MockRunHandle, MockTrackingStore, SubmissionRecord};
