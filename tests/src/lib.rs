//! Shared helpers for the HTTP integration tests.
