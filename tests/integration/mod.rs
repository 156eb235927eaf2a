//! End-to-end tests through the dispatcher.

mod concurrency;
mod crud;
mod discovery;
mod errors;
mod patch;
mod query;
