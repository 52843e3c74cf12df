//! services/api/src/lib.rs
//!
//! The Endpoint Layer of the survey system, shared by the `api` and
//! `openapi` binaries and the integration tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
