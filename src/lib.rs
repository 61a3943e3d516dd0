//! Resource Control Plane: a small HTTP service that exposes a
//! Kubernetes-shaped CRUD surface over resources stored in a pluggable
//! `Source` (a local directory or a Git repository), validated against a
//! JSON Schema and translated to on-disk form by a pluggable `Controller`.
//! See `SPEC_FULL.md` for the full module-by-module specification.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod containers;
pub mod controllers;
pub mod core;
pub mod encoding;
pub mod error;
pub mod fs;
pub mod source;

pub use api::Server;
pub use config::Configuration;
pub use error::{RcpError, RcpResult};
