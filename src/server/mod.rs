//! HTTP server for Toyshop

pub mod http;

pub use http::{dispatch, run, serve, AppState, MAX_BODY_BYTES};
