//! Liveness endpoint
//!
//! `GET /` answers with static text whenever the process is accepting
//! requests. It does not touch the store.

use hyper::{Response, StatusCode};

use crate::routes::{text_response, FullBody};

/// Body of the liveness response
pub const LIVENESS_TEXT: &str = "Toy Car is running!";

/// GET /
pub fn liveness() -> Response<FullBody> {
    text_response(StatusCode::OK, LIVENESS_TEXT)
}
