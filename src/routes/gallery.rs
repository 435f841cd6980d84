//! Gallery endpoint (read-only)

use hyper::{Response, StatusCode};
use tracing::debug;

use crate::routes::{json_response, FullBody};
use crate::server::AppState;
use crate::types::Result;

/// GET /gallery - every gallery item, unfiltered
pub async fn handle_gallery(state: &AppState) -> Result<Response<FullBody>> {
    let items = state.gallery.list_all().await?;
    debug!(count = items.len(), "Gallery listing");
    json_response(StatusCode::OK, &items)
}
