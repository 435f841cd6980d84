//! HTTP routes for Toyshop

pub mod gallery;
pub mod health;
pub mod payload;
pub mod toys;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{Result, ToyshopError};

pub use gallery::handle_gallery;
pub use health::{liveness, LIVENESS_TEXT};
pub use toys::{
    handle_all_toys, handle_create_toy, handle_delete_toy, handle_my_toys,
    handle_search_by_name, handle_toy_details, handle_update_toy,
};

pub type FullBody = Full<Bytes>;

/// JSON response with the given status
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Result<Response<FullBody>> {
    let json = serde_json::to_vec(body)
        .map_err(|e| ToyshopError::Internal(format!("Failed to serialize response: {}", e)))?;

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// Plain text response with the given status
pub fn text_response(status: StatusCode, text: &'static str) -> Response<FullBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Parse a query string leniently; malformed strings yield the defaults
pub fn parse_query<T: DeserializeOwned + Default>(query: Option<&str>) -> T {
    query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}
