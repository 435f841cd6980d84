//! Toy endpoints
//!
//! ## Endpoints
//!
//! - `GET /toySearchByName/{text}` - Case-insensitive name search
//! - `GET /myToys/{email}?sortBy=price&sortOrder=asc|desc` - Toys of one seller
//! - `GET /allToys?limit={n}` - All toys, optionally bounded
//! - `GET /ToyViewDetails/{id}` - One toy, `null` when absent
//! - `POST /createToy` - Insert a toy
//! - `PUT /updateMyToy/{id}` - Replace price, quantity and description
//! - `DELETE /myToys/{id}` - Remove a toy

use bson::oid::ObjectId;
use bytes::Bytes;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::schemas::{Metadata, ToyData, ToyDoc};
use crate::routes::payload::{parse_json, CreateToyRequest, UpdateToyRequest};
use crate::routes::{json_response, parse_query, FullBody};
use crate::server::AppState;
use crate::store::{sort_by_price, SortOrder};
use crate::types::{Result, ToyshopError};

// =============================================================================
// Query Parameters
// =============================================================================

/// Query parameters for the seller listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerQuery {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SellerQuery {
    /// Price is the only sortable field; anything else keeps store order
    pub fn price_sort(&self) -> Option<SortOrder> {
        match self.sort_by.as_deref() {
            Some("price") => Some(SortOrder::parse(self.sort_order.as_deref())),
            _ => None,
        }
    }
}

/// Query parameters for the bounded listing
#[derive(Debug, Default, Deserialize)]
pub struct AllToysQuery {
    pub limit: Option<String>,
}

impl AllToysQuery {
    /// Absent, non-numeric, zero and negative limits all mean "no limit"
    pub fn limit(&self) -> Option<u64> {
        let n = self.limit.as_deref()?.trim().parse::<i64>().ok()?;
        u64::try_from(n).ok().filter(|n| *n > 0)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Toy as returned to clients
#[derive(Debug, Serialize)]
pub struct ToyView<'a> {
    pub _id: String,
    pub data: &'a ToyData,
    pub metadata: MetadataView,
}

#[derive(Debug, Serialize)]
pub struct MetadataView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<&Metadata> for MetadataView {
    fn from(m: &Metadata) -> Self {
        Self {
            created_at: m.created_at.and_then(|d| d.try_to_rfc3339_string().ok()),
            updated_at: m.updated_at.and_then(|d| d.try_to_rfc3339_string().ok()),
        }
    }
}

impl<'a> From<&'a ToyDoc> for ToyView<'a> {
    fn from(toy: &'a ToyDoc) -> Self {
        Self {
            _id: toy.id_hex(),
            data: &toy.data,
            metadata: MetadataView::from(&toy.metadata),
        }
    }
}

fn toys_response(toys: &[ToyDoc]) -> Result<Response<FullBody>> {
    let views: Vec<ToyView<'_>> = toys.iter().map(ToyView::from).collect();
    json_response(StatusCode::OK, &views)
}

/// Parse a path identifier
pub fn parse_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| {
        ToyshopError::InvalidId(format!("{:?} is not a 24-character hex identifier", raw))
    })
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /toySearchByName/{text}
pub async fn handle_search_by_name(state: &AppState, text: &str) -> Result<Response<FullBody>> {
    let toys = state.toys.search_by_name(text).await?;
    debug!(text = %text, matches = toys.len(), "Toy name search");
    toys_response(&toys)
}

/// GET /myToys/{email}
pub async fn handle_my_toys(
    state: &AppState,
    email: &str,
    query: Option<&str>,
) -> Result<Response<FullBody>> {
    let params: SellerQuery = parse_query(query);
    let mut toys = state.toys.list_by_seller(email).await?;

    if let Some(order) = params.price_sort() {
        sort_by_price(&mut toys, order);
    }

    debug!(seller = %email, count = toys.len(), sort = ?params.price_sort(), "Seller listing");
    toys_response(&toys)
}

/// GET /allToys
pub async fn handle_all_toys(state: &AppState, query: Option<&str>) -> Result<Response<FullBody>> {
    let params: AllToysQuery = parse_query(query);
    let toys = state.toys.list(params.limit()).await?;
    toys_response(&toys)
}

/// GET /ToyViewDetails/{id}
pub async fn handle_toy_details(state: &AppState, id: &str) -> Result<Response<FullBody>> {
    let id = parse_id(id)?;
    let toy = state.toys.get(id).await?;
    json_response(StatusCode::OK, &toy.as_ref().map(ToyView::from))
}

/// POST /createToy
pub async fn handle_create_toy(state: &AppState, body: &Bytes) -> Result<Response<FullBody>> {
    let data = parse_json::<CreateToyRequest>(body)?.validate()?;
    let ack = state.toys.insert(data).await?;
    info!(id = %ack.inserted_id, "Toy created");
    json_response(StatusCode::OK, &ack)
}

/// PUT /updateMyToy/{id}
pub async fn handle_update_toy(
    state: &AppState,
    id: &str,
    body: &Bytes,
) -> Result<Response<FullBody>> {
    let id = parse_id(id)?;
    let update = parse_json::<UpdateToyRequest>(body)?.validate()?;
    let ack = state.toys.update(id, &update).await?;
    info!(
        id = %id,
        matched = ack.matched_count,
        modified = ack.modified_count,
        "Toy updated"
    );
    json_response(StatusCode::OK, &ack)
}

/// DELETE /myToys/{id}
pub async fn handle_delete_toy(state: &AppState, id: &str) -> Result<Response<FullBody>> {
    let id = parse_id(id)?;
    let ack = state.toys.delete(id).await?;
    info!(id = %id, deleted = ack.deleted_count, "Toy deleted");
    json_response(StatusCode::OK, &ack)
}
