//! Request bodies for the write endpoints
//!
//! Bodies are parsed into loose shapes first so that every violation can be
//! reported in one response, then converted into storage types.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::db::schemas::{NumberInput, ToyData, ToyUpdate};
use crate::types::{Result, ToyshopError};

const MAX_NAME_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 5000;

/// POST /createToy body
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateToyRequest {
    pub data: ToyPayload,
}

/// Toy fields as supplied by the client
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToyPayload {
    pub name: Option<String>,
    pub price: Option<NumberInput>,
    pub quantity: Option<NumberInput>,
    pub description: Option<String>,
    pub seller_email: Option<String>,
}

/// PUT /updateMyToy/:id body
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateToyRequest {
    pub price: Option<NumberInput>,
    pub quantity: Option<NumberInput>,
    pub description: Option<String>,
}

/// Parse a JSON body, mapping syntax and shape errors to a client error
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

impl CreateToyRequest {
    /// Validate and convert into the stored payload
    pub fn validate(self) -> Result<ToyData> {
        let mut violations = Vec::new();
        let p = self.data;

        let name = match p.name.map(|n| n.trim().to_string()) {
            None => {
                violations.push("data.name: is required".to_string());
                String::new()
            }
            Some(n) if n.is_empty() => {
                violations.push("data.name: must not be blank".to_string());
                n
            }
            Some(n) if n.chars().count() > MAX_NAME_CHARS => {
                violations.push(format!("data.name: must be at most {} characters", MAX_NAME_CHARS));
                n
            }
            Some(n) => n,
        };

        let price = required_count("data.price", p.price.as_ref(), &mut violations);
        let quantity = required_count("data.quantity", p.quantity.as_ref(), &mut violations);
        let description = description("data.description", p.description, &mut violations);

        let seller_email = match p.seller_email.map(|e| e.trim().to_string()) {
            None => {
                violations.push("data.sellerEmail: is required".to_string());
                String::new()
            }
            Some(e) if !is_email(&e) => {
                violations.push("data.sellerEmail: must be an email address".to_string());
                e
            }
            Some(e) => e,
        };

        if !violations.is_empty() {
            return Err(ToyshopError::Validation(violations));
        }

        Ok(ToyData {
            name,
            price,
            quantity,
            description,
            seller_email,
        })
    }
}

impl UpdateToyRequest {
    /// Validate and convert into a field update
    pub fn validate(self) -> Result<ToyUpdate> {
        let mut violations = Vec::new();

        let price = required_count("price", self.price.as_ref(), &mut violations);
        let quantity = required_count("quantity", self.quantity.as_ref(), &mut violations);
        if self.description.is_none() {
            violations.push("description: is required".to_string());
        }
        let description = description("description", self.description, &mut violations);

        if !violations.is_empty() {
            return Err(ToyshopError::Validation(violations));
        }

        Ok(ToyUpdate {
            price,
            quantity,
            description,
        })
    }
}

fn required_count(field: &str, value: Option<&NumberInput>, violations: &mut Vec<String>) -> i64 {
    let Some(value) = value else {
        violations.push(format!("{}: is required", field));
        return 0;
    };

    match value.to_int() {
        Ok(n) if n < 0 => {
            violations.push(format!("{}: must be >= 0", field));
            0
        }
        Ok(n) => n,
        Err(e) => {
            violations.push(format!("{}: {}", field, e));
            0
        }
    }
}

fn description(field: &str, value: Option<String>, violations: &mut Vec<String>) -> String {
    let value = value.unwrap_or_default();
    if value.chars().count() > MAX_DESCRIPTION_CHARS {
        violations.push(format!(
            "{}: must be at most {} characters",
            field, MAX_DESCRIPTION_CHARS
        ));
    }
    value
}

/// One `@`, non-empty local part, domain without spaces
fn is_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && !value.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}
