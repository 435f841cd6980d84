//! Toy document schema
//!
//! Toys are stored with their payload nested under `data`. Price and quantity
//! are integers; documents written by older clients carry them as text and are
//! coerced when read.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Default collection name for toys
pub const TOY_COLLECTION: &str = "addToy";

/// Name of the index backing the name search
pub const TOY_NAME_INDEX: &str = "toy_name";

/// Toy document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ToyDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Seller-supplied payload
    pub data: ToyData,

    /// Created/updated timestamps
    #[serde(default)]
    pub metadata: Metadata,
}

/// Toy payload
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToyData {
    pub name: String,

    #[serde(deserialize_with = "lenient_integer")]
    pub price: i64,

    #[serde(default, deserialize_with = "lenient_integer")]
    pub quantity: i64,

    #[serde(default)]
    pub description: String,

    pub seller_email: String,
}

/// Replacement values for the mutable toy fields
#[derive(Clone, Debug, PartialEq)]
pub struct ToyUpdate {
    pub price: i64,
    pub quantity: i64,
    pub description: String,
}

impl ToyDoc {
    /// Create a new, not yet persisted toy
    pub fn new(data: ToyData) -> Self {
        Self {
            _id: None,
            data,
            metadata: Metadata::new(),
        }
    }

    /// Hex form of the identifier, empty if not persisted
    pub fn id_hex(&self) -> String {
        self._id.map(|o| o.to_hex()).unwrap_or_default()
    }

    /// Apply an update in place
    pub fn apply(&mut self, update: &ToyUpdate) {
        self.data.price = update.price;
        self.data.quantity = update.quantity;
        self.data.description = update.description.clone();
        self.metadata.touch();
    }
}

impl ToyUpdate {
    /// `$set` document touching exactly the mutable fields
    pub fn to_set_document(&self) -> Document {
        doc! {
            "$set": {
                "data.price": self.price,
                "data.quantity": self.quantity,
                "data.description": self.description.clone(),
                "metadata.updated_at": bson::DateTime::now(),
            }
        }
    }
}

impl IntoIndexes for ToyDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Backs the case-insensitive name search
            (
                doc! { "data.name": 1 },
                Some(
                    IndexOptions::builder()
                        .name(TOY_NAME_INDEX.to_string())
                        .build(),
                ),
            ),
            // Seller listing
            (
                doc! { "data.sellerEmail": 1 },
                Some(
                    IndexOptions::builder()
                        .name("seller_email_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ToyDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// A number supplied either as JSON/BSON number or as decimal text
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NumberInput {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumberInput {
    /// Convert to an integer, rejecting fractions and non-numeric text
    pub fn to_int(&self) -> Result<i64, String> {
        match self {
            Self::Integer(n) => Ok(*n),
            Self::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Ok(*f as i64)
                } else {
                    Err(format!("{} is not a whole number", f))
                }
            }
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("{:?} is not a whole number", s)),
        }
    }

    /// Convert a stored value: fractions truncate toward zero and text yields
    /// its leading integer, so `"25.50"` reads as 25
    pub fn to_int_truncating(&self) -> Result<i64, String> {
        match self {
            Self::Integer(n) => Ok(*n),
            Self::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
            Self::Float(f) => Err(format!("{} is not a finite number", f)),
            Self::Text(s) => {
                leading_integer(s).ok_or_else(|| format!("{:?} does not start with a number", s))
            }
        }
    }
}

/// Optional sign followed by decimal digits, after leading whitespace
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let n = rest[..end].parse::<i64>().ok()?;
    Some(if negative { -n } else { n })
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberInput::deserialize(deserializer)?
        .to_int_truncating()
        .map_err(D::Error::custom)
}
