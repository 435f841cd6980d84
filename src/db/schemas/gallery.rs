//! Gallery documents
//!
//! Gallery items are opaque and read-only. They are stored as raw BSON and
//! handed to clients as relaxed extended JSON, with `$oid` and `$date`
//! wrappers unwrapped so ids and timestamps read as plain strings.

use bson::{Bson, Document};
use serde_json::{Map, Value};

/// Default collection name for gallery items
pub const GALLERY_COLLECTION: &str = "ToyGallery";

/// Convert a raw gallery document to client JSON
pub fn gallery_to_json(doc: Document) -> Value {
    unwrap_extjson(Bson::Document(doc).into_relaxed_extjson())
}

fn unwrap_extjson(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(inner) = map.get("$oid").or_else(|| map.get("$date")) {
                    if inner.is_string() {
                        return inner.clone();
                    }
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, unwrap_extjson(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_extjson).collect()),
        other => other,
    }
}
