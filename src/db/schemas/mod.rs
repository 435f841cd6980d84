//! Database schemas for Toyshop
//!
//! Defines MongoDB document structures for toys and gallery items.

mod gallery;
mod metadata;
mod toy;

pub use gallery::{gallery_to_json, GALLERY_COLLECTION};
pub use metadata::Metadata;
pub use toy::{NumberInput, ToyData, ToyDoc, ToyUpdate, TOY_COLLECTION, TOY_NAME_INDEX};
