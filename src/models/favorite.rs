//! Represents a saved favorite and the result of saving one.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field holding the preview data-URL on input and the preview path once stored.
pub const PREVIEW_FIELD: &str = "preview";

/// Field injected into every listed record with its document filename.
pub const FILENAME_FIELD: &str = "filename";

/// A favorite as returned by listing.
///
/// The document is kept verbatim so arbitrary client fields round-trip;
/// `filename` is injected on read and is not part of the stored document.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Favorite(pub Map<String, Value>);

impl Favorite {
    /// Build a listed record from a stored document and its filename.
    pub fn from_document(mut document: Map<String, Value>, filename: &str) -> Self {
        document.insert(FILENAME_FIELD.into(), Value::String(filename.to_string()));
        Self(document)
    }
}

/// What a save wrote to disk.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    /// Name of the metadata document, usable for deletion.
    pub filename: String,

    /// Stored preview path, or `None` if no preview was supplied or it failed.
    pub preview: Option<String>,

    /// Non-fatal problems, e.g. a preview that could not be decoded.
    pub warnings: Vec<String>,
}
