//! Immutable field and pack-source value types.
//!
//! A [`FieldDto`] describes one template slot's source specification as
//! resolved at generation start; a [`PackSourceDto`] is the concrete
//! per-field input chosen for one pack.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// FolderRef / TranslatedImageRef
// ---------------------------------------------------------------------------

/// Reference to a remote source folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRef {
    /// Remote path understood by the cloud folder source.
    pub path: String,
    /// Display name used in progress messages.
    pub name: String,
}

/// Reference to a pre-translated image asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedImageRef {
    pub id: DbId,
    /// File name the asset is staged under inside the field's source dir.
    pub file_name: String,
}

// ---------------------------------------------------------------------------
// FieldDto
// ---------------------------------------------------------------------------

/// Source specification for one template field, built once when the
/// generation starts and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDto {
    pub template_field_id: DbId,
    pub field_id: DbId,
    /// Scalar override (e.g. a text value) when the field is static.
    pub value: Option<String>,
    /// Remote folder backing this field, when folder-backed.
    pub folder: Option<FolderRef>,
    /// Pre-translated image asset, when one applies.
    pub t_image: Option<TranslatedImageRef>,
}

impl FieldDto {
    /// Whether this field enumerates files from a downloaded folder.
    pub fn is_folder_backed(&self) -> bool {
        self.folder.is_some()
    }
}

// ---------------------------------------------------------------------------
// PackSourceDto
// ---------------------------------------------------------------------------

/// The resolved per-field input for one pack: field id, scalar override,
/// and local file path (`None` when the field contributes no image).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSourceDto {
    pub field_id: DbId,
    pub value: Option<String>,
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn field(folder: Option<FolderRef>) -> FieldDto {
        FieldDto {
            template_field_id: 1,
            field_id: 10,
            value: None,
            folder,
            t_image: None,
        }
    }

    #[test]
    fn folder_backed_detection() {
        assert!(!field(None).is_folder_backed());
        assert!(field(Some(FolderRef {
            path: "drive/backgrounds".into(),
            name: "Backgrounds".into(),
        }))
        .is_folder_backed());
    }

    #[test]
    fn pack_source_serializes_null_path() {
        let src = PackSourceDto {
            field_id: 3,
            value: Some("Buy now".into()),
            path: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&src).expect("serialize")).expect("parse");
        assert_eq!(json["field_id"], 3);
        assert_eq!(json["value"], "Buy now");
        assert!(json["path"].is_null());
    }
}
