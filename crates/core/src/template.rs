//! Template model: image sizes, per-size field mappings, and the field
//! preparation step that reconciles user-supplied sources against the
//! template's defaults.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field::{FieldDto, FolderRef, TranslatedImageRef};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// ImageSize
// ---------------------------------------------------------------------------

/// One named output dimension configuration a template composes assets for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub id: DbId,
    pub name: String,
    /// Remote subfolder name that carries size-specific source overrides.
    pub path_name: String,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// TemplateField
// ---------------------------------------------------------------------------

/// Static parameters a template field carries independent of user input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFieldParams {
    /// Default scalar value applied when the user supplies none.
    pub value: Option<String>,
    /// Pre-translated image asset bound to this field, if any.
    pub image: Option<TranslatedImageRef>,
}

/// A template slot within one item (image size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub id: DbId,
    pub field_id: DbId,
    /// Fallback remote folder path when the user supplies no folder.
    pub default_path: Option<String>,
    pub params: TemplateFieldParams,
}

// ---------------------------------------------------------------------------
// TemplateItem / Template
// ---------------------------------------------------------------------------

/// One image size together with the fields composed for it, in z-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub image_size: ImageSize,
    pub fields: Vec<TemplateField>,
}

/// A creative template: the set of image sizes to produce and which
/// fields feed each of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: DbId,
    /// Image size whose output is the pack's cover asset.
    pub cover_image_size_id: DbId,
    pub items: Vec<TemplateItem>,
}

impl Template {
    /// The field mapping for `field_id` at the item targeting
    /// `image_size_id`, or `None` when the field is not composed at
    /// that size.
    pub fn field_for(&self, image_size_id: DbId, field_id: DbId) -> Option<&TemplateField> {
        self.items
            .iter()
            .find(|item| item.image_size.id == image_size_id)
            .and_then(|item| item.fields.iter().find(|f| f.field_id == field_id))
    }

    /// All image sizes this template produces.
    pub fn image_sizes(&self) -> impl Iterator<Item = &ImageSize> {
        self.items.iter().map(|item| &item.image_size)
    }
}

/// Validate that a template is well-formed before dispatch.
///
/// A template must compose at least one image size and its cover size
/// must be one of its items. Invalid field/size wiring is a programmer
/// error and fails fast here rather than mid-batch.
pub fn validate_template(template: &Template) -> Result<(), CoreError> {
    if template.items.is_empty() {
        return Err(CoreError::Validation(
            "Template must compose at least one image size".to_string(),
        ));
    }
    if !template
        .items
        .iter()
        .any(|item| item.image_size.id == template.cover_image_size_id)
    {
        return Err(CoreError::Validation(format!(
            "Cover image size {} is not one of the template's items",
            template.cover_image_size_id
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Field preparation
// ---------------------------------------------------------------------------

/// Reconcile user-supplied field sources against the template.
///
/// Walks every template item and field and produces one [`FieldDto`] per
/// template field:
/// - the folder is the user's folder when supplied, else the field's
///   `default_path` (with an empty display name), else none;
/// - the scalar value is the user's value, else the template param value;
/// - the translated image comes from the template params.
///
/// The same `field_id` may appear under several items; downstream
/// enumeration deduplicates with first-occurrence-wins.
pub fn prepare_fields(template: &Template, user_fields: &[FieldDto]) -> Vec<FieldDto> {
    let mut prepared = Vec::new();

    for item in &template.items {
        for template_field in &item.fields {
            let supplied = user_fields
                .iter()
                .find(|f| f.field_id == template_field.field_id);

            let folder = supplied
                .and_then(|f| f.folder.clone())
                .or_else(|| {
                    template_field.default_path.clone().map(|path| FolderRef {
                        path,
                        name: String::new(),
                    })
                });

            prepared.push(FieldDto {
                template_field_id: template_field.id,
                field_id: template_field.field_id,
                value: supplied
                    .and_then(|f| f.value.clone())
                    .or_else(|| template_field.params.value.clone()),
                folder,
                t_image: template_field.params.image.clone(),
            });
        }
    }

    prepared
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn size(id: DbId) -> ImageSize {
        ImageSize {
            id,
            name: format!("size-{id}"),
            path_name: format!("s{id}"),
            width: 1080,
            height: 1080,
        }
    }

    fn template_field(id: DbId, field_id: DbId) -> TemplateField {
        TemplateField {
            id,
            field_id,
            default_path: None,
            params: TemplateFieldParams::default(),
        }
    }

    fn user_field(field_id: DbId, value: Option<&str>, folder: Option<&str>) -> FieldDto {
        FieldDto {
            template_field_id: 0,
            field_id,
            value: value.map(Into::into),
            folder: folder.map(|p| FolderRef {
                path: p.into(),
                name: "User folder".into(),
            }),
            t_image: None,
        }
    }

    fn template() -> Template {
        Template {
            id: 1,
            cover_image_size_id: 100,
            items: vec![
                TemplateItem {
                    image_size: size(100),
                    fields: vec![template_field(1, 10), template_field(2, 20)],
                },
                TemplateItem {
                    image_size: size(200),
                    fields: vec![template_field(3, 10)],
                },
            ],
        }
    }

    #[test]
    fn valid_template_passes() {
        assert!(validate_template(&template()).is_ok());
    }

    #[test]
    fn template_without_items_rejected() {
        let t = Template {
            id: 1,
            cover_image_size_id: 100,
            items: vec![],
        };
        let err = validate_template(&t).unwrap_err();
        assert!(err.to_string().contains("at least one image size"));
    }

    #[test]
    fn template_with_foreign_cover_size_rejected() {
        let mut t = template();
        t.cover_image_size_id = 999;
        let err = validate_template(&t).unwrap_err();
        assert!(err.to_string().contains("not one of the template's items"));
    }

    #[test]
    fn field_lookup_respects_size() {
        let t = template();
        assert!(t.field_for(100, 20).is_some());
        assert!(t.field_for(200, 20).is_none());
        assert!(t.field_for(200, 10).is_some());
    }

    #[test]
    fn prepare_uses_user_folder_over_default() {
        let mut t = template();
        t.items[0].fields[0].default_path = Some("drive/defaults".into());
        let prepared = prepare_fields(&t, &[user_field(10, None, Some("drive/custom"))]);
        let f = prepared.iter().find(|f| f.field_id == 10).expect("field 10");
        assert_eq!(f.folder.as_ref().map(|r| r.path.as_str()), Some("drive/custom"));
    }

    #[test]
    fn prepare_falls_back_to_default_path() {
        let mut t = template();
        t.items[0].fields[0].default_path = Some("drive/defaults".into());
        let prepared = prepare_fields(&t, &[]);
        let f = prepared.iter().find(|f| f.field_id == 10).expect("field 10");
        let folder = f.folder.as_ref().expect("default folder");
        assert_eq!(folder.path, "drive/defaults");
        assert!(folder.name.is_empty());
    }

    #[test]
    fn prepare_value_precedence_user_then_template() {
        let mut t = template();
        t.items[0].fields[1].params.value = Some("template text".into());
        let prepared = prepare_fields(&t, &[user_field(20, Some("user text"), None)]);
        let f = prepared.iter().find(|f| f.field_id == 20).expect("field 20");
        assert_eq!(f.value.as_deref(), Some("user text"));

        let prepared = prepare_fields(&t, &[]);
        let f = prepared.iter().find(|f| f.field_id == 20).expect("field 20");
        assert_eq!(f.value.as_deref(), Some("template text"));
    }

    #[test]
    fn prepare_emits_one_dto_per_template_field() {
        let prepared = prepare_fields(&template(), &[]);
        // Field 10 appears under two items, so three DTOs in total.
        assert_eq!(prepared.len(), 3);
        assert_eq!(prepared.iter().filter(|f| f.field_id == 10).count(), 2);
    }
}
