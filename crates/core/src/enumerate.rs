//! Variant enumeration: the cross product of per-field source files,
//! capped by index-based random sampling without replacement.
//!
//! The cross product is never materialized. Combinations are addressed by
//! a flat index in mixed radix over the per-field file counts; sampling
//! draws distinct flat indices and decodes only the chosen ones, so
//! memory is bounded by the requested count rather than the product size.

use std::collections::HashMap;

use rand::Rng;

use crate::field::{FieldDto, PackSourceDto};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Field deduplication
// ---------------------------------------------------------------------------

/// Deduplicate a generation's field list by `field_id`, first occurrence
/// wins. The result is the authoritative field set for enumeration.
pub fn dedup_fields(source: &[FieldDto]) -> Vec<FieldDto> {
    let mut seen: Vec<DbId> = Vec::new();
    let mut out = Vec::new();
    for field in source {
        if !seen.contains(&field.field_id) {
            seen.push(field.field_id);
            out.push(field.clone());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Downloaded files for one folder-backed field.
#[derive(Debug, Clone)]
pub struct FieldFiles {
    pub field_id: DbId,
    pub value: Option<String>,
    pub files: Vec<String>,
}

/// Result of enumerating a generation's variants.
#[derive(Debug, Clone)]
pub enum EnumerationOutcome {
    /// No folder-backed field contributed any file; nothing to produce.
    Empty,
    /// One resolved source list per pack to create.
    Combinations(Vec<Vec<PackSourceDto>>),
}

impl EnumerationOutcome {
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Combinations(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Total number of distinct combinations over the contributing fields.
///
/// Fields with zero files are excluded beforehand, so the product is over
/// non-empty lists only; an empty slice yields zero.
fn total_combinations(fields: &[&FieldFiles]) -> u128 {
    if fields.is_empty() {
        return 0;
    }
    fields
        .iter()
        .fold(1u128, |acc, f| acc.saturating_mul(f.files.len() as u128))
}

/// Decode a flat combination index into one file choice per contributing
/// field (mixed-radix, least significant field first).
fn decode_combination<'a>(fields: &[&'a FieldFiles], mut index: u128) -> HashMap<DbId, &'a str> {
    let mut chosen = HashMap::with_capacity(fields.len());
    for field in fields {
        let radix = field.files.len() as u128;
        let pick = (index % radix) as usize;
        index /= radix;
        chosen.insert(field.field_id, field.files[pick].as_str());
    }
    chosen
}

/// Draw `amount` distinct indices from `0..total`.
///
/// Small products go through `rand::seq::index::sample`; products beyond
/// `usize` fall back to rejection sampling, which stays cheap because
/// `amount` is tiny relative to `total` in that regime.
fn sample_indices<R: Rng>(rng: &mut R, total: u128, amount: usize) -> Vec<u128> {
    if let Ok(total_usize) = usize::try_from(total) {
        return rand::seq::index::sample(rng, total_usize, amount)
            .into_iter()
            .map(|i| i as u128)
            .collect();
    }

    let mut picked: Vec<u128> = Vec::with_capacity(amount);
    while picked.len() < amount {
        let candidate = rng.random_range(0..total);
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }
    picked
}

/// Enumerate up to `requested` variants for a generation.
///
/// `fields` is the deduplicated authoritative field set;
/// `files_by_field` maps each folder-backed field to its downloaded local
/// files (fields absent from the map, or mapped to an empty list,
/// contribute nothing to the product). `generation_folder` anchors
/// translated-image path resolution.
///
/// Per-field path resolution order in each materialized combination:
/// the sampled file for the field, else the field's translated image
/// under `<generation_folder>/source/<field_id>/`, else `None`.
pub fn enumerate_variants<R: Rng>(
    fields: &[FieldDto],
    files_by_field: &HashMap<DbId, Vec<String>>,
    requested: usize,
    generation_folder: &str,
    rng: &mut R,
) -> EnumerationOutcome {
    let field_files: Vec<FieldFiles> = fields
        .iter()
        .filter(|f| f.is_folder_backed())
        .map(|f| FieldFiles {
            field_id: f.field_id,
            value: f.value.clone(),
            files: files_by_field.get(&f.field_id).cloned().unwrap_or_default(),
        })
        .collect();

    // A folder field that yielded no files is an empty contribution: it
    // drops out of the product and falls back to value/translated-image
    // during materialization.
    let contributing: Vec<&FieldFiles> =
        field_files.iter().filter(|f| !f.files.is_empty()).collect();

    let total = total_combinations(&contributing);
    if total == 0 || requested == 0 {
        return EnumerationOutcome::Empty;
    }

    let indices: Vec<u128> = if total <= requested as u128 {
        (0..total).collect()
    } else {
        sample_indices(rng, total, requested)
    };

    let combinations = indices
        .into_iter()
        .map(|index| {
            let chosen = decode_combination(&contributing, index);
            materialize(fields, &chosen, generation_folder)
        })
        .collect();

    EnumerationOutcome::Combinations(combinations)
}

/// Materialize the full field map for one combination: every field in the
/// authoritative set resolves to a source, enumerated or fallback.
fn materialize(
    fields: &[FieldDto],
    chosen: &HashMap<DbId, &str>,
    generation_folder: &str,
) -> Vec<PackSourceDto> {
    fields
        .iter()
        .map(|field| {
            let path = chosen
                .get(&field.field_id)
                .map(|p| (*p).to_string())
                .or_else(|| {
                    field.t_image.as_ref().map(|t| {
                        format!(
                            "{generation_folder}/source/{}/{}",
                            field.field_id, t.file_name
                        )
                    })
                });

            PackSourceDto {
                field_id: field.field_id,
                value: field.value.clone(),
                path,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
