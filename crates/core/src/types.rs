//! Shared primitive type aliases.

/// Database-style numeric identifier used for users, templates, fields,
/// and image sizes.
pub type DbId = i64;
