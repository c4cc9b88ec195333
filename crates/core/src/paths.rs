//! Object keys and per-user path scoping.
//!
//! Every blob a user uploads lives under `{username}/` in the container, so the
//! indexer records a storage path of the form
//! `{account_url}/{container}/{username}/{file}`. The search backend only
//! offers relational comparisons on that field, so "starts with P" is written
//! as the half-open range `[P, P~)`.
//!
//! The range is exact only while every character following the prefix sorts
//! below `~` in the backend's collation. URL-encoded paths satisfy that.

use crate::config::StorageConfig;
use crate::error::RagError;
use std::path::Path;

/// Appended to a prefix to form the exclusive upper bound.
pub const PREFIX_SENTINEL: char = '~';

/// Object key for `local_path` in the user's folder: `{username}/{filename}`.
///
/// The username is used verbatim.
pub fn blob_name(username: &str, local_path: &Path) -> Result<String, RagError> {
    let filename = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            RagError::InvalidArgument(format!(
                "path has no file name: {}",
                local_path.display()
            ))
        })?;

    Ok(format!("{username}/{filename}"))
}

pub fn user_folder_prefix(storage: &StorageConfig, username: &str) -> String {
    format!(
        "{}/{}/{}/",
        storage.account_url.trim_end_matches('/'),
        storage.container,
        username
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRange {
    lower: String,
    upper: String,
}

impl PrefixRange {
    pub fn new(prefix: impl Into<String>) -> Self {
        let lower = prefix.into();
        let mut upper = lower.clone();
        upper.push(PREFIX_SENTINEL);
        Self { lower, upper }
    }

    pub fn for_user(storage: &StorageConfig, username: &str) -> Self {
        Self::new(user_folder_prefix(storage, username))
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    pub fn upper(&self) -> &str {
        &self.upper
    }

    pub fn contains(&self, path: &str) -> bool {
        path >= self.lower.as_str() && path < self.upper.as_str()
    }

    /// OData filter restricting `field` to the range.
    pub fn odata_filter(&self, field: &str) -> String {
        format!(
            "{field} ge '{}' and {field} lt '{}'",
            odata_string(&self.lower),
            odata_string(&self.upper)
        )
    }
}

fn odata_string(value: &str) -> String {
    value.replace('\'', "''")
}
