//! Pipeline configuration, injected explicitly at construction.

use serde::Deserialize;

/// Image extensions accepted from remote source folders.
pub const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Tuning knobs for the generation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Lowercase file extensions downloaded from source folders.
    pub accepted_extensions: Vec<String>,
    /// Concurrent tasks in a download batch.
    pub download_concurrency: usize,
    /// Concurrent tasks in a composition batch.
    pub merge_concurrency: usize,
    /// Buffer capacity of the event bus broadcast channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            download_concurrency: 4,
            merge_concurrency: 4,
            event_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// Build a config from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized: `ADFORGE_DOWNLOAD_CONCURRENCY`,
    /// `ADFORGE_MERGE_CONCURRENCY`, `ADFORGE_EVENT_CAPACITY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_usize("ADFORGE_DOWNLOAD_CONCURRENCY") {
            config.download_concurrency = n.max(1);
        }
        if let Some(n) = env_usize("ADFORGE_MERGE_CONCURRENCY") {
            config.merge_concurrency = n.max(1);
        }
        if let Some(n) = env_usize("ADFORGE_EVENT_CAPACITY") {
            config.event_capacity = n.max(1);
        }
        config
    }

    /// Whether a remote entry extension is an accepted image format.
    pub fn accepts_extension(&self, extension: Option<&str>) -> bool {
        extension
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.accepted_extensions.iter().any(|a| *a == ext)
            })
            .unwrap_or(false)
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_accept_standard_image_formats() {
        let config = PipelineConfig::default();
        assert!(config.accepts_extension(Some("png")));
        assert!(config.accepts_extension(Some("JPG")));
        assert!(config.accepts_extension(Some("jpeg")));
        assert!(!config.accepts_extension(Some("gif")));
        assert!(!config.accepts_extension(None));
    }
}
