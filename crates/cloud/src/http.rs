//! HTTP-backed [`RemoteFolder`]: folder listings come from a JSON index
//! document served next to the files.

use async_trait::async_trait;
use serde::Deserialize;

use crate::remote::{RemoteEntry, RemoteFolder};
use crate::CloudError;

/// Index document the remote serves at `<folder>/index.json`.
#[derive(Debug, Deserialize)]
struct FolderIndex {
    name: String,
    entries: Vec<RemoteEntry>,
}

/// [`RemoteFolder`] over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteFolder {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteFolder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn index(&self, folder_path: &str) -> Result<FolderIndex, CloudError> {
        let url = self.url(&format!("{folder_path}/index.json"));
        tracing::debug!(%url, "Fetching remote folder index");
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteFolder for HttpRemoteFolder {
    async fn list(&self, folder_path: &str) -> Result<Vec<RemoteEntry>, CloudError> {
        Ok(self.index(folder_path).await?.entries)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, CloudError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn folder_name(&self, folder_path: &str) -> Result<String, CloudError> {
        Ok(self.index(folder_path).await?.name)
    }
}
