//! Object storage over the `/storage/v1` API.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kernel::{ListOptions, ObjectEntry, ObjectPath, ObjectStore, ProviderError, SortBy, UploadOptions};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::failure;
use crate::resource::Resource;
use crate::SessionCell;

const OBJECT_PATH: &str = "storage/v1/object";
/// Marker object the service creates for empty folders.
const PLACEHOLDER: &str = ".emptyFolderPlaceholder";
const CACHE_CONTROL: &str = "max-age=3600";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_by: Option<&'a SortBy>,
}

#[derive(Serialize)]
struct RemoveRequest {
    prefixes: Vec<String>,
}

#[derive(Deserialize)]
struct Metadata {
    size: Option<u64>,
}

#[derive(Deserialize)]
struct ListItem {
    name: String,
    id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    metadata: Option<Metadata>,
}

impl From<ListItem> for ObjectEntry {
    fn from(item: ListItem) -> Self {
        ObjectEntry {
            name: item.name,
            id: item.id,
            created_at: item.created_at,
            size_bytes: item.metadata.and_then(|m| m.size),
        }
    }
}

pub struct HttpStorage {
    client: Client,
    base: Resource,
    api_key: String,
    bucket: String,
    session: SessionCell,
}

impl HttpStorage {
    pub(crate) fn new(
        client: Client,
        base: Resource,
        api_key: String,
        bucket: String,
        session: SessionCell,
    ) -> Self {
        Self {
            client,
            base,
            api_key,
            bucket,
            session,
        }
    }

    fn object_url(&self, section: Option<&str>, key: Option<&ObjectPath>) -> String {
        let mut r = self.base.clone();
        r.append_path(OBJECT_PATH);
        if let Some(section) = section {
            r.append_path(section);
        }
        r.append_key(&self.bucket);
        if let Some(key) = key {
            r.append_key(&key.to_string());
        }
        r.to_string()
    }

    /// Adds the key and the bearer token of the signed in user, falling back
    /// to the key itself for anonymous access.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .as_ref()
            .map_or_else(|| self.api_key.clone(), |s| s.access_token.clone());
        request.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| failure::transport(&e))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(failure::from_response(response).await)
        }
    }
}

#[async_trait]
impl ObjectStore for HttpStorage {
    async fn list(
        &self,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<ObjectEntry>, ProviderError> {
        let body = ListRequest {
            prefix,
            limit: options.limit,
            offset: options.offset,
            sort_by: options.sort.as_ref(),
        };
        let request = self.client.post(self.object_url(Some("list"), None)).json(&body);
        let items: Vec<ListItem> = self
            .execute(request)
            .await?
            .json()
            .await
            .map_err(|e| failure::transport(&e))?;
        Ok(items
            .into_iter()
            .filter(|i| i.name != PLACEHOLDER)
            .map(ObjectEntry::from)
            .collect())
    }

    async fn upload(
        &self,
        path: &ObjectPath,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), ProviderError> {
        tracing::debug!("uploading {} bytes to {path}", data.len());
        let request = self
            .client
            .post(self.object_url(None, Some(path)))
            .header(reqwest::header::CONTENT_TYPE, &options.content_type)
            .header(reqwest::header::CACHE_CONTROL, CACHE_CONTROL)
            .header("x-upsert", options.upsert.to_string())
            .body(data);
        self.execute(request).await?;
        Ok(())
    }

    async fn download(&self, path: &ObjectPath) -> Result<Bytes, ProviderError> {
        let request = self
            .client
            .get(self.object_url(Some("authenticated"), Some(path)));
        self.execute(request)
            .await?
            .bytes()
            .await
            .map_err(|e| failure::transport(&e))
    }

    async fn remove(&self, paths: &[ObjectPath]) -> Result<(), ProviderError> {
        let body = RemoveRequest {
            prefixes: paths.iter().map(ToString::to_string).collect(),
        };
        let request = self.client.delete(self.object_url(None, None)).json(&body);
        self.execute(request).await?;
        Ok(())
    }

    fn public_url(&self, path: &ObjectPath) -> String {
        self.object_url(Some("public"), Some(path))
    }
}
