use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use super::MediaServerError;
use super::types::{
    ArtContainer, AvailableArt, Envelope, ItemsContainer, Library, MediaItem, PinResource,
    RootContainer, SectionsContainer, ServerInfo, value_to_string,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: usize = 100;

/// Base URL of the vendor identity service used by the PIN flow.
const IDENTITY_BASE: &str = "https://plex.tv/api/v2";

type Result<T> = std::result::Result<T, MediaServerError>;

/// Typed wrapper over the media server's HTTP API.
///
/// One instance is scoped to a single server (url + token pair) and shares
/// a pooled HTTP client across requests.
#[derive(Debug, Clone)]
pub struct MediaServerClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MediaServerClient {
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| MediaServerError::Http(err.to_string()))?;

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Full URL for a server-relative image path, with the token appended
    /// so the URL is fetchable on its own.
    pub fn image_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{}?X-Plex-Token={}", self.base_url, path, self.token)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .request(method, &url)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(MediaServerError::from_reqwest)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(MediaServerError::Unauthorized),
            status if !status.is_success() => Err(MediaServerError::Protocol(status.as_u16())),
            _ => Ok(response),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.request(Method::GET, path, query)
            .await?
            .json::<T>()
            .await
            .map_err(MediaServerError::from_reqwest)
    }

    /// Probe the server root, returning its friendly name and version.
    pub async fn probe(&self) -> Result<ServerInfo> {
        let root: Envelope<RootContainer> = self.get_json("/", &[]).await?;
        Ok(ServerInfo {
            name: root
                .container
                .friendly_name
                .unwrap_or_else(|| "Media Server".to_string()),
            version: root.container.version,
        })
    }

    /// List libraries, filtered to the video kinds.
    pub async fn libraries(&self) -> Result<Vec<Library>> {
        let sections: Envelope<SectionsContainer> =
            self.get_json("/library/sections", &[]).await?;

        let libraries = sections
            .container
            .directory
            .into_iter()
            .filter(|section| {
                matches!(section.kind.as_deref(), Some("movie") | Some("show"))
            })
            .filter_map(|section| {
                let id = value_to_string(section.key.as_ref())?;
                Some(Library {
                    id,
                    name: section.title.unwrap_or_else(|| "Unknown".to_string()),
                    kind: section.kind.unwrap_or_default(),
                    item_count: section
                        .count
                        .or(section.size)
                        .or(section.total_size)
                        .unwrap_or(0),
                    uuid: section.uuid.unwrap_or_default(),
                })
            })
            .collect();

        Ok(libraries)
    }

    /// One page of a library listing. Returns the items plus the total
    /// item count reported by the server.
    pub async fn library_items(
        &self,
        library_id: &str,
        start: usize,
        size: usize,
    ) -> Result<(Vec<MediaItem>, i64)> {
        let section: Envelope<SectionsContainer> = self
            .get_json(&format!("/library/sections/{library_id}"), &[])
            .await?;
        let library_name = section
            .container
            .directory
            .into_iter()
            .next()
            .and_then(|directory| directory.title)
            .unwrap_or_else(|| "Unknown".to_string());

        let items: Envelope<ItemsContainer> = self
            .get_json(
                &format!("/library/sections/{library_id}/all"),
                &[
                    ("X-Plex-Container-Start", start.to_string()),
                    ("X-Plex-Container-Size", size.to_string()),
                ],
            )
            .await?;

        let total = items
            .container
            .total_size
            .or(items.container.size)
            .unwrap_or(0);
        let items = items
            .container
            .metadata
            .into_iter()
            .filter_map(|raw| raw.into_item(library_name.clone()))
            .collect();

        Ok((items, total))
    }

    /// Every item in a library, paging until the listing is exhausted.
    pub async fn all_library_items(&self, library_id: &str) -> Result<Vec<MediaItem>> {
        let mut all_items = Vec::new();
        let mut start = 0;

        loop {
            let (items, total) = self.library_items(library_id, start, PAGE_SIZE).await?;
            let fetched = items.len();
            all_items.extend(items);

            if fetched == 0 || (start + fetched) as i64 >= total {
                break;
            }
            start += PAGE_SIZE;
        }

        Ok(all_items)
    }

    /// Typed metadata for a single item.
    pub async fn item_metadata(&self, item_key: &str) -> Result<Option<MediaItem>> {
        let items: Envelope<ItemsContainer> = self
            .get_json(&format!("/library/metadata/{item_key}"), &[])
            .await?;
        let library = items
            .container
            .library_section_title
            .unwrap_or_else(|| "Unknown".to_string());
        Ok(items
            .container
            .metadata
            .into_iter()
            .next()
            .and_then(|raw| raw.into_item(library)))
    }

    /// Raw metadata JSON for a single item. The edition modules consume the
    /// full media/part/stream structure, so nothing is projected away here.
    pub async fn raw_item_metadata(&self, item_key: &str) -> Result<Option<Value>> {
        let body: Value = self
            .get_json(&format!("/library/metadata/{item_key}"), &[])
            .await?;
        let item = body
            .get("MediaContainer")
            .and_then(|container| container.get("Metadata"))
            .and_then(Value::as_array)
            .and_then(|metadata| metadata.first())
            .cloned();
        Ok(item)
    }

    pub async fn upload_poster(&self, item_key: &str, image_url: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/library/metadata/{item_key}/posters"),
            &[("url", image_url.to_string())],
        )
        .await?;
        Ok(())
    }

    pub async fn upload_background(&self, item_key: &str, image_url: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/library/metadata/{item_key}/arts"),
            &[("url", image_url.to_string())],
        )
        .await?;
        Ok(())
    }

    /// Lock the poster field so the server's agents stop replacing it.
    pub async fn lock_poster(&self, item_key: &str) -> Result<()> {
        self.request(
            Method::PUT,
            &format!("/library/metadata/{item_key}"),
            &[("thumb.locked", "1".to_string())],
        )
        .await?;
        Ok(())
    }

    pub async fn lock_background(&self, item_key: &str) -> Result<()> {
        self.request(
            Method::PUT,
            &format!("/library/metadata/{item_key}"),
            &[("art.locked", "1".to_string())],
        )
        .await?;
        Ok(())
    }

    pub async fn set_edition(&self, item_key: &str, edition: &str) -> Result<()> {
        self.request(
            Method::PUT,
            &format!("/library/metadata/{item_key}"),
            &[("editionTitle.value", edition.to_string())],
        )
        .await?;
        Ok(())
    }

    pub async fn available_posters(&self, item_key: &str) -> Result<Vec<AvailableArt>> {
        self.available_art(item_key, "posters").await
    }

    pub async fn available_backgrounds(&self, item_key: &str) -> Result<Vec<AvailableArt>> {
        self.available_art(item_key, "arts").await
    }

    async fn available_art(&self, item_key: &str, endpoint: &str) -> Result<Vec<AvailableArt>> {
        let art: Envelope<ArtContainer> = self
            .get_json(&format!("/library/metadata/{item_key}/{endpoint}"), &[])
            .await?;
        Ok(art
            .container
            .metadata
            .into_iter()
            .map(|raw| AvailableArt {
                url: raw.key,
                thumb: raw.thumb,
                provider: raw.provider.unwrap_or_else(|| "plex".to_string()),
                selected: raw.selected.unwrap_or(false),
            })
            .collect())
    }
}

/// Start the identity PIN flow. Returns `(pin_id, code)`.
pub async fn create_pin(client_id: &str, product: &str) -> Result<(i64, String)> {
    let response = reqwest::Client::new()
        .post(format!("{IDENTITY_BASE}/pins"))
        .header("Accept", "application/json")
        .query(&[
            ("strong", "true"),
            ("X-Plex-Product", product),
            ("X-Plex-Client-Identifier", client_id),
        ])
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(MediaServerError::from_reqwest)?
        .error_for_status()
        .map_err(|err| MediaServerError::Protocol(err.status().map_or(0, |s| s.as_u16())))?;

    let body: Value = response
        .json()
        .await
        .map_err(MediaServerError::from_reqwest)?;
    let id = body
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| MediaServerError::Decode("pin response missing id".to_string()))?;
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| MediaServerError::Decode("pin response missing code".to_string()))?
        .to_string();
    Ok((id, code))
}

/// Poll a PIN. Returns the auth token once the user has approved it.
pub async fn check_pin(pin_id: i64, code: &str, client_id: &str) -> Result<Option<String>> {
    let response = reqwest::Client::new()
        .get(format!("{IDENTITY_BASE}/pins/{pin_id}"))
        .header("Accept", "application/json")
        .query(&[("code", code), ("X-Plex-Client-Identifier", client_id)])
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(MediaServerError::from_reqwest)?
        .error_for_status()
        .map_err(|err| MediaServerError::Protocol(err.status().map_or(0, |s| s.as_u16())))?;

    let body: Value = response
        .json()
        .await
        .map_err(MediaServerError::from_reqwest)?;
    Ok(body
        .get("authToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string))
}

/// Servers reachable with an identity token.
pub async fn resources(token: &str) -> Result<Vec<PinResource>> {
    let response = reqwest::Client::new()
        .get(format!("{IDENTITY_BASE}/resources"))
        .header("Accept", "application/json")
        .header("X-Plex-Token", token)
        .query(&[("includeHttps", "1")])
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(MediaServerError::from_reqwest)?
        .error_for_status()
        .map_err(|err| MediaServerError::Protocol(err.status().map_or(0, |s| s.as_u16())))?;

    let body: Value = response
        .json()
        .await
        .map_err(MediaServerError::from_reqwest)?;
    let Some(entries) = body.as_array() else {
        warn!("unexpected resources payload shape");
        return Ok(Vec::new());
    };

    Ok(entries
        .iter()
        .filter(|resource| {
            resource
                .get("provides")
                .and_then(Value::as_str)
                .is_some_and(|provides| provides.contains("server"))
        })
        .map(|resource| PinResource {
            name: resource
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            product: resource
                .get("product")
                .and_then(Value::as_str)
                .map(str::to_string),
            version: resource
                .get("productVersion")
                .and_then(Value::as_str)
                .map(str::to_string),
            connections: resource
                .get("connections")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        })
        .collect())
}
