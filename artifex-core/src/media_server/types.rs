use artifex_model::{ExternalIds, MediaKind};
use serde::Deserialize;
use serde_json::Value;

/// Identity of a reachable media server.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: Option<String>,
}

/// A video library section.
#[derive(Debug, Clone)]
pub struct Library {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub item_count: i64,
    pub uuid: String,
}

/// A media item as enumerated from a library listing.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub key: String,
    pub title: String,
    pub year: Option<i64>,
    pub kind: MediaKind,
    pub guid: Option<String>,
    pub thumb: Option<String>,
    pub art: Option<String>,
    pub library: String,
    pub added_at: Option<i64>,
    pub edition_title: Option<String>,
    /// External identifier strings in `source://value` form.
    pub guids: Vec<String>,
}

impl MediaItem {
    /// An item is matched when the server associated it with an external
    /// identity source, i.e. its guid exists and is not `local://`.
    pub fn is_matched(&self) -> bool {
        self.guid
            .as_deref()
            .is_some_and(|guid| !guid.starts_with("local://"))
    }

    pub fn has_poster(&self) -> bool {
        self.thumb.as_deref().is_some_and(|path| !path.is_empty())
    }

    pub fn has_background(&self) -> bool {
        self.art.as_deref().is_some_and(|path| !path.is_empty())
    }

    /// Look up the external id for one source (`tmdb`, `imdb`, `tvdb`).
    pub fn external_id(&self, source: &str) -> Option<&str> {
        let prefix = format!("{source}://");
        self.guids
            .iter()
            .find_map(|guid| guid.strip_prefix(prefix.as_str()))
    }

    pub fn external_ids(&self) -> ExternalIds {
        ExternalIds {
            tmdb: self.external_id("tmdb").map(str::to_string),
            imdb: self.external_id("imdb").map(str::to_string),
            tvdb: self.external_id("tvdb").map(str::to_string),
        }
    }
}

/// Artwork already known to the media server for an item.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AvailableArt {
    pub url: Option<String>,
    pub thumb: Option<String>,
    pub provider: String,
    pub selected: bool,
}

/// A server advertised by the identity service's resource listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PinResource {
    pub name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub connections: Vec<Value>,
}

// Wire shapes. The server nests everything under `MediaContainer`.

#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    pub container: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RootContainer {
    pub friendly_name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SectionsContainer {
    #[serde(default, rename = "Directory")]
    pub directory: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawSection {
    pub key: Option<Value>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default, rename = "totalSize")]
    pub total_size: Option<i64>,
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ItemsContainer {
    #[serde(default)]
    pub total_size: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub library_section_title: Option<String>,
    #[serde(default, rename = "Metadata")]
    pub metadata: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawItem {
    pub rating_key: Option<Value>,
    pub title: Option<String>,
    pub year: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub guid: Option<String>,
    pub thumb: Option<String>,
    pub art: Option<String>,
    pub added_at: Option<i64>,
    pub edition_title: Option<String>,
    #[serde(default, rename = "Guid")]
    pub guids: Vec<RawGuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawGuid {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ArtContainer {
    #[serde(default, rename = "Metadata")]
    pub metadata: Vec<RawArt>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawArt {
    pub key: Option<String>,
    pub thumb: Option<String>,
    pub provider: Option<String>,
    #[serde(default)]
    pub selected: Option<bool>,
}

/// Keys arrive as either strings or numbers depending on server version.
pub(super) fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

impl RawItem {
    pub(super) fn into_item(self, library: String) -> Option<MediaItem> {
        let key = value_to_string(self.rating_key.as_ref())?;
        let kind = self
            .kind
            .as_deref()
            .and_then(|kind| kind.parse::<MediaKind>().ok())
            .unwrap_or(MediaKind::Movie);

        Some(MediaItem {
            key,
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            year: self.year,
            kind,
            guid: self.guid,
            thumb: self.thumb,
            art: self.art,
            library,
            added_at: self.added_at,
            edition_title: self.edition_title,
            guids: self.guids.into_iter().filter_map(|guid| guid.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(guid: Option<&str>, thumb: Option<&str>, art: Option<&str>) -> MediaItem {
        MediaItem {
            key: "1".to_string(),
            title: "Test".to_string(),
            year: None,
            kind: MediaKind::Movie,
            guid: guid.map(str::to_string),
            thumb: thumb.map(str::to_string),
            art: art.map(str::to_string),
            library: "Movies".to_string(),
            added_at: None,
            edition_title: None,
            guids: vec![
                "tmdb://603".to_string(),
                "imdb://tt0133093".to_string(),
            ],
        }
    }

    #[test]
    fn matched_requires_non_local_guid() {
        assert!(item(Some("plex://movie/abc"), None, None).is_matched());
        assert!(!item(Some("local://123"), None, None).is_matched());
        assert!(!item(None, None, None).is_matched());
    }

    #[test]
    fn artwork_presence_is_path_truthiness() {
        let full = item(None, Some("/thumb"), Some("/art"));
        assert!(full.has_poster());
        assert!(full.has_background());

        let bare = item(None, None, Some(""));
        assert!(!bare.has_poster());
        assert!(!bare.has_background());
    }

    #[test]
    fn external_ids_are_prefix_scanned() {
        let item = item(Some("plex://movie/abc"), None, None);
        assert_eq!(item.external_id("tmdb"), Some("603"));
        assert_eq!(item.external_id("imdb"), Some("tt0133093"));
        assert_eq!(item.external_id("tvdb"), None);

        let ids = item.external_ids();
        assert_eq!(ids.tmdb.as_deref(), Some("603"));
        assert!(!ids.is_empty());
    }
}
