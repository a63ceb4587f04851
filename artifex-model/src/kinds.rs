use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Error returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKind {
    kind: &'static str,
    value: String,
}

impl InvalidKind {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for InvalidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for InvalidKind {}

/// What a scan looks at: artwork defects, edition strings, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    Artwork,
    Edition,
    Both,
}

impl ScanKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Artwork => "artwork",
            Self::Edition => "edition",
            Self::Both => "both",
        }
    }

    pub const fn includes_artwork(self) -> bool {
        matches!(self, Self::Artwork | Self::Both)
    }

    pub const fn includes_edition(self) -> bool {
        matches!(self, Self::Edition | Self::Both)
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanKind {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "artwork" => Ok(Self::Artwork),
            "edition" => Ok(Self::Edition),
            "both" => Ok(Self::Both),
            other => Err(InvalidKind::new("scan kind", other)),
        }
    }
}

/// Scan lifecycle states. `Running` and `Paused` are the live states; at
/// most one scan may occupy them process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl ScanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub const fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(InvalidKind::new("scan status", other)),
        }
    }
}

/// Lifecycle transitions recorded in the append-only scan event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEventKind {
    Started,
    Paused,
    Resumed,
    Cancelled,
    Completed,
    Failed,
}

impl ScanEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media item classification as reported by the media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Show,
    Season,
    Episode,
}

impl MediaKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Season => "season",
            Self::Episode => "episode",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "movie" => Ok(Self::Movie),
            "show" => Ok(Self::Show),
            "season" => Ok(Self::Season),
            "episode" => Ok(Self::Episode),
            other => Err(InvalidKind::new("media kind", other)),
        }
    }
}

/// Classified metadata defect on a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    NoMatch,
    NoPoster,
    NoBackground,
    NoLogo,
    PlaceholderPoster,
    PlaceholderBackground,
}

impl DefectKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::NoPoster => "no_poster",
            Self::NoBackground => "no_background",
            Self::NoLogo => "no_logo",
            Self::PlaceholderPoster => "placeholder_poster",
            Self::PlaceholderBackground => "placeholder_background",
        }
    }

    /// The artwork kind that would fix this defect, when one exists.
    pub const fn artwork_kind(self) -> Option<ArtworkKind> {
        match self {
            Self::NoPoster | Self::PlaceholderPoster => Some(ArtworkKind::Poster),
            Self::NoBackground | Self::PlaceholderBackground => Some(ArtworkKind::Background),
            Self::NoLogo => Some(ArtworkKind::Logo),
            Self::NoMatch => None,
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefectKind {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "no_match" => Ok(Self::NoMatch),
            "no_poster" => Ok(Self::NoPoster),
            "no_background" => Ok(Self::NoBackground),
            "no_logo" => Ok(Self::NoLogo),
            "placeholder_poster" => Ok(Self::PlaceholderPoster),
            "placeholder_background" => Ok(Self::PlaceholderBackground),
            other => Err(InvalidKind::new("defect kind", other)),
        }
    }
}

/// Review state of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pending,
    Accepted,
    Rejected,
    Applied,
    Failed,
}

impl IssueStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "applied" => Ok(Self::Applied),
            "failed" => Ok(Self::Failed),
            other => Err(InvalidKind::new("issue status", other)),
        }
    }
}

/// The artwork slots an item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkKind {
    Poster,
    Background,
    Logo,
}

impl ArtworkKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poster => "poster",
            Self::Background => "background",
            Self::Logo => "logo",
        }
    }
}

impl fmt::Display for ArtworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtworkKind {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "poster" => Ok(Self::Poster),
            "background" => Ok(Self::Background),
            "logo" => Ok(Self::Logo),
            other => Err(InvalidKind::new("artwork kind", other)),
        }
    }
}

/// Third-party artwork sources, plus the media server's own catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkSource {
    Fanart,
    Mediux,
    Tmdb,
    Tvdb,
    Plex,
}

impl ArtworkSource {
    pub const ALL: [Self; 5] = [
        Self::Fanart,
        Self::Mediux,
        Self::Tmdb,
        Self::Tvdb,
        Self::Plex,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fanart => "fanart",
            Self::Mediux => "mediux",
            Self::Tmdb => "tmdb",
            Self::Tvdb => "tvdb",
            Self::Plex => "plex",
        }
    }
}

impl fmt::Display for ArtworkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtworkSource {
    type Err = InvalidKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fanart" => Ok(Self::Fanart),
            "mediux" => Ok(Self::Mediux),
            "tmdb" => Ok(Self::Tmdb),
            "tvdb" => Ok(Self::Tvdb),
            "plex" => Ok(Self::Plex),
            other => Err(InvalidKind::new("artwork source", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for (name, value) in [
            ("no_match", DefectKind::NoMatch),
            ("no_poster", DefectKind::NoPoster),
            ("no_background", DefectKind::NoBackground),
            ("no_logo", DefectKind::NoLogo),
            ("placeholder_poster", DefectKind::PlaceholderPoster),
            ("placeholder_background", DefectKind::PlaceholderBackground),
        ] {
            assert_eq!(value.as_str(), name);
            assert_eq!(name.parse::<DefectKind>().unwrap(), value);
        }
    }

    #[test]
    fn defect_artwork_mapping() {
        assert_eq!(
            DefectKind::PlaceholderPoster.artwork_kind(),
            Some(ArtworkKind::Poster)
        );
        assert_eq!(
            DefectKind::NoBackground.artwork_kind(),
            Some(ArtworkKind::Background)
        );
        assert_eq!(DefectKind::NoMatch.artwork_kind(), None);
    }

    #[test]
    fn live_and_terminal_states_are_disjoint() {
        for status in [
            ScanStatus::Pending,
            ScanStatus::Running,
            ScanStatus::Paused,
            ScanStatus::Completed,
            ScanStatus::Cancelled,
            ScanStatus::Failed,
        ] {
            assert!(!(status.is_live() && status.is_terminal()));
        }
    }
}
