use artifex_model::EditionSettings;
use serde_json::Value;

/// Raw item metadata plus module settings, with accessors for the parts
/// most modules care about.
pub struct ModuleInput<'a> {
    metadata: &'a Value,
    pub settings: &'a EditionSettings,
}

impl<'a> ModuleInput<'a> {
    pub fn new(metadata: &'a Value, settings: &'a EditionSettings) -> Self {
        Self { metadata, settings }
    }

    pub fn metadata(&self) -> &'a Value {
        self.metadata
    }

    /// The item's main media entry: the one with the largest bitrate.
    /// Ties keep the first entry, matching the server's ordering.
    pub fn main_media(&self) -> Option<&'a Value> {
        let media = self.metadata.get("Media")?.as_array()?;
        let mut best: Option<(&'a Value, i64)> = None;
        for entry in media {
            let bitrate = int_value(entry.get("bitrate")).unwrap_or(0);
            if best.is_none_or(|(_, current)| bitrate > current) {
                best = Some((entry, bitrate));
            }
        }
        best.map(|(entry, _)| entry)
    }

    /// The first part of the main media.
    pub fn main_part(&self) -> Option<&'a Value> {
        self.main_media()?.get("Part")?.as_array()?.first()
    }

    pub fn streams(&self) -> &'a [Value] {
        self.main_part()
            .and_then(|part| part.get("Stream"))
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// First video stream of the main part.
    pub fn video_stream(&self) -> Option<&'a Value> {
        self.streams()
            .iter()
            .find(|stream| int_value(stream.get("streamType")) == Some(1))
    }

    /// The selected audio stream, else the first one.
    pub fn audio_stream(&self) -> Option<&'a Value> {
        let audio = |stream: &&'a Value| int_value(stream.get("streamType")) == Some(2);
        self.streams()
            .iter()
            .find(|stream| audio(stream) && truthy(stream.get("selected")))
            .or_else(|| self.streams().iter().find(audio))
    }
}

/// Integer that may arrive as a number or numeric string.
pub(crate) fn int_value(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|f| f as i64)),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

pub(crate) fn f64_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

pub(crate) fn str_value(value: Option<&Value>) -> Option<&str> {
    value?.as_str().filter(|text| !text.is_empty())
}

pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => {
            !text.is_empty() && !matches!(text.as_str(), "0" | "false" | "False")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn main_media_has_largest_bitrate() {
        let metadata = json!({
            "Media": [
                {"bitrate": 4000, "videoCodec": "h264"},
                {"bitrate": 12000, "videoCodec": "hevc"},
                {"bitrate": 12000, "videoCodec": "av1"},
            ]
        });
        let settings = EditionSettings::default();
        let input = ModuleInput::new(&metadata, &settings);
        let media = input.main_media().unwrap();
        assert_eq!(media["videoCodec"], "hevc", "ties keep the first entry");
    }

    #[test]
    fn audio_stream_prefers_selected() {
        let metadata = json!({
            "Media": [{
                "bitrate": 1,
                "Part": [{
                    "Stream": [
                        {"streamType": 1, "codec": "hevc"},
                        {"streamType": 2, "language": "Japanese"},
                        {"streamType": 2, "language": "English", "selected": true},
                    ]
                }]
            }]
        });
        let settings = EditionSettings::default();
        let input = ModuleInput::new(&metadata, &settings);
        assert_eq!(input.audio_stream().unwrap()["language"], "English");
        assert_eq!(input.video_stream().unwrap()["codec"], "hevc");
    }

    #[test]
    fn truthiness_covers_wire_variants() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!(1))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(!truthy(Some(&json!(false))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!("false"))));
        assert!(!truthy(None));
    }
}
