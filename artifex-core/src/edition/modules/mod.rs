//! The edition module catalog.
//!
//! Every module is a pure function from item metadata to at most one short
//! string. The registry is the single source of module names; saved
//! configurations referencing unknown names are ignored and new modules are
//! appended to saved orderings, so user orderings survive upgrades.

mod audio;
mod content;
mod metadata;
mod video;

use super::input::ModuleInput;

pub type Extractor = fn(&ModuleInput) -> Option<String>;

pub const REGISTRY: &[(&str, Extractor)] = &[
    ("Resolution", video::resolution),
    ("DynamicRange", video::dynamic_range),
    ("VideoCodec", video::video_codec),
    ("Bitrate", video::bitrate),
    ("FrameRate", video::frame_rate),
    ("AudioCodec", audio::audio_codec),
    ("AudioChannels", audio::audio_channels),
    ("Cut", content::cut),
    ("Release", content::release),
    ("Source", content::source),
    ("ShortFilm", content::short_film),
    ("SpecialFeatures", content::special_features),
    ("ContentRating", metadata::content_rating),
    ("Duration", metadata::duration),
    ("Rating", metadata::rating),
    ("Director", metadata::director),
    ("Writer", metadata::writer),
    ("Genre", metadata::genre),
    ("Country", metadata::country),
    ("Studio", metadata::studio),
    ("Language", metadata::language),
    ("Size", metadata::size),
];

pub fn lookup(name: &str) -> Option<Extractor> {
    REGISTRY
        .iter()
        .find(|(module_name, _)| *module_name == name)
        .map(|(_, extractor)| *extractor)
}

pub fn module_names() -> Vec<String> {
    REGISTRY.iter().map(|(name, _)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifex_model::EditionSettings;
    use serde_json::{Value, json};

    fn extract(name: &str, metadata: &Value) -> Option<String> {
        let settings = EditionSettings::default();
        let input = ModuleInput::new(metadata, &settings);
        lookup(name).expect("registered module")(&input)
    }

    fn movie(media: Value) -> Value {
        json!({ "title": "Test Movie", "Media": [media] })
    }

    #[test]
    fn registry_names_are_unique() {
        let names = module_names();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        assert_eq!(names.len(), 22);
    }

    #[test]
    fn resolution_by_dimensions() {
        let metadata = movie(json!({
            "bitrate": 1, "videoResolution": "4k", "width": 3840, "height": 2160
        }));
        assert_eq!(extract("Resolution", &metadata).as_deref(), Some("4K"));

        let cropped = movie(json!({
            "bitrate": 1, "videoResolution": "1080", "width": 1920, "height": 800
        }));
        assert_eq!(extract("Resolution", &cropped).as_deref(), Some("1080p"));
    }

    #[test]
    fn resolution_falls_back_to_label_without_dimensions() {
        let metadata = movie(json!({
            "bitrate": 1, "videoResolution": "4k", "width": 0, "height": 0
        }));
        assert_eq!(extract("Resolution", &metadata).as_deref(), Some("4K"));

        let sd = movie(json!({ "bitrate": 1, "videoResolution": "sd" }));
        assert_eq!(extract("Resolution", &sd).as_deref(), Some("SD"));
    }

    #[test]
    fn resolution_requires_server_label() {
        let metadata = movie(json!({ "bitrate": 1, "width": 1920, "height": 1080 }));
        assert_eq!(extract("Resolution", &metadata), None);
    }

    #[test]
    fn dynamic_range_profile_beats_marker() {
        let with_profile = movie(json!({
            "bitrate": 1,
            "Part": [{"Stream": [{"streamType": 1, "DOVIProfile": 8, "DOVIPresent": true}]}]
        }));
        assert_eq!(extract("DynamicRange", &with_profile).as_deref(), Some("DV P8"));

        let marker_only = movie(json!({
            "bitrate": 1,
            "Part": [{"Stream": [{"streamType": 1, "DOVIPresent": true}]}]
        }));
        assert_eq!(
            extract("DynamicRange", &marker_only).as_deref(),
            Some("Dolby Vision")
        );

        let sdr = movie(json!({
            "bitrate": 1,
            "Part": [{"Stream": [{"streamType": 1}]}]
        }));
        assert_eq!(extract("DynamicRange", &sdr), None);
    }

    #[test]
    fn codec_tables() {
        let hevc = movie(json!({ "bitrate": 1, "videoCodec": "hevc" }));
        assert_eq!(extract("VideoCodec", &hevc).as_deref(), Some("H.265"));

        let unknown = movie(json!({ "bitrate": 1, "videoCodec": "prores" }));
        assert_eq!(extract("VideoCodec", &unknown).as_deref(), Some("PRORES"));
    }

    #[test]
    fn audio_codec_upgrades_from_display_title() {
        let atmos = movie(json!({
            "bitrate": 1,
            "audioCodec": "truehd",
            "Part": [{"Stream": [
                {"streamType": 2, "displayTitle": "TrueHD Atmos 7.1", "selected": true}
            ]}]
        }));
        assert_eq!(
            extract("AudioCodec", &atmos).as_deref(),
            Some("Dolby TrueHD Atmos")
        );

        let dtsx = movie(json!({
            "bitrate": 1,
            "audioCodec": "dts",
            "Part": [{"Stream": [{"streamType": 2, "displayTitle": "DTS:X 7.1"}]}]
        }));
        assert_eq!(extract("AudioCodec", &dtsx).as_deref(), Some("DTS:X"));
    }

    #[test]
    fn channel_layouts() {
        for (channels, expected) in [(8, "7.1"), (7, "6.1"), (6, "5.1"), (2, "2.0"), (1, "1.0"), (3, "3ch")] {
            let metadata = movie(json!({ "bitrate": 1, "audioChannels": channels }));
            assert_eq!(extract("AudioChannels", &metadata).as_deref(), Some(expected));
        }
    }

    #[test]
    fn bitrate_and_size_formatting() {
        let metadata = movie(json!({
            "bitrate": 24500,
            "Part": [{"size": 32_212_254_720_i64}]
        }));
        assert_eq!(extract("Bitrate", &metadata).as_deref(), Some("24.5 Mbps"));
        assert_eq!(extract("Size", &metadata).as_deref(), Some("30.0 GB"));
    }

    #[test]
    fn frame_rate_snaps_to_canonical_rates() {
        for (rate, expected) in [(23.976, "24fps"), (29.97, "30fps"), (59.94, "60fps"), (25.0, "25fps")] {
            let metadata = movie(json!({
                "bitrate": 1,
                "Part": [{"Stream": [{"streamType": 1, "frameRate": rate}]}]
            }));
            assert_eq!(extract("FrameRate", &metadata).as_deref(), Some(expected));
        }
    }

    #[test]
    fn cut_prefers_file_path_and_declaration_order() {
        let metadata = movie(json!({
            "bitrate": 1,
            "Part": [{"file": "/movies/Blade Runner (1982) [Director's Cut].mkv"}]
        }));
        assert_eq!(extract("Cut", &metadata).as_deref(), Some("Director's Cut"));

        let from_title = json!({
            "title": "Apocalypse Now Redux",
            "Media": [{"bitrate": 1, "Part": [{"file": "/movies/an.mkv"}]}]
        });
        assert_eq!(extract("Cut", &from_title).as_deref(), Some("Redux"));
    }

    #[test]
    fn source_matches_file_path_only() {
        let metadata = movie(json!({
            "bitrate": 1,
            "Part": [{"file": "/movies/Heat.1995.REMUX.BluRay.mkv"}]
        }));
        assert_eq!(extract("Source", &metadata).as_deref(), Some("REMUX"));

        let titled = json!({
            "title": "BluRay: The Movie",
            "Media": [{"bitrate": 1, "Part": [{"file": "/movies/b.mkv"}]}]
        });
        assert_eq!(extract("Source", &titled), None);
    }

    #[test]
    fn short_film_and_duration_boundaries() {
        let short = json!({ "title": "t", "duration": 2_340_000 });
        assert_eq!(extract("ShortFilm", &short).as_deref(), Some("Short Film"));
        assert_eq!(extract("Duration", &short).as_deref(), Some("39m"));

        let feature = json!({ "title": "t", "duration": 2_460_000 });
        assert_eq!(extract("ShortFilm", &feature), None);
        assert_eq!(extract("Duration", &feature).as_deref(), Some("41m"));

        let long = json!({ "title": "t", "duration": 8_100_000 });
        assert_eq!(extract("Duration", &long).as_deref(), Some("2h 15m"));
    }

    #[test]
    fn rating_renders_one_decimal() {
        let metadata = json!({ "title": "t", "rating": 8.25 });
        assert_eq!(extract("Rating", &metadata).as_deref(), Some("8.2"));
    }

    #[test]
    fn people_modules_take_first_entry() {
        let metadata = json!({
            "title": "t",
            "Director": [{"tag": "Ridley Scott"}, {"tag": "Other"}],
            "Genre": [{"tag": "Sci-Fi"}],
            "studio": "Warner Bros."
        });
        assert_eq!(extract("Director", &metadata).as_deref(), Some("Ridley Scott"));
        assert_eq!(extract("Genre", &metadata).as_deref(), Some("Sci-Fi"));
        assert_eq!(extract("Studio", &metadata).as_deref(), Some("Warner Bros."));
        assert_eq!(extract("Writer", &metadata), None);
    }

    #[test]
    fn language_respects_exclusions() {
        let english = movie(json!({
            "bitrate": 1,
            "Part": [{"Stream": [{"streamType": 2, "language": "English"}]}]
        }));
        assert_eq!(extract("Language", &english), None, "English excluded by default");

        let japanese = movie(json!({
            "bitrate": 1,
            "Part": [{"Stream": [{"streamType": 2, "language": "Japanese"}]}]
        }));
        assert_eq!(extract("Language", &japanese).as_deref(), Some("Japanese"));
    }
}
