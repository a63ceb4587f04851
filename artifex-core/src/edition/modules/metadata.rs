use super::super::input::{ModuleInput, f64_value, int_value, str_value};
use serde_json::Value;

pub(crate) fn content_rating(input: &ModuleInput) -> Option<String> {
    str_value(input.metadata().get("contentRating")).map(str::to_string)
}

pub(crate) fn duration(input: &ModuleInput) -> Option<String> {
    let duration_ms = int_value(input.metadata().get("duration")).filter(|ms| *ms > 0)?;
    let minutes = duration_ms / 60_000;
    let hours = minutes / 60;
    let mins = minutes % 60;

    if hours > 0 {
        Some(format!("{hours}h {mins}m"))
    } else {
        Some(format!("{mins}m"))
    }
}

pub(crate) fn rating(input: &ModuleInput) -> Option<String> {
    let rating = f64_value(input.metadata().get("rating"))?;
    Some(format!("{rating:.1}"))
}

fn first_tag(metadata: &Value, key: &str) -> Option<String> {
    metadata
        .get(key)?
        .as_array()?
        .first()
        .and_then(|entry| str_value(entry.get("tag")))
        .map(str::to_string)
}

pub(crate) fn director(input: &ModuleInput) -> Option<String> {
    first_tag(input.metadata(), "Director")
}

pub(crate) fn writer(input: &ModuleInput) -> Option<String> {
    first_tag(input.metadata(), "Writer")
}

pub(crate) fn genre(input: &ModuleInput) -> Option<String> {
    first_tag(input.metadata(), "Genre")
}

pub(crate) fn country(input: &ModuleInput) -> Option<String> {
    first_tag(input.metadata(), "Country")
}

pub(crate) fn studio(input: &ModuleInput) -> Option<String> {
    str_value(input.metadata().get("studio")).map(str::to_string)
}

/// Language of the selected (else first) audio stream, suppressed when it
/// is on the excluded list.
pub(crate) fn language(input: &ModuleInput) -> Option<String> {
    let stream = input.audio_stream()?;
    let language = str_value(stream.get("language"))?;

    if input
        .settings
        .excluded_languages
        .iter()
        .any(|excluded| excluded == language)
    {
        return None;
    }
    Some(language.to_string())
}

pub(crate) fn size(input: &ModuleInput) -> Option<String> {
    let part = input.main_part()?;
    let bytes = int_value(part.get("size")).filter(|size| *size > 0)?;
    let gib = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    Some(format!("{gib:.1} GB"))
}
