use std::sync::LazyLock;

use regex::Regex;

use super::super::input::{ModuleInput, int_value, str_value};

type PatternTable = Vec<(Regex, &'static str)>;

fn compile(patterns: &[(&str, &'static str)]) -> PatternTable {
    patterns
        .iter()
        .map(|(pattern, label)| {
            (
                Regex::new(&format!("(?i){pattern}")).expect("static pattern"),
                *label,
            )
        })
        .collect()
}

// Declaration order is match priority: the first pattern that hits wins.
static CUT_PATTERNS: LazyLock<PatternTable> = LazyLock::new(|| {
    compile(&[
        (r"theatrical[.\s_-]*cut", "Theatrical Cut"),
        (r"director'?s?[.\s_-]*cut", "Director's Cut"),
        (r"producer'?s?[.\s_-]*cut", "Producer's Cut"),
        (r"extended[.\s_-]*(cut|edition)?", "Extended"),
        (r"unrated[.\s_-]*(cut|edition)?", "Unrated"),
        (r"final[.\s_-]*cut", "Final Cut"),
        (r"television[.\s_-]*cut", "Television Cut"),
        (r"international[.\s_-]*cut", "International Cut"),
        (r"redux", "Redux"),
        (r"criterion", "Criterion"),
        (r"remastered", "Remastered"),
        (r"restored", "Restored"),
    ])
});

static RELEASE_PATTERNS: LazyLock<PatternTable> = LazyLock::new(|| {
    compile(&[
        (r"criterion", "Criterion"),
        (r"anniversary", "Anniversary Edition"),
        (r"collector'?s?[.\s_-]*edition", "Collector's Edition"),
        (r"special[.\s_-]*edition", "Special Edition"),
        (r"diamond[.\s_-]*edition", "Diamond Edition"),
        (r"platinum[.\s_-]*edition", "Platinum Edition"),
        (r"signature[.\s_-]*edition", "Signature Edition"),
        (r"imax", "IMAX"),
        (r"open[.\s_-]*matte", "Open Matte"),
    ])
});

static SOURCE_PATTERNS: LazyLock<PatternTable> = LazyLock::new(|| {
    compile(&[
        (r"\bremux\b", "REMUX"),
        (r"\bblu-?ray\b|\bbd\b", "BluRay"),
        (r"\bbdrip\b", "BDRip"),
        (r"\bweb-?dl\b", "WEB-DL"),
        (r"\bwebrip\b", "WEBRip"),
        (r"\bhdtv\b", "HDTV"),
        (r"\bdvd\b", "DVD"),
        (r"\bdvdrip\b", "DVDRip"),
        (r"\bvhs\b", "VHS"),
        (r"\blaserdisc\b", "LaserDisc"),
    ])
});

fn first_match(table: &PatternTable, haystack: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(pattern, _)| pattern.is_match(haystack))
        .map(|(_, label)| *label)
}

fn file_path<'a>(input: &ModuleInput<'a>) -> Option<&'a str> {
    str_value(input.main_part()?.get("file"))
}

fn title<'a>(input: &ModuleInput<'a>) -> &'a str {
    str_value(input.metadata().get("title")).unwrap_or_default()
}

/// Cut label from the file path, else the title.
pub(crate) fn cut(input: &ModuleInput) -> Option<String> {
    if let Some(path) = file_path(input)
        && let Some(label) = first_match(&CUT_PATTERNS, path)
    {
        return Some(label.to_string());
    }
    first_match(&CUT_PATTERNS, title(input)).map(str::to_string)
}

pub(crate) fn release(input: &ModuleInput) -> Option<String> {
    if let Some(path) = file_path(input)
        && let Some(label) = first_match(&RELEASE_PATTERNS, path)
    {
        return Some(label.to_string());
    }
    first_match(&RELEASE_PATTERNS, title(input)).map(str::to_string)
}

/// Media source label; file path only, titles never carry these.
pub(crate) fn source(input: &ModuleInput) -> Option<String> {
    first_match(&SOURCE_PATTERNS, file_path(input)?).map(str::to_string)
}

pub(crate) fn short_film(input: &ModuleInput) -> Option<String> {
    let duration_ms = int_value(input.metadata().get("duration"))?;
    (duration_ms < 40 * 60_000).then(|| "Short Film".to_string())
}

pub(crate) fn special_features(input: &ModuleInput) -> Option<String> {
    let extras = input.metadata().get("Extras")?;
    let populated = match extras.as_array() {
        Some(entries) => !entries.is_empty(),
        None => !extras.is_null(),
    };
    populated.then(|| "Extras".to_string())
}
