use super::super::input::{ModuleInput, int_value, str_value};

pub(crate) fn audio_codec(input: &ModuleInput) -> Option<String> {
    let media = input.main_media()?;
    let codec = str_value(media.get("audioCodec"))?.to_lowercase();

    let mut display = match codec.as_str() {
        "truehd" => "Dolby TrueHD".to_string(),
        "eac3" => "Dolby Digital Plus".to_string(),
        "ac3" => "Dolby Digital".to_string(),
        "dts-hd ma" => "DTS-HD MA".to_string(),
        "dts" => "DTS".to_string(),
        "flac" => "FLAC".to_string(),
        "aac" => "AAC".to_string(),
        "mp3" => "MP3".to_string(),
        "opus" => "Opus".to_string(),
        other => other.to_uppercase(),
    };

    // The stream display title is the only place Atmos / DTS:X show up.
    if let Some(stream) = input.audio_stream() {
        let title = str_value(stream.get("displayTitle"))
            .unwrap_or_default()
            .to_lowercase();
        if title.contains("atmos") {
            display.push_str(" Atmos");
        } else if title.contains("dts:x") {
            display = "DTS:X".to_string();
        }
    }

    Some(display)
}

pub(crate) fn audio_channels(input: &ModuleInput) -> Option<String> {
    let media = input.main_media()?;
    let channels = int_value(media.get("audioChannels")).filter(|count| *count > 0)?;

    Some(match channels {
        8 => "7.1".to_string(),
        7 => "6.1".to_string(),
        6 => "5.1".to_string(),
        2 => "2.0".to_string(),
        1 => "1.0".to_string(),
        other => format!("{other}ch"),
    })
}
