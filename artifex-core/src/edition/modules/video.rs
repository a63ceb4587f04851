use super::super::input::{ModuleInput, f64_value, int_value, str_value, truthy};

const RESOLUTION_LADDER: [((i64, i64), &str); 7] = [
    ((7680, 4320), "8K"),
    ((3840, 2160), "4K"),
    ((2560, 1440), "2K"),
    ((1920, 1080), "1080p"),
    ((1280, 720), "720p"),
    ((720, 576), "576p"),
    ((720, 480), "480p"),
];

/// Nearest ladder label by dimensions, with the server's string label as a
/// fallback when dimensions are unavailable.
pub(crate) fn resolution(input: &ModuleInput) -> Option<String> {
    let media = input.main_media()?;
    let label = str_value(media.get("videoResolution"))?;

    let width = int_value(media.get("width")).unwrap_or(0);
    let height = int_value(media.get("height")).unwrap_or(0);

    if width == 0 || height == 0 {
        return Some(match label {
            "4k" => "4K".to_string(),
            "1080" => "1080p".to_string(),
            "720" => "720p".to_string(),
            "sd" => "SD".to_string(),
            other => other.to_uppercase(),
        });
    }

    // 0.85 tolerance absorbs cropped black bars and odd container widths.
    for ((ladder_width, ladder_height), ladder_label) in RESOLUTION_LADDER {
        if width as f64 >= ladder_width as f64 * 0.85
            || height as f64 >= ladder_height as f64 * 0.85
        {
            return Some(ladder_label.to_string());
        }
    }

    Some("SD".to_string())
}

pub(crate) fn dynamic_range(input: &ModuleInput) -> Option<String> {
    let stream = input.video_stream()?;

    if let Some(profile) = int_value(stream.get("DOVIProfile")) {
        return Some(format!("DV P{profile}"));
    }
    if truthy(stream.get("DOVIPresent")) {
        return Some("Dolby Vision".to_string());
    }
    None
}

pub(crate) fn video_codec(input: &ModuleInput) -> Option<String> {
    let media = input.main_media()?;
    let codec = str_value(media.get("videoCodec"))?.to_lowercase();

    Some(match codec.as_str() {
        "h264" => "H.264".to_string(),
        "h265" | "hevc" => "H.265".to_string(),
        "mpeg4" => "MPEG-4".to_string(),
        "mpeg2video" => "MPEG-2".to_string(),
        "av1" => "AV1".to_string(),
        "vp9" => "VP9".to_string(),
        other => other.to_uppercase(),
    })
}

pub(crate) fn bitrate(input: &ModuleInput) -> Option<String> {
    let media = input.main_media()?;
    let kbps = int_value(media.get("bitrate")).filter(|value| *value > 0)?;
    Some(format!("{:.1} Mbps", kbps as f64 / 1000.0))
}

pub(crate) fn frame_rate(input: &ModuleInput) -> Option<String> {
    if let Some(stream) = input.video_stream()
        && let Some(rate) = f64_value(stream.get("frameRate"))
    {
        if (23.9..24.1).contains(&rate) {
            return Some("24fps".to_string());
        }
        if (29.9..30.1).contains(&rate) {
            return Some("30fps".to_string());
        }
        if (59.9..60.1).contains(&rate) {
            return Some("60fps".to_string());
        }
        return Some(format!("{}fps", rate as i64));
    }

    // Fall back to the summarized label on the media entry ("24p" etc).
    let media = input.main_media()?;
    str_value(media.get("videoFrameRate")).map(str::to_string)
}
