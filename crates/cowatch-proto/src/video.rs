//! Video link parsing.

use url::Url;

const VIDEO_ID_LEN: usize = 11;

/// Extract the 11-character video id from a YouTube link.
///
/// Recognises `youtube.com/watch?v=<id>`, `youtube.com/{embed,v,e,shorts}/<id>`
/// and `youtu.be/<id>`, with or without a `www.`/`m.` prefix. Returns `None`
/// for anything else.
pub fn extract_video_id(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => match segments.next() {
            Some("watch") => {
                url.query_pairs().find(|(key, _)| key == "v").map(|(_, value)| value.into_owned())
            },
            Some("embed" | "v" | "e" | "shorts" | "live") => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
