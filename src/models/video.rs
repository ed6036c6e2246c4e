use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch";

/// Resolves a bare video id or a YouTube link to the video id.
///
/// Accepts `watch?v=`, `youtu.be/<id>`, `/shorts/<id>` and `/embed/<id>` forms.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let Ok(url) = Url::parse(input) else {
        return is_plain_id(input).then(|| input.to_string());
    };

    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let id = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_plain_id(&id).then_some(id)
}

/// The URL the summarization service is pointed at.
pub fn watch_url(video_id: &str) -> String {
    format!("{}?v={}", WATCH_URL, urlencoding::encode(video_id))
}

fn is_plain_id(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
