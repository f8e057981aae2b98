//! The identify module derives stable, filename-safe content keys from source URLs.

use url::Url;

use crate::Source;

/// Identifier of a video on one of the supported platforms.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VideoId {
    pub source: Source,
    pub id: String,
}

impl VideoId {
    /// Returns the file stem used for this video, e.g. `ytb_dQw4w9WgXcQ`.
    pub fn key(&self) -> String {
        match self.source.tag() {
            Some(tag) => format!("{tag}_{}", self.id),
            None => self.id.clone(),
        }
    }
}

/// Extracts the subject id from a search-result redirect URL.
///
/// The redirect carries the canonical book URL in its `url` query parameter,
/// e.g. `https://www.douban.com/link2/?url=https%3A%2F%2Fbook.douban.com%2Fsubject%2F36860223%2F&query=...`.
/// The id is the second-to-last path segment of that embedded URL.
///
/// Returns `None` when the parameter is missing or its path has fewer than three segments.
pub fn extract_subject_id(redirect_url: &str) -> Option<String> {
    let redirect = Url::parse(redirect_url).ok()?;
    let embedded = redirect
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())?;
    let embedded = Url::parse(&embedded).ok()?;

    second_to_last_segment(embedded.path())
}

/// Extracts the review id from a review permalink such as `https://book.douban.com/review/5414380/`.
pub fn review_id(review_url: &str) -> Option<String> {
    let without_query = review_url.split(['?', '#']).next().unwrap_or_default();
    second_to_last_segment(without_query)
}

/// Extracts a platform-tagged id from a YouTube or Bilibili URL.
///
/// Returns `None` when the URL belongs to neither platform or carries no id.
pub fn video_content_id(video_url: &str) -> Option<VideoId> {
    let url = Url::parse(video_url.trim()).ok()?;
    let host = url.host_str()?;

    if host == "youtu.be" {
        let id = url.path().trim_start_matches('/');
        return (!id.is_empty()).then(|| VideoId {
            source: Source::YouTube,
            id: id.to_string(),
        });
    }

    if host.contains("youtube.com") {
        if !url.path().contains("watch") {
            return None;
        }
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .map(|id| VideoId {
                source: Source::YouTube,
                id,
            });
    }

    if host.contains("bilibili.com") {
        let path = url.path().strip_suffix('/').unwrap_or(url.path());
        return path
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(|id| VideoId {
                source: Source::Bilibili,
                id: id.to_string(),
            });
    }

    None
}

fn second_to_last_segment(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        return None;
    }

    parts
        .iter()
        .rev()
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}
