use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;

/// Candidate id runs. Matches are validated by [`VideoId::parse`], the regex alone lets through
/// runs that are too long, e.g. `BV` followed by 11 alphanumerics.
pub(super) const ID_RUN_PATTERN: &str = r"(?P<id>BV[0-9A-Za-z]+|av[0-9]+)";

// ASCII boundary only, ids are often glued to CJK text like "BV17x411w7KC的视频"
static BARE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?:^|[^0-9A-Za-z]){ID_RUN_PATTERN}")).unwrap());

static VIDEO_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"/video/{ID_RUN_PATTERN}")).unwrap());

static FULL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:BV[0-9A-Za-z]{10}|av[0-9]+)$").unwrap());

/// Bare `av` ids need this many digits, so that codec names like "av1" are not picked up
const MIN_BARE_AV_DIGITS: usize = 5;

/// A canonical video identifier. Can only be constructed from a well-formed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(Box<str>);

impl VideoId {
    pub fn parse(id: &str) -> Option<Self> {
        FULL_ID_RE.is_match(id).then(|| Self(id.into()))
    }

    /// Stricter [`VideoId::parse`] for ids found without a surrounding video URL
    pub fn parse_bare(id: &str) -> Option<Self> {
        match id.strip_prefix("av") {
            Some(digits) if digits.len() < MIN_BARE_AV_DIGITS => None,
            _ => Self::parse(id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn page_url(&self) -> String {
        format!("https://www.bilibili.com/video/{}", self.0)
    }
}

impl Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the video id from a (possibly expanded) URL
pub fn canonical_id(url: &str) -> Option<VideoId> {
    // Prefer the /video/<id> path segment, then anything id-shaped (e.g. ?bvid=BV...)
    VIDEO_PATH_RE
        .captures_iter(url)
        .find_map(|cap| VideoId::parse(cap.name("id")?.as_str()))
        .or_else(|| find_bare_id(url))
}

/// First well-formed id in free text
pub fn find_bare_id(text: &str) -> Option<VideoId> {
    BARE_ID_RE
        .captures_iter(text)
        .find_map(|cap| VideoId::parse_bare(cap.name("id")?.as_str()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_shapes() {
        assert!(VideoId::parse("BV17x411w7KC").is_some());
        assert!(VideoId::parse("av170001").is_some());
        assert!(VideoId::parse("av1").is_some());
        assert!(VideoId::parse("BV17x411w7K").is_none());
        assert!(VideoId::parse("BV17x411w7KCX").is_none());
        assert!(VideoId::parse("bv17x411w7KC").is_none());
        assert!(VideoId::parse("av").is_none());
        assert!(VideoId::parse("").is_none());
    }

    #[test]
    fn video_path() {
        let id = canonical_id("https://www.bilibili.com/video/BV0123456789?p=2").unwrap();
        assert_eq!("BV0123456789", id.as_str());

        let id = canonical_id("https://m.bilibili.com/video/av170001/").unwrap();
        assert_eq!("av170001", id.as_str());
    }

    #[test]
    fn loose_fallback() {
        let id = canonical_id("https://www.bilibili.com/festival/x?bvid=BV1xx411c7mD&p=1").unwrap();
        assert_eq!("BV1xx411c7mD", id.as_str());
    }

    #[test]
    fn no_identifier() {
        assert!(canonical_id("https://b23.tv/vg9xOFG").is_none());
        assert!(canonical_id("https://live.bilibili.com/21452505").is_none());
        assert!(canonical_id("https://www.bilibili.com/read/cv12345").is_none());
        // Short av ids only count inside a /video/ path
        assert!(canonical_id("https://example.com/?codec=av1").is_none());
    }

    #[test]
    fn bare_ids() {
        assert_eq!("BV17x411w7KC", find_bare_id("看这个BV17x411w7KC的视频").unwrap().as_str());
        assert_eq!("av170001", find_bare_id("av170001").unwrap().as_str());
        assert_eq!("BV1xx411c7mD", find_bare_id("BV17x411w7KCX BV1xx411c7mD").unwrap().as_str());
        assert!(find_bare_id("av1 av1234").is_none());
        assert!(find_bare_id("xav170001").is_none());
        assert!(VideoId::parse_bare("av1234").is_none());
        assert!(VideoId::parse_bare("av12345").is_some());
        assert!(VideoId::parse_bare("BV17x411w7KC").is_some());
    }

    #[test]
    fn page_url() {
        let id = VideoId::parse("BV17x411w7KC").unwrap();
        assert_eq!("https://www.bilibili.com/video/BV17x411w7KC", id.page_url());
        assert_eq!("BV17x411w7KC", id.to_string());
    }
}
