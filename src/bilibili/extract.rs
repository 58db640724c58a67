use once_cell::sync::Lazy;
use regex::Regex;

use super::canonical::{find_bare_id, VideoId, ID_RUN_PATTERN};
use super::IncomingMessage;

// Examples:
//   https://www.bilibili.com/video/BV17x411w7KC
//   b23.tv/vg9xOFG
//   https://bili2233.cn/xxxxxx
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:https?://)?(?:(?:www|m)\.)?(?:bilibili\.com/video/{ID_RUN_PATTERN}|b23\.tv/[A-Za-z0-9_-]+|bili2233\.cn/[A-Za-z0-9_-]+)"
    ))
    .unwrap()
});

// Same shapes inside a JSON string, where every `/` is written as `\/`, or as `\\/` when the
// payload has been stringified twice
static ESCAPED_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    let slash = r"\\{1,2}/";
    Regex::new(&format!(
        r"(?:(?:https?:)?{slash}{slash})?(?:(?:www|m)\.)?(?:bilibili\.com{slash}video{slash}{ID_RUN_PATTERN}|b23\.tv{slash}[A-Za-z0-9_-]+|bili2233\.cn{slash}[A-Za-z0-9_-]+)"
    ))
    .unwrap()
});

static VIDEO_ATTACHMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?(?:content_)?type["']?\s*[:=]\s*["']?video\b"#).unwrap()
});

static SITE_HINTS: [&str; 5] = ["bilibili", "b23.tv", "bili2233", "哔哩哔哩", "b站"];

/// Which extraction tier produced a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Direct,
    Escaped,
    BareId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    pub url: String,
    pub source: MatchSource,
}

/// Find the first bilibili link referenced by a message, trying each tier over every text
/// source before moving on to the next tier
pub fn extract_link(message: &IncomingMessage) -> Option<LinkMatch> {
    if is_plain_video_attachment(message) {
        return None;
    }

    let sources = message.sources();
    let combined = sources.join("\n");
    sources
        .iter()
        .find_map(|text| direct_link(text))
        .or_else(|| sources.iter().find_map(|text| escaped_link(text)))
        .or_else(|| {
            has_site_hint(&combined)
                .then(|| sources.iter().find_map(|text| bare_id_link(text)))
                .flatten()
        })
}

fn direct_link(text: &str) -> Option<LinkMatch> {
    let link = first_link(&LINK_RE, text)?;
    Some(LinkMatch {
        url: normalize_scheme(link),
        source: MatchSource::Direct,
    })
}

fn escaped_link(text: &str) -> Option<LinkMatch> {
    let link = first_link(&ESCAPED_LINK_RE, text)?;
    Some(LinkMatch {
        url: normalize_scheme(&unescape_json_url(link)),
        source: MatchSource::Escaped,
    })
}

fn bare_id_link(text: &str) -> Option<LinkMatch> {
    let id: VideoId = find_bare_id(text)?;
    Some(LinkMatch {
        url: id.page_url(),
        source: MatchSource::BareId,
    })
}

/// First match of a link regex whose video id, if it has one, is well-formed
fn first_link<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures_iter(text)
        .find(|cap| {
            cap.name("id")
                .map_or(true, |id| VideoId::parse(id.as_str()).is_some())
        })
        .and_then(|cap| cap.get(0))
        .map(|m| m.as_str())
}

/// A video uploaded straight into chat is not a bilibili reference unless something in the
/// message names the site
fn is_plain_video_attachment(message: &IncomingMessage) -> bool {
    VIDEO_ATTACHMENT_RE.is_match(&message.payload_text)
        && !has_site_hint(&message.plain_text)
        && !has_site_hint(&message.payload_text)
}

fn has_site_hint(text: &str) -> bool {
    let text = text.to_lowercase();
    SITE_HINTS.iter().any(|hint| text.contains(hint))
}

/// Force an `https://` scheme onto a matched link
pub fn normalize_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{rest}")
    } else if url.starts_with("https://") {
        url.to_owned()
    } else if url.starts_with("//") {
        format!("https:{url}")
    } else {
        format!("https://{url}")
    }
}

/// Undo JSON string escaping of a URL. Only two escapes are handled: `\\` for a backslash and
/// `\/` for a slash. Backslash pairs must be collapsed first so that `\\/` ends up as `/`.
pub fn unescape_json_url(s: &str) -> String {
    s.replace(r"\\", r"\").replace(r"\/", "/")
}
