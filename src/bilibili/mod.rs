mod api;
mod canonical;
mod embed;
mod error;
mod expand;
mod extract;

use std::time::Duration;

use poise::serenity_prelude::Message;

pub use self::api::{format_size, ApiError, VideoInfoSource, VideoMetadata};
pub use self::canonical::{canonical_id, VideoId};
pub use self::embed::VideoEmbedder;
pub use self::error::{BiliError, INTERNAL_ERROR, NO_REFERENCE};
pub use self::expand::{is_short_link, ShortLinkExpander};
pub use self::extract::extract_link;
use crate::config::Config;
use crate::error::BotError;

static USER_AGENT: &str = "Mozilla/5.0 (compatible; bili-embed-bot)";

/// The text sources a reference can hide in
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub plain_text: String,
    /// Stringified structured payload (embeds, attachments, cards), may be empty
    pub payload_text: String,
}

impl IncomingMessage {
    pub fn new(plain_text: &str, payload_text: &str) -> Self {
        Self {
            plain_text: plain_text.to_owned(),
            payload_text: payload_text.to_owned(),
        }
    }

    pub fn from_discord(message: &Message) -> Self {
        Self {
            plain_text: message.content.clone(),
            payload_text: serde_json::to_string(message).unwrap_or_default(),
        }
    }

    fn sources(&self) -> Vec<&str> {
        [self.plain_text.as_str(), self.payload_text.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub id: VideoId,
    /// Link the id was taken from, after short link expansion
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedVideo {
    pub reference: ResolvedReference,
    pub metadata: VideoMetadata,
}

/// HTTP access to short links and the video parsing API
pub struct BiliClient {
    http: reqwest::Client,
    api_base: String,
    quality: u32,
    expand_timeout: Duration,
    api_timeout: Duration,
}

impl BiliClient {
    pub fn new(config: &Config) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| BotError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            quality: config.quality,
            expand_timeout: config.expand_timeout(),
            api_timeout: config.api_timeout(),
        })
    }

    #[cfg(test)]
    fn for_test(api_base: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.to_owned(),
            quality: 80,
            expand_timeout: timeout,
            api_timeout: timeout,
        }
    }
}

/// Run the whole pipeline on a message. `Ok(None)` means the message does not reference a
/// bilibili video and should be ignored.
pub async fn resolve<C>(
    client: &C,
    message: &IncomingMessage,
) -> Result<Option<ResolvedVideo>, BiliError>
where
    C: ShortLinkExpander + VideoInfoSource,
{
    let Some(link) = extract_link(message) else {
        return Ok(None);
    };
    tracing::debug!("Found bilibili link {} ({:?})", link.url, link.source);
    resolve_link(client, link.url).await.map(Some)
}

/// Expand, canonicalize and look up a single link
pub async fn resolve_link<C>(client: &C, url: String) -> Result<ResolvedVideo, BiliError>
where
    C: ShortLinkExpander + VideoInfoSource,
{
    let url = if is_short_link(&url) {
        client.expand(&url).await
    } else {
        url
    };

    let Some(id) = canonical_id(&url) else {
        tracing::warn!("Could not extract a video id from {url}");
        return Err(BiliError::NoIdentifier(url));
    };

    let metadata = client.video_info(&id).await.map_err(|e| {
        if let ApiError::Request(detail) = &e {
            tracing::error!("Video API request for {id} failed: {detail}");
        }
        BiliError::Api(e)
    })?;

    Ok(ResolvedVideo {
        reference: ResolvedReference { id, source_url: url },
        metadata,
    })
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Canned client, `redirect: None` behaves like a timed out expansion
    struct FakeClient {
        redirect: Option<&'static str>,
        api: fn(&VideoId) -> Result<VideoMetadata, ApiError>,
        expansions: AtomicUsize,
        lookups: AtomicUsize,
    }

    impl FakeClient {
        fn new(
            redirect: Option<&'static str>,
            api: fn(&VideoId) -> Result<VideoMetadata, ApiError>,
        ) -> Self {
            Self {
                redirect,
                api,
                expansions: AtomicUsize::new(0),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    impl ShortLinkExpander for FakeClient {
        async fn expand(&self, url: &str) -> String {
            self.expansions.fetch_add(1, Ordering::SeqCst);
            self.redirect.unwrap_or(url).to_owned()
        }
    }

    impl VideoInfoSource for FakeClient {
        async fn video_info(&self, id: &VideoId) -> Result<VideoMetadata, ApiError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            (self.api)(id)
        }
    }

    fn found(id: &VideoId) -> Result<VideoMetadata, ApiError> {
        Ok(VideoMetadata {
            title: format!("title of {id}"),
            video_url: "https://upos.example.com/v.mp4".into(),
            cover_url: String::new(),
            size_bytes: Some(1024),
            quality: "高清 1080P".into(),
            comment_url: String::new(),
        })
    }

    fn removed(_: &VideoId) -> Result<VideoMetadata, ApiError> {
        Err(ApiError::Rejected("video removed".into()))
    }

    #[tokio::test]
    async fn expands_short_link() {
        let client = FakeClient::new(
            Some("https://www.bilibili.com/video/BV0123456789?share_source=copy_web"),
            found,
        );
        let message = IncomingMessage::new("【搞笑】 https://b23.tv/vg9xOFG", "");

        let video = resolve(&client, &message).await.unwrap().unwrap();
        assert_eq!("BV0123456789", video.reference.id.as_str());
        assert_eq!(
            "https://www.bilibili.com/video/BV0123456789?share_source=copy_web",
            video.reference.source_url
        );
        assert_eq!("title of BV0123456789", video.metadata.title);
        assert_eq!(1, client.expansions.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_expansion_is_unsupported() {
        let client = FakeClient::new(None, found);
        let message = IncomingMessage::new("https://b23.tv/vg9xOFG", "");

        let err = resolve(&client, &message).await.unwrap_err();
        assert!(matches!(&err, BiliError::NoIdentifier(url) if url == "https://b23.tv/vg9xOFG"));
        assert_eq!("暂不支持该类型的B站链接（直播、专栏等）", err.to_string());
        assert_eq!(0, client.lookups.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn video_page_skips_expansion() {
        let client = FakeClient::new(None, found);
        let message = IncomingMessage::new("https://www.bilibili.com/video/av170001", "");

        let video = resolve(&client, &message).await.unwrap().unwrap();
        assert_eq!("av170001", video.reference.id.as_str());
        assert_eq!(0, client.expansions.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn escaped_card_payload() {
        let client = FakeClient::new(Some("https://m.bilibili.com/video/BV17x411w7KC"), found);
        let message = IncomingMessage::new(
            "[QQ小程序]哔哩哔哩",
            r#"{"meta":{"detail_1":{"qqdocurl":"https:\/\/b23.tv\/abc123?share_medium=android"}}}"#,
        );

        let video = resolve(&client, &message).await.unwrap().unwrap();
        assert_eq!("BV17x411w7KC", video.reference.id.as_str());
    }

    #[tokio::test]
    async fn api_failure_message() {
        let client = FakeClient::new(None, removed);
        let message = IncomingMessage::new("https://www.bilibili.com/video/BV17x411w7KC", "");

        let err = resolve(&client, &message).await.unwrap_err();
        assert_eq!("解析B站视频失败：video removed", err.to_string());
        assert_eq!(1, client.lookups.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn not_a_reference() {
        let client = FakeClient::new(None, found);
        let message = IncomingMessage::new("just chatting about av1 encoders", "");

        assert!(resolve(&client, &message).await.unwrap().is_none());
        assert_eq!(0, client.expansions.load(Ordering::SeqCst));
        assert_eq!(0, client.lookups.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn against_local_servers() {
        use wiremock::matchers::{path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(path("/api"))
            .and(query_param("bvid", "BV0123456789"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"code":-1,"msg":"video removed"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = BiliClient::for_test(&server.uri(), Duration::from_secs(5));

        let err = resolve_link(&client, "https://www.bilibili.com/video/BV0123456789".into())
            .await
            .unwrap_err();
        assert_eq!("解析B站视频失败：video removed", err.to_string());
    }
}
