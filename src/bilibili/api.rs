use std::error::Error;
use std::fmt::Display;

use reqwest::header;
use serde::Deserialize;

use super::canonical::VideoId;
use super::BiliClient;

pub trait VideoInfoSource {
    async fn video_info(&self, id: &VideoId) -> Result<VideoMetadata, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub video_url: String,
    pub cover_url: String,
    pub size_bytes: Option<u64>,
    pub quality: String,
    pub comment_url: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Transport failure, bad status or unreadable body
    Request(String),
    /// The API answered but refused, carrying its `msg`
    Rejected(String),
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(_) => write!(f, "API 请求失败"),
            Self::Rejected(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for ApiError {}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: Option<i64>,
    msg: Option<String>,
    title: Option<String>,
    imgurl: Option<String>,
    data: Option<Vec<ApiVideo>>,
}

#[derive(Debug, Deserialize)]
struct ApiVideo {
    video_url: Option<String>,
    video_size: Option<serde_json::Value>,
    accept_format: Option<String>,
    comment: Option<String>,
}

impl VideoInfoSource for BiliClient {
    async fn video_info(&self, id: &VideoId) -> Result<VideoMetadata, ApiError> {
        let endpoint = format!("{}/api", self.api_base.trim_end_matches('/'));
        let quality = self.quality.to_string();
        let response = self
            .http
            .get(endpoint)
            .header(header::USER_AGENT, super::USER_AGENT)
            .query(&[("bvid", id.as_str()), ("accept", quality.as_str())])
            .timeout(self.api_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Request(e.to_string()))?
            .json::<ApiResponse>()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        into_metadata(response)
    }
}

fn into_metadata(response: ApiResponse) -> Result<VideoMetadata, ApiError> {
    let rejected = || ApiError::Rejected(response.msg.clone().unwrap_or_else(|| "解析失败".into()));
    if response.code != Some(0) {
        return Err(rejected());
    }
    let video = response
        .data
        .as_ref()
        .and_then(|d| d.first())
        .ok_or_else(rejected)?;
    let video_url = match &video.video_url {
        Some(url) if !url.is_empty() => url.clone(),
        _ => return Err(ApiError::Rejected("未返回视频直链".into())),
    };

    Ok(VideoMetadata {
        title: response.title.clone().unwrap_or_else(|| "未知标题".into()),
        video_url,
        cover_url: response.imgurl.clone().unwrap_or_default(),
        size_bytes: video.video_size.as_ref().and_then(size_from_json),
        quality: video
            .accept_format
            .clone()
            .unwrap_or_else(|| "未知清晰度".into()),
        comment_url: video.comment.clone().unwrap_or_default(),
    })
}

// The API has been seen returning the size both as a number and as a string
fn size_from_json(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Human readable file size, e.g. `12.34 MB`
pub fn format_size(size: Option<u64>) -> String {
    static UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let Some(size) = size else {
        return "未知".into();
    };
    let mut size = size as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}
