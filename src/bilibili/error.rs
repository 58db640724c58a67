use std::error::Error;
use std::fmt::Display;

use super::api::ApiError;

pub static INTERNAL_ERROR: &str = "解析B站视频时发生内部错误。";
pub static NO_REFERENCE: &str = "未找到B站视频链接";

/// Reasons a bilibili reference could not be turned into a video. Displays as the text shown
/// to the user.
#[derive(Debug)]
pub enum BiliError {
    /// Nothing id-shaped in the (expanded) link, e.g. live rooms or articles
    NoIdentifier(String),
    Api(ApiError),
}

impl Display for BiliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoIdentifier(_) => write!(f, "暂不支持该类型的B站链接（直播、专栏等）"),
            Self::Api(e) => write!(f, "解析B站视频失败：{e}"),
        }
    }
}

impl Error for BiliError {}
