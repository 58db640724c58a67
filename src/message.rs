use std::fmt::Display;

use once_cell::sync::Lazy;
use poise::serenity_prelude as serenity;
use poise::{async_trait, CreateReply, ReplyHandle};
use serenity::builder::CreateEmbed;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use serenity::utils::Color;

use crate::bilibili::{format_size, ResolvedVideo};
use crate::PoiseContext;

pub static EMBED_COLOR: Lazy<Color> = Lazy::new(|| Color::from_rgb(0x10, 0x18, 0x20));
pub static EMBED_VIDEO_COLOR: Lazy<Color> = Lazy::new(|| Color::from_rgb(0xfb, 0x72, 0x99));
pub static EMBED_ERROR_COLOR: Lazy<Color> = Lazy::new(|| Color::from_rgb(0x8a, 0x2a, 0x2b));

pub enum SendMessage<T>
where
    T: Display,
{
    Normal(T),
    Error(T),
}

/// Caption sent after the video itself, some clients don't show attachment text
pub struct VideoCaption {
    title: String,
    page_url: String,
    cover_url: String,
    size: String,
    quality: String,
    comment_url: String,
    id: String,
}

#[async_trait]
pub trait SendableMessage: Send {
    /// Send a regular message to a channel
    async fn send_msg_http(self, http: &Http, channel_id: ChannelId) -> serenity::Result<Message>
    where
        Self: Sized,
    {
        channel_id
            .send_message(http, |m| m.embed(|e| self.build_embed(e)))
            .await
    }

    /// Send a reply to a command
    async fn send_msg<'a>(self, ctx: PoiseContext<'a>) -> serenity::Result<ReplyHandle<'a>>
    where
        Self: Sized,
    {
        ctx.send(|m| self.build_message(m)).await
    }

    fn build_message<'b, 'c>(self, m: &'b mut CreateReply<'c>) -> &'b mut CreateReply<'c>
    where
        Self: Sized,
    {
        // Set ephemeral on errors
        m.ephemeral(self.is_ephemeral());

        m.embed(|e| self.build_embed(e))
    }

    fn build_embed(self, e: &mut CreateEmbed) -> &mut CreateEmbed;
    fn is_ephemeral(&self) -> bool;
}

impl<T> SendableMessage for SendMessage<T>
where
    T: Display + Send,
{
    fn build_embed(self, e: &mut CreateEmbed) -> &mut CreateEmbed {
        match self {
            Self::Normal(s) => {
                let s = to_string_or_default(s);
                e.description(s);
                e.color(*EMBED_COLOR);
            }
            Self::Error(s) => {
                e.title("Error");
                let mut s = to_string_or_default(s);
                if let Some(c) = s.get_mut(0..1) {
                    c.make_ascii_uppercase();
                }
                e.description(s);
                e.color(*EMBED_ERROR_COLOR);
            }
        }
        e
    }

    fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl VideoCaption {
    pub fn new(video: &ResolvedVideo) -> Self {
        let metadata = &video.metadata;
        Self {
            title: metadata.title.clone(),
            page_url: video.reference.id.page_url(),
            cover_url: metadata.cover_url.clone(),
            size: format_size(metadata.size_bytes),
            quality: metadata.quality.clone(),
            comment_url: metadata.comment_url.clone(),
            id: video.reference.id.to_string(),
        }
    }
}

impl SendableMessage for VideoCaption {
    fn build_embed(self, e: &mut CreateEmbed) -> &mut CreateEmbed {
        e.title(format!("🎬 {}", self.title));
        e.url(self.page_url);
        if !self.cover_url.is_empty() {
            e.thumbnail(self.cover_url);
        }
        e.field("大小", self.size, true);
        e.field("清晰度", self.quality, true);
        if !self.comment_url.is_empty() {
            e.field("弹幕", format!("[下载]({})", self.comment_url), true);
        }
        e.footer(|f| f.text(self.id));
        e.color(*EMBED_VIDEO_COLOR);
        e
    }

    fn is_ephemeral(&self) -> bool {
        false
    }
}

/// Checks that a message successfully sent; if not, then logs why.
pub fn check_msg<T>(result: serenity::Result<T>) {
    if let Err(why) = result {
        tracing::error!("Error sending message: {:?}", why);
    }
}

fn to_string_or_default(val: impl Display) -> String {
    let s = val.to_string();
    if s.is_empty() {
        String::from("no description")
    } else {
        s
    }
}
