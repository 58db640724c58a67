use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use poise::serenity_prelude::{AttachmentType, ChannelId, Http, Message};
use reqwest::header;

use super::{resolve, BiliClient, IncomingMessage, ResolvedVideo, INTERNAL_ERROR};
use crate::config::Config;
use crate::error::BotError;
use crate::message::{check_msg, SendMessage, SendableMessage, VideoCaption};
use crate::Error;

/// Posts the videos behind bilibili links seen in chat
pub struct VideoEmbedder {
    pub client: BiliClient,
    upload_limit_bytes: u64,
    dump_messages: bool,
}

impl VideoEmbedder {
    pub fn new(config: &Config) -> Result<Self, BotError> {
        Ok(Self {
            client: BiliClient::new(config)?,
            upload_limit_bytes: config.upload_limit_bytes,
            dump_messages: config.dump_messages,
        })
    }

    /// Handle one chat message in its own task. Failures and panics end up as a generic error
    /// reply instead of reaching the framework.
    pub async fn reply_video_embed(self: Arc<Self>, http: Arc<Http>, message: Message) {
        let channel_id = message.channel_id;
        let handler = {
            let http = http.clone();
            async move { self.handle_message(&http, &message).await }
        };

        let Some(reason) = handling_failure(handler).await else {
            return;
        };
        tracing::error!(
            "Error while handling message in {}: {}",
            channel_id.as_u64(),
            reason
        );
        check_msg(
            SendMessage::Error(INTERNAL_ERROR)
                .send_msg_http(&http, channel_id)
                .await,
        );
    }

    async fn handle_message(&self, http: &Http, message: &Message) -> Result<(), Error> {
        let incoming = IncomingMessage::from_discord(message);
        if self.dump_messages {
            tracing::debug!(
                "Message {} in {}: {}",
                message.id.as_u64(),
                message.channel_id.as_u64(),
                incoming.payload_text
            );
        }

        let video = match resolve(&self.client, &incoming).await {
            Ok(Some(video)) => video,
            Ok(None) => return Ok(()),
            Err(e) => {
                SendMessage::Error(e)
                    .send_msg_http(http, message.channel_id)
                    .await?;
                return Ok(());
            }
        };

        tracing::info!(
            "Replying with video {} in {}",
            video.reference.id,
            message.channel_id.as_u64()
        );
        self.send_video(http, message.channel_id, Some(message), &video)
            .await?;
        VideoCaption::new(&video)
            .send_msg_http(http, message.channel_id)
            .await?;
        Ok(())
    }

    /// Upload the video as a file if it is small enough, otherwise post the direct link and let
    /// the client embed it
    pub async fn send_video(
        &self,
        http: &Http,
        channel_id: ChannelId,
        reply_to: Option<&Message>,
        video: &ResolvedVideo,
    ) -> Result<(), Error> {
        if self.fits_upload(video.metadata.size_bytes) {
            match self.upload_video(http, channel_id, reply_to, video).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(
                    "Uploading {} failed, sending the direct link instead: {}",
                    video.reference.id,
                    e
                ),
            }
        }

        let content = video.metadata.video_url.clone();
        channel_id
            .send_message(http, |m| {
                m.content(content);
                if let Some(reply_to) = reply_to {
                    m.reference_message(reply_to);
                }
                m
            })
            .await?;
        Ok(())
    }

    fn fits_upload(&self, size: Option<u64>) -> bool {
        matches!(size, Some(size) if size <= self.upload_limit_bytes)
    }

    async fn upload_video(
        &self,
        http: &Http,
        channel_id: ChannelId,
        reply_to: Option<&Message>,
        video: &ResolvedVideo,
    ) -> Result<(), Error> {
        let data = self
            .client
            .download(&video.metadata.video_url, self.upload_limit_bytes)
            .await?;

        let attachment = AttachmentType::Bytes {
            data: Cow::Owned(data),
            filename: format!("{}.mp4", video.reference.id),
        };
        channel_id
            .send_message(http, |m| {
                m.add_file(attachment);
                if let Some(reply_to) = reply_to {
                    m.reference_message(reply_to);
                }
                m
            })
            .await?;
        Ok(())
    }
}

/// Run a message handler in its own task so that a panic can't take the bot down. Returns why
/// it failed, if it did.
async fn handling_failure<F>(handler: F) -> Option<String>
where
    F: Future<Output = Result<(), Error>> + Send + 'static,
{
    match tokio::spawn(handler).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(e.to_string()),
    }
}

impl BiliClient {
    /// Fetch a video file, giving up as soon as it is known to be bigger than `limit` bytes
    async fn download(&self, url: &str, limit: u64) -> Result<Vec<u8>, Error> {
        // The CDN rejects requests that don't look like they come from the site
        let mut response = self
            .http
            .get(url)
            .header(header::USER_AGENT, super::USER_AGENT)
            .header(header::REFERER, "https://www.bilibili.com/")
            .timeout(self.api_timeout)
            .send()
            .await?
            .error_for_status()?;

        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(format!("video is {len} bytes, over the upload limit").into());
            }
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            if data.len() as u64 > limit {
                return Err(format!("video is over the upload limit of {limit} bytes").into());
            }
        }
        Ok(data)
    }
}
