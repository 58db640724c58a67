use reqwest::{header, Method};
use url::Url;

use super::BiliClient;

static SHORT_LINK_DOMAINS: [&str; 2] = ["b23.tv", "bili2233.cn"];

pub trait ShortLinkExpander {
    /// Follow redirects to the final URL. Falls back to `url` itself when anything goes wrong.
    async fn expand(&self, url: &str) -> String;
}

pub fn is_short_link(url: &str) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_owned)) else {
        return false;
    };
    SHORT_LINK_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

impl ShortLinkExpander for BiliClient {
    async fn expand(&self, url: &str) -> String {
        // HEAD is enough to see where the redirects end, some servers only answer GET though
        for method in [Method::HEAD, Method::GET] {
            match self.final_url(method.clone(), url).await {
                Ok(expanded) => {
                    tracing::debug!("Expanded {url} to {expanded}");
                    return expanded;
                }
                Err(e) => tracing::debug!("{method} {url} failed: {e}"),
            }
        }
        tracing::warn!("Could not expand short link {url}, using it as is");
        url.to_owned()
    }
}

impl BiliClient {
    async fn final_url(&self, method: Method, url: &str) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .request(method, url)
            .header(header::USER_AGENT, super::USER_AGENT)
            .timeout(self.expand_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.url().as_str().to_owned())
    }
}
