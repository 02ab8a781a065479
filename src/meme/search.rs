//! Image search and download.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;

use crate::config::MemeConfig;
use crate::error::{Error, Result};

const SEARCH_URL: &str = "https://openapi.naver.com/v1/search/image";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Source of background images.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// A usable image link for `query`, or `None` when nothing acceptable came back.
    async fn search(&self, query: &str) -> Result<Option<String>>;

    /// Raw bytes behind `url`.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    link: String,
}

/// Naver image search API plus a plain HTTP downloader.
pub struct NaverImages {
    client: Client,
    client_id: String,
    client_secret: String,
    disallowed: Vec<String>,
}

impl NaverImages {
    pub fn new(config: &MemeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        if config.naver_client_id.is_none() || config.naver_client_secret.is_none() {
            tracing::warn!("Naver credentials missing, image search will fail");
        }
        Ok(Self {
            client,
            client_id: config.naver_client_id.clone().unwrap_or_default(),
            client_secret: config.naver_client_secret.clone().unwrap_or_default(),
            disallowed: config.disallowed_substrings.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Drop links containing any disallowed substring, then pick one at random.
pub fn pick_link<R: Rng + ?Sized>(links: Vec<String>, disallowed: &[String], rng: &mut R) -> Option<String> {
    let allowed: Vec<String> = links
        .into_iter()
        .filter(|link| !disallowed.iter().any(|bad| link.contains(bad.as_str())))
        .collect();
    allowed.choose(rng).cloned()
}

/// The same URL with a `jpg` suffix swapped for `png` or the other way round.
pub fn swapped_extension(url: &str) -> Option<String> {
    let lower = url.to_ascii_lowercase();
    let stem = url.get(..url.len().checked_sub(3)?)?;
    if lower.ends_with("jpg") {
        Some(format!("{}png", stem))
    } else if lower.ends_with("png") {
        Some(format!("{}jpg", stem))
    } else {
        None
    }
}

#[async_trait]
impl ImageFetcher for NaverImages {
    async fn search(&self, query: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(SEARCH_URL)
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .query(&[("query", query), ("display", "20")])
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResponse = response.json().await?;
        let links = body.items.into_iter().map(|item| item.link).collect();
        let picked = pick_link(links, &self.disallowed, &mut rand::rng());
        tracing::debug!(query, link = ?picked, "Image search finished");
        Ok(picked)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        match self.get(url).await {
            Ok(bytes) => Ok(bytes),
            Err(first) => {
                let Some(alt) = swapped_extension(url) else {
                    return Err(first);
                };
                tracing::debug!("Download of {} failed ({}), trying {}", url, first, alt);
                self.get(&alt)
                    .await
                    .map_err(|e| Error::Image(format!("download failed: {} / {}", url, e)))
            }
        }
    }
}
