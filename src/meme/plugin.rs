//! Meme commands.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};

use crate::chat::{ChatEvent, ImageRef, Plugin, Reply};
use crate::db::Database;
use crate::error::Result;

use super::images::{self, Template, TemplateStore};
use super::layout::MemeImage;
use super::request::{self, Background, MemeRequest};
use super::search::ImageFetcher;

const SEARCH_FAILED: &str = "사진 검색에 실패했습니다.";
const UPLOAD_MISSING: &str = "저장할 이미지를 찾을 수 없어요.\n\
- 이미지/링크가 있는 메세지에 답장해서 `!업로드`\n\
- 또는 `!업로드 https://...` 형태로 사용해주세요.";
const UPLOAD_SAVED: &str = "개인 이미지로 저장했어요! 이제 `!텍스트 내용`으로 사용할 수 있어요.";

pub struct MemePlugin {
    db: Arc<Database>,
    templates: TemplateStore,
    fetcher: Arc<dyn ImageFetcher>,
    tz: FixedOffset,
}

impl MemePlugin {
    pub fn new(
        db: Arc<Database>,
        templates: TemplateStore,
        fetcher: Arc<dyn ImageFetcher>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            db,
            templates,
            fetcher,
            tz,
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.fetcher.download(url).await?;
        images::ensure_image(&bytes)?;
        Ok(bytes)
    }

    /// Background for `!텍스트`; `None` when the search came back empty.
    async fn background(&self, event: &ChatEvent, background: &Background) -> Result<Option<Vec<u8>>> {
        match background {
            Background::Personal => {
                let personal = self
                    .db
                    .with_conn(|c| images::load_personal_image(c, event.sender.id))?;
                match personal {
                    Some(bytes) => Ok(Some(bytes)),
                    None => Ok(Some(self.templates.load(Template::Default).await?)),
                }
            }
            Background::Url(url) => Ok(Some(self.download(url).await?)),
            Background::Search(query) => match self.fetcher.search(query).await? {
                Some(url) => {
                    tracing::debug!("Search picked {}", url);
                    Ok(Some(self.download(&url).await?))
                }
                None => Ok(None),
            },
        }
    }

    async fn source_image(&self, image: &ImageRef) -> Result<Vec<u8>> {
        match image {
            ImageRef::Bytes(bytes) => {
                images::ensure_image(bytes)?;
                Ok(bytes.clone())
            }
            ImageRef::Url(url) => self.download(url).await,
        }
    }

    /// First image found: replied-to attachment, replied-to link, then a link
    /// in the command itself. Failed candidates fall through to the next one.
    async fn upload_candidate(&self, event: &ChatEvent) -> Option<Vec<u8>> {
        let mut urls = Vec::new();
        if let Some(source) = &event.source {
            if let Some(image) = &source.image {
                match self.source_image(image).await {
                    Ok(bytes) => return Some(bytes),
                    Err(e) => tracing::warn!("Replied-to image unusable: {}", e),
                }
            }
            urls.extend(request::extract_first_url(&source.text));
        }
        urls.extend(request::extract_first_url(&event.text));

        for url in urls {
            match self.download(&url).await {
                Ok(bytes) => return Some(bytes),
                Err(e) => tracing::warn!("Upload download failed for {}: {}", url, e),
            }
        }
        None
    }

    async fn upload(&self, event: &ChatEvent) -> Result<&'static str> {
        let Some(bytes) = self.upload_candidate(event).await else {
            return Ok(UPLOAD_MISSING);
        };
        let now = Utc::now().with_timezone(&self.tz);
        self.db
            .with_conn(|c| images::save_personal_image(c, event.sender.id, &bytes, now))?;
        tracing::info!(sender = event.sender.id, bytes = bytes.len(), "Saved personal image");
        Ok(UPLOAD_SAVED)
    }
}

#[async_trait]
impl Plugin for MemePlugin {
    fn name(&self) -> &str {
        "meme"
    }

    async fn handle(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<bool> {
        let Some(request) = request::parse(event.command(), event.param()) else {
            return Ok(false);
        };

        let image = match request {
            MemeRequest::Usage(usage) => {
                reply.reply_text(usage).await?;
                return Ok(true);
            }
            MemeRequest::Upload(_) => {
                reply.reply_text(self.upload(event).await?).await?;
                return Ok(true);
            }
            MemeRequest::Caption { background, text } => {
                match self.background(event, &background).await? {
                    Some(bytes) => MemeImage::caption(bytes, &text),
                    None => {
                        reply.reply_text(SEARCH_FAILED).await?;
                        return Ok(true);
                    }
                }
            }
            MemeRequest::CaptionSource(text) => {
                let Some(image) = event.source.as_ref().and_then(|s| s.image.as_ref()) else {
                    tracing::debug!("!텍스트추가 without a replied-to image");
                    return Ok(true);
                };
                MemeImage::caption(self.source_image(image).await?, &text)
            }
            MemeRequest::Parrot(text) => MemeImage::caption(self.templates.load(Template::Parrot).await?, &text),
            MemeRequest::Stop(text) => MemeImage::caption(self.templates.load(Template::Stop).await?, &text),
            MemeRequest::Erase(text) => MemeImage::erase(self.templates.load(Template::Erase).await?, &text),
            MemeRequest::Proceed(text) => MemeImage::proceed(self.templates.load(Template::Proceed).await?, &text),
            MemeRequest::Retort { top, bottom } => {
                MemeImage::retort(self.templates.load(Template::Retort).await?, &top, &bottom)
            }
        };

        reply.reply_image(image).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::RecordingReply;
    use crate::chat::{Sender, SourceMessage};
    use crate::error::Error;
    use crate::meme::layout::{Anchor, Color};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const JPEG: &[u8] = b"\xff\xd8\xffdata";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\ndata";

    #[derive(Default)]
    struct FakeFetcher {
        results: HashMap<String, String>,
        files: HashMap<String, Vec<u8>>,
        downloads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn search(&self, query: &str) -> Result<Option<String>> {
            Ok(self.results.get(query).cloned())
        }

        async fn download(&self, url: &str) -> Result<Vec<u8>> {
            self.downloads.lock().unwrap().push(url.to_string());
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Image(format!("404 {}", url)))
        }
    }

    struct Fixture {
        _dir: TempDir,
        plugin: MemePlugin,
        fetcher: Arc<FakeFetcher>,
    }

    fn fixture(fetcher: FakeFetcher) -> Fixture {
        let dir = TempDir::new().unwrap();
        for template in ["default.jpg", "parrot.jpg", "stop.jpg", "gogo.png", "rmrf.jpg", "sungmo.jpeg"] {
            std::fs::write(dir.path().join(template), JPEG).unwrap();
        }
        let fetcher = Arc::new(fetcher);
        let plugin = MemePlugin::new(
            Arc::new(Database::open_in_memory().unwrap()),
            TemplateStore::new(dir.path()),
            fetcher.clone(),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        );
        Fixture {
            _dir: dir,
            plugin,
            fetcher,
        }
    }

    fn ev(text: &str) -> ChatEvent {
        ChatEvent::new(1, Sender::new(7, "철수"), text)
    }

    #[tokio::test]
    async fn caption_on_default_then_personal_image() {
        let mut fetcher = FakeFetcher::default();
        fetcher.files.insert("https://img/a.png".to_string(), PNG.to_vec());
        let f = fixture(fetcher);
        let reply = RecordingReply::default();

        assert!(f.plugin.handle(&ev("!텍스트 안녕::ff0000"), &reply).await.unwrap());
        let image = &reply.images()[0];
        assert_eq!(image.background, JPEG.to_vec());
        assert_eq!(image.layers[0].text, "안녕");
        assert_eq!(image.layers[0].fill, Color(255, 0, 0));

        f.plugin.handle(&ev("!업로드 https://img/a.png"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), UPLOAD_SAVED);

        f.plugin.handle(&ev("!텍스트 두번째"), &reply).await.unwrap();
        assert_eq!(reply.images()[1].background, PNG.to_vec());
    }

    #[tokio::test]
    async fn search_failure_is_reported() {
        let mut fetcher = FakeFetcher::default();
        fetcher.results.insert("고양이".to_string(), "https://img/cat.jpg".to_string());
        fetcher.files.insert("https://img/cat.jpg".to_string(), JPEG.to_vec());
        let f = fixture(fetcher);
        let reply = RecordingReply::default();

        f.plugin.handle(&ev("!사진 강아지"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), SEARCH_FAILED);
        assert!(reply.images().is_empty());

        f.plugin.handle(&ev("!텍스트 검색##고양이##냥"), &reply).await.unwrap();
        assert_eq!(reply.images()[0].layers[0].text, "냥");
    }

    #[tokio::test]
    async fn non_image_download_is_an_error() {
        let mut fetcher = FakeFetcher::default();
        fetcher.files.insert("https://x/page".to_string(), b"<html>".to_vec());
        let f = fixture(fetcher);
        let reply = RecordingReply::default();

        let result = f.plugin.handle(&ev("!텍스트 https://x/page##문구"), &reply).await;
        assert!(matches!(result, Err(Error::Image(_))));
        assert!(reply.images().is_empty());
    }

    #[tokio::test]
    async fn template_commands() {
        let f = fixture(FakeFetcher::default());
        let reply = RecordingReply::default();

        f.plugin.handle(&ev("!말대꾸 위"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), request::RETORT_USAGE);

        f.plugin.handle(&ev("!말대꾸 위##아래"), &reply).await.unwrap();
        f.plugin.handle(&ev("!진행 가자"), &reply).await.unwrap();
        let images = reply.images();
        assert_eq!(images[0].layers.len(), 2);
        assert_eq!(images[0].layers[1].text, "아래");
        assert_eq!(images[1].layers[0].anchor, Anchor::MiddleLeft { x: 20, dy: -70 });

        assert!(!f.plugin.handle(&ev("/파티 10"), &reply).await.unwrap());
    }

    #[tokio::test]
    async fn upload_priority_and_fallthrough() {
        let mut fetcher = FakeFetcher::default();
        fetcher.files.insert("https://cmd/ok.jpg".to_string(), JPEG.to_vec());
        let f = fixture(fetcher);
        let reply = RecordingReply::default();

        let event = ev("!업로드 https://cmd/ok.jpg").with_source(SourceMessage {
            text: "여기 https://src/missing.jpg".to_string(),
            image: None,
        });
        f.plugin.handle(&event, &reply).await.unwrap();
        assert_eq!(reply.last_text(), UPLOAD_SAVED);
        assert_eq!(
            *f.fetcher.downloads.lock().unwrap(),
            vec!["https://src/missing.jpg".to_string(), "https://cmd/ok.jpg".to_string()]
        );

        let attached = ev("!업로드").with_source(SourceMessage {
            text: String::new(),
            image: Some(ImageRef::Bytes(PNG.to_vec())),
        });
        f.plugin.handle(&attached, &reply).await.unwrap();
        assert_eq!(reply.last_text(), UPLOAD_SAVED);

        f.plugin.handle(&ev("!업로드"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), UPLOAD_MISSING);
    }

    #[tokio::test]
    async fn caption_replied_image() {
        let f = fixture(FakeFetcher::default());
        let reply = RecordingReply::default();

        assert!(f.plugin.handle(&ev("!텍스트추가 문구"), &reply).await.unwrap());
        assert!(reply.images().is_empty());

        let event = ev("!텍스트추가 문구").with_source(SourceMessage {
            text: String::new(),
            image: Some(ImageRef::Bytes(PNG.to_vec())),
        });
        f.plugin.handle(&event, &reply).await.unwrap();
        assert_eq!(reply.images()[0].background, PNG.to_vec());
    }
}
