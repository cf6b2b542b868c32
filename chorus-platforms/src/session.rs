//! Platform session lifecycle.
//!
//! A [`Session`] drives one platform's scraping context through a uniform
//! state machine (open a page, build the API client, authenticate, search,
//! enrich with comments, release) regardless of how different the platform
//! APIs underneath are. The platform-specific part is a [`PlatformAdapter`],
//! a closed set of seven implementations dispatched statically by
//! [`Platform`].

use crate::pacer::Pacer;
use crate::{bilibili, douyin, kuaishou, tieba, weibo, xiaohongshu, zhihu};
use anyhow::bail;
use async_trait::async_trait;
use chorus_browser::{BrowserHandle, LoginFlow, Page};
use chorus_common::model::{CommentItem, ContentExtra, ContentItem};
use chorus_common::{ChorusConfig, ChorusError, Platform};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle states of a platform session.
///
/// `Failed` is absorbing: a session that failed to initialize never becomes
/// eligible for searching and only leaves the state through cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Searching,
    EnrichingComments,
    Closing,
    Closed,
    Failed,
}

/// Capability interface implemented once per platform.
///
/// Adapters own their API client (built from the live page's cookies and
/// user agent) and map raw platform shapes into the normalized model. The
/// generic lifecycle (page management, login polling, capping, pacing,
/// comment enrichment) lives in [`Session`].
#[async_trait]
pub trait PlatformAdapter: Send {
    fn platform(&self) -> Platform;

    /// Home page navigated to before the client is built, so the session
    /// picks up the platform's cookies.
    fn index_url(&self) -> &'static str;

    /// Build the platform API client from the page's identity.
    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> anyhow::Result<()>;

    /// Lightweight authenticated ping against the platform API.
    async fn check_login(&self) -> anyhow::Result<bool>;

    /// Re-harvest cookies into the client after the browser state changed
    /// (interactive login progressed, cookies were imported).
    async fn refresh_auth(&mut self, page: &Page) -> anyhow::Result<()>;

    /// Keyword search mapped into at most `max_contents` normalized items,
    /// in the platform's native result order. Individually malformed hits
    /// are skipped with a warning, not fatal.
    async fn search(
        &mut self,
        keyword: &str,
        max_contents: usize,
        pacer: &Pacer,
    ) -> anyhow::Result<Vec<ContentItem>>;

    /// Top comments for one item, at most `cap`.
    async fn comments(
        &mut self,
        extra: &ContentExtra,
        cap: usize,
        pacer: &Pacer,
    ) -> anyhow::Result<Vec<CommentItem>>;
}

/// One platform's live scraping context, from authentication to cleanup.
pub struct Session {
    adapter: Box<dyn PlatformAdapter>,
    config: ChorusConfig,
    pacer: Pacer,
    state: SessionState,
    page: Option<Page>,
}

impl Session {
    /// Build the session for a canonical platform. No external resource is
    /// touched until [`initialize`](Session::initialize).
    pub fn create(platform: Platform, config: ChorusConfig) -> Self {
        let adapter: Box<dyn PlatformAdapter> = match platform {
            Platform::Bilibili => Box::new(bilibili::BilibiliAdapter::new()),
            Platform::Douyin => Box::new(douyin::DouyinAdapter::new()),
            Platform::Xiaohongshu => Box::new(xiaohongshu::XiaohongshuAdapter::new()),
            Platform::Weibo => Box::new(weibo::WeiboAdapter::new()),
            Platform::Zhihu => Box::new(zhihu::ZhihuAdapter::new()),
            Platform::Tieba => Box::new(tieba::TiebaAdapter::new()),
            Platform::Kuaishou => Box::new(kuaishou::KuaishouAdapter::new()),
        };
        Self::with_adapter(adapter, config)
    }

    pub(crate) fn with_adapter(adapter: Box<dyn PlatformAdapter>, config: ChorusConfig) -> Self {
        let pacer = Pacer::from_secs(config.crawl_interval);
        Self {
            adapter,
            config,
            pacer,
            state: SessionState::Uninitialized,
            page: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.adapter.platform()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Acquire a page on the shared browser, build the API client, and make
    /// sure we are authenticated. Failure moves the session to `Failed` and
    /// releases the page.
    pub async fn initialize(&mut self, browser: &BrowserHandle) -> chorus_common::Result<()> {
        match self.state {
            SessionState::Uninitialized => {}
            SessionState::Ready => return Ok(()),
            state => {
                return Err(ChorusError::Init {
                    platform: self.platform(),
                    message: format!("session not initializable from {state:?}"),
                })
            }
        }

        self.state = SessionState::Initializing;
        tracing::info!(platform = %self.platform(), "initializing session");

        let mut page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(ChorusError::Init {
                    platform: self.platform(),
                    message: e.to_string(),
                });
            }
        };

        match self.init_on_page(&page).await {
            Ok(()) => {
                self.page = Some(page);
                self.state = SessionState::Ready;
                tracing::info!(platform = %self.platform(), "session ready");
                Ok(())
            }
            Err(e) => {
                // Scoped acquisition: the page never outlives a failed init.
                if let Err(close_err) = page.close().await {
                    tracing::warn!(platform = %self.platform(), error = %close_err,
                        "failed to close page after init failure");
                }
                self.state = SessionState::Failed;
                tracing::error!(platform = %self.platform(), error = %e, "initialization failed");
                Err(ChorusError::Init {
                    platform: self.platform(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn init_on_page(&mut self, page: &Page) -> anyhow::Result<()> {
        page.goto(self.adapter.index_url()).await?;
        self.adapter.init_client(page, &self.config).await?;

        if self.adapter.check_login().await.unwrap_or(false) {
            return Ok(());
        }

        let flow = LoginFlow::new(
            self.config.login_mode,
            self.config.cookies.clone(),
            Duration::from_secs(self.config.login_timeout),
        );
        flow.prepare(page).await?;
        self.adapter.refresh_auth(page).await?;

        if self.adapter.check_login().await.unwrap_or(false) {
            return Ok(());
        }
        if !flow.is_interactive() {
            bail!("imported cookies are not authenticated");
        }

        // Interactive login: poll until the user finishes or the deadline
        // passes, refreshing harvested cookies between probes.
        let deadline = Instant::now() + flow.timeout;
        loop {
            tokio::time::sleep(flow.poll_interval()).await;
            self.adapter.refresh_auth(page).await?;
            if self.adapter.check_login().await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("login did not complete within {:?}", flow.timeout);
            }
        }
    }

    /// Search, then attach comments to every item that can take them. This is
    /// the only search entry point the orchestrator calls.
    pub async fn search_with_comments(
        &mut self,
        keyword: &str,
    ) -> chorus_common::Result<Vec<ContentItem>> {
        if self.state != SessionState::Ready {
            return Err(ChorusError::Search {
                platform: self.platform(),
                message: format!("session not ready (state {:?})", self.state),
            });
        }

        let max_contents = self.config.limits.max_contents;
        self.state = SessionState::Searching;
        let searched = self
            .adapter
            .search(keyword, max_contents, &self.pacer)
            .await;
        self.state = SessionState::Ready;

        let mut items = searched.map_err(|e| ChorusError::Search {
            platform: self.platform(),
            message: e.to_string(),
        })?;
        items.truncate(max_contents);

        let cap = self.config.limits.comment_cap(self.platform());
        self.state = SessionState::EnrichingComments;
        enrich_comments(self.adapter.as_mut(), &mut items, cap, &self.pacer).await;
        self.state = SessionState::Ready;

        Ok(items)
    }

    /// Release the page. Idempotent: closing a closed or never-opened
    /// session is a no-op and never an error.
    pub async fn cleanup(&mut self) {
        self.state = SessionState::Closing;
        if let Some(mut page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!(platform = %self.platform(), error = %e, "error during cleanup");
            }
        }
        self.state = SessionState::Closed;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("platform", &self.adapter.platform())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Attach comments to each item in order. A per-item failure keeps that
/// item's comments empty and moves on; items without continuation data are
/// skipped silently.
async fn enrich_comments(
    adapter: &mut dyn PlatformAdapter,
    items: &mut [ContentItem],
    cap: usize,
    pacer: &Pacer,
) {
    for item in items.iter_mut() {
        let Some(extra) = item.extra.clone() else {
            continue;
        };
        pacer.wait().await;
        match adapter.comments(&extra, cap, pacer).await {
            Ok(mut comments) => {
                comments.truncate(cap);
                item.comments = comments;
            }
            Err(e) => {
                tracing::warn!(
                    platform = %adapter.platform(),
                    content_id = extra.content_id(),
                    error = %e,
                    "comment fetch failed, keeping item without comments"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::model::ContentType;

    struct FakeAdapter {
        raw_hits: usize,
        fail_comments_for: Vec<String>,
        comments_per_item: usize,
    }

    impl FakeAdapter {
        fn new(raw_hits: usize, comments_per_item: usize) -> Self {
            Self {
                raw_hits,
                fail_comments_for: Vec::new(),
                comments_per_item,
            }
        }

        fn item(&self, idx: usize) -> ContentItem {
            ContentItem {
                platform: Platform::Bilibili,
                content_type: ContentType::Video,
                title: format!("video {idx}"),
                content: String::new(),
                url: format!("https://www.bilibili.com/video/av{idx}"),
                publish_time: String::new(),
                like_count: 0,
                comment_count: 0,
                share_count: 0,
                view_count: 0,
                comments: Vec::new(),
                extra: if idx == 0 {
                    None // first hit has no continuation data
                } else {
                    Some(ContentExtra::Bilibili {
                        aid: idx.to_string(),
                        bvid: format!("BV{idx}"),
                    })
                },
            }
        }
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn platform(&self) -> Platform {
            Platform::Bilibili
        }
        fn index_url(&self) -> &'static str {
            "https://example.invalid"
        }
        async fn init_client(&mut self, _: &Page, _: &ChorusConfig) -> anyhow::Result<()> {
            Ok(())
        }
        async fn check_login(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn refresh_auth(&mut self, _: &Page) -> anyhow::Result<()> {
            Ok(())
        }
        async fn search(
            &mut self,
            _keyword: &str,
            max_contents: usize,
            _pacer: &Pacer,
        ) -> anyhow::Result<Vec<ContentItem>> {
            // Deliberately return more than the cap; the session truncates.
            Ok((0..self.raw_hits.min(max_contents * 2))
                .map(|i| self.item(i))
                .collect())
        }
        async fn comments(
            &mut self,
            extra: &ContentExtra,
            cap: usize,
            _pacer: &Pacer,
        ) -> anyhow::Result<Vec<CommentItem>> {
            if self.fail_comments_for.contains(&extra.content_id().to_string()) {
                anyhow::bail!("comment endpoint exploded");
            }
            Ok((0..self.comments_per_item.min(cap * 2))
                .map(|i| CommentItem {
                    content: format!("comment {i}"),
                    like_count: i as u64,
                    create_time: String::new(),
                    is_reply: false,
                })
                .collect())
        }
    }

    fn test_config() -> ChorusConfig {
        ChorusConfig {
            crawl_interval: 0.0,
            ..ChorusConfig::default()
        }
    }

    fn ready_session(adapter: FakeAdapter) -> Session {
        let mut session = Session::with_adapter(Box::new(adapter), test_config());
        session.state = SessionState::Ready;
        session
    }

    #[tokio::test]
    async fn search_caps_items_and_preserves_order() {
        let mut session = ready_session(FakeAdapter::new(15, 3));
        let items = session.search_with_comments("rust").await.unwrap();
        assert_eq!(items.len(), 8);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.title, format!("video {i}"));
        }
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn comments_are_capped_per_platform() {
        let mut session = ready_session(FakeAdapter::new(3, 50));
        let items = session.search_with_comments("rust").await.unwrap();
        for item in items.iter().filter(|i| i.extra.is_some()) {
            assert_eq!(item.comments.len(), 10); // bilibili cap
        }
    }

    #[tokio::test]
    async fn items_without_extra_keep_empty_comments() {
        let mut session = ready_session(FakeAdapter::new(3, 5));
        let items = session.search_with_comments("rust").await.unwrap();
        assert!(items[0].extra.is_none());
        assert!(items[0].comments.is_empty());
        assert!(!items[1].comments.is_empty());
    }

    #[tokio::test]
    async fn one_comment_failure_does_not_abort_enrichment() {
        let mut adapter = FakeAdapter::new(4, 5);
        adapter.fail_comments_for = vec!["1".to_string()];
        let mut session = ready_session(adapter);
        let items = session.search_with_comments("rust").await.unwrap();

        // Item 1 failed: empty comments. Items 2 and 3 still enriched.
        assert!(items[1].comments.is_empty());
        assert!(!items[2].comments.is_empty());
        assert!(!items[3].comments.is_empty());
    }

    #[tokio::test]
    async fn searching_an_uninitialized_session_is_an_error() {
        let mut session = Session::with_adapter(Box::new(FakeAdapter::new(1, 1)), test_config());
        let err = session.search_with_comments("rust").await.unwrap_err();
        assert!(matches!(err, ChorusError::Search { .. }));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let mut session = Session::with_adapter(Box::new(FakeAdapter::new(1, 1)), test_config());
        session.cleanup().await;
        assert_eq!(session.state(), SessionState::Closed);
        session.cleanup().await;
        assert_eq!(session.state(), SessionState::Closed);
    }
}
