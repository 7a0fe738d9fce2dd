//! `tip`: random tech tips from a URL or a local file.
//!
//! The list is fetched once at startup and cached; `tip reload` fetches it
//! again. `tip add <text>` appends to the cached list only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use tracing::{info, warn};

use hexbot::core::RoleId;
use hexbot::framework::{Command, CommandDescriptor, CommandError, CommandResult, InvocationContext};

const OUT_OF_TIPS: &str = "Sorry, I'm plumb out of knowledge to share :(";
const EMPTY_TIP: &str =
    "Hrm... That tip is very... Informative? Try again, but this time, specify a tip :)";
const RELOAD_FAILED: &str = "Something went wrong when reloading the tips... Try again later?";
const EDITORS_ONLY: &str = "Only tip editors can do that.";

/// `[commands.tip]` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TipSettings {
    /// An `http(s)://` URL or a file path with one tip per line.
    #[serde(default)]
    pub source: Option<String>,
    /// Roles allowed to `add` and `reload`. Empty means anyone.
    #[serde(default)]
    pub editor_roles: Vec<RoleId>,
}

/// Where the tip list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipSource {
    None,
    Url(String),
    File(PathBuf),
}

impl TipSource {
    pub fn parse(source: Option<&str>) -> Self {
        match source.map(str::trim) {
            None | Some("") => Self::None,
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => {
                Self::Url(s.to_string())
            }
            Some(s) => Self::File(PathBuf::from(s)),
        }
    }
}

/// Cached tips plus the client used to refresh them.
pub struct TipStore {
    source: TipSource,
    client: Client,
    tips: RwLock<Vec<String>>,
}

impl TipStore {
    /// Creates an empty store. HTTP fetches give up after `timeout`.
    pub fn new(source: TipSource, timeout: Duration) -> reqwest::Result<Self> {
        let client = ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self {
            source,
            client,
            tips: RwLock::new(Vec::new()),
        })
    }

    /// Replaces the cached list with a fresh copy from the source.
    ///
    /// On failure the previous list is kept.
    pub async fn reload(&self) -> CommandResult<usize> {
        let body = match &self.source {
            TipSource::None => {
                info!("No tips source configured, skipping load");
                return Ok(0);
            }
            TipSource::Url(url) => self.fetch(url).await?,
            TipSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| CommandError::upstream("tips", e))?,
        };

        let tips = parse_tips(&body);
        let count = tips.len();
        *self.tips.write() = tips;
        info!(count, "Tips loaded");
        Ok(count)
    }

    async fn fetch(&self, url: &str) -> CommandResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CommandError::upstream("tips", e))?;
        response
            .text()
            .await
            .map_err(|e| CommandError::upstream("tips", e))
    }

    /// Picks a tip at random.
    pub fn random(&self) -> Option<String> {
        let tips = self.tips.read();
        if tips.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..tips.len());
        Some(tips[index].clone())
    }

    /// Appends a tip, returning the new count.
    pub fn add(&self, tip: impl Into<String>) -> usize {
        let mut tips = self.tips.write();
        tips.push(tip.into());
        tips.len()
    }

    pub fn len(&self) -> usize {
        self.tips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tips.read().is_empty()
    }
}

fn parse_tips(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The `tip` command.
pub struct Tip {
    store: Arc<TipStore>,
    editor_roles: Vec<RoleId>,
}

impl Tip {
    pub fn new(store: Arc<TipStore>, editor_roles: Vec<RoleId>) -> Self {
        Self {
            store,
            editor_roles,
        }
    }

    fn is_editor(&self, ctx: &InvocationContext) -> bool {
        self.editor_roles.is_empty()
            || self
                .editor_roles
                .iter()
                .any(|role| ctx.user_roles().contains(role))
    }
}

#[async_trait]
impl Command for Tip {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("tip", "Shares a random tech tip")
    }

    async fn init(&self) -> CommandResult<()> {
        self.store.reload().await.map(|_| ())
    }

    async fn handle(&self, ctx: &InvocationContext) -> CommandResult<()> {
        let sub = ctx.arg(0).map(str::to_lowercase);
        match sub.as_deref() {
            None => {
                let tip = self.store.random();
                ctx.send(tip.as_deref().unwrap_or(OUT_OF_TIPS)).await?;
            }
            Some("add") => {
                if !self.is_editor(ctx) {
                    ctx.send(EDITORS_ONLY).await?;
                    return Ok(());
                }
                let tip = ctx.rest(1);
                if tip.is_empty() {
                    ctx.send(EMPTY_TIP).await?;
                    return Ok(());
                }
                let count = self.store.add(tip);
                ctx.send(format!("Tip added, {count} in rotation")).await?;
            }
            Some("reload") => {
                if !self.is_editor(ctx) {
                    ctx.send(EDITORS_ONLY).await?;
                    return Ok(());
                }
                match self.store.reload().await {
                    Ok(count) => {
                        ctx.send(format!("Tips successfully reloaded ({count})")).await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "Tip reload failed");
                        ctx.send(RELOAD_FAILED).await?;
                    }
                }
            }
            Some(other) => {
                ctx.send(format!(
                    "Unknown tip action `{other}`. Try `{prefix}tip`, `{prefix}tip add <text>` or `{prefix}tip reload`",
                    prefix = ctx.prefix()
                ))
                .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use hexbot::core::MessageEvent;
    use hexbot::core::testing::RecordingGateway;
    use hexbot::framework::Router;

    use super::*;

    fn store(source: TipSource) -> Arc<TipStore> {
        Arc::new(TipStore::new(source, Duration::from_secs(1)).unwrap())
    }

    fn tips_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "hexbot-tips-{}-{}.txt",
            std::process::id(),
            rand::rng().random::<u32>()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(TipSource::parse(None), TipSource::None);
        assert_eq!(TipSource::parse(Some("  ")), TipSource::None);
        assert_eq!(
            TipSource::parse(Some("https://example.com/tips.txt")),
            TipSource::Url("https://example.com/tips.txt".into())
        );
        assert_eq!(
            TipSource::parse(Some("tips.txt")),
            TipSource::File(PathBuf::from("tips.txt"))
        );
    }

    #[test]
    fn test_parse_tips_skips_blank_lines() {
        assert_eq!(parse_tips("one\n\n  two  \n"), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_reload_from_file() {
        let path = tips_file("first\nsecond\n");
        let store = store(TipSource::File(path.clone()));

        assert_eq!(store.reload().await.unwrap(), 2);
        assert!(store.random().is_some());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_tips() {
        let store = store(TipSource::File(PathBuf::from("/nonexistent/tips.txt")));
        store.add("kept");

        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, CommandError::Upstream { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_message() {
        let gateway = RecordingGateway::new();
        let router = Router::new(gateway.clone())
            .command(Tip::new(store(TipSource::None), Vec::new()))
            .unwrap();

        router
            .dispatch(MessageEvent::new("1", "general", "alice", "!tip"))
            .await;
        assert_eq!(gateway.texts(), vec![OUT_OF_TIPS]);
    }

    #[tokio::test]
    async fn test_add_requires_editor_role() {
        let gateway = RecordingGateway::new();
        let tips = store(TipSource::None);
        let router = Router::new(gateway.clone())
            .command(Tip::new(tips.clone(), vec![RoleId::from("moderator")]))
            .unwrap();

        router
            .dispatch(MessageEvent::new("1", "general", "alice", "!tip add use git bisect"))
            .await;
        assert!(tips.is_empty());

        router
            .dispatch(
                MessageEvent::new("2", "general", "bob", "!tip add use git bisect")
                    .with_roles(["moderator"]),
            )
            .await;
        assert_eq!(tips.random().as_deref(), Some("use git bisect"));
        assert_eq!(
            gateway.texts(),
            vec![EDITORS_ONLY, "Tip added, 1 in rotation"]
        );
    }

    #[tokio::test]
    async fn test_add_without_text() {
        let gateway = RecordingGateway::new();
        let router = Router::new(gateway.clone())
            .command(Tip::new(store(TipSource::None), Vec::new()))
            .unwrap();

        router
            .dispatch(MessageEvent::new("1", "general", "alice", "!tip add"))
            .await;
        assert_eq!(gateway.texts(), vec![EMPTY_TIP]);
    }

    #[tokio::test]
    async fn test_reload_failure_is_reported_politely() {
        let gateway = RecordingGateway::new();
        let router = Router::new(gateway.clone())
            .command(Tip::new(
                store(TipSource::File(PathBuf::from("/nonexistent/tips.txt"))),
                Vec::new(),
            ))
            .unwrap();

        router
            .dispatch(MessageEvent::new("1", "general", "alice", "!tip reload"))
            .await;
        assert_eq!(gateway.texts(), vec![RELOAD_FAILED]);
    }
}
