//! Configuration file watcher for hot reload.
//!
//! Every change notification for the file re-reads it. Content identical to
//! the last read is dropped, since editors emit several events per save.
//! Anything else is parsed and validated, and the result is forwarded even
//! when it failed, so the reload loop owns logging and counting outcomes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::MatcherConfig;

/// One reload attempt: a validated config or the reason it was rejected.
pub type ConfigUpdate = Result<MatcherConfig, ConfigError>;

/// Turns raw file contents into updates, skipping unchanged repeats.
#[derive(Debug, Default)]
pub struct ReloadFilter {
    last: Option<String>,
}

impl ReloadFilter {
    /// Start from the contents the running config was loaded from.
    pub fn seeded(content: Option<String>) -> Self {
        Self { last: content }
    }

    pub fn update(&mut self, content: String) -> Option<ConfigUpdate> {
        if self.last.as_deref() == Some(content.as_str()) {
            return None;
        }
        let update = parse_config(&content);
        self.last = Some(content);
        Some(update)
    }
}

/// Watches one configuration file and streams reload attempts.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ConfigUpdate>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Events are handled on notify's own thread; keep the
    /// returned watcher alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let mut filter = ReloadFilter::seeded(fs::read_to_string(&path).ok());
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &watched) => {
                    let update = match fs::read_to_string(&watched) {
                        Ok(content) => filter.update(content),
                        Err(e) => Some(Err(ConfigError::Io(e))),
                    };
                    if let Some(update) = update {
                        tracing::debug!(path = ?watched, "Config file changed");
                        let _ = update_tx.send(update);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == path.file_name())
}
