//! Configuration File Watcher
//!
//! Reloads the configuration when its file changes and publishes the player
//! identity. Serial and table settings need a restart.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::loader::ConfigLoader;
use super::settings::PlayerConfig;

/// Editors write in bursts; wait for them to settle
const SETTLE: Duration = Duration::from_millis(200);

pub struct ConfigWatcher {
    path: PathBuf,
    identity: watch::Sender<PlayerConfig>,
    rx: mpsc::Receiver<()>,
    /// Kept alive for as long as the watcher runs
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch `path`. The parent directory is watched so that files replaced
    /// by rename are still seen.
    pub fn new(path: impl AsRef<Path>, identity: watch::Sender<PlayerConfig>) -> Result<Self, notify::Error> {
        let path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path.file_name().map(OsString::from);
        let (tx, rx) = mpsc::channel(1);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if is_relevant(&event, file_name.as_deref()) {
                    // a pending reload already covers this change
                    let _ = tx.try_send(());
                }
            }
            Err(e) => error!("Config watcher error: {}", e),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching configuration: {}", path.display());

        Ok(Self {
            path,
            identity,
            rx,
            _watcher: watcher,
        })
    }

    /// Run until the watcher is dropped
    pub async fn run(mut self) {
        while self.rx.recv().await.is_some() {
            tokio::time::sleep(SETTLE).await;
            while self.rx.try_recv().is_ok() {}
            self.reload();
        }
        debug!("Config watcher stopped");
    }

    /// Reload the file and publish the identity if it changed.
    /// Returns whether the identity changed.
    pub fn reload(&self) -> bool {
        let config = match ConfigLoader::load(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Keeping current configuration; reload failed: {}", e);
                return false;
            }
        };

        let player = config.player;
        let changed = self.identity.send_if_modified(|current| {
            if *current == player {
                false
            } else {
                *current = player.clone();
                true
            }
        });
        if changed {
            info!(
                player_id = %player.player_id,
                hall = %player.hall,
                location = %player.location,
                "Player identity updated"
            );
        } else {
            debug!("Configuration reloaded; identity unchanged");
        }
        changed
    }
}

fn is_relevant(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == file_name)
}
