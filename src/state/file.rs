//! Local JSON state store with optimistic versioning.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::fs;

use super::{StateStore, WatcherState};

/// One `{dir}/{key}.json` file per watcher. Saves go through a temp file
/// plus rename so a crashed invocation never leaves a half-written record,
/// and the on-disk version is checked first so two overlapping invocations
/// cannot silently clobber each other.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read_existing(path: &Path) -> Result<Option<WatcherState>> {
        match fs::read_to_string(path).await {
            Ok(s) => {
                let state = serde_json::from_str(&s)
                    .with_context(|| format!("parse state file {}", path.display()))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read state file {}", path.display())),
        }
    }
}

#[async_trait::async_trait]
impl StateStore for FileStore {
    async fn load(&self, key: &str) -> Result<WatcherState> {
        Ok(Self::read_existing(&self.path_for(key))
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, key: &str, state: &WatcherState) -> Result<()> {
        let path = self.path_for(key);

        // The engine bumps `version` once right after load, so the record on
        // disk must still carry the version we loaded. Anything newer means
        // an overlapping invocation won the race; give up rather than
        // overwrite its bookkeeping.
        if let Some(on_disk) = Self::read_existing(&path).await? {
            if on_disk.version >= state.version {
                bail!(
                    "state {key} changed by a concurrent writer (disk v{}, ours v{})",
                    on_disk.version,
                    state.version
                );
            }
        }

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create state dir {}", self.dir.display()))?;

        let tmp = self.dir.join(format!("{key}.json.tmp"));
        let body = serde_json::to_vec_pretty(state).context("encode state")?;
        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
