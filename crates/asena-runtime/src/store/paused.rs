//! Paused-chat sets.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use asena_core::{Jid, PausedChats, StoreResult};

use super::write_atomic;

/// Paused chats persisted as a JSON array of chat ids.
///
/// The file is read on first use and cached; every change rewrites it while
/// holding the cache lock, so concurrent pause/resume calls serialize.
#[derive(Debug)]
pub struct JsonPausedChats {
    path: PathBuf,
    cache: Mutex<Option<BTreeSet<Jid>>>,
}

impl JsonPausedChats {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> StoreResult<BTreeSet<Jid>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(BTreeSet::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        if data.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        let chats: Vec<Jid> = serde_json::from_str(&data)?;
        debug!(path = %self.path.display(), count = chats.len(), "Loaded paused chats");
        Ok(chats.into_iter().collect())
    }

    async fn write_file(&self, chats: &BTreeSet<Jid>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let list: Vec<&Jid> = chats.iter().collect();
        write_atomic(&self.path, serde_json::to_vec_pretty(&list)?).await
    }

    /// Applies `change` to the cached set and persists it when it reports a
    /// modification. The cache is only updated once the write succeeded.
    async fn modify(&self, change: impl FnOnce(&mut BTreeSet<Jid>) -> bool) -> StoreResult<bool> {
        let mut guard = self.cache.lock().await;
        let mut chats = match guard.as_ref() {
            Some(chats) => chats.clone(),
            None => self.read_file().await?,
        };
        let changed = change(&mut chats);
        if changed {
            self.write_file(&chats).await?;
        }
        *guard = Some(chats);
        Ok(changed)
    }
}

#[async_trait]
impl PausedChats for JsonPausedChats {
    async fn paused_chats(&self) -> StoreResult<Vec<Jid>> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_file().await?);
        }
        Ok(guard.iter().flatten().cloned().collect())
    }

    async fn is_paused(&self, chat: &Jid) -> StoreResult<bool> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_file().await?);
        }
        Ok(guard.as_ref().is_some_and(|chats| chats.contains(chat)))
    }

    async fn pause(&self, chat: &Jid) -> StoreResult<bool> {
        let chat = chat.clone();
        self.modify(move |chats| chats.insert(chat)).await
    }

    async fn resume(&self, chat: &Jid) -> StoreResult<bool> {
        self.modify(|chats| chats.remove(chat)).await
    }
}

/// Process-local paused chats, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryPausedChats {
    chats: RwLock<BTreeSet<Jid>>,
}

impl MemoryPausedChats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PausedChats for MemoryPausedChats {
    async fn paused_chats(&self) -> StoreResult<Vec<Jid>> {
        Ok(self.chats.read().iter().cloned().collect())
    }

    async fn is_paused(&self, chat: &Jid) -> StoreResult<bool> {
        Ok(self.chats.read().contains(chat))
    }

    async fn pause(&self, chat: &Jid) -> StoreResult<bool> {
        Ok(self.chats.write().insert(chat.clone()))
    }

    async fn resume(&self, chat: &Jid) -> StoreResult<bool> {
        Ok(self.chats.write().remove(chat))
    }
}
