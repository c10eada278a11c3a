//! Session credential stores.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, trace};

use asena_core::{SessionStore, StoreResult};

use super::write_atomic;

const CREDS_FILE: &str = "creds.json";

/// Keeps credentials in `<dir>/creds.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_creds(&self) -> StoreResult<Option<Value>> {
        let path = self.creds_path();
        if !fs::try_exists(&path).await? {
            debug!(path = %path.display(), "No stored credentials, starting a fresh session");
            return Ok(None);
        }
        let data = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn save_creds(&self, creds: &Value) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.creds_path();
        write_atomic(&path, serde_json::to_vec_pretty(creds)?).await?;
        trace!(path = %path.display(), "Credentials saved");
        Ok(())
    }
}

/// Credentials kept in memory only; every restart pairs a new device.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    creds: Mutex<Option<Value>>,
}

impl MemorySessionStore {
    pub fn new(creds: Option<Value>) -> Self {
        Self {
            creds: Mutex::new(creds),
        }
    }

    pub fn snapshot(&self) -> Option<Value> {
        self.creds.lock().clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_creds(&self) -> StoreResult<Option<Value>> {
        Ok(self.snapshot())
    }

    async fn save_creds(&self, creds: &Value) -> StoreResult<()> {
        *self.creds.lock() = Some(creds.clone());
        Ok(())
    }
}
