//! Concrete stores for session credentials, paused chats and messages.

mod messages;
mod paused;
mod session;

use std::path::Path;

use tokio::fs;

use asena_core::StoreResult;

pub use messages::MemoryMessageStore;
pub use paused::{JsonPausedChats, MemoryPausedChats};
pub use session::{FileSessionStore, MemorySessionStore};

/// Writes `bytes` to a sibling temp file and renames it over `path`.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> StoreResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
