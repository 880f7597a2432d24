use globo_types::{ContextEntry, Message, MessageDraft, MessageId, Mode, VisualizationImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of recent entries sent to prime each completion.
pub const RECENT_CONTEXT_LEN: usize = 5;
/// Number of trailing messages kept in the history cache.
pub const CACHED_HISTORY_LEN: usize = 20;

/// Append-only, ordered log of the messages exchanged in one conversation.
#[derive(Debug, Default)]
pub struct ConversationHistoryStore {
    messages: Vec<Message>,
    next_id: u64,
}

impl ConversationHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: MessageDraft) -> Self {
        let mut store = Self::new();
        store.append(seed);
        store
    }

    /// Appends a draft, assigning the next id and the current time.
    pub fn append(&mut self, draft: MessageDraft) -> Message {
        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        let message = Message::from_draft(id, now_ms(), draft);
        self.messages.push(message.clone());
        message
    }

    /// Replaces the whole conversation with a single seed message.
    pub fn reset(&mut self, seed: MessageDraft) -> Message {
        self.messages.clear();
        self.append(seed)
    }

    /// Replaces the conversation with previously stored messages.
    ///
    /// Ids keep counting from the highest id seen so far, restored or not.
    pub fn restore(&mut self, messages: Vec<Message>) {
        let highest = messages.iter().map(|m| m.id().value() + 1).max().unwrap_or(0);
        self.next_id = self.next_id.max(highest);
        self.messages = messages;
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&id, |m| m.id())
            .ok()
            .map(|idx| &self.messages[idx])
    }

    /// Fills the visualization slot of an appended message; `false` if unknown or already set.
    pub fn attach_visualization(&mut self, id: MessageId, image: VisualizationImage) -> bool {
        match self.messages.binary_search_by_key(&id, |m| m.id()) {
            Ok(idx) => self.messages[idx].attach_visualization(image),
            Err(_) => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `k` entries as (role, content) pairs, oldest first.
    /// Image messages appear as the bare image marker.
    pub fn recent_context(&self, k: usize) -> Vec<ContextEntry> {
        let start = self.messages.len().saturating_sub(k);
        self.messages[start..]
            .iter()
            .map(|m| ContextEntry {
                role: m.role(),
                content: m.content().as_context(),
            })
            .collect()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Best-effort key-value store holding recent conversations between runs.
pub trait HistoryCache: Send + Sync {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn store(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

pub fn cache_key(mode: Mode) -> String {
    format!("globo.history.{}", mode.as_str())
}

/// Writes the tail of the conversation. Failures are logged and swallowed.
pub(crate) fn save_snapshot(cache: &dyn HistoryCache, mode: Mode, messages: &[Message]) {
    let start = messages.len().saturating_sub(CACHED_HISTORY_LEN);
    let payload = match serde_json::to_string(&messages[start..]) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Failed to serialize history snapshot: {}", e);
            return;
        }
    };
    if let Err(e) = cache.store(&cache_key(mode), &payload) {
        tracing::warn!("Failed to write history cache: {:?}", e);
    }
}

/// Conversation tail captured under the history lock, written later without it.
#[derive(Debug)]
pub(crate) struct Snapshot {
    mode: Mode,
    revision: u64,
    messages: Vec<Message>,
}

/// Serializes cache writes. A snapshot older than the last one written is dropped,
/// so writes finishing out of order never roll the cache back.
pub(crate) struct SnapshotWriter {
    cache: Arc<dyn HistoryCache>,
    next_revision: AtomicU64,
    written: Mutex<u64>,
}

impl SnapshotWriter {
    pub(crate) fn new(cache: Arc<dyn HistoryCache>) -> Self {
        Self {
            cache,
            next_revision: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    pub(crate) fn cache(&self) -> &dyn HistoryCache {
        self.cache.as_ref()
    }

    /// Must be called with the history lock held so revisions follow history order.
    pub(crate) fn snapshot(&self, mode: Mode, messages: &[Message]) -> Snapshot {
        let start = messages.len().saturating_sub(CACHED_HISTORY_LEN);
        Snapshot {
            mode,
            revision: self.next_revision.fetch_add(1, Ordering::Relaxed) + 1,
            messages: messages[start..].to_vec(),
        }
    }

    pub(crate) fn write(&self, snapshot: Snapshot) {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if snapshot.revision <= *written {
            tracing::debug!("Skipping outdated history snapshot {}", snapshot.revision);
            return;
        }
        save_snapshot(self.cache(), snapshot.mode, &snapshot.messages);
        *written = snapshot.revision;
    }
}

/// Reads a cached conversation. Missing, unreadable or corrupt entries yield `None`.
pub(crate) fn load_snapshot(cache: &dyn HistoryCache, mode: Mode) -> Option<Vec<Message>> {
    let payload = match cache.load(&cache_key(mode)) {
        Ok(Some(payload)) => payload,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Failed to read history cache: {:?}", e);
            return None;
        }
    };
    match serde_json::from_str::<Vec<Message>>(&payload) {
        Ok(messages) if !messages.is_empty() => {
            let ordered = messages.windows(2).all(|w| w[0].id() < w[1].id());
            if ordered {
                Some(messages)
            } else {
                tracing::warn!("Ignoring history cache with out-of-order ids");
                None
            }
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Ignoring corrupt history cache: {}", e);
            None
        }
    }
}

/// In-process cache, handy for tests and for front ends without storage.
#[derive(Debug, Default)]
pub struct MemoryHistoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryCache for MemoryHistoryCache {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history cache lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
