use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;

use crate::filters::{EffectiveFilter, FilterState};
use crate::formats::{BookSummary, SearchSnapshot};

pub const TITLE_KEY: &str = "bookfinder.title";
pub const YEAR_KEY: &str = "bookfinder.year";
pub const LANGUAGE_KEY: &str = "bookfinder.language";
pub const BOOKS_KEY: &str = "bookfinder.books";
pub const FETCHED_FOR_KEY: &str = "bookfinder.fetched_for";
pub const FETCHED_AT_KEY: &str = "bookfinder.fetched_at";

const ALL_KEYS: [&str; 6] = [
    TITLE_KEY,
    YEAR_KEY,
    LANGUAGE_KEY,
    BOOKS_KEY,
    FETCHED_FOR_KEY,
    FETCHED_AT_KEY,
];

/// String key-value storage that survives restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// All keys in one JSON object file, replaced atomically on every write.
#[derive(Debug)]
pub struct LocalFsKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalFsKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn update<F>(&self, apply: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut entries = read_entries(&self.path).await?.unwrap_or_default();
        apply(&mut entries);
        write_json_atomic(&self.path, &entries).await
    }
}

#[async_trait]
impl KeyValueStore for LocalFsKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let entries = read_entries(&self.path)
            .await
            .with_context(|| format!("read: {}", self.path.display()))?;
        Ok(entries.and_then(|mut entries| entries.remove(key)))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let key = key.to_owned();
        let value = value.to_owned();
        self.update(move |entries| {
            entries.insert(key, value);
        })
        .await
        .with_context(|| format!("write: {}", self.path.display()))
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let key = key.to_owned();
        self.update(move |entries| {
            entries.remove(&key);
        })
        .await
        .with_context(|| format!("write: {}", self.path.display()))
    }
}

/// Process-local store for `--no-persist` and tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Reads the last snapshot. A corrupt results entry is dropped with a warning
/// so startup falls back to a fresh fetch.
pub async fn load_snapshot(store: &dyn KeyValueStore) -> anyhow::Result<SearchSnapshot> {
    let filters = FilterState {
        title: store.get(TITLE_KEY).await?.unwrap_or_default(),
        year: store.get(YEAR_KEY).await?.unwrap_or_default(),
        language: store.get(LANGUAGE_KEY).await?.unwrap_or_default(),
    };

    let results = match store.get(BOOKS_KEY).await? {
        Some(raw) => match serde_json::from_str::<Vec<BookSummary>>(&raw) {
            Ok(books) => books,
            Err(err) => {
                tracing::warn!(?err, "ignoring unreadable cached results");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let fetched_for = match store.get(FETCHED_FOR_KEY).await? {
        Some(raw) => match serde_json::from_str::<EffectiveFilter>(&raw) {
            Ok(filter) => Some(filter),
            Err(err) => {
                tracing::warn!(?err, "ignoring unreadable cached filter");
                None
            }
        },
        None => None,
    };

    let fetched_at = store
        .get(FETCHED_AT_KEY)
        .await?
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Ok(SearchSnapshot {
        filters,
        results,
        fetched_for,
        fetched_at,
    })
}

pub async fn save_filters(store: &dyn KeyValueStore, filters: &FilterState) -> anyhow::Result<()> {
    store
        .set(TITLE_KEY, &filters.title)
        .await
        .context("save title")?;
    store.set(YEAR_KEY, &filters.year).await.context("save year")?;
    store
        .set(LANGUAGE_KEY, &filters.language)
        .await
        .context("save language")?;
    Ok(())
}

pub async fn save_snapshot(
    store: &dyn KeyValueStore,
    snapshot: &SearchSnapshot,
) -> anyhow::Result<()> {
    save_filters(store, &snapshot.filters).await?;
    let books = serde_json::to_string(&snapshot.results).context("serialize results")?;
    store.set(BOOKS_KEY, &books).await.context("save results")?;
    match &snapshot.fetched_for {
        Some(filter) => {
            let filter = serde_json::to_string(filter).context("serialize fetched filter")?;
            store
                .set(FETCHED_FOR_KEY, &filter)
                .await
                .context("save fetched filter")?
        }
        None => store
            .remove(FETCHED_FOR_KEY)
            .await
            .context("remove fetched filter")?,
    }
    match snapshot.fetched_at {
        Some(ts) => store
            .set(FETCHED_AT_KEY, &ts.to_rfc3339())
            .await
            .context("save fetched_at")?,
        None => store
            .remove(FETCHED_AT_KEY)
            .await
            .context("remove fetched_at")?,
    }
    Ok(())
}

pub async fn clear_snapshot(store: &dyn KeyValueStore) -> anyhow::Result<()> {
    for key in ALL_KEYS {
        store
            .remove(key)
            .await
            .with_context(|| format!("remove {key}"))?;
    }
    Ok(())
}

async fn read_entries(path: &Path) -> anyhow::Result<Option<BTreeMap<String, String>>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
