//! Single-flight TTL cache for schema metadata.
//!
//! Each key maps to a shared [`OnceCell`]. Concurrent readers of a key that is
//! being populated await the same initialization instead of issuing their own
//! catalog queries. A failed population leaves the cell empty, so the next read
//! retries. Expired cells are swapped for fresh ones under the map lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

/// Kind of metadata held under a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    SchemaList,
    Schema,
    Tables,
    Table,
    Views,
    View,
    Procedures,
    Procedure,
}

impl MetadataKind {
    fn prefix(self) -> &'static str {
        match self {
            MetadataKind::SchemaList => "schemas",
            MetadataKind::Schema => "schema",
            MetadataKind::Tables => "tables",
            MetadataKind::Table => "table",
            MetadataKind::Views => "views",
            MetadataKind::View => "view",
            MetadataKind::Procedures => "procedures",
            MetadataKind::Procedure => "procedure",
        }
    }
}

/// Structured metadata cache key.
///
/// Kind, schema and object name stay separate fields, so a table and a view
/// sharing a name never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: MetadataKind,
    schema: Option<String>,
    name: Option<String>,
}

impl CacheKey {
    /// Key for the list of all schemas.
    pub fn schema_list() -> Self {
        Self {
            kind: MetadataKind::SchemaList,
            schema: None,
            name: None,
        }
    }

    /// Key for a schema-level entry (summary or object list).
    pub fn schema_level(kind: MetadataKind, schema: impl Into<String>) -> Self {
        Self {
            kind,
            schema: Some(schema.into()),
            name: None,
        }
    }

    /// Key for a single object's descriptor.
    pub fn object(kind: MetadataKind, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            schema: Some(schema.into()),
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.prefix())?;
        if let Some(schema) = &self.schema {
            write!(f, "_{schema}")?;
        }
        if let Some(name) = &self.name {
            write!(f, "_{name}")?;
        }
        Ok(())
    }
}

/// A populated value and when it stops being valid.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Reads answered from a populated entry.
    pub hits: u64,

    /// Factory invocations that completed successfully.
    pub populations: u64,

    /// Keys currently tracked (including expired, not yet replaced ones).
    pub entry_count: usize,
}

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

/// Keyed store with per-entry expiry and single-flight population.
pub struct ResourceCache<K, V> {
    entries: Mutex<HashMap<K, Slot<V>>>,
    hits: AtomicU64,
    populations: AtomicU64,
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            populations: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or compute it with `factory`.
    ///
    /// At most one `factory` runs per key at a time; concurrent callers for the
    /// same key await that run. An `Err` from `factory` goes only to the caller
    /// whose factory produced it and nothing is stored; the next waiter then
    /// runs its own factory.
    pub async fn get_or_add<F, Fut, E>(&self, key: K, ttl: Duration, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot_for(&key);

        if let Some(entry) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Metadata cache hit");
            return Ok(entry.value.clone());
        }

        let entry = slot
            .get_or_try_init(|| async move {
                debug!(key = %key, "Metadata cache miss, populating");
                let value = factory().await?;
                self.populations.fetch_add(1, Ordering::Relaxed);
                Ok::<_, E>(CacheEntry::new(value, ttl))
            })
            .await?;

        Ok(entry.value.clone())
    }

    /// Find the live slot for `key`, replacing it if its entry has expired.
    fn slot_for(&self, key: &K) -> Slot<V> {
        let mut entries = self.entries.lock();
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()));

        if slot.get().is_some_and(CacheEntry::is_expired) {
            debug!(key = %key, "Metadata cache entry expired");
            *slot = Arc::new(OnceCell::new());
        }

        Arc::clone(slot)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            populations: self.populations.load(Ordering::Relaxed),
            entry_count: self.entries.lock().len(),
        }
    }
}

impl<K, V> Default for ResourceCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
