//! SQLite-backed cache store
//!
//! Counter updates are single statements (`UPDATE ... RETURNING` and
//! `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`), so concurrent hits on
//! one fingerprint never lose an increment. Each runs in a transaction that
//! commits only after the returned row decodes. A store-wide gate is held shared
//! by lookups and upserts and exclusively by `clear_all`.

use super::schema::{create_tables, table_name};
use super::{CacheEntry, CacheError, CacheResult, CacheStats, NamespaceStats, RecognitionResult};
use crate::utils::retry_on_lock;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tartan_common::config::DatabaseConfig;
use tartan_common::{FeatureKind, FeatureSet, Fingerprint, Fingerprinter};
use tokio::sync::RwLock;

const ENTRY_COLUMNS: &str = "fingerprint, name, notable_works, confidence, features, context, \
                             created_at, last_accessed, access_count";

/// Fingerprint → result store over the `voice_cache` and `face_cache` tables
pub struct CacheStore {
    pool: SqlitePool,
    fingerprinter: Fingerprinter,
    gate: RwLock<()>,
    max_lock_wait_ms: u64,
}

impl CacheStore {
    /// Wrap an existing pool, creating the cache tables if needed
    pub async fn new(
        pool: SqlitePool,
        fingerprinter: Fingerprinter,
        max_lock_wait_ms: u64,
    ) -> CacheResult<Self> {
        create_tables(&pool).await?;

        Ok(Self {
            pool,
            fingerprinter,
            gate: RwLock::new(()),
            max_lock_wait_ms,
        })
    }

    /// Open (or create) the store at `db_path`
    pub async fn open(
        db_path: &Path,
        config: &DatabaseConfig,
        fingerprinter: Fingerprinter,
    ) -> CacheResult<Self> {
        let pool = tartan_common::db::init_database(db_path, config).await?;
        Self::new(pool, fingerprinter, config.max_lock_wait_ms).await
    }

    /// Non-persistent store for tests and ephemeral runs
    pub async fn in_memory() -> CacheResult<Self> {
        let pool = tartan_common::db::init_memory_database().await?;
        Self::new(pool, Fingerprinter::default(), DatabaseConfig::default().max_lock_wait_ms).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Cache key for a feature set under this store's policy
    pub fn fingerprint(&self, kind: FeatureKind, features: &FeatureSet) -> CacheResult<Fingerprint> {
        Ok(self.fingerprinter.fingerprint(features, kind)?)
    }

    /// Look up the entry for `features`, counting the hit
    ///
    /// Returns the entry with its post-increment `access_count`, or `None` on a miss.
    /// The increment commits only once the row has decoded; a corrupt row
    /// returns `Corrupt` and leaves the counter as it was.
    pub async fn lookup(
        &self,
        kind: FeatureKind,
        features: &FeatureSet,
    ) -> CacheResult<Option<CacheEntry>> {
        let fingerprint = self.fingerprint(kind, features)?;
        let sql = format!(
            "UPDATE {table} SET access_count = access_count + 1, last_accessed = ? \
             WHERE fingerprint = ? RETURNING {ENTRY_COLUMNS}",
            table = table_name(kind)
        );

        let _guard = self.gate.read().await;

        let now = timestamp_now();
        let pool = &self.pool;
        let sql = sql.as_str();
        let key = fingerprint.as_str();
        let now = now.as_str();

        let entry = retry_on_lock("cache lookup", self.max_lock_wait_ms, move || async move {
            let mut tx = pool.begin().await?;
            let row = sqlx::query(sql)
                .bind(now)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
            // Dropping `tx` on a decode error rolls the increment back
            let entry = row.map(|row| row_to_entry(kind, &row)).transpose()?;
            tx.commit().await?;
            Ok::<_, CacheError>(entry)
        })
        .await?;

        match entry {
            Some(entry) => {
                tracing::debug!(
                    kind = %kind,
                    fingerprint = %entry.fingerprint,
                    access_count = entry.access_count,
                    "Cache hit"
                );
                Ok(Some(entry))
            }
            None => {
                tracing::debug!(kind = %kind, fingerprint = %fingerprint, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Insert a result, or overwrite the result fields of an existing entry
    ///
    /// A new entry starts with `access_count = 1`; re-inserting the same
    /// fingerprint increments the counter. Stored features keep their first
    /// value. `context` is only stored for voice entries.
    pub async fn upsert(
        &self,
        kind: FeatureKind,
        features: &FeatureSet,
        result: &RecognitionResult,
        context: Option<&str>,
    ) -> CacheResult<CacheEntry> {
        let fingerprint = self.fingerprint(kind, features)?;
        let result = RecognitionResult::new(
            result.name.clone(),
            result.notable_works.clone(),
            result.confidence,
        );
        let works_json = serde_json::to_string(&result.notable_works)
            .map_err(|e| CacheError::Internal(e.to_string()))?;
        let features_json =
            serde_json::to_string(features).map_err(|e| CacheError::Internal(e.to_string()))?;
        let context = match kind {
            FeatureKind::Voice => context.filter(|c| !c.trim().is_empty()),
            FeatureKind::Face => None,
        };
        let sql = format!(
            "INSERT INTO {table} ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1) \
             ON CONFLICT(fingerprint) DO UPDATE SET \
                 name = excluded.name, \
                 notable_works = excluded.notable_works, \
                 confidence = excluded.confidence, \
                 context = excluded.context, \
                 last_accessed = excluded.last_accessed, \
                 access_count = access_count + 1 \
             RETURNING {ENTRY_COLUMNS}",
            table = table_name(kind)
        );

        let _guard = self.gate.read().await;

        let now = timestamp_now();
        let pool = &self.pool;
        let sql = sql.as_str();
        let key = fingerprint.as_str();
        let now = now.as_str();
        let name = result.name.as_str();
        let works_json = works_json.as_str();
        let features_json = features_json.as_str();
        let confidence = result.confidence;

        let entry = retry_on_lock("cache upsert", self.max_lock_wait_ms, move || async move {
            let mut tx = pool.begin().await?;
            let row = sqlx::query(sql)
                .bind(key)
                .bind(name)
                .bind(works_json)
                .bind(confidence)
                .bind(features_json)
                .bind(context)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
            let entry = row_to_entry(kind, &row)?;
            tx.commit().await?;
            Ok::<_, CacheError>(entry)
        })
        .await?;

        tracing::debug!(
            kind = %kind,
            fingerprint = %entry.fingerprint,
            name = %entry.result.name,
            access_count = entry.access_count,
            "Cache entry written"
        );
        Ok(entry)
    }

    /// Read an entry without touching its statistics
    pub async fn peek(
        &self,
        kind: FeatureKind,
        fingerprint: &Fingerprint,
    ) -> CacheResult<Option<CacheEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM {table} WHERE fingerprint = ?",
            table = table_name(kind)
        );

        let _guard = self.gate.read().await;

        let row = sqlx::query(&sql)
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_entry(kind, &row)).transpose()
    }

    /// Entry count and summed access counters per namespace
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let _guard = self.gate.read().await;

        let mut stats = CacheStats::default();
        for kind in FeatureKind::ALL {
            let sql = format!(
                "SELECT COUNT(*) AS entries, COALESCE(SUM(access_count), 0) AS total_hits FROM {}",
                table_name(kind)
            );
            let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
            let namespace = NamespaceStats {
                entries: row.try_get("entries")?,
                total_hits: row.try_get("total_hits")?,
            };
            match kind {
                FeatureKind::Voice => stats.voice = namespace,
                FeatureKind::Face => stats.face = namespace,
            }
        }

        Ok(stats)
    }

    /// Delete every entry in both namespaces
    ///
    /// Runs in one transaction while holding the gate exclusively, so no
    /// lookup or upsert observes a half-cleared store.
    pub async fn clear_all(&self) -> CacheResult<()> {
        let _guard = self.gate.write().await;

        let pool = &self.pool;
        retry_on_lock("cache clear", self.max_lock_wait_ms, move || delete_all_rows(pool)).await?;

        tracing::info!("Cache cleared (voice_cache, face_cache)");
        Ok(())
    }
}

async fn delete_all_rows(pool: &SqlitePool) -> CacheResult<()> {
    let mut tx = pool.begin().await?;
    for kind in FeatureKind::ALL {
        sqlx::query(&format!("DELETE FROM {}", table_name(kind)))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> CacheResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Corrupt(format!("{column} '{value}': {e}")))
}

fn row_to_entry(kind: FeatureKind, row: &SqliteRow) -> CacheResult<CacheEntry> {
    let fingerprint: String = row.try_get("fingerprint")?;
    let works_json: String = row.try_get("notable_works")?;
    let features_json: String = row.try_get("features")?;
    let created_at: String = row.try_get("created_at")?;
    let last_accessed: String = row.try_get("last_accessed")?;

    let notable_works: Vec<String> = serde_json::from_str(&works_json)
        .map_err(|e| CacheError::Corrupt(format!("notable_works for {fingerprint}: {e}")))?;
    let features: FeatureSet = serde_json::from_str(&features_json)
        .map_err(|e| CacheError::Corrupt(format!("features for {fingerprint}: {e}")))?;

    Ok(CacheEntry {
        kind,
        result: RecognitionResult {
            name: row.try_get("name")?,
            notable_works,
            confidence: row.try_get("confidence")?,
        },
        features,
        context: row.try_get("context")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        last_accessed: parse_timestamp("last_accessed", &last_accessed)?,
        access_count: row.try_get("access_count")?,
        fingerprint: Fingerprint::from(fingerprint),
    })
}
