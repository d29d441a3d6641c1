//! Cache table definitions
//!
//! `voice_cache` and `face_cache` share one layout. `context` is only ever
//! populated for voice rows. Timestamps are RFC 3339 text.

use sqlx::SqlitePool;
use tartan_common::FeatureKind;

/// Table backing a namespace
pub fn table_name(kind: FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Voice => "voice_cache",
        FeatureKind::Face => "face_cache",
    }
}

/// Create both cache tables if they don't exist
pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for kind in FeatureKind::ALL {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                notable_works TEXT NOT NULL DEFAULT '[]',
                confidence REAL NOT NULL,
                features TEXT NOT NULL,
                context TEXT,
                created_at TEXT NOT NULL,
                last_accessed TEXT NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 1
            )
            "#,
            table = table_name(kind)
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    tracing::info!("Cache tables initialized (voice_cache, face_cache)");

    Ok(())
}
