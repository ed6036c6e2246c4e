use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::db::ResultStore;
use crate::error::StoreError;
use crate::models::SummaryRecord;

use super::schema::SCHEMA;

const SUMMARY_COLUMNS: &str =
    "video_id, summary_text, raw_text, user_id, creator_name, created_at";

/// SQLite-backed [`ResultStore`].
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:").await
    }

    /// Re-runs `format` over every stored summary, preferring the raw text
    /// when it was kept. Returns how many rows changed.
    pub async fn reformat_all(&self, format: fn(&str) -> String) -> Result<usize, StoreError> {
        let changed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let rows: Vec<(i64, String, Option<String>)> = {
                    let mut stmt =
                        tx.prepare("SELECT id, summary_text, raw_text FROM video_summaries")?;
                    let rows = stmt
                        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                };

                let mut changed = 0;
                for (id, current, raw) in rows {
                    let source = raw.as_deref().unwrap_or(&current);
                    let formatted = format(source);
                    if formatted != current {
                        tx.execute(
                            "UPDATE video_summaries SET summary_text = ?1 WHERE id = ?2",
                            params![formatted, id],
                        )?;
                        changed += 1;
                    }
                }
                tx.commit()?;
                Ok(changed)
            })
            .await?;
        Ok(changed)
    }

    #[cfg(test)]
    async fn overwrite_text(&self, video_id: &str, text: &str) -> Result<(), StoreError> {
        let video_id = video_id.to_string();
        let text = text.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE video_summaries SET summary_text = ?1 WHERE video_id = ?2",
                    params![text, video_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for Repository {
    async fn get(&self, video_id: &str) -> Result<Option<SummaryRecord>, StoreError> {
        let video_id = video_id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM video_summaries WHERE video_id = ?1",
                    SUMMARY_COLUMNS
                ))?;
                let record = stmt
                    .query_row(params![video_id], summary_from_row)
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let video_id = record.video_id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO video_summaries
                       (video_id, summary_text, raw_text, user_id, creator_name, created_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(video_id) DO NOTHING"#,
                    params![
                        record.video_id,
                        record.formatted_text,
                        record.raw_text,
                        record.creator_id,
                        record.creator_name,
                        record.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;

        if inserted {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists(video_id))
        }
    }

    async fn exists(&self, video_id: &str) -> Result<bool, StoreError> {
        let video_id = video_id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM video_summaries WHERE video_id = ?1",
                    params![video_id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM video_summaries ORDER BY created_at DESC, id DESC LIMIT ?1",
                    SUMMARY_COLUMNS
                ))?;
                let records = stmt
                    .query_map(params![limit], summary_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn summary_from_row(row: &Row) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        video_id: row.get(0)?,
        formatted_text: row.get(1)?,
        raw_text: row.get(2)?,
        creator_id: row.get(3)?,
        creator_name: row.get(4)?,
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
