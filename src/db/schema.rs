pub const SCHEMA: &str = r#"
-- video_summaries table
CREATE TABLE IF NOT EXISTS video_summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL UNIQUE,
    summary_text TEXT NOT NULL,
    raw_text TEXT,
    user_id INTEGER NOT NULL,
    creator_name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_video_summaries_created_at ON video_summaries(created_at DESC);
"#;
