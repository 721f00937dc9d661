//! Schema for the moments database.

/// Bump on incompatible schema changes; the open path re-runs the
/// creation batch when the on-disk version is older.
pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS moments (
    id INTEGER PRIMARY KEY,
    image TEXT NOT NULL,
    desc TEXT NOT NULL,
    lat REAL,
    lng REAL,
    audio TEXT,
    date TEXT NOT NULL
);
"#;
