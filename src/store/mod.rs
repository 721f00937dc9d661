//! Durable CRUD store for Moment records.
//!
//! The SQLite connection is established lazily: concurrent first callers
//! coordinate through a shared connecting future, so a single underlying
//! open serves them all. Every operation runs one short-lived statement;
//! there is no cross-operation atomicity.

pub mod schema;

use rusqlite::{params, Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::moment::{GeoPoint, Moment};

/// Errors surfaced by the store boundary.
///
/// `DuplicateKey` is its own variant: an id collision indicates a clock or
/// logic fault and must be distinguishable from ordinary database failure.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("a moment with id {0} already exists")]
  DuplicateKey(i64),
  #[error("moments database unavailable: {0}")]
  Unavailable(String),
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),
}

/// Asynchronous CRUD layer over the moments database.
pub struct MomentStore {
  path: PathBuf,
  conn: OnceCell<Mutex<Connection>>,
}

impl MomentStore {
  /// Create a store handle for the database at `path`.
  ///
  /// Does not touch the filesystem; the connection is opened on first use.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      conn: OnceCell::new(),
    }
  }

  /// Open a store backed by an in-memory database for testing.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    init_schema(&conn)?;
    Ok(Self {
      path: PathBuf::from(":memory:"),
      conn: OnceCell::new_with(Some(Mutex::new(conn))),
    })
  }

  /// Get the shared connection, opening it if no open has succeeded yet.
  async fn conn(&self) -> Result<&Mutex<Connection>, StoreError> {
    self
      .conn
      .get_or_try_init(|| async {
        let conn = open_at(&self.path)?;
        Ok(Mutex::new(conn))
      })
      .await
  }

  /// Insert a new moment. Fails with `DuplicateKey` if the id is taken.
  pub async fn create(&self, moment: &Moment) -> Result<(), StoreError> {
    let conn = self.conn().await?;

    let result = conn.lock().map_err(poisoned)?.execute(
      "INSERT INTO moments (id, image, desc, lat, lng, audio, date)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        moment.id,
        moment.image,
        moment.desc,
        moment.geo.map(|g| g.lat),
        moment.geo.map(|g| g.lng),
        moment.audio,
        moment.date,
      ],
    );

    match result {
      Ok(_) => {
        debug!(id = moment.id, "moment stored");
        Ok(())
      }
      Err(rusqlite::Error::SqliteFailure(e, _))
        if e.code == ErrorCode::ConstraintViolation =>
      {
        Err(StoreError::DuplicateKey(moment.id))
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Return every stored moment, newest first (descending id).
  pub async fn list_all(&self) -> Result<Vec<Moment>, StoreError> {
    let conn = self.conn().await?;
    let conn = conn.lock().map_err(poisoned)?;

    let mut stmt =
      conn.prepare("SELECT id, image, desc, lat, lng, audio, date FROM moments")?;
    let mut moments = stmt
      .query_map([], |row| {
        let lat: Option<f64> = row.get(3)?;
        let lng: Option<f64> = row.get(4)?;
        Ok(Moment {
          id: row.get(0)?,
          image: row.get(1)?,
          desc: row.get(2)?,
          geo: lat.zip(lng).map(|(lat, lng)| GeoPoint { lat, lng }),
          audio: row.get(5)?,
          date: row.get(6)?,
        })
      })?
      .collect::<Result<Vec<_>, _>>()?;

    // Personal-use scale: sort the bulk read in memory instead of
    // maintaining a separate index scan.
    moments.sort_by_key(|m| std::cmp::Reverse(m.id));
    Ok(moments)
  }

  /// Remove the moment with the given id. A no-op if it does not exist.
  pub async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
    let conn = self.conn().await?;
    let removed = conn
      .lock()
      .map_err(poisoned)?
      .execute("DELETE FROM moments WHERE id = ?1", params![id])?;
    debug!(id, removed, "moment delete");
    Ok(())
  }

  /// Remove all moments unconditionally.
  pub async fn clear(&self) -> Result<(), StoreError> {
    let conn = self.conn().await?;
    conn
      .lock()
      .map_err(poisoned)?
      .execute("DELETE FROM moments", [])?;
    info!("moments store cleared");
    Ok(())
  }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
  StoreError::Unavailable(format!("lock poisoned: {e}"))
}

/// Open the database at `path` and bring the schema up to date.
fn open_at(path: &Path) -> Result<Connection, StoreError> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| {
      StoreError::Unavailable(format!(
        "failed to create data directory {}: {e}",
        parent.display()
      ))
    })?;
  }

  let conn = Connection::open(path).map_err(|e| {
    StoreError::Unavailable(format!("failed to open {}: {e}", path.display()))
  })?;
  init_schema(&conn)?;

  info!(path = %path.display(), "moments database opened");
  Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
  let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
  if version < schema::SCHEMA_VERSION {
    conn.execute_batch(schema::SCHEMA)?;
    conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
  }
  Ok(())
}
