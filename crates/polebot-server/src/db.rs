use std::{fs, path::Path};

use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS maps (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL UNIQUE,
      resolution REAL NOT NULL,
      origin_x REAL NOT NULL,
      origin_y REAL NOT NULL,
      width INTEGER NOT NULL,
      height INTEGER NOT NULL,
      created_at_ms INTEGER NOT NULL,
      updated_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS goal_sets (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL UNIQUE,
      map_id INTEGER NOT NULL,
      description TEXT,
      total_goals INTEGER NOT NULL DEFAULT 0,
      created_at_ms INTEGER NOT NULL,
      updated_at_ms INTEGER NOT NULL,
      FOREIGN KEY(map_id) REFERENCES maps(id)
    );

    CREATE TABLE IF NOT EXISTS goals (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      goal_set_id INTEGER NOT NULL,
      sequence_number INTEGER NOT NULL,
      position_x REAL NOT NULL,
      position_y REAL NOT NULL,
      orientation_z REAL NOT NULL DEFAULT 0.0,
      orientation_w REAL NOT NULL DEFAULT 1.0,
      tolerance_xy REAL NOT NULL DEFAULT 0.3,
      tolerance_yaw REAL NOT NULL DEFAULT 0.5,
      UNIQUE(goal_set_id, sequence_number),
      FOREIGN KEY(goal_set_id) REFERENCES goal_sets(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS categories (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      description TEXT,
      icon TEXT,
      color TEXT,
      created_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS missions (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      description TEXT,
      category_id INTEGER,
      last_executed_ms INTEGER,
      created_at_ms INTEGER NOT NULL,
      updated_at_ms INTEGER NOT NULL,
      FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS mission_goals (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      mission_id INTEGER NOT NULL,
      goal_id INTEGER NOT NULL,
      sequence_number INTEGER NOT NULL,
      next_goal_trigger TEXT NOT NULL DEFAULT 'auto',
      wait_time INTEGER NOT NULL DEFAULT 5,
      sensor_type TEXT,
      sensor_condition TEXT,
      timeout INTEGER NOT NULL DEFAULT 60,
      retry_count INTEGER NOT NULL DEFAULT 0,
      on_failure TEXT NOT NULL DEFAULT 'skip',
      UNIQUE(mission_id, sequence_number),
      FOREIGN KEY(mission_id) REFERENCES missions(id) ON DELETE CASCADE,
      FOREIGN KEY(goal_id) REFERENCES goals(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_goal_sets_map ON goal_sets(map_id);
    CREATE INDEX IF NOT EXISTS idx_mission_goals_goal ON mission_goals(goal_id);
";

/// Opens (creating if needed) the database file and applies the schema.
pub fn open(db_path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
