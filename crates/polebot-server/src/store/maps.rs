use polebot_core::{Map, MapMetadata, now_ms};
use polebot_protocol::{MapInfo, SaveMapRequest};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use super::required;
use crate::error::{StoreError, StoreResult};

const MAP_COLUMNS: &str =
    "id, name, resolution, origin_x, origin_y, width, height, created_at_ms, updated_at_ms";

/// Upserts a map by name; fields missing from the request keep their stored
/// (or default) values.
pub fn upsert_map(conn: &mut Connection, request: &SaveMapRequest) -> StoreResult<Map> {
    let name = required(request.name.as_deref(), "name")?;
    let tx = conn.transaction()?;
    ensure_map(&tx, name, Some(&request.info), now_ms())?;
    let map = get_map(&tx, name)?
        .ok_or_else(|| StoreError::not_found(format!("map '{name}' vanished after upsert")))?;
    tx.commit()?;
    info!(map = %map.name, map_id = map.id, "map saved");
    Ok(map)
}

pub fn list_maps(conn: &Connection) -> StoreResult<Vec<Map>> {
    let mut stmt = conn.prepare(&format!("SELECT {MAP_COLUMNS} FROM maps ORDER BY name"))?;
    let rows = stmt.query_map([], map_row)?;
    Ok(rows.collect::<Result<_, _>>()?)
}

pub fn get_map(conn: &Connection, name: &str) -> StoreResult<Option<Map>> {
    let map = conn
        .query_row(
            &format!("SELECT {MAP_COLUMNS} FROM maps WHERE name = ?1"),
            params![name],
            map_row,
        )
        .optional()?;
    Ok(map)
}

/// Returns the id of map `name`, creating it when absent. With `info`, all of
/// the stored metadata is overwritten and fields missing from `info` take
/// their defaults; without it an existing map is left untouched.
pub(crate) fn ensure_map(
    conn: &Connection,
    name: &str,
    info: Option<&MapInfo>,
    now: u64,
) -> StoreResult<i64> {
    let existing = get_map(conn, name)?;
    match (existing, info) {
        (Some(map), None) => Ok(map.id),
        (Some(map), Some(info)) => {
            let metadata = info.merged_over(MapMetadata::default());
            conn.execute(
                "
                UPDATE maps
                SET resolution = ?2, origin_x = ?3, origin_y = ?4, width = ?5, height = ?6,
                    updated_at_ms = ?7
                WHERE id = ?1
                ",
                params![
                    map.id,
                    metadata.resolution,
                    metadata.origin_x,
                    metadata.origin_y,
                    metadata.width,
                    metadata.height,
                    now
                ],
            )?;
            Ok(map.id)
        }
        (None, info) => {
            let metadata = info.map_or_else(MapMetadata::default, |info| {
                info.merged_over(MapMetadata::default())
            });
            conn.execute(
                "
                INSERT INTO maps (name, resolution, origin_x, origin_y, width, height, created_at_ms, updated_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                ",
                params![
                    name,
                    metadata.resolution,
                    metadata.origin_x,
                    metadata.origin_y,
                    metadata.width,
                    metadata.height,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Map> {
    Ok(Map {
        id: row.get(0)?,
        name: row.get(1)?,
        metadata: MapMetadata {
            resolution: row.get(2)?,
            origin_x: row.get(3)?,
            origin_y: row.get(4)?,
            width: row.get(5)?,
            height: row.get(6)?,
        },
        created_at_ms: row.get::<_, i64>(7)? as u64,
        updated_at_ms: row.get::<_, i64>(8)? as u64,
    })
}
