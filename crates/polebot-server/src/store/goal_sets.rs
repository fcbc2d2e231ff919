use polebot_core::{Goal, GoalId, GoalSet, GoalSetDetail, GoalSetId, Pose, now_ms};
use polebot_protocol::{GoalAppended, GoalSetSaved, PoseInput, SaveGoalSetRequest};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::{maps, missions, required};
use crate::error::{StoreError, StoreResult};

const GOAL_SET_COLUMNS: &str = "
    gs.id, gs.name, gs.map_id, m.name, gs.description, gs.total_goals,
    gs.created_at_ms, gs.updated_at_ms
";

const GOAL_COLUMNS: &str = "
    id, goal_set_id, sequence_number, position_x, position_y,
    orientation_z, orientation_w, tolerance_xy, tolerance_yaw
";

/// Replaces the whole contents of goal set `set_name`, creating the set and
/// its map when needed. Goals are numbered by their position in the request.
pub fn replace_goal_set(
    conn: &mut Connection,
    request: &SaveGoalSetRequest,
) -> StoreResult<GoalSetSaved> {
    let map_name = required(request.map_name.as_deref(), "map_name")?;
    let set_name = required(request.set_name.as_deref(), "set_name")?;
    let inputs = match request.goals.as_deref() {
        None => return Err(StoreError::validation("goals is required")),
        Some([]) => return Err(StoreError::validation("goals must not be empty")),
        Some(inputs) => inputs,
    };
    let poses = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            input.to_pose().ok_or_else(|| {
                StoreError::validation(format!("goal {} requires x and y", index + 1))
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let now = now_ms();
    let tx = conn.transaction()?;
    let map_id = maps::ensure_map(&tx, map_name, request.map_info.as_ref(), now)?;

    tx.execute(
        "
        INSERT INTO goal_sets (name, map_id, description, total_goals, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, 0, ?4, ?4)
        ON CONFLICT(name) DO UPDATE SET
          map_id=excluded.map_id,
          description=excluded.description,
          updated_at_ms=excluded.updated_at_ms
        ",
        params![set_name, map_id, request.description, now],
    )?;
    let goal_set_id: i64 =
        tx.query_row("SELECT id FROM goal_sets WHERE name = ?1", params![set_name], |row| {
            row.get(0)
        })?;
    let goal_set_id = GoalSetId(goal_set_id);

    let linked_missions = missions::missions_linked_to_goal_set(&tx, goal_set_id)?;
    tx.execute("DELETE FROM goals WHERE goal_set_id = ?1", params![goal_set_id.0])?;
    for (index, pose) in poses.iter().enumerate() {
        insert_goal(&tx, goal_set_id, index as u32 + 1, pose)?;
    }

    let total_goals = poses.len() as u32;
    tx.execute(
        "UPDATE goal_sets SET total_goals = ?2 WHERE id = ?1",
        params![goal_set_id.0, total_goals],
    )?;
    for mission_id in linked_missions {
        missions::renumber_mission_goals(&tx, mission_id)?;
    }
    tx.commit()?;

    info!(goal_set = set_name, map = map_name, total_goals, "goal set replaced");
    Ok(GoalSetSaved { goal_set_id, total_goals })
}

/// Adds one goal at the end of `set_name`.
pub fn append_goal(
    conn: &mut Connection,
    set_name: &str,
    input: &PoseInput,
) -> StoreResult<GoalAppended> {
    let pose = input.to_pose().ok_or_else(|| StoreError::validation("x and y are required"))?;
    let tx = conn.transaction()?;
    let (_, sequence_number) = append_goal_in(&tx, set_name, &pose)?;
    tx.commit()?;
    debug!(goal_set = set_name, sequence_number, "goal appended");
    Ok(GoalAppended { sequence_number })
}

/// Deletes goal `sequence_number` and shifts every later goal down by one.
pub fn remove_goal(conn: &mut Connection, set_name: &str, sequence_number: u32) -> StoreResult<()> {
    let tx = conn.transaction()?;
    let (goal_set_id, _) = find_goal_set(&tx, set_name)?;
    let goal_id = find_goal(&tx, goal_set_id, set_name, sequence_number)?;

    let linked_missions = missions::missions_linked_to_goal(&tx, goal_id)?;
    tx.execute("DELETE FROM goals WHERE id = ?1", params![goal_id.0])?;

    // UNIQUE(goal_set_id, sequence_number) is checked row by row, so the
    // shifted rows are parked at negative positions before being flipped back.
    tx.execute(
        "
        UPDATE goals SET sequence_number = -(sequence_number - 1)
        WHERE goal_set_id = ?1 AND sequence_number > ?2
        ",
        params![goal_set_id.0, sequence_number],
    )?;
    tx.execute(
        "UPDATE goals SET sequence_number = -sequence_number WHERE goal_set_id = ?1 AND sequence_number < 0",
        params![goal_set_id.0],
    )?;
    tx.execute(
        "UPDATE goal_sets SET total_goals = total_goals - 1, updated_at_ms = ?2 WHERE id = ?1",
        params![goal_set_id.0, now_ms()],
    )?;
    for mission_id in linked_missions {
        missions::renumber_mission_goals(&tx, mission_id)?;
    }
    tx.commit()?;

    debug!(goal_set = set_name, sequence_number, "goal removed");
    Ok(())
}

/// Overwrites the pose of goal `sequence_number` in place. Fields missing from
/// `input` keep their stored values; the sequence number never changes.
pub fn update_goal(
    conn: &mut Connection,
    set_name: &str,
    sequence_number: u32,
    input: &PoseInput,
) -> StoreResult<Goal> {
    let tx = conn.transaction()?;
    let (goal_set_id, _) = find_goal_set(&tx, set_name)?;
    let goal_id = find_goal(&tx, goal_set_id, set_name, sequence_number)?;
    let current = fetch_goal(&tx, goal_id)?;

    let pose = Pose {
        position_x: input.x.unwrap_or(current.pose.position_x),
        position_y: input.y.unwrap_or(current.pose.position_y),
        orientation_z: input.orientation_z.unwrap_or(current.pose.orientation_z),
        orientation_w: input.orientation_w.unwrap_or(current.pose.orientation_w),
        tolerance_xy: input.tolerance_xy.unwrap_or(current.pose.tolerance_xy),
        tolerance_yaw: input.tolerance_yaw.unwrap_or(current.pose.tolerance_yaw),
    };
    tx.execute(
        "
        UPDATE goals
        SET position_x = ?2, position_y = ?3, orientation_z = ?4, orientation_w = ?5,
            tolerance_xy = ?6, tolerance_yaw = ?7
        WHERE id = ?1
        ",
        params![
            goal_id.0,
            pose.position_x,
            pose.position_y,
            pose.orientation_z,
            pose.orientation_w,
            pose.tolerance_xy,
            pose.tolerance_yaw
        ],
    )?;
    tx.execute(
        "UPDATE goal_sets SET updated_at_ms = ?2 WHERE id = ?1",
        params![goal_set_id.0, now_ms()],
    )?;
    tx.commit()?;

    Ok(Goal { pose, ..current })
}

/// Deletes a goal set with its goals and every mission step pointing at them.
pub fn delete_goal_set(conn: &mut Connection, set_name: &str) -> StoreResult<()> {
    let tx = conn.transaction()?;
    let (goal_set_id, _) = find_goal_set(&tx, set_name)?;
    let linked_missions = missions::missions_linked_to_goal_set(&tx, goal_set_id)?;
    tx.execute("DELETE FROM goal_sets WHERE id = ?1", params![goal_set_id.0])?;
    for mission_id in linked_missions {
        missions::renumber_mission_goals(&tx, mission_id)?;
    }
    tx.commit()?;
    info!(goal_set = set_name, "goal set deleted");
    Ok(())
}

pub fn list_goal_sets(conn: &Connection, map_name: Option<&str>) -> StoreResult<Vec<GoalSet>> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {GOAL_SET_COLUMNS}
        FROM goal_sets gs JOIN maps m ON m.id = gs.map_id
        WHERE ?1 IS NULL OR m.name = ?1
        ORDER BY gs.updated_at_ms DESC, gs.id DESC
        "
    ))?;
    let rows = stmt.query_map(params![map_name], goal_set_row)?;
    Ok(rows.collect::<Result<_, _>>()?)
}

pub fn get_goal_set(conn: &Connection, set_name: &str) -> StoreResult<Option<GoalSetDetail>> {
    let goal_set = conn
        .query_row(
            &format!(
                "SELECT {GOAL_SET_COLUMNS} FROM goal_sets gs JOIN maps m ON m.id = gs.map_id WHERE gs.name = ?1"
            ),
            params![set_name],
            goal_set_row,
        )
        .optional()?;
    let Some(goal_set) = goal_set else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {GOAL_COLUMNS} FROM goals WHERE goal_set_id = ?1 ORDER BY sequence_number"
    ))?;
    let goals = stmt
        .query_map(params![goal_set.id.0], goal_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(GoalSetDetail { goal_set, goals }))
}

/// Appends `pose` to `set_name` inside the caller's transaction, returning the
/// new goal's id and sequence number.
pub(crate) fn append_goal_in(
    conn: &Connection,
    set_name: &str,
    pose: &Pose,
) -> StoreResult<(GoalId, u32)> {
    let (goal_set_id, total_goals) = find_goal_set(conn, set_name)?;
    let sequence_number = total_goals + 1;
    let goal_id = insert_goal(conn, goal_set_id, sequence_number, pose)?;
    conn.execute(
        "UPDATE goal_sets SET total_goals = total_goals + 1, updated_at_ms = ?2 WHERE id = ?1",
        params![goal_set_id.0, now_ms()],
    )?;
    Ok((goal_id, sequence_number))
}

fn find_goal_set(conn: &Connection, set_name: &str) -> StoreResult<(GoalSetId, u32)> {
    conn.query_row(
        "SELECT id, total_goals FROM goal_sets WHERE name = ?1",
        params![set_name],
        |row| Ok((GoalSetId(row.get(0)?), row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found(format!("goal set '{set_name}' not found")))
}

fn find_goal(
    conn: &Connection,
    goal_set_id: GoalSetId,
    set_name: &str,
    sequence_number: u32,
) -> StoreResult<GoalId> {
    conn.query_row(
        "SELECT id FROM goals WHERE goal_set_id = ?1 AND sequence_number = ?2",
        params![goal_set_id.0, sequence_number],
        |row| Ok(GoalId(row.get(0)?)),
    )
    .optional()?
    .ok_or_else(|| {
        StoreError::not_found(format!("goal {sequence_number} not found in goal set '{set_name}'"))
    })
}

fn fetch_goal(conn: &Connection, goal_id: GoalId) -> StoreResult<Goal> {
    let goal = conn.query_row(
        &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
        params![goal_id.0],
        goal_row,
    )?;
    Ok(goal)
}

fn insert_goal(
    conn: &Connection,
    goal_set_id: GoalSetId,
    sequence_number: u32,
    pose: &Pose,
) -> StoreResult<GoalId> {
    conn.execute(
        "
        INSERT INTO goals (
          goal_set_id, sequence_number, position_x, position_y,
          orientation_z, orientation_w, tolerance_xy, tolerance_yaw
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            goal_set_id.0,
            sequence_number,
            pose.position_x,
            pose.position_y,
            pose.orientation_z,
            pose.orientation_w,
            pose.tolerance_xy,
            pose.tolerance_yaw
        ],
    )?;
    Ok(GoalId(conn.last_insert_rowid()))
}

fn goal_set_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GoalSet> {
    Ok(GoalSet {
        id: GoalSetId(row.get(0)?),
        name: row.get(1)?,
        map_id: row.get(2)?,
        map_name: row.get(3)?,
        description: row.get(4)?,
        total_goals: row.get(5)?,
        created_at_ms: row.get::<_, i64>(6)? as u64,
        updated_at_ms: row.get::<_, i64>(7)? as u64,
    })
}

fn goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: GoalId(row.get(0)?),
        goal_set_id: GoalSetId(row.get(1)?),
        sequence_number: row.get(2)?,
        pose: Pose {
            position_x: row.get(3)?,
            position_y: row.get(4)?,
            orientation_z: row.get(5)?,
            orientation_w: row.get(6)?,
            tolerance_xy: row.get(7)?,
            tolerance_yaw: row.get(8)?,
        },
    })
}
