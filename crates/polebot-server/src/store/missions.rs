use polebot_core::{
    CategoryId, FailurePolicy, GoalId, GoalSetId, GoalTransition, Mission, MissionDetail,
    MissionGoal, MissionId, NextGoalTrigger, Pose, now_ms,
};
use polebot_protocol::{MissionGoalRef, MissionRequest, ReplaceMissionGoalsRequest};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use super::{categories, goal_sets, required};
use crate::error::{StoreError, StoreResult};

const MISSION_COLUMNS: &str = "
    m.id, m.name, m.description, m.category_id,
    (SELECT COUNT(*) FROM mission_goals mg WHERE mg.mission_id = m.id),
    m.last_executed_ms, m.created_at_ms, m.updated_at_ms
";

pub fn create_mission(conn: &mut Connection, request: &MissionRequest) -> StoreResult<MissionDetail> {
    let name = required(request.name.as_deref(), "name")?;
    let now = now_ms();

    let tx = conn.transaction()?;
    categories::ensure_category(&tx, request.category_id)?;
    tx.execute(
        "
        INSERT INTO missions (name, description, category_id, last_executed_ms, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, NULL, ?4, ?4)
        ",
        params![name, request.description, request.category_id.map(|id| id.0), now],
    )?;
    let mission_id = MissionId(tx.last_insert_rowid());
    if let Some(goals) = request.goals.as_deref() {
        write_mission_goals(&tx, mission_id, request.goal_set.as_deref(), goals)?;
    }
    let mission = load_mission(&tx, mission_id)?;
    tx.commit()?;

    info!(%mission_id, mission = name, steps = mission.goals.len(), "mission created");
    Ok(mission)
}

/// Rewrites mission metadata. When `goals` is present the steps are replaced
/// in the same transaction.
pub fn update_mission(
    conn: &mut Connection,
    mission_id: MissionId,
    request: &MissionRequest,
) -> StoreResult<MissionDetail> {
    let name = required(request.name.as_deref(), "name")?;

    let tx = conn.transaction()?;
    ensure_mission(&tx, mission_id)?;
    categories::ensure_category(&tx, request.category_id)?;
    tx.execute(
        "
        UPDATE missions
        SET name = ?2, description = ?3, category_id = ?4, updated_at_ms = ?5
        WHERE id = ?1
        ",
        params![
            mission_id.0,
            name,
            request.description,
            request.category_id.map(|id| id.0),
            now_ms()
        ],
    )?;
    if let Some(goals) = request.goals.as_deref() {
        write_mission_goals(&tx, mission_id, request.goal_set.as_deref(), goals)?;
    }
    let mission = load_mission(&tx, mission_id)?;
    tx.commit()?;
    Ok(mission)
}

/// Replaces every step of a mission. Goals referenced by id are only linked,
/// never modified; inline poses are appended to their goal set first.
pub fn replace_mission_goals(
    conn: &mut Connection,
    mission_id: MissionId,
    request: &ReplaceMissionGoalsRequest,
) -> StoreResult<MissionDetail> {
    let goals = request.goals.as_deref().ok_or_else(|| StoreError::validation("goals is required"))?;

    let tx = conn.transaction()?;
    ensure_mission(&tx, mission_id)?;
    write_mission_goals(&tx, mission_id, request.goal_set.as_deref(), goals)?;
    tx.execute(
        "UPDATE missions SET updated_at_ms = ?2 WHERE id = ?1",
        params![mission_id.0, now_ms()],
    )?;
    let mission = load_mission(&tx, mission_id)?;
    tx.commit()?;

    info!(%mission_id, steps = mission.goals.len(), "mission goals replaced");
    Ok(mission)
}

/// Deletes a mission and its steps. The referenced goals stay.
pub fn delete_mission(conn: &mut Connection, mission_id: MissionId) -> StoreResult<()> {
    let deleted = conn.execute("DELETE FROM missions WHERE id = ?1", params![mission_id.0])?;
    if deleted == 0 {
        return Err(mission_not_found(mission_id));
    }
    info!(%mission_id, "mission deleted");
    Ok(())
}

/// Stamps `last_executed_ms` with the current time and returns it.
pub fn mark_executed(conn: &mut Connection, mission_id: MissionId) -> StoreResult<u64> {
    let executed_at = now_ms();
    let updated = conn.execute(
        "UPDATE missions SET last_executed_ms = ?2 WHERE id = ?1",
        params![mission_id.0, executed_at],
    )?;
    if updated == 0 {
        return Err(mission_not_found(mission_id));
    }
    Ok(executed_at)
}

pub fn list_missions(conn: &Connection) -> StoreResult<Vec<Mission>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MISSION_COLUMNS} FROM missions m ORDER BY m.updated_at_ms DESC, m.id DESC"
    ))?;
    let rows = stmt.query_map([], mission_row)?;
    Ok(rows.collect::<Result<_, _>>()?)
}

pub fn get_mission(conn: &Connection, mission_id: MissionId) -> StoreResult<Option<MissionDetail>> {
    let mission = conn
        .query_row(
            &format!("SELECT {MISSION_COLUMNS} FROM missions m WHERE m.id = ?1"),
            params![mission_id.0],
            mission_row,
        )
        .optional()?;
    let Some(mission) = mission else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "
        SELECT mg.id, mg.mission_id, mg.goal_id, g.goal_set_id, mg.sequence_number,
               g.position_x, g.position_y, g.orientation_z, g.orientation_w,
               g.tolerance_xy, g.tolerance_yaw,
               mg.next_goal_trigger, mg.wait_time, mg.sensor_type, mg.sensor_condition,
               mg.timeout, mg.retry_count, mg.on_failure
        FROM mission_goals mg
        JOIN goals g ON g.id = mg.goal_id
        WHERE mg.mission_id = ?1
        ORDER BY mg.sequence_number
        ",
    )?;
    let goals = stmt
        .query_map(params![mission_id.0], mission_goal_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(MissionDetail { mission, goals }))
}

pub(crate) fn missions_linked_to_goal_set(
    conn: &Connection,
    goal_set_id: GoalSetId,
) -> StoreResult<Vec<MissionId>> {
    let mut stmt = conn.prepare(
        "
        SELECT DISTINCT mg.mission_id
        FROM mission_goals mg JOIN goals g ON g.id = mg.goal_id
        WHERE g.goal_set_id = ?1
        ",
    )?;
    let rows = stmt.query_map(params![goal_set_id.0], |row| Ok(MissionId(row.get(0)?)))?;
    Ok(rows.collect::<Result<_, _>>()?)
}

pub(crate) fn missions_linked_to_goal(
    conn: &Connection,
    goal_id: GoalId,
) -> StoreResult<Vec<MissionId>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT mission_id FROM mission_goals WHERE goal_id = ?1")?;
    let rows = stmt.query_map(params![goal_id.0], |row| Ok(MissionId(row.get(0)?)))?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Closes gaps left in a mission's step numbering after goals were deleted.
pub(crate) fn renumber_mission_goals(conn: &Connection, mission_id: MissionId) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT id FROM mission_goals WHERE mission_id = ?1 ORDER BY sequence_number",
    )?;
    let link_ids = stmt
        .query_map(params![mission_id.0], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    conn.execute(
        "UPDATE mission_goals SET sequence_number = -sequence_number WHERE mission_id = ?1",
        params![mission_id.0],
    )?;
    for (index, link_id) in link_ids.iter().enumerate() {
        conn.execute(
            "UPDATE mission_goals SET sequence_number = ?2 WHERE id = ?1",
            params![link_id, index as u32 + 1],
        )?;
    }
    Ok(())
}

fn write_mission_goals(
    conn: &Connection,
    mission_id: MissionId,
    default_goal_set: Option<&str>,
    entries: &[MissionGoalRef],
) -> StoreResult<()> {
    conn.execute("DELETE FROM mission_goals WHERE mission_id = ?1", params![mission_id.0])?;

    for (index, entry) in entries.iter().enumerate() {
        let sequence_number = index as u32 + 1;
        let goal_id = match entry.goal_id {
            Some(goal_id) => {
                ensure_goal(conn, goal_id)?;
                goal_id
            }
            None => {
                let pose = entry.pose.to_pose().ok_or_else(|| {
                    StoreError::validation(format!(
                        "mission goal {sequence_number} needs a goal_id or x and y"
                    ))
                })?;
                let goal_set = entry
                    .goal_set
                    .as_deref()
                    .or(default_goal_set)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        StoreError::validation(format!(
                            "mission goal {sequence_number} has an inline pose but no goal_set"
                        ))
                    })?;
                goal_sets::append_goal_in(conn, goal_set, &pose)?.0
            }
        };

        let transition = entry.transition.resolve();
        conn.execute(
            "
            INSERT INTO mission_goals (
              mission_id, goal_id, sequence_number, next_goal_trigger, wait_time,
              sensor_type, sensor_condition, timeout, retry_count, on_failure
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                mission_id.0,
                goal_id.0,
                sequence_number,
                transition.next_goal_trigger.as_str(),
                transition.wait_time,
                transition.sensor_type,
                transition.sensor_condition,
                transition.timeout,
                transition.retry_count,
                transition.on_failure.as_str()
            ],
        )?;
    }
    Ok(())
}

fn load_mission(conn: &Connection, mission_id: MissionId) -> StoreResult<MissionDetail> {
    get_mission(conn, mission_id)?.ok_or_else(|| mission_not_found(mission_id))
}

fn ensure_mission(conn: &Connection, mission_id: MissionId) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM missions WHERE id = ?1)",
        params![mission_id.0],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(mission_not_found(mission_id));
    }
    Ok(())
}

fn ensure_goal(conn: &Connection, goal_id: GoalId) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM goals WHERE id = ?1)",
        params![goal_id.0],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(StoreError::not_found(format!("goal {goal_id} not found")));
    }
    Ok(())
}

fn mission_not_found(mission_id: MissionId) -> StoreError {
    StoreError::not_found(format!("mission {mission_id} not found"))
}

fn mission_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Mission> {
    Ok(Mission {
        id: MissionId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get::<_, Option<i64>>(3)?.map(CategoryId),
        goal_count: row.get(4)?,
        last_executed_ms: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        created_at_ms: row.get::<_, i64>(6)? as u64,
        updated_at_ms: row.get::<_, i64>(7)? as u64,
    })
}

fn mission_goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MissionGoal> {
    Ok(MissionGoal {
        id: row.get(0)?,
        mission_id: MissionId(row.get(1)?),
        goal_id: GoalId(row.get(2)?),
        goal_set_id: GoalSetId(row.get(3)?),
        sequence_number: row.get(4)?,
        pose: Pose {
            position_x: row.get(5)?,
            position_y: row.get(6)?,
            orientation_z: row.get(7)?,
            orientation_w: row.get(8)?,
            tolerance_xy: row.get(9)?,
            tolerance_yaw: row.get(10)?,
        },
        transition: GoalTransition {
            next_goal_trigger: NextGoalTrigger::from_db(&row.get::<_, String>(11)?),
            wait_time: row.get(12)?,
            sensor_type: row.get(13)?,
            sensor_condition: row.get(14)?,
            timeout: row.get(15)?,
            retry_count: row.get(16)?,
            on_failure: FailurePolicy::from_db(&row.get::<_, String>(17)?),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::{create_category, delete_category, get_goal_set, remove_goal, replace_goal_set};
    use polebot_protocol::{CategoryRequest, PoseInput, SaveGoalSetRequest, TransitionInput};

    fn seed_goal_set(conn: &mut Connection, name: &str, points: &[(f64, f64)]) -> Vec<GoalId> {
        replace_goal_set(
            conn,
            &SaveGoalSetRequest {
                map_name: Some("warehouse".into()),
                set_name: Some(name.into()),
                goals: Some(points.iter().map(|&(x, y)| PoseInput::at(x, y)).collect()),
                ..SaveGoalSetRequest::default()
            },
        )
        .unwrap();
        get_goal_set(conn, name).unwrap().unwrap().goals.iter().map(|goal| goal.id).collect()
    }

    fn new_mission(conn: &mut Connection, goals: Vec<MissionGoalRef>) -> MissionDetail {
        create_mission(
            conn,
            &MissionRequest {
                name: Some("night patrol".into()),
                goals: Some(goals),
                ..MissionRequest::default()
            },
        )
        .unwrap()
    }

    fn goals_table(conn: &Connection) -> Vec<(i64, i64, u32, f64, f64, f64, f64)> {
        let mut stmt = conn
            .prepare(
                "SELECT id, goal_set_id, sequence_number, position_x, position_y, orientation_z, orientation_w FROM goals ORDER BY id",
            )
            .unwrap();
        stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
    }

    fn step_goals(mission: &MissionDetail) -> Vec<GoalId> {
        mission.goals.iter().map(|step| step.goal_id).collect()
    }

    fn step_numbers(mission: &MissionDetail) -> Vec<u32> {
        mission.goals.iter().map(|step| step.sequence_number).collect()
    }

    #[test]
    fn create_links_goals_in_order_with_defaults() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);

        let mission = new_mission(
            &mut conn,
            vec![MissionGoalRef::existing(ids[2]), MissionGoalRef::existing(ids[0])],
        );

        assert_eq!(mission.mission.goal_count, 2);
        assert_eq!(step_goals(&mission), vec![ids[2], ids[0]]);
        assert_eq!(step_numbers(&mission), vec![1, 2]);
        assert_eq!(mission.goals[0].pose.position_x, 3.0);
        assert_eq!(mission.goals[0].transition, GoalTransition::default());
        assert!(mission.mission.last_executed_ms.is_none());
    }

    #[test]
    fn replace_by_id_never_touches_goal_rows() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        let mission = new_mission(&mut conn, vec![MissionGoalRef::existing(ids[0])]);
        let before = goals_table(&conn);

        let replaced = replace_mission_goals(
            &mut conn,
            mission.mission.id,
            &ReplaceMissionGoalsRequest {
                goal_set: None,
                goals: Some(vec![
                    MissionGoalRef {
                        pose: PoseInput::at(50.0, 50.0),
                        ..MissionGoalRef::existing(ids[1])
                    },
                    MissionGoalRef::existing(ids[0]),
                    MissionGoalRef::existing(ids[1]),
                ]),
            },
        )
        .unwrap();

        assert_eq!(goals_table(&conn), before);
        assert_eq!(step_goals(&replaced), vec![ids[1], ids[0], ids[1]]);
        assert_eq!(step_numbers(&replaced), vec![1, 2, 3]);
        assert_eq!(replaced.goals[0].pose.position_x, 2.0);
    }

    #[test]
    fn inline_goals_are_appended_to_their_goal_set() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0)]);
        seed_goal_set(&mut conn, "B", &[(0.0, 0.0)]);

        let mission = create_mission(
            &mut conn,
            &MissionRequest {
                name: Some("delivery".into()),
                goal_set: Some("A".into()),
                goals: Some(vec![
                    MissionGoalRef::existing(ids[1]),
                    MissionGoalRef {
                        pose: PoseInput::at(7.0, 8.0),
                        transition: TransitionInput {
                            next_goal_trigger: Some(NextGoalTrigger::Sensor),
                            sensor_type: Some("lidar".into()),
                            on_failure: Some(FailurePolicy::Retry),
                            retry_count: Some(2),
                            ..TransitionInput::default()
                        },
                        ..MissionGoalRef::default()
                    },
                    MissionGoalRef::inline("B", PoseInput::at(9.0, 9.0)),
                ]),
                ..MissionRequest::default()
            },
        )
        .unwrap();

        let a = get_goal_set(&conn, "A").unwrap().unwrap();
        assert_eq!(a.goal_set.total_goals, 3);
        assert_eq!(a.goals[2].sequence_number, 3);
        assert_eq!(a.goals[2].id, mission.goals[1].goal_id);
        let b = get_goal_set(&conn, "B").unwrap().unwrap();
        assert_eq!(b.goal_set.total_goals, 2);
        assert_eq!(b.goals[1].id, mission.goals[2].goal_id);

        let sensor_step = &mission.goals[1].transition;
        assert_eq!(sensor_step.next_goal_trigger, NextGoalTrigger::Sensor);
        assert_eq!(sensor_step.sensor_type.as_deref(), Some("lidar"));
        assert_eq!(sensor_step.on_failure, FailurePolicy::Retry);
        assert_eq!(sensor_step.retry_count, 2);
        assert_eq!(sensor_step.timeout, 60);
    }

    #[test]
    fn failed_replace_keeps_previous_steps() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0)]);
        let mission = new_mission(
            &mut conn,
            vec![MissionGoalRef::existing(ids[0]), MissionGoalRef::existing(ids[1])],
        );

        let missing_goal = replace_mission_goals(
            &mut conn,
            mission.mission.id,
            &ReplaceMissionGoalsRequest {
                goal_set: None,
                goals: Some(vec![
                    MissionGoalRef::inline("A", PoseInput::at(5.0, 5.0)),
                    MissionGoalRef::existing(GoalId(9999)),
                ]),
            },
        )
        .unwrap_err();
        assert!(matches!(missing_goal, StoreError::NotFound(_)));

        let no_goal_set = replace_mission_goals(
            &mut conn,
            mission.mission.id,
            &ReplaceMissionGoalsRequest {
                goal_set: None,
                goals: Some(vec![MissionGoalRef { pose: PoseInput::at(1.0, 1.0), ..MissionGoalRef::default() }]),
            },
        )
        .unwrap_err();
        assert!(matches!(no_goal_set, StoreError::Validation(_)));

        let after = get_mission(&conn, mission.mission.id).unwrap().unwrap();
        assert_eq!(step_goals(&after), vec![ids[0], ids[1]]);
        assert_eq!(get_goal_set(&conn, "A").unwrap().unwrap().goal_set.total_goals, 2);
    }

    #[test]
    fn unknown_mission_is_not_found() {
        let mut conn = db::open_in_memory().unwrap();
        let request = ReplaceMissionGoalsRequest { goal_set: None, goals: Some(vec![]) };
        assert!(matches!(
            replace_mission_goals(&mut conn, MissionId(1), &request),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(delete_mission(&mut conn, MissionId(1)), Err(StoreError::NotFound(_))));
        assert!(matches!(mark_executed(&mut conn, MissionId(1)), Err(StoreError::NotFound(_))));
        assert!(get_mission(&conn, MissionId(1)).unwrap().is_none());
    }

    #[test]
    fn delete_keeps_shared_goals() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0)]);
        let first = new_mission(&mut conn, vec![MissionGoalRef::existing(ids[0])]);
        let second = new_mission(&mut conn, vec![MissionGoalRef::existing(ids[0])]);
        let before = goals_table(&conn);

        delete_mission(&mut conn, first.mission.id).unwrap();

        assert!(get_mission(&conn, first.mission.id).unwrap().is_none());
        assert_eq!(goals_table(&conn), before);
        let links: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM mission_goals WHERE mission_id = ?1",
                params![first.mission.id.0],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(links, 0);
        assert_eq!(get_mission(&conn, second.mission.id).unwrap().unwrap().goals.len(), 1);
    }

    #[test]
    fn removing_a_goal_drops_and_renumbers_mission_steps() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        let mission = new_mission(
            &mut conn,
            vec![
                MissionGoalRef::existing(ids[0]),
                MissionGoalRef::existing(ids[1]),
                MissionGoalRef::existing(ids[2]),
                MissionGoalRef::existing(ids[1]),
            ],
        );

        remove_goal(&mut conn, "A", 2).unwrap();

        let after = get_mission(&conn, mission.mission.id).unwrap().unwrap();
        assert_eq!(step_goals(&after), vec![ids[0], ids[2]]);
        assert_eq!(step_numbers(&after), vec![1, 2]);
        assert_eq!(after.mission.goal_count, 2);
    }

    #[test]
    fn replacing_a_goal_set_drops_its_steps_from_missions() {
        let mut conn = db::open_in_memory().unwrap();
        let a = seed_goal_set(&mut conn, "A", &[(1.0, 1.0)]);
        let b = seed_goal_set(&mut conn, "B", &[(2.0, 2.0)]);
        let mission = new_mission(
            &mut conn,
            vec![
                MissionGoalRef::existing(a[0]),
                MissionGoalRef::existing(b[0]),
                MissionGoalRef::existing(a[0]),
            ],
        );

        seed_goal_set(&mut conn, "A", &[(5.0, 5.0)]);

        let after = get_mission(&conn, mission.mission.id).unwrap().unwrap();
        assert_eq!(step_goals(&after), vec![b[0]]);
        assert_eq!(step_numbers(&after), vec![1]);
    }

    #[test]
    fn mark_executed_sets_timestamp() {
        let mut conn = db::open_in_memory().unwrap();
        let mission = new_mission(&mut conn, vec![]);

        let executed_at = mark_executed(&mut conn, mission.mission.id).unwrap();

        let after = get_mission(&conn, mission.mission.id).unwrap().unwrap();
        assert_eq!(after.mission.last_executed_ms, Some(executed_at));
    }

    #[test]
    fn category_must_exist_and_is_cleared_on_delete() {
        let mut conn = db::open_in_memory().unwrap();
        let err = create_mission(
            &mut conn,
            &MissionRequest {
                name: Some("patrol".into()),
                category_id: Some(CategoryId(77)),
                ..MissionRequest::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(list_missions(&conn).unwrap().is_empty());

        let category = create_category(
            &mut conn,
            &CategoryRequest { name: Some("inspection".into()), ..CategoryRequest::default() },
        )
        .unwrap();
        let mission = create_mission(
            &mut conn,
            &MissionRequest {
                name: Some("patrol".into()),
                category_id: Some(category.id),
                ..MissionRequest::default()
            },
        )
        .unwrap();
        assert_eq!(mission.mission.category_id, Some(category.id));

        delete_category(&mut conn, category.id).unwrap();
        let after = get_mission(&conn, mission.mission.id).unwrap().unwrap();
        assert!(after.mission.category_id.is_none());
    }

    #[test]
    fn update_rewrites_metadata_and_optionally_steps() {
        let mut conn = db::open_in_memory().unwrap();
        let ids = seed_goal_set(&mut conn, "A", &[(1.0, 1.0), (2.0, 2.0)]);
        let mission = new_mission(&mut conn, vec![MissionGoalRef::existing(ids[0])]);

        let renamed = update_mission(
            &mut conn,
            mission.mission.id,
            &MissionRequest {
                name: Some("day patrol".into()),
                description: Some("loading dock".into()),
                ..MissionRequest::default()
            },
        )
        .unwrap();
        assert_eq!(renamed.mission.name, "day patrol");
        assert_eq!(step_goals(&renamed), vec![ids[0]]);

        let restepped = update_mission(
            &mut conn,
            mission.mission.id,
            &MissionRequest {
                name: Some("day patrol".into()),
                goals: Some(vec![MissionGoalRef::existing(ids[1])]),
                ..MissionRequest::default()
            },
        )
        .unwrap();
        assert_eq!(step_goals(&restepped), vec![ids[1]]);
        assert!(restepped.mission.description.is_none());

        let err = update_mission(&mut conn, MissionId(404), &MissionRequest {
            name: Some("ghost".into()),
            ..MissionRequest::default()
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
