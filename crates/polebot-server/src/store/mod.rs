//! Relational persistence for maps, goal sets, missions and categories.
//!
//! Every operation that touches more than one row runs inside a single
//! rusqlite transaction; dropping an uncommitted transaction rolls it back,
//! so an early `?` return leaves the database exactly as it was.

mod categories;
mod goal_sets;
mod maps;
mod missions;

pub use categories::{create_category, delete_category, list_categories, update_category};
pub use goal_sets::{
    append_goal, delete_goal_set, get_goal_set, list_goal_sets, remove_goal, replace_goal_set,
    update_goal,
};
pub use maps::{get_map, list_maps, upsert_map};
pub use missions::{
    create_mission, delete_mission, get_mission, list_missions, mark_executed,
    replace_mission_goals, update_mission,
};

use crate::error::{StoreError, StoreResult};

/// Trimmed value of a required text field.
fn required<'a>(value: Option<&'a str>, field: &str) -> StoreResult<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(StoreError::validation(format!("{field} is required"))),
    }
}
