use polebot_core::{Category, CategoryId, now_ms};
use polebot_protocol::CategoryRequest;
use rusqlite::{Connection, params};

use super::required;
use crate::error::{StoreError, StoreResult};

pub fn create_category(conn: &mut Connection, request: &CategoryRequest) -> StoreResult<Category> {
    let name = required(request.name.as_deref(), "name")?;
    conn.execute(
        "INSERT INTO categories (name, description, icon, color, created_at_ms) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, request.description, request.icon, request.color, now_ms()],
    )?;
    Ok(Category {
        id: CategoryId(conn.last_insert_rowid()),
        name: name.to_string(),
        description: request.description.clone(),
        icon: request.icon.clone(),
        color: request.color.clone(),
    })
}

pub fn list_categories(conn: &Connection) -> StoreResult<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT id, name, description, icon, color FROM categories ORDER BY name, id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Category {
            id: CategoryId(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            icon: row.get(3)?,
            color: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

pub fn update_category(
    conn: &mut Connection,
    category_id: CategoryId,
    request: &CategoryRequest,
) -> StoreResult<Category> {
    let name = required(request.name.as_deref(), "name")?;
    let updated = conn.execute(
        "UPDATE categories SET name = ?2, description = ?3, icon = ?4, color = ?5 WHERE id = ?1",
        params![category_id.0, name, request.description, request.icon, request.color],
    )?;
    if updated == 0 {
        return Err(category_not_found(category_id));
    }
    Ok(Category {
        id: category_id,
        name: name.to_string(),
        description: request.description.clone(),
        icon: request.icon.clone(),
        color: request.color.clone(),
    })
}

/// Deletes a category; missions in it become uncategorized.
pub fn delete_category(conn: &mut Connection, category_id: CategoryId) -> StoreResult<()> {
    let deleted = conn.execute("DELETE FROM categories WHERE id = ?1", params![category_id.0])?;
    if deleted == 0 {
        return Err(category_not_found(category_id));
    }
    Ok(())
}

pub(crate) fn ensure_category(conn: &Connection, category_id: Option<CategoryId>) -> StoreResult<()> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
        params![category_id.0],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(category_not_found(category_id));
    }
    Ok(())
}

fn category_not_found(category_id: CategoryId) -> StoreError {
    StoreError::not_found(format!("category {category_id} not found"))
}
