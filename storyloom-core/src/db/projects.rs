use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{fmt_ts, ts_col, uuid_col, Database};
use crate::error::Result;
use crate::models::{Project, Tab};

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        root_path: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

fn tab_from_row(row: &Row<'_>) -> rusqlite::Result<Tab> {
    Ok(Tab {
        id: uuid_col(row, 0)?,
        project_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        position: row.get(3)?,
    })
}

impl Database {
    pub fn create_project(&self, name: &str, root_path: &str) -> Result<Project> {
        let session = self.session()?;
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            root_path: root_path.to_string(),
            created_at: chrono::Utc::now(),
        };
        session.execute(
            "INSERT INTO projects (id, name, root_path, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                project.id.to_string(),
                project.name,
                project.root_path,
                fmt_ts(&project.created_at),
            ],
        )?;
        tracing::info!(project = %project.id, name, "project created");
        Ok(project)
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let session = self.session()?;
        let project = session
            .query_row(
                "SELECT id, name, root_path, created_at FROM projects WHERE id = ?1",
                params![id.to_string()],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// All projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let session = self.session()?;
        let mut stmt = session.prepare(
            "SELECT id, name, root_path, created_at FROM projects ORDER BY created_at DESC",
        )?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    pub fn create_tab(&self, project_id: Uuid, name: &str, position: i64) -> Result<Tab> {
        let session = self.session()?;
        let tab = Tab {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_string(),
            position,
        };
        session.execute(
            "INSERT INTO tabs (id, project_id, name, position) VALUES (?1, ?2, ?3, ?4)",
            params![
                tab.id.to_string(),
                tab.project_id.to_string(),
                tab.name,
                tab.position,
            ],
        )?;
        Ok(tab)
    }

    /// Tabs of a project in display order.
    pub fn list_tabs(&self, project_id: Uuid) -> Result<Vec<Tab>> {
        let session = self.session()?;
        let mut stmt = session.prepare(
            "SELECT id, project_id, name, position FROM tabs WHERE project_id = ?1 ORDER BY position",
        )?;
        let tabs = stmt
            .query_map(params![project_id.to_string()], tab_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tabs)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_util::open_test_db;

    #[test]
    fn tabs_come_back_in_position_order() {
        let (_dir, db) = open_test_db();
        let project = db.create_project("My Movie", "/tmp/movie").unwrap();
        db.create_tab(project.id, "Shooting", 2).unwrap();
        db.create_tab(project.id, "Story", 0).unwrap();
        db.create_tab(project.id, "Design", 1).unwrap();

        let names: Vec<String> = db
            .list_tabs(project.id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["Story", "Design", "Shooting"]);
    }

    #[test]
    fn list_projects_newest_first() {
        let (_dir, db) = open_test_db();
        db.create_project("First", "/a").unwrap();
        db.create_project("Second", "/b").unwrap();
        let projects = db.list_projects().unwrap();
        assert_eq!(projects.len(), 2);
    }
}
