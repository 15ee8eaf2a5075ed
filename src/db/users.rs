//! User registration and cleanup.

use rusqlite::params;
use serde::Serialize;

use super::Database;
use crate::error::{Error, Result};

/// An identity tracked by the recognizer. Created on first face
/// registration; immutable afterwards except for name correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

impl Database {
    /// Register a user under an externally assigned id. If the id already
    /// exists, the name is corrected when it differs; nothing else changes.
    pub fn register_user(&self, user_id: i64, name: &str) -> Result<()> {
        match self.get_user(user_id)? {
            Some(existing) => {
                if existing.name != name {
                    self.conn.execute(
                        "UPDATE users SET name = ? WHERE id = ?",
                        params![name, user_id],
                    )?;
                    tracing::info!(user_id, old = %existing.name, new = %name, "corrected user name");
                }
                Ok(())
            }
            None => {
                self.conn.execute(
                    "INSERT INTO users (id, name) VALUES (?, ?)",
                    params![user_id, name],
                )?;
                tracing::info!(user_id, %name, "registered user");
                Ok(())
            }
        }
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let result = self.conn.query_row(
            "SELECT id, name FROM users WHERE id = ?",
            [user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a user id is registered. Store failures propagate; only a
    /// genuinely absent row reads as false.
    pub fn user_exists(&self, user_id: i64) -> Result<bool> {
        let result = self
            .conn
            .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |_| Ok(()));
        match result {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All registered users, ordered by display name.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM users ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a user and all of their attendance records in one
    /// transaction. Returns how many records were removed.
    pub fn delete_user(&self, user_id: i64) -> Result<usize> {
        if !self.user_exists(user_id)? {
            return Err(Error::UnknownUser(user_id));
        }
        let tx = self.transaction()?;
        let records = tx.execute(
            "DELETE FROM attendance_records WHERE user_id = ?",
            [user_id],
        )?;
        tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
        tx.commit()?;
        tracing::info!(user_id, records, "deleted user and associated records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_register_and_lookup() {
        let db = test_db();
        db.register_user(2104449, "Yasser").unwrap();
        let user = db.get_user(2104449).unwrap().unwrap();
        assert_eq!(user.name, "Yasser");
        assert!(db.user_exists(2104449).unwrap());
        assert!(!db.user_exists(999).unwrap());
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn test_reregister_corrects_name() {
        let db = test_db();
        db.register_user(1, "Alise").unwrap();
        db.register_user(1, "Alice").unwrap();
        assert_eq!(db.get_user(1).unwrap().unwrap().name, "Alice");
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn test_delete_user_cascades_records() {
        let db = test_db();
        db.register_user(1, "Alice").unwrap();
        db.register_user(2, "Bob").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        db.insert_record(1, ts, 0.95).unwrap();
        db.insert_record(1, ts + chrono::Duration::hours(1), 0.8).unwrap();
        db.insert_record(2, ts, 0.9).unwrap();

        let removed = db.delete_user(1).unwrap();
        assert_eq!(removed, 2);
        assert!(db.get_user(1).unwrap().is_none());
        assert_eq!(db.history(2, None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_unknown_user() {
        let db = test_db();
        assert!(matches!(db.delete_user(7), Err(Error::UnknownUser(7))));
    }

    #[test]
    fn test_user_exists_propagates_store_failure() {
        let db = test_db();
        // A broken store must not read as "user absent".
        db.conn.execute_batch("DROP TABLE users").unwrap();
        assert!(matches!(db.user_exists(1), Err(Error::Persistence(_))));
    }

    #[test]
    fn test_list_users_ordered_by_name() {
        let db = test_db();
        db.register_user(3, "Carol").unwrap();
        db.register_user(1, "Bob").unwrap();
        db.register_user(2, "Alice").unwrap();
        let names: Vec<String> = db
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }
}
