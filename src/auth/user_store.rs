//! Credential Store
//! Mission: Securely store and manage identity records with SQLite

use crate::auth::models::{DashboardStats, Identity, Role, UpdateProfileRequest};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

/// Typed store failures. `EmailTaken` comes straight from the sqlite
/// uniqueness constraint, so concurrent duplicate signups are rejected by
/// the storage engine rather than application-level locking.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("identity not found")]
    NotFound,
    #[error("credential store error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Identity storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new store and initialize the schema
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        let conn = Connection::open(&self.db_path)?;

        // Email is the login key: unique and case-insensitive at the schema
        // level. "A@x.com" and "a@x.com" are the same account.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE COLLATE NOCASE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.create_default_admin(&conn)?;

        Ok(())
    }

    /// Create default admin user for initial setup
    fn create_default_admin(&self, conn: &Connection) -> Result<(), StoreError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;

        if count == 0 {
            let password_hash = hash("admin123", DEFAULT_COST)?;
            let now = Utc::now().to_rfc3339();

            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    "Admin",
                    "admin@portfolio.local",
                    password_hash,
                    Role::Admin.as_str(),
                    now,
                    now,
                ],
            )?;

            info!("🔐 Default admin created (email: admin@portfolio.local, password: admin123)");
            warn!("⚠️  CHANGE DEFAULT PASSWORD IN PRODUCTION!");
        }

        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
        let id_str: String = row.get(0)?;
        let role_str: String = row.get(4)?;
        Ok(Identity {
            id: Uuid::parse_str(&id_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: Role::from_str(&role_str).unwrap_or(Role::User),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Get identity by email (case-insensitive, via the NOCASE column)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(
            "SELECT id, name, email, password_hash, role, created_at, updated_at
             FROM users WHERE email = ?1",
        )?;

        match stmt.query_row(params![email], Self::map_row) {
            Ok(identity) => Ok(Some(identity)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get identity by id
    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<Identity>, StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(
            "SELECT id, name, email, password_hash, role, created_at, updated_at
             FROM users WHERE id = ?1",
        )?;

        match stmt.query_row(params![id.to_string()], Self::map_row) {
            Ok(identity) => Ok(Some(identity)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify email and password; returns the identity on success so the
    /// caller does not need a second lookup.
    pub fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, StoreError> {
        match self.get_user_by_email(email)? {
            Some(identity) => {
                if verify(password, &identity.password_hash)? {
                    Ok(Some(identity))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Create a new identity
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Identity, StoreError> {
        let password_hash = hash(password, DEFAULT_COST)?;
        let now = Utc::now().to_rfc3339();

        let identity = Identity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                identity.id.to_string(),
                identity.name,
                identity.email,
                identity.password_hash,
                identity.role.as_str(),
                identity.created_at,
                identity.updated_at,
            ],
        )
        .map_err(map_unique_violation)?;

        info!("✅ Created identity: {} ({})", identity.email, identity.role.as_str());

        Ok(identity)
    }

    /// Apply a profile update (name / email / password). Role is untouched
    /// here; role changes go through `set_role` only.
    pub fn update_user(
        &self,
        id: &Uuid,
        update: &UpdateProfileRequest,
    ) -> Result<Identity, StoreError> {
        let mut identity = self.get_user_by_id(id)?.ok_or(StoreError::NotFound)?;

        if let Some(name) = &update.name {
            identity.name = name.clone();
        }
        if let Some(email) = &update.email {
            identity.email = email.clone();
        }
        if let Some(password) = &update.password {
            identity.password_hash = hash(password, DEFAULT_COST)?;
        }
        identity.updated_at = Utc::now().to_rfc3339();

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE users SET name = ?2, email = ?3, password_hash = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                identity.id.to_string(),
                identity.name,
                identity.email,
                identity.password_hash,
                identity.updated_at,
            ],
        )
        .map_err(map_unique_violation)?;

        Ok(identity)
    }

    /// Change an identity's role (admin-only administrative path)
    pub fn set_role(&self, id: &Uuid, role: Role) -> Result<Identity, StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let rows = conn.execute(
            "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), role.as_str(), Utc::now().to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound);
        }

        info!("🔁 Role updated: {} -> {}", id, role.as_str());

        self.get_user_by_id(id)?.ok_or(StoreError::NotFound)
    }

    /// List all identities (admin only)
    pub fn list_users(&self) -> Result<Vec<Identity>, StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(
            "SELECT id, name, email, password_hash, role, created_at, updated_at
             FROM users ORDER BY created_at DESC",
        )?;

        let users = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Delete an identity by id (admin only)
    pub fn delete_user(&self, id: &Uuid) -> Result<(), StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let rows_affected =
            conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        info!("🗑️  Deleted identity: {}", id);
        Ok(())
    }

    /// Aggregate counts for the admin dashboard
    pub fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let admins: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;

        Ok(DashboardStats {
            users: users as usize,
            admins: admins as usize,
        })
    }
}

/// Translate a sqlite uniqueness violation into `EmailTaken`; email is the
/// only unique non-key column in the schema.
fn map_unique_violation(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::EmailTaken
        }
        _ => StoreError::Db(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_default_admin_created() {
        let (store, _temp) = create_test_store();

        let admin = store.get_user_by_email("admin@portfolio.local").unwrap();
        assert!(admin.is_some());
        assert_eq!(admin.unwrap().role, Role::Admin);
    }

    #[test]
    fn test_password_verification() {
        let (store, _temp) = create_test_store();

        store
            .create_user("Alice", "alice@example.com", "secret1", Role::User)
            .unwrap();

        // Correct password returns the identity
        let identity = store
            .verify_password("alice@example.com", "secret1")
            .unwrap();
        assert!(identity.is_some());
        assert_eq!(identity.unwrap().name, "Alice");

        // Incorrect password
        assert!(store
            .verify_password("alice@example.com", "wrong")
            .unwrap()
            .is_none());

        // Non-existent user
        assert!(store
            .verify_password("nobody@example.com", "secret1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_email_rejected_case_insensitive() {
        let (store, _temp) = create_test_store();

        store
            .create_user("A", "a@x.com", "secret1", Role::User)
            .unwrap();

        let result = store.create_user("B", "A@X.COM", "secret2", Role::User);
        assert!(matches!(result, Err(StoreError::EmailTaken)));

        // Lookup is case-insensitive too
        let found = store.get_user_by_email("A@X.com").unwrap();
        assert_eq!(found.unwrap().name, "A");
    }

    #[test]
    fn test_update_profile_leaves_role_alone() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("Bob", "bob@example.com", "secret1", Role::User)
            .unwrap();

        let updated = store
            .update_user(
                &user.id,
                &UpdateProfileRequest {
                    name: Some("Robert".to_string()),
                    email: None,
                    password: Some("newsecret".to_string()),
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Robert");
        assert_eq!(updated.role, Role::User);
        assert!(store
            .verify_password("bob@example.com", "newsecret")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_update_to_taken_email_conflicts() {
        let (store, _temp) = create_test_store();

        store
            .create_user("A", "a@x.com", "secret1", Role::User)
            .unwrap();
        let b = store
            .create_user("B", "b@x.com", "secret1", Role::User)
            .unwrap();

        let result = store.update_user(
            &b.id,
            &UpdateProfileRequest {
                name: None,
                email: Some("A@x.com".to_string()),
                password: None,
            },
        );
        assert!(matches!(result, Err(StoreError::EmailTaken)));
    }

    #[test]
    fn test_set_role() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("C", "c@x.com", "secret1", Role::User)
            .unwrap();

        let promoted = store.set_role(&user.id, Role::Admin).unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let missing = store.set_role(&Uuid::new_v4(), Role::Admin);
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_delete_user() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("Temp", "temp@x.com", "secret1", Role::User)
            .unwrap();

        store.delete_user(&user.id).unwrap();
        assert!(store.get_user_by_id(&user.id).unwrap().is_none());

        let again = store.delete_user(&user.id);
        assert!(matches!(again, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_dashboard_stats() {
        let (store, _temp) = create_test_store();

        store
            .create_user("A", "a@x.com", "secret1", Role::User)
            .unwrap();
        store
            .create_user("B", "b@x.com", "secret1", Role::Admin)
            .unwrap();

        let stats = store.dashboard_stats().unwrap();
        assert_eq!(stats.users, 3); // default admin + A + B
        assert_eq!(stats.admins, 2);
    }
}
