//! SQLite-backed credential store

use super::{CredentialStore, StoreResult};
use crate::account::AccountSecurity;
use crate::catalog::RoleCatalog;
use crate::error::StoreError;
use crate::principal::{NewPrincipal, Principal, PrincipalId};
use crate::role::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const PRINCIPAL_COLUMNS: &str = "id, username, email, password_hash, full_name, department, \
     is_active, is_locked, is_credential_expired, failed_attempts, last_login_at, created_at";

/// Database principal record
#[derive(Debug, sqlx::FromRow)]
struct PrincipalRecord {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    department: Option<String>,
    is_active: bool,
    is_locked: bool,
    is_credential_expired: bool,
    failed_attempts: i64,
    last_login_at: Option<String>, // ISO 8601 string
    created_at: String,            // ISO 8601 string
}

impl PrincipalRecord {
    fn security(&self) -> StoreResult<AccountSecurity> {
        Ok(AccountSecurity {
            is_active: self.is_active,
            is_locked: self.is_locked,
            is_credential_expired: self.is_credential_expired,
            failed_attempts: u32::try_from(self.failed_attempts).unwrap_or(u32::MAX),
            last_login_at: self.last_login_at.as_deref().map(parse_time).transpose()?,
        })
    }

    fn into_principal(self, roles: Vec<Role>) -> StoreResult<Principal> {
        let security = self.security()?;
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Backend(format!("corrupt principal id '{}': {}", self.id, e)))?;

        let mut principal = Principal {
            id: PrincipalId::from_uuid(id),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            department: self.department,
            security,
            roles: Vec::new(),
            created_at: parse_time(&self.created_at)?,
        };
        principal.set_roles(roles);
        Ok(principal)
    }
}

fn parse_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("corrupt timestamp '{}': {}", raw, e)))
}

/// Credential store persisted in SQLite
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    catalog: Arc<RoleCatalog>,
}

impl SqliteCredentialStore {
    /// Open (creating if needed) the database at `url` and ensure the schema
    pub async fn connect(url: &str, catalog: Arc<RoleCatalog>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `sqlite::memory:` is a separate database
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Self::new(pool, catalog).await
    }

    pub async fn new(pool: SqlitePool, catalog: Arc<RoleCatalog>) -> StoreResult<Self> {
        let store = Self { pool, catalog };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> StoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS principals (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                full_name TEXT,
                department TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_locked BOOLEAN NOT NULL DEFAULT FALSE,
                is_credential_expired BOOLEAN NOT NULL DEFAULT FALSE,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                last_login_at TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS principal_roles (
                principal_id TEXT NOT NULL REFERENCES principals(id),
                role_name TEXT NOT NULL,
                PRIMARY KEY (principal_id, role_name)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_principal_roles_role ON principal_roles(role_name)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await.map_err(|e| {
                error!("Failed to create credential tables: {}", e);
                StoreError::from(e)
            })?;
        }

        info!("Credential tables ready");
        Ok(())
    }

    /// Role names are stored as written; older rows may lack the prefix
    async fn load_roles(&self, id: &str) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query("SELECT role_name FROM principal_roles WHERE principal_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.try_get("role_name")?;
            match self.catalog.resolve(&raw) {
                Some(role) if role.active => roles.push(role.clone()),
                Some(role) => debug!("Skipping inactive role '{}' on principal {}", role.name, id),
                None => warn!("Ignoring unknown role '{}' on principal {}", raw, id),
            }
        }
        Ok(roles)
    }

    async fn fetch_one_where(&self, column: &str, value: &str) -> StoreResult<Option<Principal>> {
        let query = format!(
            "SELECT {} FROM principals WHERE {} = ?",
            PRINCIPAL_COLUMNS, column
        );
        let record = sqlx::query_as::<_, PrincipalRecord>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        match record {
            Some(record) => {
                let roles = self.load_roles(&record.id).await?;
                record.into_principal(roles).map(Some)
            }
            None => Ok(None),
        }
    }

    fn require_found(&self, id: PrincipalId, rows_affected: u64) -> StoreResult<()> {
        if rows_affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Principal>> {
        self.fetch_one_where("username", username).await
    }

    async fn find_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        self.fetch_one_where("id", &id.to_string()).await
    }

    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let id = PrincipalId::new();
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO principals (id, username, email, password_hash, full_name, department, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(&new.department)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for role in &new.roles {
            sqlx::query("INSERT INTO principal_roles (principal_id, role_name) VALUES (?, ?)")
                .bind(&id_str)
                .bind(role.name.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Inserted principal {}", new.username);

        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id_str))
    }

    async fn record_login_failure(
        &self,
        id: PrincipalId,
        max_attempts: u32,
    ) -> StoreResult<AccountSecurity> {
        let row = sqlx::query(
            r#"
            UPDATE principals
            SET failed_attempts = failed_attempts + 1,
                is_locked = CASE WHEN failed_attempts + 1 >= ? THEN TRUE ELSE is_locked END
            WHERE id = ?
            RETURNING is_active, is_locked, is_credential_expired, failed_attempts, last_login_at
            "#,
        )
        .bind(i64::from(max_attempts))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let failed_attempts: i64 = row.try_get("failed_attempts")?;
        let last_login_at: Option<String> = row.try_get("last_login_at")?;
        Ok(AccountSecurity {
            is_active: row.try_get("is_active")?,
            is_locked: row.try_get("is_locked")?,
            is_credential_expired: row.try_get("is_credential_expired")?,
            failed_attempts: u32::try_from(failed_attempts).unwrap_or(u32::MAX),
            last_login_at: last_login_at.as_deref().map(parse_time).transpose()?,
        })
    }

    async fn record_login_success(&self, id: PrincipalId, at: DateTime<Utc>) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE principals SET failed_attempts = 0, last_login_at = ? WHERE id = ?")
                .bind(at.to_rfc3339())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        self.require_found(id, result.rows_affected())
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE principals SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.require_found(id, result.rows_affected())
    }

    async fn unlock(&self, id: PrincipalId) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE principals SET is_locked = FALSE, failed_attempts = 0 WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        self.require_found(id, result.rows_affected())
    }

    async fn set_credential_expired(&self, id: PrincipalId, expired: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE principals SET is_credential_expired = ? WHERE id = ?")
            .bind(expired)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.require_found(id, result.rows_affected())
    }

    async fn set_roles(&self, id: PrincipalId, roles: &[Role]) -> StoreResult<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM principals WHERE id = ?")
            .bind(&id_str)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(id_str));
        }

        sqlx::query("DELETE FROM principal_roles WHERE principal_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        for role in roles {
            sqlx::query("INSERT INTO principal_roles (principal_id, role_name) VALUES (?, ?)")
                .bind(&id_str)
                .bind(role.name.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_password(&self, id: PrincipalId, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE principals SET password_hash = ?, is_credential_expired = FALSE WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        self.require_found(id, result.rows_affected())
    }
}
