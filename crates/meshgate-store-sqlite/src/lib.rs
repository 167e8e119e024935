//! SQLite backend for meshgate storage.
//!
//! One [`SqliteStore`] owns the connection pool. Invite stores for each scope are handed out
//! by [`SqliteStore::invites`], which instantiates the generic engine for a variant.

use std::str::FromStr;

use meshgate_storage::{GroupInvite, InviteEntity, OrganizationInvite, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

mod expiry;
mod invites;
mod ledger;
mod memberships;
mod rows;

pub use invites::SqliteInviteStore;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.meshgate/meshgate.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".meshgate");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("meshgate.db");
        let url = format!("sqlite://{}", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        // A single long-lived connection keeps in-memory databases alive and serializes writers.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Invite store for the variant `E`.
    pub fn invites<E: InviteEntity>(&self) -> SqliteInviteStore<E> {
        SqliteInviteStore::new(self.pool.clone())
    }

    pub fn organization_invites(&self) -> SqliteInviteStore<OrganizationInvite> {
        self.invites()
    }

    pub fn group_invites(&self) -> SqliteInviteStore<GroupInvite> {
        self.invites()
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_unique_violation() || d.message().contains("UNIQUE"))
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_foreign_key_violation() || d.message().contains("FOREIGN KEY"))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s)
        .map_err(|e| StoreError::MalformedInput(format!("stored identifier {:?}: {}", s, e)))
}
