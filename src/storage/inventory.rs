//! Local certificate inventory.
//!
//! SQLite-backed certificate repository with the same lookup and
//! update-in-place semantics as the ACM store. Each row keeps the leaf, the
//! issuer chain and the private key so the material can be deployed from the
//! host that ran the renewal.

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Row, params};
use uuid::Uuid;

use super::{CertStore, CertStoreError, certificate::parse_certificate};
use crate::core::types::{CertificateBundle, CertificateRecord};

/// SQLite-based certificate repository.
///
/// All operations go through one mutex-guarded connection, so the store can be
/// shared by every per-domain task.
#[derive(Clone)]
pub struct InventoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryStore {
    /// Opens (creating if needed) the inventory database at `db_path`.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the database
    /// cannot be opened, or schema initialization fails.
    pub fn open(db_path: &Path) -> Result<Self, CertStoreError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                CertStoreError::Unavailable(format!(
                    "inventory: unable to create '{}': {err}",
                    parent.display()
                ))
            })?;
        }

        let created = !db_path.exists();
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .map_err(|err| {
            CertStoreError::Unavailable(format!(
                "inventory: failed to open SQLite database at {}: {err}",
                db_path.display()
            ))
        })?;

        Self::configure_connection(&conn)?;
        Self::init_schema(&conn)?;

        #[cfg(unix)]
        if created {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(db_path, fs::Permissions::from_mode(0o600)).map_err(|err| {
                CertStoreError::Unavailable(format!(
                    "inventory: unable to restrict '{}': {err}",
                    db_path.display()
                ))
            })?;
        }
        #[cfg(not(unix))]
        let _ = created;

        log::info!("[inventory] opened certificate inventory at '{}'", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory inventory, gone when the last clone is dropped.
    pub fn open_in_memory() -> Result<Self, CertStoreError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<(), CertStoreError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(db_error)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_error)?;
        Ok(())
    }

    fn init_schema(conn: &Connection) -> Result<(), CertStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS managed_certificates (
                id TEXT PRIMARY KEY,
                domain TEXT NOT NULL,
                sans TEXT NOT NULL,
                issuer TEXT NOT NULL,
                serial TEXT NOT NULL,
                not_before TEXT NOT NULL,
                not_after TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                certificate_pem TEXT NOT NULL,
                chain_pem TEXT NOT NULL,
                private_key_pem TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_error)?;
        Ok(())
    }

    /// Number of stored certificates.
    pub fn count(&self) -> Result<usize, CertStoreError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(1) FROM managed_certificates", [], |row| row.get(0))
            .map_err(db_error)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// PEM material stored for `id`: leaf, chain and key.
    pub fn material(&self, id: &str) -> Result<Option<(String, String, String)>, CertStoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT certificate_pem, chain_pem, private_key_pem
                FROM managed_certificates
                WHERE id = ?1
                "#,
            )
            .map_err(db_error)?;
        let mut rows = stmt.query(params![id]).map_err(db_error)?;
        match rows.next().map_err(db_error)? {
            Some(row) => Ok(Some((
                row.get(0).map_err(db_error)?,
                row.get(1).map_err(db_error)?,
                row.get(2).map_err(db_error)?,
            ))),
            None => Ok(None),
        }
    }

    fn row_to_record(row: &Row<'_>) -> Result<CertificateRecord, CertStoreError> {
        let id: String = row.get(0).map_err(db_error)?;
        let sans_raw: String = row.get(1).map_err(db_error)?;
        let not_before_raw: String = row.get(2).map_err(db_error)?;
        let not_after_raw: String = row.get(3).map_err(db_error)?;

        let sans: Vec<String> = serde_json::from_str(&sans_raw)
            .map_err(|err| CertStoreError::Store(format!("failed to deserialize sans: {err}")))?;

        Ok(CertificateRecord {
            id,
            not_before: Some(parse_timestamp(&not_before_raw, "not_before")?),
            not_after: parse_timestamp(&not_after_raw, "not_after")?,
            sans,
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CertStoreError> {
        self.conn
            .lock()
            .map_err(|err| CertStoreError::Unavailable(format!("SQLite connection poisoned: {err}")))
    }
}

impl CertStore for InventoryStore {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn list(&self) -> Result<Vec<CertificateRecord>, CertStoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, sans, not_before, not_after
                FROM managed_certificates
                ORDER BY rowid
                "#,
            )
            .map_err(db_error)?;

        let mut rows = stmt.query([]).map_err(db_error)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(db_error)? {
            records.push(Self::row_to_record(row)?);
        }
        Ok(records)
    }

    fn import(
        &self,
        bundle: &CertificateBundle,
        existing_id: Option<&str>,
    ) -> Result<String, CertStoreError> {
        let parsed = parse_certificate(&bundle.certificate_pem)?;
        let id = existing_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("cert_{}", Uuid::new_v4().as_simple()));
        let sans = serde_json::to_string(&parsed.sans)
            .map_err(|err| CertStoreError::Store(format!("failed to serialize sans: {err}")))?;

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO managed_certificates (
                id, domain, sans, issuer, serial, not_before, not_after, fingerprint,
                certificate_pem, chain_pem, private_key_pem, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                domain = excluded.domain,
                sans = excluded.sans,
                issuer = excluded.issuer,
                serial = excluded.serial,
                not_before = excluded.not_before,
                not_after = excluded.not_after,
                fingerprint = excluded.fingerprint,
                certificate_pem = excluded.certificate_pem,
                chain_pem = excluded.chain_pem,
                private_key_pem = excluded.private_key_pem,
                updated_at = excluded.updated_at
            "#,
            params![
                id,
                bundle.domain,
                sans,
                parsed.issuer,
                parsed.serial,
                parsed.not_before.to_rfc3339(),
                parsed.not_after.to_rfc3339(),
                parsed.fingerprint,
                bundle.certificate_pem,
                bundle.issuer_chain_pem,
                bundle.private_key_pem.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_error)?;

        Ok(id)
    }
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, CertStoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| CertStoreError::Store(format!("failed to parse {field} timestamp: {err}")))
}

fn db_error(err: rusqlite::Error) -> CertStoreError {
    CertStoreError::Store(format!("inventory: {err}"))
}
