//! Relational connection configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// Connection to one relational database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DbConfig {
    Postgres(PgConfig),
    Sqlite(SqliteConfig),
}

impl DbConfig {
    /// # Errors
    ///
    /// Returns a config-category [`DbError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => pg.validate(),
            Self::Sqlite(sqlite) => sqlite.validate(),
        }
    }

    /// Human-readable target for logs; never includes the password.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Postgres(pg) => format!("postgres://{}@{}:{}/{}", pg.user, pg.host, pg.port, pg.database),
            Self::Sqlite(sqlite) => format!("sqlite://{}", sqlite.path.display()),
        }
    }
}

/// `PostgreSQL` connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

fn default_port() -> u16 {
    5432
}

impl PgConfig {
    /// # Errors
    ///
    /// Returns a config-category [`DbError`] for an empty host or port 0.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.host.is_empty() {
            return Err(DbError::config("postgres host must not be empty"));
        }
        if self.port == 0 {
            return Err(DbError::config("postgres port must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn connection_string(&self) -> String {
        let mut conn = format!("host={} port={} user={}", self.host, self.port, self.user);
        if !self.password.is_empty() {
            conn.push_str(&format!(" password={}", self.password));
        }
        if !self.database.is_empty() {
            conn.push_str(&format!(" dbname={}", self.database));
        }
        conn
    }

    /// Open a blocking client.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DbError`]; refused or dropped connections are
    /// transient.
    pub fn connect(&self) -> Result<postgres::Client, DbError> {
        self.validate()?;
        let mut pg = postgres::Config::new();
        pg.host(&self.host);
        pg.port(self.port);
        pg.user(&self.user);
        if !self.password.is_empty() {
            pg.password(&self.password);
        }
        if !self.database.is_empty() {
            pg.dbname(&self.database);
        }
        tracing::debug!(host = %self.host, port = self.port, database = %self.database, "Connecting to PostgreSQL");
        pg.connect(postgres::NoTls)
            .map_err(|e| DbError::from_postgres("Connection failed", &e))
    }
}

/// `SQLite` database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl SqliteConfig {
    /// # Errors
    ///
    /// Returns a config-category [`DbError`] for an empty path.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.path.as_os_str().is_empty() {
            return Err(DbError::config("sqlite path must not be empty"));
        }
        Ok(())
    }

    /// Open the database file, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DbError`] if the file cannot be opened.
    pub fn open(&self) -> Result<rusqlite::Connection, DbError> {
        self.validate()?;
        tracing::debug!(path = %self.path.display(), "Opening SQLite database");
        rusqlite::Connection::open(&self.path)
            .map_err(|e| DbError::from_sqlite("Connection failed", &e))
    }
}
