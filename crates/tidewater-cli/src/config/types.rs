//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidewater_dest::CommitMode;
use tidewater_sql::{DbConfig, PgConfig};

use super::{ConfigError, Result};

/// Everything one `tidewater` invocation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Operational database the extractor reads.
    pub source: DbConfig,
    /// Warehouse the loader writes.
    pub target: DbConfig,
    #[serde(default)]
    pub buckets: BucketConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub load: LoadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Staged objects written by the extractor.
    pub extraction: String,
    /// Holds the watermark object.
    pub control: String,
    /// Transformed objects read by the loader.
    pub transformation: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            extraction: "ingestion".to_string(),
            control: "control_bucket".to_string(),
            transformation: "test_transform_bucket".to_string(),
        }
    }
}

/// Filesystem object store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./tidewater-data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Pause between the dimension and fact phases.
    pub phase_delay_secs: u64,
    /// CI runs skip the pause.
    pub ci: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            phase_delay_secs: 120,
            ci: false,
        }
    }
}

impl ExtractConfig {
    #[must_use]
    pub fn phase_delay(&self) -> Option<Duration> {
        (!self.ci && self.phase_delay_secs > 0).then(|| Duration::from_secs(self.phase_delay_secs))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub commit_mode: CommitMode,
}

impl PipelineConfig {
    /// Build from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from `lookup`, applying the defaults for every unset variable.
    ///
    /// Source and target are both `PostgreSQL`: `PG*` for the source and
    /// `PG*2` for the target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unparsable port or a config that fails
    /// [`validate`](Self::validate).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let pg = |suffix: &str| -> Result<PgConfig> {
            let port_var = format!("PGPORT{suffix}");
            let port = get(&port_var, "5432");
            Ok(PgConfig {
                host: get(&format!("PGHOST{suffix}"), "testing"),
                port: port
                    .parse()
                    .map_err(|_| ConfigError::Invalid(format!("{port_var}='{port}' is not a port")))?,
                user: get(&format!("PGUSER{suffix}"), "testing"),
                password: get(&format!("PGPASSWORD{suffix}"), "testing"),
                database: get(&format!("PGDATABASE{suffix}"), ""),
            })
        };

        let buckets = BucketConfig::default();
        let config = Self {
            source: DbConfig::Postgres(pg("")?),
            target: DbConfig::Postgres(pg("2")?),
            buckets: BucketConfig {
                extraction: get("S3_EXTRACT_BUCKET", &buckets.extraction),
                control: get("S3_CONTROL_BUCKET", &buckets.control),
                transformation: get("S3_TRANSFORMATION_BUCKET", &buckets.transformation),
            },
            storage: StorageConfig {
                root: lookup("TIDEWATER_STORAGE_ROOT")
                    .map_or_else(|| StorageConfig::default().root, PathBuf::from),
            },
            extract: ExtractConfig {
                ci: get("CI", "false") != "false",
                ..ExtractConfig::default()
            },
            load: LoadConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first problem found: an invalid connection, an empty
    /// bucket name or an empty storage root.
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.target.validate()?;
        for (name, value) in [
            ("extraction", &self.buckets.extraction),
            ("control", &self.buckets.control),
            ("transformation", &self.buckets.transformation),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} bucket must not be empty")));
            }
        }
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage root must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn pg(db: &DbConfig) -> &PgConfig {
        match db {
            DbConfig::Postgres(pg) => pg,
            DbConfig::Sqlite(_) => panic!("expected postgres"),
        }
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        let source = pg(&config.source);
        assert_eq!(source.host, "testing");
        assert_eq!(source.user, "testing");
        assert_eq!(source.port, 5432);
        assert_eq!(source.database, "");
        assert_eq!(config.buckets, BucketConfig::default());
        assert_eq!(config.storage.root, PathBuf::from("./tidewater-data"));
        assert!(!config.extract.ci);
        assert_eq!(config.extract.phase_delay(), Some(Duration::from_secs(120)));
        assert_eq!(config.load.commit_mode, CommitMode::PerBatch);
    }

    #[test]
    fn source_and_target_read_separate_variables() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("PGHOST", "oltp"),
            ("PGDATABASE", "totesys"),
            ("PGHOST2", "olap"),
            ("PGPORT2", "6543"),
            ("PGDATABASE2", "warehouse"),
        ]))
        .unwrap();
        assert_eq!(pg(&config.source).host, "oltp");
        assert_eq!(pg(&config.source).database, "totesys");
        assert_eq!(pg(&config.target).host, "olap");
        assert_eq!(pg(&config.target).port, 6543);
        assert_eq!(pg(&config.target).database, "warehouse");
    }

    #[test]
    fn any_ci_value_but_false_skips_the_delay() {
        for (value, skipped) in [("false", false), ("true", true), ("1", true), ("", true)] {
            let config = PipelineConfig::from_lookup(lookup(&[("CI", value)])).unwrap();
            assert_eq!(config.extract.phase_delay().is_none(), skipped, "CI={value:?}");
        }
    }

    #[test]
    fn bucket_overrides_apply() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("S3_EXTRACT_BUCKET", "raw"),
            ("S3_TRANSFORMATION_BUCKET", "processed"),
            ("TIDEWATER_STORAGE_ROOT", "/var/lib/tidewater"),
        ]))
        .unwrap();
        assert_eq!(config.buckets.extraction, "raw");
        assert_eq!(config.buckets.control, "control_bucket");
        assert_eq!(config.buckets.transformation, "processed");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/tidewater"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = PipelineConfig::from_lookup(lookup(&[("PGPORT", "db")])).unwrap_err();
        assert!(err.to_string().contains("PGPORT='db'"), "{err}");
    }

    #[test]
    fn empty_bucket_fails_validation() {
        let err = PipelineConfig::from_lookup(lookup(&[("S3_CONTROL_BUCKET", " ")])).unwrap_err();
        assert!(err.to_string().contains("control bucket"), "{err}");
    }

    #[test]
    fn zero_delay_disables_the_pause() {
        let extract = ExtractConfig {
            phase_delay_secs: 0,
            ci: false,
        };
        assert_eq!(extract.phase_delay(), None);
    }
}
