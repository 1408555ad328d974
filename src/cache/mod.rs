//! File cache for the generated DSL text and the rendered image.
//!
//! Two files share the configured base path: `<base>.cache` holds a JSON
//! [`CacheEntry`] and `<base>.png` the raw image. An entry is served only
//! while its hash matches the current configuration fingerprint and its TTL
//! has not run out; the image only alongside a servable entry.

use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::{
    dsl::Formatters,
    errors::DiagramError,
    models::{
        config::DiagramConfig,
        schema::{Column, Table},
    },
};

pub mod ttl;

/// Persisted form of the DSL text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: String,
    /// Unix timestamp (seconds) of the write.
    pub timestamp: i64,
    pub hash: String,
}

pub struct CacheManager {
    dsl_path: Option<PathBuf>,
    image_path: Option<PathBuf>,
    ttl: String,
    hash: String,
    disabled: bool,
}

fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Hash over every option that changes the rendered output. The formatting
/// callbacks are compared through their output on fixed dummy values.
pub fn fingerprint(config: &DiagramConfig, formatters: &Formatters) -> String {
    let dummy_table = Table::new("dummytable");
    let dummy_columns = [
        Column::new("dummycolumn1", "TYPE", true, false, true),
        Column::new("dummycolumn2", "TYPE", false, true, true),
        Column::new("dummycolumn3", "TYPE", false, true, false),
        Column::new("dummycolumn4", "TYPE", true, false, false),
    ];

    let mut parts = vec![
        config
            .cache_location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        config.style.to_string(),
        config.scale.to_string(),
        config.sql_dialect.to_string(),
        (formatters.table)(&dummy_table),
    ];
    parts.extend(dummy_columns.iter().map(|c| (formatters.column)(c)));

    let mut hasher = Sha256::new();
    hasher.update(parts.join(", ").as_bytes());
    hex::encode(hasher.finalize())
}

fn cache_error(path: &Path) -> impl FnOnce(io::Error) -> DiagramError + '_ {
    move |source| DiagramError::Cache {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes to a temporary sibling and renames it over `path`.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), DiagramError> {
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.permissions().readonly() {
            return Err(DiagramError::Cache {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "file is not writable"),
            });
        }
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(cache_error(path))?;
    file.write_all(data).map_err(cache_error(path))?;
    file.flush().map_err(cache_error(path))?;
    file.persist(path).map_err(|e| DiagramError::Cache {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn read_optional(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Some(data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            log::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
            None
        }
    }
}

impl CacheManager {
    pub fn new(config: &DiagramConfig, formatters: &Formatters) -> Self {
        let base = config.cache_location.as_deref();
        Self {
            dsl_path: base.map(|b| with_extension(b, "cache")),
            image_path: base.map(|b| with_extension(b, "png")),
            ttl: config.cache_ttl.clone(),
            hash: fingerprint(config, formatters),
            disabled: config.force_refresh,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled && self.dsl_path.is_some()
    }

    /// Turns every later read and write into a no-op. Files stay as they are.
    pub fn disable_cache(&mut self) {
        self.disabled = true;
    }

    pub fn get_dsl_text(&self) -> Result<Option<String>, DiagramError> {
        self.dsl_text_at(Utc::now())
    }

    pub(crate) fn dsl_text_at(&self, now: DateTime<Utc>) -> Result<Option<String>, DiagramError> {
        let Some(path) = self.dsl_path.as_deref().filter(|_| self.is_enabled()) else {
            return Ok(None);
        };
        let Some(content) = read_optional(path) else {
            return Ok(None);
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let entry: CacheEntry =
            serde_json::from_slice(&content).map_err(|source| DiagramError::CacheDecode {
                path: path.to_path_buf(),
                source,
            })?;

        if entry.hash != self.hash {
            log::info!("Cached DSL text in {} was built with other options", path.display());
            return Ok(None);
        }

        let expires = DateTime::<Utc>::from_timestamp(entry.timestamp, 0)
            .and_then(|written| ttl::expiration(&self.ttl, written));
        match expires {
            Some(expires) if now < expires => {
                log::info!("Using cached DSL text from {}", path.display());
                Ok(Some(entry.data))
            }
            Some(_) => {
                log::info!("Cached DSL text in {} has expired", path.display());
                Ok(None)
            }
            None => {
                log::warn!("Cache TTL '{}' does not resolve, treating entry as expired", self.ttl);
                Ok(None)
            }
        }
    }

    pub fn write_dsl_text(&self, dsl_text: &str) -> Result<(), DiagramError> {
        self.write_dsl_text_at(dsl_text, Utc::now())
    }

    pub(crate) fn write_dsl_text_at(
        &self,
        dsl_text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DiagramError> {
        let Some(path) = self.dsl_path.as_deref().filter(|_| self.is_enabled()) else {
            return Ok(());
        };

        let entry = CacheEntry {
            data: dsl_text.to_string(),
            timestamp: now.timestamp(),
            hash: self.hash.clone(),
        };
        let data = serde_json::to_vec(&entry).map_err(|e| DiagramError::Cache {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        write_atomic(path, &data)?;
        log::debug!("Wrote DSL text cache {}", path.display());
        Ok(())
    }

    /// The cached image, served only while the DSL text is cached too.
    pub fn get_image(&self) -> Result<Option<Vec<u8>>, DiagramError> {
        self.image_at(Utc::now())
    }

    pub(crate) fn image_at(&self, now: DateTime<Utc>) -> Result<Option<Vec<u8>>, DiagramError> {
        let Some(path) = self.image_path.as_deref().filter(|_| self.is_enabled()) else {
            return Ok(None);
        };
        if self.dsl_text_at(now)?.is_none() {
            return Ok(None);
        }
        Ok(read_optional(path))
    }

    pub fn write_image(&self, image: &[u8]) -> Result<(), DiagramError> {
        let Some(path) = self.image_path.as_deref().filter(|_| self.is_enabled()) else {
            return Ok(());
        };

        write_atomic(path, image)?;
        log::debug!("Wrote image cache {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{SqlDialect, Style};
    use chrono::TimeDelta;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> DiagramConfig {
        DiagramConfig {
            cache_location: Some(dir.path().join("school")),
            ..DiagramConfig::default()
        }
    }

    fn manager(config: &DiagramConfig) -> CacheManager {
        CacheManager::new(config, &Formatters::default())
    }

    #[test]
    fn test_disabled_without_location() {
        let cache = manager(&DiagramConfig::default());
        assert!(!cache.is_enabled());
        assert_eq!(cache.get_dsl_text().unwrap(), None);
        cache.write_dsl_text("[a]").unwrap();
        assert_eq!(cache.get_dsl_text().unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager(&config_in(&dir));

        assert!(cache.is_enabled());
        assert_eq!(cache.get_dsl_text().unwrap(), None);

        cache.write_dsl_text("[teacher|'id']").unwrap();
        assert_eq!(cache.get_dsl_text().unwrap().as_deref(), Some("[teacher|'id']"));
        assert!(dir.path().join("school.cache").is_file());
    }

    #[test]
    fn test_ttl_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager(&config_in(&dir));
        let written = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();

        cache.write_dsl_text_at("[a]", written).unwrap();

        let almost = written + TimeDelta::try_seconds(4 * 60 + 59).unwrap();
        let past = written + TimeDelta::try_seconds(5 * 60 + 1).unwrap();
        assert_eq!(cache.dsl_text_at(almost).unwrap().as_deref(), Some("[a]"));
        assert_eq!(cache.dsl_text_at(past).unwrap(), None);
    }

    #[test]
    fn test_unresolvable_ttl_counts_as_expired() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiagramConfig {
            cache_ttl: "forever".to_string(),
            ..config_in(&dir)
        };
        let cache = manager(&config);

        cache.write_dsl_text("[a]").unwrap();
        assert_eq!(cache.get_dsl_text().unwrap(), None);
    }

    #[test]
    fn test_fingerprint_tracks_output_options() {
        let dir = tempfile::tempdir().unwrap();
        let base = config_in(&dir);
        let formatters = Formatters::default();
        let baseline = fingerprint(&base, &formatters);

        let variants = [
            DiagramConfig { style: Style::Scruffy, ..base.clone() },
            DiagramConfig { scale: 120, ..base.clone() },
            DiagramConfig { sql_dialect: SqlDialect::MySql, ..base.clone() },
            DiagramConfig { cache_location: Some(dir.path().join("other")), ..base.clone() },
        ];
        for variant in &variants {
            assert_ne!(fingerprint(variant, &formatters), baseline);
        }

        let custom_table = Formatters::default().with_table(|t| t.name().to_uppercase());
        assert_ne!(fingerprint(&base, &custom_table), baseline);

        let custom_column = Formatters::default().with_column(|c| format!("<{}>", c.name()));
        assert_ne!(fingerprint(&base, &custom_column), baseline);

        assert_eq!(fingerprint(&base, &Formatters::default()), baseline);
    }

    #[test]
    fn test_entry_from_other_options_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        manager(&config).write_dsl_text("[a]").unwrap();

        let scruffy = DiagramConfig {
            style: Style::Scruffy,
            ..config
        };
        assert_eq!(manager(&scruffy).get_dsl_text().unwrap(), None);
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("school.cache"), "{not json").unwrap();

        let result = manager(&config_in(&dir)).get_dsl_text();
        assert!(matches!(result, Err(DiagramError::CacheDecode { .. })));
    }

    #[test]
    fn test_empty_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("school.cache"), "").unwrap();

        assert_eq!(manager(&config_in(&dir)).get_dsl_text().unwrap(), None);
    }

    #[test]
    fn test_image_requires_cached_dsl_text() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager(&config_in(&dir));

        cache.write_image(b"\x89PNG").unwrap();
        assert_eq!(fs::read(dir.path().join("school.png")).unwrap(), b"\x89PNG");
        assert_eq!(cache.get_image().unwrap(), None);

        cache.write_dsl_text("[a]").unwrap();
        assert_eq!(cache.get_image().unwrap(), Some(b"\x89PNG".to_vec()));
    }

    #[test]
    fn test_disable_cache_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = manager(&config_in(&dir));
        cache.write_dsl_text("[a]").unwrap();

        cache.disable_cache();
        assert!(!cache.is_enabled());
        assert_eq!(cache.get_dsl_text().unwrap(), None);
        cache.write_dsl_text("[b]").unwrap();

        let stored = fs::read(dir.path().join("school.cache")).unwrap();
        let entry: CacheEntry = serde_json::from_slice(&stored).unwrap();
        assert_eq!(entry.data, "[a]");
    }

    #[test]
    fn test_force_refresh_disables_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiagramConfig {
            force_refresh: true,
            ..config_in(&dir)
        };
        let cache = manager(&config);

        assert!(!cache.is_enabled());
        cache.write_dsl_text("[a]").unwrap();
        assert!(!dir.path().join("school.cache").exists());
    }

    #[test]
    fn test_unwritable_destination_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiagramConfig {
            cache_location: Some(dir.path().join("missing").join("school")),
            ..DiagramConfig::default()
        };

        let result = manager(&config).write_dsl_text("[a]");
        assert!(matches!(result, Err(DiagramError::Cache { .. })));
    }
}
