use std::{env, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{cache::ttl, dsl::GeneratorKind, errors::DiagramError};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Sqlite,
    MySql,
}

impl SqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::MySql => "mysql",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = DiagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SqlDialect::Sqlite),
            "mysql" => Ok(SqlDialect::MySql),
            other => Err(DiagramError::Config(format!(
                "Unsupported sql_dialect '{}', valid values are sqlite, mysql",
                other
            ))),
        }
    }
}

/// Visual style understood by the rendering service.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Scruffy,
    Nofunky,
    #[default]
    Plain,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Scruffy => "scruffy",
            Style::Nofunky => "nofunky",
            Style::Plain => "plain",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = DiagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scruffy" => Ok(Style::Scruffy),
            "nofunky" => Ok(Style::Nofunky),
            "plain" => Ok(Style::Plain),
            other => Err(DiagramError::Config(format!(
                "Unsupported style '{}', valid values are scruffy, nofunky, plain",
                other
            ))),
        }
    }
}

fn default_scale() -> u32 {
    100
}

fn default_cache_ttl() -> String {
    "5 minutes".to_string()
}

/// Everything that controls introspection, rendering and caching apart from
/// the formatting callbacks.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DiagramConfig {
    #[serde(default)]
    pub sql_dialect: SqlDialect,
    #[serde(default)]
    pub style: Style,
    /// Percentage, 100 is the service's normal size.
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Base path of the cache files; caching is off when unset.
    #[serde(default)]
    pub cache_location: Option<PathBuf>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,
    /// Ignore and never write the cache.
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub proxy_credentials: Option<String>,
    #[serde(default)]
    pub generator: GeneratorKind,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            sql_dialect: SqlDialect::default(),
            style: Style::default(),
            scale: default_scale(),
            cache_location: None,
            cache_ttl: default_cache_ttl(),
            force_refresh: false,
            proxy_url: None,
            proxy_credentials: None,
            generator: GeneratorKind::default(),
        }
    }
}

impl DiagramConfig {
    pub fn validate(&self) -> Result<(), DiagramError> {
        if self.scale == 0 {
            return Err(DiagramError::Config(
                "'scale' must be a percentage, where 100 is 'normal'".to_string(),
            ));
        }
        if ttl::parse(&self.cache_ttl).is_none() {
            return Err(DiagramError::Config(format!(
                "'cache_ttl' is not a relative time expression: '{}'",
                self.cache_ttl
            )));
        }
        Ok(())
    }

    /// Reads `DBYUML_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, DiagramError> {
        let mut config = DiagramConfig::default();

        if let Ok(dialect) = env::var("DBYUML_DIALECT") {
            config.sql_dialect = dialect.parse()?;
        }
        if let Ok(style) = env::var("DBYUML_STYLE") {
            config.style = style.parse()?;
        }
        if let Ok(scale) = env::var("DBYUML_SCALE") {
            config.scale = scale.trim().parse().map_err(|_| {
                DiagramError::Config(format!("'scale' must be a positive integer, got '{}'", scale))
            })?;
        }
        if let Ok(path) = env::var("DBYUML_CACHE_PATH") {
            config.cache_location = Some(PathBuf::from(path));
        }
        if let Ok(cache_ttl) = env::var("DBYUML_CACHE_TTL") {
            config.cache_ttl = cache_ttl;
        }
        if let Ok(force) = env::var("DBYUML_FORCE") {
            config.force_refresh = matches!(force.trim(), "1" | "true" | "yes");
        }
        config.proxy_url = env::var("DBYUML_PROXY").ok();
        config.proxy_credentials = env::var("DBYUML_PROXY_AUTH").ok();

        config.validate()?;
        Ok(config)
    }
}
