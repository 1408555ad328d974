use std::path::Path;

use cache::CacheManager;
use db::{QueryExecutor, QueryRecord, RecordingExecutor};
use dialect::DialectAdapter;
use dsl::{DslGenerator, Formatters};
use errors::DiagramError;
use models::config::DiagramConfig;
use render::{DiagramRenderer, YumlEndpoint};

pub mod cache;
pub mod db;
pub mod dialect;
pub mod dsl;
pub mod errors;
pub mod models;
pub mod render;

type CloseCallback = Box<dyn FnOnce() + Send + Sync>;

/// DSL text and image produced by [`DbYuml::image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    pub dsl_text: String,
    pub image: Vec<u8>,
    pub dsl_from_cache: bool,
    pub image_from_cache: bool,
}

/// Introspects a database and turns its schema into a yUML class diagram.
pub struct DbYuml {
    config: DiagramConfig,
    executor: RecordingExecutor<Box<dyn QueryExecutor>>,
    adapter: Box<dyn DialectAdapter>,
    generator: Box<dyn DslGenerator>,
    cache: CacheManager,
    on_close: Option<CloseCallback>,
}

impl DbYuml {
    pub fn new<E>(
        config: DiagramConfig,
        formatters: Formatters,
        executor: E,
    ) -> Result<Self, DiagramError>
    where
        E: QueryExecutor + 'static,
    {
        config.validate()?;

        let executor: Box<dyn QueryExecutor> = Box::new(executor);
        Ok(Self {
            adapter: dialect::adapter_for(config.sql_dialect),
            generator: config.generator.build(&formatters),
            cache: CacheManager::new(&config, &formatters),
            executor: RecordingExecutor::new(executor),
            on_close: None,
            config,
        })
    }

    /// Connects to `database_url`; the dialect follows the URL scheme.
    pub async fn connect(
        database_url: &str,
        mut config: DiagramConfig,
        formatters: Formatters,
    ) -> Result<Self, DiagramError> {
        let (sql_dialect, executor) = db::connect(database_url).await?;
        config.sql_dialect = sql_dialect;
        Self::new(config, formatters, executor)
    }

    /// Called once, right after the schema has been read.
    pub fn with_on_close<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.on_close = Some(Box::new(f));
        self
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn disable_cache(&mut self) {
        self.cache.disable_cache();
    }

    pub fn executed_queries(&self) -> Vec<QueryRecord> {
        self.executor.records()
    }

    pub fn endpoint(&self) -> YumlEndpoint {
        YumlEndpoint::from_config(&self.config)
    }

    pub async fn dsl_text(&mut self) -> Result<String, DiagramError> {
        let (dsl_text, _) = self.load_dsl_text().await?;
        Ok(dsl_text)
    }

    pub async fn image(
        &mut self,
        renderer: &dyn DiagramRenderer,
    ) -> Result<Diagram, DiagramError> {
        let (dsl_text, dsl_from_cache) = self.load_dsl_text().await?;

        // A cached image only belongs to the cached DSL text.
        if dsl_from_cache {
            if let Some(image) = self.cache.get_image()? {
                return Ok(Diagram {
                    dsl_text,
                    image,
                    dsl_from_cache,
                    image_from_cache: true,
                });
            }
        }

        log::info!("Requesting diagram image from {}", self.endpoint().diagram_url());
        let image = renderer.read_image(&dsl_text).await?;
        self.cache.write_image(&image)?;

        Ok(Diagram {
            dsl_text,
            image,
            dsl_from_cache,
            image_from_cache: false,
        })
    }

    pub async fn save_image(
        &mut self,
        renderer: &dyn DiagramRenderer,
        path: impl AsRef<Path>,
    ) -> Result<Diagram, DiagramError> {
        let diagram = self.image(renderer).await?;
        let path = path.as_ref();
        tokio::fs::write(path, &diagram.image)
            .await
            .map_err(|source| DiagramError::Cache {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Saved diagram image to {}", path.display());
        Ok(diagram)
    }

    async fn load_dsl_text(&mut self) -> Result<(String, bool), DiagramError> {
        if let Some(dsl_text) = self.cache.get_dsl_text()? {
            return Ok((dsl_text, true));
        }

        let schema = self.adapter.introspect(&self.executor).await;
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        let schema = schema?;

        let dsl_text = self.generator.generate(&schema)?;
        if !dsl_text.is_empty() {
            self.cache.write_dsl_text(&dsl_text)?;
        }
        Ok((dsl_text, false))
    }
}
