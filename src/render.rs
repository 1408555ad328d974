use async_trait::async_trait;

use crate::{
    errors::DiagramError,
    models::config::{DiagramConfig, Style},
};

const DIAGRAM_BASE_URL: &str = "http://yuml.me/diagram";
const IMAGE_BASE_URL: &str = "http://www.yuml.me/diagram/class";

/// Turns DSL text into image bytes.
///
/// Against yUML this is two requests: POST the text as the `dsl_text` form
/// field to [`YumlEndpoint::diagram_url`], which answers with an image token,
/// then GET [`YumlEndpoint::image_url`] for that token. Failures are reported
/// as [`DiagramError::Transport`].
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn read_image(&self, dsl_text: &str) -> Result<Vec<u8>, DiagramError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YumlEndpoint {
    pub style: Style,
    pub scale: u32,
    pub proxy_url: Option<String>,
    /// `user:password` for the proxy.
    pub proxy_credentials: Option<String>,
}

impl YumlEndpoint {
    pub fn from_config(config: &DiagramConfig) -> Self {
        Self {
            style: config.style,
            scale: config.scale,
            proxy_url: config.proxy_url.clone(),
            proxy_credentials: config.proxy_credentials.clone(),
        }
    }

    pub fn diagram_url(&self) -> String {
        format!("{}/{};scale:{}/class/", DIAGRAM_BASE_URL, self.style, self.scale)
    }

    pub fn image_url(&self, token: &str) -> String {
        format!("{}/{}", IMAGE_BASE_URL, token.trim())
    }

    pub fn uses_proxy(&self) -> bool {
        self.proxy_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}
