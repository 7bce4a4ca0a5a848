//! Surface target references
//!
//! A surface instance is addressed by a URL that carries its whole
//! configuration. There is no runtime reconfiguration channel, so a new
//! configuration always means a new URL and a new instance.

use thiserror::Error;
use url::Url;

use crate::models::SurfaceConfig;

/// Fixed embedding flags appended after the configuration parameters
const EMBED_FLAGS: [(&str, &str); 5] = [
    ("listenToEvents", "true"),
    ("hideNew", "true"),
    ("codeChangeEvent", "true"),
    ("hideRun", "true"),
    ("hideTitle", "true"),
];

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Invalid surface URL '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Surface URL '{0}' cannot carry a path")]
    NotHierarchical(String),
}

/// Base address of the surface bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceTarget {
    base: Url,
}

impl SurfaceTarget {
    /// Parse a base URL such as `ws://127.0.0.1:8791/embed`
    pub fn parse(base: &str) -> Result<Self, TargetError> {
        let url = Url::parse(base).map_err(|source| TargetError::Parse {
            url: base.to_string(),
            source,
        })?;
        Self::from_url(url)
    }

    pub fn from_url(base: Url) -> Result<Self, TargetError> {
        if base.cannot_be_a_base() {
            return Err(TargetError::NotHierarchical(base.to_string()));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Build the target reference for one surface configuration
    ///
    /// Any query on the base URL is replaced.
    pub fn url_for(&self, config: SurfaceConfig) -> Url {
        let mut url = self.base.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(config.language.as_str());
        }

        {
            let mut query = url.query_pairs_mut();
            query
                .clear()
                .append_pair("theme", config.theme.as_str())
                .append_pair("fontSize", &config.font_size.get().to_string());
            for (key, value) in EMBED_FLAGS {
                query.append_pair(key, value);
            }
        }

        url
    }
}
