//! services/api/src/adapters/catalog.rs
//!
//! The catalog source backed by the static `text_studies.json` listing.
//! The file is read once at startup and served from memory afterwards.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use study_sessions_core::domain::{TextStudy, TextType};
use study_sessions_core::ports::{CatalogSource, PortError, PortResult};
use tracing::info;

/// Catalog ids are numbers in older listings and strings in newer ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    id: CatalogId,
    name: String,
    livre: String,
    #[serde(default)]
    link: String,
    total_sections: u32,
    #[serde(rename = "type")]
    text_type: TextType,
}

impl CatalogEntry {
    fn to_domain(self) -> TextStudy {
        TextStudy {
            id: match self.id {
                CatalogId::Number(n) => n.to_string(),
                CatalogId::Text(s) => s,
            },
            name: self.name,
            book: self.livre,
            external_link: self.link,
            total_sections: self.total_sections,
            text_type: self.text_type,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    text_studies: Vec<CatalogEntry>,
}

/// A `CatalogSource` over a parsed JSON listing.
#[derive(Clone)]
pub struct JsonCatalog {
    texts: Arc<Vec<TextStudy>>,
}

impl JsonCatalog {
    /// Reads and parses the listing at `path`.
    pub async fn load(path: &Path) -> PortResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PortError::Unexpected(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::parse(&raw)?;
        info!(path = %path.display(), entries = catalog.texts.len(), "Catalog loaded");
        Ok(catalog)
    }

    pub fn parse(raw: &str) -> PortResult<Self> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| PortError::Unexpected(format!("Invalid catalog: {}", e)))?;
        let texts = file
            .text_studies
            .into_iter()
            .map(CatalogEntry::to_domain)
            .collect();
        Ok(Self {
            texts: Arc::new(texts),
        })
    }
}

#[async_trait]
impl CatalogSource for JsonCatalog {
    async fn load_all(&self) -> PortResult<Vec<TextStudy>> {
        Ok(self.texts.as_ref().clone())
    }
}
