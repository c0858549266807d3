//! Locale datasets: one `<locale>.json` CV document per file, loaded once at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::cv::schema::CvDocument;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {path} is not a valid CV document: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    documents: BTreeMap<String, Arc<CvDocument>>,
}

impl DatasetCatalog {
    /// Loads every `*.json` file in `dir`, keyed by file stem.
    ///
    /// A missing directory yields an empty catalog; an unreadable or malformed file is an error.
    pub async fn load_dir(dir: &Path) -> Result<Self, DatasetError> {
        let mut catalog = Self::default();

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Dataset directory {} does not exist; no locales loaded", dir.display());
                return Ok(catalog);
            }
            Err(source) => {
                return Err(DatasetError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|source| DatasetError::Io {
            path: dir.to_path_buf(),
            source,
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            let raw = tokio::fs::read(&path).await.map_err(|source| DatasetError::Io {
                path: path.clone(),
                source,
            })?;
            let document: CvDocument =
                serde_json::from_slice(&raw).map_err(|source| DatasetError::Parse {
                    path: path.clone(),
                    source,
                })?;

            info!("Loaded CV dataset '{locale}' from {}", path.display());
            catalog.insert(locale, document);
        }

        Ok(catalog)
    }

    pub fn insert(&mut self, locale: impl Into<String>, document: CvDocument) {
        self.documents.insert(locale.into(), Arc::new(document));
    }

    pub fn get(&self, locale: &str) -> Option<&Arc<CvDocument>> {
        self.documents.get(locale)
    }

    pub fn locales(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::schema::sample_document;

    #[tokio::test]
    async fn test_load_dir_reads_json_files_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::to_vec_pretty(&sample_document()).unwrap();
        std::fs::write(dir.path().join("en.json"), &json).unwrap();
        std::fs::write(dir.path().join("es.json"), &json).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let catalog = DatasetCatalog::load_dir(dir.path()).await.unwrap();

        assert_eq!(catalog.locales(), vec!["en".to_string(), "es".to_string()]);
        assert_eq!(**catalog.get("en").unwrap(), sample_document());
        assert!(catalog.get("fr").is_none());
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DatasetCatalog::load_dir(&dir.path().join("nope")).await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_dataset_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), br#"{"summary": 3}"#).unwrap();

        let err = DatasetCatalog::load_dir(dir.path()).await.unwrap_err();
        assert!(matches!(err, DatasetError::Parse { .. }));
        assert!(err.to_string().contains("en.json"));
    }

    #[test]
    fn test_bundled_datasets_parse() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/cv");
        for locale in ["en", "es"] {
            let raw = std::fs::read(dir.join(format!("{locale}.json"))).unwrap();
            let doc: CvDocument = serde_json::from_slice(&raw).unwrap();
            assert!(!doc.personal_info.name.is_empty(), "{locale} has a name");
            assert!(!doc.experience.is_empty(), "{locale} has experience");
        }
    }
}
