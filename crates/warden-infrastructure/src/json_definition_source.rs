//! Definition source backed by a JSON file.

use std::path::PathBuf;

use async_trait::async_trait;
use warden_core::definition::{DefinitionBatch, DefinitionSource};
use warden_core::error::{Result, WardenError};

use crate::dto::parse_definitions;

/// Reads `{ "encounters": [...] }` from disk on every load, so a reload picks
/// up edits.
#[derive(Debug, Clone)]
pub struct JsonDefinitionSource {
    path: PathBuf,
    default_item_chance: f64,
}

impl JsonDefinitionSource {
    pub fn new(path: PathBuf, default_item_chance: f64) -> Self {
        Self {
            path,
            default_item_chance,
        }
    }
}

#[async_trait]
impl DefinitionSource for JsonDefinitionSource {
    async fn load(&self) -> Result<DefinitionBatch> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WardenError::not_found(
                    "definitions file",
                    self.path.display().to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let batch = parse_definitions(&content, self.default_item_chance)?;
        tracing::debug!(
            path = %self.path.display(),
            loaded = batch.definitions.len(),
            rejected = batch.rejected.len(),
            "Parsed definitions file"
        );
        Ok(batch)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_reads_current_file_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("encounters.json");
        std::fs::write(
            &path,
            r#"{"encounters":[{"id":"a","waves":[{"mobType":"ZOMBIE","count":1}]}]}"#,
        )
        .unwrap();
        let source = JsonDefinitionSource::new(path.clone(), 0.25);

        assert_eq!(source.load().await.unwrap().definitions.len(), 1);

        std::fs::write(
            &path,
            r#"{"encounters":[
                {"id":"a","waves":[{"mobType":"ZOMBIE","count":1}]},
                {"id":"b","waves":[{"mobType":"SPIDER","count":2}]}]}"#,
        )
        .unwrap();
        assert_eq!(source.load().await.unwrap().definitions.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let source = JsonDefinitionSource::new(temp_dir.path().join("none.json"), 0.25);

        let err = source.load().await.unwrap_err();
        assert!(err.is_not_found());
    }
}
