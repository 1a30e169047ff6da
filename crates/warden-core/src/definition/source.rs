//! Definition source trait.

use std::collections::HashSet;

use async_trait::async_trait;

use super::error::DefinitionError;
use super::model::EncounterDefinition;
use crate::error::Result;

/// Outcome of reading a definition source.
///
/// `definitions` holds only entries that passed validation; every rejected
/// entry is reported in `rejected` instead of failing the whole batch.
#[derive(Debug, Clone, Default)]
pub struct DefinitionBatch {
    pub definitions: Vec<EncounterDefinition>,
    pub rejected: Vec<DefinitionError>,
}

impl DefinitionBatch {
    /// Validates candidates one by one, dropping duplicates after the first.
    pub fn from_candidates(candidates: impl IntoIterator<Item = EncounterDefinition>) -> Self {
        let mut batch = Self::default();
        let mut seen = HashSet::new();

        for definition in candidates {
            if let Err(err) = definition.validate() {
                batch.rejected.push(err);
                continue;
            }
            if !seen.insert(definition.id.clone()) {
                batch.rejected.push(DefinitionError::Duplicate {
                    id: definition.id.clone(),
                });
                continue;
            }
            batch.definitions.push(definition);
        }

        batch
    }
}

/// Somewhere encounter definitions come from (a JSON file, a fixture list).
///
/// A source fails as a whole only when it cannot be read at all; malformed
/// entries go into [`DefinitionBatch::rejected`].
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load(&self) -> Result<DefinitionBatch>;

    /// Human readable origin used in log lines.
    fn describe(&self) -> String;
}

#[async_trait]
impl DefinitionSource for Vec<EncounterDefinition> {
    async fn load(&self) -> Result<DefinitionBatch> {
        Ok(DefinitionBatch::from_candidates(self.iter().cloned()))
    }

    fn describe(&self) -> String {
        format!("{} in-memory definition(s)", self.len())
    }
}
