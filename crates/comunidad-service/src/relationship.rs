//! Many-to-many associations stored in junction tables.

use comunidad_core::{ComunidadError, ComunidadResult, Filter, Row, SelectQuery};
use comunidad_repository::BackingStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A junction table and its two foreign-key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    pub table: String,
    pub source_column: String,
    pub target_column: String,
}

impl Junction {
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }

    /// The same table read from the target side.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(&self.table, &self.target_column, &self.source_column)
    }
}

fn id_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Pair CRUD over one [`Junction`].
///
/// Duplicate pairs are rejected by the store's uniqueness constraint and
/// reported as [`ComunidadError::RelationshipExists`]. Every other failure is
/// wrapped in [`ComunidadError::Relationship`]. Nothing is retried.
#[derive(Clone)]
pub struct RelationshipService {
    store: Arc<dyn BackingStore>,
    junction: Junction,
}

impl RelationshipService {
    #[must_use]
    pub fn new(store: Arc<dyn BackingStore>, junction: Junction) -> Self {
        Self { store, junction }
    }

    #[must_use]
    pub const fn junction(&self) -> &Junction {
        &self.junction
    }

    fn wrap(&self, action: &str, err: ComunidadError, source_id: &str, target_id: &str) -> ComunidadError {
        match err {
            ComunidadError::Conflict(_) => ComunidadError::RelationshipExists {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            },
            other => ComunidadError::Relationship(format!(
                "Failed to {} {} ({}, {}): {}",
                action, self.junction.table, source_id, target_id, other
            )),
        }
    }

    fn pair_filters(&self, source_id: &str, target_id: &str) -> [Filter; 2] {
        [
            Filter::eq(self.junction.source_column.as_str(), source_id),
            Filter::eq(self.junction.target_column.as_str(), target_id),
        ]
    }

    pub async fn add_relationship(&self, source_id: &str, target_id: &str) -> ComunidadResult<()> {
        self.add_relationship_with(source_id, target_id, Row::new()).await
    }

    /// Inserts the pair with extra junction columns such as a role label.
    pub async fn add_relationship_with(
        &self,
        source_id: &str,
        target_id: &str,
        attributes: Row,
    ) -> ComunidadResult<()> {
        let mut row = attributes;
        row.insert(self.junction.source_column.clone(), Value::String(source_id.to_string()));
        row.insert(self.junction.target_column.clone(), Value::String(target_id.to_string()));

        self.store
            .insert(&self.junction.table, row)
            .await
            .map_err(|e| self.wrap("link", e, source_id, target_id))?;

        info!(junction = %self.junction.table, source_id, target_id, "Relationship added");
        Ok(())
    }

    /// Removes the pair. Removing an absent pair succeeds.
    pub async fn remove_relationship(&self, source_id: &str, target_id: &str) -> ComunidadResult<()> {
        let removed = self
            .store
            .delete_where(&self.junction.table, &self.pair_filters(source_id, target_id))
            .await
            .map_err(|e| self.wrap("unlink", e, source_id, target_id))?;

        debug!(junction = %self.junction.table, source_id, target_id, removed, "Relationship removed");
        Ok(())
    }

    /// Target ids linked to `source_id`.
    pub async fn get_relationships(&self, source_id: &str) -> ComunidadResult<Vec<String>> {
        self.linked(&self.junction.source_column, &self.junction.target_column, source_id)
            .await
    }

    /// Source ids linked to `target_id`.
    pub async fn get_sources(&self, target_id: &str) -> ComunidadResult<Vec<String>> {
        self.linked(&self.junction.target_column, &self.junction.source_column, target_id)
            .await
    }

    async fn linked(&self, by: &str, pick: &str, id: &str) -> ComunidadResult<Vec<String>> {
        let query = SelectQuery::new().columns([pick]).filter(Filter::eq(by, id));
        let rows = self
            .store
            .select(&self.junction.table, &query)
            .await
            .map_err(|e| {
                ComunidadError::Relationship(format!(
                    "Failed to read {} by {} = {}: {}",
                    self.junction.table, by, id, e
                ))
            })?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(pick).and_then(id_text))
            .collect())
    }

    pub async fn has_relationship(&self, source_id: &str, target_id: &str) -> ComunidadResult<bool> {
        let count = self
            .store
            .count(&self.junction.table, &self.pair_filters(source_id, target_id))
            .await
            .map_err(|e| self.wrap("check", e, source_id, target_id))?;
        Ok(count > 0)
    }

    pub async fn count_relationships(&self, source_id: &str) -> ComunidadResult<u64> {
        self.store
            .count(
                &self.junction.table,
                &[Filter::eq(self.junction.source_column.as_str(), source_id)],
            )
            .await
            .map_err(|e| {
                ComunidadError::Relationship(format!(
                    "Failed to count {} for {}: {}",
                    self.junction.table, source_id, e
                ))
            })
    }
}

impl std::fmt::Debug for RelationshipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipService")
            .field("junction", &self.junction)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comunidad_repository::InMemoryStore;
    use serde_json::json;

    fn service() -> RelationshipService {
        let store = InMemoryStore::new().with_unique("persona_tema", ["persona_id", "tema_id"]);
        RelationshipService::new(
            Arc::new(store),
            Junction::new("persona_tema", "persona_id", "tema_id"),
        )
    }

    #[tokio::test]
    async fn test_add_and_query_pairs() {
        let service = service();
        service.add_relationship("P1", "T1").await.unwrap();
        service.add_relationship("P1", "T2").await.unwrap();
        service.add_relationship("P2", "T1").await.unwrap();

        let mut targets = service.get_relationships("P1").await.unwrap();
        targets.sort();
        assert_eq!(targets, vec!["T1", "T2"]);

        let mut sources = service.get_sources("T1").await.unwrap();
        sources.sort();
        assert_eq!(sources, vec!["P1", "P2"]);

        assert!(service.has_relationship("P2", "T1").await.unwrap());
        assert!(!service.has_relationship("P2", "T2").await.unwrap());
        assert_eq!(service.count_relationships("P1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_typed_error() {
        let service = service();
        service.add_relationship("P1", "T1").await.unwrap();

        match service.add_relationship("P1", "T1").await.unwrap_err() {
            ComunidadError::RelationshipExists { source_id, target_id } => {
                assert_eq!((source_id.as_str(), target_id.as_str()), ("P1", "T1"));
            }
            other => panic!("Expected RelationshipExists, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let service = service();
        service.add_relationship("P1", "T1").await.unwrap();

        service.remove_relationship("P1", "T1").await.unwrap();
        service.remove_relationship("P1", "T1").await.unwrap();
        assert!(!service.has_relationship("P1", "T1").await.unwrap());
    }

    #[tokio::test]
    async fn test_attributes_are_stored() {
        let store = Arc::new(InMemoryStore::new());
        let service = RelationshipService::new(
            store.clone(),
            Junction::new("organizacion_persona", "organizacion_id", "persona_id"),
        );

        let mut attributes = Row::new();
        attributes.insert("rol".to_string(), json!("coordinadora"));
        service.add_relationship_with("O1", "P1", attributes).await.unwrap();

        let rows = store.rows("organizacion_persona");
        assert_eq!(rows[0]["rol"], json!("coordinadora"));
        assert_eq!(rows[0]["persona_id"], json!("P1"));
    }

    #[test]
    fn test_reversed_junction() {
        let junction = Junction::new("persona_tema", "persona_id", "tema_id").reversed();
        assert_eq!(junction.source_column, "tema_id");
        assert_eq!(junction.target_column, "persona_id");
    }
}
