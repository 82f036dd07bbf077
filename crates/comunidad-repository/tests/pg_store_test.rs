//! Integration tests for PgStore.
//!
//! These tests run against a real PostgreSQL database using testcontainers.
//! Requires Docker to be available on the system.

mod common;

use common::TestDatabase;
use comunidad_core::{ComunidadError, Filter, Row, SelectQuery, Sort};
use comunidad_repository::BackingStore;
use serde_json::{json, Value};

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => panic!("row must be an object"),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_select_update_delete() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let inserted = store
        .insert("temas", row(json!({"id": "T1", "nombre": "Riego", "orden": 1})))
        .await
        .expect("Failed to insert");
    assert_eq!(inserted["nombre"], json!("Riego"));
    assert!(inserted.contains_key("created_at"));

    let found = store
        .select("temas", &SelectQuery::new().filter(Filter::eq("id", "T1")))
        .await
        .expect("Query failed");
    assert_eq!(found.len(), 1);

    let updated = store
        .update("temas", "T1", row(json!({"nombre": "Riego por goteo"})))
        .await
        .expect("Update failed")
        .expect("Row not found");
    assert_eq!(updated["nombre"], json!("Riego por goteo"));
    assert_eq!(updated["orden"], json!(1));

    assert!(store.update("temas", "T404", row(json!({"nombre": "x"}))).await.unwrap().is_none());
    assert!(store.delete("temas", "T1").await.unwrap());
    assert!(!store.delete("temas", "T1").await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_filters_sort_and_count() {
    let db = TestDatabase::new().await;
    let store = db.store();

    for (id, nombre, orden) in [("T1", "Riego", 3), ("T2", "Agroecología", 1), ("T3", "Agroforestería", 2)] {
        store
            .insert("temas", row(json!({"id": id, "nombre": nombre, "orden": orden})))
            .await
            .unwrap();
    }

    let query = SelectQuery::new()
        .columns(["id", "orden"])
        .filter(Filter::ilike("nombre", "agro%"))
        .filter(Filter::gte("orden", 1))
        .sort(Some(Sort::desc("orden")));
    let rows = store.select("temas", &query).await.unwrap();
    assert_eq!(rows, vec![row(json!({"id": "T3", "orden": 2})), row(json!({"id": "T2", "orden": 1}))]);

    let in_rows = store
        .count("temas", &[Filter::is_in("id", vec!["T1", "T3"])])
        .await
        .unwrap();
    assert_eq!(in_rows, 2);
    assert_eq!(store.count("temas", &[Filter::is_null("descripcion")]).await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unique_violation_is_conflict() {
    let db = TestDatabase::new().await;
    let store = db.store();
    let pair = row(json!({"persona_id": "P1", "tema_id": "T1"}));

    store.insert("persona_tema", pair.clone()).await.unwrap();
    let err = store.insert("persona_tema", pair).await.unwrap_err();
    assert!(matches!(err, ComunidadError::Conflict(_)));

    let removed = store
        .delete_where("persona_tema", &[Filter::eq("persona_id", "P1"), Filter::eq("tema_id", "T1")])
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_text_search() {
    let db = TestDatabase::new().await;
    let store = db.store();

    store
        .insert("temas", row(json!({"nombre": "Agricultura", "descripcion": "Rotación de cultivos en zonas áridas"})))
        .await
        .unwrap();
    store
        .insert("temas", row(json!({"nombre": "Pesca", "descripcion": "Pesca artesanal"})))
        .await
        .unwrap();

    let rows = store
        .text_search("temas", "descripcion", "cultivos", &SelectQuery::new())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["nombre"], json!("Agricultura"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rejects_invalid_identifiers() {
    let db = TestDatabase::new().await;
    let store = db.store();

    let err = store
        .select("temas; DROP TABLE temas", &SelectQuery::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
