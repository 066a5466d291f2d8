use std::collections::BTreeMap;

use serde_json::{json, Value};

use stockgrid::state::data_model::{CellValue, Entity, EntityId, ProductStatus, Row};
use stockgrid::state::row_store::{MutationRecord, RowStore};
use stockgrid::state::schema::{ColumnType, Schema};
use stockgrid::GridError;

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map.into_iter().collect::<BTreeMap<_, _>>(),
        _ => panic!("fixture row must be an object"),
    }
}

fn product(id: &str, price: f64, stock: i64) -> Entity {
    Entity::new(EntityId::from(id))
        .with("name", CellValue::Text(format!("Product {id}")))
        .with("price", CellValue::Number(price))
        .with("stock", CellValue::Integer(stock))
        .with("status", CellValue::Status(ProductStatus::Active))
}

#[test]
fn test_entity_from_row_coerces_declared_types() {
    let schema = Schema::products();
    let entity = schema
        .entity_from_row(&row(json!({
            "id": "a1",
            "name": "Kettle",
            "price": "19.5",
            "stock": 4,
            "status": "draft",
            "image_url": null
        })))
        .unwrap();

    assert_eq!(entity.id().as_str(), "a1");
    assert_eq!(entity.get("price"), Some(&CellValue::Number(19.5)));
    assert_eq!(entity.get("stock"), Some(&CellValue::Integer(4)));
    assert_eq!(entity.get("status"), Some(&CellValue::Status(ProductStatus::Draft)));
    assert_eq!(entity.get("image_url"), Some(&CellValue::Url(None)));
    assert!(entity.get("id").is_none());
}

#[test]
fn test_entity_from_row_numeric_identity() {
    let entity = Schema::products()
        .entity_from_row(&row(json!({"id": 42, "name": "Mug"})))
        .unwrap();
    assert_eq!(entity.id(), &EntityId::new("42"));
}

#[test]
fn test_entity_from_row_rejects_missing_identity() {
    let err = Schema::products()
        .entity_from_row(&row(json!({"name": "Mug"})))
        .unwrap_err();
    assert!(matches!(err, GridError::Validation(_)));
}

#[test]
fn test_entity_from_row_rejects_unknown_status() {
    let err = Schema::products()
        .entity_from_row(&row(json!({"id": "x", "status": "sold-out"})))
        .unwrap_err();
    assert!(matches!(err, GridError::Validation(_)));
}

#[test]
fn test_undeclared_column_is_inferred() {
    let entity = Schema::products()
        .entity_from_row(&row(json!({"id": "x", "weight": 3, "origin": "Kenya"})))
        .unwrap();
    assert_eq!(entity.get("weight"), Some(&CellValue::Integer(3)));
    assert_eq!(entity.get("origin"), Some(&CellValue::Text("Kenya".to_string())));
}

#[test]
fn test_coerce_input_is_lenient_for_numbers() {
    let schema = Schema::products();
    assert_eq!(schema.coerce_input("price", "abc").unwrap(), CellValue::Number(0.0));
    assert_eq!(schema.coerce_input("price", "12.50 USD").unwrap(), CellValue::Number(12.5));
    assert_eq!(schema.coerce_input("stock", "").unwrap(), CellValue::Integer(0));
    assert!(schema.coerce_input("status", "gone").is_err());
    assert_eq!(
        schema.coerce_input("status", " Archived ").unwrap(),
        CellValue::Status(ProductStatus::Archived)
    );
}

#[test]
fn test_set_column_type_overrides_and_removes() {
    let mut schema = Schema::products();
    schema.set_column_type("stock", Some(ColumnType::Number));
    assert_eq!(schema.column_type("stock"), Some(ColumnType::Number));
    schema.set_column_type("stock", None);
    assert_eq!(schema.column_type("stock"), None);
}

#[test]
fn test_entity_to_row_roundtrips_values() {
    let entity = product("p1", 9.99, 3).with("image_url", CellValue::Url(None));
    let row = entity.to_row();
    assert_eq!(row.get("id"), Some(&json!("p1")));
    assert_eq!(row.get("price"), Some(&json!(9.99)));
    assert_eq!(row.get("stock"), Some(&json!(3)));
    assert_eq!(row.get("status"), Some(&json!("active")));
    assert_eq!(row.get("image_url"), Some(&Value::Null));
}

#[test]
fn test_cell_display_formats_numbers() {
    assert_eq!(CellValue::Number(100.0).to_string(), "100");
    assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
    assert_eq!(CellValue::Url(None).to_string(), "");
}

#[test]
fn test_row_store_rejects_duplicate_identity() {
    let err = RowStore::from_entities(vec![product("p1", 1.0, 1), product("p1", 2.0, 2)]).unwrap_err();
    assert!(matches!(err, GridError::Validation(_)));
}

#[test]
fn test_optimistic_value_survives_refresh_until_settled() {
    let id = EntityId::from("p1");
    let mut store = RowStore::from_entities(vec![product("p1", 10.0, 1)]).unwrap();

    let previous = store
        .apply_optimistic(&id, "price", CellValue::Number(12.0))
        .unwrap();
    assert_eq!(previous, Some(CellValue::Number(10.0)));

    store.replace_all(vec![product("p1", 10.0, 7)]).unwrap();
    assert_eq!(store.value(&id, "price"), Some(&CellValue::Number(12.0)));
    assert_eq!(store.value(&id, "stock"), Some(&CellValue::Integer(7)));
    assert!(store.get(&id).unwrap().is_dirty("price"));

    store.acknowledge(&id, "price", CellValue::Number(12.0)).unwrap();
    assert!(!store.get(&id).unwrap().is_dirty("price"));
    store.replace_all(vec![product("p1", 11.0, 7)]).unwrap();
    assert_eq!(store.value(&id, "price"), Some(&CellValue::Number(11.0)));
}

#[test]
fn test_rollback_restores_original() {
    let id = EntityId::from("p1");
    let mut store = RowStore::from_entities(vec![product("p1", 10.0, 50)]).unwrap();
    store
        .apply_optimistic(&id, "stock", CellValue::Integer(0))
        .unwrap();
    store.rollback(&id, "stock", Some(CellValue::Integer(50)));

    assert_eq!(store.value(&id, "stock"), Some(&CellValue::Integer(50)));
    assert!(!store.get(&id).unwrap().is_dirty("stock"));
    assert!(matches!(
        store.history().last(),
        Some(MutationRecord::Rollback { column, .. }) if column == "stock"
    ));
}

#[test]
fn test_acknowledge_unknown_entity_is_not_found() {
    let mut store = RowStore::new();
    let err = store
        .acknowledge(&EntityId::from("ghost"), "price", CellValue::Number(1.0))
        .unwrap_err();
    assert!(matches!(err, GridError::NotFound(_)));
}

#[test]
fn test_history_is_bounded() {
    let id = EntityId::from("p1");
    let mut store = RowStore::from_entities(vec![product("p1", 0.0, 0)]).unwrap();
    for n in 0..400 {
        store.acknowledge(&id, "stock", CellValue::Integer(n)).unwrap();
    }
    assert_eq!(store.history().count(), 256);
    assert!(matches!(
        store.history().last(),
        Some(MutationRecord::Field { after: CellValue::Integer(399), .. })
    ));
}
