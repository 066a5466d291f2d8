use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use stockgrid::io::backend::{Backend, Patch, QuerySpec};
use stockgrid::io::file_backend::JsonFileBackend;
use stockgrid::io::json_io::{self, JsonIoError};
use stockgrid::state::data_model::{CellValue, EntityId, ProductStatus, Row};
use stockgrid::state::schema::Schema;
use stockgrid::state::view::SortOrder;
use stockgrid::BackendError;

fn fixture_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("products.json")
}

fn sample_rows() -> Vec<Row> {
    vec![
        BTreeMap::from([
            ("id".to_string(), Value::String("a".to_string())),
            ("name".to_string(), Value::String("Kettle".to_string())),
            ("stock".to_string(), Value::Number(3.into())),
        ]),
        BTreeMap::from([
            ("id".to_string(), Value::String("b".to_string())),
            ("name".to_string(), Value::String("Mug".to_string())),
            ("image_url".to_string(), Value::Null),
        ]),
    ]
}

fn copy_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("catalog.json");
    std::fs::copy(fixture_path(), &path).unwrap();
    path
}

#[test]
fn test_load_json_not_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obj.json");
    std::fs::write(&path, r#"{"key": "value"}"#).unwrap();

    let err = json_io::load_json(&path).unwrap_err();
    assert!(matches!(err, JsonIoError::NotAnArray));
}

#[test]
fn test_load_json_not_objects() {
    let err = json_io::parse_rows("[1, 2, 3]").unwrap_err();
    assert!(matches!(err, JsonIoError::NotArrayOfObjects));
}

#[test]
fn test_load_json_invalid_json() {
    let err = json_io::parse_rows("not json at all").unwrap_err();
    assert!(matches!(err, JsonIoError::Parse(_)));
}

#[test]
fn test_load_json_file_not_found() {
    let err = json_io::load_json(Path::new("/nonexistent/path/file.json")).unwrap_err();
    assert!(matches!(err, JsonIoError::Io(_)));
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.json");

    json_io::save_json(&path, &sample_rows()).unwrap();
    assert_eq!(json_io::load_json(&path).unwrap(), sample_rows());
    assert!(std::fs::read_to_string(&path).unwrap().contains('\n'));
}

#[test]
fn test_save_json_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exports").join("2024").join("rows.json");
    let mut row = Row::new();
    row.insert("id".to_string(), Value::from("p01"));

    json_io::save_json(&path, &[row.clone()]).unwrap();
    json_io::save_json(&path, &[row.clone(), row]).unwrap();

    assert_eq!(json_io::load_json(&path).unwrap().len(), 2);
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("rows.json")]);
}

#[test]
fn test_load_products_from_fixture() {
    let products = json_io::load_products(&fixture_path(), &Schema::products()).unwrap();
    assert_eq!(products.len(), 12);
    assert_eq!(products[2].get("name"), Some(&CellValue::Text("Tea Pot".to_string())));
    assert_eq!(products[2].get("price"), Some(&CellValue::Number(24.0)));
    assert_eq!(
        products[4].get("status"),
        Some(&CellValue::Status(ProductStatus::Archived))
    );
}

#[test]
fn test_load_products_reports_bad_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"[{"id":"a","stock":"lots"}]"#).unwrap();

    let err = json_io::load_products(&path, &Schema::products()).unwrap_err();
    assert!(matches!(err, JsonIoError::InvalidRow(_)));
}

#[test]
fn test_save_products_writes_nulls_and_integers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    let products = json_io::load_products(&fixture_path(), &Schema::products()).unwrap();

    json_io::save_products(&path, &products).unwrap();
    let rows = json_io::load_json(&path).unwrap();
    assert_eq!(rows[1]["image_url"], Value::Null);
    assert_eq!(rows[0]["stock"], Value::Number(120.into()));
    assert_eq!(rows[0]["id"], Value::String("p01".to_string()));
}

#[tokio::test]
async fn test_file_backend_creates_missing_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.json");
    let backend =
        JsonFileBackend::open(&path, dir.path().join("blobs"), "file:///blobs", Schema::products())
            .unwrap();

    assert!(path.exists());
    assert!(backend.query(&QuerySpec::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_backend_query_orders_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::open(
        copy_fixture(dir.path()),
        dir.path().join("blobs"),
        "file:///blobs",
        Schema::products(),
    )
    .unwrap();

    let rows = backend.query(&QuerySpec::default()).await.unwrap();
    assert_eq!(rows.first().unwrap().id().as_str(), "p12");
    assert_eq!(rows.last().unwrap().id().as_str(), "p01");

    let oldest_first = QuerySpec {
        order_by: Some(("created_at".to_string(), SortOrder::Asc)),
    };
    let rows = backend.query(&oldest_first).await.unwrap();
    assert_eq!(rows.first().unwrap().id().as_str(), "p01");
}

#[tokio::test]
async fn test_file_backend_writes_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = copy_fixture(dir.path());
    let backend = JsonFileBackend::open(
        &catalog,
        dir.path().join("blobs"),
        "file:///blobs",
        Schema::products(),
    )
    .unwrap();

    backend
        .mutate_field(&EntityId::from("p01"), "price", &CellValue::Number(5.25))
        .await
        .unwrap();
    let patch = Patch::from([(
        "status".to_string(),
        CellValue::Status(ProductStatus::Draft),
    )]);
    backend
        .mutate_batch(&[EntityId::from("p02"), EntityId::from("p04")], &patch)
        .await
        .unwrap();
    backend
        .delete_batch(&[EntityId::from("p12")])
        .await
        .unwrap();

    let on_disk = json_io::load_products(&catalog, &Schema::products()).unwrap();
    assert_eq!(on_disk.len(), 11);
    assert_eq!(on_disk[0].get("price"), Some(&CellValue::Number(5.25)));
    assert_eq!(
        on_disk[3].get("status"),
        Some(&CellValue::Status(ProductStatus::Draft))
    );
}

#[tokio::test]
async fn test_file_backend_missing_row_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = copy_fixture(dir.path());
    let backend =
        JsonFileBackend::open(&catalog, dir.path().join("blobs"), "file:///blobs", Schema::products())
            .unwrap();

    let err = backend
        .mutate_field(&EntityId::from("ghost"), "price", &CellValue::Number(1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotFound(_)));
}

#[tokio::test]
async fn test_file_backend_stores_and_links_objects() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = copy_fixture(dir.path());
    let blobs = dir.path().join("blobs");
    let backend =
        JsonFileBackend::open(&catalog, &blobs, "file:///blobs/", Schema::products()).unwrap();

    let reference = backend
        .upload_binary("public/p03/photo.jpg", vec![1, 2, 3], "image/jpeg")
        .await
        .unwrap();
    assert_eq!(reference, "file:///blobs/public/p03/photo.jpg");
    assert_eq!(
        std::fs::read(blobs.join("public/p03/photo.jpg")).unwrap(),
        vec![1, 2, 3]
    );

    backend
        .link_reference(&EntityId::from("p03"), "image_url", &reference)
        .await
        .unwrap();
    let on_disk = json_io::load_products(&catalog, &Schema::products()).unwrap();
    assert_eq!(
        on_disk[2].get("image_url"),
        Some(&CellValue::Url(Some(reference)))
    );

    backend.remove_binary("public/p03/photo.jpg").await.unwrap();
    assert!(!blobs.join("public/p03/photo.jpg").exists());
    let err = backend.remove_binary("public/p03/photo.jpg").await.unwrap_err();
    assert!(matches!(err, BackendError::NotFound(_)));
}

#[tokio::test]
async fn test_file_backend_refuses_escaping_paths() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::open(
        dir.path().join("catalog.json"),
        dir.path().join("blobs"),
        "file:///blobs",
        Schema::products(),
    )
    .unwrap();

    for path in ["../outside.jpg", "/etc/passwd", ""] {
        let err = backend
            .upload_binary(path, vec![0], "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)), "{path}");
    }
}
