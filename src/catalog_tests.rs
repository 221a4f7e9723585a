//! Tests for catalog loading and atomic persistence

use super::*;
use serde_json::json;

fn sample_doc() -> Value {
    json!({
        "version": 3,
        "cadToCoins": 100,
        "wearMultipliers": { "Factory New": 1.0, "Battle-Scarred": 0.4 },
        "cases": { "case-alpha": 2.5, "case-beta": 0.8 },
        "keys": { "default": 3.49 },
        "items": { "ak47-redline|Field-Tested|0|None": 11.2 },
        "priceUpdatedAtUtc": {
            "cases": { "case-alpha": "2025-01-01T00:00:00Z" },
            "keys": {},
            "items": {}
        }
    })
}

#[test]
fn load_requires_all_three_buckets() {
    for missing in ["cases", "keys", "items"] {
        let mut doc = sample_doc();
        doc.as_object_mut().unwrap().remove(missing);
        match PriceCatalog::from_value(doc) {
            Err(RefreshError::Schema(msg)) => assert!(msg.contains(missing)),
            other => panic!("Expected Schema error for missing {missing}, got: {other:?}"),
        }
    }
}

#[test]
fn load_rejects_non_object_root() {
    assert!(matches!(
        PriceCatalog::from_value(json!([1, 2, 3])),
        Err(RefreshError::Schema(_))
    ));
}

#[test]
fn load_rejects_non_numeric_price() {
    let mut doc = sample_doc();
    doc["cases"]["case-alpha"] = json!("not a price");
    assert!(matches!(
        PriceCatalog::from_value(doc),
        Err(RefreshError::Schema(_))
    ));
}

#[test]
fn load_rejects_negative_price() {
    let mut doc = sample_doc();
    doc["keys"]["default"] = json!(-1.0);
    assert!(matches!(
        PriceCatalog::from_value(doc),
        Err(RefreshError::Schema(_))
    ));
}

#[test]
fn getters_and_setters() {
    let mut catalog = PriceCatalog::from_value(sample_doc()).unwrap();

    assert_eq!(catalog.price(Bucket::Cases, "case-alpha"), Some(2.5));
    assert_eq!(catalog.price(Bucket::Cases, "nope"), None);
    assert_eq!(
        catalog.updated_at(Bucket::Cases, "case-alpha"),
        Some("2025-01-01T00:00:00Z")
    );
    assert_eq!(catalog.updated_at(Bucket::Keys, "default"), None);

    catalog.set_price(Bucket::Keys, "default", 3.99);
    catalog.set_updated_at(Bucket::Keys, "default", "2025-06-01T12:00:00Z");
    assert_eq!(catalog.price(Bucket::Keys, "default"), Some(3.99));
    assert_eq!(
        catalog.updated_at(Bucket::Keys, "default"),
        Some("2025-06-01T12:00:00Z")
    );
}

#[test]
fn entry_ids_sorted() {
    let catalog = PriceCatalog::from_value(sample_doc()).unwrap();
    assert_eq!(catalog.entry_ids(Bucket::Cases), vec!["case-alpha", "case-beta"]);
    assert_eq!(catalog.len(Bucket::Items), 1);
}

#[test]
fn round_trip_preserves_values_and_metadata() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("prices.json");

    let mut catalog = PriceCatalog::from_value(sample_doc()).unwrap();
    catalog.set_price(Bucket::Items, "ak47-redline|Field-Tested|0|None", 12.01);
    catalog.save_atomic(&path).unwrap();

    let reloaded = PriceCatalog::load(&path).unwrap();
    assert_eq!(
        reloaded.price(Bucket::Items, "ak47-redline|Field-Tested|0|None"),
        Some(12.01)
    );
    assert_eq!(reloaded.price(Bucket::Cases, "case-beta"), Some(0.8));

    // Metadata the refresher never touches must survive wholesale.
    let doc = reloaded.to_value();
    assert_eq!(doc["version"], json!(3));
    assert_eq!(doc["cadToCoins"], json!(100));
    assert_eq!(doc["wearMultipliers"]["Factory New"], json!(1.0));
}

#[test]
fn save_writes_trailing_newline_and_no_tmp_leftover() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("prices.json");

    let catalog = PriceCatalog::from_value(sample_doc()).unwrap();
    catalog.save_atomic(&path).unwrap();

    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.ends_with('\n'));
    assert!(!dir.path().join("prices.json.tmp").exists());
}

#[test]
fn backup_copies_current_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("prices.json");

    let catalog = PriceCatalog::from_value(sample_doc()).unwrap();
    catalog.save_atomic(&path).unwrap();

    let backup = PriceCatalog::backup(&path).unwrap();
    assert!(backup.exists());
    assert_eq!(
        std::fs::read_to_string(&backup).unwrap(),
        std::fs::read_to_string(&path).unwrap()
    );
}

#[test]
fn money_round_two_decimals() {
    assert_eq!(money_round(5.004), 5.0);
    assert_eq!(money_round(5.016), 5.02);
    assert_eq!(money_round(1.0 / 3.0), 0.33);
}

#[test]
fn parse_iso_utc_accepts_zulu() {
    let dt = parse_iso_utc("2025-01-01T10:30:00Z").unwrap();
    assert_eq!(dt.to_rfc3339_opts(SecondsFormat::Secs, true), "2025-01-01T10:30:00Z");
    assert!(parse_iso_utc("not a date").is_none());
    assert!(parse_iso_utc("").is_none());
}

#[test]
fn utc_now_iso_round_trips() {
    let now = utc_now_iso();
    assert!(parse_iso_utc(&now).is_some());
}
