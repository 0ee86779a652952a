//! Lookup cache file tests

use drugmatch::cache::{CacheFile, ProductKey, RegistryCache};
use drugmatch_common::{Confidence, EnrichmentRecord, RegistryProduct};
use tempfile::tempdir;

fn enrichment(name: &str, confidence: Confidence) -> EnrichmentRecord {
    EnrichmentRecord {
        normalized_name: name.to_string(),
        ingredient_base: "ATORVASTATIN".to_string(),
        local_ingredient_name: "아토르바스타틴".to_string(),
        local_search_term: "아토르바스타틴".to_string(),
        local_name_mapped: true,
        confidence,
        ..Default::default()
    }
}

fn product(code: &str) -> RegistryProduct {
    RegistryProduct {
        item_code: code.to_string(),
        product_name: format!("제품{}", code),
        ..Default::default()
    }
}

/// Missing cache file
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache = CacheFile::load(dir.path());

    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// Save and reload both caches
#[test]
fn test_cache_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");

    let live = RegistryCache::new();
    live.enrichment
        .insert("LIPITOR".to_string(), enrichment("LIPITOR", Confidence::High));
    live.products.insert(
        ProductKey::new("아토르바스타틴", false),
        vec![product("1"), product("2")],
    );

    CacheFile::from_cache(&live)
        .save(dir.path())
        .expect("Failed to save cache");

    let loaded = CacheFile::load(dir.path());
    assert_eq!(loaded.enrichment_len(), 1);
    assert_eq!(loaded.product_len(), 1);

    let restored = RegistryCache::new();
    loaded.restore_into(&restored);

    let record = restored
        .enrichment
        .get(&"LIPITOR".to_string())
        .expect("enrichment entry missing");
    assert_eq!(record.local_ingredient_name, "아토르바스타틴");

    let products = restored
        .products
        .get(&ProductKey::new("아토르바스타틴", false))
        .expect("product entry missing");
    assert_eq!(products.len(), 2);
    assert!(restored
        .products
        .get(&ProductKey::new("아토르바스타틴", true))
        .is_none());
}

/// Empty outcomes are not persisted
#[test]
fn test_cache_skips_empty_outcomes() {
    let live = RegistryCache::new();
    live.enrichment
        .insert("ZZYZX".to_string(), enrichment("ZZYZX", Confidence::Review));
    live.enrichment
        .insert("LIPITOR".to_string(), enrichment("LIPITOR", Confidence::Medium));
    live.products
        .insert(ProductKey::new("없는성분", false), Vec::new());

    let file = CacheFile::from_cache(&live);
    assert_eq!(file.enrichment_len(), 1);
    assert_eq!(file.product_len(), 0);
}

/// Product keys ignore surrounding whitespace
#[test]
fn test_product_key_trims_term() {
    assert_eq!(
        ProductKey::new("  아토르바스타틴 ", true),
        ProductKey::new("아토르바스타틴", true)
    );
    assert_ne!(
        ProductKey::new("아토르바스타틴", true),
        ProductKey::new("아토르바스타틴", false)
    );
}

/// Corrupted cache file
#[test]
fn test_cache_corrupted_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(CacheFile::cache_path(dir.path()), "{ invalid json }").unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// Outdated cache version
#[test]
fn test_cache_version_mismatch() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(
        CacheFile::cache_path(dir.path()),
        r#"{ "version": 0, "enrichment": {}, "products": [ { "term": "x", "include_revoked": false, "products": [] } ] }"#,
    )
    .unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// Deleting the cache file
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");
    assert!(!CacheFile::clear(dir.path()).unwrap());

    CacheFile::default().save(dir.path()).unwrap();
    assert!(CacheFile::cache_path(dir.path()).exists());
    assert!(CacheFile::clear(dir.path()).unwrap());
    assert!(!CacheFile::cache_path(dir.path()).exists());
}

/// Clearing the live caches
#[test]
fn test_registry_cache_clear() {
    let live = RegistryCache::new();
    live.enrichment
        .insert("LIPITOR".to_string(), enrichment("LIPITOR", Confidence::High));
    live.products
        .insert(ProductKey::new("아토르바스타틴", false), vec![product("1")]);

    live.clear();
    assert!(live.enrichment.is_empty());
    assert!(live.products.is_empty());
}
