//! Model cache behaviour under repeated and concurrent loads.

#![allow(clippy::unwrap_used)]

mod common;

use common::{CountingLoader, FixedHandle, write_run};
use imgclas::config::ConfigStore;
use imgclas::models::{ModelCache, ModelHandle, ModelStore};
use std::sync::{Arc, RwLock};
use std::thread;

fn fixed() -> Box<dyn ModelHandle> {
    Box::new(FixedHandle(vec![0.5, 0.5]))
}

fn cache(models: &std::path::Path, loader: CountingLoader) -> ModelCache {
    ModelCache::new(ModelStore::new(models), Box::new(loader))
}

#[test]
fn test_ensure_loaded_twice_builds_once() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), "api", &["rose", "oak"], None);
    let loader = CountingLoader::new(fixed);
    let cache = cache(dir.path(), loader.clone());
    let config = RwLock::new(ConfigStore::from_default_schema().unwrap());

    let first = cache.ensure_loaded("api", "final_model.onnx", &config).unwrap();
    let second = cache.ensure_loaded("api", "final_model.onnx", &config).unwrap();

    assert_eq!(loader.count(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_misses_load_once() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), "api", &["rose", "oak"], None);
    let loader = CountingLoader::new(fixed);
    let cache = cache(dir.path(), loader.clone());
    let config = RwLock::new(ConfigStore::from_default_schema().unwrap());

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                cache
                    .ensure_loaded("api", "final_model.onnx", &config)
                    .unwrap();
            });
        }
    });

    assert_eq!(loader.count(), 1);
}

#[test]
fn test_switching_runs_replaces_the_resident_model() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), "2023-01-01", &["rose", "oak"], None);
    write_run(dir.path(), "2024-01-01", &["fern", "moss"], None);
    let loader = CountingLoader::new(fixed);
    let cache = cache(dir.path(), loader.clone());
    let config = RwLock::new(ConfigStore::from_default_schema().unwrap());

    let old = cache
        .ensure_loaded("2023-01-01", "final_model.onnx", &config)
        .unwrap();
    let new = cache
        .ensure_loaded("2024-01-01", "final_model.onnx", &config)
        .unwrap();

    assert_eq!(loader.count(), 2);
    assert_eq!(old.class_names, vec!["rose", "oak"]);
    assert_eq!(new.class_names, vec!["fern", "moss"]);
    assert_eq!(cache.current().unwrap().timestamp, "2024-01-01");
}
