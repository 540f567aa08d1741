//! Plugin loader behaviour with static plugins, filesystem fixtures and the
//! `material_visualize_normal` library built next to this test

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::fs;
use std::path::PathBuf;

use glam::Vec3;
use lumina_core::geometry::PointGeometry;
use lumina_core::plugin::PluginRegistrar;
use lumina_core::{Component, Error, ImplementationKey, InstanceStore, Locator, Origin, Registry};
use lumina_plugin::{PluginKind, PluginLoader};
use serde_json::json;

struct Group;

impl Component for Group {}

fn register_groups(registrar: &mut PluginRegistrar<'_>) {
    registrar.register("asset_group::one", || Box::new(Group));
    registrar.register("asset_group::two", || Box::new(Group));
}

fn register_conflicting(registrar: &mut PluginRegistrar<'_>) {
    registrar.register("asset_group::three", || Box::new(Group));
    registrar.register("asset_group::one", || Box::new(Group));
}

fn key(s: &str) -> ImplementationKey {
    ImplementationKey::parse(s).unwrap()
}

#[test]
fn static_plugin_registers_and_unloads_cleanly() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let store = InstanceStore::new();

    let handle = loader.load_static("groups", register_groups, &registry).unwrap();
    assert_eq!(registry.keys(), vec![key("asset_group::one"), key("asset_group::two")]);
    assert_eq!(loader.plugins()[0].kind, PluginKind::Static);

    let report = loader.unload(&handle, &registry, &store).unwrap();
    assert_eq!(report.unregistered.len(), 2);
    assert!(report.warning.is_none());
    assert!(registry.is_empty());
    assert!(loader.plugins().is_empty());

    let again = loader.unload(&handle, &registry, &store).unwrap_err();
    assert!(matches!(again, Error::PluginLoad { reason, .. } if reason == "not loaded"));
}

#[test]
fn failed_registration_rolls_back_every_key() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    loader.load_static("groups", register_groups, &registry).unwrap();

    let err = loader
        .load_static("conflicting", register_conflicting, &registry)
        .unwrap_err();
    assert!(matches!(err, Error::PluginLoad { .. }));
    assert!(!registry.contains(&key("asset_group::three")));
    assert_eq!(registry.len(), 2);
    assert!(loader.get("conflicting").is_none());
}

#[test]
fn duplicate_static_name_is_rejected() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    loader.load_static("groups", register_groups, &registry).unwrap();
    assert!(loader.load_static("groups", register_groups, &registry).is_err());
}

#[test]
fn unloading_with_live_instances_warns() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let store = InstanceStore::new();
    let handle = loader.load_static("groups", register_groups, &registry).unwrap();

    let at = Locator::parse("$.g").unwrap();
    let instance = registry
        .create(&key("asset_group::one"), &json!({}), &at, &store)
        .unwrap();
    store.insert(&Locator::root(), "g", instance).unwrap();

    let report = loader.unload(&handle, &registry, &store).unwrap();
    let warning = report.warning.expect("live instance should be reported");
    assert_eq!(warning.live, vec![at]);
    assert!(warning.to_string().contains("$.g"));
    // Static plugins have no library to keep mapped
    assert!(!report.retired);
    assert!(registry.is_empty());
}

#[test]
fn load_reports_missing_files() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();

    let err = loader.load(dir.path().join("nothing"), &registry).unwrap_err();
    assert!(matches!(err, Error::PluginLoad { reason, .. } if reason == "file not found"));
    assert!(!loader.is_loaded(dir.path().join("nothing")));
}

#[test]
fn load_rejects_files_that_are_not_libraries() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(format!("garbage.{}", DLL_EXTENSION)), b"not a library").unwrap();

    let err = loader.load(dir.path().join("garbage"), &registry).unwrap_err();
    assert!(matches!(err, Error::PluginLoad { .. }));
    assert!(registry.is_empty());
}

#[test]
fn directory_scan_skips_bad_candidates() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(format!("broken.{}", DLL_EXTENSION)), b"junk").unwrap();
    fs::write(dir.path().join(format!("Ignored.{}", DLL_EXTENSION)), b"junk").unwrap();
    fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

    assert!(loader.load_directory(dir.path(), &registry).is_empty());
    assert!(loader.load_directory(dir.path().join("missing"), &registry).is_empty());
    assert!(registry.is_empty());
}

const VISUALIZE_NORMAL: &str = "material::visualize_normal";

struct Normals;

impl Component for Normals {}

fn register_host_normals(registry: &Registry) {
    registry
        .register(key(VISUALIZE_NORMAL), || Box::new(Normals))
        .unwrap();
}

fn register_override(registrar: &mut PluginRegistrar<'_>) {
    registrar.register_override("asset_group::one", || Box::new(Group));
}

#[test]
fn unloading_an_override_restores_the_host_factory() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let store = InstanceStore::new();
    registry.register(key("asset_group::one"), || Box::new(Group)).unwrap();

    let handle = loader.load_static("override", register_override, &registry).unwrap();
    assert_eq!(
        registry.origin_of(&key("asset_group::one")),
        Some(Origin::Plugin("override".into()))
    );

    let report = loader.unload(&handle, &registry, &store).unwrap();
    assert_eq!(report.unregistered, vec![key("asset_group::one")]);
    assert_eq!(registry.origin_of(&key("asset_group::one")), Some(Origin::Host));
}

/// Path, without extension, of the `material_visualize_normal` cdylib
///
/// Cargo writes it to the `deps` directory holding this test binary and
/// sometimes copies it one level up.
fn visualize_normal_library() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap().to_path_buf();
    let stem = format!("{}material_visualize_normal", DLL_PREFIX);
    let suffix = format!(".{}", DLL_EXTENSION);

    let mut dirs = vec![deps.clone()];
    dirs.extend(deps.parent().map(|p| p.to_path_buf()));
    for dir in &dirs {
        let exact = dir.join(format!("{}{}", stem, suffix));
        if exact.is_file() {
            return exact.with_extension("");
        }
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let hashed = entries.flatten().map(|entry| entry.path()).find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(&format!("{}-", stem)) && n.ends_with(&suffix))
        });
        if let Some(path) = hashed {
            return path.with_extension("");
        }
    }
    panic!("{}{} not found near {}", stem, suffix, exe.display());
}

#[test]
fn dynamic_plugin_loads_creates_and_unloads() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let store = InstanceStore::new();
    let path = visualize_normal_library();
    let material_key = key(VISUALIZE_NORMAL);

    let handle = loader.load(&path, &registry).unwrap();
    assert_eq!(handle.name(), "material_visualize_normal");
    assert!(loader.is_loaded(&path));
    assert!(matches!(loader.plugins()[0].kind, PluginKind::Dynamic(_)));
    assert_eq!(
        registry.origin_of(&material_key),
        Some(Origin::Plugin("material_visualize_normal".into()))
    );

    {
        let instance = registry
            .create(&material_key, &json!({}), &Locator::parse("$.n").unwrap(), &store)
            .unwrap();
        let geom = PointGeometry {
            n: Vec3::new(0.0, 0.0, -1.0),
            ..Default::default()
        };
        let color = instance
            .component()
            .as_material()
            .and_then(|m| m.reflectance(&geom));
        assert_eq!(color, Some(Vec3::Z));
    }

    let again = loader.load(&path, &registry).unwrap_err();
    assert!(matches!(again, Error::PluginLoad { reason, .. } if reason == "already loaded"));

    let report = loader.unload(&handle, &registry, &store).unwrap();
    assert_eq!(report.unregistered, vec![material_key.clone()]);
    assert!(report.warning.is_none());
    assert!(!report.retired);
    assert!(!registry.contains(&material_key));
    assert!(!loader.is_loaded(&path));
}

#[test]
fn dynamic_plugin_with_live_instances_stays_mapped() {
    let loader = PluginLoader::new();
    let registry = Registry::new();
    let store = InstanceStore::new();
    let material_key = key(VISUALIZE_NORMAL);
    register_host_normals(&registry);

    // Rejected: the host already owns the key
    let err = loader.load(visualize_normal_library(), &registry).unwrap_err();
    assert!(matches!(err, Error::PluginLoad { .. }));
    assert_eq!(registry.origin_of(&material_key), Some(Origin::Host));
    registry.unregister(&material_key);

    let handle = loader.load(visualize_normal_library(), &registry).unwrap();
    let at = Locator::parse("$.n").unwrap();
    let instance = registry.create(&material_key, &json!({}), &at, &store).unwrap();
    store.insert(&Locator::root(), "n", instance).unwrap();

    let report = loader.unload(&handle, &registry, &store).unwrap();
    let warning = report.warning.expect("live instance should be reported");
    assert_eq!(warning.live, vec![at.clone()]);
    assert!(report.retired);
    assert_eq!(loader.retired_count(), 1);
    assert!(!registry.contains(&material_key));

    // The retired library still backs the live instance
    let component = store.resolve(&at).unwrap();
    assert!(component.as_material().is_some());
    drop(component);
    store.clear();
}
