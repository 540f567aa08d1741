//! Session facade: asset loading, replacement, reset and saved state

use std::fs;
use std::sync::Arc;

use glam::Vec3;
use lumina::{Session, SessionConfig};
use lumina_core::geometry::{PointGeometry, Ray};
use lumina_core::interfaces::{Material, SceneState};
use lumina_core::{CapabilityKind, Component, ComponentRef, Error, Locator};
use serde_json::json;

/// Reflectance is the absolute shading normal
struct VisualizeNormal;

impl Component for VisualizeNormal {
    fn as_material(&self) -> Option<&(dyn Material + 'static)> {
        Some(self)
    }
}

impl Material for VisualizeNormal {
    fn reflectance(&self, geom: &PointGeometry) -> Option<Vec3> {
        Some(geom.n.abs())
    }
}

/// Claims to be a material but provides nothing
struct Impostor;

impl Component for Impostor {}

const QUAD_OBJ: &str = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

fn same(a: &ComponentRef, b: &ComponentRef) -> bool {
    Arc::as_ptr(a) as *const u8 == Arc::as_ptr(b) as *const u8
}

fn camera_config() -> serde_json::Value {
    json!({ "position": [0, 0, 5], "center": [0, 0, 0], "up": [0, 1, 0], "vfov": 30 })
}

fn quad_mesh() -> serde_json::Value {
    json!({
        "ps": [-1,-1,0, 1,-1,0, 1,1,0, -1,1,0],
        "ns": [0,0,1],
        "fs": { "p": [0,1,2, 0,2,3], "n": [0,0,0, 0,0,0] }
    })
}

#[test]
fn visualize_normal_through_the_scene() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("quad.obj");
    fs::write(&obj, QUAD_OBJ).unwrap();

    let session = Session::new().unwrap();
    session
        .register("material::visualize_normal", || Box::new(VisualizeNormal))
        .unwrap();

    let material = session
        .load_material("normal", "visualize_normal", &json!({}))
        .unwrap();
    let component = session.get(material.loc()).unwrap();
    assert!(component.as_material().is_some());

    let model = session
        .load_model(
            "quad",
            "wavefrontobj",
            &json!({ "path": obj, "base_material": material.loc() }),
        )
        .unwrap();
    let camera = session.load_camera("camera", "pinhole", &camera_config()).unwrap();
    let accel = session.load_accel("accel", "bvh", &json!({})).unwrap();
    let scene = session.load_scene("scene", "default", &json!({})).unwrap();
    scene.attach_accel(&accel).unwrap();
    scene.add_camera(&camera).unwrap();
    scene.add_model(&model).unwrap();
    scene.build().unwrap();
    assert_eq!(scene.state().unwrap(), SceneState::Built);

    let hit = scene
        .query(&Ray::new(Vec3::new(0.2, 0.1, 5.0), Vec3::NEG_Z))
        .unwrap()
        .expect("ray should hit the quad");
    assert!((hit.t - 5.0).abs() < 1e-4);
    assert_eq!(hit.material.as_ref(), Some(material.loc()));

    let resolved = scene.material_of(&hit).unwrap().unwrap();
    assert!(same(&resolved, &component));
    let reflectance = resolved.as_material().unwrap().reflectance(&hit.geom).unwrap();
    assert!((reflectance - Vec3::Z).length() < 1e-5);

    // Render it as well: pixels on the quad see the normal colour
    let film = session.load_film("film", "bitmap", &json!({ "w": 4, "h": 4 })).unwrap();
    let renderer = session
        .load_renderer(
            "renderer",
            "raycast",
            &json!({ "scene": scene.loc(), "output": film.loc() }),
        )
        .unwrap();
    renderer.render().unwrap();
    let on_quad = film.buffer().unwrap().pixel(1, 2).unwrap();
    assert!(on_quad.x.abs() < 1e-5 && on_quad.y.abs() < 1e-5);
    assert!(on_quad.z > 0.9);
}

#[test]
fn builtins_are_registered_under_the_builtin_plugin() {
    let session = Session::new().unwrap();
    let keys: Vec<String> = session.registered_keys().iter().map(|k| k.to_string()).collect();
    assert!(keys.contains(&"scene::default".to_string()));
    assert!(keys.contains(&"renderer::raycast".to_string()));

    let plugins = session.plugins();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].id.name(), "builtin");
    assert_eq!(plugins[0].keys.len(), keys.len());
}

#[test]
fn typed_loaders_check_the_interface() {
    let session = Session::new().unwrap();

    // pinhole is a camera, not a material
    let err = session.load_material("m", "pinhole", &json!({})).unwrap_err();
    assert!(matches!(err, Error::UnknownKey(_)));

    session.register("material::impostor", || Box::new(Impostor)).unwrap();
    let err = session.load_material("m", "impostor", &json!({})).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        Error::MissingCapability { capability: CapabilityKind::Material, .. }
    ));
    assert!(session.asset_names().is_empty());

    let err = session.load_film("film", "bitmap", &json!({ "w": 4 })).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Validation { field, .. } if field == "h"));
}

#[test]
fn asset_names_are_unique() {
    let session = Session::new().unwrap();
    session.load_asset("m", "material::diffuse", &json!({})).unwrap();
    let err = session.load_asset("m", "material::diffuse", &json!({})).unwrap_err();
    assert!(matches!(err, Error::NameCollision(l) if l == Locator::parse("$.assets.m").unwrap()));

    let err = session.load_asset("a.b", "material::diffuse", &json!({})).unwrap_err();
    assert!(matches!(err, Error::InvalidName { .. }));
}

#[test]
fn reload_keeps_references_working() {
    let session = Session::new().unwrap();
    let material = session
        .load_material("paint", "diffuse", &json!({ "Kd": [1, 0, 0] }))
        .unwrap();
    let mesh = session.load_mesh("quad", "raw", &quad_mesh()).unwrap();
    let camera = session.load_camera("camera", "pinhole", &camera_config()).unwrap();
    let accel = session.load_accel("accel", "linear", &json!({})).unwrap();
    let scene = session.load_scene("scene", "default", &json!({})).unwrap();
    scene.attach_accel(&accel).unwrap();
    scene.add_camera(&camera).unwrap();
    scene.add_mesh(&mesh, Some(&material)).unwrap();
    scene.build().unwrap();

    let ray = Ray::new(Vec3::new(0.3, -0.2, 5.0), Vec3::NEG_Z);
    let hit = scene.query(&ray).unwrap().unwrap();
    assert_eq!(material.reflectance(&hit.geom).unwrap(), Some(Vec3::X));

    session
        .reload_asset("paint", "material::diffuse", &json!({ "Kd": [0, 1, 0] }))
        .unwrap();
    let hit = scene.query(&ray).unwrap().unwrap();
    let resolved = scene.material_of(&hit).unwrap().unwrap();
    assert_eq!(resolved.as_material().unwrap().reflectance(&hit.geom), Some(Vec3::Y));
    assert_eq!(material.reflectance(&hit.geom).unwrap(), Some(Vec3::Y));

    let err = session
        .reload_asset("missing", "material::diffuse", &json!({}))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn reloading_geometry_resets_built_scenes() {
    let session = Session::new().unwrap();
    let mesh = session.load_mesh("quad", "raw", &quad_mesh()).unwrap();
    let accel = session.load_accel("accel", "bvh", &json!({})).unwrap();
    let scene = session.load_scene("scene", "default", &json!({})).unwrap();
    scene.attach_accel(&accel).unwrap();
    scene.add_mesh(&mesh, None).unwrap();
    scene.build().unwrap();

    let ray = Ray::new(Vec3::new(0.3, -0.2, 5.0), Vec3::NEG_Z);
    assert!(scene.query(&ray).unwrap().is_some());

    let moved = json!({
        "ps": [50,-1,0, 52,-1,0, 52,1,0, 50,1,0],
        "fs": [0,1,2, 0,2,3]
    });
    session.reload_asset("quad", "mesh::raw", &moved).unwrap();
    assert_eq!(scene.state().unwrap(), SceneState::Populated);
    assert!(matches!(scene.query(&ray), Err(Error::NotBuilt)));

    scene.build().unwrap();
    assert!(scene.query(&ray).unwrap().is_none());
    let hit = scene
        .query(&Ray::new(Vec3::new(51.3, -0.2, 5.0), Vec3::NEG_Z))
        .unwrap()
        .unwrap();
    assert!((hit.geom.p.x - 51.3).abs() < 1e-4);

    session.reload_asset("accel", "accel::bvh", &json!({})).unwrap();
    assert!(matches!(scene.query(&ray), Err(Error::NotBuilt)));
    scene.build().unwrap();
    session.remove_asset("accel").unwrap();
    assert_eq!(scene.state().unwrap(), SceneState::Populated);
}

#[test]
fn removed_assets_are_gone() {
    let session = Session::new().unwrap();
    let film = session.load_film("film", "bitmap", &json!({ "w": 2, "h": 2 })).unwrap();
    assert_eq!(session.remove_asset("film").unwrap(), 1);
    assert!(!film.is_live());
    assert!(matches!(film.size(), Err(Error::NotFound(_))));
    assert!(matches!(session.remove_asset("film"), Err(Error::NotFound(_))));
}

#[test]
fn reset_leaves_no_instances() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("quad.obj");
    fs::write(&obj, QUAD_OBJ).unwrap();

    let session = Session::new().unwrap();
    session.load_model("model", "wavefrontobj", &json!({ "path": obj })).unwrap();
    session.load_camera("camera", "pinhole", &camera_config()).unwrap();
    assert!(session.store().len() >= 4);

    session.reset();
    assert!(session.store().is_empty());
    assert!(session.asset_names().is_empty());

    // Registrations survive and the asset group comes back on demand
    session.load_camera("camera", "pinhole", &camera_config()).unwrap();
    assert_eq!(session.asset_names(), vec!["camera".to_string()]);
}

#[test]
fn walk_visits_parents_first() {
    let session = Session::new().unwrap();
    session.load_asset("b", "material::diffuse", &json!({})).unwrap();
    session.load_asset("a", "material::diffuse", &json!({})).unwrap();

    let mut visited = Vec::new();
    session.walk(|entry| visited.push(entry.locator.to_string()));
    assert_eq!(visited, vec!["$.assets", "$.assets.b", "$.assets.a"]);
}

#[test]
fn saved_state_restores_assets() {
    let session = Session::new().unwrap();
    session.load_film("film", "bitmap", &json!({ "w": 4, "h": 3 })).unwrap();
    let camera = session.load_camera("camera", "pinhole", &camera_config()).unwrap();
    let material = session.load_material("paint", "diffuse", &json!({ "Kd": [0.5, 0.5, 0.5] })).unwrap();
    let mesh = session.load_mesh("quad", "raw", &quad_mesh()).unwrap();
    let accel = session.load_accel("accel", "bvh", &json!({ "max_leaf": 2 })).unwrap();
    let scene = session.load_scene("scene", "default", &json!({})).unwrap();
    scene.attach_accel(&accel).unwrap();
    scene.add_camera(&camera).unwrap();
    scene.add_mesh(&mesh, Some(&material)).unwrap();
    scene.build().unwrap();
    session
        .register("material::visualize_normal", || Box::new(VisualizeNormal))
        .unwrap();
    // Does not serialize, so it is left out
    session.load_asset("normal", "material::visualize_normal", &json!({})).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    session.save_state_to(&path).unwrap();
    let saved = session.save_state().unwrap();
    assert_eq!(saved.assets.len(), 6);

    let restored = Session::new().unwrap();
    assert_eq!(restored.load_state_from(&path).unwrap(), 6);
    assert_eq!(
        restored.asset_names(),
        vec!["film", "camera", "paint", "quad", "accel", "scene"]
    );

    let scene = restored.handle::<dyn lumina_core::interfaces::Scene>("scene").unwrap();
    assert_eq!(scene.state().unwrap(), SceneState::Populated);
    assert_eq!(scene.primitive_count().unwrap(), 2);
    scene.build().unwrap();
    assert!(scene
        .query(&Ray::new(Vec3::new(-0.4, 0.3, 5.0), Vec3::NEG_Z))
        .unwrap()
        .is_some());
    assert_eq!(restored.save_state().unwrap(), saved);
}

#[test]
fn failed_restore_leaves_the_session_empty() {
    let session = Session::new().unwrap();
    session.load_film("film", "bitmap", &json!({ "w": 1, "h": 1 })).unwrap();

    let state = lumina::SavedState::new(vec![
        lumina::AssetDescription {
            name: "camera".into(),
            key: "camera::pinhole".into(),
            config: camera_config(),
        },
        lumina::AssetDescription {
            name: "broken".into(),
            key: "material::unknown".into(),
            config: json!({}),
        },
    ]);
    assert!(matches!(session.load_state(&state), Err(Error::UnknownKey(_))));
    assert!(session.store().is_empty());
}

#[test]
fn render_threads_come_from_config() {
    let config = SessionConfig {
        render: lumina::config::RenderConfig { threads: Some(2) },
        ..Default::default()
    };
    let session = Session::with_config(config).unwrap();
    let renderer = session
        .load_renderer("r", "raycast", &json!({ "scene": "$.assets.scene", "output": "$.assets.film" }))
        .unwrap();
    let saved = renderer.component().unwrap().serialize().unwrap();
    assert_eq!(saved["threads"], json!(2));

    let explicit = session
        .load_renderer(
            "r2",
            "raycast",
            &json!({ "scene": "$.assets.scene", "output": "$.assets.film", "threads": 1 }),
        )
        .unwrap();
    let saved = explicit.component().unwrap().serialize().unwrap();
    assert_eq!(saved["threads"], json!(1));

    // The scene it points at does not exist
    assert!(matches!(renderer.render(), Err(Error::NotFound(_))));
}

#[test]
fn unloading_a_plugin_with_live_assets_warns() {
    fn register(registrar: &mut lumina_core::plugin::PluginRegistrar<'_>) {
        registrar.register("material::normals", || Box::new(VisualizeNormal));
    }

    let session = Session::new().unwrap();
    session.register_plugin("normals", register).unwrap();
    session.load_asset("n", "material::normals", &json!({})).unwrap();

    let report = session.unload_plugin("normals").unwrap();
    let warning = report.warning.expect("live asset should be reported");
    assert_eq!(warning.live, vec![Locator::parse("$.assets.n").unwrap()]);
    assert!(session.get_path("$.assets.n").is_ok());
    assert!(matches!(
        session.load_asset("m", "material::normals", &json!({})),
        Err(Error::UnknownKey(_))
    ));
    assert!(matches!(session.unload_plugin("normals"), Err(Error::PluginLoad { .. })));
}

#[test]
fn shutdown_unloads_cleanly() {
    let session = Session::new().unwrap();
    session.load_camera("camera", "pinhole", &camera_config()).unwrap();
    let reports = session.shutdown();
    assert_eq!(reports.len(), 1);
    assert!(reports.iter().all(|r| r.warning.is_none()));
}
