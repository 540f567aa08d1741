//! Registry, store and capability contract exercised together

use glam::Vec3;
use lumina_core::config::{self, ConfigExt};
use lumina_core::geometry::PointGeometry;
use lumina_core::prelude::*;
use lumina_core::Context;
use serde_json::json;

#[derive(Default)]
struct Tint {
    color: Vec3,
}

impl Component for Tint {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        self.color = config.required_vec3("color")?;
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        Some(json!({ "color": config::vec3(self.color) }))
    }

    fn as_material(&self) -> Option<&(dyn Material + 'static)> {
        Some(self)
    }
}

impl Material for Tint {
    fn reflectance(&self, _geom: &PointGeometry) -> Option<Vec3> {
        Some(self.color)
    }
}

fn context() -> Context {
    let ctx = Context::new();
    ctx.registry()
        .register(ImplementationKey::parse("material::tint").unwrap(), || {
            Box::new(Tint::default())
        })
        .unwrap();
    ctx
}

fn color_at(ctx: &Context, locator: &Locator) -> Vec3 {
    ctx.store()
        .with_capability::<dyn Material, _, _>(locator, |m| m.reflectance(&PointGeometry::default()))
        .unwrap()
        .unwrap()
}

#[test]
fn created_instances_expose_the_capability_of_their_interface() {
    let ctx = context();
    let key = ImplementationKey::parse("material::tint").unwrap();
    let at = ctx
        .create(&Locator::root(), "red", &key, &json!({"color": [1, 0, 0]}))
        .unwrap();

    let component = ctx.store().resolve(&at).unwrap();
    assert!(component.query::<dyn Material>().is_some());
    assert!(component.query::<dyn Camera>().is_none());
    assert_eq!(ctx.store().key_of(&at), Some(key));
}

#[test]
fn serialized_config_reconstructs_an_equivalent_instance() {
    let ctx = context();
    let key = ImplementationKey::parse("material::tint").unwrap();
    let first = ctx
        .create(&Locator::root(), "a", &key, &json!({"color": [0.25, 0.5, 1.0]}))
        .unwrap();

    let saved = ctx.store().resolve(&first).unwrap().serialize().unwrap();
    let second = ctx.create(&Locator::root(), "b", &key, &saved).unwrap();
    assert_eq!(color_at(&ctx, &first), color_at(&ctx, &second));
}

#[test]
fn locators_are_unique_and_removal_is_recursive() {
    let ctx = context();
    let key = ImplementationKey::parse("material::tint").unwrap();
    let cfg = json!({"color": [1, 1, 1]});
    let parent = ctx.create(&Locator::root(), "p", &key, &cfg).unwrap();
    let child = ctx.create(&parent, "c", &key, &cfg).unwrap();
    let grandchild = ctx.create(&child, "g", &key, &cfg).unwrap();

    assert!(matches!(
        ctx.create(&parent, "c", &key, &cfg),
        Err(Error::NameCollision(_))
    ));

    assert_eq!(ctx.store().remove(&parent), 3);
    for locator in [&parent, &child, &grandchild] {
        assert!(ctx.store().resolve(locator).is_none());
    }
}

#[test]
fn validation_errors_name_the_field_and_leave_nothing_behind() {
    let ctx = context();
    let key = ImplementationKey::parse("material::tint").unwrap();
    let err = ctx.create(&Locator::root(), "bad", &key, &json!({})).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Validation { field, .. } if field == "color"));
    assert!(ctx.store().is_empty());
}
