//! Wavefront OBJ model (`model::wavefrontobj`)
//!
//! Each OBJ object becomes a `mesh::raw` child named `mesh<i>`. Unless a
//! `base_material` is given, each MTL material becomes a
//! `material::diffuse` child named `material<j>` using its diffuse color.

use serde_json::json;

use lumina_core::interfaces::{Model, ModelPrimitive};
use lumina_core::{
    Component, ConfigExt, ConfigValue, ConstructContext, Error, ImplementationKey, Locator, Result,
};

#[derive(Debug, Default)]
pub struct WavefrontObj {
    path: String,
    base_material: Option<Locator>,
    primitives: Vec<ModelPrimitive>,
}

impl Component for WavefrontObj {
    fn construct(&mut self, config: &ConfigValue, ctx: &mut ConstructContext<'_>) -> Result<()> {
        let path: String = config.required("path")?;
        let base_material = config.optional_locator("base_material")?;

        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(&path, &options)
            .map_err(|e| Error::validation("path", format!("cannot load '{}': {}", path, e)))?;

        let mut material_locators = Vec::new();
        if base_material.is_none() {
            match materials {
                Ok(materials) => {
                    let diffuse = ImplementationKey::new("material", "diffuse")?;
                    for (j, material) in materials.iter().enumerate() {
                        let kd = material.diffuse.unwrap_or([1.0, 1.0, 1.0]);
                        let locator = ctx.create_child(
                            &format!("material{}", j),
                            &diffuse,
                            &json!({ "Kd": kd }),
                        )?;
                        material_locators.push(locator);
                    }
                }
                Err(e) => log::warn!("No materials for '{}': {}", path, e),
            }
        }

        let raw = ImplementationKey::new("mesh", "raw")?;
        let mut primitives = Vec::new();
        for (i, model) in models.iter().enumerate() {
            let mesh = &model.mesh;
            if mesh.indices.is_empty() {
                continue;
            }
            let mut fs = json!({ "p": mesh.indices });
            let mut mesh_config = json!({ "ps": mesh.positions });
            if !mesh.normals.is_empty() {
                mesh_config["ns"] = json!(mesh.normals);
                fs["n"] = json!(mesh.indices);
            }
            if !mesh.texcoords.is_empty() {
                mesh_config["ts"] = json!(mesh.texcoords);
                fs["t"] = json!(mesh.indices);
            }
            mesh_config["fs"] = fs;

            let mesh_locator = ctx.create_child(&format!("mesh{}", i), &raw, &mesh_config)?;
            let material = match &base_material {
                Some(base) => Some(base.clone()),
                None => mesh
                    .material_id
                    .and_then(|id| material_locators.get(id).cloned()),
            };
            primitives.push(ModelPrimitive {
                mesh: mesh_locator,
                material,
            });
        }

        log::info!(
            "Loaded '{}' ({} meshes, {} materials)",
            path,
            primitives.len(),
            material_locators.len()
        );
        self.path = path;
        self.base_material = base_material;
        self.primitives = primitives;
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        let mut config = json!({ "path": self.path });
        if let Some(base) = &self.base_material {
            config["base_material"] = json!(base);
        }
        Some(config)
    }

    fn as_model(&self) -> Option<&(dyn Model + 'static)> {
        Some(self)
    }
}

impl Model for WavefrontObj {
    fn primitives(&self) -> Vec<ModelPrimitive> {
        self.primitives.clone()
    }
}
