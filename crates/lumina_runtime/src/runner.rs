//! Drives a session through one scene description

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use lumina::Session;
use lumina_core::interfaces::{Film, PrimitiveSpec, Renderer, Scene};
use lumina_core::{ImplementationKey, Locator};

use crate::error::{Result, RuntimeError};
use crate::output;
use crate::scene_file::{PrimitiveDescription, SceneDescription};

/// What a run did and how long it took
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    pub plugins: usize,
    pub assets: usize,
    pub instances: usize,
    pub primitives: usize,
    pub width: u32,
    pub height: u32,
    pub load_time: Duration,
    pub build_time: Duration,
    pub render_time: Duration,
    pub output: Option<PathBuf>,
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plugins:    {}", self.plugins)?;
        writeln!(f, "assets:     {} ({} instances)", self.assets, self.instances)?;
        writeln!(f, "primitives: {}", self.primitives)?;
        writeln!(f, "film:       {}x{}", self.width, self.height)?;
        writeln!(f, "load:       {:.3}s", self.load_time.as_secs_f64())?;
        writeln!(f, "build:      {:.3}s", self.build_time.as_secs_f64())?;
        write!(f, "render:     {:.3}s", self.render_time.as_secs_f64())?;
        if let Some(output) = &self.output {
            write!(f, "\noutput:     {}", output.display())?;
        }
        Ok(())
    }
}

/// Load, build and render `description`
///
/// `output` overrides the description's own output path.
pub fn run(
    session: &Session,
    description: &SceneDescription,
    output: Option<PathBuf>,
) -> Result<RenderStats> {
    let mut stats = RenderStats::default();

    let start = Instant::now();
    for plugin in &description.plugins {
        session.load_plugin(plugin)?;
        stats.plugins += 1;
    }
    for asset in &description.assets {
        let key = ImplementationKey::parse(&asset.key)?;
        if key.interface() == "renderer" {
            session.load_renderer(&asset.name, key.variant(), &asset.config)?;
        } else {
            session.load_asset(&asset.name, &asset.key, &asset.config)?;
        }
        stats.assets += 1;
    }

    let scene = session.handle::<dyn Scene>(&description.scene)?;
    for primitive in &description.primitives {
        scene.add_primitive(primitive_spec(session, primitive)?)?;
    }
    stats.load_time = start.elapsed();
    stats.instances = session.store().len();
    stats.primitives = scene.primitive_count()?;

    let start = Instant::now();
    scene.build()?;
    stats.build_time = start.elapsed();
    log::info!("Built {} in {:?}", scene.loc(), stats.build_time);

    let renderer = session.handle::<dyn Renderer>(&description.renderer)?;
    let film = session.handle::<dyn Film>(&description.film)?;
    let start = Instant::now();
    renderer.render()?;
    stats.render_time = start.elapsed();
    log::info!("Rendered in {:?}", stats.render_time);

    let buffer = film.buffer()?;
    stats.width = buffer.width;
    stats.height = buffer.height;
    if let Some(path) = output.or_else(|| description.output.clone()) {
        output::write_png(&buffer, &path)?;
        stats.output = Some(path);
    }
    Ok(stats)
}

fn primitive_spec(session: &Session, primitive: &PrimitiveDescription) -> Result<PrimitiveSpec> {
    let resolve = |r: &Option<String>| -> Result<Option<Locator>> {
        r.as_deref().map(|r| reference(session, r)).transpose()
    };
    Ok(PrimitiveSpec {
        camera: resolve(&primitive.camera)?,
        model: resolve(&primitive.model)?,
        mesh: resolve(&primitive.mesh)?,
        material: resolve(&primitive.material)?,
    })
}

/// Asset name or full locator
fn reference(session: &Session, r: &str) -> Result<Locator> {
    let locator = if r.starts_with('$') || r.contains('.') {
        Locator::parse(r)?
    } else {
        session.asset_locator(r)?
    };
    if session.get(&locator).is_none() {
        return Err(RuntimeError::description(format!(
            "primitive refers to '{}', which does not exist",
            r
        )));
    }
    Ok(locator)
}
