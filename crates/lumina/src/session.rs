//! Asset loader facade

use std::fmt;
use std::path::Path;

use lumina_core::interfaces::{Accel, Camera, Film, Material, Mesh, Model, Renderer, Scene};
use lumina_core::plugin::StaticRegisterFn;
use lumina_core::store::Entry;
use lumina_core::{
    Capability, Component, ComponentRef, ConfigValue, Context, Error, ImplementationKey,
    InstanceStore, Locator, Registry, Result,
};
use lumina_plugin::{PluginHandle, PluginInfo, PluginLoader, UnloadReport};
use parking_lot::Mutex;

use crate::config::SessionConfig;
use crate::handle::{
    AccelHandle, AssetHandle, CameraHandle, FilmHandle, MaterialHandle, MeshHandle, ModelHandle,
    RendererHandle, SceneHandle,
};
use crate::state::{AssetDescription, SavedState};

/// Name of the asset group every `load_*` call inserts into
pub const ASSETS: &str = "assets";
const ASSET_GROUP_KEY: &str = "asset_group::default";

/// One rendering session: registry, instance store and loaded plugins
///
/// Built-in components are registered as the static plugin `builtin`.
/// Assets live under `$.assets`, named by the caller.
pub struct Session {
    // Declared before `loader` so instances die before their libraries
    context: Context,
    loader: PluginLoader,
    config: SessionConfig,
    assets: Locator,
    state_guard: Mutex<()>,
}

impl Session {
    /// Session with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Session that loads the plugins named by `config`
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let session = Self::bare(config)?;
        session
            .loader
            .load_static("builtin", lumina_builtin::register, session.registry())?;

        for dir in &session.config.plugins.directories {
            let loaded = session.load_plugins_in(dir);
            log::info!("Loaded {} plugin(s) from {}", loaded.len(), dir.display());
        }
        for path in &session.config.plugins.load {
            session.load_plugin(path)?;
        }

        log::info!(
            "Session ready ({} implementations registered)",
            session.registry().len()
        );
        Ok(session)
    }

    /// Session with nothing registered
    pub fn bare(config: SessionConfig) -> Result<Self> {
        Ok(Self {
            context: Context::new(),
            loader: PluginLoader::new(),
            config,
            assets: Locator::root().child(ASSETS)?,
            state_guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn registry(&self) -> &Registry {
        self.context.registry()
    }

    pub fn store(&self) -> &InstanceStore {
        self.context.store()
    }

    /// Locator of the asset group
    pub fn assets(&self) -> &Locator {
        &self.assets
    }

    /// Locator of the asset `name`
    pub fn asset_locator(&self, name: &str) -> Result<Locator> {
        self.assets.child(name)
    }

    // --- registration ---

    /// Register a host-side factory
    pub fn register<F>(&self, key: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        self.registry().register(ImplementationKey::parse(key)?, factory)
    }

    /// Register a group of factories as an in-process plugin named `name`
    pub fn register_plugin(&self, name: &str, register: StaticRegisterFn) -> Result<PluginHandle> {
        self.loader.load_static(name, register, self.registry())
    }

    pub fn registered_keys(&self) -> Vec<ImplementationKey> {
        self.registry().keys()
    }

    // --- plugins ---

    /// Load a plugin library; `path` omits the platform extension
    pub fn load_plugin(&self, path: impl AsRef<Path>) -> Result<PluginHandle> {
        self.loader.load(path, self.registry())
    }

    /// Load every plugin library in `dir`, skipping the ones that fail
    pub fn load_plugins_in(&self, dir: impl AsRef<Path>) -> Vec<PluginHandle> {
        self.loader.load_directory(dir, self.registry())
    }

    /// Withdraw a plugin's implementations
    ///
    /// Assets created from the plugin stay live; the report warns about them.
    pub fn unload_plugin(&self, name: &str) -> Result<UnloadReport> {
        let handle = self
            .loader
            .get(name)
            .ok_or_else(|| Error::plugin_load(name, "not loaded"))?;
        self.loader.unload(&handle, self.registry(), self.store())
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.loader.plugins()
    }

    // --- assets ---

    /// Create an asset from `key` and `config` and store it as `$.assets.<name>`
    pub fn load_asset(&self, name: &str, key: &str, config: &ConfigValue) -> Result<Locator> {
        let key = ImplementationKey::parse(key)?;
        self.create_asset(name, &key, config)
    }

    pub fn load_material(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<MaterialHandle<'_>> {
        self.load_typed::<dyn Material>(name, variant, config)
    }

    pub fn load_mesh(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<MeshHandle<'_>> {
        self.load_typed::<dyn Mesh>(name, variant, config)
    }

    pub fn load_model(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<ModelHandle<'_>> {
        self.load_typed::<dyn Model>(name, variant, config)
    }

    pub fn load_camera(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<CameraHandle<'_>> {
        self.load_typed::<dyn Camera>(name, variant, config)
    }

    pub fn load_film(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<FilmHandle<'_>> {
        self.load_typed::<dyn Film>(name, variant, config)
    }

    pub fn load_accel(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<AccelHandle<'_>> {
        self.load_typed::<dyn Accel>(name, variant, config)
    }

    pub fn load_scene(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<SceneHandle<'_>> {
        self.load_typed::<dyn Scene>(name, variant, config)
    }

    /// Load a renderer; `render.threads` fills in a missing `threads` field
    pub fn load_renderer(&self, name: &str, variant: &str, config: &ConfigValue) -> Result<RendererHandle<'_>> {
        let mut config = config.clone();
        if let (Some(threads), Some(fields)) = (self.config.render.threads, config.as_object_mut()) {
            fields.entry("threads").or_insert_with(|| threads.into());
        }
        self.load_typed::<dyn Renderer>(name, variant, &config)
    }

    /// Typed handle to an existing asset
    pub fn handle<C: Capability + ?Sized>(&self, name: &str) -> Result<AssetHandle<'_, C>> {
        let loc = self.asset_locator(name)?;
        self.store().resolve_capability(&loc, C::KIND)?;
        Ok(AssetHandle::new(self.store(), loc))
    }

    /// Replace the asset `name` in place; references to it follow the new instance
    ///
    /// A built scene indexing the old geometry drops back to `Populated` and
    /// must be built again.
    pub fn reload_asset(&self, name: &str, key: &str, config: &ConfigValue) -> Result<()> {
        let loc = self.asset_locator(name)?;
        let key = ImplementationKey::parse(key)?;
        self.context.recreate(&loc, &key, config)?;
        log::info!("Reloaded {} as {}", loc, key);
        Ok(())
    }

    /// Destroy the asset `name` and everything it owns
    pub fn remove_asset(&self, name: &str) -> Result<usize> {
        let loc = self.asset_locator(name)?;
        if !self.store().contains(&loc) {
            return Err(Error::NotFound(loc));
        }
        Ok(self.store().remove(&loc))
    }

    /// Component at any locator
    pub fn get(&self, locator: &Locator) -> Option<ComponentRef> {
        self.store().resolve(locator)
    }

    /// Component at a textual locator such as `$.assets.camera`
    pub fn get_path(&self, locator: &str) -> Result<ComponentRef> {
        let locator = Locator::parse(locator)?;
        self.get(&locator).ok_or(Error::NotFound(locator))
    }

    /// Names of the assets, in creation order
    pub fn asset_names(&self) -> Vec<String> {
        self.store()
            .children(&self.assets)
            .iter()
            .filter_map(|loc| loc.name().map(str::to_string))
            .collect()
    }

    /// Visit every live instance, parents before children
    pub fn walk(&self, f: impl FnMut(&Entry)) {
        self.store().visit(f)
    }

    /// Destroy every instance; registrations and plugins are kept
    pub fn reset(&self) -> usize {
        let destroyed = self.context.reset();
        log::info!("Session reset ({} instances destroyed)", destroyed);
        destroyed
    }

    /// Destroy every instance, then unload every plugin
    pub fn shutdown(self) -> Vec<UnloadReport> {
        self.reset();
        let reports = self.loader.unload_all(self.registry(), self.store());
        log::info!("Session shut down ({} plugins unloaded)", reports.len());
        reports
    }

    // --- state ---

    /// Snapshot of the serializable assets
    ///
    /// Assets whose component cannot serialize itself are skipped.
    pub fn save_state(&self) -> Result<SavedState> {
        let _guard = self.state_guard.lock();
        let mut assets = Vec::new();
        for loc in self.store().children(&self.assets) {
            let (Some(name), Some(key), Some(component)) =
                (loc.name(), self.store().key_of(&loc), self.store().resolve(&loc))
            else {
                continue;
            };
            match component.serialize() {
                Some(config) => assets.push(AssetDescription {
                    name: name.to_string(),
                    key: key.to_string(),
                    config,
                }),
                None => log::debug!("Skipping {} ({} does not serialize)", loc, key),
            }
        }
        log::info!("Saved {} asset(s)", assets.len());
        Ok(SavedState::new(assets))
    }

    /// Replace every asset with the ones in `state`
    ///
    /// On failure the session is left empty.
    pub fn load_state(&self, state: &SavedState) -> Result<usize> {
        let _guard = self.state_guard.lock();
        self.reset();
        for asset in &state.assets {
            if let Err(e) = self.load_asset(&asset.name, &asset.key, &asset.config) {
                log::error!("Failed to restore asset '{}': {}", asset.name, e);
                self.reset();
                return Err(e);
            }
        }
        log::info!("Restored {} asset(s)", state.assets.len());
        Ok(state.assets.len())
    }

    pub fn save_state_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let value = self.save_state()?.to_value()?;
        let text = serde_json::to_string_pretty(&value).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load_state_from(&self, path: impl AsRef<Path>) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let value: ConfigValue =
            serde_json::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        self.load_state(&SavedState::from_value(&value)?)
    }

    fn load_typed<C: Capability + ?Sized>(
        &self,
        name: &str,
        variant: &str,
        config: &ConfigValue,
    ) -> Result<AssetHandle<'_, C>> {
        let key = ImplementationKey::new(C::KIND.interface_name(), variant)?;
        let loc = self.create_asset(name, &key, config)?;
        Ok(AssetHandle::new(self.store(), loc))
    }

    fn create_asset(&self, name: &str, key: &ImplementationKey, config: &ConfigValue) -> Result<Locator> {
        self.mount_assets()?;
        let loc = self.context.create(&self.assets, name, key, config)?;
        log::debug!("Loaded asset {} ({})", loc, key);
        Ok(loc)
    }

    /// Create the asset group if a reset removed it
    fn mount_assets(&self) -> Result<()> {
        if self.store().contains(&self.assets) {
            return Ok(());
        }
        let key = ImplementationKey::parse(ASSET_GROUP_KEY)?;
        let mounted = if self.registry().contains(&key) {
            self.context
                .create(&Locator::root(), ASSETS, &key, &lumina_core::config::empty())
        } else {
            let group: Box<dyn Component> = Box::new(lumina_builtin::AssetGroup);
            self.store().insert(&Locator::root(), ASSETS, group)
        };
        match mounted {
            Ok(_) | Err(Error::NameCollision(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("loader", &self.loader)
            .finish()
    }
}
