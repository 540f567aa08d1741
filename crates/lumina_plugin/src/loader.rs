//! Plugin loader
//!
//! Tracks loaded plugins, the keys each one registered, and the libraries
//! that must stay mapped because instances created from them are still live.

use libloading::Library;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::{Path, PathBuf};

use lumina_core::plugin::{PluginId, PluginRegistrar, StaticRegisterFn};
use lumina_core::{Error, ImplementationKey, InstanceStore, Locator, Origin, Registry, Result};

use crate::library::{is_plugin_file_name, library_path, PluginLibrary};

/// Handle returned by a successful load
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PluginHandle {
    id: PluginId,
}

impl PluginHandle {
    pub fn id(&self) -> &PluginId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginKind {
    /// Loaded from a shared library
    Dynamic(PathBuf),
    /// Registration function linked into the host
    Static,
}

/// Description of a loaded plugin
#[derive(Clone, Debug)]
pub struct PluginInfo {
    pub id: PluginId,
    pub kind: PluginKind,
    /// Keys the plugin registered at load time
    pub keys: Vec<ImplementationKey>,
}

/// A plugin was unloaded while instances created from it were still live
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsafeUnloadWarning {
    pub plugin: PluginId,
    pub live: Vec<Locator>,
}

impl fmt::Display for UnsafeUnloadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plugin '{}' unloaded with {} live instance(s):",
            self.plugin,
            self.live.len()
        )?;
        for locator in &self.live {
            write!(f, " {}", locator)?;
        }
        Ok(())
    }
}

/// Outcome of [`PluginLoader::unload`]
#[derive(Clone, Debug)]
pub struct UnloadReport {
    pub plugin: PluginId,
    /// Keys withdrawn from the registry
    pub unregistered: Vec<ImplementationKey>,
    pub warning: Option<UnsafeUnloadWarning>,
    /// The library stays mapped until the loader is dropped
    pub retired: bool,
}

struct LoadedPlugin {
    info: PluginInfo,
    library: Option<Library>,
}

/// Loads and unloads plugins into a registry
#[derive(Default)]
pub struct PluginLoader {
    plugins: RwLock<Vec<LoadedPlugin>>,
    retired: Mutex<Vec<Library>>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the shared library at `path` plus the platform extension
    pub fn load(&self, path: impl AsRef<Path>, registry: &Registry) -> Result<PluginHandle> {
        let path = library_path(path);
        if self.is_loaded_file(&path) {
            return Err(Error::plugin_load(&path, "already loaded"));
        }

        let library = PluginLibrary::open(&path)?;
        let id = PluginId::new(&library.name());
        if self.contains(&id) {
            return Err(Error::plugin_load(
                &path,
                format!("a plugin named '{}' is already loaded", id),
            ));
        }

        let mut registrar = PluginRegistrar::new(id.clone(), registry);
        // SAFETY: `register` comes from a compatible declaration and the
        // registrar outlives the call
        unsafe { (library.declaration().register)(&mut registrar) };
        let keys = registrar
            .finish()
            .map_err(|e| Error::plugin_load(&path, format!("registration failed: {}", e)))?;

        log::info!("Loaded plugin '{}' from {} ({} keys)", id, path.display(), keys.len());
        self.plugins.write().push(LoadedPlugin {
            info: PluginInfo {
                id: id.clone(),
                kind: PluginKind::Dynamic(path),
                keys,
            },
            library: Some(library.into_library()),
        });
        Ok(PluginHandle { id })
    }

    /// Register an in-process plugin through the same protocol
    pub fn load_static(
        &self,
        name: &str,
        register: StaticRegisterFn,
        registry: &Registry,
    ) -> Result<PluginHandle> {
        let id = PluginId::new(name);
        if self.contains(&id) {
            return Err(Error::plugin_load(name, "already loaded"));
        }

        let mut registrar = PluginRegistrar::new(id.clone(), registry);
        register(&mut registrar);
        let keys = registrar
            .finish()
            .map_err(|e| Error::plugin_load(name, format!("registration failed: {}", e)))?;

        log::info!("Loaded static plugin '{}' ({} keys)", id, keys.len());
        self.plugins.write().push(LoadedPlugin {
            info: PluginInfo {
                id: id.clone(),
                kind: PluginKind::Static,
                keys,
            },
            library: None,
        });
        Ok(PluginHandle { id })
    }

    /// Load every `[0-9a-z_]+.<ext>` file in `dir`, skipping failures
    pub fn load_directory(&self, dir: impl AsRef<Path>, registry: &Registry) -> Vec<PluginHandle> {
        let dir = dir.as_ref();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot scan plugin directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map_or(false, is_plugin_file_name)
            })
            .collect();
        candidates.sort();

        let mut handles = Vec::new();
        for candidate in candidates {
            match self.load(candidate.with_extension(""), registry) {
                Ok(handle) => handles.push(handle),
                Err(e) => log::warn!("Skipping {}: {}", candidate.display(), e),
            }
        }
        handles
    }

    /// Withdraw a plugin's keys and release its library
    ///
    /// Instances created from the plugin that are still live keep the
    /// library mapped; the report carries an [`UnsafeUnloadWarning`].
    pub fn unload(
        &self,
        handle: &PluginHandle,
        registry: &Registry,
        store: &InstanceStore,
    ) -> Result<UnloadReport> {
        let plugin = {
            let mut plugins = self.plugins.write();
            let index = plugins
                .iter()
                .position(|p| p.info.id == handle.id)
                .ok_or_else(|| Error::plugin_load(handle.name(), "not loaded"))?;
            plugins.remove(index)
        };
        let LoadedPlugin { info, library } = plugin;

        let origin = Origin::Plugin(info.id.clone());
        let unregistered: Vec<_> = registry
            .keys_of(&origin)
            .into_iter()
            .filter(|key| registry.unregister_owned(key, &origin))
            .collect();

        let live = store.live_with_keys(&info.keys);
        let warning = (!live.is_empty()).then(|| UnsafeUnloadWarning {
            plugin: info.id.clone(),
            live,
        });

        let mut retired = false;
        match (&warning, library) {
            (Some(warning), Some(library)) => {
                log::warn!("{}; keeping the library mapped", warning);
                self.retired.lock().push(library);
                retired = true;
            }
            (Some(warning), None) => log::warn!("{}", warning),
            (None, Some(library)) => drop(library),
            (None, None) => {}
        }

        log::info!("Unloaded plugin '{}' ({} keys withdrawn)", info.id, unregistered.len());
        Ok(UnloadReport {
            plugin: info.id,
            unregistered,
            warning,
            retired,
        })
    }

    /// Unload every plugin, most recently loaded first
    pub fn unload_all(&self, registry: &Registry, store: &InstanceStore) -> Vec<UnloadReport> {
        let handles: Vec<_> = self
            .plugins
            .read()
            .iter()
            .rev()
            .map(|p| PluginHandle { id: p.info.id.clone() })
            .collect();
        handles
            .iter()
            .filter_map(|handle| self.unload(handle, registry, store).ok())
            .collect()
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins.read().iter().map(|p| p.info.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<PluginHandle> {
        self.plugins
            .read()
            .iter()
            .find(|p| p.info.id.name() == name)
            .map(|p| PluginHandle { id: p.info.id.clone() })
    }

    /// Whether the library at `path` (without extension) is loaded
    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        self.is_loaded_file(&library_path(path))
    }

    /// Libraries kept mapped after an unsafe unload
    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }

    fn contains(&self, id: &PluginId) -> bool {
        self.plugins.read().iter().any(|p| p.info.id == *id)
    }

    fn is_loaded_file(&self, path: &Path) -> bool {
        self.plugins
            .read()
            .iter()
            .any(|p| matches!(&p.info.kind, PluginKind::Dynamic(loaded) if loaded == path))
    }
}

impl fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoader")
            .field("plugins", &self.plugins())
            .field("retired", &self.retired_count())
            .finish()
    }
}
