//! Plugin ABI
//!
//! A plugin is a dynamic library exporting a static
//! [`PluginDeclaration`] named `lumina_plugin_declaration`, normally through
//! [`export_plugin!`](crate::export_plugin). The loader checks the
//! declaration's versions and then calls its `register` function with a
//! [`PluginRegistrar`] bound to the host registry.
//!
//! Components cross the library boundary as Rust trait objects, so a plugin
//! must be built with the same toolchain and the same `lumina_core` version
//! as the host. The version string is checked; the toolchain is not.

use std::ffi::{c_char, CStr};
use std::fmt;
use std::sync::Arc;

use crate::component::Component;
use crate::error::{Error, Result};
use crate::key::ImplementationKey;
use crate::registry::{Origin, RegisterOptions, Registry};

/// Bumped whenever [`PluginDeclaration`] or [`PluginRegistrar`] change shape
pub const PLUGIN_API_VERSION: u32 = 1;

/// Version of `lumina_core` a plugin must have been built against
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[doc(hidden)]
pub const CORE_VERSION_NUL: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Exported symbol name, nul terminated
pub const DECLARATION_SYMBOL: &[u8] = b"lumina_plugin_declaration\0";

/// Unique identifier for a plugin
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PluginId(Box<str>);

impl PluginId {
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration entry point of a plugin
#[allow(improper_ctypes_definitions)]
pub type RegisterFn = unsafe extern "C" fn(registrar: *mut PluginRegistrar<'_>);

/// Registration entry point of an in-process plugin
pub type StaticRegisterFn = fn(&mut PluginRegistrar<'_>);

/// Static descriptor every plugin library exports
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PluginDeclaration {
    pub api_version: u32,
    /// Nul-terminated `lumina_core` version
    pub core_version: *const c_char,
    /// Nul-terminated plugin name
    pub name: *const c_char,
    pub register: RegisterFn,
}

// SAFETY: the pointers refer to immutable static strings
unsafe impl Send for PluginDeclaration {}
unsafe impl Sync for PluginDeclaration {}

impl PluginDeclaration {
    /// Plugin name, `None` if the pointer is null
    ///
    /// # Safety
    /// `name` must be null or point to a nul-terminated string that outlives the call.
    pub unsafe fn name(&self) -> Option<String> {
        read_c_str(self.name)
    }

    /// # Safety
    /// `core_version` must be null or point to a nul-terminated string that outlives the call.
    pub unsafe fn core_version(&self) -> Option<String> {
        read_c_str(self.core_version)
    }

    /// Check the declaration against this host
    ///
    /// # Safety
    /// Same requirements as [`PluginDeclaration::core_version`].
    pub unsafe fn check_compatible(&self) -> std::result::Result<(), String> {
        if self.api_version != PLUGIN_API_VERSION {
            return Err(format!(
                "incompatible plugin API version {} (host expects {})",
                self.api_version, PLUGIN_API_VERSION
            ));
        }
        match self.core_version() {
            Some(version) if version == CORE_VERSION => Ok(()),
            Some(version) => Err(format!(
                "incompatible core version {} (host is {})",
                version, CORE_VERSION
            )),
            None => Err("declaration has no core version".to_string()),
        }
    }
}

unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Registration handle passed to a plugin's entry point
///
/// Registration stops at the first failure. [`PluginRegistrar::finish`]
/// then unregisters whatever the plugin had already added.
pub struct PluginRegistrar<'a> {
    plugin: PluginId,
    registry: &'a Registry,
    registered: Vec<ImplementationKey>,
    error: Option<Error>,
}

impl<'a> PluginRegistrar<'a> {
    pub fn new(plugin: PluginId, registry: &'a Registry) -> Self {
        Self {
            plugin,
            registry,
            registered: Vec::new(),
            error: None,
        }
    }

    pub fn plugin(&self) -> &PluginId {
        &self.plugin
    }

    /// Register a factory under `key` (`interface::variant`)
    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        self.register_inner(key, Arc::new(factory), false);
    }

    /// Register a factory, replacing any existing one
    pub fn register_override<F>(&mut self, key: &str, factory: F)
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        self.register_inner(key, Arc::new(factory), true);
    }

    fn register_inner(
        &mut self,
        key: &str,
        factory: crate::registry::Factory,
        overriding: bool,
    ) {
        if self.error.is_some() {
            return;
        }
        let mut options = RegisterOptions::from_plugin(self.plugin.clone());
        if overriding {
            options = options.overriding();
        }
        let result = ImplementationKey::parse(key).and_then(|key| {
            self.registry
                .register_with(key.clone(), factory, options)
                .map(|_| key)
        });
        match result {
            Ok(key) => self.registered.push(key),
            Err(e) => {
                log::error!("Plugin '{}' failed to register '{}': {}", self.plugin, key, e);
                self.error = Some(e);
            }
        }
    }

    /// Keys registered so far
    pub fn registered(&self) -> &[ImplementationKey] {
        &self.registered
    }

    pub fn has_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Complete registration, rolling back on failure
    pub fn finish(self) -> Result<Vec<ImplementationKey>> {
        match self.error {
            None => Ok(self.registered),
            Some(e) => {
                let origin = Origin::Plugin(self.plugin);
                for key in &self.registered {
                    self.registry.unregister_owned(key, &origin);
                }
                Err(e)
            }
        }
    }
}

/// Export a plugin declaration from a `cdylib`
///
/// ```ignore
/// fn register(registrar: &mut PluginRegistrar<'_>) {
///     registrar.register("material::visualize_normal", || Box::new(VisualizeNormal));
/// }
/// lumina_core::export_plugin!("material_visualize_normal", register);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($name:literal, $register:path) => {
        #[doc(hidden)]
        #[allow(improper_ctypes_definitions)]
        unsafe extern "C" fn __lumina_plugin_register(
            registrar: *mut $crate::plugin::PluginRegistrar<'_>,
        ) {
            // SAFETY: the loader passes an exclusive pointer valid for the call
            if let Some(registrar) = unsafe { registrar.as_mut() } {
                $register(registrar);
            }
        }

        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static lumina_plugin_declaration: $crate::plugin::PluginDeclaration =
            $crate::plugin::PluginDeclaration {
                api_version: $crate::plugin::PLUGIN_API_VERSION,
                core_version: $crate::plugin::CORE_VERSION_NUL.as_ptr() as *const ::std::ffi::c_char,
                name: concat!($name, "\0").as_ptr() as *const ::std::ffi::c_char,
                register: __lumina_plugin_register,
            };
    };
}
