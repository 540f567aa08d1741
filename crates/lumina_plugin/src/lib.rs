//! # lumina_plugin - plugin loading
//!
//! Loads dynamic libraries exporting a `lumina_plugin_declaration`
//! (see [`lumina_core::export_plugin!`]) and in-process plugins that provide
//! a registration function directly. Factories end up in a
//! [`lumina_core::Registry`]; the loader remembers which keys came from which
//! plugin so they can be withdrawn again.

pub mod library;
pub mod loader;

pub use library::{is_plugin_file_name, library_path, PluginLibrary};
pub use loader::{PluginHandle, PluginInfo, PluginKind, PluginLoader, UnloadReport, UnsafeUnloadWarning};
