//! Dynamic library handling

use libloading::{Library, Symbol};
use std::env::consts::DLL_EXTENSION;
use std::path::{Path, PathBuf};

use lumina_core::plugin::{PluginDeclaration, DECLARATION_SYMBOL};
use lumina_core::{Error, Result};

/// Append the platform's shared library extension to `path`
///
/// `plugins/libfoo` becomes `plugins/libfoo.so` on Linux,
/// `plugins/libfoo.dylib` on macOS and `plugins/libfoo.dll` on Windows.
pub fn library_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    file_name.push(".");
    file_name.push(DLL_EXTENSION);
    path.with_file_name(file_name)
}

/// Whether a directory entry looks like a plugin (`[0-9a-z_]+.<ext>`)
pub fn is_plugin_file_name(name: &str) -> bool {
    let Some(stem) = name
        .strip_suffix(DLL_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '_')
}

/// An opened plugin library together with its declaration
pub struct PluginLibrary {
    path: PathBuf,
    declaration: PluginDeclaration,
    library: Library,
}

impl PluginLibrary {
    /// Open the library at `path` (extension included) and read its declaration
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::plugin_load(path, "file not found"));
        }

        // SAFETY: loading runs the library's initialisers; plugins are trusted code
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::plugin_load(path, e.to_string()))?;

        Self::from_library(path, library)
    }

    /// Read the declaration from an already opened library
    pub fn from_library(path: &Path, library: Library) -> Result<Self> {
        let declaration = {
            // SAFETY: the symbol is a static `PluginDeclaration` when present
            let symbol: Symbol<*const PluginDeclaration> = unsafe { library.get(DECLARATION_SYMBOL) }
                .map_err(|_| Error::plugin_load(path, "entry point 'lumina_plugin_declaration' missing"))?;
            let ptr = *symbol;
            if ptr.is_null() {
                return Err(Error::plugin_load(path, "entry point is null"));
            }
            // SAFETY: non-null pointer to a static living as long as `library`
            unsafe { ptr.read() }
        };

        // SAFETY: declaration strings are statics inside `library`
        unsafe { declaration.check_compatible() }.map_err(|reason| Error::plugin_load(path, reason))?;

        Ok(Self {
            path: path.to_path_buf(),
            declaration,
            library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn declaration(&self) -> &PluginDeclaration {
        &self.declaration
    }

    /// Declared plugin name, falling back to the file stem
    pub fn name(&self) -> String {
        // SAFETY: checked by `from_library`; the library is still mapped
        unsafe { self.declaration.name() }.unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string()
        })
    }

    pub fn into_library(self) -> Library {
        self.library
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_path_appends_extension() {
        let path = library_path("plugins/libmaterial_visualize_normal");
        assert_eq!(
            path,
            PathBuf::from(format!("plugins/libmaterial_visualize_normal.{}", DLL_EXTENSION))
        );
        // Dots in the name are kept, not treated as an extension
        let dotted = library_path("plugins/v1.2");
        assert_eq!(dotted.file_name().unwrap().to_str().unwrap(), format!("v1.2.{}", DLL_EXTENSION));
    }

    #[test]
    fn test_plugin_file_names() {
        assert!(is_plugin_file_name(&format!("libmaterial_x.{}", DLL_EXTENSION)));
        assert!(is_plugin_file_name(&format!("plugin2.{}", DLL_EXTENSION)));
        assert!(!is_plugin_file_name(&format!("Plugin.{}", DLL_EXTENSION)));
        assert!(!is_plugin_file_name(&format!("lib-x.{}", DLL_EXTENSION)));
        assert!(!is_plugin_file_name(&format!(".{}", DLL_EXTENSION)));
        assert!(!is_plugin_file_name("readme.txt"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = PluginLibrary::open(Path::new("/definitely/not/here.so")).err().unwrap();
        assert!(matches!(err, Error::PluginLoad { reason, .. } if reason == "file not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_library_without_entry_point() {
        // The test executable itself exports no declaration
        let this: Library = libloading::os::unix::Library::this().into();
        let err = PluginLibrary::from_library(Path::new("self"), this).err().unwrap();
        assert!(matches!(err, Error::PluginLoad { reason, .. } if reason.contains("entry point")));
    }
}
