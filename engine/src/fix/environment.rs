use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use super::ast::Fix;
use crate::error::{FixError, FixResult};
use crate::maps::MapRegistry;

/// Session state shared by every record of a run.
///
/// Variables are fixed at setup. Maps and included fixes accumulate as
/// script level methods run.
#[derive(Debug, Default)]
pub struct Environment {
    vars: IndexMap<String, String>,
    maps: MapRegistry,
    includes: HashMap<PathBuf, Arc<Fix>>,
    fix_file: Option<PathBuf>,
}

impl Environment {
    pub fn new(vars: IndexMap<String, String>) -> Self {
        Self {
            vars,
            ..Self::default()
        }
    }

    /// Set the file the running fix was loaded from. Includes resolve
    /// relative to its directory.
    pub fn with_fix_file(mut self, path: impl AsRef<Path>) -> Self {
        self.fix_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn vars(&self) -> &IndexMap<String, String> {
        &self.vars
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    pub fn maps_mut(&mut self) -> &mut MapRegistry {
        &mut self.maps
    }

    pub fn fix_file(&self) -> Option<&Path> {
        self.fix_file.as_deref()
    }

    pub(crate) fn swap_fix_file(&mut self, path: Option<PathBuf>) -> Option<PathBuf> {
        std::mem::replace(&mut self.fix_file, path)
    }

    /// Resolve `file` against the directory of the current fix file.
    pub fn resolve_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.fix_file.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Load an included fix, once per path.
    pub fn include(&mut self, path: &Path) -> FixResult<Arc<Fix>> {
        if let Some(fix) = self.includes.get(path) {
            return Ok(Arc::clone(fix));
        }

        log::debug!("Including fix {}", path.display());
        let fix = Fix::from_file(path).map_err(|e| FixError::Include {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let fix = Arc::new(fix);
        self.includes.insert(path.to_path_buf(), Arc::clone(&fix));
        Ok(fix)
    }

    /// Release resources held by lookup maps.
    pub fn close(&mut self) {
        self.maps.close();
    }
}
