//! Lookup Maps - named key/value tables used by `lookup`
//!
//! Inline maps come from `put_map` options. File maps are two-column CSV
//! files that are read on first use and released when the stream closes.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use crate::error::{MapError, MapResult};

/// Key whose value is returned for keys missing from a map.
pub const DEFAULT_MAP_KEY: &str = "__default";

/// Separator used by file maps unless `sep_char` says otherwise.
pub const DEFAULT_SEPARATOR: char = ',';

/// A two-column CSV file, loaded lazily
#[derive(Debug)]
pub struct FileMap {
    /// Location of the map file
    path: PathBuf,
    /// Column separator
    separator: u8,
    /// Entries, once loaded
    entries: OnceCell<HashMap<String, String>>,
}

impl FileMap {
    /// Create a file map. Nothing is read until the first lookup.
    pub fn new(path: impl AsRef<Path>, separator: char) -> MapResult<Self> {
        let separator = u8::try_from(separator)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| MapError::InvalidSeparator(separator.to_string()))?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            separator,
            entries: OnceCell::new(),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been read
    pub fn is_loaded(&self) -> bool {
        self.entries.get().is_some()
    }

    /// Look up a key, reading the file if needed
    pub fn get(&self, key: &str) -> MapResult<Option<&str>> {
        let entries = self.entries.get_or_try_init(|| self.load())?;
        Ok(entries.get(key).map(String::as_str))
    }

    /// Drop the loaded entries. The next lookup reads the file again.
    pub fn close(&mut self) {
        self.entries.take();
    }

    /// Read the file. Rows without at least two columns are skipped.
    fn load(&self) -> MapResult<HashMap<String, String>> {
        log::debug!("Loading map file {}", self.path.display());

        let file = File::open(&self.path).map_err(|source| MapError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut entries = HashMap::new();
        for row in reader.records() {
            let row = row.map_err(|source| MapError::Csv {
                path: self.path.clone(),
                source,
            })?;
            if let (Some(key), Some(value)) = (row.get(0), row.get(1)) {
                entries
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }

        Ok(entries)
    }
}

/// A named lookup table
#[derive(Debug)]
pub enum LookupMap {
    /// Entries given directly in the fix
    Inline(IndexMap<String, String>),
    /// Entries read from a file
    File(FileMap),
}

impl LookupMap {
    /// Look up a key without applying the default
    pub fn get(&self, key: &str) -> MapResult<Option<&str>> {
        match self {
            LookupMap::Inline(entries) => Ok(entries.get(key).map(String::as_str)),
            LookupMap::File(file) => file.get(key),
        }
    }

    /// Look up a key, falling back to the `__default` entry
    pub fn get_or_default(&self, key: &str) -> MapResult<Option<String>> {
        match self.get(key)? {
            Some(value) => Ok(Some(value.to_string())),
            None => Ok(self.get(DEFAULT_MAP_KEY)?.map(str::to_string)),
        }
    }
}

/// Registry of the maps known to a session
#[derive(Debug, Default)]
pub struct MapRegistry {
    /// Maps by name
    maps: HashMap<String, LookupMap>,
}

impl MapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an inline map
    pub fn put_map(&mut self, name: impl Into<String>, entries: IndexMap<String, String>) {
        self.maps.insert(name.into(), LookupMap::Inline(entries));
    }

    /// Register or replace a file map
    pub fn put_file_map(&mut self, name: impl Into<String>, map: FileMap) {
        self.maps.insert(name.into(), LookupMap::File(map));
    }

    /// Get a map by name
    pub fn get(&self, name: &str) -> Option<&LookupMap> {
        self.maps.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.maps.contains_key(name)
    }

    /// Names of all registered maps
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Release every loaded file map
    pub fn close(&mut self) {
        for map in self.maps.values_mut() {
            if let LookupMap::File(file) = map {
                if file.is_loaded() {
                    log::debug!("Closing map file {}", file.path().display());
                }
                file.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_map(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_inline_map_default() {
        let mut entries = IndexMap::new();
        entries.insert("fr".to_string(), "French".to_string());
        entries.insert(DEFAULT_MAP_KEY.to_string(), "Unknown".to_string());
        let map = LookupMap::Inline(entries);

        assert_eq!(map.get_or_default("fr").unwrap(), Some("French".to_string()));
        assert_eq!(map.get_or_default("de").unwrap(), Some("Unknown".to_string()));
        assert_eq!(map.get("de").unwrap(), None);
    }

    #[test]
    fn test_file_map_is_lazy() {
        let file = write_map("fr,French\nde,German\nbroken\n");
        let map = FileMap::new(file.path(), ',').unwrap();

        assert!(!map.is_loaded());
        assert_eq!(map.get("de").unwrap(), Some("German"));
        assert_eq!(map.get("broken").unwrap(), None);
        assert!(map.is_loaded());
    }

    #[test]
    fn test_file_map_separator() {
        let file = write_map("fr\tFrench\n");
        let map = FileMap::new(file.path(), '\t').unwrap();
        assert_eq!(map.get("fr").unwrap(), Some("French"));

        assert!(matches!(
            FileMap::new(file.path(), 'é'),
            Err(MapError::InvalidSeparator(_))
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let map = FileMap::new("/nonexistent/map.csv", ',').unwrap();
        assert!(matches!(map.get("a"), Err(MapError::Io { .. })));
    }

    #[test]
    fn test_registry_close_releases_file_maps() {
        let file = write_map("a,1\n");
        let mut registry = MapRegistry::new();
        registry.put_file_map("codes", FileMap::new(file.path(), ',').unwrap());

        assert_eq!(registry.get("codes").unwrap().get("a").unwrap(), Some("1"));
        registry.close();

        match registry.get("codes") {
            Some(LookupMap::File(map)) => assert!(!map.is_loaded()),
            other => panic!("unexpected map: {:?}", other),
        }
        assert_eq!(registry.names(), vec!["codes"]);
    }
}
