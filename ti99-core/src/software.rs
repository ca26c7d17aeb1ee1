//! Software catalog and module loading.
//!
//! The catalog is a JSON menu of named software, each pointing at a module
//! URL. Modules are RPK/ZIP archives or raw ROM files; archive members are
//! extracted by name and handed to the machine core uninterpreted.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{CoreError, CoreResult};

/// Module contents, keyed by member name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ModuleImage {
    pub entries: BTreeMap<String, Vec<u8>>,
}

impl ModuleImage {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for ModuleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleImage")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("bytes", &self.size())
            .finish()
    }
}

/// A named piece of software and, once fetched, its module image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    pub name: String,
    pub url: String,
    #[serde(skip)]
    pub module: ModuleImage,
}

impl Software {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            module: ModuleImage::default(),
        }
    }
}

/// Looks up software by name.
pub trait SoftwareCatalog {
    fn get_by_name(&self, name: &str) -> impl Future<Output = CoreResult<Software>> + Send;
}

/// Fetches module images.
pub trait ModuleLoader {
    fn load_from_url(&self, url: &str) -> impl Future<Output = CoreResult<Software>> + Send;

    fn load_from_file(&self, path: &Path) -> impl Future<Output = CoreResult<Software>> + Send;
}

/// Menu entry in the catalog file. Entries with `items` are folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub items: Vec<CatalogEntry>,
}

/// Catalog backed by a JSON menu.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    entries: Vec<CatalogEntry>,
}

impl JsonCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Parse a catalog. Accepts a top-level array of entries or a single
    /// root entry.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if let Ok(entries) = serde_json::from_value::<Vec<CatalogEntry>>(value.clone()) {
            return Ok(Self::new(entries));
        }
        let root: CatalogEntry = serde_json::from_value(value)?;
        Ok(Self::new(vec![root]))
    }

    pub fn from_path(path: &Path) -> CoreResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Find a loadable entry by case-insensitive name, depth first.
    pub fn find(&self, name: &str) -> Option<Software> {
        fn search(entries: &[CatalogEntry], name: &str) -> Option<Software> {
            for entry in entries {
                if let Some(url) = &entry.url {
                    if entry.name.eq_ignore_ascii_case(name) {
                        return Some(Software::new(entry.name.clone(), url.clone()));
                    }
                }
                if let Some(found) = search(&entry.items, name) {
                    return Some(found);
                }
            }
            None
        }
        search(&self.entries, name)
    }
}

impl SoftwareCatalog for JsonCatalog {
    async fn get_by_name(&self, name: &str) -> CoreResult<Software> {
        self.find(name)
            .ok_or_else(|| CoreError::NotFound(format!("software '{name}'")))
    }
}

/// Loads modules from files below an asset directory.
#[derive(Debug, Clone)]
pub struct AssetModuleLoader {
    root: PathBuf,
}

impl AssetModuleLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModuleLoader for AssetModuleLoader {
    async fn load_from_url(&self, url: &str) -> CoreResult<Software> {
        let path = self.root.join(url);
        let data = tokio::fs::read(&path).await.map_err(|e| CoreError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let module = parse_module(&path, &data)?;
        Ok(Software {
            name: module_name(&path),
            url: url.to_string(),
            module,
        })
    }

    async fn load_from_file(&self, path: &Path) -> CoreResult<Software> {
        let data = tokio::fs::read(path).await?;
        let module = parse_module(path, &data)?;
        Ok(Software {
            name: module_name(path),
            url: path.display().to_string(),
            module,
        })
    }
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string()
}

/// Split module data into named entries. Archives are unpacked; anything
/// else becomes a single entry named after the file.
pub fn parse_module(path: &Path, data: &[u8]) -> CoreResult<ModuleImage> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut entries = BTreeMap::new();
    if ext == "rpk" || ext == "zip" {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            // Handle nested paths - take just the member name
            let member = name.rsplit('/').next().unwrap_or(&name).to_string();
            entries.insert(member, content);
        }
    } else {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("module.bin")
            .to_string();
        entries.insert(name, data.to_vec());
    }
    Ok(ModuleImage { entries })
}
