//! Civilization catalog loading.
//!
//! The catalog is a YAML document with a single `civilizations` list. It is
//! read once per lobby entry and shared read-only afterwards.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use openciv_protocol::{CivSummary, CivilizationDescriptor};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("civilization `{0}` is listed more than once")]
    DuplicateName(String),
    #[error("civilization `{0}` has no settlement names")]
    NoSettlementNames(String),
    #[error("catalog contains no civilizations")]
    Empty,
}

/// Where the catalog is read from.
#[derive(Clone, Debug)]
pub enum CatalogSource {
    /// The catalog compiled into the binary.
    Embedded,
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    civilizations: Vec<CivilizationDescriptor>,
}

/// Immutable, validated set of civilizations.
#[derive(Debug)]
pub struct CivilizationCatalog {
    civs: Vec<Arc<CivilizationDescriptor>>,
}

impl CivilizationCatalog {
    pub fn load(source: &CatalogSource) -> Result<Self, CatalogError> {
        let raw: RawCatalog = match source {
            CatalogSource::Embedded => {
                serde_yaml::from_str(include_str!("../data/civilizations.yaml"))?
            }
            CatalogSource::Path(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.clone(),
                    source,
                })?;
                serde_yaml::from_str(&text)?
            }
            CatalogSource::Bytes(bytes) => serde_yaml::from_str(std::str::from_utf8(bytes)?)?,
        };
        Self::from_descriptors(raw.civilizations)
    }

    pub fn from_descriptors(civs: Vec<CivilizationDescriptor>) -> Result<Self, CatalogError> {
        if civs.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for civ in &civs {
            if !seen.insert(civ.name.as_str()) {
                return Err(CatalogError::DuplicateName(civ.name.clone()));
            }
            if civ.cities.is_empty() {
                return Err(CatalogError::NoSettlementNames(civ.name.clone()));
            }
        }
        Ok(Self {
            civs: civs.into_iter().map(Arc::new).collect(),
        })
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&Arc<CivilizationDescriptor>> {
        self.civs.iter().find(|civ| civ.name == name)
    }

    pub fn summaries(&self) -> Vec<CivSummary> {
        self.civs.iter().map(|civ| civ.summary()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CivilizationDescriptor>> {
        self.civs.iter()
    }

    pub fn len(&self) -> usize {
        self.civs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.civs.is_empty()
    }
}
