// ─── Modpack manifest ───
// Persisted record of the selected mods and target constraints for one
// directory. Stored as `mcpack.json` next to the mods themselves.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::catalog::ModId;
use crate::core::error::{PackError, PackResult};

pub const MANIFEST_FILE: &str = "mcpack.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Target Minecraft version; unset until `mcpack version` is run.
    #[serde(default)]
    pub mc_version: Option<String>,
    /// Accepted loader tags; `None` disables the loader check.
    #[serde(default)]
    pub loaders: Option<BTreeSet<String>>,
    /// Selected mod ids, insertion-ordered, no duplicates.
    #[serde(default)]
    pub mod_list: Vec<ModId>,
    /// Slugs exempt from the game-version check during resolution.
    #[serde(default)]
    pub skip_version: BTreeSet<String>,
}

impl Manifest {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Load the manifest from `dir`. A missing file is an empty manifest,
    /// never an error.
    pub fn load(dir: &Path) -> PackResult<Self> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| PackError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist with stable 2-space indentation and a trailing newline.
    pub fn save(&self, dir: &Path) -> PackResult<()> {
        let path = Self::path_in(dir);
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(&path, json).map_err(|source| PackError::Io { path, source })
    }

    /// Merge ids into the mod list, preserving order and uniqueness.
    /// Returns how many were actually new.
    pub fn add_mods(&mut self, ids: impl IntoIterator<Item = ModId>) -> usize {
        let mut added = 0;
        for id in ids {
            if !self.mod_list.contains(&id) {
                self.mod_list.push(id);
                added += 1;
            }
        }
        added
    }

    pub fn remove_mod(&mut self, id: ModId) -> bool {
        let before = self.mod_list.len();
        self.mod_list.retain(|&existing| existing != id);
        self.mod_list.len() != before
    }

    /// Effective skip-version set: the persisted one plus a comma-separated
    /// command-line override.
    pub fn skip_version_with(&self, extra: Option<&str>) -> BTreeSet<String> {
        let mut set = self.skip_version.clone();
        if let Some(extra) = extra {
            set.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        set
    }
}

/// The YAML document produced by `export` and consumed by `import`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_version: Option<String>,
    #[serde(default)]
    pub mod_list: Vec<String>,
}

impl PackExport {
    pub fn load(path: &Path) -> PackResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> PackResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest {
            mc_version: Some("1.20.1".to_string()),
            loaders: Some(["Fabric".to_string()].into()),
            mod_list: vec![238222, 306612],
            skip_version: ["examplemod".to_string()].into(),
        };
        manifest.add_mods([306612, 60089]);
        manifest.save(dir.path()).unwrap();

        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.mod_list, vec![238222, 306612, 60089]);

        let raw = std::fs::read_to_string(Manifest::path_in(dir.path())).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("  \"mc_version\": \"1.20.1\""));
    }

    #[test]
    fn add_mods_ignores_duplicates() {
        let mut manifest = Manifest::default();
        assert_eq!(manifest.add_mods([1, 2, 2, 3]), 3);
        assert_eq!(manifest.add_mods([2, 4]), 1);
        assert_eq!(manifest.mod_list, vec![1, 2, 3, 4]);
    }

    #[test]
    fn remove_mod_reports_membership() {
        let mut manifest = Manifest {
            mod_list: vec![1, 2, 3],
            ..Manifest::default()
        };
        assert!(manifest.remove_mod(2));
        assert!(!manifest.remove_mod(2));
        assert_eq!(manifest.mod_list, vec![1, 3]);
    }

    #[test]
    fn skip_version_override_merges_and_trims() {
        let manifest = Manifest {
            skip_version: ["a".to_string()].into(),
            ..Manifest::default()
        };
        let merged = manifest.skip_version_with(Some("b, c ,"));
        let expected: BTreeSet<String> =
            ["a", "b", "c"].into_iter().map(str::to_string).collect();
        assert_eq!(merged, expected);
    }

    #[test]
    fn export_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.yml");
        let export = PackExport {
            mc_version: Some("1.20.1".to_string()),
            mod_list: vec!["jei".to_string(), "fabric-api".to_string()],
        };
        export.save(&path).unwrap();
        assert_eq!(PackExport::load(&path).unwrap(), export);
    }
}
