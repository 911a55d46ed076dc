// ─── CurseForge API models ───
// Explicit schema for the subset of the v1 REST API the tool consumes.
// Responses that do not match fail at parse time instead of at point of use.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::core::version::GameVersion;

pub type ModId = u64;
pub type FileId = u64;

/// Declared nature of one mod's dependency on another.
///
/// Only `EmbeddedLibrary` and `RequiredDependency` gate recursive
/// expansion; the optional and incompatible kinds are recognized but
/// deliberately not acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u64")]
pub enum RelationType {
    EmbeddedLibrary,
    OptionalDependency,
    RequiredDependency,
    Incompatible,
    Other(u64),
}

impl From<u64> for RelationType {
    fn from(code: u64) -> Self {
        match code {
            0 => RelationType::EmbeddedLibrary,
            2 => RelationType::OptionalDependency,
            3 => RelationType::RequiredDependency,
            5 => RelationType::Incompatible,
            other => RelationType::Other(other),
        }
    }
}

impl RelationType {
    /// Whether a dependency of this kind must be pulled into the closure.
    pub fn gates_resolution(self) -> bool {
        matches!(
            self,
            RelationType::EmbeddedLibrary | RelationType::RequiredDependency
        )
    }
}

/// Content-hash algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u64")]
pub enum HashAlgo {
    Sha1,
    Md5,
    Other(u64),
}

impl From<u64> for HashAlgo {
    fn from(code: u64) -> Self {
        match code {
            1 => HashAlgo::Sha1,
            2 => HashAlgo::Md5,
            other => HashAlgo::Other(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHash {
    pub value: String,
    pub algo: HashAlgo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDependency {
    pub mod_id: ModId,
    pub relation_type: RelationType,
}

/// One `(gameVersion, versionTypeId)` entry of a file's version list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortableGameVersion {
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub game_version_name: String,
    #[serde(default)]
    pub game_version_type_id: Option<u64>,
}

impl SortableGameVersion {
    /// The displayable tag: the plain version when present, otherwise the
    /// name (loader tags and side tags only carry a name).
    pub fn tag(&self) -> &str {
        if self.game_version.is_empty() {
            &self.game_version_name
        } else {
            &self.game_version
        }
    }
}

/// A specific downloadable build of a mod.
/// Higher file id means newer build within one mod.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModFile {
    pub id: FileId,
    pub mod_id: ModId,
    pub file_name: String,
    /// Flat tag list mixing game versions, loader names and side tags.
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub sortable_game_versions: Vec<SortableGameVersion>,
    #[serde(default)]
    pub dependencies: Vec<FileDependency>,
    #[serde(default)]
    pub hashes: Vec<FileHash>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_length: Option<u64>,
}

impl ModFile {
    /// Numeric game versions this file declares.
    pub fn numeric_versions(&self) -> BTreeSet<GameVersion> {
        self.sortable_game_versions
            .iter()
            .filter_map(|v| GameVersion::parse(v.tag()))
            .collect()
    }

    /// Non-numeric tags (loaders, Client/Server) from the sortable list.
    pub fn loader_tags(&self) -> BTreeSet<&str> {
        self.sortable_game_versions
            .iter()
            .map(|v| v.tag())
            .filter(|t| !t.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .collect()
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.sortable_game_versions.iter().any(|v| v.tag() == version)
    }

    pub fn declares_tag(&self, tag: &str) -> bool {
        self.game_versions.iter().any(|t| t == tag)
    }

    /// Dependency mod ids that must be in the closure.
    pub fn required_dependencies(&self) -> impl Iterator<Item = ModId> + '_ {
        self.dependencies
            .iter()
            .filter(|d| d.relation_type.gates_resolution())
            .map(|d| d.mod_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModCategory {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModLinks {
    #[serde(default)]
    pub website_url: Option<String>,
}

/// One entry of a mod's `latestFilesIndexes` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIndex {
    pub game_version: String,
    pub file_id: FileId,
}

/// Remote mod metadata, immutable per fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModSummary {
    pub id: ModId,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub authors: Vec<ModAuthor>,
    #[serde(default)]
    pub categories: Vec<ModCategory>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub links: ModLinks,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub latest_files_indexes: Vec<FileIndex>,
}

impl ModSummary {
    /// Game versions the mod's latest files cover, in numeric order.
    pub fn available_versions(&self) -> BTreeSet<GameVersion> {
        self.latest_files_indexes
            .iter()
            .filter_map(|i| GameVersion::parse(&i.game_version))
            .collect()
    }

    pub fn author_name(&self) -> &str {
        self.authors.first().map(|a| a.name.as_str()).unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_type_codes_decode() {
        assert_eq!(RelationType::from(0), RelationType::EmbeddedLibrary);
        assert_eq!(RelationType::from(3), RelationType::RequiredDependency);
        assert_eq!(RelationType::from(2), RelationType::OptionalDependency);
        assert_eq!(RelationType::from(4), RelationType::Other(4));
        assert!(RelationType::EmbeddedLibrary.gates_resolution());
        assert!(RelationType::RequiredDependency.gates_resolution());
        assert!(!RelationType::OptionalDependency.gates_resolution());
        assert!(!RelationType::Incompatible.gates_resolution());
    }

    #[test]
    fn deserialize_mod_file() {
        let json = r#"{
            "id": 5012,
            "modId": 100,
            "fileName": "examplemod-1.20.1-4.2.jar",
            "gameVersions": ["1.20.1", "Fabric", "Client"],
            "sortableGameVersions": [
                {"gameVersion": "1.20.1", "gameVersionName": "1.20.1", "gameVersionTypeId": 75125},
                {"gameVersion": "", "gameVersionName": "Fabric", "gameVersionTypeId": 68441}
            ],
            "dependencies": [{"modId": 306612, "relationType": 3}],
            "hashes": [{"value": "da39a3ee5e6b4b0d3255bfef95601890afd80709", "algo": 1}],
            "downloadUrl": "https://edge.example/examplemod.jar",
            "fileLength": 123456
        }"#;
        let file: ModFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, 5012);
        assert!(file.supports_version("1.20.1"));
        assert_eq!(file.loader_tags().into_iter().collect::<Vec<_>>(), ["Fabric"]);
        assert_eq!(file.required_dependencies().collect::<Vec<_>>(), [306612]);
    }

    #[test]
    fn mod_summary_versions_skip_non_numeric() {
        let json = r#"{
            "id": 100,
            "slug": "examplemod",
            "name": "Example Mod",
            "latestFilesIndexes": [
                {"gameVersion": "1.20.1", "fileId": 1},
                {"gameVersion": "1.19.4", "fileId": 2}
            ]
        }"#;
        let summary: ModSummary = serde_json::from_str(json).unwrap();
        let versions: Vec<String> = summary
            .available_versions()
            .into_iter()
            .map(|v| v.as_str().to_string())
            .collect();
        assert_eq!(versions, ["1.19.4", "1.20.1"]);
    }
}
