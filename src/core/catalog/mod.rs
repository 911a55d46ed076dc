pub mod client;
pub mod model;

use async_trait::async_trait;

use crate::core::error::PackResult;
pub use client::CurseForgeClient;
pub use model::{FileId, ModFile, ModId, ModSummary};

/// The narrow remote-catalog interface the resolver and reconciler need.
///
/// `CurseForgeClient` implements it over the real API; tests implement it
/// over in-memory maps.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn mod_summary(&self, id: ModId) -> PackResult<ModSummary>;

    /// All files of a mod, optionally pre-filtered to a game version.
    async fn mod_files(&self, id: ModId, game_version: Option<&str>)
        -> PackResult<Vec<ModFile>>;

    /// Resolve a download URL for files whose metadata carries none.
    async fn file_download_url(&self, mod_id: ModId, file_id: FileId) -> PackResult<String>;
}
