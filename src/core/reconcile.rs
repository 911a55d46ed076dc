// ─── Local state reconciliation ───
// Brings the working directory in line with a resolution: downloads what
// is missing, verifies what is present, and quarantines what no longer
// belongs. Nothing is ever deleted except interrupted partial downloads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures_util::StreamExt;
use md5::Md5;
use regex::Regex;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::catalog::model::{FileHash, FileId, HashAlgo};
use crate::core::catalog::{Catalog, ModFile};
use crate::core::error::{PackError, PackResult};
use crate::core::resolve::Resolution;

/// Quarantine for files superseded by an update.
pub const OLD_DIR: &str = "Old";
/// Files the user (or the version sweep) has switched off.
pub const DISABLED_DIR: &str = "Disabled";
/// Quarantine for files of mods removed from the manifest.
pub const REMOVED_DIR: &str = "Removed";

const DOWNLOAD_CHUNK_SIZE: u64 = 4096;

/// Yes/no confirmation capability. The CLI answers from stdin; headless
/// callers and tests inject canned answers. The default answer is "no".
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Refuses every prompt; the headless default.
pub struct DenyAll;

impl Confirm for DenyAll {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// A local file name of the form `<name>-<gameVersion>_<fileId>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedName {
    pub name: String,
    pub game_version: String,
    pub file_id: FileId,
}

fn versioned_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.*)-([\d.]+)_(\d+)\.\w+$").unwrap())
}

/// Parse a local file name back into its encoded version and file id.
pub fn parse_versioned_name(file_name: &str) -> Option<VersionedName> {
    let captures = versioned_name_pattern().captures(file_name)?;
    Some(VersionedName {
        name: captures[1].to_string(),
        game_version: captures[2].to_string(),
        file_id: captures[3].parse().ok()?,
    })
}

/// Check `data` against every declared hash with a supported algorithm
/// (SHA-1, then MD5). Any match counts.
pub fn verify_hashes(data: &[u8], hashes: &[FileHash]) -> bool {
    hashes.iter().any(|hash| {
        let actual = match hash.algo {
            HashAlgo::Sha1 => hex::encode(Sha1::digest(data)),
            HashAlgo::Md5 => hex::encode(Md5::digest(data)),
            HashAlgo::Other(_) => return false,
        };
        actual.eq_ignore_ascii_case(&hash.value)
    })
}

fn has_supported_hash(hashes: &[FileHash]) -> bool {
    hashes
        .iter()
        .any(|h| matches!(h.algo, HashAlgo::Sha1 | HashAlgo::Md5))
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub installed: Vec<String>,
    pub already_installed: Vec<String>,
    /// Resolved files skipped because a manual disable was respected.
    pub skipped_disabled: Vec<String>,
    /// Files moved to `Old/`.
    pub quarantined: Vec<String>,
    /// Files moved to `Disabled/` by the version sweep.
    pub disabled: Vec<String>,
}

enum InstallOutcome {
    Installed,
    AlreadyInstalled,
    Disabled,
}

/// Reconciles one working directory against a resolution.
pub struct Reconciler<'a> {
    catalog: &'a dyn Catalog,
    client: &'a reqwest::Client,
    dir: PathBuf,
}

impl<'a> Reconciler<'a> {
    pub fn new(catalog: &'a dyn Catalog, client: &'a reqwest::Client, dir: PathBuf) -> Self {
        Self {
            catalog,
            client,
            dir,
        }
    }

    /// Install every resolved file in discovery order, then run the
    /// quarantine and version sweeps over the directory.
    pub async fn reconcile(
        &self,
        resolution: &Resolution,
        mc_version: &str,
        confirm: &dyn Confirm,
    ) -> PackResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for mod_id in &resolution.order {
            let file = &resolution.files[mod_id];
            match self.install_one(file).await? {
                InstallOutcome::Installed => {
                    info!("Installed {}", file.file_name);
                    report.installed.push(file.file_name.clone());
                }
                InstallOutcome::AlreadyInstalled => {
                    debug!("{} is already installed", file.file_name);
                    report.already_installed.push(file.file_name.clone());
                }
                InstallOutcome::Disabled => {
                    info!("{} is disabled (in {DISABLED_DIR}/), skipping", file.file_name);
                    report.skipped_disabled.push(file.file_name.clone());
                }
            }
        }

        self.sweep(&resolution.file_names(), mc_version, confirm, &mut report)?;
        Ok(report)
    }

    async fn install_one(&self, file: &ModFile) -> PackResult<InstallOutcome> {
        // A manual disable wins over installation.
        if self.dir.join(DISABLED_DIR).join(&file.file_name).exists() {
            return Ok(InstallOutcome::Disabled);
        }

        let dest = self.dir.join(&file.file_name);
        if dest.exists() {
            let data = tokio::fs::read(&dest).await.map_err(|source| PackError::Io {
                path: dest.clone(),
                source,
            })?;
            if verify_hashes(&data, &file.hashes) {
                return Ok(InstallOutcome::AlreadyInstalled);
            }
            debug!("{} exists but no hash matched; re-downloading", file.file_name);
        }

        let url = self.download_url_for(file).await?;
        self.download(&url, &dest).await?;

        // Verify what actually landed on disk.
        if has_supported_hash(&file.hashes) {
            let data = tokio::fs::read(&dest).await.map_err(|source| PackError::Io {
                path: dest.clone(),
                source,
            })?;
            if !verify_hashes(&data, &file.hashes) {
                return Err(PackError::Integrity { path: dest });
            }
        } else if !file.hashes.is_empty() {
            warn!(
                "{} declares no supported hash algorithm; accepting unverified",
                file.file_name
            );
        }

        Ok(InstallOutcome::Installed)
    }

    async fn download_url_for(&self, file: &ModFile) -> PackResult<String> {
        if let Some(url) = &file.download_url {
            return Ok(url.clone());
        }
        match self.catalog.file_download_url(file.mod_id, file.id).await {
            Ok(url) => Ok(url),
            Err(err) => {
                // The file may still be fetchable through a browser.
                let slug = self
                    .catalog
                    .mod_summary(file.mod_id)
                    .await
                    .map(|m| m.slug)
                    .unwrap_or_else(|_| file.mod_id.to_string());
                warn!(
                    "no download URL for {}; fetch it manually: \
                     https://curseforge.com/minecraft/mc-mods/{}/download/{}",
                    file.file_name, slug, file.id
                );
                Err(err)
            }
        }
    }

    /// Stream a download to `dest` in chunks. A failed stream deletes the
    /// partial file before propagating the error.
    async fn download(&self, url: &str, dest: &Path) -> PackResult<()> {
        let result = self.stream_to(url, dest).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> PackResult<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PackError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_chunks = response
            .content_length()
            .map(|len| len.div_ceil(DOWNLOAD_CHUNK_SIZE));

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|source| PackError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| PackError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
            written += chunk.len() as u64;
            debug!(
                "{}: chunk {}/{}",
                dest.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                written.div_ceil(DOWNLOAD_CHUNK_SIZE),
                total_chunks
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string()),
            );
        }
        file.flush().await.map_err(|source| PackError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    /// One pass over the directory: quarantine mod archives the
    /// resolution no longer names, and offer to disable files whose
    /// encoded game version does not match the target.
    fn sweep(
        &self,
        keep: &HashSet<&str>,
        mc_version: &str,
        confirm: &dyn Confirm,
        report: &mut ReconcileReport,
    ) -> PackResult<()> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| PackError::Io {
            path: self.dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| PackError::Io {
                path: self.dir.clone(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();

            let is_mod_archive = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
            if is_mod_archive && !keep.contains(file_name.as_str()) {
                info!("Moving {} to {}/", file_name, OLD_DIR);
                self.quarantine(OLD_DIR, &file_name)?;
                report.quarantined.push(file_name);
                continue;
            }

            if let Some(parsed) = parse_versioned_name(&file_name) {
                if parsed.game_version != mc_version {
                    let prompt = format!(
                        "{} for {} is probably not compatible with Minecraft {}. Disable?",
                        parsed.name, parsed.game_version, mc_version
                    );
                    if confirm.confirm(&prompt) {
                        self.quarantine(DISABLED_DIR, &file_name)?;
                        info!("Disabled {}.", parsed.name);
                        report.disabled.push(file_name);
                    }
                }
            }
        }

        Ok(())
    }

    /// Move a file into a quarantine sub-directory, creating it if
    /// absent. Returns false when the file does not exist.
    pub fn quarantine(&self, subdir: &str, file_name: &str) -> PackResult<bool> {
        let source = self.dir.join(file_name);
        if !source.exists() {
            return Ok(false);
        }
        let target_dir = self.dir.join(subdir);
        std::fs::create_dir_all(&target_dir).map_err(|source| PackError::Io {
            path: target_dir.clone(),
            source,
        })?;
        let target = target_dir.join(file_name);
        std::fs::rename(&source, &target).map_err(|source| PackError::Io {
            path: target,
            source,
        })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::model::{ModId, ModSummary};
    use crate::core::error::PackError;
    use async_trait::async_trait;
    use std::cell::RefCell;

    struct NoCatalog;

    #[async_trait]
    impl Catalog for NoCatalog {
        async fn mod_summary(&self, id: ModId) -> PackResult<ModSummary> {
            Err(PackError::NotFound(format!("mod {id}")))
        }
        async fn mod_files(
            &self,
            _id: ModId,
            _game_version: Option<&str>,
        ) -> PackResult<Vec<ModFile>> {
            Ok(vec![])
        }
        async fn file_download_url(&self, mod_id: ModId, file_id: FileId) -> PackResult<String> {
            Err(PackError::NotFound(format!("file {file_id} of mod {mod_id}")))
        }
    }

    struct Answer(bool, RefCell<Vec<String>>);

    impl Confirm for Answer {
        fn confirm(&self, prompt: &str) -> bool {
            self.1.borrow_mut().push(prompt.to_string());
            self.0
        }
    }

    fn resolved_file(id: FileId, file_name: &str, sha1_hex: &str) -> ModFile {
        serde_json::from_str(&format!(
            r#"{{
                "id": {id},
                "modId": 100,
                "fileName": "{file_name}",
                "hashes": [{{"value": "{sha1_hex}", "algo": 1}}]
            }}"#
        ))
        .unwrap()
    }

    fn downloadable_file(id: FileId, file_name: &str, sha1_hex: &str, url: &str) -> ModFile {
        serde_json::from_str(&format!(
            r#"{{
                "id": {id},
                "modId": 100,
                "fileName": "{file_name}",
                "downloadUrl": "{url}",
                "hashes": [{{"value": "{sha1_hex}", "algo": 1}}]
            }}"#
        ))
        .unwrap()
    }

    /// Serve one canned HTTP response on a loopback socket, then close
    /// the connection.
    async fn serve_once(response: Vec<u8>) -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/mod-1.20.1_1.jar")
    }

    fn ok_response(body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn resolution_with(file: ModFile) -> Resolution {
        let mut resolution = Resolution::default();
        resolution.order.push(file.mod_id);
        resolution.files.insert(file.mod_id, file);
        resolution
    }

    #[test]
    fn versioned_name_parses_and_rejects() {
        let parsed = parse_versioned_name("jei-1.20.1_5012.jar").unwrap();
        assert_eq!(parsed.name, "jei");
        assert_eq!(parsed.game_version, "1.20.1");
        assert_eq!(parsed.file_id, 5012);

        // Empty name part is the legacy form.
        let legacy = parse_versioned_name("-1.19.4_42.jar").unwrap();
        assert_eq!(legacy.name, "");
        assert_eq!(legacy.game_version, "1.19.4");

        assert!(parse_versioned_name("plain-mod.jar").is_none());
        assert!(parse_versioned_name("README.md").is_none());
    }

    #[test]
    fn hash_verification_tries_each_supported_algorithm() {
        let data = b"mod bytes";
        let sha1_hex = hex::encode(Sha1::digest(data));
        let md5_hex = hex::encode(Md5::digest(data));

        let sha1_only: Vec<FileHash> = serde_json::from_str(&format!(
            r#"[{{"value": "{sha1_hex}", "algo": 1}}]"#
        ))
        .unwrap();
        assert!(verify_hashes(data, &sha1_only));

        let md5_after_bad_sha1: Vec<FileHash> = serde_json::from_str(&format!(
            r#"[{{"value": "0000", "algo": 1}}, {{"value": "{md5_hex}", "algo": 2}}]"#
        ))
        .unwrap();
        assert!(verify_hashes(data, &md5_after_bad_sha1));

        let unsupported: Vec<FileHash> =
            serde_json::from_str(r#"[{"value": "feed", "algo": 9}]"#).unwrap();
        assert!(!verify_hashes(data, &unsupported));
        assert!(!verify_hashes(b"other bytes", &sha1_only));
    }

    #[tokio::test]
    async fn matching_local_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"installed jar";
        std::fs::write(dir.path().join("mod-1.20.1_1.jar"), data).unwrap();

        let file = resolved_file(1, "mod-1.20.1_1.jar", &hex::encode(Sha1::digest(data)));
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let report = reconciler
            .reconcile(&resolution, "1.20.1", &DenyAll)
            .await
            .unwrap();

        assert_eq!(report.already_installed, ["mod-1.20.1_1.jar"]);
        assert!(report.installed.is_empty());
        assert!(dir.path().join("mod-1.20.1_1.jar").exists());
    }

    #[tokio::test]
    async fn manually_disabled_file_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(DISABLED_DIR)).unwrap();
        std::fs::write(dir.path().join(DISABLED_DIR).join("mod.jar"), b"x").unwrap();

        let file = resolved_file(1, "mod.jar", "00");
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let report = reconciler
            .reconcile(&resolution, "1.20.1", &DenyAll)
            .await
            .unwrap();

        assert_eq!(report.skipped_disabled, ["mod.jar"]);
    }

    #[tokio::test]
    async fn stale_jar_moves_to_quarantine() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"current";
        std::fs::write(dir.path().join("mod-1.20.1_2.jar"), data).unwrap();
        std::fs::write(dir.path().join("mod-1.20.1_1.jar"), b"stale").unwrap();

        let file = resolved_file(2, "mod-1.20.1_2.jar", &hex::encode(Sha1::digest(data)));
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let report = reconciler
            .reconcile(&resolution, "1.20.1", &DenyAll)
            .await
            .unwrap();

        assert_eq!(report.quarantined, ["mod-1.20.1_1.jar"]);
        assert!(dir.path().join(OLD_DIR).join("mod-1.20.1_1.jar").exists());
        assert!(dir.path().join("mod-1.20.1_2.jar").exists());
    }

    #[tokio::test]
    async fn version_sweep_disables_only_on_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        // Not a .jar so the quarantine sweep leaves it to the version sweep.
        std::fs::write(dir.path().join("shader-1.19.4_7.zip"), b"old").unwrap();

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());

        let refused = Answer(false, RefCell::new(vec![]));
        let report = reconciler
            .reconcile(&Resolution::default(), "1.20.1", &refused)
            .await
            .unwrap();
        assert!(report.disabled.is_empty());
        assert!(dir.path().join("shader-1.19.4_7.zip").exists());
        assert_eq!(refused.1.borrow().len(), 1);

        let accepted = Answer(true, RefCell::new(vec![]));
        let report = reconciler
            .reconcile(&Resolution::default(), "1.20.1", &accepted)
            .await
            .unwrap();
        assert_eq!(report.disabled, ["shader-1.19.4_7.zip"]);
        assert!(dir
            .path()
            .join(DISABLED_DIR)
            .join("shader-1.19.4_7.zip")
            .exists());
    }

    #[tokio::test]
    async fn verified_download_lands_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"fresh jar bytes";
        let url = serve_once(ok_response(body)).await;

        let file = downloadable_file(1, "mod-1.20.1_1.jar", &hex::encode(Sha1::digest(body)), &url);
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let report = reconciler
            .reconcile(&resolution, "1.20.1", &DenyAll)
            .await
            .unwrap();

        assert_eq!(report.installed, ["mod-1.20.1_1.jar"]);
        let written = std::fs::read(dir.path().join("mod-1.20.1_1.jar")).unwrap();
        assert_eq!(written, body);
    }

    #[tokio::test]
    async fn truncated_download_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // Advertise far more bytes than the connection delivers.
        let response =
            b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\nConnection: close\r\n\r\nonly this"
                .to_vec();
        let url = serve_once(response).await;

        let file = downloadable_file(1, "mod-1.20.1_1.jar", "00", &url);
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let result = reconciler.reconcile(&resolution, "1.20.1", &DenyAll).await;

        assert!(result.is_err());
        assert!(!dir.path().join("mod-1.20.1_1.jar").exists());
    }

    #[tokio::test]
    async fn failed_status_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let url = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec()).await;

        let file = downloadable_file(1, "mod-1.20.1_1.jar", "00", &url);
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let result = reconciler.reconcile(&resolution, "1.20.1", &DenyAll).await;

        assert!(matches!(
            result,
            Err(PackError::DownloadFailed { status: 404, .. })
        ));
        assert!(!dir.path().join("mod-1.20.1_1.jar").exists());
    }

    #[tokio::test]
    async fn corrupted_download_is_rejected_but_kept_for_inspection() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"bytes that do not match the declared hash";
        let url = serve_once(ok_response(body)).await;

        let expected = hex::encode(Sha1::digest(b"the advertised content"));
        let file = downloadable_file(1, "mod-1.20.1_1.jar", &expected, &url);
        let resolution = resolution_with(file);

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, dir.path().to_path_buf());
        let result = reconciler.reconcile(&resolution, "1.20.1", &DenyAll).await;

        assert!(matches!(result, Err(PackError::Integrity { .. })));
        let kept = std::fs::read(dir.path().join("mod-1.20.1_1.jar")).unwrap();
        assert_eq!(kept, body);
    }

    #[test]
    fn quarantine_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let client_dir = dir.path().to_path_buf();
        std::fs::write(dir.path().join("present.jar"), b"x").unwrap();

        let client = reqwest::Client::new();
        let reconciler = Reconciler::new(&NoCatalog, &client, client_dir);
        assert!(reconciler.quarantine(REMOVED_DIR, "present.jar").unwrap());
        assert!(!reconciler.quarantine(REMOVED_DIR, "absent.jar").unwrap());
        assert!(dir.path().join(REMOVED_DIR).join("present.jar").exists());
    }
}
