// ─── Command handlers ───
// Thin glue between the CLI surface and the core engine: each handler
// loads the manifest, drives the catalog/resolver/reconciler, prints a
// report, and persists the manifest back.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures_util::future::join_all;
use futures_util::TryStreamExt;
use regex::Regex;

use crate::cli::ContentType;
use crate::core::catalog::{Catalog, CurseForgeClient, ModId, ModSummary};
use crate::core::error::{PackError, PackResult};
use crate::core::http::build_http_client;
use crate::core::manifest::{Manifest, PackExport};
use crate::core::reconcile::{Confirm, Reconciler, REMOVED_DIR};
use crate::core::resolve::{common_versions, resolve, Resolution, ResolveOptions};
use crate::core::select::Side;

/// Everything a command needs: the catalog client, the raw HTTP client
/// for file downloads, and the working directory. Built once at process
/// start; no process-wide singletons.
pub struct App {
    pub catalog: CurseForgeClient,
    pub client: reqwest::Client,
    pub dir: PathBuf,
}

impl App {
    pub fn new(api_key: &str, dir: PathBuf) -> PackResult<Self> {
        let client = build_http_client(api_key)?;
        let catalog = CurseForgeClient::new(client.clone());
        Ok(Self {
            catalog,
            client,
            dir,
        })
    }
}

/// Answers reconciler prompts from the terminal. Only an explicit
/// affirmative acts; everything else (including EOF) is a "no".
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Parse a `1 2 3-5` style selection into indices.
pub fn parse_selection(input: &str) -> Vec<usize> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"(\d+)(?:-(\d+))?").unwrap());

    let mut picked = Vec::new();
    for captures in pattern.captures_iter(input) {
        let Ok(start) = captures[1].parse::<usize>() else { continue };
        match captures.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
            Some(end) if end >= start => picked.extend(start..=end),
            Some(_) => {}
            None => picked.push(start),
        }
    }
    picked
}

fn version_range(summary: &ModSummary) -> String {
    let versions = summary.available_versions();
    match (versions.iter().next(), versions.iter().next_back()) {
        (Some(oldest), Some(newest)) if oldest != newest => format!("{oldest}\u{2013}{newest}"),
        (Some(only), _) => only.to_string(),
        _ => "?".to_string(),
    }
}

fn category_list(summary: &ModSummary) -> String {
    summary
        .categories
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the resolved dependency tree, one root per manifest mod, each
/// required/embedded dependency indented under the file that pulled it
/// in. A mod repeating along its own ancestry (a cycle) is printed once
/// and not descended into again; diamonds appear under every parent.
fn render_dependency_tree(
    roots: &[ModId],
    resolution: &Resolution,
    names: &HashMap<ModId, String>,
) -> String {
    fn walk(
        id: ModId,
        resolution: &Resolution,
        names: &HashMap<ModId, String>,
        depth: usize,
        ancestry: &mut HashSet<ModId>,
        out: &mut String,
    ) {
        let name = names.get(&id).map(String::as_str).unwrap_or("?");
        out.push_str(&"  ".repeat(depth));
        out.push_str("• ");
        out.push_str(name);
        out.push('\n');

        if !ancestry.insert(id) {
            return;
        }
        if let Some(file) = resolution.files.get(&id) {
            for dep in file.required_dependencies() {
                walk(dep, resolution, names, depth + 1, ancestry, out);
            }
        }
        ancestry.remove(&id);
    }

    let mut out = String::new();
    let mut ancestry = HashSet::new();
    for &root in roots {
        walk(root, resolution, names, 0, &mut ancestry, &mut out);
    }
    out
}

// ── add ─────────────────────────────────────────────────

pub async fn add(app: &App, content_type: ContentType, name_parts: &[String]) -> PackResult<()> {
    let mut manifest = Manifest::load(&app.dir)?;
    let name = name_parts.join(" ").trim().to_string();

    let mut results: Vec<ModSummary> = app
        .catalog
        .search(&name, content_type.class_id())
        .try_collect()
        .await?;

    if results.is_empty() {
        return Err(PackError::NotFound(format!("no mods matching '{name}'")));
    }

    // Exact-ish slug matches first, then featured, then most downloaded.
    results.sort_by_key(|m| {
        (
            !m.slug.starts_with(&name),
            m.is_featured,
            Reverse(m.download_count),
            m.name.clone(),
        )
    });

    for (index, summary) in results.iter().enumerate() {
        let marker = if manifest.mod_list.contains(&summary.id) {
            " [added]"
        } else {
            ""
        };
        println!(
            "{} {} ({}) by {} {} ({} downloads) [{}]{}",
            index + 1,
            summary.name.trim(),
            summary.slug,
            summary.author_name(),
            version_range(summary),
            summary.download_count,
            category_list(summary),
            marker,
        );
        println!("   {}", summary.summary);
        println!();
    }

    println!("==> Select mods to add (e.g. 1 2 3-5)");
    print!("==> ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let read = std::io::stdin()
        .read_line(&mut line)
        .map_err(|source| PackError::Io {
            path: PathBuf::new(),
            source,
        })?;
    if read == 0 {
        return Err(PackError::Interrupted);
    }

    let picked: Vec<ModId> = parse_selection(&line)
        .into_iter()
        .filter_map(|i| results.get(i.checked_sub(1)?))
        .map(|m| m.id)
        .collect();

    let added = manifest.add_mods(picked);
    manifest.save(&app.dir)?;

    println!(
        "==> Added {} new mod{}.",
        added,
        if added == 1 { "" } else { "s" }
    );
    Ok(())
}

// ── remove ──────────────────────────────────────────────

pub async fn remove(app: &App, name: &str) -> PackResult<()> {
    let mut manifest = Manifest::load(&app.dir)?;
    let needle = name.trim();

    let mut found = None;
    for &id in &manifest.mod_list {
        let summary = app.catalog.mod_summary(id).await?;
        if summary.slug == needle || summary.name.trim().eq_ignore_ascii_case(needle) {
            found = Some(summary);
            break;
        }
    }
    let Some(summary) = found else {
        return Err(PackError::NotFound(format!("mod '{needle}' in the bundle")));
    };

    // Quarantine whatever build of it is currently installed.
    let files = app
        .catalog
        .mod_files(summary.id, manifest.mc_version.as_deref())
        .await?;
    let reconciler = Reconciler::new(&app.catalog, &app.client, app.dir.clone());
    for file in &files {
        if reconciler.quarantine(REMOVED_DIR, &file.file_name)? {
            println!("Moved {} to {REMOVED_DIR}/", file.file_name);
        }
    }

    manifest.remove_mod(summary.id);
    manifest.save(&app.dir)?;

    println!("==> Removed '{}'.", summary.name.trim());
    Ok(())
}

// ── list ────────────────────────────────────────────────

pub async fn list(app: &App) -> PackResult<()> {
    let manifest = Manifest::load(&app.dir)?;

    let summaries = join_all(
        manifest
            .mod_list
            .iter()
            .map(|&id| app.catalog.mod_summary(id)),
    )
    .await
    .into_iter()
    .collect::<PackResult<Vec<_>>>()?;

    for summary in &summaries {
        println!(
            "• {} ({}) by {} {} [{}]",
            summary.name.trim(),
            summary.slug,
            summary.author_name(),
            version_range(summary),
            category_list(summary),
        );
        println!("   {}", summary.summary);
        println!();
    }
    Ok(())
}

// ── update ──────────────────────────────────────────────

pub async fn update(
    app: &App,
    client_only: bool,
    server_only: bool,
    skip_version: Option<&str>,
) -> PackResult<()> {
    let manifest = Manifest::load(&app.dir)?;
    let mc_version = manifest.mc_version.clone().ok_or(PackError::VersionNotSet)?;

    let side = if client_only {
        Side::ClientOnly
    } else if server_only {
        Side::ServerOnly
    } else {
        Side::Any
    };

    let options = ResolveOptions {
        game_version: Some(mc_version.clone()),
        loaders: manifest.loaders.clone(),
        side,
        skip_version: manifest.skip_version_with(skip_version),
    };

    println!("==> Resolving dependencies...");
    let resolution = resolve(&app.catalog, &manifest.mod_list, &options).await?;

    for failure in &resolution.failures {
        eprintln!(
            "Error: mod '{}' ({}) does not support Minecraft {}",
            failure.name.trim(),
            failure.slug,
            failure.requested,
        );
    }
    if !resolution.succeeded() {
        println!("==> Aborting.");
        return Err(PackError::ResolutionFailed {
            failed: resolution.failures.len(),
        });
    }

    for downgrade in &resolution.downgrades {
        println!(
            "Warning: '{}' does not support Minecraft {}; installing it for {} [--skip-version]",
            downgrade.name.trim(),
            mc_version,
            downgrade.version,
        );
    }

    let summaries = join_all(
        resolution
            .order
            .iter()
            .map(|&id| async move { app.catalog.mod_summary(id).await.map(|m| (id, m)) }),
    )
    .await
    .into_iter()
    .collect::<PackResult<HashMap<ModId, ModSummary>>>()?;

    let mut slugs: Vec<&str> = summaries.values().map(|m| m.slug.as_str()).collect();
    slugs.sort();

    println!("==> Mods to install:");
    println!("{}", slugs.join("  "));

    let names: HashMap<ModId, String> = summaries
        .iter()
        .map(|(&id, m)| (id, m.name.trim().to_string()))
        .collect();
    println!("• Dependency tree:");
    print!(
        "{}",
        render_dependency_tree(&manifest.mod_list, &resolution, &names)
    );

    println!("==> Downloading mods...");
    let reconciler = Reconciler::new(&app.catalog, &app.client, app.dir.clone());
    let report = reconciler
        .reconcile(&resolution, &mc_version, &StdinConfirm)
        .await?;

    println!(
        "==> Installed {}, already up to date {}, quarantined {}, disabled {}.",
        report.installed.len(),
        report.already_installed.len() + report.skipped_disabled.len(),
        report.quarantined.len(),
        report.disabled.len(),
    );
    println!("==> Update successful.");
    Ok(())
}

// ── commonver ───────────────────────────────────────────

pub async fn commonver(app: &App, skip_version: Option<&str>) -> PackResult<()> {
    let manifest = Manifest::load(&app.dir)?;
    let skip = manifest.skip_version_with(skip_version);

    let options = ResolveOptions {
        game_version: None,
        loaders: None,
        side: Side::Any,
        skip_version: skip.clone(),
    };

    println!("==> Resolving dependencies...");
    let resolution = resolve(&app.catalog, &manifest.mod_list, &options).await?;
    let common = common_versions(&app.catalog, &resolution, &skip).await?;

    println!("==> Common Minecraft versions:");
    if common.is_empty() {
        println!("(none)");
    } else {
        let versions: Vec<&str> = common.iter().map(|v| v.as_str()).collect();
        println!("{}", versions.join("  "));
    }
    Ok(())
}

// ── version / loaders ───────────────────────────────────

pub fn version(dir: &Path, value: Option<&str>) -> PackResult<()> {
    let mut manifest = Manifest::load(dir)?;
    match value {
        None => {
            match &manifest.mc_version {
                Some(current) => println!("Current Minecraft version is {current}."),
                None => println!("Minecraft version is not set."),
            }
        }
        Some(value) => {
            manifest.mc_version = Some(value.to_string());
            manifest.save(dir)?;
            println!("Successfully set Minecraft version {value}.");
        }
    }
    Ok(())
}

pub fn loaders(dir: &Path, names: &[String]) -> PackResult<()> {
    let mut manifest = Manifest::load(dir)?;
    if names.is_empty() {
        let current = match &manifest.loaders {
            Some(set) if !set.is_empty() => {
                set.iter().cloned().collect::<Vec<_>>().join(", ")
            }
            _ => "none".to_string(),
        };
        println!("Current loaders: {current}.");
    } else {
        manifest.loaders = Some(names.iter().cloned().collect());
        manifest.save(dir)?;
        println!("Successfully set mod loaders.");
    }
    Ok(())
}

// ── import / export ─────────────────────────────────────

pub async fn import(app: &App, file: &Path) -> PackResult<()> {
    let data = PackExport::load(file)?;
    let mut manifest = Manifest::load(&app.dir)?;

    println!("Importing mods");
    if let Some(mc_version) = data.mc_version {
        manifest.mc_version = Some(mc_version);
    }

    let ids = join_all(
        data.mod_list
            .iter()
            .map(|slug| async move { app.catalog.mod_by_slug(slug).await.map(|m| m.id) }),
    )
    .await
    .into_iter()
    .collect::<PackResult<Vec<ModId>>>()?;

    manifest.add_mods(ids);
    manifest.save(&app.dir)?;
    println!("Import successful.");
    Ok(())
}

pub async fn export(app: &App, file: &Path) -> PackResult<()> {
    let manifest = Manifest::load(&app.dir)?;

    println!("Exporting mods");
    let mod_list = join_all(
        manifest
            .mod_list
            .iter()
            .map(|&id| async move { app.catalog.mod_summary(id).await.map(|m| m.slug) }),
    )
    .await
    .into_iter()
    .collect::<PackResult<Vec<String>>>()?;

    let data = PackExport {
        mc_version: manifest.mc_version.clone(),
        mod_list,
    };
    data.save(file)?;
    println!("Export successful.");
    Ok(())
}
