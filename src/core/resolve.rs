// ─── Dependency resolution ───
// Expands a set of mod ids into the transitive closure of required files.
// Expansion runs in concurrent waves: one future per mod id per wave, the
// required/embedded dependencies discovered in a wave form the next one.
// A visited set bounds duplicate work, so dependency cycles and diamonds
// terminate after one resolution per id.

use std::collections::{BTreeSet, HashMap, HashSet};

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::core::catalog::{Catalog, ModFile, ModId};
use crate::core::error::PackResult;
use crate::core::select::{select_file, select_with_fallback, SelectConstraints, Side};
use crate::core::version::GameVersion;

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Target game version; `None` resolves against the newest files
    /// (used by `commonver`).
    pub game_version: Option<String>,
    pub loaders: Option<BTreeSet<String>>,
    pub side: Side,
    /// Slugs exempt from the version check (fallback selection applies).
    pub skip_version: BTreeSet<String>,
}

impl ResolveOptions {
    fn constraints(&self) -> SelectConstraints<'_> {
        SelectConstraints {
            game_version: self.game_version.as_deref(),
            loaders: self.loaders.as_ref(),
            side: self.side,
        }
    }
}

/// A mod that was installed for an older game version via the
/// skip-version fallback.
#[derive(Debug, Clone)]
pub struct Downgrade {
    pub mod_id: ModId,
    pub name: String,
    pub slug: String,
    pub version: GameVersion,
}

/// A mod with no file satisfying the constraints.
#[derive(Debug, Clone)]
pub struct Incompatibility {
    pub mod_id: ModId,
    pub name: String,
    pub slug: String,
    pub requested: String,
}

/// Outcome of one full closure expansion.
#[derive(Debug, Default)]
pub struct Resolution {
    pub files: HashMap<ModId, ModFile>,
    /// Mod ids in discovery order; the reconciler installs in this order.
    pub order: Vec<ModId>,
    pub downgrades: Vec<Downgrade>,
    pub failures: Vec<Incompatibility>,
}

impl Resolution {
    /// True when every reachable branch resolved to a file.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Filenames of every selected file.
    pub fn file_names(&self) -> HashSet<&str> {
        self.files.values().map(|f| f.file_name.as_str()).collect()
    }
}

enum Outcome {
    Resolved {
        file: ModFile,
        downgrade: Option<Downgrade>,
    },
    Incompatible(Incompatibility),
}

/// Select the best file for one mod, falling back past the version check
/// for skip-listed slugs.
async fn resolve_one(
    catalog: &dyn Catalog,
    id: ModId,
    options: &ResolveOptions,
) -> PackResult<Outcome> {
    let files = catalog
        .mod_files(id, options.game_version.as_deref())
        .await?;

    if let Some(file) = select_file(&files, &options.constraints()) {
        return Ok(Outcome::Resolved {
            file: file.clone(),
            downgrade: None,
        });
    }

    // Selection failed; the mod's identity is needed either way, for the
    // fallback report or for the incompatibility report.
    let summary = catalog.mod_summary(id).await?;
    let requested = options
        .game_version
        .clone()
        .unwrap_or_else(|| "any version".to_string());

    if let Some(target) = options.game_version.as_deref() {
        if options.skip_version.contains(&summary.slug) {
            let all_files = catalog.mod_files(id, None).await?;
            let relaxed = SelectConstraints {
                game_version: None,
                ..options.constraints()
            };
            if let Some((file, version)) = select_with_fallback(&all_files, &relaxed, target) {
                return Ok(Outcome::Resolved {
                    file: file.clone(),
                    downgrade: Some(Downgrade {
                        mod_id: id,
                        name: summary.name,
                        slug: summary.slug,
                        version,
                    }),
                });
            }
        }
    }

    Ok(Outcome::Incompatible(Incompatibility {
        mod_id: id,
        name: summary.name,
        slug: summary.slug,
        requested,
    }))
}

/// Resolve the full dependency closure of `roots`.
///
/// Per-mod incompatibilities are collected and reported together once the
/// whole closure has been attempted; network errors abort immediately.
pub async fn resolve(
    catalog: &dyn Catalog,
    roots: &[ModId],
    options: &ResolveOptions,
) -> PackResult<Resolution> {
    let mut resolution = Resolution::default();
    let mut visited: HashSet<ModId> = HashSet::new();
    let mut frontier: Vec<ModId> = roots.to_vec();

    while !frontier.is_empty() {
        let wave: Vec<ModId> = frontier
            .drain(..)
            .filter(|id| visited.insert(*id))
            .collect();

        let outcomes = join_all(
            wave.iter()
                .map(|&id| async move { (id, resolve_one(catalog, id, options).await) }),
        )
        .await;

        for (id, outcome) in outcomes {
            match outcome? {
                Outcome::Resolved { file, downgrade } => {
                    frontier.extend(file.required_dependencies());
                    if let Some(downgrade) = downgrade {
                        warn!(
                            "'{}' does not support Minecraft {}; installing it for {}",
                            downgrade.name,
                            options.game_version.as_deref().unwrap_or("?"),
                            downgrade.version
                        );
                        resolution.downgrades.push(downgrade);
                    }
                    resolution.files.insert(id, file);
                    resolution.order.push(id);
                }
                Outcome::Incompatible(failure) => {
                    warn!(
                        "mod '{}' ({}) does not support Minecraft {}",
                        failure.name, failure.slug, failure.requested
                    );
                    resolution.failures.push(failure);
                }
            }
        }
    }

    info!(
        "Resolved {} mod(s), {} failure(s)",
        resolution.files.len(),
        resolution.failures.len()
    );
    Ok(resolution)
}

/// Intersection of the numeric game versions supported by every resolved
/// mod (skip-listed slugs excluded), in version order.
pub async fn common_versions(
    catalog: &dyn Catalog,
    resolution: &Resolution,
    skip: &BTreeSet<String>,
) -> PackResult<Vec<GameVersion>> {
    let per_mod = join_all(resolution.order.iter().map(|&id| async move {
        let summary = catalog.mod_summary(id).await?;
        if skip.contains(&summary.slug) {
            return Ok::<_, crate::core::error::PackError>(None);
        }
        let files = catalog.mod_files(id, None).await?;
        let versions: BTreeSet<GameVersion> = files
            .iter()
            .flat_map(|f| f.numeric_versions())
            .collect();
        Ok(Some(versions))
    }))
    .await;

    let mut common: Option<BTreeSet<GameVersion>> = None;
    for versions in per_mod {
        let Some(versions) = versions? else { continue };
        common = Some(match common {
            None => versions,
            Some(acc) => acc.intersection(&versions).cloned().collect(),
        });
    }

    Ok(common.unwrap_or_default().into_iter().collect())
}
