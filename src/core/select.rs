// ─── File selection ───
// Picks the single best file of a mod under version / loader / side
// constraints. Higher file id is the recency proxy in the catalog.

use std::collections::BTreeSet;

use crate::core::catalog::ModFile;
use crate::core::version::GameVersion;

/// Which side of the game the pack is being assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Any,
    ClientOnly,
    ServerOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectConstraints<'a> {
    /// Target game version; `None` disables the version check.
    pub game_version: Option<&'a str>,
    /// Accepted loader tags; a file must declare at least one when set.
    pub loaders: Option<&'a BTreeSet<String>>,
    pub side: Side,
}

/// Loader and side checks, shared by normal selection and the
/// version-skip fallback (which drops only the version constraint).
fn matches_environment(file: &ModFile, constraints: &SelectConstraints) -> bool {
    if let Some(loaders) = constraints.loaders {
        if !loaders.iter().any(|loader| file.declares_tag(loader)) {
            return false;
        }
    }

    match constraints.side {
        Side::Any => true,
        // Client-only packs reject files declaring server-only support.
        Side::ClientOnly => !(file.declares_tag("Server") && !file.declares_tag("Client")),
        Side::ServerOnly => !(file.declares_tag("Client") && !file.declares_tag("Server")),
    }
}

/// Pick the newest file satisfying all constraints, or `None`.
///
/// An empty result under a set `game_version` means the mod is
/// incompatible with that version; the caller surfaces it.
pub fn select_file<'f>(
    files: &'f [ModFile],
    constraints: &SelectConstraints,
) -> Option<&'f ModFile> {
    files
        .iter()
        .filter(|file| matches_environment(file, constraints))
        .filter(|file| {
            constraints
                .game_version
                .map_or(true, |version| file.supports_version(version))
        })
        .max_by_key(|file| file.id)
}

/// Version-skip fallback: drop the version constraint and pick among the
/// files declaring at least one numeric version ≤ `target` the one with
/// the highest such version, tie-broken by file id. Returns the chosen
/// file together with the version it was actually selected for, so the
/// downgrade can be reported.
pub fn select_with_fallback<'f>(
    files: &'f [ModFile],
    constraints: &SelectConstraints,
    target: &str,
) -> Option<(&'f ModFile, GameVersion)> {
    let target = GameVersion::parse(target)?;

    files
        .iter()
        .filter(|file| matches_environment(file, constraints))
        .filter_map(|file| {
            let best = file
                .numeric_versions()
                .into_iter()
                .filter(|version| *version <= target)
                .max()?;
            Some((file, best))
        })
        .max_by(|(a, best_a), (b, best_b)| best_a.cmp(best_b).then(a.id.cmp(&b.id)))
}
