// ─── mcpack core ───
// Resolution and reconciliation engine for one modpack directory.
//
// Architecture:
//   core/
//     catalog/   — CurseForge API models + memoized paginated client
//     manifest   — mcpack.json persistence, YAML import/export document
//     select     — best-file selection under version/loader/side constraints
//     resolve    — concurrent dependency-closure expansion
//     reconcile  — download/verify/quarantine against the filesystem
//     version    — numeric game-version ordering
//     error      — central error type
//     http       — shared HTTP client with API key headers

pub mod catalog;
pub mod error;
pub mod http;
pub mod manifest;
pub mod reconcile;
pub mod resolve;
pub mod select;
pub mod version;
