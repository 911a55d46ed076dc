// ─── CurseForge v1 REST client ───
// Paginated, memoized JSON-over-HTTPS access to the mod catalog.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use super::model::{FileId, ModFile, ModId, ModSummary};
use super::Catalog;
use crate::core::error::{PackError, PackResult};

pub const API_BASE_URL: &str = "https://api.curseforge.com/v1";

/// CurseForge numeric ids for the game and the content classes we handle.
pub mod game {
    pub const MINECRAFT: u64 = 432;
}

pub mod class {
    pub const MOD: u64 = 6;
    pub const SHADER: u64 = 6552;
}

const PAGE_SIZE: usize = 50;
const SORT_FIELD_POPULARITY: u64 = 2;

/// Every 2xx response body is `{"data": ...}`.
#[derive(Deserialize)]
struct ApiResponse {
    data: Value,
}

type CacheCell = Arc<OnceCell<Arc<Value>>>;

/// Catalog client with a process-lifetime response cache.
///
/// The resolver hits the same `mods/{id}` and `mods/{id}/files` endpoints
/// redundantly across overlapping dependency branches; memoization keyed
/// by path+query turns those repeats into cache hits. The per-key
/// `OnceCell` makes concurrent first requests for one key coalesce into a
/// single network round-trip.
pub struct CurseForgeClient {
    client: Client,
    base_url: String,
    cache: DashMap<String, CacheCell>,
}

impl CurseForgeClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, API_BASE_URL.to_string())
    }

    pub fn with_base_url(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url,
            cache: DashMap::new(),
        }
    }

    /// Memoized GET of one endpoint, returning the `data` payload.
    async fn api_get(&self, path: &str, params: &[(String, String)]) -> PackResult<Arc<Value>> {
        let key = cache_key(path, params);
        let cell: CacheCell = self.cache.entry(key).or_default().clone();

        let value = cell
            .get_or_try_init(|| async {
                debug!("GET {} {:?}", path, params);
                let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
                let response = self.client.get(&url).query(params).send().await?;

                let status = response.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(PackError::NotFound(path.to_string()));
                }
                if !status.is_success() {
                    return Err(PackError::Api {
                        path: path.to_string(),
                        status: status.as_u16(),
                    });
                }

                let body: ApiResponse = response.json().await?;
                Ok(Arc::new(body.data))
            })
            .await?;

        Ok(value.clone())
    }

    /// Fetch one page of a listing endpoint at the given offset.
    async fn page(
        &self,
        path: &str,
        params: &[(String, String)],
        index: usize,
    ) -> PackResult<Vec<Value>> {
        let mut params = params.to_vec();
        params.push(("index".to_string(), index.to_string()));
        params.push(("pageSize".to_string(), PAGE_SIZE.to_string()));

        let data = self.api_get(path, &params).await?;
        match data.as_array() {
            Some(items) => Ok(items.clone()),
            None => Err(PackError::Other(format!(
                "expected an array from {path}, got something else"
            ))),
        }
    }

    /// Lazy paginated sequence: keeps requesting with an increasing
    /// `index` offset until a page comes back empty.
    fn paginate<T>(
        &self,
        path: String,
        params: Vec<(String, String)>,
    ) -> impl Stream<Item = PackResult<T>> + '_
    where
        T: DeserializeOwned + 'static,
    {
        struct PageState {
            index: usize,
            buffered: VecDeque<Value>,
            exhausted: bool,
        }

        let state = PageState {
            index: 0,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        futures_util::stream::try_unfold(state, move |mut state| {
            let path = path.clone();
            let params = params.clone();
            async move {
                loop {
                    if let Some(raw) = state.buffered.pop_front() {
                        let item: T = serde_json::from_value(raw)?;
                        return Ok(Some((item, state)));
                    }
                    if state.exhausted {
                        return Ok(None);
                    }

                    let page = self.page(&path, &params, state.index).await?;
                    if page.is_empty() {
                        state.exhausted = true;
                    } else {
                        state.index += page.len();
                        state.buffered = page.into();
                    }
                }
            }
        })
    }

    /// Search the catalog, paginating transparently.
    pub fn search(
        &self,
        filter: &str,
        class_id: u64,
    ) -> impl Stream<Item = PackResult<ModSummary>> + '_ {
        self.paginate("mods/search".to_string(), search_params(filter, class_id))
    }

    /// Look a mod up by its exact slug. Consults only the first result
    /// page and requires exactly one match.
    pub async fn mod_by_slug(&self, slug: &str) -> PackResult<ModSummary> {
        let page = self
            .page("mods/search", &search_params(slug, class::MOD), 0)
            .await?;

        let mut matches = page
            .into_iter()
            .map(serde_json::from_value::<ModSummary>)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|m| m.slug == slug);

        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found),
            (None, _) => Err(PackError::NotFound(format!("mod with slug '{slug}'"))),
            (Some(_), Some(_)) => Err(PackError::NotFound(format!(
                "slug '{slug}' is ambiguous in the catalog"
            ))),
        }
    }
}

fn search_params(filter: &str, class_id: u64) -> Vec<(String, String)> {
    vec![
        ("gameId".to_string(), game::MINECRAFT.to_string()),
        ("classId".to_string(), class_id.to_string()),
        ("searchFilter".to_string(), filter.to_string()),
        (
            "sortField".to_string(),
            SORT_FIELD_POPULARITY.to_string(),
        ),
        ("sortOrder".to_string(), "desc".to_string()),
    ]
}

fn cache_key(path: &str, params: &[(String, String)]) -> String {
    let mut key = path.to_string();
    for (name, value) in params {
        key.push_str("&");
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}

#[async_trait::async_trait]
impl Catalog for CurseForgeClient {
    async fn mod_summary(&self, id: ModId) -> PackResult<ModSummary> {
        let data = self.api_get(&format!("mods/{id}"), &[]).await?;
        Ok(serde_json::from_value((*data).clone())?)
    }

    async fn mod_files(
        &self,
        id: ModId,
        game_version: Option<&str>,
    ) -> PackResult<Vec<ModFile>> {
        let mut params = Vec::new();
        if let Some(version) = game_version {
            params.push(("gameVersion".to_string(), version.to_string()));
        }
        self.paginate(format!("mods/{id}/files"), params)
            .try_collect()
            .await
    }

    async fn file_download_url(&self, mod_id: ModId, file_id: FileId) -> PackResult<String> {
        let data = self
            .api_get(&format!("mods/{mod_id}/files/{file_id}/download-url"), &[])
            .await?;
        match data.as_str() {
            Some(url) => Ok(url.to_string()),
            None => Err(PackError::Other(format!(
                "download-url for file {file_id} of mod {mod_id} is not a string"
            ))),
        }
    }
}
