//! In-memory asset store
//!
//! Mirrors the PostgreSQL contract closely enough for development and tests.
//! Text search is token based: every query word must appear in the title,
//! caption or tags, and relevance counts the matching words. There is no
//! stemming.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::{
    Asset, AssetUpdate, NewAsset, Paging, SearchPage, SearchParams, SortOrder, StoreError,
    TagPage, DEFAULT_PAGE_SIZE, DEFAULT_TAG_PAGE_SIZE,
};

#[derive(Default)]
struct State {
    next_id: i64,
    assets: BTreeMap<i64, Asset>,
    by_sha256: HashMap<String, i64>,
    tags: BTreeSet<String>,
}

/// Memory-backed asset store; one lock makes each operation atomic.
#[derive(Default)]
pub struct MemoryAssetStore {
    state: Mutex<State>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, input: NewAsset) -> Result<Asset, StoreError> {
        let mut state = self.lock();

        if let Some(existing) = state
            .by_sha256
            .get(&input.sha256)
            .and_then(|id| state.assets.get(id))
        {
            return Err(StoreError::Duplicate(Box::new(existing.clone())));
        }

        let tags = ganache_core::tags::normalize_set(&input.tags);
        state.tags.extend(tags.iter().cloned());
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();

        let asset = Asset {
            id,
            sha256: input.sha256,
            bytes: input.bytes,
            mime: input.mime,
            width: input.width,
            height: input.height,
            original_filename: input.original_filename,
            title: input.title,
            caption: input.caption,
            credit: input.credit,
            source: input.source,
            usage_notes: input.usage_notes,
            tag_text: tags.join(" "),
            tags,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            relevance: None,
        };
        state.by_sha256.insert(asset.sha256.clone(), id);
        state.assets.insert(id, asset.clone());

        tracing::info!(asset_id = id, sha256 = %asset.sha256, "Asset created");
        Ok(asset)
    }

    pub fn get(&self, id: i64, include_deleted: bool) -> Result<Asset, StoreError> {
        self.lock()
            .assets
            .get(&id)
            .filter(|a| include_deleted || !a.is_deleted())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub fn update(&self, id: i64, update: AssetUpdate) -> Result<Asset, StoreError> {
        let mut state = self.lock();
        let State { assets, tags, .. } = &mut *state;

        let asset = assets
            .get_mut(&id)
            .filter(|a| !a.is_deleted())
            .ok_or(StoreError::NotFound)?;

        let changes = update.text_changes(asset);
        let target_tags = update.target_tags().filter(|t| *t != asset.tags);
        let changed = !changes.is_empty() || target_tags.is_some();

        for (field, value) in changes {
            *field.slot(asset) = value;
        }
        if let Some(target) = target_tags {
            tags.extend(target.iter().cloned());
            asset.tag_text = target.join(" ");
            asset.tags = target;
        }
        if changed {
            asset.updated_at = Utc::now();
        }

        Ok(asset.clone())
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let asset = state
            .assets
            .get_mut(&id)
            .filter(|a| !a.is_deleted())
            .ok_or(StoreError::NotFound)?;

        let now = Utc::now();
        asset.deleted_at = Some(now);
        asset.updated_at = now;
        tracing::info!(asset_id = id, "Asset deleted");
        Ok(())
    }

    pub fn search(&self, params: &SearchParams) -> Result<SearchPage, StoreError> {
        let paging = Paging::resolve(params.page, params.page_size, DEFAULT_PAGE_SIZE);
        let query_terms = params.text_query().map(terms);
        let sort = params.sort.effective(query_terms.is_some());
        let required_tags = ganache_core::tags::normalize_set(&params.tags);

        let state = self.lock();
        let mut matches: Vec<Asset> = state
            .assets
            .values()
            .filter(|a| params.include_deleted || !a.is_deleted())
            .filter(|a| required_tags.iter().all(|t| a.tags.contains(t)))
            .filter_map(|a| {
                let mut asset = a.clone();
                if let Some(q) = &query_terms {
                    asset.relevance = Some(rank(a, q)?);
                }
                Some(asset)
            })
            .collect();
        drop(state);

        matches.sort_by(|a, b| match sort {
            SortOrder::Newest => (b.created_at, b.id).cmp(&(a.created_at, a.id)),
            SortOrder::Oldest => (a.created_at, a.id).cmp(&(b.created_at, b.id)),
            SortOrder::Relevance => b
                .relevance
                .unwrap_or_default()
                .total_cmp(&a.relevance.unwrap_or_default())
                .then_with(|| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
        });

        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(usize::try_from(paging.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(paging.page_size).unwrap_or(usize::MAX))
            .collect();

        Ok(SearchPage {
            items,
            page: paging.page,
            page_size: paging.page_size,
            total,
        })
    }

    pub fn list_tags(
        &self,
        prefix: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<TagPage, StoreError> {
        let paging = Paging::resolve(page, page_size, DEFAULT_TAG_PAGE_SIZE);
        let prefix = prefix.unwrap_or("");

        let state = self.lock();
        let matching: Vec<&String> = state
            .tags
            .iter()
            .filter(|t| t.starts_with(prefix))
            .collect();

        Ok(TagPage {
            total: matching.len() as i64,
            items: matching
                .into_iter()
                .skip(usize::try_from(paging.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(paging.page_size).unwrap_or(usize::MAX))
                .cloned()
                .collect(),
            page: paging.page,
            page_size: paging.page_size,
        })
    }
}

/// Lowercase alphanumeric words.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Number of matching words, or `None` when a query word is missing or the
/// query has no words at all.
fn rank(asset: &Asset, query: &[String]) -> Option<f32> {
    if query.is_empty() {
        return None;
    }

    let mut document = Vec::new();
    for field in [asset.title.as_deref(), asset.caption.as_deref()]
        .into_iter()
        .flatten()
    {
        document.extend(terms(field));
    }
    document.extend(terms(&asset.tag_text));

    let mut hits = 0usize;
    for word in query {
        let count = document.iter().filter(|w| *w == word).count();
        if count == 0 {
            return None;
        }
        hits += count;
    }
    Some(hits as f32)
}
