//! SQL builders for asset search and tag listing.
//!
//! Count and page queries share one predicate builder so `total` always
//! describes the same rows the page was cut from.

use sqlx::{Postgres, QueryBuilder};

use super::{Paging, SearchParams, SortOrder};

/// Columns of an asset row, aliased `a`.
pub(crate) const ASSET_COLUMNS: &str = "a.id, a.sha256, a.bytes, a.mime, a.width, a.height, \
     a.original_filename, a.title, a.caption, a.credit, a.source, a.usage_notes, a.tag_text, \
     a.created_at, a.updated_at, a.deleted_at";

/// Search request resolved against defaults.
#[derive(Debug, Clone)]
pub(crate) struct AssetSearch {
    query: Option<String>,
    tags: Vec<String>,
    include_deleted: bool,
    sort: SortOrder,
    pub paging: Paging,
}

impl AssetSearch {
    pub fn new(params: &SearchParams) -> Self {
        let query = params.text_query().map(str::to_string);
        let sort = params.sort.effective(query.is_some());
        Self {
            query,
            tags: ganache_core::tags::normalize_set(&params.tags),
            include_deleted: params.include_deleted,
            sort,
            paging: Paging::resolve(params.page, params.page_size, super::DEFAULT_PAGE_SIZE),
        }
    }

    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM asset a");
        self.push_filters(&mut qb);
        qb
    }

    pub fn page_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(ASSET_COLUMNS);
        match &self.query {
            Some(q) => {
                qb.push(", ts_rank(a.search_vector, plainto_tsquery('english', ")
                    .push_bind(q.clone())
                    .push(")) AS relevance");
            }
            None => {
                qb.push(", NULL::real AS relevance");
            }
        }
        qb.push(" FROM asset a");
        self.push_filters(&mut qb);
        qb.push(" ORDER BY ")
            .push(order_clause(self.sort))
            .push(" LIMIT ")
            .push_bind(self.paging.page_size)
            .push(" OFFSET ")
            .push_bind(self.paging.offset);
        qb
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE TRUE");
        if !self.include_deleted {
            qb.push(" AND a.deleted_at IS NULL");
        }
        if let Some(q) = &self.query {
            qb.push(" AND a.search_vector @@ plainto_tsquery('english', ")
                .push_bind(q.clone())
                .push(")");
        }
        if !self.tags.is_empty() {
            qb.push(
                " AND a.id IN (SELECT j.asset_id FROM asset_tag j \
                 JOIN tag t ON t.id = j.tag_id WHERE t.name = ANY(",
            )
            .push_bind(self.tags.clone())
            .push(") GROUP BY j.asset_id HAVING COUNT(DISTINCT t.name) = ")
            .push_bind(self.tags.len() as i64)
            .push(")");
        }
    }
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => "a.created_at DESC, a.id DESC",
        SortOrder::Oldest => "a.created_at ASC, a.id ASC",
        SortOrder::Relevance => "relevance DESC, a.created_at DESC, a.id DESC",
    }
}

/// Escape `LIKE` wildcards so a prefix matches literally (escape char `\`).
pub(crate) fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn tag_count_query(prefix: Option<&str>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tag");
    push_prefix(&mut qb, prefix);
    qb
}

pub(crate) fn tag_page_query(
    prefix: Option<&str>,
    paging: Paging,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT name FROM tag");
    push_prefix(&mut qb, prefix);
    qb.push(r#" ORDER BY name COLLATE "C" LIMIT "#)
        .push_bind(paging.page_size)
        .push(" OFFSET ")
        .push_bind(paging.offset);
    qb
}

fn push_prefix(qb: &mut QueryBuilder<'static, Postgres>, prefix: Option<&str>) {
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        qb.push(" WHERE name LIKE ")
            .push_bind(format!("{}%", escape_like(prefix)))
            .push(r" ESCAPE '\'");
    }
}
