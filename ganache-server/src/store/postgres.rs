//! PostgreSQL implementation of the asset store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use super::query::{self, AssetSearch, ASSET_COLUMNS};
use super::{
    Asset, AssetUpdate, NewAsset, Paging, SearchPage, SearchParams, StoreError, TagPage,
    DEFAULT_TAG_PAGE_SIZE,
};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Row type for asset queries; tags are attached separately.
#[derive(FromRow)]
struct AssetRow {
    id: i64,
    sha256: String,
    bytes: i64,
    mime: String,
    width: i32,
    height: i32,
    original_filename: Option<String>,
    title: Option<String>,
    caption: Option<String>,
    credit: Option<String>,
    source: Option<String>,
    usage_notes: Option<String>,
    tag_text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    relevance: Option<f32>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Self {
            id: row.id,
            sha256: row.sha256,
            bytes: row.bytes,
            mime: row.mime,
            width: row.width,
            height: row.height,
            original_filename: row.original_filename,
            title: row.title,
            caption: row.caption,
            credit: row.credit,
            source: row.source,
            usage_notes: row.usage_notes,
            tags: Vec::new(),
            tag_text: row.tag_text,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            relevance: row.relevance,
        }
    }
}

/// How a single asset is located.
enum Lookup<'a> {
    Id(i64),
    Sha256(&'a str),
}

/// PostgreSQL-backed asset store.
#[derive(Clone)]
pub struct PostgresAssetStore {
    pool: PgPool,
}

impl PostgresAssetStore {
    /// Open a connection pool. Migrations are applied separately.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(database_url)
            .await?;

        tracing::info!(
            max_connections,
            min_connections,
            "Connected to PostgreSQL database"
        );
        Ok(Self { pool })
    }

    /// Create from an existing pool (for testing)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn create(&self, input: NewAsset) -> Result<Asset, StoreError> {
        let tags = ganache_core::tags::normalize_set(&input.tags);
        let tag_text = tags.join(" ");

        let mut tx = self.pool.begin().await?;

        // A concurrent insert of the same digest blocks here until it resolves.
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO asset (
                sha256, bytes, mime, width, height, original_filename,
                title, caption, credit, source, usage_notes, tag_text
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (sha256) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&input.sha256)
        .bind(input.bytes)
        .bind(&input.mime)
        .bind(input.width)
        .bind(input.height)
        .bind(&input.original_filename)
        .bind(&input.title)
        .bind(&input.caption)
        .bind(&input.credit)
        .bind(&input.source)
        .bind(&input.usage_notes)
        .bind(&tag_text)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = inserted else {
            let existing = fetch_asset(&mut tx, Lookup::Sha256(&input.sha256), true)
                .await?
                .ok_or(StoreError::NotFound)?;
            tracing::debug!(
                sha256 = %input.sha256,
                asset_id = existing.id,
                "Duplicate content"
            );
            return Err(StoreError::Duplicate(Box::new(existing)));
        };

        reconcile_tags(&mut tx, id, &tags).await?;
        let asset = fetch_asset(&mut tx, Lookup::Id(id), true)
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        tracing::info!(asset_id = id, sha256 = %asset.sha256, "Asset created");
        Ok(asset)
    }

    pub async fn get(&self, id: i64, include_deleted: bool) -> Result<Asset, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_asset(&mut conn, Lookup::Id(id), include_deleted)
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn update(&self, id: i64, update: AssetUpdate) -> Result<Asset, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_active(&mut tx, id).await?.ok_or(StoreError::NotFound)?;

        let mut assignments: Vec<(&'static str, Option<String>)> = update
            .text_changes(&current)
            .into_iter()
            .map(|(field, value)| (field.column(), value))
            .collect();

        let target_tags = update.target_tags().filter(|tags| *tags != current.tags);
        if let Some(tags) = &target_tags {
            assignments.push(("tag_text", Some(tags.join(" "))));
        }

        if !assignments.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE asset SET ");
            for (column, value) in assignments {
                qb.push(column).push(" = ").push_bind(value).push(", ");
            }
            qb.push("updated_at = NOW() WHERE id = ").push_bind(id);
            qb.build().execute(&mut *tx).await?;
        }

        if let Some(tags) = &target_tags {
            reconcile_tags(&mut tx, id, tags).await?;
        }

        let asset = fetch_asset(&mut tx, Lookup::Id(id), true)
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        tracing::debug!(asset_id = id, "Asset updated");
        Ok(asset)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE asset
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::info!(asset_id = id, "Asset deleted");
        Ok(())
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage, StoreError> {
        let search = AssetSearch::new(params);
        let mut conn = self.pool.acquire().await?;

        let total: i64 = search
            .count_query()
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let rows: Vec<AssetRow> = search
            .page_query()
            .build_query_as()
            .fetch_all(&mut *conn)
            .await?;

        let mut items: Vec<Asset> = rows.into_iter().map(Asset::from).collect();
        attach_tags(&mut conn, &mut items).await?;

        Ok(SearchPage {
            items,
            page: search.paging.page,
            page_size: search.paging.page_size,
            total,
        })
    }

    pub async fn list_tags(
        &self,
        prefix: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<TagPage, StoreError> {
        let paging = Paging::resolve(page, page_size, DEFAULT_TAG_PAGE_SIZE);

        let total: i64 = query::tag_count_query(prefix)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let items: Vec<String> = query::tag_page_query(prefix, paging)
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(TagPage {
            items,
            page: paging.page,
            page_size: paging.page_size,
            total,
        })
    }
}

async fn fetch_asset(
    conn: &mut PgConnection,
    lookup: Lookup<'_>,
    include_deleted: bool,
) -> Result<Option<Asset>, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
    qb.push(ASSET_COLUMNS)
        .push(", NULL::real AS relevance FROM asset a WHERE ");
    match lookup {
        Lookup::Id(id) => qb.push("a.id = ").push_bind(id),
        Lookup::Sha256(sha256) => qb.push("a.sha256 = ").push_bind(sha256.to_string()),
    };
    if !include_deleted {
        qb.push(" AND a.deleted_at IS NULL");
    }

    let row: Option<AssetRow> = qb.build_query_as().fetch_optional(&mut *conn).await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut assets = vec![Asset::from(row)];
    attach_tags(conn, &mut assets).await?;
    Ok(assets.pop())
}

/// Lock an active asset row for the rest of the transaction.
async fn lock_active(conn: &mut PgConnection, id: i64) -> Result<Option<Asset>, sqlx::Error> {
    let row: Option<AssetRow> = sqlx::query_as(&format!(
        "SELECT {ASSET_COLUMNS}, NULL::real AS relevance FROM asset a \
         WHERE a.id = $1 AND a.deleted_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut assets = vec![Asset::from(row)];
    attach_tags(conn, &mut assets).await?;
    Ok(assets.pop())
}

/// Fill `tags` for every asset with one query.
async fn attach_tags(conn: &mut PgConnection, assets: &mut [Asset]) -> Result<(), sqlx::Error> {
    if assets.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = assets.iter().map(|a| a.id).collect();

    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT j.asset_id, t.name
        FROM asset_tag j
        JOIN tag t ON t.id = j.tag_id
        WHERE j.asset_id = ANY($1)
        ORDER BY t.name COLLATE "C"
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_asset: HashMap<i64, Vec<String>> = HashMap::new();
    for (asset_id, name) in rows {
        by_asset.entry(asset_id).or_default().push(name);
    }
    for asset in assets.iter_mut() {
        asset.tags = by_asset.remove(&asset.id).unwrap_or_default();
    }
    Ok(())
}

/// Make the asset's associations equal `target` (already canonical).
async fn reconcile_tags(
    conn: &mut PgConnection,
    asset_id: i64,
    target: &[String],
) -> Result<(), sqlx::Error> {
    if !target.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO tag (name)
            SELECT unnest($1::text[])
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(target)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        DELETE FROM asset_tag j
        USING tag t
        WHERE j.tag_id = t.id
          AND j.asset_id = $1
          AND NOT (t.name = ANY($2))
        "#,
    )
    .bind(asset_id)
    .bind(target)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO asset_tag (asset_id, tag_id)
        SELECT $1, t.id FROM tag t WHERE t.name = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(asset_id)
    .bind(target)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
