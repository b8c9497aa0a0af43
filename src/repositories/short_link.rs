// src/repositories/short_link.rs - Data access
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{NewShortLink, PageRequest, QrOptions, ShortLink};

type Result<T> = std::result::Result<T, RepositoryError>;

const COLUMNS: &str = "id, long_url, short_code, user_id, clicks, format, color, transparent, \
                       size, created_at, updated_at, deleted_at";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShortLinkRepositoryTrait: Send + Sync {
    /// Inserts a new link with zero clicks
    ///
    /// ### Errors
    /// * `RepositoryError::Conflict` - If the short code is already taken by an active link
    /// * `RepositoryError::InvalidData` - If the owner does not exist
    /// * `RepositoryError::Database` - If a database error occurs
    async fn insert(&self, link: NewShortLink) -> Result<ShortLink>;

    /// Finds an active link of `user_id` with the same destination and rendering options
    ///
    /// ### Arguments
    /// * `options` - Must already be normalized, colors are compared verbatim
    async fn find_existing(
        &self,
        user_id: Uuid,
        long_url: String,
        options: QrOptions,
    ) -> Result<Option<ShortLink>>;

    /// Finds an active link by id, only if it belongs to `user_id`
    async fn find_by_id_for_owner(&self, id: Uuid, user_id: Uuid) -> Result<Option<ShortLink>>;

    /// Looks up an active link by code and counts the visit in the same statement
    ///
    /// ### Returns
    /// * `Result<Option<String>>` - The destination URL, or `None` for unknown codes
    async fn resolve_and_count(&self, short_code: String) -> Result<Option<String>>;

    /// Lists active links of `user_id`, newest first
    ///
    /// ### Arguments
    /// * `page` - Page coordinates
    /// * `search` - Case-insensitive substring of the long URL or short code
    ///
    /// ### Returns
    /// * `Result<(Vec<ShortLink>, i64)>` - The page of links and the total number of matches
    async fn find_by_owner(
        &self,
        user_id: Uuid,
        page: PageRequest,
        search: Option<String>,
    ) -> Result<(Vec<ShortLink>, i64)>;

    /// Changes the destination of an owned link
    ///
    /// ### Returns
    /// * `Result<Option<ShortLink>>` - The updated link, or `None` if not found or not owned
    async fn update_long_url(
        &self,
        id: Uuid,
        user_id: Uuid,
        long_url: String,
    ) -> Result<Option<ShortLink>>;

    /// Marks an owned link as deleted, freeing its short code
    ///
    /// ### Returns
    /// * `Result<bool>` - Whether a link was deleted
    async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<bool>;
}

// Implementation using actual database
pub struct PgShortLinkRepository {
    pool: PgPool,
}

impl PgShortLinkRepository {
    pub fn new(db: Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }
}

/// `%term%` with LIKE wildcards in the term escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_owner_filter(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, search: &Option<String>) {
    builder.push(" WHERE deleted_at IS NULL AND user_id = ");
    builder.push_bind(user_id);

    if let Some(term) = search {
        let pattern = like_pattern(term);
        builder.push(" AND (long_url ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR short_code ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl ShortLinkRepositoryTrait for PgShortLinkRepository {
    async fn insert(&self, link: NewShortLink) -> Result<ShortLink> {
        let query = format!(
            "INSERT INTO short_links (long_url, short_code, user_id, format, color, transparent, size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            COLUMNS
        );

        sqlx::query_as::<_, ShortLink>(&query)
            .bind(&link.long_url)
            .bind(&link.short_code)
            .bind(link.user_id)
            .bind(link.options.format.as_str())
            .bind(&link.options.color)
            .bind(link.options.transparent)
            .bind(link.options.size as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                debug!("Failed to insert short link {}: {}", link.short_code, e);
                RepositoryError::from(e)
            })
    }

    async fn find_existing(
        &self,
        user_id: Uuid,
        long_url: String,
        options: QrOptions,
    ) -> Result<Option<ShortLink>> {
        let query = format!(
            "SELECT {} FROM short_links \
             WHERE deleted_at IS NULL AND user_id = $1 AND long_url = $2 \
             AND format = $3 AND color = $4 AND transparent = $5 AND size = $6 \
             ORDER BY created_at \
             LIMIT 1",
            COLUMNS
        );

        let link = sqlx::query_as::<_, ShortLink>(&query)
            .bind(user_id)
            .bind(long_url)
            .bind(options.format.as_str())
            .bind(options.color)
            .bind(options.transparent)
            .bind(options.size as i32)
            .fetch_optional(&self.pool)
            .await?;

        Ok(link)
    }

    async fn find_by_id_for_owner(&self, id: Uuid, user_id: Uuid) -> Result<Option<ShortLink>> {
        let query = format!(
            "SELECT {} FROM short_links WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            COLUMNS
        );

        let link = sqlx::query_as::<_, ShortLink>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(link)
    }

    async fn resolve_and_count(&self, short_code: String) -> Result<Option<String>> {
        let long_url = sqlx::query_scalar::<_, String>(
            "UPDATE short_links SET clicks = clicks + 1 \
             WHERE short_code = $1 AND deleted_at IS NULL \
             RETURNING long_url",
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(long_url)
    }

    async fn find_by_owner(
        &self,
        user_id: Uuid,
        page: PageRequest,
        search: Option<String>,
    ) -> Result<(Vec<ShortLink>, i64)> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM short_links");
        push_owner_filter(&mut count_builder, user_id, &search);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::new(format!("SELECT {} FROM short_links", COLUMNS));
        push_owner_filter(&mut builder, user_id, &search);
        builder.push(" ORDER BY created_at DESC, id LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let links = builder
            .build_query_as::<ShortLink>()
            .fetch_all(&self.pool)
            .await?;

        Ok((links, total))
    }

    async fn update_long_url(
        &self,
        id: Uuid,
        user_id: Uuid,
        long_url: String,
    ) -> Result<Option<ShortLink>> {
        let query = format!(
            "UPDATE short_links SET long_url = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL \
             RETURNING {}",
            COLUMNS
        );

        let link = sqlx::query_as::<_, ShortLink>(&query)
            .bind(id)
            .bind(user_id)
            .bind(long_url)
            .fetch_optional(&self.pool)
            .await?;

        debug!("Updated short link {}: {}", id, link.is_some());
        Ok(link)
    }

    async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE short_links SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("docs"), "%docs%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }

    #[test]
    fn test_owner_filter_binds_search_twice() {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM short_links");
        push_owner_filter(&mut builder, Uuid::nil(), &Some("abc".to_string()));
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM short_links WHERE deleted_at IS NULL AND user_id = $1 \
             AND (long_url ILIKE $2 OR short_code ILIKE $3)"
        );
    }
}
