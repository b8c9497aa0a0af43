// src/repositories/user.rs - Member accounts
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::short_link::like_pattern;
use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{GoogleProfile, PageRequest, Role, User};

type Result<T> = std::result::Result<T, RepositoryError>;

const COLUMNS: &str =
    "id, google_id, email, name, picture, role, created_at, updated_at, last_login_at";

/// Narrows a user listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
    pub role: Option<Role>,
    /// Users holding this role never appear, totals included
    pub exclude_role: Option<Role>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// Creates the account on first sign-in, otherwise refreshes the profile and keeps the role
    async fn upsert_from_google(&self, profile: GoogleProfile) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Returns one page of users, ordered by creation, and the total number of matches
    async fn list(&self, filter: UserFilter, page: PageRequest) -> Result<(Vec<User>, i64)>;

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>>;

    /// Removes the account; its links go with it
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(db: Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE 1=1");

    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(role) = filter.role {
        builder.push(" AND role = ");
        builder.push_bind(role.as_str());
    }

    if let Some(role) = filter.exclude_role {
        builder.push(" AND role <> ");
        builder.push_bind(role.as_str());
    }
}

#[async_trait]
impl UserRepositoryTrait for PgUserRepository {
    async fn upsert_from_google(&self, profile: GoogleProfile) -> Result<User> {
        let query = format!(
            "INSERT INTO users (google_id, email, name, picture, role) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (google_id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 name = EXCLUDED.name, \
                 picture = EXCLUDED.picture, \
                 last_login_at = NOW(), \
                 updated_at = NOW() \
             RETURNING {}",
            COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(&profile.google_id)
            .bind(&profile.email)
            .bind(&profile.name)
            .bind(&profile.picture)
            .bind(Role::Community.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                log::error!("Failed to upsert user {}: {}", profile.email, e);
                RepositoryError::from(e)
            })?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", COLUMNS);

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn list(&self, filter: UserFilter, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_filter(&mut count_builder, &filter);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::new(format!("SELECT {} FROM users", COLUMNS));
        push_filter(&mut builder, &filter);
        builder.push(" ORDER BY created_at DESC, id LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let users = builder.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
