//! In-memory repositories backing service and handler tests
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ShortLinkRepositoryTrait, UserFilter, UserRepositoryTrait};
use crate::errors::RepositoryError;
use crate::models::{GoogleProfile, NewShortLink, PageRequest, QrOptions, Role, ShortLink, User};

type Result<T> = std::result::Result<T, RepositoryError>;

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn sample_user(role: Role) -> User {
    let id = Uuid::new_v4();
    let now = Utc::now();
    User {
        id,
        google_id: format!("google-{}", id.simple()),
        email: format!("{}@example.com", id.simple()),
        name: format!("Member {}", &id.simple().to_string()[..6]),
        picture: String::new(),
        role,
        created_at: now,
        updated_at: now,
        last_login_at: now,
    }
}

#[derive(Default)]
pub struct InMemoryShortLinkRepository {
    links: Mutex<Vec<ShortLink>>,
}

impl InMemoryShortLinkRepository {
    pub fn all(&self) -> Vec<ShortLink> {
        self.links.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShortLinkRepositoryTrait for InMemoryShortLinkRepository {
    async fn insert(&self, link: NewShortLink) -> Result<ShortLink> {
        let mut links = self.links.lock().unwrap();
        if links
            .iter()
            .any(|l| !l.is_deleted() && l.short_code == link.short_code)
        {
            return Err(RepositoryError::Conflict("Resource already exists".to_string()));
        }

        let now = Utc::now();
        let stored = ShortLink {
            id: Uuid::new_v4(),
            long_url: link.long_url,
            short_code: link.short_code,
            user_id: link.user_id,
            clicks: 0,
            format: link.options.format,
            color: link.options.color,
            transparent: link.options.transparent,
            size: link.options.size as i32,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        links.push(stored.clone());
        Ok(stored)
    }

    async fn find_existing(
        &self,
        user_id: Uuid,
        long_url: String,
        options: QrOptions,
    ) -> Result<Option<ShortLink>> {
        let links = self.links.lock().unwrap();
        Ok(links
            .iter()
            .find(|l| {
                !l.is_deleted()
                    && l.user_id == user_id
                    && l.long_url == long_url
                    && l.qr_options() == options
            })
            .cloned())
    }

    async fn find_by_id_for_owner(&self, id: Uuid, user_id: Uuid) -> Result<Option<ShortLink>> {
        let links = self.links.lock().unwrap();
        Ok(links
            .iter()
            .find(|l| !l.is_deleted() && l.id == id && l.user_id == user_id)
            .cloned())
    }

    async fn resolve_and_count(&self, short_code: String) -> Result<Option<String>> {
        let mut links = self.links.lock().unwrap();
        Ok(links
            .iter_mut()
            .find(|l| !l.is_deleted() && l.short_code == short_code)
            .map(|l| {
                l.clicks += 1;
                l.long_url.clone()
            }))
    }

    async fn find_by_owner(
        &self,
        user_id: Uuid,
        page: PageRequest,
        search: Option<String>,
    ) -> Result<(Vec<ShortLink>, i64)> {
        let links = self.links.lock().unwrap();
        let matching: Vec<ShortLink> = links
            .iter()
            .rev()
            .filter(|l| !l.is_deleted() && l.user_id == user_id)
            .filter(|l| match &search {
                Some(term) => contains_ci(&l.long_url, term) || contains_ci(&l.short_code, term),
                None => true,
            })
            .cloned()
            .collect();

        Ok((page_of(&matching, page), matching.len() as i64))
    }

    async fn update_long_url(
        &self,
        id: Uuid,
        user_id: Uuid,
        long_url: String,
    ) -> Result<Option<ShortLink>> {
        let mut links = self.links.lock().unwrap();
        Ok(links
            .iter_mut()
            .find(|l| !l.is_deleted() && l.id == id && l.user_id == user_id)
            .map(|l| {
                l.long_url = long_url;
                l.updated_at = Utc::now();
                l.clone()
            }))
    }

    async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut links = self.links.lock().unwrap();
        match links
            .iter_mut()
            .find(|l| !l.is_deleted() && l.id == id && l.user_id == user_id)
        {
            Some(link) => {
                link.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn seed(&self, user: User) -> User {
        self.users.lock().unwrap().push(user.clone());
        user
    }
}

#[async_trait]
impl UserRepositoryTrait for InMemoryUserRepository {
    async fn upsert_from_google(&self, profile: GoogleProfile) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        let now = Utc::now();

        if let Some(user) = users.iter_mut().find(|u| u.google_id == profile.google_id) {
            user.email = profile.email;
            user.name = profile.name;
            user.picture = profile.picture;
            user.last_login_at = now;
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            google_id: profile.google_id,
            email: profile.email,
            name: profile.name,
            picture: profile.picture,
            role: Role::Community,
            created_at: now,
            updated_at: now,
            last_login_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self, filter: UserFilter, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let users = self.users.lock().unwrap();
        let matching: Vec<User> = users
            .iter()
            .rev()
            .filter(|u| filter.role.map_or(true, |role| u.role == role))
            .filter(|u| filter.exclude_role != Some(u.role))
            .filter(|u| match &filter.search {
                Some(term) => contains_ci(&u.name, term) || contains_ci(&u.email, term),
                None => true,
            })
            .cloned()
            .collect();

        Ok((page_of(&matching, page), matching.len() as i64))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}
