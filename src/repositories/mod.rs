mod short_link;
mod user;

#[cfg(test)]
pub mod memory;

#[cfg(test)]
pub use short_link::MockShortLinkRepositoryTrait;
pub use short_link::{PgShortLinkRepository, ShortLinkRepositoryTrait};
#[cfg(test)]
pub use user::MockUserRepositoryTrait;
pub use user::{PgUserRepository, UserFilter, UserRepositoryTrait};
