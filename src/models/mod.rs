mod pagination;
mod short_link;
mod user;

pub use pagination::{Page, PageQuery, PageRequest, PaginationMeta};
pub use short_link::{
    NewShortLink, QrFormat, QrOptions, ShortLink, ShortLinkResponseDto, ShortenRequest,
    ShortenResponse, UpdateShortLinkRequest, DEFAULT_QR_COLOR,
};
pub use user::{AdminScope, Capability, GoogleProfile, Role, UpdateRoleRequest, User};
