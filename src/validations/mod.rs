mod short_link;

pub use short_link::{check_long_url, validate_hex_color, validate_url, UrlRejection};
