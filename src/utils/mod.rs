pub mod qr_code;
pub mod short_code;
