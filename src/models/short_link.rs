// src/models/short_link.rs - Pure data structures
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::utils::qr_code::DEFAULT_QR_SIZE;
use crate::validations::{validate_hex_color, validate_url};

pub const DEFAULT_QR_COLOR: &str = "#000000";

/// Image container produced for a link's QR code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    #[default]
    Png,
    Svg,
}

impl QrFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            QrFormat::Png => "png",
            QrFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            QrFormat::Png => "image/png",
            QrFormat::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for QrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown QR format '{0}', expected png or svg")]
pub struct UnknownQrFormat(pub String);

impl FromStr for QrFormat {
    type Err = UnknownQrFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(QrFormat::Png),
            "svg" => Ok(QrFormat::Svg),
            _ => Err(UnknownQrFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for QrFormat {
    type Error = UnknownQrFormat;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Rendering options requested alongside a long URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QrOptions {
    pub format: QrFormat,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,

    pub transparent: bool,

    #[validate(range(min = 64, max = 1024, message = "QR size must be between 64 and 1024 pixels"))]
    pub size: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            format: QrFormat::Png,
            color: DEFAULT_QR_COLOR.to_string(),
            transparent: false,
            size: DEFAULT_QR_SIZE,
        }
    }
}

impl QrOptions {
    /// Canonical form used for storage and duplicate detection: `#rrggbb`, empty color means black
    pub fn normalized(mut self) -> Self {
        let trimmed = self.color.trim().trim_start_matches('#');
        self.color = if trimmed.is_empty() {
            DEFAULT_QR_COLOR.to_string()
        } else {
            format!("#{}", trimmed.to_ascii_lowercase())
        };
        self
    }
}

// DTO for creating a new short link
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ShortenRequest {
    #[validate(custom(function = "validate_url"))]
    pub long_url: String,

    #[validate(nested)]
    pub qr_options: Option<QrOptions>,
}

// DTO for changing the destination of an existing link
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateShortLinkRequest {
    #[validate(custom(function = "validate_url"))]
    pub long_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_url: String,
    pub qrcode: String,
}

/// Values needed to insert a new link
#[derive(Debug, Clone, PartialEq)]
pub struct NewShortLink {
    pub long_url: String,
    pub short_code: String,
    pub user_id: Uuid,
    pub options: QrOptions,
}

/// Represents a stored short link
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShortLink {
    pub id: Uuid,

    /// The destination URL
    pub long_url: String,

    /// The generated code that identifies this link under `/r/`
    pub short_code: String,

    /// Owner of the link
    pub user_id: Uuid,

    /// Number of successful redirects
    pub clicks: i64,

    #[sqlx(try_from = "String")]
    pub format: QrFormat,
    pub color: String,
    pub transparent: bool,
    pub size: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ShortLink {
    pub fn qr_options(&self) -> QrOptions {
        QrOptions {
            format: self.format,
            color: self.color.clone(),
            transparent: self.transparent,
            size: u32::try_from(self.size).unwrap_or(DEFAULT_QR_SIZE),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// DTO for response with short link details
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortLinkResponseDto {
    pub id: Uuid,
    pub long_url: String,
    pub short_code: String,
    pub short_url: String,
    pub clicks: i64,
    pub qr_options: QrOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qrcode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortLinkResponseDto {
    pub fn from_link(link: ShortLink, base_url: &str) -> Self {
        Self {
            id: link.id,
            qr_options: link.qr_options(),
            short_url: format!("{}/r/{}", base_url, link.short_code),
            long_url: link.long_url,
            short_code: link.short_code,
            clicks: link.clicks,
            qrcode: None,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }

    pub fn with_qrcode(mut self, qrcode: String) -> Self {
        self.qrcode = Some(qrcode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_options_defaults_apply_to_missing_fields() {
        let options: QrOptions = serde_json::from_str(r#"{"format":"svg"}"#).unwrap();
        assert_eq!(options.format, QrFormat::Svg);
        assert_eq!(options.color, DEFAULT_QR_COLOR);
        assert_eq!(options.size, DEFAULT_QR_SIZE);
        assert!(!options.transparent);
    }

    #[test]
    fn test_qr_options_normalization() {
        let options = QrOptions {
            color: "FF00aa".to_string(),
            ..Default::default()
        }
        .normalized();
        assert_eq!(options.color, "#ff00aa");

        let blank = QrOptions {
            color: "  ".to_string(),
            ..Default::default()
        }
        .normalized();
        assert_eq!(blank.color, DEFAULT_QR_COLOR);
    }

    #[test]
    fn test_qr_options_validation() {
        let bad_color = QrOptions {
            color: "#12345".to_string(),
            ..Default::default()
        };
        assert!(bad_color.validate().is_err());

        let too_small = QrOptions {
            size: 10,
            ..Default::default()
        };
        assert!(too_small.validate().is_err());

        assert!(QrOptions::default().validate().is_ok());
    }

    #[test]
    fn test_shorten_request_validates_nested_options() {
        let request: ShortenRequest = serde_json::from_str(
            r#"{"long_url":"https://example.com","qr_options":{"color":"blue"}}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());

        let request: ShortenRequest =
            serde_json::from_str(r#"{"long_url":"ftp://example.com"}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!("gif".parse::<QrFormat>().is_err());
        assert_eq!("SVG".parse::<QrFormat>().unwrap(), QrFormat::Svg);
        assert!(serde_json::from_str::<QrOptions>(r#"{"format":"gif"}"#).is_err());
    }
}
