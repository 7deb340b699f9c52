//! QR tokens and QR code rendering for tickets and membership cards
//!
//! A token is an unguessable string stored on the ticket/subscription row.
//! The QR code encodes `club:<kind>:<token>`; scanners may send either the
//! full payload or just the token.

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::io::Cursor;
use thiserror::Error;

use crate::error::ApiError;

const PAYLOAD_PREFIX: &str = "club";

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(String),

    #[error("PNG encoding failed: {0}")]
    Image(String),
}

impl From<QrError> for ApiError {
    fn from(err: QrError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ticket,
    Subscription,
}

impl TokenKind {
    fn prefix(self) -> &'static str {
        match self {
            TokenKind::Ticket => "TKT",
            TokenKind::Subscription => "SUB",
        }
    }

    fn label(self) -> &'static str {
        match self {
            TokenKind::Ticket => "ticket",
            TokenKind::Subscription => "subscription",
        }
    }
}

/// Fresh random token, e.g. `TKT-3f2a...` (32 hex chars after the dash)
pub fn new_token(kind: TokenKind) -> String {
    format!("{}-{}", kind.prefix(), club_common::ids::random_hex_token())
}

/// Text encoded in the QR image
pub fn payload(kind: TokenKind, token: &str) -> String {
    format!("{}:{}:{}", PAYLOAD_PREFIX, kind.label(), token)
}

/// Extract the token from a scanned payload or a raw token
pub fn parse_payload(input: &str) -> Option<String> {
    let input = input.trim();
    let token = match input.strip_prefix("club:") {
        Some(rest) => rest.split_once(':').map(|(_, token)| token)?,
        None => input,
    };

    let (prefix, hex) = token.split_once('-')?;
    let known_prefix = prefix == TokenKind::Ticket.prefix() || prefix == TokenKind::Subscription.prefix();
    if known_prefix && hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(token.to_string())
    } else {
        None
    }
}

/// Square matrix of QR modules, `true` = dark
#[derive(Debug, Clone)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(data: &str) -> Result<Self, QrError> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
        let width = code.width();
        let modules = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();

        Ok(Self { width, modules })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }

    /// Render as PNG, `scale` pixels per module with a 4-module quiet zone
    pub fn to_png(&self, scale: u32) -> Result<Vec<u8>, QrError> {
        let border = 4u32;
        let scale = scale.max(1);
        let size = (self.width as u32 + 2 * border) * scale;

        let image = GrayImage::from_fn(size, size, |px, py| {
            let x = (px / scale) as i64 - border as i64;
            let y = (py / scale) as i64 - border as i64;
            let dark = x >= 0 && y >= 0 && self.is_dark(x as usize, y as usize);
            if dark {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });

        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| QrError::Image(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// PNG for a ticket or subscription token
pub fn render_png(kind: TokenKind, token: &str) -> Result<Vec<u8>, QrError> {
    QrMatrix::encode(&payload(kind, token))?.to_png(8)
}
