//! Ticket and membership card PDFs
//!
//! The document is first rendered as HTML. When a headless-browser service
//! is configured the HTML is sent to its `/pdf` endpoint; if that fails (or
//! none is configured) the page is laid out in-process with `printpdf`.
//! There is exactly one fallback and no retry.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rect, Rgb};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PdfConfig;
use crate::error::ApiError;
use crate::services::html::escape;
use crate::services::qr::{self, QrError, QrMatrix, TokenKind};

// A6 portrait
const PAGE_WIDTH_MM: f32 = 105.0;
const PAGE_HEIGHT_MM: f32 = 148.0;
const QR_SIZE_MM: f32 = 52.0;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Renderer request failed: {0}")]
    Network(String),

    #[error("Renderer returned {0}: {1}")]
    Renderer(u16, String),

    #[error("PDF layout failed: {0}")]
    Layout(String),

    #[error(transparent)]
    Qr(#[from] QrError),
}

impl From<PdfError> for ApiError {
    fn from(err: PdfError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Everything printed on a ticket or membership card
#[derive(Debug, Clone)]
pub struct PassDocument {
    pub kind: TokenKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub holder: String,
    /// Label/value rows (date, venue, validity...)
    pub details: Vec<(String, String)>,
    pub token: String,
}

impl PassDocument {
    fn heading(&self) -> &'static str {
        match self.kind {
            TokenKind::Ticket => "TICKET",
            TokenKind::Subscription => "MEMBERSHIP CARD",
        }
    }
}

/// HTML rendition with the QR code inlined as a PNG data URI
pub fn render_html(doc: &PassDocument) -> Result<String, QrError> {
    let png = qr::render_png(doc.kind, &doc.token)?;
    let qr_src = format!("data:image/png;base64,{}", STANDARD.encode(png));

    let subtitle = doc
        .subtitle
        .as_deref()
        .map(|s| format!("<h2>{}</h2>", escape(s)))
        .unwrap_or_default();

    let rows: String = doc
        .details
        .iter()
        .map(|(label, value)| format!("<tr><th>{}</th><td>{}</td></tr>", escape(label), escape(value)))
        .collect();

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  @page {{ size: A6; margin: 8mm; }}
  body {{ font-family: Helvetica, Arial, sans-serif; color: #111; }}
  .kind {{ font-size: 9pt; letter-spacing: 2px; color: #666; }}
  h1 {{ font-size: 16pt; margin: 4px 0; }}
  h2 {{ font-size: 11pt; margin: 0 0 8px; font-weight: normal; }}
  table {{ font-size: 9pt; border-collapse: collapse; }}
  th {{ text-align: left; padding-right: 8px; color: #666; }}
  .qr {{ text-align: center; margin-top: 10px; }}
  .qr img {{ width: 52mm; height: 52mm; }}
  .token {{ font-family: monospace; font-size: 7pt; text-align: center; }}
</style>
</head>
<body>
  <div class="kind">{heading}</div>
  <h1>{title}</h1>
  {subtitle}
  <table>
    <tr><th>Holder</th><td>{holder}</td></tr>
    {rows}
  </table>
  <div class="qr"><img src="{qr_src}" alt="QR code"></div>
  <div class="token">{token}</div>
</body>
</html>"#,
        title = escape(&doc.title),
        heading = doc.heading(),
        subtitle = subtitle,
        holder = escape(&doc.holder),
        rows = rows,
        qr_src = qr_src,
        token = escape(&doc.token),
    ))
}

/// Client for a browserless-style `/pdf` endpoint
pub struct HeadlessRenderer {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HeadlessRenderer {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self, PdfError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PdfError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let mut request = self.http_client.post(format!("{}/pdf", self.base_url));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .json(&json!({
                "html": html,
                "options": { "format": "A6", "printBackground": true }
            }))
            .send()
            .await
            .map_err(|e| PdfError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PdfError::Renderer(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PdfError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Headless renderer with in-process fallback
pub struct PdfRenderer {
    headless: Option<HeadlessRenderer>,
}

impl PdfRenderer {
    pub fn from_config(config: &PdfConfig) -> Result<Self, PdfError> {
        let headless = match &config.renderer_url {
            Some(url) if !url.trim().is_empty() => {
                Some(HeadlessRenderer::new(url.clone(), config.renderer_token.clone())?)
            }
            _ => None,
        };
        Ok(Self { headless })
    }

    /// Renderer that never leaves the process
    pub fn fallback_only() -> Self {
        Self { headless: None }
    }

    pub async fn render(&self, doc: &PassDocument) -> Result<Vec<u8>, PdfError> {
        if let Some(headless) = &self.headless {
            let html = render_html(doc)?;
            match headless.render(&html).await {
                Ok(bytes) => {
                    debug!(token = %doc.token, "Rendered PDF via headless browser");
                    return Ok(bytes);
                }
                Err(e) => warn!(token = %doc.token, "Headless rendering failed, using fallback: {}", e),
            }
        }

        render_fallback(doc)
    }
}

/// Builtin PDF fonts only cover WinAnsi (Latin-1). Letters from Latin
/// Extended-A lose their diacritics; anything else outside Latin-1 becomes '?'.
pub fn win_ansi(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0}'..='\u{ff}' => c,
            'Ą' | 'Ā' | 'Ă' => 'A',
            'ą' | 'ā' | 'ă' => 'a',
            'Č' | 'Ć' | 'Ĉ' | 'Ċ' => 'C',
            'č' | 'ć' | 'ĉ' | 'ċ' => 'c',
            'Ď' | 'Đ' => 'D',
            'ď' | 'đ' => 'd',
            'Ę' | 'Ė' | 'Ē' | 'Ě' | 'Ĕ' => 'E',
            'ę' | 'ė' | 'ē' | 'ě' | 'ĕ' => 'e',
            'Ģ' | 'Ğ' | 'Ġ' => 'G',
            'ģ' | 'ğ' | 'ġ' => 'g',
            'Į' | 'Ī' | 'İ' | 'Ĭ' | 'Ĩ' => 'I',
            'į' | 'ī' | 'ı' | 'ĭ' | 'ĩ' => 'i',
            'Ķ' => 'K',
            'ķ' => 'k',
            'Ļ' | 'Ł' | 'Ľ' | 'Ĺ' => 'L',
            'ļ' | 'ł' | 'ľ' | 'ĺ' => 'l',
            'Ņ' | 'Ń' | 'Ň' => 'N',
            'ņ' | 'ń' | 'ň' => 'n',
            'Ő' | 'Ō' => 'O',
            'ő' | 'ō' => 'o',
            'Ř' | 'Ŕ' => 'R',
            'ř' | 'ŕ' => 'r',
            'Š' | 'Ś' | 'Ş' => 'S',
            'š' | 'ś' | 'ş' => 's',
            'Ť' | 'Ţ' => 'T',
            'ť' | 'ţ' => 't',
            'Ų' | 'Ū' | 'Ů' | 'Ű' | 'Ŭ' | 'Ũ' => 'U',
            'ų' | 'ū' | 'ů' | 'ű' | 'ŭ' | 'ũ' => 'u',
            'Ž' | 'Ź' | 'Ż' => 'Z',
            'ž' | 'ź' | 'ż' => 'z',
            _ => '?',
        })
        .collect()
}

/// Lay the page out with printpdf: text block on top, QR code below
pub fn render_fallback(doc: &PassDocument) -> Result<Vec<u8>, PdfError> {
    let (pdf, page, layer) = PdfDocument::new(
        doc.title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "pass",
    );
    let layer = pdf.get_page(page).get_layer(layer);

    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PdfError::Layout(e.to_string()))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| PdfError::Layout(e.to_string()))?;

    let left = Mm(10.0);
    let mut y = PAGE_HEIGHT_MM - 14.0;

    layer.use_text(win_ansi(doc.heading()), 8.0, left, Mm(y), &regular);
    y -= 8.0;
    layer.use_text(win_ansi(&doc.title), 15.0, left, Mm(y), &bold);
    if let Some(subtitle) = &doc.subtitle {
        y -= 6.5;
        layer.use_text(win_ansi(subtitle), 10.0, left, Mm(y), &regular);
    }

    y -= 9.0;
    layer.use_text(win_ansi(&format!("Holder: {}", doc.holder)), 9.0, left, Mm(y), &regular);
    for (label, value) in &doc.details {
        y -= 5.0;
        layer.use_text(win_ansi(&format!("{}: {}", label, value)), 9.0, left, Mm(y), &regular);
    }

    let matrix = QrMatrix::encode(&qr::payload(doc.kind, &doc.token))?;
    let width = matrix.width();
    let module = QR_SIZE_MM / width as f32;
    let origin_x = (PAGE_WIDTH_MM - QR_SIZE_MM) / 2.0;
    let origin_y = 14.0;

    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    for row in 0..width {
        for col in 0..width {
            if !matrix.is_dark(col, row) {
                continue;
            }
            // PDF y axis points up, QR rows go down
            let llx = origin_x + col as f32 * module;
            let lly = origin_y + (width - 1 - row) as f32 * module;
            layer.add_rect(Rect::new(Mm(llx), Mm(lly), Mm(llx + module), Mm(lly + module)));
        }
    }

    layer.use_text(doc.token.as_str(), 6.0, Mm(origin_x), Mm(origin_y - 5.0), &regular);

    pdf.save_to_bytes().map_err(|e| PdfError::Layout(e.to_string()))
}
