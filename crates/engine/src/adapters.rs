// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rasterizer/OCR service adapter.
//!
//! The rasterizer is an opaque request/response container speaking HTTP/1.1
//! with JSON bodies; binary payloads travel base64-encoded. Requests are
//! sent over a plain TCP stream and responses read with Content-Length
//! framing (no dependence on connection close for EOF).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster service unreachable: {0}")]
    Connect(String),

    #[error("raster service io error: {0}")]
    Io(String),

    #[error("raster service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("raster service response malformed: {0}")]
    Malformed(String),

    #[error("raster service request timed out")]
    Timeout,
}

/// One rasterized page with its extracted title-block label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    pub sheet_name: Option<String>,
    pub page_pdf: Vec<u8>,
}

/// One deep-zoom tile image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    pub col: u32,
    pub row: u32,
    pub jpeg: Vec<u8>,
}

/// One zoom level of tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLevel {
    pub level: u32,
    pub tiles: Vec<TileImage>,
}

/// Full tile pyramid plus its DZI manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSet {
    pub dzi: String,
    pub levels: Vec<TileLevel>,
}

/// One detected callout marker (e.g. `5/A7`: detail 5 on sheet A7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerHit {
    /// Referenced sheet name (e.g. "A7").
    pub reference: String,
    /// Detail number on the referenced sheet, when legible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Client for the opaque rasterizer/OCR/detector service.
#[async_trait]
pub trait RasterClient: Send + Sync {
    /// Cheap ping returning the page count of a PDF.
    async fn page_count(&self, pdf: &[u8]) -> Result<u32, RasterError>;

    /// Rasterize one page (1-based) and extract its sheet label.
    async fn rasterize_page(&self, pdf: &[u8], page: u32) -> Result<RasterPage, RasterError>;

    /// Build the deep-zoom tile pyramid for one rasterized page.
    async fn generate_tiles(&self, page_pdf: &[u8]) -> Result<TileSet, RasterError>;

    /// Detect callout markers, given the valid cross-reference context.
    async fn detect_markers(
        &self,
        page_pdf: &[u8],
        valid_sheets: &[String],
    ) -> Result<Vec<MarkerHit>, RasterError>;
}

// === wire DTOs ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageCountRequest {
    pdf_base64: String,
}

#[derive(Deserialize)]
struct PageCountResponse {
    pages: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RasterizeRequest {
    pdf_base64: String,
    page: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RasterizeResponse {
    #[serde(default)]
    sheet_name: Option<String>,
    page_base64: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TilesRequest {
    page_base64: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TilesResponse {
    dzi: String,
    levels: Vec<TilesLevelWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TilesLevelWire {
    level: u32,
    tiles: Vec<TileWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileWire {
    col: u32,
    row: u32,
    jpeg_base64: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkersRequest {
    page_base64: String,
    valid_sheets: Vec<String>,
}

#[derive(Deserialize)]
struct MarkersResponse {
    markers: Vec<MarkerHit>,
}

/// HTTP client for the rasterizer container.
pub struct HttpRasterClient {
    addr: String,
    timeout: Duration,
}

impl HttpRasterClient {
    /// `url` is `http://host:port`; the worst-case OCR call budget is the
    /// caller's queue visibility timeout, so the default here stays below it.
    pub fn new(url: &str) -> Self {
        let addr = url.strip_prefix("http://").unwrap_or(url).trim_end_matches('/').to_string();
        Self { addr, timeout: Duration::from_secs(45) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp, RasterError> {
        let body = serde_json::to_string(request)
            .map_err(|e| RasterError::Malformed(format!("request encode: {e}")))?;
        let raw = tokio::time::timeout(self.timeout, self.send(path, &body))
            .await
            .map_err(|_| RasterError::Timeout)??;
        serde_json::from_str(&raw).map_err(|e| RasterError::Malformed(e.to_string()))
    }

    async fn send(&self, path: &str, body: &str) -> Result<String, RasterError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| RasterError::Connect(e.to_string()))?;
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            path,
            self.addr,
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).await.map_err(|e| RasterError::Io(e.to_string()))?;

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await.map_err(|e| RasterError::Io(e.to_string()))?;
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| RasterError::Malformed(format!("bad status line: {status_line:?}")))?;

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            let n =
                reader.read_line(&mut line).await.map_err(|e| RasterError::Io(e.to_string()))?;
            if n == 0 || line == "\r\n" || line == "\n" {
                break;
            }
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }

        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            reader.read_exact(&mut body).await.map_err(|e| RasterError::Io(e.to_string()))?;
        }
        let body = String::from_utf8_lossy(&body).into_owned();

        if status >= 400 {
            return Err(RasterError::Status { status, body });
        }
        Ok(body)
    }
}

#[async_trait]
impl RasterClient for HttpRasterClient {
    async fn page_count(&self, pdf: &[u8]) -> Result<u32, RasterError> {
        let response: PageCountResponse = self
            .post_json("/page-count", &PageCountRequest { pdf_base64: BASE64.encode(pdf) })
            .await?;
        Ok(response.pages)
    }

    async fn rasterize_page(&self, pdf: &[u8], page: u32) -> Result<RasterPage, RasterError> {
        let response: RasterizeResponse = self
            .post_json(
                "/rasterize",
                &RasterizeRequest { pdf_base64: BASE64.encode(pdf), page },
            )
            .await?;
        let page_pdf = BASE64
            .decode(&response.page_base64)
            .map_err(|e| RasterError::Malformed(format!("page payload: {e}")))?;
        Ok(RasterPage { sheet_name: response.sheet_name, page_pdf })
    }

    async fn generate_tiles(&self, page_pdf: &[u8]) -> Result<TileSet, RasterError> {
        let response: TilesResponse = self
            .post_json("/tiles", &TilesRequest { page_base64: BASE64.encode(page_pdf) })
            .await?;
        let mut levels = Vec::with_capacity(response.levels.len());
        for level in response.levels {
            let mut tiles = Vec::with_capacity(level.tiles.len());
            for tile in level.tiles {
                let jpeg = BASE64
                    .decode(&tile.jpeg_base64)
                    .map_err(|e| RasterError::Malformed(format!("tile payload: {e}")))?;
                tiles.push(TileImage { col: tile.col, row: tile.row, jpeg });
            }
            levels.push(TileLevel { level: level.level, tiles });
        }
        Ok(TileSet { dzi: response.dzi, levels })
    }

    async fn detect_markers(
        &self,
        page_pdf: &[u8],
        valid_sheets: &[String],
    ) -> Result<Vec<MarkerHit>, RasterError> {
        let response: MarkersResponse = self
            .post_json(
                "/detect-markers",
                &MarkersRequest {
                    page_base64: BASE64.encode(page_pdf),
                    valid_sheets: valid_sheets.to_vec(),
                },
            )
            .await?;
        Ok(response.markers)
    }
}

/// Deterministic in-memory raster service for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeRaster {
    pages: u32,
    sheet_names: parking_lot::Mutex<std::collections::HashMap<u32, String>>,
    fail_rasterize: std::sync::atomic::AtomicU32,
    fail_tiles: std::sync::atomic::AtomicU32,
    fail_markers: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRaster {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            sheet_names: parking_lot::Mutex::new(std::collections::HashMap::new()),
            fail_rasterize: std::sync::atomic::AtomicU32::new(0),
            fail_tiles: std::sync::atomic::AtomicU32::new(0),
            fail_markers: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Set the sheet label the OCR "extracts" for a page.
    pub fn set_sheet_name(&self, page: u32, name: impl Into<String>) {
        self.sheet_names.lock().insert(page, name.into());
    }

    pub fn fail_next_rasterize(&self, n: u32) {
        self.fail_rasterize.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_next_tiles(&self, n: u32) {
        self.fail_tiles.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_next_markers(&self, n: u32) {
        self.fail_markers.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    fn take_failure(counter: &std::sync::atomic::AtomicU32) -> bool {
        counter
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| n.checked_sub(1),
            )
            .is_ok()
    }

    fn unavailable() -> RasterError {
        RasterError::Status { status: 503, body: "injected failure".to_string() }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl RasterClient for FakeRaster {
    async fn page_count(&self, _pdf: &[u8]) -> Result<u32, RasterError> {
        Ok(self.pages)
    }

    async fn rasterize_page(&self, _pdf: &[u8], page: u32) -> Result<RasterPage, RasterError> {
        if Self::take_failure(&self.fail_rasterize) {
            return Err(Self::unavailable());
        }
        Ok(RasterPage {
            sheet_name: self.sheet_names.lock().get(&page).cloned(),
            page_pdf: format!("%PDF-page-{page}").into_bytes(),
        })
    }

    async fn generate_tiles(&self, page_pdf: &[u8]) -> Result<TileSet, RasterError> {
        if Self::take_failure(&self.fail_tiles) {
            return Err(Self::unavailable());
        }
        Ok(TileSet {
            dzi: "<Image TileSize=\"256\" Overlap=\"1\" Format=\"jpg\"/>".to_string(),
            levels: vec![TileLevel {
                level: 0,
                tiles: vec![TileImage { col: 0, row: 0, jpeg: page_pdf.to_vec() }],
            }],
        })
    }

    async fn detect_markers(
        &self,
        _page_pdf: &[u8],
        valid_sheets: &[String],
    ) -> Result<Vec<MarkerHit>, RasterError> {
        if Self::take_failure(&self.fail_markers) {
            return Err(Self::unavailable());
        }
        Ok(valid_sheets
            .iter()
            .map(|name| MarkerHit {
                reference: name.clone(),
                detail: Some("1".to_string()),
                x: 0.1,
                y: 0.1,
                width: 0.05,
                height: 0.05,
            })
            .collect())
    }
}
