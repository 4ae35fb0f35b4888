// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route table and request bodies.

use plr_core::UploadId;
use serde::{Deserialize, Serialize};

/// Parsed control-plane route. Anything else is a 404.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `POST /uploads` — intake of a new plan PDF
    Upload,
    /// `POST /plans/{id}/initialize`
    Initialize(UploadId),
    /// `POST /plans/{id}/sheet-complete`
    SheetComplete(UploadId),
    /// `POST /plans/{id}/tile-complete`
    TileComplete(UploadId),
    /// `POST /plans/{id}/marker-complete`
    MarkerComplete(UploadId),
    /// `POST /plans/{id}/retry-dispatch` — operator re-drive of a stuck fan-out
    RetryDispatch(UploadId),
    /// `GET /plans/{id}/progress`
    Progress(UploadId),
    /// `GET /plans/{id}/sheets`
    Sheets(UploadId),
    /// `GET /queues/{name}/dead`
    QueueDead(String),
    /// `GET /healthz`
    Health,
}

impl Route {
    pub fn parse(method: &str, path: &str) -> Option<Route> {
        match (method, path) {
            ("POST", "/uploads") => return Some(Route::Upload),
            ("GET", "/healthz") => return Some(Route::Health),
            _ => {}
        }

        if let Some(rest) = path.strip_prefix("/plans/") {
            let (id, action) = rest.split_once('/')?;
            if id.is_empty() {
                return None;
            }
            let upload_id = UploadId::new(id);
            return match (method, action) {
                ("POST", "initialize") => Some(Route::Initialize(upload_id)),
                ("POST", "sheet-complete") => Some(Route::SheetComplete(upload_id)),
                ("POST", "tile-complete") => Some(Route::TileComplete(upload_id)),
                ("POST", "marker-complete") => Some(Route::MarkerComplete(upload_id)),
                ("POST", "retry-dispatch") => Some(Route::RetryDispatch(upload_id)),
                ("GET", "progress") => Some(Route::Progress(upload_id)),
                ("GET", "sheets") => Some(Route::Sheets(upload_id)),
                _ => None,
            };
        }

        if let ("GET", Some(rest)) = (method, path.strip_prefix("/queues/")) {
            let (name, action) = rest.split_once('/')?;
            if action == "dead" && !name.is_empty() {
                return Some(Route::QueueDead(name.to_string()));
            }
        }

        None
    }
}

/// Body of `POST /plans/{id}/initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBody {
    pub upload_id: UploadId,
    pub total_sheets: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Body of `POST /plans/{id}/sheet-complete`.
///
/// `valid_sheets` is carried for wire compatibility with the metadata
/// worker; marker context is re-derived from `plan_sheets` at fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetCompleteBody {
    pub sheet_number: u32,
    #[serde(default)]
    pub valid_sheets: Vec<String>,
}

/// Body of `POST /plans/{id}/tile-complete` and `/marker-complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileCompleteBody {
    pub sheet_number: u32,
}

/// Query parameters of `POST /uploads` (the body is the raw PDF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParams {
    pub upload_id: UploadId,
    pub plan_id: String,
    pub project_id: String,
    pub organization_id: String,
}

impl UploadParams {
    /// Extract intake parameters from the request query string.
    pub fn from_query(req: &crate::HttpRequest) -> Result<Self, String> {
        let get = |name: &str| {
            req.query_param(name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| format!("missing query parameter '{name}'"))
        };
        Ok(Self {
            upload_id: UploadId::new(get("uploadId")?),
            plan_id: get("planId")?,
            project_id: get("projectId")?,
            organization_id: get("organizationId")?,
        })
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
