// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relational-store emulation: processing jobs, plan sheets, coordinator rows.
//!
//! Tables live behind one mutex and are written back synchronously (temp
//! file + rename) before any mutator returns, so a reply to a worker is
//! never sent ahead of the durability it implies. `plan_sheets` writes are
//! keyed by sheet id and last-write-wins; a double-update from a redelivered
//! worker sets the same values and is benign.

use parking_lot::Mutex;
use plr_core::{CoordinatorState, PlanSheet, ProcessingJob, SheetId, UploadId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("processing job already exists for upload {0}")]
    DuplicateJob(UploadId),

    #[error("processing job not found for upload {0}")]
    JobNotFound(UploadId),

    #[error("plan sheet not found: {0}")]
    SheetNotFound(SheetId),
}

/// Coordinator durable row: the actor state plus the pending alarm time.
///
/// `wake_at` (epoch ms) doubles as the restart-scan column: rehydration
/// re-arms alarms from it, so a deadline survives a daemon crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorRow {
    pub state: CoordinatorState,
    pub wake_at: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    jobs: BTreeMap<String, ProcessingJob>,
    sheets: BTreeMap<String, PlanSheet>,
    coordinators: BTreeMap<String, CoordinatorRow>,
}

/// Durable store for all pipeline coordination data.
pub struct Store {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

const JOBS_FILE: &str = "processing_jobs.json";
const SHEETS_FILE: &str = "plan_sheets.json";
const COORDINATORS_FILE: &str = "coordinators.json";

impl Store {
    /// Open (or create) the store under `dir`, loading any existing tables.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir.clone(), source })?;

        let tables = Tables {
            jobs: load_table(&dir.join(JOBS_FILE))?,
            sheets: load_table(&dir.join(SHEETS_FILE))?,
            coordinators: load_table(&dir.join(COORDINATORS_FILE))?,
        };
        if !tables.jobs.is_empty() || !tables.coordinators.is_empty() {
            info!(
                jobs = tables.jobs.len(),
                sheets = tables.sheets.len(),
                coordinators = tables.coordinators.len(),
                "loaded store tables"
            );
        }
        Ok(Self { dir, tables: Mutex::new(tables) })
    }

    // === processing_jobs ===

    /// Insert the job row for a new upload. Rejects duplicates so a client
    /// retrying intake with a consumed upload id gets a conflict.
    pub fn create_job(&self, job: ProcessingJob) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if tables.jobs.contains_key(job.upload_id.as_str()) {
            return Err(StoreError::DuplicateJob(job.upload_id));
        }
        tables.jobs.insert(job.upload_id.to_string(), job);
        self.persist(&tables.jobs, JOBS_FILE)
    }

    pub fn get_job(&self, upload_id: &UploadId) -> Option<ProcessingJob> {
        self.tables.lock().jobs.get(upload_id.as_str()).cloned()
    }

    /// Apply a mutation to the job row and persist it.
    pub fn update_job(
        &self,
        upload_id: &UploadId,
        f: impl FnOnce(&mut ProcessingJob),
    ) -> Result<ProcessingJob, StoreError> {
        let mut tables = self.tables.lock();
        let job = tables
            .jobs
            .get_mut(upload_id.as_str())
            .ok_or_else(|| StoreError::JobNotFound(upload_id.clone()))?;
        f(job);
        let updated = job.clone();
        self.persist(&tables.jobs, JOBS_FILE)?;
        Ok(updated)
    }

    // === plan_sheets ===

    /// Insert placeholder rows for every page of an upload.
    pub fn insert_sheets(&self, sheets: Vec<PlanSheet>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        for sheet in sheets {
            tables.sheets.insert(sheet.id.to_string(), sheet);
        }
        self.persist(&tables.sheets, SHEETS_FILE)
    }

    /// Write one sheet row in place (last write wins).
    pub fn upsert_sheet(&self, sheet: PlanSheet) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.sheets.insert(sheet.id.to_string(), sheet);
        self.persist(&tables.sheets, SHEETS_FILE)
    }

    pub fn get_sheet(&self, id: &SheetId) -> Option<PlanSheet> {
        self.tables.lock().sheets.get(id.as_str()).cloned()
    }

    /// Look up one sheet by upload and 1-based page index.
    pub fn sheet_by_number(&self, upload_id: &UploadId, sheet_number: u32) -> Option<PlanSheet> {
        self.tables
            .lock()
            .sheets
            .values()
            .find(|s| s.upload_id == *upload_id && s.sheet_number == sheet_number)
            .cloned()
    }

    /// All sheets of an upload, ascending by sheet number.
    pub fn sheets_for_upload(&self, upload_id: &UploadId) -> Vec<PlanSheet> {
        let mut sheets: Vec<PlanSheet> = self
            .tables
            .lock()
            .sheets
            .values()
            .filter(|s| s.upload_id == *upload_id)
            .cloned()
            .collect();
        sheets.sort_by_key(|s| s.sheet_number);
        sheets
    }

    /// Sheets of an upload whose metadata extraction succeeded, ascending by
    /// sheet number. This is the marker fan-out source query.
    pub fn extracted_sheets(&self, upload_id: &UploadId) -> Vec<PlanSheet> {
        let mut sheets: Vec<PlanSheet> = self
            .tables
            .lock()
            .sheets
            .values()
            .filter(|s| {
                s.upload_id == *upload_id
                    && s.metadata_status == plr_core::MetadataStatus::Extracted
            })
            .cloned()
            .collect();
        sheets.sort_by_key(|s| s.sheet_number);
        sheets
    }

    // === coordinator rows ===

    /// Persist a coordinator row (actor state + pending alarm).
    pub fn save_coordinator(&self, row: CoordinatorRow) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.coordinators.insert(row.state.upload_id.to_string(), row);
        self.persist(&tables.coordinators, COORDINATORS_FILE)
    }

    pub fn load_coordinator(&self, upload_id: &UploadId) -> Option<CoordinatorRow> {
        self.tables.lock().coordinators.get(upload_id.as_str()).cloned()
    }

    /// Rows whose pipeline has not reached a terminal status. The startup
    /// scan respawns an actor (and re-arms the alarm) for each.
    pub fn scan_incomplete(&self) -> Vec<CoordinatorRow> {
        self.tables
            .lock()
            .coordinators
            .values()
            .filter(|row| !row.state.status.is_terminal())
            .cloned()
            .collect()
    }

    fn persist<T: Serialize>(&self, table: &T, file: &str) -> Result<(), StoreError> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        let bytes = serde_json::to_vec_pretty(table)?;
        std::fs::write(&tmp, bytes)
            .map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })?;
        Ok(())
    }
}

fn load_table<T: for<'de> Deserialize<'de>>(
    path: &Path,
) -> Result<BTreeMap<String, T>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
