//! Badge directory: read-once mapping from badge id to employee name
//!
//! Source format is the `matriculas.csv` reference list: a header line, then
//! `matricula;nome` rows. Loading never fails the process. A missing or
//! unusable file yields an empty, degraded directory that denies every
//! lookup, and the condition is logged for operators.

use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::models::Employee;
use crate::verify::validate_badge_id;
use crate::Result;

/// Outcome of the startup load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DirectoryStatus {
    Loaded { entries: usize, skipped: usize },
    Degraded { reason: String },
}

#[derive(Debug, Clone)]
pub struct Directory {
    entries: HashMap<String, Employee>,
    status: DirectoryStatus,
}

impl Directory {
    /// Load from a file; failures produce a degraded, empty directory
    pub fn load(path: &Path) -> Self {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                return Self::degraded(format!("cannot open {}: {}", path.display(), e));
            }
        };

        match Self::from_reader(file) {
            Ok(directory) => {
                if let DirectoryStatus::Loaded { entries, skipped } = &directory.status {
                    info!("Loaded {} badges from {}", entries, path.display());
                    if *skipped > 0 {
                        warn!("Skipped {} malformed rows in {}", skipped, path.display());
                    }
                }
                directory
            }
            Err(e) => Self::degraded(format!("cannot read {}: {}", path.display(), e)),
        }
    }

    /// Parse `matricula;nome` rows after a header line. The first row for a
    /// badge id wins; rows with a missing name or an id that verification
    /// would reject are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = HashMap::new();
        let mut skipped = 0usize;

        for result in csv_reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };

            match (record.get(0), record.get(1)) {
                (Some(badge_id), Some(name))
                    if !name.is_empty() && validate_badge_id(badge_id).is_ok() =>
                {
                    entries
                        .entry(badge_id.to_string())
                        .or_insert_with(|| Employee {
                            badge_id: badge_id.to_string(),
                            name: name.to_string(),
                        });
                }
                _ => skipped += 1,
            }
        }

        if entries.is_empty() && skipped > 0 {
            return Ok(Self::degraded(format!(
                "no usable rows ({} malformed)",
                skipped
            )));
        }

        let status = DirectoryStatus::Loaded {
            entries: entries.len(),
            skipped,
        };
        Ok(Self { entries, status })
    }

    /// Directory from in-memory entries; first occurrence of an id wins
    pub fn from_entries<I>(employees: I) -> Self
    where
        I: IntoIterator<Item = Employee>,
    {
        let mut entries = HashMap::new();
        for employee in employees {
            entries.entry(employee.badge_id.clone()).or_insert(employee);
        }
        let status = DirectoryStatus::Loaded {
            entries: entries.len(),
            skipped: 0,
        };
        Self { entries, status }
    }

    fn degraded(reason: String) -> Self {
        warn!("Badge directory degraded, all verifications will be denied: {}", reason);
        Self {
            entries: HashMap::new(),
            status: DirectoryStatus::Degraded { reason },
        }
    }

    pub fn lookup(&self, badge_id: &str) -> Option<&Employee> {
        self.entries.get(badge_id)
    }

    pub fn status(&self) -> &DirectoryStatus {
        &self.status
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, DirectoryStatus::Degraded { .. })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
