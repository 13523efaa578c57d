//! Ordered reassembly of fetched units.
//!
//! The output is written to a temporary file next to the destination and
//! persisted into place only once every byte is written, so a failed run
//! never leaves a truncated artifact at the output path.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::coordinator::FetchReport;

/// Errors that can occur during reassembly.
#[derive(Debug, Error)]
pub enum ReassemblyError {
    /// Segment indices are not exactly `1..=n`.
    #[error("segment sequence has a gap: expected segment {expected}, found {found:?}")]
    Gap { expected: u32, found: Option<u32> },

    /// The fetch did not complete, so there is nothing to assemble.
    #[error("not every unit was fetched")]
    Incomplete,

    /// An input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The output could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The assembled output was empty.
    #[error("assembled output {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Inputs for one reassembly: the init block and segments by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyPlan {
    init: PathBuf,
    segments: BTreeMap<u32, PathBuf>,
}

impl AssemblyPlan {
    /// Build a plan, checking that segment indices run from 1 without gaps.
    pub fn new(
        init: impl Into<PathBuf>,
        segments: BTreeMap<u32, PathBuf>,
    ) -> Result<Self, ReassemblyError> {
        for (expected, found) in (1u32..).zip(segments.keys().copied()) {
            if expected != found {
                return Err(ReassemblyError::Gap {
                    expected,
                    found: Some(found),
                });
            }
        }

        Ok(Self {
            init: init.into(),
            segments,
        })
    }

    /// Build a plan from a coordinator report.
    ///
    /// Fails unless the init block and every segment were fetched.
    pub fn from_report(report: &FetchReport) -> Result<Self, ReassemblyError> {
        let segments = report
            .completed_segments()
            .ok_or(ReassemblyError::Incomplete)?;
        Self::new(report.init_path(), segments)
    }

    /// Number of numbered segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Input files in output order.
    pub fn inputs(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.init.as_path()).chain(self.segments.values().map(PathBuf::as_path))
    }
}

/// Concatenates an [`AssemblyPlan`] into one output file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reassembler;

impl Reassembler {
    pub fn new() -> Self {
        Self
    }

    /// Write the init block then every segment by ascending index to `output`.
    ///
    /// # Returns
    ///
    /// The size of the assembled file in bytes.
    pub fn assemble(&self, plan: &AssemblyPlan, output: &Path) -> Result<u64, ReassemblyError> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| ReassemblyError::Write {
            path: parent.clone(),
            source: e,
        })?;

        let staged = NamedTempFile::new_in(&parent).map_err(|e| ReassemblyError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(staged.as_file());
        let mut total = 0u64;

        for input in plan.inputs() {
            let file = File::open(input).map_err(|e| ReassemblyError::Read {
                path: input.to_path_buf(),
                source: e,
            })?;
            total += io::copy(&mut BufReader::new(file), &mut writer).map_err(|e| {
                ReassemblyError::Write {
                    path: output.to_path_buf(),
                    source: e,
                }
            })?;
        }

        writer.flush().map_err(|e| ReassemblyError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;
        drop(writer);

        if total == 0 {
            return Err(ReassemblyError::Empty {
                path: output.to_path_buf(),
            });
        }

        staged.persist(output).map_err(|e| ReassemblyError::Write {
            path: output.to_path_buf(),
            source: e.error,
        })?;

        debug!(segments = plan.segment_count(), bytes = total, "Concatenated units");
        info!(path = %output.display(), bytes = total, "Assembled output");
        Ok(total)
    }
}
