//! This module provides the `ProgramLoader` struct, responsible for loading
//! programs from files, strings, and directories.
//!
//! Loading runs the full pipeline: parse in the requested dialect, then
//! semantic analysis. The result always carries its diagnostics; callers
//! decide what to do with programs that are not runnable.

use crate::analyzer::analyze;
use crate::parser::{parse, Dialect};
use crate::types::{Program, SyntaxError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading program files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file error: {0}")]
    File(String),
}

/// Loads programs from disk and names tabular programs after their file.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Reads, parses, and analyzes a single program file.
    ///
    /// Tabular programs carry no name line; an unnamed program is named
    /// after the file stem. Syntax and semantic findings end up in the
    /// program's diagnostics; only I/O problems are hard errors.
    pub fn load_program(
        path: &Path,
        dialect: Dialect,
    ) -> Result<(Program, Vec<SyntaxError>), LoadError> {
        let content = fs::read_to_string(path).map_err(|e| {
            LoadError::File(format!("failed to read {}: {e}", path.display()))
        })?;
        let (mut program, syntax_errors) = parse(&content, dialect);
        if program.name.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                program.name = stem.to_string();
            }
        }
        analyze(&mut program);
        Ok((program, syntax_errors))
    }

    /// Parses and analyzes program text that did not come from a file.
    pub fn load_program_from_string(
        content: &str,
        dialect: Dialect,
    ) -> (Program, Vec<SyntaxError>) {
        let (mut program, syntax_errors) = parse(content, dialect);
        analyze(&mut program);
        (program, syntax_errors)
    }

    /// Loads every `.txt` program file in a directory with the given
    /// dialect. Directories and other files are skipped.
    pub fn load_programs(
        directory: &Path,
        dialect: Dialect,
    ) -> Vec<Result<(PathBuf, Program), LoadError>> {
        if !directory.exists() {
            return vec![Err(LoadError::File(format!(
                "directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(LoadError::File(format!(
                    "failed to read directory {}: {e}",
                    directory.display()
                )))]
            }
        };

        entries
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        return Some(Err(LoadError::File(format!(
                            "failed to read directory entry: {e}"
                        ))))
                    }
                };

                let path = entry.path();
                if path.is_dir() || path.extension().is_none_or(|ext| ext != "txt") {
                    return None;
                }

                match Self::load_program(&path, dialect) {
                    Ok((program, _)) => Some(Ok((path, program))),
                    Err(e) => Some(Err(e)),
                }
            })
            .collect()
    }
}
