//! Loading `.method` files
//!
//! A method file is the method body, optionally preceded by a header
//! comment naming it:
//!
//! ```text
//! # calc 1.2.0
//! memory.r := message.a + message.b
//! send(message.sender, memory.r)
//! ```
//!
//! Without a header the file stem is the name and the version is 1.0.0.
//! The header line is an ordinary comment to the compiler, so the source
//! can be registered verbatim.

use agerun_runtime::Version;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct MethodFile {
    pub name: String,
    pub version: Version,
    pub source: String,
}

#[derive(Debug)]
pub enum MethodFileError {
    Io(PathBuf, std::io::Error),
    BadHeader(PathBuf, String),
}

impl fmt::Display for MethodFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFileError::Io(path, e) => {
                write!(f, "could not read {}: {}", path.display(), e)
            }
            MethodFileError::BadHeader(path, line) => {
                write!(f, "bad method header in {}: '{}'", path.display(), line)
            }
        }
    }
}

impl std::error::Error for MethodFileError {}

/// Read one `.method` file.
pub fn load_method_file(path: &Path) -> Result<MethodFile, MethodFileError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| MethodFileError::Io(path.to_path_buf(), e))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (name, version) = match parse_header(&source) {
        Some(Ok(parsed)) => parsed,
        Some(Err(line)) => return Err(MethodFileError::BadHeader(path.to_path_buf(), line)),
        None => (stem, Version::new(1, 0, 0)),
    };
    Ok(MethodFile {
        name,
        version,
        source,
    })
}

/// `# <name> <version>` on the first non-empty line, if it looks like a
/// header at all.
fn parse_header(source: &str) -> Option<Result<(String, Version), String>> {
    let line = source.lines().find(|l| !l.trim().is_empty())?;
    let trimmed = line.trim();
    let body = trimmed.strip_prefix('#')?.trim();
    let mut fields = body.split_whitespace();
    let name = fields.next()?;
    let version_text = fields.next()?;
    if fields.next().is_some() {
        // More than two fields is an ordinary comment, not a header.
        return None;
    }
    match version_text.parse::<Version>() {
        Ok(version) => Some(Ok((name.to_string(), version))),
        Err(_) => Some(Err(trimmed.to_string())),
    }
}

/// All `.method` files in a directory, sorted by file name so install
/// order is deterministic.
pub fn load_methods_dir(dir: &Path) -> Result<Vec<MethodFile>, MethodFileError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| MethodFileError::Io(dir.to_path_buf(), e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "method"))
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(load_method_file(&path)?);
    }
    Ok(files)
}
