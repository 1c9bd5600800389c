// crates/core/src/sidecar.rs
//! Reader for the `_bot_job<ID>.{metadata,result,test}` files in a job's
//! working directory.
//!
//! The files use a small INI dialect:
//! - `[SECTION]` headers, section names case-sensitive
//! - `key = value` or `key: value`, keys case-insensitive
//! - full-line comments starting with `#` or `;`
//! - a line indented deeper than its key continues that key's value (joined with `\n`)
//!
//! A missing file, or a file without the record's section, reads as `None`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jobbot_types::{ArchInfo, JobId, JobMetadata, JobResult, JobTest, PrInfo, SidecarKind};

use crate::error::SidecarError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSyntaxError {
    pub line: usize,
    pub message: String,
}

/// Parsed INI text. Repeated sections merge; a repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: HashMap<String, HashMap<String, String>>,
}

struct OpenKey {
    section: String,
    key: String,
    indent: usize,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, IniSyntaxError> {
        let mut doc = Self::default();
        let mut section: Option<String> = None;
        let mut open: Option<OpenKey> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indent = raw.len() - raw.trim_start().len();

            if let Some(current) = &open {
                if indent > current.indent {
                    if let Some(value) = doc
                        .sections
                        .get_mut(&current.section)
                        .and_then(|s| s.get_mut(&current.key))
                    {
                        value.push('\n');
                        value.push_str(trimmed);
                    }
                    continue;
                }
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.trim().to_string();
                doc.sections.entry(name.clone()).or_default();
                section = Some(name);
                open = None;
                continue;
            }

            let Some(current_section) = section.clone() else {
                return Err(IniSyntaxError {
                    line: line_no,
                    message: "key outside of any section".into(),
                });
            };
            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(IniSyntaxError {
                    line: line_no,
                    message: format!("expected `key = value`, got {trimmed:?}"),
                });
            };
            let key = trimmed[..split].trim().to_lowercase();
            if key.is_empty() {
                return Err(IniSyntaxError {
                    line: line_no,
                    message: "empty key".into(),
                });
            }
            let value = trimmed[split + 1..].trim().to_string();
            doc.sections
                .entry(current_section.clone())
                .or_default()
                .insert(key.clone(), value);
            open = Some(OpenKey {
                section: current_section,
                key,
                indent,
            });
        }
        Ok(doc)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(&key.to_lowercase())
            .map(String::as_str)
    }
}

/// Path of a sidecar file inside `dir`.
pub fn sidecar_path(dir: &Path, id: &JobId, kind: SidecarKind) -> PathBuf {
    dir.join(kind.file_name(id))
}

fn load(dir: &Path, id: &JobId, kind: SidecarKind) -> Result<Option<(PathBuf, IniDocument)>, SidecarError> {
    let path = sidecar_path(dir, id, kind);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SidecarError::io(&path, e)),
    };
    let doc = IniDocument::parse(&text).map_err(|e| SidecarError::Malformed {
        path: path.clone(),
        line: e.line,
        message: e.message,
    })?;
    if !doc.has_section(kind.section()) {
        return Ok(None);
    }
    Ok(Some((path, doc)))
}

fn optional(doc: &IniDocument, section: &str, key: &str) -> Option<String> {
    doc.get(section, key)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required<'a>(
    doc: &'a IniDocument,
    path: &Path,
    section: &str,
    key: &str,
) -> Result<&'a str, SidecarError> {
    doc.get(section, key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SidecarError::MissingKey {
            path: path.to_path_buf(),
            section: section.into(),
            key: key.into(),
        })
}

fn invalid(path: &Path, section: &str, key: &str, value: &str) -> SidecarError {
    SidecarError::InvalidValue {
        path: path.to_path_buf(),
        section: section.into(),
        key: key.into(),
        value: value.into(),
    }
}

/// Read `_bot_job<ID>.metadata`. `None` means the job is not ours.
pub fn read_metadata(dir: &Path, id: &JobId) -> Result<Option<JobMetadata>, SidecarError> {
    let Some((path, doc)) = load(dir, id, SidecarKind::Metadata)? else {
        return Ok(None);
    };

    let repo = required(&doc, &path, "PR", "repo")?.to_string();
    let raw_number = required(&doc, &path, "PR", "pr_number")?;
    let pr_number = raw_number
        .parse::<u64>()
        .map_err(|_| invalid(&path, "PR", "pr_number", raw_number))?;
    let pr_comment_id = match doc.get("PR", "pr_comment_id").map(str::trim) {
        None | Some("") | Some("-1") => None,
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| invalid(&path, "PR", "pr_comment_id", raw))?,
        ),
    };

    let arch = doc.has_section("ARCH").then(|| ArchInfo {
        architecture: optional(&doc, "ARCH", "architecture"),
        os: optional(&doc, "ARCH", "os"),
        slurm_opt: optional(&doc, "ARCH", "slurm_opt"),
    });

    Ok(Some(JobMetadata {
        pr: PrInfo {
            repo,
            pr_number,
            pr_comment_id,
        },
        arch,
    }))
}

/// Read `_bot_job<ID>.result`.
pub fn read_result(dir: &Path, id: &JobId) -> Result<Option<JobResult>, SidecarError> {
    let Some((_, doc)) = load(dir, id, SidecarKind::Result)? else {
        return Ok(None);
    };
    let artefacts = doc
        .get("RESULT", "artefacts")
        .map(|raw| {
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(Some(JobResult {
        comment_description: optional(&doc, "RESULT", "comment_description"),
        status: optional(&doc, "RESULT", "status"),
        artefacts,
    }))
}

/// Read `_bot_job<ID>.test`.
pub fn read_test(dir: &Path, id: &JobId) -> Result<Option<JobTest>, SidecarError> {
    let Some((_, doc)) = load(dir, id, SidecarKind::Test)? else {
        return Ok(None);
    };
    Ok(Some(JobTest {
        comment_description: optional(&doc, "TEST", "comment_description"),
        status: optional(&doc, "TEST", "status"),
    }))
}
