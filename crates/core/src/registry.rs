// crates/core/src/registry.rs
//
// Restart-safe record of bot-owned jobs. The filesystem implementation keeps
// one symlink per job id under `<root>/submitted` or `<root>/finished`, each
// pointing at the job's working directory. The link's existence is the fact.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jobbot_types::JobId;
use tracing::{debug, info};

use crate::error::RegistryError;

pub const SUBMITTED_DIR: &str = "submitted";
pub const FINISHED_DIR: &str = "finished";

pub trait JobRegistry {
    /// Ids currently in the submitted bucket.
    fn known(&self) -> Result<BTreeSet<JobId>, RegistryError>;

    /// Record a new job. Fails if the id is already present in either bucket.
    fn register(&self, id: &JobId, work_dir: &Path) -> Result<(), RegistryError>;

    /// Path through which a submitted job's working directory is reached.
    fn work_dir(&self, id: &JobId) -> Result<PathBuf, RegistryError>;

    /// Move a job from submitted to finished in one step. Returns the path
    /// through which the job's working directory is reached afterwards.
    fn finish(&self, id: &JobId) -> Result<PathBuf, RegistryError>;
}

#[derive(Debug, Clone)]
pub struct SymlinkRegistry {
    root: PathBuf,
}

impl SymlinkRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn submitted_dir(&self) -> PathBuf {
        self.root.join(SUBMITTED_DIR)
    }

    pub fn finished_dir(&self) -> PathBuf {
        self.root.join(FINISHED_DIR)
    }

    /// Ids in the finished bucket. Same filtering as `known`.
    pub fn finished(&self) -> Result<BTreeSet<JobId>, RegistryError> {
        scan_bucket(&self.finished_dir())
    }

    fn check_id(id: &JobId) -> Result<(), RegistryError> {
        if id.is_numeric() {
            Ok(())
        } else {
            Err(RegistryError::InvalidId { id: id.clone() })
        }
    }
}

impl JobRegistry for SymlinkRegistry {
    fn known(&self) -> Result<BTreeSet<JobId>, RegistryError> {
        scan_bucket(&self.submitted_dir())
    }

    fn register(&self, id: &JobId, work_dir: &Path) -> Result<(), RegistryError> {
        Self::check_id(id)?;

        let finished = self.finished_dir().join(id.as_str());
        if entry_exists(&finished)? {
            return Err(RegistryError::AlreadyFinished {
                id: id.clone(),
                path: finished,
            });
        }

        let submitted_dir = self.submitted_dir();
        fs::create_dir_all(&submitted_dir).map_err(|e| RegistryError::io(&submitted_dir, e))?;

        let link = submitted_dir.join(id.as_str());
        make_symlink(work_dir, &link).map_err(|e| register_error(id, &link, e))?;

        info!(job_id = %id, link = %link.display(), target = %work_dir.display(), "registered job");
        Ok(())
    }

    fn work_dir(&self, id: &JobId) -> Result<PathBuf, RegistryError> {
        let link = self.submitted_dir().join(id.as_str());
        if entry_exists(&link)? {
            Ok(link)
        } else {
            Err(RegistryError::NotRegistered {
                id: id.clone(),
                path: link,
            })
        }
    }

    fn finish(&self, id: &JobId) -> Result<PathBuf, RegistryError> {
        let old = self.submitted_dir().join(id.as_str());
        if !entry_exists(&old)? {
            return Err(RegistryError::NotRegistered {
                id: id.clone(),
                path: old,
            });
        }

        let finished_dir = self.finished_dir();
        fs::create_dir_all(&finished_dir).map_err(|e| RegistryError::io(&finished_dir, e))?;

        let new = finished_dir.join(id.as_str());
        if entry_exists(&new)? {
            return Err(RegistryError::AlreadyFinished {
                id: id.clone(),
                path: new,
            });
        }

        // A rename of the link itself, never its target.
        fs::rename(&old, &new).map_err(|e| finish_error(id, &old, e))?;
        info!(job_id = %id, from = %old.display(), to = %new.display(), "moved job to finished");
        Ok(new)
    }
}

/// List numeric symlink entries of a bucket. A missing bucket is empty.
fn scan_bucket(dir: &Path) -> Result<BTreeSet<JobId>, RegistryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "registry bucket does not exist yet");
            return Ok(BTreeSet::new());
        }
        Err(e) => return Err(RegistryError::io(dir, e)),
    };

    let mut ids = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| RegistryError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            info!(dir = %dir.display(), "ignoring registry entry with non-UTF-8 name");
            continue;
        };
        let id = match JobId::new(name) {
            Ok(id) if id.is_numeric() => id,
            _ => {
                info!(entry = %name, dir = %dir.display(), "ignoring non-job entry in registry");
                continue;
            }
        };
        let path = entry.path();
        let file_type = fs::symlink_metadata(&path)
            .map_err(|e| RegistryError::io(&path, e))?
            .file_type();
        if !file_type.is_symlink() {
            info!(entry = %path.display(), "ignoring registry entry that is not a symlink");
            continue;
        }
        ids.insert(id);
    }
    Ok(ids)
}

/// Symlink creation inside an existing bucket. NotFound here is about the
/// link path, never a missing registry directory.
fn register_error(id: &JobId, link: &Path, e: io::Error) -> RegistryError {
    match e.kind() {
        io::ErrorKind::AlreadyExists => RegistryError::AlreadyRegistered {
            id: id.clone(),
            path: link.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => RegistryError::PermissionDenied {
            path: link.to_path_buf(),
        },
        _ => RegistryError::Io {
            path: link.to_path_buf(),
            source: e,
        },
    }
}

/// Rename of `submitted/<ID>`. NotFound means the link vanished after it was checked.
fn finish_error(id: &JobId, link: &Path, e: io::Error) -> RegistryError {
    match e.kind() {
        io::ErrorKind::NotFound => RegistryError::NotRegistered {
            id: id.clone(),
            path: link.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => RegistryError::PermissionDenied {
            path: link.to_path_buf(),
        },
        _ => RegistryError::Io {
            path: link.to_path_buf(),
            source: e,
        },
    }
}

/// True when a directory entry exists at `path`, without following symlinks.
fn entry_exists(path: &Path) -> Result<bool, RegistryError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(RegistryError::io(path, e)),
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn id(s: &str) -> JobId {
        JobId::new(s).unwrap()
    }

    fn setup() -> (TempDir, SymlinkRegistry, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let registry = SymlinkRegistry::new(tmp.path().join("job_ids"));
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        (tmp, registry, work)
    }

    #[test]
    fn test_known_on_missing_root_is_empty() {
        let (_tmp, registry, _work) = setup();
        assert!(registry.known().unwrap().is_empty());
    }

    #[test]
    fn test_register_creates_symlink_to_work_dir() {
        let (_tmp, registry, work) = setup();
        registry.register(&id("10"), &work).unwrap();

        let link = registry.submitted_dir().join("10");
        assert_eq!(fs::read_link(&link).unwrap(), work);
        assert_eq!(registry.known().unwrap(), BTreeSet::from([id("10")]));
        assert_eq!(registry.work_dir(&id("10")).unwrap(), link);
    }

    #[test]
    fn test_duplicate_register_fails_loudly() {
        let (_tmp, registry, work) = setup();
        registry.register(&id("10"), &work).unwrap();
        let err = registry.register(&id("10"), &work).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_register_rejects_non_numeric_id() {
        let (_tmp, registry, work) = setup();
        let err = registry.register(&id("10_1"), &work).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidId { .. }));
    }

    #[test]
    fn test_finish_moves_between_buckets() {
        let (_tmp, registry, work) = setup();
        registry.register(&id("10"), &work).unwrap();
        registry.register(&id("11"), &work).unwrap();

        let moved = registry.finish(&id("11")).unwrap();
        assert_eq!(moved, registry.finished_dir().join("11"));
        assert_eq!(fs::read_link(&moved).unwrap(), work);
        assert!(!registry.submitted_dir().join("11").exists());

        assert_eq!(registry.known().unwrap(), BTreeSet::from([id("10")]));
        assert_eq!(registry.finished().unwrap(), BTreeSet::from([id("11")]));
    }

    #[test]
    fn test_finish_twice_is_not_registered() {
        let (_tmp, registry, work) = setup();
        registry.register(&id("12"), &work).unwrap();
        registry.finish(&id("12")).unwrap();
        let err = registry.finish(&id("12")).unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered { .. }));
        assert!(!registry.known().unwrap().contains(&id("12")));
    }

    #[test]
    fn test_register_after_finish_is_rejected() {
        let (_tmp, registry, work) = setup();
        registry.register(&id("13"), &work).unwrap();
        registry.finish(&id("13")).unwrap();
        let err = registry.register(&id("13"), &work).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyFinished { .. }));
    }

    #[test]
    fn test_known_ignores_non_symlinks_and_non_numeric_names() {
        let (_tmp, registry, work) = setup();
        registry.register(&id("20"), &work).unwrap();
        let submitted = registry.submitted_dir();
        fs::write(submitted.join("21"), "plain file").unwrap();
        fs::create_dir(submitted.join("22")).unwrap();
        std::os::unix::fs::symlink(&work, submitted.join("notes")).unwrap();

        assert_eq!(registry.known().unwrap(), BTreeSet::from([id("20")]));
    }

    #[test]
    fn test_dangling_symlink_still_known() {
        let (tmp, registry, _work) = setup();
        registry
            .register(&id("30"), &tmp.path().join("gone"))
            .unwrap();
        assert!(registry.known().unwrap().contains(&id("30")));
        registry.finish(&id("30")).unwrap();
        assert!(registry.finished().unwrap().contains(&id("30")));
    }

    #[test]
    fn test_vanished_link_on_finish_is_not_registered() {
        let link = PathBuf::from("/reg/submitted/40");
        let err = finish_error(&id("40"), &link, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, RegistryError::NotRegistered { ref path, .. } if *path == link));
        assert!(!err.to_string().contains("directory not found"));
    }

    #[test]
    fn test_symlink_failure_is_not_dir_not_found() {
        let link = PathBuf::from("/reg/submitted/41");
        let err = register_error(&id("41"), &link, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, RegistryError::Io { ref path, .. } if *path == link));

        let err = register_error(&id("41"), &link, io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_read_only_bucket_rename_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, registry, work) = setup();
        registry.register(&id("42"), &work).unwrap();
        registry.finish(&id("42")).unwrap();
        registry.register(&id("43"), &work).unwrap();
        let finished = registry.finished_dir();
        fs::set_permissions(&finished, fs::Permissions::from_mode(0o555)).unwrap();

        let result = registry.finish(&id("43"));
        fs::set_permissions(&finished, fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores directory permissions; only check the mapping when denied.
        if let Err(err) = result {
            assert!(matches!(err, RegistryError::PermissionDenied { .. }), "{err:?}");
        }
    }
}
