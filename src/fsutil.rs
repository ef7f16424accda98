//! File-tree helpers shared by the bundle builder and the client.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use walkdir::WalkDir;

/// Recursive copy, like `cp -R`. Symlinks are recreated, not followed.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_dir() {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)?;
        return Ok(());
    }

    fs::create_dir_all(to)?;
    for entry in WalkDir::new(from)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target)?;
            }
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// `rm -rf`: removing something that is not there is fine.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Modification time, or the epoch for files that do not exist.
pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree_replicates_layout() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("Contents/Resources")).unwrap();
        fs::write(src.path().join("Contents/Info.plist"), "plist").unwrap();
        fs::write(src.path().join("Contents/Resources/a.nib"), "nib").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("Copy.bundle");
        copy_tree(src.path(), &target).unwrap();

        assert_eq!(fs::read_to_string(target.join("Contents/Info.plist")).unwrap(), "plist");
        assert!(target.join("Contents/Resources/a.nib").is_file());
    }

    #[test]
    fn test_remove_tree_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_tree(&dir.path().join("absent")).unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        remove_tree(&dir.path().join("x")).unwrap();
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn test_mtime_of_missing_file_is_epoch() {
        assert_eq!(mtime(Path::new("/nonexistent/file")), SystemTime::UNIX_EPOCH);
    }
}
