//! Atomic Markdown persistence.
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! crash mid-write never leaves a truncated file at the final path. The
//! rename is atomic on POSIX filesystems (and effectively so on NTFS),
//! which is also what makes cancellation safe: an interrupted run leaves
//! either the complete previous file or the complete new one.

use crate::error::JobError;
use std::path::Path;
use tracing::debug;

/// Persist `content` to `path`, creating intermediate directories as needed.
pub async fn write_markdown(path: &Path, content: &str) -> Result<(), JobError> {
    let to_write_err = |e: std::io::Error| JobError::Write {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(to_write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, content).await.map_err(to_write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(to_write_err)?;

    debug!("wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_intermediate_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/c/page.md");

        write_markdown(&path, "# hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
    }

    #[tokio::test]
    async fn leaves_no_temp_file_behind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.md");

        write_markdown(&path, "content\n").await.unwrap();
        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["page.md"]);
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.md");

        write_markdown(&path, "old\n").await.unwrap();
        write_markdown(&path, "new\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[tokio::test]
    async fn unwritable_target_reports_write_error() {
        // A path whose parent is a regular file cannot be created.
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = write_markdown(&blocker.join("page.md"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Write { .. }));
    }
}
