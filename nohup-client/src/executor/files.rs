//! `read_file` and `edit_file`

use std::path::PathBuf;

use nohup_protocol::EditFileArgs;
use nohup_utils::{resolve_path, NohupError, Result};

use super::{truncate_chars, ActionResult, ExecutorConfig};

fn resolve(config: &ExecutorConfig, file_path: &str) -> PathBuf {
    resolve_path(file_path, &config.working_dir)
}

pub(super) async fn read(config: &ExecutorConfig, file_path: &str) -> Result<ActionResult> {
    let path = resolve(config, file_path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| NohupError::FileRead {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Read file");
    Ok(ActionResult::Success(truncate_chars(
        &content,
        config.file_read_limit,
    )))
}

/// Replace the first occurrence of the target string
///
/// The file is only written when the substitution changed something.
pub(super) async fn edit(config: &ExecutorConfig, args: &EditFileArgs) -> Result<ActionResult> {
    let path = resolve(config, &args.file_path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| NohupError::FileRead {
            path: path.clone(),
            source,
        })?;

    let updated = content.replacen(&args.string_to_replace, &args.new_string, 1);
    if updated == content {
        return Err(NohupError::ReplaceTargetNotFound { path });
    }

    tokio::fs::write(&path, updated)
        .await
        .map_err(|source| NohupError::FileWrite {
            path: path.clone(),
            source,
        })?;
    tracing::info!(path = %path.display(), "Edited file");
    Ok(ActionResult::Success(format!(
        "Successfully edited {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> ExecutorConfig {
        ExecutorConfig {
            working_dir: dir.to_path_buf(),
            ..ExecutorConfig::default()
        }
    }

    fn edit_args(path: &str, target: &str, replacement: &str) -> EditFileArgs {
        EditFileArgs {
            file_path: path.into(),
            string_to_replace: target.into(),
            new_string: replacement.into(),
        }
    }

    // ==================== Read Tests ====================

    #[tokio::test]
    async fn test_read_relative_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let result = read(&config_in(dir.path()), "a.txt").await.unwrap();
        assert_eq!(result, ActionResult::Success("alpha".into()));
    }

    #[tokio::test]
    async fn test_read_absolute_path() {
        let dir = tempdir().unwrap();
        let other = tempdir().unwrap();
        let file = other.path().join("b.txt");
        std::fs::write(&file, "beta").unwrap();
        let result = read(&config_in(dir.path()), file.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(result.content(), "beta");
    }

    #[tokio::test]
    async fn test_read_truncates() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "z".repeat(5000)).unwrap();
        let result = read(&config_in(dir.path()), "big.txt").await.unwrap();
        assert!(result.content().ends_with(super::super::TRUNCATION_MARKER));
        assert!(result.content().starts_with(&"z".repeat(2000)));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = read(&config_in(dir.path()), "missing.txt").await.unwrap_err();
        assert!(matches!(err, NohupError::FileRead { .. }));
    }

    // ==================== Edit Tests ====================

    #[tokio::test]
    async fn test_edit_replaces_first_occurrence_only() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("c.txt");
        std::fs::write(&file, "one two one").unwrap();

        let result = edit(&config_in(dir.path()), &edit_args("c.txt", "one", "three"))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "three two one");
    }

    #[tokio::test]
    async fn test_edit_target_missing_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("d.txt");
        std::fs::write(&file, "unchanged").unwrap();
        let before = std::fs::metadata(&file).unwrap().modified().unwrap();

        let err = edit(&config_in(dir.path()), &edit_args("d.txt", "absent", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, NohupError::ReplaceTargetNotFound { .. }));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "unchanged");
        assert_eq!(std::fs::metadata(&file).unwrap().modified().unwrap(), before);
    }

    #[tokio::test]
    async fn test_edit_missing_file() {
        let dir = tempdir().unwrap();
        let err = edit(&config_in(dir.path()), &edit_args("nope.txt", "a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, NohupError::FileRead { .. }));
        assert!(!dir.path().join("nope.txt").exists());
    }
}
