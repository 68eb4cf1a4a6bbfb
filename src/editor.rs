use std::io::Write;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no editor configured")]
    Missing,
    #[error("couldn't run editor: {0}")]
    Io(#[from] std::io::Error),
    #[error("editor exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Opens `editor` on a scratch file holding `initial` and returns what
/// the user saved. `editor` may carry arguments, e.g. `code --wait`.
pub async fn open_task_editor(editor: &str, initial: &str) -> Result<String, EditorError> {
    let mut parts = editor.split_whitespace();
    let program = parts.next().ok_or(EditorError::Missing)?;

    let mut file = tempfile::Builder::new()
        .prefix("taskboard-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .await?;
    if !status.success() {
        return Err(EditorError::Failed(status));
    }

    Ok(tokio::fs::read_to_string(file.path()).await?)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unchanged_text_round_trips() {
        let text = open_task_editor("true", "Buy milk").await.unwrap();
        assert_eq!(text, "Buy milk");
    }

    #[tokio::test]
    async fn test_editor_output_is_read_back() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-editor");
        std::fs::write(&script, "#!/bin/sh\nprintf 'Call the plumber' > \"$1\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let text = open_task_editor(script.to_str().unwrap(), "old").await.unwrap();
        assert_eq!(text, "Call the plumber");
    }

    #[tokio::test]
    async fn test_failing_editor() {
        let err = open_task_editor("false", "Buy milk").await.unwrap_err();
        assert!(matches!(err, EditorError::Failed(_)));
    }

    #[tokio::test]
    async fn test_blank_editor() {
        let err = open_task_editor("   ", "Buy milk").await.unwrap_err();
        assert!(matches!(err, EditorError::Missing));
    }
}
