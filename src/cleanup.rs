use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Remove `path` after `delay` on a background task.
///
/// The file is left alone for at least `delay`. Removal is best-effort: a
/// missing file or a failed delete is logged, never returned. Must be called
/// from inside a tokio runtime.
pub fn schedule_removal(path: PathBuf, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(path = %path.display(), ?delay, "removed generated file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove generated file"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_survives_until_delay_then_goes() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, b"data")?;

        let handle = schedule_removal(path.clone(), Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(path.exists());

        handle.await?;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() -> Result<()> {
        let dir = tempdir()?;
        let handle = schedule_removal(dir.path().join("gone.xlsx"), Duration::from_millis(1));
        handle.await?;
        Ok(())
    }
}
