use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::error::AppResult;
use crate::pipeline::orchestrator::{Module, ModuleContext};

const CLEANUP_EXTENSIONS: [&str; 5] = ["json", "html", "svg", "png", "csv"];

/// Moves the previous run's artifacts into `backups/backup_<timestamp>/`.
pub struct Cleanup {
    config: Arc<Config>,
}

impl Cleanup {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn preserved(&self) -> HashSet<PathBuf> {
        [
            &self.config.client_config_file,
            &self.config.recipients_file,
            &self.config.pipeline_config_file,
        ]
        .into_iter()
        .map(|p| std::fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect()
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| CLEANUP_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// `name`, `name_1`, `name_2`, ... whichever does not exist yet.
async fn free_destination(dir: &Path, file_name: &str) -> AppResult<PathBuf> {
    let candidate = dir.join(file_name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }
    let path = Path::new(file_name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
    let ext = path.extension().and_then(|e| e.to_str());
    let mut counter = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = dir.join(name);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Moves artifact files found directly in `dirs` into `backup_dir`. Missing
/// source directories are created.
pub async fn backup_artifacts(
    dirs: &[&Path],
    backup_dir: &Path,
    preserved: &HashSet<PathBuf>,
) -> AppResult<usize> {
    let mut moved = 0;
    for dir in dirs {
        if !tokio::fs::try_exists(dir).await? {
            tokio::fs::create_dir_all(dir).await?;
            continue;
        }
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !is_artifact(&path) {
                continue;
            }
            let canonical = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if preserved.contains(&canonical) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if moved == 0 {
                tokio::fs::create_dir_all(backup_dir).await?;
            }
            let destination = free_destination(backup_dir, file_name).await?;
            tokio::fs::rename(&path, &destination).await?;
            moved += 1;
        }
    }
    Ok(moved)
}

#[async_trait::async_trait]
impl Module for Cleanup {
    fn name(&self) -> &str {
        "cleanup"
    }

    #[tracing::instrument(name = "module cleanup", skip_all, fields(cleanup.moved))]
    async fn run(&self, _ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let backup_dir = self
            .config
            .backup_dir
            .join(format!("backup_{}", Utc::now().format("%Y%m%d_%H%M%S")));
        let dirs = [
            self.config.data_dir.as_path(),
            self.config.reports_dir.as_path(),
            self.config.graphs_dir.as_path(),
        ];
        let moved = backup_artifacts(&dirs, &backup_dir, &self.preserved()).await?;
        tracing::Span::current().record("cleanup.moved", moved);

        Ok(if moved == 0 {
            "nothing to back up".to_string()
        } else {
            format!("moved {moved} files to {}", backup_dir.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_moves_artifacts_and_keeps_others() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        let reports = root.path().join("reports");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("run_state.json"), "{}").unwrap();
        std::fs::write(data.join("notes.txt"), "keep").unwrap();
        std::fs::write(data.join("clients.json"), "keep").unwrap();

        let backup = root.path().join("backups").join("backup_1");
        let preserved = HashSet::from([std::fs::canonicalize(data.join("clients.json")).unwrap()]);
        let moved = backup_artifacts(&[data.as_path(), reports.as_path()], &backup, &preserved)
            .await
            .unwrap();

        assert_eq!(moved, 1);
        assert!(backup.join("run_state.json").exists());
        assert!(data.join("notes.txt").exists());
        assert!(data.join("clients.json").exists());
        assert!(reports.is_dir());
    }

    #[tokio::test]
    async fn test_name_collisions_get_suffix() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(a.join("chart.svg"), "1").unwrap();
        std::fs::write(b.join("chart.svg"), "2").unwrap();

        let backup = root.path().join("backup");
        let moved = backup_artifacts(&[a.as_path(), b.as_path()], &backup, &HashSet::new())
            .await
            .unwrap();

        assert_eq!(moved, 2);
        assert!(backup.join("chart.svg").exists());
        assert!(backup.join("chart_1.svg").exists());
    }

    #[tokio::test]
    async fn test_empty_dirs_create_no_backup() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        let backup = root.path().join("backup");
        let moved = backup_artifacts(&[data.as_path()], &backup, &HashSet::new())
            .await
            .unwrap();
        assert_eq!(moved, 0);
        assert!(!backup.exists());
        assert!(data.is_dir());
    }
}
