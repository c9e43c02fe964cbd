use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Prometheus recorder for a batch run; dumped to a textfile at exit
/// (node-exporter textfile collector style).
pub struct Metrics {
    pub handle: PrometheusHandle,
    path: PathBuf,
}

impl Metrics {
    /// Install the global recorder. Only one recorder may be installed per process.
    pub fn init(path: &Path) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write atomically: temp file in the same dir, then rename.
    pub fn write_textfile(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating metrics dir {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())
            .with_context(|| format!("writing metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming metrics file to {}", self.path.display()))?;
        Ok(())
    }
}
