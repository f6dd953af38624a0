//! Run configuration: what the recorder needs to know about a run, where it
//! writes, and whether it forwards summaries upstream.

use crate::error::{RecorderError, RecorderResult};
use crate::model::{BuildInfo, JobInfo, PipelineInfo, RunId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SUMMARY_FILENAME: &str = "testrun_summary.json";
pub const RESULTS_FILENAME: &str = "testrun_results.jsos";

/// Upstream collector that receives periodic summary snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForwardingInfo {
    /// Seconds between forwards.
    pub interval_secs: f64,
    pub url: String,
    /// Extra headers, merged over `Content-Type: application/json`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ForwardingInfo {
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            interval_secs: interval.as_secs_f64(),
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn interval(&self) -> RecorderResult<Duration> {
        match Duration::try_from_secs_f64(self.interval_secs) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(RecorderError::config(format!(
                "forwarding interval must be a positive number of seconds, got {}",
                self.interval_secs
            ))),
        }
    }
}

/// Directory catalog settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    pub enabled: bool,
    /// Directory names left out of a parent's `folders` list.
    pub dont_catalog: Vec<String>,
    /// Directory names that are not walked into.
    pub dont_descend: Vec<String>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            dont_catalog: vec!["__pycache__".to_string()],
            dont_descend: vec!["diagnostics".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcentratorConfig {
    pub bind: SocketAddr,
    /// Upper bound on postbacks handled at once. Unbounded when unset.
    pub max_concurrent_postbacks: Option<usize>,
}

impl Default for ConcentratorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_concurrent_postbacks: None,
        }
    }
}

/// Output locations for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderInfo {
    pub title: String,
    pub summary_filename: PathBuf,
    pub result_filename: PathBuf,
}

impl RenderInfo {
    pub fn in_dir(title: impl Into<String>, output_dir: &Path) -> Self {
        Self {
            title: title.into(),
            summary_filename: output_dir.join(SUMMARY_FILENAME),
            result_filename: output_dir.join(RESULTS_FILENAME),
        }
    }

    /// Directory holding the summary file, which is also the catalog root.
    pub fn output_dir(&self) -> &Path {
        self.summary_filename.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Everything needed to open a recorder for one run.
///
/// `build`, `pipeline`, and `job` are required: the summary layout is fixed
/// and a recorder is never opened with placeholder values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub title: String,
    #[serde(default)]
    pub runid: Option<RunId>,
    /// Automation pod the run executes on.
    #[serde(default)]
    pub apod: Option<String>,
    pub output_dir: PathBuf,
    pub build: BuildInfo,
    pub pipeline: PipelineInfo,
    pub job: JobInfo,
    #[serde(default)]
    pub forwarding: Option<ForwardingInfo>,
    #[serde(default)]
    pub catalog: CatalogOptions,
    #[serde(default)]
    pub concentrator: ConcentratorConfig,
}

impl RunConfig {
    pub fn render_info(&self) -> RenderInfo {
        RenderInfo::in_dir(self.title.clone(), &self.output_dir)
    }

    pub fn validate(&self) -> RecorderResult<()> {
        if self.title.trim().is_empty() {
            return Err(RecorderError::config("title must not be empty"));
        }
        if let Some(forwarding) = self.forwarding.as_ref() {
            if forwarding.url.trim().is_empty() {
                return Err(RecorderError::config("forwarding url must not be empty"));
            }
            forwarding.interval()?;
        }
        if self.concentrator.max_concurrent_postbacks == Some(0) {
            return Err(RecorderError::config(
                "max_concurrent_postbacks must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Load a run configuration from YAML (`.yaml`/`.yml`) or JSON.
pub fn load_run_config(path: &Path) -> RecorderResult<RunConfig> {
    let data = fs::read_to_string(path)
        .map_err(|err| RecorderError::io(format!("failed to read {}", path.display()), err))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    let config: RunConfig = if is_yaml {
        serde_yml::from_str(&data)
            .map_err(|err| RecorderError::config(format!("failed to parse yaml: {err}")))?
    } else {
        serde_json::from_str(&data)
            .map_err(|err| RecorderError::config(format!("failed to parse json: {err}")))?
    };
    config.validate()?;
    Ok(config)
}
