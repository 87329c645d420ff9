//! Harness configuration
//!
//! Loaded from an optional YAML file; the binary overlays command-line
//! arguments on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::ui::{Browser, UiSelectors};
use crate::driver::{ApiConfig, Surface, UiConfig};
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the book service
    pub service_url: String,

    /// Base URL of the web application
    pub app_url: String,

    /// Directory of YAML modules; the built-in modules are used when unset
    pub suites_dir: Option<PathBuf>,

    /// Run only modules carrying this tag
    pub tag: Option<String>,

    /// Run only the module with this name
    pub module: Option<String>,

    /// Surfaces to run; empty means all
    pub surfaces: Vec<Surface>,

    pub output_dir: PathBuf,
    pub max_parallel_modules: usize,

    /// Wait this long for the service (and app) to answer before running
    pub startup_timeout_ms: u64,

    pub request_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub script_timeout_ms: u64,

    pub browser: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Directory whose `node_modules` provides `playwright`
    pub playwright_dir: PathBuf,

    /// Capture a screenshot when a UI scenario fails
    pub screenshots: bool,

    pub selectors: UiSelectors,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:3030".to_string(),
            app_url: "http://localhost:3001".to_string(),
            suites_dir: None,
            tag: None,
            module: None,
            surfaces: Vec::new(),
            output_dir: PathBuf::from("test-results"),
            max_parallel_modules: 2,
            startup_timeout_ms: 30_000,
            request_timeout_ms: 10_000,
            action_timeout_ms: 10_000,
            script_timeout_ms: 60_000,
            browser: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            playwright_dir: PathBuf::from("."),
            screenshots: true,
            selectors: UiSelectors::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.max_parallel_modules == 0 {
            return Err(HarnessError::Setup(
                "max_parallel_modules must be at least 1".to_string(),
            ));
        }
        for (name, url) in [("service_url", &self.service_url), ("app_url", &self.app_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(HarnessError::Setup(format!(
                    "{} must be an http(s) URL: {}",
                    name, url
                )));
            }
        }
        Ok(())
    }

    /// Whether modules on `surface` should run
    pub fn runs(&self, surface: Surface) -> bool {
        self.surfaces.is_empty() || self.surfaces.contains(&surface)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn api(&self) -> ApiConfig {
        ApiConfig {
            service_url: self.service_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn ui(&self) -> UiConfig {
        UiConfig {
            app_url: self.app_url.trim_end_matches('/').to_string(),
            project_dir: self.playwright_dir.clone(),
            screenshot_dir: self.screenshots.then(|| self.output_dir.join("screenshots")),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            browser: Browser::from_name(&self.browser),
            headless: self.headless,
            action_timeout: Duration::from_millis(self.action_timeout_ms),
            script_timeout: Duration::from_millis(self.script_timeout_ms),
            selectors: self.selectors.clone(),
        }
    }
}
