//! Scenario, module and suite results

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assertion::CheckOutcome;
use crate::driver::{Operation, Surface};
use crate::error::{FailureKind, HarnessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    /// Position within the module, starting at 1
    pub ordinal: usize,
    pub operation: Operation,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default)]
    pub status: Option<u16>,
    pub checks: Vec<CheckOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

/// Result of running one module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub name: String,
    pub surface: Surface,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioReport>,
    /// Fixture values at the end of the module (token redacted)
    pub fixtures: BTreeMap<String, String>,
}

impl ModuleReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

/// Result of running all modules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub modules: Vec<ModuleReport>,
}

impl SuiteReport {
    pub fn from_modules(
        started_at: DateTime<Utc>,
        duration_ms: u64,
        modules: Vec<ModuleReport>,
    ) -> Self {
        let passed = modules.iter().map(|m| m.passed).sum();
        let failed = modules.iter().map(|m| m.failed).sum();
        Self {
            started_at,
            total: passed + failed,
            passed,
            failed,
            duration_ms,
            modules,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn module(&self, name: &str) -> Option<&ModuleReport> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Write results to `test-results.json` in `dir`
    pub fn write_json(&self, dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str, outcome: Outcome) -> ScenarioReport {
        ScenarioReport {
            name: name.into(),
            ordinal: 1,
            operation: Operation::Login,
            outcome,
            failure_kind: None,
            status: Some(200),
            checks: vec![],
            error: None,
            duration_ms: 3,
        }
    }

    #[test]
    fn test_suite_totals_and_json() {
        let module = ModuleReport {
            name: "api-users".into(),
            surface: Surface::Api,
            passed: 1,
            failed: 1,
            duration_ms: 10,
            scenarios: vec![scenario("a", Outcome::Passed), scenario("b", Outcome::Failed)],
            fixtures: BTreeMap::new(),
        };
        let report = SuiteReport::from_modules(Utc::now(), 10, vec![module]);
        assert_eq!(report.total, 2);
        assert!(!report.success());
        assert!(report.module("api-users").unwrap().scenario("b").is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = report.write_json(dir.path()).unwrap();
        let json = std::fs::read_to_string(path).unwrap();
        let parsed: SuiteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.failed, 1);
        assert_eq!(parsed.modules[0].scenarios[1].outcome, Outcome::Failed);
    }
}
