//! Scenario orchestration
//!
//! A [`ModuleRunner`] executes one module's scenarios strictly in declared
//! order against a fixture store it owns. Per scenario it walks
//!
//! ```text
//! Idle -> ContextAcquired -> ActionInFlight -> Asserting
//!      -> FixtureUpdated -> ContextReleased -> Idle
//! ```
//!
//! Captured values are committed only after every check passes; the context
//! is released on every path. A failed scenario never stops the module.
//! A scenario whose declared reads are missing fails immediately with a
//! cascading-state error naming the scenarios that should have produced them.
//!
//! A [`SuiteRunner`] runs independent modules concurrently, each with its
//! own store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::assertion::{self, AssertionReport};
use crate::driver::{
    ActionPlan, AuthMode, DriverContext, DriverFactory, Observed, Operation, Surface,
};
use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::{BookDraft, Credentials, UniqueGenerator};
use crate::report::{ModuleReport, Outcome, ScenarioReport, SuiteReport};
use crate::state::{FixtureKey, FixtureStore};
use crate::suite::{ModuleSpec, ScenarioSpec};

/// Lifecycle position of the scenario currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ContextAcquired,
    ActionInFlight,
    Asserting,
    FixtureUpdated,
    ContextReleased,
}

/// Runs the scenarios of one module in order
pub struct ModuleRunner {
    module: ModuleSpec,
    driver: Arc<dyn DriverFactory>,
    generator: Arc<UniqueGenerator>,
    phase: Phase,
}

impl ModuleRunner {
    pub fn new(
        module: ModuleSpec,
        driver: Arc<dyn DriverFactory>,
        generator: Arc<UniqueGenerator>,
    ) -> Self {
        Self {
            module,
            driver,
            generator,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        trace!(module = %self.module.name, from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }

    /// Run every scenario with a freshly seeded store
    pub async fn run(&mut self) -> ModuleReport {
        let credentials = Credentials::generate(&self.generator, &self.module.credentials);
        let book = BookDraft::generate(&self.generator, &self.module.book);
        let store = FixtureStore::seeded(&credentials, &book);
        self.run_with_store(store).await
    }

    /// Run every scenario against `store`
    pub async fn run_with_store(&mut self, mut store: FixtureStore) -> ModuleReport {
        let start = Instant::now();
        let scenarios = self.module.scenarios.clone();

        info!(
            "Module '{}' ({}): {} scenario(s) as {}",
            self.module.name,
            self.module.surface,
            scenarios.len(),
            store.get(FixtureKey::Email).unwrap_or("<none>")
        );

        let mut reports = Vec::with_capacity(scenarios.len());
        for (index, scenario) in scenarios.iter().enumerate() {
            let report = self.run_scenario(index + 1, scenario, &mut store).await;
            if report.passed() {
                info!("✓ {} / {} ({} ms)", self.module.name, report.name, report.duration_ms);
            } else {
                error!(
                    "✗ {} / {} - {}",
                    self.module.name,
                    report.name,
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
            reports.push(report);
        }

        let passed = reports.iter().filter(|r| r.passed()).count();
        ModuleReport {
            name: self.module.name.clone(),
            surface: self.module.surface,
            passed,
            failed: reports.len() - passed,
            duration_ms: start.elapsed().as_millis() as u64,
            scenarios: reports,
            fixtures: store.snapshot(),
        }
    }

    async fn run_scenario(
        &mut self,
        ordinal: usize,
        scenario: &ScenarioSpec,
        store: &mut FixtureStore,
    ) -> ScenarioReport {
        let start = Instant::now();
        debug!("Running scenario {}: {}", ordinal, scenario.name);

        let missing = store.missing(&scenario.reads);
        if !missing.is_empty() {
            let err = self.cascading(scenario, &missing);
            return failed(ordinal, scenario, start, err, None, Vec::new());
        }

        let plan = match self.plan(scenario, store) {
            Ok(plan) => plan,
            Err(err) => return failed(ordinal, scenario, start, err, None, Vec::new()),
        };

        let mut context = match self.driver.open(&scenario.name).await {
            Ok(context) => context,
            Err(err) => {
                let err = match err {
                    HarnessError::Setup(_) | HarnessError::PlaywrightNotFound => err,
                    other => HarnessError::Setup(other.to_string()),
                };
                return failed(ordinal, scenario, start, err, None, Vec::new());
            }
        };
        self.transition(Phase::ContextAcquired);

        let result = self.exercise(context.as_mut(), scenario, &plan, store).await;

        self.transition(Phase::ContextReleased);
        if let Err(e) = context.release().await {
            warn!("Releasing context for '{}' failed: {}", scenario.name, e);
        }
        self.transition(Phase::Idle);

        match result {
            Ok((observed, report)) if report.passed() => ScenarioReport {
                name: scenario.name.clone(),
                ordinal,
                operation: scenario.action,
                outcome: Outcome::Passed,
                failure_kind: None,
                status: Some(observed.status),
                checks: report.checks,
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Ok((observed, report)) => {
                let err = HarnessError::Assertion(report.failure_summary());
                failed(ordinal, scenario, start, err, Some(observed.status), report.checks)
            }
            Err(err) => failed(ordinal, scenario, start, err, None, Vec::new()),
        }
    }

    /// Setup, action, assertions and fixture commit inside an acquired context
    async fn exercise(
        &mut self,
        context: &mut dyn DriverContext,
        scenario: &ScenarioSpec,
        plan: &ActionPlan,
        store: &mut FixtureStore,
    ) -> HarnessResult<(Observed, AssertionReport)> {
        context.prepare(&scenario.setup, plan).await?;

        self.transition(Phase::ActionInFlight);
        let observed = context.perform(plan).await?;

        if observed.operation != plan.operation {
            return Err(HarnessError::Correlation {
                expected: plan.operation.to_string(),
                actual: observed.operation.to_string(),
            });
        }

        self.transition(Phase::Asserting);
        let report = assertion::evaluate(&scenario.expect, &scenario.capture, &observed, store);

        if report.passed() {
            for (key, value) in assertion::captured_values(&scenario.capture, &observed) {
                if store.set(key, value).is_some() {
                    debug!("Fixture '{}' overwritten by '{}'", key, scenario.name);
                }
            }
            self.transition(Phase::FixtureUpdated);
        }

        Ok((observed, report))
    }

    /// Resolve everything the driver needs from the store
    fn plan(&self, scenario: &ScenarioSpec, store: &FixtureStore) -> HarnessResult<ActionPlan> {
        let surface = self.module.surface;
        let required = scenario.required_keys(surface);
        let mut plan = ActionPlan::new(scenario.action);
        plan.auth = scenario.effective_auth(surface);

        if required.contains(&FixtureKey::Email) {
            let password = store.require(FixtureKey::Password)?.to_string();
            plan.credentials = Some(Credentials {
                email: store.require(FixtureKey::Email)?.to_string(),
                password_confirmation: store
                    .get(FixtureKey::PasswordConfirmation)
                    .map(str::to_string)
                    .unwrap_or_else(|| password.clone()),
                password,
            });
        }

        if plan.auth == AuthMode::Session {
            plan.token = Some(store.require(FixtureKey::AccessToken)?.to_string());
        }

        if scenario.action.sends_book() {
            let mut book = BookDraft {
                title: store.require(FixtureKey::BookTitle)?.to_string(),
                description: store.require(FixtureKey::BookDescription)?.to_string(),
                image_url: store.require(FixtureKey::BookImageUrl)?.to_string(),
                book_type: store.require(FixtureKey::BookType)?.to_string(),
            };
            if scenario.action == Operation::EditBook {
                if let Some(suffix) = &scenario.edit_suffix {
                    book.title.push_str(suffix);
                }
            }
            plan.book = Some(book);
        }

        if scenario.action.needs_book_id() {
            plan.book_id = Some(store.require(FixtureKey::BookId)?.to_string());
        }

        Ok(plan)
    }

    fn cascading(&self, scenario: &ScenarioSpec, missing: &[FixtureKey]) -> HarnessError {
        let producers = missing
            .iter()
            .map(|key| {
                let names = self.module.producers(*key);
                if names.is_empty() {
                    format!("{}: seed", key)
                } else {
                    format!("{}: {}", key, names.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        HarnessError::CascadingState {
            scenario: scenario.name.clone(),
            missing: missing.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", "),
            producers,
        }
    }
}

fn failed(
    ordinal: usize,
    scenario: &ScenarioSpec,
    start: Instant,
    err: HarnessError,
    status: Option<u16>,
    checks: Vec<assertion::CheckOutcome>,
) -> ScenarioReport {
    ScenarioReport {
        name: scenario.name.clone(),
        ordinal,
        operation: scenario.action,
        outcome: Outcome::Failed,
        failure_kind: Some(err.kind()),
        status,
        checks,
        error: Some(err.to_string()),
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Runs independent modules, concurrently when allowed
pub struct SuiteRunner {
    drivers: HashMap<Surface, Arc<dyn DriverFactory>>,
    generator: Arc<UniqueGenerator>,
    max_parallel_modules: usize,
}

impl SuiteRunner {
    pub fn new(generator: Arc<UniqueGenerator>) -> Self {
        Self {
            drivers: HashMap::new(),
            generator,
            max_parallel_modules: 1,
        }
    }

    /// Register the driver used for its surface
    pub fn with_driver(mut self, driver: Arc<dyn DriverFactory>) -> Self {
        self.drivers.insert(driver.surface(), driver);
        self
    }

    pub fn max_parallel_modules(mut self, limit: usize) -> Self {
        self.max_parallel_modules = limit.max(1);
        self
    }

    fn driver_for(&self, module: &ModuleSpec) -> HarnessResult<Arc<dyn DriverFactory>> {
        self.drivers.get(&module.surface).cloned().ok_or_else(|| {
            HarnessError::Setup(format!(
                "no {} driver configured for module '{}'",
                module.surface, module.name
            ))
        })
    }

    /// Run a single module
    pub async fn run_module(&self, module: &ModuleSpec) -> HarnessResult<ModuleReport> {
        let driver = self.driver_for(module)?;
        let mut runner = ModuleRunner::new(module.clone(), driver, Arc::clone(&self.generator));
        Ok(runner.run().await)
    }

    /// Run a list of modules; reports keep the input order
    pub async fn run_all(&self, modules: &[ModuleSpec]) -> HarnessResult<SuiteReport> {
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        let mut runners = Vec::with_capacity(modules.len());
        for module in modules {
            let driver = self.driver_for(module)?;
            runners.push(ModuleRunner::new(module.clone(), driver, Arc::clone(&self.generator)));
        }

        info!(
            "Running {} module(s), up to {} at a time...",
            runners.len(),
            self.max_parallel_modules
        );

        let permits = Arc::new(Semaphore::new(self.max_parallel_modules));
        let mut tasks = JoinSet::new();
        for (index, mut runner) in runners.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, runner.run().await)
            });
        }

        let mut results = Vec::with_capacity(modules.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, report) =
                joined.map_err(|e| HarnessError::Setup(format!("module task failed: {}", e)))?;
            results.push((index, report));
        }
        results.sort_by_key(|(index, _)| *index);

        let report = SuiteReport::from_modules(
            started_at,
            start.elapsed().as_millis() as u64,
            results.into_iter().map(|(_, r)| r).collect(),
        );

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            report.passed, report.failed, report.duration_ms
        );

        Ok(report)
    }
}
