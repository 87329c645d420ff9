//! Bookshelf acceptance harness
//!
//! End-to-end verification of a book-catalog web service through two
//! surfaces: its HTTP/JSON protocol directly, and its web application driven
//! by Playwright. Scenarios are declared in YAML modules and run in order,
//! threading generated and captured fixtures forward.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SuiteRunner                            │
//! │    └── ModuleRunner (one per module, own FixtureStore)      │
//! │          ├── plan(scenario, store) -> ActionPlan            │
//! │          ├── DriverFactory::open() -> DriverContext         │
//! │          │     ├── ApiDriver  (reqwest)                     │
//! │          │     └── UiDriver   (Playwright script via node)  │
//! │          ├── perform(plan) -> Observed                      │
//! │          ├── evaluate(expect, observed) -> AssertionReport  │
//! │          └── commit captures -> FixtureStore                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ModuleSpec (YAML)                                          │
//! │    ├── name, surface, tags, credentials, book               │
//! │    └── scenarios: [ScenarioSpec]                            │
//! │          ├── reads / writes: [FixtureKey]                   │
//! │          ├── setup, action, auth, edit_suffix               │
//! │          ├── expect { status, body, fields, location }      │
//! │          └── capture: [{ key, from }]                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod orchestrator;
pub mod report;
pub mod service;
pub mod state;
pub mod suite;

pub use config::HarnessConfig;
pub use driver::{ApiDriver, DriverContext, DriverFactory, Observed, Operation, Surface, UiDriver};
pub use error::{FailureKind, HarnessError, HarnessResult};
pub use fixtures::UniqueGenerator;
pub use orchestrator::{ModuleRunner, SuiteRunner};
pub use report::{ModuleReport, ScenarioReport, SuiteReport};
pub use state::{FixtureKey, FixtureStore};
pub use suite::{ModuleSpec, ScenarioSpec};
