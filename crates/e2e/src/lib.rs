//! formflow: data-driven form scenario harness
//!
//! This crate drives web forms through a real browser and checks what the
//! application reports back:
//! - Describes each screen as data (field catalog, locators, outcome probes)
//! - Expands YAML scenario tables into independent cases
//! - Runs every case in its own browser session via a Playwright bridge
//! - Applies and reverts out-of-band fixtures around each case
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── validate_case(case) -> &PageDefinition               │
//! │    ├── FixtureHooks::apply(setup)                           │
//! │    ├── BrowserLauncher::launch() -> Box<dyn BrowserDriver>  │
//! │    ├── PageObject: navigate, fill_fields, submit,           │
//! │    │               read_outcome -> Outcome                  │
//! │    ├── FixtureHooks::revert(setup)   (reverse order)        │
//! │    └── ExpectedOutcome::check(outcome)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioTable (YAML)                                       │
//! │    ├── name, page, tags, defaults{field: value}, setup      │
//! │    └── rows: [ScenarioRow]                                  │
//! │          ├── inputs{field: value}, omit[field]              │
//! │          ├── setup: [existing_account | ... ]               │
//! │          └── expect: success { .. } | failure { message }   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageDefinition                                             │
//! │    ├── route, success_route, login prelude                  │
//! │    ├── FieldCatalog: name -> LocatorKey (+ role fallback)   │
//! │    └── outcomes: error / identifier / success message       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod hooks;
pub mod locator;
pub mod page;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod table;

pub use assertion::{ExpectedOutcome, MatchPolicy, MessageExpectation, Outcome, OutcomeStatus};
pub use catalog::{FieldCatalog, FieldDefinition, FieldKind};
pub use config::{HarnessConfig, Timeouts};
pub use driver::{BrowserDriver, BrowserLauncher};
pub use error::{E2eError, E2eResult};
pub use hooks::{FixtureHooks, HttpFixtureHooks, SetupAction};
pub use locator::{Locator, LocatorKey, LocatorStrategies};
pub use page::{PageDefinition, PageObject};
pub use pages::PageRegistry;
pub use playwright::{PlaywrightDriver, PlaywrightLauncher};
pub use runner::{RunnerConfig, ScenarioReport, ScenarioRunner, SuiteReport};
pub use server::{ServerConfig, ServerHandle};
pub use table::{FieldInputs, ScenarioCase, ScenarioTable};
