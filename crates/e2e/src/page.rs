//! Page objects
//!
//! A [`PageDefinition`] is pure data describing one screen: its route, its
//! field catalog, how to submit it and where its outcome is shown. A
//! [`PageObject`] binds a definition to one live browser session and exposes
//! the operations scenarios are written against.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use crate::assertion::{url_matches_route, Outcome, OutcomeStatus};
use crate::catalog::{FieldCatalog, FieldDefinition};
use crate::config::Timeouts;
use crate::driver::BrowserDriver;
use crate::error::{E2eError, E2eResult};
use crate::locator::{Locator, LocatorStrategies};

/// Where a page reports the result of a submission
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutcomeLocators {
    #[serde(default)]
    pub error_message: LocatorStrategies,
    #[serde(default)]
    pub identifier: LocatorStrategies,
    #[serde(default)]
    pub success_message: LocatorStrategies,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Login flow run before navigating to an authenticated page
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPrelude {
    pub route: String,
    pub username: LocatorStrategies,
    pub password: LocatorStrategies,
    pub submit: LocatorStrategies,
    pub credentials: Credentials,
    /// Element that only renders once the user is signed in
    #[serde(default)]
    pub logged_in: Option<Locator>,
}

/// Declarative description of one screen
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PageSpec")]
pub struct PageDefinition {
    pub name: String,
    pub route: String,
    pub success_route: Option<String>,
    pub login: Option<LoginPrelude>,
    pub catalog: FieldCatalog,
    pub submit: LocatorStrategies,
    pub outcomes: OutcomeLocators,
    pub result_view: Option<Locator>,
}

#[derive(Deserialize)]
struct PageSpec {
    name: String,
    route: String,
    #[serde(default)]
    success_route: Option<String>,
    #[serde(default)]
    login: Option<LoginPrelude>,
    fields: Vec<FieldDefinition>,
    submit: LocatorStrategies,
    #[serde(default)]
    outcomes: OutcomeLocators,
    #[serde(default)]
    result_view: Option<Locator>,
}

impl TryFrom<PageSpec> for PageDefinition {
    type Error = E2eError;

    fn try_from(spec: PageSpec) -> E2eResult<Self> {
        let catalog = FieldCatalog::new(spec.name.clone(), spec.fields)?;
        let page = PageDefinition {
            name: spec.name,
            route: spec.route,
            success_route: spec.success_route,
            login: spec.login,
            catalog,
            submit: spec.submit,
            outcomes: spec.outcomes,
            result_view: spec.result_view,
        };
        page.validate()?;
        Ok(page)
    }
}

impl PageDefinition {
    /// Reject definitions a scenario could never complete against
    pub fn validate(&self) -> E2eResult<()> {
        if self.submit.is_empty() {
            return Err(E2eError::Config(format!(
                "page '{}' has no submit locator",
                self.name
            )));
        }
        let o = &self.outcomes;
        if o.error_message.is_empty()
            && o.identifier.is_empty()
            && o.success_message.is_empty()
            && self.success_route.is_none()
        {
            return Err(E2eError::Config(format!(
                "page '{}' declares no outcome locators",
                self.name
            )));
        }
        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Bind this definition to a live session
    pub fn bind<'a>(
        &'a self,
        driver: &'a mut dyn BrowserDriver,
        timeouts: &Timeouts,
    ) -> PageObject<'a> {
        PageObject {
            def: self,
            driver,
            timeouts: timeouts.clone(),
            logged_in: false,
            attempted: Vec::new(),
        }
    }
}

/// Outcome slots, in the order they are checked on every poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Error,
    Identifier,
    SuccessMessage,
    SuccessRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Primary,
    Fallback,
}

/// A page definition bound to one browser session
pub struct PageObject<'a> {
    def: &'a PageDefinition,
    driver: &'a mut dyn BrowserDriver,
    timeouts: Timeouts,
    logged_in: bool,
    attempted: Vec<(String, String)>,
}

impl<'a> PageObject<'a> {
    pub fn definition(&self) -> &PageDefinition {
        self.def
    }

    /// Field values written so far, in order
    pub fn attempted(&self) -> &[(String, String)] {
        &self.attempted
    }

    /// Load the entry route, running the login prelude first if the page has one
    pub async fn navigate(&mut self) -> E2eResult<()> {
        if self.def.login.is_some() && !self.logged_in {
            self.login().await?;
        }

        let route = self.def.route.clone();
        debug!("Navigating to {}", route);
        self.driver.goto(&route).await?;

        let timeout = self.timeouts.navigation();
        if !self.driver.wait_for_url(&route, timeout).await? {
            return Err(E2eError::Navigation {
                url: route,
                timeout_ms: self.timeouts.navigation_ms,
            });
        }
        Ok(())
    }

    /// Sign in through the page's login prelude. A no-op for public pages.
    pub async fn login(&mut self) -> E2eResult<()> {
        let def = self.def;
        let Some(login) = &def.login else {
            return Ok(());
        };

        info!("Signing in as '{}' via {}", login.credentials.username, login.route);
        self.driver.goto(&login.route).await?;
        let timeout = self.timeouts.navigation();
        if !self.driver.wait_for_url(&login.route, timeout).await? {
            return Err(E2eError::Navigation {
                url: login.route.clone(),
                timeout_ms: self.timeouts.navigation_ms,
            });
        }

        let username = self.locate(&login.username, "login username").await?;
        self.driver.fill(&username, &login.credentials.username).await?;
        let password = self.locate(&login.password, "login password").await?;
        self.driver.fill(&password, &login.credentials.password).await?;
        let submit = self.locate(&login.submit, "login button").await?;
        self.driver.click(&submit).await?;

        if let Some(marker) = &login.logged_in {
            if !self.driver.wait_for(marker, timeout).await? {
                return Err(E2eError::Timeout(format!("login confirmation {}", marker)));
            }
        }
        self.logged_in = true;
        Ok(())
    }

    /// Write one value into the field named `name`
    pub async fn fill_field(&mut self, name: &str, value: &str) -> E2eResult<()> {
        let field = self.def.catalog.validate_value(name, value)?;
        let is_choice = field.is_choice();
        let strategies = self.def.catalog.strategies(name)?;

        self.attempted.push((name.to_string(), value.to_string()));
        let locator = self.locate(&strategies, name).await?;
        if is_choice {
            self.driver.select_option(&locator, value).await
        } else {
            self.driver.fill(&locator, value).await
        }
    }

    /// Fill several fields in order.
    ///
    /// Every name and choice value is checked against the catalog before the
    /// first write, so an unrunnable scenario never touches the page.
    pub async fn fill_fields(&mut self, inputs: &[(String, String)]) -> E2eResult<()> {
        for (name, value) in inputs {
            self.def.catalog.validate_value(name, value)?;
        }
        for (name, value) in inputs {
            self.fill_field(name, value).await?;
        }
        Ok(())
    }

    /// Trigger the page's primary action. Does not look at the result.
    pub async fn submit(&mut self) -> E2eResult<()> {
        let def = self.def;
        let locator = self.locate(&def.submit, "submit").await?;
        self.driver.click(&locator).await
    }

    /// Observe what the page reports after submission.
    ///
    /// Primary locators (plus the success route) are polled until one shows
    /// up or the primary timeout passes. Only then are fallback locators
    /// polled, for the fallback timeout. Slots are always checked in the
    /// same order, so the same page state always yields the same outcome.
    pub async fn read_outcome(&mut self) -> E2eResult<Outcome> {
        let started = Instant::now();

        let found = match self
            .poll_slots(Phase::Primary, self.timeouts.outcome_primary())
            .await?
        {
            Some(hit) => Some(hit),
            None => {
                debug!("No primary outcome on '{}', trying fallbacks", self.def.name);
                self.poll_slots(Phase::Fallback, self.timeouts.outcome_fallback())
                    .await?
            }
        };

        let Some((slot, locator)) = found else {
            return Err(E2eError::OutcomeNotFound {
                page: self.def.name.clone(),
                waited_ms: started.elapsed().as_millis() as u64,
            });
        };

        let url = self.driver.current_url().await?;
        let result_visible = match &self.def.result_view {
            Some(view) => Some(self.driver.is_visible(view).await?),
            None => None,
        };

        let def = self.def;
        let outcome = match (slot, locator) {
            (Slot::Error, Some(l)) => Outcome {
                status: OutcomeStatus::Failure,
                message: self.driver.text_content(&l).await?,
                identifier: None,
                url: Some(url),
                result_visible,
            },
            (slot, locator) => {
                let identifier = match (slot, &locator) {
                    (Slot::Identifier, Some(l)) => self.driver.text_content(l).await?,
                    _ => self.settle_text(&def.outcomes.identifier).await?,
                };
                let message = match (slot, &locator) {
                    (Slot::SuccessMessage, Some(l)) => self.driver.text_content(l).await?,
                    _ => self.settle_text(&def.outcomes.success_message).await?,
                };
                Outcome {
                    status: OutcomeStatus::Success,
                    message,
                    identifier,
                    url: Some(url),
                    result_visible,
                }
            }
        };

        debug!("Outcome on '{}': {}", self.def.name, outcome);
        Ok(outcome)
    }

    pub async fn read_success_message(&mut self) -> E2eResult<String> {
        let def = self.def;
        self.read_slot_text(&def.outcomes.success_message).await
    }

    pub async fn read_error_message(&mut self) -> E2eResult<String> {
        let def = self.def;
        self.read_slot_text(&def.outcomes.error_message).await
    }

    pub async fn read_identifier(&mut self) -> E2eResult<String> {
        let def = self.def;
        self.read_slot_text(&def.outcomes.identifier).await
    }

    /// Whether the page's result view (e.g. a search results table) is shown
    pub async fn is_result_visible(&mut self) -> E2eResult<bool> {
        let def = self.def;
        let view = def.result_view.as_ref().ok_or_else(|| {
            E2eError::Config(format!("page '{}' has no result view", self.def.name))
        })?;
        self.driver.wait_for(view, self.timeouts.action()).await
    }

    /// Current URL, for failure reports
    pub async fn current_url(&mut self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    pub async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        self.driver.screenshot(path).await
    }

    /// Resolve an element through its strategies with the action timeout
    async fn locate(&mut self, strategies: &LocatorStrategies, what: &str) -> E2eResult<Locator> {
        strategies
            .resolve(&mut *self.driver, self.timeouts.action())
            .await?
            .ok_or_else(|| E2eError::Timeout(format!("{} via {}", what, strategies)))
    }

    /// Primary lookup with the primary timeout, then fallbacks with theirs
    async fn read_slot_text(&mut self, strategies: &LocatorStrategies) -> E2eResult<String> {
        let started = Instant::now();
        let mut waits = std::iter::once(self.timeouts.outcome_primary())
            .chain(std::iter::repeat(self.timeouts.outcome_fallback()));

        for locator in strategies.iter() {
            let wait = waits.next().unwrap_or_default();
            if self.driver.wait_for(locator, wait).await? {
                return Ok(self.driver.text_content(locator).await?.unwrap_or_default());
            }
        }
        Err(E2eError::OutcomeNotFound {
            page: self.def.name.clone(),
            waited_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Text of a secondary success element that may render just after the first
    async fn settle_text(&mut self, strategies: &LocatorStrategies) -> E2eResult<Option<String>> {
        if strategies.is_empty() {
            return Ok(None);
        }
        match strategies
            .resolve(&mut *self.driver, self.timeouts.settle())
            .await?
        {
            Some(locator) => self.driver.text_content(&locator).await,
            None => Ok(None),
        }
    }

    /// One polling phase over all outcome slots.
    ///
    /// Returns the slot that resolved and the locator that matched it (the
    /// success route has no locator).
    async fn poll_slots(
        &mut self,
        phase: Phase,
        budget: Duration,
    ) -> E2eResult<Option<(Slot, Option<Locator>)>> {
        let deadline = Instant::now() + budget;
        let def = self.def;
        let outcomes = &def.outcomes;
        let slots = [
            (Slot::Error, &outcomes.error_message),
            (Slot::Identifier, &outcomes.identifier),
            (Slot::SuccessMessage, &outcomes.success_message),
        ];

        loop {
            for (slot, strategies) in slots {
                let candidates: &[Locator] = match phase {
                    Phase::Primary => strategies.primary().map(std::slice::from_ref).unwrap_or(&[]),
                    Phase::Fallback => strategies.fallbacks(),
                };
                for locator in candidates {
                    if self.driver.is_visible(locator).await? {
                        return Ok(Some((slot, Some(locator.clone()))));
                    }
                }
            }

            if phase == Phase::Primary {
                if let Some(route) = &def.success_route {
                    let url = self.driver.current_url().await?;
                    if url_matches_route(&url, route) {
                        return Ok(Some((Slot::SuccessRoute, None)));
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let pause = self.timeouts.poll_interval().min(deadline - now);
            tokio::time::sleep(pause).await;
        }
    }
}
