//! Element locators and ordered lookup strategies

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::BrowserDriver;
use crate::error::E2eResult;

/// Stable identifier of a UI element, rendered as a `data-testid` attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorKey(String);

impl LocatorKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to find one element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// `[data-testid="..."]`
    TestId { key: LocatorKey },

    /// Accessible role plus accessible name, e.g. `button` / `Submit`
    Role { role: String, name: String },

    /// Visible text match
    Text { text: String },
}

impl Locator {
    pub fn test_id(key: impl Into<String>) -> Self {
        Locator::TestId {
            key: LocatorKey::new(key),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text { text: text.into() }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::TestId { key } => write!(f, "[data-testid=\"{}\"]", key),
            Locator::Role { role, name } => write!(f, "role={}[name=\"{}\"]", role, name),
            Locator::Text { text } => write!(f, "text={}", text),
        }
    }
}

/// Ordered list of locators for one element.
///
/// The first entry is the primary (attribute based) lookup. Later entries are
/// only consulted after every earlier wait has timed out; they are never
/// raced against each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorStrategies(Vec<Locator>);

impl LocatorStrategies {
    pub fn new(locators: Vec<Locator>) -> Self {
        Self(locators)
    }

    pub fn single(locator: Locator) -> Self {
        Self(vec![locator])
    }

    /// Append a fallback after the existing strategies
    pub fn or(mut self, fallback: Locator) -> Self {
        self.0.push(fallback);
        self
    }

    pub fn primary(&self) -> Option<&Locator> {
        self.0.first()
    }

    pub fn fallbacks(&self) -> &[Locator] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walk the strategies in order, giving each its own bounded wait.
    ///
    /// Returns the first locator that resolved, or `None` once every wait
    /// timed out. Driver errors other than a timeout propagate.
    pub async fn resolve(
        &self,
        driver: &mut dyn BrowserDriver,
        wait_each: Duration,
    ) -> E2eResult<Option<Locator>> {
        for (i, locator) in self.0.iter().enumerate() {
            if driver.wait_for(locator, wait_each).await? {
                if i > 0 {
                    debug!("Resolved {} via fallback #{}", locator, i);
                }
                return Ok(Some(locator.clone()));
            }
            debug!("Locator {} not found within {:?}", locator, wait_each);
        }
        Ok(None)
    }
}

impl fmt::Display for LocatorStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|l| l.to_string()).collect();
        f.write_str(&rendered.join(" -> "))
    }
}
