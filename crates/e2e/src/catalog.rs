//! Field catalog: display name to stable locator key
//!
//! A page never branches on field names. Adding a field means adding a
//! catalog entry; the page object's control flow stays the same.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::locator::{Locator, LocatorKey, LocatorStrategies};

/// Selection semantics of an input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free-text input, filled verbatim
    #[default]
    Text,

    /// Choice list; the value must be one of `options`
    Choice { options: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Human-readable name used in scenario tables
    pub name: String,

    /// Value of the element's `data-testid`
    pub locator_key: LocatorKey,

    #[serde(default)]
    pub kind: FieldKind,

    /// Fall back to an accessible-role lookup by display name
    #[serde(default)]
    pub role_fallback: bool,
}

impl FieldDefinition {
    pub fn text(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator_key: LocatorKey::new(key),
            kind: FieldKind::Text,
            role_fallback: false,
        }
    }

    pub fn choice<I, S>(name: impl Into<String>, key: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            locator_key: LocatorKey::new(key),
            kind: FieldKind::Choice {
                options: options.into_iter().map(Into::into).collect(),
            },
            role_fallback: false,
        }
    }

    pub fn with_role_fallback(mut self) -> Self {
        self.role_fallback = true;
        self
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, FieldKind::Choice { .. })
    }

    /// ARIA role used for the fallback lookup
    fn role(&self) -> &'static str {
        match self.kind {
            FieldKind::Text => "textbox",
            FieldKind::Choice { .. } => "combobox",
        }
    }
}

/// Declarative field mapping for one page
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    page: String,
    fields: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
}

impl FieldCatalog {
    /// Build a catalog, rejecting duplicate display names
    pub fn new(page: impl Into<String>, fields: Vec<FieldDefinition>) -> E2eResult<Self> {
        let mut catalog = Self {
            page: page.into(),
            fields: Vec::with_capacity(fields.len()),
            index: HashMap::new(),
        };
        for field in fields {
            catalog.insert(field)?;
        }
        Ok(catalog)
    }

    /// Add one more field to the catalog
    pub fn with_field(mut self, field: FieldDefinition) -> E2eResult<Self> {
        self.insert(field)?;
        Ok(self)
    }

    fn insert(&mut self, field: FieldDefinition) -> E2eResult<()> {
        if self.index.contains_key(&field.name) {
            return Err(E2eError::DuplicateField(format!(
                "{} (page '{}')",
                field.name, self.page
            )));
        }
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    pub fn field(&self, name: &str) -> E2eResult<&FieldDefinition> {
        self.index
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| E2eError::UnknownField {
                page: self.page.clone(),
                field: name.to_string(),
            })
    }

    /// Pure lookup of the field's stable key
    pub fn resolve_locator(&self, name: &str) -> E2eResult<&LocatorKey> {
        self.field(name).map(|f| &f.locator_key)
    }

    /// Ordered lookup strategies for a field's input element
    pub fn strategies(&self, name: &str) -> E2eResult<LocatorStrategies> {
        let field = self.field(name)?;
        let mut strategies = LocatorStrategies::single(Locator::TestId {
            key: field.locator_key.clone(),
        });
        if field.role_fallback {
            strategies = strategies.or(Locator::role(field.role(), field.name.clone()));
        }
        Ok(strategies)
    }

    /// Check that `value` is acceptable for the field before touching a browser
    pub fn validate_value(&self, name: &str, value: &str) -> E2eResult<&FieldDefinition> {
        let field = self.field(name)?;
        if let FieldKind::Choice { options } = &field.kind {
            if !options.iter().any(|o| o == value) {
                return Err(E2eError::InvalidOption {
                    field: field.name.clone(),
                    value: value.to_string(),
                    allowed: options.join(", "),
                });
            }
        }
        Ok(field)
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
