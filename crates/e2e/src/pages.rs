//! Built-in page definitions and the page registry

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::catalog::{FieldCatalog, FieldDefinition};
use crate::error::{E2eError, E2eResult};
use crate::locator::{Locator, LocatorStrategies};
use crate::page::{Credentials, LoginPrelude, OutcomeLocators, PageDefinition};
use crate::table::ScenarioCase;

/// US state and territory codes accepted by the State choice list
pub const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "PR", "RI", "SC", "SD", "TN", "TX",
    "UT", "VT", "VA", "WA", "WV", "WI", "WY",
];

pub const REGISTRATION: &str = "registration";
pub const CREATE_CUSTOMER: &str = "create-customer";
pub const NEW_CUSTOMER: &str = "new-customer";

/// Sign-in used by the customer service screens
fn csr_login(submit: LocatorStrategies, logged_in: Option<Locator>) -> LoginPrelude {
    LoginPrelude {
        route: "/login".to_string(),
        username: LocatorStrategies::single(Locator::test_id("username")),
        password: LocatorStrategies::single(Locator::test_id("password")),
        submit,
        credentials: Credentials {
            username: "csr".to_string(),
            password: "password".to_string(),
        },
        logged_in,
    }
}

/// Account sign-up. Success is a redirect to `/success`.
pub fn registration() -> E2eResult<PageDefinition> {
    let catalog = FieldCatalog::new(
        REGISTRATION,
        vec![
            FieldDefinition::text("First Name", "firstName"),
            FieldDefinition::text("Last Name", "lastName"),
            FieldDefinition::text("Email", "email"),
            FieldDefinition::text("Password", "password"),
            FieldDefinition::text("Confirm Password", "confirmPassword"),
        ],
    )?;

    let page = PageDefinition {
        name: REGISTRATION.to_string(),
        route: "/register".to_string(),
        success_route: Some("/success".to_string()),
        login: None,
        catalog,
        submit: LocatorStrategies::single(Locator::test_id("registerButton")),
        outcomes: OutcomeLocators {
            error_message: LocatorStrategies::single(Locator::test_id("errorMessage")),
            ..Default::default()
        },
        result_view: None,
    };
    page.validate()?;
    Ok(page)
}

/// Customer creation behind CSR login, with address fields and a state picker
pub fn create_customer() -> E2eResult<PageDefinition> {
    let catalog = FieldCatalog::new(
        CREATE_CUSTOMER,
        vec![
            FieldDefinition::text("First Name", "firstName"),
            FieldDefinition::text("Last Name", "lastName"),
            FieldDefinition::text("Email", "email"),
            FieldDefinition::text("Phone Number", "phoneNumber"),
            FieldDefinition::text("Address", "address"),
            FieldDefinition::text("City", "city"),
            FieldDefinition::choice("State", "state", US_STATES.iter().copied()),
            FieldDefinition::text("Zip Code", "zipCode"),
        ],
    )?;

    let page = PageDefinition {
        name: CREATE_CUSTOMER.to_string(),
        route: "/create-customer".to_string(),
        success_route: None,
        login: Some(csr_login(
            LocatorStrategies::single(Locator::test_id("loginButton")),
            Some(Locator::test_id("logoutButton")),
        )),
        catalog,
        submit: LocatorStrategies::single(Locator::test_id("submitButton")),
        outcomes: OutcomeLocators {
            error_message: LocatorStrategies::single(Locator::test_id("errorMessage")),
            identifier: LocatorStrategies::single(Locator::test_id("customerId")),
            success_message: LocatorStrategies::single(Locator::test_id("successMessage")),
        },
        result_view: Some(Locator::test_id("searchResultsTable")),
    };
    page.validate()?;
    Ok(page)
}

/// Customer intake form whose test ids are not guaranteed, so every element
/// has a role or text fallback
pub fn new_customer() -> E2eResult<PageDefinition> {
    let field = |name: &str| {
        let key = format!("customer-{}", name.to_lowercase().replace(' ', "-"));
        FieldDefinition::text(name, key).with_role_fallback()
    };
    let catalog = FieldCatalog::new(
        NEW_CUSTOMER,
        vec![
            field("First Name"),
            field("Last Name"),
            field("Email"),
            field("Phone Number"),
            field("Address"),
        ],
    )?;

    let page = PageDefinition {
        name: NEW_CUSTOMER.to_string(),
        route: "/new-customer".to_string(),
        success_route: None,
        login: Some(csr_login(
            LocatorStrategies::single(Locator::role("button", "Login")),
            None,
        )),
        catalog,
        submit: LocatorStrategies::single(Locator::role("button", "Submit")),
        outcomes: OutcomeLocators {
            error_message: LocatorStrategies::single(Locator::test_id("error-message"))
                .or(Locator::text("Error")),
            identifier: LocatorStrategies::single(Locator::test_id("customer-id"))
                .or(Locator::text("Customer ID:")),
            success_message: LocatorStrategies::single(Locator::test_id("success-message"))
                .or(Locator::text("Customer created successfully")),
        },
        result_view: None,
    };
    page.validate()?;
    Ok(page)
}

/// Page definitions addressable by name
#[derive(Debug, Clone, Default)]
pub struct PageRegistry {
    pages: BTreeMap<String, PageDefinition>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three built-in screens
    pub fn builtin() -> E2eResult<Self> {
        let mut registry = Self::new();
        registry.register(registration()?)?;
        registry.register(create_customer()?)?;
        registry.register(new_customer()?)?;
        Ok(registry)
    }

    pub fn register(&mut self, page: PageDefinition) -> E2eResult<()> {
        if self.pages.contains_key(&page.name) {
            return Err(E2eError::Config(format!("page '{}' registered twice", page.name)));
        }
        self.pages.insert(page.name.clone(), page);
        Ok(())
    }

    /// Add or replace pages from every YAML file under `dir`
    pub fn load_dir(&mut self, dir: &Path) -> E2eResult<usize> {
        let mut loaded = 0;
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let page = PageDefinition::from_file(entry.path())?;
            debug!("Loaded page '{}' from {}", page.name, entry.path().display());
            self.pages.insert(page.name.clone(), page);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> E2eResult<&PageDefinition> {
        self.pages
            .get(name)
            .ok_or_else(|| E2eError::UnknownPage(name.to_string()))
    }

    /// Resolve the case's page and check every input against its catalog
    pub fn validate_case(&self, case: &ScenarioCase) -> E2eResult<&PageDefinition> {
        let page = self.get(&case.page)?;
        for (name, value) in case.inputs.iter() {
            page.catalog.validate_value(name, value)?;
        }
        Ok(page)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageDefinition> {
        self.pages.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pages_cover_all_fields() {
        let registry = PageRegistry::builtin().unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, [CREATE_CUSTOMER, NEW_CUSTOMER, REGISTRATION]);

        let mut fields: Vec<String> = registry
            .iter()
            .flat_map(|p| p.catalog.fields().iter().map(|f| f.name.clone()))
            .collect();
        fields.sort();
        fields.dedup();
        for required in [
            "First Name",
            "Last Name",
            "Email",
            "Password",
            "Confirm Password",
            "Phone Number",
            "Address",
            "City",
            "State",
            "Zip Code",
        ] {
            assert!(fields.iter().any(|f| f == required), "missing {}", required);
        }
    }

    #[test]
    fn test_new_customer_keys_derived_from_names() {
        let page = new_customer().unwrap();
        assert_eq!(
            page.catalog.resolve_locator("Phone Number").unwrap().as_str(),
            "customer-phone-number"
        );
        let strategies = page.catalog.strategies("Phone Number").unwrap();
        assert_eq!(strategies.fallbacks(), &[Locator::role("textbox", "Phone Number")]);
    }

    #[test]
    fn test_state_is_a_choice() {
        let page = create_customer().unwrap();
        assert!(page.catalog.validate_value("State", "CA").is_ok());
        assert!(matches!(
            page.catalog.validate_value("State", "California"),
            Err(E2eError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_unknown_page() {
        let registry = PageRegistry::builtin().unwrap();
        assert!(matches!(registry.get("checkout"), Err(E2eError::UnknownPage(_))));
    }

    #[test]
    fn test_load_page_from_yaml() {
        let yaml = r#"
name: checkout
route: /checkout
fields:
  - name: Card Number
    locator_key: cardNumber
  - name: Country
    locator_key: country
    kind: { type: choice, options: [US, CA] }
submit:
  - { kind: test_id, key: payButton }
outcomes:
  error_message:
    - { kind: test_id, key: paymentError }
    - { kind: text, text: declined }
  success_message:
    - { kind: test_id, key: receipt }
"#;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("checkout.yaml"), yaml).unwrap();

        let mut registry = PageRegistry::builtin().unwrap();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 1);

        let page = registry.get("checkout").unwrap();
        assert!(page.catalog.field("Country").unwrap().is_choice());
        assert_eq!(page.outcomes.error_message.fallbacks(), &[Locator::text("declined")]);
    }

    #[test]
    fn test_page_without_outcomes_rejected() {
        let yaml = r#"
name: broken
route: /broken
fields: []
submit: [{ kind: test_id, key: go }]
"#;
        assert!(PageDefinition::from_yaml(yaml).is_err());
    }
}
