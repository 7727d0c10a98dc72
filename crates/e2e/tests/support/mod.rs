//! In-memory stand-in for the forms application.
//!
//! `FakeLauncher` hands out `FakeSession`s that render the registration,
//! create-customer and new-customer screens as flat element lists and apply
//! the same validation rules and messages as the real application.
//! `FakeBackend` holds state shared by every session (seeded accounts and
//! customers, database availability) and doubles as the fixture hooks.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use formflow_e2e::assertion::url_matches_route;
use formflow_e2e::{
    BrowserDriver, BrowserLauncher, E2eError, E2eResult, FixtureHooks, Locator, RunnerConfig,
    SetupAction, Timeouts,
};

pub const BASE_URL: &str = "http://fake.local";
pub const SCENARIOS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios");

pub const WEAK_PASSWORD: &str = "Password must be at least 8 characters long and contain at least one uppercase letter, one lowercase letter, one number, and one special character";

/// Short waits so negative lookups do not slow the suite down
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        navigation_ms: 200,
        action_ms: 50,
        outcome_primary_ms: 60,
        outcome_fallback_ms: 40,
        settle_ms: 20,
        poll_interval_ms: 5,
        scenario_ms: 5_000,
    }
}

pub fn runner_config(dir: &Path, workers: usize) -> RunnerConfig {
    RunnerConfig {
        timeouts: fast_timeouts(),
        workers,
        output_dir: dir.to_path_buf(),
        screenshot_dir: dir.join("screenshots"),
    }
}

/// Knobs for misbehaving application builds
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeOptions {
    /// Render no `data-testid` attributes on the new-customer screen
    pub hide_test_ids: bool,

    /// Submitting renders nothing at all
    pub silent: bool,

    /// Element lookups never return, like a wedged browser
    pub hang: bool,
}

/// State every session can see
#[derive(Default)]
pub struct FakeBackend {
    accounts: Mutex<HashSet<String>>,
    customers: Mutex<HashSet<String>>,
    database_down: AtomicBool,
    next_id: AtomicUsize,
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    /// `apply`/`revert` calls in order
    pub hook_log: Mutex<Vec<String>>,
    /// Every `is_visible` probe, rendered as its locator
    pub probes: Mutex<Vec<String>>,
    pub fail_revert: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hook_log(&self) -> Vec<String> {
        self.hook_log.lock().unwrap().clone()
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn database_available(&self) -> bool {
        !self.database_down.load(Ordering::SeqCst)
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts.lock().unwrap().contains(email)
    }

    fn next_customer_id(&self) -> String {
        format!("C-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl FixtureHooks for FakeBackend {
    async fn apply(&self, action: &SetupAction) -> E2eResult<()> {
        self.hook_log.lock().unwrap().push(format!("apply {}", action));
        match action {
            SetupAction::ExistingAccount { email } => {
                self.accounts.lock().unwrap().insert(email.clone());
            }
            SetupAction::ExistingCustomer { email } => {
                self.customers.lock().unwrap().insert(email.clone());
            }
            SetupAction::DatabaseUnavailable => self.database_down.store(true, Ordering::SeqCst),
        }
        Ok(())
    }

    async fn revert(&self, action: &SetupAction) -> E2eResult<()> {
        self.hook_log.lock().unwrap().push(format!("revert {}", action));
        if self.fail_revert.load(Ordering::SeqCst) {
            return Err(E2eError::Hook {
                action: action.to_string(),
                reason: "503 Service Unavailable".into(),
            });
        }
        match action {
            SetupAction::ExistingAccount { email } => {
                self.accounts.lock().unwrap().remove(email);
            }
            SetupAction::ExistingCustomer { email } => {
                self.customers.lock().unwrap().remove(email);
            }
            SetupAction::DatabaseUnavailable => self.database_down.store(false, Ordering::SeqCst),
        }
        Ok(())
    }
}

pub struct FakeLauncher {
    backend: Arc<FakeBackend>,
    options: FakeOptions,
}

impl FakeLauncher {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        Self::with_options(backend, FakeOptions::default())
    }

    pub fn with_options(backend: Arc<FakeBackend>, options: FakeOptions) -> Self {
        Self { backend, options }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserDriver>> {
        self.backend.launches.fetch_add(1, Ordering::SeqCst);
        let active = self.backend.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.backend.max_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(FakeSession::new(self.backend.clone(), self.options)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Login,
    Submit,
}

#[derive(Debug, Clone)]
struct Element {
    test_id: Option<String>,
    role: Option<(&'static str, String)>,
    text: String,
    /// Field label for inputs
    input: Option<&'static str>,
    action: Option<Action>,
}

impl Element {
    fn input(test_id: Option<String>, label: &'static str, role: &'static str) -> Self {
        Self {
            test_id,
            role: Some((role, label.to_string())),
            text: String::new(),
            input: Some(label),
            action: None,
        }
    }

    fn button(test_id: Option<&str>, name: &str, action: Action) -> Self {
        Self {
            test_id: test_id.map(str::to_string),
            role: Some(("button", name.to_string())),
            text: name.to_string(),
            input: None,
            action: Some(action),
        }
    }

    fn message(test_id: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            test_id: test_id.map(str::to_string),
            role: None,
            text: text.into(),
            input: None,
            action: None,
        }
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::TestId { key } => self.test_id.as_deref() == Some(key.as_str()),
            Locator::Role { role, name } => self
                .role
                .as_ref()
                .map_or(false, |(r, n)| *r == role.as_str() && n == name),
            Locator::Text { text } => {
                !self.text.is_empty() && self.text.to_lowercase().contains(&text.to_lowercase())
            }
        }
    }
}

/// What the current screen shows after a submission
#[derive(Debug, Clone)]
enum Rendered {
    Error(String),
    Created { id: String },
}

const REGISTRATION_FIELDS: &[(&str, &str)] = &[
    ("First Name", "firstName"),
    ("Last Name", "lastName"),
    ("Email", "email"),
    ("Password", "password"),
    ("Confirm Password", "confirmPassword"),
];

const CREATE_CUSTOMER_FIELDS: &[(&str, &str)] = &[
    ("First Name", "firstName"),
    ("Last Name", "lastName"),
    ("Email", "email"),
    ("Phone Number", "phoneNumber"),
    ("Address", "address"),
    ("City", "city"),
    ("State", "state"),
    ("Zip Code", "zipCode"),
];

const NEW_CUSTOMER_FIELDS: &[&str] = &["First Name", "Last Name", "Email", "Phone Number", "Address"];

/// One browser context
pub struct FakeSession {
    backend: Arc<FakeBackend>,
    options: FakeOptions,
    path: String,
    logged_in: bool,
    form: Vec<(&'static str, String)>,
    rendered: Option<Rendered>,
    /// Accounts/customers created through this session only
    created: HashSet<String>,
    closed: bool,
}

impl FakeSession {
    fn new(backend: Arc<FakeBackend>, options: FakeOptions) -> Self {
        Self {
            backend,
            options,
            path: "/".to_string(),
            logged_in: false,
            form: Vec::new(),
            rendered: None,
            created: HashSet::new(),
            closed: false,
        }
    }

    fn value(&self, label: &str) -> &str {
        self.form
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| v.trim())
            .unwrap_or("")
    }

    fn elements(&self) -> Vec<Element> {
        let mut elements = Vec::new();
        if self.logged_in {
            let mut logout = Element::button(Some("logoutButton"), "Logout", Action::Login);
            logout.action = None;
            elements.push(logout);
        }

        match self.path.as_str() {
            "/login" => {
                elements.push(Element::input(Some("username".into()), "Username", "textbox"));
                elements.push(Element::input(Some("password".into()), "Password", "textbox"));
                elements.push(Element::button(Some("loginButton"), "Login", Action::Login));
            }
            "/register" => {
                for &(label, id) in REGISTRATION_FIELDS {
                    elements.push(Element::input(Some(id.to_string()), label, "textbox"));
                }
                elements.push(Element::button(Some("registerButton"), "Register", Action::Submit));
                if let Some(Rendered::Error(msg)) = &self.rendered {
                    elements.push(Element::message(Some("errorMessage"), msg.clone()));
                }
            }
            "/success" => elements.push(Element::message(None, "Welcome aboard")),
            "/create-customer" => {
                for &(label, id) in CREATE_CUSTOMER_FIELDS {
                    let role = if label == "State" { "combobox" } else { "textbox" };
                    elements.push(Element::input(Some(id.to_string()), label, role));
                }
                elements.push(Element::button(Some("submitButton"), "Create", Action::Submit));
                match &self.rendered {
                    Some(Rendered::Error(msg)) => {
                        elements.push(Element::message(Some("errorMessage"), msg.clone()))
                    }
                    Some(Rendered::Created { id }) => {
                        elements.push(Element::message(Some("customerId"), id.clone()));
                        elements.push(Element::message(
                            Some("successMessage"),
                            "Customer created successfully",
                        ));
                        elements.push(Element::message(Some("searchResultsTable"), id.clone()));
                    }
                    None => {}
                }
            }
            "/new-customer" => {
                let hide = self.options.hide_test_ids;
                let tid = |id: &str| (!hide).then(|| id.to_string());
                for &label in NEW_CUSTOMER_FIELDS {
                    let id = format!("customer-{}", label.to_lowercase().replace(' ', "-"));
                    elements.push(Element::input(tid(&id), label, "textbox"));
                }
                elements.push(Element::button(
                    tid("submit").as_deref(),
                    "Submit",
                    Action::Submit,
                ));
                match &self.rendered {
                    Some(Rendered::Error(msg)) => elements.push(Element::message(
                        tid("error-message").as_deref(),
                        format!("Error: {}", msg),
                    )),
                    Some(Rendered::Created { id }) => {
                        elements.push(Element::message(
                            tid("customer-id").as_deref(),
                            format!("Customer ID: {}", id),
                        ));
                        elements.push(Element::message(
                            tid("success-message").as_deref(),
                            "Customer created successfully",
                        ));
                    }
                    None => {}
                }
            }
            _ => {}
        }
        elements
    }

    fn find(&self, locator: &Locator) -> E2eResult<Element> {
        self.elements()
            .into_iter()
            .find(|e| e.matches(locator))
            .ok_or_else(|| E2eError::Driver(format!("no element matches {}", locator)))
    }

    fn write(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let label = self
            .find(locator)?
            .input
            .ok_or_else(|| E2eError::Driver(format!("{} is not an input", locator)))?;
        self.form.retain(|(l, _)| *l != label);
        self.form.push((label, value.to_string()));
        Ok(())
    }

    fn login(&mut self) {
        if self.value("Username") == "csr" && self.value("Password") == "password" {
            self.logged_in = true;
            self.path = "/dashboard".to_string();
            self.form.clear();
        } else {
            self.rendered = Some(Rendered::Error("Invalid credentials".into()));
        }
    }

    fn submit(&mut self) {
        if self.options.silent {
            return;
        }
        let result = match self.path.as_str() {
            "/register" => self.submit_registration(),
            "/create-customer" => self.submit_customer(true),
            "/new-customer" => self.submit_customer(false),
            _ => return,
        };
        match result {
            Ok(Some(id)) => self.rendered = Some(Rendered::Created { id }),
            Ok(None) => {
                self.path = "/success".to_string();
                self.rendered = None;
            }
            Err(msg) => self.rendered = Some(Rendered::Error(msg.to_string())),
        }
    }

    fn submit_registration(&mut self) -> Result<Option<String>, String> {
        if self.value("First Name").is_empty() {
            return Err("First name is required".into());
        }
        if self.value("Last Name").is_empty() {
            return Err("Last name is required".into());
        }
        let email = self.value("Email").to_string();
        if email.is_empty() {
            return Err("Email is required".into());
        }
        if !valid_email(&email) {
            return Err("Invalid email format".into());
        }
        if self.backend.has_account(&email) || self.created.contains(&email) {
            return Err("Email address is already registered".into());
        }
        let password = self.value("Password");
        if !strong_password(password) {
            return Err(WEAK_PASSWORD.into());
        }
        if password != self.value("Confirm Password") {
            return Err("Passwords do not match".into());
        }
        self.created.insert(email);
        Ok(None)
    }

    fn submit_customer(&mut self, capitalized: bool) -> Result<Option<String>, String> {
        for label in ["First Name", "Last Name", "Email"] {
            if self.value(label).is_empty() {
                return Err(if capitalized {
                    format!("{} is required", label)
                } else {
                    "Required fields are missing".to_string()
                });
            }
        }
        let email = self.value("Email").to_string();
        if !valid_email(&email) {
            return Err("Invalid email format".into());
        }
        let phone = self.value("Phone Number");
        if !phone.is_empty() && !valid_phone(phone) {
            return Err("Invalid phone number format".into());
        }
        let zip = self.value("Zip Code");
        if !zip.is_empty() && !valid_zip(zip) {
            return Err("Invalid zip code format".into());
        }
        if !self.backend.database_available() {
            return Err("Database unavailable".into());
        }
        let exists = self.backend.customers.lock().unwrap().contains(&email);
        if exists || self.created.contains(&email) {
            return Err("Email already exists".into());
        }
        self.created.insert(email);
        Ok(Some(self.backend.next_customer_id()))
    }
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    local_ok && domain_ok
}

fn valid_phone(phone: &str) -> bool {
    let groups: Vec<&str> = phone.split('-').collect();
    groups.len() == 3
        && [3, 3, 4]
            .iter()
            .zip(&groups)
            .all(|(len, g)| g.len() == *len && g.chars().all(|c| c.is_ascii_digit()))
}

fn valid_zip(zip: &str) -> bool {
    let digits = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
    match zip.split_once('-') {
        Some((five, four)) => digits(five, 5) && digits(four, 4),
        None => digits(zip, 5),
    }
}

fn strong_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

fn requires_login(path: &str) -> bool {
    matches!(path, "/create-customer" | "/new-customer")
}

#[async_trait]
impl BrowserDriver for FakeSession {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        let path = url.strip_prefix(BASE_URL).unwrap_or(url);
        self.path = if requires_login(path) && !self.logged_in {
            "/login".to_string()
        } else {
            path.to_string()
        };
        self.form.clear();
        self.rendered = None;
        Ok(())
    }

    async fn wait_for_url(&mut self, route: &str, _timeout: Duration) -> E2eResult<bool> {
        Ok(url_matches_route(&self.path, route))
    }

    async fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> E2eResult<bool> {
        if self.options.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.elements().iter().any(|e| e.matches(locator)))
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.write(locator, value)
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.write(locator, value)
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        match self.find(locator)?.action {
            Some(Action::Login) if self.path == "/login" => self.login(),
            Some(Action::Submit) => self.submit(),
            _ => {}
        }
        Ok(())
    }

    async fn text_content(&mut self, locator: &Locator) -> E2eResult<Option<String>> {
        let text = self.find(locator)?.text;
        Ok((!text.is_empty()).then_some(text))
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        if self.options.hang {
            std::future::pending::<()>().await;
        }
        self.backend.probes.lock().unwrap().push(locator.to_string());
        Ok(self.elements().iter().any(|e| e.matches(locator)))
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        Ok(format!("{}{}", BASE_URL, self.path))
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        std::fs::write(path, format!("fake-png {}", self.path))?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if !self.closed {
            self.closed = true;
            self.backend.closes.fetch_add(1, Ordering::SeqCst);
            self.backend.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
