//! Out-of-band fixture hooks
//!
//! Some scenarios need application state that the UI under test cannot
//! create by itself: an account that already exists, or a database that is
//! down. Those are applied before the session starts and reverted after it
//! ends, through a test-support API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HooksConfig;
use crate::error::{E2eError, E2eResult};

/// State mutation performed before a scenario and undone after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupAction {
    /// A registered account with this email exists
    ExistingAccount { email: String },

    /// A customer record with this email exists
    ExistingCustomer { email: String },

    /// The application's database rejects all requests
    DatabaseUnavailable,
}

impl SetupAction {
    /// Whether the action changes state every concurrent scenario can observe.
    ///
    /// Scenarios with such actions are run one at a time.
    pub fn is_global(&self) -> bool {
        matches!(self, SetupAction::DatabaseUnavailable)
    }
}

impl fmt::Display for SetupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupAction::ExistingAccount { email } => write!(f, "existing account {}", email),
            SetupAction::ExistingCustomer { email } => write!(f, "existing customer {}", email),
            SetupAction::DatabaseUnavailable => f.write_str("database unavailable"),
        }
    }
}

/// Backend that can apply and revert setup actions
#[async_trait]
pub trait FixtureHooks: Send + Sync {
    async fn apply(&self, action: &SetupAction) -> E2eResult<()>;

    /// Undo `action`. Must succeed even if `apply` only partially ran.
    async fn revert(&self, action: &SetupAction) -> E2eResult<()>;
}

/// Fixture hooks backed by the application's test-support HTTP API
///
/// | action | apply | revert |
/// |---|---|---|
/// | existing account | `POST /accounts` | `DELETE /accounts/{email}` |
/// | existing customer | `POST /customers` | `DELETE /customers/{email}` |
/// | database unavailable | `PUT /database {available:false}` | `PUT /database {available:true}` |
pub struct HttpFixtureHooks {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct DatabaseBody {
    available: bool,
}

impl HttpFixtureHooks {
    pub fn new(config: &HooksConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of one record under `collection`, keyed by email
    fn record_url(&self, collection: &str, email: &str) -> String {
        self.url(&format!("/{}/{}", collection, urlencoding::encode(email)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        action: &SetupAction,
        request: reqwest::RequestBuilder,
        allow_missing: bool,
    ) -> E2eResult<()> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() || (allow_missing && status == reqwest::StatusCode::NOT_FOUND) {
            debug!("Fixture hook '{}' -> {}", action, status);
            return Ok(());
        }
        let reason = match response.text().await {
            Ok(body) => format!("{} {}", status, body.trim()),
            Err(e) => format!("{} (body unreadable: {})", status, e),
        };
        Err(E2eError::Hook {
            action: action.to_string(),
            reason,
        })
    }
}

#[async_trait]
impl FixtureHooks for HttpFixtureHooks {
    async fn apply(&self, action: &SetupAction) -> E2eResult<()> {
        info!("Applying fixture: {}", action);
        let request = match action {
            SetupAction::ExistingAccount { email } => self
                .client
                .post(self.url("/accounts"))
                .json(&EmailBody { email }),
            SetupAction::ExistingCustomer { email } => self
                .client
                .post(self.url("/customers"))
                .json(&EmailBody { email }),
            SetupAction::DatabaseUnavailable => self
                .client
                .put(self.url("/database"))
                .json(&DatabaseBody { available: false }),
        };
        self.send(action, request, false).await
    }

    async fn revert(&self, action: &SetupAction) -> E2eResult<()> {
        info!("Reverting fixture: {}", action);
        // Deleting something that was never created is not an error
        let (request, allow_missing) = match action {
            SetupAction::ExistingAccount { email } => (
                self.client.delete(self.record_url("accounts", email)),
                true,
            ),
            SetupAction::ExistingCustomer { email } => (
                self.client.delete(self.record_url("customers", email)),
                true,
            ),
            SetupAction::DatabaseUnavailable => (
                self.client
                    .put(self.url("/database"))
                    .json(&DatabaseBody { available: true }),
                false,
            ),
        };
        self.send(action, request, allow_missing).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_action_yaml() {
        let yaml = r#"
- existing_account:
    email: existing@example.com
- database_unavailable
"#;
        let actions: Vec<SetupAction> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            actions[0],
            SetupAction::ExistingAccount {
                email: "existing@example.com".into()
            }
        );
        assert_eq!(actions[1], SetupAction::DatabaseUnavailable);
        assert!(!actions[0].is_global());
        assert!(actions[1].is_global());
    }

    #[test]
    fn test_record_url_encodes_email() {
        let hooks = HttpFixtureHooks::new(&HooksConfig {
            base_url: "http://127.0.0.1:3000/__test".into(),
            token: None,
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(
            hooks.record_url("accounts", "john.doe@example.com"),
            "http://127.0.0.1:3000/__test/accounts/john.doe%40example.com"
        );
        assert_eq!(
            hooks.record_url("customers", "a b/c"),
            "http://127.0.0.1:3000/__test/customers/a%20b%2Fc"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let hooks = HttpFixtureHooks::new(&HooksConfig {
            base_url: "http://127.0.0.1:3000/__test/".into(),
            token: None,
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(hooks.url("/accounts"), "http://127.0.0.1:3000/__test/accounts");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_an_error() {
        let hooks = HttpFixtureHooks::new(&HooksConfig {
            base_url: "http://127.0.0.1:9".into(),
            token: None,
            timeout_secs: 1,
        })
        .unwrap();
        let result = hooks.apply(&SetupAction::DatabaseUnavailable).await;
        assert!(matches!(result, Err(E2eError::Http(_))));
    }
}
