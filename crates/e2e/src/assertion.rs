//! Assertion contract: expected outcome shapes and how they are checked

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{E2eError, E2eResult};

/// How an observed message is compared with the expected text.
///
/// Always stated per scenario. A bare string in a table means `exact`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Whole message, ignoring surrounding whitespace
    #[default]
    Exact,
    Contains,
    ContainsIgnoreCase,
    /// Any non-empty message; `text` is ignored
    Present,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageExpectation {
    pub text: String,
    #[serde(rename = "match")]
    pub policy: MatchPolicy,
}

impl MessageExpectation {
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            policy: MatchPolicy::Exact,
        }
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            policy: MatchPolicy::Contains,
        }
    }

    pub fn contains_ignore_case(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            policy: MatchPolicy::ContainsIgnoreCase,
        }
    }

    pub fn present() -> Self {
        Self {
            text: String::new(),
            policy: MatchPolicy::Present,
        }
    }

    pub fn matches(&self, actual: &str) -> bool {
        let actual = actual.trim();
        match self.policy {
            MatchPolicy::Exact => actual == self.text,
            MatchPolicy::Contains => actual.contains(&self.text),
            MatchPolicy::ContainsIgnoreCase => actual
                .to_lowercase()
                .contains(&self.text.to_lowercase()),
            MatchPolicy::Present => !actual.is_empty(),
        }
    }
}

impl fmt::Display for MessageExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.policy {
            MatchPolicy::Exact => write!(f, "\"{}\"", self.text),
            MatchPolicy::Contains => write!(f, "containing \"{}\"", self.text),
            MatchPolicy::ContainsIgnoreCase => {
                write!(f, "containing \"{}\" (any case)", self.text)
            }
            MatchPolicy::Present => f.write_str("any message"),
        }
    }
}

impl<'de> Deserialize<'de> for MessageExpectation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bare(String),
            Full {
                #[serde(default)]
                text: String,
                #[serde(rename = "match", default)]
                policy: MatchPolicy,
            },
        }

        let (text, policy) = match Raw::deserialize(deserializer)? {
            Raw::Bare(text) => (text, MatchPolicy::Exact),
            Raw::Full { text, policy } => (text, policy),
        };
        if text.is_empty() && policy != MatchPolicy::Present {
            return Err(serde::de::Error::custom(
                "message text is required unless match is 'present'",
            ));
        }
        Ok(Self { text, policy })
    }
}

/// Legal expected-outcome shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpectedOutcome {
    Success {
        /// A generated identifier must be shown
        #[serde(default)]
        identifier_present: bool,

        #[serde(default)]
        message: Option<MessageExpectation>,

        /// The page must end up on this route
        #[serde(default)]
        route: Option<String>,

        /// Visibility of the page's result view (e.g. search results)
        #[serde(default)]
        result_visible: Option<bool>,
    },
    Failure {
        message: MessageExpectation,
    },
}

impl ExpectedOutcome {
    pub fn created(message: impl Into<String>) -> Self {
        ExpectedOutcome::Success {
            identifier_present: true,
            message: Some(MessageExpectation::exact(message)),
            route: None,
            result_visible: None,
        }
    }

    pub fn failure(message: MessageExpectation) -> Self {
        ExpectedOutcome::Failure { message }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExpectedOutcome::Success { .. })
    }

    /// Compare with what the page showed, listing every difference
    pub fn check(&self, scenario: &str, observed: &Outcome) -> E2eResult<()> {
        let mut problems = Vec::new();

        match self {
            ExpectedOutcome::Success {
                identifier_present,
                message,
                route,
                result_visible,
            } => {
                if observed.status != OutcomeStatus::Success {
                    problems.push("status was failure".to_string());
                }
                if *identifier_present
                    && observed.identifier.as_deref().map_or(true, |id| id.trim().is_empty())
                {
                    problems.push("no generated identifier".to_string());
                }
                if let Some(expected) = message {
                    check_message(expected, observed.message.as_deref(), &mut problems);
                }
                if let Some(route) = route {
                    let on_route = observed
                        .url
                        .as_deref()
                        .map_or(false, |url| url_matches_route(url, route));
                    if !on_route {
                        problems.push(format!("not on route {}", route));
                    }
                }
                if let Some(visible) = result_visible {
                    if observed.result_visible != Some(*visible) {
                        problems.push(format!("result view visibility was not {}", visible));
                    }
                }
            }
            ExpectedOutcome::Failure { message } => {
                if observed.status != OutcomeStatus::Failure {
                    problems.push("status was success".to_string());
                }
                check_message(message, observed.message.as_deref(), &mut problems);
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(E2eError::AssertionMismatch {
                scenario: scenario.to_string(),
                expected: self.to_string(),
                actual: format!("{} [{}]", observed, problems.join("; ")),
            })
        }
    }
}

fn check_message(expected: &MessageExpectation, actual: Option<&str>, problems: &mut Vec<String>) {
    match actual {
        Some(text) if expected.matches(text) => {}
        Some(text) => problems.push(format!("message \"{}\" is not {}", text.trim(), expected)),
        None => problems.push(format!("no message, wanted {}", expected)),
    }
}

/// True when the path of `url` ends with `route`. The root route `/` only
/// matches the root path. `url` may be absolute or a bare path.
pub fn url_matches_route(url: &str, route: &str) -> bool {
    let parsed = reqwest::Url::parse(url).ok();
    let path = match &parsed {
        Some(parsed) => parsed.path(),
        None => url.split(['?', '#']).next().unwrap_or(url),
    };
    let path = path.trim_end_matches('/');
    let route = route.trim_end_matches('/');
    if route.is_empty() {
        return path.is_empty();
    }
    path.ends_with(route)
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedOutcome::Success {
                identifier_present,
                message,
                route,
                result_visible,
            } => {
                f.write_str("Success")?;
                if *identifier_present {
                    f.write_str(" with identifier")?;
                }
                if let Some(m) = message {
                    write!(f, ", message {}", m)?;
                }
                if let Some(r) = route {
                    write!(f, ", route {}", r)?;
                }
                if let Some(v) = result_visible {
                    write!(f, ", result visible={}", v)?;
                }
                Ok(())
            }
            ExpectedOutcome::Failure { message } => write!(f, "Failure, message {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// What the page showed after submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub message: Option<String>,
    pub identifier: Option<String>,
    pub url: Option<String>,
    pub result_visible: Option<bool>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: None,
            identifier: None,
            url: None,
            result_visible: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            message: Some(message.into()),
            identifier: None,
            url: None,
            result_visible: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            OutcomeStatus::Success => f.write_str("Success")?,
            OutcomeStatus::Failure => f.write_str("Failure")?,
        }
        if let Some(id) = &self.identifier {
            write!(f, ", identifier \"{}\"", id.trim())?;
        }
        if let Some(m) = &self.message {
            write!(f, ", message \"{}\"", m.trim())?;
        }
        if let Some(url) = &self.url {
            write!(f, ", url {}", url)?;
        }
        if let Some(v) = self.result_visible {
            write!(f, ", result visible={}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_rejects_degraded_text() {
        let expected = MessageExpectation::exact("Invalid email format");
        assert!(expected.matches("Invalid email format"));
        assert!(expected.matches("  Invalid email format\n"));
        assert!(!expected.matches("Invalid email"));
        assert!(!expected.matches("Error: Invalid email format"));
    }

    #[test]
    fn test_contains_policies() {
        assert!(MessageExpectation::contains("required").matches("First Name is required"));
        assert!(!MessageExpectation::contains("invalid email").matches("Invalid email format"));
        assert!(MessageExpectation::contains_ignore_case("invalid email")
            .matches("Invalid Email format"));
        assert!(MessageExpectation::present().matches("anything"));
        assert!(!MessageExpectation::present().matches("   "));
    }

    #[test]
    fn test_bare_string_is_exact() {
        let m: MessageExpectation = serde_yaml::from_str("\"Passwords do not match\"").unwrap();
        assert_eq!(m.policy, MatchPolicy::Exact);

        let m: MessageExpectation =
            serde_yaml::from_str("{ text: invalid phone, match: contains_ignore_case }").unwrap();
        assert_eq!(m.policy, MatchPolicy::ContainsIgnoreCase);

        let m: MessageExpectation = serde_yaml::from_str("{ match: present }").unwrap();
        assert_eq!(m.policy, MatchPolicy::Present);

        assert!(serde_yaml::from_str::<MessageExpectation>("{ match: contains }").is_err());
    }

    #[test]
    fn test_success_check() {
        let expected = ExpectedOutcome::created("Customer created successfully");
        let mut observed = Outcome::success();
        observed.identifier = Some("CUST-0001".into());
        observed.message = Some("Customer created successfully".into());
        assert!(expected.check("valid customer", &observed).is_ok());

        observed.identifier = Some("  ".into());
        let err = expected.check("valid customer", &observed).unwrap_err();
        assert!(err.to_string().contains("no generated identifier"));
    }

    #[test]
    fn test_failure_check_reports_both_sides() {
        let expected = ExpectedOutcome::failure(MessageExpectation::exact("First name is required"));
        let observed = Outcome::failure("Email is required");
        match expected.check("missing first name", &observed).unwrap_err() {
            E2eError::AssertionMismatch {
                scenario,
                expected,
                actual,
            } => {
                assert_eq!(scenario, "missing first name");
                assert!(expected.contains("First name is required"));
                assert!(actual.contains("Email is required"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_success_expected_but_failure_observed() {
        let expected = ExpectedOutcome::Success {
            identifier_present: false,
            message: None,
            route: Some("/success".into()),
            result_visible: None,
        };
        let err = expected
            .check("registration", &Outcome::failure("Invalid email format"))
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("status was failure"));
        assert!(text.contains("not on route /success"));
    }

    #[test]
    fn test_url_matches_route() {
        assert!(url_matches_route("http://127.0.0.1:3000/success", "/success"));
        assert!(url_matches_route("http://127.0.0.1:3000/success/?x=1", "/success"));
        assert!(!url_matches_route("http://127.0.0.1:3000/register", "/success"));
        assert!(url_matches_route("/success#done", "/success"));
    }

    #[test]
    fn test_root_route_matches_only_root() {
        assert!(url_matches_route("http://127.0.0.1:3000/", "/"));
        assert!(url_matches_route("http://127.0.0.1:3000", "/"));
        assert!(url_matches_route("http://127.0.0.1:3000/?next=1", "/"));
        assert!(url_matches_route("/", "/"));
        assert!(!url_matches_route("http://127.0.0.1:3000/register", "/"));
        assert!(!url_matches_route("/register", "/"));
    }

    #[test]
    fn test_expected_outcome_yaml() {
        let yaml = r#"
outcome: success
identifier_present: true
message: Customer created successfully
result_visible: true
"#;
        let expected: ExpectedOutcome = serde_yaml::from_str(yaml).unwrap();
        assert!(expected.is_success());

        let yaml = r#"
outcome: failure
message:
  text: invalid email
  match: contains_ignore_case
"#;
        let expected: ExpectedOutcome = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            expected,
            ExpectedOutcome::failure(MessageExpectation::contains_ignore_case("invalid email"))
        );
    }
}
