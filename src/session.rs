//! Signed-in session: HRMS login, profile enrichment and the stored blobs
//!
//! A session is three JSON blobs in the cache store (user, employee and
//! company). Their presence and shape is the only validity check; anything
//! incomplete is torn down on load.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::api::types::lenient_string;
use crate::cache::{Identity, JsonStore};

pub const USER_KEY: &str = "hrms_user";
pub const EMPLOYEE_KEY: &str = "hrms_employee";
pub const COMPANY_KEY: &str = "hrms_company";
pub const COOKIES_KEY: &str = "hrms_cookies";

const DEFAULT_COMPANY_ID: &str = "gopocket";
const FALLBACK_EMAIL_DOMAIN: &str = "gopocket.in";
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("Invalid employee ID or password")]
    InvalidCredentials,

    #[error("{0}")]
    LoginFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Employee,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub employee_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub company_id: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Employee {
    pub id: String,
    pub employee_id: String,
    pub user_id: String,
    pub company_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joining_date: Option<String>,
    pub status: String,
    /// Employee ids reporting to this employee
    pub team: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub employee: Employee,
    pub company: Company,
}

impl Session {
    /// The identity that scopes cached data for this session
    pub fn identity(&self) -> Identity {
        Identity::new(&self.employee.employee_id, &self.user.email)
    }

    fn is_complete(&self) -> bool {
        !self.user.id.is_empty() && !self.employee.employee_id.is_empty()
    }
}

/// Reads and writes the session blobs
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: JsonStore,
}

impl SessionStore {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Returns the stored session, tearing down any partial or malformed one
    pub fn load(&self) -> Result<Session, SessionError> {
        let user = self.store.read::<User>(USER_KEY);
        let employee = self.store.read::<Employee>(EMPLOYEE_KEY);
        let company = self.store.read::<Company>(COMPANY_KEY);

        if let (Some(user), Some(employee), Some(company)) = (user, employee, company) {
            let session = Session {
                user,
                employee,
                company,
            };
            if session.is_complete() {
                return Ok(session);
            }
        }

        if self.has_any() {
            tracing::warn!("stored session is incomplete, clearing it");
            self.teardown();
        }
        Err(SessionError::NotSignedIn)
    }

    fn has_any(&self) -> bool {
        [USER_KEY, EMPLOYEE_KEY, COMPANY_KEY]
            .iter()
            .any(|key| self.store.contains(key))
    }

    pub fn save(&self, session: &Session) {
        self.store.write(USER_KEY, &session.user);
        self.store.write(EMPLOYEE_KEY, &session.employee);
        self.store.write(COMPANY_KEY, &session.company);
    }

    /// Removes every session blob
    pub fn teardown(&self) {
        for key in [USER_KEY, EMPLOYEE_KEY, COMPANY_KEY, COOKIES_KEY] {
            self.store.delete(key);
        }
    }
}

// ============================================================================
// Login
// ============================================================================

/// Decodes the team roster, which arrives as a JSON-encoded string list
fn lenient_roster<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::String(s)) => serde_json::from_str::<Vec<Value>>(&s).unwrap_or_default(),
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Profile record returned by the enrichment webhook
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiProfile {
    #[serde(deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    employee: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    company: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    first_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    last_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    company_email: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    personal_email: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    cell_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    image: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    department: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    designation: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    date_of_joining: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    status: Option<String>,
    #[serde(deserialize_with = "lenient_roster")]
    team: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    creation: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    modified: Option<String>,
}

fn company_slug(name: Option<&str>) -> String {
    name.map(|n| {
        n.to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    })
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| DEFAULT_COMPANY_ID.to_string())
}

impl ApiProfile {
    fn into_employee(self, employee_id: &str, asset_base: &str) -> Employee {
        let avatar = self.image.map(|image| {
            if image.starts_with("http") {
                image
            } else {
                format!("{}{}", asset_base, image)
            }
        });
        let active = self
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("active"));
        let id = self.name.unwrap_or_else(|| employee_id.to_string());
        Employee {
            user_id: id.clone(),
            id,
            employee_id: self.employee.unwrap_or_else(|| employee_id.to_string()),
            company_id: company_slug(self.company.as_deref()),
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self
                .company_email
                .or(self.personal_email)
                .unwrap_or_else(|| fallback_email(employee_id)),
            phone: self.cell_number,
            avatar,
            department: self.department,
            designation: self.designation,
            joining_date: self.date_of_joining,
            status: if active { "confirmed" } else { "probation" }.to_string(),
            team: self.team,
            created_at: self.creation,
            updated_at: self.modified,
        }
    }
}

fn fallback_email(employee_id: &str) -> String {
    format!("{}@{}", employee_id, FALLBACK_EMAIL_DOMAIN)
}

/// Profile used when enrichment is unavailable
fn minimal_employee(employee_id: &str) -> Employee {
    Employee {
        id: employee_id.to_string(),
        employee_id: employee_id.to_string(),
        user_id: employee_id.to_string(),
        company_id: DEFAULT_COMPANY_ID.to_string(),
        email: fallback_email(employee_id),
        status: "probation".to_string(),
        ..Default::default()
    }
}

/// Picks the error message out of a failed login response
fn login_error_message(body: &Value, status: u16) -> String {
    ["message", "exc", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Authentication failed with status {}", status))
}

fn role_for(employee_id: &str, employee: &Employee) -> Role {
    if employee_id.eq_ignore_ascii_case("hr001") {
        Role::Admin
    } else if employee
        .designation
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains("manager"))
    {
        Role::Manager
    } else {
        Role::Employee
    }
}

/// Assembles the session from the login response and the (optional) profile
fn build_session(
    employee_id: &str,
    login: &Value,
    employee: Option<Employee>,
    now: DateTime<Utc>,
) -> Session {
    let enriched = employee.is_some();
    let employee = employee.unwrap_or_else(|| minimal_employee(employee_id));
    let message = login.get("message");
    let message_str = |key: &str| {
        message
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let full_name = login
        .get("full_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut name_parts = full_name.split_whitespace();
    let full_first = name_parts.next().map(str::to_string);
    let full_last = Some(name_parts.collect::<Vec<_>>().join(" ")).filter(|s| !s.is_empty());

    let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
    let now_str = now.to_rfc3339();

    let user = User {
        id: message_str("user_id")
            .or_else(|| enriched.then(|| employee.id.clone()))
            .unwrap_or_else(|| format!("user-{}", now.timestamp_millis())),
        employee_id: employee_id.to_string(),
        email: employee.email.clone(),
        first_name: non_empty(&employee.first_name)
            .or_else(|| message_str("first_name"))
            .or(full_first)
            .unwrap_or_else(|| "User".to_string()),
        last_name: non_empty(&employee.last_name)
            .or_else(|| message_str("last_name"))
            .or(full_last)
            .unwrap_or_else(|| "Name".to_string()),
        role: role_for(employee_id, &employee),
        company_id: employee.company_id.clone(),
        is_active: true,
        created_at: employee.created_at.clone().unwrap_or_else(|| now_str.clone()),
        updated_at: employee.updated_at.clone().unwrap_or(now_str),
    };

    let company = Company {
        name: if employee.company_id == DEFAULT_COMPANY_ID {
            "GoPocket".to_string()
        } else {
            employee.company_id.clone()
        },
        id: employee.company_id.clone(),
        timezone: "Asia/Kolkata".to_string(),
        currency: "INR".to_string(),
    };

    Session {
        user,
        employee,
        company,
    }
}

/// Client for the HRMS login service and the profile webhook
#[derive(Debug, Clone)]
pub struct AuthClient {
    http_client: Client,
    login_url: String,
    logout_url: String,
    profile_url: String,
}

impl AuthClient {
    pub fn new(
        login_url: impl Into<String>,
        logout_url: impl Into<String>,
        profile_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            login_url: login_url.into(),
            logout_url: logout_url.into(),
            profile_url: profile_url.into(),
        }
    }

    /// Origin of the login service, used to resolve relative avatar paths
    fn asset_base(&self) -> String {
        reqwest::Url::parse(&self.login_url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_default()
    }

    /// Signs in and returns the new session
    ///
    /// Profile enrichment failures are logged and fall back to a minimal
    /// profile. The caller decides whether to persist the session.
    pub async fn login(&self, employee_id: &str, password: &str) -> Result<Session, SessionError> {
        let credentials = json!({ "usr": employee_id, "pwd": password });
        let response = self
            .http_client
            .post(&self.login_url)
            .json(&credentials)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(SessionError::LoginFailed(login_error_message(
                &body,
                status.as_u16(),
            )));
        }
        if body.get("exc").is_some_and(|v| !v.is_null()) {
            return Err(SessionError::InvalidCredentials);
        }

        let employee = match self.fetch_profile(&credentials).await {
            Ok(Some(profile)) => Some(profile.into_employee(employee_id, &self.asset_base())),
            Ok(None) => {
                tracing::warn!("profile lookup returned nothing, using minimal profile");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile lookup failed, using minimal profile");
                None
            }
        };

        tracing::info!(employee_id, "signed in");
        Ok(build_session(employee_id, &body, employee, Utc::now()))
    }

    async fn fetch_profile(&self, credentials: &Value) -> Result<Option<ApiProfile>, SessionError> {
        let response = self
            .http_client
            .post(&self.profile_url)
            .json(credentials)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let text = response.text().await?;
        let profiles: Vec<ApiProfile> = serde_json::from_str(&text).unwrap_or_default();
        Ok(profiles.into_iter().next())
    }

    /// Clears the local session, then tells the server, ignoring failures
    pub async fn logout(&self, sessions: &SessionStore) {
        sessions.teardown();
        let request = self.http_client.post(&self.logout_url).send();
        match tokio::time::timeout(LOGOUT_TIMEOUT, request).await {
            Ok(Ok(_)) => tracing::debug!("server session closed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "server logout failed"),
            Err(_) => tracing::warn!("server logout timed out"),
        }
    }
}
