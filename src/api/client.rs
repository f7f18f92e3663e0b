//! Client for the workflow-automation webhook
//!
//! Every call is a POST of a JSON body to one endpoint; the body's `source`
//! field (or, for task documents, `doctype`) tells the backend what to do.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::types::{ApiComment, ApiLead, ApiTask};
use crate::cache::Identity;
use crate::data::{sort_by_due, Comment, Lead, LeadStatus, Task, TaskPriority, TaskStatus};

/// Errors that can occur when talking to the webhook
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("request failed with status {status}: {context}")]
    Status { status: u16, context: String },

    /// The response body was not the expected JSON shape
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// Malformed bodies are absorbed by callers; everything else is surfaced
    pub fn is_malformed_body(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// A task to be created against a lead
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub lead_id: String,
    pub title: String,
    pub description: String,
    pub due: DateTime<Utc>,
    pub priority: TaskPriority,
}

/// Client for the lead/task/comment webhook
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http_client: Client,
    /// Endpoint for lead reads
    leads_url: String,
    /// Endpoint for writes, tasks and comments
    client_url: String,
}

impl WebhookClient {
    pub fn new(leads_url: impl Into<String>, client_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), leads_url, client_url)
    }

    pub fn with_client(
        http_client: Client,
        leads_url: impl Into<String>,
        client_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            leads_url: leads_url.into(),
            client_url: client_url.into(),
        }
    }

    /// POSTs `body` and returns the raw response text
    async fn post(&self, url: &str, body: &Value, context: &str) -> Result<String, ApiError> {
        tracing::debug!(url, context, "webhook request");
        let response = self.http_client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &Value,
        context: &str,
    ) -> Result<T, ApiError> {
        let text = self.post(url, body, context).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetches every lead visible to `identity`, mapped and unsorted
    ///
    /// `now` anchors each lead's last-activity text.
    pub async fn fetch_leads(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lead>, ApiError> {
        let body = json!({
            "source": "Lead",
            "employeeId": identity.employee_id,
            "email": identity.email,
        });
        let records: Vec<ApiLead> = self.post_json(&self.leads_url, &body, "fetch leads").await?;
        let leads: Vec<Lead> = records.into_iter().map(|r| r.into_lead(now)).collect();
        tracing::info!(count = leads.len(), "fetched leads");
        Ok(leads)
    }

    /// Fetches all tasks for `identity`, earliest due first
    pub async fn fetch_tasks(&self, identity: &Identity) -> Result<Vec<Task>, ApiError> {
        let body = json!({
            "source": "getalltasks",
            "employeeId": identity.employee_id,
            "email": identity.email,
        });
        let records: Vec<ApiTask> = self.post_json(&self.client_url, &body, "fetch tasks").await?;
        let mut tasks: Vec<Task> = records.into_iter().map(ApiTask::into_task).collect();
        sort_by_due(&mut tasks);
        tracing::info!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    pub async fn fetch_comments(
        &self,
        identity: &Identity,
        lead_id: &str,
    ) -> Result<Vec<Comment>, ApiError> {
        let body = json!({
            "source": "getcomments",
            "employeeId": identity.employee_id,
            "email": identity.email,
            "leadid": lead_id,
        });
        let records: Vec<ApiComment> =
            self.post_json(&self.client_url, &body, "fetch comments").await?;
        Ok(records
            .into_iter()
            .map(|r| r.into_comment(lead_id))
            .collect())
    }

    /// Pushes edited fields of a lead
    ///
    /// A `source` key inside `fields` is dropped so it cannot override the
    /// dispatch discriminator.
    pub async fn update_lead(
        &self,
        identity: &Identity,
        lead_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), ApiError> {
        let body = update_lead_body(identity, lead_id, fields);
        self.post(&self.client_url, &body, "update lead").await?;
        Ok(())
    }

    pub async fn change_status(
        &self,
        identity: &Identity,
        lead_id: &str,
        status: LeadStatus,
    ) -> Result<(), ApiError> {
        let body = json!({
            "source": "Statuschange",
            "employeeId": identity.employee_id,
            "email": identity.email,
            "leadid": lead_id,
            "status": status.api_label(),
        });
        self.post(&self.client_url, &body, "change status").await?;
        Ok(())
    }

    pub async fn bulk_assign(
        &self,
        identity: &Identity,
        lead_ids: &[String],
        assignee: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "source": "bulkassign",
            "employeeId": identity.employee_id,
            "email": identity.email,
            "leadids": lead_ids,
            "assignto": assignee,
        });
        self.post(&self.client_url, &body, "bulk assign").await?;
        Ok(())
    }

    pub async fn create_task(&self, identity: &Identity, task: &NewTask) -> Result<(), ApiError> {
        let body = create_task_body(identity, task);
        self.post(&self.client_url, &body, "create task").await?;
        Ok(())
    }

    pub async fn update_task_status(
        &self,
        task_id: &str,
        lead_id: &str,
        status: TaskStatus,
    ) -> Result<(), ApiError> {
        let body = json!({
            "doctype": "CRM Task",
            "name": task_id,
            "fieldname": "status",
            "value": status.as_str(),
            "leadid": lead_id,
        });
        self.post(&self.client_url, &body, "update task status").await?;
        Ok(())
    }
}

fn update_lead_body(identity: &Identity, lead_id: &str, mut fields: Map<String, Value>) -> Value {
    fields.remove("source");
    let mut body = Map::new();
    body.insert("source".to_string(), json!("Update Lead"));
    body.insert("employeeId".to_string(), json!(identity.employee_id));
    body.insert("email".to_string(), json!(identity.email));
    body.insert("leadid".to_string(), json!(lead_id));
    for (key, value) in fields {
        body.entry(key).or_insert(value);
    }
    Value::Object(body)
}

fn create_task_body(identity: &Identity, task: &NewTask) -> Value {
    json!({
        "doc": {
            "doctype": "CRM Task",
            "reference_doctype": "CRM Lead",
            "reference_docname": task.lead_id,
            "title": task.title,
            "description": format!("<p>{}</p>", task.description),
            "assigned_to": identity.email,
            "due_date": task.due.format("%Y-%m-%d %H:%M:00").to_string(),
            "priority": task.priority.as_str(),
            "status": TaskStatus::Todo.as_str(),
        }
    })
}
