//! [`Gateway`] implementation backed by Microsoft Graph.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use super::auth::{ClientCredentials, TokenProvider};
use super::classify::{classify_response, classify_transport};
use super::config::GraphConfig;
use crate::error::{ErrorKind, GatewayError, RemoteFault};
use crate::gateway::{Gateway, NewTask};
use crate::model::{Group, RemoteBucket, RemotePlan, RemoteTask, Site, User};

/// Correlation header echoed by Graph in its diagnostics.
const REQUEST_ID_HEADER: &str = "client-request-id";

/// Member references must point at the public Graph endpoint regardless of
/// which base URL requests are sent to.
const DIRECTORY_OBJECTS_URL: &str = "https://graph.microsoft.com/v1.0/directoryObjects";

/// Upper bound on `@odata.nextLink` pages followed per listing.
const MAX_PAGES: usize = 50;

/// Collection envelope: `{"value": [...], "@odata.nextLink": "..."}`.
#[derive(Debug, Deserialize)]
struct Collection<T> {
    value: Option<Vec<T>>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Graph-backed gateway.
///
/// Holds one pooled `reqwest::Client`; clones share the pool and the token
/// cache, so one instance can serve concurrent materializations.
#[derive(Clone)]
pub struct GraphGateway {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for GraphGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphGateway")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GraphGateway {
    /// Build a gateway that authenticates with the config's client credentials.
    pub fn new(config: &GraphConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("plansmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::Remote(RemoteFault::new(
                    ErrorKind::Fatal,
                    format!("failed to build HTTP client: {e}"),
                ))
            })?;
        let tokens = Arc::new(ClientCredentials::new(http.clone(), config));
        Ok(Self::with_token_provider(http, &config.base_url, tokens))
    }

    /// Build a gateway around an existing client and token source.
    pub fn with_token_provider(
        http: reqwest::Client,
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and return the response if its status is a success.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        if_match: Option<&str>,
    ) -> Result<reqwest::Response, RemoteFault> {
        let token = self.tokens.access_token().await.map_err(|e| match e {
            GatewayError::Remote(fault) => fault,
            other => RemoteFault::new(ErrorKind::Unauthorized, other.to_string()),
        })?;
        let request_id = Uuid::new_v4().to_string();

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(etag) = if_match {
            request = request.header(reqwest::header::IF_MATCH, etag);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url, request_id = %request_id, "graph request");
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(&e).with_request_id(&request_id))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        let fault = classify_response(status, &headers, &text).with_request_id(&request_id);
        warn!(%method, url, status = status.as_u16(), kind = %fault.kind, "graph request failed");
        Err(fault)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteFault> {
        let text = response.text().await.map_err(|e| classify_transport(&e))?;
        serde_json::from_str(&text).map_err(|e| {
            RemoteFault::new(ErrorKind::Fatal, format!("unexpected response shape: {e}"))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self.send(Method::GET, &self.url(path), None, None).await?;
        Ok(Self::decode(response).await?)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, GatewayError> {
        let response = self
            .send(Method::POST, &self.url(path), Some(body), None)
            .await?;
        Ok(Self::decode(response).await?)
    }

    /// Fetch every page of a collection. Absent or null `value` is empty.
    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GatewayError> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path));
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let response = self.send(Method::GET, &url, None, None).await?;
            let page: Collection<T> = Self::decode(response).await?;
            items.extend(page.value.unwrap_or_default());
            pages += 1;
            if pages >= MAX_PAGES {
                if page.next_link.is_some() {
                    warn!(path, pages, "stopping pagination at page limit");
                }
                break;
            }
            next = page.next_link;
        }

        Ok(items)
    }
}

/// Derive a mail nickname from a group display name: lowercase ASCII
/// alphanumerics only, at most 64 characters.
pub fn mail_nickname(name: &str) -> String {
    let nickname: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(64)
        .collect();
    if nickname.is_empty() {
        "group".to_string()
    } else {
        nickname
    }
}

fn path_segment(id: &str) -> String {
    // Graph ids are URL-safe apart from the occasional '/' in principal
    // names and '#' in external-user UPNs.
    id.replace('/', "%2F").replace('#', "%23")
}

#[async_trait]
impl Gateway for GraphGateway {
    async fn find_user(&self, principal_name: &str) -> Result<Option<User>, GatewayError> {
        match self
            .get::<User>(&format!("/users/{}", path_segment(principal_name)))
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.kind() == Some(ErrorKind::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<Group, GatewayError> {
        let body = json!({
            "displayName": name,
            "description": description,
            "groupTypes": ["Unified"],
            "mailEnabled": true,
            "mailNickname": mail_nickname(name),
            "securityEnabled": false,
        });
        self.post("/groups", &body).await
    }

    async fn add_member(&self, group_id: &str, user_id: &str) -> Result<(), GatewayError> {
        let body = json!({
            "@odata.id": format!("{DIRECTORY_OBJECTS_URL}/{user_id}"),
        });
        let url = self.url(&format!("/groups/{}/members/$ref", path_segment(group_id)));
        match self.send(Method::POST, &url, Some(&body), None).await {
            Ok(_) => Ok(()),
            Err(fault) if fault.kind == ErrorKind::Conflict => {
                debug!(group_id, user_id, "user is already a member");
                Ok(())
            }
            Err(fault) => Err(fault.into()),
        }
    }

    async fn list_groups(&self) -> Result<Vec<Group>, GatewayError> {
        self.list("/groups").await
    }

    async fn create_plan(
        &self,
        title: &str,
        owner_group_id: &str,
    ) -> Result<RemotePlan, GatewayError> {
        let body = json!({ "title": title, "owner": owner_group_id });
        self.post("/planner/plans", &body).await
    }

    async fn list_group_plans(&self, group_id: &str) -> Result<Vec<RemotePlan>, GatewayError> {
        self.list(&format!("/groups/{}/planner/plans", path_segment(group_id)))
            .await
    }

    async fn create_bucket(&self, plan_id: &str, name: &str) -> Result<RemoteBucket, GatewayError> {
        let body = json!({ "name": name, "planId": plan_id, "orderHint": " !" });
        self.post("/planner/buckets", &body).await
    }

    async fn list_plan_buckets(&self, plan_id: &str) -> Result<Vec<RemoteBucket>, GatewayError> {
        self.list(&format!("/planner/plans/{}/buckets", path_segment(plan_id)))
            .await
    }

    async fn create_task(&self, task: &NewTask) -> Result<RemoteTask, GatewayError> {
        let mut body = json!({
            "planId": task.plan_id,
            "bucketId": task.bucket_id,
            "title": task.title,
            "assignments": {},
        });
        if let Some(due) = task.due {
            body["dueDateTime"] = json!(due.to_rfc3339());
        }
        self.post("/planner/tasks", &body).await
    }

    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, GatewayError> {
        self.get(&format!("/planner/tasks/{}", path_segment(task_id)))
            .await
    }

    async fn list_bucket_tasks(&self, bucket_id: &str) -> Result<Vec<RemoteTask>, GatewayError> {
        self.list(&format!("/planner/buckets/{}/tasks", path_segment(bucket_id)))
            .await
    }

    async fn update_task_completion(
        &self,
        task_id: &str,
        etag: Option<&str>,
        percent: u8,
    ) -> Result<(), GatewayError> {
        if percent > 100 {
            return Err(GatewayError::remote(
                ErrorKind::Fatal,
                format!("percent complete must be 0..=100, got {percent}"),
            ));
        }
        let Some(etag) = etag else {
            return Err(GatewayError::remote(
                ErrorKind::Fatal,
                format!("task {task_id} has no version token; re-read it before updating"),
            ));
        };

        let url = self.url(&format!("/planner/tasks/{}", path_segment(task_id)));
        let body = json!({ "percentComplete": percent });
        match self.send(Method::PATCH, &url, Some(&body), Some(etag)).await {
            Ok(_) => Ok(()),
            // 412 is the documented etag mismatch; Planner also answers 409.
            Err(fault) if matches!(fault.status, Some(409 | 412)) => {
                Err(GatewayError::StaleVersion {
                    task_id: task_id.to_string(),
                })
            }
            Err(fault) => Err(fault.into()),
        }
    }

    async fn list_sites(&self) -> Result<Vec<Site>, GatewayError> {
        self.list("/sites/getAllSites").await
    }
}
