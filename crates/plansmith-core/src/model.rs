//! Records owned by the remote task service.
//!
//! These types deserialize straight from Microsoft Graph JSON. Identifiers
//! are opaque strings assigned by the service; every optional field the
//! service may omit or null out is an `Option` here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
}

/// A Microsoft 365 group; plans are owned by groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mail_nickname: Option<String>,
}

impl Group {
    /// Display name, or the id when the service returned none.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Top-level container for buckets and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePlan {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Owning group id.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Named sub-container of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBucket {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plan_id: String,
}

/// A unit of work with a completion percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub bucket_id: Option<String>,
    #[serde(default)]
    pub title: String,
    /// 0 = not started, 1..=99 = in progress, 100 = complete.
    #[serde(default)]
    pub percent_complete: Option<u8>,
    #[serde(default)]
    pub due_date_time: Option<DateTime<Utc>>,
    /// Version token that must accompany updates.
    #[serde(rename = "@odata.etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl RemoteTask {
    /// Completion percentage, treating an absent value as not started.
    pub fn percent(&self) -> u8 {
        self.percent_complete.unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.percent_complete == Some(100)
    }
}

/// Host information attached to a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCollection {
    #[serde(default)]
    pub hostname: Option<String>,
}

/// A SharePoint or OneDrive site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub site_collection: Option<SiteCollection>,
}

impl Site {
    /// Convenience constructor used by callers that already hold the pieces.
    pub fn new(
        display_name: impl Into<String>,
        web_url: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            display_name: Some(display_name.into()),
            web_url: Some(web_url.into()),
            site_collection: Some(SiteCollection {
                hostname: Some(hostname.into()),
            }),
        }
    }

    /// Hostname of the site's collection, if the service returned one.
    pub fn hostname(&self) -> Option<&str> {
        self.site_collection
            .as_ref()
            .and_then(|c| c.hostname.as_deref())
    }
}
