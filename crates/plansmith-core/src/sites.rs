//! SharePoint / OneDrive site classification.
//!
//! A site's URL is split at its collection hostname; the first path segment
//! after the hostname decides the category. `sites` or nothing means a
//! SharePoint site; `personal` means a OneDrive. Any other segment belongs
//! to neither category and is dropped, as are sites with no display name and
//! sites whose URL does not contain their hostname.

use serde::Serialize;
use tracing::debug;

use crate::model::Site;

/// Category of a single site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    SharePoint,
    OneDrive,
}

/// Two disjoint lists, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteClassification {
    pub share_point: Vec<Site>,
    pub one_drive: Vec<Site>,
}

pub fn classify(sites: Vec<Site>) -> SiteClassification {
    let mut out = SiteClassification::default();
    for site in sites {
        let named = site
            .display_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !named {
            continue;
        }
        match site_kind(&site) {
            Some(SiteKind::SharePoint) => out.share_point.push(site),
            Some(SiteKind::OneDrive) => out.one_drive.push(site),
            None => debug!(url = ?site.web_url, "site excluded from classification"),
        }
    }
    out
}

/// Classify one site, ignoring its display name.
pub fn site_kind(site: &Site) -> Option<SiteKind> {
    let url = site.web_url.as_deref()?;
    let hostname = site.hostname()?;
    if hostname.is_empty() {
        return None;
    }

    // Only the hostname search ignores case; path segments compare exactly.
    let host_lower = hostname.to_ascii_lowercase();
    let start = url.to_ascii_lowercase().find(&host_lower)? + host_lower.len();
    // Lowercasing ASCII keeps byte offsets, so `start` indexes `url` too.
    let remainder = url.get(start..)?;

    // The remainder starts with '/', so segment 0 is always empty.
    match remainder.split('/').nth(1).unwrap_or("") {
        "" | "sites" => Some(SiteKind::SharePoint),
        "personal" => Some(SiteKind::OneDrive),
        _ => None,
    }
}
