//! Notification pipeline: validate, sanitize, render, click-route.
//!
//! Push payloads are untrusted external input. Validation is a plain
//! structural check, no schema machinery: every optional field, if
//! present, must be a string, and anything else drops the event.
//! Nothing is constructed before validation passes.

use furrow_core::Error;
use serde_json::Value;
use url::Url;

/// Default de-duplication tag; a new notification with the same tag
/// replaces the previous one.
pub const DEFAULT_TAG: &str = "general notification";

const DEFAULT_TITLE: &str = "Furrow";
const DEFAULT_ICON: &str = "/icons/icon-192.png";
const DEFAULT_BADGE: &str = "/icons/badge-72.png";

/// A validated push payload. All fields optional; defaults are filled
/// in at display time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub tag: Option<String>,
    pub url: Option<String>,
    pub order_id: Option<String>,
}

/// A rendered notification ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    /// Navigation target, already sanitized.
    pub url: String,
    pub actions: Vec<NotificationAction>,
}

/// One action button on a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Where a notification click sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Dismiss closes the notification with no navigation.
    Dismissed,
    /// Focus an already-open page at this URL.
    Focus(String),
    /// Open a new page at this URL.
    Open(String),
}

/// Structurally validate an untrusted payload.
///
/// # Errors
///
/// Returns `Error::InvalidPayload` if the payload is not an object or
/// any known field is present with a non-string value. Unknown fields
/// are ignored.
pub fn validate(value: &Value) -> Result<NotificationPayload, Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidPayload("payload must be a JSON object".into()))?;

    let field = |name: &str| -> Result<Option<String>, Error> {
        match obj.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::InvalidPayload(format!("field {name} must be a string"))),
        }
    };

    Ok(NotificationPayload {
        title: field("title")?,
        body: field("body")?,
        icon: field("icon")?,
        tag: field("tag")?,
        url: field("url")?,
        order_id: field("orderId")?,
    })
}

/// Sanitize a navigation target.
///
/// The raw value is resolved against the origin; only http(s) URLs on
/// the same origin survive. Anything else (cross-origin, other
/// schemes, unparseable) falls back to the root path.
pub fn sanitize_url(origin: &Url, raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "/".into();
    };

    match origin.join(raw) {
        Ok(joined) if matches!(joined.scheme(), "http" | "https") && joined.origin() == origin.origin() => {
            joined.to_string()
        }
        _ => "/".into(),
    }
}

/// Render a validated payload into a displayable notification, filling
/// in the default icon, badge, tag, and the view/dismiss actions.
pub fn display(origin: &Url, payload: &NotificationPayload) -> Notification {
    Notification {
        title: payload.title.clone().unwrap_or_else(|| DEFAULT_TITLE.into()),
        body: payload.body.clone().unwrap_or_default(),
        icon: payload.icon.clone().unwrap_or_else(|| DEFAULT_ICON.into()),
        badge: DEFAULT_BADGE.into(),
        tag: payload.tag.clone().unwrap_or_else(|| DEFAULT_TAG.into()),
        url: sanitize_url(origin, payload.url.as_deref()),
        actions: vec![
            NotificationAction { action: "view".into(), title: "View".into() },
            NotificationAction { action: "dismiss".into(), title: "Dismiss".into() },
        ],
    }
}

/// Route a notification click.
///
/// The dismiss action closes with no navigation; any other interaction
/// focuses an already-open page with the same URL if one exists, else
/// opens a new one.
pub fn on_click(action: &str, notification: &Notification, open_pages: &[String]) -> ClickOutcome {
    if action == "dismiss" {
        return ClickOutcome::Dismissed;
    }

    if open_pages.iter().any(|page| page == &notification.url) {
        ClickOutcome::Focus(notification.url.clone())
    } else {
        ClickOutcome::Open(notification.url.clone())
    }
}
