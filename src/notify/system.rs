use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::NotifyError;
use crate::notify::{Notice, NoticeLevel, NotificationSink};

const APP_NAME: &str = "taskbell";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Unasked,
    Granted,
    Denied,
}

/// Host-side notification service: owns the user's consent and shows
/// native notifications.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn request_permission(&self) -> Result<Permission, NotifyError>;
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct PermissionRequest<'a> {
    app: &'a str,
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    permission: Permission,
}

#[derive(Debug, Serialize)]
struct NotifyRequest<'a> {
    title: &'a str,
    body: &'a str,
    level: NoticeLevel,
}

/// Talks to a notification gateway over HTTP:
/// `POST {base}/permission` and `POST {base}/notify`.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NotificationGateway for HttpGateway {
    async fn request_permission(&self) -> Result<Permission, NotifyError> {
        let url = format!("{}/permission", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&PermissionRequest { app: APP_NAME })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        let body: PermissionResponse = response.json().await?;
        Ok(body.permission)
    }

    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        let url = format!("{}/notify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&NotifyRequest {
                title: APP_NAME,
                body: &notice.message,
                level: notice.level,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::FORBIDDEN => Err(NotifyError::PermissionDenied),
            status => Err(NotifyError::Rejected(status.as_u16())),
        }
    }
}

/// Native notifications, gated by the gateway's permission state.
///
/// With permission unasked, a notice triggers a background permission
/// request and is delivered only if that request comes back granted. The
/// notice is not retried otherwise.
#[derive(Clone)]
pub struct SystemNotificationSink {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn NotificationGateway>,
    permission: Mutex<Permission>,
    requesting: AtomicBool,
}

impl SystemNotificationSink {
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                permission: Mutex::new(Permission::Unasked),
                requesting: AtomicBool::new(false),
            }),
        }
    }

    pub async fn permission(&self) -> Permission {
        *self.inner.permission.lock().await
    }

    /// Asks for permission up front if it has never been asked.
    pub async fn prime(&self) -> Option<JoinHandle<()>> {
        if self.permission().await != Permission::Unasked {
            return None;
        }
        self.spawn_request(None)
    }

    fn spawn_request(&self, pending: Option<Notice>) -> Option<JoinHandle<()>> {
        if self.inner.requesting.swap(true, Ordering::SeqCst) {
            debug!("notification permission request already in flight");
            return None;
        }

        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            let permission = match inner.gateway.request_permission().await {
                Ok(permission) => permission,
                Err(e) => {
                    warn!("notification permission request failed: {}", e);
                    Permission::Unasked
                }
            };
            info!(?permission, "notification permission resolved");
            *inner.permission.lock().await = permission;
            inner.requesting.store(false, Ordering::SeqCst);

            if permission == Permission::Granted {
                if let Some(notice) = pending {
                    if let Err(e) = inner.gateway.deliver(&notice).await {
                        warn!("system notification failed: {}", e);
                    }
                }
            }
        }))
    }
}

#[async_trait]
impl NotificationSink for SystemNotificationSink {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn show(&self, notice: &Notice) -> Result<(), NotifyError> {
        match self.permission().await {
            Permission::Granted => match self.inner.gateway.deliver(notice).await {
                Err(NotifyError::PermissionDenied) => {
                    *self.inner.permission.lock().await = Permission::Denied;
                    Err(NotifyError::PermissionDenied)
                }
                other => other,
            },
            Permission::Denied => {
                debug!("system notifications denied, skipping");
                Ok(())
            }
            Permission::Unasked => {
                self.spawn_request(Some(notice.clone()));
                Ok(())
            }
        }
    }
}
