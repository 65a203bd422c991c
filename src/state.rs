use std::sync::Arc;

use crate::notify::{DialogQueue, Notifier, ToastBoard};
use crate::store::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub notifier: Arc<Notifier>,
    pub toasts: Arc<ToastBoard>,
    pub dialogs: Option<Arc<DialogQueue>>,
}
