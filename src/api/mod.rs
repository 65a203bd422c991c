//! HTTP surface over the task store and the in-app notification sinks.
//!
//! Every failed request is answered with a JSON `{error, message}` body.
//! Malformed input also posts an error notice.

use std::convert::Infallible;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;
use futures_util::Stream;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Task, TaskDraft};
use crate::notify::{Dialog, Notice, Toast};
use crate::state::AppState;
use crate::view::{self, TaskFilter, TaskRow};

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/stream", get(stream_tasks))
        .route("/tasks/{id}", delete(delete_task))
        .route("/tasks/{id}/toggle", patch(toggle_task))
        .route("/categories", get(list_categories))
        .route("/notifications", get(list_notifications))
        .route("/dialogs", get(list_dialogs))
        .route("/dialogs/{id}/dismiss", post(dismiss_dialog))
        .with_state(state)
}

/// 200 when the key-value store answers.
async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.repository().health_check().await?;
    Ok(StatusCode::OK)
}

/// Filtered rows sorted by deadline.
async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskFilter>, QueryRejection>,
) -> Result<Json<Vec<TaskRow>>, AppError> {
    let Query(filter) = match query {
        Ok(query) => query,
        Err(rejection) => return Err(reject(&state, rejection.body_text()).await),
    };
    let tasks = state.store.all().await;
    Ok(Json(view::derive(&tasks, &filter, Utc::now())))
}

/// Server-sent events: the filtered list now, then again on every publish.
async fn stream_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskFilter>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Query(filter) = match query {
        Ok(query) => query,
        Err(rejection) => return Err(reject(&state, rejection.body_text()).await),
    };
    let rx = state.store.subscribe();
    let stream = futures_util::stream::unfold((rx, filter, true), |(mut rx, filter, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let rows = {
            let tasks = rx.borrow_and_update();
            view::derive(&tasks, &filter, Utc::now())
        };
        let event = match Event::default().event("tasks").json_data(&rows) {
            Ok(event) => event,
            Err(e) => {
                warn!("cannot encode task list event: {}", e);
                Event::default().event("error").data("encode failure")
            }
        };
        Some((Ok::<_, Infallible>(event), (rx, filter, false)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Creates a task from a draft. Missing fields default to empty, so the
/// store reports which one is wrong.
async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<TaskDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let Json(draft) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return Err(reject(&state, rejection.body_text()).await),
    };
    let task = match state.store.create(draft).await {
        Ok(task) => task,
        Err(e) => {
            state.notifier.notify(Notice::error(e.to_string())).await;
            return Err(e);
        }
    };
    state
        .notifier
        .notify(Notice::info("Task added successfully!"))
        .await;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Always 204. The notice is posted only when a task was removed.
async fn delete_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.store.delete(id).await {
        state.notifier.notify(Notice::info("Task deleted!")).await;
    }
    StatusCode::NO_CONTENT
}

/// Flips pending/completed; 404 for an unknown id.
async fn toggle_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    let task = state.store.toggle_status(id).await?;
    state
        .notifier
        .notify(Notice::info(format!(
            "Task marked as {}!",
            task.status.as_str()
        )))
        .await;
    Ok(Json(task))
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.store.categories().await)
}

/// Toasts that have not expired yet.
async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Toast>> {
    Json(state.toasts.active(Utc::now()).await)
}

/// Open dialogs, or an empty list when dialogs are disabled.
async fn list_dialogs(State(state): State<AppState>) -> Json<Vec<Dialog>> {
    match &state.dialogs {
        Some(dialogs) => Json(dialogs.open().await),
        None => Json(Vec::new()),
    }
}

async fn dismiss_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let dialogs = state.dialogs.as_ref().ok_or(AppError::NotFound)?;
    if dialogs.dismiss(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// Turns a malformed request into a 400 and tells the user about it.
async fn reject(state: &AppState, message: String) -> AppError {
    state.notifier.notify(Notice::error(message.clone())).await;
    AppError::BadRequest(message)
}
