use std::collections::HashMap;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tripnest_core::notification::NotificationView;
use tripnest_core::{NewNotification, NotificationKind, UserSummary};
use tripnest_shared::{PageMeta, PageRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::response::{created, ok, ok_with_message};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/mark-all/read", put(mark_all_read))
        .route("/clear/all", delete(clear_all))
        .route("/{id}/read", put(mark_read))
        .route("/{id}", delete(delete_notification))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboxQuery {
    page: Option<u32>,
    limit: Option<u32>,
    unread_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNotification {
    recipient_id: Option<Uuid>,
    title: Option<String>,
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: NotificationKind,
    link: Option<String>,
    metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Inbox {
    notifications: Vec<NotificationView>,
    total: u64,
    unread_count: u64,
    pagination: PageMeta,
}

async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<InboxQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let repo = &state.repos.notifications;

    let (notifications, total) = repo
        .list(caller.id(), query.unread_only.unwrap_or(false), page)
        .await?;
    let unread_count = repo.count_unread(caller.id()).await?;

    let mut sender_ids: Vec<Uuid> = notifications.iter().filter_map(|n| n.sender_id).collect();
    sender_ids.sort();
    sender_ids.dedup();
    let senders: HashMap<Uuid, UserSummary> = if sender_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .repos
            .users
            .find_many(&sender_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.summary()))
            .collect()
    };

    let notifications = notifications
        .into_iter()
        .map(|notification| NotificationView {
            sender: notification.sender_id.and_then(|id| senders.get(&id).cloned()),
            notification,
        })
        .collect();

    Ok(ok(Inbox {
        notifications,
        total,
        unread_count,
        pagination: PageMeta::new(page, total),
    }))
}

async fn create_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateNotification>,
) -> Result<impl IntoResponse, AppError> {
    let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(title), Some(message)) = (non_blank(req.title), non_blank(req.message)) else {
        return Err(AppError::ValidationError("Title and message are required".to_string()));
    };

    let recipient_id = match req.recipient_id {
        Some(id) if id != caller.id() => {
            state
                .repos
                .users
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFoundError("Recipient not found".to_string()))?
                .id
        }
        _ => caller.id(),
    };

    let notification = state
        .notifier
        .emit(NewNotification {
            recipient_id,
            sender_id: Some(caller.id()),
            title,
            message,
            kind: req.kind,
            link: req.link,
            metadata: req.metadata.unwrap_or_else(|| json!({})),
        })
        .await?;

    Ok(created("Notification created successfully", notification))
}

async fn mark_read(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let notification = state
        .repos
        .notifications
        .mark_read(id, caller.id())
        .await?
        .ok_or_else(|| AppError::NotFoundError("Notification not found".to_string()))?;

    Ok(ok_with_message("Notification marked as read", notification))
}

async fn mark_all_read(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let modified = state.repos.notifications.mark_all_read(caller.id()).await?;
    Ok(ok_with_message(
        "All notifications marked as read",
        json!({ "modifiedCount": modified }),
    ))
}

async fn delete_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.repos.notifications.delete(id, caller.id()).await? {
        return Err(AppError::NotFoundError("Notification not found".to_string()));
    }
    Ok(crate::response::message("Notification deleted successfully"))
}

async fn clear_all(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.repos.notifications.clear(caller.id()).await?;
    Ok(ok_with_message(
        "All notifications cleared",
        json!({ "deletedCount": deleted }),
    ))
}
