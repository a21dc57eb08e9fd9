//! The queue path: deferring actions to a designated queue service.
//!
//! When an action carries the queue flag and a queue service is
//! registered, the dispatcher hands it here instead of invoking the
//! handler. The action's meta is stripped and replaced with an
//! authorized flag, a correlation id and a queue timestamp, and the
//! action is sent to the queue service. An `ok` reply from the queue
//! translates to `queued` for the caller; other statuses are relayed
//! as-is; a reply without a status becomes `badresponse`.

use chrono::Utc;
use iris_core::{Action, Meta, Response, Status};
use iris_service::Service;
use uuid::Uuid;

/// Replaces the action meta for queueing.
///
/// The correlation id is reused from `meta.id` when one is present,
/// otherwise generated.
fn queue_action(mut action: Action) -> Action {
    let cid = action
        .meta
        .cid
        .take()
        .or_else(|| action.meta.id.take())
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    action.meta = Meta {
        cid: Some(cid),
        queued_at: Some(Utc::now()),
        authorized: true,
        ..Meta::default()
    };
    action
}

/// Sends the action to the queue service and translates its reply.
pub async fn send_to_queue(service: &Service, action: Action) -> Response {
    let queued = queue_action(action);
    let response = service.send(queued).await;

    match response.status {
        Some(Status::Ok) => response.map_status(Status::Queued),
        Some(_) => response,
        None => Response::error_with_status(
            "Queue did not respond correctly",
            format!("service:{}", service.id()),
            Status::Badresponse,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_meta_id_as_cid() {
        let mut action = Action::new("SET").with_queue();
        action.meta.id = Some("action1".to_string());
        action.meta.auth = Some(serde_json::json!({ "token": "secret" }));

        let queued = queue_action(action);
        assert_eq!(queued.meta.cid.as_deref(), Some("action1"));
        assert!(queued.meta.authorized);
        assert!(queued.meta.queued_at.is_some());
        // Meta is replaced wholesale: nothing else survives
        assert!(queued.meta.id.is_none());
        assert!(queued.meta.auth.is_none());
        assert!(!queued.meta.queue);
    }

    #[test]
    fn test_generates_cid_when_no_meta_id() {
        let queued = queue_action(Action::new("SET").with_queue());
        let cid = queued.meta.cid.expect("a cid must be generated");
        assert!(!cid.is_empty());
    }

    #[test]
    fn test_existing_cid_wins_over_meta_id() {
        let mut action = Action::new("SET");
        action.meta.id = Some("action1".to_string());
        action.meta.cid = Some("corr1".to_string());

        let queued = queue_action(action);
        assert_eq!(queued.meta.cid.as_deref(), Some("corr1"));
    }
}
