//! Route table.
//!
//! Each lifecycle action has its own `PUT /tickets/:id/<action>` route; paths
//! that match nothing get a JSON 404 from the fallback.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post, put},
};
use tix_core::model::Action;
use tower_http::trace::TraceLayer;

use super::AppState;
use super::handlers;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/tickets",
            post(handlers::create_ticket).get(handlers::list_tickets),
        )
        .route("/tickets/:id", get(handlers::get_ticket))
        .route("/tickets/:id/events", get(handlers::ticket_events))
        .route("/tickets/:id/cycles", get(handlers::ticket_cycles))
        .merge(action_routes())
        .route("/stats", get(handlers::stats))
        .route("/backlog/unassigned", get(handlers::unassigned))
        .route("/backlog/overdue", get(handlers::overdue))
        .route("/dashboard", get(handlers::dashboard))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn action_routes() -> Router<AppState> {
    Action::ALL.into_iter().fold(Router::new(), |router, action| {
        router.route(
            &format!("/tickets/:id/{action}"),
            put(
                move |State(state): State<AppState>, Path(id): Path<String>, body: Bytes| {
                    handlers::apply_action(state, action, id, body)
                },
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tix_core::clock::{Clock, SystemClock};
    use tix_core::model::{Ticket, TicketEvent, TicketId};
    use tix_core::store::memory::MemoryStore;
    use tix_core::store::{StoreError, TicketStore, Versioned};
    use tix_core::{LifecycleService, Projector};
    use tower::ServiceExt;

    fn router_over(store: Arc<dyn TicketStore>) -> Router {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let service = LifecycleService::new(Arc::clone(&store), Arc::clone(&clock));
        let projector = Projector::new(store, clock);
        build_router(AppState::new(service, projector, 50))
    }

    fn router() -> Router {
        router_over(Arc::new(MemoryStore::new()))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router, title: &str) -> String {
        let body = format!(r#"{{"title": "{title}"}}"#);
        let (status, json) = send(app, Method::POST, "/tickets", Some(&body)).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, json) = send(&router(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn create_returns_the_new_ticket() {
        let app = router();
        let (status, json) = send(
            &app,
            Method::POST,
            "/tickets",
            Some(r#"{"title": "  VPN down ", "desc": "since 9am"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "VPN down");
        assert_eq!(json["desc"], "since 9am");
        assert_eq!(json["status"], "created");
        assert!(json.get("assignee").is_none());

        let id = json["id"].as_str().unwrap();
        let (status, fetched) = send(&app, Method::GET, &format!("/tickets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, json);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let app = router();
        for body in [None, Some("{"), Some(r#"{"title": "   "}"#), Some(r#"{"desc": "x"}"#)] {
            let (status, json) = send(&app, Method::POST, "/tickets", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body:?}");
            assert_eq!(json["code"], "invalid_input");
        }
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let app = router();
        for uri in [
            "/tickets/tk-0000000000",
            "/tickets/nonsense",
            "/tickets/tk-0000000000/events",
        ] {
            let (status, json) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(json["code"], "not_found");
        }
        let (status, _) = send(&app, Method::PUT, "/tickets/nonsense/start", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn full_lifecycle_over_http() {
        let app = router();
        let id = create(&app, "Printer jam").await;

        let (status, json) = send(
            &app,
            Method::PUT,
            &format!("/tickets/{id}/assign"),
            Some(r#"{"assignee": "bob", "note": "floor 3"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["assignee"], "bob");
        assert_eq!(json["status"], "created");

        for (action, expected) in [
            ("assign", "assigned"),
            ("start", "in_progress"),
            ("resolve", "resolved"),
        ] {
            let uri = format!("/tickets/{id}/{action}");
            let (status, json) = send(&app, Method::PUT, &uri, None).await;
            assert_eq!(status, StatusCode::OK, "{action}: {json}");
            assert_eq!(json["status"], expected);
        }

        let (status, json) = send(&app, Method::PUT, &format!("/tickets/{id}/close"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "conflict");
        assert_eq!(json["reason"], "illegal_transition");

        // Reassigning a resolved ticket is refused.
        let (status, json) = send(
            &app,
            Method::PUT,
            &format!("/tickets/{id}/assign"),
            Some(r#"{"assignee": "ann"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["reason"], "ticket_terminal");

        let (status, json) = send(&app, Method::PUT, &format!("/tickets/{id}/reopen"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "created");
        assert_eq!(json["assignee"], "bob");

        let (status, json) = send(&app, Method::GET, &format!("/tickets/{id}/events"), None).await;
        assert_eq!(status, StatusCode::OK);
        let events = json["events"].as_array().unwrap();
        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            ["created", "assigned", "assign", "start", "resolve", "reopen"]
        );
        assert_eq!(events[1]["note"], "floor 3");

        let (status, json) = send(&app, Method::GET, &format!("/tickets/{id}/cycles"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cycles"].as_array().unwrap().len(), 2);
        assert_eq!(json["current"], 1);
    }

    #[tokio::test]
    async fn unknown_action_is_not_found() {
        let app = router();
        let id = create(&app, "Mail bouncing").await;
        let (status, json) = send(&app, Method::PUT, &format!("/tickets/{id}/archive"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn malformed_action_body_is_rejected() {
        let app = router();
        let id = create(&app, "Mail bouncing").await;
        let uri = format!("/tickets/{id}/assign");
        let (status, json) = send(&app, Method::PUT, &uri, Some(r#"{"note": 7}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_input");
    }

    #[tokio::test]
    async fn projections_and_limits() {
        let app = router();
        for n in 0..3 {
            create(&app, &format!("ticket {n}")).await;
        }

        let (status, json) = send(&app, Method::GET, "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["created"], 3);
        assert_eq!(json["closed"], 0);
        assert_eq!(json["total"], 3);

        let (status, json) = send(&app, Method::GET, "/backlog/unassigned?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["ticket 2", "ticket 1"]);

        let (status, json) = send(&app, Method::GET, "/backlog/overdue", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().is_empty());

        let (status, json) = send(&app, Method::GET, "/dashboard?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stats"]["total"], 3);
        assert_eq!(json["unassigned"].as_array().unwrap().len(), 1);

        let (status, json) = send(&app, Method::GET, "/backlog/overdue?limit=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_input");
    }

    #[tokio::test]
    async fn overdue_backlog_lists_past_due_tickets() {
        let app = router();
        let (status, _) = send(
            &app,
            Method::POST,
            "/tickets",
            Some(r#"{"title": "Late", "due_at": "2020-01-01T00:00:00Z"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        create(&app, "No deadline").await;

        let (_, json) = send(&app, Method::GET, "/backlog/overdue", None).await;
        let overdue = json.as_array().unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0]["title"], "Late");
    }

    /// Fails every call with the configured error.
    struct BrokenStore {
        corrupt: bool,
    }

    impl BrokenStore {
        fn fail(&self) -> StoreError {
            if self.corrupt {
                StoreError::Corrupt {
                    id: "tk-0000000000".to_string(),
                    detail: "unknown status 'open'".to_string(),
                }
            } else {
                StoreError::Unavailable {
                    operation: "read",
                    waited: Duration::from_millis(10),
                }
            }
        }
    }

    impl TicketStore for BrokenStore {
        fn insert(&self, _: &Ticket, _: &TicketEvent) -> Result<(), StoreError> {
            Err(self.fail())
        }

        fn load(&self, _: &TicketId) -> Result<Versioned, StoreError> {
            Err(self.fail())
        }

        fn list(&self) -> Result<Vec<Ticket>, StoreError> {
            Err(self.fail())
        }

        fn events(&self, _: &TicketId) -> Result<Vec<TicketEvent>, StoreError> {
            Err(self.fail())
        }

        fn commit(&self, _: &Ticket, _: &TicketEvent, _: u64) -> Result<u64, StoreError> {
            Err(self.fail())
        }
    }

    #[tokio::test]
    async fn store_timeouts_are_unavailable() {
        let app = router_over(Arc::new(BrokenStore { corrupt: false }));
        let (status, json) = send(&app, Method::GET, "/tickets", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "store_unavailable");

        let (status, _) = send(&app, Method::POST, "/tickets", Some(r#"{"title": "x"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn corrupt_records_are_opaque_500s() {
        let app = router_over(Arc::new(BrokenStore { corrupt: true }));
        let (status, json) = send(&app, Method::GET, "/stats", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "internal");
        assert_eq!(json["message"], "internal error");
        assert!(!json.to_string().contains("open"));
    }
}
