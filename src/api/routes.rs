//! API route definitions

use super::handlers::{self, AppState};
use super::tree_handlers;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Projects
        // ====================================================================
        .route(
            "/v1/projects",
            get(tree_handlers::list_projects).post(tree_handlers::create_project),
        )
        .route(
            "/v1/projects/{project_id}",
            get(tree_handlers::get_project).patch(tree_handlers::update_project),
        )
        .route("/v1/projects/{project_id}/tree", get(tree_handlers::get_tree))
        .route(
            "/v1/projects/{project_id}/save",
            post(tree_handlers::save_project),
        )
        // ====================================================================
        // Nodes
        // ====================================================================
        .route(
            "/v1/projects/{project_id}/nodes",
            post(tree_handlers::create_node),
        )
        .route(
            "/v1/projects/{project_id}/nodes/{node_id}",
            patch(tree_handlers::update_node).delete(tree_handlers::delete_node),
        )
        .route(
            "/v1/projects/{project_id}/nodes/{node_id}/question",
            get(tree_handlers::preview_question),
        )
        // ====================================================================
        // Edges and ordering
        // ====================================================================
        .route(
            "/v1/projects/{project_id}/edges/{edge_id}",
            patch(tree_handlers::update_edge),
        )
        .route(
            "/v1/projects/{project_id}/reorder",
            post(tree_handlers::reorder),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::ServerState;
    use crate::question::{FallbackChooser, OrchestratorConfig, QuestionMode, QuestionOrchestrator};
    use crate::tree::{MemoryTreeStore, NodeManager, TreeStore};
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let store: Arc<dyn TreeStore> = Arc::new(MemoryTreeStore::new());
        let questions = Arc::new(QuestionOrchestrator::new(
            store.clone(),
            None,
            FallbackChooser::default(),
            OrchestratorConfig::default(),
        ));
        let state = Arc::new(ServerState {
            manager: Arc::new(NodeManager::new(store, questions)),
            oracle_model: None,
            question_mode: QuestionMode::Generate,
        });
        create_router(state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = HttpRequest::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["question_mode"], "generate");
        assert!(body.get("oracle").is_none());
    }

    #[tokio::test]
    async fn test_tree_lifecycle_over_http() {
        let app = test_app();

        let (status, tree) = send(&app, "POST", "/v1/projects", Some(json!({"title": "健康になる"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let pid = tree["project"]["id"].as_str().unwrap().to_string();
        let root = tree["nodes"][0]["id"].as_str().unwrap().to_string();

        let (status, created) = send(
            &app,
            "POST",
            &format!("/v1/projects/{}/nodes", pid),
            Some(json!({"content": "運動する", "parent_node_id": root, "relation": "how"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let question = created["node"]["question"].as_str().unwrap();
        assert!(question.ends_with('？'));
        assert_eq!(created["edge"]["relation"], "how");
        let node_id = created["node"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/v1/projects/{}/nodes/{}", pid, node_id),
            Some(json!({"content": "筋トレする"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (status, tree) = send(&app, "GET", &format!("/v1/projects/{}/tree", pid), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tree["nodes"].as_array().unwrap().len(), 2);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/v1/projects/{}/nodes/{}", pid, node_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, tree) = send(&app, "GET", &format!("/v1/projects/{}/tree", pid), None).await;
        assert_eq!(tree["nodes"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_preview_question() {
        let app = test_app();
        let (_, tree) = send(&app, "POST", "/v1/projects", Some(json!({"title": "毎日3km走る"}))).await;
        let pid = tree["project"]["id"].as_str().unwrap();
        let root = tree["nodes"][0]["id"].as_str().unwrap();

        let (status, outcome) = send(
            &app,
            "GET",
            &format!("/v1/projects/{}/nodes/{}/question", pid, root),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["source"]["kind"], "fallback");
        assert_eq!(outcome["oracle_calls"], 0);
    }

    #[tokio::test]
    async fn test_error_responses() {
        let app = test_app();

        let (status, body) = send(&app, "POST", "/v1/projects", Some(json!({"title": "ab"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, "GET", &format!("/v1/projects/{}/tree", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, tree) = send(&app, "POST", "/v1/projects", Some(json!({"title": "健康になる"}))).await;
        let pid = tree["project"]["id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/projects/{}/nodes", pid),
            Some(json!({"content": "運動する", "parent_node_id": missing})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_project_routes() {
        let app = test_app();
        let (_, tree) = send(&app, "POST", "/v1/projects", Some(json!({"title": "健康になる"}))).await;
        let pid = tree["project"]["id"].as_str().unwrap().to_string();

        let (status, project) = send(&app, "GET", &format!("/v1/projects/{}", pid), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(project["title"], "健康になる");

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/v1/projects/{}", pid),
            Some(json!({"title": "体力をつける", "archived": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (_, project) = send(&app, "GET", &format!("/v1/projects/{}", pid), None).await;
        assert_eq!(project["title"], "体力をつける");
        assert!(project["archived_at"].is_string());

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/v1/projects/{}", pid),
            Some(json!({"title": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", &format!("/v1/projects/{}/save", pid), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, "GET", &format!("/v1/projects/{}", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", &format!("/v1/projects/{}/save", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_order_index_conflicts() {
        let app = test_app();
        let (_, tree) = send(&app, "POST", "/v1/projects", Some(json!({"title": "健康になる"}))).await;
        let pid = tree["project"]["id"].as_str().unwrap().to_string();
        let root = tree["nodes"][0]["id"].as_str().unwrap().to_string();
        let uri = format!("/v1/projects/{}/nodes", pid);

        let (status, _) = send(&app, "POST", &uri, Some(json!({"content": "運動する", "parent_node_id": root}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"content": "よく眠る", "parent_node_id": root, "order_index": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"content": "よく眠る", "parent_node_id": root, "order_index": -3})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
