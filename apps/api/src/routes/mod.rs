pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;
use crate::tailoring::handlers;

/// Upper bound for uploaded CV PDFs.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        // Structuring
        .route(
            "/api/v1/sessions/:id/clean",
            put(handlers::handle_set_clean),
        )
        .route(
            "/api/v1/sessions/:id/structure",
            post(handlers::handle_structure),
        )
        .route(
            "/api/v1/sessions/:id/upload",
            post(handlers::handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Arbitrage and reconciliation
        .route(
            "/api/v1/sessions/:id/arbitrage",
            post(handlers::handle_run_arbitrage)
                .put(handlers::handle_apply_arbitrage)
                .delete(handlers::handle_reset_arbitrage),
        )
        .route(
            "/api/v1/sessions/:id/edits/:index",
            post(handlers::handle_toggle_edit),
        )
        .route(
            "/api/v1/sessions/:id/experiences/:index",
            post(handlers::handle_toggle_experience),
        )
        .route(
            "/api/v1/sessions/:id/choices/reset",
            post(handlers::handle_reset_choices),
        )
        .route("/api/v1/sessions/:id/diff", get(handlers::handle_diff))
        // Cost ledger
        .route(
            "/api/v1/sessions/:id/cost",
            get(handlers::handle_get_cost)
                .post(handlers::handle_record_cost)
                .delete(handlers::handle_reset_cost),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::errors::AppError;
    use crate::models::cost::{CostEvent, PricingTable};
    use crate::models::resume::{ResumeDocument, StructuringResult};
    use crate::pipeline::{ModelCall, ResumeModel};
    use crate::tailoring::store::SessionStore;

    struct StubModel;

    fn stub_call(name: &str, payload: Value) -> ModelCall {
        ModelCall {
            payload,
            cost: CostEvent {
                name: name.to_string(),
                model: "stub".to_string(),
                cost_usd: Some(0.001),
                currency: Some("USD".to_string()),
                ..Default::default()
            },
        }
    }

    #[async_trait]
    impl ResumeModel for StubModel {
        async fn structure(&self, _cv_text: &str) -> Result<ModelCall, AppError> {
            Ok(stub_call(
                "structuring",
                json!({
                    "personal": {"fullName": "Ada Lovelace"},
                    "experience": [
                        {"company": "Acme", "title": "Engineer", "startDate": "2019-03",
                         "endDate": "Present", "bullets": ["Built billing", "Ran on-call"]},
                        {"company": "Initech", "title": "Analyst", "bullets": ["Filed TPS reports"]}
                    ]
                }),
            ))
        }

        async fn arbitrage(
            &self,
            _clean: &ResumeDocument,
            _jd_text: &str,
        ) -> Result<ModelCall, AppError> {
            Ok(stub_call(
                "arbitrage",
                json!({
                    "result": {
                        "personal": {"fullName": "Ada Lovelace"},
                        "experience": [
                            {"company": "Acme", "title": "Engineer", "startDate": "2019-03",
                             "endDate": "Present",
                             "bullets": ["Built a Rust billing platform", "Ran on-call"]}
                        ]
                    },
                    "report": {
                        "fitScore": 82,
                        "decisions": {
                            "keptExperiences": [{"sourceIndex": 0, "reason": "core"}],
                            "removedExperiences": [{"sourceIndex": 1, "reason": "off-topic"}],
                            "bulletEdits": [{"sourceIndex": 0, "before": "Built billing",
                                             "after": "Built a Rust billing platform"}]
                        }
                    }
                }),
            ))
        }

        async fn judge(
            &self,
            _clean: &ResumeDocument,
            _adapted: &ResumeDocument,
            _jd_text: &str,
        ) -> Result<ModelCall, AppError> {
            Ok(stub_call("judge", json!({"score": 90})))
        }
    }

    fn test_config() -> Config {
        Config {
            anthropic_api_key: "test".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            structuring_model: "stub".to_string(),
            arbitrage_model: "stub".to_string(),
            judge_model: "stub".to_string(),
            judge_enabled: true,
            session_ttl: None,
            pricing: PricingTable::default(),
        }
    }

    fn test_app() -> Router {
        build_router(AppState {
            config: test_config(),
            model: Arc::new(StubModel),
            sessions: SessionStore::new(),
        })
    }

    /// Replaces the session's clean CV while the arbitrage call is in flight.
    struct CleanSwappingModel {
        sessions: SessionStore,
        id: uuid::Uuid,
    }

    #[async_trait]
    impl ResumeModel for CleanSwappingModel {
        async fn structure(&self, cv_text: &str) -> Result<ModelCall, AppError> {
            StubModel.structure(cv_text).await
        }

        async fn arbitrage(
            &self,
            clean: &ResumeDocument,
            jd_text: &str,
        ) -> Result<ModelCall, AppError> {
            self.sessions
                .update(self.id, |s| {
                    s.set_clean(StructuringResult {
                        clean_cv: json!({"experience": [{"company": "Globex", "title": "CTO"}]}),
                        raw_cv: None,
                    })
                })
                .await?;
            StubModel.arbitrage(clean, jd_text).await
        }

        async fn judge(
            &self,
            clean: &ResumeDocument,
            adapted: &ResumeDocument,
            jd_text: &str,
        ) -> Result<ModelCall, AppError> {
            StubModel.judge(clean, adapted, jd_text).await
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_session(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "arbiter-api");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let app = test_app();
        let uri = format!("/api/v1/sessions/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_arbitrage_without_clean_cv_is_422() {
        let app = test_app();
        let id = create_session(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/arbitrage"),
            Some(json!({"jd_text": "Rust engineer"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_full_tailoring_flow() {
        let app = test_app();
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/structure"),
            Some(json!({"text": "Ada Lovelace\nEngineer at Acme"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleanCv"]["experience"].as_array().unwrap().len(), 2);
        assert_eq!(body["rawCv"]["method"], "client");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/arbitrage"),
            Some(json!({"jd_text": "Senior Rust engineer, billing"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let arbitrage = &body["arbitrage"];
        assert_eq!(
            arbitrage["document"]["experience"][0]["bullets"][0],
            "Built a Rust billing platform"
        );
        assert_eq!(arbitrage["judge"]["score"], 90, "judge should be attached");
        assert_eq!(arbitrage["editChoices"], json!([true]));

        // reject the bullet edit
        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/edits/0"),
            Some(json!({"accept": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], true);
        assert_eq!(body["adaptedIndex"], 0);
        assert_eq!(body["document"]["experience"][0]["bullets"][0], "Built billing");

        // accepting the whole experience brings back its adapted bullets
        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/experiences/0"),
            Some(json!({"accept": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], true);
        assert_eq!(
            body["document"]["experience"][0]["bullets"][0],
            "Built a Rust billing platform"
        );

        let (status, body) = send(&app, "GET", &format!("{base}/diff"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keptExperiences"], json!([0]));
        assert_eq!(body["removedExperiences"], json!([1]));

        let (status, body) = send(&app, "POST", &format!("{base}/choices/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["arbitrage"]["document"]["experience"][0]["bullets"][0],
            "Built a Rust billing platform"
        );

        let (status, body) = send(&app, "GET", &format!("{base}/cost"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"].as_array().unwrap().len(), 3);
        let total = body["total_usd"].as_f64().unwrap();
        assert!((total - 0.003).abs() < 1e-9, "total was {total}");
        assert_eq!(body["currency"], "USD");
    }

    #[tokio::test]
    async fn test_edit_out_of_range_is_400() {
        let app = test_app();
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");
        send(&app, "POST", &format!("{base}/structure"), Some(json!({"text": "cv"}))).await;
        send(&app, "POST", &format!("{base}/arbitrage"), Some(json!({"jd_text": "jd"}))).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/edits/7"),
            Some(json!({"accept": true})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_cost_ledger_endpoints() {
        let app = test_app();
        let id = create_session(&app).await;
        let uri = format!("/api/v1/sessions/{id}/cost");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"name": "ocr", "model": "vision", "cost_usd": 0.02,
                        "usage": {"prompt_tokens": 100, "completion_tokens": 20}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["total_tokens"], 120);

        let (_, body) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"steps": [{"name": "judge", "cost_usd": 0.01}], "currency": "EUR"})),
        )
        .await;
        assert_eq!(body["steps"].as_array().unwrap().len(), 2);
        assert_eq!(body["currency"], "EUR");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"name": "bogus", "cost_usd": 1.0,
                        "usage": {"prompt_tokens": u64::MAX, "completion_tokens": 1}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"].as_array().unwrap().len(), 3);
        assert_eq!(body["totals"]["total_tokens"], u64::MAX);

        let (status, body) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"], json!([]));
        assert_eq!(body["total_usd"], 0.0);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let app = test_app();
        let id = create_session(&app).await;
        let uri = format!("/api/v1/sessions/{id}");
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_with_clean_cv_and_apply_resolved_arbitrage() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({
                "cleanCv": {"experience": [{"company": "Acme", "position": "Engineer",
                                            "bullets": ["Shipped it"]}]},
                "rawCv": {"text": "Acme Engineer", "method": "vision", "imagesCount": 2}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["cleanCv"]["experience"][0]["title"], "Engineer");
        assert_eq!(body["rawCv"]["imagesCount"], 2);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/v1/sessions/{id}/arbitrage"),
            Some(json!({
                "result": {"experience": [{"company": "Acme", "title": "Engineer",
                                           "bullets": ["Shipped it on time"]}]},
                "report": {"decisions": {"bulletEdits": {
                    "a": {"sourceIndex": 0, "before": "Shipped it", "after": "Shipped it on time"}
                }}},
                "cost": {"name": "arbitrage", "cost_usd": 0.5}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["arbitrage"]["decisions"]["edits"].as_array().unwrap().len(), 1);
        assert_eq!(body["cost"]["total_usd"], 0.5);

        let (status, body) =
            send(&app, "DELETE", &format!("/api/v1/sessions/{id}/arbitrage"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["arbitrage"].is_null());
        assert_eq!(body["cost"]["steps"].as_array().unwrap().len(), 1, "costs survive reset");
    }

    #[tokio::test]
    async fn test_arbitrage_against_replaced_clean_cv_is_409() {
        let sessions = SessionStore::new();
        let (id, ()) = sessions
            .create(|s| {
                s.set_clean(StructuringResult {
                    clean_cv: json!({"experience": [{"company": "Acme", "title": "Engineer"}]}),
                    raw_cv: None,
                })
            })
            .await;
        let app = build_router(AppState {
            config: test_config(),
            model: Arc::new(CleanSwappingModel {
                sessions: sessions.clone(),
                id,
            }),
            sessions,
        });

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/arbitrage"),
            Some(json!({"jd_text": "Rust engineer"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (_, body) = send(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert!(body["arbitrage"].is_null());
        assert_eq!(body["cleanCv"]["experience"][0]["company"], "Globex");
    }
}
