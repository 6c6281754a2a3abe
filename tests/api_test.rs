#[cfg(test)]
mod api_integration_tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use siteprogress::auth::LocalAuthClient;
    use siteprogress::build_router;
    use siteprogress::core::config::AppConfig;
    use siteprogress::core::data::{DataClient, MemoryDataClient, Table};
    use siteprogress::AppState;

    const EMAIL: &str = "engineer@site.test";
    const PASSWORD: &str = "concrete-pour-42";

    async fn app() -> (Router, Arc<MemoryDataClient>) {
        let config = AppConfig::from_lookup(|key| match key {
            "DATA_BACKEND" => Some("memory".to_string()),
            "JWT_SECRET" => Some("integration-test-secret-with-enough-length".to_string()),
            _ => None,
        })
        .expect("config");
        let memory = Arc::new(MemoryDataClient::new());
        let data: Arc<dyn DataClient> = memory.clone();
        let auth = LocalAuthClient::new(Arc::clone(&data), &config.auth);
        auth.create_user(EMAIL, PASSWORD, Some("Site Engineer"))
            .await
            .expect("create user");
        let state = Arc::new(AppState::new(data, Arc::new(auth), config));
        (build_router(state), memory)
    }

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login(app: &Router) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": EMAIL, "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }

    #[tokio::test]
    async fn test_requests_without_session_are_rejected() {
        let (app, _) = app().await;
        let (status, _) = send(&app, Method::GET, "/api/records/concrete_plan", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/records/concrete_plan", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let (app, _) = app().await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": EMAIL, "password": "not-the-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_overwrite_and_confirmed_delete() {
        let (app, memory) = app().await;
        let token = login(&app).await;
        let row = json!({ "year": 2025, "month": 3, "week": 2, "tower": "T1", "planned_volume": 120.0 });

        let (status, created) =
            send(&app, Method::POST, "/api/records/concrete_plan", Some(&token), Some(row.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().expect("id");

        let (status, body) =
            send(&app, Method::POST, "/api/records/concrete_plan", Some(&token), Some(row)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["existing"]["id"].as_i64(), Some(id));

        let overwrite = json!({ "year": 2025, "month": 3, "week": 2, "tower": "T1", "planned_volume": 150.0 });
        let (status, body) =
            send(&app, Method::PUT, "/api/records/concrete_plan", Some(&token), Some(overwrite)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["planned_volume"].as_f64(), Some(150.0));
        assert_eq!(memory.row_count(Table::ConcretePlan).await, 1);

        let uri = format!("/api/records/concrete_plan/{id}");
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(memory.row_count(Table::ConcretePlan).await, 1);

        let (status, _) = send(&app, Method::DELETE, &format!("{uri}?confirm=true"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(memory.row_count(Table::ConcretePlan).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_record_is_rejected_without_write() {
        let (app, memory) = app().await;
        let token = login(&app).await;
        let row = json!({ "year": 2025, "month": 13, "week": 2, "tower": "T1", "planned_volume": 10.0 });
        let (status, _) =
            send(&app, Method::POST, "/api/records/concrete_plan", Some(&token), Some(row)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(memory.row_count(Table::ConcretePlan).await, 0);

        let (status, _) = send(&app, Method::GET, "/api/records/app_users", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plan_actual_summary() {
        let (app, _) = app().await;
        let token = login(&app).await;
        let rows = [
            ("concrete_plan", json!({ "year": 2025, "month": 1, "week": 1, "tower": "T1", "planned_volume": 10.0 })),
            ("concrete_plan", json!({ "year": 2025, "month": 2, "week": 1, "tower": "T1", "planned_volume": 5.0 })),
            ("concrete_actual", json!({ "year": 2025, "month": 1, "week": 1, "tower": "T1", "actual_volume": 8.0 })),
            ("concrete_actual", json!({ "year": 2025, "month": 2, "week": 1, "tower": "T1", "actual_volume": 6.0 })),
            ("concrete_actual", json!({ "year": 2024, "month": 2, "week": 1, "tower": "T1", "actual_volume": 99.0 })),
        ];
        for (table, row) in rows {
            let (status, _) =
                send(&app, Method::POST, &format!("/api/records/{table}"), Some(&token), Some(row)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, summary) =
            send(&app, Method::GET, "/api/summary/concrete?year=2025", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total_planned"].as_f64(), Some(15.0));
        assert_eq!(summary["total_actual"].as_f64(), Some(14.0));
        assert_eq!(summary["months"][1]["cumulative_actual"].as_f64(), Some(14.0));

        let (status, _) = send(&app, Method::GET, "/api/summary/rebar", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_finish_date_variance_is_derived() {
        let (app, _) = app().await;
        let token = login(&app).await;
        let row = json!({
            "tower": "T2",
            "planned_finish": "2025-06-01",
            "projected_finish": "2025-06-11",
            "variance_days": 0
        });
        let (status, body) =
            send(&app, Method::PUT, "/api/records/tower_finish_dates", Some(&token), Some(row)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["variance_days"].as_i64(), Some(10));

        let (status, statuses) =
            send(&app, Method::GET, "/api/summary/finish-dates", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(statuses[0]["tower"], "T2");
    }

    #[tokio::test]
    async fn test_cumulative_series_ignores_blank_tower() {
        let (app, _) = app().await;
        let token = login(&app).await;
        let rows = [
            ("concrete_plan", json!({ "year": 2025, "month": 1, "week": 1, "tower": "T1", "planned_volume": 10.0 })),
            ("concrete_plan", json!({ "year": 2025, "month": 3, "week": 1, "tower": "T2", "planned_volume": 4.0 })),
            ("concrete_actual", json!({ "year": 2025, "month": 2, "week": 1, "tower": "T1", "actual_volume": 7.0 })),
        ];
        for (table, row) in rows {
            let (status, _) =
                send(&app, Method::POST, &format!("/api/records/{table}"), Some(&token), Some(row)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, summary) =
            send(&app, Method::GET, "/api/summary/concrete?year=2025&tower=", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total_planned"].as_f64(), Some(14.0));

        let (status, series) =
            send(&app, Method::GET, "/api/summary/concrete/cumulative?year=2025&tower=", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(series["planned"][0].as_f64(), Some(10.0));
        assert_eq!(series["planned"][11].as_f64(), Some(14.0));
        assert_eq!(series["actual"][11].as_f64(), Some(7.0));

        let (status, series) =
            send(&app, Method::GET, "/api/summary/concrete/cumulative?year=2025&tower=T2", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(series["planned"][11].as_f64(), Some(4.0));
        assert_eq!(series["actual"][11].as_f64(), Some(0.0));
    }
}
