/// API routes and handlers
pub mod auth;
pub mod chat;
pub mod middleware;
pub mod patient_auth;
pub mod patients;
pub mod reports;
pub mod vitals;

use crate::{config::ServerConfig, context::AppContext};
use axum::Router;

/// Build API routes
pub fn routes(config: &ServerConfig) -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(patient_auth::routes())
        .merge(patients::routes())
        .merge(reports::routes(config.uploads.report_max_bytes))
        .merge(vitals::routes())
        .merge(chat::routes(config.uploads.chat_image_max_bytes))
}

#[cfg(test)]
mod tests {
    use crate::{
        context::AppContext, patient::sample_request, server::build_router,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::tempdir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "icu-test-boundary";

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn multipart_request(
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: (&str, &str, &str, &[u8]),
    ) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        let (field, filename, content_type, data) = file;
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, field, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body))
            .unwrap()
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_file())
                    .count()
            })
            .unwrap_or(0)
    }

    async fn register_admin(app: &Router, email: &str) -> String {
        let (status, body) = send(
            app,
            json_request(
                Method::POST,
                "/auth/register",
                None,
                json!({"email": email, "password": "admin-pass", "name": "Admin"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let dir = tempdir().unwrap();
        let app = build_router(AppContext::for_tests(dir.path()).await);

        let (status, body) = send(&app, empty_request(Method::GET, "/auth/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));

        let (status, _) = send(&app, empty_request(Method::GET, "/patients", Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let dir = tempdir().unwrap();
        let app = build_router(AppContext::for_tests(dir.path()).await);

        let (status, body) = send(&app, empty_request(Method::GET, "/nope", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_body() {
        let dir = tempdir().unwrap();
        let app = build_router(AppContext::for_tests(dir.path()).await);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_staff_cannot_manage_staff() {
        let dir = tempdir().unwrap();
        let app = build_router(AppContext::for_tests(dir.path()).await);
        let admin_token = register_admin(&app, "admin@icu.test").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/create-staff",
                Some(&admin_token),
                json!({"email": "nurse@icu.test", "name": "Nurse Joy"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let staff_id = body["data"]["id"].as_str().unwrap().to_string();
        assert!(body["data"].get("passwordHash").is_none());
        assert!(body["data"].get("password_hash").is_none());

        // Initial password is the name
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({"email": "nurse@icu.test", "password": "Nurse Joy", "loginAs": "staff"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let staff_token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            empty_request(
                Method::DELETE,
                &format!("/auth/staff/{}", staff_id),
                Some(&staff_token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            empty_request(Method::GET, "/auth/my-staff", Some(&admin_token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(1));
    }

    #[tokio::test]
    async fn test_login_as_wrong_portal_fails() {
        let dir = tempdir().unwrap();
        let app = build_router(AppContext::for_tests(dir.path()).await);
        register_admin(&app, "admin@icu.test").await;

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({"email": "admin@icu.test", "password": "admin-pass", "loginAs": "staff"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // An unknown portal is a failed login, not a bad request
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({"email": "admin@icu.test", "password": "admin-pass", "loginAs": "doctor"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));

        // An empty portal counts as absent
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({"email": "admin@icu.test", "password": "admin-pass", "loginAs": ""}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["role"], json!("admin"));
    }

    #[tokio::test]
    async fn test_upload_download_delete_flow() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;
        let upload_dir = ctx.config.storage.upload_directory.clone();
        let patient = ctx
            .patient_manager
            .create_patient(sample_request("jane@example.com"), "seed")
            .await
            .unwrap();
        let app = build_router(ctx);
        let token = register_admin(&app, "admin@icu.test").await;

        let (status, body) = send(
            &app,
            multipart_request(
                "/reports/upload",
                &token,
                &[
                    ("patientId", patient.id.as_str()),
                    ("title", "Chest X-ray"),
                    ("category", "radiology"),
                    ("tags", "not json"),
                ],
                ("file", "chest scan.pdf", "application/pdf", b"%PDF-1.4 test"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["type"], json!("pdf"));
        assert_eq!(body["data"]["tags"], json!([]));
        assert_eq!(count_files(&upload_dir), 1);
        let report_id = body["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(empty_request(
                Method::GET,
                &format!("/reports/{}/download", report_id),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("chest%20scan.pdf"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 test");

        let (status, _) = send(
            &app,
            empty_request(Method::DELETE, &format!("/reports/{}", report_id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count_files(&upload_dir), 0);

        let (status, _) = send(
            &app,
            empty_request(Method::GET, &format!("/reports/{}", report_id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_for_missing_patient_leaves_no_artifact() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;
        let upload_dir = ctx.config.storage.upload_directory.clone();
        let app = build_router(ctx);
        let token = register_admin(&app, "admin@icu.test").await;

        let (status, body) = send(
            &app,
            multipart_request(
                "/reports/upload",
                &token,
                &[("patientId", "no-such-patient"), ("title", "Lab")],
                ("file", "lab.png", "image/png", b"\x89PNG fake"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
        assert_eq!(count_files(&upload_dir), 0);
    }

    #[tokio::test]
    async fn test_patient_portal_is_scoped_and_read_only() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;
        let jane = ctx
            .patient_manager
            .create_patient(sample_request("jane@example.com"), "seed")
            .await
            .unwrap();
        let other = ctx
            .patient_manager
            .create_patient(sample_request("other@example.com"), "seed")
            .await
            .unwrap();
        let app = build_router(ctx);

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/patient-auth/request-otp",
                None,
                json!({"name": "Jane Doe", "phone": "5550100", "email": "JANE@example.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let code = body["data"]["debugOtp"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/patient-auth/verify-otp",
                None,
                json!({"email": "jane@example.com", "otp": code}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["patient"]["patientId"], json!(jane.patient_id));
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            empty_request(Method::GET, &format!("/patients/{}", jane.id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            empty_request(Method::GET, &format!("/patients/{}", other.id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            empty_request(
                Method::GET,
                &format!("/reports/patient/{}", other.id),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/reports/text",
                Some(&token),
                json!({"patientId": jane.id, "title": "Note", "content": "self-written"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The code was consumed
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/patient-auth/verify-otp",
                None,
                json!({"email": "jane@example.com", "otp": code}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_image_for_foreign_patient_is_removed() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;
        let chat_dir = ctx.config.storage.upload_directory.join("chat-images");
        let jane = ctx
            .patient_manager
            .create_patient(sample_request("jane@example.com"), "seed")
            .await
            .unwrap();
        let other = ctx
            .patient_manager
            .create_patient(sample_request("other@example.com"), "seed")
            .await
            .unwrap();
        let token = ctx.token_service.issue_patient_token(&jane.id).unwrap();
        let app = build_router(ctx);

        let (status, _) = send(
            &app,
            multipart_request(
                &format!("/chat/analyze-image/{}", other.id),
                &token,
                &[],
                ("image", "rash.png", "image/png", b"\x89PNG fake"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(count_files(&chat_dir), 0);

        let (status, body) = send(
            &app,
            multipart_request(
                &format!("/chat/analyze-image/{}", jane.id),
                &token,
                &[("message", "What is this?")],
                ("image", "rash.png", "image/png", b"\x89PNG fake"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["imageUrl"]
            .as_str()
            .unwrap()
            .contains("/uploads/chat-images/"));
        assert_eq!(count_files(&chat_dir), 1);

        // PDFs are not chat images
        let (status, _) = send(
            &app,
            multipart_request(
                &format!("/chat/analyze-image/{}", jane.id),
                &token,
                &[],
                ("image", "scan.pdf", "application/pdf", b"%PDF"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(count_files(&chat_dir), 1);
    }
    #[tokio::test]
    async fn test_vitals_flow() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;
        let jane = ctx
            .patient_manager
            .create_patient(sample_request("jane@example.com"), "seed")
            .await
            .unwrap();
        let other = ctx
            .patient_manager
            .create_patient(sample_request("other@example.com"), "seed")
            .await
            .unwrap();
        let patient_token = ctx.token_service.issue_patient_token(&jane.id).unwrap();
        let app = build_router(ctx);
        let token = register_admin(&app, "admin@icu.test").await;

        let three_days_ago = (chrono::Utc::now() - chrono::Duration::days(3)).to_rfc3339();
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/vitals",
                Some(&token),
                json!({"patientId": jane.id, "heartRate": 70, "timestamp": three_days_ago}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/vitals",
                Some(&token),
                json!({"patientId": jane.id, "heartRate": 90, "oxygenSaturation": 96}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let vital_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/vitals",
                Some(&token),
                json!({"patientId": jane.id, "oxygenSaturation": 140}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/vitals",
                Some(&token),
                json!({"patientId": "no-such-patient", "heartRate": 70}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            empty_request(
                Method::GET,
                &format!("/vitals/patient/{}?timeRange=24h", jane.id),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(1));

        let (status, body) = send(
            &app,
            empty_request(
                Method::GET,
                &format!("/vitals/patient/{}?timeRange=bogus", jane.id),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(2));
        assert_eq!(body["data"][0]["heartRate"], json!(90.0));

        let (status, _) = send(
            &app,
            empty_request(Method::GET, "/vitals/patient/no-such-patient", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Patients read their own vitals only, and never write
        let (status, body) = send(
            &app,
            empty_request(
                Method::GET,
                &format!("/vitals/patient/{}/latest", jane.id),
                Some(&patient_token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], json!(vital_id));

        let (status, _) = send(
            &app,
            empty_request(
                Method::GET,
                &format!("/vitals/patient/{}", other.id),
                Some(&patient_token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            empty_request(
                Method::DELETE,
                &format!("/vitals/{}", vital_id),
                Some(&patient_token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            empty_request(Method::DELETE, &format!("/vitals/{}", vital_id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            empty_request(Method::GET, &format!("/vitals/{}", vital_id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
