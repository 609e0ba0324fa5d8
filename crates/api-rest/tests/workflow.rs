use api_rest::{router, AppState};
use api_shared::{AuthConfig, TokenIssuer};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use curamind_core::users::{NewUser, UserService};
use curamind_core::{CoreConfig, Role, Store};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "root@hospital.org";
const ADMIN_PASSWORD: &str = "admin-pass";

fn test_app_with_secret(secret: Option<&str>) -> Router {
    let cfg = CoreConfig::in_memory(1_000).expect("config should build");
    let store = Store::open(Arc::new(cfg)).expect("store should open");
    UserService::new(store.clone())
        .create(
            Role::Admin,
            NewUser {
                name: Some("Root".into()),
                email: Some(ADMIN_EMAIL.into()),
                password: Some(ADMIN_PASSWORD.into()),
                ..Default::default()
            },
        )
        .expect("admin should be created");

    let auth = AuthConfig::new(secret.map(String::from), 24).expect("auth config");
    router(AppState::new(store, TokenIssuer::new(&auth)))
}

fn test_app() -> Router {
    test_app_with_secret(Some("integration-secret"))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, email: &str, password: &str, user_type: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password, "userType": user_type })),
    )
    .await
}

async fn token_for(app: &Router, email: &str, password: &str, user_type: &str) -> String {
    let (status, body) = login(app, email, password, user_type).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router) -> String {
    token_for(app, ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await
}

async fn create_doctor(app: &Router, admin: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/doctors",
        Some(admin),
        Some(json!({
            "name": "Dr. Grey",
            "email": email,
            "password": "doctor-pass",
            "specialization": "Cardiology"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "doctor creation failed: {body}");
    body["data"]["_id"].as_str().unwrap().to_string()
}

fn patient_body(email: &str, doctor: Option<&str>) -> Value {
    json!({
        "name": "John Doe",
        "age": 42,
        "gender": "male",
        "email": email,
        "phone": "555-0199",
        "address": {
            "street": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "postalCode": "62701"
        },
        "assignedDoctor": doctor
    })
}

#[tokio::test]
async fn health_is_open() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn booking_workflow_rejects_second_appointment_on_same_day() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let doctor_id = create_doctor(&app, &admin, "grey@hospital.org").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/receptionists",
        Some(&admin),
        Some(json!({
            "name": "Front Desk",
            "email": "desk@hospital.org",
            "password": "desk-pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let desk = token_for(&app, "desk@hospital.org", "desk-pass", "receptionist").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/patients",
        Some(&desk),
        Some(patient_body("john@doe.com", Some(&doctor_id))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    let patient_id = body["data"]["_id"].as_str().unwrap().to_string();

    let booking = json!({
        "patient": patient_id,
        "doctor": doctor_id,
        "date": "2024-06-01",
        "time": "09:00",
        "reason": "Checkup"
    });
    let (status, body) = send(&app, Method::POST, "/appointments", Some(&desk), Some(booking.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    let first_id = body["data"]["_id"].as_str().unwrap().to_string();

    let mut second = booking;
    second["time"] = json!("15:00");
    let (status, body) = send(&app, Method::POST, "/appointments", Some(&desk), Some(second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains(&first_id));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/doctors/{doctor_id}"),
        Some(&desk),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["patients"], json!([patient_id]));
    assert_eq!(body["data"]["appointments"], json!([first_id]));
    assert_eq!(body["data"]["specialization"], "Cardiology");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/doctors/{doctor_id}/appointments"),
        Some(&desk),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn login_only_matches_the_claimed_role() {
    let app = test_app();
    let admin = admin_token(&app).await;
    create_doctor(&app, &admin, "grey@hospital.org").await;

    let (status, body) = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD, "doctor").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = login(&app, "grey@hospital.org", "doctor-pass", "admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = login(&app, ADMIN_EMAIL, "wrong-pass", "admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD, "superuser").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid user type");

    let (status, body) = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn missing_or_bad_tokens_are_unauthorized() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "message": "Not authorized, no token" }));

    let (status, body) = send(&app, Method::GET, "/patients", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn role_gate_refuses_disallowed_roles() {
    let app = test_app();
    let admin = admin_token(&app).await;
    create_doctor(&app, &admin, "grey@hospital.org").await;
    let doctor = token_for(&app, "grey@hospital.org", "doctor-pass", "doctor").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/patients",
        Some(&doctor),
        Some(patient_body("john@doe.com", None)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden: insufficient role");

    let (status, _) = send(&app, Method::GET, "/receptionists", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/patients", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/prescriptions/manual",
        Some(&admin),
        Some(json!({ "patient": "x", "content": "Rest" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validation_and_not_found_shapes() {
    let app = test_app();
    let admin = admin_token(&app).await;

    let mut body = patient_body("john@doe.com", None);
    body["address"]["city"] = Value::Null;
    let (status, response) = send(&app, Method::POST, "/patients", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "address.city is required");

    let unknown = "0123456789abcdef0123456789abcdef";
    let (status, response) = send(
        &app,
        Method::POST,
        "/patients",
        Some(&admin),
        Some(patient_body("john@doe.com", Some(unknown))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["message"], "Doctor not found");

    let (_, listed) = send(&app, Method::GET, "/patients", Some(&admin), None).await;
    assert_eq!(listed["total"], 0);

    let (status, response) = send(
        &app,
        Method::GET,
        &format!("/patients/{unknown}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["message"], "Patient not found");

    let (status, _) = send(&app, Method::GET, "/patients/not-an-id", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prescriptions_belong_to_their_author() {
    let app = test_app();
    let admin = admin_token(&app).await;
    create_doctor(&app, &admin, "a@hospital.org").await;
    create_doctor(&app, &admin, "b@hospital.org").await;
    let author = token_for(&app, "a@hospital.org", "doctor-pass", "doctor").await;
    let other = token_for(&app, "b@hospital.org", "doctor-pass", "doctor").await;

    let (_, patient) = send(
        &app,
        Method::POST,
        "/patients",
        Some(&admin),
        Some(patient_body("john@doe.com", None)),
    )
    .await;
    let patient_id = patient["data"]["_id"].as_str().unwrap().to_string();

    let (status, created) = send(
        &app,
        Method::POST,
        "/prescriptions/manual",
        Some(&author),
        Some(json!({ "patient": patient_id, "content": "Amoxicillin 500mg" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["data"]["source"], "manual");
    let rx_id = created["data"]["_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/prescriptions/{rx_id}"),
        Some(&other),
        Some(json!({ "content": "Something else" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/prescriptions/patient/{patient_id}"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"][0]["content"], "Amoxicillin 500mg");
}

#[tokio::test]
async fn own_profile_can_be_read_and_updated() {
    let app = test_app();
    let admin = admin_token(&app).await;

    let (status, me) = send(&app, Method::GET, "/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], ADMIN_EMAIL);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/auth/me",
        Some(&admin),
        Some(json!({ "password": "rotated-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, ADMIN_EMAIL, "rotated-pass", "admin").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_secret_is_a_server_error() {
    let app = test_app_with_secret(None);
    let (status, body) = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Server configuration error");
}
