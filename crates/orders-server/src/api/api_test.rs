use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;

const ACME: &str = "\
shop: Acme
categories:
  - id: 1
    name: Tools
goods:
  - id: 10
    category: 1
    name: Hammer
    model: H1
    price: 500
    price_rrc: 600
    quantity: 5
    parameters:
      Weight: 1kg
";

const BOUNDARY: &str = "orders-test-boundary";

fn test_app(pool: PgPool) -> Router {
    build_app(
        AppState {
            pool,
            token_ttl_hours: 24,
            import_max_bytes: 64 * 1024,
        },
        RateLimitState::per_minute(10_000),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn upload_request(token: &str, yaml: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"shop.yaml\"\r\n\
         Content-Type: application/x-yaml\r\n\r\n\
         {yaml}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/import-products")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .expect("request")
}

/// Registers an account through the API and returns a fresh token for it.
async fn register_and_login(app: &Router, email: &str, role: &str) -> String {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/register",
            None,
            &json!({
                "email": email,
                "first_name": "Test",
                "last_name": "User",
                "password": "password123",
                "type": role,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {email}");

    let (status, json) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/login",
            None,
            &json!({ "email": email, "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login {email}");
    json["data"]["token"]
        .as_str()
        .expect("token string")
        .to_string()
}

// ---------------------------------------------------------------------------
// Envelope and error mapping (no DB)
// ---------------------------------------------------------------------------

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None), 50);
    assert_eq!(normalize_limit(Some(0)), 1);
    assert_eq!(normalize_limit(Some(1_000)), 200);
    assert_eq!(normalize_limit(Some(25)), 25);
}

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("bad_request", StatusCode::BAD_REQUEST),
        ("forbidden", StatusCode::FORBIDDEN),
        ("not_found", StatusCode::NOT_FOUND),
        ("payload_too_large", StatusCode::PAYLOAD_TOO_LARGE),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, expected) in cases {
        let response = ApiError::new("req-1", code, "message").into_response();
        assert_eq!(response.status(), expected, "code {code}");
    }
}

#[test]
fn domain_db_errors_keep_their_message() {
    let err = map_db_error("req-1".to_string(), &DbError::EmptyOrder(7));
    assert_eq!(err.error.code, "bad_request");
    assert_eq!(err.error.message, "order 7 has no items");

    let err = map_db_error(
        "req-1".to_string(),
        &DbError::Forbidden("shop 'Acme' belongs to another account".to_string()),
    );
    assert_eq!(err.error.code, "forbidden");
}

#[test]
fn infrastructure_db_errors_are_generic() {
    let err = map_db_error("req-1".to_string(), &DbError::Sqlx(sqlx::Error::PoolTimedOut));
    assert_eq!(err.error.code, "internal_error");
    assert_eq!(err.error.message, "database query failed");
}

// ---------------------------------------------------------------------------
// Routes (with DB)
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (status, json) = send(&app, get_request("/api/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["database"], "ok");
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_a_valid_token(pool: sqlx::PgPool) {
    let app = test_app(pool);

    let (status, json) = send(&app, get_request("/api/v1/cart", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");
    assert!(json["meta"]["request_id"].is_string());

    let (status, _) = send(&app, get_request("/api/v1/orders", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn register_rejects_duplicates_and_login_rejects_bad_passwords(pool: sqlx::PgPool) {
    let app = test_app(pool);
    register_and_login(&app, "buyer@acme.test", "buyer").await;

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/register",
            None,
            &json!({
                "email": "Buyer@Acme.test",
                "first_name": "Again",
                "last_name": "User",
                "password": "password123",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/login",
            None,
            &json!({ "email": "buyer@acme.test", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn register_with_missing_fields_is_a_bad_request(pool: sqlx::PgPool) {
    let app = test_app(pool);

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/register",
            None,
            &json!({ "email": "buyer@acme.test", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"]["message"]
        .as_str()
        .expect("message")
        .contains("first_name"));
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_json_bodies_use_the_error_envelope(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let buyer = register_and_login(&app, "buyer@acme.test", "buyer").await;

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/cart",
            Some(&buyer),
            &json!({ "product_id": "ten", "quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/confirm-order",
            Some(&buyer),
            &json!({ "order_id": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/contacts")
        .header(header::AUTHORIZATION, format!("Bearer {buyer}"))
        .body(Body::from(r#"{"type":"phone","value":"1"}"#))
        .expect("request");
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "missing content type");
    assert_eq!(json["error"]["code"], "bad_request");
}

#[sqlx::test(migrations = "../../migrations")]
async fn import_without_multipart_body_is_a_bad_request(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let shop = register_and_login(&app, "shop@acme.test", "shop").await;

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/import-products",
            Some(&shop),
            &json!({ "file": "shop: Acme" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}

#[sqlx::test(migrations = "../../migrations")]
async fn buyers_cannot_import(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let token = register_and_login(&app, "buyer@acme.test", "buyer").await;

    let (status, json) = send(&app, upload_request(&token, ACME)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_upload_is_a_bad_request(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let token = register_and_login(&app, "shop@acme.test", "shop").await;

    let (status, json) = send(&app, upload_request(&token, "shop: [unterminated")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn import_browse_cart_confirm_and_history(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let shop = register_and_login(&app, "shop@acme.test", "shop").await;
    let buyer = register_and_login(&app, "buyer@acme.test", "buyer").await;

    let (status, json) = send(&app, upload_request(&shop, ACME)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["listings"], 1);
    assert_eq!(json["data"]["parameters"], 1);

    let (status, json) = send(&app, get_request("/api/v1/products?search=ham", None)).await;
    assert_eq!(status, StatusCode::OK);
    let product = &json["data"][0];
    assert_eq!(product["product_name"], "Hammer");
    assert_eq!(product["shop_name"], "Acme");
    assert_eq!(product["parameters"][0]["name"], "Weight");
    assert_eq!(product["parameters"][0]["value"], "1kg");
    let product_id = product["product_id"].as_i64().expect("product id");

    let (status, json) = send(&app, get_request("/api/v1/cart", Some(&buyer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["empty"], true);
    assert!(json["data"]["order_id"].is_null());

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/cart",
            Some(&buyer),
            &json!({ "product_id": product_id, "quantity": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["quantity"], 2);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/cart",
            Some(&buyer),
            &json!({ "product_id": product_id, "quantity": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(&app, get_request("/api/v1/cart", Some(&buyer))).await;
    let order_id = json["data"]["order_id"].as_i64().expect("order id");
    assert_eq!(json["data"]["empty"], false);

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/contacts",
            Some(&buyer),
            &json!({ "type": "phone", "value": "+7 900 000 00 00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let contact_id = json["data"]["id"].as_i64().expect("contact id");

    let (status, json) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/confirm-order",
            Some(&buyer),
            &json!({ "order_id": order_id, "contact_id": contact_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "in_progress");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/confirm-order",
            Some(&buyer),
            &json!({ "order_id": order_id, "contact_id": contact_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "already confirmed");

    let (status, json) = send(&app, get_request("/api/v1/orders", Some(&buyer))).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json["data"].as_array().expect("orders array");
    assert_eq!(orders.len(), 1);
    let total: rust_decimal::Decimal = orders[0]["total"]
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal");
    assert_eq!(total, rust_decimal::Decimal::from(1000));

    let (status, _) = send(
        &app,
        get_request(&format!("/api/v1/orders/{order_id}"), Some(&shop)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "other users see 404");

    let (status, json) = send(
        &app,
        get_request(&format!("/api/v1/orders/{order_id}"), Some(&buyer)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["items"][0]["product_name"], "Hammer");
}

#[sqlx::test(migrations = "../../migrations")]
async fn removing_an_unknown_cart_item_is_not_found(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let buyer = register_and_login(&app, "buyer@acme.test", "buyer").await;

    let (status, json) = send(
        &app,
        json_request(
            Method::DELETE,
            "/api/v1/cart",
            Some(&buyer),
            &json!({ "item_id": 12345 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn logout_revokes_the_token(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let buyer = register_and_login(&app, "buyer@acme.test", "buyer").await;

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/v1/logout", Some(&buyer), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get_request("/api/v1/contacts", Some(&buyer))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
