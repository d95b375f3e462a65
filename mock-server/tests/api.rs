use axum::http::{self, Request, StatusCode};
use axum::response::Response;
use axum::routing::RouterIntoService;
use http_body_util::BodyExt;
use mock_server::{
    app, ADMIN_PASSWORD, ADMIN_USERNAME, BANK_ACCOUNT_TYPE_KEY, PERSON_TYPE_KEY, SEED_FORM_ID,
    SEED_PERSON_ID, USER_PASSWORD, USER_USERNAME,
};
use serde_json::{json, Value};
use tower::{Service, ServiceExt};

type App = RouterIntoService<String>;

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(uri: &str, body: &Value) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn authed(uri: &str, token: &str, body: &Value) -> Request<String> {
    let mut request = json_request(uri, body);
    request.headers_mut().insert(
        http::header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &mut App, request: Request<String>) -> Response {
    ServiceExt::ready(app).await.unwrap().call(request).await.unwrap()
}

async fn login(app: &mut App, username: &str, password: &str) -> String {
    let resp = send(
        app,
        json_request(
            "/api/v2/auth/login",
            &json!({"username": username, "password": password, "deviceId": "d", "platformType": 1}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = body_json(resp).await;
    token["accessToken"].as_str().unwrap().to_string()
}

// --- auth ---

#[tokio::test]
async fn login_issues_tokens_for_both_accounts() {
    let mut app = app().into_service();
    let admin = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let user = login(&mut app, USER_USERNAME, USER_PASSWORD).await;
    assert!(!admin.is_empty());
    assert_ne!(admin, user);
}

#[tokio::test]
async fn login_with_wrong_password_is_invalid_grant() {
    let resp = app()
        .oneshot(json_request(
            "/api/v2/auth/login",
            &json!({"username": ADMIN_USERNAME, "password": "nope"}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "Invalid user credentials");
}

#[tokio::test]
async fn missing_token_returns_401() {
    let resp = app()
        .oneshot(json_request(
            "/api/v2/crmobject/form/get",
            &json!({"id": SEED_FORM_ID}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("bearer token"));
}

#[tokio::test]
async fn unknown_token_returns_401() {
    let resp = app()
        .oneshot(authed(
            "/api/v2/crmobject/person/get",
            "forged",
            &json!({"id": SEED_PERSON_ID}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_login_body_is_rejected() {
    let resp = app()
        .oneshot(json_request("/api/v2/auth/login", &json!({"user": 1})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_seeded_person_and_form() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/person/get", &token, &json!({"id": SEED_PERSON_ID})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let person: Value = body_json(resp).await;
    assert_eq!(person["crmId"], SEED_PERSON_ID);
    assert_eq!(person["firstName"], "Erfan");

    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/form/get", &token, &json!({"id": SEED_FORM_ID})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let form: Value = body_json(resp).await;
    assert_eq!(form["CrmId"], SEED_FORM_ID);
    assert_eq!(form["CrmObjectTypeCode"], BANK_ACCOUNT_TYPE_KEY);
    assert_eq!(form["Tags"], "deposit");
}

#[tokio::test]
async fn get_unknown_form_returns_404() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/form/get", &token, &json!({"id": "missing"})),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["message"], "form not found");
}

// --- find ---

#[tokio::test]
async fn find_form_by_extended_properties() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let find = json!({
        "typeKey": BANK_ACCOUNT_TYPE_KEY,
        "queries": [
            {"logicalOperator": 0, "operator": 0, "field": "TrackingNumber", "value": "778756"},
            {"logicalOperator": 0, "operator": 0, "field": "DepositAmount", "value": "625000000"}
        ],
        "pageNumber": 1,
        "pageSize": 10
    });
    let resp = send(&mut app, authed("/api/v2/crmobject/form/find", &token, &find)).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["CrmId"], SEED_FORM_ID);
}

#[tokio::test]
async fn find_person_by_name() {
    let mut app = app().into_service();
    let token = login(&mut app, USER_USERNAME, USER_PASSWORD).await;
    let find = json!({
        "typeKey": PERSON_TYPE_KEY,
        "queries": [
            {"field": "FirstName", "value": "Erfan"},
            {"field": "LastName", "value": "Nobody"}
        ]
    });
    let resp = send(&mut app, authed("/api/v2/crmobject/person/find", &token, &find)).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["total"], 0);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn find_with_unsupported_operator_returns_400() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let find = json!({
        "typeKey": PERSON_TYPE_KEY,
        "queries": [{"operator": 10, "field": "FirstName", "value": "^E"}]
    });
    let resp = send(&mut app, authed("/api/v2/crmobject/person/find", &token, &find)).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- forms ---

#[tokio::test]
async fn form_lifecycle() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    // create
    let create = json!({
        "crmObjectTypeCode": "SettlementRequest",
        "parentCrmObjectId": SEED_PERSON_ID,
        "extendedProperties": [{"userKey": "DepositAmount", "value": "1000"}],
        "identityId": SEED_PERSON_ID,
        "tags": null,
        "colorId": 1
    });
    let resp = send(&mut app, authed("/api/v2/crmobject/form/create", &token, &create)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = body_json(resp).await;
    let id = created["crmId"].as_str().unwrap().to_string();

    // update: replace one property, add another, set tags
    let update = json!({
        "crmId": id,
        "extendedProperties": [
            {"userKey": "DepositAmount", "value": "2000"},
            {"userKey": "Status", "value": "Approved"}
        ],
        "tags": ["settled", "audited"]
    });
    let resp = send(&mut app, authed("/api/v2/crmobject/form/update", &token, &update)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = body_json(resp).await;
    assert_eq!(updated["crmId"], id.as_str());

    // get reflects the update
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/form/get", &token, &json!({"id": id})),
    )
    .await;
    let form: Value = body_json(resp).await;
    assert_eq!(form["ExtendedProperties"][0]["Value"], "2000");
    assert_eq!(form["ExtendedProperties"][1]["UserKey"], "Status");
    assert_eq!(form["Tags"], json!(["settled", "audited"]));
}

#[tokio::test]
async fn create_form_without_type_returns_400() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/form/create", &token, &json!({"colorId": 1})),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_unknown_form_returns_404() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/form/update", &token, &json!({"crmId": "missing"})),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- purchases ---

#[tokio::test]
async fn purchase_lifecycle() {
    let mut app = app().into_service();
    let token = login(&mut app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let purchase = json!({
        "crmObjectTypeCode": "PurchaseInvoice",
        "details": [{"productCode": "P-1", "count": 2, "finalUnitPrice": 500}],
        "finalValue": 1000
    });
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/invoice/purchase/create", &token, &purchase),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = body_json(resp).await;
    let id = created["crmId"].as_str().unwrap().to_string();

    let delete = json!({"id": id, "option": 1});
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/invoice/purchase/delete", &token, &delete),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // second delete: already gone
    let resp = send(
        &mut app,
        authed("/api/v2/crmobject/invoice/purchase/delete", &token, &delete),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
