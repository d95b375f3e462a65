//! In-memory stand-in for the CRM HTTP API.
//!
//! Every endpoint is a POST under `/api/v2`. Login hands out opaque bearer
//! tokens; all other endpoints reject requests without one. The store is
//! seeded with one person and one bank-account form so lookups work out of
//! the box.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-secret";
pub const USER_USERNAME: &str = "customer";
pub const USER_PASSWORD: &str = "customer-secret";

pub const SEED_PERSON_ID: &str = "f845cf77-fec4-4631-b106-7f3d8580321b";
pub const SEED_FORM_ID: &str = "d81d07dd-9c4e-4a2f-8f0b-2b6f3c1e5a77";
pub const PERSON_TYPE_KEY: &str = "Kanon01";
pub const BANK_ACCOUNT_TYPE_KEY: &str = "BankAccount";

// --- wire types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub platform_type: i32,
}

#[derive(Debug, Deserialize)]
pub struct ById {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "UserKey", alias = "userKey")]
    pub user_key: String,
    #[serde(rename = "Value", alias = "value", default)]
    pub value: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub crm_id: String,
    pub crm_object_type_code: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub national_code: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub extended_properties: Vec<Property>,
}

/// Stored form. Absent optionals are omitted rather than sent as null, and
/// tags go out as a bare string when there is exactly one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Form {
    pub crm_id: String,
    pub crm_object_type_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_crm_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub identity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    pub color_id: i64,
    #[serde(serialize_with = "collapse_single")]
    pub tags: Vec<String>,
    pub extended_properties: Vec<Property>,
}

fn collapse_single<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    match tags {
        [only] => serializer.serialize_str(only),
        _ => tags.serialize(serializer),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateForm {
    #[serde(default)]
    pub crm_object_type_code: String,
    pub parent_crm_object_id: Option<String>,
    #[serde(default)]
    pub extended_properties: Vec<Property>,
    #[serde(default)]
    pub identity_id: String,
    pub tags: Option<Vec<String>>,
    pub stage_id: Option<String>,
    #[serde(default)]
    pub color_id: i64,
    pub subject: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateForm {
    pub crm_id: String,
    pub parent_crm_object_id: Option<String>,
    pub extended_properties: Option<Vec<Property>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub stage_id: Option<String>,
    #[serde(default)]
    pub color_id: i64,
    #[serde(default)]
    pub identity_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub logical_operator: u8,
    #[serde(default)]
    pub operator: u8,
    #[serde(default)]
    pub leaf_negate: bool,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Find {
    pub type_key: String,
    #[serde(default)]
    pub queries: Vec<Condition>,
    #[serde(default = "first_page")]
    pub page_number: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn first_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

// --- state ---

#[derive(Debug, Default)]
pub struct Crm {
    credentials: HashMap<String, String>,
    tokens: HashSet<String>,
    persons: HashMap<String, Person>,
    forms: HashMap<String, Form>,
    purchases: HashMap<String, Value>,
}

impl Crm {
    pub fn seeded() -> Self {
        let mut crm = Crm::default();
        crm.credentials
            .insert(ADMIN_USERNAME.to_string(), ADMIN_PASSWORD.to_string());
        crm.credentials
            .insert(USER_USERNAME.to_string(), USER_PASSWORD.to_string());
        crm.persons.insert(
            SEED_PERSON_ID.to_string(),
            Person {
                crm_id: SEED_PERSON_ID.to_string(),
                crm_object_type_code: PERSON_TYPE_KEY.to_string(),
                first_name: "Erfan".to_string(),
                last_name: "Diako".to_string(),
                national_code: "0012345678".to_string(),
                email: "erfan@example.com".to_string(),
                extended_properties: Vec::new(),
            },
        );
        crm.forms.insert(
            SEED_FORM_ID.to_string(),
            Form {
                crm_id: SEED_FORM_ID.to_string(),
                crm_object_type_code: BANK_ACCOUNT_TYPE_KEY.to_string(),
                parent_crm_object_id: Some(SEED_PERSON_ID.to_string()),
                subject: Some("Deposit".to_string()),
                description: None,
                identity_id: SEED_PERSON_ID.to_string(),
                stage_id: None,
                color_id: 0,
                tags: vec!["deposit".to_string()],
                extended_properties: vec![
                    Property {
                        user_key: "TrackingNumber".to_string(),
                        value: json!(778756),
                    },
                    Property {
                        user_key: "DepositAmount".to_string(),
                        value: json!("625000000"),
                    },
                ],
            },
        );
        crm
    }
}

pub type Db = Arc<RwLock<Crm>>;

type Failure = (StatusCode, Json<Value>);
type Reply<T> = Result<Json<T>, Failure>;

fn fail(status: StatusCode, message: &str) -> Failure {
    (status, Json(json!({ "message": message })))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Crm::seeded()));
    Router::new()
        .route("/api/v2/auth/login", post(login))
        .route("/api/v2/crmobject/person/get", post(get_person))
        .route("/api/v2/crmobject/person/find", post(find_person))
        .route("/api/v2/crmobject/form/get", post(get_form))
        .route("/api/v2/crmobject/form/find", post(find_form))
        .route("/api/v2/crmobject/form/create", post(create_form))
        .route("/api/v2/crmobject/form/update", post(update_form))
        .route(
            "/api/v2/crmobject/invoice/purchase/create",
            post(create_purchase),
        )
        .route(
            "/api/v2/crmobject/invoice/purchase/delete",
            post(delete_purchase),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorize(headers: &HeaderMap, crm: &Crm) -> Result<(), Failure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) if crm.tokens.contains(token) => Ok(()),
        _ => Err(fail(StatusCode::UNAUTHORIZED, "missing or invalid bearer token")),
    }
}

// --- handlers ---

async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Reply<Value> {
    let mut crm = db.write().await;
    if crm.credentials.get(&input.username) != Some(&input.password) {
        debug!(username = %input.username, "login rejected");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid user credentials"
            })),
        ));
    }
    let token = Uuid::new_v4().simple().to_string();
    crm.tokens.insert(token.clone());
    info!(
        username = %input.username,
        device_id = %input.device_id,
        platform_type = input.platform_type,
        "token issued"
    );
    Ok(Json(json!({ "accessToken": token, "expiresAt": 0 })))
}

async fn get_person(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ById>,
) -> Reply<Person> {
    let crm = db.read().await;
    authorize(&headers, &crm)?;
    crm.persons
        .get(&input.id)
        .cloned()
        .map(Json)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "person not found"))
}

async fn get_form(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ById>,
) -> Reply<Form> {
    let crm = db.read().await;
    authorize(&headers, &crm)?;
    crm.forms
        .get(&input.id)
        .cloned()
        .map(Json)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "form not found"))
}

async fn find_person(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Find>,
) -> Reply<Value> {
    let crm = db.read().await;
    authorize(&headers, &crm)?;
    let mut matches = Vec::new();
    for person in crm.persons.values() {
        if person.crm_object_type_code == input.type_key
            && matches_all(&input.queries, |field| person_field(person, field))?
        {
            matches.push(person.clone());
        }
    }
    matches.sort_by(|a, b| a.crm_id.cmp(&b.crm_id));
    Ok(Json(page(matches, &input)))
}

async fn find_form(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Find>,
) -> Reply<Value> {
    let crm = db.read().await;
    authorize(&headers, &crm)?;
    let mut matches = Vec::new();
    for form in crm.forms.values() {
        if form.crm_object_type_code == input.type_key
            && matches_all(&input.queries, |field| form_field(form, field))?
        {
            matches.push(form.clone());
        }
    }
    matches.sort_by(|a, b| a.crm_id.cmp(&b.crm_id));
    Ok(Json(page(matches, &input)))
}

async fn create_form(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateForm>,
) -> Reply<Value> {
    let mut crm = db.write().await;
    authorize(&headers, &crm)?;
    if input.crm_object_type_code.is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "crmObjectTypeCode is required"));
    }
    let form = Form {
        crm_id: Uuid::new_v4().to_string(),
        crm_object_type_code: input.crm_object_type_code,
        parent_crm_object_id: input.parent_crm_object_id,
        subject: input.subject,
        description: input.description,
        identity_id: input.identity_id,
        stage_id: input.stage_id,
        color_id: input.color_id,
        tags: input.tags.unwrap_or_default(),
        extended_properties: input.extended_properties,
    };
    let id = form.crm_id.clone();
    crm.forms.insert(id.clone(), form);
    info!(crm_id = %id, "form created");
    Ok(Json(json!({ "crmId": id })))
}

async fn update_form(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UpdateForm>,
) -> Reply<Value> {
    let mut crm = db.write().await;
    authorize(&headers, &crm)?;
    let form = crm
        .forms
        .get_mut(&input.crm_id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "form not found"))?;

    if let Some(parent) = input.parent_crm_object_id {
        form.parent_crm_object_id = Some(parent);
    }
    for property in input.extended_properties.unwrap_or_default() {
        match form
            .extended_properties
            .iter_mut()
            .find(|p| p.user_key == property.user_key)
        {
            Some(existing) => existing.value = property.value,
            None => form.extended_properties.push(property),
        }
    }
    if !input.tags.is_empty() {
        form.tags = input.tags;
    }
    if input.stage_id.is_some() {
        form.stage_id = input.stage_id;
    }
    if !input.identity_id.is_empty() {
        form.identity_id = input.identity_id;
    }
    form.color_id = input.color_id;
    Ok(Json(json!({ "crmId": input.crm_id })))
}

async fn create_purchase(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(mut input): Json<Value>,
) -> Reply<Value> {
    let mut crm = db.write().await;
    authorize(&headers, &crm)?;
    let type_code = input
        .get("crmObjectTypeCode")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if type_code.is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "crmObjectTypeCode is required"));
    }
    let id = Uuid::new_v4().to_string();
    input["crmId"] = json!(id);
    crm.purchases.insert(id.clone(), input);
    info!(crm_id = %id, "purchase created");
    Ok(Json(json!({ "crmId": id })))
}

async fn delete_purchase(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ById>,
) -> Reply<Value> {
    let mut crm = db.write().await;
    authorize(&headers, &crm)?;
    crm.purchases
        .remove(&input.id)
        .map(|_| Json(json!({})))
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "purchase not found"))
}

// --- search ---

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn property(properties: &[Property], field: &str) -> Option<String> {
    properties
        .iter()
        .find(|p| p.user_key.eq_ignore_ascii_case(field))
        .map(|p| scalar(&p.value))
}

fn person_field(person: &Person, field: &str) -> Option<String> {
    match field.to_ascii_lowercase().as_str() {
        "crmid" => Some(person.crm_id.clone()),
        "firstname" => Some(person.first_name.clone()),
        "lastname" => Some(person.last_name.clone()),
        "nationalcode" => Some(person.national_code.clone()),
        "email" => Some(person.email.clone()),
        _ => property(&person.extended_properties, field),
    }
}

fn form_field(form: &Form, field: &str) -> Option<String> {
    match field.to_ascii_lowercase().as_str() {
        "crmid" => Some(form.crm_id.clone()),
        "subject" => form.subject.clone(),
        "parentcrmobjectid" => form.parent_crm_object_id.clone(),
        _ => property(&form.extended_properties, field),
    }
}

/// Evaluate one condition. Supports equality and the text operators.
fn evaluate(condition: &Condition, actual: Option<&str>) -> Result<bool, Failure> {
    let Some(actual) = actual else {
        return Ok(false);
    };
    let expected = condition.value.as_str();
    let hit = match condition.operator {
        0 => actual == expected,
        6 => actual != expected,
        11 => actual.starts_with(expected),
        12 => actual.contains(expected),
        13 => actual.ends_with(expected),
        other => {
            return Err(fail(
                StatusCode::BAD_REQUEST,
                &format!("unsupported operator {other}"),
            ))
        }
    };
    Ok(hit != condition.leaf_negate)
}

/// Fold conditions left to right; the first condition's logical operator is
/// ignored.
fn matches_all<F>(conditions: &[Condition], field: F) -> Result<bool, Failure>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = true;
    for (i, condition) in conditions.iter().enumerate() {
        let hit = evaluate(condition, field(&condition.field).as_deref())?;
        if i == 0 {
            result = hit;
            continue;
        }
        result = match condition.logical_operator {
            0 => result && hit,
            1 => result || hit,
            2 => result && !hit,
            3 => result || !hit,
            other => {
                return Err(fail(
                    StatusCode::BAD_REQUEST,
                    &format!("unsupported logical operator {other}"),
                ))
            }
        };
    }
    Ok(result)
}

fn page<T: Serialize>(matches: Vec<T>, find: &Find) -> Value {
    let total = matches.len();
    let skip = find
        .page_number
        .saturating_sub(1)
        .saturating_mul(find.page_size);
    let data: Vec<T> = matches.into_iter().skip(skip).take(find.page_size).collect();
    json!({ "data": data, "total": total })
}
