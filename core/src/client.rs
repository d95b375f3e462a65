//! Typed operations against the CRM HTTP API.
//!
//! # Design
//! `CrmClient` holds the base URL, the endpoint table, a default propagator and
//! the transport; nothing changes between calls. Every operation is split
//! into a `build_*` method that produces an `HttpRequest` and a `parse_*`
//! method that consumes an `HttpResponse`, with the executing method in
//! between doing one round trip through the transport. Hosts that run their
//! own HTTP stack can call `build_*` / `parse_*` directly.
//!
//! Every response passes through [`classify`] exactly once, before anything
//! is decoded.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::context::RequestContext;
use crate::error::{classify, ApiError};
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, APPLICATION_JSON, CACHE_CONTROL, CONTENT_TYPE,
};
use crate::query::{FindRequest, Query};
use crate::trace::{self, SharedPropagator};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    AuthRequest, CreateFormRequest, CreatePurchase, CrmIdResponse, DeleteRequest,
    FindFormResponse, FindResponse, FormInfo, GetRequest, PersonInfo, Token, UpdateFormRequest,
    DELETE_OPTION, PLATFORM_TYPE,
};

pub const URL_SEPARATOR: &str = "/";

const ERR_CONFIG: &str = "invalid client configuration";
const ERR_ADMIN_AUTH: &str = "could not get token";
const ERR_USER_AUTH: &str = "could not get token(customer)";
const ERR_GET_PERSON: &str = "could not get person info";
const ERR_GET_FORM: &str = "could not get form info";
const ERR_FIND_PERSON: &str = "could not find person";
const ERR_FIND_FORM: &str = "could not find form";
const ERR_CREATE_FORM: &str = "could not create form";
const ERR_UPDATE_FORM: &str = "could not update form";
const ERR_CREATE_PURCHASE: &str = "could not create purchase";
const ERR_DELETE_PURCHASE: &str = "could not delete purchase";

/// Join path segments with `/`.
pub fn make_url(segments: &[&str]) -> String {
    segments.join(URL_SEPARATOR)
}

/// Endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth: String,
    pub get_form: String,
    pub create_form: String,
    pub update_form: String,
    pub find_form: String,
    pub get_person: String,
    pub find_person: String,
    pub create_purchase: String,
    pub delete_purchase: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        const CRM: &[&str] = &["api", "v2", "crmobject"];
        let crm = |rest: &[&str]| make_url(&[CRM, rest].concat());
        Self {
            auth: make_url(&["api", "v2", "auth", "login"]),
            get_form: crm(&["form", "get"]),
            create_form: crm(&["form", "create"]),
            update_form: crm(&["form", "update"]),
            find_form: crm(&["form", "find"]),
            get_person: crm(&["person", "get"]),
            find_person: crm(&["person", "find"]),
            create_purchase: crm(&["invoice", "purchase", "create"]),
            delete_purchase: crm(&["invoice", "purchase", "delete"]),
        }
    }
}

/// Client for the CRM API.
///
/// Safe to share across threads when the transport is; no per-call state is
/// stored on the client.
#[derive(Debug)]
pub struct CrmClient<T = UreqTransport> {
    base_url: String,
    endpoints: Endpoints,
    propagator: SharedPropagator,
    transport: T,
}

impl CrmClient<UreqTransport> {
    /// Build a client with a `UreqTransport` configured from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = UreqTransport::new(&config.transport_config())
            .map_err(|e| ApiError::from_transport(&e, ERR_CONFIG))?;
        Ok(Self::new(&config.hostname, transport))
    }
}

impl<T: Transport> CrmClient<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches(URL_SEPARATOR).to_string(),
            endpoints: Endpoints::default(),
            propagator: trace::w3c_propagator(),
            transport,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Propagator used when the call's context does not carry one.
    pub fn with_propagator(mut self, propagator: SharedPropagator) -> Self {
        self.propagator = propagator;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{URL_SEPARATOR}{endpoint}", self.base_url)
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    /// Base request for `ctx`: a POST with no URL yet, carrying trace headers
    /// when the context has a valid span.
    pub fn request(&self, ctx: &RequestContext) -> HttpRequest {
        let mut request = HttpRequest::new(HttpMethod::Post, String::new());
        request.timeout = ctx.timeout();

        if let Some(cx) = ctx.trace_context() {
            let propagator = ctx.propagator().unwrap_or(&self.propagator);
            if !trace::inject(propagator.as_ref(), cx, &mut request.headers) {
                debug!("trace context not propagated: no valid span");
            }
        }
        request
    }

    pub fn request_with_bearer_auth(&self, ctx: &RequestContext, token: &str) -> HttpRequest {
        self.request(ctx)
            .with_bearer_auth(token)
            .with_header(CONTENT_TYPE, APPLICATION_JSON)
    }

    pub fn request_with_bearer_auth_no_cache(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> HttpRequest {
        self.request_with_bearer_auth(ctx, token)
            .with_header(CACHE_CONTROL, "no-cache")
    }

    // -----------------------------------------------------------------------
    // build_*
    // -----------------------------------------------------------------------

    /// Login request. A fresh device id is generated on every call.
    pub fn build_authenticate(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = AuthRequest {
            username: username.to_string(),
            password: password.to_string(),
            device_id: Uuid::new_v4().to_string(),
            platform_type: PLATFORM_TYPE,
        };
        self.request(ctx)
            .with_url(self.url(&self.endpoints.auth))
            .with_json_body(&body)
    }

    pub fn build_get_person_by_id(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        crm_id: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = GetRequest {
            id: crm_id.to_string(),
            show_previews: false,
            show_extended_previews: true,
            ..GetRequest::default()
        };
        self.request_with_bearer_auth(ctx, access_token)
            .with_url(self.url(&self.endpoints.get_person))
            .with_json_body(&body)
    }

    pub fn build_get_form_by_id(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        crm_id: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = GetRequest {
            id: crm_id.to_string(),
            show_previews: true,
            show_extended_previews: true,
            ..GetRequest::default()
        };
        self.request_with_bearer_auth(ctx, access_token)
            .with_url(self.url(&self.endpoints.get_form))
            .with_json_body(&body)
    }

    pub fn build_find_person_by_name(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        type_key: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = FindRequest::new(
            type_key,
            vec![
                Query::equals("FirstName", first_name),
                Query::equals("LastName", last_name),
            ],
        );
        self.request_with_bearer_auth_no_cache(ctx, access_token)
            .with_url(self.url(&self.endpoints.find_person))
            .with_json_body(&body)
    }

    pub fn build_find_form(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        type_key: &str,
        queries: &[Query],
    ) -> Result<HttpRequest, ApiError> {
        let body = FindRequest::new(type_key, queries.to_vec());
        self.request_with_bearer_auth_no_cache(ctx, access_token)
            .with_url(self.url(&self.endpoints.find_form))
            .with_json_body(&body)
    }

    pub fn build_create_form(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        form: &CreateFormRequest,
    ) -> Result<HttpRequest, ApiError> {
        self.request_with_bearer_auth(ctx, access_token)
            .with_url(self.url(&self.endpoints.create_form))
            .with_json_body(form)
    }

    pub fn build_update_form(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        form: &UpdateFormRequest,
    ) -> Result<HttpRequest, ApiError> {
        self.request_with_bearer_auth_no_cache(ctx, access_token)
            .with_url(self.url(&self.endpoints.update_form))
            .with_json_body(form)
    }

    pub fn build_create_purchase(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        purchase: &CreatePurchase,
    ) -> Result<HttpRequest, ApiError> {
        self.request_with_bearer_auth(ctx, access_token)
            .with_url(self.url(&self.endpoints.create_purchase))
            .with_json_body(purchase)
    }

    pub fn build_delete_purchase(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        purchase_id: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = DeleteRequest {
            id: purchase_id.to_string(),
            option: DELETE_OPTION,
        };
        self.request_with_bearer_auth(ctx, access_token)
            .with_url(self.url(&self.endpoints.delete_purchase))
            .with_json_body(&body)
    }

    // -----------------------------------------------------------------------
    // parse_*
    // -----------------------------------------------------------------------

    pub fn parse_token(&self, response: &HttpResponse) -> Result<Token, ApiError> {
        decode(response, ERR_ADMIN_AUTH)
    }

    /// Like [`parse_token`](Self::parse_token), for a user login.
    pub fn parse_user_token(&self, response: &HttpResponse) -> Result<Token, ApiError> {
        decode(response, ERR_USER_AUTH)
    }

    pub fn parse_person_info(&self, response: &HttpResponse) -> Result<PersonInfo, ApiError> {
        decode(response, ERR_GET_PERSON)
    }

    pub fn parse_form_info(&self, response: &HttpResponse) -> Result<FormInfo, ApiError> {
        decode(response, ERR_GET_FORM)
    }

    pub fn parse_find_person(&self, response: &HttpResponse) -> Result<FindResponse, ApiError> {
        decode(response, ERR_FIND_PERSON)
    }

    pub fn parse_find_form(&self, response: &HttpResponse) -> Result<FindFormResponse, ApiError> {
        decode(response, ERR_FIND_FORM)
    }

    /// Extract `crmId` from a create/update response.
    pub fn parse_crm_id(&self, response: &HttpResponse) -> Result<String, ApiError> {
        decode::<CrmIdResponse>(response, "failed to unmarshal response").map(|r| r.crm_id)
    }

    pub fn parse_delete_purchase(&self, response: &HttpResponse) -> Result<(), ApiError> {
        classify(Some(response), None, ERR_DELETE_PURCHASE)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn admin_authenticate(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Token, ApiError> {
        let request = self.build_authenticate(ctx, username, password)?;
        self.round_trip(&request, ERR_ADMIN_AUTH, |r| self.parse_token(r))
    }

    pub fn user_authenticate(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Token, ApiError> {
        let request = self.build_authenticate(ctx, username, password)?;
        self.round_trip(&request, ERR_USER_AUTH, |r| self.parse_user_token(r))
    }

    pub fn get_person_by_id(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        crm_id: &str,
    ) -> Result<PersonInfo, ApiError> {
        let request = self.build_get_person_by_id(ctx, access_token, crm_id)?;
        self.round_trip(&request, ERR_GET_PERSON, |r| self.parse_person_info(r))
    }

    pub fn get_form_by_id(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        crm_id: &str,
    ) -> Result<FormInfo, ApiError> {
        let request = self.build_get_form_by_id(ctx, access_token, crm_id)?;
        self.round_trip(&request, ERR_GET_FORM, |r| self.parse_form_info(r))
    }

    pub fn find_person_by_name(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        type_key: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<FindResponse, ApiError> {
        let request =
            self.build_find_person_by_name(ctx, access_token, type_key, first_name, last_name)?;
        self.round_trip(&request, ERR_FIND_PERSON, |r| self.parse_find_person(r))
    }

    pub fn find_form(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        type_key: &str,
        queries: &[Query],
    ) -> Result<FindFormResponse, ApiError> {
        let request = self.build_find_form(ctx, access_token, type_key, queries)?;
        self.round_trip(&request, ERR_FIND_FORM, |r| self.parse_find_form(r))
    }

    /// Create a form; returns the new record's `crmId`.
    pub fn create_form(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        form: &CreateFormRequest,
    ) -> Result<String, ApiError> {
        let request = self.build_create_form(ctx, access_token, form)?;
        self.round_trip(&request, ERR_CREATE_FORM, |r| self.parse_crm_id(r))
    }

    /// Update a form; returns the `crmId` echoed by the server.
    pub fn update_form(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        form: &UpdateFormRequest,
    ) -> Result<String, ApiError> {
        let request = self.build_update_form(ctx, access_token, form)?;
        self.round_trip(&request, ERR_UPDATE_FORM, |r| self.parse_crm_id(r))
    }

    /// Create a purchase invoice; returns its `crmId`.
    pub fn create_purchase(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        purchase: &CreatePurchase,
    ) -> Result<String, ApiError> {
        let request = self.build_create_purchase(ctx, access_token, purchase)?;
        self.round_trip(&request, ERR_CREATE_PURCHASE, |r| self.parse_crm_id(r))
    }

    pub fn delete_purchase(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        purchase_id: &str,
    ) -> Result<(), ApiError> {
        let request = self.build_delete_purchase(ctx, access_token, purchase_id)?;
        self.round_trip(&request, ERR_DELETE_PURCHASE, |r| self.parse_delete_purchase(r))
    }

    /// One round trip. A response is handed to `parse`, which classifies it;
    /// a transport failure is reported under `context`.
    fn round_trip<R>(
        &self,
        request: &HttpRequest,
        context: &str,
        parse: impl FnOnce(&HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let result = match self.transport.execute(request) {
            Ok(response) => parse(&response),
            Err(error) => Err(ApiError::from_transport(&error, context)),
        };
        if let Err(err) = &result {
            warn!(code = err.code(), error_type = %err.error_type(), message = %err, "request failed");
        }
        result
    }
}

/// Classify `response`, then decode its body as `R`.
fn decode<R: DeserializeOwned>(response: &HttpResponse, context: &str) -> Result<R, ApiError> {
    classify(Some(response), None, context)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::decode(context, e))
}
