//! Synchronous client core for the CRM HTTP API.
//!
//! # Overview
//! Every operation is available two ways: as a `build_*` / `parse_*` pair
//! that never touches the network, and as a single method that performs the
//! round trip through a [`Transport`]. Either way the outcome goes through
//! [`classify`], so callers see one error shape: [`ApiError`].
//!
//! # Design
//! - `CrmClient` holds no per-call state. Trace spans and timeouts travel
//!   in a [`RequestContext`].
//! - Trace propagation goes through an explicit OpenTelemetry propagator;
//!   the global propagator is never consulted.
//! - Retry and before-request hooks belong to the transport.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod query;
pub mod trace;
pub mod transport;
pub mod types;

pub use client::{CrmClient, Endpoints};
pub use codec::{EnforcedString, OneOrMany, StringOrArray};
pub use config::{ClientConfig, ConfigError};
pub use context::RequestContext;
pub use error::{classify, ApiError, ApiErrorType, ErrorDetail, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{FieldOperator, FindRequest, LogicalOperator, Query};
pub use trace::{remote_context, w3c_propagator, InvalidSpanContext, SharedPropagator};
pub use transport::{Transport, TransportConfig, UreqTransport};
pub use types::{
    CreateFormRequest, CreatePurchase, Detail, ExtendedProperty, FindFormResponse, FindResponse,
    FormInfo, PersonInfo, Token, UpdateFormRequest,
};
