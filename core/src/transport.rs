//! Executes `HttpRequest`s over the network.
//!
//! # Design
//! [`Transport`] is the seam between the client and the network. The bundled
//! [`UreqTransport`] is blocking and is built from a caller-owned
//! [`TransportConfig`]; it never touches process-wide settings. Retry is a
//! transport concern: the client itself never repeats a call.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one logical round trip. Failure statuses are returned as
/// responses; `Err` means no response was obtained.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Connection settings for [`UreqTransport`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Accept any server certificate. Test servers only.
    pub insecure_skip_verify: bool,
    /// Proxy URL, e.g. `http://127.0.0.1:8080`.
    pub proxy: Option<String>,
    /// Agent-wide timeout; a per-request timeout takes precedence.
    pub timeout: Option<Duration>,
    /// Extra attempts allowed when a retry condition matches.
    pub retry_count: u32,
    pub retry_wait: Duration,
}

/// Decides whether an attempt should be repeated.
pub type RetryCondition =
    Box<dyn Fn(Option<&HttpResponse>, Option<&TransportError>) -> bool + Send + Sync>;

/// Runs before every attempt; an error aborts that attempt.
pub type BeforeRequestHook = Box<dyn Fn(&HttpRequest) -> Result<(), TransportError> + Send + Sync>;

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    retry_count: u32,
    retry_wait: Duration,
    retry_conditions: Vec<RetryCondition>,
    before_request: Vec<BeforeRequestHook>,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("retry_count", &self.retry_count)
            .field("retry_wait", &self.retry_wait)
            .field("retry_conditions", &self.retry_conditions.len())
            .field("before_request", &self.before_request.len())
            .finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::with_agent(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent(),
        )
    }
}

impl UreqTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = ureq::Proxy::new(proxy)
                .map_err(|e| TransportError::Config(format!("proxy {proxy:?}: {e}")))?;
            builder = builder.proxy(Some(proxy));
        }
        if config.insecure_skip_verify {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }

        let mut transport = Self::with_agent(builder.build().new_agent());
        transport.retry_count = config.retry_count;
        transport.retry_wait = config.retry_wait;
        Ok(transport)
    }

    /// Wrap an agent configured elsewhere. The agent must not treat failure
    /// statuses as errors, otherwise server error payloads are lost.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            retry_count: 0,
            retry_wait: Duration::ZERO,
            retry_conditions: Vec::new(),
            before_request: Vec::new(),
        }
    }

    pub fn set_retry(&mut self, count: u32, wait: Duration) -> &mut Self {
        self.retry_count = count;
        self.retry_wait = wait;
        self
    }

    pub fn add_retry_condition<F>(&mut self, condition: F) -> &mut Self
    where
        F: Fn(Option<&HttpResponse>, Option<&TransportError>) -> bool + Send + Sync + 'static,
    {
        self.retry_conditions.push(Box::new(condition));
        self
    }

    pub fn on_before_request<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&HttpRequest) -> Result<(), TransportError> + Send + Sync + 'static,
    {
        self.before_request.push(Box::new(hook));
        self
    }

    fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        for hook in &self.before_request {
            hook(request)?;
        }
        self.send(request)
    }

    fn should_retry(&self, outcome: &Result<HttpResponse, TransportError>) -> bool {
        let (response, error) = match outcome {
            Ok(response) => (Some(response), None),
            Err(error) => (None, Some(error)),
        };
        self.retry_conditions
            .iter()
            .any(|condition| condition(response, error))
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match request.method {
            HttpMethod::Get => prepare(self.agent.get(request.url.as_str()), request).call(),
            HttpMethod::Delete => prepare(self.agent.delete(request.url.as_str()), request).call(),
            HttpMethod::Post => {
                let builder = prepare(self.agent.post(request.url.as_str()), request);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = prepare(self.agent.put(request.url.as_str()), request);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn prepare<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(timeout) = request.timeout {
        builder = builder.config().timeout_global(Some(timeout)).build();
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0;
        loop {
            let outcome = self.attempt(request);
            if attempt >= self.retry_count || !self.should_retry(&outcome) {
                return outcome;
            }
            attempt += 1;
            debug!(
                method = request.method.as_str(),
                url = %request.url,
                attempt,
                "retrying request"
            );
            thread::sleep(self.retry_wait);
        }
    }
}
