//! Fluent request builder and executor.
//!
//! # Design
//! `CurlClient` accumulates an endpoint, an option set and extra header lines
//! through chained setters. A transfer is split in two steps, as with any
//! host-does-IO client: `prepare` turns the accumulated state into an
//! immutable `PreparedTransfer` (defaults applied, headers flushed) and resets
//! the builder, then `run` hands that value to the engine for exactly one
//! attempt. `execute` does both.
//!
//! The outcome of the last `run` stays readable through the side-channel
//! accessors (`last_response`, `info`, `last_error`) until the next one.

use std::fmt;
use std::path::Path;

use log::{debug, warn};

use crate::config::ClientConfig;
use crate::curl_engine::CurlEngine;
use crate::engine::{SessionGuard, TransferEngine, TransferSession};
use crate::error::{ConfigurationError, CurlError, TransferError};
use crate::http::{self, HttpMethod, Params, PreparedTransfer, Response, TransferInfo};
use crate::options::{AuthType, IntoTransferOption, OptionSet, OptionValue, TransferOption};

const METHOD_OVERRIDE_PUT: &str = "X-HTTP-Method-Override: PUT";

type Resolver = Box<dyn Fn(&str) -> String>;

/// Stateful builder for one transfer at a time.
pub struct CurlClient<E: TransferEngine = CurlEngine> {
    engine: E,
    config: ClientConfig,
    resolver: Option<Resolver>,

    url: Option<String>,
    options: OptionSet,
    headers: Vec<String>,

    last_url: Option<String>,
    last_response: Option<Vec<u8>>,
    info: Option<TransferInfo>,
    error: Option<TransferError>,
}

impl CurlClient<CurlEngine> {
    /// Client backed by the system libcurl with default configuration.
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::with_engine(CurlEngine::new(), ClientConfig::default())
    }

    /// Client backed by libcurl, configured from `FLUENT_CURL_*` variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::with_engine(CurlEngine::new(), ClientConfig::from_env()?)
    }
}

impl<E: TransferEngine> CurlClient<E> {
    pub fn with_engine(engine: E, config: ClientConfig) -> Result<Self, ConfigurationError> {
        engine.check_available()?;
        Ok(Self {
            engine,
            config,
            resolver: None,
            url: None,
            options: OptionSet::new(),
            headers: Vec::new(),
            last_url: None,
            last_response: None,
            info: None,
            error: None,
        })
    }

    /// Replace the base-URL resolver used for endpoints without a scheme.
    pub fn with_resolver(mut self, resolver: impl Fn(&str) -> String + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a transfer to `endpoint`. Endpoints without a scheme are expanded
    /// by the resolver.
    pub fn create(&mut self, endpoint: &str) -> &mut Self {
        let url = if http::has_scheme(endpoint) {
            endpoint.to_string()
        } else {
            match &self.resolver {
                Some(resolve) => resolve(endpoint),
                None => self.config.resolve(endpoint),
            }
        };
        debug!("endpoint set to {url}");
        self.url = Some(url);
        self
    }

    // -----------------------------------------------------------------------
    // Method helpers
    // -----------------------------------------------------------------------

    /// Configure the request method and its parameters.
    ///
    /// Key/value params are form-encoded; strings are used as given. For GET
    /// they are appended to the endpoint's query string, for every other verb
    /// they become the request body. `extra` is merged into the option set
    /// before the method options are set. PUT additionally sends a
    /// `X-HTTP-Method-Override: PUT` header.
    pub fn set_method(&mut self, verb: HttpMethod, params: impl Into<Params>, extra: &OptionSet) -> &mut Self {
        let encoded = params.into().encode();
        self.options.merge(extra);
        self.http_method(verb.as_str());

        match verb {
            HttpMethod::Get => match self.url.take() {
                Some(url) => self.url = Some(http::append_query(&url, &encoded)),
                None if !encoded.is_empty() => warn!("GET parameters dropped: no endpoint set"),
                None => {}
            },
            HttpMethod::Post => {
                self.options.put(TransferOption::Post, true);
                self.options.put(TransferOption::PostFields, encoded);
            }
            HttpMethod::Put => {
                self.options.put(TransferOption::PostFields, encoded);
                self.headers.push(METHOD_OVERRIDE_PUT.to_string());
            }
            HttpMethod::Delete => {
                self.options.put(TransferOption::PostFields, encoded);
            }
        }
        self
    }

    pub fn post(&mut self, params: impl Into<Params>, extra: &OptionSet) -> &mut Self {
        self.set_method(HttpMethod::Post, params, extra)
    }

    pub fn put(&mut self, params: impl Into<Params>, extra: &OptionSet) -> &mut Self {
        self.set_method(HttpMethod::Put, params, extra)
    }

    pub fn delete(&mut self, params: impl Into<Params>, extra: &OptionSet) -> &mut Self {
        self.set_method(HttpMethod::Delete, params, extra)
    }

    // -----------------------------------------------------------------------
    // One-shot calls
    // -----------------------------------------------------------------------

    /// Create, configure and execute a request in one call.
    ///
    /// GET params go into the query string and no body is sent; for the other
    /// verbs they form the body and the endpoint is left untouched.
    pub fn simple_call(
        &mut self,
        verb: HttpMethod,
        endpoint: &str,
        params: impl Into<Params>,
        options: &OptionSet,
    ) -> Result<Response, CurlError> {
        let params = params.into();
        match verb {
            HttpMethod::Get => {
                self.create(&http::append_query(endpoint, &params.encode()));
            }
            _ => {
                self.create(endpoint);
                self.set_method(verb, params, &OptionSet::new());
            }
        }
        self.options.merge(options);
        self.execute()
    }

    /// Download `file_path` over FTP. `ftp://` is assumed when the endpoint
    /// has neither `ftp://` nor `sftp://`; a non-empty username is embedded
    /// in the URL together with the password, if any.
    pub fn simple_ftp_get(
        &mut self,
        endpoint: &str,
        file_path: &str,
        username: &str,
        password: &str,
    ) -> Result<Response, CurlError> {
        self.create(&http::ftp_url(endpoint, file_path, username, password));
        self.options.put(TransferOption::BinaryTransfer, true);
        self.options.put(TransferOption::Verbose, true);
        self.execute()
    }

    // -----------------------------------------------------------------------
    // Fluent setters
    // -----------------------------------------------------------------------

    /// Send cookies. Pairs are joined as `name=value; name=value`, strings
    /// are sent verbatim.
    pub fn set_cookies(&mut self, params: impl Into<Params>) -> &mut Self {
        let cookie = match params.into() {
            Params::Pairs(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
            Params::Encoded(s) => s,
        };
        self.options.put(TransferOption::Cookie, cookie);
        self
    }

    /// Append a header line. With `content`, the line is `name: content`;
    /// without, `name` is used as the whole line.
    pub fn http_header(&mut self, name: &str, content: Option<&str>) -> &mut Self {
        let line = match content {
            Some(content) if !content.is_empty() => format!("{name}: {content}"),
            _ => name.to_string(),
        };
        self.headers.push(line);
        self
    }

    /// Override the request verb. Any verb is accepted and sent uppercased.
    pub fn http_method(&mut self, verb: &str) -> &mut Self {
        self.options
            .put(TransferOption::CustomRequest, verb.trim().to_ascii_uppercase());
        self
    }

    pub fn http_login(&mut self, username: &str, password: &str, auth: AuthType) -> &mut Self {
        self.options.put(TransferOption::HttpAuth, auth.bits());
        self.options
            .put(TransferOption::UserPwd, format!("{username}:{password}"));
        self
    }

    /// Route the transfer through an HTTP proxy, tunnelling through it.
    pub fn proxy(&mut self, host: &str, port: u16) -> &mut Self {
        self.options.put(TransferOption::HttpProxyTunnel, true);
        self.options.put(TransferOption::Proxy, format!("{host}:{port}"));
        self
    }

    pub fn proxy_login(&mut self, username: &str, password: &str) -> &mut Self {
        self.options
            .put(TransferOption::ProxyUserPwd, format!("{username}:{password}"));
        self
    }

    /// Configure TLS verification.
    ///
    /// With `verify_peer` set, `verify_host` and the optional CA bundle at
    /// `cert_path` are applied. **Passing `verify_peer = false` disables
    /// certificate verification entirely and is insecure**: `verify_host` and
    /// `cert_path` are then ignored.
    pub fn ssl(&mut self, verify_peer: bool, verify_host: u8, cert_path: Option<&Path>) -> &mut Self {
        if !verify_peer {
            warn!("TLS peer verification disabled; the connection is not authenticated");
            if cert_path.is_some() {
                debug!("certificate path ignored because peer verification is off");
            }
            self.options.put(TransferOption::SslVerifyPeer, false);
            return self;
        }

        self.options.put(TransferOption::SslVerifyPeer, true);
        self.options
            .put(TransferOption::SslVerifyHost, i64::from(verify_host));
        if let Some(path) = cert_path {
            let path = path.canonicalize().unwrap_or_else(|err| {
                warn!("could not canonicalize {}: {err}; using it as given", path.display());
                path.to_path_buf()
            });
            self.options
                .put(TransferOption::CaInfo, path.to_string_lossy().into_owned());
        }
        self
    }

    /// Set one option by enum, symbolic name or numeric code.
    pub fn set_option<K, V>(&mut self, key: K, value: V) -> Result<&mut Self, CurlError>
    where
        K: IntoTransferOption,
        V: Into<OptionValue>,
    {
        self.options.insert(key, value)?;
        Ok(self)
    }

    /// Upsert every option; keys not named here keep their values. Nothing is
    /// applied unless all keys and values are valid.
    pub fn set_options<K, V, I>(&mut self, options: I) -> Result<&mut Self, CurlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: IntoTransferOption,
        V: Into<OptionValue>,
    {
        let mut staged = OptionSet::new();
        for (key, value) in options {
            staged.insert(key, value)?;
        }
        self.options.merge(&staged);
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Freeze the accumulated state into a `PreparedTransfer` and reset the
    /// builder. The builder is reset even when no endpoint was set.
    ///
    /// Unless already set, TIMEOUT gets the configured default, RETURNTRANSFER
    /// and FAILONERROR are enabled, and FOLLOWLOCATION is enabled when the
    /// host is not in restricted mode. Header lines replace any HTTPHEADER
    /// option.
    pub fn prepare(&mut self) -> Result<PreparedTransfer, CurlError> {
        let url = self.url.take();
        let mut options = std::mem::take(&mut self.options);
        let headers = std::mem::take(&mut self.headers);
        self.reset();
        let url = url.ok_or(ConfigurationError::MissingEndpoint)?;

        if !options.contains(TransferOption::Timeout) {
            let timeout = i64::try_from(self.config.default_timeout_secs).unwrap_or(i64::MAX);
            options.put(TransferOption::Timeout, timeout);
        }
        if !options.contains(TransferOption::ReturnTransfer) {
            options.put(TransferOption::ReturnTransfer, true);
        }
        if !options.contains(TransferOption::FailOnError) {
            options.put(TransferOption::FailOnError, true);
        }
        if !self.config.restricted_mode && !options.contains(TransferOption::FollowLocation) {
            options.put(TransferOption::FollowLocation, true);
        }
        if !headers.is_empty() {
            options.put(TransferOption::HttpHeader, headers);
        }

        Ok(PreparedTransfer { url, options })
    }

    /// Perform `transfer` once on a fresh engine session, which is closed on
    /// every exit path.
    pub fn run(&mut self, transfer: PreparedTransfer) -> Result<Response, CurlError> {
        self.last_response = None;
        self.info = None;
        self.error = None;
        self.last_url = Some(transfer.url.clone());

        debug!(
            "{} {}",
            transfer
                .options
                .text(TransferOption::CustomRequest)
                .unwrap_or("GET"),
            transfer.url
        );

        let outcome = self.perform(&transfer);
        match outcome {
            Ok(response) => {
                debug!(
                    "transfer finished: status {} ({} bytes)",
                    response.status(),
                    response.body.len()
                );
                self.last_response = Some(response.body.clone());
                Ok(response)
            }
            Err(err) => {
                if let Some(transfer_err) = err.as_transfer() {
                    warn!("transfer to {} failed: {transfer_err}", transfer.url);
                    self.error = Some(transfer_err.clone());
                }
                Err(err)
            }
        }
    }

    fn perform(&mut self, transfer: &PreparedTransfer) -> Result<Response, CurlError> {
        let mut session = SessionGuard::new(self.engine.open(&transfer.url)?);
        session.apply(&transfer.options)?;
        let result = session.perform();
        let info = session.info();
        drop(session);

        self.info = Some(info.clone());
        let body = result?;
        Ok(Response { body, info })
    }

    /// Prepare and run the accumulated request.
    pub fn execute(&mut self) -> Result<Response, CurlError> {
        let transfer = self.prepare()?;
        self.run(transfer)
    }

    /// Return options, headers, endpoint and error fields to their defaults.
    pub fn reset(&mut self) -> &mut Self {
        self.url = None;
        self.options.clear();
        self.headers.clear();
        self.error = None;
        self
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn endpoint(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn last_response(&self) -> Option<&[u8]> {
        self.last_response.as_deref()
    }

    pub fn info(&self) -> Option<&TransferInfo> {
        self.info.as_ref()
    }

    pub fn last_error(&self) -> Option<&TransferError> {
        self.error.as_ref()
    }

    pub fn error_code(&self) -> Option<u32> {
        self.error.as_ref().map(|e| e.code)
    }

    pub fn error_string(&self) -> &str {
        self.error.as_ref().map_or("", |e| e.message.as_str())
    }

    /// URL set by the pending `create`, or else that of the most recently run
    /// transfer.
    pub fn debug_request(&self) -> Option<&str> {
        self.url.as_deref().or(self.last_url.as_deref())
    }

    /// Plain-text report of the last response, error and transfer info.
    pub fn debug(&self) -> String {
        let rule = "=============================================";
        let mut out = String::new();
        out.push_str(&format!("{rule}\nResponse\n{rule}\n"));
        match &self.last_response {
            Some(body) => out.push_str(&String::from_utf8_lossy(body)),
            None => out.push_str("(none)"),
        }
        out.push('\n');

        if let Some(err) = &self.error {
            out.push_str(&format!(
                "{rule}\nErrors\n{rule}\nCode: {}\nMessage: {}\n",
                err.code, err.message
            ));
        }

        out.push_str(&format!("{rule}\nInfo\n{rule}\n"));
        match &self.info {
            Some(info) => out.push_str(
                &serde_json::to_string_pretty(info).unwrap_or_else(|err| format!("(unrenderable: {err})")),
            ),
            None => out.push_str("(none)"),
        }
        out.push('\n');
        out
    }
}

impl<E: TransferEngine> fmt::Debug for CurlClient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurlClient")
            .field("config", &self.config)
            .field("url", &self.url)
            .field("options", &self.options)
            .field("headers", &self.headers)
            .field("last_url", &self.last_url)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
