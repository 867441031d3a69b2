//! Fluent HTTP/FTP transfers on top of libcurl.
//!
//! # Overview
//! `CurlClient` collects an endpoint, transfer options and header lines
//! through chained setters, then hands them to a transfer engine for a single
//! blocking transfer. The engine does all network work (connections, TLS,
//! redirects, proxies, FTP); this crate only assembles its configuration and
//! normalizes the outcome into `Result<Response, CurlError>`.
//!
//! ```no_run
//! use fluent_curl::{CurlClient, HttpMethod, OptionSet};
//!
//! let mut client = CurlClient::new()?;
//! let response = client.simple_call(
//!     HttpMethod::Get,
//!     "https://example.com/search",
//!     [("q", "rust")],
//!     &OptionSet::new(),
//! )?;
//! println!("{} -> {}", response.status(), response.text());
//! # Ok::<(), fluent_curl::CurlError>(())
//! ```
//!
//! # Design
//! - `prepare` freezes builder state into an immutable `PreparedTransfer` and
//!   resets the builder; `run` executes one on the engine.
//! - The engine sits behind `TransferEngine`/`TransferSession`; `CurlEngine`
//!   is the libcurl implementation. Sessions are closed by a drop guard.
//! - Options are addressed by `TransferOption`, by case-insensitive name or
//!   by numeric code.

pub mod client;
pub mod config;
pub mod curl_engine;
pub mod engine;
pub mod error;
pub mod http;
pub mod options;

pub use client::CurlClient;
pub use config::ClientConfig;
pub use curl_engine::CurlEngine;
pub use engine::{SessionGuard, TransferEngine, TransferSession};
pub use error::{ConfigurationError, CurlError, TransferError};
pub use http::{HttpMethod, Params, PreparedTransfer, Response, TransferInfo};
pub use options::{AuthType, IntoTransferOption, OptionSet, OptionValue, TransferOption, ValueKind};
