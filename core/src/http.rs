//! Request and response values exchanged with the transfer engine.
//!
//! # Design
//! `PreparedTransfer` is the fully assembled request: an absolute URL and the
//! option set the engine applies verbatim. `Response` pairs the returned body
//! with `TransferInfo`, the engine's metadata for the transfer. All fields use
//! owned types so values can be stored on the client after the transfer ends.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::form_urlencoded;

use crate::options::OptionSet;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a verb outside `GET|POST|PUT|DELETE`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method `{0}`")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

/// Request parameters: either key/value pairs to be form-encoded, or a
/// string that is already encoded and is used untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params {
    Pairs(Vec<(String, String)>),
    Encoded(String),
}

impl Params {
    pub fn none() -> Self {
        Params::Pairs(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::Pairs(pairs) => pairs.is_empty(),
            Params::Encoded(s) => s.is_empty(),
        }
    }

    /// `application/x-www-form-urlencoded` rendering, pairs joined with `&`.
    pub fn encode(&self) -> String {
        match self {
            Params::Pairs(pairs) => form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish(),
            Params::Encoded(s) => s.clone(),
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::none()
    }
}

impl From<&str> for Params {
    fn from(s: &str) -> Self {
        Params::Encoded(s.to_string())
    }
}

impl From<String> for Params {
    fn from(s: String) -> Self {
        Params::Encoded(s)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Params {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Params::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        Params::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for Params {
    fn from(map: BTreeMap<K, V>) -> Self {
        Params::Pairs(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<HashMap<K, V>> for Params {
    fn from(map: HashMap<K, V>) -> Self {
        Params::Pairs(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// True when `url` starts with `scheme://`, where the scheme is a run of
/// word characters.
pub fn has_scheme(url: &str) -> bool {
    match url.find("://") {
        Some(0) | None => false,
        Some(idx) => url[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'),
    }
}

/// Append an encoded query to `url`, using `&` when it already has one.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{query}")
}

/// Build an FTP URL: force an `ftp://` scheme unless `ftp://` or `sftp://` is
/// already present, embed `username[:password]@` when a username is given,
/// then append `file_path`.
pub fn ftp_url(endpoint: &str, file_path: &str, username: &str, password: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    let mut url = if lower.starts_with("ftp://") || lower.starts_with("sftp://") {
        endpoint.to_string()
    } else {
        format!("ftp://{endpoint}")
    };

    if !username.is_empty() {
        let auth = if password.is_empty() {
            username.to_string()
        } else {
            format!("{username}:{password}")
        };
        url = url.replacen("://", &format!("://{auth}@"), 1);
    }

    url.push_str(file_path);
    url
}

/// A transfer ready to hand to the engine: the absolute URL and every option
/// the engine must apply, defaults included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransfer {
    pub url: String,
    pub options: OptionSet,
}

/// Metadata the engine reports about a finished (or failed) transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferInfo {
    pub url: String,
    pub http_code: u32,
    pub content_type: Option<String>,
    pub total_time: f64,
    pub namelookup_time: f64,
    pub connect_time: f64,
    pub redirect_count: u32,
    pub size_download: f64,
    pub primary_ip: Option<String>,
}

/// A successful transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub body: Vec<u8>,
    pub info: TransferInfo,
}

impl Response {
    pub fn status(&self) -> u32 {
        self.info.http_code
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
