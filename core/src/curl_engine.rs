//! libcurl-backed transfer engine.
//!
//! Each session wraps one `curl::easy::Easy` handle. Options are applied by
//! mapping every `TransferOption` onto the matching `Easy` setter; the handle
//! is dropped on `close`.

use std::io::Write;
use std::time::Duration;

use curl::easy::{Auth, Easy, List};
use log::{debug, warn};

use crate::engine::{TransferEngine, TransferSession};
use crate::error::{ConfigurationError, CurlError, TransferError};
use crate::http::TransferInfo;
use crate::options::{auth_flags, OptionSet, OptionValue, TransferOption};

const CURLE_FAILED_INIT: u32 = 2;

/// Engine that performs transfers with the system libcurl.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlEngine;

impl CurlEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TransferEngine for CurlEngine {
    type Session = CurlSession;

    fn check_available(&self) -> Result<(), ConfigurationError> {
        require_protocol("http")
    }

    /// Fails with `EngineUnavailable` when libcurl lacks the URL's scheme,
    /// e.g. `sftp` on a build without libssh.
    fn open(&self, url: &str) -> Result<CurlSession, CurlError> {
        if let Some((scheme, _)) = url.split_once("://") {
            require_protocol(scheme)?;
        }
        let mut easy = Easy::new();
        easy.url(url).map_err(engine_error)?;
        debug!("opened transfer session for {url}");
        Ok(CurlSession {
            easy: Some(easy),
            return_transfer: true,
        })
    }
}

pub struct CurlSession {
    easy: Option<Easy>,
    return_transfer: bool,
}

impl CurlSession {
    fn handle(&mut self) -> Result<&mut Easy, TransferError> {
        self.easy
            .as_mut()
            .ok_or_else(|| TransferError::new(CURLE_FAILED_INIT, "session already closed"))
    }

    fn apply_one(&mut self, option: TransferOption, value: &OptionValue) -> Result<(), CurlError> {
        if option == TransferOption::ReturnTransfer {
            self.return_transfer = flag(option, value)?;
            return Ok(());
        }

        let easy = self.handle()?;
        let result = match option {
            TransferOption::Port => easy.port(narrow(option, value)?),
            TransferOption::Timeout => easy.timeout(seconds(option, value)?),
            TransferOption::ConnectTimeout => easy.connect_timeout(seconds(option, value)?),
            TransferOption::Verbose => easy.verbose(flag(option, value)?),
            TransferOption::Header => easy.show_header(flag(option, value)?),
            TransferOption::NoBody => easy.nobody(flag(option, value)?),
            TransferOption::FailOnError => easy.fail_on_error(flag(option, value)?),
            TransferOption::Post => easy.post(flag(option, value)?),
            TransferOption::FollowLocation => easy.follow_location(flag(option, value)?),
            TransferOption::HttpProxyTunnel => easy.http_proxy_tunnel(flag(option, value)?),
            TransferOption::SslVerifyPeer => easy.ssl_verify_peer(flag(option, value)?),
            TransferOption::SslVerifyHost => easy.ssl_verify_host(int(option, value)? != 0),
            TransferOption::MaxRedirs => easy.max_redirections(narrow(option, value)?),
            TransferOption::HttpAuth => {
                let [basic, digest, gss, ntlm] = auth_flags(int(option, value)?);
                let mut auth = Auth::new();
                auth.basic(basic).digest(digest).gssnegotiate(gss).ntlm(ntlm);
                easy.http_auth(&auth)
            }
            TransferOption::Proxy => easy.proxy(text(option, value)?),
            TransferOption::UserPwd => {
                let (user, pass) = split_credentials(text(option, value)?);
                easy.username(user).and_then(|_| easy.password(pass))
            }
            TransferOption::ProxyUserPwd => {
                let (user, pass) = split_credentials(text(option, value)?);
                easy.proxy_username(user).and_then(|_| easy.proxy_password(pass))
            }
            TransferOption::PostFields => easy.post_fields_copy(text(option, value)?.as_bytes()),
            TransferOption::Referer => easy.referer(text(option, value)?),
            TransferOption::UserAgent => easy.useragent(text(option, value)?),
            TransferOption::Cookie => easy.cookie(text(option, value)?),
            TransferOption::HttpHeader => {
                let mut headers = List::new();
                for line in list(option, value)? {
                    headers.append(line).map_err(engine_error)?;
                }
                easy.http_headers(headers)
            }
            TransferOption::CookieFile => easy.cookie_file(text(option, value)?),
            TransferOption::CookieJar => easy.cookie_jar(text(option, value)?),
            TransferOption::CustomRequest => easy.custom_request(text(option, value)?),
            TransferOption::CaInfo => easy.cainfo(text(option, value)?),
            TransferOption::Encoding => easy.accept_encoding(text(option, value)?),
            TransferOption::BinaryTransfer => {
                debug!("{option} has no effect; libcurl transfers are always binary");
                Ok(())
            }
            TransferOption::ReturnTransfer => Ok(()),
        };
        result.map_err(|err| CurlError::Transfer(engine_error(err)))
    }
}

impl TransferSession for CurlSession {
    fn apply(&mut self, options: &OptionSet) -> Result<(), CurlError> {
        for (option, value) in options.iter() {
            self.apply_one(option, value)?;
        }
        Ok(())
    }

    fn perform(&mut self) -> Result<Vec<u8>, TransferError> {
        let return_transfer = self.return_transfer;
        let easy = self.handle()?;
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    if return_transfer {
                        body.extend_from_slice(data);
                    } else if let Err(err) = std::io::stdout().write_all(data) {
                        warn!("failed to write response to stdout: {err}");
                        return Ok(0);
                    }
                    Ok(data.len())
                })
                .map_err(engine_error)?;
            transfer.perform().map_err(engine_error)?;
        }
        Ok(body)
    }

    fn info(&mut self) -> TransferInfo {
        let Some(easy) = self.easy.as_mut() else {
            return TransferInfo::default();
        };
        TransferInfo {
            url: easy
                .effective_url()
                .ok()
                .flatten()
                .unwrap_or_default()
                .to_string(),
            http_code: easy.response_code().unwrap_or(0),
            content_type: easy.content_type().ok().flatten().map(str::to_string),
            total_time: easy.total_time().map(|d| d.as_secs_f64()).unwrap_or(0.0),
            namelookup_time: easy.namelookup_time().map(|d| d.as_secs_f64()).unwrap_or(0.0),
            connect_time: easy.connect_time().map(|d| d.as_secs_f64()).unwrap_or(0.0),
            redirect_count: easy.redirect_count().unwrap_or(0),
            size_download: easy.download_size().unwrap_or(0.0),
            primary_ip: easy.primary_ip().ok().flatten().map(str::to_string),
        }
    }

    fn close(&mut self) {
        if self.easy.take().is_some() {
            debug!("closed transfer session");
        }
    }
}

fn require_protocol(protocol: &str) -> Result<(), ConfigurationError> {
    let version = curl::Version::get();
    if version.protocols().any(|p| p.eq_ignore_ascii_case(protocol)) {
        Ok(())
    } else {
        Err(ConfigurationError::EngineUnavailable(format!(
            "libcurl {} was built without {} support",
            version.version(),
            protocol.to_ascii_uppercase()
        )))
    }
}

fn engine_error(err: curl::Error) -> TransferError {
    let message = err
        .extra_description()
        .map(str::to_string)
        .unwrap_or_else(|| err.description().to_string());
    TransferError::new(err.code() as u32, message)
}

fn split_credentials(pair: &str) -> (&str, &str) {
    pair.split_once(':').unwrap_or((pair, ""))
}

fn invalid(option: TransferOption, expected: &'static str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        option: option.name(),
        expected,
    }
}

fn flag(option: TransferOption, value: &OptionValue) -> Result<bool, ConfigurationError> {
    value.as_bool().ok_or_else(|| invalid(option, "a boolean"))
}

fn int(option: TransferOption, value: &OptionValue) -> Result<i64, ConfigurationError> {
    value.as_int().ok_or_else(|| invalid(option, "an integer"))
}

fn narrow<T: TryFrom<i64>>(option: TransferOption, value: &OptionValue) -> Result<T, ConfigurationError> {
    T::try_from(int(option, value)?).map_err(|_| invalid(option, "an integer in range"))
}

fn seconds(option: TransferOption, value: &OptionValue) -> Result<Duration, ConfigurationError> {
    narrow::<u64>(option, value).map(Duration::from_secs)
}

fn text(option: TransferOption, value: &OptionValue) -> Result<&str, ConfigurationError> {
    value.as_text().ok_or_else(|| invalid(option, "a string"))
}

fn list(option: TransferOption, value: &OptionValue) -> Result<&[String], ConfigurationError> {
    value.as_list().ok_or_else(|| invalid(option, "a list of strings"))
}
