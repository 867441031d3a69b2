//! Transfer options and the option set handed to the engine.
//!
//! # Design
//! Options are keyed by `TransferOption`, a closed enumeration of the libcurl
//! options this crate knows how to apply. Each option carries its numeric
//! libcurl code and the kind of value it accepts, so callers can address it
//! symbolically (`"timeout"`, `"CURLOPT_TIMEOUT"`) or numerically (`13`).
//! `RETURNTRANSFER` and `BINARYTRANSFER` have no libcurl counterpart; they
//! keep the codes historically used for them by PHP's cURL bindings.
//!
//! `OptionSet` is an ordered map with last-write-wins upserts. Values are
//! checked against the option's kind on insert, with a few lenient coercions
//! (`1` for `true`, numeric strings for integers, a single string for a list).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::ConfigurationError;

/// The kind of value a `TransferOption` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Text,
    List,
}

impl ValueKind {
    fn describe(self) -> &'static str {
        match self {
            ValueKind::Bool => "a boolean",
            ValueKind::Int => "an integer",
            ValueKind::Text => "a string",
            ValueKind::List => "a list of strings",
        }
    }
}

macro_rules! transfer_options {
    ($( $(#[$doc:meta])* $variant:ident => ($name:literal, $code:literal, $kind:ident), )+) => {
        /// A transfer option understood by the engine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum TransferOption {
            $( $(#[$doc])* $variant, )+
        }

        impl TransferOption {
            pub const ALL: &'static [TransferOption] = &[ $( TransferOption::$variant, )+ ];

            /// Canonical name without the `CURLOPT_` prefix.
            pub fn name(self) -> &'static str {
                match self {
                    $( TransferOption::$variant => $name, )+
                }
            }

            pub fn code(self) -> u32 {
                match self {
                    $( TransferOption::$variant => $code, )+
                }
            }

            pub fn kind(self) -> ValueKind {
                match self {
                    $( TransferOption::$variant => ValueKind::$kind, )+
                }
            }
        }
    };
}

transfer_options! {
    Port => ("PORT", 3, Int),
    /// Whole-transfer timeout in seconds.
    Timeout => ("TIMEOUT", 13, Int),
    Verbose => ("VERBOSE", 41, Bool),
    /// Include response headers in the returned body.
    Header => ("HEADER", 42, Bool),
    NoBody => ("NOBODY", 44, Bool),
    /// Treat HTTP status >= 400 as a transfer failure.
    FailOnError => ("FAILONERROR", 45, Bool),
    Post => ("POST", 47, Bool),
    FollowLocation => ("FOLLOWLOCATION", 52, Bool),
    HttpProxyTunnel => ("HTTPPROXYTUNNEL", 61, Bool),
    SslVerifyPeer => ("SSL_VERIFYPEER", 64, Bool),
    MaxRedirs => ("MAXREDIRS", 68, Int),
    ConnectTimeout => ("CONNECTTIMEOUT", 78, Int),
    SslVerifyHost => ("SSL_VERIFYHOST", 81, Int),
    /// Bitmask of `AuthType` values.
    HttpAuth => ("HTTPAUTH", 107, Int),
    Proxy => ("PROXY", 10004, Text),
    /// `user:password` for server authentication.
    UserPwd => ("USERPWD", 10005, Text),
    ProxyUserPwd => ("PROXYUSERPWD", 10006, Text),
    PostFields => ("POSTFIELDS", 10015, Text),
    Referer => ("REFERER", 10016, Text),
    UserAgent => ("USERAGENT", 10018, Text),
    Cookie => ("COOKIE", 10022, Text),
    /// Extra request header lines, sent verbatim.
    HttpHeader => ("HTTPHEADER", 10023, List),
    CookieFile => ("COOKIEFILE", 10031, Text),
    CustomRequest => ("CUSTOMREQUEST", 10036, Text),
    CaInfo => ("CAINFO", 10065, Text),
    CookieJar => ("COOKIEJAR", 10082, Text),
    Encoding => ("ENCODING", 10102, Text),
    /// Return the body as a value instead of writing it to stdout.
    ReturnTransfer => ("RETURNTRANSFER", 19913, Bool),
    BinaryTransfer => ("BINARYTRANSFER", 19914, Bool),
}

impl TransferOption {
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|opt| opt.code() == code)
    }

    /// Case-insensitive lookup, with or without the `CURLOPT_` prefix.
    /// Numeric strings are treated as codes.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(code) = name.parse::<u32>() {
            return Self::from_code(code);
        }
        let upper = name.to_ascii_uppercase();
        let bare = upper.strip_prefix("CURLOPT_").unwrap_or(&upper);
        Self::ALL.iter().copied().find(|opt| opt.name() == bare)
    }
}

impl fmt::Display for TransferOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CURLOPT_{}", self.name())
    }
}

impl FromStr for TransferOption {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ConfigurationError::UnknownOption(s.to_string()))
    }
}

/// Anything that can name a transfer option: the enum itself, a symbolic
/// name, or a numeric code.
pub trait IntoTransferOption {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError>;
}

impl IntoTransferOption for TransferOption {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError> {
        Ok(self)
    }
}

impl IntoTransferOption for &str {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError> {
        self.parse()
    }
}

impl IntoTransferOption for String {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError> {
        self.parse()
    }
}

impl IntoTransferOption for &String {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError> {
        self.parse()
    }
}

impl IntoTransferOption for u32 {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError> {
        TransferOption::from_code(self).ok_or_else(|| ConfigurationError::UnknownOption(self.to_string()))
    }
}

impl IntoTransferOption for i32 {
    fn into_transfer_option(self) -> Result<TransferOption, ConfigurationError> {
        u32::try_from(self)
            .ok()
            .and_then(TransferOption::from_code)
            .ok_or_else(|| ConfigurationError::UnknownOption(self.to_string()))
    }
}

/// A value stored in an `OptionSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl OptionValue {
    /// Convert to the given kind, if the value has a sensible reading as it.
    pub fn coerce(self, kind: ValueKind) -> Option<OptionValue> {
        match (kind, self) {
            (ValueKind::Bool, OptionValue::Bool(b)) => Some(OptionValue::Bool(b)),
            (ValueKind::Bool, OptionValue::Int(i)) => Some(OptionValue::Bool(i != 0)),
            (ValueKind::Bool, OptionValue::Text(s)) => parse_flag(&s).map(OptionValue::Bool),
            (ValueKind::Int, OptionValue::Int(i)) => Some(OptionValue::Int(i)),
            (ValueKind::Int, OptionValue::Bool(b)) => Some(OptionValue::Int(i64::from(b))),
            (ValueKind::Int, OptionValue::Text(s)) => s.trim().parse().ok().map(OptionValue::Int),
            (ValueKind::Text, OptionValue::Text(s)) => Some(OptionValue::Text(s)),
            (ValueKind::Text, OptionValue::Int(i)) => Some(OptionValue::Text(i.to_string())),
            (ValueKind::List, OptionValue::List(l)) => Some(OptionValue::List(l)),
            (ValueKind::List, OptionValue::Text(s)) => Some(OptionValue::List(vec![s])),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(l) => Some(l),
            _ => None,
        }
    }
}

pub(crate) fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<u16> for OptionValue {
    fn from(v: u16) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(v: Vec<String>) -> Self {
        OptionValue::List(v)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(v: Vec<&str>) -> Self {
        OptionValue::List(v.into_iter().map(str::to_string).collect())
    }
}

/// HTTP authentication schemes accepted by `http_login`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthType {
    Basic,
    Digest,
    GssNegotiate,
    Ntlm,
    /// Any scheme the server offers.
    #[default]
    Any,
    /// Any scheme except Basic.
    AnySafe,
}

const AUTH_BASIC: i64 = 1 << 0;
const AUTH_DIGEST: i64 = 1 << 1;
const AUTH_GSSNEGOTIATE: i64 = 1 << 2;
const AUTH_NTLM: i64 = 1 << 3;
const AUTH_DIGEST_IE: i64 = 1 << 4;

impl AuthType {
    /// libcurl `CURLAUTH_*` bitmask.
    pub fn bits(self) -> i64 {
        match self {
            AuthType::Basic => AUTH_BASIC,
            AuthType::Digest => AUTH_DIGEST,
            AuthType::GssNegotiate => AUTH_GSSNEGOTIATE,
            AuthType::Ntlm => AUTH_NTLM,
            AuthType::Any => !AUTH_DIGEST_IE,
            AuthType::AnySafe => !(AUTH_BASIC | AUTH_DIGEST_IE),
        }
    }
}

impl FromStr for AuthType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("CURLAUTH_").unwrap_or(&upper) {
            "BASIC" => Ok(AuthType::Basic),
            "DIGEST" => Ok(AuthType::Digest),
            "GSSNEGOTIATE" | "NEGOTIATE" => Ok(AuthType::GssNegotiate),
            "NTLM" => Ok(AuthType::Ntlm),
            "ANY" => Ok(AuthType::Any),
            "ANYSAFE" => Ok(AuthType::AnySafe),
            _ => Err(ConfigurationError::UnknownAuthType(s.to_string())),
        }
    }
}

/// Split an `AuthType` bitmask back into the individual schemes it enables,
/// in the order basic, digest, gss-negotiate, ntlm.
pub fn auth_flags(bits: i64) -> [bool; 4] {
    [
        bits & AUTH_BASIC != 0,
        bits & AUTH_DIGEST != 0,
        bits & AUTH_GSSNEGOTIATE != 0,
        bits & AUTH_NTLM != 0,
    ]
}

/// Transfer options keyed by option, last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: BTreeMap<TransferOption, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key`, check `value` against the option's kind and upsert it.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Result<TransferOption, ConfigurationError>
    where
        K: IntoTransferOption,
        V: Into<OptionValue>,
    {
        let option = key.into_transfer_option()?;
        let kind = option.kind();
        let value = value
            .into()
            .coerce(kind)
            .ok_or(ConfigurationError::InvalidValue {
                option: option.name(),
                expected: kind.describe(),
            })?;
        self.put(option, value);
        Ok(option)
    }

    /// Upsert a value already known to match the option's kind.
    pub(crate) fn put(&mut self, option: TransferOption, value: impl Into<OptionValue>) {
        let value = value.into();
        debug_assert!(
            value.clone().coerce(option.kind()).as_ref() == Some(&value),
            "{option} given a value of the wrong kind"
        );
        debug!("set {option} = {value:?}");
        self.entries.insert(option, value);
    }

    /// Upsert every entry of `other`, keeping keys that `other` does not name.
    pub fn merge(&mut self, other: &OptionSet) {
        for (option, value) in other.iter() {
            self.entries.insert(option, value.clone());
        }
    }

    pub fn get(&self, option: TransferOption) -> Option<&OptionValue> {
        self.entries.get(&option)
    }

    pub fn contains(&self, option: TransferOption) -> bool {
        self.entries.contains_key(&option)
    }

    pub fn remove(&mut self, option: TransferOption) -> Option<OptionValue> {
        self.entries.remove(&option)
    }

    pub fn bool(&self, option: TransferOption) -> Option<bool> {
        self.get(option).and_then(OptionValue::as_bool)
    }

    pub fn int(&self, option: TransferOption) -> Option<i64> {
        self.get(option).and_then(OptionValue::as_int)
    }

    pub fn text(&self, option: TransferOption) -> Option<&str> {
        self.get(option).and_then(OptionValue::as_text)
    }

    pub fn list(&self, option: TransferOption) -> Option<&[String]> {
        self.get(option).and_then(OptionValue::as_list)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TransferOption, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively_with_or_without_prefix() {
        assert_eq!(TransferOption::from_name("timeout"), Some(TransferOption::Timeout));
        assert_eq!(TransferOption::from_name("CURLOPT_TIMEOUT"), Some(TransferOption::Timeout));
        assert_eq!(TransferOption::from_name("curlopt_ssl_verifypeer"), Some(TransferOption::SslVerifyPeer));
        assert_eq!(TransferOption::from_name("10023"), Some(TransferOption::HttpHeader));
        assert_eq!(TransferOption::from_name("not_an_option"), None);
    }

    #[test]
    fn codes_are_unique() {
        for (i, a) in TransferOption::ALL.iter().enumerate() {
            for b in &TransferOption::ALL[i + 1..] {
                assert_ne!(a.code(), b.code(), "{a} and {b} share a code");
            }
        }
    }

    #[test]
    fn unknown_option_is_a_configuration_error() {
        let mut set = OptionSet::new();
        let err = set.insert("frobnicate", true).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownOption("frobnicate".to_string()));
        let err = set.insert(99_999u32, true).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownOption("99999".to_string()));
        assert!(set.is_empty());
    }

    #[test]
    fn values_are_coerced_to_the_option_kind() {
        let mut set = OptionSet::new();
        set.insert("timeout", "45").unwrap();
        set.insert("failonerror", 0).unwrap();
        set.insert("httpheader", "Accept: text/plain").unwrap();
        set.insert(TransferOption::Port, true).unwrap();
        assert_eq!(set.int(TransferOption::Timeout), Some(45));
        assert_eq!(set.bool(TransferOption::FailOnError), Some(false));
        assert_eq!(
            set.list(TransferOption::HttpHeader),
            Some(&["Accept: text/plain".to_string()][..])
        );
        assert_eq!(set.int(TransferOption::Port), Some(1));
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let mut set = OptionSet::new();
        let err = set.insert("timeout", "soon").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidValue {
                option: "TIMEOUT",
                expected: "an integer"
            }
        );
        assert!(set.insert("verbose", vec!["a", "b"]).is_err());
    }

    #[test]
    fn sequential_upserts_let_later_keys_win_and_keep_the_rest() {
        let mut a = OptionSet::new();
        a.insert("timeout", 10).unwrap();
        a.insert("useragent", "first").unwrap();

        let mut b = OptionSet::new();
        b.insert("timeout", 20).unwrap();
        b.insert("referer", "http://example.com").unwrap();

        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.int(TransferOption::Timeout), Some(20));
        assert_eq!(a.text(TransferOption::UserAgent), Some("first"));
        assert_eq!(a.text(TransferOption::Referer), Some("http://example.com"));
    }

    #[test]
    fn auth_types_parse_and_map_to_bits() {
        assert_eq!("basic".parse::<AuthType>().unwrap(), AuthType::Basic);
        assert_eq!("CURLAUTH_NTLM".parse::<AuthType>().unwrap(), AuthType::Ntlm);
        assert!("kerberos5".parse::<AuthType>().is_err());
        assert_eq!(auth_flags(AuthType::Basic.bits()), [true, false, false, false]);
        assert_eq!(auth_flags(AuthType::Any.bits()), [true, true, true, true]);
        assert_eq!(auth_flags(AuthType::AnySafe.bits()), [false, true, true, true]);
    }
}
