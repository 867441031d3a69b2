//! Verify request preparation against JSON test vectors stored in `test-vectors/`.
//!
//! Each request vector names a verb, an endpoint relative to `BASE_URL` and
//! its params, and lists the options the prepared transfer must (and must
//! not) carry. Nothing here touches the network.

use fluent_curl::{
    http, ClientConfig, CurlClient, CurlEngine, HttpMethod, OptionSet, OptionValue, Params,
    TransferOption,
};

const BASE_URL: &str = "http://localhost:3000";

fn client() -> CurlClient {
    let config = ClientConfig {
        base_url: Some(BASE_URL.to_string()),
        ..ClientConfig::default()
    };
    CurlClient::with_engine(CurlEngine::new(), config).unwrap()
}

fn parse_params(value: &serde_json::Value) -> Params {
    match value {
        serde_json::Value::String(s) => Params::from(s.as_str()),
        serde_json::Value::Array(pairs) => Params::from(
            pairs
                .iter()
                .map(|pair| {
                    let pair = pair.as_array().unwrap();
                    (
                        pair[0].as_str().unwrap().to_string(),
                        pair[1].as_str().unwrap().to_string(),
                    )
                })
                .collect::<Vec<_>>(),
        ),
        other => panic!("unsupported params: {other}"),
    }
}

fn parse_value(value: &serde_json::Value) -> OptionValue {
    match value {
        serde_json::Value::Bool(b) => OptionValue::Bool(*b),
        serde_json::Value::Number(n) => OptionValue::Int(n.as_i64().unwrap()),
        serde_json::Value::String(s) => OptionValue::Text(s.clone()),
        serde_json::Value::Array(items) => OptionValue::List(
            items
                .iter()
                .map(|item| item.as_str().unwrap().to_string())
                .collect(),
        ),
        other => panic!("unsupported option value: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let mut c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let method: HttpMethod = case["method"].as_str().unwrap().parse().unwrap();
        let params = parse_params(&case["params"]);

        c.create(case["endpoint"].as_str().unwrap())
            .set_method(method, params, &OptionSet::new());
        let prepared = c.prepare().unwrap();

        assert_eq!(
            prepared.url,
            format!("{BASE_URL}{}", case["expected_url"].as_str().unwrap()),
            "{name}: url"
        );

        for (key, expected) in case["expected_options"].as_object().unwrap() {
            let option: TransferOption = key.parse().unwrap();
            assert_eq!(
                prepared.options.get(option),
                Some(&parse_value(expected)),
                "{name}: {option}"
            );
        }

        for key in case["absent_options"].as_array().unwrap() {
            let option: TransferOption = key.as_str().unwrap().parse().unwrap();
            assert!(
                !prepared.options.contains(option),
                "{name}: {option} should be absent"
            );
        }

        assert!(c.options().is_empty(), "{name}: builder not reset");
        assert!(c.headers().is_empty(), "{name}: headers not reset");
    }
}

// ---------------------------------------------------------------------------
// FTP
// ---------------------------------------------------------------------------

#[test]
fn ftp_test_vectors() {
    let raw = include_str!("../../test-vectors/ftp.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let url = http::ftp_url(
            case["endpoint"].as_str().unwrap(),
            case["file_path"].as_str().unwrap(),
            case["username"].as_str().unwrap(),
            case["password"].as_str().unwrap(),
        );
        assert_eq!(url, case["expected_url"].as_str().unwrap(), "{name}: url");
    }
}
