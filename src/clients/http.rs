// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! HTTP GET returning JSON.

use log::{debug, warn};
use reqwest::blocking::Client;
use serde_json::Value;

use super::ClientError;

/// Anything that can GET a URL with query parameters and hand back JSON.
///
/// Failures of any kind (transport, HTTP status, a body that isn't JSON) are
/// logged and come back as `None`; callers decide whether that's fatal.
pub trait JsonGetter {
    fn get_json(&self, url: &str, params: &[(&str, String)]) -> Option<Value>;
}

/// The production [JsonGetter], backed by a blocking `reqwest` client with the
/// default system timeouts.
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<HttpClient, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("koa_dep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpClient { client })
    }
}

impl JsonGetter for HttpClient {
    fn get_json(&self, url: &str, params: &[(&str, String)]) -> Option<Value> {
        debug!("GET {url} {params:?}");
        let response = match self.client.get(url).query(params).send() {
            Ok(r) => r,
            Err(e) => {
                warn!("Request to {url} failed: {e}");
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!("Request to {url} returned HTTP {status}");
            return None;
        }
        match response.json::<Value>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Response from {url} wasn't JSON: {e}");
                None
            }
        }
    }
}

/// Pull a string out of a loosely-shaped JSON reply. Services answer with a
/// bare string, an object holding `key`, or a list of such objects; numbers are
/// stringified. A `data` wrapper object is looked through.
pub fn json_str(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => match map.get(key) {
            Some(v @ (Value::String(_) | Value::Number(_))) => json_str(v, key),
            _ => map.get("data").and_then(|d| json_str(d, key)),
        },
        Value::Array(list) => list.iter().find_map(|v| json_str(v, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_str_shapes() {
        assert_eq!(json_str(&json!("jsmith"), "Alias").as_deref(), Some("jsmith"));
        assert_eq!(
            json_str(&json!({"Alias": "jsmith"}), "Alias").as_deref(),
            Some("jsmith")
        );
        assert_eq!(
            json_str(&json!([{"Other": 1}, {"Alias": "jsmith"}]), "Alias").as_deref(),
            Some("jsmith")
        );
        assert_eq!(
            json_str(&json!({"data": {"Title": "Dark matter"}}), "Title").as_deref(),
            Some("Dark matter")
        );
        assert_eq!(json_str(&json!({"Id": 42}), "Id").as_deref(), Some("42"));
        assert_eq!(json_str(&json!(""), "Alias"), None);
        assert_eq!(json_str(&json!(null), "Alias"), None);
        assert_eq!(json_str(&json!([]), "Alias"), None);
    }
}
