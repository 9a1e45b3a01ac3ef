//! Request-derived data the service harvests without asking.

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName};
use serde::Deserialize;
use serde_json::Value;

/// Signals observed by the server on an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSignals {
    pub ip_address: String,
    pub user_agent: String,
    pub http_accept: String,
    pub http_accept_language: String,
    pub http_accept_encoding: String,
    pub http_referer: String,
    pub proxy_x_forwarded: String,
    pub proxy_via: String,
}

fn header_or(headers: &HeaderMap, name: &HeaderName, fallback: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl ServerSignals {
    pub fn observe(peer: IpAddr, headers: &HeaderMap) -> Self {
        let forwarded_for = HeaderName::from_static("x-forwarded-for");
        Self {
            ip_address: peer.to_string(),
            user_agent: header_or(headers, &header::USER_AGENT, "Unknown"),
            http_accept: header_or(headers, &header::ACCEPT, "Unknown"),
            http_accept_language: header_or(headers, &header::ACCEPT_LANGUAGE, "Unknown"),
            http_accept_encoding: header_or(headers, &header::ACCEPT_ENCODING, "Unknown"),
            http_referer: header_or(headers, &header::REFERER, "Unknown"),
            proxy_x_forwarded: header_or(headers, &forwarded_for, "None"),
            proxy_via: header_or(headers, &header::VIA, "None"),
        }
    }

    /// `(data_type, value)` pairs in a stable order.
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("ip_address", self.ip_address.as_str()),
            ("user_agent", self.user_agent.as_str()),
            ("http_accept", self.http_accept.as_str()),
            ("http_accept_language", self.http_accept_language.as_str()),
            ("http_accept_encoding", self.http_accept_encoding.as_str()),
            ("http_referer", self.http_referer.as_str()),
            ("proxy_x_forwarded", self.proxy_x_forwarded.as_str()),
            ("proxy_via", self.proxy_via.as_str()),
        ]
    }

    /// Server-observed value for `data_type`, if it is one of the harvested signals.
    pub fn observed(&self, data_type: &str) -> Option<&str> {
        self.entries()
            .into_iter()
            .find(|(key, _)| *key == data_type)
            .map(|(_, value)| value)
    }
}

/// Fingerprint data reported by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientSignals {
    pub browser_details: Option<Value>,
    pub screen_size: Option<Value>,
    pub plugins: Option<Value>,
    pub canvas_fingerprint: Option<Value>,
    pub timezone: Option<Value>,
    pub language: Option<Value>,
    pub platform: Option<Value>,
}

fn as_text(value: &Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Bool(false)) => None,
        Some(Value::Array(items)) if items.is_empty() => None,
        Some(other) => Some(other.to_string()),
    }
}

impl ClientSignals {
    /// Non-empty signals as `(data_type, value)` pairs.
    pub fn present(&self) -> Vec<(&'static str, String)> {
        [
            ("browser_details", &self.browser_details),
            ("screen_size", &self.screen_size),
            ("plugins", &self.plugins),
            ("canvas_fingerprint", &self.canvas_fingerprint),
            ("timezone", &self.timezone),
            ("language", &self.language),
            ("platform", &self.platform),
        ]
        .into_iter()
        .filter_map(|(key, value)| as_text(value).map(|text| (key, text)))
        .collect()
    }
}
