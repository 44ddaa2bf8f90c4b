// # Alibaba Cloud DNS Authority
//
// This crate provides a RecordAuthority implementation over the Alibaba
// Cloud DNS (Alidns) RPC API.
//
// ## Scope
//
// - ✅ One signed HTTP request per page (pagination is owned by the core)
// - ✅ HTTP timeout configured (default 30 seconds)
// - ✅ API error bodies (`Code`, `Message`) surfaced in errors
// - ✅ Specific error mapping for auth, throttling and server errors
// - ❌ NO retry logic (a failed page fails the zone for this pass)
// - ❌ NO filtering by kind or status (owned by the core)
// - ❌ NO write calls (the authority is never mutated)
//
// ## Trust Level: Untrusted (Record Authority)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS API calls to the configured endpoint only
// - ✅ Parse Alidns responses into RemoteRecord
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Touch the mirror store
// - ❌ Cache records beyond a single request
//
// ## Security Requirements
//
// - The access key secret NEVER appears in logs or Debug output
// - Empty credentials are rejected at construction
//
// ## API Reference
//
// - Signature (RPC style, version 1.0): HMAC-SHA1 over
//   `GET&%2F&<percent-encoded canonical query>`, key `<secret>&`
// - List records: `Action=DescribeDomainRecords&DomainName=...&PageNumber=...&PageSize=...`
// - Connectivity check: `Action=DescribeDomains&PageNumber=1&PageSize=1`

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use dns_mirror_core::config::AuthorityConfig;
use dns_mirror_core::model::{RecordKind, RecordStatus, RemoteRecord};
use dns_mirror_core::registry::ComponentRegistry;
use dns_mirror_core::traits::{PageRequest, RecordAuthority, RecordAuthorityFactory, RecordPage};
use dns_mirror_core::{Error, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha1::Sha1;
use std::collections::BTreeMap;
use std::time::Duration;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "cn-hangzhou";

/// Alidns API version
const API_VERSION: &str = "2015-01-09";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const AUTHORITY_NAME: &str = "aliyun";

/// Alibaba Cloud DNS record authority
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot: each call issues exactly one request.
///
/// # Security
///
/// The Debug implementation does NOT expose the access key secret.
pub struct AliyunAuthority {
    /// Access key id
    access_key_id: String,

    /// Access key secret
    /// ⚠️ NEVER log this value
    access_key_secret: String,

    /// API endpoint, e.g. `https://alidns.cn-hangzhou.aliyuncs.com`
    endpoint: url::Url,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the access key secret
impl std::fmt::Debug for AliyunAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunAuthority")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl AliyunAuthority {
    /// Create a new authority
    ///
    /// # Parameters
    ///
    /// - `access_key_id` / `access_key_secret`: RAM credentials with Alidns read access
    /// - `endpoint`: API base URL, see [`endpoint_for_region`]
    /// - `timeout`: Per-request timeout
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let access_key_id = access_key_id.into();
        let access_key_secret = access_key_secret.into();

        if access_key_id.is_empty() || access_key_secret.is_empty() {
            return Err(Error::config(
                "Aliyun access key id and secret are required",
            ));
        }

        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::config(format!("Invalid Aliyun endpoint {}: {}", endpoint, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            access_key_id,
            access_key_secret,
            endpoint,
            client,
        })
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Build the signed query string for `params`
    ///
    /// Adds the common parameters (credentials, timestamp, nonce, version)
    /// and appends `Signature`.
    fn signed_query(
        &self,
        mut params: BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
        nonce: &str,
    ) -> Result<String> {
        let common = [
            ("AccessKeyId", self.access_key_id.as_str()),
            ("Format", "JSON"),
            ("SignatureMethod", "HMAC-SHA1"),
            ("SignatureNonce", nonce),
            ("SignatureVersion", "1.0"),
            ("Version", API_VERSION),
        ];
        for (key, value) in common {
            params.insert(key.to_string(), value.to_string());
        }
        params.insert(
            "Timestamp".to_string(),
            timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );

        let canonical = canonical_query(&params);
        let signature = sign(&self.access_key_secret, &string_to_sign("GET", &canonical))?;

        Ok(format!(
            "{}&Signature={}",
            canonical,
            percent_encode(&signature)
        ))
    }

    /// Issue one signed GET and decode the JSON body
    async fn call<T: DeserializeOwned>(&self, action: &str, params: &[(&str, String)]) -> Result<T> {
        let mut all: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        all.insert("Action".to_string(), action.to_string());

        let nonce = uuid::Uuid::new_v4().to_string();
        let query = self.signed_query(all, Utc::now(), &nonce)?;

        let mut url = self.endpoint.clone();
        url.set_query(Some(&query));

        tracing::debug!("Calling Aliyun {} ({})", action, self.endpoint);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(map_api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::authority(
                AUTHORITY_NAME,
                format!("Failed to parse {} response: {}", action, e),
            )
        })
    }
}

#[async_trait]
impl RecordAuthority for AliyunAuthority {
    /// Fetch one page of `DescribeDomainRecords`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /?Action=DescribeDomainRecords&DomainName=example.com&PageNumber=1&PageSize=100&...&Signature=...
    /// ```
    async fn list_records_page(&self, zone: &str, page: PageRequest) -> Result<RecordPage> {
        let response: DescribeDomainRecordsResponse = self
            .call(
                "DescribeDomainRecords",
                &[
                    ("DomainName", zone.to_string()),
                    ("PageNumber", page.page_number.to_string()),
                    ("PageSize", page.page_size.to_string()),
                ],
            )
            .await?;

        Ok(response.into_page(zone))
    }

    async fn ping(&self) -> Result<()> {
        let _: DescribeDomainsResponse = self
            .call(
                "DescribeDomains",
                &[("PageNumber", "1".to_string()), ("PageSize", "1".to_string())],
            )
            .await?;
        Ok(())
    }

    fn authority_name(&self) -> &'static str {
        AUTHORITY_NAME
    }
}

/// Factory for creating Aliyun authorities
pub struct AliyunFactory;

impl RecordAuthorityFactory for AliyunFactory {
    fn create(&self, config: &AuthorityConfig) -> Result<Box<dyn RecordAuthority>> {
        match config {
            AuthorityConfig::Aliyun {
                access_key_id,
                access_key_secret,
                region,
                endpoint,
                timeout_secs,
            } => {
                let endpoint = endpoint
                    .clone()
                    .unwrap_or_else(|| endpoint_for_region(region.as_deref()));

                Ok(Box::new(AliyunAuthority::new(
                    access_key_id.clone(),
                    access_key_secret.clone(),
                    &endpoint,
                    Duration::from_secs(*timeout_secs),
                )?))
            }
            other => Err(Error::config(format!(
                "Aliyun factory cannot handle '{}' config",
                other.type_name()
            ))),
        }
    }
}

/// Register the Aliyun authority as `aliyun`
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_authority(AUTHORITY_NAME, Box::new(AliyunFactory));
}

/// Endpoint for a region; `None` or empty means [`DEFAULT_REGION`]
pub fn endpoint_for_region(region: Option<&str>) -> String {
    let region = region
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REGION);
    format!("https://alidns.{}.aliyuncs.com", region)
}

/// RFC 3986 percent-encoding as the signature scheme requires
///
/// Only `A-Z a-z 0-9 - _ . ~` pass through; space becomes `%20`.
pub fn percent_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Sorted, encoded `key=value` pairs joined by `&`
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `<METHOD>&%2F&<encoded canonical query>`
pub fn string_to_sign(method: &str, canonical_query: &str) -> String {
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(canonical_query)
    )
}

/// Base64 HMAC-SHA1 of `string_to_sign` keyed with `<secret>&`
pub fn sign(access_key_secret: &str, string_to_sign: &str) -> Result<String> {
    hmac_sha1_base64(
        format!("{}&", access_key_secret).as_bytes(),
        string_to_sign.as_bytes(),
    )
}

fn hmac_sha1_base64(key: &[u8], data: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|e| Error::auth(format!("Invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Map a non-2xx response to an error
///
/// The body is expected to carry `Code` and `Message`; when it does not,
/// the raw body is used instead.
pub fn map_api_error(status: u16, body: &str) -> Error {
    let api = serde_json::from_str::<ApiError>(body)
        .ok()
        .filter(|api| !api.code.is_empty());
    let code = api.as_ref().map(|api| api.code.as_str()).unwrap_or_default();
    let detail = match &api {
        Some(ApiError {
            code,
            message,
            request_id: Some(id),
        }) => format!("{}: {} (RequestId: {})", code, message, id),
        Some(api) => format!("{}: {}", api.code, api.message),
        None => body.trim().to_string(),
    };

    if code.starts_with("InvalidAccessKeyId")
        || code == "SignatureDoesNotMatch"
        || code == "IncorrectDomainUser"
        || code == "Forbidden.RAM"
        || status == 401
        || status == 403
    {
        return Error::auth(format!("Aliyun rejected credentials ({}): {}", status, detail));
    }
    if code.starts_with("Throttling") || status == 429 {
        return Error::rate_limited(format!("Aliyun throttled request ({}): {}", status, detail));
    }
    if code == "InvalidDomainName.NoExist" || status == 404 {
        return Error::not_found(format!("Aliyun resource not found ({}): {}", status, detail));
    }
    if (500..=599).contains(&status) {
        return Error::authority(
            AUTHORITY_NAME,
            format!("server error (transient) {}: {}", status, detail),
        );
    }
    Error::authority(
        AUTHORITY_NAME,
        format!("request failed {}: {}", status, detail),
    )
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainsResponse {
    #[serde(default)]
    #[allow(dead_code)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainRecordsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    domain_records: DomainRecords,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainRecords {
    #[serde(default)]
    record: Vec<ApiRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiRecord {
    #[serde(default)]
    domain_name: String,
    record_id: String,
    #[serde(rename = "RR", default)]
    rr: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    line: Option<String>,
    #[serde(rename = "TTL", default)]
    ttl: Option<u32>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    weight: Option<u32>,
    #[serde(default)]
    create_timestamp: Option<i64>,
    #[serde(default)]
    update_timestamp: Option<i64>,
}

impl DescribeDomainRecordsResponse {
    fn into_page(self, zone: &str) -> RecordPage {
        RecordPage {
            total_count: self.total_count,
            records: self
                .domain_records
                .record
                .into_iter()
                .map(|r| r.into_remote(zone))
                .collect(),
        }
    }
}

impl ApiRecord {
    fn into_remote(self, zone: &str) -> RemoteRecord {
        let zone = if self.domain_name.is_empty() {
            zone.to_string()
        } else {
            self.domain_name
        };

        let mut record = RemoteRecord::new(
            self.record_id,
            zone,
            self.rr,
            RecordKind::from(self.kind),
            self.value,
        )
        .with_status(RecordStatus::from_wire(&self.status));

        if let Some(ttl) = self.ttl {
            record.ttl = ttl;
        }
        record.weight = self.weight;
        record.line = self.line;
        record.locked = self.locked;
        record.created_at = self.create_timestamp.and_then(DateTime::from_timestamp_millis);
        record.updated_at = self.update_timestamp.and_then(DateTime::from_timestamp_millis);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn authority() -> AliyunAuthority {
        AliyunAuthority::new(
            "testid",
            "testsecret",
            &endpoint_for_region(None),
            DEFAULT_HTTP_TIMEOUT,
        )
        .unwrap()
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("abcXYZ019-_.~"), "abcXYZ019-_.~");
        assert_eq!(percent_encode("a b*c~d/e+f=é"), "a%20b%2Ac~d%2Fe%2Bf%3D%C3%A9");
        assert_eq!(percent_encode("2024-01-01T00:00:00Z"), "2024-01-01T00%3A00%3A00Z");
    }

    #[test]
    fn test_canonical_query_and_string_to_sign() {
        let params: BTreeMap<String, String> = [
            ("PageSize", "100"),
            ("Action", "DescribeDomainRecords"),
            ("Timestamp", "2024-01-01T00:00:00Z"),
            ("DomainName", "example.com"),
            ("PageNumber", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let canonical = canonical_query(&params);
        assert_eq!(
            canonical,
            "Action=DescribeDomainRecords&DomainName=example.com&PageNumber=1&PageSize=100&Timestamp=2024-01-01T00%3A00%3A00Z"
        );

        let sts = string_to_sign("GET", &canonical);
        assert_eq!(
            sts,
            "GET&%2F&Action%3DDescribeDomainRecords%26DomainName%3Dexample.com%26PageNumber%3D1%26PageSize%3D100%26Timestamp%3D2024-01-01T00%253A00%253A00Z"
        );
        assert_eq!(sign("testsecret", &sts).unwrap(), "fYHj9NL54/GovMME0rj9f6XZBzs=");
    }

    #[test]
    fn test_hmac_sha1_known_answer() {
        // RFC 2202, test case 2
        assert_eq!(
            hmac_sha1_base64(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "7/zfauXrL6LSdBbV8YTfnCWafHk="
        );
        assert_eq!(
            sign("testsecret", "GET&%2F&AccessKeyId%3Dtestid").unwrap(),
            "bxxHL7sUeRYUwccn2WO6V9ZLzrU="
        );
    }

    #[test]
    fn test_signed_query_carries_common_params() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut params = BTreeMap::new();
        params.insert("Action".to_string(), "DescribeDomains".to_string());

        let query = authority().signed_query(params, timestamp, "nonce-1").unwrap();

        assert!(query.starts_with("AccessKeyId=testid&Action=DescribeDomains&Format=JSON&"));
        assert!(query.contains("SignatureMethod=HMAC-SHA1"));
        assert!(query.contains("SignatureNonce=nonce-1"));
        assert!(query.contains("SignatureVersion=1.0"));
        assert!(query.contains("Timestamp=2024-01-01T00%3A00%3A00Z"));
        assert!(query.contains("Version=2015-01-09"));
        assert!(query.contains("&Signature="));
        assert!(!query.contains("testsecret"));
    }

    #[test]
    fn test_endpoint_for_region() {
        assert_eq!(endpoint_for_region(None), "https://alidns.cn-hangzhou.aliyuncs.com");
        assert_eq!(endpoint_for_region(Some("")), "https://alidns.cn-hangzhou.aliyuncs.com");
        assert_eq!(
            endpoint_for_region(Some("ap-southeast-1")),
            "https://alidns.ap-southeast-1.aliyuncs.com"
        );
    }

    #[test]
    fn test_parse_describe_domain_records() {
        let body = r#"{
            "TotalCount": 3,
            "PageNumber": 1,
            "PageSize": 100,
            "RequestId": "536E9CAD-DB30-4647-AC87-AA5CC38C5382",
            "DomainRecords": {
                "Record": [
                    {
                        "DomainName": "example.com",
                        "RecordId": "9999985",
                        "RR": "www",
                        "Type": "A",
                        "Value": "1.1.1.1",
                        "Line": "default",
                        "TTL": 600,
                        "Status": "ENABLE",
                        "Locked": false,
                        "CreateTimestamp": 1666501957000,
                        "UpdateTimestamp": 1676872961000
                    },
                    {
                        "DomainName": "example.com",
                        "RecordId": "9999986",
                        "RR": "@",
                        "Type": "CNAME",
                        "Value": "lb.example.net",
                        "Status": "DISABLE",
                        "Locked": true,
                        "Weight": 5
                    },
                    {
                        "RecordId": "9999987",
                        "RR": "mail",
                        "Type": "mx",
                        "Value": "mx.example.net",
                        "Status": "ENABLE"
                    }
                ]
            }
        }"#;

        let response: DescribeDomainRecordsResponse = serde_json::from_str(body).unwrap();
        let page = response.into_page("example.com");

        assert_eq!(page.total_count, 3);
        assert_eq!(page.records.len(), 3);

        let www = &page.records[0];
        assert_eq!(www.record_id, "9999985");
        assert_eq!(www.full_name(), "www.example.com");
        assert_eq!(www.kind, RecordKind::A);
        assert!(www.is_active());
        assert_eq!(www.ttl, 600);
        assert_eq!(www.line.as_deref(), Some("default"));
        assert_eq!(
            www.created_at,
            DateTime::from_timestamp_millis(1_666_501_957_000)
        );

        let apex = &page.records[1];
        assert_eq!(apex.full_name(), "example.com");
        assert_eq!(apex.kind, RecordKind::Cname);
        assert!(!apex.is_active());
        assert!(apex.locked);
        assert_eq!(apex.weight, Some(5));

        // Missing DomainName falls back to the requested zone
        let mx = &page.records[2];
        assert_eq!(mx.zone, "example.com");
        assert_eq!(mx.kind, RecordKind::Mx);
    }

    #[test]
    fn test_parse_empty_listing() {
        let response: DescribeDomainRecordsResponse =
            serde_json::from_str(r#"{"TotalCount": 0, "DomainRecords": {"Record": []}}"#).unwrap();
        let page = response.into_page("example.com");
        assert_eq!(page.total_count, 0);
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_map_api_error() {
        let body = r#"{"Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found.","RequestId":"ABC"}"#;
        let err = map_api_error(404, body);
        assert!(matches!(err, Error::Authentication(_)));
        assert!(err.to_string().contains("Specified access key is not found."));
        assert!(err.to_string().contains("RequestId: ABC"));

        let throttled = r#"{"Code":"Throttling.User","Message":"Request was denied due to user flow control."}"#;
        assert!(matches!(map_api_error(400, throttled), Error::RateLimited(_)));

        let missing = r#"{"Code":"InvalidDomainName.NoExist","Message":"The specified domain name does not exist."}"#;
        assert!(matches!(map_api_error(400, missing), Error::NotFound(_)));

        assert!(matches!(
            map_api_error(503, "Service Unavailable"),
            Error::Authority { .. }
        ));
        assert!(matches!(map_api_error(403, ""), Error::Authentication(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", authority());
        assert!(debug.contains("testid"));
        assert!(!debug.contains("testsecret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let result = AliyunAuthority::new("", "secret", &endpoint_for_region(None), DEFAULT_HTTP_TIMEOUT);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_factory() {
        let factory = AliyunFactory;
        let config = AuthorityConfig::Aliyun {
            access_key_id: "testid".to_string(),
            access_key_secret: "testsecret".to_string(),
            region: Some("cn-shanghai".to_string()),
            endpoint: None,
            timeout_secs: 10,
        };
        let authority = factory.create(&config).unwrap();
        assert_eq!(authority.authority_name(), "aliyun");

        let custom = AuthorityConfig::Custom {
            factory: "other".to_string(),
            config: serde_json::Value::Null,
        };
        assert!(factory.create(&custom).is_err());
    }

    #[tokio::test]
    async fn test_transport_failure_is_http_error() {
        // Nothing listens on port 1
        let authority = AliyunAuthority::new(
            "testid",
            "testsecret",
            "http://127.0.0.1:1",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = authority
            .list_records_page("example.com", PageRequest::first(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(!err.to_string().contains("testsecret"));
    }

    #[test]
    fn test_register() {
        let mut registry = ComponentRegistry::new();
        register(&mut registry);
        assert!(registry.has_authority("aliyun"));
    }
}
