//! Web-layer follow-up for HTTP-family services: fingerprint matching over
//! captured banners and a best-effort status-code probe.
//!
//! Both steps are fallible-but-ignored: a failed fingerprint match yields an
//! empty tag list, a failed status probe leaves the code unset. Neither ever
//! propagates an error into the scan.

use crate::dialer::Proxy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Lower-cased response material handed to the matcher.
#[derive(Debug, Clone, Default)]
pub struct WebInfo {
    /// "http" or "https".
    pub protocol: String,
    /// Lower-cased banner captured by the prober.
    pub banner: String,
}

/// One fingerprint rule: a product tag and the markers that identify it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub product: String,
    /// All markers must be present (lower-case substring match).
    pub markers: Vec<String>,
}

/// Compiled fingerprint ruleset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingerprintDb {
    rules: Vec<Fingerprint>,
}

impl FingerprintDb {
    /// Built-in ruleset covering common servers and frameworks.
    pub fn builtin() -> Self {
        let rule = |product: &str, markers: &[&str]| Fingerprint {
            product: product.to_string(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
        };
        Self {
            rules: vec![
                rule("nginx", &["server: nginx"]),
                rule("apache", &["server: apache"]),
                rule("iis", &["server: microsoft-iis"]),
                rule("tomcat", &["apache-coyote"]),
                rule("jetty", &["server: jetty"]),
                rule("openresty", &["server: openresty"]),
                rule("php", &["x-powered-by: php"]),
                rule("express", &["x-powered-by: express"]),
                rule("asp.net", &["x-aspnet-version"]),
                rule("spring", &["x-application-context"]),
                rule("weblogic", &["weblogic"]),
                rule("jenkins", &["x-jenkins"]),
                rule("grafana", &["grafana"]),
                rule("kibana", &["kbn-name"]),
                rule("minio", &["x-minio-"]),
                rule("basic-auth", &["www-authenticate: basic"]),
            ],
        }
    }

    /// Load additional rules from a JSON file and append them.
    pub fn load_rules(&mut self, path: &Path) -> Result<usize, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let extra: Vec<Fingerprint> = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let count = extra.len();
        self.rules.extend(extra);
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Collect the product tags whose markers all appear in the banner.
    pub fn match_banner(&self, info: &WebInfo) -> Vec<String> {
        if info.banner.is_empty() {
            return Vec::new();
        }
        self.rules
            .iter()
            .filter(|rule| {
                !rule.markers.is_empty()
                    && rule.markers.iter().all(|m| info.banner.contains(m.as_str()))
            })
            .map(|rule| rule.product.clone())
            .collect()
    }
}

/// Build the client used for follow-up status checks. Scan targets routinely
/// present self-signed certificates, so verification is off.
pub fn build_http_client(
    probe_timeout: Duration,
    proxy: Option<&Proxy>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(probe_timeout)
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent("spyglass");

    if let Some(p) = proxy {
        if p.is_active() {
            if let Ok(proxy) = reqwest::Proxy::all(p.to_url()) {
                builder = builder.proxy(proxy);
            }
        }
    }

    builder.build()
}

/// Best-effort GET; any failure is `None`, never an error.
pub async fn http_status(client: &reqwest::Client, url: &str) -> Option<u16> {
    match client.get(url).send().await {
        Ok(response) => Some(response.status().as_u16()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn info(banner: &str) -> WebInfo {
        WebInfo {
            protocol: "http".to_string(),
            banner: banner.to_string(),
        }
    }

    #[test]
    fn test_match_single_product() {
        let db = FingerprintDb::builtin();
        let tags = db.match_banner(&info("http/1.1 200 ok server: nginx/1.25.3"));
        assert_eq!(tags, vec!["nginx"]);
    }

    #[test]
    fn test_match_multiple_products() {
        let db = FingerprintDb::builtin();
        let tags = db.match_banner(&info(
            "http/1.1 200 ok server: nginx x-powered-by: php/8.2",
        ));
        assert!(tags.contains(&"nginx".to_string()));
        assert!(tags.contains(&"php".to_string()));
    }

    #[test]
    fn test_no_match_on_empty_banner() {
        let db = FingerprintDb::builtin();
        assert!(db.match_banner(&info("")).is_empty());
    }

    #[test]
    fn test_load_rules_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"product": "custom-app", "markers": ["x-custom-header"]}}]"#
        )
        .unwrap();

        let mut db = FingerprintDb::builtin();
        let before = db.len();
        let added = db.load_rules(file.path()).unwrap();
        assert_eq!(added, 1);
        assert_eq!(db.len(), before + 1);

        let tags = db.match_banner(&info("http/1.1 200 ok x-custom-header: 1"));
        assert_eq!(tags, vec!["custom-app"]);
    }

    #[tokio::test]
    async fn test_http_status_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 512];
            let _ = stream.read(&mut buf).await;
            stream
                .write_all(b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();
        });

        let client = build_http_client(Duration::from_secs(2), None).unwrap();
        let url = format!("http://{}", addr);
        assert_eq!(http_status(&client, &url).await, Some(204));
    }

    #[tokio::test]
    async fn test_http_status_failure_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = build_http_client(Duration::from_millis(300), None).unwrap();
        let url = format!("http://{}", addr);
        assert_eq!(http_status(&client, &url).await, None);
    }
}
