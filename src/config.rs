use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::probe::ProbeSettings;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Parser)]
#[command(name = "image-audit-api", about = "Discover, locate and probe the images on a web page")]
pub struct Config {
    #[arg(long, env = "IMAGE_AUDIT_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Request body ceiling in megabytes.
    #[arg(long, env = "IMAGE_AUDIT_MAX_BODY_MB", default_value_t = 50)]
    pub max_body_mb: usize,

    /// Probes allowed in flight at once per batch.
    #[arg(long, env = "IMAGE_AUDIT_PROBE_CONCURRENCY", default_value_t = 32)]
    pub probe_concurrency: usize,

    #[arg(long, env = "IMAGE_AUDIT_PROBE_TIMEOUT_SECS", default_value_t = 10)]
    pub probe_timeout_secs: u64,

    #[arg(long, env = "IMAGE_AUDIT_RANGE_PROBE_TIMEOUT_SECS", default_value_t = 5)]
    pub range_probe_timeout_secs: u64,

    #[arg(long, env = "IMAGE_AUDIT_NAVIGATION_TIMEOUT_SECS", default_value_t = 30)]
    pub navigation_timeout_secs: u64,

    /// Chrome/Chromium binary; searched for on PATH when unset.
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, env = "IMAGE_AUDIT_HEADFUL")]
    pub headful: bool,

    /// Accept invalid TLS certificates on outbound requests.
    #[arg(long, env = "IMAGE_AUDIT_INSECURE_SSL")]
    pub insecure_ssl: bool,

    #[arg(long, env = "IMAGE_AUDIT_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_body_mb: 50,
            probe_concurrency: 32,
            probe_timeout_secs: 10,
            range_probe_timeout_secs: 5,
            navigation_timeout_secs: 30,
            chrome_path: None,
            headful: false,
            insecure_ssl: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            concurrency: self.probe_concurrency,
            head_timeout: Duration::from_secs(self.probe_timeout_secs),
            range_timeout: Duration::from_secs(self.range_probe_timeout_secs),
        }
    }

    /// Outbound client for page fetches. Per-request timeouts are set by callers.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        self.client_builder().build()
    }

    /// Client for metadata probes. Decompression is off, so no
    /// `Accept-Encoding` is sent and the origin's `Content-Length` survives.
    pub fn probe_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        self.client_builder()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let mut builder = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(self.user_agent.clone())
            .default_headers(headers);

        if self.insecure_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_defaults_match_default_impl() {
        let parsed = Config::try_parse_from(["image-audit-api"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.bind, default.bind);
        assert_eq!(parsed.max_body_mb, default.max_body_mb);
        assert_eq!(parsed.probe_concurrency, default.probe_concurrency);
        assert_eq!(parsed.user_agent, default.user_agent);
        assert!(!parsed.insecure_ssl);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "image-audit-api",
            "--bind",
            "127.0.0.1:8080",
            "--probe-concurrency",
            "4",
            "--headful",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.probe_settings().concurrency, 4);
        assert!(config.headful);
    }

    #[test]
    fn body_limit_is_in_megabytes() {
        assert_eq!(Config::default().max_body_bytes(), 50 * 1024 * 1024);
    }
}
