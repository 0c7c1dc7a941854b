//! Loader for service configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: built-in defaults, the optional `unmark.yaml`
//! file, inline YAML snippets, then `UNMARK__`-prefixed environment variables
//! (`UNMARK__SERVER__PORT=8080`). After merging, every string value has
//! `${VAR}` placeholders expanded. Vendor API keys default to a placeholder for
//! the vendor's conventional variable (`${UNWATER_API_KEY}`,
//! `${DEWATERMARK_API_KEY}`), so an unset variable is caught by
//! [`AppConfig::validate`] and the server refuses to start.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use unmark_common::UnmarkError;
use unmark_common::observability::{LogConfig, LogFormat};
use url::Url;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_CONFIG_FILE: &str = "unmark.yaml";
pub const DEFAULT_CDN_PREFIX: &str =
    "https://cdn.dealerk.it/dealer/datafiles/vehicle/images/800x0/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for one HTTP request, pipeline included.
    pub request_timeout_secs: u64,
    /// Largest accepted request body (image uploads).
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10000,
            request_timeout_secs: 600,
            max_upload_mb: 25,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Page fetching and image extraction knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Every candidate URL must start with this prefix.
    pub cdn_prefix: String,
    pub max_images: usize,
    pub prefer_webp: bool,
    pub user_agent: String,
    pub page_timeout_secs: u64,
    /// Total attempts for the listing page, first one included.
    pub page_retries: usize,
    pub retry_backoff_ms: u64,
    pub image_timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            cdn_prefix: DEFAULT_CDN_PREFIX.into(),
            max_images: 20,
            prefer_webp: true,
            user_agent: DEFAULT_USER_AGENT.into(),
            page_timeout_secs: 20,
            page_retries: 3,
            retry_backoff_ms: 2000,
            image_timeout_secs: 20,
        }
    }
}

impl ScraperConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// The watermark-removal vendor; the tag is `provider`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum VendorConfig {
    Unwatermark {
        #[serde(default = "default_unwatermark_key")]
        api_key: String,
        #[serde(default = "default_unwatermark_endpoint")]
        endpoint: String,
        #[serde(default = "default_unwatermark_timeout")]
        timeout_secs: u64,
    },
    Dewatermark {
        #[serde(default = "default_dewatermark_key")]
        api_key: String,
        #[serde(default = "default_dewatermark_base")]
        base_url: String,
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
        #[serde(default = "default_max_polls")]
        max_polls: u32,
        #[serde(default = "default_dewatermark_timeout")]
        timeout_secs: u64,
        /// Send the CDN URL instead of uploading downloaded bytes.
        #[serde(default)]
        upload_by_url: bool,
    },
    Passthrough,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self::Unwatermark {
            api_key: default_unwatermark_key(),
            endpoint: default_unwatermark_endpoint(),
            timeout_secs: default_unwatermark_timeout(),
        }
    }
}

impl VendorConfig {
    /// Short identifier, also used for the `/test_<vendor>` route.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Unwatermark { .. } => "unwatermark",
            Self::Dewatermark { .. } => "dewatermark",
            Self::Passthrough => "passthrough",
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::Unwatermark { api_key, .. } | Self::Dewatermark { api_key, .. } => {
                Some(api_key.as_str())
            }
            Self::Passthrough => None,
        }
    }

    fn expand_placeholders(&mut self) {
        match self {
            Self::Unwatermark { api_key, .. } | Self::Dewatermark { api_key, .. } => {
                *api_key = expand_env_str(api_key);
            }
            Self::Passthrough => {}
        }
    }
}

fn default_unwatermark_key() -> String {
    "${UNWATER_API_KEY}".into()
}
fn default_unwatermark_endpoint() -> String {
    "https://api.unwatermark.ai/v1/image/remove-watermark".into()
}
fn default_unwatermark_timeout() -> u64 {
    120
}
fn default_dewatermark_key() -> String {
    "${DEWATERMARK_API_KEY}".into()
}
fn default_dewatermark_base() -> String {
    "https://api.dewatermark.ai/".into()
}
fn default_poll_interval_ms() -> u64 {
    1500
}
fn default_max_polls() -> u32 {
    40
}
fn default_dewatermark_timeout() -> u64 {
    60
}

/// Lifetime and bounds of the in-process job store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub ttl_secs: u64,
    pub max_jobs: usize,
    pub sweep_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_jobs: 256,
            sweep_interval_secs: 60,
        }
    }
}

impl JobsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub app_name: String,
    pub dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let base = LogConfig::default();
        Self {
            app_name: base.app_name,
            dir: base.log_dir,
            emit_stderr: base.emit_stderr,
            format: base.format,
            default_filter: base.default_filter,
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            app_name: self.app_name.clone(),
            log_dir: self.dir.clone(),
            emit_stderr: self.emit_stderr,
            format: self.format,
            default_filter: self.default_filter.clone(),
        }
    }
}

impl AppConfig {
    /// Reject configurations the service cannot run with.
    ///
    /// ```
    /// use unmark_config::UnmarkConfigLoader;
    ///
    /// let cfg = UnmarkConfigLoader::new()
    ///     .with_yaml_str("vendor:\n  provider: unwatermark\n  api_key: ''")
    ///     .load()
    ///     .unwrap();
    /// assert!(cfg.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), UnmarkError> {
        if let Some(key) = self.vendor.api_key() {
            let key = key.trim();
            if key.is_empty() {
                return Err(UnmarkError::Config(format!(
                    "{} api_key is empty",
                    self.vendor.provider()
                )));
            }
            if key.contains("${") {
                return Err(UnmarkError::Config(format!(
                    "{} api_key references an unset environment variable: {key}",
                    self.vendor.provider()
                )));
            }
        }
        if self.scraper.max_images == 0 {
            return Err(UnmarkError::Config("scraper.max_images must be > 0".into()));
        }
        match Url::parse(&self.scraper.cdn_prefix) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => {
                return Err(UnmarkError::Config(format!(
                    "scraper.cdn_prefix is not an absolute http(s) URL: {}",
                    self.scraper.cdn_prefix
                )));
            }
        }
        Ok(())
    }
}

const ENV_PREFIX: &str = "UNMARK__";

/// Leaf keys that are always strings. Their environment overrides skip
/// number/bool parsing so values like `0042` or `true` survive verbatim.
const STRING_ENV_LEAVES: &[&str] = &[
    "API_KEY",
    "ENDPOINT",
    "BASE_URL",
    "CDN_PREFIX",
    "USER_AGENT",
    "HOST",
    "APP_NAME",
    "DEFAULT_FILTER",
    "DIR",
];

fn is_string_env_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    upper
        .rsplit("__")
        .next()
        .is_some_and(|leaf| STRING_ENV_LEAVES.contains(&leaf))
}

fn expand_env_str(raw: &str) -> String {
    let mut cur = raw.to_string();
    for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
        let expanded = match shellexpand::env(&cur) {
            Ok(cow) => cow.into_owned(),
            Err(_) => cur.clone(),
        };
        if expanded == cur {
            break;
        }
        cur = expanded;
    }
    cur
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                *s = expand_env_str(s);
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct UnmarkConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_added: bool,
}

impl Default for UnmarkConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl UnmarkConfigLoader {
    /// Start from defaults; environment overrides are attached at `load` so
    /// they always win over files added in between.
    ///
    /// ```
    /// use unmark_config::UnmarkConfigLoader;
    ///
    /// let cfg = UnmarkConfigLoader::new()
    ///     .with_yaml_str("server:\n  port: 8081")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.server.port, 8081);
    /// assert_eq!(cfg.scraper.max_images, 20);
    /// assert_eq!(cfg.vendor.provider(), "unwatermark");
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder();
        Self {
            builder,
            env_added: false,
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    /// A missing file is not an error so deployments can rely on the
    /// environment alone.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Like [`with_file`](Self::with_file) but fails at `load` if absent.
    pub fn with_required_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Skip the `UNMARK__` environment source (used by isolated tests).
    pub fn without_env(mut self) -> Self {
        self.env_added = true;
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use unmark_config::{UnmarkConfigLoader, VendorConfig};
    ///
    /// unsafe { std::env::set_var("DOCTEST_DW_KEY", "dw-secret"); }
    ///
    /// let cfg = UnmarkConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// vendor:
    ///   provider: dewatermark
    ///   api_key: "${DOCTEST_DW_KEY}"
    ///   max_polls: 5
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &cfg.vendor {
    ///     VendorConfig::Dewatermark { api_key, max_polls, poll_interval_ms, .. } => {
    ///         assert_eq!(api_key, "dw-secret");
    ///         assert_eq!(*max_polls, 5);
    ///         assert_eq!(*poll_interval_ms, 1500);
    ///     }
    ///     other => panic!("unexpected vendor {other:?}"),
    /// }
    ///
    /// unsafe { std::env::remove_var("DOCTEST_DW_KEY"); }
    /// ```
    pub fn load(self) -> Result<AppConfig, ConfigError> {
        let mut builder = self.builder.set_default("vendor.provider", "unwatermark")?;
        if !self.env_added {
            let (verbatim, parsed): (Vec<_>, Vec<_>) = std::env::vars()
                .filter(|(k, _)| k.to_ascii_uppercase().starts_with(ENV_PREFIX))
                .partition(|(k, _)| is_string_env_key(k));
            builder = builder
                .add_source(
                    Environment::with_prefix("UNMARK")
                        .separator("__")
                        .try_parsing(true)
                        .source(Some(parsed.into_iter().collect())),
                )
                .add_source(
                    Environment::with_prefix("UNMARK")
                        .separator("__")
                        .source(Some(verbatim.into_iter().collect())),
                );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: AppConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        // Serde defaults bypass the Value pass above.
        typed.vendor.expand_placeholders();

        Ok(typed)
    }

    /// `load` followed by [`AppConfig::validate`].
    pub fn load_validated(self) -> Result<AppConfig, UnmarkError> {
        let cfg = self
            .load()
            .map_err(|e| UnmarkError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_env_keys_are_matched_by_leaf() {
        assert!(is_string_env_key("UNMARK__VENDOR__API_KEY"));
        assert!(is_string_env_key("unmark__scraper__user_agent"));
        assert!(!is_string_env_key("UNMARK__SERVER__PORT"));
        assert!(!is_string_env_key("UNMARK__VENDOR__UPLOAD_BY_URL"));
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Torino")), ("REGION", Some("PIE"))], || {
            let mut v = json!(["hello-$CITY", { "loc": "${CITY}-${REGION}" }, 42, null]);
            expand_env_in_value(&mut v);
            assert_eq!(v, json!(["hello-Torino", { "loc": "Torino-PIE" }, 42, null]));
        });
    }

    #[test]
    fn expands_recursively_and_stops_on_cycles() {
        temp_env::with_vars(
            [
                ("INNER", Some("core")),
                ("OUTER", Some("shell-${INNER}")),
                ("LOOP_A", Some("${LOOP_B}")),
                ("LOOP_B", Some("${LOOP_A}")),
            ],
            || {
                assert_eq!(expand_env_str("x=${OUTER}"), "x=shell-core");
                let looped = expand_env_str("${LOOP_A}");
                assert!(looped.contains("${"));
            },
        );
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        assert_eq!(expand_env_str("k=${UNMARK_NOT_SET_ANYWHERE}"), "k=${UNMARK_NOT_SET_ANYWHERE}");
    }

    #[test]
    fn defaults_cover_every_section() {
        let cfg = UnmarkConfigLoader::new().without_env().load().unwrap();
        assert_eq!(cfg.server.port, 10000);
        assert_eq!(cfg.scraper.cdn_prefix, DEFAULT_CDN_PREFIX);
        assert_eq!(cfg.scraper.page_retries, 3);
        assert_eq!(cfg.jobs.ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.logging.format, LogFormat::Text);
    }

    #[test]
    fn passthrough_needs_no_key() {
        let cfg = UnmarkConfigLoader::new()
            .without_env()
            .with_yaml_str("vendor:\n  provider: passthrough")
            .load()
            .unwrap();
        assert_eq!(cfg.vendor.provider(), "passthrough");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unresolved_placeholder_key() {
        let cfg = UnmarkConfigLoader::new()
            .without_env()
            .with_yaml_str("vendor:\n  provider: unwatermark\n  api_key: '${UNMARK_TEST_MISSING_KEY}'")
            .load()
            .unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unset environment variable"));
    }

    #[test]
    fn rejects_zero_max_images_and_relative_prefix() {
        let mut cfg = UnmarkConfigLoader::new()
            .without_env()
            .with_yaml_str("vendor:\n  provider: passthrough\nscraper:\n  max_images: 0")
            .load()
            .unwrap();
        assert!(cfg.validate().is_err());

        cfg.scraper.max_images = 3;
        cfg.scraper.cdn_prefix = "/dealer/images/".into();
        assert!(cfg.validate().is_err());
    }
}
