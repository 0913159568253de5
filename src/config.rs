use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::capture::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TARGET_SAMPLES};
use crate::focus::DEFAULT_SHARPNESS_THRESHOLD;

pub const CONFIG_ENV: &str = "SNAPWATCH_CONFIG";

const DEFAULT_TARGET_LABEL: &str = "bird";
const DEFAULT_DEBOUNCE_SECS: f64 = 10.0;
const DEFAULT_SAMPLE_SPACING_MS: u64 = 200;
const DEFAULT_FILE_PREFIX: &str = "bird_detected";
const DEFAULT_CAPTURE_DIR: &str = ".";
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_SUBJECT_LABEL: &str = "Bird";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SnapwatchConfigFile {
    capture: Option<CaptureConfigFile>,
    dispatch: Option<DispatchConfigFile>,
    smtp: Option<SmtpConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    target_label: Option<String>,
    debounce_secs: Option<f64>,
    max_attempts: Option<u32>,
    target_samples: Option<usize>,
    sample_spacing_ms: Option<u64>,
    sharpness_threshold: Option<f64>,
    file_prefix: Option<String>,
    output_dir: Option<PathBuf>,
    source_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DispatchConfigFile {
    watch_dir: Option<PathBuf>,
    file_prefix: Option<String>,
    poll_secs: Option<u64>,
    batch_size: Option<usize>,
    subject_label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SmtpConfigFile {
    host: Option<String>,
    port: Option<u16>,
    tls: Option<String>,
    username: Option<String>,
    password: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// Settings for both processes. Each binary reads only its own sections.
#[derive(Debug, Clone, Default)]
pub struct SnapwatchConfig {
    pub capture: CaptureConfig,
    pub dispatch: DispatchConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub target_label: String,
    pub debounce: Duration,
    pub max_attempts: u32,
    pub target_samples: usize,
    pub sample_spacing: Duration,
    pub sharpness_threshold: f64,
    pub file_prefix: String,
    pub output_dir: PathBuf,
    pub source_url: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_label: DEFAULT_TARGET_LABEL.to_string(),
            debounce: Duration::from_secs_f64(DEFAULT_DEBOUNCE_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            target_samples: DEFAULT_TARGET_SAMPLES,
            sample_spacing: Duration::from_millis(DEFAULT_SAMPLE_SPACING_MS),
            sharpness_threshold: DEFAULT_SHARPNESS_THRESHOLD,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            output_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            source_url: DEFAULT_SOURCE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub watch_dir: PathBuf,
    pub file_prefix: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// Capitalised label used in notification subjects.
    pub subject_label: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            subject_label: DEFAULT_SUBJECT_LABEL.to_string(),
        }
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpTls {
    /// Implicit TLS from the first byte (port 465).
    #[default]
    Wrapper,
    StartTls,
    /// Plaintext; only for local test relays.
    None,
}

impl FromStr for SmtpTls {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" | "wrapper" => Ok(Self::Wrapper),
            "starttls" => Ok(Self::StartTls),
            "none" | "plain" => Ok(Self::None),
            other => Err(anyhow!(
                "unknown smtp tls mode '{}' (expected tls, starttls or none)",
                other
            )),
        }
    }
}

impl fmt::Display for SmtpTls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wrapper => "tls",
            Self::StartTls => "starttls",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            tls: SmtpTls::default(),
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl SnapwatchConfig {
    /// File (if `SNAPWATCH_CONFIG` is set), then `SNAPWATCH_*` overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let file_cfg = file_cfg.unwrap_or_default();
        let explicit_subject = file_cfg
            .dispatch
            .as_ref()
            .is_some_and(|dispatch| dispatch.subject_label.is_some());
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        // A derived subject follows the final target label, env overrides included.
        if !explicit_subject {
            cfg.dispatch.subject_label = subject_label_for(&cfg.capture.target_label);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SnapwatchConfigFile) -> Result<Self> {
        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureConfig {
            target_label: capture_file
                .target_label
                .unwrap_or_else(|| DEFAULT_TARGET_LABEL.to_string()),
            debounce: seconds_f64(
                "capture.debounce_secs",
                capture_file.debounce_secs.unwrap_or(DEFAULT_DEBOUNCE_SECS),
            )?,
            max_attempts: capture_file.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            target_samples: capture_file
                .target_samples
                .unwrap_or(DEFAULT_TARGET_SAMPLES),
            sample_spacing: Duration::from_millis(
                capture_file
                    .sample_spacing_ms
                    .unwrap_or(DEFAULT_SAMPLE_SPACING_MS),
            ),
            sharpness_threshold: capture_file
                .sharpness_threshold
                .unwrap_or(DEFAULT_SHARPNESS_THRESHOLD),
            file_prefix: capture_file
                .file_prefix
                .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string()),
            output_dir: capture_file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            source_url: capture_file
                .source_url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
        };

        let dispatch_file = file.dispatch.unwrap_or_default();
        let dispatch = DispatchConfig {
            watch_dir: dispatch_file
                .watch_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            // Unless told otherwise, the dispatcher watches for what the capture side writes.
            file_prefix: dispatch_file
                .file_prefix
                .unwrap_or_else(|| capture.file_prefix.clone()),
            poll_interval: Duration::from_secs(
                dispatch_file.poll_secs.unwrap_or(DEFAULT_POLL_SECS),
            ),
            batch_size: dispatch_file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            subject_label: dispatch_file
                .subject_label
                .unwrap_or_else(|| subject_label_for(&capture.target_label)),
        };

        let smtp_file = file.smtp.unwrap_or_default();
        let smtp = SmtpConfig {
            host: smtp_file
                .host
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: smtp_file.port.unwrap_or(DEFAULT_SMTP_PORT),
            tls: match smtp_file.tls.as_deref() {
                Some(mode) => mode.parse()?,
                None => SmtpTls::default(),
            },
            username: smtp_file.username,
            password: smtp_file.password,
            from: smtp_file.from,
            to: smtp_file.to,
        };

        Ok(Self {
            capture,
            dispatch,
            smtp,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_value("SNAPWATCH_SOURCE_URL") {
            self.capture.source_url = url;
        }
        if let Some(dir) = env_value("SNAPWATCH_OUTPUT_DIR") {
            self.capture.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_value("SNAPWATCH_WATCH_DIR") {
            self.dispatch.watch_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = env_value("SNAPWATCH_FILE_PREFIX") {
            self.capture.file_prefix = prefix.clone();
            self.dispatch.file_prefix = prefix;
        }
        if let Some(label) = env_value("SNAPWATCH_TARGET_LABEL") {
            self.capture.target_label = label;
        }
        if let Some(threshold) = env_value("SNAPWATCH_SHARPNESS_THRESHOLD") {
            self.capture.sharpness_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("SNAPWATCH_SHARPNESS_THRESHOLD must be a number"))?;
        }
        if let Some(secs) = env_value("SNAPWATCH_DEBOUNCE_SECS") {
            let secs: f64 = secs
                .parse()
                .map_err(|_| anyhow!("SNAPWATCH_DEBOUNCE_SECS must be a number of seconds"))?;
            self.capture.debounce = seconds_f64("SNAPWATCH_DEBOUNCE_SECS", secs)?;
        }
        if let Some(size) = env_value("SNAPWATCH_BATCH_SIZE") {
            self.dispatch.batch_size = size
                .parse()
                .map_err(|_| anyhow!("SNAPWATCH_BATCH_SIZE must be a positive integer"))?;
        }
        if let Some(secs) = env_value("SNAPWATCH_POLL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| anyhow!("SNAPWATCH_POLL_SECS must be an integer number of seconds"))?;
            self.dispatch.poll_interval = Duration::from_secs(secs);
        }
        if let Some(host) = env_value("SNAPWATCH_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(port) = env_value("SNAPWATCH_SMTP_PORT") {
            self.smtp.port = port
                .parse()
                .map_err(|_| anyhow!("SNAPWATCH_SMTP_PORT must be a port number"))?;
        }
        if let Some(tls) = env_value("SNAPWATCH_SMTP_TLS") {
            self.smtp.tls = tls.parse()?;
        }
        if let Some(username) = env_value("SNAPWATCH_SMTP_USERNAME") {
            self.smtp.username = Some(username);
        }
        if let Some(password) = env_value("SNAPWATCH_SMTP_PASSWORD") {
            self.smtp.password = Some(password);
        }
        if let Some(from) = env_value("SNAPWATCH_SMTP_FROM") {
            self.smtp.from = Some(from);
        }
        if let Some(to) = env_value("SNAPWATCH_SMTP_TO") {
            self.smtp.to = Some(to);
        }
        Ok(())
    }

    /// Check invariants. Binaries call this again after applying CLI overrides.
    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if capture.target_label.trim().is_empty() {
            return Err(anyhow!("capture.target_label must not be empty"));
        }
        if capture.max_attempts == 0 {
            return Err(anyhow!("capture.max_attempts must be greater than zero"));
        }
        if capture.target_samples == 0 {
            return Err(anyhow!("capture.target_samples must be greater than zero"));
        }
        if !capture.sharpness_threshold.is_finite() || capture.sharpness_threshold < 0.0 {
            return Err(anyhow!(
                "capture.sharpness_threshold must be a non-negative number"
            ));
        }
        if capture.source_url.trim().is_empty() {
            return Err(anyhow!("capture.source_url must not be empty"));
        }
        crate::storage::CaptureNaming::new(&capture.file_prefix)?;

        let dispatch = &self.dispatch;
        if dispatch.batch_size == 0 {
            return Err(anyhow!("dispatch.batch_size must be greater than zero"));
        }
        if dispatch.poll_interval.is_zero() {
            return Err(anyhow!("dispatch.poll_secs must be greater than zero"));
        }
        crate::storage::CaptureNaming::new(&dispatch.file_prefix)?;

        if self.smtp.host.trim().is_empty() {
            return Err(anyhow!("smtp.host must not be empty"));
        }
        if self.smtp.port == 0 {
            return Err(anyhow!("smtp.port must not be zero"));
        }
        Ok(())
    }
}

/// "bird" -> "Bird".
pub fn subject_label_for(target_label: &str) -> String {
    let mut chars = target_label.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn seconds_f64(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| anyhow!("{} must be a non-negative number of seconds: {}", field, e))
}

fn read_config_file(path: &Path) -> Result<SnapwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SnapwatchConfig::from_file(SnapwatchConfigFile::default()).unwrap();
        assert_eq!(cfg.capture.target_label, "bird");
        assert_eq!(cfg.capture.debounce, Duration::from_secs(10));
        assert_eq!(cfg.capture.max_attempts, 10);
        assert_eq!(cfg.capture.target_samples, 5);
        assert_eq!(cfg.capture.sample_spacing, Duration::from_millis(200));
        assert_eq!(cfg.capture.sharpness_threshold, 2000.0);
        assert_eq!(cfg.dispatch.batch_size, 5);
        assert_eq!(cfg.dispatch.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.dispatch.subject_label, "Bird");
        assert_eq!(cfg.smtp.port, 465);
        assert_eq!(cfg.smtp.tls, SmtpTls::Wrapper);
        cfg.validate().unwrap();
    }

    #[test]
    fn dispatch_prefix_follows_capture_prefix() {
        let file: SnapwatchConfigFile = toml::from_str(
            r#"
            [capture]
            file_prefix = "cat_detected"
            target_label = "cat"
            "#,
        )
        .unwrap();
        let cfg = SnapwatchConfig::from_file(file).unwrap();
        assert_eq!(cfg.dispatch.file_prefix, "cat_detected");
        assert_eq!(cfg.dispatch.subject_label, "Cat");
    }

    #[test]
    fn tls_modes_parse() {
        assert_eq!("TLS".parse::<SmtpTls>().unwrap(), SmtpTls::Wrapper);
        assert_eq!("starttls".parse::<SmtpTls>().unwrap(), SmtpTls::StartTls);
        assert_eq!("none".parse::<SmtpTls>().unwrap(), SmtpTls::None);
        assert!("ssl3".parse::<SmtpTls>().is_err());
        assert_eq!(SmtpTls::StartTls.to_string(), "starttls");
    }

    #[test]
    fn validate_rejects_zero_limits() {
        SnapwatchConfig::default().validate().unwrap();

        let mut cfg = SnapwatchConfig::default();
        cfg.capture.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SnapwatchConfig::default();
        cfg.dispatch.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let smtp = SmtpConfig {
            password: Some("hunter2".to_string()),
            ..SmtpConfig::default()
        };
        assert!(!format!("{:?}", smtp).contains("hunter2"));
    }
}
