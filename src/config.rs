use crate::api::PAGE_LIMIT;
use crate::error::{Result, WatcherError};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SITE_ORIGIN: &str = "https://www.marktplaats.nl";
pub const DEFAULT_KEYWORDS_FILE: &str = "zoekwoorden.txt";
pub const DEFAULT_SEEN_FILE: &str = "seen.json";

/// 进程级配置，启动时从环境变量读取一次
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub keywords_file: PathBuf,
    pub seen_file: PathBuf,
    pub webhook_url: Option<String>,
    pub site_origin: String,
    pub poll_interval: Duration,
    pub config_retry_interval: Duration,
    pub search_timeout: Duration,
    pub notify_timeout: Duration,
    pub seen_max_per_term: Option<usize>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keywords_file: PathBuf::from(DEFAULT_KEYWORDS_FILE),
            seen_file: PathBuf::from(DEFAULT_SEEN_FILE),
            webhook_url: None,
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
            poll_interval: Duration::from_secs(60),
            config_retry_interval: Duration::from_secs(60),
            search_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(10),
            seen_max_per_term: None,
            log_file: None,
        }
    }
}

impl Config {
    /// 从进程环境变量读取配置（调用前应先加载 `.env`）
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数构建配置，未设置或为空的变量使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            keywords_file: get("KEYWORDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.keywords_file),
            seen_file: get("SEEN_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.seen_file),
            webhook_url: get("WEBHOOK_URL"),
            site_origin: get("SITE_ORIGIN")
                .map(|origin| origin.trim_end_matches('/').to_string())
                .unwrap_or(defaults.site_origin),
            poll_interval: secs(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.poll_interval),
            config_retry_interval: secs(get("CONFIG_RETRY_SECS"), "CONFIG_RETRY_SECS")?
                .unwrap_or(defaults.config_retry_interval),
            search_timeout: secs(get("SEARCH_TIMEOUT_SECS"), "SEARCH_TIMEOUT_SECS")?
                .unwrap_or(defaults.search_timeout),
            notify_timeout: secs(get("NOTIFY_TIMEOUT_SECS"), "NOTIFY_TIMEOUT_SECS")?
                .unwrap_or(defaults.notify_timeout),
            seen_max_per_term: seen_cap(get("SEEN_MAX_PER_TERM"))?,
            log_file: get("LOG_FILE").map(PathBuf::from),
        })
    }
}

fn parse<T: FromStr>(value: Option<String>, key: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| WatcherError::ConfigError(format!("{} 不是有效的数字: {}", key, raw)))
        })
        .transpose()
}

/// A cap below one result page would evict ids the next search returns again.
fn seen_cap(value: Option<String>) -> Result<Option<usize>> {
    match parse::<usize>(value, "SEEN_MAX_PER_TERM")? {
        Some(cap) if cap < PAGE_LIMIT => Err(WatcherError::ConfigError(format!(
            "SEEN_MAX_PER_TERM 不能小于每页条数 {}: {}",
            PAGE_LIMIT, cap
        ))),
        cap => Ok(cap),
    }
}

fn secs(value: Option<String>, key: &str) -> Result<Option<Duration>> {
    Ok(parse::<u64>(value, key)?.map(Duration::from_secs))
}

/// One term per line; surrounding whitespace trimmed, blank lines dropped.
pub fn parse_terms(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 读取关键词文件。文件不存在时返回 `NotFound` 的 IO 错误，由调用方决定等待重试。
pub async fn read_terms(path: &Path) -> std::io::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_terms(&content))
}
