use crate::error::{Result, WatcherError};
use crate::types::{Listing, SearchResponse};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use std::time::Duration;

const SEARCH_PATH: &str = "/lrp/api/search";
const USER_AGENT: &str = "Mozilla/5.0";

/// 每个关键词只取第一页
pub const PAGE_LIMIT: usize = 50;

/// 广告来源：按关键词返回第一页候选广告
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<Listing>>;
}

pub struct MarktplaatsClient {
    client: Client,
    origin: String,
}

impl MarktplaatsClient {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn search_url(&self, term: &str) -> String {
        format!(
            "{}{}?query={}&offset=0&limit={}",
            self.origin,
            SEARCH_PATH,
            encode_query_term(term),
            PAGE_LIMIT
        )
    }
}

#[async_trait]
impl ListingSource for MarktplaatsClient {
    async fn search(&self, term: &str) -> Result<Vec<Listing>> {
        let url = self.search_url(term);

        debug!("请求搜索结果: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("API 请求失败 [{}]: {}", status, text);
            return Err(WatcherError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let body = response.text().await?;
        let listings = parse_listings(&body)?;

        debug!("[{}] 获取到 {} 条广告", term, listings.len());

        Ok(listings)
    }
}

/// 接口的 query 参数只把空格编码为 `%20`，另外转义会破坏查询串的字符
pub fn encode_query_term(term: &str) -> String {
    let mut encoded = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            ' ' => encoded.push_str("%20"),
            '%' => encoded.push_str("%25"),
            '&' => encoded.push_str("%26"),
            '#' => encoded.push_str("%23"),
            '+' => encoded.push_str("%2B"),
            '?' => encoded.push_str("%3F"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// 解析响应体。缺少 `itemId` 的条目无法去重，跳过并记录警告。
pub fn parse_listings(body: &str) -> Result<Vec<Listing>> {
    let response: SearchResponse = serde_json::from_str(body)?;

    let listings = response
        .listings
        .into_iter()
        .take(PAGE_LIMIT)
        .filter_map(|raw| match Listing::from_raw(raw) {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!("跳过无法识别的广告: {}", e);
                None
            }
        })
        .collect();

    Ok(listings)
}

/// Keep only listings whose title or description contains the term, ignoring case.
pub fn filter_matches(term: &str, listings: Vec<Listing>) -> Vec<Listing> {
    let needle = term.to_lowercase();
    listings
        .into_iter()
        .filter(|listing| listing.matches(&needle))
        .collect()
}
