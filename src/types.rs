use crate::error::{Result, WatcherError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field added to the forwarded raw listing naming the search term that matched it.
pub const SEARCH_TERM_FIELD: &str = "search_term";

/// 广告 ID，接口可能返回字符串或数字
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingId::Number(n) => write!(f, "{}", n),
            ListingId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        ListingId::Text(value.to_string())
    }
}

impl From<i64> for ListingId {
    fn from(value: i64) -> Self {
        ListingId::Number(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(rename = "largeUrl")]
    pub large_url: Option<String>,

    #[serde(rename = "mediumUrl")]
    pub medium_url: Option<String>,
}

/// 搜索接口的响应体，只关心 `listings` 数组
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub listings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ListingFields {
    #[serde(rename = "itemId")]
    item_id: Option<ListingId>,

    title: Option<String>,

    description: Option<String>,

    #[serde(rename = "vipUrl")]
    vip_url: Option<String>,

    pictures: Option<Vec<Picture>>,
}

/// 一条广告。字段只读，原始 JSON 对象原样保留以便转发。
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub item_id: ListingId,
    pub title: String,
    pub description: Option<String>,
    pub vip_url: String,
    pub pictures: Vec<Picture>,
    raw: Map<String, Value>,
}

impl Listing {
    /// 从接口返回的单条原始 JSON 构建广告
    pub fn from_raw(raw: Value) -> Result<Self> {
        let Value::Object(object) = raw else {
            return Err(WatcherError::InvalidResponse(
                "listing entry is not a JSON object".to_string(),
            ));
        };

        let fields: ListingFields = serde_json::from_value(Value::Object(object.clone()))?;
        let item_id = fields
            .item_id
            .ok_or_else(|| WatcherError::InvalidResponse("listing without itemId".to_string()))?;

        Ok(Self {
            item_id,
            title: fields.title.unwrap_or_default(),
            description: fields.description,
            vip_url: fields.vip_url.unwrap_or_default(),
            pictures: fields.pictures.unwrap_or_default(),
            raw: object,
        })
    }

    /// `needle` must already be lower-cased.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(needle)
    }

    /// 首张图片的大图，没有则取中图
    pub fn image_url(&self) -> Option<&str> {
        let first = self.pictures.first()?;
        first
            .large_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| first.medium_url.as_deref().filter(|url| !url.is_empty()))
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Copy of the raw listing with the triggering term attached.
    pub fn annotated(&self, term: &str) -> Value {
        let mut copy = self.raw.clone();
        copy.insert(SEARCH_TERM_FIELD.to_string(), Value::String(term.to_string()));
        Value::Object(copy)
    }
}
