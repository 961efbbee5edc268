use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("API 请求失败: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("文件读写错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("无效的响应数据: {0}")]
    InvalidResponse(String),

    #[error("Webhook 拒绝请求 [{status}]: {body}")]
    WebhookRejected { status: u16, body: String },

    #[error("未配置 Webhook 地址")]
    MissingWebhook,

    #[error("配置错误: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
