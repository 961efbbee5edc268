use crate::api::{filter_matches, ListingSource, PAGE_LIMIT};
use crate::config::read_terms;
use crate::error::WatcherError;
use crate::notify::{ListingAlert, Notifier};
use crate::storage::{SeenSet, SeenStore};
use crate::types::Listing;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOutcome {
    Searched { matched: usize, new: usize },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermReport {
    pub term: String,
    pub outcome: TermOutcome,
}

/// 一轮扫描的结果汇总
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub terms: Vec<TermReport>,
    pub delivered: usize,
    pub delivery_failed: usize,
    pub delivery_skipped: usize,
    pub evicted: usize,
    pub save_error: Option<String>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            terms: Vec::new(),
            delivered: 0,
            delivery_failed: 0,
            delivery_skipped: 0,
            evicted: 0,
            save_error: None,
        }
    }

    pub fn new_listings(&self) -> usize {
        self.terms
            .iter()
            .map(|t| match t.outcome {
                TermOutcome::Searched { new, .. } => new,
                TermOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failed_terms(&self) -> Vec<&str> {
        self.terms
            .iter()
            .filter(|t| matches!(t.outcome, TermOutcome::Failed(_)))
            .map(|t| t.term.as_str())
            .collect()
    }

    pub fn notifications_attempted(&self) -> usize {
        self.delivered + self.delivery_failed
    }
}

pub struct ListingScanner {
    source: Arc<dyn ListingSource>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn SeenStore>,
    site_origin: String,
    seen_max_per_term: Option<usize>,
}

impl ListingScanner {
    pub fn new(
        source: Arc<dyn ListingSource>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn SeenStore>,
        site_origin: impl Into<String>,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            site_origin: site_origin.into(),
            seen_max_per_term: None,
        }
    }

    /// 限制每个关键词保留的广告 ID 数量，超出时丢弃最早的记录。
    /// 上限不会低于一页的条数，否则仍在结果中的广告会被重复通知。
    pub fn with_seen_cap(mut self, cap: Option<usize>) -> Self {
        self.seen_max_per_term = cap.map(|cap| {
            if cap < PAGE_LIMIT {
                warn!("记录上限 {} 小于每页条数，改为 {}", cap, PAGE_LIMIT);
            }
            cap.max(PAGE_LIMIT)
        });
        self
    }

    /// 完整的一轮：加载历史、扫描全部关键词、整体写回
    pub async fn run_cycle(&self, terms: &[String]) -> CycleReport {
        let mut seen = self.store.load().await;
        info!(
            "已加载历史记录 ({} 个关键词): {} 条广告",
            seen.term_count(),
            seen.total_ids()
        );

        let mut report = self.scan_terms(terms, &mut seen).await;

        if let Some(cap) = self.seen_max_per_term {
            report.evicted = seen.enforce_cap(cap);
            if report.evicted > 0 {
                debug!("超出上限，移除 {} 条最早的记录", report.evicted);
            }
        }

        if let Err(e) = self.store.save(&seen).await {
            error!("保存历史记录失败: {}", e);
            report.save_error = Some(e.to_string());
        }

        info!(
            "本轮扫描完成 ({} ms): {} 条新广告, {} 条通知成功, {} 条失败, {} 条跳过",
            (Utc::now() - report.started_at).num_milliseconds(),
            report.new_listings(),
            report.delivered,
            report.delivery_failed,
            report.delivery_skipped
        );

        report
    }

    /// 按配置顺序扫描所有关键词，只修改内存中的 `seen`
    pub async fn scan_terms(&self, terms: &[String], seen: &mut SeenSet) -> CycleReport {
        let mut report = CycleReport::new();

        for term in terms {
            info!("🔎 搜索: {}", term);
            seen.ensure_term(term);

            let outcome = match self.source.search(term).await {
                Ok(candidates) => self.process_term(term, candidates, seen, &mut report).await,
                Err(e) => {
                    match &e {
                        WatcherError::ApiError(_) | WatcherError::InvalidResponse(_) => {
                            error!("❌ 网络错误，获取 '{}' 的广告失败: {}", term, e)
                        }
                        WatcherError::JsonError(_) => {
                            error!("❌ 解析 '{}' 的响应失败: {}", term, e)
                        }
                        _ => error!("❌ 处理 '{}' 时发生错误: {}", term, e),
                    }
                    TermOutcome::Failed(e.to_string())
                }
            };

            report.terms.push(TermReport {
                term: term.clone(),
                outcome,
            });
        }

        report
    }

    async fn process_term(
        &self,
        term: &str,
        candidates: Vec<Listing>,
        seen: &mut SeenSet,
        report: &mut CycleReport,
    ) -> TermOutcome {
        let matches = filter_matches(term, candidates);
        let matched = matches.len();
        let mut new = 0;

        for listing in matches {
            // 先标记再通知：宁可漏发，不重复发送
            if !seen.mark(term, listing.item_id.clone()) {
                if self.seen_max_per_term.is_some() {
                    seen.refresh(term, &listing.item_id);
                }
                continue;
            }
            new += 1;
            info!("✨ 新广告: {}", listing.title);

            let alert = ListingAlert::new(&listing, term, &self.site_origin);
            match self.notifier.notify(&alert).await {
                Ok(()) => report.delivered += 1,
                Err(WatcherError::MissingWebhook) => {
                    warn!("未配置 Webhook，跳过通知: {}", listing.title);
                    report.delivery_skipped += 1;
                }
                Err(e) => {
                    error!("❌ 通知发送失败 [{}]: {}", listing.item_id, e);
                    report.delivery_failed += 1;
                }
            }
        }

        debug!("[{}] {} 条匹配, {} 条新广告", term, matched, new);
        TermOutcome::Searched { matched, new }
    }
}

/// 关键词配置不可用的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    Missing,
    Empty,
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    AwaitingConfig(ConfigProblem),
    Polling(Vec<String>),
    Stopped,
}

/// 按固定间隔循环执行扫描，每轮重新读取关键词文件
pub struct Scheduler {
    scanner: ListingScanner,
    keywords_file: PathBuf,
    poll_interval: Duration,
    retry_interval: Duration,
}

impl Scheduler {
    pub fn new(scanner: ListingScanner, keywords_file: impl Into<PathBuf>) -> Self {
        Self {
            scanner,
            keywords_file: keywords_file.into(),
            poll_interval: Duration::from_secs(60),
            retry_interval: Duration::from_secs(60),
        }
    }

    pub fn with_intervals(mut self, poll_interval: Duration, retry_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.retry_interval = retry_interval;
        self
    }

    /// Decide what the loop does next. Shutdown wins over everything else.
    pub async fn next_state(&self, shutdown: &watch::Receiver<bool>) -> SchedulerState {
        let stopped = *shutdown.borrow();
        if stopped {
            return SchedulerState::Stopped;
        }

        match read_terms(&self.keywords_file).await {
            Ok(terms) if terms.is_empty() => SchedulerState::AwaitingConfig(ConfigProblem::Empty),
            Ok(terms) => SchedulerState::Polling(terms),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                SchedulerState::AwaitingConfig(ConfigProblem::Missing)
            }
            Err(e) => SchedulerState::AwaitingConfig(ConfigProblem::Unreadable(e.to_string())),
        }
    }

    /// 运行直到收到中断信号，返回完成的扫描轮数。
    /// 中断只在两轮之间生效，不会打断正在进行的扫描。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        info!(
            "开始监控，扫描间隔: {:?}，关键词文件: {}",
            self.poll_interval,
            self.keywords_file.display()
        );

        let mut cycles = 0;

        loop {
            match self.next_state(&shutdown).await {
                SchedulerState::Stopped => {
                    info!("🛑 收到中断信号，停止监控 (共完成 {} 轮扫描)", cycles);
                    return cycles;
                }
                SchedulerState::AwaitingConfig(problem) => {
                    match problem {
                        ConfigProblem::Missing => warn!(
                            "🛑 未找到 '{}'，请创建该文件并添加关键词（每行一个）",
                            self.keywords_file.display()
                        ),
                        ConfigProblem::Empty => warn!(
                            "🛑 '{}' 中没有关键词，等待添加关键词",
                            self.keywords_file.display()
                        ),
                        ConfigProblem::Unreadable(e) => warn!(
                            "🛑 无法读取 '{}': {}",
                            self.keywords_file.display(),
                            e
                        ),
                    }
                    wait(self.retry_interval, &mut shutdown).await;
                }
                SchedulerState::Polling(terms) => {
                    self.scanner.run_cycle(&terms).await;
                    cycles += 1;
                    info!("⏳ 等待下一轮...");
                    wait(self.poll_interval, &mut shutdown).await;
                }
            }
        }
    }
}

/// Sleep for `interval`, returning early if shutdown is requested.
async fn wait(interval: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = shutdown_requested(shutdown) => {}
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let requested = *shutdown.borrow_and_update();
        if requested {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone: nobody can request shutdown any more.
            std::future::pending::<()>().await;
        }
    }
}
