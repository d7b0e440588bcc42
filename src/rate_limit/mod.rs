// 滑动窗口限流
// 按 (客户端, 接口路径) 记录最近请求时间，超过 limit 的请求直接拒绝

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// 限流规则，启动后不可修改
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// 每个窗口内允许的最大请求数
    pub limit: usize,
    /// 窗口长度
    pub period: Duration,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            limit: 100,
            period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub client_id: String,
    pub endpoint: String,
}

impl RateLimitKey {
    pub fn new(client_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// 单个 key 的请求时间戳，按时间升序
#[derive(Debug, Default)]
struct RateLimitWindow {
    hits: VecDeque<Instant>,
}

impl RateLimitWindow {
    /// 删除严格早于 now - period 的记录
    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) > period {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit(&mut self, now: Instant, rule: &RateLimitRule) -> bool {
        self.prune(now, rule.period);
        if self.hits.len() >= rule.limit {
            return false;
        }
        self.hits.push_back(now);
        true
    }
}

/// 进程内共享的滑动窗口限流器
///
/// 每个 key 的“清理-检查-记录”在 DashMap 分片写锁内完成，
/// 并发请求不会同时看到 count < limit 而一起越过限制。
///
/// key 创建后默认永不删除（只清空时间戳）。设置 `max_keys` 后，
/// 新 key 使表超出上限时会清除窗口已为空的 key，每个 period 至多扫描一次。
pub struct SlidingWindowLimiter {
    rule: RateLimitRule,
    max_keys: Option<usize>,
    windows: DashMap<RateLimitKey, RateLimitWindow>,
    last_sweep: Mutex<Option<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            max_keys: None,
            windows: DashMap::new(),
            last_sweep: Mutex::new(None),
        }
    }

    /// 限制跟踪的 key 数量，0 表示不限制
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = (max_keys > 0).then_some(max_keys);
        self
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    pub fn is_allowed(&self, client_id: &str, endpoint: &str) -> bool {
        self.check(RateLimitKey::new(client_id, endpoint), Instant::now)
    }

    /// 以指定时间判定，用于测试
    pub fn is_allowed_at(&self, client_id: &str, endpoint: &str, now: Instant) -> bool {
        self.check(RateLimitKey::new(client_id, endpoint), || now)
    }

    fn check(&self, key: RateLimitKey, now: impl Fn() -> Instant) -> bool {
        if let Some(max_keys) = self.max_keys {
            if self.windows.len() >= max_keys && !self.windows.contains_key(&key) {
                self.sweep_when_due(now());
            }
        }

        let mut window = self.windows.entry(key).or_default();
        // 在持有锁之后取时间，保证同一 key 的时间戳单调
        window.admit(now(), &self.rule)
    }

    /// 上次扫描不足一个 period 时跳过，表满且都活跃时不会每次都全表扫描
    fn sweep_when_due(&self, now: Instant) {
        {
            let mut last = self
                .last_sweep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|at| now.saturating_duration_since(at) < self.rule.period) {
                return;
            }
            *last = Some(now);
        }
        self.sweep_idle(now);
    }

    /// 清除窗口内已无有效记录的 key，返回清除数量
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let period = self.rule.period;
        self.windows.retain(|_, window| {
            window.prune(now, period);
            !window.hits.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!("Swept {} idle rate limit keys", removed);
        }
        removed
    }

    /// 当前跟踪的 key 数量
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn limiter(limit: usize, period_secs: u64) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(RateLimitRule {
            limit,
            period: Duration::from_secs(period_secs),
        })
    }

    #[test]
    fn denies_after_limit_and_recovers_after_period() {
        let limiter = limiter(3, 60);
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.is_allowed_at("a", "/x", start + Duration::from_secs(i)));
        }
        assert!(!limiter.is_allowed_at("a", "/x", start + Duration::from_secs(10)));
        assert!(!limiter.is_allowed_at("a", "/x", start + Duration::from_secs(60)));
        assert!(limiter.is_allowed_at("a", "/x", start + Duration::from_secs(61)));
    }

    #[test]
    fn entry_exactly_period_old_still_counts() {
        let limiter = limiter(1, 60);
        let start = Instant::now();

        assert!(limiter.is_allowed_at("a", "/x", start));
        assert!(!limiter.is_allowed_at("a", "/x", start + Duration::from_secs(60)));
        assert!(limiter.is_allowed_at("a", "/x", start + Duration::from_millis(60_001)));
    }

    #[test]
    fn denied_attempts_do_not_extend_the_window() {
        let limiter = limiter(2, 10);
        let start = Instant::now();

        assert!(limiter.is_allowed_at("a", "/x", start));
        assert!(limiter.is_allowed_at("a", "/x", start + Duration::from_secs(5)));
        for s in 6..10 {
            assert!(!limiter.is_allowed_at("a", "/x", start + Duration::from_secs(s)));
        }
        // 第一条过期后只空出一个名额
        assert!(limiter.is_allowed_at("a", "/x", start + Duration::from_secs(11)));
        assert!(!limiter.is_allowed_at("a", "/x", start + Duration::from_secs(12)));
    }

    #[test]
    fn keys_are_isolated_by_client_and_endpoint() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.is_allowed_at("clientA", "/x", now));
        assert!(!limiter.is_allowed_at("clientA", "/x", now));
        assert!(limiter.is_allowed_at("clientB", "/x", now));
        assert!(limiter.is_allowed_at("clientA", "/y", now));
        assert!(limiter.is_allowed_at("unknown", "/x", now));
    }

    #[test]
    fn keys_are_retained_after_windows_empty_by_default() {
        let limiter = limiter(5, 1);
        let start = Instant::now();

        for i in 0..50 {
            assert!(limiter.is_allowed_at(&format!("10.0.0.{}", i), "/x", start));
        }
        let later = start + Duration::from_secs(30);
        assert!(limiter.is_allowed_at("10.0.0.200", "/x", later));
        assert_eq!(limiter.tracked_keys(), 51);
    }

    #[test]
    fn capped_table_sweeps_only_idle_keys() {
        let limiter = limiter(5, 10).with_max_keys(3);
        let start = Instant::now();

        assert!(limiter.is_allowed_at("old-1", "/x", start));
        assert!(limiter.is_allowed_at("old-2", "/x", start));
        assert!(limiter.is_allowed_at("busy", "/x", start + Duration::from_secs(15)));
        assert_eq!(limiter.tracked_keys(), 3);

        assert!(limiter.is_allowed_at("new", "/x", start + Duration::from_secs(16)));
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.sweep_idle(start + Duration::from_secs(16)), 0);
    }

    #[test]
    fn full_busy_table_is_not_rescanned_for_every_new_key() {
        let limiter = limiter(5, 10).with_max_keys(2);
        let start = Instant::now();

        assert!(limiter.is_allowed_at("a", "/x", start));
        assert!(limiter.is_allowed_at("b", "/x", start + Duration::from_secs(5)));
        // 表已满且都活跃：扫描一次，什么也没清掉
        assert!(limiter.is_allowed_at("c", "/x", start + Duration::from_secs(6)));
        assert_eq!(limiter.tracked_keys(), 3);

        // "a" 已空闲，但距上次扫描不足一个 period，不再扫描
        assert!(limiter.is_allowed_at("d", "/x", start + Duration::from_secs(11)));
        assert_eq!(limiter.tracked_keys(), 4);

        // 满一个 period 后再次扫描，清除 "a" 和 "b"
        assert!(limiter.is_allowed_at("e", "/x", start + Duration::from_secs(16)));
        assert_eq!(limiter.tracked_keys(), 3);
    }

    #[test]
    fn concurrent_callers_admit_exactly_limit() {
        const THREADS: usize = 64;
        const LIMIT: usize = 10;

        for _ in 0..20 {
            let limiter = Arc::new(limiter(LIMIT, 60));
            let barrier = Arc::new(Barrier::new(THREADS));

            let admitted: usize = (0..THREADS)
                .map(|_| {
                    let limiter = limiter.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        limiter.is_allowed("shared", "/calc")
                    })
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|allowed| *allowed)
                .count();

            assert_eq!(admitted, LIMIT);
        }
    }
}
