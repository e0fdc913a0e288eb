//! 호스트 로테이션 재시도 정책.
//!
//! 논리적 요청 1건은 다음 예산 안에서만 실행됩니다.
//!
//! - 시도 1회의 타임아웃 (`per_attempt_timeout`)
//! - 요청 전체의 제한 시간 (`total_deadline`)
//! - 최대 시도 횟수 (`max_attempts`, 초기 시도 포함)
//!
//! 백오프는 429 응답 뒤에만 적용되며 지수적으로 증가하되 `max`로 제한됩니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use kodex_exchange::policy::FetchPolicy;
//!
//! let policy = FetchPolicy::fast();
//! assert!(policy.backoff_for(1) >= policy.backoff_for(0));
//! ```

use std::time::Duration;

use kodex_core::{ConfigurationError, MarketDataConfig};

/// 지수 증가 누적 계산 상한.
const MAX_BACKOFF_STEPS: u32 = 1024;

/// 지수 백오프 설정.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// 첫 백오프 대기 시간.
    pub base: Duration,
    /// 시도마다 곱해지는 배수 (>= 1.0).
    pub multiplier: f64,
    /// 최대 대기 시간.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            multiplier: 2.0,
            max: Duration::from_secs(4),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Result<Self, ConfigurationError> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigurationError::invalid(
                "backoff_multiplier",
                format!("must be a finite value >= 1.0, got {}", multiplier),
            ));
        }
        if base > max {
            return Err(ConfigurationError::invalid(
                "backoff_base",
                format!("{:?} exceeds backoff max {:?}", base, max),
            ));
        }
        Ok(Self {
            base,
            multiplier,
            max,
        })
    }

    /// `attempt`번째(0부터) 실패 뒤의 대기 시간: `min(base * multiplier^attempt, max)`.
    ///
    /// 시도 번호에 대해 단조 증가합니다.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let mut secs = self.base.as_secs_f64();

        if self.multiplier > 1.0 {
            // 한 단계씩 곱해야 반올림이 단조성을 깨지 않음
            for _ in 0..attempt.min(MAX_BACKOFF_STEPS) {
                if secs >= max_secs {
                    break;
                }
                secs *= self.multiplier;
            }
        }

        if !secs.is_finite() || secs >= max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs).min(self.max)
        }
    }
}

/// 논리적 요청 1건의 시간/시도 예산.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// 시도 1회 타임아웃.
    pub per_attempt_timeout: Duration,
    /// 요청 전체 제한 시간.
    pub total_deadline: Duration,
    /// 최대 시도 횟수 (초기 시도 포함). 풀 크기로 한 번 더 제한됨.
    pub max_attempts: usize,
    /// 429 뒤 백오프.
    pub backoff: Backoff,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_millis(2500),
            total_deadline: Duration::from_secs(8),
            max_attempts: 5,
            backoff: Backoff::default(),
        }
    }
}

impl FetchPolicy {
    /// 값을 검증하며 정책을 생성합니다.
    pub fn new(
        per_attempt_timeout: Duration,
        total_deadline: Duration,
        max_attempts: usize,
        backoff: Backoff,
    ) -> Result<Self, ConfigurationError> {
        if per_attempt_timeout.is_zero() {
            return Err(ConfigurationError::invalid(
                "per_attempt_timeout",
                "must be positive",
            ));
        }
        if total_deadline.is_zero() {
            return Err(ConfigurationError::invalid(
                "total_deadline",
                "must be positive",
            ));
        }
        if max_attempts == 0 {
            return Err(ConfigurationError::invalid(
                "max_attempts",
                "must allow at least one attempt",
            ));
        }
        Ok(Self {
            per_attempt_timeout,
            total_deadline,
            max_attempts,
            backoff,
        })
    }

    /// 설정에서 정책 생성. `max_retries`는 초기 시도를 제외한 횟수입니다.
    pub fn from_config(config: &MarketDataConfig) -> Result<Self, ConfigurationError> {
        let backoff = Backoff::new(
            config.backoff_base(),
            config.backoff_multiplier,
            config.backoff_max(),
        )?;
        Self::new(
            config.per_attempt_timeout(),
            config.total_deadline(),
            config.max_retries as usize + 1,
            backoff,
        )
    }

    /// 빠른 실패 (대화형 조회용).
    pub fn fast() -> Self {
        Self {
            per_attempt_timeout: Duration::from_secs(1),
            total_deadline: Duration::from_secs(3),
            max_attempts: 3,
            backoff: Backoff {
                base: Duration::from_millis(100),
                multiplier: 2.0,
                max: Duration::from_secs(1),
            },
        }
    }

    /// 느긋한 설정 (배치 수집용).
    pub fn patient() -> Self {
        Self {
            per_attempt_timeout: Duration::from_secs(5),
            total_deadline: Duration::from_secs(30),
            max_attempts: 10,
            backoff: Backoff {
                base: Duration::from_secs(1),
                multiplier: 2.0,
                max: Duration::from_secs(8),
            },
        }
    }

    /// 재시도 없음 (커서 호스트 1회만).
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    pub fn with_total_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = deadline;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// `attempt`번째(0부터) 시도가 429로 실패한 뒤의 대기 시간.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.delay_for(attempt)
    }

    /// 남은 시간을 고려한 이번 시도의 타임아웃.
    pub fn attempt_timeout(&self, remaining: Duration) -> Duration {
        self.per_attempt_timeout.min(remaining)
    }

    /// 남은 시간 안에 들어가는 경우에만 백오프 대기 시간을 돌려줍니다.
    pub fn backoff_within(&self, attempt: u32, remaining: Duration) -> Option<Duration> {
        let delay = self.backoff_for(attempt);
        (delay <= remaining).then_some(delay)
    }

    /// 풀 크기를 반영한 실제 시도 상한.
    pub fn attempts_for_pool(&self, pool_size: usize) -> usize {
        self.max_attempts.min(pool_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_policy() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.per_attempt_timeout, Duration::from_millis(2500));
        assert_eq!(policy.total_deadline, Duration::from_secs(8));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempts_for_pool(3), 3);
        assert_eq!(policy.attempts_for_pool(10), 5);
    }

    #[test]
    fn test_from_config_counts_initial_attempt() {
        let config = MarketDataConfig::default();
        let policy = FetchPolicy::from_config(&config).unwrap();
        assert_eq!(policy.max_attempts, config.max_retries as usize + 1);
        assert_eq!(policy.per_attempt_timeout, config.per_attempt_timeout());
        assert_eq!(policy.backoff.base, config.backoff_base());
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn test_presets() {
        assert_eq!(FetchPolicy::single_attempt().max_attempts, 1);
        assert!(FetchPolicy::fast().total_deadline < FetchPolicy::default().total_deadline);
        assert!(FetchPolicy::patient().max_attempts > FetchPolicy::default().max_attempts);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Backoff::new(Duration::from_millis(10), 0.5, Duration::from_secs(1)).is_err());
        assert!(Backoff::new(Duration::from_secs(2), 2.0, Duration::from_secs(1)).is_err());
        assert!(Backoff::new(Duration::ZERO, f64::NAN, Duration::from_secs(1)).is_err());
        assert!(FetchPolicy::new(Duration::ZERO, Duration::from_secs(1), 1, Backoff::default())
            .is_err());
        assert!(FetchPolicy::new(Duration::from_secs(1), Duration::ZERO, 1, Backoff::default())
            .is_err());
        assert!(FetchPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            0,
            Backoff::default()
        )
        .is_err());
    }

    #[test]
    fn test_attempt_timeout_clipped_by_remaining() {
        let policy = FetchPolicy::default();
        assert_eq!(
            policy.attempt_timeout(Duration::from_millis(700)),
            Duration::from_millis(700)
        );
        assert_eq!(
            policy.attempt_timeout(Duration::from_secs(60)),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_backoff_within_remaining() {
        let policy = FetchPolicy::default();
        assert_eq!(
            policy.backoff_within(0, Duration::from_secs(1)),
            Some(Duration::from_millis(500))
        );
        assert_eq!(policy.backoff_within(2, Duration::from_secs(1)), None);
    }

    proptest! {
        #[test]
        fn prop_backoff_monotonic_and_capped(
            base_ms in 0u64..5_000,
            extra_ms in 0u64..60_000,
            multiplier in 1.0f64..4.0,
            attempt in 0u32..2_000,
        ) {
            let backoff = Backoff::new(
                Duration::from_millis(base_ms),
                multiplier,
                Duration::from_millis(base_ms + extra_ms),
            ).unwrap();

            let current = backoff.delay_for(attempt);
            let next = backoff.delay_for(attempt + 1);
            prop_assert!(current <= next);
            prop_assert!(next <= backoff.max);
        }
    }
}
