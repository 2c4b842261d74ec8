//! 경과 시간 측정 타이머
//!
//! 이름별로 누적되는 tic/toc 타이머. 결과는 `tracing::info!`로 출력합니다.
//!
//! ```no_run
//! use ong_utils::OngTimer;
//!
//! let mut timer = OngTimer::new(true);
//! timer.tic("Loop");
//! for _ in 0..10 {
//!     timer.tic("Loop");
//!     // ...
//!     timer.toc_loop("Loop").unwrap();
//! }
//! timer.print_loop("Loop").unwrap();
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

/// 타이머 오류
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("The tick '{0}' has not been initialized")]
    NotStarted(String),
}

#[derive(Debug)]
struct Tic {
    start: Instant,
    total: Duration,
    /// 루프 누적 중이며 아직 출력되지 않음
    pending_report: bool,
}

impl Tic {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            total: Duration::ZERO,
            pending_report: false,
        }
    }

    fn accumulate(&mut self) {
        self.total += self.start.elapsed();
    }

    fn report(&mut self, name: &str, extra: &str) {
        info!(
            timer = name,
            elapsed_secs = self.total.as_secs_f64(),
            "Elapsed time for {}{}: {:.3}s",
            name,
            extra,
            self.total.as_secs_f64()
        );
        self.pending_report = false;
    }
}

/// 이름별 누적 타이머
///
/// `enabled == false`이면 모든 호출이 아무 일도 하지 않습니다.
#[derive(Debug)]
pub struct OngTimer {
    enabled: bool,
    tics: HashMap<String, Tic>,
}

impl OngTimer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            tics: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 측정 시작 (처음이면 생성, 있으면 시작 시각만 갱신)
    pub fn tic(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        self.tics
            .entry(name.to_string())
            .and_modify(|tic| tic.start = Instant::now())
            .or_insert_with(Tic::new);
    }

    fn get_tic(&mut self, name: &str) -> Result<&mut Tic, TimerError> {
        self.tics
            .get_mut(name)
            .ok_or_else(|| TimerError::NotStarted(name.to_string()))
    }

    /// 누적 후 총 시간 출력
    pub fn toc(&mut self, name: &str) -> Result<(), TimerError> {
        if !self.enabled {
            return Ok(());
        }
        let tic = self.get_tic(name)?;
        tic.accumulate();
        tic.report(name, "");
        Ok(())
    }

    /// 누적만 하고 출력하지 않음 (루프용)
    pub fn toc_loop(&mut self, name: &str) -> Result<(), TimerError> {
        if !self.enabled {
            return Ok(());
        }
        let tic = self.get_tic(name)?;
        tic.accumulate();
        tic.pending_report = true;
        Ok(())
    }

    /// 루프 전체 누적 시간 출력
    pub fn print_loop(&mut self, name: &str) -> Result<(), TimerError> {
        if !self.enabled {
            return Ok(());
        }
        self.get_tic(name)?.report(name, " (in total)");
        Ok(())
    }

    /// 누적 시간 (비활성 타이머는 0)
    pub fn elapsed(&self, name: &str) -> Result<Duration, TimerError> {
        if !self.enabled {
            return Ok(Duration::ZERO);
        }
        self.tics
            .get(name)
            .map(|tic| tic.total)
            .ok_or_else(|| TimerError::NotStarted(name.to_string()))
    }

    /// 출력되지 않은 루프 타이머를 모두 출력하고 그 이름을 반환
    pub fn flush_pending(&mut self) -> Vec<String> {
        let mut reported = Vec::new();
        for (name, tic) in self.tics.iter_mut() {
            if tic.pending_report {
                tic.report(name, " (in total)");
                reported.push(name.clone());
            }
        }
        reported.sort();
        reported
    }
}

impl Default for OngTimer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Drop for OngTimer {
    fn drop(&mut self) {
        self.flush_pending();
    }
}
