//! Step, time and cancellation budgets for the exponential searches.
//!
//! A [`Budget`] is the caller-facing configuration; a [`Meter`] is the live counter that a
//! single top-level search (possibly fanned out over rayon workers) charges every step to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Exhaustion, Result};

/// The deadline is only consulted every `DEADLINE_STRIDE` steps; `Instant::now` is not free.
const DEADLINE_STRIDE: u64 = 256;

/// Limits for one top-level search. The default is unlimited.
#[derive(Clone, Debug, Default)]
pub struct Budget {
    /// Maximum number of search steps.
    pub max_steps: Option<u64>,
    /// Wall-clock limit, measured from [`Budget::meter`].
    pub time_limit: Option<Duration>,
    /// Cooperative cancellation flag, checked on every step.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Budget {
    /// A budget without limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// A budget of at most `max_steps` steps.
    pub fn steps(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
            ..Self::default()
        }
    }

    /// Adds a wall-clock limit.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Adds a cancellation flag; raising it stops every search metered by this budget.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Starts metering. The time limit starts counting now.
    pub fn meter(&self) -> Meter {
        Meter {
            steps: AtomicU64::new(0),
            max_steps: self.max_steps,
            deadline: self.time_limit.map(|d| Instant::now() + d),
            cancel: self.cancel.clone(),
        }
    }
}

/// Live step counter. `Sync`, so rayon workers can share one meter by reference.
#[derive(Debug)]
pub struct Meter {
    steps: AtomicU64,
    max_steps: Option<u64>,
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Meter {
    /// A meter that never runs out.
    pub fn unlimited() -> Self {
        Budget::unlimited().meter()
    }

    /// Charges one step.
    ///
    /// # Errors
    /// Returns [`Error::ResourceExhausted`] once any limit is hit.
    #[inline]
    pub fn tick(&self) -> Result<()> {
        let n = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(max) = self.max_steps
            && n > max
        {
            return Err(self.exhausted(Exhaustion::StepLimit, max));
        }
        if let Some(flag) = &self.cancel
            && flag.load(Ordering::Relaxed)
        {
            return Err(self.exhausted(Exhaustion::Cancelled, n));
        }
        if let Some(deadline) = self.deadline
            && n.is_multiple_of(DEADLINE_STRIDE)
            && Instant::now() >= deadline
        {
            return Err(self.exhausted(Exhaustion::Deadline, n));
        }
        Ok(())
    }

    /// Steps charged so far (may exceed the limit by the number of concurrent workers).
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    fn exhausted(&self, reason: Exhaustion, steps: u64) -> Error {
        Error::ResourceExhausted { reason, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_meter_never_fails() {
        let meter = Meter::unlimited();
        for _ in 0..10_000 {
            meter.tick().unwrap();
        }
        assert_eq!(meter.steps(), 10_000);
    }

    #[test]
    fn step_limit_is_exact() {
        let meter = Budget::steps(3).meter();
        assert!(meter.tick().is_ok());
        assert!(meter.tick().is_ok());
        assert!(meter.tick().is_ok());
        let err = meter.tick().unwrap_err();
        assert_eq!(
            err,
            Error::ResourceExhausted {
                reason: Exhaustion::StepLimit,
                steps: 3
            }
        );
    }

    #[test]
    fn cancel_flag_stops_metering() {
        let flag = Arc::new(AtomicBool::new(false));
        let meter = Budget::unlimited().with_cancel_flag(flag.clone()).meter();
        assert!(meter.tick().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert!(matches!(
            meter.tick(),
            Err(Error::ResourceExhausted {
                reason: Exhaustion::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn expired_deadline_is_reported() {
        let meter = Budget::unlimited()
            .with_time_limit(Duration::ZERO)
            .meter();
        let mut outcome = Ok(());
        for _ in 0..DEADLINE_STRIDE {
            outcome = meter.tick();
            if outcome.is_err() {
                break;
            }
        }
        assert!(matches!(
            outcome,
            Err(Error::ResourceExhausted {
                reason: Exhaustion::Deadline,
                ..
            })
        ));
    }
}
