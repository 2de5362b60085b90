use std::{fmt::Display, time::Duration};

use lpg_common::Points;

/// The tally of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Pending orders when the pass started.
    pub pending: u64,
    /// Orders leased by the workers.
    pub claimed: usize,
    /// Orders whose new status was committed.
    pub updated: usize,
    /// Orders the accrual system had no news about, or that were finalised elsewhere.
    pub unchanged: usize,
    /// Orders the accrual system does not know about yet.
    pub unregistered: usize,
    /// Orders that could not be reconciled this time round.
    pub failed: usize,
    /// The sum of all balance credits committed in this pass.
    pub credited: Points,
    /// At least one worker was told to back off by the accrual system.
    pub throttled: bool,
    /// The longest back-off any throttled worker was asked to observe.
    pub retry_after: Option<Duration>,
    /// The pass was cut short by a shutdown request.
    pub cancelled: bool,
}

impl PassSummary {
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }

    pub fn record_throttle(&mut self, retry_after: Option<Duration>) {
        self.throttled = true;
        self.retry_after = self.retry_after.max(retry_after);
    }

    /// Folds a worker's tally into this one.
    pub fn merge(&mut self, other: PassSummary) {
        self.claimed += other.claimed;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.unregistered += other.unregistered;
        self.failed += other.failed;
        self.credited += other.credited;
        if other.throttled {
            self.record_throttle(other.retry_after);
        }
        self.cancelled |= other.cancelled;
    }
}

impl Display for PassSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pending, {} claimed, {} updated, {} unchanged, {} unregistered, {} failed. {} credited",
            self.pending, self.claimed, self.updated, self.unchanged, self.unregistered, self.failed, self.credited
        )?;
        if self.throttled {
            match self.retry_after {
                Some(d) => write!(f, ". Throttled for {}s", d.as_secs())?,
                None => write!(f, ". Throttled")?,
            }
        }
        if self.cancelled {
            write!(f, ". Cancelled")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merging_keeps_the_longest_back_off() {
        let mut total = PassSummary { pending: 7, ..Default::default() };
        let a = PassSummary { claimed: 3, updated: 2, failed: 1, credited: Points::from(500), ..Default::default() };
        let mut b = PassSummary { claimed: 4, unregistered: 1, credited: Points::from(250), ..Default::default() };
        b.record_throttle(Some(Duration::from_secs(30)));
        let mut c = PassSummary::default();
        c.record_throttle(Some(Duration::from_secs(10)));
        total.merge(a);
        total.merge(b);
        total.merge(c);
        assert_eq!(total.claimed, 7);
        assert_eq!(total.updated, 2);
        assert_eq!(total.unregistered, 1);
        assert_eq!(total.failed, 1);
        assert_eq!(total.credited, Points::from(750));
        assert!(total.throttled);
        assert_eq!(total.retry_after, Some(Duration::from_secs(30)));
        assert!(!total.cancelled);
        assert_eq!(
            total.to_string(),
            "7 pending, 7 claimed, 2 updated, 0 unchanged, 1 unregistered, 1 failed. 7.50pts credited. Throttled for 30s"
        );
    }

    #[test]
    fn throttle_without_hint() {
        let mut summary = PassSummary::default();
        summary.record_throttle(None);
        assert!(summary.throttled);
        assert_eq!(summary.retry_after, None);
        assert!(summary.is_empty());
    }
}
