//! Timeout enforcement for rule evaluation.
//!
//! Every rule call that may leave the process runs under a deadline. An
//! elapsed deadline is a [`RuleFault::Timeout`], never an implicit allow or
//! deny.

use std::future::Future;
use std::time::Duration;

use crate::protection::{RuleFault, RuleKind};

pub async fn with_deadline<T, F>(rule: RuleKind, limit: Duration, fut: F) -> Result<T, RuleFault>
where
    F: Future<Output = Result<T, RuleFault>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RuleFault::Timeout { rule, after: limit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_future_passes_through() {
        let out = with_deadline(RuleKind::Bot, Duration::from_millis(100), async { Ok(5) }).await;
        assert_eq!(out.unwrap(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_future_times_out() {
        let out: Result<(), RuleFault> = with_deadline(RuleKind::Shield, Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            out,
            Err(RuleFault::Timeout { rule: RuleKind::Shield, .. })
        ));
    }
}
