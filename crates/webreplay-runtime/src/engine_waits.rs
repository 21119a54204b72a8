//! Waits: fixed delays, element presence and page conditions.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};
use webreplay_protocols::{Condition, ReplayError};

use crate::engine::{ActionEngine, ActionOutput, Attempt};
use crate::resolver::Located;
use crate::wait::{Poller, sleep_or_cancel};

impl ActionEngine {
    pub(crate) async fn wait_for_time(
        &self,
        attempt: &Attempt<'_>,
        duration_ms: u64,
    ) -> Result<ActionOutput, ReplayError> {
        sleep_or_cancel(Duration::from_millis(duration_ms), attempt.token).await?;
        Ok(ActionOutput::default())
    }

    pub(crate) async fn wait_for_element(
        &self,
        attempt: &mut Attempt<'_>,
        timeout_ms: Option<u64>,
        visible: bool,
    ) -> Result<ActionOutput, ReplayError> {
        let timeout_ms = timeout_ms.unwrap_or(self.config.element_timeout_ms);
        let poller = Poller::new(
            self.config.poll_interval(),
            Duration::from_millis(timeout_ms),
            attempt.token,
        );
        loop {
            if let Some(target) = self.poll_target(attempt).await? {
                if !visible || self.is_visible(&target).await {
                    return Ok(ActionOutput::located(&target));
                }
            }
            if !poller.next().await? {
                let what = if visible { "visible" } else { "present" };
                return Err(ReplayError::Timeout(format!(
                    "element {} not {} within {}ms",
                    describe_chain(attempt),
                    what,
                    timeout_ms
                )));
            }
        }
    }

    pub(crate) async fn wait_for_condition(
        &self,
        attempt: &mut Attempt<'_>,
        condition: &Condition,
        timeout_ms: Option<u64>,
    ) -> Result<ActionOutput, ReplayError> {
        let timeout_ms = timeout_ms.unwrap_or(self.config.element_timeout_ms);
        match condition {
            Condition::NetworkIdle { quiet_ms } => {
                self.wait_network_idle(attempt, *quiet_ms, timeout_ms).await
            }
            Condition::DomStable {
                quiet_ms,
                max_wait_ms,
            } => {
                let bound = timeout_ms.min(*max_wait_ms);
                self.wait_dom_stable(attempt, *quiet_ms, bound).await
            }
            _ => {
                let poller = Poller::new(
                    self.config.poll_interval(),
                    Duration::from_millis(timeout_ms),
                    attempt.token,
                );
                loop {
                    if self.condition_met(attempt, condition).await? {
                        return Ok(ActionOutput::default());
                    }
                    if !poller.next().await? {
                        return Err(ReplayError::Timeout(format!(
                            "condition {} not met within {}ms",
                            condition.name(),
                            timeout_ms
                        )));
                    }
                }
            }
        }
    }

    async fn condition_met(
        &self,
        attempt: &mut Attempt<'_>,
        condition: &Condition,
    ) -> Result<bool, ReplayError> {
        Ok(match condition {
            Condition::ElementVisible => match self.poll_target(attempt).await? {
                Some(target) => self.is_visible(&target).await,
                None => false,
            },
            Condition::ElementHidden => match self.poll_target(attempt).await? {
                Some(target) => !self.is_visible(&target).await,
                None => true,
            },
            Condition::TextPresent { text } => self.page.page_text().await?.contains(text.as_str()),
            Condition::Custom { expression } => {
                is_truthy(&self.page.evaluate_script(expression).await?)
            }
            Condition::NetworkIdle { .. } | Condition::DomStable { .. } => true,
        })
    }

    /// Satisfied once no request has been in flight for `quiet_ms`.
    async fn wait_network_idle(
        &self,
        attempt: &Attempt<'_>,
        quiet_ms: u64,
        timeout_ms: u64,
    ) -> Result<ActionOutput, ReplayError> {
        let quiet = Duration::from_millis(quiet_ms);
        let poller = Poller::new(
            self.config.poll_interval(),
            Duration::from_millis(timeout_ms),
            attempt.token,
        );
        let mut idle_since: Option<Instant> = None;
        loop {
            let activity = self.page.activity().await?;
            if activity.in_flight_requests == 0 {
                let since = *idle_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= quiet {
                    return Ok(ActionOutput::default());
                }
            } else {
                idle_since = None;
            }
            if !poller.next().await? {
                return Err(ReplayError::Timeout(format!(
                    "network not idle within {timeout_ms}ms"
                )));
            }
        }
    }

    /// Satisfied once the mutation counter holds still for `quiet_ms`. Never
    /// fails on a busy page: after `max_wait_ms` it gives up and succeeds.
    async fn wait_dom_stable(
        &self,
        attempt: &Attempt<'_>,
        quiet_ms: u64,
        max_wait_ms: u64,
    ) -> Result<ActionOutput, ReplayError> {
        let quiet = Duration::from_millis(quiet_ms);
        let poller = Poller::new(
            self.config.poll_interval(),
            Duration::from_millis(max_wait_ms),
            attempt.token,
        );
        let mut last = self.page.activity().await?.mutation_count;
        let mut stable_since = Instant::now();
        loop {
            if !poller.next().await? {
                warn!(max_wait_ms, "DOM still changing, continuing anyway");
                return Ok(ActionOutput::default());
            }
            let count = self.page.activity().await?.mutation_count;
            if count != last {
                debug!(mutations = count, "DOM changed");
                last = count;
                stable_since = Instant::now();
            } else if stable_since.elapsed() >= quiet {
                return Ok(ActionOutput::default());
            }
        }
    }

    /// Fresh lookup of the attempt's chain, bypassing cached handles.
    async fn poll_target(&self, attempt: &mut Attempt<'_>) -> Result<Option<Located>, ReplayError> {
        if attempt.chain.is_empty() {
            return Err(ReplayError::InvalidStep("step has no selector".to_string()));
        }
        attempt.resolver.clear();
        attempt.resolver.resolve(&attempt.chain).await
    }

    /// Detached or unreadable elements count as not visible.
    async fn is_visible(&self, target: &Located) -> bool {
        self.page
            .element_state(&target.handle)
            .await
            .map(|state| state.visible)
            .unwrap_or(false)
    }
}

fn describe_chain(attempt: &Attempt<'_>) -> String {
    attempt
        .chain
        .first()
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// JavaScript-style truthiness of a script result.
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }
}
