//! Action execution engine.
//!
//! Performs one step at a time against a [`PageHandle`]: placeholder
//! substitution, element resolution through the fallback chain, the action
//! itself and bounded retries. In strict mode every attempt also runs under a
//! hard wall-clock limit and falls back to the alternatives exactly once.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use webreplay_config::EngineConfig;
use webreplay_protocols::{
    Action, Condition, Modifiers, PageHandle, ReplayError, SelectorDescriptor, SelectorSet, Step,
    Variables,
};

use crate::resolver::{Located, Resolver};
use crate::retry::{Retried, with_retry};
use crate::substitution::substitute_step;
use crate::wait::Poller;

/// What a successful step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    /// Descriptor that located the target, as `strategy:value`.
    pub selector_used: Option<String>,
    /// Value bound to the step's `store_as` variable.
    pub value: Option<String>,
    /// The step had nothing to do and was skipped.
    pub skipped: bool,
}

impl ActionOutput {
    pub(crate) fn located(target: &Located) -> Self {
        Self {
            selector_used: Some(target.descriptor.clone()),
            ..Default::default()
        }
    }

    pub(crate) fn value(value: String) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }
}

/// State of one action attempt.
pub(crate) struct Attempt<'a> {
    /// Descriptors tried in order; empty when the step has no selector.
    pub chain: Vec<&'a SelectorDescriptor>,
    pub resolver: Resolver<'a>,
    pub token: &'a CancellationToken,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ReplayError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReplayError::Busy("another action is in progress".to_string()))?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Performs steps against one page, one at a time.
pub struct ActionEngine {
    pub(crate) page: Arc<dyn PageHandle>,
    pub(crate) config: EngineConfig,
    busy: AtomicBool,
}

impl ActionEngine {
    pub fn new(page: Arc<dyn PageHandle>, config: EngineConfig) -> Self {
        Self {
            page,
            config,
            busy: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn page(&self) -> &Arc<dyn PageHandle> {
        &self.page
    }

    /// Whether a perform call is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Perform `step`, binding any produced value into `variables`.
    pub async fn perform(
        &self,
        step: &Step,
        variables: &mut Variables,
        token: &CancellationToken,
    ) -> Result<ActionOutput, ReplayError> {
        self.execute(step, variables, token).await.result
    }

    /// Like [`perform`](Self::perform), also reporting how many attempts were made.
    pub async fn execute(
        &self,
        step: &Step,
        variables: &mut Variables,
        token: &CancellationToken,
    ) -> Retried<ActionOutput> {
        let _busy = match BusyGuard::acquire(&self.busy) {
            Ok(guard) => guard,
            Err(e) => return Retried::rejected(e),
        };

        let step = substitute_step(step, variables);
        if let Err(e) = self.validate(&step) {
            return Retried::rejected(e);
        }

        debug!(step_id = %step.id, action = step.action_name(), "Performing step");
        let retried = with_retry(&self.config.retry, token, step.action_name(), || {
            self.attempt(&step, token)
        })
        .await;

        if let Ok(output) = &retried.result {
            if let (Some(name), Some(value)) = (step.action.binding(), output.value.as_ref()) {
                debug!(variable = name, "Bound step result");
                variables.insert(name.to_string(), value.clone());
            }
        }
        retried
    }

    fn validate(&self, step: &Step) -> Result<(), ReplayError> {
        if step.action.requires_element() && step.selector.is_none() {
            return Err(ReplayError::InvalidStep(format!(
                "{} requires a selector",
                step.action_name()
            )));
        }
        let uses_script = matches!(
            &step.action,
            Action::ExecuteScript { .. }
                | Action::WaitForCondition {
                    condition: Condition::Custom { .. },
                    ..
                }
        );
        if uses_script && !self.config.allow_scripts {
            return Err(ReplayError::InvalidStep(
                "script execution is disabled".to_string(),
            ));
        }
        Ok(())
    }

    async fn attempt(&self, step: &Step, token: &CancellationToken) -> Result<ActionOutput, ReplayError> {
        if token.is_cancelled() {
            return Err(ReplayError::Cancelled);
        }
        let selector = step.selector.as_ref();

        if !self.config.strict {
            let chain: Vec<&SelectorDescriptor> =
                selector.map(|s| s.chain().collect()).unwrap_or_default();
            return self.cancellable(token, self.run_action(step, chain, token)).await;
        }

        let primary: Vec<&SelectorDescriptor> =
            selector.map(|s| vec![&s.primary]).unwrap_or_default();
        let child = token.child_token();
        let first = self
            .bounded(&child, self.run_action(step, primary, &child))
            .await;

        match (first, selector.and_then(SelectorSet::without_primary)) {
            (Err(ReplayError::NotFound(reason)), Some(rest)) => {
                info!(step_id = %step.id, "Primary selector missed ({}), trying alternatives", reason);
                let chain: Vec<&SelectorDescriptor> = rest.chain().collect();
                let child = token.child_token();
                self.bounded(&child, self.run_action(step, chain, &child))
                    .await
            }
            (result, _) => result,
        }
    }

    /// Run `fut` unless `token` fires first.
    async fn cancellable<F>(&self, token: &CancellationToken, fut: F) -> Result<ActionOutput, ReplayError>
    where
        F: Future<Output = Result<ActionOutput, ReplayError>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ReplayError::Cancelled),
            result = fut => result,
        }
    }

    /// Run `fut` under the strict-mode hard timeout, cancelling `child` when it expires.
    async fn bounded<F>(&self, child: &CancellationToken, fut: F) -> Result<ActionOutput, ReplayError>
    where
        F: Future<Output = Result<ActionOutput, ReplayError>>,
    {
        let limit = self.config.action_timeout();
        match tokio::time::timeout(limit, self.cancellable(child, fut)).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                Err(ReplayError::Timeout(format!(
                    "action exceeded {}ms",
                    self.config.action_timeout_ms
                )))
            }
        }
    }

    async fn run_action<'a>(
        &'a self,
        step: &'a Step,
        chain: Vec<&'a SelectorDescriptor>,
        token: &'a CancellationToken,
    ) -> Result<ActionOutput, ReplayError> {
        let mut attempt = Attempt {
            chain,
            resolver: Resolver::new(self.page.as_ref()),
            token,
        };

        match &step.action {
            Action::Click {
                button,
                wait_after_ms,
                ..
            } => self.click(&mut attempt, *button, *wait_after_ms).await,
            Action::InputText {
                value,
                clear_first,
                typing_delay_ms,
            } => {
                self.input_text(&mut attempt, value, *clear_first, *typing_delay_ms)
                    .await
            }
            Action::SelectOption { value } => self.select_option(&mut attempt, value).await,
            Action::WaitForElement {
                timeout_ms,
                visible,
            } => self.wait_for_element(&mut attempt, *timeout_ms, *visible).await,
            Action::WaitForCondition {
                condition,
                timeout_ms,
            } => {
                self.wait_for_condition(&mut attempt, condition, *timeout_ms)
                    .await
            }
            Action::WaitForTime { duration_ms } => self.wait_for_time(&attempt, *duration_ms).await,
            Action::Navigate { url, wait_for_load } => self.navigate(url, *wait_for_load).await,
            Action::GetContent {
                property,
                attribute,
                ..
            } => {
                self.get_content(&mut attempt, property.as_deref(), attribute.as_deref())
                    .await
            }
            Action::ExecuteScript { script, .. } => self.execute_script(script).await,
            Action::TakeScreenshot { full_page, .. } => self.take_screenshot(*full_page).await,
            Action::KeyboardShortcut {
                key,
                ctrl,
                alt,
                shift,
                meta,
            } => {
                let modifiers = Modifiers {
                    ctrl: *ctrl,
                    alt: *alt,
                    shift: *shift,
                    meta: *meta,
                };
                self.keyboard_shortcut(&mut attempt, key, modifiers).await
            }
            Action::Scroll { x, y, smooth } => self.scroll(&mut attempt, *x, *y, *smooth).await,
            Action::Hover { dwell_ms } => self.hover(&mut attempt, *dwell_ms).await,
            Action::FileUpload { paths, .. } => self.file_upload(&mut attempt, paths).await,
        }
    }

    /// Poll the attempt's chain until an element resolves or the element
    /// timeout passes.
    pub(crate) async fn locate(&self, attempt: &mut Attempt<'_>) -> Result<Located, ReplayError> {
        let Some(first) = attempt.chain.first() else {
            return Err(ReplayError::InvalidStep("step has no selector".to_string()));
        };
        let first = first.to_string();
        let poller = Poller::new(
            self.config.poll_interval(),
            self.config.element_timeout(),
            attempt.token,
        );
        loop {
            if let Some(found) = attempt.resolver.resolve(&attempt.chain).await? {
                return Ok(found);
            }
            if !poller.next().await? {
                return Err(ReplayError::NotFound(format!(
                    "no element for {} ({} selectors tried)",
                    first,
                    attempt.chain.len()
                )));
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
