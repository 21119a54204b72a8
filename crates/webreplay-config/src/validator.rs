//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// First error as a [`ConfigError`], if any.
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors
            .into_iter()
            .next()
            .map(|e| ConfigError::InvalidValue {
                field: e.path,
                message: e.message,
            })
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_engine(config, &mut result);
        Self::validate_executor(config, &mut result);
        Self::validate_recorder(config, &mut result);
        Self::validate_selectors(config, &mut result);
        Self::validate_infra(config, &mut result);

        Ok(result)
    }

    fn require_positive(result: &mut ValidationResult, path: &str, value: u64) {
        if value == 0 {
            result.add_error(ValidationError::new(
                path,
                format!("{} must be greater than 0", path.rsplit('.').next().unwrap_or(path)),
            ));
        }
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let engine = &config.engine;
        Self::require_positive(result, "engine.poll_interval_ms", engine.poll_interval_ms);
        Self::require_positive(result, "engine.element_timeout_ms", engine.element_timeout_ms);
        Self::require_positive(result, "engine.action_timeout_ms", engine.action_timeout_ms);
        Self::require_positive(
            result,
            "engine.navigation_timeout_ms",
            engine.navigation_timeout_ms,
        );
        Self::require_positive(
            result,
            "engine.retry.max_attempts",
            u64::from(engine.retry.max_attempts),
        );

        if engine.poll_interval_ms > engine.element_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "engine.poll_interval_ms",
                "poll interval is longer than the element timeout, elements are polled once",
            ));
        }

        if engine.retry.base_delay_ms > engine.retry.max_delay_ms {
            result.add_warning(ValidationWarning::new(
                "engine.retry.base_delay_ms",
                "base delay exceeds max delay, every retry waits max_delay_ms",
            ));
        }

        if engine.retry.max_attempts > 10 {
            result.add_warning(ValidationWarning::new(
                "engine.retry.max_attempts",
                "max_attempts is very high (>10), failing steps will take long to surface",
            ));
        }

        if engine.strict && engine.action_timeout_ms < engine.element_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "engine.action_timeout_ms",
                "strict action timeout is shorter than the element timeout",
            ));
        }
    }

    fn validate_executor(config: &Config, result: &mut ValidationResult) {
        let executor = &config.executor;
        Self::require_positive(result, "executor.step_timeout_ms", executor.step_timeout_ms);
        Self::require_positive(result, "executor.run_timeout_ms", executor.run_timeout_ms);

        if config.engine.element_timeout_ms > executor.step_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "engine.element_timeout_ms",
                "element timeout is longer than the step timeout, steps time out before NotFound",
            ));
        }

        if executor.step_timeout_ms > executor.run_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "executor.step_timeout_ms",
                "step timeout is longer than the run timeout",
            ));
        }
    }

    fn validate_recorder(config: &Config, result: &mut ValidationResult) {
        let recorder = &config.recorder;
        Self::require_positive(
            result,
            "recorder.input_debounce_ms",
            recorder.input_debounce_ms,
        );

        if recorder.pause_threshold_ms <= recorder.input_debounce_ms {
            result.add_warning(ValidationWarning::new(
                "recorder.pause_threshold_ms",
                "pause threshold is not above the input debounce, typing pauses become waits",
            ));
        }

        if recorder.scroll_threshold_px < 0.0 {
            result.add_error(ValidationError::new(
                "recorder.scroll_threshold_px",
                "scroll_threshold_px cannot be negative",
            ));
        }
    }

    fn validate_selectors(config: &Config, result: &mut ValidationResult) {
        let selectors = &config.selectors;
        if selectors.text_max_len == 0 {
            result.add_warning(ValidationWarning::new(
                "selectors.text_max_len",
                "text_max_len is 0, the Text strategy is disabled",
            ));
        }
        if selectors.position_max_depth == 0 {
            result.add_warning(ValidationWarning::new(
                "selectors.position_max_depth",
                "position_max_depth is 0, the Position strategy is disabled",
            ));
        }
    }

    fn validate_infra(config: &Config, result: &mut ValidationResult) {
        let endpoint = &config.browser.endpoint;
        if !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
            && !endpoint.starts_with("ws://")
            && !endpoint.starts_with("wss://")
        {
            result.add_error(ValidationError::new(
                "browser.endpoint",
                "endpoint must start with http://, https://, ws:// or wss://",
            ));
        }

        if config.storage.dir.trim().is_empty() {
            result.add_error(ValidationError::new(
                "storage.dir",
                "storage directory cannot be empty",
            ));
        }

        if config.logging.level.trim().is_empty() {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                "logging level is empty, falling back to info",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
