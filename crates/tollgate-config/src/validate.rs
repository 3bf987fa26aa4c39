//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that cross-field invariants hold. Glob and pattern
//! syntax is checked later, when the engine compiles its settings.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{BATCH_TYPES, Config};

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_thresholds(config)?;
    validate_risk(config)?;
    validate_batch(config)?;
    validate_session(config)?;
    validate_audit(config)?;
    validate_logging(config)?;
    Ok(())
}

/// Weekday names accepted by `risk.risky_day.weekday`.
const WEEKDAYS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn check_unit(field: &str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{value} is out of range; must be between 0.0 and 1.0"),
        ))
    }
}

/// A delta that may only push risk up.
fn check_raising(field: &str, value: f64) -> ConfigResult<()> {
    check_unit(field, value)
}

/// A delta that may only pull risk down.
fn check_lowering(field: &str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && (-1.0..=0.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{value} is out of range; must be between -1.0 and 0.0"),
        ))
    }
}

fn validate_thresholds(config: &Config) -> ConfigResult<()> {
    let t = &config.thresholds;
    let ordered = [
        ("thresholds.auto_approve", t.auto_approve),
        ("thresholds.approve_with_log", t.approve_with_log),
        ("thresholds.contextual", t.contextual),
        ("thresholds.block", t.block),
    ];

    for (field, value) in ordered {
        check_unit(field, value)?;
    }

    for pair in ordered.windows(2) {
        let (lower_field, lower) = pair[0];
        let (field, value) = pair[1];
        if value < lower {
            return Err(invalid(
                field,
                format!("{value} must not be below {lower_field} ({lower})"),
            ));
        }
    }

    Ok(())
}

fn validate_risk(config: &Config) -> ConfigResult<()> {
    let r = &config.risk;

    for factor in &r.factors {
        if factor.name.trim().is_empty() {
            return Err(invalid("risk.factors", "factor name must not be empty"));
        }
        check_unit(&format!("risk.factors.{}.weight", factor.name), factor.weight)?;
        if factor.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(invalid(
                &format!("risk.factors.{}.keywords", factor.name),
                "keywords must not be empty strings",
            ));
        }
    }

    if r.dangerous_commands.iter().any(|c| c.trim().is_empty()) {
        return Err(invalid(
            "risk.dangerous_commands",
            "entries must not be empty strings",
        ));
    }
    check_unit("risk.dangerous_increment", r.dangerous_increment)?;

    let c = &r.context;
    check_lowering("risk.context.batch_member", c.batch_member)?;
    check_lowering("risk.context.user_requested", c.user_requested)?;
    check_lowering("risk.context.automated_fix", c.automated_fix)?;
    check_raising("risk.context.first_time", c.first_time)?;
    check_raising("risk.context.recent_failure", c.recent_failure)?;
    check_raising("risk.context.critical_path", c.critical_path)?;

    let oh = &r.off_hours;
    if oh.start_hour > 23 {
        return Err(invalid(
            "risk.off_hours.start_hour",
            format!("hour {} must be between 0 and 23", oh.start_hour),
        ));
    }
    if oh.end_hour > 23 {
        return Err(invalid(
            "risk.off_hours.end_hour",
            format!("hour {} must be between 0 and 23", oh.end_hour),
        ));
    }
    check_unit("risk.off_hours.penalty", oh.penalty)?;

    if let Some(day) = &r.risky_day.weekday
        && !WEEKDAYS.contains(&day.to_lowercase().as_str())
    {
        return Err(invalid(
            "risk.risky_day.weekday",
            format!(
                "unknown weekday '{day}'; expected one of: {}",
                WEEKDAYS.join(", ")
            ),
        ));
    }
    check_unit("risk.risky_day.penalty", r.risky_day.penalty)?;

    if let Some(offset) = r.utc_offset_minutes
        && !(-1439..=1439).contains(&offset)
    {
        return Err(invalid(
            "risk.utc_offset_minutes",
            format!("{offset} must be within one day of UTC"),
        ));
    }

    let h = &r.history;
    if h.max_entries == 0 {
        return Err(invalid("risk.history.max_entries", "must be at least 1"));
    }
    if h.max_keys == 0 {
        return Err(invalid("risk.history.max_keys", "must be at least 1"));
    }
    check_unit("risk.history.failure_penalty", h.failure_penalty)?;
    check_unit("risk.history.success_rate", h.success_rate)?;
    check_unit("risk.history.success_bonus", h.success_bonus)?;

    Ok(())
}

fn validate_batch(config: &Config) -> ConfigResult<()> {
    for name in &config.batch.auto_approve_types {
        if !BATCH_TYPES.contains(&name.as_str()) {
            return Err(invalid(
                "batch.auto_approve_types",
                format!(
                    "unknown batch type '{name}'; expected one of: {}",
                    BATCH_TYPES.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn validate_session(config: &Config) -> ConfigResult<()> {
    let s = &config.session;
    if s.default_duration_secs == 0 {
        return Err(invalid(
            "session.default_duration_secs",
            "must be greater than 0",
        ));
    }
    if s.max_duration_secs < s.default_duration_secs {
        return Err(invalid(
            "session.max_duration_secs",
            format!(
                "max_duration_secs ({}) must not be below default_duration_secs ({})",
                s.max_duration_secs, s.default_duration_secs
            ),
        ));
    }
    if s.summary_history == 0 {
        return Err(invalid("session.summary_history", "must be at least 1"));
    }
    Ok(())
}

fn validate_audit(config: &Config) -> ConfigResult<()> {
    if config.audit.capacity == 0 {
        return Err(invalid("audit.capacity", "must be at least 1"));
    }
    if let Some(path) = &config.audit.path
        && path.trim().is_empty()
    {
        return Err(invalid("audit.path", "must not be empty when set"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_thresholds_must_ascend() {
        let mut config = Config::default();
        config.thresholds.contextual = 0.3;
        assert_eq!(field_of(validate(&config)), "thresholds.contextual");
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.thresholds.block = 1.5;
        assert_eq!(field_of(validate(&config)), "thresholds.block");
    }

    #[test]
    fn test_threshold_nan_rejected() {
        let mut config = Config::default();
        config.thresholds.auto_approve = f64::NAN;
        assert_eq!(field_of(validate(&config)), "thresholds.auto_approve");
    }

    #[test]
    fn test_factor_weight_out_of_range() {
        let mut config = Config::default();
        config.risk.factors[0].weight = 2.0;
        assert_eq!(
            field_of(validate(&config)),
            "risk.factors.production.weight"
        );
    }

    #[test]
    fn test_context_delta_out_of_range() {
        let mut config = Config::default();
        config.risk.context.recent_failure = 3.0;
        assert_eq!(field_of(validate(&config)), "risk.context.recent_failure");
    }

    #[test]
    fn test_negative_raising_delta_rejected() {
        let mut config = Config::default();
        config.risk.context.recent_failure = -0.5;
        assert_eq!(field_of(validate(&config)), "risk.context.recent_failure");

        let mut config = Config::default();
        config.risk.context.critical_path = -0.01;
        assert_eq!(field_of(validate(&config)), "risk.context.critical_path");

        let mut config = Config::default();
        config.risk.context.first_time = -1.0;
        assert_eq!(field_of(validate(&config)), "risk.context.first_time");
    }

    #[test]
    fn test_positive_lowering_delta_rejected() {
        let mut config = Config::default();
        config.risk.context.user_requested = 0.2;
        assert_eq!(field_of(validate(&config)), "risk.context.user_requested");

        let mut config = Config::default();
        config.risk.context.batch_member = 0.5;
        assert_eq!(field_of(validate(&config)), "risk.context.batch_member");

        let mut config = Config::default();
        config.risk.context.automated_fix = 0.05;
        assert_eq!(field_of(validate(&config)), "risk.context.automated_fix");
    }

    #[test]
    fn test_zero_deltas_accepted() {
        let mut config = Config::default();
        config.risk.context.recent_failure = 0.0;
        config.risk.context.user_requested = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_hour() {
        let mut config = Config::default();
        config.risk.off_hours.start_hour = 24;
        assert_eq!(field_of(validate(&config)), "risk.off_hours.start_hour");
    }

    #[test]
    fn test_invalid_weekday() {
        let mut config = Config::default();
        config.risk.risky_day.weekday = Some("caturday".to_owned());
        assert_eq!(field_of(validate(&config)), "risk.risky_day.weekday");
    }

    #[test]
    fn test_weekday_is_case_insensitive() {
        let mut config = Config::default();
        config.risk.risky_day.weekday = Some("Friday".to_owned());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_batch_type() {
        let mut config = Config::default();
        config.batch.auto_approve_types.push("everything".to_owned());
        assert_eq!(field_of(validate(&config)), "batch.auto_approve_types");
    }

    #[test]
    fn test_session_max_below_default() {
        let mut config = Config::default();
        config.session.max_duration_secs = 60;
        assert_eq!(field_of(validate(&config)), "session.max_duration_secs");
    }

    #[test]
    fn test_zero_history_rejected() {
        let mut config = Config::default();
        config.risk.history.max_entries = 0;
        assert_eq!(field_of(validate(&config)), "risk.history.max_entries");
    }

    #[test]
    fn test_zero_max_keys_rejected() {
        let mut config = Config::default();
        config.risk.history.max_keys = 0;
        assert_eq!(field_of(validate(&config)), "risk.history.max_keys");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "yaml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }
}
