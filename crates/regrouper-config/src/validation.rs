//! Configuration validation

use crate::schema::{RawAssignment, RawCategory, RawConfig, RawSubstring};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error (fatal at startup)
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Category '{category}': {message}")]
    CategoryError { category: String, message: String },

    #[error("Duplicate category name: {0}")]
    DuplicateCategoryName(String),

    #[error("Category '{category}' sets more than one predicate: {keys:?}")]
    MultiplePredicates {
        category: String,
        keys: Vec<&'static str>,
    },

    #[error("Category '{category}': hostname_substring [{start}, {end}) can never match: {reason}")]
    InvalidSubstringBounds {
        category: String,
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("No categories configured")]
    NoCategories,

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validation warning (the config loads, but something is likely wrong)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("Catch-all category '{catch_all}' is not last; unreachable categories: {unreachable:?}")]
    UnreachableCategories {
        catch_all: String,
        unreachable: Vec<String>,
    },

    #[error("Category '{category}': target group {target} is not among its valid groups")]
    TargetNotAccepted { category: String, target: String },

    #[error("No catch-all category; agents matching nothing will be skipped every cycle")]
    NoCatchAll,
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.server_name.trim().is_empty() {
        errors.push(ValidationError::GlobalError("server_name cannot be empty".into()));
    }
    if config.api_key.trim().is_empty() {
        errors.push(ValidationError::GlobalError("api_key cannot be empty".into()));
    }
    if config.request_timeout_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "request_timeout_seconds must be greater than 0".into(),
        ));
    }

    errors.extend(validate_assignment(&config.assignment));

    let categories = &config.assignment.categories;
    if categories.is_empty() {
        errors.push(ValidationError::NoCategories);
    }

    // Check for duplicate category names
    let mut seen_names = HashSet::new();
    for category in categories {
        if !seen_names.insert(&category.name) {
            errors.push(ValidationError::DuplicateCategoryName(category.name.clone()));
        }
    }

    for category in categories {
        errors.extend(validate_category(category));
    }

    errors
}

fn validate_assignment(assignment: &RawAssignment) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if assignment.interval_between_runs_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "interval_between_runs_seconds must be greater than 0".into(),
        ));
    }
    if assignment.max_batch_size == Some(0) {
        errors.push(ValidationError::GlobalError(
            "max_batch_size must be greater than 0".into(),
        ));
    }
    if assignment.max_concurrent_moves == Some(0) {
        errors.push(ValidationError::GlobalError(
            "max_concurrent_moves must be greater than 0".into(),
        ));
    }
    if let Some(throttle) = assignment.throttle_per_agent_moved
        && !(throttle.is_finite() && throttle >= 0.0)
    {
        errors.push(ValidationError::GlobalError(
            "throttle_per_agent_moved must be a non-negative number of seconds".into(),
        ));
    }
    if let Some(rate_limit) = &assignment.rate_limit
        && (rate_limit.max_requests == 0 || rate_limit.per_seconds == 0)
    {
        errors.push(ValidationError::GlobalError(
            "rate_limit.max_requests and rate_limit.per_seconds must be greater than 0".into(),
        ));
    }
    if let Some(groups) = &assignment.groupids_to_move_from
        && groups.iter().any(|g| g.trim().is_empty())
    {
        errors.push(ValidationError::GlobalError(
            "groupids_to_move_from cannot contain empty group ids".into(),
        ));
    }

    errors
}

fn validate_category(category: &RawCategory) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let category_error = |message: &str| ValidationError::CategoryError {
        category: category.name.clone(),
        message: message.into(),
    };

    if category.name.trim().is_empty() {
        errors.push(category_error("name cannot be empty"));
    }

    let keys = category.predicate_keys();
    if keys.len() > 1 {
        errors.push(ValidationError::MultiplePredicates {
            category: category.name.clone(),
            keys,
        });
    }

    let literals = [
        ("hostname_startswith", &category.hostname_startswith),
        ("hostname_contains", &category.hostname_contains),
        ("hostname_endswith", &category.hostname_endswith),
        ("os_contains", &category.os_contains),
    ];
    for (key, value) in literals {
        if let Some(value) = value
            && value.is_empty()
        {
            errors.push(category_error(&format!("{key} cannot be empty")));
        }
    }

    if let Some(substring) = &category.hostname_substring
        && let Err(e) = check_substring(substring)
    {
        errors.push(ValidationError::InvalidSubstringBounds {
            category: category.name.clone(),
            start: substring.start,
            end: substring.end,
            reason: e,
        });
    }

    if category.valid_policy_groups.is_empty() {
        errors.push(category_error("valid_policy_groups cannot be empty"));
    }
    if category.valid_policy_groups.iter().any(|g| g.trim().is_empty()) {
        errors.push(category_error("valid_policy_groups cannot contain empty group ids"));
    }
    if category.target_policy_group.trim().is_empty() {
        errors.push(category_error("target_policy_group cannot be empty"));
    }

    errors
}

/// Check that a hostname slice rule can ever match
pub fn check_substring(substring: &RawSubstring) -> Result<(), String> {
    if substring.start >= substring.end {
        return Err("start must be less than end".into());
    }
    let width = substring.end - substring.start;
    let literal_len = substring.literal.chars().count();
    if literal_len != width {
        return Err(format!(
            "match is {} characters but the slice is {} characters wide",
            literal_len, width
        ));
    }
    Ok(())
}

/// Collect non-fatal configuration warnings
pub fn config_warnings(config: &RawConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let categories = &config.assignment.categories;

    match categories.iter().position(RawCategory::is_catch_all) {
        Some(index) if index + 1 < categories.len() => {
            warnings.push(ValidationWarning::UnreachableCategories {
                catch_all: categories[index].name.clone(),
                unreachable: categories[index + 1..]
                    .iter()
                    .map(|c| c.name.clone())
                    .collect(),
            });
        }
        Some(_) => {}
        None if !categories.is_empty() => warnings.push(ValidationWarning::NoCatchAll),
        None => {}
    }

    for category in categories {
        if !category
            .valid_policy_groups
            .contains(&category.target_policy_group)
        {
            warnings.push(ValidationWarning::TargetNotAccepted {
                category: category.name.clone(),
                target: category.target_policy_group.clone(),
            });
        }
    }

    warnings
}
