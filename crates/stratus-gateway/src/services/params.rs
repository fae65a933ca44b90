// crates/stratus-gateway/src/services/params.rs
// ============================================================================
// Module: Request Parameter Helpers
// Description: Typed access to JSON, form, and REST operation inputs.
// Purpose: Validate required parameters before any store mutation.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Query-action services flatten lists and maps into indexed parameters:
//! `AttributeName.1`, `Attribute.1.Name` / `Attribute.1.Value`, and nested
//! forms such as `TagSpecification.1.Tag.2.Key`. The helpers here collect
//! those into ordinary collections ordered by index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::error::ErrorKind;
use crate::protocol::FormParams;
use crate::protocol::OperationInput;
use crate::protocol::RestInput;

// ============================================================================
// SECTION: Input Shapes
// ============================================================================

/// Decodes a JSON input into `T`.
///
/// # Errors
///
/// Returns a `SerializationException` when the input is not JSON or does not
/// match `T`.
pub fn decode_json<T: DeserializeOwned>(input: &OperationInput) -> Result<T, ApiError> {
    let OperationInput::Json(value) = input else {
        return Err(ApiError::internal("operation expects a JSON input"));
    };
    serde_json::from_value(value.clone()).map_err(|err| {
        ApiError::new(ErrorKind::Validation, "SerializationException", err.to_string())
    })
}

/// Returns form parameters.
///
/// # Errors
///
/// Returns an internal error for non-form inputs.
pub fn form(input: &OperationInput) -> Result<&FormParams, ApiError> {
    match input {
        OperationInput::Params(params) => Ok(params),
        _ => Err(ApiError::internal("operation expects form parameters")),
    }
}

/// Returns REST input.
///
/// # Errors
///
/// Returns an internal error for non-REST inputs.
pub fn rest(input: &OperationInput) -> Result<&RestInput, ApiError> {
    match input {
        OperationInput::Rest(rest) => Ok(rest),
        _ => Err(ApiError::internal("operation expects a REST input")),
    }
}

// ============================================================================
// SECTION: Required Values
// ============================================================================

/// Unwraps a required field.
///
/// # Errors
///
/// Returns `MissingParameter` naming `name` when absent or blank.
pub fn require_field(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::missing_parameter(name)),
    }
}

/// Returns a required form parameter.
///
/// # Errors
///
/// Returns `MissingParameter` naming `name` when absent or blank.
pub fn required<'a>(params: &'a FormParams, name: &str) -> Result<&'a str, ApiError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::missing_parameter(name))
}

/// Parses an optional numeric form parameter.
///
/// # Errors
///
/// Returns `InvalidParameterValue` when present but not a number.
pub fn optional_number<T: std::str::FromStr>(
    params: &FormParams,
    name: &str,
) -> Result<Option<T>, ApiError> {
    params
        .get(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ApiError::new(
                    ErrorKind::Validation,
                    "InvalidParameterValue",
                    format!("Value ({raw}) for parameter {name} is invalid."),
                )
            })
        })
        .transpose()
}

// ============================================================================
// SECTION: Indexed Parameters
// ============================================================================

/// Collects `{prefix}.N` values ordered by `N`.
#[must_use]
pub fn indexed_values(params: &FormParams, prefix: &str) -> Vec<String> {
    let mut values: BTreeMap<u32, String> = BTreeMap::new();
    for (key, value) in params {
        if let Some(index) = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|rest| rest.parse::<u32>().ok())
        {
            values.insert(index, value.clone());
        }
    }
    values.into_values().collect()
}

/// Collects `{prefix}.N.{key_field}` / `{prefix}.N.{value_field}` pairs.
/// Entries without a key are dropped; a missing value is empty.
#[must_use]
pub fn indexed_pairs(
    params: &FormParams,
    prefix: &str,
    key_field: &str,
    value_field: &str,
) -> BTreeMap<String, String> {
    let mut slots: BTreeMap<u32, (Option<String>, Option<String>)> = BTreeMap::new();
    for (key, value) in params {
        let Some((index, field)) = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|rest| rest.split_once('.'))
        else {
            continue;
        };
        let Ok(index) = index.parse::<u32>() else {
            continue;
        };
        let slot = slots.entry(index).or_default();
        if field == key_field {
            slot.0 = Some(value.clone());
        } else if field == value_field {
            slot.1 = Some(value.clone());
        }
    }
    slots
        .into_values()
        .filter_map(|(key, value)| key.map(|key| (key, value.unwrap_or_default())))
        .collect()
}

/// Returns the distinct indices `N` under `{prefix}.N.*`, ascending.
#[must_use]
pub fn indices(params: &FormParams, prefix: &str) -> Vec<u32> {
    let mut found: Vec<u32> = params
        .keys()
        .filter_map(|key| {
            key.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| rest.split('.').next())
                .and_then(|index| index.parse::<u32>().ok())
        })
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

// ============================================================================
// SECTION: Tests
// ============================================================================
