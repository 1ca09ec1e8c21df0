use serde_json::{Map, Value};

use super::settings::EMBEDDING_DIMENSION;
use crate::core::errors::NavigatorError;

pub fn validate_config(config: &Value) -> Result<(), NavigatorError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(app) = expect_optional_object(root, "app")? {
        validate_u64_field(
            app,
            "app.max_query_length",
            "max_query_length",
            1,
            1_000_000,
        )?;
        validate_optional_string_field(app, "app.log_level", "log_level")?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 1_000)?;
        let dimension = EMBEDDING_DIMENSION as u64;
        validate_u64_field(
            retrieval,
            "retrieval.embedding_dimension",
            "embedding_dimension",
            dimension,
            dimension,
        )?;
        validate_enum_field(
            retrieval,
            "retrieval.embedder",
            "embedder",
            &["hashing", "provider"],
        )?;
        validate_optional_string_field(retrieval, "retrieval.embedding_model", "embedding_model")?;
        validate_optional_string_field(
            retrieval,
            "retrieval.local_index_path",
            "local_index_path",
        )?;

        if let Some(managed) = expect_optional_object(retrieval, "managed")? {
            validate_optional_string_field(managed, "retrieval.managed.base_url", "base_url")?;
            validate_optional_string_field(managed, "retrieval.managed.api_key", "api_key")?;
            validate_optional_string_field(managed, "retrieval.managed.index_name", "index_name")?;
            validate_u64_field(
                managed,
                "retrieval.managed.timeout_secs",
                "timeout_secs",
                1,
                3_600,
            )?;
        }
    }

    if let Some(lookup) = expect_optional_object(root, "lookup")? {
        validate_u64_field(lookup, "lookup.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_u64_field(
            lookup,
            "lookup.requests_per_minute",
            "requests_per_minute",
            1,
            10_000,
        )?;
        validate_u64_field(lookup, "lookup.case_limit", "case_limit", 1, 100)?;

        if let Some(agent) = expect_optional_object(lookup, "agent")? {
            validate_bool_field(agent, "lookup.agent.enabled", "enabled")?;
            validate_optional_string_field(agent, "lookup.agent.model", "model")?;
        }
        for source in ["federal_register", "courtlistener"] {
            if let Some(section) = expect_optional_object(lookup, source)? {
                validate_optional_string_field(
                    section,
                    &format!("lookup.{}.base_url", source),
                    "base_url",
                )?;
                validate_optional_string_field(
                    section,
                    &format!("lookup.{}.api_key", source),
                    "api_key",
                )?;
            }
        }
    }

    if let Some(synthesis) = expect_optional_object(root, "synthesis")? {
        validate_u64_field(synthesis, "synthesis.top_n", "top_n", 1, 100)?;
        validate_u64_field(
            synthesis,
            "synthesis.passage_chars",
            "passage_chars",
            1,
            100_000,
        )?;
        validate_u64_field(
            synthesis,
            "synthesis.max_context_chars",
            "max_context_chars",
            1,
            1_000_000,
        )?;
        validate_u64_field(
            synthesis,
            "synthesis.snippet_chars",
            "snippet_chars",
            1,
            100_000,
        )?;

        if let Some(confidence) = expect_optional_object(synthesis, "confidence")? {
            for key in [
                "baseline",
                "per_source_bonus",
                "max_source_bonus",
                "live_lookup_bonus",
                "no_source_confidence",
                "placeholder_source_score",
            ] {
                validate_f64_field(
                    confidence,
                    &format!("synthesis.confidence.{}", key),
                    key,
                    0.0,
                    1.0,
                )?;
            }
        }
    }

    if let Some(classifier) = expect_optional_object(root, "classifier")? {
        validate_bool_field(classifier, "classifier.use_llm", "use_llm")?;
        for key in [
            "policy_status_keywords",
            "case_law_keywords",
            "compliance_keywords",
        ] {
            validate_string_array_field(classifier, &format!("classifier.{}", key), key)?;
        }
    }

    if let Some(actions) = expect_optional_object(root, "actions")? {
        validate_optional_string_field(actions, "actions.slack_webhook_url", "slack_webhook_url")?;
        validate_optional_string_field(actions, "actions.channel", "channel")?;
        validate_u64_field(actions, "actions.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, NavigatorError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), NavigatorError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), NavigatorError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(NavigatorError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), NavigatorError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(NavigatorError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), NavigatorError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), NavigatorError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(NavigatorError::Config(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), NavigatorError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(NavigatorError::Config(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> NavigatorError {
    NavigatorError::Config(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
