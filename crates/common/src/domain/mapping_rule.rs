use crate::domain::{FieldValue, PipelineResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which record a rule writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleLevel {
    Header,
    Line,
}

impl RuleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLevel::Header => "HEADER",
            RuleLevel::Line => "LINE",
        }
    }

    pub fn parse(value: &str) -> Option<RuleLevel> {
        match value {
            "HEADER" => Some(RuleLevel::Header),
            "LINE" => Some(RuleLevel::Line),
            _ => None,
        }
    }
}

/// Target column type a matched source value is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleDataType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
}

impl RuleDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleDataType::Text => "TEXT",
            RuleDataType::Integer => "INTEGER",
            RuleDataType::Decimal => "DECIMAL",
            RuleDataType::Boolean => "BOOLEAN",
            RuleDataType::Date => "DATE",
            RuleDataType::DateTime => "DATETIME",
        }
    }

    pub fn parse(value: &str) -> Option<RuleDataType> {
        match value {
            "TEXT" => Some(RuleDataType::Text),
            "INTEGER" => Some(RuleDataType::Integer),
            "DECIMAL" => Some(RuleDataType::Decimal),
            "BOOLEAN" => Some(RuleDataType::Boolean),
            "DATE" => Some(RuleDataType::Date),
            "DATETIME" => Some(RuleDataType::DateTime),
            _ => None,
        }
    }

    /// Coerce raw document text into the target type. The error carries the
    /// offending value so callers can name the failing rule.
    pub fn coerce(&self, raw: &str) -> Result<FieldValue, String> {
        match self {
            RuleDataType::Text => Ok(FieldValue::Text(raw.to_string())),
            RuleDataType::Integer => raw
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("'{}' is not an integer", raw)),
            RuleDataType::Decimal => Decimal::from_str(raw)
                .map(FieldValue::Decimal)
                .map_err(|_| format!("'{}' is not a decimal", raw)),
            RuleDataType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "y" | "yes" => Ok(FieldValue::Boolean(true)),
                "false" | "0" | "n" | "no" => Ok(FieldValue::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
            RuleDataType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", raw)),
            RuleDataType::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| format!("'{}' is not an RFC 3339 timestamp", raw)),
        }
    }
}

/// Named, side-effect-free text transformation applied before coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleTransformation {
    Trim,
    Uppercase,
    Lowercase,
}

impl RuleTransformation {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            RuleTransformation::Trim => raw.trim().to_string(),
            RuleTransformation::Uppercase => raw.to_uppercase(),
            RuleTransformation::Lowercase => raw.to_lowercase(),
        }
    }

    pub fn parse(value: &str) -> Option<RuleTransformation> {
        match value {
            "trim" => Some(RuleTransformation::Trim),
            "uppercase" => Some(RuleTransformation::Uppercase),
            "lowercase" => Some(RuleTransformation::Lowercase),
            _ => None,
        }
    }
}

/// One configurable source-path → target-field mapping, owned by an
/// interface configuration. Read-only during processing; applied in
/// ascending priority order with first valid match winning per target field.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRule {
    pub interface_id: String,
    pub source_path: String,
    pub target_field: String,
    pub level: RuleLevel,
    pub data_type: RuleDataType,
    pub required: bool,
    pub default_value: Option<String>,
    pub transformation: Option<RuleTransformation>,
    pub priority: i32,
    pub active: bool,
}

/// Read-only port over the mapping rule catalog. The catalog is owned by the
/// administration surface; the pipeline only queries it per interface.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MappingRuleRepository: Send + Sync {
    /// Active rules for an interface, ordered by ascending priority.
    async fn list_active_rules(&self, interface_id: &str) -> PipelineResult<Vec<MappingRule>>;
}
