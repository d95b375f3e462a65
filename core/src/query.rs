//! Search conditions for the `find` endpoints.
//!
//! Operators travel as integers on the wire.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Comparison applied between a field and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FieldOperator {
    #[default]
    Equals = 0,
    GreaterThan = 1,
    GreaterThanOrEqual = 2,
    In = 3,
    LessThan = 4,
    LessThanOrEqual = 5,
    NotEqual = 6,
    NotIn = 7,
    Expression = 8,
    Modulo = 9,
    Regex = 10,
    TextStartsWith = 11,
    TextContains = 12,
    TextEndsWith = 13,
    All = 14,
    Length = 15,
}

impl FieldOperator {
    const ALL: [FieldOperator; 16] = [
        FieldOperator::Equals,
        FieldOperator::GreaterThan,
        FieldOperator::GreaterThanOrEqual,
        FieldOperator::In,
        FieldOperator::LessThan,
        FieldOperator::LessThanOrEqual,
        FieldOperator::NotEqual,
        FieldOperator::NotIn,
        FieldOperator::Expression,
        FieldOperator::Modulo,
        FieldOperator::Regex,
        FieldOperator::TextStartsWith,
        FieldOperator::TextContains,
        FieldOperator::TextEndsWith,
        FieldOperator::All,
        FieldOperator::Length,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

/// How a condition combines with the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LogicalOperator {
    #[default]
    And = 0,
    Or = 1,
    AndNot = 2,
    OrNot = 3,
}

impl LogicalOperator {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LogicalOperator::And),
            1 => Some(LogicalOperator::Or),
            2 => Some(LogicalOperator::AndNot),
            3 => Some(LogicalOperator::OrNot),
            _ => None,
        }
    }
}

macro_rules! integer_serde {
    ($ty:ident, $name:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(*self as u8)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = u8::deserialize(deserializer)?;
                $ty::from_code(code).ok_or_else(|| {
                    de::Error::custom(format!("unknown {} code {code}", $name))
                })
            }
        }
    };
}

integer_serde!(FieldOperator, "field operator");
integer_serde!(LogicalOperator, "logical operator");

fn is_false(value: &bool) -> bool {
    !*value
}

/// One search condition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    #[serde(default)]
    pub operator: FieldOperator,
    #[serde(default, skip_serializing_if = "is_false")]
    pub leaf_negate: bool,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_operator: Option<FieldOperator>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_logical_operator: Option<LogicalOperator>,
}

impl Query {
    /// `field == value`, AND-ed with preceding conditions.
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_operator(mut self, operator: FieldOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn or(mut self) -> Self {
        self.logical_operator = LogicalOperator::Or;
        self
    }

    pub fn negated(mut self) -> Self {
        self.leaf_negate = true;
        self
    }
}

/// Body of the `find` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
    pub type_key: String,
    pub queries: Vec<Query>,
    pub page_number: i64,
    pub page_size: i64,
}

pub const DEFAULT_PAGE_NUMBER: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

impl FindRequest {
    pub fn new(type_key: impl Into<String>, queries: Vec<Query>) -> Self {
        Self {
            type_key: type_key.into(),
            queries,
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_serialize_as_integers() {
        assert_eq!(serde_json::to_string(&FieldOperator::TextContains).unwrap(), "12");
        assert_eq!(serde_json::to_string(&LogicalOperator::OrNot).unwrap(), "3");
        let op: FieldOperator = serde_json::from_str("15").unwrap();
        assert_eq!(op, FieldOperator::Length);
    }

    #[test]
    fn unknown_operator_code_is_rejected() {
        let err = serde_json::from_str::<FieldOperator>("16").unwrap_err();
        assert!(err.to_string().contains("unknown field operator code 16"));
        assert!(serde_json::from_str::<LogicalOperator>("4").is_err());
    }

    #[test]
    fn equals_query_omits_optional_fields() {
        let q = Query::equals("TrackingNumber", "778756");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "logicalOperator": 0,
                "operator": 0,
                "field": "TrackingNumber",
                "value": "778756"
            })
        );
    }

    #[test]
    fn builder_helpers_set_operators() {
        let q = Query::equals("Subject", "deposit")
            .with_operator(FieldOperator::TextContains)
            .or()
            .negated();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["operator"], 12);
        assert_eq!(json["logicalOperator"], 1);
        assert_eq!(json["leafNegate"], true);
    }

    #[test]
    fn find_request_uses_default_paging() {
        let req = FindRequest::new("BankAccount", vec![Query::equals("A", "1")]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["typeKey"], "BankAccount");
        assert_eq!(json["pageNumber"], 1);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["queries"].as_array().unwrap().len(), 1);
    }
}
