//! Attribute predicates for filtered nearest-neighbor search.
//!
//! Callers express predicates as a where-map: `{"status": "confirmed"}` for
//! equality, `{"commodity": ["copper", "gold"]}` for membership, or an operator
//! object such as `{"risk_score": {"$lte": 3}}`. Every condition is AND-ed.

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::RagError;
use crate::models::{Attributes, Environment, ENVIRONMENT_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOperator {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "$eq" => Some(FilterOperator::Eq),
            "$ne" => Some(FilterOperator::Ne),
            "$gt" => Some(FilterOperator::Gt),
            "$gte" => Some(FilterOperator::Gte),
            "$lt" => Some(FilterOperator::Lt),
            "$lte" => Some(FilterOperator::Lte),
            "$in" => Some(FilterOperator::In),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOperator,
    pub value: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub must: Vec<FilterCondition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.must.push(FilterCondition {
            field: field.into(),
            op: FilterOperator::Eq,
            value: value.into(),
        });
        self
    }

    /// Parses a where-map. Unknown operators or malformed operands are
    /// rejected rather than ignored.
    pub fn from_where(map: &JsonMap<String, JsonValue>) -> Result<Self, RagError> {
        let mut filter = Filter::new();
        for (field, expr) in map {
            match expr {
                JsonValue::Object(ops) => {
                    if ops.is_empty() {
                        return Err(RagError::InvalidQuery(format!("empty operator object for '{}'", field)));
                    }
                    for (raw_op, operand) in ops {
                        let op = FilterOperator::parse(raw_op).ok_or_else(|| {
                            RagError::InvalidQuery(format!("unsupported filter operator '{}'", raw_op))
                        })?;
                        filter.must.push(build_condition(field, op, operand)?);
                    }
                }
                JsonValue::Array(_) => filter.must.push(build_condition(field, FilterOperator::In, expr)?),
                _ => filter.must.push(build_condition(field, FilterOperator::Eq, expr)?),
            }
        }
        Ok(filter)
    }

    /// Conjoins the environment partition. Any caller condition on the
    /// environment key is kept, so a contradicting one simply matches nothing.
    pub fn scoped_to(mut self, environment: Environment) -> Self {
        self.must.push(FilterCondition {
            field: ENVIRONMENT_KEY.to_string(),
            op: FilterOperator::Eq,
            value: JsonValue::String(environment.as_str().to_string()),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.must.iter().all(|cond| evaluate_condition(attributes, cond))
    }
}

fn build_condition(field: &str, op: FilterOperator, operand: &JsonValue) -> Result<FilterCondition, RagError> {
    let valid = match op {
        FilterOperator::Eq | FilterOperator::Ne => is_scalar(operand),
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => operand.is_number(),
        FilterOperator::In => operand
            .as_array()
            .is_some_and(|items| !items.is_empty() && items.iter().all(is_scalar)),
    };
    if !valid {
        return Err(RagError::InvalidQuery(format!(
            "invalid operand for '{}' ({:?}): {}",
            field, op, operand
        )));
    }
    Ok(FilterCondition {
        field: field.to_string(),
        op,
        value: operand.clone(),
    })
}

fn is_scalar(value: &JsonValue) -> bool {
    matches!(value, JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_))
}

fn evaluate_condition(attributes: &Attributes, cond: &FilterCondition) -> bool {
    let field_value = match attributes.get(&cond.field) {
        Some(v) => v,
        None => return false,
    };

    match cond.op {
        FilterOperator::Eq => value_eq(&field_value, &cond.value),
        FilterOperator::Ne => !value_eq(&field_value, &cond.value),
        FilterOperator::Gt => json_cmp(&field_value, &cond.value).is_some_and(|o| o.is_gt()),
        FilterOperator::Gte => json_cmp(&field_value, &cond.value).is_some_and(|o| o.is_ge()),
        FilterOperator::Lt => json_cmp(&field_value, &cond.value).is_some_and(|o| o.is_lt()),
        FilterOperator::Lte => json_cmp(&field_value, &cond.value).is_some_and(|o| o.is_le()),
        FilterOperator::In => cond
            .value
            .as_array()
            .is_some_and(|vals| vals.iter().any(|v| value_eq(&field_value, v))),
    }
}

/// List-valued attributes match when any element matches.
fn value_eq(field: &JsonValue, expected: &JsonValue) -> bool {
    match field {
        JsonValue::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        other => scalar_eq(other, expected),
    }
}

fn scalar_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => (fx - fy).abs() < f64::EPSILON,
            _ => false,
        },
        _ => false,
    }
}

fn json_cmp(field: &JsonValue, operand: &JsonValue) -> Option<std::cmp::Ordering> {
    field.as_f64()?.partial_cmp(&operand.as_f64()?)
}
