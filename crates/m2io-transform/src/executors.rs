//! Directive executors.
//!
//! Each executor reads the source attributes of one record and derives the
//! value for one target attribute. Nulls never reach an operator: they are
//! skipped, and an input with no non-null value yields null (except `count`,
//! which yields zero).

use std::cmp::Ordering;

use m2io_map::{AggregateOp, Combinator, ResolvedDirective};
use m2io_model::{AttributeType, Record, Value};

/// A source attribute an aggregate could not read as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NotNumeric<'a> {
    pub attribute: &'a str,
    pub op: AggregateOp,
}

/// Derive the uncoerced value of a mapped directive. `Unmapped` yields null.
pub(crate) fn derive_value<'a>(
    directive: &'a ResolvedDirective,
    record: &Record,
) -> Result<Value, NotNumeric<'a>> {
    match directive {
        ResolvedDirective::Identity { source } | ResolvedDirective::Rename { source } => {
            Ok(record.value(source).clone())
        }
        ResolvedDirective::Aggregate { op, sources } => aggregate(*op, sources, record),
        ResolvedDirective::Combine {
            combinator,
            sources,
        } => Ok(combine(*combinator, sources, record)),
        ResolvedDirective::Unmapped => Ok(Value::Null),
    }
}

pub(crate) fn aggregate<'a>(
    op: AggregateOp,
    sources: &'a [String],
    record: &Record,
) -> Result<Value, NotNumeric<'a>> {
    let present = present_values(sources, record);
    if op == AggregateOp::Count {
        return Ok(Value::Integer(i64::try_from(present.len()).unwrap_or(i64::MAX)));
    }
    if present.is_empty() {
        return Ok(Value::Null);
    }
    match op {
        AggregateOp::First => Ok(present[0].1.clone()),
        AggregateOp::Last => Ok(present[present.len() - 1].1.clone()),
        AggregateOp::Concat => Ok(Value::Text(
            present.iter().map(|(_, value)| value.render()).collect(),
        )),
        _ => {
            let numbers = present
                .into_iter()
                .map(|(attribute, value)| match value.coerce(AttributeType::Numeric) {
                    Ok(number @ (Value::Integer(_) | Value::Float(_))) => Ok(number),
                    _ => Err(NotNumeric { attribute, op }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(fold_numbers(op, &numbers))
        }
    }
}

/// Sum, mean, min or max over non-empty numeric values.
fn fold_numbers(op: AggregateOp, numbers: &[Value]) -> Value {
    match op {
        AggregateOp::Sum => sum(numbers),
        AggregateOp::Mean => {
            let total: f64 = numbers.iter().filter_map(Value::as_f64).sum();
            Value::Float(total / numbers.len() as f64)
        }
        AggregateOp::Min => extreme(numbers, Ordering::Less),
        AggregateOp::Max => extreme(numbers, Ordering::Greater),
        _ => Value::Null,
    }
}

/// Integer sum while every input is an integer and nothing overflows,
/// otherwise a float sum.
fn sum(numbers: &[Value]) -> Value {
    let integers = numbers.iter().try_fold(0i64, |total, value| match value {
        Value::Integer(n) => total.checked_add(*n),
        _ => None,
    });
    match integers {
        Some(total) => Value::Integer(total),
        None => Value::Float(numbers.iter().filter_map(Value::as_f64).sum()),
    }
}

fn extreme(numbers: &[Value], wanted: Ordering) -> Value {
    let mut best = &numbers[0];
    for candidate in &numbers[1..] {
        let ordering = candidate
            .as_f64()
            .zip(best.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b));
        if ordering == Some(wanted) {
            best = candidate;
        }
    }
    best.clone()
}

pub(crate) fn combine(combinator: Combinator, sources: &[String], record: &Record) -> Value {
    let present = present_values(sources, record);
    if present.is_empty() {
        return Value::Null;
    }
    match combinator.separator() {
        Some(separator) => Value::Text(
            present
                .iter()
                .map(|(_, value)| value.render())
                .collect::<Vec<_>>()
                .join(separator),
        ),
        None => present[0].1.clone(),
    }
}

fn present_values<'a, 'r>(sources: &'a [String], record: &'r Record) -> Vec<(&'a str, &'r Value)> {
    sources
        .iter()
        .map(|name| (name.as_str(), record.value(name)))
        .filter(|(_, value)| !value.is_null())
        .collect()
}
