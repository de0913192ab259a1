// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The aggregation iterator (spec §4.6): buckets a fetch result by
//! `(item, property, context)` and by `floor((end - time) / interval)`,
//! emitting one aggregated tuple per bucket.
//!
//! **Unit decision (open question).** The distilled spec calls `interval`
//! "milliseconds of wall time" in §4.6 while every other use of `time` in
//! this crate (§3, the row format, the writer's week math) is
//! seconds-resolution. Carrying a lone millisecond-denominated parameter
//! through an otherwise all-seconds system would make every call site a
//! silent unit-conversion trap, so this crate resolves the inconsistency
//! by treating `interval`, like `time`, as seconds — see DESIGN.md.

use crate::error::{Error, Result};
use crate::tuple::Tuple;
use crate::value::Value;
use std::collections::HashMap;

/// One of the aggregation operators the Store API's `fetch` accepts as
/// `op` (spec §4.1, §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregationOp {
    Min,
    Max,
    Avg,
    Sum,
    Count,
    First,
    Last,
}

impl AggregationOp {
    /// Parses the Store API's lowercase operator name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "avg" => Some(Self::Avg),
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            _ => None,
        }
    }

    fn requires_numeric(self) -> bool {
        matches!(self, Self::Min | Self::Max | Self::Avg | Self::Sum)
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct GroupKey {
    item: String,
    property: String,
    context: String,
}

/// Buckets `tuples` (already restricted to `[begin, end]` by the caller)
/// and emits one tuple per `(item, property, context, bucket)`, ordered by
/// the property order of first appearance in `tuples`, then by strictly
/// decreasing time within each group (spec §4.6).
///
/// # Errors
///
/// Returns [`Error::UnsupportedAggregation`] if `op` is one of
/// `min`/`max`/`avg`/`sum` and any tuple in a bucket holds a non-numeric
/// value.
pub fn aggregate(tuples: Vec<Tuple>, end: i64, interval: i64, op: AggregationOp) -> Result<Vec<Tuple>> {
    let mut group_order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, Vec<(i64, Tuple)>> = HashMap::new();

    for tuple in tuples {
        let key = GroupKey {
            item: tuple.item.clone(),
            property: tuple.property.clone(),
            context: tuple.context.clone(),
        };
        let bucket = bucket_of(end, interval, tuple.time);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                group_order.push(key.clone());
                Vec::new()
            })
            .push((bucket, tuple));
    }

    let mut out = Vec::new();
    for key in group_order {
        let mut members = groups.remove(&key).unwrap_or_default();
        // Stable grouping by bucket, buckets visited in ascending order
        // (= strictly decreasing representative time, per the module doc).
        members.sort_by_key(|(bucket, _)| *bucket);

        let mut start = 0;
        while start < members.len() {
            let bucket = members[start].0;
            let mut end_idx = start;
            while end_idx < members.len() && members[end_idx].0 == bucket {
                end_idx += 1;
            }
            let bucket_members: Vec<&Tuple> = members[start..end_idx].iter().map(|(_, t)| t).collect();
            let value = aggregate_bucket(&bucket_members, op)?;
            let repr_time = bucket_representative_time(end, interval, bucket);
            out.push(Tuple::new(
                key.item.clone(),
                key.property.clone(),
                key.context.clone(),
                repr_time,
                0,
                value,
            ));
            start = end_idx;
        }
    }

    Ok(out)
}

fn bucket_of(end: i64, interval: i64, time: i64) -> i64 {
    if interval <= 0 {
        return 0;
    }
    (end - time).div_euclid(interval)
}

fn bucket_representative_time(end: i64, interval: i64, bucket: i64) -> i64 {
    if interval <= 0 {
        return end;
    }
    end - bucket * interval
}

/// Aggregates one bucket's tuples, in their iteration order (the order
/// they were encountered in the underlying fetch sequence) — this is what
/// makes `first`/`last` well-defined without re-sorting the bucket.
fn aggregate_bucket(members: &[&Tuple], op: AggregationOp) -> Result<Value> {
    if op.requires_numeric() {
        let numbers: Option<Vec<f64>> = members.iter().map(|t| t.value.as_f64()).collect();
        let Some(numbers) = numbers else {
            return Err(Error::UnsupportedAggregation);
        };
        let value = match op {
            AggregationOp::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationOp::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationOp::Sum => numbers.iter().sum(),
            AggregationOp::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
            AggregationOp::Count | AggregationOp::First | AggregationOp::Last => {
                unreachable!("not numeric ops")
            }
        };
        return Ok(Value::Float64(value));
    }

    match op {
        AggregationOp::Count => Ok(Value::Int64(members.len() as i64)),
        AggregationOp::First => Ok(members.first().map(|t| t.value.clone()).unwrap_or(Value::Bool(false))),
        AggregationOp::Last => Ok(members.last().map(|t| t.value.clone()).unwrap_or(Value::Bool(false))),
        _ => unreachable!("numeric ops handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(time: i64, value: f64) -> Tuple {
        Tuple::new("http://i", "http://p", "http://c", time, 0, Value::Float64(value))
    }

    #[test]
    fn scenario_s6_average_over_two_buckets() {
        let tuples = vec![t(10, 1.0), t(20, 2.0), t(30, 3.0), t(40, 4.0)];
        let result = aggregate(tuples, 40, 20, AggregationOp::Avg).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].time, 40);
        assert_eq!(result[0].value, Value::Float64(3.5));
        assert_eq!(result[1].time, 20);
        assert_eq!(result[1].value, Value::Float64(1.5));
    }

    #[test]
    fn count_does_not_require_numeric_values() {
        let tuples = vec![
            Tuple::new("http://i", "http://p", "http://c", 10, 0, Value::String("a".into())),
            Tuple::new("http://i", "http://p", "http://c", 15, 0, Value::String("b".into())),
        ];
        let result = aggregate(tuples, 20, 0, AggregationOp::Count).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].value, Value::Int64(2));
    }

    #[test]
    fn min_over_non_numeric_fails() {
        let tuples = vec![Tuple::new(
            "http://i",
            "http://p",
            "http://c",
            10,
            0,
            Value::String("a".into()),
        )];
        assert!(matches!(
            aggregate(tuples, 10, 0, AggregationOp::Min),
            Err(Error::UnsupportedAggregation)
        ));
    }

    #[test]
    fn idempotent_for_min_max_first_last() {
        let tuples = vec![t(10, 1.0), t(20, 2.0), t(30, 3.0), t(40, 4.0)];
        for op in [AggregationOp::Min, AggregationOp::Max, AggregationOp::First, AggregationOp::Last] {
            let once = aggregate(tuples.clone(), 40, 20, op).unwrap();
            let twice = aggregate(once.clone(), 40, 20, op).unwrap();
            assert_eq!(once, twice, "op {op:?} should be idempotent");
        }
    }
}
