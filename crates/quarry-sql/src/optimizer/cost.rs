//! Selection and output-size estimates.

use tracing::warn;

use quarry_common::RANGE_SELECTIVITY_DIVISOR;
use quarry_storage::Schema;

use crate::parser::{CompOp, Comparison};

/// Applies one pushed-down comparison to `schema`'s statistics.
///
/// The comparison is estimated against its first attribute operand; a
/// literal on the left is normalized by flipping the comparison.
/// - `=` divides the tuple count by the attribute's distinct count and sets
///   that count to 1.
/// - `<` and `>` divide the tuple count by `min(distinct, 3)` and scale the
///   distinct count down by the same factor.
///
/// Attributes without a usable distinct count are skipped.
pub fn estimate_selection(schema: &mut Schema, comparison: &Comparison) {
    let comparison = if comparison.left.is_literal() {
        comparison.flipped()
    } else {
        comparison.clone()
    };
    let Some(name) = comparison.left.attribute() else {
        return;
    };
    let Ok(Some(position)) = schema.find(name) else {
        return;
    };
    let tuples = schema.tuples();
    let Some(attr) = schema.attribute_mut(position) else {
        return;
    };
    let distinct = attr.distinct;
    if distinct < 1 {
        warn!(attribute = name, "no distinct-value estimate, selection not estimated");
        return;
    }

    let tuples = match comparison.op {
        CompOp::Eq => {
            attr.distinct = 1;
            tuples / distinct
        }
        CompOp::Lt | CompOp::Gt => {
            let factor = distinct.min(RANGE_SELECTIVITY_DIVISOR);
            attr.distinct = (distinct / factor).max(1);
            tuples / factor
        }
    };
    schema.set_tuples(tuples);
}

/// Output estimate for grouping and duplicate removal:
/// `min(input / 2, product of distinct counts)`.
pub fn distinct_output_estimate(input_tuples: u64, schema: &Schema) -> u64 {
    (input_tuples / 2).min(schema.distinct_product())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Operand;
    use quarry_storage::{Attribute, DataType};

    fn schema(tuples: u64, distinct: u64) -> Schema {
        Schema::new(
            vec![
                Attribute::new("a", DataType::Integer).with_distinct(distinct),
                Attribute::new("b", DataType::Integer).with_distinct(7),
            ],
            tuples,
        )
    }

    fn cmp(op: CompOp) -> Comparison {
        Comparison::new(Operand::Attribute("a".into()), op, Operand::Int(3))
    }

    #[test]
    fn test_equality() {
        let mut s = schema(1000, 50);
        estimate_selection(&mut s, &cmp(CompOp::Eq));
        assert_eq!(s.tuples(), 20);
        assert_eq!(s.attribute(0).unwrap().distinct, 1);
        assert_eq!(s.attribute(1).unwrap().distinct, 7);
    }

    #[test]
    fn test_range_and_flip() {
        let mut s = schema(1000, 50);
        estimate_selection(&mut s, &cmp(CompOp::Lt).flipped());
        assert_eq!(s.tuples(), 333);
        assert_eq!(s.attribute(0).unwrap().distinct, 16);

        let mut small = schema(10, 2);
        estimate_selection(&mut small, &cmp(CompOp::Gt));
        assert_eq!(small.tuples(), 5);
        assert_eq!(small.attribute(0).unwrap().distinct, 1);
    }

    #[test]
    fn test_missing_statistics_skipped() {
        let mut s = schema(1000, 0);
        estimate_selection(&mut s, &cmp(CompOp::Eq));
        assert_eq!(s.tuples(), 1000);
    }

    #[test]
    fn test_distinct_output() {
        assert_eq!(distinct_output_estimate(1000, &schema(0, 4)), 28);
        assert_eq!(distinct_output_estimate(10, &schema(0, 4)), 5);
    }
}
