//! Desired replica count from a metric reading and its target.

use scalegrid_core::{MetricTarget, MetricTargetType};

/// Replicas a single metric asks for.
///
/// ```text
/// AverageValue: ceil(value / target)
/// Value:        ceil(max(current, 1) * value / target)
/// ```
///
/// Returns `None` for a non-positive target. Negative values ask for 0.
pub fn desired_for_metric(target: &MetricTarget, value: i64, current: u32) -> Option<u32> {
    let amount = target.amount();
    if amount <= 0 {
        return None;
    }

    let value = i128::from(value.max(0));
    let amount = i128::from(amount);
    let numerator = match target.target_type() {
        MetricTargetType::AverageValue => value,
        MetricTargetType::Value => value * i128::from(current.max(1)),
    };

    let desired = (numerator + amount - 1) / amount;
    Some(u32::try_from(desired).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avg(amount: i64) -> MetricTarget {
        MetricTarget::new(MetricTargetType::AverageValue, amount)
    }

    fn val(amount: i64) -> MetricTarget {
        MetricTarget::new(MetricTargetType::Value, amount)
    }

    #[test]
    fn average_value_divides_total() {
        assert_eq!(desired_for_metric(&avg(5), 20, 1), Some(4));
        assert_eq!(desired_for_metric(&avg(5), 21, 1), Some(5));
        assert_eq!(desired_for_metric(&avg(1), 1, 0), Some(1));
        assert_eq!(desired_for_metric(&avg(10), 0, 3), Some(0));
    }

    #[test]
    fn value_scales_current_replicas() {
        // 4 replicas at 2x target -> 8.
        assert_eq!(desired_for_metric(&val(50), 100, 4), Some(8));
        // From zero the current count counts as one.
        assert_eq!(desired_for_metric(&val(10), 30, 0), Some(3));
    }

    #[test]
    fn non_positive_target_proposes_nothing() {
        assert_eq!(desired_for_metric(&avg(0), 10, 1), None);
        assert_eq!(desired_for_metric(&val(-1), 10, 1), None);
    }

    #[test]
    fn negative_value_asks_for_zero() {
        assert_eq!(desired_for_metric(&avg(5), -20, 2), Some(0));
    }

    #[test]
    fn huge_values_saturate() {
        assert_eq!(desired_for_metric(&avg(1), i64::MAX, 1), Some(u32::MAX));
        assert_eq!(desired_for_metric(&val(1), i64::MAX, u32::MAX), Some(u32::MAX));
    }
}
