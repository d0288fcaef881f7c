/// Time span of one planned segment, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSpan {
    pub index: usize,
    pub start: f64,
    pub duration: f64,
}

impl SegmentSpan {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Splits `[0, duration)` into contiguous spans of at most `max_segment`
/// seconds. The last span takes the remainder.
///
/// Returns an empty plan for non-positive or non-finite input.
pub fn plan_segments(duration: f64, max_segment: f64) -> Vec<SegmentSpan> {
    if !(duration.is_finite() && duration > 0.0 && max_segment.is_finite() && max_segment > 0.0)
    {
        return Vec::new();
    }

    if duration <= max_segment {
        return vec![SegmentSpan {
            index: 0,
            start: 0.0,
            duration,
        }];
    }

    let mut count = (duration / max_segment).ceil() as usize;
    // Rounding in the division can add an empty trailing span.
    if (count - 1) as f64 * max_segment >= duration {
        count -= 1;
    }

    (0..count)
        .map(|index| {
            let start = index as f64 * max_segment;
            let duration = if index + 1 == count {
                duration - start
            } else {
                max_segment
            };
            SegmentSpan {
                index,
                start,
                duration,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_short_media_is_one_segment() {
        let plan = plan_segments(600.0, 1800.0);
        assert_eq!(
            plan,
            vec![SegmentSpan {
                index: 0,
                start: 0.0,
                duration: 600.0
            }]
        );
    }

    #[test]
    fn test_sixty_five_minutes_is_three_segments() {
        let plan = plan_segments(65.0 * 60.0, 1800.0);
        let durations: Vec<f64> = plan.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![1800.0, 1800.0, 300.0]);
        let starts: Vec<f64> = plan.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0.0, 1800.0, 3600.0]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let plan = plan_segments(3600.0, 1800.0);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].duration, 1800.0);
    }

    #[test]
    fn test_degenerate_inputs_produce_no_plan() {
        assert!(plan_segments(0.0, 1800.0).is_empty());
        assert!(plan_segments(-5.0, 1800.0).is_empty());
        assert!(plan_segments(f64::NAN, 1800.0).is_empty());
        assert!(plan_segments(100.0, 0.0).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_within_limit_is_single_full_span(limit in 1u32..7200, frac in 0.0001f64..=1.0) {
            let limit = f64::from(limit);
            let duration = limit * frac;
            let plan = plan_segments(duration, limit);
            prop_assert_eq!(plan.len(), 1);
            prop_assert_eq!(plan[0].start, 0.0);
            prop_assert!((plan[0].duration - duration).abs() < EPSILON);
        }

        #[test]
        fn prop_spans_tile_the_duration(limit in 1u32..3600, duration in 1.0f64..200_000.0) {
            let limit = f64::from(limit);
            prop_assume!(duration > limit);
            let plan = plan_segments(duration, limit);

            let expected = (duration / limit).ceil() as usize;
            prop_assert!(plan.len() == expected || plan.len() + 1 == expected);
            prop_assert!((plan.len() as f64 - 1.0) * limit < duration);

            prop_assert_eq!(plan[0].start, 0.0);
            for (i, pair) in plan.windows(2).enumerate() {
                prop_assert_eq!(pair[0].index, i);
                prop_assert!((pair[0].end() - pair[1].start).abs() < EPSILON);
                prop_assert!((pair[0].duration - limit).abs() < EPSILON);
            }

            let last = plan[plan.len() - 1];
            let expected_tail = duration - limit * (plan.len() as f64 - 1.0);
            prop_assert!((last.duration - expected_tail).abs() < EPSILON);
            prop_assert!(last.duration > 0.0 && last.duration <= limit + EPSILON);
            prop_assert!((last.end() - duration).abs() < EPSILON);
        }
    }
}
