//! Fixed-width time binning
//!
//! Groups a participant's samples into half-open bins `[start, start + width)`
//! aligned to an origin time-of-day, and summarizes each bin:
//! - hours worn (worn sample count times the declared sample duration)
//! - mean/min/max of worn numeric values
//! - most frequent worn categorical value
//!
//! Every bin between the first and last sample is emitted, including empty
//! ones, so charts show gaps instead of compressing the time axis.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};

use crate::config::{total_nanos, BinConfig};
use crate::error::ConfigError;
use crate::types::{BinSummary, NormalizedSample, SampleValue, ValueStats};

/// Aggregator turning samples into per-bin summaries
pub struct BinAggregator;

impl BinAggregator {
    /// Aggregate one participant's samples into chronologically ordered bins.
    ///
    /// Samples do not need to be sorted. An empty input yields no bins.
    pub fn aggregate(
        samples: &[NormalizedSample],
        config: &BinConfig,
    ) -> Result<Vec<BinSummary>, ConfigError> {
        config.validate()?;

        let (first, last) = match time_span(samples) {
            Some(span) => span,
            None => return Ok(Vec::new()),
        };

        let width_ns = total_nanos(config.bin_width());
        let anchor = first.date().and_time(config.origin());
        let bin_index = |ts: NaiveDateTime| total_nanos(ts - anchor).div_euclid(width_ns);

        let first_idx = bin_index(first);
        let last_idx = bin_index(last);
        let bin_count = (last_idx - first_idx + 1) as usize;

        let mut accumulators: Vec<BinAccumulator> =
            (0..bin_count).map(|_| BinAccumulator::default()).collect();

        for sample in samples {
            let slot = (bin_index(sample.timestamp) - first_idx) as usize;
            accumulators[slot].add(sample);
        }

        let participant_id = samples[0].participant_id.clone();
        let width_hours = config.bin_width_hours();
        let sample_hours = config.worn_sample_hours();

        let summaries = accumulators
            .into_iter()
            .enumerate()
            .map(|(offset, acc)| {
                let idx = first_idx + offset as i128;
                BinSummary {
                    participant_id: participant_id.clone(),
                    bin_start: anchor + duration_from_nanos(idx * width_ns),
                    bin_end: anchor + duration_from_nanos((idx + 1) * width_ns),
                    hours_worn: (acc.worn_count as f64 * sample_hours).min(width_hours),
                    sample_count: acc.sample_count,
                    worn_count: acc.worn_count,
                    stats: acc.stats(),
                    dominant_category: acc.dominant_category(),
                }
            })
            .collect();

        Ok(summaries)
    }
}

const NANOS_PER_SEC: i128 = 1_000_000_000;

fn duration_from_nanos(nanos: i128) -> Duration {
    let secs = nanos.div_euclid(NANOS_PER_SEC) as i64;
    let sub = nanos.rem_euclid(NANOS_PER_SEC) as i64;
    Duration::seconds(secs) + Duration::nanoseconds(sub)
}

fn time_span(samples: &[NormalizedSample]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let first = samples.iter().map(|s| s.timestamp).min()?;
    let last = samples.iter().map(|s| s.timestamp).max()?;
    Some((first, last))
}

/// Running totals for one bin
#[derive(Default)]
struct BinAccumulator {
    sample_count: usize,
    worn_count: usize,
    values: Vec<f64>,
    categories: BTreeMap<String, usize>,
}

impl BinAccumulator {
    fn add(&mut self, sample: &NormalizedSample) {
        self.sample_count += 1;
        if !sample.is_worn {
            return;
        }
        self.worn_count += 1;
        match &sample.value {
            Some(SampleValue::Numeric(v)) => self.values.push(*v),
            Some(SampleValue::Categorical(c)) => *self.categories.entry(c.clone()).or_insert(0) += 1,
            None => {}
        }
    }

    fn stats(&self) -> Option<ValueStats> {
        if self.values.is_empty() {
            return None;
        }
        let count = self.values.len();
        let sum: f64 = self.values.iter().sum();
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(ValueStats {
            mean: sum / count as f64,
            min,
            max,
            count,
        })
    }

    /// Highest count wins; ties go to the lexicographically smallest value
    fn dominant_category(&self) -> Option<String> {
        let mut best: Option<(&String, usize)> = None;
        for (category, &count) in &self.categories {
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((category, count));
            }
        }
        best.map(|(c, _)| c.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticipantId;
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample(ts: NaiveDateTime, worn: bool, value: Option<f64>) -> NormalizedSample {
        NormalizedSample {
            participant_id: ParticipantId::new("HC_009"),
            timestamp: ts,
            value: value.map(SampleValue::Numeric),
            is_worn: worn,
            line: 0,
            source_day: None,
        }
    }

    fn hourly(sample_minutes: i64) -> BinConfig {
        BinConfig::hourly(Duration::minutes(sample_minutes)).unwrap()
    }

    #[test]
    fn test_worn_hours_and_mean_scenario() {
        let samples = vec![
            sample(at(8, 0), true, Some(10.0)),
            sample(at(8, 30), true, Some(20.0)),
            sample(at(9, 15), false, None),
        ];

        let bins = BinAggregator::aggregate(&samples, &hourly(30)).unwrap();

        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].bin_start, at(8, 0));
        assert_eq!(bins[0].bin_end, at(9, 0));
        assert_eq!(bins[0].hours_worn, 1.0);
        assert_eq!(bins[0].stats.unwrap().mean, 15.0);
        assert_eq!(bins[0].stats.unwrap().min, 10.0);
        assert_eq!(bins[0].stats.unwrap().max, 20.0);

        assert_eq!(bins[1].bin_start, at(9, 0));
        assert_eq!(bins[1].hours_worn, 0.0);
        assert_eq!(bins[1].sample_count, 1);
        assert_eq!(bins[1].stats, None);
        assert!(bins[1].is_gap());
    }

    #[test]
    fn test_empty_input_yields_no_bins() {
        let bins = BinAggregator::aggregate(&[], &hourly(1)).unwrap();
        assert!(bins.is_empty());
    }

    #[test]
    fn test_boundary_sample_goes_to_later_bin() {
        let samples = vec![sample(at(8, 59), true, Some(1.0)), sample(at(9, 0), true, Some(2.0))];

        let bins = BinAggregator::aggregate(&samples, &hourly(1)).unwrap();

        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].stats.unwrap().max, 1.0);
        assert_eq!(bins[1].bin_start, at(9, 0));
        assert_eq!(bins[1].stats.unwrap().min, 2.0);
    }

    #[test]
    fn test_gaps_are_emitted_contiguously() {
        let samples = vec![sample(at(14, 10), true, Some(1.0)), sample(at(2, 5), true, Some(1.0))];

        let bins = BinAggregator::aggregate(&samples, &hourly(1)).unwrap();

        assert_eq!(bins.len(), 13);
        assert_eq!(bins[0].bin_start, at(2, 0));
        for pair in bins.windows(2) {
            assert_eq!(pair[0].bin_end, pair[1].bin_start);
        }
        assert_eq!(bins.iter().filter(|b| b.is_gap()).count(), 11);
        assert!(bins[5].is_gap());
        assert_eq!(bins[5].hours_worn, 0.0);
    }

    #[test]
    fn test_worn_time_is_conserved() {
        let samples: Vec<_> = (0..150)
            .map(|m| sample(at(7, 0) + Duration::minutes(m), m % 3 != 0, Some(m as f64)))
            .collect();
        let worn = samples.iter().filter(|s| s.is_worn).count() as f64;

        let bins = BinAggregator::aggregate(&samples, &hourly(1)).unwrap();

        let total: f64 = bins.iter().map(|b| b.hours_worn).sum();
        assert!((total - worn / 60.0).abs() < 1e-9);
        assert_eq!(bins.iter().map(|b| b.sample_count).sum::<usize>(), 150);
    }

    #[test]
    fn test_hours_worn_clipped_to_bin_width() {
        let samples: Vec<_> = (0..10)
            .map(|m| sample(at(8, m), true, Some(1.0)))
            .collect();

        let bins = BinAggregator::aggregate(&samples, &hourly(30)).unwrap();

        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].hours_worn, 1.0);
    }

    #[test]
    fn test_origin_alignment() {
        let config = BinConfig::new(
            Duration::hours(4),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            Duration::minutes(1),
        )
        .unwrap();
        // 05:00 is before the 06:00 origin on the same day: belongs to [02:00, 06:00)
        let samples = vec![sample(at(5, 0), true, Some(1.0)), sample(at(11, 0), true, Some(1.0))];

        let bins = BinAggregator::aggregate(&samples, &config).unwrap();

        let starts: Vec<_> = bins.iter().map(|b| b.bin_start).collect();
        assert_eq!(starts, vec![at(2, 0), at(6, 0), at(10, 0)]);
        assert!(bins[1].is_gap());
    }

    #[test]
    fn test_zero_is_a_value_not_a_gap() {
        let samples = vec![sample(at(8, 0), true, Some(0.0))];

        let bins = BinAggregator::aggregate(&samples, &hourly(1)).unwrap();

        assert_eq!(bins[0].stats.unwrap().mean, 0.0);
        assert!(!bins[0].is_gap());
    }

    #[test]
    fn test_unworn_values_excluded_from_stats() {
        let samples = vec![
            sample(at(8, 0), true, Some(10.0)),
            sample(at(8, 1), false, Some(1000.0)),
        ];

        let bins = BinAggregator::aggregate(&samples, &hourly(1)).unwrap();

        assert_eq!(bins[0].stats.unwrap().max, 10.0);
        assert_eq!(bins[0].stats.unwrap().count, 1);
        assert_eq!(bins[0].sample_count, 2);
        assert_eq!(bins[0].worn_count, 1);
    }

    #[test]
    fn test_dominant_category() {
        let mk = |m, c: &str| NormalizedSample {
            value: Some(SampleValue::Categorical(c.to_string())),
            ..sample(at(8, m), true, None)
        };
        let samples = vec![mk(0, "rem"), mk(1, "deep"), mk(2, "rem"), mk(3, "deep"), mk(4, "light")];

        let bins = BinAggregator::aggregate(&samples, &hourly(1)).unwrap();

        assert_eq!(bins[0].dominant_category.as_deref(), Some("deep"));
        assert_eq!(bins[0].stats, None);
    }

    #[test]
    fn test_sub_millisecond_width_bins_are_contiguous() {
        let config =
            BinConfig::new(Duration::microseconds(1500), NaiveTime::MIN, Duration::microseconds(100))
                .unwrap();
        let samples = vec![
            sample(at(8, 0), true, Some(1.0)),
            sample(at(8, 0) + Duration::milliseconds(1), true, Some(2.0)),
            sample(at(8, 0) + Duration::milliseconds(4), true, Some(3.0)),
        ];

        let bins = BinAggregator::aggregate(&samples, &config).unwrap();

        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].bin_start, at(8, 0));
        assert_eq!(bins[0].bin_end, at(8, 0) + Duration::microseconds(1500));
        for pair in bins.windows(2) {
            assert_eq!(pair[0].bin_end, pair[1].bin_start);
        }
        assert_eq!(bins[0].sample_count, 2);
        assert!(bins[1].is_gap());
        assert_eq!(bins[2].bin_start, at(8, 0) + Duration::microseconds(3000));
        assert_eq!(bins[2].stats.unwrap().mean, 3.0);
    }

    #[test]
    fn test_width_below_one_millisecond_does_not_panic() {
        let config =
            BinConfig::new(Duration::microseconds(500), NaiveTime::MIN, Duration::microseconds(500))
                .unwrap();
        let samples = vec![
            sample(at(8, 0), true, Some(1.0)),
            sample(at(8, 0) + Duration::microseconds(750), true, Some(2.0)),
        ];

        let bins = BinAggregator::aggregate(&samples, &config).unwrap();

        assert_eq!(bins.len(), 2);
        assert_eq!(bins[1].bin_start, at(8, 0) + Duration::microseconds(500));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let samples = vec![
            sample(at(9, 30), true, Some(3.0)),
            sample(at(8, 0), true, Some(1.0)),
            sample(at(12, 45), false, None),
        ];
        let config = hourly(5);

        let first = BinAggregator::aggregate(&samples, &config).unwrap();
        let second = BinAggregator::aggregate(&samples, &config).unwrap();

        assert_eq!(first, second);
    }
}
