//! Collection-level summaries
//!
//! Headline numbers for the dashboard overview (days with data, hours
//! collected) and the per-day table of hours spent in each wearing-detection
//! percentage band that feeds the stacked wristband chart.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::{WEARING_BAND_COLORS, WEARING_BAND_EDGES, WEARING_BAND_LABELS};
use crate::types::NormalizedSample;

/// How much data a participant has collected
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub days_with_data: usize,
    /// Distinct recorded minutes, in hours
    pub total_hours: f64,
}

/// Wearing-detection percentage band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WearingBand {
    #[serde(rename = "0%")]
    None,
    #[serde(rename = "1-49%")]
    Low,
    #[serde(rename = "50-74%")]
    Partial,
    #[serde(rename = "75-99%")]
    Mostly,
    #[serde(rename = "100%")]
    Full,
}

impl WearingBand {
    pub const ALL: [WearingBand; 5] = [
        WearingBand::None,
        WearingBand::Low,
        WearingBand::Partial,
        WearingBand::Mostly,
        WearingBand::Full,
    ];

    /// Band for a wearing percentage; `None` outside `[0, 101)`
    pub fn from_percentage(pct: f64) -> Option<WearingBand> {
        WEARING_BAND_EDGES
            .windows(2)
            .position(|edge| pct >= edge[0] && pct < edge[1])
            .map(|idx| Self::ALL[idx])
    }

    pub fn label(&self) -> &'static str {
        WEARING_BAND_LABELS[*self as usize]
    }

    pub fn color(&self) -> &'static str {
        WEARING_BAND_COLORS[*self as usize]
    }
}

/// Hours per wearing band for one recording day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWearing {
    /// Export day folder, or the sample's calendar date when there is none
    pub day: String,
    pub hours: BTreeMap<WearingBand, f64>,
}

/// Count recording days and distinct recorded minutes
pub fn summarize_collection(samples: &[NormalizedSample]) -> CollectionSummary {
    if samples.is_empty() {
        return CollectionSummary::default();
    }

    let days: BTreeSet<String> = samples.iter().map(day_key).collect();
    let minutes: BTreeSet<NaiveDateTime> =
        samples.iter().map(|s| floor_minute(s.timestamp)).collect();

    CollectionSummary {
        days_with_data: days.len(),
        total_hours: minutes.len() as f64 / 60.0,
    }
}

/// Per-day hours in each wearing band, counting each minute once per band.
///
/// Every band is present for every day (zero-filled); days are sorted.
/// Samples without a numeric value or outside the band range are ignored.
pub fn hours_per_band(samples: &[NormalizedSample]) -> Vec<DailyWearing> {
    let mut minutes: BTreeMap<(String, WearingBand), BTreeSet<NaiveDateTime>> = BTreeMap::new();
    let mut days: BTreeSet<String> = BTreeSet::new();

    for sample in samples {
        let band = match sample
            .value
            .as_ref()
            .and_then(|v| v.as_f64())
            .and_then(WearingBand::from_percentage)
        {
            Some(band) => band,
            None => continue,
        };
        let day = day_key(sample);
        days.insert(day.clone());
        minutes
            .entry((day, band))
            .or_default()
            .insert(floor_minute(sample.timestamp));
    }

    days.into_iter()
        .map(|day| {
            let hours = WearingBand::ALL
                .iter()
                .map(|&band| {
                    let count = minutes.get(&(day.clone(), band)).map_or(0, |m| m.len());
                    (band, count as f64 / 60.0)
                })
                .collect();
            DailyWearing { day, hours }
        })
        .collect()
}

/// Export day folder when known, else the calendar date
fn day_key(sample: &NormalizedSample) -> String {
    match &sample.source_day {
        Some(day) => day.clone(),
        None => sample.timestamp.date().format("%Y-%m-%d").to_string(),
    }
}

fn floor_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParticipantId, SampleValue};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sample(day: u32, h: u32, m: u32, s: u32, pct: Option<f64>) -> NormalizedSample {
        NormalizedSample {
            participant_id: ParticipantId::new("HC_009"),
            timestamp: NaiveDate::from_ymd_opt(2024, 6, day)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap(),
            value: pct.map(SampleValue::Numeric),
            is_worn: pct.is_some_and(|p| p >= 50.0),
            line: 0,
            source_day: None,
        }
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(WearingBand::from_percentage(0.0), Some(WearingBand::None));
        assert_eq!(WearingBand::from_percentage(0.5), Some(WearingBand::None));
        assert_eq!(WearingBand::from_percentage(1.0), Some(WearingBand::Low));
        assert_eq!(WearingBand::from_percentage(49.9), Some(WearingBand::Low));
        assert_eq!(WearingBand::from_percentage(50.0), Some(WearingBand::Partial));
        assert_eq!(WearingBand::from_percentage(75.0), Some(WearingBand::Mostly));
        assert_eq!(WearingBand::from_percentage(99.9), Some(WearingBand::Mostly));
        assert_eq!(WearingBand::from_percentage(100.0), Some(WearingBand::Full));
        assert_eq!(WearingBand::from_percentage(101.0), None);
        assert_eq!(WearingBand::from_percentage(-1.0), None);
        assert_eq!(WearingBand::Low.label(), "1-49%");
        assert_eq!(WearingBand::Full.color(), "#2ecc40");
    }

    #[test]
    fn test_collection_counts_distinct_minutes() {
        let samples = vec![
            sample(10, 8, 0, 0, Some(100.0)),
            sample(10, 8, 0, 30, Some(100.0)),
            sample(10, 8, 1, 0, Some(100.0)),
            sample(11, 9, 0, 0, None),
        ];

        let summary = summarize_collection(&samples);

        assert_eq!(summary.days_with_data, 2);
        assert!((summary.total_hours - 3.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_collection_empty() {
        assert_eq!(summarize_collection(&[]), CollectionSummary::default());
    }

    #[test]
    fn test_hours_per_band_table() {
        let mut samples: Vec<_> = (0..30).map(|m| sample(10, 8, m, 0, Some(100.0))).collect();
        samples.extend((0..6).map(|m| sample(10, 9, m, 0, Some(20.0))));
        samples.push(sample(11, 0, 0, 0, Some(0.0)));
        samples.push(sample(11, 0, 1, 0, None));

        let table = hours_per_band(&samples);

        assert_eq!(table.len(), 2);
        assert_eq!(table[0].day, "2024-06-10");
        assert_eq!(table[0].hours[&WearingBand::Full], 0.5);
        assert_eq!(table[0].hours[&WearingBand::Low], 0.1);
        assert_eq!(table[0].hours[&WearingBand::Partial], 0.0);
        assert_eq!(table[0].hours.len(), 5);
        assert!((table[1].hours[&WearingBand::None] - 1.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_days_follow_export_folder() {
        let in_folder = |day: u32, h: u32, folder: &str| NormalizedSample {
            source_day: Some(folder.to_string()),
            ..sample(day, h, 0, 0, Some(100.0))
        };
        // A night recording filed under the day it started
        let samples = vec![
            in_folder(10, 23, "2024-06-10"),
            in_folder(11, 1, "2024-06-10"),
            in_folder(11, 9, "2024-06-11"),
        ];

        assert_eq!(summarize_collection(&samples).days_with_data, 2);

        let table = hours_per_band(&samples);
        let days: Vec<&str> = table.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(days, vec!["2024-06-10", "2024-06-11"]);
        assert!((table[0].hours[&WearingBand::Full] - 2.0 / 60.0).abs() < 1e-12);
    }
}
