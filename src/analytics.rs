use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::store::models::ResponseRecord;

/// Geography bucket for records without an `ip` field.
pub const UNKNOWN_GEO: &str = "Unknown";

/// Bucket width for trend aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    pub category: String,
    pub average: f64,
    pub respondent_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCount {
    pub survey_title: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    pub bucket: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoBucket {
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBand {
    pub range: String,
    pub count: usize,
}

/// Derived summary statistics over a record set. Never persisted;
/// recomputed on every filter change.
///
/// Average fields are `None` when no record contributed a value: the
/// explicit undefined sentinel, never zero and never NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_responses: usize,
    pub average_score: Option<f64>,
    pub average_percentage: Option<f64>,
    pub category_averages: Vec<CategoryAverage>,
    pub version_counts: Vec<VersionCount>,
    pub completion_trend: Vec<TrendBucket>,
    pub geo_counts: Vec<GeoBucket>,
    pub score_distribution: Vec<ScoreBand>,
}

/// Compute metrics with the default day-level trend buckets.
pub fn compute_metrics(records: &[ResponseRecord]) -> AggregateMetrics {
    compute_metrics_with(records, TrendGranularity::Day)
}

pub fn compute_metrics_with(
    records: &[ResponseRecord],
    granularity: TrendGranularity,
) -> AggregateMetrics {
    AggregateMetrics {
        total_responses: records.len(),
        average_score: mean(records.iter().filter_map(|record| record.results.score)),
        average_percentage: mean(records.iter().filter_map(|record| record.results.percentage)),
        category_averages: category_averages(records),
        version_counts: version_counts(records),
        completion_trend: completion_trend(records, granularity),
        geo_counts: geo_counts(records),
        score_distribution: score_distribution(records),
    }
}

/// Arithmetic mean over the contributing values only. Zero contributors
/// yield `None`, not zero and not a division error.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn category_averages(records: &[ResponseRecord]) -> Vec<CategoryAverage> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in records {
        for (category, value) in &record.results.categories {
            let entry = totals.entry(category.as_str()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(category, (sum, count))| CategoryAverage {
            category: category.to_string(),
            average: sum / count as f64,
            respondent_count: count,
        })
        .collect()
}

fn version_counts(records: &[ResponseRecord]) -> Vec<VersionCount> {
    let mut order: Vec<VersionCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        match index.get(record.survey_title.as_str()) {
            Some(&position) => order[position].count += 1,
            None => {
                index.insert(record.survey_title.as_str(), order.len());
                order.push(VersionCount {
                    survey_title: record.survey_title.clone(),
                    count: 1,
                });
            }
        }
    }

    order
}

/// Sparse trend buckets, chronologically ascending. Buckets with zero
/// records are omitted; consumers needing a continuous axis synthesize
/// the gaps themselves. Synthetic timestamps are excluded; an invented
/// instant would pile every legacy record onto the load day.
fn completion_trend(
    records: &[ResponseRecord],
    granularity: TrendGranularity,
) -> Vec<TrendBucket> {
    let mut buckets: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in records {
        if record.synthetic_timestamp {
            continue;
        }
        let date = bucket_start(record.timestamp.date_naive(), granularity);
        *buckets.entry(date).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(bucket, count)| TrendBucket { bucket, count })
        .collect()
}

fn bucket_start(date: NaiveDate, granularity: TrendGranularity) -> NaiveDate {
    match granularity {
        TrendGranularity::Day => date,
        TrendGranularity::Week => {
            let offset = date.weekday().num_days_from_monday() as u64;
            date.checked_sub_days(Days::new(offset)).unwrap_or(date)
        }
        TrendGranularity::Month => date.with_day(1).unwrap_or(date),
    }
}

fn geo_counts(records: &[ResponseRecord]) -> Vec<GeoBucket> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let location = record.ip.as_deref().unwrap_or(UNKNOWN_GEO);
        *counts.entry(location).or_insert(0) += 1;
    }

    let mut buckets: Vec<GeoBucket> = counts
        .into_iter()
        .map(|(location, count)| GeoBucket {
            location: location.to_string(),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.location.cmp(&b.location)));
    buckets
}

const BAND_WIDTH: f64 = 20.0;
const BAND_LABELS: [&str; 5] = ["0-20", "20-40", "40-60", "60-80", "80-100"];

/// 20-point percentage bands over non-null values. Empty bands are
/// omitted, matching the sparse trend representation.
fn score_distribution(records: &[ResponseRecord]) -> Vec<ScoreBand> {
    let mut counts = [0usize; BAND_LABELS.len()];
    for record in records {
        if let Some(percentage) = record.results.percentage {
            let band = (percentage.max(0.0) / BAND_WIDTH) as usize;
            counts[band.min(BAND_LABELS.len() - 1)] += 1;
        }
    }

    BAND_LABELS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(range, count)| ScoreBand {
            range: range.to_string(),
            count,
        })
        .collect()
}
