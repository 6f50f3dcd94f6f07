use crate::store::models::{FilterCriteria, ResponseRecord, ALL_VERSIONS};

/// True when the record satisfies every active constraint.
pub fn matches(record: &ResponseRecord, criteria: &FilterCriteria) -> bool {
    matches_version(record, criteria)
        && matches_date_range(record, criteria)
        && matches_score_range(record, criteria)
        && matches_completion(record, criteria)
}

fn matches_version(record: &ResponseRecord, criteria: &FilterCriteria) -> bool {
    match &criteria.survey_version {
        Some(version) if version != ALL_VERSIONS => record.survey_title == *version,
        _ => true,
    }
}

fn matches_date_range(record: &ResponseRecord, criteria: &FilterCriteria) -> bool {
    if criteria.date_from.is_none() && criteria.date_to.is_none() {
        return true;
    }
    // A synthetic timestamp means the file carried no trustworthy
    // instant; an active date constraint fails closed.
    if record.synthetic_timestamp {
        return false;
    }
    if let Some(from) = criteria.date_from {
        if record.timestamp < from {
            return false;
        }
    }
    if let Some(to) = criteria.date_to {
        if record.timestamp > to {
            return false;
        }
    }
    true
}

fn matches_score_range(record: &ResponseRecord, criteria: &FilterCriteria) -> bool {
    if criteria.score_min.is_none() && criteria.score_max.is_none() {
        return true;
    }
    let Some(percentage) = record.results.percentage else {
        return false;
    };
    if let Some(min) = criteria.score_min {
        if percentage < min {
            return false;
        }
    }
    if let Some(max) = criteria.score_max {
        if percentage > max {
            return false;
        }
    }
    true
}

fn matches_completion(record: &ResponseRecord, criteria: &FilterCriteria) -> bool {
    !criteria.completed_only || record.results.score.is_some()
}
