//! Assigns the records of one identity group to the actual and expected side.

use chrono::{DateTime, Utc};

use crate::error::ItemError;
use crate::store::SnapshotGroup;
use crate::types::{parse_identity_hash, BrowserProfile, SnapshotRecord, TestIdentity};

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedGroup {
    pub hash: String,
    pub identity: TestIdentity,
    pub browser: BrowserProfile,
    pub actual: Option<SnapshotRecord>,
    pub expected: Option<SnapshotRecord>,
    pub errors: Vec<ItemError>,
}

/// Aligns a group, or returns `None` when an empty group's identity cannot be recovered.
///
/// Sides are decided by equality against the requested dates, never by ordering.
pub fn align(
    group: SnapshotGroup,
    actual_date: DateTime<Utc>,
    expected_date: DateTime<Utc>,
) -> Option<AlignedGroup> {
    let SnapshotGroup { hash, mut records } = group;

    let (identity, browser) = match records.first() {
        Some(first) => (first.identity.clone(), first.browser.clone()),
        None => match parse_identity_hash(&hash) {
            Some(parsed) => parsed,
            None => {
                tracing::warn!(hash = %hash, "dropping empty snapshot group with unparseable identity");
                return None;
            }
        },
    };

    let mut errors = Vec::new();
    let (actual, expected) = match records.len() {
        0 => {
            errors.push(ItemError::alignment("snapshots not found"));
            (None, None)
        }
        1 => {
            let record = records.remove(0);
            if record.captured_at == actual_date {
                errors.push(ItemError::alignment("expected snapshot not found"));
                (Some(record), None)
            } else {
                errors.push(ItemError::alignment("actual snapshot not found"));
                (None, Some(record))
            }
        }
        2 => {
            let second = records.remove(1);
            let first = records.remove(0);
            if first.captured_at != expected_date {
                (Some(first), Some(second))
            } else {
                (Some(second), Some(first))
            }
        }
        count => {
            let expected_index = records
                .iter()
                .position(|record| record.captured_at == expected_date);
            let expected = expected_index.map(|index| records.remove(index));
            let actual = if records.is_empty() {
                None
            } else {
                Some(records.remove(0))
            };
            tracing::warn!(hash = %hash, count, "more than two snapshots share one identity");
            errors.push(ItemError::alignment(format!(
                "found {count} snapshots for one identity; extra records ignored"
            )));
            if expected.is_none() {
                errors.push(ItemError::alignment("expected snapshot not found"));
            }
            (actual, expected)
        }
    };

    Some(AlignedGroup {
        hash,
        identity,
        browser,
        actual,
        expected,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::identity_hash;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 5, 1, hour, 0, 0).unwrap()
    }

    fn record(captured_at: DateTime<Utc>) -> SnapshotRecord {
        SnapshotRecord {
            identity: TestIdentity::new("Login", "default"),
            testcase_id: None,
            browser: BrowserProfile::default(),
            captured_at,
            server: None,
            branch: None,
            commit: None,
            image_path: format!("{}.png", captured_at.timestamp()),
            elements_json: None,
        }
    }

    fn group(records: Vec<SnapshotRecord>) -> SnapshotGroup {
        SnapshotGroup {
            hash: identity_hash(&TestIdentity::new("Login", "default"), &BrowserProfile::default()),
            records,
        }
    }

    #[test]
    fn pair_is_split_by_expected_date_regardless_of_order() {
        let aligned = align(group(vec![record(at(10)), record(at(11))]), at(11), at(10)).unwrap();
        assert_eq!(aligned.expected.unwrap().captured_at, at(10));
        assert_eq!(aligned.actual.unwrap().captured_at, at(11));
        assert!(aligned.errors.is_empty());

        let aligned = align(group(vec![record(at(11)), record(at(10))]), at(11), at(10)).unwrap();
        assert_eq!(aligned.expected.unwrap().captured_at, at(10));
        assert_eq!(aligned.actual.unwrap().captured_at, at(11));
    }

    #[test]
    fn pair_without_expected_match_keeps_first_as_actual() {
        let aligned = align(group(vec![record(at(8)), record(at(9))]), at(11), at(10)).unwrap();
        assert_eq!(aligned.actual.unwrap().captured_at, at(8));
        assert_eq!(aligned.expected.unwrap().captured_at, at(9));
    }

    #[test]
    fn single_record_goes_to_matching_side() {
        let aligned = align(group(vec![record(at(11))]), at(11), at(10)).unwrap();
        assert!(aligned.actual.is_some());
        assert_eq!(
            aligned.errors,
            vec![ItemError::alignment("expected snapshot not found")]
        );

        let aligned = align(group(vec![record(at(10))]), at(11), at(10)).unwrap();
        assert!(aligned.expected.is_some());
        assert_eq!(
            aligned.errors,
            vec![ItemError::alignment("actual snapshot not found")]
        );
    }

    #[test]
    fn empty_group_recovers_identity_from_hash() {
        let aligned = align(group(Vec::new()), at(11), at(10)).unwrap();
        assert_eq!(aligned.identity, TestIdentity::new("Login", "default"));
        assert_eq!(aligned.errors, vec![ItemError::alignment("snapshots not found")]);

        let unparseable = SnapshotGroup {
            hash: "garbage".into(),
            records: Vec::new(),
        };
        assert!(align(unparseable, at(11), at(10)).is_none());
    }

    #[test]
    fn oversized_group_takes_first_expected_and_first_remaining() {
        let aligned = align(
            group(vec![record(at(11)), record(at(10)), record(at(11))]),
            at(11),
            at(10),
        )
        .unwrap();
        assert_eq!(aligned.expected.unwrap().captured_at, at(10));
        assert_eq!(aligned.actual.unwrap().captured_at, at(11));
        assert_eq!(aligned.errors.len(), 1);
    }
}
