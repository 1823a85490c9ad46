//! Report types: the hierarchical result of diffing two capture runs.
//!
//! - [`DiffReport`] - all stories for one actual/expected date pair
//! - [`DiffStory`] / [`DiffState`] - grouping by story, then by state
//! - [`DiffSnapshot`] - one test state in one browser profile
//! - [`DiffElement`] - one element with a reportable change

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::geometry::{AreaDelta, Delta};
use super::snapshot::BrowserProfile;

/// How an element's visibility changed between the two captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisplayTransition {
    #[serde(rename = "not found")]
    NotFound,
    #[serde(rename = "added")]
    Added,
    #[serde(rename = "removed")]
    Removed,
    #[serde(rename = "should be displayed")]
    ShouldBeDisplayed,
    #[serde(rename = "should not be displayed")]
    ShouldNotBeDisplayed,
    #[serde(rename = "displayed")]
    Displayed,
    #[serde(rename = "not displayed")]
    NotDisplayed,
}

impl DisplayTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayTransition::NotFound => "not found",
            DisplayTransition::Added => "added",
            DisplayTransition::Removed => "removed",
            DisplayTransition::ShouldBeDisplayed => "should be displayed",
            DisplayTransition::ShouldNotBeDisplayed => "should not be displayed",
            DisplayTransition::Displayed => "displayed",
            DisplayTransition::NotDisplayed => "not displayed",
        }
    }
}

/// Kind of change detected on a displayed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Moved,
    Resized,
    Text,
    Css,
    Attributes,
    Image,
}

/// An element with at least one reportable condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffElement {
    pub name: String,
    pub display: DisplayTransition,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub diff: BTreeSet<DiffTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Delta<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub css: BTreeMap<String, Delta<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Delta<String>>,
    /// Reference to the element-scoped diff visualization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl DiffElement {
    pub fn new(name: impl Into<String>, display: DisplayTransition) -> Self {
        Self {
            name: name.into(),
            display,
            diff: BTreeSet::new(),
            area: None,
            text: None,
            css: BTreeMap::new(),
            attributes: BTreeMap::new(),
            image: None,
        }
    }

    pub fn with_area(mut self, area: AreaDelta) -> Self {
        self.area = Some(area);
        self
    }

    pub fn tag(&mut self, tag: DiffTag) {
        self.diff.insert(tag);
    }
}

/// Result for one test state in one browser profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testcase_id: Option<String>,
    #[serde(default, skip_serializing_if = "Delta::is_empty")]
    pub server: Delta<String>,
    #[serde(default, skip_serializing_if = "Delta::is_empty")]
    pub branch: Delta<String>,
    #[serde(default, skip_serializing_if = "Delta::is_empty")]
    pub commit: Delta<String>,
    pub diff_percentage: f64,
    /// Reference to the whole-snapshot diff visualization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels: Option<String>,
    /// Accumulated item-level errors, one per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub browser: BrowserProfile,
    #[serde(default, skip_serializing_if = "Delta::is_empty")]
    pub images: Delta<String>,
    #[serde(default)]
    pub elements: Vec<DiffElement>,
}

impl DiffSnapshot {
    /// A diff image means pixels differ even when the percentage rounds to zero.
    pub fn has_pixel_diff(&self) -> bool {
        self.diff_percentage > 0.0 || self.pixels.is_some()
    }

    pub fn has_element_diff(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffState {
    pub state: String,
    pub snapshots: Vec<DiffSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStory {
    pub story: String,
    pub states: Vec<DiffState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    /// Capture time treated as the new run.
    pub actual: String,
    /// Capture time treated as the baseline.
    pub expected: String,
    #[serde(default)]
    pub stories: Vec<DiffStory>,
}

impl DiffReport {
    pub fn snapshots(&self) -> impl Iterator<Item = &DiffSnapshot> {
        self.stories
            .iter()
            .flat_map(|story| story.states.iter())
            .flat_map(|state| state.snapshots.iter())
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for snapshot in self.snapshots() {
            summary.snapshots += 1;
            if snapshot.has_pixel_diff() {
                summary.pixel_diffs += 1;
            }
            if snapshot.has_element_diff() {
                summary.element_diffs += 1;
            }
            if snapshot.has_error() {
                summary.errors += 1;
            }
            summary.max_diff_percentage = summary.max_diff_percentage.max(snapshot.diff_percentage);
        }
        summary.stories = self.stories.len();
        summary
    }
}

/// Totals over a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub stories: usize,
    pub snapshots: usize,
    pub pixel_diffs: usize,
    pub element_diffs: usize,
    pub errors: usize,
    pub max_diff_percentage: f64,
}

impl ReportSummary {
    /// Item errors count: a snapshot missing its counterpart is a change too.
    pub fn has_differences(&self) -> bool {
        self.pixel_diffs > 0 || self.element_diffs > 0 || self.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(percentage: f64, error: Option<&str>) -> DiffSnapshot {
        DiffSnapshot {
            testcase_id: None,
            server: Delta::default(),
            branch: Delta::default(),
            commit: Delta::default(),
            diff_percentage: percentage,
            pixels: None,
            error: error.map(str::to_string),
            browser: BrowserProfile::default(),
            images: Delta::default(),
            elements: Vec::new(),
        }
    }

    #[test]
    fn display_transition_serializes_as_words() {
        let json = serde_json::to_string(&DisplayTransition::ShouldNotBeDisplayed).unwrap();
        assert_eq!(json, "\"should not be displayed\"");
        assert_eq!(
            DisplayTransition::ShouldBeDisplayed.as_str(),
            "should be displayed"
        );
    }

    #[test]
    fn diff_element_omits_empty_fields() {
        let mut element = DiffElement::new("header", DisplayTransition::Displayed);
        element.tag(DiffTag::Moved);
        element.tag(DiffTag::Moved);
        let json = serde_json::to_string(&element).unwrap();
        assert_eq!(
            json,
            r#"{"name":"header","display":"displayed","diff":["moved"]}"#
        );
    }

    #[test]
    fn snapshot_omits_null_fields() {
        let json = serde_json::to_value(snapshot(0.0, None)).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("pixels"));
        assert!(!object.contains_key("error"));
        assert!(!object.contains_key("server"));
        assert!(object.contains_key("diffPercentage"));
    }

    #[test]
    fn diff_image_counts_as_pixel_diff_below_rounding() {
        let mut tiny = snapshot(0.0, None);
        tiny.pixels = Some("1525168800-abcdefghij.png".into());
        assert!(tiny.has_pixel_diff());

        let report = DiffReport {
            actual: "a".into(),
            expected: "e".into(),
            stories: vec![DiffStory {
                story: "Home".into(),
                states: vec![DiffState {
                    state: "default".into(),
                    snapshots: vec![tiny],
                }],
            }],
        };
        let summary = report.summary();
        assert_eq!(summary.pixel_diffs, 1);
        assert!(summary.has_differences());
    }

    #[test]
    fn summary_counts_diffs_and_errors() {
        let report = DiffReport {
            actual: "a".into(),
            expected: "e".into(),
            stories: vec![DiffStory {
                story: "Login".into(),
                states: vec![DiffState {
                    state: "default".into(),
                    snapshots: vec![
                        snapshot(0.0, None),
                        snapshot(2.5, None),
                        snapshot(0.0, Some("actual snapshot not found")),
                    ],
                }],
            }],
        };

        let summary = report.summary();
        assert_eq!(summary.stories, 1);
        assert_eq!(summary.snapshots, 3);
        assert_eq!(summary.pixel_diffs, 1);
        assert_eq!(summary.errors, 1);
        assert!((summary.max_diff_percentage - 2.5).abs() < f64::EPSILON);
        assert!(summary.has_differences());
    }
}
