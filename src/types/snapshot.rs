//! Capture-side types: what the screenshot collaborator stores per test state.
//!
//! A [`SnapshotRecord`] is one capture of one test state in one browser
//! profile. Two records sharing an [`identity hash`](SnapshotRecord::identity_hash)
//! but captured at different times are the counterparts a report compares.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::Area;

/// Display sentinel the capture script writes for elements missing from the page.
pub const NOT_FOUND_DISPLAY: &str = "not found";

/// Display value of elements hidden with `display: none`.
pub const HIDDEN_DISPLAY: &str = "none";

const STORY_SEPARATOR: &str = "|&story&|";
const STATE_SEPARATOR: &str = "|&state&|";

/// The capture environment of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserProfile {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub browser_name: String,
    #[serde(default)]
    pub browser_version: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub retina: bool,
}

impl fmt::Display for BrowserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.device,
            self.os_name,
            self.os_version,
            self.browser_name,
            self.browser_version,
            self.resolution,
            self.retina
        )
    }
}

impl BrowserProfile {
    /// Parses the `Display` form back. Fails when a field itself contains `|`.
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split('|').collect();
        if parts.len() != 7 {
            return None;
        }
        let retina = match parts[6] {
            "true" => true,
            "false" => false,
            _ => return None,
        };
        Some(Self {
            device: parts[0].to_string(),
            os_name: parts[1].to_string(),
            os_version: parts[2].to_string(),
            browser_name: parts[3].to_string(),
            browser_version: parts[4].to_string(),
            resolution: parts[5].to_string(),
            retina,
        })
    }
}

/// A logical UI scenario: a story and one of its states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestIdentity {
    pub story: String,
    pub state: String,
}

impl TestIdentity {
    pub fn new(story: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            story: story.into(),
            state: state.into(),
        }
    }
}

/// Builds the grouping key of a record: story, state and browser profile.
pub fn identity_hash(identity: &TestIdentity, browser: &BrowserProfile) -> String {
    format!(
        "{}{STORY_SEPARATOR}{}{STATE_SEPARATOR}{}",
        identity.story, identity.state, browser
    )
}

/// Recovers the identity and profile from a key built by [`identity_hash`].
pub fn parse_identity_hash(hash: &str) -> Option<(TestIdentity, BrowserProfile)> {
    let (story, rest) = hash.split_once(STORY_SEPARATOR)?;
    let (state, browser) = rest.split_once(STATE_SEPARATOR)?;
    let browser = BrowserProfile::parse(browser)?;
    Some((TestIdentity::new(story, state), browser))
}

/// One captured test state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    #[serde(flatten)]
    pub identity: TestIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testcase_id: Option<String>,
    #[serde(alias = "browserProfile")]
    pub browser: BrowserProfile,
    #[serde(alias = "datetime")]
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// File name of the screenshot inside the images directory.
    #[serde(default, alias = "url")]
    pub image_path: String,
    /// Serialized `name -> Element` map, kept as captured.
    #[serde(default, alias = "elements", skip_serializing_if = "Option::is_none")]
    pub elements_json: Option<String>,
}

impl SnapshotRecord {
    pub fn identity_hash(&self) -> String {
        identity_hash(&self.identity, &self.browser)
    }

    /// True when the record carries a non-empty element payload.
    pub fn has_elements(&self) -> bool {
        self.elements_json
            .as_deref()
            .map(|json| !json.trim().is_empty())
            .unwrap_or(false)
    }

    /// Decodes the element payload. Absent payloads decode to an empty map.
    pub fn elements(&self) -> serde_json::Result<HashMap<String, Element>> {
        match self.elements_json.as_deref() {
            Some(json) if !json.trim().is_empty() => serde_json::from_str(json),
            _ => Ok(HashMap::new()),
        }
    }
}

/// Per-element metadata captured alongside a screenshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Computed `display` value, or [`NOT_FOUND_DISPLAY`].
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub css: HashMap<String, String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub area: Area,
}

impl Element {
    pub fn is_not_found(&self) -> bool {
        self.display == NOT_FOUND_DISPLAY
    }
}
