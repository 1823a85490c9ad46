//! Structural element differ.
//!
//! Elements present in both captures are classified by their display state
//! and, when displayed on both sides, compared field by field. Each such
//! element is one unit on the element [`WorkerPool`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use image::RgbaImage;

use crate::artifacts::ArtifactStore;
use crate::error::ItemError;
use crate::image_diff::{compare_images, DiffScope, RenderMode};
use crate::pool::WorkerPool;
use crate::types::{
    Area, AreaDelta, Delta, DiffElement, DiffTag, DisplayTransition, Element, HIDDEN_DISPLAY,
};

pub const VALUE_ADDED: &str = "[value added]";
pub const VALUE_REMOVED: &str = "[value removed]";

/// Attributes that change between runs without any visual meaning.
pub const DEFAULT_IGNORED_ATTRIBUTES: [&str; 4] =
    ["id", "data-reactid", "data-qa-file", "data-qa-node"];

const MOVE_FIELDS: [&str; 4] = ["area.left", "area.top", "area.right", "area.bottom"];
const SIZE_FIELDS: [&str; 2] = ["area.width", "area.height"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDiffOptions {
    pub ignored_attributes: BTreeSet<String>,
    pub ignored_css: BTreeSet<String>,
    pub inaccuracy: u8,
}

impl Default for ElementDiffOptions {
    fn default() -> Self {
        Self {
            ignored_attributes: DEFAULT_IGNORED_ATTRIBUTES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            ignored_css: BTreeSet::new(),
            inaccuracy: 0,
        }
    }
}

/// Per-snapshot inputs shared read-only by every element unit.
#[derive(Debug, Clone)]
pub struct ElementImages {
    pub actual: Arc<RgbaImage>,
    pub expected: Arc<RgbaImage>,
    pub retina: bool,
    /// Run region image diffs for displayed elements.
    pub compare_images: bool,
}

#[derive(Debug, Default)]
pub struct ElementDiffOutcome {
    pub elements: Vec<DiffElement>,
    pub errors: Vec<ItemError>,
}

/// An element is displayed when it is visible, non-empty and lies inside its raster.
pub fn is_displayed(element: &Element, image_width: u32, image_height: u32, retina: bool) -> bool {
    let area = &element.area;
    if element.display == HIDDEN_DISPLAY || area.width == 0.0 || area.height == 0.0 {
        return false;
    }
    let k = if retina { 2.0 } else { 1.0 };
    area.left * k + area.width * k <= f64::from(image_width)
        && area.top * k + area.height * k <= f64::from(image_height)
}

/// Classifies an element present in both captures.
pub fn classify(
    actual: &Element,
    expected: &Element,
    images: &ElementImages,
) -> DisplayTransition {
    match (actual.is_not_found(), expected.is_not_found()) {
        (true, true) => return DisplayTransition::NotFound,
        (false, true) => return DisplayTransition::Added,
        (true, false) => return DisplayTransition::Removed,
        (false, false) => {}
    }
    let actual_shown = is_displayed(
        actual,
        images.actual.width(),
        images.actual.height(),
        images.retina,
    );
    let expected_shown = is_displayed(
        expected,
        images.expected.width(),
        images.expected.height(),
        images.retina,
    );
    match (actual_shown, expected_shown) {
        (true, true) => DisplayTransition::Displayed,
        (false, false) => DisplayTransition::NotDisplayed,
        (false, true) => DisplayTransition::ShouldBeDisplayed,
        (true, false) => DisplayTransition::ShouldNotBeDisplayed,
    }
}

/// Flattens an element into `field path -> value`.
pub fn flatten_element(element: &Element) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("display".to_string(), element.display.clone());
    if let Some(text) = &element.text {
        fields.insert("text".to_string(), text.clone());
    }
    let area = &element.area;
    for (name, value) in [
        ("left", area.left),
        ("top", area.top),
        ("right", area.right),
        ("bottom", area.bottom),
        ("width", area.width),
        ("height", area.height),
    ] {
        fields.insert(format!("area.{name}"), value.to_string());
    }
    for (name, value) in &element.css {
        fields.insert(format!("css.{name}"), value.clone());
    }
    for (name, value) in &element.attributes {
        fields.insert(format!("attributes.{name}"), value.clone());
    }
    fields
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FieldChanges {
    pub changed: BTreeSet<String>,
    /// Present only in actual.
    pub added: BTreeSet<String>,
    /// Present only in expected.
    pub removed: BTreeSet<String>,
}

impl FieldChanges {
    pub fn between(actual: &BTreeMap<String, String>, expected: &BTreeMap<String, String>) -> Self {
        let mut changes = FieldChanges::default();
        for (path, value) in actual {
            match expected.get(path) {
                Some(other) if other != value => {
                    changes.changed.insert(path.clone());
                }
                Some(_) => {}
                None => {
                    changes.added.insert(path.clone());
                }
            }
        }
        for path in expected.keys() {
            if !actual.contains_key(path) {
                changes.removed.insert(path.clone());
            }
        }
        changes
    }
}

/// Diffs two element maps on the element pool.
///
/// Names present on one side only are reported without a field diff.
/// Result order is unspecified.
pub async fn compare_elements(
    actual: HashMap<String, Element>,
    mut expected: HashMap<String, Element>,
    images: ElementImages,
    options: Arc<ElementDiffOptions>,
    artifacts: Option<Arc<ArtifactStore>>,
    pool: &WorkerPool,
) -> ElementDiffOutcome {
    let mut outcome = ElementDiffOutcome::default();
    let mut units = Vec::new();

    for (name, actual_element) in actual {
        match expected.remove(&name) {
            Some(expected_element) => units.push((name, (actual_element, expected_element))),
            None => outcome.elements.push(
                DiffElement::new(name, DisplayTransition::Added)
                    .with_area(AreaDelta::between(&actual_element.area, &Area::default())),
            ),
        }
    }
    for (name, expected_element) in expected {
        outcome.elements.push(
            DiffElement::new(name, DisplayTransition::Removed)
                .with_area(AreaDelta::between(&Area::default(), &expected_element.area)),
        );
    }

    let images = Arc::new(images);
    let results = pool
        .map_blocking(units, move |(actual, expected): (Element, Element)| {
            diff_pair(&actual, &expected, &images, &options, artifacts.as_deref())
        })
        .await;

    for (name, (element, error)) in results.completed {
        if let Some(mut element) = element {
            element.name = name.clone();
            outcome.elements.push(element);
        }
        if let Some(message) = error {
            outcome.errors.push(ItemError::element_compare(name, message));
        }
    }
    for failure in results.failures {
        outcome
            .errors
            .push(ItemError::element_compare(failure.key, failure.message));
    }
    outcome
}

/// One element unit: the reportable element, if any, and an error message.
fn diff_pair(
    actual: &Element,
    expected: &Element,
    images: &ElementImages,
    options: &ElementDiffOptions,
    artifacts: Option<&ArtifactStore>,
) -> (Option<DiffElement>, Option<String>) {
    let transition = classify(actual, expected, images);
    let element = match transition {
        DisplayTransition::NotFound => DiffElement::new("", transition),
        DisplayTransition::Added => DiffElement::new("", transition)
            .with_area(AreaDelta::between(&actual.area, &Area::default())),
        DisplayTransition::Removed => DiffElement::new("", transition)
            .with_area(AreaDelta::between(&Area::default(), &expected.area)),
        DisplayTransition::ShouldBeDisplayed | DisplayTransition::ShouldNotBeDisplayed => {
            DiffElement::new("", transition)
                .with_area(AreaDelta::between(&actual.area, &expected.area))
        }
        DisplayTransition::NotDisplayed => return (None, None),
        DisplayTransition::Displayed => {
            return diff_displayed(actual, expected, images, options, artifacts)
        }
    };
    (Some(element), None)
}

fn diff_displayed(
    actual: &Element,
    expected: &Element,
    images: &ElementImages,
    options: &ElementDiffOptions,
    artifacts: Option<&ArtifactStore>,
) -> (Option<DiffElement>, Option<String>) {
    let mut element = DiffElement::new("", DisplayTransition::Displayed);
    let mut error = None;

    if images.compare_images {
        match compare_images(
            &images.actual,
            &images.expected,
            DiffScope::Regions {
                actual: actual.area,
                expected: expected.area,
                retina: images.retina,
            },
            options.inaccuracy,
            RenderMode::Transparent,
            artifacts,
        ) {
            Ok(diff) => {
                if let Some(reference) = diff.artifact {
                    element.tag(DiffTag::Image);
                    element.image = Some(reference);
                }
            }
            Err(err) => error = Some(err.to_string()),
        }
    }

    let actual_fields = flatten_element(actual);
    let expected_fields = flatten_element(expected);
    let changes = FieldChanges::between(&actual_fields, &expected_fields);

    let moved = MOVE_FIELDS.iter().any(|path| changes.changed.contains(*path));
    let resized = SIZE_FIELDS.iter().any(|path| changes.changed.contains(*path));
    if moved {
        element.tag(DiffTag::Moved);
    }
    if resized {
        element.tag(DiffTag::Resized);
    }

    // Text present on one side only is not a text change.
    if changes.changed.contains("text") {
        element.tag(DiffTag::Text);
        element.text = Some(Delta::new(actual.text.clone(), expected.text.clone()));
    }

    element.css = property_deltas(
        &changes,
        "css.",
        &actual_fields,
        &expected_fields,
        &options.ignored_css,
    );
    if !element.css.is_empty() {
        element.tag(DiffTag::Css);
    }
    element.attributes = property_deltas(
        &changes,
        "attributes.",
        &actual_fields,
        &expected_fields,
        &options.ignored_attributes,
    );
    if !element.attributes.is_empty() {
        element.tag(DiffTag::Attributes);
    }

    let reportable = if element.diff.is_empty() {
        None
    } else {
        element.area = Some(AreaDelta::between(&actual.area, &expected.area));
        Some(element)
    };
    (reportable, error)
}

fn property_deltas(
    changes: &FieldChanges,
    prefix: &str,
    actual: &BTreeMap<String, String>,
    expected: &BTreeMap<String, String>,
    ignored: &BTreeSet<String>,
) -> BTreeMap<String, Delta<String>> {
    let property = |path: &String| {
        path.strip_prefix(prefix)
            .filter(|name| !ignored.contains(*name))
            .map(str::to_string)
    };

    let mut deltas = BTreeMap::new();
    for path in &changes.changed {
        if let (Some(name), Some(a), Some(e)) = (property(path), actual.get(path), expected.get(path)) {
            deltas.insert(name, Delta::both(a.clone(), e.clone()));
        }
    }
    for path in &changes.added {
        if let (Some(name), Some(a)) = (property(path), actual.get(path)) {
            deltas.insert(
                name,
                Delta::new(Some(a.clone()), None).with_diff(VALUE_ADDED.to_string()),
            );
        }
    }
    for path in &changes.removed {
        if let (Some(name), Some(e)) = (property(path), expected.get(path)) {
            deltas.insert(
                name,
                Delta::new(None, Some(e.clone())).with_diff(VALUE_REMOVED.to_string()),
            );
        }
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NOT_FOUND_DISPLAY;
    use image::Rgba;
    use tempfile::TempDir;

    fn element(left: f64, top: f64, width: f64, height: f64) -> Element {
        Element {
            display: "block".into(),
            text: Some("Sign in".into()),
            css: HashMap::from([("color".to_string(), "red".to_string())]),
            attributes: HashMap::from([("class".to_string(), "btn".to_string())]),
            area: Area::new(left, top, width, height),
        }
    }

    fn not_found() -> Element {
        Element {
            display: NOT_FOUND_DISPLAY.into(),
            ..Element::default()
        }
    }

    fn images(compare_images: bool) -> ElementImages {
        let img = Arc::new(RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255])));
        ElementImages {
            actual: Arc::clone(&img),
            expected: img,
            retina: false,
            compare_images,
        }
    }

    fn single(name: &str, element: Element) -> HashMap<String, Element> {
        HashMap::from([(name.to_string(), element)])
    }

    async fn run(
        actual: HashMap<String, Element>,
        expected: HashMap<String, Element>,
        options: ElementDiffOptions,
    ) -> ElementDiffOutcome {
        compare_elements(
            actual,
            expected,
            images(false),
            Arc::new(options),
            None,
            &WorkerPool::new("elements", 8),
        )
        .await
    }

    #[test]
    fn is_displayed_requires_visible_non_empty_in_bounds() {
        let visible = element(10.0, 10.0, 20.0, 20.0);
        assert!(is_displayed(&visible, 100, 100, false));
        assert!(!is_displayed(&visible, 25, 100, false));
        // retina doubles the logical box: 60x60 needs a 60px raster
        assert!(is_displayed(&visible, 60, 60, true));
        assert!(!is_displayed(&visible, 59, 60, true));

        let hidden = Element {
            display: "none".into(),
            ..visible.clone()
        };
        assert!(!is_displayed(&hidden, 100, 100, false));

        let empty = element(10.0, 10.0, 0.0, 20.0);
        assert!(!is_displayed(&empty, 100, 100, false));
    }

    #[test]
    fn classify_covers_display_transitions() {
        let imgs = images(false);
        let shown = element(0.0, 0.0, 10.0, 10.0);
        let off_screen = element(95.0, 0.0, 10.0, 10.0);

        assert_eq!(classify(&not_found(), &not_found(), &imgs), DisplayTransition::NotFound);
        assert_eq!(classify(&shown, &not_found(), &imgs), DisplayTransition::Added);
        assert_eq!(classify(&not_found(), &shown, &imgs), DisplayTransition::Removed);
        assert_eq!(
            classify(&off_screen, &shown, &imgs),
            DisplayTransition::ShouldBeDisplayed
        );
        assert_eq!(
            classify(&shown, &off_screen, &imgs),
            DisplayTransition::ShouldNotBeDisplayed
        );
        assert_eq!(classify(&shown, &shown, &imgs), DisplayTransition::Displayed);
        assert_eq!(
            classify(&off_screen, &off_screen, &imgs),
            DisplayTransition::NotDisplayed
        );
    }

    #[test]
    fn flatten_element_uses_dotted_paths() {
        let fields = flatten_element(&element(1.5, 2.0, 3.0, 4.0));
        assert_eq!(fields["display"], "block");
        assert_eq!(fields["text"], "Sign in");
        assert_eq!(fields["area.left"], "1.5");
        assert_eq!(fields["area.right"], "4.5");
        assert_eq!(fields["css.color"], "red");
        assert_eq!(fields["attributes.class"], "btn");
        assert_eq!(fields.len(), 10);
    }

    #[tokio::test]
    async fn identical_maps_produce_no_elements() {
        let map = single("button", element(0.0, 0.0, 10.0, 10.0));
        let outcome = run(map.clone(), map, ElementDiffOptions::default()).await;
        assert!(outcome.elements.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn one_sided_names_are_added_or_removed() {
        let outcome = run(
            single("banner", element(0.0, 0.0, 10.0, 10.0)),
            single("footer", element(0.0, 50.0, 10.0, 10.0)),
            ElementDiffOptions::default(),
        )
        .await;

        let by_name: HashMap<_, _> = outcome
            .elements
            .iter()
            .map(|e| (e.name.as_str(), e))
            .collect();
        assert_eq!(by_name["banner"].display, DisplayTransition::Added);
        assert_eq!(by_name["footer"].display, DisplayTransition::Removed);
        let footer_area = by_name["footer"].area.as_ref().expect("area delta");
        assert_eq!(footer_area.top, Delta::both(0.0, 50.0));
    }

    #[tokio::test]
    async fn not_found_on_both_sides_is_recorded_without_area() {
        let outcome = run(
            single("modal", not_found()),
            single("modal", not_found()),
            ElementDiffOptions::default(),
        )
        .await;
        assert_eq!(outcome.elements.len(), 1);
        assert_eq!(outcome.elements[0].display, DisplayTransition::NotFound);
        assert!(outcome.elements[0].area.is_none());
    }

    #[tokio::test]
    async fn moved_and_resized_are_tagged_separately() {
        let outcome = run(
            single("card", element(5.0, 0.0, 20.0, 10.0)),
            single("card", element(0.0, 0.0, 20.0, 10.0)),
            ElementDiffOptions::default(),
        )
        .await;
        let card = &outcome.elements[0];
        assert_eq!(card.diff, BTreeSet::from([DiffTag::Moved]));
        assert_eq!(card.area.as_ref().unwrap().left, Delta::both(5.0, 0.0));

        let outcome = run(
            single("card", element(0.0, 0.0, 30.0, 10.0)),
            single("card", element(0.0, 0.0, 20.0, 10.0)),
            ElementDiffOptions::default(),
        )
        .await;
        // width and right both change
        assert_eq!(
            outcome.elements[0].diff,
            BTreeSet::from([DiffTag::Moved, DiffTag::Resized])
        );
    }

    #[tokio::test]
    async fn css_and_text_changes_carry_both_values_and_sentinels() {
        let mut actual = element(0.0, 0.0, 10.0, 10.0);
        actual.text = Some("Log in".into());
        actual.css.insert("margin".into(), "4px".into());
        let mut expected = element(0.0, 0.0, 10.0, 10.0);
        expected.css.insert("color".into(), "blue".into());
        expected.css.insert("padding".into(), "2px".into());

        let outcome = run(
            single("button", actual),
            single("button", expected),
            ElementDiffOptions::default(),
        )
        .await;
        let button = &outcome.elements[0];
        assert_eq!(button.diff, BTreeSet::from([DiffTag::Text, DiffTag::Css]));
        assert_eq!(
            button.text,
            Some(Delta::both("Log in".to_string(), "Sign in".to_string()))
        );
        assert_eq!(button.css["color"], Delta::both("red".into(), "blue".into()));
        assert_eq!(
            button.css["margin"],
            Delta::new(Some("4px".into()), None).with_diff(VALUE_ADDED.to_string())
        );
        assert_eq!(
            button.css["padding"],
            Delta::new(None, Some("2px".into())).with_diff(VALUE_REMOVED.to_string())
        );
    }

    #[tokio::test]
    async fn one_sided_text_is_not_a_text_change() {
        let actual = element(0.0, 0.0, 10.0, 10.0);
        let expected = Element {
            text: None,
            ..actual.clone()
        };

        let outcome = run(
            single("label", actual.clone()),
            single("label", expected.clone()),
            ElementDiffOptions::default(),
        )
        .await;
        assert!(outcome.elements.is_empty());

        let outcome = run(
            single("label", expected),
            single("label", actual),
            ElementDiffOptions::default(),
        )
        .await;
        assert!(outcome.elements.is_empty());
    }

    #[tokio::test]
    async fn displayed_changes_always_carry_area() {
        let mut actual = element(0.0, 0.0, 10.0, 10.0);
        actual.css.insert("color".into(), "blue".into());

        let outcome = run(
            single("link", actual),
            single("link", element(0.0, 0.0, 10.0, 10.0)),
            ElementDiffOptions::default(),
        )
        .await;
        let link = &outcome.elements[0];
        assert_eq!(link.diff, BTreeSet::from([DiffTag::Css]));
        let area = link.area.as_ref().expect("area delta");
        assert_eq!(area.width, Delta::both(10.0, 10.0));
    }

    #[tokio::test]
    async fn ignored_attribute_change_is_not_reported() {
        let mut actual = element(0.0, 0.0, 10.0, 10.0);
        actual.attributes.insert("data-reactid".into(), ".0.1".into());
        let mut expected = element(0.0, 0.0, 10.0, 10.0);
        expected.attributes.insert("data-reactid".into(), ".0.2".into());

        let outcome = run(
            single("row", actual.clone()),
            single("row", expected.clone()),
            ElementDiffOptions::default(),
        )
        .await;
        assert!(outcome.elements.is_empty());

        let outcome = run(
            single("row", actual),
            single("row", expected),
            ElementDiffOptions {
                ignored_attributes: BTreeSet::new(),
                ..ElementDiffOptions::default()
            },
        )
        .await;
        assert_eq!(
            outcome.elements[0].diff,
            BTreeSet::from([DiffTag::Attributes])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn five_hundred_elements_fan_in_without_loss() {
        let mut actual = HashMap::new();
        let mut expected = HashMap::new();
        for i in 0..500 {
            let name = format!("el-{i}");
            let mut changed = element(0.0, 0.0, 10.0, 10.0);
            changed.text = Some(format!("text {i}"));
            actual.insert(name.clone(), changed);
            expected.insert(name, element(0.0, 0.0, 10.0, 10.0));
        }

        let outcome = run(actual, expected, ElementDiffOptions::default()).await;
        assert_eq!(outcome.elements.len(), 500);
        let names: BTreeSet<_> = outcome.elements.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names.len(), 500);
    }

    #[tokio::test]
    async fn element_image_diff_tags_image_and_sets_reference() {
        let dir = TempDir::new().expect("tempdir");
        let artifacts = Arc::new(ArtifactStore::new(dir.path(), None));
        let expected_img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let mut actual_img = expected_img.clone();
        actual_img.put_pixel(5, 5, Rgba([0, 0, 0, 255]));

        let box_element = element(0.0, 0.0, 10.0, 10.0);
        let outcome = compare_elements(
            single("logo", box_element.clone()),
            single("logo", box_element),
            ElementImages {
                actual: Arc::new(actual_img),
                expected: Arc::new(expected_img),
                retina: false,
                compare_images: true,
            },
            Arc::new(ElementDiffOptions::default()),
            Some(artifacts),
            &WorkerPool::new("elements", 2),
        )
        .await;

        let logo = &outcome.elements[0];
        assert_eq!(logo.diff, BTreeSet::from([DiffTag::Image]));
        let reference = logo.image.as_ref().expect("image reference");
        assert!(dir.path().join(reference).exists());
    }
}
