/// COCO class names in YOLOv8 export order.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Metadata key under which YOLOv8 exports store their class names.
pub const NAMES_METADATA_KEY: &str = "names";
/// Upper bound on class ids accepted from model metadata.
const MAX_NAMED_CLASSES: usize = 4096;

/// Label for a class id; ids past the table render as `class <id>`.
pub fn class_label(class_id: usize) -> String {
    COCO_CLASSES
        .get(class_id)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class {}", class_id))
}

/// Class names shipped with a model.
///
/// Ids the model does not name fall back to `class_label`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<Option<String>>,
}

impl ClassNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(|n| Some(n.into())).collect(),
        }
    }

    /// Parse the `names` metadata value, e.g. `{0: 'person', 1: 'hard hat'}`.
    ///
    /// Returns `None` when the value holds no `id: 'name'` entries.
    pub fn from_metadata(value: &str) -> Option<Self> {
        let body = value.trim().strip_prefix('{')?.strip_suffix('}')?;
        let mut names: Vec<Option<String>> = Vec::new();
        let mut rest = body.trim_start();
        while !rest.is_empty() {
            let (id, after) = rest.split_once(':')?;
            let id: usize = id.trim().parse().ok()?;
            if id >= MAX_NAMED_CLASSES {
                return None;
            }
            let after = after.trim_start();
            let quote = after.chars().next().filter(|c| *c == '\'' || *c == '"')?;
            let close = after[1..].find(quote)? + 1;
            let name = &after[1..close];
            if names.len() <= id {
                names.resize(id + 1, None);
            }
            names[id] = Some(name.to_string());
            rest = after[close + 1..].trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }
        if names.is_empty() {
            None
        } else {
            Some(Self { names })
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn label(&self, class_id: usize) -> String {
        match self.names.get(class_id) {
            Some(Some(name)) => name.clone(),
            _ => class_label(class_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_labels() {
        assert_eq!(class_label(0), "person");
        assert_eq!(class_label(79), "toothbrush");
        assert_eq!(class_label(80), "class 80");
    }

    #[test]
    fn parses_exported_names() {
        let names = ClassNames::from_metadata("{0: 'cone', 1: 'cube', 2: \"game piece\"}")
            .expect("names");
        assert_eq!(names.len(), 3);
        assert_eq!(names.label(0), "cone");
        assert_eq!(names.label(2), "game piece");
        assert_eq!(names.label(3), "class 3");
    }

    #[test]
    fn sparse_ids_fall_back() {
        let names = ClassNames::from_metadata("{1: 'cube'}").expect("names");
        assert_eq!(names.label(0), "person");
        assert_eq!(names.label(1), "cube");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(ClassNames::from_metadata(""), None);
        assert_eq!(ClassNames::from_metadata("{}"), None);
        assert_eq!(ClassNames::from_metadata("[cone, cube]"), None);
        assert_eq!(ClassNames::from_metadata("{zero: 'cone'}"), None);
    }
}
