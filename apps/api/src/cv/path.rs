//! Path grammar for addressing document fields.
//!
//! ```text
//! path     := segment ( "." segment )*
//! segment  := name ( "[" selector "]" )?
//! selector := digits          0-based position
//!           | "#" digits      stable item id
//! ```
//!
//! Example: `experience[2].technologies[0]`, or by id: `experience[#7].achievements[#19]`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::cv::identity::ItemId;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Every way a path can fail to read or write the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed path '{path}': {reason}")]
    Syntax { path: String, reason: String },

    /// The path names a property that does not exist on the addressed container.
    #[error("'{path}' does not resolve: {container} has no property '{name}'")]
    Resolution {
        path: String,
        container: &'static str,
        name: String,
    },

    #[error("index {index} is out of range for '{path}' (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{path}' addresses an item by id and must be resolved against a store first")]
    UnresolvedId { path: String },

    #[error("'{path}' has no item {id}")]
    UnknownItem { path: String, id: ItemId },
}

impl PathError {
    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PathError::Syntax { .. } => "PATH_SYNTAX",
            PathError::Resolution { .. } => "PATH_RESOLUTION",
            PathError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            PathError::TypeMismatch { .. } => "TYPE_MISMATCH",
            PathError::UnresolvedId { .. } => "UNRESOLVED_ID",
            PathError::UnknownItem { .. } => "UNKNOWN_ITEM",
        }
    }

    fn syntax(path: &str, reason: impl Into<String>) -> Self {
        PathError::Syntax {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Path types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Index(usize),
    Id(ItemId),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(i) => write!(f, "{i}"),
            Selector::Id(id) => write!(f, "{id}"),
        }
    }
}

/// One property access, optionally followed by an element selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub name: String,
    pub selector: Option<Selector>,
}

impl Step {
    pub fn new(name: impl Into<String>, selector: Option<Selector>) -> Self {
        Self {
            name: name.into(),
            selector,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Some(sel) => write!(f, "{}[{}]", self.name, sel),
            None => f.write_str(&self.name),
        }
    }
}

/// A parsed, non-empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::syntax(input, "path is empty"));
        }
        let steps = input
            .split('.')
            .map(|segment| parse_segment(input, segment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    /// Single-step path naming a root property.
    pub fn root(name: &str) -> Self {
        Self {
            steps: vec![Step::new(name, None)],
        }
    }

    pub fn from_steps(steps: Vec<Step>) -> Option<Self> {
        (!steps.is_empty()).then_some(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn last(&self) -> &Step {
        // Non-empty by construction.
        &self.steps[self.steps.len() - 1]
    }

    /// Appends a property access.
    pub fn child(&self, name: &str) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::new(name, None));
        Self { steps }
    }

    /// Selects an element of the sequence named by the last step.
    ///
    /// Fails when the last step already carries a selector (`a[0][1]` is not in the grammar).
    pub fn select(&self, selector: Selector) -> Result<Self, PathError> {
        if self.last().selector.is_some() {
            return Err(PathError::syntax(
                &self.to_string(),
                "the last segment already selects an element",
            ));
        }
        let mut steps = self.steps.clone();
        if let Some(last) = steps.last_mut() {
            last.selector = Some(selector);
        }
        Ok(Self { steps })
    }

    /// The same path without the selector on its last step.
    pub fn sequence(&self) -> Self {
        let mut steps = self.steps.clone();
        if let Some(last) = steps.last_mut() {
            last.selector = None;
        }
        Self { steps }
    }

    /// True when `self` lies at or below `prefix` in the document tree.
    ///
    /// `skills[0].items[1]` is below `skills[0].items` and below `skills[0]`, but not
    /// below `skills[1]`.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        let n = prefix.steps.len();
        if n > self.steps.len() {
            return false;
        }
        if self.steps[..n - 1] != prefix.steps[..n - 1] {
            return false;
        }
        let (mine, theirs) = (&self.steps[n - 1], &prefix.steps[n - 1]);
        mine.name == theirs.name
            && (theirs.selector.is_none() || mine.selector == theirs.selector)
    }
}

fn parse_segment(path: &str, segment: &str) -> Result<Step, PathError> {
    let (name, selector) = match segment.find('[') {
        None => {
            if segment.contains(']') {
                return Err(PathError::syntax(path, "unmatched ']'"));
            }
            (segment, None)
        }
        Some(open) => {
            let inner = segment[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| PathError::syntax(path, "unterminated '['"))?;
            if inner.contains('[') || inner.contains(']') {
                return Err(PathError::syntax(
                    path,
                    "a segment may select at most one element",
                ));
            }
            (&segment[..open], Some(parse_selector(path, inner)?))
        }
    };

    if !is_valid_name(name) {
        return Err(PathError::syntax(
            path,
            format!("invalid property name '{name}'"),
        ));
    }
    Ok(Step::new(name, selector))
}

fn parse_selector(path: &str, inner: &str) -> Result<Selector, PathError> {
    let (digits, by_id) = match inner.strip_prefix('#') {
        Some(rest) => (rest, true),
        None => (inner, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathError::syntax(
            path,
            format!("'[{inner}]' is not a valid index"),
        ));
    }
    let selector = if by_id {
        digits.parse::<u64>().map(|n| Selector::Id(ItemId(n)))
    } else {
        digits.parse::<usize>().map(Selector::Index)
    };
    selector.map_err(|_| PathError::syntax(path, format!("'[{inner}]' is too large")))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_indexed_path() {
        let path = Path::parse("experience[2].technologies[0]").unwrap();
        assert_eq!(
            path.steps(),
            &[
                Step::new("experience", Some(Selector::Index(2))),
                Step::new("technologies", Some(Selector::Index(0))),
            ]
        );
    }

    #[test]
    fn test_parse_id_selector() {
        let path = Path::parse("experience[#7].title").unwrap();
        assert_eq!(path.steps()[0].selector, Some(Selector::Id(ItemId(7))));
        assert_eq!(path.steps()[1], Step::new("title", None));
    }

    #[test]
    fn test_display_round_trips_canonical_text() {
        for text in [
            "summary",
            "personalInfo.name",
            "skills[0].items",
            "experience[12].achievements[#3]",
        ] {
            assert_eq!(Path::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in [
            "",
            "experience.",
            ".title",
            "experience[",
            "experience[]",
            "experience[-1]",
            "experience[x]",
            "experience[0][1]",
            "experience]0",
            "1abc",
            "exp erience",
            "experience[#]",
        ] {
            let err = Path::parse(bad).unwrap_err();
            assert!(
                matches!(err, PathError::Syntax { .. }),
                "expected syntax error for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_select_appends_selector_to_last_step() {
        let path = Path::parse("skills[0].items").unwrap();
        let item = path.select(Selector::Index(3)).unwrap();
        assert_eq!(item.to_string(), "skills[0].items[3]");
        assert!(item.select(Selector::Index(1)).is_err());
        assert_eq!(item.sequence(), path);
    }

    #[test]
    fn test_starts_with_respects_selectors() {
        let leaf = Path::parse("skills[0].items[1]").unwrap();
        assert!(leaf.starts_with(&Path::parse("skills[0].items").unwrap()));
        assert!(leaf.starts_with(&Path::parse("skills[0]").unwrap()));
        assert!(leaf.starts_with(&Path::parse("skills").unwrap()));
        assert!(leaf.starts_with(&leaf));
        assert!(!leaf.starts_with(&Path::parse("skills[1]").unwrap()));
        assert!(!leaf.starts_with(&Path::parse("skills[0].category").unwrap()));
        assert!(!Path::parse("skills").unwrap().starts_with(&leaf));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let err = PathError::IndexOutOfRange {
            path: "experience[99]".to_string(),
            index: 99,
            len: 2,
        };
        assert_eq!(err.code(), "INDEX_OUT_OF_RANGE");
        assert!(err.to_string().contains("99"));
    }
}
