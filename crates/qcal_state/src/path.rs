//! Attribute paths and references
//!
//! Gantree: L1_State → Path
//!
//! A [`StatePath`] addresses a node of the device-state tree
//! (`/qubits/q1/xy/operations/x180/alpha`). A [`Reference`] is a string value
//! pointing elsewhere in the tree:
//!
//! - `#/qubits/q1/anharmonicity` - absolute, from the root
//! - `#./length` - relative to the object owning the attribute
//! - `#../x180/sigma` - relative to that object's parent (`../` repeats)

use qcal_core::{QcalError, QcalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path to a node in the device-state tree
/// Gantree: StatePath // 속성 경로
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    /// The root of the tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Build from segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `/a/b/c` (leading slash optional, empty segments ignored)
    pub fn parse(s: &str) -> Self {
        Self::from_segments(s.split('/').filter(|seg| !seg.is_empty()))
    }

    /// Path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Is this the root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path (`None` at the root)
    pub fn parent(&self) -> Option<StatePath> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// Append one segment
    pub fn child(&self, segment: impl Into<String>) -> StatePath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Append every segment of `other`
    pub fn join(&self, other: &StatePath) -> StatePath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Check whether `self` is `other` or lies below it
    pub fn starts_with(&self, other: &StatePath) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            write!(f, "/{}", seg)?;
        }
        Ok(())
    }
}

impl FromStr for StatePath {
    type Err = QcalError;

    fn from_str(s: &str) -> QcalResult<Self> {
        Ok(StatePath::parse(s))
    }
}

impl From<StatePath> for String {
    fn from(path: StatePath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for StatePath {
    type Error = QcalError;

    fn try_from(s: String) -> QcalResult<Self> {
        Ok(StatePath::parse(&s))
    }
}

impl From<&str> for StatePath {
    fn from(s: &str) -> Self {
        StatePath::parse(s)
    }
}

// ============================================================================
// Reference
// ============================================================================

/// Parsed reference string
/// Gantree: Reference // 참조
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `#/...`
    Absolute(StatePath),
    /// `#./...` (`up == 0`) or `#../...` (`up >= 1`)
    Relative {
        /// Levels to climb above the owning object
        up: usize,
        /// Remaining path below that ancestor
        rest: StatePath,
    },
}

impl Reference {
    /// Parse a string value; `None` if it is not a reference
    pub fn parse(value: &str) -> Option<Reference> {
        let body = value.strip_prefix('#')?;

        if let Some(abs) = body.strip_prefix('/') {
            return Some(Reference::Absolute(StatePath::parse(abs)));
        }

        let mut rest = body;
        let mut up = 0usize;
        let mut relative = false;
        loop {
            if let Some(r) = rest.strip_prefix("../") {
                up += 1;
                rest = r;
                relative = true;
            } else if let Some(r) = rest.strip_prefix("./") {
                rest = r;
                relative = true;
            } else if rest == ".." {
                up += 1;
                rest = "";
                relative = true;
                break;
            } else {
                break;
            }
        }

        if relative {
            Some(Reference::Relative {
                up,
                rest: StatePath::parse(rest),
            })
        } else {
            None
        }
    }

    /// Absolute target for the reference stored at `attribute`
    ///
    /// Relative references start from the object that owns the attribute.
    pub fn target_from(&self, attribute: &StatePath) -> QcalResult<StatePath> {
        match self {
            Reference::Absolute(path) => Ok(path.clone()),
            Reference::Relative { up, rest } => {
                let mut base = attribute.parent().ok_or_else(|| QcalError::InvalidReference {
                    path: attribute.to_string(),
                    reference: self.to_string(),
                    reason: "reference stored at the root".into(),
                })?;
                for _ in 0..*up {
                    base = base.parent().ok_or_else(|| QcalError::InvalidReference {
                        path: attribute.to_string(),
                        reference: self.to_string(),
                        reason: "climbs above the root".into(),
                    })?;
                }
                Ok(base.join(rest))
            }
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Absolute(path) => write!(f, "#{}", path),
            Reference::Relative { up, rest } => {
                f.write_str("#")?;
                if *up == 0 {
                    f.write_str("./")?;
                }
                for _ in 0..*up {
                    f.write_str("../")?;
                }
                let joined = rest.segments().join("/");
                f.write_str(&joined)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_display() {
        let path = StatePath::parse("/qubits/q1/xy");
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.to_string(), "/qubits/q1/xy");
        assert_eq!(StatePath::parse("qubits//q1/").to_string(), "/qubits/q1");
        assert_eq!(StatePath::root().to_string(), "/");
    }

    #[test]
    fn test_path_parent_child() {
        let path = StatePath::parse("/a/b");
        assert_eq!(path.parent().unwrap(), StatePath::parse("/a"));
        assert_eq!(path.child("c"), StatePath::parse("/a/b/c"));
        assert!(StatePath::root().parent().is_none());
        assert!(path.child("c").starts_with(&path));
    }

    #[test]
    fn test_reference_parse() {
        assert_eq!(
            Reference::parse("#/qubits/q1/anharmonicity"),
            Some(Reference::Absolute(StatePath::parse("/qubits/q1/anharmonicity")))
        );
        assert_eq!(
            Reference::parse("#../x180/sigma"),
            Some(Reference::Relative {
                up: 1,
                rest: StatePath::parse("x180/sigma")
            })
        );
        assert_eq!(
            Reference::parse("#./length"),
            Some(Reference::Relative {
                up: 0,
                rest: StatePath::parse("length")
            })
        );
        assert_eq!(Reference::parse("plain"), None);
        assert_eq!(Reference::parse("#hashtag"), None);
    }

    #[test]
    fn test_relative_target() {
        let attr = StatePath::parse("/qubits/q1/xy/operations/x90/sigma");
        let reference = Reference::parse("#../x180/sigma").unwrap();
        assert_eq!(
            reference.target_from(&attr).unwrap(),
            StatePath::parse("/qubits/q1/xy/operations/x180/sigma")
        );

        let own = Reference::parse("#./length").unwrap();
        assert_eq!(
            own.target_from(&attr).unwrap(),
            StatePath::parse("/qubits/q1/xy/operations/x90/length")
        );

        let deep = Reference::parse("#../../../anharmonicity").unwrap();
        assert_eq!(
            deep.target_from(&attr).unwrap(),
            StatePath::parse("/qubits/q1/anharmonicity")
        );
    }

    #[test]
    fn test_relative_above_root_fails() {
        let attr = StatePath::parse("/a/b");
        let reference = Reference::parse("#../../../x").unwrap();
        assert!(reference.target_from(&attr).is_err());
    }

    #[test]
    fn test_reference_display_round_trip() {
        for s in ["#/a/b", "#../x180/sigma", "#./length", "#../../c"] {
            assert_eq!(Reference::parse(s).unwrap().to_string(), s);
        }
    }
}
