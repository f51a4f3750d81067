//! Field path parsing: `allocations[0].ranges[1].length` → segments.

use std::fmt;

/// Where a segment writes within its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Plain object key.
    NotArray,
    /// `key[]`: push onto the end of the array.
    Append,
    /// `key[n]`: set at position `n`.
    At(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub index: Index,
}

impl Segment {
    /// Parse one dot-separated piece. Anything that isn't `letters[digits?]`
    /// is taken verbatim as a plain key.
    pub fn parse(piece: &str) -> Self {
        if let Some((name, index)) = parse_array_piece(piece) {
            return Segment { name: name.to_string(), index };
        }
        Segment { name: piece.to_string(), index: Index::NotArray }
    }
}

fn parse_array_piece(piece: &str) -> Option<(&str, Index)> {
    let inner = piece.strip_suffix(']')?;
    let open = inner.find('[')?;
    let (name, digits) = (&inner[..open], &inner[open + 1..]);
    let name_ok = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_');
    if !name_ok {
        return None;
    }
    if digits.is_empty() {
        return Some((name, Index::Append));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|n| (name, Index::At(n)))
}

/// A full dot/bracket path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub segments: Vec<Segment>,
}

impl FieldPath {
    /// Splits on `.`, collapsing whitespace in each piece. Empty pieces are a
    /// markup defect and abort the whole serialization.
    pub fn parse(path: &str) -> Result<Self, FormError> {
        let mut segments = Vec::new();
        for (pos, raw) in path.split('.').enumerate() {
            let piece = collapse_whitespace(raw);
            if piece.is_empty() {
                return Err(FormError::EmptySegment { pos, path: path.to_string() });
            }
            segments.push(Segment::parse(&piece));
        }
        Ok(FieldPath { segments })
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Structural serialization failures. These point at broken field naming,
/// never at user input.
#[derive(Debug, Clone, PartialEq)]
pub enum FormError {
    EmptySegment { pos: usize, path: String },
    NotAnArray { name: String, found: String },
    NotAnObject { name: String, path: String },
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::EmptySegment { pos, path } => {
                write!(f, "Invalid part at position {} in {}", pos, path)
            }
            FormError::NotAnArray { name, found } => {
                write!(f, "Invalid field: {} is not an array. From {}", found, name)
            }
            FormError::NotAnObject { name, path } => {
                write!(f, "Invalid field: {} is not an object. From {}", name, path)
            }
        }
    }
}

impl std::error::Error for FormError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        assert_eq!(Segment::parse("rule"), Segment { name: "rule".into(), index: Index::NotArray });
    }

    #[test]
    fn test_indexed_and_append() {
        assert_eq!(Segment::parse("ranges[12]").index, Index::At(12));
        assert_eq!(Segment::parse("Buckets[]").index, Index::Append);
        assert_eq!(Segment::parse("add-bucket[]").name, "add-bucket");
    }

    #[test]
    fn test_non_matching_brackets_are_plain_keys() {
        let s = Segment::parse("a1[0]");
        assert_eq!(s.index, Index::NotArray);
        assert_eq!(s.name, "a1[0]");
        assert_eq!(Segment::parse("x[y]").index, Index::NotArray);
    }

    #[test]
    fn test_whitespace_collapsed() {
        let p = FieldPath::parse(" a . b ").unwrap();
        assert_eq!(p.segments[0].name, "a");
        assert_eq!(p.segments[1].name, "b");
    }

    #[test]
    fn test_empty_segment_is_fatal() {
        let err = FieldPath::parse("a..c").unwrap_err();
        assert_eq!(err, FormError::EmptySegment { pos: 1, path: "a..c".into() });
        assert!(FieldPath::parse("a.  ").is_err());
    }
}
