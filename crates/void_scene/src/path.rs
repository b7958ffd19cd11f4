//! Slash-delimited node paths
//!
//! `/root/level/player` is absolute and starts at the tree root, whose name
//! must match the first segment. `../sibling` and `./child` are resolved
//! relative to a starting node. Empty segments are ignored.

use std::fmt;

/// A parsed node path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    absolute: bool,
    parts: Vec<String>,
}

/// A single resolved path step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    /// `.`
    Current,
    /// `..`
    Parent,
    /// A child name
    Child(&'a str),
}

impl NodePath {
    pub fn parse(path: &str) -> Self {
        let absolute = path.starts_with('/');
        let parts = path
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        Self { absolute, parts }
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Iterate the path as navigation steps
    pub fn segments(&self) -> impl Iterator<Item = PathSegment<'_>> {
        self.parts.iter().map(|part| match part.as_str() {
            "." => PathSegment::Current,
            ".." => PathSegment::Parent,
            name => PathSegment::Child(name),
        })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/")?;
        }
        write!(f, "{}", self.parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        let path = NodePath::parse("/root/level//player/");
        assert!(path.is_absolute());
        assert_eq!(path.parts(), ["root", "level", "player"]);
        assert_eq!(path.to_string(), "/root/level/player");
    }

    #[test]
    fn test_segments() {
        let path = NodePath::parse("../a/./b");
        assert!(!path.is_absolute());
        let segments: Vec<_> = path.segments().collect();
        assert_eq!(
            segments,
            vec![
                PathSegment::Parent,
                PathSegment::Child("a"),
                PathSegment::Current,
                PathSegment::Child("b"),
            ]
        );
    }

    #[test]
    fn test_empty_path() {
        let path = NodePath::parse("");
        assert!(!path.is_absolute());
        assert!(path.parts().is_empty());
    }
}
