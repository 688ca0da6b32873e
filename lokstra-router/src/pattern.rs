//! The normalised path-pattern syntax shared by every router engine:
//! `{name}` matches exactly one segment, `{name...}` matches the remainder
//! of the path (spec §4.B). Engine-native dialects translate to/from this
//! form in `engine.rs`; the trie in `trie.rs` only ever sees `Segment`s.

use lokstra_core::LokstraError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    Wildcard(String),
}

/// A parsed pattern: method plus the segment sequence. `ANY` is kept as a
/// separate pseudo-method and expanded into concrete verbs by the trie at
/// insertion time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub segments: Vec<Segment>,
    pub raw: String,
}

impl Pattern {
    /// Parse a normalised path (no leading `METHOD ` prefix, just the path
    /// part, e.g. `/users/{id}/posts/{slug...}`).
    pub fn parse(path: &str) -> Result<Self, LokstraError> {
        if !path.starts_with('/') {
            return Err(LokstraError::Config(format!(
                "route pattern must start with '/': {path}"
            )));
        }
        let mut segments = Vec::new();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (i, part) in parts.iter().enumerate() {
            if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if let Some(name) = inner.strip_suffix("...") {
                    if i != parts.len() - 1 {
                        return Err(LokstraError::Config(format!(
                            "wildcard segment must be last in pattern: {path}"
                        )));
                    }
                    if name.is_empty() {
                        return Err(LokstraError::Config(format!(
                            "wildcard segment missing a name: {path}"
                        )));
                    }
                    segments.push(Segment::Wildcard(name.to_string()));
                } else {
                    if inner.is_empty() {
                        return Err(LokstraError::Config(format!(
                            "param segment missing a name: {path}"
                        )));
                    }
                    segments.push(Segment::Param(inner.to_string()));
                }
            } else {
                segments.push(Segment::Static((*part).to_string()));
            }
        }
        Ok(Pattern {
            segments,
            raw: path.to_string(),
        })
    }

    /// Count of leading static segments, used for the "longest static
    /// prefix wins" tie-break.
    pub fn static_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_static_and_param_segments() {
        let p = Pattern::parse("/users/{id}/posts").unwrap();
        assert_eq!(
            p.segments,
            vec![
                Segment::Static("users".into()),
                Segment::Param("id".into()),
                Segment::Static("posts".into()),
            ]
        );
    }

    #[test]
    fn parses_wildcard_suffix() {
        let p = Pattern::parse("/static/{path...}").unwrap();
        assert_eq!(
            p.segments,
            vec![Segment::Static("static".into()), Segment::Wildcard("path".into())]
        );
        assert!(p.has_wildcard());
    }

    #[test]
    fn rejects_wildcard_not_last() {
        assert!(Pattern::parse("/a/{p...}/b").is_err());
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert!(Pattern::parse("users/{id}").is_err());
    }

    #[test]
    fn root_path_has_no_segments() {
        let p = Pattern::parse("/").unwrap();
        assert!(p.segments.is_empty());
    }

    #[test]
    fn static_prefix_len_stops_at_first_param() {
        let p = Pattern::parse("/a/b/{id}/c").unwrap();
        assert_eq!(p.static_prefix_len(), 2);
    }
}
