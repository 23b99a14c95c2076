//! Fragment parsing.
//!
//! A fragment is the run of lines between a `### BEGIN <tag> ###` marker
//! and the matching `### END <tag> ###` marker.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Stable identity of a fragment: the owning module plus an operation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentTag(String);

impl FragmentTag {
    pub fn new(module: &str, id: &str) -> Self {
        Self(format!("policy module {} -- {}", module, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn begin_marker(&self) -> String {
        format!("### BEGIN {} ###", self.0)
    }

    pub(crate) fn end_marker(&self) -> String {
        format!("### END {} ###", self.0)
    }
}

impl fmt::Display for FragmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed fragment with its tag, body and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub tag: String,
    /// Lines between the markers, joined with `\n`.
    pub content: String,
    /// 1-based line of the BEGIN marker.
    pub start_line: usize,
    /// 1-based line of the END marker.
    pub end_line: usize,
}

static BEGIN_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^### BEGIN (.+?) ###\s*$").expect("Invalid begin marker regex")
});

/// Parse all complete fragments, in order of appearance.
///
/// A BEGIN marker without a matching END marker is ignored.
pub fn parse_fragments(content: &str) -> Vec<Fragment> {
    let lines: Vec<&str> = content.lines().collect();
    let mut fragments = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let Some(caps) = BEGIN_MARKER_REGEX.captures(lines[idx]) else {
            idx += 1;
            continue;
        };
        let tag = caps[1].to_string();
        let end_marker = format!("### END {} ###", tag);

        match lines[idx + 1..]
            .iter()
            .position(|line| line.trim_end() == end_marker)
        {
            Some(offset) => {
                let end = idx + 1 + offset;
                fragments.push(Fragment {
                    tag,
                    content: lines[idx + 1..end].join("\n"),
                    start_line: idx + 1,
                    end_line: end + 1,
                });
                idx = end + 1;
            }
            None => idx += 1,
        }
    }

    fragments
}

/// Find a fragment by tag.
pub fn find_fragment(content: &str, tag: &FragmentTag) -> Option<Fragment> {
    parse_fragments(content)
        .into_iter()
        .find(|fragment| fragment.tag == tag.as_str())
}

/// Whether a fragment with this tag exists.
pub fn has_fragment(content: &str, tag: &FragmentTag) -> bool {
    find_fragment(content, tag).is_some()
}
