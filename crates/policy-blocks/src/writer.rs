//! Fragment writing.
//!
//! Writing always strips an existing fragment with the same tag first, then
//! inserts the new one according to its [`Placement`].

use crate::error::{Error, Result};
use crate::parser::{FragmentTag, has_fragment};
use regex::Regex;

/// Where a fragment is inserted.
#[derive(Debug, Clone, Default)]
pub enum Placement {
    /// Before the first line matching the pattern.
    Before(Regex),
    /// After the first line matching the pattern.
    After(Regex),
    /// At the end of the content.
    #[default]
    Append,
}

impl Placement {
    pub fn before(pattern: &str) -> Result<Self> {
        Ok(Self::Before(Regex::new(pattern)?))
    }

    pub fn after(pattern: &str) -> Result<Self> {
        Ok(Self::After(Regex::new(pattern)?))
    }
}

/// Remove the lines of any fragment tagged `tag`, markers included.
///
/// Returns the remaining lines and whether anything was removed.
pub fn strip_fragment<'a>(content: &'a str, tag: &FragmentTag) -> (Vec<&'a str>, bool) {
    let begin = tag.begin_marker();
    let end = tag.end_marker();
    let mut kept = Vec::new();
    let mut inside = false;
    let mut removed = false;

    for line in content.lines() {
        let trimmed = line.trim_end();
        if !inside && trimmed == begin {
            inside = true;
            removed = true;
            continue;
        }
        if inside {
            if trimmed == end {
                inside = false;
            }
            continue;
        }
        kept.push(line);
    }

    (kept, removed)
}

fn is_marker(line: &str, keyword: &str) -> bool {
    let line = line.trim_end();
    line.starts_with(&format!("### {keyword} ")) && line.ends_with(" ###")
}

/// Insert or replace the fragment tagged `tag` with `body`.
///
/// Lines inside other fragments never match the placement pattern. When
/// the pattern matches no line the fragment is appended.
pub fn upsert_fragment(
    content: &str,
    tag: &FragmentTag,
    body: &[String],
    placement: &Placement,
) -> String {
    let (src, _) = strip_fragment(content, tag);

    let begin = tag.begin_marker();
    let end = tag.end_marker();
    let mut fragment: Vec<&str> = Vec::with_capacity(body.len() + 2);
    fragment.push(&begin);
    fragment.extend(body.iter().map(String::as_str));
    fragment.push(&end);

    let mut dst: Vec<&str> = Vec::with_capacity(src.len() + fragment.len());
    let mut inserted = false;
    let mut in_other = false;

    for line in &src {
        if is_marker(line, "BEGIN") {
            in_other = true;
        }
        let candidate = !inserted && !in_other;
        if in_other && is_marker(line, "END") {
            in_other = false;
        }
        match placement {
            Placement::Before(pattern) if candidate && pattern.is_match(line) => {
                dst.extend(&fragment);
                dst.push(line);
                inserted = true;
            }
            Placement::After(pattern) if candidate && pattern.is_match(line) => {
                dst.push(line);
                dst.extend(&fragment);
                inserted = true;
            }
            _ => dst.push(line),
        }
    }

    if !inserted {
        dst.extend(&fragment);
    }

    join_lines(&dst)
}

/// Remove the fragment tagged `tag`.
///
/// # Errors
/// Returns `Error::FragmentNotFound` if no such fragment exists.
pub fn remove_fragment(content: &str, tag: &FragmentTag) -> Result<String> {
    if !has_fragment(content, tag) {
        return Err(Error::FragmentNotFound {
            tag: tag.to_string(),
        });
    }
    let (kept, _) = strip_fragment(content, tag);
    Ok(join_lines(&kept))
}

fn join_lines(lines: &[&str]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
