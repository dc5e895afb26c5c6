// SDB - Shader Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Variable path expressions.
//!
//! Paths address nested shader variables, for example `S.b[1]` or `r0.xyz`.
//! The root identifier runs up to the first `.` or `[`; member segments
//! follow a `.` and index segments are enclosed in brackets.

use std::fmt::Write as _;

/// Normalize an expression by removing all whitespace.
///
/// Two expressions that only differ in spacing are the same watch.
pub fn normalize_expression(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// One component of a variable path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// `.name` (or the root identifier)
    Member(String),
    /// `[index]`
    Index(u32),
}

impl PathSegment {
    /// Append this segment to a path string in its canonical form.
    pub fn append_to(&self, path: &mut String) {
        match self {
            Self::Member(name) if path.is_empty() => path.push_str(name),
            Self::Member(name) => {
                path.push('.');
                path.push_str(name);
            }
            Self::Index(idx) => {
                let _ = write!(path, "[{idx}]");
            }
        }
    }
}

/// The root identifier of a path, up to the first `.` or `[`.
pub fn root_identifier(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    &path[..end]
}

/// Split a path into segments.
///
/// Returns `None` for syntactically invalid paths: empty segments, unclosed or
/// non-numeric brackets, or a path that does not start with an identifier.
pub fn split_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut rest = path;

    let root = root_identifier(rest);
    if !is_identifier(root) {
        return None;
    }
    segments.push(PathSegment::Member(root.to_string()));
    rest = &rest[root.len()..];

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let name = &after[..end];
            if !is_identifier(name) {
                return None;
            }
            segments.push(PathSegment::Member(name.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let idx = after[..end].trim().parse::<u32>().ok()?;
            segments.push(PathSegment::Index(idx));
            rest = &after[end + 1..];
        } else {
            return None;
        }
    }

    Some(segments)
}

/// Join segments back into a canonical path string.
pub fn join_path(segments: &[PathSegment]) -> String {
    let mut path = String::new();
    for segment in segments {
        segment.append_to(&mut path);
    }
    path
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphanumeric() || c == '_' || c == '$' || c == '@' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '@' || c == ':')
}
