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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};

/// Specifies the location of a breakpoint, either on a source line or on a
/// specific disassembled instruction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BreakpointLocation {
    /// A breakpoint on a source line.
    Source {
        /// Index of the source file in the trace.
        file_index: u32,
        /// Line number in the source file (1-based).
        line: u32,
    },
    /// A breakpoint on an instruction.
    Instruction {
        /// Instruction index.
        index: u32,
    },
}

impl Display for BreakpointLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.display(None))
    }
}

impl FromStr for BreakpointLocation {
    type Err = Error;

    /// Parses a breakpoint location from a string in the format:
    /// - `@<instruction>` for instruction breakpoints
    /// - `@<file index>:<line>` for source breakpoints
    ///
    /// The leading `@` is optional.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse_with_files(s, &[])
    }
}

impl BreakpointLocation {
    /// Parses a breakpoint location, resolving file names against `files`.
    ///
    /// In addition to numeric file indices, `@<file name>:<line>` is accepted
    /// where the name matches a source file exactly or by its last path component.
    pub fn parse_with_files(s: &str, files: &[String]) -> Result<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
        if trimmed.is_empty() {
            bail!("Empty breakpoint location");
        }

        match trimmed.rsplit_once(':') {
            None => {
                let index =
                    trimmed.parse::<u32>().map_err(|e| eyre!("Invalid instruction index: {e}"))?;
                Ok(Self::Instruction { index })
            }
            Some((file, line)) => {
                let line = line.parse::<u32>().map_err(|e| eyre!("Invalid line number: {e}"))?;
                if line == 0 {
                    bail!("Line numbers start at 1");
                }
                let file_index = match file.parse::<u32>() {
                    Ok(idx) => idx,
                    Err(_) => files
                        .iter()
                        .position(|f| f == file)
                        .or_else(|| {
                            files.iter().position(|f| {
                                f.rsplit(['/', '\\']).next().is_some_and(|base| base == file)
                            })
                        })
                        .ok_or_else(|| eyre!("Unknown source file: {file}"))?
                        as u32,
                };
                Ok(Self::Source { file_index, line })
            }
        }
    }

    /// The `(file, line)` key of this location; instruction breakpoints use file `-1`.
    pub fn key(&self) -> (i32, u32) {
        match self {
            Self::Source { file_index, line } => (*file_index as i32, *line),
            Self::Instruction { index } => (-1, *index),
        }
    }

    /// Rebuild a location from its key.
    pub fn from_key(key: (i32, u32)) -> Self {
        match key {
            (file, index) if file < 0 => Self::Instruction { index },
            (file, line) => Self::Source { file_index: file as u32, line },
        }
    }

    /// Whether this is an instruction breakpoint.
    pub fn is_instruction(&self) -> bool {
        matches!(self, Self::Instruction { .. })
    }

    /// Formats the location without the leading `@`, naming files when `files` is given.
    pub fn display(&self, files: Option<&[String]>) -> String {
        match self {
            Self::Instruction { index } => format!("{index}"),
            Self::Source { file_index, line } => {
                match files.and_then(|f| f.get(*file_index as usize)) {
                    Some(name) => format!("{name}:{line}"),
                    None => format!("{file_index}:{line}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<String> {
        vec!["shaders/main.hlsl".to_string(), "lighting.hlsl".to_string()]
    }

    #[test]
    fn test_parse_instruction() {
        assert_eq!(
            "@42".parse::<BreakpointLocation>().unwrap(),
            BreakpointLocation::Instruction { index: 42 }
        );
        assert_eq!(
            " 7 ".parse::<BreakpointLocation>().unwrap(),
            BreakpointLocation::Instruction { index: 7 }
        );
    }

    #[test]
    fn test_parse_source_by_index() {
        assert_eq!(
            "@1:15".parse::<BreakpointLocation>().unwrap(),
            BreakpointLocation::Source { file_index: 1, line: 15 }
        );
    }

    #[test]
    fn test_parse_source_by_name() {
        let files = files();
        assert_eq!(
            BreakpointLocation::parse_with_files("@main.hlsl:10", &files).unwrap(),
            BreakpointLocation::Source { file_index: 0, line: 10 }
        );
        assert_eq!(
            BreakpointLocation::parse_with_files("@lighting.hlsl:3", &files).unwrap(),
            BreakpointLocation::Source { file_index: 1, line: 3 }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<BreakpointLocation>().is_err());
        assert!("@".parse::<BreakpointLocation>().is_err());
        assert!("@abc".parse::<BreakpointLocation>().is_err());
        assert!("@0:abc".parse::<BreakpointLocation>().is_err());
        assert!("@0:0".parse::<BreakpointLocation>().is_err());
        assert!("@main.hlsl:10".parse::<BreakpointLocation>().is_err());
        assert!(BreakpointLocation::parse_with_files("@nope.hlsl:1", &files()).is_err());
    }

    #[test]
    fn test_display() {
        let files = files();
        let src = BreakpointLocation::Source { file_index: 0, line: 10 };
        assert_eq!(src.to_string(), "@0:10");
        assert_eq!(src.display(Some(&files)), "shaders/main.hlsl:10");
        assert_eq!(BreakpointLocation::Instruction { index: 5 }.to_string(), "@5");
    }

    #[test]
    fn test_display_roundtrip() {
        for loc in [
            BreakpointLocation::Instruction { index: 0 },
            BreakpointLocation::Source { file_index: 2, line: 99 },
        ] {
            assert_eq!(loc.to_string().parse::<BreakpointLocation>().unwrap(), loc);
        }
    }

    #[test]
    fn test_key() {
        let inst = BreakpointLocation::Instruction { index: 12 };
        let src = BreakpointLocation::Source { file_index: 3, line: 4 };
        assert_eq!(inst.key(), (-1, 12));
        assert_eq!(src.key(), (3, 4));
        assert_eq!(BreakpointLocation::from_key(inst.key()), inst);
        assert_eq!(BreakpointLocation::from_key(src.key()), src);
        assert!(inst.is_instruction());
    }
}
