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

use serde::{Deserialize, Serialize};

/// Disassembled shader text.
///
/// Instruction lines start with `<index>:`, other lines (declarations,
/// comments, blank lines) carry no instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Disassembly {
    lines: Vec<String>,
}

impl Disassembly {
    /// Build a listing from full text.
    pub fn from_text(text: &str) -> Self {
        Self { lines: text.lines().map(str::to_string).collect() }
    }

    /// Build a listing from individual lines.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// All lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the listing is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Instruction on a 0-based line, if the line carries one.
    pub fn instruction_for_line(&self, line: usize) -> Option<u32> {
        parse_instruction(self.lines.get(line)?)
    }

    /// 0-based line of an instruction.
    pub fn line_for_instruction(&self, instruction: u32) -> Option<usize> {
        self.lines.iter().position(|l| parse_instruction(l) == Some(instruction))
    }

    /// First line at or after `line` carrying an instruction, with that instruction.
    pub fn next_instruction_line(&self, line: usize) -> Option<(usize, u32)> {
        self.lines
            .iter()
            .enumerate()
            .skip(line)
            .find_map(|(i, l)| parse_instruction(l).map(|inst| (i, inst)))
    }
}

fn parse_instruction(line: &str) -> Option<u32> {
    let trimmed = line.trim();
    let (head, _) = trimmed.split_once(':')?;
    if head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    head.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "ps_5_0\n\
                        dcl_input_ps linear v1.xy\n\
                        \n\
                          0: mul r0.xy, v1.xyxx, l(2.0, 2.0, 0, 0)\n\
                          1: sample r1.xyzw, r0.xyxx, t0.xyzw, s0\n\
                        // comment: not an instruction\n\
                         12: ret";

    #[test]
    fn test_instruction_for_line() {
        let dis = Disassembly::from_text(TEXT);
        assert_eq!(dis.instruction_for_line(0), None);
        assert_eq!(dis.instruction_for_line(2), None);
        assert_eq!(dis.instruction_for_line(3), Some(0));
        assert_eq!(dis.instruction_for_line(4), Some(1));
        assert_eq!(dis.instruction_for_line(5), None);
        assert_eq!(dis.instruction_for_line(6), Some(12));
        assert_eq!(dis.instruction_for_line(100), None);
    }

    #[test]
    fn test_line_for_instruction() {
        let dis = Disassembly::from_text(TEXT);
        assert_eq!(dis.line_for_instruction(1), Some(4));
        assert_eq!(dis.line_for_instruction(12), Some(6));
        assert_eq!(dis.line_for_instruction(5), None);
    }

    #[test]
    fn test_next_instruction_line() {
        let dis = Disassembly::from_text(TEXT);
        assert_eq!(dis.next_instruction_line(0), Some((3, 0)));
        assert_eq!(dis.next_instruction_line(5), Some((6, 12)));
        assert_eq!(dis.next_instruction_line(7), None);
    }
}
