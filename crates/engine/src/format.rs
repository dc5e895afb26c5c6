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

//! Rendering of shader values as text.

use std::fmt::Write as _;

use sdb_common::types::{ShaderValue, ShaderVariable, VarType, VariableKind};

use crate::{DebugError, DebugResult};

/// Display cast suffix of a watch expression (`r0.x,x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cast {
    /// `i` or `d`: signed integer
    Signed,
    /// `u`: unsigned integer
    Unsigned,
    /// `x`: hexadecimal
    Hex,
    /// `b`: binary
    Binary,
    /// `o`: octal
    Octal,
    /// `f`: floating point
    Float,
    /// `c`: colour swatch
    Colour,
}

impl Cast {
    /// Parse a cast letter.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'i' | 'd' => Some(Self::Signed),
            'u' => Some(Self::Unsigned),
            'x' => Some(Self::Hex),
            'b' => Some(Self::Binary),
            'o' => Some(Self::Octal),
            'f' => Some(Self::Float),
            'c' => Some(Self::Colour),
            _ => None,
        }
    }

    /// Canonical letter of the cast.
    pub fn letter(&self) -> char {
        match self {
            Self::Signed => 'i',
            Self::Unsigned => 'u',
            Self::Hex => 'x',
            Self::Binary => 'b',
            Self::Octal => 'o',
            Self::Float => 'f',
            Self::Colour => 'c',
        }
    }
}

/// Format a float the way the debugger displays it.
pub fn format_f32(v: f32) -> String {
    non_finite(v as f64).unwrap_or_else(|| format!("{v:?}"))
}

/// Format a double the way the debugger displays it.
pub fn format_f64(v: f64) -> String {
    non_finite(v).unwrap_or_else(|| format!("{v:?}"))
}

fn non_finite(v: f64) -> Option<String> {
    if v.is_nan() {
        Some("NaN".to_string())
    } else if v.is_infinite() {
        let sign = if v > 0.0 { "" } else { "-" };
        Some(format!("{sign}Inf"))
    } else {
        None
    }
}

/// Format component `i` of a value.
///
/// Without a cast the base type decides. Untyped values follow `int_view`.
pub fn format_component(
    value: &ShaderValue,
    i: usize,
    var_type: VarType,
    cast: Option<Cast>,
    int_view: bool,
) -> String {
    let wide = var_type.component_size() == 8;
    match cast {
        None => match var_type {
            VarType::Float => format_f32(value.f32v(i)),
            VarType::Half => format_f32(value.f16v(i)),
            VarType::Double => format_f64(value.f64v(i)),
            VarType::SInt => value.s32v(i).to_string(),
            VarType::UInt => value.u32v(i).to_string(),
            VarType::SLong => value.s64v(i).to_string(),
            VarType::ULong => value.u64v(i).to_string(),
            VarType::Bool => (value.u32v(i) != 0).to_string(),
            VarType::GpuPointer => format!("0x{:016X}", value.u64v(i)),
            VarType::Struct
            | VarType::ReadOnlyResource
            | VarType::ReadWriteResource
            | VarType::Sampler
            | VarType::Unknown => {
                if int_view {
                    value.s32v(i).to_string()
                } else {
                    format_f32(value.f32v(i))
                }
            }
        },
        Some(Cast::Signed) if wide => value.s64v(i).to_string(),
        Some(Cast::Signed) => value.s32v(i).to_string(),
        Some(Cast::Unsigned) if wide => value.u64v(i).to_string(),
        Some(Cast::Unsigned) => value.u32v(i).to_string(),
        Some(Cast::Hex) if wide => format!("0x{:016X}", value.u64v(i)),
        Some(Cast::Hex) => format!("0x{:08X}", value.u32v(i)),
        Some(Cast::Binary) if wide => format!("{:064b}", value.u64v(i)),
        Some(Cast::Binary) => format!("{:032b}", value.u32v(i)),
        Some(Cast::Octal) => {
            let v = if wide { value.u64v(i) } else { value.u32v(i) as u64 };
            if v == 0 {
                "0".to_string()
            } else {
                format!("0{v:o}")
            }
        }
        Some(Cast::Float) | Some(Cast::Colour) => match var_type {
            VarType::Half => format_f32(value.f16v(i)),
            _ if wide => format_f64(value.f64v(i)),
            _ => format_f32(value.f32v(i)),
        },
    }
}

/// Check that `cast` can be applied to `var`.
pub fn check_cast(var: &ShaderVariable, cast: Option<Cast>) -> DebugResult<()> {
    let Some(cast) = cast else {
        return Ok(());
    };
    let compatible = match var.kind() {
        VariableKind::Scalar | VariableKind::Vector => true,
        VariableKind::Matrix => cast != Cast::Colour,
        VariableKind::Pointer => matches!(cast, Cast::Hex | Cast::Unsigned),
        VariableKind::Struct
        | VariableKind::ResourceHandle { .. }
        | VariableKind::SamplerHandle => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(DebugError::IncompatibleCast { cast: cast.letter(), type_name: var.type_name() })
    }
}

/// Value text of a variable. Structs render empty, their members carry the values.
pub fn format_value(var: &ShaderVariable, cast: Option<Cast>, int_view: bool) -> String {
    let component = |i: usize| format_component(&var.value, i, var.var_type, cast, int_view);
    match var.kind() {
        VariableKind::Struct => String::new(),
        VariableKind::ResourceHandle { .. } | VariableKind::SamplerHandle => {
            var.bind_index().map(|b| b.to_string()).unwrap_or_default()
        }
        VariableKind::Pointer => component(0),
        VariableKind::Scalar => component(0),
        VariableKind::Vector => (0..var.columns as usize).map(component).collect::<Vec<_>>().join(", "),
        VariableKind::Matrix => {
            let columns = var.columns as usize;
            (0..var.rows as usize)
                .map(|r| {
                    let row: Vec<String> = (0..columns).map(|c| component(r * columns + c)).collect();
                    format!("{{{}}}", row.join(", "))
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Colour swatch of a scalar or vector: up to four components clamped to `[0, 1]`, alpha defaults to 1.
pub fn colour_swatch(var: &ShaderVariable) -> Option<[f32; 4]> {
    if !matches!(var.kind(), VariableKind::Scalar | VariableKind::Vector) {
        return None;
    }
    let mut rgba = [0.0, 0.0, 0.0, 1.0];
    for (i, slot) in rgba.iter_mut().enumerate().take((var.columns as usize).min(4)) {
        let v = match var.var_type {
            VarType::Float | VarType::Unknown => var.value.f32v(i),
            VarType::Half => var.value.f16v(i),
            VarType::Double => var.value.f64v(i) as f32,
            VarType::SInt => var.value.s32v(i) as f32 / 255.0,
            _ => var.value.u32v(i) as f32 / 255.0,
        };
        *slot = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    }
    Some(rgba)
}

/// Tooltip table of a register value: float, uint, int and hex rows over X Y Z W.
pub fn tooltip_table(var: &ShaderVariable) -> Option<String> {
    if !matches!(var.kind(), VariableKind::Scalar | VariableKind::Vector | VariableKind::Matrix) {
        return None;
    }
    let columns = (var.columns as usize).clamp(1, 4);
    let width = 14;

    let mut out = format!("{:<7}", var.name);
    for axis in ["X", "Y", "Z", "W"].iter().take(columns) {
        let _ = write!(out, "{axis:>width$}");
    }
    out.push('\n');

    let rows: [(&str, fn(&ShaderValue, usize) -> String); 4] = [
        ("float", |v, i| format_f32(v.f32v(i))),
        ("uint", |v, i| v.u32v(i).to_string()),
        ("int", |v, i| v.s32v(i).to_string()),
        ("hex", |v, i| format!("0x{:08X}", v.u32v(i))),
    ];
    for (label, render) in rows {
        let _ = write!(out, "{label:<7}");
        for i in 0..columns {
            let _ = write!(out, "{:>width$}", render(&var.value, i));
        }
        out.push('\n');
    }
    Some(out)
}
