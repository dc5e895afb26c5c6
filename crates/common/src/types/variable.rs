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

//! Shader variables as produced by the GPU shader debugger.
//!
//! A [`ShaderVariable`] is a named, typed value with an optional list of
//! members. Values are stored as a raw 128-byte union ([`ShaderValue`]) and
//! interpreted according to [`VarType`]. Resource and sampler handles keep
//! their binding ([`ShaderBindIndex`]) in the first value words.

use std::fmt::{self, Display};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::expression::PathSegment;

/// Number of 32-bit words in a [`ShaderValue`].
pub const SHADER_VALUE_WORDS: usize = 32;

/// Base type of a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VarType {
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// 16-bit float, stored in the low half of a 32-bit slot
    Half,
    /// 32-bit signed integer
    SInt,
    /// 32-bit unsigned integer
    UInt,
    /// 64-bit signed integer
    SLong,
    /// 64-bit unsigned integer
    ULong,
    /// Boolean, stored as a 32-bit slot
    Bool,
    /// Aggregate with members
    Struct,
    /// GPU virtual address
    GpuPointer,
    /// Read-only resource handle (SRV / texture / buffer)
    ReadOnlyResource,
    /// Read-write resource handle (UAV / storage image / storage buffer)
    ReadWriteResource,
    /// Sampler handle
    Sampler,
    /// Untyped register contents
    #[default]
    Unknown,
}

impl VarType {
    /// Size in bytes of one component slot of this type.
    pub fn component_size(&self) -> usize {
        match self {
            Self::Double | Self::SLong | Self::ULong | Self::GpuPointer => 8,
            _ => 4,
        }
    }

    /// Whether this is a read-only or read-write resource handle.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::ReadOnlyResource | Self::ReadWriteResource)
    }

    /// Whether this is any kind of binding handle (resource or sampler).
    pub fn is_handle(&self) -> bool {
        self.is_resource() || matches!(self, Self::Sampler)
    }

    /// Whether values of this type are floating point.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::Half)
    }

    /// HLSL-style base type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Double => "double",
            Self::Half => "half",
            Self::SInt => "int",
            Self::UInt => "uint",
            Self::SLong => "int64_t",
            Self::ULong => "uint64_t",
            Self::Bool => "bool",
            Self::Struct => "struct",
            Self::GpuPointer => "pointer",
            Self::ReadOnlyResource => "Resource",
            Self::ReadWriteResource => "RWResource",
            Self::Sampler => "Sampler",
            Self::Unknown => "unknown",
        }
    }
}

/// Closed set of variable shapes, derived from type, dimensions and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// A single component.
    Scalar,
    /// One row with several components.
    Vector,
    /// Several rows.
    Matrix,
    /// Aggregate of named members (structs, arrays, constant blocks).
    Struct,
    /// Binding of a read-only or read-write resource.
    ResourceHandle {
        /// Whether the resource is writable.
        writable: bool,
    },
    /// Binding of a sampler.
    SamplerHandle,
    /// GPU pointer.
    Pointer,
}

/// Descriptor category a binding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum DescriptorCategory {
    /// Constant buffer
    ConstantBlock,
    /// Read-only resource
    ReadOnlyResource,
    /// Read-write resource
    ReadWriteResource,
    /// Sampler
    Sampler,
    /// Unknown
    #[default]
    Unknown,
}

impl DescriptorCategory {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => Self::ConstantBlock,
            1 => Self::ReadOnlyResource,
            2 => Self::ReadWriteResource,
            3 => Self::Sampler,
            _ => Self::Unknown,
        }
    }

    fn as_u32(&self) -> u32 {
        match self {
            Self::ConstantBlock => 0,
            Self::ReadOnlyResource => 1,
            Self::ReadWriteResource => 2,
            Self::Sampler => 3,
            Self::Unknown => 0xff,
        }
    }

    fn register_prefix(&self) -> &'static str {
        match self {
            Self::ConstantBlock => "cb",
            Self::ReadOnlyResource => "t",
            Self::ReadWriteResource => "u",
            Self::Sampler => "s",
            Self::Unknown => "?",
        }
    }
}

/// Location of a bound resource, sampler or constant block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ShaderBindIndex {
    /// Descriptor category
    pub category: DescriptorCategory,
    /// Index of the binding within its category
    pub index: u32,
    /// Element within an arrayed binding
    #[serde(default)]
    pub array_element: u32,
}

impl ShaderBindIndex {
    /// Create a new bind index.
    pub fn new(category: DescriptorCategory, index: u32, array_element: u32) -> Self {
        Self { category, index, array_element }
    }

    /// Whether two bind indices refer to the same binding, ignoring the array element.
    pub fn same_binding(&self, other: &Self) -> bool {
        self.category == other.category && self.index == other.index
    }

    /// The same binding with the array element cleared.
    pub fn binding_only(&self) -> Self {
        Self { array_element: 0, ..*self }
    }
}

impl Display for ShaderBindIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.category.register_prefix(), self.index)?;
        if self.array_element > 0 {
            write!(f, "[{}]", self.array_element)?;
        }
        Ok(())
    }
}

/// Raw 128-byte value storage, viewed through typed component accessors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderValue {
    words: [u32; SHADER_VALUE_WORDS],
}

impl fmt::Debug for ShaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.trimmed_words()).finish()
    }
}

impl Serialize for ShaderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.trimmed_words().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShaderValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let words = Vec::<u32>::deserialize(deserializer)?;
        if words.len() > SHADER_VALUE_WORDS {
            return Err(D::Error::custom(format!(
                "shader value has {} words, at most {SHADER_VALUE_WORDS} are supported",
                words.len()
            )));
        }
        let mut value = Self::default();
        value.words[..words.len()].copy_from_slice(&words);
        Ok(value)
    }
}

impl ShaderValue {
    fn trimmed_words(&self) -> &[u32] {
        let len = self.words.iter().rposition(|w| *w != 0).map_or(0, |p| p + 1);
        &self.words[..len]
    }

    /// Raw little-endian bytes of the value.
    pub fn to_bytes(&self) -> [u8; SHADER_VALUE_WORDS * 4] {
        let mut bytes = [0u8; SHADER_VALUE_WORDS * 4];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// 32-bit word `i`, zero when out of range.
    pub fn u32v(&self, i: usize) -> u32 {
        self.words.get(i).copied().unwrap_or(0)
    }

    /// Signed view of word `i`.
    pub fn s32v(&self, i: usize) -> i32 {
        self.u32v(i) as i32
    }

    /// Float view of word `i`.
    pub fn f32v(&self, i: usize) -> f32 {
        f32::from_bits(self.u32v(i))
    }

    /// Half-float view of the low 16 bits of word `i`.
    pub fn f16v(&self, i: usize) -> f32 {
        half_to_f32(self.u32v(i) as u16)
    }

    /// 64-bit slot `i` (words `2i` and `2i + 1`).
    pub fn u64v(&self, i: usize) -> u64 {
        let lo = self.u32v(i * 2) as u64;
        let hi = self.u32v(i * 2 + 1) as u64;
        (hi << 32) | lo
    }

    /// Signed view of 64-bit slot `i`.
    pub fn s64v(&self, i: usize) -> i64 {
        self.u64v(i) as i64
    }

    /// Double view of 64-bit slot `i`.
    pub fn f64v(&self, i: usize) -> f64 {
        f64::from_bits(self.u64v(i))
    }

    /// Set word `i`. Out of range writes are ignored and reported as `false`.
    pub fn set_u32v(&mut self, i: usize, v: u32) -> bool {
        match self.words.get_mut(i) {
            Some(w) => {
                *w = v;
                true
            }
            None => false,
        }
    }

    /// Set word `i` from a signed integer.
    pub fn set_s32v(&mut self, i: usize, v: i32) -> bool {
        self.set_u32v(i, v as u32)
    }

    /// Set word `i` from a float.
    pub fn set_f32v(&mut self, i: usize, v: f32) -> bool {
        self.set_u32v(i, v.to_bits())
    }

    /// Set 64-bit slot `i`.
    pub fn set_u64v(&mut self, i: usize, v: u64) -> bool {
        if i * 2 + 1 >= SHADER_VALUE_WORDS {
            return false;
        }
        self.words[i * 2] = v as u32;
        self.words[i * 2 + 1] = (v >> 32) as u32;
        true
    }

    /// Set 64-bit slot `i` from a double.
    pub fn set_f64v(&mut self, i: usize, v: f64) -> bool {
        self.set_u64v(i, v.to_bits())
    }

    /// Read component `i` as raw bits, using a slot of `size` bytes.
    pub fn component_bits(&self, i: usize, size: usize) -> u64 {
        if size == 8 {
            self.u64v(i)
        } else {
            self.u32v(i) as u64
        }
    }

    /// Write component `i` from raw bits, using a slot of `size` bytes.
    pub fn set_component_bits(&mut self, i: usize, size: usize, bits: u64) -> bool {
        if size == 8 {
            self.set_u64v(i, bits)
        } else {
            self.set_u32v(i, bits as u32)
        }
    }
}

/// Convert IEEE 754 half precision bits to `f32`.
pub fn half_to_f32(h: u16) -> f32 {
    let sign = ((h >> 15) & 1) as u32;
    let exp = ((h >> 10) & 0x1f) as u32;
    let mant = (h & 0x3ff) as u32;

    let bits = match (exp, mant) {
        (0, 0) => sign << 31,
        (0, _) => {
            // subnormal, renormalize
            let mut e: u32 = 127 - 15 + 1;
            let mut m = mant;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            (sign << 31) | (e << 23) | ((m & 0x3ff) << 13)
        }
        (0x1f, _) => (sign << 31) | (0xff << 23) | (mant << 13),
        _ => (sign << 31) | ((exp + 127 - 15) << 23) | (mant << 13),
    };

    f32::from_bits(bits)
}

/// A named shader value, possibly with members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShaderVariable {
    /// Variable name. Empty names mark "no variable" in change records.
    #[serde(default)]
    pub name: String,
    /// Base type
    #[serde(rename = "type", default)]
    pub var_type: VarType,
    /// Number of rows (1 for scalars and vectors)
    #[serde(default)]
    pub rows: u8,
    /// Number of columns
    #[serde(default)]
    pub columns: u8,
    /// Raw value
    #[serde(default)]
    pub value: ShaderValue,
    /// Members, for structs, arrays and constant blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ShaderVariable>,
}

impl ShaderVariable {
    /// Create a zero-valued variable.
    pub fn new(name: impl Into<String>, var_type: VarType, rows: u8, columns: u8) -> Self {
        Self {
            name: name.into(),
            var_type,
            rows,
            columns,
            value: ShaderValue::default(),
            members: Vec::new(),
        }
    }

    /// A float scalar.
    pub fn scalar_f32(name: impl Into<String>, v: f32) -> Self {
        Self::vector_f32(name, &[v])
    }

    /// A float vector.
    pub fn vector_f32(name: impl Into<String>, values: &[f32]) -> Self {
        let mut var = Self::new(name, VarType::Float, 1, values.len() as u8);
        for (i, v) in values.iter().enumerate() {
            var.value.set_f32v(i, *v);
        }
        var
    }

    /// An unsigned integer vector.
    pub fn vector_u32(name: impl Into<String>, values: &[u32]) -> Self {
        let mut var = Self::new(name, VarType::UInt, 1, values.len() as u8);
        for (i, v) in values.iter().enumerate() {
            var.value.set_u32v(i, *v);
        }
        var
    }

    /// A signed integer vector.
    pub fn vector_i32(name: impl Into<String>, values: &[i32]) -> Self {
        let mut var = Self::new(name, VarType::SInt, 1, values.len() as u8);
        for (i, v) in values.iter().enumerate() {
            var.value.set_s32v(i, *v);
        }
        var
    }

    /// A row-major float matrix.
    pub fn matrix_f32(name: impl Into<String>, rows: u8, columns: u8, values: &[f32]) -> Self {
        let mut var = Self::new(name, VarType::Float, rows, columns);
        for (i, v) in values.iter().enumerate().take(rows as usize * columns as usize) {
            var.value.set_f32v(i, *v);
        }
        var
    }

    /// An aggregate of members.
    pub fn structure(name: impl Into<String>, members: Vec<ShaderVariable>) -> Self {
        let mut var = Self::new(name, VarType::Struct, 0, 0);
        var.members = members;
        var
    }

    /// A resource handle bound at `bind`.
    pub fn resource(name: impl Into<String>, writable: bool, bind: ShaderBindIndex) -> Self {
        let var_type =
            if writable { VarType::ReadWriteResource } else { VarType::ReadOnlyResource };
        let mut var = Self::new(name, var_type, 1, 1);
        var.set_bind_index(bind);
        var
    }

    /// A sampler handle bound at `bind`.
    pub fn sampler(name: impl Into<String>, bind: ShaderBindIndex) -> Self {
        let mut var = Self::new(name, VarType::Sampler, 1, 1);
        var.set_bind_index(bind);
        var
    }

    /// Shape of the variable.
    pub fn kind(&self) -> VariableKind {
        match self.var_type {
            VarType::ReadOnlyResource => VariableKind::ResourceHandle { writable: false },
            VarType::ReadWriteResource => VariableKind::ResourceHandle { writable: true },
            VarType::Sampler => VariableKind::SamplerHandle,
            VarType::GpuPointer => VariableKind::Pointer,
            VarType::Struct => VariableKind::Struct,
            _ if !self.members.is_empty() => VariableKind::Struct,
            _ if self.rows > 1 => VariableKind::Matrix,
            _ if self.columns > 1 => VariableKind::Vector,
            _ => VariableKind::Scalar,
        }
    }

    /// Number of value components (`rows * columns`, at least one row).
    pub fn component_count(&self) -> usize {
        self.rows.max(1) as usize * self.columns as usize
    }

    /// The binding of a resource or sampler handle.
    pub fn bind_index(&self) -> Option<ShaderBindIndex> {
        if !self.var_type.is_handle() {
            return None;
        }
        Some(ShaderBindIndex {
            category: DescriptorCategory::from_u32(self.value.u32v(0)),
            index: self.value.u32v(1),
            array_element: self.value.u32v(2),
        })
    }

    /// Store a binding in the value words.
    pub fn set_bind_index(&mut self, bind: ShaderBindIndex) {
        self.value.set_u32v(0, bind.category.as_u32());
        self.value.set_u32v(1, bind.index);
        self.value.set_u32v(2, bind.array_element);
    }

    /// HLSL-style type name such as `float4`, `uint`, `float3x3` or `struct`.
    pub fn type_name(&self) -> String {
        match self.kind() {
            VariableKind::Scalar => self.var_type.name().to_string(),
            VariableKind::Vector => format!("{}{}", self.var_type.name(), self.columns),
            VariableKind::Matrix => {
                format!("{}{}x{}", self.var_type.name(), self.rows, self.columns)
            }
            VariableKind::Struct => {
                if self.members.iter().all(|m| m.name.ends_with(']')) && !self.members.is_empty()
                {
                    format!("{}[{}]", self.members[0].type_name(), self.members.len())
                } else {
                    "struct".to_string()
                }
            }
            VariableKind::ResourceHandle { .. }
            | VariableKind::SamplerHandle
            | VariableKind::Pointer => self.var_type.name().to_string(),
        }
    }

    /// Find a direct member addressed by one path segment.
    ///
    /// `prefix` is the path of `self`; members may carry either their short name
    /// (`b`, `[2]`) or their fully qualified one (`S.b`, `S.b[2]`). Index segments
    /// fall back to positional lookup.
    pub fn find_member(&self, segment: &PathSegment, prefix: &str) -> Option<&ShaderVariable> {
        match segment {
            PathSegment::Member(name) => {
                let qualified = format!("{prefix}.{name}");
                self.members.iter().find(|m| m.name == *name || m.name == qualified)
            }
            PathSegment::Index(idx) => {
                let short = format!("[{idx}]");
                let qualified = format!("{prefix}[{idx}]");
                self.members
                    .iter()
                    .find(|m| m.name == short || m.name == qualified)
                    .or_else(|| self.members.get(*idx as usize))
            }
        }
    }

    /// Short display name of a member, stripping a qualifying `parent.` prefix.
    pub fn short_name<'a>(&'a self, parent: &str) -> &'a str {
        self.name
            .strip_prefix(parent)
            .and_then(|rest| {
                if let Some(field) = rest.strip_prefix('.') {
                    Some(field)
                } else if rest.starts_with('[') {
                    Some(rest)
                } else {
                    None
                }
            })
            .unwrap_or(&self.name)
    }
}

/// One before/after pair recorded by a debug state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShaderVariableChange {
    /// Value before the state executed. Empty name: the variable is created.
    #[serde(default)]
    pub before: ShaderVariable,
    /// Value after the state executed. Empty name: the variable goes out of scope.
    #[serde(default)]
    pub after: ShaderVariable,
}

impl ShaderVariableChange {
    /// A change that creates `var`.
    pub fn created(var: ShaderVariable) -> Self {
        Self { before: ShaderVariable::default(), after: var }
    }

    /// A change that removes `var`.
    pub fn removed(var: ShaderVariable) -> Self {
        Self { before: var, after: ShaderVariable::default() }
    }

    /// A change that updates `before` to `after`.
    pub fn updated(before: ShaderVariable, after: ShaderVariable) -> Self {
        Self { before, after }
    }

    /// Whether the variable comes into existence at this change.
    pub fn is_creation(&self) -> bool {
        self.before.name.is_empty()
    }

    /// Whether the variable goes out of scope at this change.
    pub fn is_removal(&self) -> bool {
        self.after.name.is_empty()
    }

    /// The name of the variable the change applies to.
    pub fn name(&self) -> &str {
        if self.after.name.is_empty() {
            &self.before.name
        } else {
            &self.after.name
        }
    }
}

/// Look a variable up by path (`a`, `a.b`, `a[2].c`) in a flat list of top-level variables.
pub fn lookup_path<'a>(vars: &'a [ShaderVariable], path: &str) -> Option<&'a ShaderVariable> {
    let segments = crate::expression::split_path(path)?;
    let (root, rest) = segments.split_first()?;
    let PathSegment::Member(root) = root else {
        return None;
    };

    let mut current = vars.iter().find(|v| v.name == *root)?;
    let mut prefix = root.clone();
    for segment in rest {
        current = current.find_member(segment, &prefix)?;
        segment.append_to(&mut prefix);
    }
    Some(current)
}
