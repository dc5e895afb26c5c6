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

//! Resolution of variable paths to values.
//!
//! A path such as `light.color.rgb` is resolved against three variable sets in
//! priority order:
//!
//! 1. source variables, rebuilt into structs and arrays from the flat names of
//!    their mappings (`S.a`, `S.b[1]`), with instruction-local mappings
//!    shadowing global ones;
//! 2. constant blocks and bound resources and samplers;
//! 3. raw debugger variables (live registers, then shader inputs).
//!
//! The first pass only matches the root identifier against top-level names.
//! The second pass also matches direct children of top-level entries, so
//! non-namespaced constant buffer members still resolve. A trailing
//! `xyzw`/`rgba` segment is a swizzle over a vector value.

use std::{collections::HashSet, fmt};

use sdb_common::{
    join_path, normalize_expression, split_path,
    types::{
        lookup_path, DebugVariableReference, DebugVariableType, ShaderDebugTrace, ShaderVariable,
        SourceVariableMapping, VariableKind,
    },
    PathSegment,
};

use crate::{DebugError, DebugResult, VariableRegistry};

/// Marks unused swizzle slots.
pub const SWIZZLE_FINISHED: u8 = 0xff;

/// Component selection applied to a vector, up to four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle {
    mask: [u8; 4],
}

impl Swizzle {
    /// Parse `xyzw` or `rgba` letters. The two alphabets cannot be mixed.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > 4 {
            return None;
        }
        let xyzw = |c: char| "xyzw".find(c);
        let rgba = |c: char| "rgba".find(c);
        let positions: Option<Vec<usize>> = s.chars().map(xyzw).collect();
        let positions = positions.or_else(|| s.chars().map(rgba).collect())?;

        let mut mask = [SWIZZLE_FINISHED; 4];
        for (slot, pos) in mask.iter_mut().zip(positions) {
            *slot = pos as u8;
        }
        Some(Self { mask })
    }

    /// Raw mask, unused slots set to [`SWIZZLE_FINISHED`].
    pub fn mask(&self) -> [u8; 4] {
        self.mask
    }

    /// Selected component indices in order.
    pub fn components(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask.iter().take_while(|c| **c != SWIZZLE_FINISHED).map(|c| *c as usize)
    }

    /// Number of selected components.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Whether no component is selected. Parsed swizzles are never empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.components() {
            write!(f, "{}", ['x', 'y', 'z', 'w'][c])?;
        }
        Ok(())
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The resolved variable, before any swizzle
    pub var: ShaderVariable,
    /// Trailing swizzle, if the path ended in one
    pub swizzle: Option<Swizzle>,
}

impl Resolved {
    /// The value with the swizzle applied.
    pub fn apply_swizzle(&self) -> ShaderVariable {
        let Some(swizzle) = self.swizzle else {
            return self.var.clone();
        };
        let size = self.var.var_type.component_size();
        let mut out = ShaderVariable::new(
            format!("{}.{swizzle}", self.var.name),
            self.var.var_type,
            1,
            swizzle.len() as u8,
        );
        for (dst, src) in swizzle.components().enumerate() {
            out.value.set_component_bits(dst, size, self.var.value.component_bits(src, size));
        }
        out
    }
}

/// Source variable rebuilt from flat mapping names.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    /// Display name of this level (`S`, `b`, `[1]`)
    pub name: String,
    /// Full path (`S.b[1]`)
    pub path: String,
    /// Mapping backing this node, for leaves
    pub mapping: Option<SourceVariableMapping>,
    /// Members or array elements
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    fn new(name: String, path: String) -> Self {
        Self { name, path, mapping: None, children: Vec::new() }
    }

    /// Names of the debugger variables this node reads, recursively.
    pub fn referenced_variables(&self) -> HashSet<&str> {
        let mut names = HashSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut HashSet<&'a str>) {
        if let Some(mapping) = &self.mapping {
            for r in &mapping.variables {
                if r.var_type == DebugVariableType::Variable {
                    names.insert(sdb_common::root_identifier(&r.name));
                }
            }
        }
        for child in &self.children {
            child.collect_references(names);
        }
    }
}

fn segment_name(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Member(name) => name.clone(),
        PathSegment::Index(idx) => format!("[{idx}]"),
    }
}

/// Build the source variable tree.
///
/// A root name declared by any local mapping hides every global mapping with
/// the same root. Among mappings with the same path, the last one wins.
pub fn build_source_tree(
    globals: &[SourceVariableMapping],
    locals: &[SourceVariableMapping],
) -> Vec<SourceNode> {
    let local_roots: HashSet<&str> =
        locals.iter().map(|m| sdb_common::root_identifier(&m.name)).collect();

    let mut roots: Vec<SourceNode> = Vec::new();
    let visible_globals =
        globals.iter().filter(|m| !local_roots.contains(sdb_common::root_identifier(&m.name)));

    for mapping in visible_globals.chain(locals.iter()) {
        let Some(segments) = split_path(&normalize_expression(&mapping.name)) else {
            tracing::warn!(name = %mapping.name, "skipping source variable with unparsable name");
            continue;
        };
        insert_mapping(&mut roots, &segments, 0, mapping);
    }

    for root in &mut roots {
        sort_array_elements(root);
    }
    roots
}

fn insert_mapping(
    nodes: &mut Vec<SourceNode>,
    segments: &[PathSegment],
    depth: usize,
    mapping: &SourceVariableMapping,
) {
    let name = segment_name(&segments[depth]);
    let idx = match nodes.iter().position(|n| n.name == name) {
        Some(idx) => idx,
        None => {
            nodes.push(SourceNode::new(name, join_path(&segments[..=depth])));
            nodes.len() - 1
        }
    };
    let node = &mut nodes[idx];
    if depth + 1 == segments.len() {
        node.mapping = Some(mapping.clone());
    } else {
        insert_mapping(&mut node.children, segments, depth + 1, mapping);
    }
}

fn array_index(name: &str) -> Option<u32> {
    name.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}

fn sort_array_elements(node: &mut SourceNode) {
    if !node.children.is_empty() && node.children.iter().all(|c| array_index(&c.name).is_some()) {
        node.children.sort_by_key(|c| array_index(&c.name));
    }
    for child in &mut node.children {
        sort_array_elements(child);
    }
}

#[derive(Clone, Copy)]
enum Candidate<'n> {
    Source(&'n SourceNode),
    Var(&'n ShaderVariable),
}

impl<'n> Candidate<'n> {
    fn name(&self, parent: &str) -> &'n str {
        match self {
            Self::Source(node) => &node.name,
            Self::Var(var) => var.short_name(parent),
        }
    }
}

fn child_prefix(parent: &str, member: &ShaderVariable) -> String {
    if parent.is_empty() {
        member.name.clone()
    } else if member.name.len() > parent.len() && member.name.starts_with(parent) {
        member.name.clone()
    } else if member.name.starts_with('[') {
        format!("{parent}{}", member.name)
    } else {
        format!("{parent}.{}", member.name)
    }
}

/// Resolves variable paths against one debugger state.
pub struct SourceMappingResolver<'a> {
    trace: &'a ShaderDebugTrace,
    registry: &'a VariableRegistry,
    source_tree: Vec<SourceNode>,
}

impl<'a> SourceMappingResolver<'a> {
    /// Create a resolver for the state whose instruction-local mappings are `locals`.
    pub fn new(
        trace: &'a ShaderDebugTrace,
        registry: &'a VariableRegistry,
        locals: &[SourceVariableMapping],
    ) -> Self {
        Self { trace, registry, source_tree: build_source_tree(&trace.source_vars, locals) }
    }

    /// Registry the resolver reads live variables from.
    pub fn registry(&self) -> &'a VariableRegistry {
        self.registry
    }

    /// Top-level source variables.
    pub fn source_tree(&self) -> &[SourceNode] {
        &self.source_tree
    }

    /// Constant blocks, resources and samplers, in search order.
    pub fn constants(&self) -> impl Iterator<Item = &'a ShaderVariable> {
        let trace = self.trace;
        trace
            .constant_blocks
            .iter()
            .chain(trace.read_only_resources.iter())
            .chain(trace.read_write_resources.iter())
            .chain(trace.samplers.iter())
    }

    /// Raw debugger variables: live registers first, then inputs.
    pub fn debug_variables(&self) -> impl Iterator<Item = &'a ShaderVariable> {
        self.registry.variables().iter().chain(self.trace.inputs.iter())
    }

    /// Resolve a path, optionally ending in a swizzle.
    pub fn resolve(&self, path: &str) -> DebugResult<Resolved> {
        let normalized = normalize_expression(path);
        let segments = split_path(&normalized).ok_or_else(|| DebugError::MalformedExpression {
            expr: path.to_string(),
            reason: "invalid variable path".to_string(),
        })?;

        let err = match self.resolve_segments(&segments) {
            Ok(var) => return Ok(Resolved { var, swizzle: None }),
            Err(err) => err,
        };

        let (last, base) = match segments.split_last() {
            Some((PathSegment::Member(last), base)) if !base.is_empty() => (last, base),
            _ => return Err(err),
        };
        let Some(swizzle) = Swizzle::parse(last) else {
            return Err(err);
        };

        let var = self.resolve_segments(base)?;
        let valid = var.kind() == VariableKind::Vector
            && swizzle.components().all(|c| c < var.columns as usize);
        if !valid {
            return Err(DebugError::NotFound(format!(
                "swizzle .{last} is not valid on {} {}",
                var.type_name(),
                var.name
            )));
        }
        Ok(Resolved { var, swizzle: Some(swizzle) })
    }

    /// Evaluate a source node into a variable.
    ///
    /// Leaves read their mapped components; groups evaluate every member and
    /// fail if any member is unavailable.
    pub fn evaluate_node(&self, node: &SourceNode) -> DebugResult<ShaderVariable> {
        if node.children.is_empty() {
            let mapping = node
                .mapping
                .as_ref()
                .ok_or_else(|| DebugError::NotFound(format!("{} has no mapping", node.path)))?;
            return self.evaluate_mapping(&node.path, mapping);
        }

        let members = node
            .children
            .iter()
            .map(|child| {
                self.evaluate_node(child).map(|mut var| {
                    var.name = child.name.clone();
                    var
                })
            })
            .collect::<DebugResult<Vec<_>>>()?;
        Ok(ShaderVariable::structure(node.path.clone(), members))
    }

    fn evaluate_mapping(
        &self,
        path: &str,
        mapping: &SourceVariableMapping,
    ) -> DebugResult<ShaderVariable> {
        let rows = mapping.rows.clamp(1, u8::MAX as u32) as u8;
        let columns = mapping.columns.clamp(1, u8::MAX as u32) as u8;
        let mut var = ShaderVariable::new(path, mapping.var_type, rows, columns);

        if mapping.var_type.is_handle() {
            let reference = mapping
                .variables
                .first()
                .ok_or_else(|| DebugError::NotFound(format!("{path} has no binding")))?;
            let source = self.read_reference(reference)?;
            var.value = source.value;
            var.rows = 1;
            var.columns = 1;
            return Ok(var);
        }

        let dst_size = mapping.var_type.component_size();
        for (component, reference) in
            mapping.variables.iter().enumerate().take(var.component_count())
        {
            if reference.var_type == DebugVariableType::Undefined {
                continue;
            }
            let source = self.read_reference(reference)?;
            let bits = source
                .value
                .component_bits(reference.component as usize, source.var_type.component_size());
            var.value.set_component_bits(component, dst_size, bits);
        }
        Ok(var)
    }

    fn read_reference(&self, reference: &DebugVariableReference) -> DebugResult<&'a ShaderVariable> {
        let (trace, registry) = (self.trace, self.registry);
        let found = match reference.var_type {
            DebugVariableType::Variable => registry.lookup(&reference.name).or_else(|| {
                // registers may also be addressed as inputs
                lookup_path(&trace.inputs, &reference.name)
            }),
            DebugVariableType::Input => lookup_path(&trace.inputs, &reference.name),
            DebugVariableType::Constant => {
                lookup_path(&trace.constant_blocks, &reference.name).or_else(|| {
                    trace.constant_blocks.iter().find_map(|cb| lookup_path(&cb.members, &reference.name))
                })
            }
            DebugVariableType::ReadOnlyResource => {
                lookup_path(&trace.read_only_resources, &reference.name)
            }
            DebugVariableType::ReadWriteResource => {
                lookup_path(&trace.read_write_resources, &reference.name)
            }
            DebugVariableType::Sampler => lookup_path(&trace.samplers, &reference.name),
            DebugVariableType::Undefined => None,
        };
        found.ok_or_else(|| DebugError::NotFound(reference.name.clone()))
    }

    fn top_level(&self) -> Vec<Candidate<'_>> {
        self.source_tree
            .iter()
            .map(Candidate::Source)
            .chain(self.constants().map(Candidate::Var))
            .chain(self.debug_variables().map(Candidate::Var))
            .collect()
    }

    fn resolve_segments(&self, segments: &[PathSegment]) -> DebugResult<ShaderVariable> {
        let path = join_path(segments);
        let Some((PathSegment::Member(root), rest)) = segments.split_first() else {
            return Err(DebugError::NotFound(path));
        };

        let top_level = self.top_level();

        // exact top-level names first
        for candidate in &top_level {
            if candidate.name("") != root {
                continue;
            }
            let prefix = match candidate {
                Candidate::Source(node) => node.path.clone(),
                Candidate::Var(var) => var.name.clone(),
            };
            if let Ok(mut var) = self.descend(*candidate, &prefix, rest) {
                var.name = path;
                return Ok(var);
            }
        }

        // then members of top-level entries
        for candidate in &top_level {
            match candidate {
                Candidate::Source(node) => {
                    for child in node.children.iter().filter(|c| c.name == *root) {
                        if let Ok(mut var) = self.descend(Candidate::Source(child), &child.path, rest)
                        {
                            var.name = path;
                            return Ok(var);
                        }
                    }
                }
                Candidate::Var(parent) => {
                    for member in &parent.members {
                        if member.short_name(&parent.name) != root {
                            continue;
                        }
                        let prefix = child_prefix(&parent.name, member);
                        if let Ok(mut var) = self.descend(Candidate::Var(member), &prefix, rest) {
                            var.name = path;
                            return Ok(var);
                        }
                    }
                }
            }
        }

        Err(DebugError::NotFound(path))
    }

    fn descend(
        &self,
        candidate: Candidate<'_>,
        prefix: &str,
        rest: &[PathSegment],
    ) -> DebugResult<ShaderVariable> {
        let Some((segment, tail)) = rest.split_first() else {
            return match candidate {
                Candidate::Source(node) => self.evaluate_node(node),
                Candidate::Var(var) => Ok(var.clone()),
            };
        };

        match candidate {
            Candidate::Source(node) => {
                let name = segment_name(segment);
                if let Some(child) = node.children.iter().find(|c| c.name == name) {
                    return self.descend(Candidate::Source(child), &child.path, tail);
                }
                if node.children.is_empty() && node.mapping.is_some() {
                    let var = self.evaluate_node(node)?;
                    return select_components(var, rest);
                }
                Err(DebugError::NotFound(format!("{prefix}{}", display_segment(segment))))
            }
            Candidate::Var(var) => {
                if let Some(member) = var.find_member(segment, prefix) {
                    let next = child_prefix(prefix, member);
                    return self.descend(Candidate::Var(member), &next, tail);
                }
                select_components(var.clone(), rest)
            }
        }
    }
}

fn display_segment(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Member(name) => format!(".{name}"),
        PathSegment::Index(idx) => format!("[{idx}]"),
    }
}

/// Index into a vector (component) or matrix (row).
fn select_components(mut var: ShaderVariable, rest: &[PathSegment]) -> DebugResult<ShaderVariable> {
    for segment in rest {
        let size = var.var_type.component_size();
        var = match (segment, var.kind()) {
            (PathSegment::Index(idx), VariableKind::Vector) if (*idx as usize) < var.columns as usize => {
                let mut out =
                    ShaderVariable::new(format!("{}[{idx}]", var.name), var.var_type, 1, 1);
                out.value.set_component_bits(0, size, var.value.component_bits(*idx as usize, size));
                out
            }
            (PathSegment::Index(idx), VariableKind::Matrix) if (*idx as usize) < var.rows as usize => {
                let columns = var.columns as usize;
                let mut out = ShaderVariable::new(
                    format!("{}[{idx}]", var.name),
                    var.var_type,
                    1,
                    var.columns,
                );
                for c in 0..columns {
                    let bits = var.value.component_bits(*idx as usize * columns + c, size);
                    out.value.set_component_bits(c, size, bits);
                }
                out
            }
            _ => {
                return Err(DebugError::NotFound(format!(
                    "{}{}",
                    var.name,
                    display_segment(segment)
                )))
            }
        };
    }
    Ok(var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdb_common::types::{
        DescriptorCategory, ShaderBindIndex, ShaderVariableChange, VarType,
    };

    fn reg(name: &str, component: u32) -> DebugVariableReference {
        DebugVariableReference::new(DebugVariableType::Variable, name, component)
    }

    fn float_mapping(name: &str, refs: Vec<DebugVariableReference>) -> SourceVariableMapping {
        let columns = refs.len() as u32;
        SourceVariableMapping::new(name, VarType::Float, 1, columns, refs)
    }

    fn registry() -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        registry.apply_forward(&[
            ShaderVariableChange::created(ShaderVariable::vector_f32("r0", &[1.0, 2.0, 3.0, 4.0])),
            ShaderVariableChange::created(ShaderVariable::vector_f32("r1", &[5.0, 6.0, 7.0, 8.0])),
        ]);
        registry
    }

    fn trace() -> ShaderDebugTrace {
        ShaderDebugTrace {
            source_vars: vec![
                float_mapping("S.a", vec![reg("r0", 0)]),
                float_mapping("S.b[0]", vec![reg("r0", 1)]),
                float_mapping("S.b[1]", vec![reg("r0", 2)]),
                float_mapping("S.b[2]", vec![reg("r0", 3)]),
                float_mapping("color", vec![reg("r1", 0), reg("r1", 1), reg("r1", 2)]),
            ],
            constant_blocks: vec![ShaderVariable::structure(
                "cb0",
                vec![
                    ShaderVariable::vector_f32("tint", &[0.5, 0.25]),
                    ShaderVariable::matrix_f32("world", 2, 2, &[1.0, 2.0, 3.0, 4.0]),
                ],
            )],
            read_only_resources: vec![ShaderVariable::resource(
                "albedo",
                false,
                ShaderBindIndex::new(DescriptorCategory::ReadOnlyResource, 0, 0),
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_swizzle_parse() {
        assert_eq!(Swizzle::parse("xyz").unwrap().mask(), [0, 1, 2, SWIZZLE_FINISHED]);
        assert_eq!(Swizzle::parse("ab").unwrap().mask(), [3, 2, SWIZZLE_FINISHED, SWIZZLE_FINISHED]);
        assert_eq!(Swizzle::parse("wzyx").unwrap().to_string(), "wzyx");
        assert!(Swizzle::parse("xg").is_none());
        assert!(Swizzle::parse("xyzwx").is_none());
        assert!(Swizzle::parse("").is_none());
        assert!(Swizzle::parse("q").is_none());
    }

    #[test]
    fn test_source_tree_shape() {
        let tree = build_source_tree(&trace().source_vars, &[]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "S");
        assert_eq!(tree[0].children[1].name, "b");
        assert_eq!(tree[0].children[1].children.len(), 3);
        assert_eq!(tree[0].children[1].children[2].path, "S.b[2]");
    }

    #[test]
    fn test_array_elements_sorted() {
        let tree = build_source_tree(
            &[
                float_mapping("arr[10]", vec![reg("r0", 0)]),
                float_mapping("arr[2]", vec![reg("r0", 1)]),
            ],
            &[],
        );
        let names: Vec<&str> = tree[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["[2]", "[10]"]);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let globals = vec![float_mapping("x", vec![reg("r0", 0)])];
        let locals = vec![
            float_mapping("x", vec![reg("r0", 1)]),
            float_mapping("x", vec![reg("r0", 2)]),
        ];
        let registry = registry();
        let trace = trace();
        let tree = build_source_tree(&globals, &locals);
        assert_eq!(tree.len(), 1);

        let resolver = SourceMappingResolver { trace: &trace, registry: &registry, source_tree: tree };
        let var = resolver.resolve("x").unwrap().var;
        assert_eq!(var.value.f32v(0), 3.0);
    }

    #[test]
    fn test_resolve_struct_member_array_element() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);

        let resolved = resolver.resolve("S.b[1]").unwrap();
        assert!(resolved.swizzle.is_none());
        assert_eq!(resolved.var.kind(), VariableKind::Scalar);
        assert_eq!(resolved.var.value.f32v(0), 3.0);
        assert_eq!(resolved.var.name, "S.b[1]");
    }

    #[test]
    fn test_resolve_group() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);

        let s = resolver.resolve("S").unwrap().var;
        assert_eq!(s.kind(), VariableKind::Struct);
        assert_eq!(s.members.len(), 2);
        assert_eq!(s.members[0].name, "a");
        assert_eq!(s.members[1].members[2].value.f32v(0), 4.0);
        assert_eq!(s.members[1].type_name(), "float[3]");
    }

    #[test]
    fn test_swizzle_on_scalar_is_not_found() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);
        assert!(matches!(resolver.resolve("S.a.xy"), Err(DebugError::NotFound(_))));
    }

    #[test]
    fn test_swizzle_on_vector() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);

        let resolved = resolver.resolve("color.zx").unwrap();
        assert_eq!(resolved.swizzle.map(|s| s.mask()), Some([2, 0, SWIZZLE_FINISHED, SWIZZLE_FINISHED]));
        let swizzled = resolved.apply_swizzle();
        assert_eq!(swizzled.columns, 2);
        assert_eq!(swizzled.value.f32v(0), 7.0);
        assert_eq!(swizzled.value.f32v(1), 5.0);

        // out of range component
        assert!(resolver.resolve("color.w").is_err());
    }

    #[test]
    fn test_register_shorthand() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);

        let resolved = resolver.resolve("r0.xyz").unwrap();
        assert_eq!(resolved.apply_swizzle().value.f32v(2), 3.0);
        assert_eq!(resolver.resolve("r1[3]").unwrap().var.value.f32v(0), 8.0);
    }

    #[test]
    fn test_constant_member_second_pass() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);

        // namespaced and bare forms both resolve
        assert_eq!(resolver.resolve("cb0.tint").unwrap().var.value.f32v(1), 0.25);
        assert_eq!(resolver.resolve("tint.y").unwrap().apply_swizzle().value.f32v(0), 0.25);
        let row = resolver.resolve("world[1]").unwrap().var;
        assert_eq!(row.columns, 2);
        assert_eq!(row.value.f32v(0), 3.0);
        assert!(matches!(resolver.resolve("world.xy"), Err(DebugError::NotFound(_))));
    }

    #[test]
    fn test_exact_match_wins_over_member() {
        let mut trace = trace();
        trace.constant_blocks.push(ShaderVariable::vector_f32("a", &[42.0]));
        let registry = registry();
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);
        // `a` is a member of source struct S, but an exact top-level constant exists
        assert_eq!(resolver.resolve("a").unwrap().var.value.f32v(0), 42.0);
    }

    #[test]
    fn test_resource_binding() {
        let (trace, registry) = (trace(), registry());
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);
        let var = resolver.resolve("albedo").unwrap().var;
        assert_eq!(var.kind(), VariableKind::ResourceHandle { writable: false });
        assert_eq!(var.bind_index().map(|b| b.index), Some(0));
    }

    #[test]
    fn test_missing_register_is_not_found() {
        let trace = ShaderDebugTrace {
            source_vars: vec![float_mapping("gone", vec![reg("r9", 0)])],
            ..Default::default()
        };
        let registry = registry();
        let resolver = SourceMappingResolver::new(&trace, &registry, &[]);
        assert!(matches!(resolver.resolve("gone"), Err(DebugError::NotFound(_))));
        assert!(matches!(resolver.resolve("nothing"), Err(DebugError::NotFound(_))));
        assert!(matches!(
            resolver.resolve("a..b"),
            Err(DebugError::MalformedExpression { .. })
        ));
    }

    #[test]
    fn test_referenced_variables() {
        let tree = build_source_tree(&trace().source_vars, &[]);
        let refs = tree[0].referenced_variables();
        assert!(refs.contains("r0"));
        assert!(!refs.contains("r1"));
    }
}
