//! Target-independent program passes run before writing.
//!
//! The main pass packs the vertex shader texcoord outputs into as few interpolator slots as
//! possible ([`ProgramProcessor::compact_vs_outputs`]). Producers resolve one texcoord output per
//! value they pass down, most of them narrower than a full `float4`, and hardware only provides a
//! handful of interpolators. Packing rewrites both sides of the interface in lockstep: every
//! fragment texcoord input is moved to the same slot and components as the vertex output it
//! receives.

use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::function::Function;
use crate::invocation::{AtomOp, FunctionInvocation, GroupOrder};
use crate::operand::{OperandMask, OperandSemantic};
use crate::options::{CompactPolicy, ShaderGenOptions};
use crate::parameter::{
    find_by_semantic, Content, GpuConstantType, Parameter, ParameterRef, Semantic,
};
use crate::program::ProgramSet;

/// Declarative packing rule: how many Float1/Float2/Float3/Float4 sources go into one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCombination {
    counts: [usize; 4],
}

impl MergeCombination {
    pub const fn new(float1: usize, float2: usize, float3: usize, float4: usize) -> Self {
        Self {
            counts: [float1, float2, float3, float4],
        }
    }

    /// Number of sources of width `floats` this rule takes, `None` outside 1..=4.
    pub fn count(&self, floats: usize) -> Option<usize> {
        self.counts.get(floats.checked_sub(1)?).copied()
    }

    pub fn used_floats(&self) -> usize {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, count)| (i + 1) * count)
            .sum()
    }

    fn applies(&self, table: &MergeTable) -> bool {
        self.counts
            .iter()
            .zip(table.iter())
            .all(|(count, bucket)| bucket.len() >= *count)
    }
}

/// Exact-fit rules, applied first and in this order.
pub const MAIN_COMBINATIONS: [MergeCombination; 5] = [
    MergeCombination::new(1, 0, 1, 0),
    MergeCombination::new(0, 2, 0, 0),
    MergeCombination::new(2, 1, 0, 0),
    MergeCombination::new(4, 0, 0, 0),
    MergeCombination::new(0, 0, 0, 1),
];

/// Rules for the leftovers when they fit the slot budget without splitting.
pub const SIMPLE_COMBINATIONS: [MergeCombination; 6] = [
    MergeCombination::new(1, 1, 0, 0),
    MergeCombination::new(3, 0, 0, 0),
    MergeCombination::new(2, 0, 0, 0),
    MergeCombination::new(1, 0, 0, 0),
    MergeCombination::new(0, 1, 0, 0),
    MergeCombination::new(0, 0, 1, 0),
];

/// Texcoord parameters bucketed by float width, index 0 holding the Float1 ones.
type MergeTable = [VecDeque<ParameterRef>; 4];

/// One source packed into a [`MergeParameter`].
#[derive(Debug, Clone)]
pub struct MergeSource {
    pub parameter: ParameterRef,
    /// Components of the source that were packed, `ALL` for the whole parameter.
    pub source_mask: OperandMask,
    /// First destination component the source occupies.
    pub offset: usize,
    pub floats: usize,
}

impl MergeSource {
    /// Destination components occupied by this source.
    pub fn destination_mask(&self) -> OperandMask {
        OperandMask::from_float_count(self.floats).shifted(self.offset)
    }

    fn is_whole(&self) -> bool {
        self.source_mask == OperandMask::ALL
    }
}

/// Up to four floats of sources sharing one interpolator slot.
#[derive(Debug, Clone, Default)]
pub struct MergeParameter {
    sources: Vec<MergeSource>,
    used_floats: usize,
}

impl MergeParameter {
    pub fn sources(&self) -> &[MergeSource] {
        &self.sources
    }

    pub fn used_floats(&self) -> usize {
        self.used_floats
    }

    pub fn free_floats(&self) -> usize {
        4 - self.used_floats
    }

    fn add_source(&mut self, parameter: ParameterRef, source_mask: OperandMask, floats: usize) {
        debug_assert!(self.used_floats + floats <= 4);
        self.sources.push(MergeSource {
            parameter,
            source_mask,
            offset: self.used_floats,
            floats,
        });
        self.used_floats += floats;
    }

    fn add_whole(&mut self, parameter: ParameterRef) {
        let floats = float_width(&parameter);
        self.add_source(parameter, OperandMask::ALL, floats);
    }

    fn destination_type(&self) -> GpuConstantType {
        GpuConstantType::float_vector(self.used_floats).unwrap_or(GpuConstantType::Float4)
    }

    /// Content carried over to the destination when it holds a single whole source.
    fn destination_content(&self) -> Content {
        match self.sources.as_slice() {
            [only] if only.is_whole() => only.parameter.content(),
            _ => Content::Unknown,
        }
    }
}

/// Result of planning the vertex side packing.
#[derive(Debug, Default)]
struct MergePlan {
    merged: Vec<MergeParameter>,
    split: Vec<ParameterRef>,
}

impl MergePlan {
    fn needs_rewrite(&self) -> bool {
        self.merged.iter().any(|m| m.sources.len() > 1)
    }
}

fn float_width(parameter: &ParameterRef) -> usize {
    parameter.ty().float_count().unwrap_or(4)
}

fn is_texcoord(parameter: &ParameterRef) -> bool {
    parameter.semantic() == Semantic::TextureCoordinates
}

#[derive(Debug, Clone)]
pub struct ProgramProcessor {
    policy: CompactPolicy,
    max_slots: usize,
    max_floats: usize,
}

impl ProgramProcessor {
    pub fn new(options: &ShaderGenOptions) -> Self {
        Self {
            policy: options.compact_policy,
            max_slots: options.max_texcoord_slots,
            max_floats: options.max_texcoord_floats,
        }
    }

    /// Language specific preparation of a program set: texcoord compaction for every target,
    /// plus fragment input synchronisation for the GLSL family, whose stages link by name.
    pub fn pre_create_gpu_programs(&self, set: &mut ProgramSet, language: &str) -> Result<()> {
        self.compact_vs_outputs(set)?;
        if matches!(language, "glsl" | "glsles") {
            synchronize_fragment_inputs(set)?;
        }
        Ok(())
    }

    /// Packs the vertex texcoord outputs (and the fragment inputs receiving them) into as few
    /// interpolator slots as the policy allows.
    pub fn compact_vs_outputs(&self, set: &mut ProgramSet) -> Result<()> {
        let (vertex, fragment) = set.programs_mut();
        let vs_main = vertex.entry_function_mut();
        let ps_main = fragment.entry_function_mut();

        let outputs: Vec<ParameterRef> = vs_main
            .outputs()
            .iter()
            .filter(|p| is_texcoord(p))
            .cloned()
            .collect();
        let slots = outputs.len();
        let floats: usize = outputs.iter().map(float_width).sum();

        if floats > self.max_floats {
            return Err(Error::InterpolatorFloatBudgetExceeded {
                floats,
                limit: self.max_floats,
            });
        }
        if slots <= 1 {
            debug!(slots, "texcoord compaction skipped: nothing to pack");
            return Ok(());
        }
        if self.policy == CompactPolicy::Low && slots <= self.max_slots {
            debug!(slots, floats, "texcoord compaction skipped: low policy and budget fits");
            return Ok(());
        }

        let plan = self.plan(&outputs)?;
        if plan.merged.len() > self.max_slots {
            return Err(Error::InterpolatorSlotBudgetExceeded {
                slots: plan.merged.len(),
                limit: self.max_slots,
            });
        }
        if !plan.needs_rewrite() {
            debug!(slots, "texcoord compaction found nothing to merge");
            return Ok(());
        }

        let fragment_plan = mirror_plan(&plan, ps_main)?;

        debug!(
            policy = ?self.policy,
            floats,
            slots_before = slots,
            slots_after = plan.merged.len(),
            split = plan.split.len(),
            "compacting vertex texcoord outputs"
        );

        apply_plan(vs_main, &plan, Side::Vertex)?;
        apply_plan(ps_main, &fragment_plan, Side::Fragment)?;
        Ok(())
    }

    fn plan(&self, outputs: &[ParameterRef]) -> Result<MergePlan> {
        let mut table: MergeTable = Default::default();
        for parameter in outputs {
            let floats =
                parameter
                    .ty()
                    .float_count()
                    .ok_or_else(|| Error::InvalidInterpolatorType {
                        name: parameter.name().to_owned(),
                        ty: parameter.ty(),
                    })?;
            table[floats - 1].push_back(parameter.clone());
        }

        let mut plan = MergePlan::default();
        merge_combinations(&mut table, &MAIN_COMBINATIONS, &mut plan.merged);

        if self.policy != CompactPolicy::High {
            let [f1, f2, f3, _] = [0, 1, 2, 3].map(|i| table[i].len());
            let required = f3 + f2 + usize::from(f1 > 0 && f2 == 0);
            if plan.merged.len() + required <= self.max_slots {
                merge_combinations(&mut table, &SIMPLE_COMBINATIONS, &mut plan.merged);
            }
        }

        merge_reminders(&mut table, &mut plan);
        Ok(plan)
    }
}

fn merge_combinations(
    table: &mut MergeTable,
    combinations: &[MergeCombination],
    merged: &mut Vec<MergeParameter>,
) {
    for combination in combinations {
        while combination.applies(table) {
            let mut merge = MergeParameter::default();
            for (bucket, count) in table.iter_mut().zip(combination.counts) {
                for parameter in bucket.drain(..count) {
                    merge.add_whole(parameter);
                }
            }
            debug_assert_eq!(merge.used_floats, combination.used_floats());
            merged.push(merge);
        }
    }
}

/// Float-wise packing of whatever the rules left over, widest first. A parameter that does not
/// fit the current slot is split across it and the next one.
fn merge_reminders(table: &mut MergeTable, plan: &mut MergePlan) {
    let mut current = MergeParameter::default();
    for bucket in table.iter_mut().rev() {
        for parameter in bucket.drain(..) {
            let floats = float_width(&parameter);
            let free = current.free_floats();
            if floats <= free {
                current.add_whole(parameter);
            } else {
                current.add_source(parameter.clone(), OperandMask::from_float_count(free), free);
                plan.merged.push(std::mem::take(&mut current));
                let rest = floats - free;
                current.add_source(
                    parameter.clone(),
                    OperandMask::from_float_count(rest).shifted(free),
                    rest,
                );
                plan.split.push(parameter);
            }
            if current.free_floats() == 0 {
                plan.merged.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.sources.is_empty() {
        plan.merged.push(current);
    }
}

/// Builds the fragment side plan matching `plan`: every vertex source is replaced by the
/// fragment texcoord input with the same index.
fn mirror_plan(plan: &MergePlan, ps_main: &Function) -> Result<MergePlan> {
    let inputs: Vec<&ParameterRef> = ps_main.inputs().iter().filter(|p| is_texcoord(p)).collect();

    for input in &inputs {
        let matched = plan
            .merged
            .iter()
            .flat_map(|m| m.sources.iter())
            .any(|s| s.parameter.index() == input.index());
        if !matched {
            return Err(Error::UnmatchedInterpolator {
                name: input.name().to_owned(),
            });
        }
    }

    let counterpart = |vertex: &ParameterRef| -> Result<Option<ParameterRef>> {
        let Some(input) = find_by_semantic(ps_main.inputs(), vertex.semantic(), vertex.index())
        else {
            return Ok(None);
        };
        if input.ty() != vertex.ty() {
            return Err(Error::InterpolatorTypeMismatch {
                name: vertex.name().to_owned(),
                vertex: vertex.ty(),
                fragment: input.ty(),
            });
        }
        Ok(Some(input.clone()))
    };

    let mut mirrored = MergePlan::default();
    for merge in &plan.merged {
        let mut fragment_merge = MergeParameter::default();
        for source in &merge.sources {
            if let Some(input) = counterpart(&source.parameter)? {
                fragment_merge.sources.push(MergeSource {
                    parameter: input,
                    ..source.clone()
                });
            }
        }
        fragment_merge.used_floats = merge.used_floats;
        mirrored.merged.push(fragment_merge);
    }
    for parameter in &plan.split {
        if let Some(input) = counterpart(parameter)? {
            mirrored.split.push(input);
        }
    }
    Ok(mirrored)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Vertex,
    Fragment,
}

fn apply_plan(main: &mut Function, plan: &MergePlan, side: Side) -> Result<()> {
    let mut destinations: Vec<Option<ParameterRef>> = Vec::with_capacity(plan.merged.len());
    for (slot, merge) in plan.merged.iter().enumerate() {
        if merge.sources.is_empty() {
            destinations.push(None);
            continue;
        }
        let prefix = match side {
            Side::Vertex => 'o',
            Side::Fragment => 'i',
        };
        destinations.push(Some(Parameter::new(
            format!("{prefix}Texcoord_{slot}"),
            merge.destination_type(),
            Semantic::TextureCoordinates,
            slot as u32,
            merge.destination_content(),
        )));
    }

    let mut locals = Vec::with_capacity(plan.split.len());
    for parameter in &plan.split {
        let local = main.resolve_local_parameter(
            Semantic::TextureCoordinates,
            parameter.index(),
            &format!("lsplit_{}", parameter.name()),
            parameter.ty(),
        )?;
        locals.push((parameter.clone(), local));
    }
    let local_for = |parameter: &ParameterRef| {
        locals
            .iter()
            .find(|(split, _)| Rc::ptr_eq(split, parameter))
            .map(|(_, local)| local.clone())
    };

    // Split parameters are assembled through their local, so rewrite operands before adding
    // the pack/unpack atoms which must keep referencing the destinations.
    for atom in main.atoms_mut() {
        for operand in atom.operands_mut() {
            let parameter = operand.parameter().clone();
            if let Some(local) = local_for(&parameter) {
                operand.set_parameter(local);
                continue;
            }
            let Some((merge, source, destination)) = plan
                .merged
                .iter()
                .zip(&destinations)
                .find_map(|(merge, dst)| {
                    let source = merge
                        .sources
                        .iter()
                        .find(|s| Rc::ptr_eq(&s.parameter, &parameter))?;
                    Some((merge, source, dst.as_ref()?))
                })
            else {
                continue;
            };

            let mask = operand.mask();
            let new_mask = if mask == OperandMask::ALL {
                if merge.sources.len() == 1 && source.floats == merge.used_floats {
                    OperandMask::ALL
                } else {
                    source.destination_mask()
                }
            } else {
                mask.shifted(source.offset)
            };
            operand.set_parameter(destination.clone());
            operand.set_mask(new_mask);
        }
    }

    for (merge, destination) in plan.merged.iter().zip(&destinations) {
        let Some(destination) = destination else {
            continue;
        };
        for source in merge.sources.iter().filter(|s| !s.is_whole()) {
            let Some(local) = local_for(&source.parameter) else {
                continue;
            };
            let atom = match side {
                Side::Vertex => FunctionInvocation::new(
                    AtomOp::Assign,
                    GroupOrder::VS_POST_PROCESS,
                    0,
                )
                .with_operand(&local, OperandSemantic::In, source.source_mask)
                .with_operand(destination, OperandSemantic::Out, source.destination_mask()),
                Side::Fragment => FunctionInvocation::new(
                    AtomOp::Assign,
                    GroupOrder::PS_PRE_PROCESS,
                    0,
                )
                .with_operand(destination, OperandSemantic::In, source.destination_mask())
                .with_operand(&local, OperandSemantic::Out, source.source_mask),
            };
            main.add_atom_instance(atom);
        }
    }

    for merge in &plan.merged {
        for source in &merge.sources {
            match side {
                Side::Vertex => main.delete_output_parameter(&source.parameter),
                Side::Fragment => main.delete_input_parameter(&source.parameter),
            }
        }
    }
    for destination in destinations.into_iter().flatten() {
        match side {
            Side::Vertex => main.add_output_parameter(destination)?,
            Side::Fragment => main.add_input_parameter(destination)?,
        }
    }
    Ok(())
}

/// Renames every fragment input after the vertex output with the same semantic and index, and
/// orders the inputs like the vertex outputs.
///
/// GLSL links varyings by name, so a fragment input `iTexcoord_0` would never receive the
/// vertex output `oTexcoord_0`.
pub fn synchronize_fragment_inputs(set: &mut ProgramSet) -> Result<()> {
    let (vertex, fragment) = set.programs_mut();
    let vs_outputs = vertex.entry_function().outputs().to_vec();
    let ps_main = fragment.entry_function_mut();

    let mut synced: Vec<ParameterRef> = Vec::with_capacity(ps_main.inputs().len());
    let mut replaced: Vec<(ParameterRef, ParameterRef)> = Vec::new();

    for output in &vs_outputs {
        let Some(input) = ps_main
            .input_by_semantic(output.semantic(), output.index())
            .cloned()
        else {
            continue;
        };
        if input.ty() != output.ty() {
            return Err(Error::InterpolatorTypeMismatch {
                name: output.name().to_owned(),
                vertex: output.ty(),
                fragment: input.ty(),
            });
        }
        if input.name() == output.name() {
            synced.push(input);
        } else {
            let renamed = input.renamed(output.name());
            replaced.push((input, renamed.clone()));
            synced.push(renamed);
        }
    }
    for input in ps_main.inputs() {
        let kept = synced.iter().any(|p| Rc::ptr_eq(p, input))
            || replaced.iter().any(|(old, _)| Rc::ptr_eq(old, input));
        if !kept {
            synced.push(input.clone());
        }
    }

    for atom in ps_main.atoms_mut() {
        for operand in atom.operands_mut() {
            if let Some((_, renamed)) = replaced
                .iter()
                .find(|(old, _)| Rc::ptr_eq(old, operand.parameter()))
            {
                operand.set_parameter(renamed.clone());
            }
        }
    }
    ps_main.set_inputs(synced);
    debug!(renamed = replaced.len(), "synchronized fragment inputs");
    Ok(())
}
