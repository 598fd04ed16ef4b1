use tracing::debug;

use crate::error::{Error, Result};
use crate::invocation::{AtomOp, FunctionInvocation, GroupOrder};
use crate::operand::{OperandMask, OperandSemantic};
use crate::parameter::{
    find_by_content, find_by_name, find_by_semantic, Content, GpuConstantType, Parameter,
    ParameterRef, Semantic,
};

/// Entry function of a program: interface parameter lists, locals and the atom list.
#[derive(Debug)]
pub struct Function {
    name: String,
    description: String,
    inputs: Vec<ParameterRef>,
    outputs: Vec<ParameterRef>,
    locals: Vec<ParameterRef>,
    atoms: Vec<FunctionInvocation>,
}

impl Function {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            locals: Vec::new(),
            atoms: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn inputs(&self) -> &[ParameterRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ParameterRef] {
        &self.outputs
    }

    pub fn locals(&self) -> &[ParameterRef] {
        &self.locals
    }

    pub fn atoms(&self) -> &[FunctionInvocation] {
        &self.atoms
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut [FunctionInvocation] {
        &mut self.atoms
    }

    /// Returns the input with the requested identity, creating it if needed.
    ///
    /// A known `content` is matched first, so two producers asking for the same data share one
    /// input. `index: None` takes the next index not yet used by `semantic`.
    pub fn resolve_input_parameter(
        &mut self,
        semantic: Semantic,
        index: Option<u32>,
        content: Content,
        ty: GpuConstantType,
    ) -> Result<ParameterRef> {
        resolve_interface(&mut self.inputs, "input", semantic, index, content, ty, Parameter::input)
    }

    /// Output counterpart of [`Function::resolve_input_parameter`].
    pub fn resolve_output_parameter(
        &mut self,
        semantic: Semantic,
        index: Option<u32>,
        content: Content,
        ty: GpuConstantType,
    ) -> Result<ParameterRef> {
        resolve_interface(
            &mut self.outputs,
            "output",
            semantic,
            index,
            content,
            ty,
            Parameter::output,
        )
    }

    /// Returns the local named `name`, creating it if needed.
    pub fn resolve_local_parameter(
        &mut self,
        semantic: Semantic,
        index: u32,
        name: &str,
        ty: GpuConstantType,
    ) -> Result<ParameterRef> {
        if let Some(existing) = find_by_name(&self.locals, name) {
            return check_type(existing, ty);
        }
        let parameter = Parameter::new(name, ty, semantic, index, Content::Unknown);
        add_unique(&mut self.locals, "local", parameter.clone())?;
        Ok(parameter)
    }

    /// Returns the local carrying `content`, creating an anonymous one if needed.
    pub fn resolve_local_parameter_by_content(
        &mut self,
        semantic: Semantic,
        index: u32,
        content: Content,
        ty: GpuConstantType,
    ) -> Result<ParameterRef> {
        if let Some(existing) = find_by_content(&self.locals, content, ty) {
            return Ok(existing.clone());
        }
        let name = format!("lLocalParam_{}", self.locals.len());
        let parameter = Parameter::new(name, ty, semantic, index, content);
        add_unique(&mut self.locals, "local", parameter.clone())?;
        Ok(parameter)
    }

    pub fn input_by_semantic(&self, semantic: Semantic, index: u32) -> Option<&ParameterRef> {
        find_by_semantic(&self.inputs, semantic, index)
    }

    pub fn output_by_semantic(&self, semantic: Semantic, index: u32) -> Option<&ParameterRef> {
        find_by_semantic(&self.outputs, semantic, index)
    }

    pub fn add_input_parameter(&mut self, parameter: ParameterRef) -> Result<()> {
        add_unique(&mut self.inputs, "input", parameter)
    }

    pub fn add_output_parameter(&mut self, parameter: ParameterRef) -> Result<()> {
        add_unique(&mut self.outputs, "output", parameter)
    }

    /// Removes `parameter` (by identity) from the input list.
    pub fn delete_input_parameter(&mut self, parameter: &ParameterRef) {
        self.inputs.retain(|p| !ParameterRef::ptr_eq(p, parameter));
    }

    /// Removes `parameter` (by identity) from the output list.
    pub fn delete_output_parameter(&mut self, parameter: &ParameterRef) {
        self.outputs.retain(|p| !ParameterRef::ptr_eq(p, parameter));
    }

    pub(crate) fn set_inputs(&mut self, inputs: Vec<ParameterRef>) {
        self.inputs = inputs;
    }

    pub fn add_atom_instance(&mut self, atom: FunctionInvocation) {
        self.atoms.push(atom);
    }

    /// Appends `dst = src`.
    pub fn add_atom_assign(
        &mut self,
        dst: &ParameterRef,
        src: &ParameterRef,
        group_order: GroupOrder,
        internal_order: i32,
    ) {
        self.add_atom_instance(
            FunctionInvocation::new(AtomOp::Assign, group_order, internal_order)
                .with_operand(src, OperandSemantic::In, OperandMask::ALL)
                .with_operand(dst, OperandSemantic::Out, OperandMask::ALL),
        );
    }

    /// Removes the first atom structurally equal to `atom`. Returns whether one was removed.
    pub fn delete_atom_instance(&mut self, atom: &FunctionInvocation) -> bool {
        match self.atoms.iter().position(|a| a == atom) {
            Some(pos) => {
                self.atoms.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Stable sort by `(group order, internal order)`.
    pub fn sort_atom_instances(&mut self) {
        self.atoms.sort_by_key(FunctionInvocation::sort_key);
    }
}

fn check_type(existing: &ParameterRef, ty: GpuConstantType) -> Result<ParameterRef> {
    if existing.ty() != ty {
        return Err(Error::ParameterConflict {
            name: existing.name().to_owned(),
            requested: ty,
            existing: existing.ty(),
        });
    }
    Ok(existing.clone())
}

fn next_free_index(list: &[ParameterRef], semantic: Semantic) -> u32 {
    (0..)
        .find(|i| find_by_semantic(list, semantic, *i).is_none())
        .unwrap_or_default()
}

fn resolve_interface(
    list: &mut Vec<ParameterRef>,
    list_name: &'static str,
    semantic: Semantic,
    index: Option<u32>,
    content: Content,
    ty: GpuConstantType,
    create: fn(Semantic, u32, Content, GpuConstantType) -> ParameterRef,
) -> Result<ParameterRef> {
    if let Some(existing) = find_by_content(list, content, ty) {
        return Ok(existing.clone());
    }

    let index = match index {
        Some(index) => index,
        None => next_free_index(list, semantic),
    };

    if let Some(existing) = find_by_semantic(list, semantic, index) {
        return check_type(existing, ty);
    }

    let parameter = create(semantic, index, content, ty);
    debug!(
        list = list_name,
        name = parameter.name(),
        ty = ?ty,
        "resolved new parameter"
    );
    add_unique(list, list_name, parameter.clone())?;
    Ok(parameter)
}

fn add_unique(
    list: &mut Vec<ParameterRef>,
    list_name: &'static str,
    parameter: ParameterRef,
) -> Result<()> {
    if find_by_name(list, parameter.name()).is_some() {
        return Err(Error::DuplicateParameter {
            name: parameter.name().to_owned(),
            list: list_name,
        });
    }
    if parameter.semantic() != Semantic::Unknown
        && find_by_semantic(list, parameter.semantic(), parameter.index()).is_some()
    {
        return Err(Error::DuplicateSemantic {
            semantic: parameter.semantic(),
            index: parameter.index(),
            list: list_name,
        });
    }
    list.push(parameter);
    Ok(())
}
