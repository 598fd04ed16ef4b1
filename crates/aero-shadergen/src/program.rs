use std::rc::Rc;

use tracing::debug;

use crate::auto_constants::{AutoConstantType, AutoDataKind};
use crate::error::{Error, Result};
use crate::function::Function;
use crate::parameter::{
    contains, find_by_name, AutoBinding, GpuConstantType, Parameter, ParameterRef, Variability,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramType {
    Vertex,
    Fragment,
    Geometry,
}

/// One GPU stage: the entry function plus the uniforms and library dependencies it uses.
#[derive(Debug)]
pub struct Program {
    ty: ProgramType,
    entry: Function,
    uniforms: Vec<ParameterRef>,
    dependencies: Vec<String>,
}

impl Program {
    pub fn new(ty: ProgramType) -> Self {
        let description = match ty {
            ProgramType::Vertex => "Vertex Program Entry point",
            ProgramType::Fragment => "Pixel Program Entry point",
            ProgramType::Geometry => "Geometry Program Entry point",
        };
        Self {
            ty,
            entry: Function::new("main", description),
            uniforms: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn ty(&self) -> ProgramType {
        self.ty
    }

    pub fn entry_function(&self) -> &Function {
        &self.entry
    }

    pub fn entry_function_mut(&mut self) -> &mut Function {
        &mut self.entry
    }

    pub fn uniforms(&self) -> &[ParameterRef] {
        &self.uniforms
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Adds a library dependency. Dependencies keep the order of their first addition.
    pub fn add_dependency(&mut self, library: impl Into<String>) {
        let library = library.into();
        if !self.dependencies.contains(&library) {
            self.dependencies.push(library);
        }
    }

    pub fn uniform_by_name(&self, name: &str) -> Option<&ParameterRef> {
        find_by_name(&self.uniforms, name)
    }

    /// Returns the uniform named `name`, creating it if needed. Repeat requests OR their
    /// variability into the existing uniform. An empty name gets a generated one.
    pub fn resolve_parameter(
        &mut self,
        ty: GpuConstantType,
        index: u32,
        variability: Variability,
        name: &str,
        array_size: Option<usize>,
    ) -> Result<ParameterRef> {
        let name = if name.is_empty() {
            format!("gUniform_{}", self.uniforms.len())
        } else {
            name.to_owned()
        };

        if let Some(existing) = self.uniform_by_name(&name) {
            if existing.ty() != ty {
                return Err(Error::ParameterConflict {
                    name,
                    requested: ty,
                    existing: existing.ty(),
                });
            }
            if let Some(info) = existing.uniform_info() {
                info.add_variability(variability);
            }
            return Ok(existing.clone());
        }

        let parameter = Parameter::uniform(name, ty, index, variability, array_size, None);
        self.add_uniform(parameter.clone())?;
        Ok(parameter)
    }

    /// Returns the uniform bound to `constant` with integer `data`, creating it if needed.
    pub fn resolve_auto_parameter_int(
        &mut self,
        constant: AutoConstantType,
        data: u32,
    ) -> Result<ParameterRef> {
        let binding = AutoBinding::Int { constant, data };
        if let Some(existing) = self.uniform_by_binding(&binding) {
            return Ok(existing.clone());
        }

        let def = constant.definition();
        let name = match def.data {
            AutoDataKind::Int => format!("{}{data}", def.name),
            _ => def.name.to_owned(),
        };
        self.create_auto_uniform(name, def.ty, def.variability, None, binding)
    }

    /// Returns the uniform bound to `constant` with real `data`, creating it if needed.
    pub fn resolve_auto_parameter_real(
        &mut self,
        constant: AutoConstantType,
        data: f32,
    ) -> Result<ParameterRef> {
        let binding = AutoBinding::Real { constant, data };
        if let Some(existing) = self.uniform_by_binding(&binding) {
            return Ok(existing.clone());
        }

        let def = constant.definition();
        let suffix: String = format!("{data}")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let name = format!("{}_{suffix}", def.name);
        self.create_auto_uniform(name, def.ty, def.variability, None, binding)
    }

    /// Returns the array uniform bound to `constant`, e.g. the skinning matrix palette.
    pub fn resolve_auto_parameter_array(
        &mut self,
        constant: AutoConstantType,
        ty: GpuConstantType,
        size: usize,
    ) -> Result<ParameterRef> {
        let binding = AutoBinding::Int { constant, data: 0 };
        if let Some(existing) = self.uniform_by_binding(&binding) {
            if existing.ty() != ty {
                return Err(Error::ParameterConflict {
                    name: existing.name().to_owned(),
                    requested: ty,
                    existing: existing.ty(),
                });
            }
            return Ok(existing.clone());
        }

        let def = constant.definition();
        self.create_auto_uniform(def.name.to_owned(), ty, def.variability, Some(size), binding)
    }

    fn uniform_by_binding(&self, binding: &AutoBinding) -> Option<&ParameterRef> {
        self.uniforms.iter().find(|p| {
            p.uniform_info()
                .and_then(|info| info.auto_binding())
                .is_some_and(|auto| auto == *binding)
        })
    }

    fn create_auto_uniform(
        &mut self,
        name: String,
        ty: GpuConstantType,
        variability: Variability,
        array_size: Option<usize>,
        binding: AutoBinding,
    ) -> Result<ParameterRef> {
        let parameter = Parameter::uniform(name, ty, 0, variability, array_size, Some(binding));
        debug!(
            name = parameter.name(),
            constant = ?binding.constant(),
            "resolved auto constant"
        );
        self.add_uniform(parameter.clone())?;
        Ok(parameter)
    }

    fn add_uniform(&mut self, parameter: ParameterRef) -> Result<()> {
        if self.uniform_by_name(parameter.name()).is_some() {
            return Err(Error::DuplicateParameter {
                name: parameter.name().to_owned(),
                list: "uniform",
            });
        }
        self.uniforms.push(parameter);
        Ok(())
    }

    /// True if `parameter` is declared by this program (function lists or uniforms).
    pub fn declares(&self, parameter: &ParameterRef) -> bool {
        contains(&self.uniforms, parameter)
            || contains(self.entry.inputs(), parameter)
            || contains(self.entry.outputs(), parameter)
            || contains(self.entry.locals(), parameter)
    }

    /// Checks that every operand references a declared parameter or a literal.
    pub fn validate(&self) -> Result<()> {
        for atom in self.entry.atoms() {
            for operand in atom.operands() {
                let parameter = operand.parameter();
                if !parameter.is_const() && !self.declares(parameter) {
                    return Err(Error::UndeclaredParameter {
                        name: parameter.name().to_owned(),
                        program: self.ty,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Matched vertex and fragment programs generated together.
#[derive(Debug)]
pub struct ProgramSet {
    vertex: Program,
    fragment: Program,
}

impl Default for ProgramSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramSet {
    pub fn new() -> Self {
        Self {
            vertex: Program::new(ProgramType::Vertex),
            fragment: Program::new(ProgramType::Fragment),
        }
    }

    pub fn vertex(&self) -> &Program {
        &self.vertex
    }

    pub fn vertex_mut(&mut self) -> &mut Program {
        &mut self.vertex
    }

    pub fn fragment(&self) -> &Program {
        &self.fragment
    }

    pub fn fragment_mut(&mut self) -> &mut Program {
        &mut self.fragment
    }

    pub fn programs_mut(&mut self) -> (&mut Program, &mut Program) {
        (&mut self.vertex, &mut self.fragment)
    }

    pub fn sort_atom_instances(&mut self) {
        self.vertex.entry_function_mut().sort_atom_instances();
        self.fragment.entry_function_mut().sort_atom_instances();
    }
}

pub(crate) fn same(a: &ParameterRef, b: &ParameterRef) -> bool {
    Rc::ptr_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{AtomOp, FunctionInvocation, GroupOrder};
    use crate::operand::{OperandMask, OperandSemantic};
    use crate::parameter::{Content, Semantic};

    #[test]
    fn auto_int_parameter_is_shared() {
        let mut program = Program::new(ProgramType::Vertex);
        let a = program
            .resolve_auto_parameter_int(AutoConstantType::WorldMatrix, 0)
            .unwrap();
        let b = program
            .resolve_auto_parameter_int(AutoConstantType::WorldMatrix, 0)
            .unwrap();
        assert!(same(&a, &b));
        assert_eq!(program.uniforms().len(), 1);
        assert_eq!(a.name(), "world_matrix");
    }

    #[test]
    fn indexed_auto_parameters_are_distinct() {
        let mut program = Program::new(ProgramType::Vertex);
        let l0 = program
            .resolve_auto_parameter_int(AutoConstantType::LightDiffuseColour, 0)
            .unwrap();
        let l1 = program
            .resolve_auto_parameter_int(AutoConstantType::LightDiffuseColour, 1)
            .unwrap();
        assert_eq!(l0.name(), "light_diffuse_colour0");
        assert_eq!(l1.name(), "light_diffuse_colour1");
    }

    #[test]
    fn real_auto_parameter_name_is_sanitized() {
        let mut program = Program::new(ProgramType::Fragment);
        let t = program
            .resolve_auto_parameter_real(AutoConstantType::TimeModulo, 0.5)
            .unwrap();
        assert_eq!(t.name(), "time_0_x_0_5");
        assert_eq!(t.ty(), GpuConstantType::Float1);
    }

    #[test]
    fn named_uniform_merges_variability_and_checks_type() {
        let mut program = Program::new(ProgramType::Fragment);
        let a = program
            .resolve_parameter(
                GpuConstantType::Float4,
                0,
                Variability::GLOBAL,
                "gTint",
                None,
            )
            .unwrap();
        program
            .resolve_parameter(
                GpuConstantType::Float4,
                0,
                Variability::PER_FRAME,
                "gTint",
                None,
            )
            .unwrap();
        assert_eq!(
            a.uniform_info().unwrap().variability(),
            Variability::GLOBAL | Variability::PER_FRAME
        );

        let err = program
            .resolve_parameter(
                GpuConstantType::Float3,
                0,
                Variability::GLOBAL,
                "gTint",
                None,
            )
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn dependencies_keep_first_insertion_order() {
        let mut program = Program::new(ProgramType::Vertex);
        program.add_dependency("FFPLib_Transform");
        program.add_dependency("FFPLib_Common");
        program.add_dependency("FFPLib_Transform");
        assert_eq!(program.dependencies(), ["FFPLib_Transform", "FFPLib_Common"]);
    }

    #[test]
    fn validate_rejects_foreign_parameters() {
        let mut program = Program::new(ProgramType::Vertex);
        let foreign = Parameter::input(
            Semantic::Normal,
            0,
            Content::NormalObjectSpace,
            GpuConstantType::Float3,
        );
        program.entry_function_mut().add_atom_instance(
            FunctionInvocation::new(AtomOp::call("FFP_Normalize"), GroupOrder::VS_LIGHTING, 0)
                .with_operand(&foreign, OperandSemantic::InOut, OperandMask::ALL),
        );
        assert!(matches!(
            program.validate(),
            Err(Error::UndeclaredParameter { .. })
        ));
    }
}
