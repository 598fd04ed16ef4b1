use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::program::ProgramSet;

/// One fixed-function feature (transform, lighting, a texture stage, ...) contributing
/// parameters, library dependencies and atoms to a [`ProgramSet`].
pub trait SubRenderState {
    fn type_name(&self) -> &'static str;

    /// Position of this state among the states of a pass. Lower runs first.
    fn execution_order(&self) -> i32;

    fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<()>;

    fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<()>;

    fn add_function_invocations(&mut self, set: &mut ProgramSet) -> Result<()>;

    fn create_cpu_sub_programs(&mut self, set: &mut ProgramSet) -> Result<()> {
        self.resolve_parameters(set)?;
        self.resolve_dependencies(set)?;
        self.add_function_invocations(set)
    }
}

pub trait SubRenderStateFactory {
    fn type_name(&self) -> &'static str;

    fn create_instance(&self) -> Box<dyn SubRenderState>;
}

/// Sub render state factories keyed by type name.
#[derive(Default)]
pub struct RenderStateRegistry {
    factories: BTreeMap<&'static str, Box<dyn SubRenderStateFactory>>,
}

impl RenderStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the fixed-function states of [`crate::ffp`].
    pub fn with_ffp_factories() -> Self {
        let mut registry = Self::new();
        crate::ffp::register_factories(&mut registry);
        registry
    }

    pub fn add_factory(&mut self, factory: Box<dyn SubRenderStateFactory>) {
        self.factories.insert(factory.type_name(), factory);
    }

    pub fn has_factory(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn create_instance(&self, type_name: &str) -> Result<Box<dyn SubRenderState>> {
        self.factories
            .get(type_name)
            .map(|factory| factory.create_instance())
            .ok_or_else(|| Error::UnknownSubRenderState(type_name.to_owned()))
    }
}

/// The sub render states of one pass, turned into a [`ProgramSet`] on demand.
#[derive(Default)]
pub struct TargetRenderState {
    states: Vec<Box<dyn SubRenderState>>,
}

impl TargetRenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sub_render_state(&mut self, state: Box<dyn SubRenderState>) {
        self.states.push(state);
    }

    pub fn add_by_name(&mut self, registry: &RenderStateRegistry, type_name: &str) -> Result<()> {
        self.add_sub_render_state(registry.create_instance(type_name)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Runs every state, in execution order, against a fresh program set.
    pub fn create_program_set(&mut self) -> Result<ProgramSet> {
        self.states.sort_by_key(|state| state.execution_order());

        let mut set = ProgramSet::new();
        for state in &mut self.states {
            debug!(
                state = state.type_name(),
                order = state.execution_order(),
                "creating sub programs"
            );
            state.create_cpu_sub_programs(&mut set)?;
        }
        set.sort_atom_instances();
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{AtomOp, FunctionInvocation, GroupOrder};
    use crate::operand::{OperandMask, OperandSemantic};
    use crate::parameter::{GpuConstantType, Semantic};

    struct Marker {
        order: i32,
        name: &'static str,
    }

    impl SubRenderState for Marker {
        fn type_name(&self) -> &'static str {
            self.name
        }

        fn execution_order(&self) -> i32 {
            self.order
        }

        fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<()> {
            set.vertex_mut()
                .entry_function_mut()
                .resolve_local_parameter(Semantic::Unknown, 0, "lMarker", GpuConstantType::Float4)?;
            Ok(())
        }

        fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<()> {
            set.vertex_mut().add_dependency(self.name);
            Ok(())
        }

        fn add_function_invocations(&mut self, set: &mut ProgramSet) -> Result<()> {
            let main = set.vertex_mut().entry_function_mut();
            let marker = main.locals()[0].clone();
            main.add_atom_instance(
                FunctionInvocation::new(AtomOp::call(self.name), GroupOrder::VS_PRE_PROCESS, 0)
                    .with_operand(&marker, OperandSemantic::InOut, OperandMask::ALL),
            );
            Ok(())
        }
    }

    #[test]
    fn states_run_in_execution_order() {
        let mut target = TargetRenderState::new();
        target.add_sub_render_state(Box::new(Marker {
            order: 300,
            name: "Late",
        }));
        target.add_sub_render_state(Box::new(Marker {
            order: 100,
            name: "Early",
        }));
        let set = target.create_program_set().unwrap();
        assert_eq!(set.vertex().dependencies(), ["Early", "Late"]);
        let calls: Vec<String> = set
            .vertex()
            .entry_function()
            .atoms()
            .iter()
            .map(|a| a.op().to_string())
            .collect();
        assert_eq!(calls, ["Early", "Late"]);
    }

    #[test]
    fn unknown_state_name_is_an_error() {
        let registry = RenderStateRegistry::with_ffp_factories();
        assert!(registry.has_factory("FFP_Transform"));
        let mut target = TargetRenderState::new();
        assert!(matches!(
            target.add_by_name(&registry, "FFP_Lighting"),
            Err(Error::UnknownSubRenderState(name)) if name == "FFP_Lighting"
        ));
        assert!(target.is_empty());
    }
}
