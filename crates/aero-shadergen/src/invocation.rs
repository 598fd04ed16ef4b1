use std::fmt;

use crate::operand::{Operand, OperandMask, OperandSemantic};
use crate::parameter::ParameterRef;

/// Pipeline stage position of an atom. Atoms are emitted in ascending group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupOrder(pub i32);

impl GroupOrder {
    pub const VS_PRE_PROCESS: GroupOrder = GroupOrder(0);
    pub const VS_TRANSFORM: GroupOrder = GroupOrder(100);
    pub const VS_COLOUR: GroupOrder = GroupOrder(200);
    pub const VS_LIGHTING: GroupOrder = GroupOrder(300);
    pub const VS_TEXTURING: GroupOrder = GroupOrder(400);
    pub const VS_FOG: GroupOrder = GroupOrder(500);
    pub const VS_POST_PROCESS: GroupOrder = GroupOrder(2000);

    pub const PS_PRE_PROCESS: GroupOrder = GroupOrder(0);
    pub const PS_COLOUR_BEGIN: GroupOrder = GroupOrder(100);
    pub const PS_SAMPLING: GroupOrder = GroupOrder(150);
    pub const PS_TEXTURING: GroupOrder = GroupOrder(200);
    pub const PS_COLOUR_END: GroupOrder = GroupOrder(300);
    pub const PS_FOG: GroupOrder = GroupOrder(400);
    pub const PS_POST_PROCESS: GroupOrder = GroupOrder(500);
}

/// What an atom does.
///
/// `Call` invokes a library function with all operands as arguments. The remaining variants are
/// built-in operators that every writer lowers to target syntax; for those the `Out` operand is
/// the destination and the `In` operands are the sources in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomOp {
    Call(String),
    /// `dst = src`
    Assign,
    /// `dst = a + b`
    Add,
    /// `dst = a - b`
    Subtract,
    /// `dst = a * b`, component-wise.
    Modulate,
    /// `dst = matrix * vector`
    Transform,
    /// `dst = texture lookup(sampler, coord)`
    Sample,
}

impl AtomOp {
    pub fn call(name: impl Into<String>) -> Self {
        AtomOp::Call(name.into())
    }

    /// Number of source operands a built-in operator takes. `None` for library calls.
    pub fn source_count(&self) -> Option<usize> {
        match self {
            AtomOp::Call(_) => None,
            AtomOp::Assign => Some(1),
            AtomOp::Add
            | AtomOp::Subtract
            | AtomOp::Modulate
            | AtomOp::Transform
            | AtomOp::Sample => Some(2),
        }
    }
}

impl fmt::Display for AtomOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomOp::Call(name) => f.write_str(name),
            AtomOp::Assign => f.write_str("assign"),
            AtomOp::Add => f.write_str("add"),
            AtomOp::Subtract => f.write_str("subtract"),
            AtomOp::Modulate => f.write_str("modulate"),
            AtomOp::Transform => f.write_str("transform"),
            AtomOp::Sample => f.write_str("sample"),
        }
    }
}

/// One statement of a generated function.
#[derive(Debug, Clone)]
pub struct FunctionInvocation {
    op: AtomOp,
    group_order: GroupOrder,
    internal_order: i32,
    operands: Vec<Operand>,
}

impl FunctionInvocation {
    pub fn new(op: AtomOp, group_order: GroupOrder, internal_order: i32) -> Self {
        Self {
            op,
            group_order,
            internal_order,
            operands: Vec::new(),
        }
    }

    /// Appends an operand. Operands are emitted in push order.
    pub fn push_operand(
        &mut self,
        parameter: ParameterRef,
        semantic: OperandSemantic,
        mask: OperandMask,
        indirection_level: u16,
    ) -> &mut Self {
        self.operands
            .push(Operand::new(parameter, semantic, mask, indirection_level));
        self
    }

    /// Builder form of [`FunctionInvocation::push_operand`] for the common case.
    pub fn with_operand(
        mut self,
        parameter: &ParameterRef,
        semantic: OperandSemantic,
        mask: OperandMask,
    ) -> Self {
        self.push_operand(parameter.clone(), semantic, mask, 0);
        self
    }

    pub fn op(&self) -> &AtomOp {
        &self.op
    }

    pub fn group_order(&self) -> GroupOrder {
        self.group_order
    }

    pub fn internal_order(&self) -> i32 {
        self.internal_order
    }

    pub fn sort_key(&self) -> (GroupOrder, i32) {
        (self.group_order, self.internal_order)
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }

    /// Destination operand of a built-in operator.
    pub fn output_operand(&self) -> Option<&Operand> {
        self.operands
            .iter()
            .find(|op| op.semantic() == OperandSemantic::Out)
    }

    /// Source operands of a built-in operator, in push order.
    pub fn input_operands(&self) -> impl Iterator<Item = &Operand> {
        self.operands
            .iter()
            .filter(|op| op.semantic() == OperandSemantic::In)
    }
}

impl PartialEq for FunctionInvocation {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.operands == other.operands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{Content, GpuConstantType, Parameter, Semantic};

    fn colour() -> ParameterRef {
        Parameter::input(
            Semantic::Color,
            0,
            Content::ColorDiffuse,
            GpuConstantType::Float4,
        )
    }

    #[test]
    fn equality_ignores_ordering_keys() {
        let p = colour();
        let a = FunctionInvocation::new(AtomOp::Assign, GroupOrder::VS_COLOUR, 0).with_operand(
            &p,
            OperandSemantic::In,
            OperandMask::ALL,
        );
        let b = FunctionInvocation::new(AtomOp::Assign, GroupOrder::VS_POST_PROCESS, 7)
            .with_operand(&p, OperandSemantic::In, OperandMask::ALL);
        assert_eq!(a, b);

        let c = FunctionInvocation::new(AtomOp::Assign, GroupOrder::VS_COLOUR, 0).with_operand(
            &p,
            OperandSemantic::In,
            OperandMask::XYZ,
        );
        assert_ne!(a, c);

        let d = FunctionInvocation::new(AtomOp::call("FFP_Assign"), GroupOrder::VS_COLOUR, 0)
            .with_operand(&p, OperandSemantic::In, OperandMask::ALL);
        assert_ne!(a, d);
    }

    #[test]
    fn output_and_inputs_are_split_by_semantic() {
        let src = colour();
        let dst = Parameter::output(
            Semantic::Color,
            0,
            Content::ColorDiffuse,
            GpuConstantType::Float4,
        );
        let atom = FunctionInvocation::new(AtomOp::Assign, GroupOrder::VS_COLOUR, 0)
            .with_operand(&src, OperandSemantic::In, OperandMask::ALL)
            .with_operand(&dst, OperandSemantic::Out, OperandMask::ALL);
        assert_eq!(atom.output_operand().unwrap().parameter().name(), "oColor_0");
        assert_eq!(atom.input_operands().count(), 1);
    }
}
