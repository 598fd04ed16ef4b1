use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::parameter::{GpuConstantType, ParameterRef};

bitflags! {
    /// Component selection of an operand.
    ///
    /// `ALL` means the whole parameter, with no swizzle emitted. The component bits are
    /// contiguous so a mask can be relocated by shifting it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperandMask: u8 {
        const ALL = 1 << 0;
        const X = 1 << 1;
        const Y = 1 << 2;
        const Z = 1 << 3;
        const W = 1 << 4;

        const XY = Self::X.bits() | Self::Y.bits();
        const XYZ = Self::XY.bits() | Self::Z.bits();
        const XYZW = Self::XYZ.bits() | Self::W.bits();
    }
}

const COMPONENTS: [(OperandMask, char); 4] = [
    (OperandMask::X, 'x'),
    (OperandMask::Y, 'y'),
    (OperandMask::Z, 'z'),
    (OperandMask::W, 'w'),
];

impl OperandMask {
    /// Mask selecting the first `count` components (`X`, `XY`, ...). Zero yields `ALL`.
    pub fn from_float_count(count: usize) -> Self {
        match count {
            0 => OperandMask::ALL,
            1 => OperandMask::X,
            2 => OperandMask::XY,
            3 => OperandMask::XYZ,
            _ => OperandMask::XYZW,
        }
    }

    /// Number of selected components. `ALL` counts as zero since its width is the parameter's.
    pub fn component_count(self) -> usize {
        (self & OperandMask::XYZW).bits().count_ones() as usize
    }

    /// Moves the component bits `offset` components towards `W`. Bits shifted past `W` are
    /// dropped.
    pub fn shifted(self, offset: usize) -> Self {
        let components = (self & OperandMask::XYZW).bits();
        let shifted = (components as u16) << offset;
        OperandMask::from_bits_truncate((shifted & OperandMask::XYZW.bits() as u16) as u8)
    }

    /// Swizzle suffix (without the dot), `None` for `ALL`.
    pub fn swizzle(self) -> Option<String> {
        if self.contains(OperandMask::ALL) || self.is_empty() {
            return None;
        }
        Some(
            COMPONENTS
                .iter()
                .filter(|(bit, _)| self.contains(*bit))
                .map(|(_, c)| *c)
                .collect(),
        )
    }

    /// Float vector type with as many components as the mask selects.
    pub fn to_float_type(self) -> Result<GpuConstantType> {
        GpuConstantType::float_vector(self.component_count())
            .ok_or(Error::InvalidOperandMask { mask: self })
    }
}

/// Data flow direction of an operand within its atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSemantic {
    In,
    Out,
    InOut,
}

impl OperandSemantic {
    pub fn is_write(self) -> bool {
        matches!(self, OperandSemantic::Out | OperandSemantic::InOut)
    }
}

/// Reference to a parameter from within an atom.
#[derive(Debug, Clone)]
pub struct Operand {
    parameter: ParameterRef,
    semantic: OperandSemantic,
    mask: OperandMask,
    indirection_level: u16,
}

impl Operand {
    pub fn new(
        parameter: ParameterRef,
        semantic: OperandSemantic,
        mask: OperandMask,
        indirection_level: u16,
    ) -> Self {
        Self {
            parameter,
            semantic,
            mask,
            indirection_level,
        }
    }

    pub fn parameter(&self) -> &ParameterRef {
        &self.parameter
    }

    pub fn semantic(&self) -> OperandSemantic {
        self.semantic
    }

    pub fn mask(&self) -> OperandMask {
        self.mask
    }

    /// Greater than zero when this operand indexes the preceding operand (`a[int(b)]`).
    pub fn indirection_level(&self) -> u16 {
        self.indirection_level
    }

    pub(crate) fn set_parameter(&mut self, parameter: ParameterRef) {
        self.parameter = parameter;
    }

    pub(crate) fn set_mask(&mut self, mask: OperandMask) {
        self.mask = mask;
    }
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.parameter, &other.parameter)
            && self.semantic == other.semantic
            && self.mask == other.mask
            && self.indirection_level == other.indirection_level
    }
}
