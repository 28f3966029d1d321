//! Register value categories, as far as a verifier cares about them when a
//! value has to be moved from one register to another.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instruction::{Instruction, Opcode, Operands};
use crate::register::Register;

/// What a register holds after an instruction has executed.
///
/// `Word32`, `Wide64Primary`, `Wide64Continuation`, `ObjectRef` and `Array`
/// are the categories every instruction can report. The remaining tags are
/// refinements known from descriptors or fixed conversion pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Word32,
    Wide64Primary,
    Wide64Continuation,
    ObjectRef(Option<String>),
    Array(Option<String>),
    Byte,
    Char,
    Short,
    Boolean,
    Int,
    Float,
    Long,
    Double,
    Long2,
    Double2,
}

impl ValueType {
    /// Register type of a value with the given type descriptor. `V` yields
    /// `None`, nothing of type void lives in a register.
    pub fn from_descriptor(descriptor: &str) -> Option<ValueType> {
        let t = match descriptor {
            "I" => ValueType::Int,
            "Z" => ValueType::Boolean,
            "B" => ValueType::Byte,
            "C" => ValueType::Char,
            "S" => ValueType::Short,
            "F" => ValueType::Float,
            "J" => ValueType::Long,
            "D" => ValueType::Double,
            d if d.starts_with('L') && d.ends_with(';') => {
                ValueType::ObjectRef(Some(d.to_string()))
            }
            d if d.starts_with('[') && d.len() > 1 => ValueType::Array(Some(d.to_string())),
            _ => return None,
        };
        Some(t)
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, ValueType::Wide64Primary | ValueType::Long | ValueType::Double)
    }

    pub fn is_continuation(&self) -> bool {
        matches!(self, ValueType::Wide64Continuation | ValueType::Long2 | ValueType::Double2)
    }

    /// The tag the second slot of a wide value carries. `None` for
    /// anything that is not the primary half of a wide value.
    pub fn continuation(&self) -> Option<ValueType> {
        match self {
            ValueType::Wide64Primary => Some(ValueType::Wide64Continuation),
            ValueType::Long => Some(ValueType::Long2),
            ValueType::Double => Some(ValueType::Double2),
            _ => None,
        }
    }

    pub fn move_kind(&self) -> MoveKind {
        match self {
            ValueType::Word32
            | ValueType::Byte
            | ValueType::Char
            | ValueType::Short
            | ValueType::Boolean
            | ValueType::Int
            | ValueType::Float => MoveKind::Word,
            ValueType::Wide64Primary | ValueType::Long | ValueType::Double => MoveKind::Wide,
            ValueType::Wide64Continuation | ValueType::Long2 | ValueType::Double2 => {
                MoveKind::WideContinuation
            }
            ValueType::ObjectRef(_) | ValueType::Array(_) => MoveKind::Object,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Word32 => write!(f, "32-bit"),
            ValueType::Wide64Primary => write!(f, "64-bit"),
            ValueType::Wide64Continuation => write!(f, "64-bit-2"),
            ValueType::ObjectRef(None) => write!(f, "Non Specific Object"),
            ValueType::Array(None) => write!(f, "Non Specific Array"),
            ValueType::ObjectRef(Some(d)) | ValueType::Array(Some(d)) => write!(f, "{d}"),
            ValueType::Byte => write!(f, "B"),
            ValueType::Char => write!(f, "C"),
            ValueType::Short => write!(f, "S"),
            ValueType::Boolean => write!(f, "Z"),
            ValueType::Int => write!(f, "I"),
            ValueType::Float => write!(f, "F"),
            ValueType::Long => write!(f, "J"),
            ValueType::Double => write!(f, "D"),
            ValueType::Long2 => write!(f, "J2"),
            ValueType::Double2 => write!(f, "D2"),
        }
    }
}

/// Which move instruction relocates a register without upsetting the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    Word,
    Wide,
    Object,
    /// Second slot of a wide value. It travels with its primary register,
    /// never on its own.
    WideContinuation,
}

impl MoveKind {
    /// The 16-bit addressing move for this kind.
    pub fn move_opcode(self) -> Option<Opcode> {
        match self {
            MoveKind::Word => Some(Opcode::Move16),
            MoveKind::Wide => Some(Opcode::MoveWide16),
            MoveKind::Object => Some(Opcode::MoveObject16),
            MoveKind::WideContinuation => None,
        }
    }

    /// `dest <- src` using the move for this kind, `None` for the sentinel.
    pub fn build_move(self, dest: Register, src: Register) -> Option<Instruction> {
        self.move_opcode()
            .map(|opcode| Instruction::new(opcode, Operands::RegReg(dest, src)))
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Word => write!(f, "move/16"),
            MoveKind::Wide => write!(f, "move-wide/16"),
            MoveKind::Object => write!(f, "move-object/16"),
            MoveKind::WideContinuation => write!(f, "2"),
        }
    }
}
