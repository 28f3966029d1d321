use thiserror::Error;

use crate::register::Register;

/// Failure to turn one instruction line into an [`Instruction`](crate::instruction::Instruction).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    #[error("malformed `{opcode}` instruction: {reason}")]
    Malformed { opcode: String, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(opcode: &str, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            opcode: opcode.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while rewriting a method body. Any of these aborts the
/// rewrite of the whole method, a partially rewritten body is never returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrlError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no tracked move type for {register} while rewriting `{instruction}`")]
    UnknownRegisterType {
        register: Register,
        instruction: String,
    },
    #[error("no register in v0..v{limit} can stand in for {register} in `{instruction}`")]
    RegisterRangeExhausted {
        register: Register,
        limit: u32,
        instruction: String,
    },
    #[error("shadow register pool exhausted while rewriting `{instruction}`")]
    ShadowPoolExhausted { instruction: String },
    #[error("malformed method signature `{0}`")]
    Signature(String),
    #[error("method body has no .locals or .registers directive")]
    MissingRegisterDirective,
    #[error("bad register directive `{0}`")]
    RegisterDirective(String),
}

pub type Result<T> = std::result::Result<T, FrlError>;
