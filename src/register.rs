use std::fmt;
use std::str::FromStr;

use nom::branch::alt;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map_res};
use nom::IResult;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegisterKind {
    Local,
    Parameter,
}

/// A Dalvik virtual register as written in smali, `v12` or `p3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Register {
    pub kind: RegisterKind,
    pub number: u32,
}

/// Shorthand for the local register `vN`.
pub fn v(number: u32) -> Register {
    Register { kind: RegisterKind::Local, number }
}

/// Shorthand for the parameter register `pN`.
pub fn p(number: u32) -> Register {
    Register { kind: RegisterKind::Parameter, number }
}

impl Register {
    pub fn is_parameter(&self) -> bool {
        self.kind == RegisterKind::Parameter
    }

    /// The register `k` slots above this one, of the same kind.
    pub fn offset(&self, k: u32) -> Register {
        Register { kind: self.kind, number: self.number + k }
    }
}

/// Translate a parameter register into the local numbering space.
/// Parameters sit directly above the locals, so `pN` is `v(N + locals)`.
pub fn p_to_v(reg: Register, locals_count: u32) -> Register {
    match reg.kind {
        RegisterKind::Parameter => v(reg.number + locals_count),
        RegisterKind::Local => reg,
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RegisterKind::Local => write!(f, "v{}", self.number),
            RegisterKind::Parameter => write!(f, "p{}", self.number),
        }
    }
}

/// Parse a register reference like "v0" or "p1". Dalvik numbers registers
/// with 16 bits, anything larger is rejected.
pub(crate) fn parse_register(input: &str) -> IResult<&str, Register> {
    let (input, t) = alt((char('v'), char('p')))(input)?;
    let (input, num) = map_res(digit1, |s: &str| s.parse::<u16>().map(u32::from))(input)?;
    Ok((input, match t { 'v' => v(num), _ => p(num) }))
}

impl FromStr for Register {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(parse_register)(s.trim())
            .map(|(_, r)| r)
            .map_err(|_| DecodeError::malformed("register", format!("`{s}` is not a register")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        assert_eq!(v(12).to_string(), "v12");
        assert_eq!(p(3).to_string(), "p3");
        assert_eq!("v21".parse::<Register>().unwrap(), v(21));
        assert_eq!("p0".parse::<Register>().unwrap(), p(0));
        assert!("x1".parse::<Register>().is_err());
        assert!("v".parse::<Register>().is_err());
        assert!("v1a".parse::<Register>().is_err());
        assert_eq!("v65535".parse::<Register>().unwrap(), v(65535));
        assert!("v65536".parse::<Register>().is_err());
        assert!("v4294967295".parse::<Register>().is_err());
    }

    #[test]
    fn parameter_to_local() {
        assert_eq!(p_to_v(p(2), 2), v(4));
        assert_eq!(p_to_v(p(0), 5), v(5));
        assert_eq!(p_to_v(p(3), 0), v(3));
        assert_eq!(p_to_v(v(7), 10), v(7));
    }

    #[test]
    fn ordering_is_kind_then_number() {
        assert!(v(1) < v(2));
        assert!(v(100) < p(0));
        assert_eq!(v(4).offset(1), v(5));
        assert_eq!(p(1).offset(1), p(2));
    }
}
