//! Method header parsing: `.method public static foo(IJ[Ljava/lang/String;)V`.

use std::collections::BTreeMap;

use nom::bytes::complete::{tag, take_until, take_while1};
use nom::character::complete::{space0, space1};
use nom::combinator::all_consuming;
use nom::multi::many0;
use nom::sequence::{terminated, tuple};
use nom::IResult;

use crate::descriptor::{parse_method_descriptor, slot_count};
use crate::error::FrlError;
use crate::register::{p, Register};
use crate::value_type::ValueType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub modifiers: Vec<String>,
    pub is_static: bool,
    /// Declared parameter descriptors, without the implicit `this`.
    pub parameters: Vec<String>,
    pub return_type: String,
}

fn parse_modifier(input: &str) -> IResult<&str, &str> {
    terminated(take_while1(|c: char| c.is_ascii_lowercase() || c == '-'), space1)(input)
}

fn parse_method_line(input: &str) -> IResult<&str, MethodSignature> {
    let (input, _) = tuple((space0, tag(".method"), space1))(input)?;
    let (input, modifiers) = many0(parse_modifier)(input)?;
    let (input, name) = take_until("(")(input)?;
    let (input, (args, ret)) = parse_method_descriptor(input)?;
    let (input, _) = space0(input)?;

    Ok((input, MethodSignature {
        name: name.trim().to_string(),
        is_static: modifiers.contains(&"static"),
        modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
        parameters: args.iter().map(|a| a.to_string()).collect(),
        return_type: ret.to_string(),
    }))
}

impl MethodSignature {
    pub fn parse(line: &str) -> Result<MethodSignature, FrlError> {
        all_consuming(parse_method_line)(line)
            .map(|(_, sig)| sig)
            .map_err(|_| FrlError::Signature(line.trim().to_string()))
    }

    /// Type of every parameter register on method entry, keyed by `pN`.
    /// `p0` is `this` unless the method is static, wide parameters take
    /// two registers.
    pub fn parameter_type_map(&self) -> BTreeMap<Register, ValueType> {
        let mut map = BTreeMap::new();
        let mut next = 0;
        if !self.is_static {
            map.insert(p(0), ValueType::ObjectRef(None));
            next = 1;
        }
        for descriptor in &self.parameters {
            if let Some(t) = ValueType::from_descriptor(descriptor) {
                if let Some(c) = t.continuation() {
                    map.insert(p(next + 1), c);
                }
                map.insert(p(next), t);
            }
            next += slot_count(descriptor);
        }
        map
    }

    /// Registers the parameters occupy, `this` included.
    pub fn parameter_register_count(&self) -> u32 {
        let this = if self.is_static { 0 } else { 1 };
        this + self.parameters.iter().map(|d| slot_count(d)).sum::<u32>()
    }
}

pub fn parse_signature(line: &str) -> Result<MethodSignature, FrlError> {
    MethodSignature::parse(line)
}
