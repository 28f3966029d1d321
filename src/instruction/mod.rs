//! Decoded smali instructions.
//!
//! An [`Instruction`] is an [`Opcode`] plus the operands its shape calls
//! for. Besides rendering back to text it answers the three questions the
//! register-limit rewriter asks of every line: which registers it names,
//! which continuation slots it touches implicitly, and what each register
//! holds once it has executed.

mod opcodes;
pub(crate) mod operands;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::warn;
use nom::combinator::all_consuming;
use nom::IResult;

use crate::descriptor::{element_descriptor, parse_value_descriptor};
use crate::error::DecodeError;
use crate::line::tokenize;
use crate::register::{parse_register, Register};
use crate::value_type::ValueType;

pub use opcodes::{Opcode, OpcodeFlags};
pub use operands::{FieldRef, Label, Literal, MethodRef, RegisterRange};

pub(crate) use opcodes::{Elem, Implicit, Prim, Shape, Typing};
use operands::{
    parse_field_ref, parse_label, parse_literal, parse_method_ref, parse_proto, parse_register_list,
    parse_register_range, parse_string_literal, RegisterList,
};

/// Operands of an instruction, one variant per operand shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    None,
    Reg(Register),
    RegReg(Register, Register),
    RegRegReg(Register, Register, Register),
    RegLit(Register, Literal),
    RegRegLit(Register, Register, Literal),
    /// String constant, escapes kept as written and quotes dropped.
    RegString(Register, String),
    RegType(Register, String),
    RegRegType(Register, Register, String),
    RegField(Register, FieldRef),
    RegRegField(Register, Register, FieldRef),
    RegLabel(Register, Label),
    RegRegLabel(Register, Register, Label),
    Label(Label),
    /// Method handle, method type or quick offset, kept verbatim.
    RegRaw(Register, String),
    RegRegRaw(Register, Register, String),
    ListType(Vec<Register>, String),
    RangeType(RegisterRange, String),
    ListMethod(Vec<Register>, MethodRef),
    RangeMethod(RegisterRange, MethodRef),
    ListProto(Vec<Register>, MethodRef, String),
    RangeProto(RegisterRange, MethodRef, String),
    ListRaw(Vec<Register>, String),
    RangeRaw(RegisterRange, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Operands,
}

/// Run an operand parser over a whole token.
fn whole<'a, O>(
    opcode: &str,
    what: &str,
    token: &'a str,
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Result<O, DecodeError> {
    all_consuming(parser)(token)
        .map(|(_, o)| o)
        .map_err(|_| DecodeError::malformed(opcode, format!("expected {what}, found `{token}`")))
}

fn reg(opcode: &str, token: &str) -> Result<Register, DecodeError> {
    whole(opcode, "a register", token, parse_register)
}

fn lit(opcode: &str, token: &str) -> Result<Literal, DecodeError> {
    whole(opcode, "an integer literal", token, parse_literal)
}

fn type_desc(opcode: &str, token: &str) -> Result<String, DecodeError> {
    whole(opcode, "a type descriptor", token, parse_value_descriptor).map(str::to_string)
}

fn label(opcode: &str, token: &str) -> Result<Label, DecodeError> {
    whole(opcode, "a label", token, parse_label)
}

fn field(opcode: &str, token: &str) -> Result<FieldRef, DecodeError> {
    whole(opcode, "a field reference", token, parse_field_ref)
}

fn method(opcode: &str, token: &str) -> Result<MethodRef, DecodeError> {
    whole(opcode, "a method reference", token, parse_method_ref)
}

fn list(opcode: &str, token: &str) -> Result<Vec<Register>, DecodeError> {
    whole(opcode, "a register list", token, parse_register_list)
}

fn range(opcode: &str, token: &str) -> Result<RegisterRange, DecodeError> {
    let r = whole(opcode, "a register range", token, parse_register_range)?;
    if r.start.kind != r.end.kind {
        return Err(DecodeError::malformed(opcode, format!("range `{token}` mixes register kinds")));
    }
    if r.end.number < r.start.number {
        return Err(DecodeError::malformed(opcode, format!("range `{token}` runs backwards")));
    }
    Ok(r)
}

fn raw(opcode: &str, token: &str) -> Result<String, DecodeError> {
    if token.is_empty() {
        return Err(DecodeError::malformed(opcode, "empty operand"));
    }
    Ok(token.to_string())
}

/// Type `r` as `t`, and the slot above it as the continuation when `t` is wide.
fn pair(map: &mut BTreeMap<Register, ValueType>, r: Register, t: ValueType) {
    if let Some(c) = t.continuation() {
        map.insert(r.offset(1), c);
    }
    map.insert(r, t);
}

/// Drop wide halves whose partner was overwritten by a later assignment in
/// the same instruction, e.g. the source pair of `long-to-int v0, v0`.
fn settle(map: &mut BTreeMap<Register, ValueType>) {
    let broken: Vec<Register> = map
        .iter()
        .filter(|(r, t)| {
            let above = map.get(&r.offset(1));
            let below = r
                .number
                .checked_sub(1)
                .and_then(|n| map.get(&Register { kind: r.kind, number: n }));
            (t.is_wide() && !above.is_some_and(|c| c.is_continuation()))
                || (t.is_continuation() && !below.is_some_and(|w| w.is_wide()))
        })
        .map(|(r, _)| *r)
        .collect();
    for r in broken {
        map.remove(&r);
    }
}

fn elem_type(elem: Elem) -> ValueType {
    match elem {
        Elem::Word => ValueType::Word32,
        Elem::Wide => ValueType::Wide64Primary,
        Elem::Object => ValueType::ObjectRef(None),
        Elem::Boolean => ValueType::Boolean,
        Elem::Byte => ValueType::Byte,
        Elem::Char => ValueType::Char,
        Elem::Short => ValueType::Short,
    }
}

fn prim_type(prim: Prim) -> ValueType {
    match prim {
        Prim::Int => ValueType::Int,
        Prim::Long => ValueType::Long,
        Prim::Float => ValueType::Float,
        Prim::Double => ValueType::Double,
        Prim::Byte => ValueType::Byte,
        Prim::Char => ValueType::Char,
        Prim::Short => ValueType::Short,
    }
}

/// `ObjectRef` or `Array` for a reference type descriptor.
fn reference_type(descriptor: &str) -> ValueType {
    ValueType::from_descriptor(descriptor).unwrap_or(ValueType::ObjectRef(None))
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Operands) -> Self {
        Instruction { opcode, operands }
    }

    /// Build an instruction from its mnemonic and operand tokens.
    pub fn decode<S: AsRef<str>>(
        opcode_token: &str,
        operand_tokens: &[S],
    ) -> Result<Instruction, DecodeError> {
        let opcode = Opcode::from_name(opcode_token)
            .ok_or_else(|| DecodeError::UnknownOpcode(opcode_token.to_string()))?;
        let shape = opcode.shape();
        if operand_tokens.len() != shape.arity() {
            return Err(DecodeError::malformed(
                opcode_token,
                format!("expected {} operands, found {}", shape.arity(), operand_tokens.len()),
            ));
        }
        if opcode.flags().contains(OpcodeFlags::ODEX_ONLY) {
            warn!("decoding odex-only opcode `{}`", opcode_token);
        }

        let t: Vec<&str> = operand_tokens.iter().map(|s| s.as_ref().trim()).collect();
        let o = opcode_token;
        let operands = match shape {
            Shape::None => Operands::None,
            Shape::Reg => Operands::Reg(reg(o, t[0])?),
            Shape::RegReg => Operands::RegReg(reg(o, t[0])?, reg(o, t[1])?),
            Shape::RegRegReg => Operands::RegRegReg(reg(o, t[0])?, reg(o, t[1])?, reg(o, t[2])?),
            Shape::RegLit => Operands::RegLit(reg(o, t[0])?, lit(o, t[1])?),
            Shape::RegRegLit => Operands::RegRegLit(reg(o, t[0])?, reg(o, t[1])?, lit(o, t[2])?),
            Shape::RegString => {
                let s = whole(o, "a string literal", t[1], parse_string_literal)?;
                Operands::RegString(reg(o, t[0])?, s)
            }
            Shape::RegType => Operands::RegType(reg(o, t[0])?, type_desc(o, t[1])?),
            Shape::RegRegType => {
                Operands::RegRegType(reg(o, t[0])?, reg(o, t[1])?, type_desc(o, t[2])?)
            }
            Shape::RegField => Operands::RegField(reg(o, t[0])?, field(o, t[1])?),
            Shape::RegRegField => {
                Operands::RegRegField(reg(o, t[0])?, reg(o, t[1])?, field(o, t[2])?)
            }
            Shape::RegLabel => Operands::RegLabel(reg(o, t[0])?, label(o, t[1])?),
            Shape::RegRegLabel => {
                Operands::RegRegLabel(reg(o, t[0])?, reg(o, t[1])?, label(o, t[2])?)
            }
            Shape::Label => Operands::Label(label(o, t[0])?),
            Shape::RegRaw => Operands::RegRaw(reg(o, t[0])?, raw(o, t[1])?),
            Shape::RegRegRaw => Operands::RegRegRaw(reg(o, t[0])?, reg(o, t[1])?, raw(o, t[2])?),
            Shape::ListType => Operands::ListType(list(o, t[0])?, type_desc(o, t[1])?),
            Shape::RangeType => Operands::RangeType(range(o, t[0])?, type_desc(o, t[1])?),
            Shape::ListMethod => Operands::ListMethod(list(o, t[0])?, method(o, t[1])?),
            Shape::RangeMethod => Operands::RangeMethod(range(o, t[0])?, method(o, t[1])?),
            Shape::ListProto => Operands::ListProto(
                list(o, t[0])?,
                method(o, t[1])?,
                whole(o, "a prototype", t[2], parse_proto)?.to_string(),
            ),
            Shape::RangeProto => Operands::RangeProto(
                range(o, t[0])?,
                method(o, t[1])?,
                whole(o, "a prototype", t[2], parse_proto)?.to_string(),
            ),
            Shape::ListRaw => Operands::ListRaw(list(o, t[0])?, raw(o, t[1])?),
            Shape::RangeRaw => Operands::RangeRaw(range(o, t[0])?, raw(o, t[1])?),
        };
        Ok(Instruction { opcode, operands })
    }

    /// Tokenize and decode one instruction line.
    pub fn parse(line: &str) -> Result<Instruction, DecodeError> {
        let (opcode, operands) = tokenize(line)?;
        Instruction::decode(&opcode, &operands)
    }

    /// Canonical smali text, without indentation.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// The instruction as a method body line.
    pub fn to_line(&self) -> String {
        format!("    {}", self)
    }

    pub fn flags(&self) -> OpcodeFlags {
        self.opcode.flags()
    }

    /// Range instructions and the `/16` moves already reach every register.
    pub fn is_rewrite_exempt(&self) -> bool {
        self.flags().intersects(OpcodeFlags::RANGE | OpcodeFlags::WIDE_ADDRESSING)
    }

    /// Explicit register operands in the order they are written, ranges expanded.
    pub fn registers(&self) -> Vec<Register> {
        match &self.operands {
            Operands::None | Operands::Label(_) => vec![],
            Operands::Reg(a)
            | Operands::RegLit(a, _)
            | Operands::RegString(a, _)
            | Operands::RegType(a, _)
            | Operands::RegField(a, _)
            | Operands::RegLabel(a, _)
            | Operands::RegRaw(a, _) => vec![*a],
            Operands::RegReg(a, b)
            | Operands::RegRegLit(a, b, _)
            | Operands::RegRegType(a, b, _)
            | Operands::RegRegField(a, b, _)
            | Operands::RegRegLabel(a, b, _)
            | Operands::RegRegRaw(a, b, _) => vec![*a, *b],
            Operands::RegRegReg(a, b, c) => vec![*a, *b, *c],
            Operands::ListType(l, _)
            | Operands::ListMethod(l, _)
            | Operands::ListProto(l, _, _)
            | Operands::ListRaw(l, _) => l.clone(),
            Operands::RangeType(r, _)
            | Operands::RangeMethod(r, _)
            | Operands::RangeProto(r, _, _)
            | Operands::RangeRaw(r, _) => r.expand(),
        }
    }

    /// Explicit registers with duplicates removed, first occurrence kept.
    pub fn unique_registers(&self) -> Vec<Register> {
        let mut out: Vec<Register> = Vec::new();
        for r in self.registers() {
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }

    /// Continuation slots of the wide operands.
    pub fn implicit_registers(&self) -> Vec<Register> {
        let regs = self.registers();
        let picked: Vec<Register> = match self.opcode.implicit() {
            Implicit::None => vec![],
            Implicit::First => regs.iter().take(1).copied().collect(),
            Implicit::Second => regs.iter().skip(1).take(1).copied().collect(),
            Implicit::FirstTwo => regs.iter().take(2).copied().collect(),
            Implicit::All => regs,
            Implicit::Sources => regs.iter().skip(1).copied().collect(),
        };
        picked.iter().map(|r| r.offset(1)).collect()
    }

    /// Explicit then implicit registers, without duplicates.
    pub fn all_registers(&self) -> Vec<Register> {
        let mut out = self.unique_registers();
        for r in self.implicit_registers() {
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }

    /// What each register holds after this instruction. Empty when the
    /// instruction's effect on register types is not tracked.
    pub fn type_implications(&self) -> BTreeMap<Register, ValueType> {
        let mut map = BTreeMap::new();
        let regs = self.registers();
        let Some(&first) = regs.first() else {
            return map;
        };

        match self.opcode.typing() {
            Typing::Untracked => {}
            Typing::Word => {
                for r in &regs {
                    map.insert(*r, ValueType::Word32);
                }
            }
            Typing::Object => {
                for r in &regs {
                    map.insert(*r, ValueType::ObjectRef(None));
                }
            }
            Typing::WideDest => pair(&mut map, first, ValueType::Wide64Primary),
            Typing::WideCompare => {
                for r in regs.iter().skip(1) {
                    pair(&mut map, *r, ValueType::Wide64Primary);
                }
                map.insert(first, ValueType::Word32);
            }
            Typing::ConstString => {
                map.insert(first, ValueType::ObjectRef(Some("Ljava/lang/String;".to_string())));
            }
            Typing::OfType => {
                if let Operands::RegType(_, t) = &self.operands {
                    map.insert(first, reference_type(t));
                }
            }
            Typing::InstanceOf => {
                map.insert(regs[1], ValueType::ObjectRef(None));
                map.insert(first, ValueType::Word32);
            }
            Typing::ArrayLength => {
                map.insert(regs[1], ValueType::Array(None));
                map.insert(first, ValueType::Word32);
            }
            Typing::NewArray => {
                map.insert(regs[1], ValueType::Word32);
                if let Operands::RegRegType(_, _, t) = &self.operands {
                    map.insert(first, reference_type(t));
                }
            }
            Typing::FilledNewArray => {
                let element = match &self.operands {
                    Operands::ListType(_, t) | Operands::RangeType(_, t) => {
                        element_descriptor(t).and_then(ValueType::from_descriptor)
                    }
                    _ => None,
                };
                if let Some(element) = element {
                    for r in &regs {
                        map.insert(*r, element.clone());
                    }
                }
            }
            Typing::FillArrayData => {
                map.insert(first, ValueType::Array(None));
            }
            Typing::ArrayAccess(elem) => {
                map.insert(regs[1], ValueType::Array(None));
                map.insert(regs[2], ValueType::Int);
                pair(&mut map, first, elem_type(elem));
            }
            Typing::InstanceField => {
                if let Operands::RegRegField(_, object, f) = &self.operands {
                    map.insert(*object, reference_type(&f.class));
                    if let Some(t) = ValueType::from_descriptor(&f.descriptor) {
                        pair(&mut map, first, t);
                    }
                }
            }
            Typing::StaticField => {
                if let Operands::RegField(_, f) = &self.operands {
                    if let Some(t) = ValueType::from_descriptor(&f.descriptor) {
                        pair(&mut map, first, t);
                    }
                }
            }
            Typing::Convert(from, to) => {
                pair(&mut map, regs[1], prim_type(from));
                pair(&mut map, first, prim_type(to));
            }
            Typing::QuickField(elem) => {
                map.insert(regs[1], ValueType::ObjectRef(None));
                pair(&mut map, first, elem_type(elem));
            }
        }
        settle(&mut map);
        map
    }

    /// Copy of this instruction with registers substituted through `mapping`.
    /// Registers missing from the mapping stay as they are.
    pub fn rename(&self, mapping: &HashMap<Register, Register>) -> Instruction {
        let m = |r: &Register| *mapping.get(r).unwrap_or(r);
        let ml = |l: &[Register]| l.iter().map(m).collect::<Vec<_>>();
        let mr = |r: &RegisterRange| RegisterRange { start: m(&r.start), end: m(&r.end) };

        let operands = match &self.operands {
            Operands::None => Operands::None,
            Operands::Reg(a) => Operands::Reg(m(a)),
            Operands::RegReg(a, b) => Operands::RegReg(m(a), m(b)),
            Operands::RegRegReg(a, b, c) => Operands::RegRegReg(m(a), m(b), m(c)),
            Operands::RegLit(a, l) => Operands::RegLit(m(a), l.clone()),
            Operands::RegRegLit(a, b, l) => Operands::RegRegLit(m(a), m(b), l.clone()),
            Operands::RegString(a, s) => Operands::RegString(m(a), s.clone()),
            Operands::RegType(a, t) => Operands::RegType(m(a), t.clone()),
            Operands::RegRegType(a, b, t) => Operands::RegRegType(m(a), m(b), t.clone()),
            Operands::RegField(a, f) => Operands::RegField(m(a), f.clone()),
            Operands::RegRegField(a, b, f) => Operands::RegRegField(m(a), m(b), f.clone()),
            Operands::RegLabel(a, l) => Operands::RegLabel(m(a), l.clone()),
            Operands::RegRegLabel(a, b, l) => Operands::RegRegLabel(m(a), m(b), l.clone()),
            Operands::Label(l) => Operands::Label(l.clone()),
            Operands::RegRaw(a, s) => Operands::RegRaw(m(a), s.clone()),
            Operands::RegRegRaw(a, b, s) => Operands::RegRegRaw(m(a), m(b), s.clone()),
            Operands::ListType(l, t) => Operands::ListType(ml(l), t.clone()),
            Operands::RangeType(r, t) => Operands::RangeType(mr(r), t.clone()),
            Operands::ListMethod(l, mref) => Operands::ListMethod(ml(l), mref.clone()),
            Operands::RangeMethod(r, mref) => Operands::RangeMethod(mr(r), mref.clone()),
            Operands::ListProto(l, mref, p) => Operands::ListProto(ml(l), mref.clone(), p.clone()),
            Operands::RangeProto(r, mref, p) => {
                Operands::RangeProto(mr(r), mref.clone(), p.clone())
            }
            Operands::ListRaw(l, s) => Operands::ListRaw(ml(l), s.clone()),
            Operands::RangeRaw(r, s) => Operands::RangeRaw(mr(r), s.clone()),
        };
        Instruction { opcode: self.opcode, operands }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode.name();
        match &self.operands {
            Operands::None => write!(f, "{}", name),
            Operands::Reg(a) => write!(f, "{} {}", name, a),
            Operands::RegReg(a, b) => write!(f, "{} {}, {}", name, a, b),
            Operands::RegRegReg(a, b, c) => write!(f, "{} {}, {}, {}", name, a, b, c),
            Operands::RegLit(a, l) => write!(f, "{} {}, {}", name, a, l),
            Operands::RegRegLit(a, b, l) => write!(f, "{} {}, {}, {}", name, a, b, l),
            Operands::RegString(a, s) => write!(f, "{} {}, \"{}\"", name, a, s),
            Operands::RegType(a, t) => write!(f, "{} {}, {}", name, a, t),
            Operands::RegRegType(a, b, t) => write!(f, "{} {}, {}, {}", name, a, b, t),
            Operands::RegField(a, fr) => write!(f, "{} {}, {}", name, a, fr),
            Operands::RegRegField(a, b, fr) => write!(f, "{} {}, {}, {}", name, a, b, fr),
            Operands::RegLabel(a, l) => write!(f, "{} {}, {}", name, a, l),
            Operands::RegRegLabel(a, b, l) => write!(f, "{} {}, {}, {}", name, a, b, l),
            Operands::Label(l) => write!(f, "{} {}", name, l),
            Operands::RegRaw(a, s) => write!(f, "{} {}, {}", name, a, s),
            Operands::RegRegRaw(a, b, s) => write!(f, "{} {}, {}, {}", name, a, b, s),
            Operands::ListType(l, t) => write!(f, "{} {}, {}", name, RegisterList(l), t),
            Operands::RangeType(r, t) => write!(f, "{} {}, {}", name, r, t),
            Operands::ListMethod(l, m) => write!(f, "{} {}, {}", name, RegisterList(l), m),
            Operands::RangeMethod(r, m) => write!(f, "{} {}, {}", name, r, m),
            Operands::ListProto(l, m, p) => write!(f, "{} {}, {}, {}", name, RegisterList(l), m, p),
            Operands::RangeProto(r, m, p) => write!(f, "{} {}, {}, {}", name, r, m, p),
            Operands::ListRaw(l, s) => write!(f, "{} {}, {}", name, RegisterList(l), s),
            Operands::RangeRaw(r, s) => write!(f, "{} {}, {}", name, r, s),
        }
    }
}
