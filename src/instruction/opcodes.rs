//! The opcode catalog. Every supported opcode is one row of the
//! `opcode_table!` invocation below: its smali name, the shape of its
//! operands, how it types registers, which continuation slots it touches,
//! and a few flags the rewriter cares about.

use std::collections::HashMap;

use bitflags::bitflags;
use once_cell::sync::Lazy;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u32 {
        /// Takes a register range and can address any register.
        const RANGE = 0x1;
        /// One of the `/16` and `/from16` moves, whose operands already
        /// reach past the 4/8 bit register window.
        const WIDE_ADDRESSING = 0x2;
        /// Only found in optimised dex output.
        const ODEX_ONLY = 0x4;
    }
}

/// Operand layout of an opcode. `Operands` has one variant per shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    None,
    Reg,
    RegReg,
    RegRegReg,
    RegLit,
    RegRegLit,
    RegString,
    RegType,
    RegRegType,
    RegField,
    RegRegField,
    RegLabel,
    RegRegLabel,
    Label,
    RegRaw,
    RegRegRaw,
    ListType,
    RangeType,
    ListMethod,
    RangeMethod,
    ListProto,
    RangeProto,
    ListRaw,
    RangeRaw,
}

impl Shape {
    pub(crate) fn arity(self) -> usize {
        match self {
            Shape::None => 0,
            Shape::Reg | Shape::Label => 1,
            Shape::RegReg
            | Shape::RegLit
            | Shape::RegString
            | Shape::RegType
            | Shape::RegField
            | Shape::RegLabel
            | Shape::RegRaw
            | Shape::ListType
            | Shape::RangeType
            | Shape::ListMethod
            | Shape::RangeMethod
            | Shape::ListRaw
            | Shape::RangeRaw => 2,
            Shape::RegRegReg
            | Shape::RegRegLit
            | Shape::RegRegType
            | Shape::RegRegField
            | Shape::RegRegLabel
            | Shape::RegRegRaw
            | Shape::ListProto
            | Shape::RangeProto => 3,
        }
    }
}

/// Value carried by the array element or quick field an instruction accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Elem {
    Word,
    Wide,
    Object,
    Boolean,
    Byte,
    Char,
    Short,
}

/// Primitive types named by the conversion opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prim {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
}

/// How an opcode types the registers it writes and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Typing {
    Untracked,
    /// Every register operand is a 32-bit word.
    Word,
    /// Every register operand is an object reference.
    Object,
    /// First register starts a wide value, nothing else is typed.
    WideDest,
    /// Wide sources, word destination.
    WideCompare,
    ConstString,
    /// The register holds an instance of the type operand.
    OfType,
    InstanceOf,
    ArrayLength,
    NewArray,
    FilledNewArray,
    FillArrayData,
    ArrayAccess(Elem),
    InstanceField,
    StaticField,
    Convert(Prim, Prim),
    QuickField(Elem),
}

/// Which explicit registers carry a continuation slot in the next register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Implicit {
    None,
    First,
    Second,
    FirstTwo,
    All,
    Sources,
}

macro_rules! opcode_table {
    ($( $variant:ident = $name:literal, $shape:ident, $typing:expr, $implicit:ident $(, $flag:ident)* ; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $( $variant, )*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }

            pub fn flags(self) -> OpcodeFlags {
                match self {
                    $( Opcode::$variant => OpcodeFlags::empty() $( | OpcodeFlags::$flag )*, )*
                }
            }

            pub(crate) fn shape(self) -> Shape {
                match self {
                    $( Opcode::$variant => Shape::$shape, )*
                }
            }

            pub(crate) fn typing(self) -> Typing {
                use Typing::*;
                match self {
                    $( Opcode::$variant => $typing, )*
                }
            }

            pub(crate) fn implicit(self) -> Implicit {
                match self {
                    $( Opcode::$variant => Implicit::$implicit, )*
                }
            }
        }
    };
}

opcode_table! {
    Nop = "nop", None, Untracked, None;

    Move = "move", RegReg, Word, None;
    MoveFrom16 = "move/from16", RegReg, Word, None, WIDE_ADDRESSING;
    Move16 = "move/16", RegReg, Word, None, WIDE_ADDRESSING;
    MoveWide = "move-wide", RegReg, WideDest, All;
    MoveWideFrom16 = "move-wide/from16", RegReg, WideDest, All, WIDE_ADDRESSING;
    MoveWide16 = "move-wide/16", RegReg, WideDest, All, WIDE_ADDRESSING;
    MoveObject = "move-object", RegReg, Object, None;
    MoveObjectFrom16 = "move-object/from16", RegReg, Object, None, WIDE_ADDRESSING;
    MoveObject16 = "move-object/16", RegReg, Object, None, WIDE_ADDRESSING;
    MoveResult = "move-result", Reg, Word, None;
    MoveResultWide = "move-result-wide", Reg, WideDest, First;
    MoveResultObject = "move-result-object", Reg, Object, None;
    MoveException = "move-exception", Reg, Object, None;

    ReturnVoid = "return-void", None, Untracked, None;
    Return = "return", Reg, Word, None;
    ReturnWide = "return-wide", Reg, WideDest, First;
    ReturnObject = "return-object", Reg, Object, None;

    Const4 = "const/4", RegLit, Word, None;
    Const16 = "const/16", RegLit, Word, None;
    Const = "const", RegLit, Word, None;
    ConstHigh16 = "const/high16", RegLit, Word, None;
    ConstWide16 = "const-wide/16", RegLit, WideDest, First;
    ConstWide32 = "const-wide/32", RegLit, WideDest, First;
    ConstWide = "const-wide", RegLit, WideDest, First;
    ConstWideHigh16 = "const-wide/high16", RegLit, WideDest, First;
    ConstString = "const-string", RegString, ConstString, None;
    ConstStringJumbo = "const-string/jumbo", RegString, ConstString, None;
    ConstClass = "const-class", RegType, Object, None;
    ConstMethodHandle = "const-method-handle", RegRaw, Object, None;
    ConstMethodType = "const-method-type", RegRaw, Object, None;

    MonitorEnter = "monitor-enter", Reg, Untracked, None;
    MonitorExit = "monitor-exit", Reg, Untracked, None;
    CheckCast = "check-cast", RegType, OfType, None;
    InstanceOf = "instance-of", RegRegType, InstanceOf, None;
    ArrayLength = "array-length", RegReg, ArrayLength, None;
    NewInstance = "new-instance", RegType, OfType, None;
    NewArray = "new-array", RegRegType, NewArray, None;
    FilledNewArray = "filled-new-array", ListType, FilledNewArray, None;
    FilledNewArrayRange = "filled-new-array/range", RangeType, FilledNewArray, None, RANGE;
    FillArrayData = "fill-array-data", RegLabel, FillArrayData, None;
    Throw = "throw", Reg, Object, None;

    Goto = "goto", Label, Untracked, None;
    Goto16 = "goto/16", Label, Untracked, None;
    Goto32 = "goto/32", Label, Untracked, None;
    PackedSwitch = "packed-switch", RegLabel, Untracked, None;
    SparseSwitch = "sparse-switch", RegLabel, Untracked, None;

    CmplFloat = "cmpl-float", RegRegReg, Word, None;
    CmpgFloat = "cmpg-float", RegRegReg, Word, None;
    CmplDouble = "cmpl-double", RegRegReg, WideCompare, Sources;
    CmpgDouble = "cmpg-double", RegRegReg, WideCompare, Sources;
    CmpLong = "cmp-long", RegRegReg, WideCompare, Sources;

    IfEq = "if-eq", RegRegLabel, Untracked, None;
    IfNe = "if-ne", RegRegLabel, Untracked, None;
    IfLt = "if-lt", RegRegLabel, Untracked, None;
    IfGe = "if-ge", RegRegLabel, Untracked, None;
    IfGt = "if-gt", RegRegLabel, Untracked, None;
    IfLe = "if-le", RegRegLabel, Untracked, None;
    IfEqz = "if-eqz", RegLabel, Untracked, None;
    IfNez = "if-nez", RegLabel, Untracked, None;
    IfLtz = "if-ltz", RegLabel, Untracked, None;
    IfGez = "if-gez", RegLabel, Untracked, None;
    IfGtz = "if-gtz", RegLabel, Untracked, None;
    IfLez = "if-lez", RegLabel, Untracked, None;

    Aget = "aget", RegRegReg, ArrayAccess(Elem::Word), None;
    AgetWide = "aget-wide", RegRegReg, ArrayAccess(Elem::Wide), First;
    AgetObject = "aget-object", RegRegReg, ArrayAccess(Elem::Object), None;
    AgetBoolean = "aget-boolean", RegRegReg, ArrayAccess(Elem::Boolean), None;
    AgetByte = "aget-byte", RegRegReg, ArrayAccess(Elem::Byte), None;
    AgetChar = "aget-char", RegRegReg, ArrayAccess(Elem::Char), None;
    AgetShort = "aget-short", RegRegReg, ArrayAccess(Elem::Short), None;
    Aput = "aput", RegRegReg, ArrayAccess(Elem::Word), None;
    AputWide = "aput-wide", RegRegReg, ArrayAccess(Elem::Wide), First;
    AputObject = "aput-object", RegRegReg, ArrayAccess(Elem::Object), None;
    AputBoolean = "aput-boolean", RegRegReg, ArrayAccess(Elem::Boolean), None;
    AputByte = "aput-byte", RegRegReg, ArrayAccess(Elem::Byte), None;
    AputChar = "aput-char", RegRegReg, ArrayAccess(Elem::Char), None;
    AputShort = "aput-short", RegRegReg, ArrayAccess(Elem::Short), None;

    Iget = "iget", RegRegField, InstanceField, None;
    IgetWide = "iget-wide", RegRegField, InstanceField, First;
    IgetObject = "iget-object", RegRegField, InstanceField, None;
    IgetBoolean = "iget-boolean", RegRegField, InstanceField, None;
    IgetByte = "iget-byte", RegRegField, InstanceField, None;
    IgetChar = "iget-char", RegRegField, InstanceField, None;
    IgetShort = "iget-short", RegRegField, InstanceField, None;
    Iput = "iput", RegRegField, InstanceField, None;
    IputWide = "iput-wide", RegRegField, InstanceField, First;
    IputObject = "iput-object", RegRegField, InstanceField, None;
    IputBoolean = "iput-boolean", RegRegField, InstanceField, None;
    IputByte = "iput-byte", RegRegField, InstanceField, None;
    IputChar = "iput-char", RegRegField, InstanceField, None;
    IputShort = "iput-short", RegRegField, InstanceField, None;

    Sget = "sget", RegField, StaticField, None;
    SgetWide = "sget-wide", RegField, StaticField, First;
    SgetObject = "sget-object", RegField, StaticField, None;
    SgetBoolean = "sget-boolean", RegField, StaticField, None;
    SgetByte = "sget-byte", RegField, StaticField, None;
    SgetChar = "sget-char", RegField, StaticField, None;
    SgetShort = "sget-short", RegField, StaticField, None;
    Sput = "sput", RegField, StaticField, None;
    SputWide = "sput-wide", RegField, StaticField, First;
    SputObject = "sput-object", RegField, StaticField, None;
    SputBoolean = "sput-boolean", RegField, StaticField, None;
    SputByte = "sput-byte", RegField, StaticField, None;
    SputChar = "sput-char", RegField, StaticField, None;
    SputShort = "sput-short", RegField, StaticField, None;

    InvokeVirtual = "invoke-virtual", ListMethod, Untracked, None;
    InvokeSuper = "invoke-super", ListMethod, Untracked, None;
    InvokeDirect = "invoke-direct", ListMethod, Untracked, None;
    InvokeStatic = "invoke-static", ListMethod, Untracked, None;
    InvokeInterface = "invoke-interface", ListMethod, Untracked, None;
    InvokeVirtualRange = "invoke-virtual/range", RangeMethod, Untracked, None, RANGE;
    InvokeSuperRange = "invoke-super/range", RangeMethod, Untracked, None, RANGE;
    InvokeDirectRange = "invoke-direct/range", RangeMethod, Untracked, None, RANGE;
    InvokeStaticRange = "invoke-static/range", RangeMethod, Untracked, None, RANGE;
    InvokeInterfaceRange = "invoke-interface/range", RangeMethod, Untracked, None, RANGE;
    InvokePolymorphic = "invoke-polymorphic", ListProto, Untracked, None;
    InvokePolymorphicRange = "invoke-polymorphic/range", RangeProto, Untracked, None, RANGE;

    NegInt = "neg-int", RegReg, Word, None;
    NotInt = "not-int", RegReg, Word, None;
    NegLong = "neg-long", RegReg, WideDest, All;
    NotLong = "not-long", RegReg, WideDest, All;
    NegFloat = "neg-float", RegReg, Word, None;
    NegDouble = "neg-double", RegReg, WideDest, All;

    IntToLong = "int-to-long", RegReg, Convert(Prim::Int, Prim::Long), First;
    IntToFloat = "int-to-float", RegReg, Convert(Prim::Int, Prim::Float), None;
    IntToDouble = "int-to-double", RegReg, Convert(Prim::Int, Prim::Double), First;
    LongToInt = "long-to-int", RegReg, Convert(Prim::Long, Prim::Int), Second;
    LongToFloat = "long-to-float", RegReg, Convert(Prim::Long, Prim::Float), Second;
    LongToDouble = "long-to-double", RegReg, Convert(Prim::Long, Prim::Double), All;
    FloatToInt = "float-to-int", RegReg, Convert(Prim::Float, Prim::Int), None;
    FloatToLong = "float-to-long", RegReg, Convert(Prim::Float, Prim::Long), First;
    FloatToDouble = "float-to-double", RegReg, Convert(Prim::Float, Prim::Double), First;
    DoubleToInt = "double-to-int", RegReg, Convert(Prim::Double, Prim::Int), Second;
    DoubleToLong = "double-to-long", RegReg, Convert(Prim::Double, Prim::Long), All;
    DoubleToFloat = "double-to-float", RegReg, Convert(Prim::Double, Prim::Float), Second;
    IntToByte = "int-to-byte", RegReg, Convert(Prim::Int, Prim::Byte), None;
    IntToChar = "int-to-char", RegReg, Convert(Prim::Int, Prim::Char), None;
    IntToShort = "int-to-short", RegReg, Convert(Prim::Int, Prim::Short), None;

    AddInt = "add-int", RegRegReg, Word, None;
    SubInt = "sub-int", RegRegReg, Word, None;
    MulInt = "mul-int", RegRegReg, Word, None;
    DivInt = "div-int", RegRegReg, Word, None;
    RemInt = "rem-int", RegRegReg, Word, None;
    AndInt = "and-int", RegRegReg, Word, None;
    OrInt = "or-int", RegRegReg, Word, None;
    XorInt = "xor-int", RegRegReg, Word, None;
    ShlInt = "shl-int", RegRegReg, Word, None;
    ShrInt = "shr-int", RegRegReg, Word, None;
    UshrInt = "ushr-int", RegRegReg, Word, None;
    AddLong = "add-long", RegRegReg, WideDest, All;
    SubLong = "sub-long", RegRegReg, WideDest, All;
    MulLong = "mul-long", RegRegReg, WideDest, All;
    DivLong = "div-long", RegRegReg, WideDest, All;
    RemLong = "rem-long", RegRegReg, WideDest, All;
    AndLong = "and-long", RegRegReg, WideDest, All;
    OrLong = "or-long", RegRegReg, WideDest, All;
    XorLong = "xor-long", RegRegReg, WideDest, All;
    ShlLong = "shl-long", RegRegReg, WideDest, FirstTwo;
    ShrLong = "shr-long", RegRegReg, WideDest, FirstTwo;
    UshrLong = "ushr-long", RegRegReg, WideDest, FirstTwo;
    AddFloat = "add-float", RegRegReg, Word, None;
    SubFloat = "sub-float", RegRegReg, Word, None;
    MulFloat = "mul-float", RegRegReg, Word, None;
    DivFloat = "div-float", RegRegReg, Word, None;
    RemFloat = "rem-float", RegRegReg, Word, None;
    AddDouble = "add-double", RegRegReg, WideDest, All;
    SubDouble = "sub-double", RegRegReg, WideDest, All;
    MulDouble = "mul-double", RegRegReg, WideDest, All;
    DivDouble = "div-double", RegRegReg, WideDest, All;
    RemDouble = "rem-double", RegRegReg, WideDest, All;

    AddInt2addr = "add-int/2addr", RegReg, Word, None;
    SubInt2addr = "sub-int/2addr", RegReg, Word, None;
    MulInt2addr = "mul-int/2addr", RegReg, Word, None;
    DivInt2addr = "div-int/2addr", RegReg, Word, None;
    RemInt2addr = "rem-int/2addr", RegReg, Word, None;
    AndInt2addr = "and-int/2addr", RegReg, Word, None;
    OrInt2addr = "or-int/2addr", RegReg, Word, None;
    XorInt2addr = "xor-int/2addr", RegReg, Word, None;
    ShlInt2addr = "shl-int/2addr", RegReg, Word, None;
    ShrInt2addr = "shr-int/2addr", RegReg, Word, None;
    UshrInt2addr = "ushr-int/2addr", RegReg, Word, None;
    AddLong2addr = "add-long/2addr", RegReg, WideDest, All;
    SubLong2addr = "sub-long/2addr", RegReg, WideDest, All;
    MulLong2addr = "mul-long/2addr", RegReg, WideDest, All;
    DivLong2addr = "div-long/2addr", RegReg, WideDest, All;
    RemLong2addr = "rem-long/2addr", RegReg, WideDest, All;
    AndLong2addr = "and-long/2addr", RegReg, WideDest, All;
    OrLong2addr = "or-long/2addr", RegReg, WideDest, All;
    XorLong2addr = "xor-long/2addr", RegReg, WideDest, All;
    ShlLong2addr = "shl-long/2addr", RegReg, WideDest, First;
    ShrLong2addr = "shr-long/2addr", RegReg, WideDest, First;
    UshrLong2addr = "ushr-long/2addr", RegReg, WideDest, First;
    AddFloat2addr = "add-float/2addr", RegReg, Word, None;
    SubFloat2addr = "sub-float/2addr", RegReg, Word, None;
    MulFloat2addr = "mul-float/2addr", RegReg, Word, None;
    DivFloat2addr = "div-float/2addr", RegReg, Word, None;
    RemFloat2addr = "rem-float/2addr", RegReg, Word, None;
    AddDouble2addr = "add-double/2addr", RegReg, WideDest, All;
    SubDouble2addr = "sub-double/2addr", RegReg, WideDest, All;
    MulDouble2addr = "mul-double/2addr", RegReg, WideDest, All;
    DivDouble2addr = "div-double/2addr", RegReg, WideDest, All;
    RemDouble2addr = "rem-double/2addr", RegReg, WideDest, All;

    AddIntLit16 = "add-int/lit16", RegRegLit, Word, None;
    RsubInt = "rsub-int", RegRegLit, Word, None;
    MulIntLit16 = "mul-int/lit16", RegRegLit, Word, None;
    DivIntLit16 = "div-int/lit16", RegRegLit, Word, None;
    RemIntLit16 = "rem-int/lit16", RegRegLit, Word, None;
    AndIntLit16 = "and-int/lit16", RegRegLit, Word, None;
    OrIntLit16 = "or-int/lit16", RegRegLit, Word, None;
    XorIntLit16 = "xor-int/lit16", RegRegLit, Word, None;
    AddIntLit8 = "add-int/lit8", RegRegLit, Word, None;
    RsubIntLit8 = "rsub-int/lit8", RegRegLit, Word, None;
    MulIntLit8 = "mul-int/lit8", RegRegLit, Word, None;
    DivIntLit8 = "div-int/lit8", RegRegLit, Word, None;
    RemIntLit8 = "rem-int/lit8", RegRegLit, Word, None;
    AndIntLit8 = "and-int/lit8", RegRegLit, Word, None;
    OrIntLit8 = "or-int/lit8", RegRegLit, Word, None;
    XorIntLit8 = "xor-int/lit8", RegRegLit, Word, None;
    ShlIntLit8 = "shl-int/lit8", RegRegLit, Word, None;
    ShrIntLit8 = "shr-int/lit8", RegRegLit, Word, None;
    UshrIntLit8 = "ushr-int/lit8", RegRegLit, Word, None;

    IgetQuick = "iget-quick", RegRegRaw, QuickField(Elem::Word), None, ODEX_ONLY;
    IgetWideQuick = "iget-wide-quick", RegRegRaw, QuickField(Elem::Wide), First, ODEX_ONLY;
    IgetObjectQuick = "iget-object-quick", RegRegRaw, QuickField(Elem::Object), None, ODEX_ONLY;
    IputQuick = "iput-quick", RegRegRaw, QuickField(Elem::Word), None, ODEX_ONLY;
    IputWideQuick = "iput-wide-quick", RegRegRaw, QuickField(Elem::Wide), First, ODEX_ONLY;
    IputObjectQuick = "iput-object-quick", RegRegRaw, QuickField(Elem::Object), None, ODEX_ONLY;
    InvokeVirtualQuick = "invoke-virtual-quick", ListRaw, Untracked, None, ODEX_ONLY;
    InvokeVirtualQuickRange = "invoke-virtual-quick/range", RangeRaw, Untracked, None, ODEX_ONLY, RANGE;
    InvokeSuperQuick = "invoke-super-quick", ListRaw, Untracked, None, ODEX_ONLY;
    InvokeSuperQuickRange = "invoke-super-quick/range", RangeRaw, Untracked, None, ODEX_ONLY, RANGE;
}

static OPCODE_MAP: Lazy<HashMap<&'static str, Opcode>> =
    Lazy::new(|| Opcode::ALL.iter().map(|op| (op.name(), *op)).collect());

impl Opcode {
    /// Look an opcode up by its smali mnemonic.
    pub fn from_name(name: &str) -> Option<Opcode> {
        OPCODE_MAP.get(name).copied()
    }
}
