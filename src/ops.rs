//! The type-bytecode instruction set and its wire encoding.
//!
//! Programs are sequences of opcodes with inline integer operands. The
//! runtime executes them on a value stack to reconstruct the static type of
//! a carrier. Every opcode and every operand is packed into one byte of a
//! printable-ASCII string, which caps the alphabet at 64 distinct values
//! (`PACK_CEILING`); the opcode set is closed and occupies exactly that
//! space. Decoding is opcode-directed: each opcode has a fixed operand
//! count, so an operand byte is never mistaken for an opcode.

/// Offset added to every packed value so the payload stays printable and
/// source-safe. `33` is `'!'`, the first printable non-space character.
pub const ENCODING_OFFSET: u32 = 33;

/// Exclusive upper bound for packable values: opcodes, stack indices,
/// frame coordinates and jump offsets all share this 6-bit space.
pub const PACK_CEILING: u32 = 64;

// =============================================================================
// ReflectionOp - the closed instruction set
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReflectionOp {
    // primitive types
    Never = 0,
    Any = 1,
    Void = 2,
    String = 3,
    Number = 4,
    NumberBrand = 5,
    Boolean = 6,
    Bigint = 7,
    Null = 8,
    Undefined = 9,

    // literal types
    Literal = 10,

    // structural builders
    Class = 11,
    ObjectLiteral = 12,
    Array = 13,
    Set = 14,
    Map = 15,

    // members
    Property = 16,
    PropertySignature = 17,
    Method = 18,
    MethodSignature = 19,
    Function = 20,
    Parameter = 21,
    IndexSignature = 22,

    // member modifiers, consumed as a trailing decoration train
    Optional = 23,
    Readonly = 24,
    Public = 25,
    Private = 26,
    Protected = 27,
    Abstract = 28,
    DefaultValue = 29,
    Description = 30,

    // algebraic combinators
    Union = 31,
    Intersection = 32,

    // generics and references
    Template = 33,
    ClassReference = 34,
    Inline = 35,
    InlineCall = 36,
    Loads = 37,
    Var = 38,
    Pointer = 39,
    Arg = 40,

    // conditional types and inference
    Extends = 41,
    Condition = 42,
    Infer = 43,
    JumpCondition = 44,
    Jump = 45,

    // mapped types
    MappedType = 46,

    // type operators
    Keyof = 47,
    Query = 48,

    // control
    Frame = 49,
    Return = 50,
    Call = 51,

    // references to live runtime bindings
    Enum = 52,

    // well-known classes
    Date = 53,
    Promise = 54,
    ArrayBuffer = 55,
    Int8Array = 56,
    Uint8Array = 57,
    Int16Array = 58,
    Uint16Array = 59,
    Int32Array = 60,
    Uint32Array = 61,
    Float32Array = 62,
    Float64Array = 63,
}

impl ReflectionOp {
    /// Number of inline operand bytes following this opcode.
    pub const fn params(self) -> usize {
        use ReflectionOp::*;
        match self {
            Literal | Pointer | Arg | ClassReference | PropertySignature | Property | Jump
            | Enum | Template | Call | Inline | DefaultValue | Parameter | Method
            | MethodSignature | Function | Description | NumberBrand => 1,
            MappedType | InlineCall | Loads | Infer => 2,
            _ => 0,
        }
    }

    /// Whether the single operand indexes the pack's sidecar stack.
    pub const fn references_stack(self) -> bool {
        use ReflectionOp::*;
        matches!(
            self,
            Literal
                | ClassReference
                | PropertySignature
                | Property
                | Enum
                | Template
                | Inline
                | DefaultValue
                | Parameter
                | Method
                | MethodSignature
                | Function
                | Description
        )
    }

    /// All opcodes in discriminant order. Discriminants are dense over
    /// `0..PACK_CEILING`.
    pub const ALL: [ReflectionOp; PACK_CEILING as usize] = {
        use ReflectionOp::*;
        [
            Never,
            Any,
            Void,
            String,
            Number,
            NumberBrand,
            Boolean,
            Bigint,
            Null,
            Undefined,
            Literal,
            Class,
            ObjectLiteral,
            Array,
            Set,
            Map,
            Property,
            PropertySignature,
            Method,
            MethodSignature,
            Function,
            Parameter,
            IndexSignature,
            Optional,
            Readonly,
            Public,
            Private,
            Protected,
            Abstract,
            DefaultValue,
            Description,
            Union,
            Intersection,
            Template,
            ClassReference,
            Inline,
            InlineCall,
            Loads,
            Var,
            Pointer,
            Arg,
            Extends,
            Condition,
            Infer,
            JumpCondition,
            Jump,
            MappedType,
            Keyof,
            Query,
            Frame,
            Return,
            Call,
            Enum,
            Date,
            Promise,
            ArrayBuffer,
            Int8Array,
            Uint8Array,
            Int16Array,
            Uint16Array,
            Int32Array,
            Uint32Array,
            Float32Array,
            Float64Array,
        ]
    };

    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as u32) < PACK_CEILING {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        use ReflectionOp::*;
        match self {
            Never => "never",
            Any => "any",
            Void => "void",
            String => "string",
            Number => "number",
            NumberBrand => "numberBrand",
            Boolean => "boolean",
            Bigint => "bigint",
            Null => "null",
            Undefined => "undefined",
            Literal => "literal",
            Class => "class",
            ObjectLiteral => "objectLiteral",
            Array => "array",
            Set => "set",
            Map => "map",
            Property => "property",
            PropertySignature => "propertySignature",
            Method => "method",
            MethodSignature => "methodSignature",
            Function => "function",
            Parameter => "parameter",
            IndexSignature => "indexSignature",
            Optional => "optional",
            Readonly => "readonly",
            Public => "public",
            Private => "private",
            Protected => "protected",
            Abstract => "abstract",
            DefaultValue => "defaultValue",
            Description => "description",
            Union => "union",
            Intersection => "intersection",
            Template => "template",
            ClassReference => "classReference",
            Inline => "inline",
            InlineCall => "inlineCall",
            Loads => "loads",
            Var => "var",
            Pointer => "pointer",
            Arg => "arg",
            Extends => "extends",
            Condition => "condition",
            Infer => "infer",
            JumpCondition => "jumpCondition",
            Jump => "jump",
            MappedType => "mappedType",
            Keyof => "keyof",
            Query => "query",
            Frame => "frame",
            Return => "return",
            Call => "call",
            Enum => "enum",
            Date => "date",
            Promise => "promise",
            ArrayBuffer => "arrayBuffer",
            Int8Array => "int8Array",
            Uint8Array => "uint8Array",
            Int16Array => "int16Array",
            Uint16Array => "uint16Array",
            Int32Array => "int32Array",
            Uint32Array => "uint32Array",
            Float32Array => "float32Array",
            Float64Array => "float64Array",
        }
    }
}

// =============================================================================
// Operand value spaces
// =============================================================================

/// Brand values carried by the `numberBrand` op, distinguishing the
/// integer and float refinements of `number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NumberBrand {
    Integer = 0,
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Float = 7,
    Float32 = 8,
    Float64 = 9,
}

impl NumberBrand {
    /// The type-reference name spelling of a brand, if any.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "integer" => NumberBrand::Integer,
            "int8" => NumberBrand::Int8,
            "uint8" => NumberBrand::Uint8,
            "int16" => NumberBrand::Int16,
            "uint16" => NumberBrand::Uint16,
            "int32" => NumberBrand::Int32,
            "uint32" => NumberBrand::Uint32,
            "float" => NumberBrand::Float,
            "float32" => NumberBrand::Float32,
            "float64" => NumberBrand::Float64,
            _ => return None,
        })
    }
}

/// Modifier bitset carried by the second operand of `mappedType`.
pub mod mapped_modifier {
    pub const OPTIONAL: u32 = 1;
    pub const REMOVE_OPTIONAL: u32 = 2;
    pub const READONLY: u32 = 4;
    pub const REMOVE_READONLY: u32 = 8;
}

// =============================================================================
// Disassembler
// =============================================================================

/// Render an opcode stream as a mnemonic listing, one instruction per
/// line with its inline operands. Unknown or truncated bytes are rendered
/// as `?<value>` so a broken stream is still inspectable.
pub fn disasm(ops: &[u32]) -> std::string::String {
    let mut out = std::string::String::new();
    let mut i = 0;
    while i < ops.len() {
        if !out.is_empty() {
            out.push('\n');
        }
        match u8::try_from(ops[i]).ok().and_then(ReflectionOp::from_u8) {
            Some(op) => {
                out.push_str(op.mnemonic());
                for _ in 0..op.params() {
                    i += 1;
                    match ops.get(i) {
                        Some(operand) => out.push_str(&format!(" {operand}")),
                        None => out.push_str(" ?"),
                    }
                }
            }
            None => out.push_str(&format!("?{}", ops[i])),
        }
        i += 1;
    }
    out
}
