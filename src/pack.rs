//! The pack structure: an opcode sequence paired with a sidecar stack.
//!
//! Values that cannot be represented as a 6-bit inline operand (literal
//! nodes, accessor thunks, symbolic names) live on the stack; operands
//! index into it. Packing lowers the opcode sequence to a printable-ASCII
//! string, one character per value at `value + 33`. If the stack is
//! non-empty the payload is an ordered list whose last element is that
//! string and whose preceding elements are the stack entries in order.

use crate::ast::Expression;
use crate::ops::{ReflectionOp, ENCODING_OFFSET, PACK_CEILING};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PackError {
    #[error("value {value} at offset {offset} exceeds the {PACK_CEILING}-value pack ceiling")]
    ValueOutOfRange { value: u32, offset: usize },
    #[error("character {code:?} at offset {offset} is below the encoding offset")]
    MalformedCharacter { code: char, offset: usize },
    #[error("unknown opcode {value} at offset {offset}")]
    UnknownOpcode { value: u32, offset: usize },
    #[error("opcode at offset {offset} is missing {missing} operand byte(s)")]
    TruncatedOperands { offset: usize, missing: usize },
    #[error("stack index {index} at offset {offset} is out of range for stack of {len}")]
    StackIndexOutOfRange {
        index: u32,
        offset: usize,
        len: usize,
    },
}

/// A compile-time value referenced from the opcode stream by stack index.
#[derive(Debug, Clone, PartialEq)]
pub enum StackEntry {
    /// A literal AST node or a zero-argument accessor thunk.
    Expr(Expression),
    /// A plain string used as a symbolic name.
    Name(String),
    /// A plain number used as a symbolic name.
    Number(f64),
}

impl StackEntry {
    pub fn to_expression(&self) -> Expression {
        match self {
            StackEntry::Expr(expr) => expr.clone(),
            StackEntry::Name(name) => Expression::string(name.clone()),
            StackEntry::Number(value) => Expression::number(*value),
        }
    }
}

/// An opcode sequence (with inline operands) plus its sidecar stack.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackStruct {
    pub ops: Vec<u32>,
    pub stack: Vec<StackEntry>,
}

/// The runtime-visible form of a pack structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Bare encoded string; used when the stack is empty.
    Encoded(String),
    /// Stack entries in order, then the encoded string as last element.
    WithStack {
        stack: Vec<StackEntry>,
        encoded: String,
    },
}

impl Payload {
    pub fn encoded(&self) -> &str {
        match self {
            Payload::Encoded(encoded) => encoded,
            Payload::WithStack { encoded, .. } => encoded,
        }
    }

    /// Lower the payload to the expression attached to a carrier: the
    /// encoded string literal alone, or an array literal ending with it.
    pub fn to_expression(&self) -> Expression {
        match self {
            Payload::Encoded(encoded) => Expression::string(encoded.clone()),
            Payload::WithStack { stack, encoded } => {
                let mut elements: Vec<Expression> =
                    stack.iter().map(StackEntry::to_expression).collect();
                elements.push(Expression::string(encoded.clone()));
                Expression::array(elements)
            }
        }
    }
}

/// Encode a pack structure into its runtime payload.
pub fn pack(pack: &PackStruct) -> Result<Payload, PackError> {
    let mut encoded = String::with_capacity(pack.ops.len());
    for (offset, &value) in pack.ops.iter().enumerate() {
        if value >= PACK_CEILING {
            return Err(PackError::ValueOutOfRange { value, offset });
        }
        // value < 64, so the shifted code stays printable ASCII.
        encoded.push(char::from((value + ENCODING_OFFSET) as u8));
    }
    if pack.stack.is_empty() {
        Ok(Payload::Encoded(encoded))
    } else {
        Ok(Payload::WithStack {
            stack: pack.stack.clone(),
            encoded,
        })
    }
}

/// Decode a payload back into a pack structure.
pub fn unpack(payload: &Payload) -> Result<PackStruct, PackError> {
    let (stack, encoded) = match payload {
        Payload::Encoded(encoded) => (Vec::new(), encoded),
        Payload::WithStack { stack, encoded } => (stack.clone(), encoded),
    };
    let mut ops = Vec::with_capacity(encoded.len());
    for (offset, code) in encoded.chars().enumerate() {
        let value = (code as u32)
            .checked_sub(ENCODING_OFFSET)
            .ok_or(PackError::MalformedCharacter { code, offset })?;
        ops.push(value);
    }
    Ok(PackStruct { ops, stack })
}

/// Walk an opcode stream with the opcode-to-arity map, verifying that
/// every value is below the pack ceiling, every opcode is known, every
/// opcode is followed by its declared operand count, and every
/// stack-referencing operand indexes into the stack.
pub fn validate(pack: &PackStruct) -> Result<(), PackError> {
    let mut i = 0;
    while i < pack.ops.len() {
        let offset = i;
        let value = pack.ops[i];
        if value >= PACK_CEILING {
            return Err(PackError::ValueOutOfRange { value, offset });
        }
        let op = ReflectionOp::from_u8(value as u8)
            .ok_or(PackError::UnknownOpcode { value, offset })?;
        let params = op.params();
        let available = pack.ops.len() - 1 - i;
        if available < params {
            return Err(PackError::TruncatedOperands {
                offset,
                missing: params - available,
            });
        }
        for p in 0..params {
            i += 1;
            let operand = pack.ops[i];
            if operand >= PACK_CEILING {
                return Err(PackError::ValueOutOfRange {
                    value: operand,
                    offset: i,
                });
            }
            if p == 0 && op.references_stack() && operand as usize >= pack.stack.len() {
                return Err(PackError::StackIndexOutOfRange {
                    index: operand,
                    offset: i,
                    len: pack.stack.len(),
                });
            }
        }
        i += 1;
    }
    Ok(())
}
