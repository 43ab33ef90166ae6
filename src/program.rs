//! The compiler program: a mutable builder for one carrier's bytecode.
//!
//! A program owns the main opcode buffer, the shared sidecar stack, a
//! stack of open coroutines, the completed coroutines awaiting placement,
//! and the chain of lexical frames. One program is created per rewritten
//! carrier, populated by one walker invocation, finalized once into a
//! [`PackStruct`], and discarded.
//!
//! Frames follow the source syntactic structure in strict LIFO order.
//! While a coroutine is open it receives all pushed ops; the main buffer
//! receives them otherwise. Completed coroutines are prepended to the
//! final program behind a `jump` over them to the main-program offset.

use crate::ops::ReflectionOp;
use crate::pack::{PackStruct, StackEntry};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProgramError {
    #[error("frame popped with no open frame")]
    FrameUnderflow,
    #[error("coroutine closed with no open coroutine")]
    CoRoutineUnderflow,
    #[error("coroutine closed with {open} frame(s) still open inside it")]
    UnbalancedCoRoutineFrames { open: usize },
    #[error("program finalized with {open} coroutine(s) still open")]
    UnclosedCoRoutine { open: usize },
    #[error("program finalized with {open} frame(s) still open")]
    UnbalancedFrames { open: usize },
}

/// A lexical scope. `buffer` identifies the opcode buffer the frame was
/// opened in (0 is the main buffer, `n` the n-th open coroutine), and
/// `op_index` the position in that buffer where late `var` ops are
/// spliced in.
#[derive(Debug)]
struct Frame {
    buffer: usize,
    op_index: usize,
    variables: Vec<String>,
    conditional: bool,
}

/// Resolved variable reference: hops outward from the current frame, and
/// the index within the target frame's variable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRef {
    pub frame_offset: u32,
    pub index: u32,
}

#[derive(Debug)]
pub struct CompilerProgram {
    main: Vec<u32>,
    stack: Vec<StackEntry>,
    open_coroutines: Vec<Vec<u32>>,
    completed_coroutines: Vec<Vec<u32>>,
    frames: Vec<Frame>,
    /// Absolute index at which the main program begins once coroutines
    /// are prepended. Starts at 2, reserving room for `jump, mainOffset`.
    main_offset: usize,
}

impl Default for CompilerProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerProgram {
    pub fn new() -> Self {
        Self {
            main: Vec::new(),
            stack: Vec::new(),
            open_coroutines: Vec::new(),
            completed_coroutines: Vec::new(),
            frames: vec![Frame {
                buffer: 0,
                op_index: 0,
                variables: Vec::new(),
                conditional: false,
            }],
            main_offset: 2,
        }
    }

    fn active_buffer_id(&self) -> usize {
        self.open_coroutines.len()
    }

    fn buffer_mut(&mut self, id: usize) -> &mut Vec<u32> {
        if id == 0 {
            &mut self.main
        } else {
            &mut self.open_coroutines[id - 1]
        }
    }

    fn active_buffer_mut(&mut self) -> &mut Vec<u32> {
        let id = self.active_buffer_id();
        self.buffer_mut(id)
    }

    /// Whether the active buffer has received any ops yet.
    pub fn is_empty(&self) -> bool {
        match self.open_coroutines.last() {
            Some(coroutine) => coroutine.is_empty(),
            None => self.main.is_empty(),
        }
    }

    /// The main buffer, before coroutine placement. Exposed for tests and
    /// diagnostics.
    pub fn main_ops(&self) -> &[u32] {
        &self.main
    }

    pub fn main_offset(&self) -> usize {
        self.main_offset
    }

    // -------------------------------------------------------------------------
    // Op and stack pushes
    // -------------------------------------------------------------------------

    pub fn push_op(&mut self, op: ReflectionOp) {
        self.active_buffer_mut().push(op as u32);
    }

    pub fn push_op1(&mut self, op: ReflectionOp, operand: u32) {
        let buffer = self.active_buffer_mut();
        buffer.push(op as u32);
        buffer.push(operand);
    }

    pub fn push_op2(&mut self, op: ReflectionOp, a: u32, b: u32) {
        let buffer = self.active_buffer_mut();
        buffer.push(op as u32);
        buffer.push(a);
        buffer.push(b);
    }

    pub fn push_stack(&mut self, entry: StackEntry) -> u32 {
        self.stack.push(entry);
        (self.stack.len() - 1) as u32
    }

    /// Linear-scan deduplication; names and constants that recur share
    /// one stack slot.
    pub fn find_or_add_stack_entry(&mut self, entry: StackEntry) -> u32 {
        if let Some(index) = self.stack.iter().position(|e| *e == entry) {
            return index as u32;
        }
        self.push_stack(entry)
    }

    // -------------------------------------------------------------------------
    // Frames
    // -------------------------------------------------------------------------

    /// Open a lexical frame. The `frame` op is suppressed when the active
    /// buffer is still empty: the runtime enters every program with a
    /// fresh frame, so a leading `frame` would be redundant.
    pub fn push_frame(&mut self) {
        let id = self.active_buffer_id();
        if !self.buffer_mut(id).is_empty() {
            self.push_op(ReflectionOp::Frame);
        }
        let op_index = self.buffer_mut(id).len();
        self.frames.push(Frame {
            buffer: id,
            op_index,
            variables: Vec::new(),
            conditional: false,
        });
    }

    /// Open a frame without ever emitting a `frame` op; used by the
    /// coroutine calling convention, which reserves one.
    fn push_frame_implicit(&mut self) {
        let id = self.active_buffer_id();
        let op_index = self.buffer_mut(id).len();
        self.frames.push(Frame {
            buffer: id,
            op_index,
            variables: Vec::new(),
            conditional: false,
        });
    }

    /// Open the frame for the immediate lexical scope of a conditional
    /// type's `extends` clause; `infer` bindings land here.
    pub fn push_conditional_frame(&mut self) {
        self.push_frame();
        if let Some(frame) = self.frames.last_mut() {
            frame.conditional = true;
        }
    }

    pub fn pop_frame(&mut self) -> Result<(), ProgramError> {
        if self.frames.len() <= 1 {
            return Err(ProgramError::FrameUnderflow);
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of currently open frames, excluding the program root.
    pub fn open_frames(&self) -> usize {
        self.frames.len() - 1
    }

    /// Absolute index of the current frame, for use with
    /// [`Self::push_variable_at`].
    pub fn current_frame(&self) -> usize {
        self.frames.len() - 1
    }

    /// Absolute index of the nearest enclosing conditional frame.
    pub fn find_conditional_frame(&self) -> Option<usize> {
        self.frames.iter().rposition(|f| f.conditional)
    }

    pub fn frame_offset_of(&self, frame_index: usize) -> u32 {
        (self.frames.len() - 1 - frame_index) as u32
    }

    // -------------------------------------------------------------------------
    // Variables
    // -------------------------------------------------------------------------

    /// Splice an op at the opening of the given frame. Later frames in
    /// the same buffer have their splice points shifted accordingly.
    pub fn push_op_at_frame(&mut self, frame_index: usize, op: ReflectionOp) {
        let (buffer_id, insert_at) = {
            let frame = &self.frames[frame_index];
            (frame.buffer, frame.op_index)
        };
        self.buffer_mut(buffer_id).insert(insert_at, op as u32);
        for (index, frame) in self.frames.iter_mut().enumerate() {
            if index != frame_index && frame.buffer == buffer_id && frame.op_index > insert_at {
                frame.op_index += 1;
            }
        }
    }

    /// Bind a variable in the current frame, inserting its `var` op at
    /// the frame opening.
    pub fn push_variable(&mut self, name: impl Into<String>) -> u32 {
        let current = self.current_frame();
        self.push_variable_at(current, name)
    }

    /// Bind a variable in an enclosing frame. Used when an `infer`
    /// binding is discovered mid-scope: the `var` op is spliced at the
    /// opening of the conditional frame, however deep the reference.
    pub fn push_variable_at(&mut self, frame_index: usize, name: impl Into<String>) -> u32 {
        self.push_op_at_frame(frame_index, ReflectionOp::Var);
        let variables = &mut self.frames[frame_index].variables;
        variables.push(name.into());
        (variables.len() - 1) as u32
    }

    /// Emit `template, nameIndex` and bind the name in the current frame.
    /// Used at entry to a generic declaration.
    pub fn push_template_parameter(&mut self, name: &str) -> u32 {
        let name_index = self.find_or_add_stack_entry(StackEntry::Name(name.to_string()));
        self.push_op1(ReflectionOp::Template, name_index);
        let current = self.current_frame();
        let variables = &mut self.frames[current].variables;
        variables.push(name.to_string());
        (variables.len() - 1) as u32
    }

    /// Resolve a name against the frame chain, walking outward.
    pub fn find_variable(&self, name: &str) -> Option<VariableRef> {
        for (hops, frame) in self.frames.iter().rev().enumerate() {
            if let Some(index) = frame.variables.iter().position(|v| v == name) {
                return Some(VariableRef {
                    frame_offset: hops as u32,
                    index: index as u32,
                });
            }
        }
        None
    }

    /// Look up a name within one specific frame.
    pub fn variable_in_frame(&self, frame_index: usize, name: &str) -> Option<u32> {
        self.frames[frame_index]
            .variables
            .iter()
            .position(|v| v == name)
            .map(|i| i as u32)
    }

    // -------------------------------------------------------------------------
    // Coroutines
    // -------------------------------------------------------------------------

    /// Open an inline subprogram. Subsequent pushes target its buffer.
    /// The implicit frame carries no `frame` op: the calling convention
    /// reserves one at each invocation.
    pub fn push_coroutine(&mut self) {
        self.open_coroutines.push(Vec::new());
        self.push_frame_implicit();
    }

    /// Close the top coroutine: terminate it with `return`, record it for
    /// prepending, and return the absolute offset at which it will live
    /// in the finalized program.
    pub fn pop_coroutine(&mut self) -> Result<u32, ProgramError> {
        if self.open_coroutines.is_empty() {
            return Err(ProgramError::CoRoutineUnderflow);
        }
        let id = self.active_buffer_id();
        let inner = self.frames.iter().filter(|f| f.buffer == id).count();
        if inner != 1 {
            return Err(ProgramError::UnbalancedCoRoutineFrames {
                open: inner.saturating_sub(1),
            });
        }
        self.frames.pop();
        self.push_op(ReflectionOp::Return);
        let buffer = match self.open_coroutines.pop() {
            Some(buffer) => buffer,
            None => return Err(ProgramError::CoRoutineUnderflow),
        };
        let offset = self.main_offset;
        self.main_offset += buffer.len();
        self.completed_coroutines.push(buffer);
        Ok(offset as u32)
    }

    // -------------------------------------------------------------------------
    // Finalization
    // -------------------------------------------------------------------------

    /// Assemble the final pack structure: completed coroutines in
    /// original order, then the main program, with a leading
    /// `jump, mainOffset` so execution skips the coroutines. Programs
    /// without coroutines carry no prelude.
    pub fn build_pack_struct(self) -> Result<PackStruct, ProgramError> {
        if !self.open_coroutines.is_empty() {
            return Err(ProgramError::UnclosedCoRoutine {
                open: self.open_coroutines.len(),
            });
        }
        if self.frames.len() != 1 {
            return Err(ProgramError::UnbalancedFrames {
                open: self.frames.len() - 1,
            });
        }
        let CompilerProgram {
            main,
            stack,
            completed_coroutines,
            main_offset,
            ..
        } = self;
        let ops = if completed_coroutines.is_empty() {
            main
        } else {
            let mut ops = Vec::with_capacity(main_offset + main.len());
            ops.push(ReflectionOp::Jump as u32);
            ops.push(main_offset as u32);
            for coroutine in completed_coroutines {
                ops.extend(coroutine);
            }
            ops.extend(main);
            ops
        };
        Ok(PackStruct { ops, stack })
    }
}
