//! Reference interpreter for Orion++ IR.
//!
//! A [`Vm`] moves through a small state machine — `Fresh` (holding an
//! unchecked [`Module`]) → `Loaded` (validated, label table built) →
//! `Running` → `Halted`/`Faulted` — mirroring the load/prepare/execute
//! split of the container format: `Module::from_bytes` is the load phase,
//! [`Vm::prepare`] is the prepare phase, [`Vm::run`] is execute.
//!
//! Variables live in one flat, monotonically-allocated id space shared by
//! every function in the module (the lowering crate never reuses an id
//! across function boundaries), so the interpreter needs only a single
//! `BTreeMap<u32, Option<VmValue>>` rather than per-frame variable windows.
//! Each slot holds either an integer or an owned string, with pointers
//! carried as the integer they decay to. A call frame records only the
//! return program counter and the caller's destination variable for the
//! callee's result.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, string::ToString, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, string::ToString, vec::Vec};

use orion_core::{OrionError, OrionResult};
use orion_ir::{Feature, Instruction, IsaOp, Module, Opcode, Value};

/// How much of the static validator runs during [`Vm::prepare`], threaded
/// from the `orionppvm` CLI's `--validation-level` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValidationLevel {
    /// Trust the module as-is; only the label pre-pass runs.
    Skip = 0,
    /// Feature-gating, opcode decodability, and label uniqueness.
    Structural = 1,
    /// Structural, plus rejecting string/array/raw operands anywhere an
    /// integer operand is required.
    TypeCheck = 2,
    /// Type-checked, plus static `SCOPE`/`SCOPL` balance.
    Strict = 3,
}

impl Default for ValidationLevel {
    fn default() -> Self {
        Self::Structural
    }
}

/// Safety caps and behavioral switches for a [`Vm`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Upper bound on live-variable memory, in bytes (8 bytes/slot).
    /// Defaults to 16 MiB.
    pub memory_limit_bytes: u64,
    /// Upper bound on nested `CALL` depth. Defaults to 1000.
    pub call_depth_limit: u32,
    /// When set, `LEA` is rejected and unbalanced `SCOPE`/`SCOPL` pairs are
    /// a fault instead of a silent no-op at runtime.
    pub strict: bool,
    /// How much static validation [`Vm::prepare`] performs.
    pub validation_level: ValidationLevel,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 16 * 1024 * 1024,
            call_depth_limit: 1000,
            strict: false,
            validation_level: ValidationLevel::default(),
        }
    }
}

/// The interpreter's run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Constructed, not yet prepared.
    Fresh,
    /// Validated and label-indexed; ready to run.
    Loaded,
    /// Currently executing.
    Running,
    /// Finished normally; carries the top-level return value.
    Halted,
    /// Stopped on an error.
    Faulted,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    return_pc: usize,
    dest_var: u32,
}

/// A variable's stored content: the integer/owned-string/pointer union a
/// VM variable carries, with pointers represented as the integer they
/// decay to.
#[derive(Debug, Clone, PartialEq)]
enum VmValue {
    /// A plain integer, or a pointer/label id reduced to its bit pattern.
    Int(i64),
    /// An owned, heap-allocated string — the only builtin that produces
    /// one today is `print`'s string-literal argument.
    Str(String),
}

impl VmValue {
    fn as_int(&self) -> OrionResult<i64> {
        match self {
            VmValue::Int(v) => Ok(*v),
            VmValue::Str(_) => Err(OrionError::TypeMismatch),
        }
    }
}

/// A loaded, runnable Orion++ module.
pub struct Vm {
    module: Module,
    options: VmOptions,
    state: VmState,
    variables: BTreeMap<u32, Option<VmValue>>,
    labels: BTreeMap<u32, usize>,
    call_stack: Vec<Frame>,
    scope_depth: u32,
    pc: usize,
}

enum Flow {
    Advance,
    Jump(usize),
    Halt(i64),
}

impl Vm {
    /// Wraps a module without validating it yet.
    pub fn new(module: Module, options: VmOptions) -> Self {
        Self {
            module,
            options,
            state: VmState::Fresh,
            variables: BTreeMap::new(),
            labels: BTreeMap::new(),
            call_stack: Vec::new(),
            scope_depth: 0,
            pc: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> VmState {
        self.state
    }

    /// Validates the module and builds the label table. Must be called
    /// before [`Vm::run`].
    #[cfg_attr(feature = "std", tracing::instrument(skip(self), fields(instructions = self.module.instructions.len())))]
    pub fn prepare(&mut self) -> OrionResult<()> {
        if self.options.validation_level != ValidationLevel::Skip {
            self.module.validate()?;
        }
        self.labels = self.module.label_indices()?;
        if self.options.validation_level >= ValidationLevel::TypeCheck {
            self.check_types()?;
        }
        if self.options.validation_level == ValidationLevel::Strict {
            self.check_balanced_scopes()?;
        }
        self.state = VmState::Loaded;
        tracing::debug!(labels = self.labels.len(), "module prepared");
        Ok(())
    }

    /// Returns to `Fresh`, clearing all runtime state so the same loaded
    /// module can be prepared and run again from scratch.
    pub fn reset(&mut self) {
        self.variables.clear();
        self.labels.clear();
        self.call_stack.clear();
        self.scope_depth = 0;
        self.pc = 0;
        self.state = VmState::Fresh;
    }

    /// `CALL`'s own operand positions carry a callee symbol and, for
    /// builtins like `print`, a string-typed argument — both are rejected
    /// everywhere else an integer/label operand is expected.
    fn check_types(&self) -> OrionResult<()> {
        for instr in &self.module.instructions {
            let op = IsaOp::from_u8(instr.opcode.sub)?;
            for (i, v) in instr.values.iter().enumerate() {
                if op == IsaOp::Call && i >= 1 {
                    if matches!(v, Value::Array(_) | Value::Raw { .. }) {
                        return Err(OrionError::TypeMismatch);
                    }
                    continue;
                }
                if matches!(v, Value::Symbol { .. } | Value::Str { .. } | Value::Array(_) | Value::Raw { .. }) {
                    return Err(OrionError::TypeMismatch);
                }
            }
        }
        Ok(())
    }

    fn check_balanced_scopes(&self) -> OrionResult<()> {
        let mut depth: i64 = 0;
        for instr in &self.module.instructions {
            if instr.opcode == Opcode::isa(IsaOp::Scope) {
                depth += 1;
            } else if instr.opcode == Opcode::isa(IsaOp::Scopl) {
                if depth == 0 {
                    return Err(OrionError::InvalidInstruction);
                }
                depth -= 1;
            }
        }
        if depth != 0 {
            return Err(OrionError::InvalidInstruction);
        }
        Ok(())
    }

    /// Runs to completion, returning the top-level `RET` value (`0` if
    /// the program returns void).
    pub fn run(&mut self) -> OrionResult<i64> {
        if self.state != VmState::Loaded {
            return Err(OrionError::InvalidArgument);
        }
        self.state = VmState::Running;
        loop {
            match self.step() {
                Ok(Flow::Advance) => self.pc += 1,
                Ok(Flow::Jump(target)) => self.pc = target,
                Ok(Flow::Halt(value)) => {
                    self.state = VmState::Halted;
                    return Ok(value);
                }
                Err(e) => {
                    self.state = VmState::Faulted;
                    tracing::warn!(pc = self.pc, error = %e, "vm fault");
                    return Err(e);
                }
            }
        }
    }

    fn step(&mut self) -> OrionResult<Flow> {
        if self.pc >= self.module.instructions.len() {
            return if self.call_stack.is_empty() { Ok(Flow::Halt(0)) } else { Err(OrionError::InvalidJump) };
        }
        let instr = self.module.instructions[self.pc].clone();
        if instr.opcode.feature != Feature::Isa {
            return Err(OrionError::UnsupportedFeature);
        }
        let op = IsaOp::from_u8(instr.opcode.sub)?;
        tracing::trace!(pc = self.pc, op = op.mnemonic(), "step");
        self.exec(op, &instr)
    }

    fn exec(&mut self, op: IsaOp, instr: &Instruction) -> OrionResult<Flow> {
        use IsaOp::*;
        match op {
            Var => {
                let id = self.var_id(instr, 0)?;
                self.declare(id)?;
                Ok(Flow::Advance)
            }
            Const | Mov => {
                let id = self.var_id(instr, 0)?;
                let value = self.eval_any(instr, 1)?;
                self.set_value(id, value)?;
                Ok(Flow::Advance)
            }
            Lea => {
                if self.options.strict {
                    return Err(OrionError::InvalidInstruction);
                }
                let id = self.var_id(instr, 0)?;
                let src = self.var_id(instr, 1)?;
                self.set(id, i64::from(src))?;
                Ok(Flow::Advance)
            }
            Jmp => Ok(Flow::Jump(self.resolve_label(instr, 0)?)),
            Breq | Brneq | Brgt | Brge | Brlt | Brle => {
                let lhs = self.eval(instr, 0)?;
                let rhs = self.eval(instr, 1)?;
                let taken = match op {
                    Breq => lhs == rhs,
                    Brneq => lhs != rhs,
                    Brgt => lhs > rhs,
                    Brge => lhs >= rhs,
                    Brlt => lhs < rhs,
                    Brle => lhs <= rhs,
                    _ => unreachable!(),
                };
                if taken {
                    Ok(Flow::Jump(self.resolve_label(instr, 2)?))
                } else {
                    Ok(Flow::Advance)
                }
            }
            Brz | Brnz => {
                let cond = self.eval(instr, 0)?;
                let taken = if op == Brz { cond == 0 } else { cond != 0 };
                if taken {
                    Ok(Flow::Jump(self.resolve_label(instr, 1)?))
                } else {
                    Ok(Flow::Advance)
                }
            }
            Call => self.exec_call(instr),
            Ret => self.exec_ret(instr),
            Label => Ok(Flow::Advance),
            Scope => {
                self.scope_depth += 1;
                Ok(Flow::Advance)
            }
            Scopl => {
                if self.scope_depth == 0 {
                    if self.options.strict {
                        return Err(OrionError::InvalidInstruction);
                    }
                } else {
                    self.scope_depth -= 1;
                }
                Ok(Flow::Advance)
            }
            Add | Sub | Mul | Div | Mod | And | Or | Xor | Shl | Shr => self.exec_binop(op, instr),
            Not => {
                let id = self.var_id(instr, 0)?;
                let operand = self.eval(instr, 1)?;
                self.set(id, !operand)?;
                Ok(Flow::Advance)
            }
            Inc | Dec | IncP | DecP => {
                let id = self.var_id(instr, 0)?;
                let current = self.get(id)?;
                let updated = if matches!(op, Inc | IncP) { current.wrapping_add(1) } else { current.wrapping_sub(1) };
                self.set(id, updated)?;
                Ok(Flow::Advance)
            }
        }
    }

    fn exec_binop(&mut self, op: IsaOp, instr: &Instruction) -> OrionResult<Flow> {
        let id = self.var_id(instr, 0)?;
        let lhs = self.eval(instr, 1)?;
        let rhs = self.eval(instr, 2)?;
        let result = match op {
            IsaOp::Add => lhs.wrapping_add(rhs),
            IsaOp::Sub => lhs.wrapping_sub(rhs),
            IsaOp::Mul => lhs.wrapping_mul(rhs),
            IsaOp::Div => {
                if rhs == 0 {
                    return Err(OrionError::DivisionByZero);
                }
                lhs.wrapping_div(rhs)
            }
            IsaOp::Mod => {
                if rhs == 0 {
                    return Err(OrionError::DivisionByZero);
                }
                lhs.wrapping_rem(rhs)
            }
            IsaOp::And => lhs & rhs,
            IsaOp::Or => lhs | rhs,
            IsaOp::Xor => lhs ^ rhs,
            IsaOp::Shl => lhs.wrapping_shl(rhs as u32),
            IsaOp::Shr => lhs.wrapping_shr(rhs as u32),
            _ => unreachable!("exec_binop only called for arithmetic/bitwise opcodes"),
        };
        self.set(id, result)?;
        Ok(Flow::Advance)
    }

    fn exec_call(&mut self, instr: &Instruction) -> OrionResult<Flow> {
        let dest = self.var_id(instr, 0)?;
        match instr.values.get(1) {
            Some(Value::Symbol { offset, .. }) => self.exec_builtin_call(dest, *offset, instr),
            _ => self.exec_user_call(dest, instr),
        }
    }

    /// Dispatches a call to a native builtin, named by a `Symbol` operand
    /// rather than a `Variable` label — the one such builtin is `print`,
    /// which logs its single argument and evaluates to it unchanged.
    fn exec_builtin_call(&mut self, dest: u32, name_offset: u32, instr: &Instruction) -> OrionResult<Flow> {
        let name = self.module.strings.get(name_offset)?;
        match name {
            "print" => {
                let arg = self.eval_any(instr, 2)?;
                match &arg {
                    VmValue::Int(v) => tracing::info!(value = v, "print"),
                    VmValue::Str(s) => tracing::info!(value = %s, "print"),
                }
                self.set_value(dest, arg)?;
                Ok(Flow::Advance)
            }
            _ => Err(OrionError::InvalidFunctionCall),
        }
    }

    fn exec_user_call(&mut self, dest: u32, instr: &Instruction) -> OrionResult<Flow> {
        let target_pc = self.resolve_label(instr, 1)?;
        let mut i = 2;
        while i + 1 < instr.values.len() {
            let param_id = instr.values[i].as_variable().ok_or(OrionError::InvalidInstruction)?;
            let arg_value = self.eval(instr, i + 1)?;
            self.set(param_id, arg_value)?;
            i += 2;
        }
        if self.call_stack.len() as u32 >= self.options.call_depth_limit {
            return Err(OrionError::CallDepthExceeded);
        }
        self.call_stack.push(Frame { return_pc: self.pc + 1, dest_var: dest });
        Ok(Flow::Jump(target_pc))
    }

    fn exec_ret(&mut self, instr: &Instruction) -> OrionResult<Flow> {
        let value = if instr.values.is_empty() { None } else { Some(self.eval(instr, 0)?) };
        match self.call_stack.pop() {
            Some(frame) => {
                if let Some(v) = value {
                    self.set(frame.dest_var, v)?;
                }
                Ok(Flow::Jump(frame.return_pc))
            }
            None => Ok(Flow::Halt(value.unwrap_or(0))),
        }
    }

    fn var_id(&self, instr: &Instruction, index: usize) -> OrionResult<u32> {
        instr.values.get(index).and_then(Value::as_variable).ok_or(OrionError::InvalidInstruction)
    }

    /// Resolves a jump/branch target operand, accepting either spelling a
    /// lowered or text-assembled module may use for a label id: `Value::Label`
    /// or `Value::Variable`.
    fn resolve_label(&self, instr: &Instruction, index: usize) -> OrionResult<usize> {
        let id = instr.values.get(index).and_then(Value::as_label_id).ok_or(OrionError::InvalidInstruction)?;
        self.labels.get(&id).copied().ok_or(OrionError::InvalidJump)
    }

    /// Evaluates an operand that must be an integer — every context except
    /// a builtin call's argument.
    fn eval(&self, instr: &Instruction, index: usize) -> OrionResult<i64> {
        let value = instr.values.get(index).ok_or(OrionError::InvalidInstruction)?;
        self.eval_value(value)
    }

    fn eval_value(&self, value: &Value) -> OrionResult<i64> {
        match value {
            Value::Variable(id) => self.get(*id),
            Value::Numeric { magnitude, .. } => Ok(*magnitude as i64),
            Value::Label { id, .. } => Ok(i64::from(*id)),
            Value::Symbol { .. } | Value::Str { .. } | Value::Array(_) | Value::Raw { .. } => {
                Err(OrionError::TypeMismatch)
            }
        }
    }

    /// Evaluates an operand into the full variable union, accepting a
    /// string literal or a string-valued variable in addition to the
    /// integer forms [`Vm::eval`] accepts — used for `CONST`/`MOV` and for
    /// builtin-call arguments like `print`'s.
    fn eval_any(&self, instr: &Instruction, index: usize) -> OrionResult<VmValue> {
        let value = instr.values.get(index).ok_or(OrionError::InvalidInstruction)?;
        match value {
            Value::Variable(id) => self.get_value(*id),
            Value::Numeric { magnitude, .. } => Ok(VmValue::Int(*magnitude as i64)),
            Value::Label { id, .. } => Ok(VmValue::Int(i64::from(*id))),
            Value::Str { offset, .. } => Ok(VmValue::Str(self.module.strings.get(*offset)?.to_string())),
            Value::Symbol { .. } | Value::Array(_) | Value::Raw { .. } => Err(OrionError::TypeMismatch),
        }
    }

    fn declare(&mut self, id: u32) -> OrionResult<()> {
        if self.variables.contains_key(&id) {
            return Ok(());
        }
        self.check_memory_cap()?;
        self.variables.insert(id, None);
        Ok(())
    }

    fn set(&mut self, id: u32, value: i64) -> OrionResult<()> {
        self.set_value(id, VmValue::Int(value))
    }

    fn set_value(&mut self, id: u32, value: VmValue) -> OrionResult<()> {
        if !self.variables.contains_key(&id) {
            self.check_memory_cap()?;
        }
        self.variables.insert(id, Some(value));
        Ok(())
    }

    fn get(&self, id: u32) -> OrionResult<i64> {
        self.get_value(id)?.as_int()
    }

    fn get_value(&self, id: u32) -> OrionResult<VmValue> {
        match self.variables.get(&id) {
            Some(Some(v)) => Ok(v.clone()),
            Some(None) => Err(OrionError::UninitializedVariable),
            None => Err(OrionError::InvalidVariableId),
        }
    }

    fn check_memory_cap(&self) -> OrionResult<()> {
        let used = (self.variables.len() as u64 + 1) * 8;
        if used > self.options.memory_limit_bytes {
            return Err(OrionError::MemoryLimitExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::SourceId;

    fn run_source(src: &str) -> OrionResult<i64> {
        let program = orion_parser::parse(SourceId(0), src).unwrap();
        let module = orion_lower::lower_program(&program).unwrap();
        let mut vm = Vm::new(module, VmOptions::default());
        vm.prepare()?;
        vm.run()
    }

    #[test]
    fn runs_literal_return() {
        assert_eq!(run_source("int main() { return 42; }").unwrap(), 42);
    }

    #[test]
    fn runs_arithmetic() {
        assert_eq!(run_source("int main() { return 2 + 3 * 4; }").unwrap(), 14);
    }

    #[test]
    fn runs_while_loop_sum() {
        let src = "int main() { int i = 0; int sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } return sum; }";
        assert_eq!(run_source(src).unwrap(), 10);
    }

    #[test]
    fn runs_for_loop_factorial() {
        let src = "int main() { int acc = 1; for (int i = 1; i <= 5; i = i + 1) { acc = acc * i; } return acc; }";
        assert_eq!(run_source(src).unwrap(), 120);
    }

    #[test]
    fn runs_function_call() {
        let src = "int add(int a, int b) { return a + b; } int main() { return add(3, 4); }";
        assert_eq!(run_source(src).unwrap(), 7);
    }

    #[test]
    fn runs_recursive_call() {
        let src = "int fact(int n) { if (n <= 1) { return 1; } return n * fact(n - 1); } int main() { return fact(6); }";
        assert_eq!(run_source(src).unwrap(), 720);
    }

    #[test]
    fn division_by_zero_faults() {
        let src = "int main() { int z = 0; return 1 / z; }";
        assert_eq!(run_source(src), Err(OrionError::DivisionByZero));
    }

    #[test]
    fn post_increment_returns_old_value() {
        let src = "int main() { int i = 5; int j = i++; return j * 100 + i; }";
        assert_eq!(run_source(src).unwrap(), 506);
    }

    #[test]
    fn logical_not_is_is_zero_not_bitwise() {
        assert_eq!(run_source("int main() { return !0; }").unwrap(), 1);
        assert_eq!(run_source("int main() { return !5; }").unwrap(), 0);
    }

    #[test]
    fn call_depth_limit_is_enforced() {
        let program = orion_parser::parse(
            SourceId(0),
            "int rec(int n) { return rec(n + 1); } int main() { return rec(0); }",
        )
        .unwrap();
        let module = orion_lower::lower_program(&program).unwrap();
        let mut vm = Vm::new(module, VmOptions { call_depth_limit: 8, ..VmOptions::default() });
        vm.prepare().unwrap();
        assert_eq!(vm.run(), Err(OrionError::CallDepthExceeded));
    }

    #[test]
    fn print_builtin_echoes_its_argument() {
        assert_eq!(run_source("int main() { return print(7); }").unwrap(), 7);
    }

    #[test]
    fn print_builtin_accepts_a_string_argument() {
        assert_eq!(run_source(r#"int main() { print("hello"); return 1; }"#).unwrap(), 1);
    }

    #[test]
    fn runs_a_text_assembled_module_using_label_syntax() {
        let text = "isa.var $0\n\
                     isa.const $0, %d0\n\
                     isa.breq $0, %d0, .L1\n\
                     isa.const $0, %d99\n\
                     isa.label .L1\n\
                     isa.ret $0";
        let mut strings = orion_core::StringTable::new();
        let instructions = orion_ir::text::assemble(text, &mut strings).unwrap();
        let mut module = Module::new();
        module.enable(orion_ir::FeatureSet::ISA);
        module.strings = strings;
        for instr in instructions {
            module.push(instr).unwrap();
        }
        let mut vm = Vm::new(module, VmOptions::default());
        vm.prepare().unwrap();
        assert_eq!(vm.run().unwrap(), 0);
    }

    #[test]
    fn reset_allows_rerunning_a_prepared_module() {
        let program = orion_parser::parse(SourceId(0), "int main() { return 9; }").unwrap();
        let module = orion_lower::lower_program(&program).unwrap();
        let mut vm = Vm::new(module, VmOptions::default());
        vm.prepare().unwrap();
        assert_eq!(vm.run().unwrap(), 9);
        vm.reset();
        assert_eq!(vm.state(), VmState::Fresh);
        vm.prepare().unwrap();
        assert_eq!(vm.run().unwrap(), 9);
    }

    #[test]
    fn skip_validation_level_trusts_the_module() {
        let program = orion_parser::parse(SourceId(0), "int main() { return 1; }").unwrap();
        let module = orion_lower::lower_program(&program).unwrap();
        let options = VmOptions { validation_level: ValidationLevel::Skip, ..VmOptions::default() };
        let mut vm = Vm::new(module, options);
        vm.prepare().unwrap();
        assert_eq!(vm.run().unwrap(), 1);
    }

    #[test]
    fn run_before_prepare_is_rejected() {
        let program = orion_parser::parse(SourceId(0), "int main() { return 0; }").unwrap();
        let module = orion_lower::lower_program(&program).unwrap();
        let mut vm = Vm::new(module, VmOptions::default());
        assert_eq!(vm.run(), Err(OrionError::InvalidArgument));
    }
}
