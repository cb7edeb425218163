//! Lowers the front-end AST ([`orion_ast`]) into Orion++ IR
//! ([`orion_ir::Module`]).
//!
//! Variable and label identifiers are drawn from a single monotonic
//! counter, and scopes are tracked with [`std::collections::BTreeMap`]s, so
//! lowering is deterministic regardless of hash-iteration order: repeated
//! runs over the same AST produce byte-identical IR.
//!
//! Calling convention (filling in a detail the opcode table leaves
//! implementation-defined): each function's entry label and parameter
//! variable ids are allocated in a first pass, before any instructions are
//! emitted, so a `CALL` site can name the callee's parameter variables
//! directly — `CALL dest, entry_label, (param_id, arg_value)*`. The VM
//! binds each `arg_value` into the corresponding `param_id` while
//! dispatching the call, so callees never re-declare their parameters with
//! `VAR`.
//!
//! Comparisons (`==`, `!=`, `>`, `>=`, `<`, `<=`) have no single-instruction
//! ISA equivalent — only conditional branches — so they lower to a
//! branch/const/label sequence that materializes a `0`/`1` result: branch
//! to a "true" label on the condition, fall through to `const 0`
//! otherwise, jump past the arm that sets `const 1`. `&&`/`||` reuse the
//! bitwise `AND`/`OR` ISA ops over already-normalized `0`/`1` operands
//! rather than short-circuiting.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, string::ToString, vec, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, string::ToString, vec, vec::Vec};

use orion_ast::{BinaryOp, Expr, Function, Param, Program, Stmt, UnaryOp};
use orion_core::{OrionError, OrionResult};
use orion_ir::{FeatureSet, Instruction, IsaOp, Module, Value};

/// Lowers a whole program into a single Orion++ IR module with the `ISA`
/// feature enabled.
pub fn lower_program(program: &Program) -> OrionResult<Module> {
    let mut lowerer = Lowerer::new();
    lowerer.module.enable(FeatureSet::ISA);
    lowerer.register_functions(program)?;
    for function in &program.functions {
        lowerer.lower_function(function)?;
    }
    Ok(lowerer.module)
}

#[derive(Debug, Clone)]
struct FunctionInfo {
    entry_label: u32,
    param_ids: Vec<u32>,
}

struct Lowerer {
    module: Module,
    next_id: u32,
    scopes: Vec<BTreeMap<String, u32>>,
    functions: BTreeMap<String, FunctionInfo>,
}

impl Lowerer {
    fn new() -> Self {
        Self { module: Module::new(), next_id: 0, scopes: vec![BTreeMap::new()], functions: BTreeMap::new() }
    }

    fn new_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, id: u32) {
        self.scopes.last_mut().expect("at least one scope").insert(name.to_string(), id);
    }

    fn resolve(&self, name: &str) -> OrionResult<u32> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Ok(*id);
            }
        }
        Err(OrionError::InvalidVariableId)
    }

    fn emit(&mut self, instr: Instruction) -> OrionResult<()> {
        self.module.push(instr)
    }

    /// First pass: allocates every function's entry label and parameter
    /// variable ids up front, so a call site lowered before its callee's
    /// own body can still name the callee's parameters directly.
    fn register_functions(&mut self, program: &Program) -> OrionResult<()> {
        for function in &program.functions {
            if self.functions.contains_key(&function.name) {
                return Err(OrionError::InvalidFunctionCall);
            }
            let entry_label = self.new_id();
            let param_ids: Vec<u32> = function.params.iter().map(|_: &Param| self.new_id()).collect();
            self.functions.insert(function.name.clone(), FunctionInfo { entry_label, param_ids });
        }
        Ok(())
    }

    fn lower_function(&mut self, function: &Function) -> OrionResult<()> {
        let info = self.functions.get(&function.name).expect("registered in first pass").clone();
        self.push_scope();
        for (param, id) in function.params.iter().zip(info.param_ids.iter()) {
            self.declare(&param.name, *id);
        }
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(info.entry_label)]))?;
        self.emit(Instruction::isa(IsaOp::Scope, Vec::new()))?;

        let mut last_was_return = false;
        for stmt in &function.body {
            last_was_return = matches!(stmt, Stmt::Return { .. });
            self.lower_stmt(stmt)?;
        }

        self.emit(Instruction::isa(IsaOp::Scopl, Vec::new()))?;
        if !last_was_return {
            self.emit(Instruction::isa(IsaOp::Ret, Vec::new()))?;
        }
        self.pop_scope();
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> OrionResult<()> {
        match stmt {
            Stmt::VarDecl { name, init, .. } => {
                let id = self.new_id();
                self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(id)]))?;
                self.declare(name, id);
                if let Some(init) = init {
                    let value = self.lower_expr(init)?;
                    self.emit(Instruction::isa(IsaOp::Mov, vec![Value::Variable(id), value]))?;
                }
                Ok(())
            }
            Stmt::ExpressionStmt { expr, .. } => {
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::Block { statements, .. } => {
                self.push_scope();
                for s in statements {
                    self.lower_stmt(s)?;
                }
                self.pop_scope();
                Ok(())
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.lower_if(cond, then_branch, else_branch.as_deref())
            }
            Stmt::While { cond, body, .. } => self.lower_while(cond, body),
            Stmt::For { init, cond, step, body, .. } => {
                self.lower_for(init.as_deref(), cond.as_ref(), step.as_ref(), body)
            }
            Stmt::Return { value, .. } => {
                let mut values = Vec::new();
                if let Some(expr) = value {
                    values.push(self.lower_expr(expr)?);
                }
                self.emit(Instruction::isa(IsaOp::Ret, values))
            }
        }
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> OrionResult<()> {
        let else_label = self.new_id();
        let end_label = self.new_id();
        let cond_value = self.lower_expr(cond)?;
        self.emit(Instruction::isa(IsaOp::Brz, vec![cond_value, Value::Variable(else_label)]))?;
        self.lower_stmt(then_branch)?;
        self.emit(Instruction::isa(IsaOp::Jmp, vec![Value::Variable(end_label)]))?;
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(else_label)]))?;
        if let Some(else_branch) = else_branch {
            self.lower_stmt(else_branch)?;
        }
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(end_label)]))
    }

    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> OrionResult<()> {
        let start_label = self.new_id();
        let end_label = self.new_id();
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(start_label)]))?;
        let cond_value = self.lower_expr(cond)?;
        self.emit(Instruction::isa(IsaOp::Brz, vec![cond_value, Value::Variable(end_label)]))?;
        self.lower_stmt(body)?;
        self.emit(Instruction::isa(IsaOp::Jmp, vec![Value::Variable(start_label)]))?;
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(end_label)]))
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> OrionResult<()> {
        self.push_scope();
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }
        let start_label = self.new_id();
        let end_label = self.new_id();
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(start_label)]))?;
        if let Some(cond) = cond {
            let cond_value = self.lower_expr(cond)?;
            self.emit(Instruction::isa(IsaOp::Brz, vec![cond_value, Value::Variable(end_label)]))?;
        }
        self.lower_stmt(body)?;
        if let Some(step) = step {
            self.lower_expr(step)?;
        }
        self.emit(Instruction::isa(IsaOp::Jmp, vec![Value::Variable(start_label)]))?;
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(end_label)]))?;
        self.pop_scope();
        Ok(())
    }

    fn lower_expr(&mut self, expr: &Expr) -> OrionResult<Value> {
        match expr {
            Expr::Identifier { name, .. } => Ok(Value::Variable(self.resolve(name)?)),
            Expr::Number { value, .. } => Ok(Value::decimal(*value as u64)),
            Expr::CharLit { value, .. } => Ok(Value::decimal(*value as u64)),
            Expr::StringLit { value, .. } => {
                let offset = self.module.strings.add(value);
                Ok(Value::Str { offset, length: value.len() as u32 })
            }
            Expr::Assign { target, value, .. } => self.lower_assign(target, value),
            Expr::Unary { op, expr, .. } => self.lower_unary(*op, expr),
            Expr::Binary { op, lhs, rhs, .. } => {
                if op.is_comparison() {
                    self.lower_comparison(*op, lhs, rhs)
                } else {
                    self.lower_arithmetic(*op, lhs, rhs)
                }
            }
            Expr::Call { callee, args, .. } => self.lower_call(callee, args),
        }
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> OrionResult<Value> {
        let Expr::Identifier { name, .. } = target else {
            return Err(OrionError::TypeMismatch);
        };
        let id = self.resolve(name)?;
        let value = self.lower_expr(value)?;
        self.emit(Instruction::isa(IsaOp::Mov, vec![Value::Variable(id), value]))?;
        Ok(Value::Variable(id))
    }

    fn lower_unary(&mut self, op: UnaryOp, expr: &Expr) -> OrionResult<Value> {
        match op {
            UnaryOp::Neg => {
                let operand = self.lower_expr(expr)?;
                let zero = self.new_id();
                let dest = self.new_id();
                self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(zero)]))?;
                self.emit(Instruction::isa(IsaOp::Const, vec![Value::Variable(zero), Value::decimal(0)]))?;
                self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(dest)]))?;
                self.emit(Instruction::isa(
                    IsaOp::Sub,
                    vec![Value::Variable(dest), Value::Variable(zero), operand],
                ))?;
                Ok(Value::Variable(dest))
            }
            UnaryOp::Not => {
                // `!x` is "is zero", not the ISA's bitwise NOT, so it is
                // lowered through the same branch/const/label idiom as a
                // `== 0` comparison rather than through `ISA.NOT`.
                let operand = self.lower_expr(expr)?;
                let dest = self.new_id();
                let true_label = self.new_id();
                let end_label = self.new_id();
                self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(dest)]))?;
                self.emit(Instruction::isa(
                    IsaOp::Breq,
                    vec![operand, Value::decimal(0), Value::Variable(true_label)],
                ))?;
                self.emit(Instruction::isa(IsaOp::Const, vec![Value::Variable(dest), Value::decimal(0)]))?;
                self.emit(Instruction::isa(IsaOp::Jmp, vec![Value::Variable(end_label)]))?;
                self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(true_label)]))?;
                self.emit(Instruction::isa(IsaOp::Const, vec![Value::Variable(dest), Value::decimal(1)]))?;
                self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(end_label)]))?;
                Ok(Value::Variable(dest))
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let Expr::Identifier { name, .. } = expr else { return Err(OrionError::TypeMismatch) };
                let id = self.resolve(name)?;
                let isa_op = if op == UnaryOp::PreInc { IsaOp::Inc } else { IsaOp::Dec };
                self.emit(Instruction::isa(isa_op, vec![Value::Variable(id)]))?;
                Ok(Value::Variable(id))
            }
            UnaryOp::PostInc | UnaryOp::PostDec => {
                let Expr::Identifier { name, .. } = expr else { return Err(OrionError::TypeMismatch) };
                let id = self.resolve(name)?;
                let saved = self.new_id();
                self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(saved)]))?;
                self.emit(Instruction::isa(IsaOp::Mov, vec![Value::Variable(saved), Value::Variable(id)]))?;
                let isa_op = if op == UnaryOp::PostInc { IsaOp::IncP } else { IsaOp::DecP };
                self.emit(Instruction::isa(isa_op, vec![Value::Variable(id)]))?;
                Ok(Value::Variable(saved))
            }
        }
    }

    fn lower_arithmetic(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> OrionResult<Value> {
        let lhs_v = self.lower_expr(lhs)?;
        let rhs_v = self.lower_expr(rhs)?;
        let isa_op = match op {
            BinaryOp::Add => IsaOp::Add,
            BinaryOp::Sub => IsaOp::Sub,
            BinaryOp::Mul => IsaOp::Mul,
            BinaryOp::Div => IsaOp::Div,
            BinaryOp::Mod => IsaOp::Mod,
            BinaryOp::LogicalAnd => IsaOp::And,
            BinaryOp::LogicalOr => IsaOp::Or,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le => {
                unreachable!("comparisons are routed through lower_comparison")
            }
        };
        let dest = self.new_id();
        self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(dest)]))?;
        self.emit(Instruction::isa(isa_op, vec![Value::Variable(dest), lhs_v, rhs_v]))?;
        Ok(Value::Variable(dest))
    }

    fn lower_comparison(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> OrionResult<Value> {
        let lhs_v = self.lower_expr(lhs)?;
        let rhs_v = self.lower_expr(rhs)?;
        let dest = self.new_id();
        let true_label = self.new_id();
        let end_label = self.new_id();
        let branch_op = match op {
            BinaryOp::Eq => IsaOp::Breq,
            BinaryOp::Ne => IsaOp::Brneq,
            BinaryOp::Gt => IsaOp::Brgt,
            BinaryOp::Ge => IsaOp::Brge,
            BinaryOp::Lt => IsaOp::Brlt,
            BinaryOp::Le => IsaOp::Brle,
            _ => unreachable!("only comparison operators reach lower_comparison"),
        };
        self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(dest)]))?;
        self.emit(Instruction::isa(branch_op, vec![lhs_v, rhs_v, Value::Variable(true_label)]))?;
        self.emit(Instruction::isa(IsaOp::Const, vec![Value::Variable(dest), Value::decimal(0)]))?;
        self.emit(Instruction::isa(IsaOp::Jmp, vec![Value::Variable(end_label)]))?;
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(true_label)]))?;
        self.emit(Instruction::isa(IsaOp::Const, vec![Value::Variable(dest), Value::decimal(1)]))?;
        self.emit(Instruction::isa(IsaOp::Label, vec![Value::Variable(end_label)]))?;
        Ok(Value::Variable(dest))
    }

    /// The one builtin the runtime recognizes without a user definition:
    /// `print(x)` writes `x` to the trace log and evaluates to `x`. A user
    /// function named `print` shadows it.
    const BUILTIN_PRINT: &'static str = "print";

    fn lower_call(&mut self, callee: &str, args: &[Expr]) -> OrionResult<Value> {
        if !self.functions.contains_key(callee) && callee == Self::BUILTIN_PRINT {
            return self.lower_builtin_print(args);
        }
        let info = self.functions.get(callee).cloned().ok_or(OrionError::InvalidFunctionCall)?;
        if info.param_ids.len() != args.len() {
            return Err(OrionError::InvalidFunctionCall);
        }
        let dest = self.new_id();
        let mut values = vec![Value::Variable(dest), Value::Variable(info.entry_label)];
        for (param_id, arg) in info.param_ids.iter().zip(args.iter()) {
            let arg_value = self.lower_expr(arg)?;
            values.push(Value::Variable(*param_id));
            values.push(arg_value);
        }
        self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(dest)]))?;
        self.emit(Instruction::isa(IsaOp::Call, values))?;
        Ok(Value::Variable(dest))
    }

    fn lower_builtin_print(&mut self, args: &[Expr]) -> OrionResult<Value> {
        if args.len() != 1 {
            return Err(OrionError::InvalidFunctionCall);
        }
        let arg_value = self.lower_expr(&args[0])?;
        let name_offset = self.module.strings.add(Self::BUILTIN_PRINT);
        let dest = self.new_id();
        self.emit(Instruction::isa(IsaOp::Var, vec![Value::Variable(dest)]))?;
        self.emit(Instruction::isa(
            IsaOp::Call,
            vec![
                Value::Variable(dest),
                Value::Symbol { offset: name_offset, length: Self::BUILTIN_PRINT.len() as u32 },
                arg_value,
            ],
        ))?;
        Ok(Value::Variable(dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::SourceId;
    use orion_ir::{Feature, Opcode};

    fn lower(src: &str) -> Module {
        let program = orion_parser::parse(SourceId(0), src).unwrap();
        lower_program(&program).unwrap()
    }

    fn has_isa(module: &Module, op: IsaOp) -> bool {
        module.instructions.iter().any(|i| i.opcode == Opcode::isa(op))
    }

    #[test]
    fn lowers_return_literal() {
        let module = lower("int main() { return 42; }");
        assert!(has_isa(&module, IsaOp::Ret));
        assert!(has_isa(&module, IsaOp::Const));
    }

    #[test]
    fn lowers_arithmetic_into_add_instruction() {
        let module = lower("int main() { int x = 1 + 2; return x; }");
        assert!(has_isa(&module, IsaOp::Add));
    }

    #[test]
    fn lowers_comparison_into_branch_const_label_sequence() {
        let module = lower("int main() { int x = 1 < 2; return x; }");
        assert!(has_isa(&module, IsaOp::Brlt));
        assert!(has_isa(&module, IsaOp::Label));
        let const_count = module.instructions.iter().filter(|i| i.opcode == Opcode::isa(IsaOp::Const)).count();
        assert!(const_count >= 2);
    }

    #[test]
    fn lowers_call_with_matching_parameter_count() {
        let module = lower("int add(int a, int b) { return a + b; } int main() { return add(1, 2); }");
        assert!(has_isa(&module, IsaOp::Call));
    }

    #[test]
    fn call_with_wrong_argument_count_is_rejected() {
        let program =
            orion_parser::parse(SourceId(0), "int add(int a, int b) { return a + b; } int main() { return add(1); }")
                .unwrap();
        assert_eq!(lower_program(&program), Err(OrionError::InvalidFunctionCall));
    }

    #[test]
    fn undeclared_variable_reference_is_rejected() {
        let program = orion_parser::parse(SourceId(0), "int main() { return y; }").unwrap();
        assert_eq!(lower_program(&program), Err(OrionError::InvalidVariableId));
    }

    #[test]
    fn while_loop_lowers_to_at_least_two_labels() {
        let module = lower("int main() { int i = 0; while (i < 3) { i = i + 1; } return i; }");
        let labels = module.instructions.iter().filter(|i| i.opcode == Opcode::isa(IsaOp::Label)).count();
        assert!(labels >= 2);
    }

    #[test]
    fn post_increment_saves_old_value_before_mutating() {
        let module = lower("int main() { int i = 0; int j = i++; return j; }");
        assert!(has_isa(&module, IsaOp::IncP));
        assert!(has_isa(&module, IsaOp::Mov));
    }

    #[test]
    fn function_declared_twice_is_rejected() {
        let program = orion_parser::parse(
            SourceId(0),
            "int f() { return 0; } int f() { return 1; } int main() { return f(); }",
        )
        .unwrap();
        assert_eq!(lower_program(&program), Err(OrionError::InvalidFunctionCall));
    }

    #[test]
    fn opcode_feature_is_isa_for_every_emitted_instruction() {
        let module = lower("int main() { int x = 0; for (int i = 0; i < 3; i = i + 1) { x = x + i; } return x; }");
        assert!(module.instructions.iter().all(|i| i.opcode.feature == Feature::Isa));
    }
}
