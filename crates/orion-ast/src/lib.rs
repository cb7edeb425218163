//! Abstract syntax tree for the small C-like language the Orion++ front-end
//! compiles: functions over `int`/`char`/`void`, declarations, control flow,
//! and expressions with the usual arithmetic/comparison/logical operators.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
use std::{boxed::Box, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use orion_core::Span;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The language's closed set of semantic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SemType {
    /// `void`, valid only as a function return type.
    Void,
    /// `int`.
    Int,
    /// `char`.
    Char,
}

impl SemType {
    /// Parses a type keyword; returns `None` for anything else.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "void" => Some(Self::Void),
            "int" => Some(Self::Int),
            "char" => Some(Self::Char),
            _ => None,
        }
    }

    /// The keyword spelling.
    pub fn as_keyword(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Int => "int",
            Self::Char => "char",
        }
    }
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
}

impl BinaryOp {
    /// True for the six relational/equality comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Gt | Self::Ge | Self::Lt | Self::Le)
    }
}

/// A unary or increment/decrement operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `++x`
    PreInc,
    /// `--x`
    PreDec,
    /// `x++`
    PostInc,
    /// `x--`
    PostDec,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    /// A variable reference.
    Identifier {
        /// The variable's name.
        name: String,
        /// Source location.
        span: Span,
    },
    /// An integer literal.
    Number {
        /// The literal's value.
        value: i64,
        /// Source location.
        span: Span,
    },
    /// A string literal.
    StringLit {
        /// The unescaped string content.
        value: String,
        /// Source location.
        span: Span,
    },
    /// A character literal.
    CharLit {
        /// The literal's value.
        value: char,
        /// Source location.
        span: Span,
    },
    /// A unary, prefix-increment, or postfix-increment expression.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        expr: Box<Expr>,
        /// Source location.
        span: Span,
    },
    /// A binary expression.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// Source location.
        span: Span,
    },
    /// An assignment; the target must be an lvalue (currently: an
    /// [`Expr::Identifier`]).
    Assign {
        /// The assignment target.
        target: Box<Expr>,
        /// The assigned value.
        value: Box<Expr>,
        /// Source location.
        span: Span,
    },
    /// A function call.
    Call {
        /// The called function's name.
        callee: String,
        /// Argument expressions, left to right.
        args: Vec<Expr>,
        /// Source location.
        span: Span,
    },
}

impl Expr {
    /// This expression's source span.
    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier { span, .. }
            | Expr::Number { span, .. }
            | Expr::StringLit { span, .. }
            | Expr::CharLit { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Call { span, .. } => *span,
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Param {
    /// The parameter's declared type.
    pub ty: SemType,
    /// The parameter's name.
    pub name: String,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stmt {
    /// `ty name [= init];`
    VarDecl {
        /// Declared type.
        ty: SemType,
        /// Variable name.
        name: String,
        /// Optional initializer.
        init: Option<Expr>,
        /// Source location.
        span: Span,
    },
    /// A bare expression statement.
    ExpressionStmt {
        /// The expression.
        expr: Expr,
        /// Source location.
        span: Span,
    },
    /// `{ ... }`
    Block {
        /// The block's statements, in order.
        statements: Vec<Stmt>,
        /// Source location.
        span: Span,
    },
    /// `if (cond) then [else else_branch]`
    If {
        /// The condition.
        cond: Expr,
        /// The taken branch.
        then_branch: Box<Stmt>,
        /// The optional `else` branch.
        else_branch: Option<Box<Stmt>>,
        /// Source location.
        span: Span,
    },
    /// `while (cond) body`
    While {
        /// The loop condition.
        cond: Expr,
        /// The loop body.
        body: Box<Stmt>,
        /// Source location.
        span: Span,
    },
    /// `for (init; cond; step) body`
    For {
        /// The optional initializer statement.
        init: Option<Box<Stmt>>,
        /// The optional loop condition; absent means "always true".
        cond: Option<Expr>,
        /// The optional per-iteration step expression.
        step: Option<Expr>,
        /// The loop body.
        body: Box<Stmt>,
        /// Source location.
        span: Span,
    },
    /// `return [value];`
    Return {
        /// The optional returned value.
        value: Option<Expr>,
        /// Source location.
        span: Span,
    },
}

impl Stmt {
    /// This statement's source span.
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::ExpressionStmt { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    /// The function's name.
    pub name: String,
    /// The declared return type.
    pub return_type: SemType,
    /// Parameters, in declaration order.
    pub params: Vec<Param>,
    /// The function body.
    pub body: Vec<Stmt>,
    /// Source location of the whole definition.
    pub span: Span,
}

/// A whole translation unit: a sequence of top-level function definitions.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program {
    /// Top-level functions, in source order.
    pub functions: Vec<Function>,
}

impl Program {
    /// Looks up a top-level function by name.
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::{Pos, SourceId};

    fn span() -> Span {
        Span::new(SourceId(0), Pos(0), Pos(1))
    }

    #[test]
    fn sem_type_keyword_roundtrips() {
        for ty in [SemType::Void, SemType::Int, SemType::Char] {
            assert_eq!(SemType::from_keyword(ty.as_keyword()), Some(ty));
        }
        assert_eq!(SemType::from_keyword("float"), None);
    }

    #[test]
    fn binary_op_classifies_comparisons() {
        assert!(BinaryOp::Gt.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
    }

    #[test]
    fn program_finds_function_by_name() {
        let program = Program {
            functions: vec![Function {
                name: "main".into(),
                return_type: SemType::Int,
                params: Vec::new(),
                body: vec![Stmt::Return { value: None, span: span() }],
                span: span(),
            }],
        };
        assert!(program.find_function("main").is_some());
        assert!(program.find_function("missing").is_none());
    }
}
