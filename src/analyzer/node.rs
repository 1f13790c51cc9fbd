use std::fmt;

use crate::tokenizer::{Operator, Token};

/// Parsed expression tree. Built bottom-up by the parser and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    Leaf {
        token: Token,
        position: usize,
    },
    Binary {
        left: Box<SyntaxNode>,
        right: Box<SyntaxNode>,
        operator: Operator,
        position: usize,
    },
    Conditional {
        predicate: Box<SyntaxNode>,
        do_branch: Box<SyntaxNode>,
        else_branch: Option<Box<SyntaxNode>>,
        position: usize,
    },
}

impl SyntaxNode {
    /// Offset of the token this node starts at (the operator for binary nodes).
    pub fn position(&self) -> usize {
        match self {
            SyntaxNode::Leaf { position, .. }
            | SyntaxNode::Binary { position, .. }
            | SyntaxNode::Conditional { position, .. } => *position,
        }
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxNode::Leaf { token, .. } => write!(f, "{}", token),
            SyntaxNode::Binary {
                left,
                right,
                operator,
                ..
            } => write!(f, "({} {} {})", left, operator, right),
            SyntaxNode::Conditional {
                predicate,
                do_branch,
                else_branch,
                ..
            } => {
                write!(f, "(IF {} DO {}", predicate, do_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " ELSE {}", else_branch)?;
                }
                write!(f, ")")
            }
        }
    }
}
