use std::fmt;

use crate::soc::bus::BusError;

/// Tokenization failures. Always abort the whole line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    NoMatch { position: usize },
    TokenTooLong { position: usize, len: usize },
    TooManyTokens { limit: usize },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::NoMatch { position } => write!(f, "no match at position {position}"),
            LexError::TokenTooLong { position, len } => {
                write!(f, "token of {len} bytes at position {position} is too long")
            }
            LexError::TooManyTokens { limit } => {
                write!(f, "expression has more than {limit} tokens")
            }
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug)]
pub enum EvalError {
    Empty,
    UnknownRegister(String),
    InvalidLiteral(String),
    DivisionByZero,
    UnexpectedToken { index: usize, text: String },
    MissingOperand,
    UnbalancedParen,
    Malformed(&'static str),
    Memory(BusError),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Empty => write!(f, "empty expression"),
            EvalError::UnknownRegister(name) => write!(f, "unknown register '${name}'"),
            EvalError::InvalidLiteral(text) => write!(f, "literal '{text}' does not fit in 32 bits"),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::UnexpectedToken { index, text } => {
                write!(f, "unexpected token '{text}' at index {index}")
            }
            EvalError::MissingOperand => write!(f, "operator is missing an operand"),
            EvalError::UnbalancedParen => write!(f, "unbalanced parentheses"),
            EvalError::Malformed(msg) => write!(f, "malformed expression: {msg}"),
            EvalError::Memory(err) => write!(f, "cannot dereference: {err}"),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalError::Memory(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BusError> for EvalError {
    fn from(err: BusError) -> Self {
        EvalError::Memory(err)
    }
}

/// Result of `evaluate_text`: either stage can reject the line.
#[derive(Debug)]
pub enum ExprError {
    Lex(LexError),
    Eval(EvalError),
}

pub type ExprResult<T> = Result<T, ExprError>;

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::Lex(err) => write!(f, "syntax error: {err}"),
            ExprError::Eval(err) => write!(f, "evaluation error: {err}"),
        }
    }
}

impl std::error::Error for ExprError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExprError::Lex(err) => Some(err),
            ExprError::Eval(err) => Some(err),
        }
    }
}

impl From<LexError> for ExprError {
    fn from(err: LexError) -> Self {
        ExprError::Lex(err)
    }
}

impl From<EvalError> for ExprError {
    fn from(err: EvalError) -> Self {
        ExprError::Eval(err)
    }
}

#[derive(Debug)]
pub enum WpError {
    PoolExhausted { capacity: usize },
    NotFound(usize),
    Syntax(LexError),
}

impl fmt::Display for WpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WpError::PoolExhausted { capacity } => {
                write!(f, "all {capacity} watchpoints are in use")
            }
            WpError::NotFound(id) => write!(f, "no watchpoint {id}"),
            WpError::Syntax(err) => write!(f, "invalid watch expression: {err}"),
        }
    }
}

impl std::error::Error for WpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WpError::Syntax(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LexError> for WpError {
    fn from(err: LexError) -> Self {
        WpError::Syntax(err)
    }
}
