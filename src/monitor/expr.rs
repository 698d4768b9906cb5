//! Iterative evaluator for monitor expressions.
//!
//! Evaluation is a single left-to-right pass with an operand stack and an
//! operator stack (shunting-yard), so nesting depth is bounded by the token
//! buffer rather than by the call stack. All arithmetic is on wrapping `i32`.

use smallvec::SmallVec;

use crate::soc::bus::{BusResult, MemorySystem, PagingControl, SoftMMU};
use crate::soc::core::CpuState;

use super::error::{EvalError, ExprResult};
use super::lexer::{MAX_TOKENS, Token, TokenKind, retag_unary, tokenize};

/// What an expression can observe: registers by name and 32-bit words of
/// guest virtual memory.
pub trait ExprContext {
    fn read_register(&self, name: &str) -> Option<u32>;
    fn read_word(&mut self, vaddr: u32) -> BusResult<u32>;
}

/// Live view of the emulated machine. Dereferences go through the paging
/// unit and may set accessed bits in the guest page tables.
pub struct MachineView<'a> {
    pub cpu: &'a CpuState,
    pub memory: &'a mut MemorySystem,
}

impl<'a> MachineView<'a> {
    pub fn new(cpu: &'a CpuState, memory: &'a mut MemorySystem) -> Self {
        Self { cpu, memory }
    }
}

impl ExprContext for MachineView<'_> {
    fn read_register(&self, name: &str) -> Option<u32> {
        self.cpu.read_register(name).ok()
    }

    fn read_word(&mut self, vaddr: u32) -> BusResult<u32> {
        SoftMMU::new(self.memory, self.cpu.paging_mode()).virtual_read(vaddr, 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Negate,
    Deref,
    Mul,
    Div,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    LParen,
}

impl Operator {
    fn binary(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Star => Operator::Mul,
            TokenKind::Slash => Operator::Div,
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Sub,
            TokenKind::Shl => Operator::Shl,
            TokenKind::Shr => Operator::Shr,
            TokenKind::Lt => Operator::Lt,
            TokenKind::Gt => Operator::Gt,
            TokenKind::Le => Operator::Le,
            TokenKind::Ge => Operator::Ge,
            TokenKind::Eq => Operator::Eq,
            TokenKind::Ne => Operator::Ne,
            TokenKind::And => Operator::And,
            TokenKind::Or => Operator::Or,
            _ => return None,
        };
        Some(op)
    }

    /// Higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            Operator::Negate | Operator::Deref => 7,
            Operator::Mul | Operator::Div => 6,
            Operator::Add | Operator::Sub => 5,
            Operator::Shl | Operator::Shr => 4,
            Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge => 3,
            Operator::Eq | Operator::Ne => 2,
            Operator::And => 1,
            Operator::Or | Operator::LParen => 0,
        }
    }
}

pub struct Evaluator<'c, C: ExprContext> {
    context: &'c mut C,
    operands: SmallVec<[i32; MAX_TOKENS]>,
    operators: SmallVec<[Operator; MAX_TOKENS]>,
}

impl<'c, C: ExprContext> Evaluator<'c, C> {
    pub fn new(context: &'c mut C) -> Self {
        Self {
            context,
            operands: SmallVec::new(),
            operators: SmallVec::new(),
        }
    }

    /// Evaluates an already retagged token sequence.
    pub fn evaluate(&mut self, tokens: &[Token]) -> Result<i32, EvalError> {
        self.operands.clear();
        self.operators.clear();
        if tokens.is_empty() {
            return Err(EvalError::Empty);
        }

        let mut expect_operand = true;
        for (index, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::End => break,
                TokenKind::Decimal | TokenKind::Hex | TokenKind::Register => {
                    if !expect_operand {
                        return Err(unexpected(index, token));
                    }
                    let value = self.operand(token)?;
                    self.operands.push(value);
                    expect_operand = false;
                }
                TokenKind::LParen | TokenKind::Negate | TokenKind::Deref => {
                    if !expect_operand {
                        return Err(unexpected(index, token));
                    }
                    self.operators.push(match token.kind {
                        TokenKind::LParen => Operator::LParen,
                        TokenKind::Negate => Operator::Negate,
                        _ => Operator::Deref,
                    });
                }
                TokenKind::RParen => {
                    if expect_operand {
                        return Err(EvalError::MissingOperand);
                    }
                    self.close_paren()?;
                }
                kind => {
                    let op = Operator::binary(kind).ok_or_else(|| unexpected(index, token))?;
                    if expect_operand {
                        return Err(EvalError::MissingOperand);
                    }
                    self.reduce_while_binds(op.precedence())?;
                    self.operators.push(op);
                    expect_operand = true;
                }
            }
        }
        if expect_operand {
            return Err(EvalError::MissingOperand);
        }

        while let Some(op) = self.operators.pop() {
            if op == Operator::LParen {
                return Err(EvalError::UnbalancedParen);
            }
            self.apply(op)?;
        }
        match self.operands.as_slice() {
            [value] => Ok(*value),
            _ => Err(EvalError::Malformed("operands left on the stack")),
        }
    }

    fn operand(&mut self, token: &Token) -> Result<i32, EvalError> {
        let text = token.text();
        let invalid = || EvalError::InvalidLiteral(text.to_string());
        let raw = match token.kind {
            TokenKind::Decimal => text
                .parse::<u64>()
                .ok()
                .and_then(|value| u32::try_from(value).ok())
                .ok_or_else(invalid)?,
            TokenKind::Hex => u32::from_str_radix(&text[2..], 16).map_err(|_| invalid())?,
            _ => {
                let name = text.trim_start_matches('$');
                self.context
                    .read_register(name)
                    .ok_or_else(|| EvalError::UnknownRegister(name.to_string()))?
            }
        };
        Ok(raw as i32)
    }

    // Left-associative: pop everything that binds at least as tightly.
    fn reduce_while_binds(&mut self, precedence: u8) -> Result<(), EvalError> {
        while let Some(&top) = self.operators.last() {
            if top == Operator::LParen || top.precedence() < precedence {
                break;
            }
            self.operators.pop();
            self.apply(top)?;
        }
        Ok(())
    }

    fn close_paren(&mut self) -> Result<(), EvalError> {
        loop {
            match self.operators.pop() {
                Some(Operator::LParen) => return Ok(()),
                Some(op) => self.apply(op)?,
                None => return Err(EvalError::UnbalancedParen),
            }
        }
    }

    fn apply(&mut self, op: Operator) -> Result<(), EvalError> {
        let rhs = self.operands.pop().ok_or(EvalError::MissingOperand)?;
        let value = match op {
            Operator::Negate => rhs.wrapping_neg(),
            Operator::Deref => self.context.read_word(rhs as u32)? as i32,
            Operator::LParen => return Err(EvalError::UnbalancedParen),
            binary => {
                let lhs = self.operands.pop().ok_or(EvalError::MissingOperand)?;
                binary_op(binary, lhs, rhs)?
            }
        };
        self.operands.push(value);
        Ok(())
    }
}

fn binary_op(op: Operator, lhs: i32, rhs: i32) -> Result<i32, EvalError> {
    let value = match op {
        Operator::Mul => lhs.wrapping_mul(rhs),
        Operator::Div => {
            if rhs == 0 {
                return Err(EvalError::DivisionByZero);
            }
            lhs.wrapping_div(rhs)
        }
        Operator::Add => lhs.wrapping_add(rhs),
        Operator::Sub => lhs.wrapping_sub(rhs),
        Operator::Shl => lhs.wrapping_shl(rhs as u32),
        Operator::Shr => lhs.wrapping_shr(rhs as u32),
        Operator::Lt => i32::from(lhs < rhs),
        Operator::Gt => i32::from(lhs > rhs),
        Operator::Le => i32::from(lhs <= rhs),
        Operator::Ge => i32::from(lhs >= rhs),
        Operator::Eq => i32::from(lhs == rhs),
        Operator::Ne => i32::from(lhs != rhs),
        Operator::And => i32::from(lhs != 0 && rhs != 0),
        Operator::Or => i32::from(lhs != 0 || rhs != 0),
        Operator::Negate | Operator::Deref | Operator::LParen => {
            return Err(EvalError::Malformed("unary operator used as binary"));
        }
    };
    Ok(value)
}

fn unexpected(index: usize, token: &Token) -> EvalError {
    EvalError::UnexpectedToken {
        index,
        text: token.text().to_string(),
    }
}

/// Tokenizes, retags unary operators and evaluates `input` in one call.
pub fn evaluate_text<C: ExprContext>(input: &str, context: &mut C) -> ExprResult<i32> {
    let mut tokens = tokenize(input)?;
    retag_unary(&mut tokens);
    let value = Evaluator::new(context).evaluate(&tokens)?;
    Ok(value)
}
