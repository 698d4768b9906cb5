//! Tokenizer for monitor expressions. At every position the rules below are
//! tried in order and the first one that matches wins; whitespace is consumed
//! but never emitted.

use std::fmt;

use smallvec::SmallVec;

use super::error::LexError;

/// Longest token text kept, in bytes.
pub const MAX_TOKEN_LEN: usize = 31;
/// Token buffer capacity for one expression.
pub const MAX_TOKENS: usize = 32;

pub type TokenStream = SmallVec<[Token; MAX_TOKENS]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    End,
    Decimal,
    Hex,
    Register,
    Eq,
    Ne,
    And,
    Or,
    Shl,
    Shr,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Negate,
    Deref,
}

impl TokenKind {
    /// Tokens that end an operand; a `-` or `*` after one of these is binary.
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenKind::Decimal | TokenKind::Hex | TokenKind::Register | TokenKind::RParen
        )
    }
}

/// Token text in a fixed inline buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenText {
    buf: [u8; MAX_TOKEN_LEN],
    len: u8,
}

impl TokenText {
    fn new(text: &str) -> Self {
        debug_assert!(text.len() <= MAX_TOKEN_LEN);
        let mut buf = [0u8; MAX_TOKEN_LEN];
        buf[..text.len()].copy_from_slice(text.as_bytes());
        Self {
            buf,
            len: text.len() as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }
}

impl fmt::Debug for TokenText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: TokenText,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str) -> Self {
        Self {
            kind,
            text: TokenText::new(text),
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }
}

#[derive(Clone, Copy)]
enum Pattern {
    Whitespace,
    Hex,
    Decimal,
    Register,
    Exact(&'static str),
}

impl Pattern {
    /// Length of the match anchored at the start of `rest`, zero if none.
    fn match_len(self, rest: &[u8]) -> usize {
        match self {
            Pattern::Whitespace => rest.iter().take_while(|b| matches!(b, b' ' | b'\t')).count(),
            Pattern::Hex => {
                if rest.len() > 2 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X') {
                    let digits = rest[2..].iter().take_while(|b| b.is_ascii_hexdigit()).count();
                    if digits > 0 {
                        return 2 + digits;
                    }
                }
                0
            }
            Pattern::Decimal => match rest.first() {
                Some(b'0') => 1,
                Some(b'1'..=b'9') => 1 + rest[1..].iter().take_while(|b| b.is_ascii_digit()).count(),
                _ => 0,
            },
            Pattern::Register => {
                if rest.first() != Some(&b'$') {
                    return 0;
                }
                let letters = rest[1..].iter().take_while(|b| b.is_ascii_alphabetic()).count();
                if letters == 0 { 0 } else { 1 + letters }
            }
            Pattern::Exact(op) => {
                if rest.starts_with(op.as_bytes()) {
                    op.len()
                } else {
                    0
                }
            }
        }
    }
}

struct Rule {
    name: &'static str,
    pattern: Pattern,
    // None for input that is matched and dropped.
    kind: Option<TokenKind>,
}

const fn rule(name: &'static str, pattern: Pattern, kind: Option<TokenKind>) -> Rule {
    Rule {
        name,
        pattern,
        kind,
    }
}

const RULES: &[Rule] = &[
    rule("spaces", Pattern::Whitespace, None),
    rule("hex", Pattern::Hex, Some(TokenKind::Hex)),
    rule("dec", Pattern::Decimal, Some(TokenKind::Decimal)),
    rule("reg", Pattern::Register, Some(TokenKind::Register)),
    rule("==", Pattern::Exact("=="), Some(TokenKind::Eq)),
    rule("!=", Pattern::Exact("!="), Some(TokenKind::Ne)),
    rule("&&", Pattern::Exact("&&"), Some(TokenKind::And)),
    rule("||", Pattern::Exact("||"), Some(TokenKind::Or)),
    rule("<<", Pattern::Exact("<<"), Some(TokenKind::Shl)),
    rule(">>", Pattern::Exact(">>"), Some(TokenKind::Shr)),
    rule("<=", Pattern::Exact("<="), Some(TokenKind::Le)),
    rule(">=", Pattern::Exact(">="), Some(TokenKind::Ge)),
    rule("+", Pattern::Exact("+"), Some(TokenKind::Plus)),
    rule("-", Pattern::Exact("-"), Some(TokenKind::Minus)),
    rule("*", Pattern::Exact("*"), Some(TokenKind::Star)),
    rule("/", Pattern::Exact("/"), Some(TokenKind::Slash)),
    rule("(", Pattern::Exact("("), Some(TokenKind::LParen)),
    rule(")", Pattern::Exact(")"), Some(TokenKind::RParen)),
    rule("<", Pattern::Exact("<"), Some(TokenKind::Lt)),
    rule(">", Pattern::Exact(">"), Some(TokenKind::Gt)),
];

pub struct Lexer<'src> {
    src: &'src str,
    offset: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self { src, offset: 0 }
    }

    /// Produces the next token, or `TokenKind::End` once input is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let rest = &self.src.as_bytes()[self.offset..];
            if rest.is_empty() {
                return Ok(Token::new(TokenKind::End, ""));
            }

            let position = self.offset;
            let (rule, len) = RULES
                .iter()
                .find_map(|rule| {
                    let len = rule.pattern.match_len(rest);
                    (len > 0).then_some((rule, len))
                })
                .ok_or(LexError::NoMatch { position })?;
            // Every pattern matches ASCII only, so `position + len` is a char boundary.
            let text = &self.src[position..position + len];
            log::debug!(
                "match rule \"{}\" at position {position} with len {len}: {text}",
                rule.name
            );
            self.offset += len;

            if let Some(kind) = rule.kind {
                if len > MAX_TOKEN_LEN {
                    return Err(LexError::TokenTooLong { position, len });
                }
                return Ok(Token::new(kind, text));
            }
        }
    }
}

/// Splits `input` into tokens. Fails as a whole: no partial stream is returned.
pub fn tokenize(input: &str) -> Result<TokenStream, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = TokenStream::new();
    loop {
        let token = lexer.next_token()?;
        if token.kind == TokenKind::End {
            return Ok(tokens);
        }
        if tokens.len() == MAX_TOKENS {
            return Err(LexError::TooManyTokens { limit: MAX_TOKENS });
        }
        tokens.push(token);
    }
}

/// Reinterprets `-` as negation and `*` as dereference wherever no operand
/// precedes them.
pub fn retag_unary(tokens: &mut [Token]) {
    let mut prev: Option<TokenKind> = None;
    for token in tokens.iter_mut() {
        let unary = !prev.is_some_and(TokenKind::ends_operand);
        match token.kind {
            TokenKind::Minus if unary => token.kind = TokenKind::Negate,
            TokenKind::Star if unary => token.kind = TokenKind::Deref,
            _ => {}
        }
        prev = Some(token.kind);
    }
}
