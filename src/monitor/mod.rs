//! The debugging monitor: expression language, watchpoints and the session
//! that ties them to a running machine.

pub mod config;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod session;
pub mod watchpoint;

pub use config::MonitorConfig;
pub use error::{EvalError, ExprError, ExprResult, LexError, WpError};
pub use expr::{Evaluator, ExprContext, MachineView, evaluate_text};
pub use lexer::{Lexer, Token, TokenKind, TokenStream, retag_unary, tokenize};
pub use session::{ExecutionDriver, Monitor, RunOutcome, StepOutcome};
pub use watchpoint::{WatchpointHit, WatchpointId, WatchpointInfo, WatchpointPool};
