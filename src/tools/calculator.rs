//! Local arithmetic evaluator.
//!
//! Grammar (standard precedence, left associative):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | number | '(' expr ')'
//! ```
//!
//! `×`, `x` and `X` are read as `*`; `÷` and `:` as `/`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use super::{Tool, ToolContext, ToolName, ToolParams, required_str};
use crate::error::{Result, ZetaError};

/// Longest run of characters that can belong to an arithmetic expression.
static EXPRESSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+(]*\s*\d[\d\s.,+\-*/×÷xX:()]*").expect("expression regex is valid")
});

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> ToolName {
        ToolName::Calculator
    }

    fn description(&self) -> &str {
        "Arithmetic calculations"
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn run(&self, params: &ToolParams, _ctx: &ToolContext) -> Result<serde_json::Value> {
        let input = required_str(params, "expression")?;
        let expression = extract_expression(input)
            .ok_or_else(|| ZetaError::ToolExecution(format!("no arithmetic found in \"{input}\"")))?;
        let value = evaluate(&expression)?;
        Ok(json!({ "expression": expression, "result": to_json_number(value) }))
    }
}

/// Pull the arithmetic part out of free text: "what is 12 x 4?" → "12 x 4".
pub fn extract_expression(text: &str) -> Option<String> {
    EXPRESSION_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().trim_end_matches(['x', 'X', ':']).trim())
        .filter(|s| s.chars().any(is_operator_char) && s.chars().any(|c| c.is_ascii_digit()))
        .max_by_key(|s| s.len())
        .map(str::to_string)
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '×' | '÷' | 'x' | 'X' | ':')
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ZetaError::ToolExecution(format!(
            "unexpected input in \"{expression}\""
        )));
    }
    if !value.is_finite() {
        return Err(ZetaError::ToolExecution("result is not a finite number".into()));
    }
    Ok(value)
}

fn to_json_number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!((value * 1e10).round() / 1e10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' | ',' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == ',' {
                        // decimal comma, as written in Turkish
                        literal.push(if d == ',' { '.' } else { d });
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = literal
                    .parse()
                    .map_err(|_| ZetaError::ToolExecution(format!("invalid number \"{literal}\"")))?;
                tokens.push(Token::Num(n));
            }
            '+' | '-' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '*' | '×' | 'x' | 'X' => {
                tokens.push(Token::Op('*'));
                chars.next();
            }
            '/' | '÷' | ':' => {
                tokens.push(Token::Op('/'));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            other => {
                return Err(ZetaError::ToolExecution(format!(
                    "unexpected character '{other}'"
                )));
            }
        }
    }
    Ok(tokens)
}

/// Nesting limit for parentheses and unary signs.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<f64> {
        let mut acc = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64> {
        let mut acc = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '/' {
                if rhs == 0.0 {
                    return Err(ZetaError::ToolExecution("division by zero".into()));
                }
                acc /= rhs;
            } else {
                acc *= rhs;
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(ZetaError::ToolExecution("expression nested too deeply".into()));
        }
        self.depth += 1;
        let value = self.primary();
        self.depth -= 1;
        value
    }

    fn primary(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Op('-')) => Ok(-self.factor()?),
            Some(Token::Op('+')) => self.factor(),
            Some(Token::Open) => {
                let v = self.expr()?;
                match self.advance() {
                    Some(Token::Close) => Ok(v),
                    _ => Err(ZetaError::ToolExecution("missing closing parenthesis".into())),
                }
            }
            _ => Err(ZetaError::ToolExecution("incomplete expression".into())),
        }
    }
}
