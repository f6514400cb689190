//! Lexer and recursive-descent parser for condition and update expressions.
//!
//! Keywords and function names match case-insensitively.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::ast::{
    AddAction, AttributePath, CompareOp, DeleteAction, Expr, FunctionName, LogicalOp, Operand,
    PathElement, SetAction, SetValue, UpdateExpr,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// An unexpected token was encountered.
    #[error("Invalid expression: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
    /// An expression attribute name placeholder has no substitution.
    #[error("An expression attribute name used in the document path is not defined; attribute name: {name}")]
    UnresolvedName {
        /// The placeholder.
        name: String,
    },
    /// An expression attribute value placeholder has no substitution.
    #[error("An expression attribute value used in expression is not defined; attribute value: {name}")]
    UnresolvedValue {
        /// The placeholder.
        name: String,
    },
    /// An operand is invalid for the operation.
    #[error("Invalid operand for {operation}: {message}")]
    InvalidOperand {
        /// Operation or function name.
        operation: String,
        /// Explanation.
        message: String,
    },
    /// Operand types do not fit the operation.
    #[error("Type mismatch: {message}")]
    TypeMismatch {
        /// Explanation.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    /// `#name`, prefix included.
    NameRef(String),
    /// `:value`, prefix included.
    ValueRef(String),
    Number(usize),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    Between,
    In,
    Set,
    Remove,
    Add,
    Delete,
    Function(FunctionName),
    Size,
    IfNotExists,
    ListAppend,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::NameRef(s) | Self::ValueRef(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Eq => write!(f, "'='"),
            Self::Ne => write!(f, "'<>'"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
            Self::Between => write!(f, "BETWEEN"),
            Self::In => write!(f, "IN"),
            Self::Set => write!(f, "SET"),
            Self::Remove => write!(f, "REMOVE"),
            Self::Add => write!(f, "ADD"),
            Self::Delete => write!(f, "DELETE"),
            Self::Function(name) => write!(f, "{name}"),
            Self::Size => write!(f, "size"),
            Self::IfNotExists => write!(f, "if_not_exists"),
            Self::ListAppend => write!(f, "list_append"),
            Self::Eof => write!(f, "end of expression"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }
        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        let token = match ch {
            '#' => self.read_placeholder('#', Token::NameRef)?,
            ':' => self.read_placeholder(':', Token::ValueRef)?,
            '=' => self.bump(Token::Eq),
            '<' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => self.bump(Token::Le),
                    Some('>') => self.bump(Token::Ne),
                    _ => Token::Lt,
                }
            }
            '>' => {
                self.chars.next();
                if self.chars.peek() == Some(&'=') {
                    self.bump(Token::Ge)
                } else {
                    Token::Gt
                }
            }
            '+' => self.bump(Token::Plus),
            '-' => self.bump(Token::Minus),
            '.' => self.bump(Token::Dot),
            ',' => self.bump(Token::Comma),
            '(' => self.bump(Token::LParen),
            ')' => self.bump(Token::RParen),
            '[' => self.bump(Token::LBracket),
            ']' => self.bump(Token::RBracket),
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_word(),
            _ => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "valid token".to_owned(),
                    found: format!("'{ch}'"),
                });
            }
        };
        Ok(token)
    }

    fn read_placeholder(&mut self, prefix: char, wrap: fn(String) -> Token) -> Result<Token, ExpressionError> {
        self.chars.next();
        let name = self.read_ident_chars();
        if name.is_empty() {
            return Err(ExpressionError::UnexpectedToken {
                expected: format!("placeholder name after '{prefix}'"),
                found: "nothing".to_owned(),
            });
        }
        Ok(wrap(format!("{prefix}{name}")))
    }

    fn read_number(&mut self) -> Result<Token, ExpressionError> {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.chars.next();
        }
        digits
            .parse()
            .map(Token::Number)
            .map_err(|_| ExpressionError::InvalidOperand {
                operation: "list index".to_owned(),
                message: format!("'{digits}' is not a valid index"),
            })
    }

    fn read_ident_chars(&mut self) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        s
    }

    fn read_word(&mut self) -> Token {
        let word = self.read_ident_chars();
        match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "between" => Token::Between,
            "in" => Token::In,
            "set" => Token::Set,
            "remove" => Token::Remove,
            "add" => Token::Add,
            "delete" => Token::Delete,
            "attribute_exists" => Token::Function(FunctionName::AttributeExists),
            "attribute_not_exists" => Token::Function(FunctionName::AttributeNotExists),
            "attribute_type" => Token::Function(FunctionName::AttributeType),
            "begins_with" => Token::Function(FunctionName::BeginsWith),
            "contains" => Token::Function(FunctionName::Contains),
            "size" => Token::Size,
            "if_not_exists" => Token::IfNotExists,
            "list_append" => Token::ListAppend,
            _ => Token::Identifier(word),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> ExpressionError {
        ExpressionError::UnexpectedToken {
            expected: expected.to_owned(),
            found: self.peek().to_string(),
        }
    }

    fn finish(&self) -> Result<(), ExpressionError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    /// Parse `item (, item)*`.
    fn comma_separated<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<Vec<T>, ExpressionError> {
        let mut items = vec![item(self)?];
        while self.eat(&Token::Comma) {
            items.push(item(self)?);
        }
        Ok(items)
    }
}

// -- conditions: OR < AND < NOT < primary -----------------------------------

impl Parser {
    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::LParen) {
            let expr = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }
        if let Token::Function(name) = *self.peek() {
            self.advance();
            self.expect(&Token::LParen)?;
            let args = self.comma_separated(Self::parse_operand)?;
            self.expect(&Token::RParen)?;
            if args.len() != name.arity() {
                return Err(ExpressionError::InvalidOperand {
                    operation: name.to_string(),
                    message: format!("expected {} arguments, found {}", name.arity(), args.len()),
                });
            }
            return Ok(Expr::Function { name, args });
        }
        let left = self.parse_operand()?;
        self.parse_comparison(left)
    }

    fn parse_comparison(&mut self, left: Operand) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::Between => {
                self.advance();
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                return Ok(Expr::Between { value: left, low, high });
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let list = self.comma_separated(Self::parse_operand)?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::In { value: left, list });
            }
            _ => return Err(self.unexpected("comparison operator, BETWEEN or IN")),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }
}

// -- operands and paths -----------------------------------------------------

impl Parser {
    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.peek() {
            Token::ValueRef(_) => {
                let Token::ValueRef(name) = self.advance() else {
                    return Err(self.unexpected("value placeholder"));
                };
                Ok(Operand::Value(name))
            }
            Token::Size => {
                self.advance();
                self.expect(&Token::LParen)?;
                let path = self.parse_path()?;
                self.expect(&Token::RParen)?;
                Ok(Operand::Size(path))
            }
            _ => Ok(Operand::Path(self.parse_path()?)),
        }
    }

    fn parse_path(&mut self) -> Result<AttributePath, ExpressionError> {
        let mut elements = vec![self.parse_path_name()?];
        loop {
            if self.eat(&Token::Dot) {
                elements.push(self.parse_path_name()?);
            } else if self.eat(&Token::LBracket) {
                let idx = match self.advance() {
                    Token::Number(idx) => idx,
                    other => {
                        return Err(ExpressionError::UnexpectedToken {
                            expected: "list index".to_owned(),
                            found: other.to_string(),
                        });
                    }
                };
                self.expect(&Token::RBracket)?;
                elements.push(PathElement::Index(idx));
            } else {
                return Ok(AttributePath { elements });
            }
        }
    }

    fn parse_path_name(&mut self) -> Result<PathElement, ExpressionError> {
        match self.advance() {
            Token::Identifier(name) | Token::NameRef(name) => Ok(PathElement::Attribute(name)),
            other => Err(ExpressionError::UnexpectedToken {
                expected: "attribute name or #name".to_owned(),
                found: other.to_string(),
            }),
        }
    }
}

// -- update expressions -----------------------------------------------------

impl Parser {
    fn parse_update(&mut self) -> Result<UpdateExpr, ExpressionError> {
        let mut update = UpdateExpr::default();
        let mut seen = Vec::new();
        loop {
            let clause = self.advance();
            if seen.contains(&clause) {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "each clause at most once".to_owned(),
                    found: format!("second {clause} clause"),
                });
            }
            match clause {
                Token::Set => update.set_actions = self.comma_separated(Self::parse_set_action)?,
                Token::Remove => update.remove_paths = self.comma_separated(Self::parse_path)?,
                Token::Add => {
                    update.add_actions = self.comma_separated(|p| {
                        Ok(AddAction {
                            path: p.parse_path()?,
                            value: p.parse_operand()?,
                        })
                    })?;
                }
                Token::Delete => {
                    update.delete_actions = self.comma_separated(|p| {
                        Ok(DeleteAction {
                            path: p.parse_path()?,
                            value: p.parse_operand()?,
                        })
                    })?;
                }
                Token::Eof if !seen.is_empty() => return Ok(update),
                other => {
                    return Err(ExpressionError::UnexpectedToken {
                        expected: "SET, REMOVE, ADD or DELETE".to_owned(),
                        found: other.to_string(),
                    });
                }
            }
            seen.push(clause);
        }
    }

    fn parse_set_action(&mut self) -> Result<SetAction, ExpressionError> {
        let path = self.parse_path()?;
        self.expect(&Token::Eq)?;
        let value = self.parse_set_value()?;
        Ok(SetAction { path, value })
    }

    /// `term ((+|-) term)*`, left-associative.
    fn parse_set_value(&mut self) -> Result<SetValue, ExpressionError> {
        let mut value = self.parse_set_term()?;
        loop {
            if self.eat(&Token::Plus) {
                value = SetValue::Plus(Box::new(value), Box::new(self.parse_set_term()?));
            } else if self.eat(&Token::Minus) {
                value = SetValue::Minus(Box::new(value), Box::new(self.parse_set_term()?));
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_set_term(&mut self) -> Result<SetValue, ExpressionError> {
        match self.peek() {
            Token::IfNotExists => {
                self.advance();
                self.expect(&Token::LParen)?;
                let path = self.parse_path()?;
                self.expect(&Token::Comma)?;
                let default = self.parse_operand()?;
                self.expect(&Token::RParen)?;
                Ok(SetValue::IfNotExists(path, default))
            }
            Token::ListAppend => {
                self.advance();
                self.expect(&Token::LParen)?;
                let first = self.parse_operand()?;
                self.expect(&Token::Comma)?;
                let second = self.parse_operand()?;
                self.expect(&Token::RParen)?;
                Ok(SetValue::ListAppend(first, second))
            }
            _ => Ok(SetValue::Operand(self.parse_operand()?)),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a condition expression.
pub fn parse_condition(input: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_or()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse an update expression.
pub fn parse_update(input: &str) -> Result<UpdateExpr, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let update = parser.parse_update()?;
    parser.finish()?;
    Ok(update)
}

/// Parse a projection expression into its paths.
pub fn parse_projection(input: &str) -> Result<Vec<AttributePath>, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let paths = parser.comma_separated(Parser::parse_path)?;
    parser.finish()?;
    Ok(paths)
}
