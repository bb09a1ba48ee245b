//! Recursive descent parser for the Lodestar script language.

use crate::Error;
use crate::ast::*;
use crate::lexer::{Scanner, Span, Token, TokenKind};
use std::rc::Rc;

/// Parses source text into a [`Program`].
pub fn parse(source: &str) -> Result<Program, Error> {
    Parser::new(source).parse_program()
}

/// A recursive descent parser for Lodestar script.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self { scanner, current }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, Error> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    /// Parses a single statement.
    fn parse_statement(&mut self) -> Result<Stmt, Error> {
        match &self.current.kind {
            TokenKind::Var | TokenKind::Let => self.parse_variable_declaration(),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => {
                self.advance();
                self.terminate_statement();
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                self.terminate_statement();
                Ok(Stmt::Continue)
            }
            TokenKind::LeftBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Block(Vec::new()))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<Stmt, Error> {
        self.advance(); // consume 'var' / 'let'

        let name = self.expect_identifier("variable name")?;
        let init = if self.matches(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.terminate_statement();
        Ok(Stmt::Var { name, init })
    }

    fn parse_function_declaration(&mut self) -> Result<Stmt, Error> {
        self.advance(); // consume 'function'
        let name = self.expect_identifier("function name")?;
        let func = self.parse_function_rest(Some(name))?;
        Ok(Stmt::Function(func))
    }

    /// Parses parameters and body, after the `function` keyword and
    /// optional name have been consumed.
    fn parse_function_rest(&mut self, name: Option<String>) -> Result<FunctionLiteral, Error> {
        self.expect(&TokenKind::LeftParen, "'('")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')'")?;

        let body = self.parse_block()?;
        Ok(FunctionLiteral {
            name,
            params,
            body: Rc::new(body),
        })
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, Error> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;

        let consequent = self.parse_block()?;
        let alternate = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                // else-if chains nest as a single-statement block
                Some(vec![self.parse_if_statement()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            consequent,
            alternate,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, Error> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, Error> {
        self.advance(); // consume 'return'

        let value = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.terminate_statement();
        Ok(Stmt::Return(value))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, Error> {
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(body)
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Error> {
        let expr = self.parse_expression()?;
        self.terminate_statement();
        Ok(Stmt::Expr(expr))
    }

    /// Parses an expression (lowest precedence: assignment).
    pub fn parse_expression(&mut self) -> Result<Expr, Error> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, Error> {
        let target = self.parse_logical_or()?;

        if self.matches(&TokenKind::Equal) {
            let value = self.parse_assignment()?; // right-associative
            match target {
                Expr::Identifier(_) | Expr::Member { .. } | Expr::Index { .. } => {
                    return Ok(Expr::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    });
                }
                _ => return Err(self.error_here("invalid assignment target")),
            }
        }

        Ok(target)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_logical_and()?;
        while self.matches(&TokenKind::PipePipe) {
            let right = self.parse_logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_equality()?;
        while self.matches(&TokenKind::AmpAmp) {
            let right = self.parse_equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = if self.matches(&TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else if self.matches(&TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.matches(&TokenKind::Less) {
                BinaryOp::Less
            } else if self.matches(&TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else if self.matches(&TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.matches(&TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else {
                break;
            };
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_factor()?;
        loop {
            let op = if self.matches(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(&TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.matches(&TokenKind::Star) {
                BinaryOp::Multiply
            } else if self.matches(&TokenKind::Slash) {
                BinaryOp::Divide
            } else if self.matches(&TokenKind::Percent) {
                BinaryOp::Remainder
            } else {
                break;
            };
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        if self.matches(&TokenKind::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.matches(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        if self.matches(&TokenKind::Await) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Await(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.matches(&TokenKind::Dot) {
                let property = self.expect_identifier("property name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.matches(&TokenKind::LeftBracket) {
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RightBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.matches(&TokenKind::LeftParen) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RightParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RightParen, "')'")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        let kind = self.current.kind.clone();
        match kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::String(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Undefined => {
                self.advance();
                Ok(Expr::Undefined)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier(name))
            }
            TokenKind::Function => {
                self.advance();
                let name = match &self.current.kind {
                    TokenKind::Identifier(_) => Some(self.expect_identifier("function name")?),
                    _ => None,
                };
                Ok(Expr::Function(self.parse_function_rest(name)?))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            TokenKind::Import => Err(Error::SyntaxError(format!(
                "'import' is reserved for the host dynamic-import form (byte {})",
                self.current.span.start
            ))),
            _ => Err(self.error_here("expected an expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, Error> {
        self.advance(); // consume '['
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RightBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
                // Trailing comma
                if self.check(&TokenKind::RightBracket) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBracket, "']'")?;
        Ok(Expr::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, Error> {
        self.advance(); // consume '{'
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key = match self.current.kind.clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        name
                    }
                    TokenKind::String(value) => {
                        self.advance();
                        value
                    }
                    _ => return Err(self.error_here("expected a property name")),
                };
                self.expect(&TokenKind::Colon, "':'")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RightBrace) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Expr::Object(entries))
    }

    // Token plumbing

    fn advance(&mut self) -> Token {
        let next = self.scanner.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), Error> {
        if self.matches(kind) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, Error> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(&format!("expected {what}"))),
        }
    }

    /// Statement terminators are optional; consume one if present.
    fn terminate_statement(&mut self) {
        self.matches(&TokenKind::Semicolon);
    }

    fn error_here(&self, message: &str) -> Error {
        let Span { start, .. } = self.current.span;
        Error::SyntaxError(format!(
            "{message}, found {:?} at byte {start}",
            self.current.kind
        ))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
