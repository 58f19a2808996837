use std::mem::discriminant;

use thiserror::Error;

use crate::ast::{
    BinaryOperator, Call, Declaration, DeclarationKind, Expression, ExpressionKind, NamedArg,
    Program, Statement, StatementKind, UnaryOperator,
};
use crate::error::ScriptError;
use crate::lexer;
use crate::token::{Span, Token, TokenKind};

const DEFAULT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn at(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    next_site: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if !matches!(tokens.last().map(Token::kind), Some(TokenKind::EOF)) {
            let span = tokens.last().map(Token::span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, "", span));
        }
        Self {
            tokens,
            position: 0,
            next_site: 0,
        }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        while matches!(self.kind(), TokenKind::Newline) {
            self.advance();
        }

        let mut version = DEFAULT_VERSION;
        if let TokenKind::VersionComment(text) = self.kind() {
            version = parse_version(text);
            self.advance();
        }
        self.skip_newlines();

        let declaration = if self.at_declaration() {
            let declaration = self.parse_declaration()?;
            self.expect_statement_end()?;
            Some(declaration)
        } else {
            None
        };

        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.kind(), TokenKind::EOF) {
                break;
            }
            statements.push(self.parse_statement()?);
            self.expect_statement_end()?;
        }

        Ok(Program {
            version,
            declaration,
            statements,
            site_count: self.next_site,
        })
    }

    fn at_declaration(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Identifier("indicator" | "strategy")
        ) && matches!(self.peek_kind(), TokenKind::LParen)
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Identifier("strategy") => DeclarationKind::Strategy,
            _ => DeclarationKind::Indicator,
        };
        let call = self.parse_call_rest(token.text.to_string())?;
        Ok(Declaration {
            kind,
            call,
            span: token.span,
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let span = self.current().span;
        match self.kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::Identifier(name)
                if matches!(self.peek_kind(), TokenKind::Assign | TokenKind::Reassign) =>
            {
                let name = name.to_string();
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                Ok(Statement {
                    kind: StatementKind::Assign { name, value },
                    span,
                })
            }
            TokenKind::Identifier(name) if self.at_declaration() => Err(ParseError::at(
                span,
                format!("Declaration call '{name}' must be the first statement"),
            )),
            _ => {
                let expr = self.parse_expression()?;
                Ok(Statement {
                    kind: StatementKind::Expr(expr),
                    span,
                })
            }
        }
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let span = self.advance().span;
        let condition = self.parse_expression()?;
        self.skip_newlines();
        let then_branch = Box::new(self.parse_statement()?);

        let resume = self.position;
        self.skip_newlines();
        let else_branch = if matches!(self.kind(), TokenKind::Else) {
            self.advance();
            self.skip_newlines();
            Some(Box::new(self.parse_statement()?))
        } else {
            self.position = resume;
            None
        };

        Ok(Statement {
            kind: StatementKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        })
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expression, ParseError> {
        let condition = self.parse_binary(1)?;
        if !matches!(self.kind(), TokenKind::Question) {
            return Ok(condition);
        }
        let span = self.advance().span;
        let then_expr = self.parse_ternary()?;
        self.expect(TokenKind::Colon, "':'")?;
        let else_expr = self.parse_ternary()?;
        Ok(Expression {
            kind: ExpressionKind::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        })
    }

    /// Precedence climbing over the left-associative binary operators.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some((op, precedence)) = binary_operator(self.kind())
            && precedence >= min_precedence
        {
            let span = self.advance().span;
            let right = self.parse_binary(precedence + 1)?;
            left = Expression {
                kind: ExpressionKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let op = match self.kind() {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Not => UnaryOperator::Not,
            _ => return self.parse_postfix(),
        };
        let span = self.advance().span;
        let operand = self.parse_unary()?;
        Ok(Expression {
            kind: ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_span = self.current().span;
                    let TokenKind::Identifier(name) = self.kind() else {
                        return Err(self.error("member name"));
                    };
                    self.advance();

                    expr = if let ExpressionKind::Identifier(path) = &expr.kind {
                        let path = format!("{path}.{name}");
                        let kind = if matches!(self.kind(), TokenKind::LParen) {
                            ExpressionKind::Call(self.parse_call_rest(path)?)
                        } else {
                            ExpressionKind::Identifier(path)
                        };
                        Expression {
                            kind,
                            span: expr.span,
                        }
                    } else {
                        if matches!(self.kind(), TokenKind::LParen) {
                            return Err(ParseError::at(
                                self.current().span,
                                "Only named functions can be called",
                            ));
                        }
                        Expression {
                            kind: ExpressionKind::Member {
                                object: Box::new(expr),
                                name: name.to_string(),
                            },
                            span: name_span,
                        }
                    };
                }
                TokenKind::LBracket => {
                    let span = self.advance().span;
                    let offset = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expression {
                        kind: ExpressionKind::History {
                            series: Box::new(expr),
                            offset: Box::new(offset),
                            site: self.allocate_site(),
                        },
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let span = self.current().span;
        let kind = match self.kind() {
            TokenKind::Number(value) => ExpressionKind::Number(value),
            TokenKind::String(raw) => ExpressionKind::String(unescape(raw)),
            TokenKind::Bool(value) => ExpressionKind::Boolean(value),
            TokenKind::Color(argb) => ExpressionKind::Color(argb),
            TokenKind::Identifier(name) => {
                self.advance();
                let kind = if matches!(self.kind(), TokenKind::LParen) {
                    ExpressionKind::Call(self.parse_call_rest(name.to_string())?)
                } else {
                    ExpressionKind::Identifier(name.to_string())
                };
                return Ok(Expression { kind, span });
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(expr);
            }
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(Expression { kind, span })
    }

    /// Parses `(args)` for a call whose name was already consumed.
    fn parse_call_rest(&mut self, name: String) -> Result<Call, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let site = self.allocate_site();
        let mut args = Vec::new();
        let mut named: Vec<NamedArg> = Vec::new();

        while !matches!(self.kind(), TokenKind::RParen) {
            if let TokenKind::Identifier(arg_name) = self.kind()
                && matches!(self.peek_kind(), TokenKind::Assign)
            {
                let span = self.advance().span;
                self.advance();
                if named.iter().any(|arg| arg.name == arg_name) {
                    return Err(ParseError::at(
                        span,
                        format!("Duplicate argument '{arg_name}'"),
                    ));
                }
                let value = self.parse_expression()?;
                named.push(NamedArg {
                    name: arg_name.to_string(),
                    value,
                    span,
                });
            } else {
                args.push(self.parse_expression()?);
            }

            if matches!(self.kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        Ok(Call {
            name,
            args,
            named,
            site,
        })
    }

    fn allocate_site(&mut self) -> usize {
        let site = self.next_site;
        self.next_site += 1;
        site
    }

    /// Skips blank lines and any version comment past the header.
    fn skip_newlines(&mut self) {
        while matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::VersionComment(_)
        ) {
            self.advance();
        }
    }

    fn expect_statement_end(&mut self) -> Result<(), ParseError> {
        match self.kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::EOF => Ok(()),
            _ => Err(self.error("newline")),
        }
    }

    fn expect(&mut self, expected: TokenKind<'_>, description: &str) -> Result<(), ParseError> {
        if discriminant(&self.kind()) == discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(description))
        }
    }

    fn current(&self) -> &Token<'a> {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind<'a> {
        self.current().kind
    }

    fn peek_kind(&self) -> TokenKind<'a> {
        let index = (self.position + 1).min(self.tokens.len() - 1);
        self.tokens[index].kind
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        let got = match token.kind {
            TokenKind::EOF => "end of input".to_string(),
            TokenKind::Newline => "newline".to_string(),
            _ => format!("'{}'", token.text),
        };
        ParseError::at(token.span, format!("Expected {expected}, got {got}"))
    }
}

fn binary_operator(kind: TokenKind<'_>) -> Option<(BinaryOperator, u8)> {
    let entry = match kind {
        TokenKind::Or => (BinaryOperator::Or, 1),
        TokenKind::And => (BinaryOperator::And, 2),
        TokenKind::Equal => (BinaryOperator::Equal, 3),
        TokenKind::NotEqual => (BinaryOperator::NotEqual, 3),
        TokenKind::Greater => (BinaryOperator::Greater, 3),
        TokenKind::GreaterEq => (BinaryOperator::GreaterEq, 3),
        TokenKind::Less => (BinaryOperator::Less, 3),
        TokenKind::LessEq => (BinaryOperator::LessEq, 3),
        TokenKind::Plus => (BinaryOperator::Add, 4),
        TokenKind::Minus => (BinaryOperator::Sub, 4),
        TokenKind::Star => (BinaryOperator::Mul, 5),
        TokenKind::Slash => (BinaryOperator::Div, 5),
        TokenKind::Percent => (BinaryOperator::Mod, 5),
        _ => return None,
    };
    Some(entry)
}

fn parse_version(comment: &str) -> u32 {
    comment
        .split_once('=')
        .and_then(|(_, number)| number.trim().parse().ok())
        .unwrap_or(DEFAULT_VERSION)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

/// Tokenizes and parses in one step.
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse_tokens(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("parse failed")
    }

    fn expr_text(source: &str) -> String {
        let program = parse_ok(source);
        match &program.statements[0].kind {
            StatementKind::Expr(expr) => expr.to_string(),
            StatementKind::Assign { value, .. } => value.to_string(),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(expr_text("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(expr_text("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(expr_text("10 - 4 - 3"), "((10 - 4) - 3)");
    }

    #[test]
    fn ternary_nests_into_false_branch() {
        assert_eq!(expr_text("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
    }

    #[test]
    fn logical_and_comparison_precedence() {
        assert_eq!(
            expr_text("a > 1 and b < 2 or not c == d"),
            "(((a > 1) and (b < 2)) or ((not c) == d))"
        );
        assert_eq!(expr_text("-x * 2"), "((-x) * 2)");
    }

    #[test]
    fn parses_dotted_calls_and_identifiers() {
        assert_eq!(
            expr_text("strategy.entry(\"L\", strategy.long)"),
            "strategy.entry(\"L\", strategy.long)"
        );
        assert_eq!(expr_text("x = ta.sma(close, 5)[1]"), "ta.sma(close, 5)[1]");
    }

    #[test]
    fn parses_named_arguments_after_positionals() {
        let program = parse_ok("plot(close, title=\"Close\", linewidth=2,)");
        let StatementKind::Expr(Expression {
            kind: ExpressionKind::Call(call),
            ..
        }) = &program.statements[0].kind
        else {
            panic!("expected call statement");
        };
        assert_eq!(call.name, "plot");
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.named.len(), 2);
        assert_eq!(
            call.named_arg("title").map(ToString::to_string),
            Some("\"Close\"".to_string())
        );
    }

    #[test]
    fn parses_header_declaration_and_statements() {
        let program = parse_ok(indoc! {"

            //@version=5
            indicator(\"Demo\", overlay=true)

            fast = sma(close, 5)
            plot(fast)
        "});
        assert_eq!(program.version, 5);
        let declaration = program.declaration.expect("declaration");
        assert_eq!(declaration.kind, DeclarationKind::Indicator);
        assert_eq!(declaration.call.name, "indicator");
        assert_eq!(program.statements.len(), 2);
        assert_eq!(program.site_count, 3);
    }

    #[test]
    fn version_defaults_to_one() {
        assert_eq!(parse_ok("plot(close)").version, 1);
        assert_eq!(parse_ok("//@version=abc\nplot(close)").version, 1);
    }

    #[test]
    fn if_branches_hold_single_statements() {
        let program = parse_ok(indoc! {"
            if close > open
                x = 1
            else if close < open
                x = -1
            else
                x = 0
            plot(x)
        "});
        assert_eq!(program.statements.len(), 2);
        let StatementKind::If {
            then_branch,
            else_branch,
            ..
        } = &program.statements[0].kind
        else {
            panic!("expected if statement");
        };
        assert!(matches!(then_branch.kind, StatementKind::Assign { .. }));
        let nested = else_branch.as_ref().expect("else branch");
        assert!(matches!(
            nested.kind,
            StatementKind::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn if_without_else_leaves_following_statement() {
        let program = parse_ok("if close > open\n    x = 1\nplot(close)\n");
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(
            program.statements[0].kind,
            StatementKind::If {
                else_branch: None,
                ..
            }
        ));
    }

    #[test]
    fn records_node_locations() {
        let program = parse_ok("x = 1\ny = x + 2");
        let statement = &program.statements[1];
        assert_eq!((statement.span.line, statement.span.column), (2, 1));
        let StatementKind::Assign { value, .. } = &statement.kind else {
            panic!("expected assignment");
        };
        assert_eq!((value.span.line, value.span.column), (2, 7));
    }

    #[test]
    fn errors_on_unbalanced_parenthesis() {
        let err = parse("plot(sma(close, 5)\n").expect_err("expected parse failure");
        assert_eq!(err.to_string(), "[2:1] Expected ')', got end of input");
    }

    #[test]
    fn errors_on_late_declaration() {
        let err = parse("x = 1\nindicator(\"late\")").expect_err("expected parse failure");
        assert_eq!(
            err.to_string(),
            "[2:1] Declaration call 'indicator' must be the first statement"
        );
    }

    #[test]
    fn errors_on_duplicate_named_argument() {
        let err = parse("plot(close, title=\"a\", title=\"b\")").expect_err("expected failure");
        assert!(err.to_string().contains("Duplicate argument 'title'"));
    }

    #[test]
    fn errors_on_two_statements_per_line() {
        let err = parse("x = 1 y = 2").expect_err("expected parse failure");
        assert_eq!(err.to_string(), "[1:7] Expected newline, got 'y'");
    }

    #[test]
    fn lexical_errors_surface_with_location() {
        let err = parse("x = 1 $ 2").expect_err("expected lex failure");
        assert_eq!(err.to_string(), "[1:7] Unexpected character '$'");
    }
}
