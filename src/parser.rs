use crate::error::Diagnostics;
use crate::grammar::{
    Expr, ExprKind, Literal, Operation, OperationKind, Operator, Program, Token, TokenKind, UnaryOperator,
};
use crate::value::Value;

const MAX_ARGUMENTS: usize = 255;

type ParseResult<T> = Result<T, String>;

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    index: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Parser { source, tokens, index: 0 }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.index);
        self.index += 1;
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// Consumes the next token if it has one of `kinds`.
    fn eat(&mut self, kinds: &[TokenKind]) -> Option<&'a Token> {
        match self.peek() {
            Some(t) if kinds.contains(&t.kind) => self.next(),
            _ => None,
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<&'a Token> {
        self.eat(&[kind]).ok_or_else(|| message.to_string())
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(t) => t.lexeme(self.source).to_string(),
            None => "end of line".to_string(),
        }
    }

    // =========================================================
    // Operations
    // =========================================================

    fn parse_line(&mut self) -> ParseResult<Option<Operation>> {
        let Some(first) = self.next() else {
            return Ok(None);
        };
        let kind = match first.kind {
            TokenKind::Set => OperationKind::Set,
            TokenKind::Print => OperationKind::Print,
            TokenKind::If => OperationKind::If,
            TokenKind::Else => OperationKind::Else,
            TokenKind::Endif => OperationKind::Endif,
            TokenKind::Return => OperationKind::Return,
            TokenKind::Nop => OperationKind::Nop,
            _ => return Err(format!("Unexpected token {}", first.lexeme(self.source))),
        };

        let arity = kind.arity();
        let mut operands = Vec::with_capacity(arity);
        for i in 0..arity {
            if i > 0 && self.eat(&[kind.separator()]).is_none() {
                return Err(format!(
                    "Unexpected token {}, {kind} requires {arity} expressions",
                    self.describe_next()
                ));
            }
            operands.push(self.parse_or()?);
        }

        if kind == OperationKind::Set && operands[0].as_variable().is_none() {
            return Err("SET target must be an identifier".to_string());
        }

        if self.eat(&[TokenKind::Semicolon]).is_none() {
            return Err(match self.peek() {
                Some(t) => format!(
                    "Unexpected token {}, {kind} only requires {arity} expressions",
                    t.lexeme(self.source)
                ),
                None => "Expected ';' at end of line".to_string(),
            });
        }
        if let Some(extra) = self.peek() {
            return Err(format!("Unexpected token {} after ';'", extra.lexeme(self.source)));
        }

        Ok(Some(Operation { kind, operands }))
    }

    // =========================================================
    // Expressions, lowest precedence first
    // =========================================================

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_and()?;
        while self.eat(&[TokenKind::Or]).is_some() {
            let right = self.parse_and()?;
            ast = binary(ast, Operator::Or, right);
        }
        Ok(ast)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_equality()?;
        while self.eat(&[TokenKind::And]).is_some() {
            let right = self.parse_equality()?;
            ast = binary(ast, Operator::And, right);
        }
        Ok(ast)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_comparison()?;
        while let Some(tok) = self.peek_kind() {
            let op = match tok {
                TokenKind::EqualEqual => Operator::Equal,
                TokenKind::BangEqual => Operator::NotEqual,
                _ => break,
            };
            self.next();
            let right = self.parse_comparison()?;
            ast = binary(ast, op, right);
        }
        Ok(ast)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_expr()?;
        while let Some(tok) = self.peek_kind() {
            let op = match tok {
                TokenKind::Greater => Operator::Greater,
                TokenKind::GreaterEqual => Operator::GreaterEqual,
                TokenKind::Less => Operator::Less,
                TokenKind::LessEqual => Operator::LessEqual,
                _ => break,
            };
            self.next();
            let right = self.parse_expr()?;
            ast = binary(ast, op, right);
        }
        Ok(ast)
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_summand()?;
        while let Some(tok) = self.peek_kind() {
            let op = match tok {
                TokenKind::Plus => Operator::Addition,
                TokenKind::Minus => Operator::Subtraction,
                _ => break,
            };
            self.next();
            let right = self.parse_summand()?;
            ast = binary(ast, op, right);
        }
        Ok(ast)
    }

    fn parse_summand(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_unary()?;
        while let Some(tok) = self.peek_kind() {
            let op = match tok {
                TokenKind::Star => Operator::Multiplication,
                TokenKind::Slash => Operator::Division,
                _ => break,
            };
            self.next();
            let right = self.parse_unary()?;
            ast = binary(ast, op, right);
        }
        Ok(ast)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => UnaryOperator::Not,
            Some(TokenKind::Minus) => UnaryOperator::Negate,
            _ => return self.parse_postfix(),
        };
        self.next();
        let operand = self.parse_unary()?;
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand))))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut ast = self.parse_factor()?;

        loop {
            if self.eat(&[TokenKind::LeftParen]).is_some() {
                let Some(name) = ast.as_variable() else {
                    return Err("Cannot call something that is not an identifier".to_string());
                };
                let name = name.to_string();
                let args = self.parse_arguments()?;
                ast = Expr::new(ExprKind::Call(name, args));
            } else if self.eat(&[TokenKind::LeftSquare]).is_some() {
                if ast.as_variable().is_none() {
                    return Err("Cannot index something that is not an identifier".to_string());
                }
                let mut args = vec![self.parse_or()?];
                if self.eat(&[TokenKind::Colon, TokenKind::Comma]).is_some() {
                    args.push(self.parse_or()?);
                }
                self.expect(TokenKind::RightSquare, "Expect ']' after index.")?;
                ast = Expr::new(ExprKind::Index(Box::new(ast), args));
            } else {
                break;
            }
        }

        Ok(ast)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek_kind() != Some(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGUMENTS {
                    return Err("Can't have more than 255 arguments.".to_string());
                }
                args.push(self.parse_or()?);
                if self.eat(&[TokenKind::Comma]).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(args)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.next() else {
            return Err("Expect expression.".to_string());
        };
        match token.kind {
            TokenKind::True => Ok(Expr::literal(true)),
            TokenKind::False => Ok(Expr::literal(false)),
            TokenKind::Number | TokenKind::String => match &token.literal {
                Some(Literal::Int(n)) => Ok(Expr::literal(*n)),
                Some(Literal::Str(s)) => Ok(Expr::literal(Value::Str(s.clone()))),
                None => Err("Expect expression.".to_string()),
            },
            TokenKind::Identifier => Ok(Expr::variable(token.lexeme(self.source))),
            TokenKind::LeftParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RightParen, "Expect ')' after expression.")?;
                Ok(Expr::new(ExprKind::Grouping(Box::new(inner))))
            }
            _ => Err("Expect expression.".to_string()),
        }
    }
}

fn binary(left: Expr, op: Operator, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary(Box::new(left), op, Box::new(right)))
}

/// Parses every token line into at most one operation.
///
/// Parsing stops at the first error: it is reported against its line and
/// the remaining slots stay empty.
pub fn parse(source: &str, lines: &[Vec<Token>], diagnostics: &mut Diagnostics) -> Program {
    let mut program: Program = vec![None; lines.len()];

    for (line, tokens) in lines.iter().enumerate() {
        let mut parser = Parser::new(source, tokens);
        match parser.parse_line() {
            Ok(op) => program[line] = op,
            Err(message) => {
                diagnostics.report(line, message);
                break;
            }
        }
    }

    tracing::debug!(operations = program.iter().flatten().count(), "parsed");
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn parse_source(source: &str) -> Result<Program, Vec<String>> {
        let mut diagnostics = Diagnostics::new();
        let lines = tokenize(source, &mut diagnostics);
        let program = parse(source, &lines, &mut diagnostics);
        if diagnostics.has_errors() {
            Err(diagnostics.iter().map(|d| d.to_string()).collect())
        } else {
            Ok(program)
        }
    }

    fn single(source: &str) -> Operation {
        parse_source(source)
            .expect("parses")
            .into_iter()
            .flatten()
            .next()
            .expect("one operation")
    }

    #[test]
    fn one_slot_per_line() {
        let program = parse_source("SET x = 1;\n\n// note\nRETURN;").unwrap();
        assert_eq!(program.len(), 4);
        assert!(program[1].is_none());
        assert!(program[2].is_none());
        assert_eq!(program[3].as_ref().map(|op| op.kind), Some(OperationKind::Return));
    }

    #[test]
    fn precedence_climbs() {
        let op = single("SET x = 1 + 2 * 3 == 7 AND TRUE;");
        let ExprKind::Binary(left, Operator::And, _) = &op.operands[1].kind else {
            panic!("expected AND at the root: {:?}", op.operands[1]);
        };
        let ExprKind::Binary(sum, Operator::Equal, _) = &left.kind else {
            panic!("expected == under AND");
        };
        let ExprKind::Binary(_, Operator::Addition, product) = &sum.kind else {
            panic!("expected + under ==");
        };
        assert!(matches!(product.kind, ExprKind::Binary(_, Operator::Multiplication, _)));
    }

    #[test]
    fn unary_binds_tighter_than_factor() {
        let op = single("PRINT 0, -a * 2;");
        let ExprKind::Binary(left, Operator::Multiplication, _) = &op.operands[1].kind else {
            panic!("expected * at the root");
        };
        assert!(matches!(left.kind, ExprKind::Unary(UnaryOperator::Negate, _)));
    }

    #[test]
    fn calls_and_indexing() {
        let op = single("SET x = split(\",\", input);");
        let ExprKind::Call(name, args) = &op.operands[1].kind else {
            panic!("expected call: {:?}", op.operands[1]);
        };
        assert_eq!(name, "split");
        assert_eq!(args.len(), 2);

        let op = single("SET x = input[1:3];");
        assert!(matches!(&op.operands[1].kind, ExprKind::Index(_, args) if args.len() == 2));
        let op = single("SET x = input[1, 3];");
        assert!(matches!(&op.operands[1].kind, ExprKind::Index(_, args) if args.len() == 2));
        let op = single("SET x = input[0];");
        assert!(matches!(&op.operands[1].kind, ExprKind::Index(_, args) if args.len() == 1));
    }

    #[test]
    fn call_target_must_be_identifier() {
        let errors = parse_source("SET x = (a)(1);").unwrap_err();
        assert_eq!(errors, vec!["line 1: Cannot call something that is not an identifier"]);
        let errors = parse_source("SET x = \"ab\"[0];").unwrap_err();
        assert_eq!(errors, vec!["line 1: Cannot index something that is not an identifier"]);
    }

    #[test]
    fn arity_errors_name_the_token() {
        let errors = parse_source("IF x, y;").unwrap_err();
        assert_eq!(errors, vec!["line 1: Unexpected token ,, IF only requires 1 expressions"]);
        let errors = parse_source("PRINT 0;").unwrap_err();
        assert_eq!(errors, vec!["line 1: Unexpected token ;, PRINT requires 2 expressions"]);
        let errors = parse_source("SET x 1;").unwrap_err();
        assert_eq!(errors, vec!["line 1: Unexpected token 1, SET requires 2 expressions"]);
    }

    #[test]
    fn missing_semicolon() {
        let errors = parse_source("RETURN").unwrap_err();
        assert_eq!(errors, vec!["line 1: Expected ';' at end of line"]);
    }

    #[test]
    fn parsing_stops_at_first_bad_line() {
        let errors = parse_source("FOO;\nBAR;").unwrap_err();
        assert_eq!(errors, vec!["line 1: Unexpected token FOO"]);
    }

    #[test]
    fn empty_operand_is_reported() {
        let errors = parse_source("\nIF ;").unwrap_err();
        assert_eq!(errors, vec!["line 2: Expect expression."]);
    }
}
