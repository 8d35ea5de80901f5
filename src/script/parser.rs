//! Recursive-descent parser producing [`File`] trees.

use super::ast::*;
use super::lexer::{tokenize, Tok};
use super::SyntaxError;
use std::sync::Arc;

/// Deepest nesting of expressions, or of blocks, the parser accepts.
/// Later passes recurse over the tree, so this also bounds their stack use.
pub const MAX_NESTING: usize = 100;

/// Parse source text into an unresolved syntax tree.
pub fn parse(filename: &str, src: &str) -> Result<File, SyntaxError> {
    let tokens = tokenize(filename, src)?;
    let mut parser = Parser {
        filename,
        tokens,
        index: 0,
        depth: 0,
    };
    let mut stmts = Vec::new();
    while !parser.at(&Tok::Eof) {
        if parser.eat(&Tok::Newline) {
            continue;
        }
        parser.statement(&mut stmts)?;
    }
    Ok(File {
        filename: filename.to_string(),
        stmts,
        globals: Vec::new(),
    })
}

struct Parser<'a> {
    filename: &'a str,
    tokens: Vec<(Tok, Pos)>,
    index: usize,
    depth: usize,
}

type PResult<T> = Result<T, SyntaxError>;

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.index)
            .map(|(t, _)| t)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_next(&self) -> &Tok {
        self.tokens
            .get(self.index + 1)
            .map(|(t, _)| t)
            .unwrap_or(&Tok::Eof)
    }

    fn pos(&self) -> Pos {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or_default()
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let pos = self.pos();
        SyntaxError::new(self.filename, pos.line, pos.col, message)
    }

    fn expect(&mut self, tok: Tok) -> PResult<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.error(format!(
                "got {}, want {}",
                self.peek().describe(),
                tok.describe()
            )))
        }
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, what: &str, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("{} nested too deeply", what)));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run an operator-chain parser; each link it adds deepens the tree by one.
    fn chain(&mut self, f: impl FnOnce(&mut Self) -> PResult<Expr>) -> PResult<Expr> {
        let mark = self.depth;
        let result = f(self);
        self.depth = mark;
        result
    }

    fn link(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn ident(&mut self) -> PResult<Ident> {
        let pos = self.pos();
        match self.advance() {
            Tok::Name(name) => Ok(Ident::new(name, pos)),
            other => {
                self.index -= 1;
                Err(self.error(format!("got {}, want name", other.describe())))
            }
        }
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        match self.peek() {
            Tok::Def => out.push(self.def_stmt()?),
            Tok::If => out.push(self.if_stmt()?),
            Tok::For => out.push(self.for_stmt()?),
            Tok::Indent => return Err(self.error("unexpected indent")),
            _ => {
                out.push(self.simple_stmt()?);
                if !self.eat(&Tok::Newline) && !self.at(&Tok::Eof) {
                    return Err(self.error(format!(
                        "got {}, want newline",
                        self.peek().describe()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Either an indented block or a single simple statement on the same line.
    fn suite(&mut self) -> PResult<Vec<Stmt>> {
        self.nested("block", Self::suite_body)
    }

    fn suite_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        if self.eat(&Tok::Newline) {
            self.expect(Tok::Indent)?;
            while !self.eat(&Tok::Dedent) {
                if self.at(&Tok::Eof) {
                    break;
                }
                self.statement(&mut body)?;
            }
        } else {
            body.push(self.simple_stmt()?);
            if !self.eat(&Tok::Newline) && !self.at(&Tok::Eof) {
                return Err(self.error(format!(
                    "got {}, want newline",
                    self.peek().describe()
                )));
            }
        }
        Ok(body)
    }

    fn def_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        self.expect(Tok::Def)?;
        let name = self.ident()?;
        self.expect(Tok::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        while !self.at(&Tok::RParen) {
            let pname = self.ident()?;
            if params.iter().any(|p| p.name.name == pname.name) {
                return Err(SyntaxError::new(
                    self.filename,
                    pname.pos.line,
                    pname.pos.col,
                    format!("duplicate parameter: {}", pname.name),
                ));
            }
            let default = if self.eat(&Tok::Assign) {
                Some(self.test()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error("required parameter may not follow optional"));
                }
                None
            };
            params.push(Param {
                name: pname,
                default,
            });
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        self.expect(Tok::Colon)?;
        let body = self.suite()?;
        Ok(Stmt::Def(Arc::new(DefStmt {
            pos,
            name,
            params,
            body,
            num_locals: 0,
        })))
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        // Accept either `if` or `elif` as the leading keyword.
        self.advance();
        let cond = self.test()?;
        self.expect(Tok::Colon)?;
        let then = self.suite()?;
        let otherwise = if self.at(&Tok::Elif) {
            vec![self.if_stmt()?]
        } else if self.eat(&Tok::Else) {
            self.expect(Tok::Colon)?;
            self.suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            pos,
            cond,
            then,
            otherwise,
        })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        self.expect(Tok::For)?;
        let var = self.ident()?;
        self.expect(Tok::In)?;
        let iter = self.test()?;
        self.expect(Tok::Colon)?;
        let body = self.suite()?;
        Ok(Stmt::For {
            pos,
            var,
            iter,
            body,
        })
    }

    fn simple_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        match self.peek() {
            Tok::Return => {
                self.advance();
                let value = if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                    None
                } else {
                    Some(self.test()?)
                };
                Ok(Stmt::Return { pos, value })
            }
            Tok::Pass => {
                self.advance();
                Ok(Stmt::Pass(pos))
            }
            Tok::Break => {
                self.advance();
                Ok(Stmt::Break(pos))
            }
            Tok::Continue => {
                self.advance();
                Ok(Stmt::Continue(pos))
            }
            _ => {
                let expr = self.test()?;
                let op = match self.peek() {
                    Tok::Assign => None,
                    Tok::PlusEq => Some(BinOp::Add),
                    Tok::MinusEq => Some(BinOp::Sub),
                    _ => return Ok(Stmt::Expr(expr)),
                };
                self.advance();
                let target = match expr.kind {
                    ExprKind::Ident(id) => id,
                    _ => {
                        return Err(SyntaxError::new(
                            self.filename,
                            expr.pos.line,
                            expr.pos.col,
                            "can only assign to a name",
                        ))
                    }
                };
                let value = self.test()?;
                Ok(Stmt::Assign {
                    pos,
                    target,
                    op,
                    value,
                })
            }
        }
    }

    fn test(&mut self) -> PResult<Expr> {
        self.nested("expression", Self::cond_test)
    }

    fn cond_test(&mut self) -> PResult<Expr> {
        let expr = self.or_test()?;
        if self.at(&Tok::If) {
            let pos = expr.pos;
            self.advance();
            let cond = self.or_test()?;
            self.expect(Tok::Else)?;
            let otherwise = self.test()?;
            return Ok(Expr::new(
                pos,
                ExprKind::Cond {
                    cond: Box::new(cond),
                    then: Box::new(expr),
                    otherwise: Box::new(otherwise),
                },
            ));
        }
        Ok(expr)
    }

    fn or_test(&mut self) -> PResult<Expr> {
        self.chain(Self::or_test_links)
    }

    fn or_test_links(&mut self) -> PResult<Expr> {
        let mut lhs = self.and_test()?;
        while self.at(&Tok::Or) {
            self.advance();
            self.link()?;
            let rhs = self.and_test()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_test(&mut self) -> PResult<Expr> {
        self.chain(Self::and_test_links)
    }

    fn and_test_links(&mut self) -> PResult<Expr> {
        let mut lhs = self.not_test()?;
        while self.at(&Tok::And) {
            self.advance();
            self.link()?;
            let rhs = self.not_test()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_test(&mut self) -> PResult<Expr> {
        if self.at(&Tok::Not) {
            let pos = self.pos();
            self.advance();
            let operand = self.nested("expression", Self::not_test)?;
            return Ok(Expr::new(
                pos,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.chain(Self::comparison_links)
    }

    fn comparison_links(&mut self) -> PResult<Expr> {
        let mut lhs = self.arith()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinOp::Eq,
                Tok::NotEq => BinOp::Ne,
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                Tok::In => BinOp::In,
                Tok::Not if self.peek_next() == &Tok::In => {
                    self.advance();
                    BinOp::NotIn
                }
                _ => return Ok(lhs),
            };
            self.advance();
            self.link()?;
            let rhs = self.arith()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn arith(&mut self) -> PResult<Expr> {
        self.chain(Self::arith_links)
    }

    fn arith_links(&mut self) -> PResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            self.link()?;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        self.chain(Self::term_links)
    }

    fn term_links(&mut self) -> PResult<Expr> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::SlashSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            self.link()?;
            let rhs = self.factor()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn factor(&mut self) -> PResult<Expr> {
        if self.at(&Tok::Minus) {
            let pos = self.pos();
            self.advance();
            let operand = self.nested("expression", Self::factor)?;
            return Ok(Expr::new(
                pos,
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
            ));
        }
        self.primary()
    }

    fn primary(&mut self) -> PResult<Expr> {
        self.chain(Self::primary_links)
    }

    fn primary_links(&mut self) -> PResult<Expr> {
        let mut expr = self.operand()?;
        loop {
            match self.peek() {
                Tok::LParen => {
                    self.advance();
                    self.link()?;
                    let args = self.call_args()?;
                    expr = Expr::new(
                        expr.pos,
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                    );
                }
                Tok::LBrack => {
                    self.advance();
                    self.link()?;
                    let index = self.test()?;
                    self.expect(Tok::RBrack)?;
                    expr = Expr::new(
                        expr.pos,
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        while !self.at(&Tok::RParen) {
            let is_keyword =
                matches!(self.peek(), Tok::Name(_)) && self.peek_next() == &Tok::Assign;
            if is_keyword {
                let name = self.ident()?.name;
                self.advance();
                let value = self.test()?;
                args.push(Arg::Keyword { name, value });
                seen_keyword = true;
            } else {
                if seen_keyword {
                    return Err(self.error("positional argument may not follow named"));
                }
                args.push(Arg::Positional(self.test()?));
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        Ok(args)
    }

    fn operand(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        match self.advance() {
            Tok::Name(name) => Ok(Expr::new(pos, ExprKind::Ident(Ident::new(name, pos)))),
            Tok::Int(i) => Ok(Expr::new(pos, ExprKind::Int(i))),
            Tok::Str(s) => {
                // Adjacent string literals concatenate.
                let mut s = s;
                while let Tok::Str(more) = self.peek() {
                    s.push_str(more);
                    self.advance();
                }
                Ok(Expr::new(pos, ExprKind::Str(s)))
            }
            Tok::LBrack => {
                let mut items = Vec::new();
                while !self.at(&Tok::RBrack) {
                    items.push(self.test()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                self.expect(Tok::RBrack)?;
                Ok(Expr::new(pos, ExprKind::List(items)))
            }
            Tok::LParen => {
                let inner = self.test()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            other => {
                self.index -= 1;
                Err(self.error(format!("got {}, want primary expression", other.describe())))
            }
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(
        lhs.pos,
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_one_line_def() {
        let file = parse("t.fx", "def build(fx, depends_on=[\"prep\"]): cmd(\"make\")\n").unwrap();
        assert_eq!(file.stmts.len(), 1);
        let Stmt::Def(def) = &file.stmts[0] else {
            panic!("expected def");
        };
        assert_eq!(def.name.name, "build");
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.params[0].name.name, "fx");
        assert!(matches!(
            def.params[1].default.as_ref().map(|e| &e.kind),
            Some(ExprKind::List(items)) if items.len() == 1
        ));
        assert!(matches!(&def.body[0], Stmt::Expr(e) if matches!(e.kind, ExprKind::Call { .. })));
    }

    #[test]
    fn test_parser_block_statements() {
        let src = r#"
def f(x, n=2):
    total = 0
    for i in range(n):
        if i == 0:
            continue
        elif i > 5:
            break
        else:
            total += i
    return total if x else -total
"#;
        let file = parse("t.fx", src).unwrap();
        let Stmt::Def(def) = &file.stmts[0] else {
            panic!("expected def");
        };
        assert_eq!(def.body.len(), 3);
        assert!(matches!(def.body[1], Stmt::For { .. }));
        assert!(matches!(
            def.body[2],
            Stmt::Return {
                value: Some(Expr {
                    kind: ExprKind::Cond { .. },
                    ..
                }),
                ..
            }
        ));
    }

    #[test]
    fn test_parser_keyword_arguments() {
        let file = parse("t.fx", "f(1, name=\"x\")").unwrap();
        let Stmt::Expr(Expr {
            kind: ExprKind::Call { args, .. },
            ..
        }) = &file.stmts[0]
        else {
            panic!("expected call");
        };
        assert!(matches!(args[0], Arg::Positional(_)));
        assert!(matches!(&args[1], Arg::Keyword { name, .. } if name == "name"));
    }

    #[test]
    fn test_parser_positional_after_keyword_rejected() {
        let err = parse("t.fx", "f(a=1, 2)").unwrap_err();
        assert!(err.message.contains("positional"));
    }

    #[test]
    fn test_parser_not_in_precedence() {
        let file = parse("t.fx", "x = not 1 + 2 not in [3]").unwrap();
        let Stmt::Assign { value, .. } = &file.stmts[0] else {
            panic!("expected assign");
        };
        let ExprKind::Unary { op, operand } = &value.kind else {
            panic!("expected unary not");
        };
        assert_eq!(*op, UnaryOp::Not);
        assert!(matches!(
            operand.kind,
            ExprKind::Binary {
                op: BinOp::NotIn,
                ..
            }
        ));
    }

    #[test]
    fn test_parser_error_position() {
        let err = parse("t.fx", "x = 1\ny = (2 +\n").unwrap_err();
        assert_eq!(err.filename, "t.fx");
        assert!(err.line >= 2);
    }

    #[test]
    fn test_parser_deep_nesting_rejected() {
        let deep = |open: &str, close: &str, n: usize| {
            format!("x = {}1{}\n", open.repeat(n), close.repeat(n))
        };
        for src in [
            deep("(", ")", 20_000),
            deep("[", "]", 20_000),
            deep("not ", "", 20_000),
            deep("-", "", 20_000),
            format!("x = 1{}\n", " + 1".repeat(20_000)),
            format!("x = f{}\n", "()".repeat(20_000)),
        ] {
            let err = parse("t.fx", &src).unwrap_err();
            assert_eq!(err.message, "expression nested too deeply");
        }
        parse("t.fx", &deep("(", ")", MAX_NESTING / 2)).unwrap();
    }

    #[test]
    fn test_parser_deep_blocks_rejected() {
        let mut src = String::new();
        for depth in 0..=MAX_NESTING {
            src.push_str(&format!("{}if True:\n", "    ".repeat(depth)));
        }
        src.push_str(&format!("{}pass\n", "    ".repeat(MAX_NESTING + 1)));
        let err = parse("t.fx", &src).unwrap_err();
        assert!(err.message.ends_with("nested too deeply"), "{}", err.message);
    }

    #[test]
    fn test_parser_assign_to_call_rejected() {
        let err = parse("t.fx", "f() = 3").unwrap_err();
        assert!(err.message.contains("assign"));
    }
}
