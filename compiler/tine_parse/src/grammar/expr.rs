//! Expression parsing.
//!
//! Assignment and the ternary are parsed by hand; every binary level from
//! `||` down to multiplicative goes through one precedence-climbing loop
//! driven by [`binary_op`].

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    AssignOp, BinaryOp, Call, CodeLocation, NamespacedIdentifier, NodeId, NodeKind, TokenKind,
    UnaryOp, Value,
};
use tine_lexer::IncrementForm;
use tine_stack::ensure_sufficient_stack;

use crate::parser::Parser;

/// Binding power of the additive level; template arguments start here.
const ADDITIVE: u8 = 9;

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::PipePipe => (BinaryOp::Or, 1),
        TokenKind::AmpAmp => (BinaryOp::And, 2),
        TokenKind::Pipe => (BinaryOp::BitOr, 3),
        TokenKind::Caret => (BinaryOp::BitXor, 4),
        TokenKind::Amp => (BinaryOp::BitAnd, 5),
        TokenKind::EqEq => (BinaryOp::Eq, 6),
        TokenKind::BangEq => (BinaryOp::NotEq, 6),
        TokenKind::Lt => (BinaryOp::Lt, 7),
        TokenKind::LtEq => (BinaryOp::LtEq, 7),
        TokenKind::Gt => (BinaryOp::Gt, 7),
        TokenKind::GtEq => (BinaryOp::GtEq, 7),
        TokenKind::Shl => (BinaryOp::Shl, 8),
        TokenKind::Shr => (BinaryOp::Shr, 8),
        TokenKind::Plus => (BinaryOp::Add, ADDITIVE),
        TokenKind::Minus => (BinaryOp::Sub, ADDITIVE),
        TokenKind::Star => (BinaryOp::Mul, 10),
        TokenKind::Slash => (BinaryOp::Div, 10),
        TokenKind::Percent => (BinaryOp::Mod, 10),
        _ => return None,
    })
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::Add,
        TokenKind::MinusEq => AssignOp::Sub,
        TokenKind::StarEq => AssignOp::Mul,
        TokenKind::SlashEq => AssignOp::Div,
        TokenKind::PercentEq => AssignOp::Mod,
        TokenKind::AmpEq => AssignOp::BitAnd,
        TokenKind::PipeEq => AssignOp::BitOr,
        TokenKind::CaretEq => AssignOp::BitXor,
        TokenKind::ShlEq => AssignOp::Shl,
        TokenKind::ShrEq => AssignOp::Shr,
        _ => return None,
    })
}

impl Parser<'_> {
    /// Full expression, including (right associative) assignment.
    pub(crate) fn expression(&mut self) -> Result<NodeId, CompileError> {
        let target = self.ternary()?;
        let Some(op) = assign_op(self.tok.kind()) else {
            return Ok(target);
        };
        let loc = self.loc();
        self.advance()?;
        let value = self.expression()?;
        Ok(self.fe.ast.push(NodeKind::Assignment { op, target, value }, loc))
    }

    pub(crate) fn ternary(&mut self) -> Result<NodeId, CompileError> {
        let cond = self.binary(1)?;
        if !self.check(TokenKind::Question) {
            return Ok(cond);
        }
        let loc = self.loc();
        self.advance()?;
        let then_expr = self.ternary()?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.ternary()?;
        Ok(self.fe.ast.push(
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            },
            loc,
        ))
    }

    /// Additive level and below.
    pub(crate) fn additive(&mut self) -> Result<NodeId, CompileError> {
        self.binary(ADDITIVE)
    }

    fn binary(&mut self, min_power: u8) -> Result<NodeId, CompileError> {
        let mut lhs = self.unary()?;
        while let Some((op, power)) = binary_op(self.tok.kind()) {
            if power < min_power {
                break;
            }
            let loc = self.loc();
            self.advance()?;
            let rhs = self.binary(power + 1)?;
            lhs = self.fe.ast.push(NodeKind::BinaryOp { op, lhs, rhs }, loc);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<NodeId, CompileError> {
        self.enter()?;
        let result = ensure_sufficient_stack(|| self.unary_inner());
        self.leave();
        result
    }

    fn unary_inner(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let op = match self.tok.kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            TokenKind::Plus => {
                self.advance()?;
                return self.unary();
            }
            TokenKind::LParen => {
                if let Some(cast) = self.try_cast()? {
                    return Ok(cast);
                }
                None
            }
            _ => None,
        };
        let Some(op) = op else {
            return self.postfix();
        };
        self.advance()?;
        let operand = self.unary()?;
        Ok(self.fe.ast.push(NodeKind::UnaryOp { op, operand }, loc))
    }

    /// `(Type) operand`, restoring the cursor if the parenthesis does not
    /// hold a type.
    fn try_cast(&mut self) -> Result<Option<NodeId>, CompileError> {
        let checkpoint = self.tok.save();
        let loc = self.loc();
        self.advance()?;
        match self.try_type()? {
            Some(target) if self.check(TokenKind::RParen) => {
                self.advance()?;
                let operand = self.unary()?;
                Ok(Some(self.fe.ast.push(
                    NodeKind::Cast {
                        operand,
                        target,
                        implicit: false,
                    },
                    loc,
                )))
            }
            _ => {
                self.tok.restore(checkpoint);
                Ok(None)
            }
        }
    }

    fn postfix(&mut self) -> Result<NodeId, CompileError> {
        let mut expr = self.primary()?;
        loop {
            let loc = self.loc();
            match self.tok.kind() {
                TokenKind::Dot => {
                    self.advance()?;
                    let (member, _) = self.ident()?;
                    if self.check(TokenKind::LParen) {
                        let args = self.call_args()?;
                        expr = self.fe.ast.push(
                            NodeKind::Call(Call {
                                callee: NamespacedIdentifier::new(member),
                                object: Some(expr),
                                template_args: Vec::new(),
                                args,
                                target: None,
                            }),
                            loc,
                        );
                    } else {
                        expr = self.fe.ast.push(
                            NodeKind::MemberAccess {
                                object: expr,
                                member,
                                resolved: None,
                            },
                            loc,
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = self.fe.ast.push(
                        NodeKind::Subscript {
                            object: expr,
                            index,
                            policy: None,
                        },
                        loc,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus
                    if self.tok.current().increment == Some(IncrementForm::Postfix) =>
                {
                    let op = if self.check(TokenKind::PlusPlus) {
                        UnaryOp::PostInc
                    } else {
                        UnaryOp::PostDec
                    };
                    self.advance()?;
                    expr = self
                        .fe
                        .ast
                        .push(NodeKind::UnaryOp { op, operand: expr }, loc);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<NodeId, CompileError> {
        let token = *self.tok.current();
        let loc = token.loc;
        match token.kind {
            TokenKind::IntLit
            | TokenKind::FloatLit
            | TokenKind::DoubleLit
            | TokenKind::True
            | TokenKind::False => {
                self.advance()?;
                let value = token.value.unwrap_or(Value::Int(0));
                Ok(self.fe.ast.push(NodeKind::Literal(value), loc))
            }
            TokenKind::StringLit => Err(CompileError::syntax(
                ErrorCode::E1001,
                "string literals are not supported in expressions",
                loc,
            )),
            TokenKind::This => {
                self.advance()?;
                Ok(self.fe.ast.push(NodeKind::This, loc))
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBrace => self.initializer_list(),
            kind if kind.is_native_type_keyword() => self.functional_cast(),
            TokenKind::Ident => self.identifier_expr(),
            _ => Err(self.unexpected(ErrorCode::E1002, "expression")),
        }
    }

    /// `{ a, b, { c, d } }`
    pub(crate) fn initializer_list(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) {
            items.push(self.ternary()?);
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.fe.ast.push(NodeKind::InitializerList(items), loc))
    }

    /// `float(x)`
    fn functional_cast(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let target = self.ty()?;
        self.expect(TokenKind::LParen)?;
        let operand = self.expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(self.fe.ast.push(
            NodeKind::Cast {
                operand,
                target,
                implicit: false,
            },
            loc,
        ))
    }

    fn identifier_expr(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let id = self.path()?;

        if id.is_plain() {
            if let Some(value) = self.int_binding(id.id()) {
                return Ok(self.fe.ast.push(NodeKind::Literal(Value::Int(value)), loc));
            }
            if self.check(TokenKind::Lt) && self.fe.function_templates.contains_key(&id.id()) {
                if let Some(call) = self.try_template_call(&id, loc)? {
                    return Ok(call);
                }
            }
        }

        if self.check(TokenKind::LParen) {
            let args = self.call_args()?;
            return Ok(self.fe.ast.push(
                NodeKind::Call(Call {
                    callee: id,
                    object: None,
                    template_args: Vec::new(),
                    args,
                    target: None,
                }),
                loc,
            ));
        }
        Ok(self.fe.ast.push(
            NodeKind::VariableRef { id, resolved: None },
            loc,
        ))
    }

    /// `name<args>(...)`; anything else restores the cursor so `<` is
    /// parsed as a comparison.
    fn try_template_call(
        &mut self,
        id: &NamespacedIdentifier,
        loc: CodeLocation,
    ) -> Result<Option<NodeId>, CompileError> {
        let checkpoint = self.tok.save();
        let template_args = match self.template_args() {
            Ok(args) if self.check(TokenKind::LParen) => args,
            _ => {
                self.tok.restore(checkpoint);
                return Ok(None);
            }
        };
        let args = self.call_args()?;
        Ok(Some(self.fe.ast.push(
            NodeKind::Call(Call {
                callee: id.clone(),
                object: None,
                template_args,
                args,
                target: None,
            }),
            loc,
        )))
    }

    pub(crate) fn call_args(&mut self) -> Result<Vec<NodeId>, CompileError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.ternary()?);
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }
}
