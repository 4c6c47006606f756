//! Statements and local declarations.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    Block, CodeLocation, FunctionDecl, Name, NamespacedIdentifier, NodeId, NodeKind, RangedFor,
    ReturnTarget, Symbol, TokenKind, TypeFlags, TypeInfo, Value, VariableDef,
};

use crate::parser::{Mode, Parser};

impl Parser<'_> {
    /// Statements up to the end of the parsed range, as one block.
    pub(crate) fn body(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let mut stmts = Vec::new();
        while !self.check(TokenKind::Eof) {
            self.statement_into(&mut stmts)?;
        }
        Ok(self.fe.ast.push(NodeKind::Block(Block { stmts, scope: None }), loc))
    }

    /// Body of an inlined call: one local per parameter, initialised from
    /// the call-site argument, followed by the callee's statements.
    pub(crate) fn inline_body(
        &mut self,
        decl: &FunctionDecl,
        args: &[NodeId],
    ) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let mut stmts = Vec::with_capacity(decl.params.len());
        for (param, arg) in decl.params.iter().zip(args) {
            let def = VariableDef {
                symbol: Symbol::variable(NamespacedIdentifier::new(param.name), param.ty),
                init: Some(*arg),
                ctor_args: None,
                resolved: None,
            };
            stmts.push(self.fe.ast.push(NodeKind::VariableDef(def), decl.loc));
        }
        while !self.check(TokenKind::Eof) {
            self.statement_into(&mut stmts)?;
        }
        Ok(self.fe.ast.push(NodeKind::Block(Block { stmts, scope: None }), loc))
    }

    /// `{ statements }`
    pub(crate) fn block(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::LBrace)?;
        self.enter()?;
        self.push_alias_scope();
        let mut stmts = Vec::new();
        let result = loop {
            if self.check(TokenKind::RBrace) {
                break self.advance().map(|_| ());
            }
            if self.check(TokenKind::Eof) {
                break Err(self.unexpected(ErrorCode::E1001, "`}`"));
            }
            if let Err(e) = self.statement_into(&mut stmts) {
                break Err(e);
            }
        };
        self.pop_alias_scope();
        self.leave();
        result?;
        Ok(self.fe.ast.push(NodeKind::Block(Block { stmts, scope: None }), loc))
    }

    /// A single statement; several declarators become a block.
    pub(crate) fn statement(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let mut stmts = Vec::with_capacity(1);
        self.statement_into(&mut stmts)?;
        if let [single] = stmts.as_slice() {
            return Ok(*single);
        }
        Ok(self.fe.ast.push(NodeKind::Block(Block { stmts, scope: None }), loc))
    }

    pub(crate) fn statement_into(&mut self, out: &mut Vec<NodeId>) -> Result<(), CompileError> {
        let loc = self.loc();
        let node = match self.tok.kind() {
            TokenKind::LBrace => self.block()?,
            TokenKind::If => self.if_statement()?,
            TokenKind::While => self.while_statement()?,
            TokenKind::For => self.for_statement()?,
            TokenKind::Return => {
                self.advance()?;
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Semicolon)?;
                let target = if self.mode == Mode::Inline {
                    ReturnTarget::Inline
                } else {
                    ReturnTarget::Function
                };
                self.fe.ast.push(NodeKind::Return { value, target }, loc)
            }
            TokenKind::Break | TokenKind::Continue => {
                let kind = if self.check(TokenKind::Break) {
                    NodeKind::Break
                } else {
                    NodeKind::Continue
                };
                self.advance()?;
                self.expect(TokenKind::Semicolon)?;
                self.fe.ast.push(kind, loc)
            }
            TokenKind::Using => {
                self.alias_declaration()?;
                return Ok(());
            }
            TokenKind::Semicolon => {
                self.advance()?;
                return Ok(());
            }
            TokenKind::Static => {
                self.advance()?;
                let ty = self.ty()?.with_flags(TypeFlags::STATIC);
                return self.declarators(ty, out);
            }
            _ => {
                if let Some(ty) = self.declaration_type()? {
                    return self.declarators(ty, out);
                }
                let expr = self.expression()?;
                self.expect(TokenKind::Semicolon)?;
                expr
            }
        };
        out.push(node);
        Ok(())
    }

    /// Speculatively match `Type identifier`, leaving the cursor on the
    /// identifier. Restores and returns `None` otherwise.
    fn declaration_type(&mut self) -> Result<Option<TypeInfo>, CompileError> {
        let checkpoint = self.tok.save();
        match self.try_type()? {
            Some(ty) if self.check(TokenKind::Ident) => Ok(Some(ty)),
            _ => {
                self.tok.restore(checkpoint);
                Ok(None)
            }
        }
    }

    /// `name [= init | (args)] {, name [= init | (args)]} ;`
    pub(crate) fn declarators(
        &mut self,
        ty: TypeInfo,
        out: &mut Vec<NodeId>,
    ) -> Result<(), CompileError> {
        loop {
            let (name, loc) = self.ident()?;
            let def = self.variable_rest(NamespacedIdentifier::new(name), ty)?;
            out.push(self.fe.ast.push(NodeKind::VariableDef(def), loc));
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// Initializer part of a variable definition.
    pub(crate) fn variable_rest(
        &mut self,
        id: NamespacedIdentifier,
        ty: TypeInfo,
    ) -> Result<VariableDef, CompileError> {
        let mut def = VariableDef {
            symbol: Symbol::variable(id, ty),
            init: None,
            ctor_args: None,
            resolved: None,
        };
        if self.eat(TokenKind::Eq)? {
            def.init = Some(if self.check(TokenKind::LBrace) {
                self.initializer_list()?
            } else {
                self.ternary()?
            });
        } else if self.check(TokenKind::LParen) {
            def.ctor_args = Some(self.call_args()?);
        } else if self.check(TokenKind::LBrace) {
            def.init = Some(self.initializer_list()?);
        }
        Ok(def)
    }

    /// `using Name = Type;`
    pub(crate) fn alias_declaration(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Using)?;
        let (name, _) = self.ident()?;
        self.expect(TokenKind::Eq)?;
        let ty = self.ty()?;
        self.expect(TokenKind::Semicolon)?;
        self.declare_alias(name, ty);
        Ok(())
    }

    fn if_statement(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.statement()?;
        let else_branch = if self.eat(TokenKind::Else)? {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(self.fe.ast.push(
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            },
            loc,
        ))
    }

    fn while_statement(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let body = self.statement()?;
        Ok(self.fe.ast.push(
            NodeKind::While {
                cond,
                body,
                post: None,
            },
            loc,
        ))
    }

    /// Ranged `for (T [&] it : range)` or C-style `for (init; cond; post)`,
    /// the latter lowered to `{ init; while (cond) body [post] }`.
    fn for_statement(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let line = self.line();
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        let checkpoint = self.tok.save();
        if let Some(ty) = self.try_type()? {
            if self.check(TokenKind::Ident) {
                let (name, _) = self.ident()?;
                if self.eat(TokenKind::Colon)? {
                    return self.ranged_for(ty, name, line, loc);
                }
            }
        }
        self.tok.restore(checkpoint);

        let mut stmts = Vec::new();
        if !self.eat(TokenKind::Semicolon)? {
            self.statement_into(&mut stmts)?;
        }
        let cond = if self.check(TokenKind::Semicolon) {
            self.fe.ast.push(NodeKind::Literal(Value::Bool(true)), loc)
        } else {
            self.expression()?
        };
        self.expect(TokenKind::Semicolon)?;
        let post = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::RParen)?;
        let body = self.statement()?;
        stmts.push(self.fe.ast.push(NodeKind::While { cond, body, post }, loc));
        Ok(self.fe.ast.push(NodeKind::Block(Block { stmts, scope: None }), loc))
    }

    fn ranged_for(
        &mut self,
        ty: TypeInfo,
        name: Name,
        line: usize,
        loc: CodeLocation,
    ) -> Result<NodeId, CompileError> {
        let range = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let body = self.statement()?;
        let namespace = self.fe.interner.intern(&format!("for@{line}"));
        let iterator = Symbol::variable(
            self.function.child(namespace).child(name),
            ty.without_flags(TypeFlags::REF),
        );
        Ok(self.fe.ast.push(
            NodeKind::RangedFor(RangedFor {
                iterator,
                by_ref: ty.is_ref(),
                range,
                body,
                resolved: None,
                scope: None,
            }),
            loc,
        ))
    }
}
