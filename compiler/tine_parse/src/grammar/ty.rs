//! Type expressions.
//!
//! ```text
//! type      = ["const"] core ["&"]
//! core      = native | "span" "<" type "," int ">" | "dyn" "<" type ">"
//!           | path [template_args]
//! template_args = "<" (type | int) {"," (type | int)} ">"
//! ```
//!
//! Types are matched speculatively: [`Parser::try_type`] restores the
//! cursor and returns `None` when the tokens do not name a type, which is
//! how declarations are told apart from expression statements.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{Name, NamespacedIdentifier, NativeType, TemplateArg, TokenKind, TypeInfo, Value};

use crate::consts::evaluate_constant;
use crate::parser::Parser;

impl Parser<'_> {
    /// Parse a type or fail with "expected type".
    pub(crate) fn ty(&mut self) -> Result<TypeInfo, CompileError> {
        match self.try_type()? {
            Some(ty) => Ok(ty),
            None => Err(self.unexpected(ErrorCode::E1003, "type")),
        }
    }

    /// Match a type at the cursor, or restore it and return `None`.
    pub(crate) fn try_type(&mut self) -> Result<Option<TypeInfo>, CompileError> {
        let checkpoint = self.tok.save();
        let is_const = self.eat(TokenKind::Const)?;
        let Some(mut ty) = self.type_core()? else {
            self.tok.restore(checkpoint);
            return Ok(None);
        };
        if is_const {
            ty = ty.as_const();
        }
        if self.eat(TokenKind::Amp)? {
            ty = ty.as_reference();
        }
        Ok(Some(ty))
    }

    fn type_core(&mut self) -> Result<Option<TypeInfo>, CompileError> {
        let loc = self.loc();
        let native = match self.tok.kind() {
            TokenKind::Int => Some(TypeInfo::int()),
            TokenKind::Float => Some(TypeInfo::float()),
            TokenKind::Double => Some(TypeInfo::double()),
            TokenKind::Bool => Some(TypeInfo::bool()),
            TokenKind::Void => Some(TypeInfo::void()),
            TokenKind::Auto => Some(TypeInfo::auto()),
            _ => None,
        };
        if let Some(ty) = native {
            self.advance()?;
            return Ok(Some(ty));
        }

        match self.tok.kind() {
            TokenKind::Span => {
                self.advance()?;
                self.expect(TokenKind::Lt)?;
                let element = self.ty()?;
                self.expect(TokenKind::Comma)?;
                let len = self.template_int()?;
                self.close_angle()?;
                let len = u32::try_from(len).map_err(|_| {
                    CompileError::layout(ErrorCode::E3004, "span size must be positive", loc)
                })?;
                let id = self.fe.types.span(element, len).map_err(|e| e.or_at(loc))?;
                Ok(Some(TypeInfo::complex(id)))
            }
            TokenKind::Dyn => {
                self.advance()?;
                self.expect(TokenKind::Lt)?;
                let element = self.ty()?;
                self.close_angle()?;
                let id = self.fe.types.dyn_of(element).map_err(|e| e.or_at(loc))?;
                Ok(Some(TypeInfo::complex(id)))
            }
            TokenKind::Ident => self.named_type(),
            _ => Ok(None),
        }
    }

    /// Alias, struct, struct template instance or host index type. Aliases
    /// and structs are searched from the innermost namespace outwards.
    fn named_type(&mut self) -> Result<Option<TypeInfo>, CompileError> {
        let loc = self.loc();
        let path = self.path()?;

        if let Some(ty) = self.lookup_alias(&path) {
            return Ok(Some(ty));
        }
        let name = path.id();
        if path.is_plain()
            && self.fe.struct_templates.contains_key(&name)
            && self.check(TokenKind::Lt)
        {
            let args = self.template_args()?;
            let id = self.fe.instantiate_struct(name, &args, loc)?;
            return Ok(Some(TypeInfo::complex(id)));
        }
        let types = &self.fe.types;
        let found = self
            .namespace
            .ancestors()
            .find_map(|ns| types.find_struct(&ns.join(&path), &[]));
        if let Some(id) = found {
            return Ok(Some(TypeInfo::complex(id)));
        }
        if path.is_plain() {
            return Ok(None);
        }

        let Some(policy) = self.fe.host_types.get(&path).copied() else {
            return Ok(None);
        };
        if !self.check(TokenKind::Lt) {
            return Err(self.unexpected(ErrorCode::E1007, "`<`"));
        }
        let args = self.template_args()?;
        let limit = match args.as_slice() {
            [TemplateArg::Int(n)] if *n > 0 => *n,
            _ => {
                return Err(CompileError::syntax(
                    ErrorCode::E1007,
                    format!(
                        "`{}` expects one positive integer argument",
                        path.display(&self.fe.interner)
                    ),
                    loc,
                ))
            }
        };
        let value = self.fe.interner.intern("value");
        let id = self.fe.types.index_type(path, policy, limit, value);
        Ok(Some(TypeInfo::complex(id)))
    }

    /// `a::b::c`
    pub(crate) fn path(&mut self) -> Result<NamespacedIdentifier, CompileError> {
        let (first, _) = self.ident()?;
        let mut names: Vec<Name> = vec![first];
        while self.check(TokenKind::ColonColon) {
            let checkpoint = self.tok.save();
            self.advance()?;
            if !self.check(TokenKind::Ident) {
                self.tok.restore(checkpoint);
                break;
            }
            names.push(self.ident()?.0);
        }
        Ok(NamespacedIdentifier::from_path(&names))
    }

    pub(crate) fn template_args(&mut self) -> Result<Vec<TemplateArg>, CompileError> {
        self.expect(TokenKind::Lt)?;
        let mut args = Vec::new();
        loop {
            match self.try_type()? {
                Some(ty) => args.push(TemplateArg::Type(ty)),
                None => args.push(TemplateArg::Int(self.template_int()?)),
            }
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.close_angle()?;
        Ok(args)
    }

    /// An integer constant expression inside `<...>` (no relational or
    /// shift operators at the top level).
    pub(crate) fn template_int(&mut self) -> Result<i32, CompileError> {
        let loc = self.loc();
        let node = self.additive()?;
        let value = evaluate_constant(&self.fe.ast, node, &|id| self.constant(id));
        match value.and_then(|v| v.cast(NativeType::Integer)) {
            Some(Value::Int(n)) => Ok(n),
            _ => Err(CompileError::syntax(
                ErrorCode::E1007,
                "template argument must be an integer constant",
                loc,
            )),
        }
    }
}
