//! Class-level declarations.
//!
//! ```text
//! unit     = {item}
//! item      = template | struct | enum | namespace | "using" alias | global | function
//! global    = ["static"] type declarator {"," declarator} ";"
//! function  = ["inline"] type name "(" params ")" ("{" body "}" | ";")
//! struct    = "struct" name [":" base {"," base}] "{" {member} "}" [";"]
//! enum      = "enum" ["class"] name "{" [enumerator {"," enumerator} [","]] "}" [";"]
//! namespace = "namespace" name "{" {item} "}" [";"]
//! template  = "template" "<" ("typename" | "int") name {...} ">" (struct | function)
//! ```
//!
//! Function bodies and template declarations are not parsed here. Bodies
//! are skipped and kept as source ranges; templates are kept whole until
//! an instantiation binds their parameters.
//!
//! Everything declared inside `namespace ns { ... }` is named `ns::...`.
//! Enumerators become `const int` globals under the enum's name; those of
//! a plain `enum` are also declared in the enclosing namespace.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    Block, CodeLocation, ComplexTypeDef, ComplexTypeId, FunctionDecl, FunctionDef, FunctionKind,
    MemberDecl, Name, NamespacedIdentifier, NativeType, NodeId, NodeKind, Param, SourceRange,
    Symbol, TemplateArg, TokenKind, TypeInfo, Value, VariableDef, Visibility,
};

use crate::consts::evaluate_constant;
use crate::parser::Parser;
use crate::{TemplateDecl, TemplateParam, TemplateParamKind};

/// Modifiers in front of a declaration.
#[derive(Copy, Clone, Default)]
struct Modifiers {
    is_inline: bool,
    is_static: bool,
}

impl Parser<'_> {
    /// The whole unit as a block of class-level declarations.
    ///
    /// Struct template instances created while parsing an item are placed
    /// in front of it, so they are finalised before anything uses them.
    pub(crate) fn unit(&mut self) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        let mut stmts = Vec::new();
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            self.item_into(&mut items)?;
            stmts.append(&mut self.fe.instantiated);
            stmts.append(&mut items);
        }
        Ok(self.fe.ast.push(NodeKind::Block(Block { stmts, scope: None }), loc))
    }

    fn item_into(&mut self, out: &mut Vec<NodeId>) -> Result<(), CompileError> {
        match self.tok.kind() {
            TokenKind::Template => self.template_declaration(),
            TokenKind::Struct => {
                let def = self.struct_definition(Vec::new())?;
                out.push(def);
                Ok(())
            }
            TokenKind::Enum => self.enum_definition(out),
            TokenKind::Namespace => self.namespace_block(out),
            TokenKind::Using => self.alias_declaration(),
            TokenKind::Semicolon => self.advance().map(|_| ()),
            _ => self.global_item(out),
        }
    }

    fn namespace_block(&mut self, out: &mut Vec<NodeId>) -> Result<(), CompileError> {
        self.expect(TokenKind::Namespace)?;
        let (name, _) = self.ident()?;
        self.expect(TokenKind::LBrace)?;
        self.enter()?;
        let inner = self.namespace.child(name);
        let outer = std::mem::replace(&mut self.namespace, inner);
        let result = self.namespace_items(out);
        self.namespace = outer;
        self.leave();
        result?;
        self.eat(TokenKind::Semicolon)?;
        Ok(())
    }

    fn namespace_items(&mut self, out: &mut Vec<NodeId>) -> Result<(), CompileError> {
        loop {
            match self.tok.kind() {
                TokenKind::RBrace => {
                    self.advance()?;
                    return Ok(());
                }
                TokenKind::Eof => return Err(self.unexpected(ErrorCode::E1001, "`}`")),
                // Templates are keyed by their plain name.
                TokenKind::Template => {
                    return Err(CompileError::syntax(
                        ErrorCode::E1008,
                        "templates must be declared outside a namespace",
                        self.loc(),
                    ))
                }
                _ => self.item_into(out)?,
            }
        }
    }

    /// `enum [class] Name { A, B = 4, C }`. The enum name becomes an alias
    /// of `int`; each enumerator a constant one past the previous value.
    fn enum_definition(&mut self, out: &mut Vec<NodeId>) -> Result<(), CompileError> {
        self.expect(TokenKind::Enum)?;
        let scoped = self.eat(TokenKind::Struct)?;
        let (name, _) = self.ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut enumerators = Vec::new();
        let mut next = Some(0i32);
        while !self.check(TokenKind::RBrace) {
            let (item, loc) = self.ident()?;
            let value = if self.eat(TokenKind::Eq)? {
                self.template_int()?
            } else {
                next.ok_or_else(|| {
                    CompileError::syntax(ErrorCode::E1008, "enumerator value overflows `int`", loc)
                })?
            };
            next = value.checked_add(1);
            enumerators.push((item, value, loc));
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        self.eat(TokenKind::Semicolon)?;

        let enum_id = self.namespace.child(name);
        for (item, value, loc) in enumerators {
            let mut ids = vec![enum_id.child(item)];
            if !scoped {
                ids.push(self.namespace.child(item));
            }
            for id in ids {
                let init = self.fe.ast.push(NodeKind::Literal(Value::Int(value)), loc);
                let def = VariableDef {
                    symbol: Symbol::constant(id, TypeInfo::int().as_const()),
                    init: Some(init),
                    ctor_args: None,
                    resolved: None,
                };
                self.record_constant(&def);
                out.push(self.fe.ast.push(NodeKind::VariableDef(def), loc));
            }
        }
        self.declare_alias(name, TypeInfo::int());
        Ok(())
    }

    fn modifiers(&mut self) -> Result<Modifiers, CompileError> {
        let mut mods = Modifiers::default();
        loop {
            if self.eat(TokenKind::Inline)? {
                mods.is_inline = true;
            } else if self.eat(TokenKind::Static)? {
                mods.is_static = true;
            } else {
                return Ok(mods);
            }
        }
    }

    /// Global variable(s) or a function definition.
    fn global_item(&mut self, out: &mut Vec<NodeId>) -> Result<(), CompileError> {
        let loc = self.loc();
        let mods = self.modifiers()?;
        let ty = self.ty()?;
        let (name, name_loc) = self.ident()?;
        let id = self.namespace.child(name);

        if self.check(TokenKind::LParen) {
            let signature = Signature {
                id: id.clone(),
                ret: ty,
                kind: FunctionKind::Free,
                owner: None,
                is_inline: mods.is_inline,
                visibility: Visibility::Public,
                loc,
            };
            if let Some(decl) = self.try_function(signature)? {
                out.push(self.function_def(decl));
                return Ok(());
            }
        }
        if mods.is_inline {
            return Err(CompileError::syntax(
                ErrorCode::E1008,
                "`inline` only applies to functions",
                loc,
            ));
        }

        let mut next = Some((id, name_loc));
        while let Some((id, loc)) = next.take() {
            let def = self.variable_rest(id, ty)?;
            self.record_constant(&def);
            out.push(self.fe.ast.push(NodeKind::VariableDef(def), loc));
            if self.eat(TokenKind::Comma)? {
                let (name, loc) = self.ident()?;
                next = Some((self.namespace.child(name), loc));
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// Remember the value of a `const` global usable in template arguments.
    fn record_constant(&mut self, def: &VariableDef) {
        let ty = def.symbol.ty;
        let (Some(init), Some(native)) = (def.init, ty.native_type()) else {
            return;
        };
        if !ty.is_const() {
            return;
        }
        let value = evaluate_constant(&self.fe.ast, init, &|id| self.constant(id));
        let native = if native == NativeType::Dynamic {
            value.map(|v| v.native_type())
        } else {
            Some(native)
        };
        if let Some(value) = value.zip(native).and_then(|(v, n)| v.cast(n)) {
            let key = def.symbol.id.key(&mut self.fe.interner);
            self.fe.constants.insert(key, value);
        }
    }

    fn function_def(&mut self, decl: FunctionDecl) -> NodeId {
        let loc = decl.loc;
        self.fe
            .ast
            .push(NodeKind::FunctionDef(FunctionDef { decl, func: None }), loc)
    }

    /// Parameters followed by a body or `;`, or `None` (cursor restored)
    /// if the parenthesis turns out to hold constructor arguments.
    fn try_function(&mut self, sig: Signature) -> Result<Option<FunctionDecl>, CompileError> {
        let checkpoint = self.tok.save();
        match self.params() {
            Ok(params) if self.check(TokenKind::LBrace) => {
                let body = self.skip_braced()?;
                Ok(Some(self.declare_function(sig, params, Some(body))))
            }
            Ok(params) if self.check(TokenKind::Semicolon) => {
                self.advance()?;
                Ok(Some(self.declare_function(sig, params, None)))
            }
            _ => {
                self.tok.restore(checkpoint);
                Ok(None)
            }
        }
    }

    fn declare_function(
        &mut self,
        sig: Signature,
        params: Vec<Param>,
        body: Option<SourceRange>,
    ) -> FunctionDecl {
        FunctionDecl {
            id: sig.id,
            params,
            ret: sig.ret,
            body,
            kind: sig.kind,
            owner: sig.owner,
            is_inline: sig.is_inline,
            visibility: sig.visibility,
            bindings: self.bindings.clone(),
            loc: sig.loc,
        }
    }

    /// `( [Type [name] {, Type [name]}] )`, also accepting `(void)`.
    ///
    /// An unnamed parameter gets a name no identifier can spell.
    fn params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let ty = self.ty()?;
            if ty.is_void() && params.is_empty() && self.check(TokenKind::RParen) {
                break;
            }
            let name = if self.check(TokenKind::Comma) || self.check(TokenKind::RParen) {
                self.fe.interner.intern(&format!("#{}", params.len()))
            } else {
                self.ident()?.0
            };
            params.push(Param { name, ty });
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    /// `struct Name [: Base, ...] { ... }`, declaring the type in the pool.
    pub(crate) fn struct_definition(
        &mut self,
        template_args: Vec<TemplateArg>,
    ) -> Result<NodeId, CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::Struct)?;
        let (name, _) = self.ident()?;
        let id = self.namespace.child(name);
        let ty = self
            .fe
            .types
            .declare_struct(id.clone(), template_args)
            .map_err(|e| e.or_at(loc))?;

        let mut bases = Vec::new();
        if self.eat(TokenKind::Colon)? {
            loop {
                let _ = self.eat(TokenKind::Public)? || self.eat(TokenKind::Private)?;
                let base_loc = self.loc();
                let base = self.ty()?;
                match base.complex_id() {
                    Some(b) if self.fe.types.as_struct(b).is_some() => bases.push(b),
                    _ => {
                        return Err(CompileError::syntax(
                            ErrorCode::E1008,
                            "base class must be a struct",
                            base_loc,
                        ))
                    }
                }
                if !self.eat(TokenKind::Comma)? {
                    break;
                }
            }
        }

        self.expect(TokenKind::LBrace)?;
        let mut def = ComplexTypeDef {
            ty,
            members: Vec::new(),
            bases,
            methods: Vec::new(),
        };
        let saved_owner = self.owner.replace(ty);
        self.push_alias(name, TypeInfo::complex(ty));
        let mut body = StructBody {
            name,
            id,
            ty,
            visibility: Visibility::Public,
        };
        let result = self.struct_members(&mut body, &mut def);
        self.pop_alias_scope();
        self.owner = saved_owner;
        result?;
        self.eat(TokenKind::Semicolon)?;
        Ok(self.fe.ast.push(NodeKind::ComplexTypeDef(def), loc))
    }

    fn struct_members(
        &mut self,
        body: &mut StructBody,
        def: &mut ComplexTypeDef,
    ) -> Result<(), CompileError> {
        loop {
            match self.tok.kind() {
                TokenKind::RBrace => {
                    self.advance()?;
                    return Ok(());
                }
                TokenKind::Eof => return Err(self.unexpected(ErrorCode::E1001, "`}`")),
                TokenKind::Public | TokenKind::Private => {
                    body.visibility = if self.check(TokenKind::Public) {
                        Visibility::Public
                    } else {
                        Visibility::Private
                    };
                    self.advance()?;
                    self.expect(TokenKind::Colon)?;
                }
                TokenKind::Using => self.alias_declaration()?,
                TokenKind::Semicolon => {
                    self.advance()?;
                }
                TokenKind::Tilde => {
                    let decl = self.destructor(body)?;
                    let node = self.function_def(decl);
                    def.methods.push(node);
                }
                TokenKind::Ident if self.at_constructor(body.name)? => {
                    let decl = self.constructor(body)?;
                    let node = self.function_def(decl);
                    def.methods.push(node);
                }
                _ => self.member_or_method(body, def)?,
            }
        }
    }

    /// `Name (` inside the body of struct `Name`.
    fn at_constructor(&mut self, name: Name) -> Result<bool, CompileError> {
        if self.tok.current().text != self.fe.interner.lookup(name) {
            return Ok(false);
        }
        let checkpoint = self.tok.save();
        self.advance()?;
        let found = self.check(TokenKind::LParen);
        self.tok.restore(checkpoint);
        Ok(found)
    }

    fn constructor(&mut self, body: &StructBody) -> Result<FunctionDecl, CompileError> {
        let loc = self.loc();
        self.ident()?;
        let params = self.params()?;
        let range = self.skip_braced()?;
        let sig = Signature {
            id: body.id.child(body.name),
            ret: TypeInfo::void(),
            kind: FunctionKind::Constructor,
            owner: Some(body.ty),
            is_inline: false,
            visibility: body.visibility,
            loc,
        };
        Ok(self.declare_function(sig, params, Some(range)))
    }

    fn destructor(&mut self, body: &StructBody) -> Result<FunctionDecl, CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::Tilde)?;
        let (name, name_loc) = self.ident()?;
        if name != body.name {
            return Err(CompileError::syntax(
                ErrorCode::E1008,
                "destructor name must match the struct",
                name_loc,
            ));
        }
        let params = self.params()?;
        if !params.is_empty() {
            return Err(CompileError::syntax(
                ErrorCode::E1008,
                "a destructor takes no parameters",
                name_loc,
            ));
        }
        let range = self.skip_braced()?;
        let dtor_name = {
            let text = format!("~{}", self.fe.interner.lookup(body.name));
            self.fe.interner.intern(&text)
        };
        let sig = Signature {
            id: body.id.child(dtor_name),
            ret: TypeInfo::void(),
            kind: FunctionKind::Destructor,
            owner: Some(body.ty),
            is_inline: false,
            visibility: body.visibility,
            loc,
        };
        Ok(self.declare_function(sig, params, Some(range)))
    }

    fn member_or_method(
        &mut self,
        body: &StructBody,
        def: &mut ComplexTypeDef,
    ) -> Result<(), CompileError> {
        let loc = self.loc();
        let doc = self.tok.current().doc_text();
        let mods = self.modifiers()?;
        if mods.is_static {
            return Err(CompileError::syntax(
                ErrorCode::E1008,
                "static members are not supported",
                loc,
            ));
        }
        let ty = self.ty()?;
        let (name, name_loc) = self.ident()?;

        if self.check(TokenKind::LParen) {
            let sig = Signature {
                id: body.id.child(name),
                ret: ty,
                kind: FunctionKind::Method,
                owner: Some(body.ty),
                is_inline: mods.is_inline,
                visibility: body.visibility,
                loc,
            };
            let params = self.params()?;
            let range = self.skip_braced()?;
            let decl = self.declare_function(sig, params, Some(range));
            let node = self.function_def(decl);
            def.methods.push(node);
            return Ok(());
        }

        let mut next = Some((name, name_loc));
        while let Some((name, loc)) = next.take() {
            let default = if self.eat(TokenKind::Eq)? {
                Some(if self.check(TokenKind::LBrace) {
                    self.initializer_list()?
                } else {
                    self.ternary()?
                })
            } else if self.check(TokenKind::LBrace) {
                Some(self.initializer_list()?)
            } else {
                None
            };
            def.members.push(MemberDecl {
                name,
                ty,
                default,
                visibility: body.visibility,
                doc: doc.clone(),
                loc,
            });
            if self.eat(TokenKind::Comma)? {
                next = Some(self.ident()?);
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// `template <...>` followed by a struct or function, stored unparsed.
    fn template_declaration(&mut self) -> Result<(), CompileError> {
        let loc = self.loc();
        self.expect(TokenKind::Template)?;
        self.expect(TokenKind::Lt)?;
        let mut params = Vec::new();
        loop {
            let kind = match self.tok.kind() {
                TokenKind::Typename | TokenKind::Struct => TemplateParamKind::Type,
                TokenKind::Int => TemplateParamKind::Int,
                _ => return Err(self.unexpected(ErrorCode::E1007, "`typename` or `int`")),
            };
            self.advance()?;
            let (name, _) = self.ident()?;
            params.push(TemplateParam { name, kind });
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.close_angle()?;

        let start = self.tok.offset();
        if self.eat(TokenKind::Struct)? {
            let (name, _) = self.ident()?;
            let body = self.skip_to_body()?;
            let range = SourceRange::new(start, body.end + 1);
            self.eat(TokenKind::Semicolon)?;
            let decl = TemplateDecl {
                name,
                params,
                range,
                loc,
            };
            self.fe.struct_templates.insert(name, decl);
            return Ok(());
        }

        // The function name is the last identifier before the parameter list.
        let mut name = None;
        while !self.check(TokenKind::LParen) {
            match self.tok.kind() {
                TokenKind::Eof => return Err(self.unexpected(ErrorCode::E1001, "`(`")),
                TokenKind::Ident => name = Some(self.tok.current().text),
                _ => {}
            }
            self.advance()?;
        }
        let Some(name) = name.map(|n| self.fe.interner.intern(n)) else {
            return Err(self.unexpected(ErrorCode::E1004, "function name"));
        };
        let body = self.skip_to_body()?;
        let decl = TemplateDecl {
            name,
            params,
            range: SourceRange::new(start, body.end + 1),
            loc,
        };
        self.fe.function_templates.entry(name).or_default().push(decl);
        Ok(())
    }

    fn skip_to_body(&mut self) -> Result<SourceRange, CompileError> {
        while !self.check(TokenKind::LBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected(ErrorCode::E1001, "`{`"));
            }
            self.advance()?;
        }
        self.skip_braced()
    }

    /// Signature of a function template instance, parsed with the template
    /// parameters bound.
    pub(crate) fn template_function(&mut self) -> Result<FunctionDecl, CompileError> {
        let loc = self.loc();
        let mods = self.modifiers()?;
        let ret = self.ty()?;
        let (name, _) = self.ident()?;
        let params = self.params()?;
        let body = self.skip_braced()?;
        let sig = Signature {
            id: NamespacedIdentifier::new(name),
            ret,
            kind: FunctionKind::Free,
            owner: None,
            is_inline: mods.is_inline,
            visibility: Visibility::Public,
            loc,
        };
        Ok(self.declare_function(sig, params, Some(body)))
    }
}

/// Everything known about a function before its parameter list.
struct Signature {
    id: NamespacedIdentifier,
    ret: TypeInfo,
    kind: FunctionKind,
    owner: Option<ComplexTypeId>,
    is_inline: bool,
    visibility: Visibility,
    loc: CodeLocation,
}

struct StructBody {
    name: Name,
    id: NamespacedIdentifier,
    ty: ComplexTypeId,
    visibility: Visibility,
}
