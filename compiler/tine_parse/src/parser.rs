//! Parser state and token helpers.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    CodeLocation, ComplexTypeId, FunctionDecl, Name, NamespacedIdentifier, SourceRange,
    TemplateArg, TokenKind, TypeInfo, Value,
};
use tine_lexer::{Token, Tokenizer};
use tine_stack::DepthGuard;

use crate::Frontend;

/// What the parsed range contains.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Mode {
    /// Class-level declarations (or a template declaration).
    Class,
    /// A function body.
    Function,
    /// A function body spliced at a call site; returns leave the splice.
    Inline,
}

pub(crate) struct Parser<'a> {
    pub(crate) fe: &'a mut Frontend,
    pub(crate) tok: Tokenizer<'a>,
    pub(crate) mode: Mode,
    depth: DepthGuard,
    /// Local `using` aliases and bound type parameters, innermost last.
    aliases: Vec<FxHashMap<Name, TypeInfo>>,
    int_bindings: FxHashMap<Name, i32>,
    /// Every template binding in effect, handed on to member functions.
    pub(crate) bindings: Vec<(Name, TemplateArg)>,
    /// Namespace of the function being parsed.
    pub(crate) function: NamespacedIdentifier,
    /// Enclosing `namespace` blocks at class level, or the namespace of
    /// the function being parsed.
    pub(crate) namespace: NamespacedIdentifier,
    pub(crate) owner: Option<ComplexTypeId>,
}

/// Run `f` with a parser over `range` of the frontend's processed source.
pub(crate) fn with_parser<R>(
    fe: &mut Frontend,
    range: SourceRange,
    mode: Mode,
    f: impl FnOnce(&mut Parser<'_>) -> Result<R, CompileError>,
) -> Result<R, CompileError> {
    let source = Arc::clone(&fe.source);
    let map = Arc::clone(&fe.map);
    let tok = Tokenizer::new(&source, range, &map)?;
    let mut parser = Parser {
        fe,
        tok,
        mode,
        depth: DepthGuard::default(),
        aliases: Vec::new(),
        int_bindings: FxHashMap::default(),
        bindings: Vec::new(),
        function: NamespacedIdentifier::root(),
        namespace: NamespacedIdentifier::root(),
        owner: None,
    };
    f(&mut parser)
}

impl<'a> Parser<'a> {
    pub(crate) fn enter_function(&mut self, decl: &FunctionDecl) {
        self.function = decl.id.clone();
        self.namespace = decl.id.parent().unwrap_or_default();
        self.owner = decl.owner;
        self.bind_template(&decl.bindings);
    }

    /// Bind template parameters: types become aliases, integers literals.
    pub(crate) fn bind_template(&mut self, bindings: &[(Name, TemplateArg)]) {
        let mut types = FxHashMap::default();
        self.bindings.extend_from_slice(bindings);
        for (name, arg) in bindings {
            match arg {
                TemplateArg::Type(ty) => {
                    types.insert(*name, *ty);
                }
                TemplateArg::Int(value) => {
                    self.int_bindings.insert(*name, *value);
                }
            }
        }
        self.aliases.push(types);
    }

    pub(crate) fn push_alias_scope(&mut self) {
        self.aliases.push(FxHashMap::default());
    }

    /// Open an alias scope holding `name`.
    pub(crate) fn push_alias(&mut self, name: Name, ty: TypeInfo) {
        let mut scope = FxHashMap::default();
        scope.insert(name, ty);
        self.aliases.push(scope);
    }

    pub(crate) fn pop_alias_scope(&mut self) {
        self.aliases.pop();
    }

    /// Declare an alias in the innermost scope, or at class level inside
    /// the current namespace.
    pub(crate) fn declare_alias(&mut self, name: Name, ty: TypeInfo) {
        match self.aliases.last_mut() {
            Some(scope) if self.mode != Mode::Class => {
                scope.insert(name, ty);
            }
            _ => {
                let key = self.namespace.child(name).key(&mut self.fe.interner);
                self.fe.aliases.insert(key, ty);
            }
        }
    }

    /// Scoped aliases first (plain names only), then class-level ones from
    /// the innermost enclosing namespace outwards.
    pub(crate) fn lookup_alias(&self, path: &NamespacedIdentifier) -> Option<TypeInfo> {
        let scoped = if path.is_plain() {
            self.aliases
                .iter()
                .rev()
                .find_map(|scope| scope.get(&path.id()).copied())
        } else {
            None
        };
        scoped.or_else(|| {
            self.visible_keys(path)
                .find_map(|key| self.fe.aliases.get(&key).copied())
        })
    }

    /// Value of a recorded constant `path` names from here.
    pub(crate) fn constant(&self, path: &NamespacedIdentifier) -> Option<Value> {
        self.visible_keys(path)
            .find_map(|key| self.fe.constants.get(&key).copied())
    }

    /// Keys `path` may stand for, innermost namespace first.
    fn visible_keys<'s>(
        &'s self,
        path: &'s NamespacedIdentifier,
    ) -> impl Iterator<Item = Name> + 's {
        self.namespace
            .ancestors()
            .filter_map(move |ns| ns.join(path).find_key(&self.fe.interner))
    }

    pub(crate) fn int_binding(&self, name: Name) -> Option<i32> {
        self.int_bindings.get(&name).copied()
    }

    // Token helpers

    #[inline]
    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.tok.kind() == kind
    }

    #[inline]
    pub(crate) fn loc(&self) -> CodeLocation {
        self.tok.loc()
    }

    pub(crate) fn advance(&mut self) -> Result<Token<'a>, CompileError> {
        self.tok.advance()
    }

    /// Consume the current token if it is `kind`.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> Result<bool, CompileError> {
        if self.check(kind) {
            self.tok.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>, CompileError> {
        if self.check(kind) {
            self.tok.advance()
        } else {
            Err(self.unexpected(ErrorCode::E1001, kind.display_name()))
        }
    }

    pub(crate) fn ident(&mut self) -> Result<(Name, CodeLocation), CompileError> {
        if !self.check(TokenKind::Ident) {
            return Err(self.unexpected(ErrorCode::E1004, "identifier"));
        }
        let token = self.tok.advance()?;
        Ok((self.fe.interner.intern(token.text), token.loc))
    }

    /// Error naming what was expected and the current token.
    pub(crate) fn unexpected(&self, code: ErrorCode, expected: &str) -> CompileError {
        let current = self.tok.current();
        let found = match current.kind {
            TokenKind::Ident | TokenKind::IntLit | TokenKind::FloatLit | TokenKind::DoubleLit => {
                format!("`{}`", current.text)
            }
            // Body ranges stop right before the closing brace.
            TokenKind::Eof if self.mode != Mode::Class => {
                TokenKind::RBrace.display_name().to_string()
            }
            kind => kind.display_name().to_string(),
        };
        CompileError::syntax(code, format!("expected {expected}, found {found}"), current.loc)
    }

    /// Close a template argument list, splitting `>>` if needed.
    pub(crate) fn close_angle(&mut self) -> Result<(), CompileError> {
        self.tok.split_shr();
        self.expect(TokenKind::Gt).map(|_| ())
    }

    /// Enter one nesting level of expressions or blocks.
    pub(crate) fn enter(&mut self) -> Result<(), CompileError> {
        self.depth.enter().map_err(|e| {
            CompileError::syntax(
                ErrorCode::E1006,
                format!("expression nesting too deep (limit {})", e.max),
                self.loc(),
            )
        })
    }

    pub(crate) fn leave(&mut self) {
        self.depth.leave();
    }

    /// 1-based line of the current token, counted in the processed text
    /// (which keeps the original line structure).
    pub(crate) fn line(&self) -> usize {
        let offset = (self.tok.offset() as usize).min(self.tok.source().len());
        self.tok.source().as_bytes()[..offset]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }

    /// Skip a `{ ... }` group and return the range between the braces.
    pub(crate) fn skip_braced(&mut self) -> Result<SourceRange, CompileError> {
        let open = self.expect(TokenKind::LBrace)?;
        let mut depth = 1u32;
        loop {
            match self.tok.kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        let close = self.tok.advance()?;
                        return Ok(SourceRange::new(open.end, close.start));
                    }
                }
                TokenKind::Eof => return Err(self.unexpected(ErrorCode::E1001, "`}`")),
                _ => {}
            }
            self.tok.advance()?;
        }
    }
}
