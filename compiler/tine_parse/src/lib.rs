//! Recursive descent parser for Tine.
//!
//! Parsing is not a single sweep over the unit. The class level is parsed
//! first; function bodies are kept as source ranges and parsed later, one
//! at a time, by the FunctionParsing pass. Templates and inlined calls are
//! re-parsed from their source range with parameters bound.
//!
//! # Entry points
//!
//! - [`parse_unit`]: class-level declarations
//! - [`parse_body`]: a function body, with missing returns synthesized
//! - [`parse_inline`]: a callee body in inline mode, parameters bound to
//!   call-site expressions
//! - [`instantiate_function`]: the signature of a function template for a
//!   set of template arguments
//!
//! All of them work on a [`Frontend`], which owns the node arena, the
//! interner and the type pool for the whole compile.

mod consts;
mod grammar;
mod parser;
mod returns;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    Ast, CodeLocation, ComplexTypeId, FunctionDecl, IndexPolicy, Name, NamespacedIdentifier,
    NodeId, SourceRange, StringInterner, TemplateArg, TypeInfo, Value,
};
use tine_lexer::SourceMap;
use tine_types::TypePool;
use tracing::debug;

pub use consts::{evaluate_constant, promote};
use parser::{with_parser, Mode};

/// Kind of a template parameter.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TemplateParamKind {
    /// `typename T`
    Type,
    /// `int N`
    Int,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TemplateParam {
    pub name: Name,
    pub kind: TemplateParamKind,
}

/// A template declaration kept as source text until instantiated.
#[derive(Clone, Debug)]
pub struct TemplateDecl {
    pub name: Name,
    pub params: Vec<TemplateParam>,
    /// The declaration following `template <...>`.
    pub range: SourceRange,
    pub loc: CodeLocation,
}

impl TemplateDecl {
    /// Pair parameters with arguments, checking count and kinds.
    pub fn bind(&self, args: &[TemplateArg]) -> Result<Vec<(Name, TemplateArg)>, CompileError> {
        if args.len() != self.params.len() {
            return Err(CompileError::syntax(
                ErrorCode::E1007,
                format!(
                    "template expects {} argument(s), found {}",
                    self.params.len(),
                    args.len()
                ),
                self.loc,
            ));
        }
        self.params
            .iter()
            .zip(args)
            .map(|(param, arg)| match (param.kind, arg) {
                (TemplateParamKind::Type, TemplateArg::Type(_))
                | (TemplateParamKind::Int, TemplateArg::Int(_)) => Ok((param.name, *arg)),
                _ => Err(CompileError::syntax(
                    ErrorCode::E1007,
                    "template argument kind mismatch",
                    self.loc,
                )),
            })
            .collect()
    }
}

/// Parser state shared by every parse of one compile.
pub struct Frontend {
    pub interner: StringInterner,
    pub types: TypePool,
    pub ast: Ast,
    source: Arc<str>,
    map: Arc<SourceMap>,
    /// Class-level `using` aliases and enum names, keyed by
    /// [`NamespacedIdentifier::key`].
    pub aliases: FxHashMap<Name, TypeInfo>,
    /// `const` globals with a parse-time value (usable as template
    /// arguments), keyed like `aliases`.
    pub constants: FxHashMap<Name, Value>,
    pub struct_templates: FxHashMap<Name, TemplateDecl>,
    pub function_templates: FxHashMap<Name, Vec<TemplateDecl>>,
    /// Host-registered index type templates, e.g. `index::wrapped`.
    pub host_types: FxHashMap<NamespacedIdentifier, IndexPolicy>,
    /// Struct template instances created while parsing function bodies,
    /// waiting for the class-level passes.
    pub instantiated: Vec<NodeId>,
}

impl Frontend {
    /// Frontend over preprocessed `source`; `map` translates offsets back
    /// to the original text.
    pub fn new(source: impl Into<Arc<str>>, map: SourceMap) -> Self {
        Frontend {
            interner: StringInterner::new(),
            types: TypePool::new(),
            ast: Ast::new(),
            source: source.into(),
            map: Arc::new(map),
            aliases: FxHashMap::default(),
            constants: FxHashMap::default(),
            struct_templates: FxHashMap::default(),
            function_templates: FxHashMap::default(),
            host_types: FxHashMap::default(),
            instantiated: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.map
    }

    /// Intern a `::`-separated path such as `Math::sin`.
    pub fn path(&mut self, text: &str) -> NamespacedIdentifier {
        let names: Vec<Name> = text.split("::").map(|s| self.interner.intern(s)).collect();
        NamespacedIdentifier::from_path(&names)
    }

    /// Register a host index type template (`index::wrapped<N>`).
    pub fn register_index_type(&mut self, path: &str, policy: IndexPolicy) {
        let id = self.path(path);
        self.host_types.insert(id, policy);
    }

    /// Instantiate a struct template, reusing an existing instance.
    pub fn instantiate_struct(
        &mut self,
        name: Name,
        args: &[TemplateArg],
        loc: CodeLocation,
    ) -> Result<ComplexTypeId, CompileError> {
        let id = NamespacedIdentifier::new(name);
        if let Some(existing) = self.types.find_struct(&id, args) {
            return Ok(existing);
        }
        let Some(template) = self.struct_templates.get(&name).cloned() else {
            return Err(CompileError::syntax(
                ErrorCode::E1007,
                "not a struct template",
                loc,
            ));
        };
        let bindings = template.bind(args).map_err(|e| CompileError { loc, ..e })?;
        debug!(name = self.interner.lookup(name), "instantiating struct template");
        let def = with_parser(self, template.range, Mode::Class, |p| {
            p.bind_template(&bindings);
            p.struct_definition(args.to_vec())
        })?;
        self.instantiated.push(def);
        self.types.find_struct(&id, args).ok_or_else(|| {
            CompileError::internal("struct instance was not declared", loc)
        })
    }
}

/// Parse the class level of the unit into a block of declarations.
#[tracing::instrument(level = "debug", skip_all)]
pub fn parse_unit(fe: &mut Frontend) -> Result<NodeId, CompileError> {
    let len = u32::try_from(fe.source.len()).unwrap_or(u32::MAX);
    with_parser(fe, SourceRange::new(0, len), Mode::Class, |p| p.unit())
}

/// Parse a function body and synthesize missing returns.
pub fn parse_body(fe: &mut Frontend, decl: &FunctionDecl) -> Result<NodeId, CompileError> {
    let range = decl
        .body
        .ok_or_else(|| CompileError::internal("function has no body", decl.loc))?;
    let body = with_parser(fe, range, Mode::Function, |p| {
        p.enter_function(decl);
        p.body()
    })?;
    returns::synthesize(&mut fe.ast, body, decl.ret, false, decl.loc)?;
    Ok(body)
}

/// Re-parse `decl`'s body for splicing at a call site.
///
/// Every parameter becomes a local initialised from the matching argument
/// expression and every `return` becomes an inline return.
pub fn parse_inline(
    fe: &mut Frontend,
    decl: &FunctionDecl,
    args: &[NodeId],
) -> Result<NodeId, CompileError> {
    let range = decl
        .body
        .ok_or_else(|| CompileError::internal("inline function has no body", decl.loc))?;
    let body = with_parser(fe, range, Mode::Inline, |p| {
        p.enter_function(decl);
        p.inline_body(decl, args)
    })?;
    returns::synthesize(&mut fe.ast, body, decl.ret, true, decl.loc)?;
    Ok(body)
}

/// Parse the signature of a function template with `args` bound.
pub fn instantiate_function(
    fe: &mut Frontend,
    template: &TemplateDecl,
    args: &[TemplateArg],
) -> Result<FunctionDecl, CompileError> {
    let bindings = template.bind(args)?;
    with_parser(fe, template.range, Mode::Class, |p| {
        p.bind_template(&bindings);
        p.template_function()
    })
}

#[cfg(test)]
mod tests;
