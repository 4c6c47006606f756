//! The complex type pool.

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    CodeLocation, ComplexTypeId, FunctionId, IndexPolicy, Name, NamespacedIdentifier, NativeType,
    RegisterClass, StringInterner, TemplateArg, TypeInfo, TypeKind, Value, Visibility,
};
use tracing::trace;

use crate::layout::{align_up, Layout, DYN_ALIGNMENT, DYN_SIZE, MAX_SIZE};

/// A struct member.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub name: Name,
    pub ty: TypeInfo,
    /// Byte offset from the struct start; valid once finalised.
    pub offset: u32,
    pub visibility: Visibility,
    /// Constant default value, already converted to the member's type.
    pub default: Option<Value>,
    pub doc: Option<String>,
}

impl Member {
    pub fn new(name: Name, ty: TypeInfo) -> Self {
        Member {
            name,
            ty,
            offset: 0,
            visibility: Visibility::Public,
            default: None,
            doc: None,
        }
    }
}

/// A base class sub-object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BaseClass {
    pub ty: ComplexTypeId,
    /// Byte offset of the sub-object; valid once finalised.
    pub offset: u32,
    /// Number of (flattened) members laid out before this base.
    pub member_index: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructType {
    pub id: NamespacedIdentifier,
    pub template_args: Vec<TemplateArg>,
    pub members: Vec<Member>,
    pub bases: Vec<BaseClass>,
    pub methods: Vec<(Name, FunctionId)>,
    pub constructors: Vec<FunctionId>,
    pub default_constructor: Option<FunctionId>,
    pub destructor: Option<FunctionId>,
    /// Set for host-registered index types.
    pub index_policy: Option<IndexPolicy>,
    layout: Option<Layout>,
}

impl StructType {
    fn new(id: NamespacedIdentifier, template_args: Vec<TemplateArg>) -> Self {
        StructType {
            id,
            template_args,
            members: Vec::new(),
            bases: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            default_constructor: None,
            destructor: None,
            index_policy: None,
            layout: None,
        }
    }

    pub fn is_finalised(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ComplexType {
    Span { element: TypeInfo, len: u32 },
    Dyn { element: TypeInfo },
    Struct(StructType),
}

/// A member found by [`TypePool::find_member`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MemberLookup {
    /// Offset from the start of the searched struct.
    pub offset: u32,
    pub ty: TypeInfo,
    pub visibility: Visibility,
    /// Struct that declares the member.
    pub owner: ComplexTypeId,
}

/// Methods found by [`TypePool::find_methods`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodLookup {
    pub overloads: Vec<FunctionId>,
    /// Offset of the declaring sub-object inside the searched struct.
    pub base_offset: u32,
    pub owner: ComplexTypeId,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
enum Key {
    Span(TypeInfo, u32),
    Dyn(TypeInfo),
    Struct(NamespacedIdentifier, Vec<TemplateArg>),
}

fn layout_error(code: ErrorCode, message: impl Into<String>) -> CompileError {
    CompileError::layout(code, message, CodeLocation::SYNTHETIC)
}

fn too_large() -> CompileError {
    layout_error(ErrorCode::E3005, "type is too large")
}

/// Arena of complex types with structural deduplication.
#[derive(Clone, Debug, Default)]
pub struct TypePool {
    types: Vec<ComplexType>,
    keys: FxHashMap<Key, ComplexTypeId>,
}

impl TypePool {
    pub fn new() -> Self {
        TypePool::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    #[inline]
    pub fn get(&self, id: ComplexTypeId) -> &ComplexType {
        &self.types[id.index()]
    }

    pub fn as_struct(&self, id: ComplexTypeId) -> Option<&StructType> {
        match self.get(id) {
            ComplexType::Struct(s) => Some(s),
            _ => None,
        }
    }

    fn struct_mut(&mut self, id: ComplexTypeId) -> Result<&mut StructType, CompileError> {
        match &mut self.types[id.index()] {
            ComplexType::Struct(s) => Ok(s),
            _ => Err(CompileError::internal(
                "struct operation on a non-struct type",
                CodeLocation::SYNTHETIC,
            )),
        }
    }

    fn intern(&mut self, key: Key, ty: ComplexType) -> ComplexTypeId {
        if let Some(&id) = self.keys.get(&key) {
            return id;
        }
        let id = ComplexTypeId::from_usize(self.types.len());
        self.types.push(ty);
        self.keys.insert(key, id);
        id
    }

    /// `span<element, len>`.
    pub fn span(&mut self, element: TypeInfo, len: u32) -> Result<ComplexTypeId, CompileError> {
        if len == 0 {
            return Err(layout_error(ErrorCode::E3004, "span size must be positive"));
        }
        if element.is_void() || element.is_unresolved() {
            return Err(layout_error(ErrorCode::E3004, "invalid span element type"));
        }
        let element = element.base();
        Ok(self.intern(Key::Span(element, len), ComplexType::Span { element, len }))
    }

    /// `dyn<element>`.
    pub fn dyn_of(&mut self, element: TypeInfo) -> Result<ComplexTypeId, CompileError> {
        if element.is_void() || element.is_unresolved() {
            return Err(layout_error(ErrorCode::E3004, "invalid dyn element type"));
        }
        let element = element.base();
        Ok(self.intern(Key::Dyn(element), ComplexType::Dyn { element }))
    }

    /// Existing struct with this identity, if any.
    pub fn find_struct(
        &self,
        id: &NamespacedIdentifier,
        template_args: &[TemplateArg],
    ) -> Option<ComplexTypeId> {
        self.keys
            .get(&Key::Struct(id.clone(), template_args.to_vec()))
            .copied()
    }

    /// Declare a new open struct. Declaring the same identity twice is a
    /// layout error.
    pub fn declare_struct(
        &mut self,
        id: NamespacedIdentifier,
        template_args: Vec<TemplateArg>,
    ) -> Result<ComplexTypeId, CompileError> {
        let key = Key::Struct(id.clone(), template_args.clone());
        if self.keys.contains_key(&key) {
            return Err(layout_error(ErrorCode::E3001, "struct declared twice"));
        }
        Ok(self.intern(key, ComplexType::Struct(StructType::new(id, template_args))))
    }

    /// Host index type `id<limit>`: a finalised struct holding one `int`.
    pub fn index_type(
        &mut self,
        id: NamespacedIdentifier,
        policy: IndexPolicy,
        limit: i32,
        value_name: Name,
    ) -> ComplexTypeId {
        let args = vec![TemplateArg::Int(limit)];
        if let Some(existing) = self.find_struct(&id, &args) {
            return existing;
        }
        let mut ty = StructType::new(id.clone(), args.clone());
        ty.members.push(Member::new(value_name, TypeInfo::int()));
        ty.index_policy = Some(policy);
        ty.layout = Some(Layout {
            size: 4,
            alignment: 4,
        });
        self.intern(Key::Struct(id, args), ComplexType::Struct(ty))
    }

    pub fn add_member(&mut self, id: ComplexTypeId, member: Member) -> Result<(), CompileError> {
        let ty = self.struct_mut(id)?;
        if ty.is_finalised() {
            return Err(layout_error(
                ErrorCode::E3002,
                "cannot add a member to a finalised type",
            ));
        }
        if ty.members.iter().any(|m| m.name == member.name) {
            return Err(layout_error(ErrorCode::E3001, "duplicate member"));
        }
        ty.members.push(member);
        Ok(())
    }

    /// Set the default value of member `index` (open structs only).
    pub fn set_member_default(
        &mut self,
        id: ComplexTypeId,
        index: usize,
        value: Value,
    ) -> Result<(), CompileError> {
        let ty = self.struct_mut(id)?;
        if ty.is_finalised() {
            return Err(layout_error(ErrorCode::E3002, "type is already finalised"));
        }
        if let Some(member) = ty.members.get_mut(index) {
            member.default = Some(value);
        }
        Ok(())
    }

    pub fn add_base(&mut self, id: ComplexTypeId, base: ComplexTypeId) -> Result<(), CompileError> {
        if !self.as_struct(base).is_some_and(StructType::is_finalised) {
            return Err(layout_error(
                ErrorCode::E3003,
                "base class must be a complete struct",
            ));
        }
        let ty = self.struct_mut(id)?;
        if ty.is_finalised() {
            return Err(layout_error(ErrorCode::E3002, "type is already finalised"));
        }
        ty.bases.push(BaseClass {
            ty: base,
            offset: 0,
            member_index: 0,
        });
        Ok(())
    }

    pub fn add_method(
        &mut self,
        id: ComplexTypeId,
        name: Name,
        func: FunctionId,
    ) -> Result<(), CompileError> {
        self.struct_mut(id)?.methods.push((name, func));
        Ok(())
    }

    /// Register a constructor; `is_default` marks the parameterless one.
    pub fn add_constructor(
        &mut self,
        id: ComplexTypeId,
        func: FunctionId,
        is_default: bool,
    ) -> Result<(), CompileError> {
        let ty = self.struct_mut(id)?;
        ty.constructors.push(func);
        if is_default {
            ty.default_constructor = Some(func);
        }
        Ok(())
    }

    pub fn set_destructor(&mut self, id: ComplexTypeId, func: FunctionId) -> Result<(), CompileError> {
        let ty = self.struct_mut(id)?;
        if ty.destructor.is_some() {
            return Err(layout_error(ErrorCode::E3001, "duplicate destructor"));
        }
        ty.destructor = Some(func);
        Ok(())
    }

    /// `true` once `ty` has a fixed layout.
    pub fn is_finalised(&self, ty: TypeInfo) -> bool {
        match ty.kind {
            TypeKind::Native(n) => n.size() > 0,
            TypeKind::Complex(id) => match self.get(id) {
                ComplexType::Span { element, .. } => self.is_finalised(*element),
                ComplexType::Dyn { .. } => true,
                ComplexType::Struct(s) => s.is_finalised(),
            },
        }
    }

    /// Compute member offsets of an open struct. Runs once, and only after
    /// every member and base type is finalised.
    pub fn finalise(&mut self, id: ComplexTypeId) -> Result<Layout, CompileError> {
        let ty = self
            .as_struct(id)
            .ok_or_else(|| CompileError::internal("finalise on a non-struct type", CodeLocation::SYNTHETIC))?;
        if ty.is_finalised() {
            return Err(layout_error(ErrorCode::E3002, "type is already finalised"));
        }

        let mut cursor = 0u32;
        let mut alignment = 1u32;
        let mut member_index = 0u32;
        let mut bases = ty.bases.clone();
        for base in &mut bases {
            let layout = self.layout(TypeInfo::complex(base.ty))?;
            let (offset, end) = layout.place(cursor).ok_or_else(too_large)?;
            base.offset = offset;
            base.member_index = member_index;
            member_index += self.flat_member_count(base.ty);
            cursor = end;
            alignment = alignment.max(layout.alignment);
        }
        let mut members = ty.members.clone();
        for member in &mut members {
            let layout = self.layout(member.ty).map_err(|e| {
                if e.code == ErrorCode::E3005 {
                    return e;
                }
                layout_error(
                    ErrorCode::E3003,
                    "member type is not finalised; declare it before use",
                )
            })?;
            let (offset, end) = layout.place(cursor).ok_or_else(too_large)?;
            member.offset = offset;
            cursor = end;
            alignment = alignment.max(layout.alignment);
        }
        let layout = if cursor == 0 {
            Layout::EMPTY
        } else {
            let size = align_up(cursor, alignment);
            if size > MAX_SIZE {
                return Err(too_large());
            }
            Layout { size, alignment }
        };

        let ty = self.struct_mut(id)?;
        ty.bases = bases;
        ty.members = members;
        ty.layout = Some(layout);
        trace!(?id, size = layout.size, alignment = layout.alignment, "finalised struct");
        Ok(layout)
    }

    fn flat_member_count(&self, id: ComplexTypeId) -> u32 {
        self.as_struct(id).map_or(0, |s| {
            s.members.len() as u32 + s.bases.iter().map(|b| self.flat_member_count(b.ty)).sum::<u32>()
        })
    }

    /// Size and alignment of a finalised type.
    pub fn layout(&self, ty: TypeInfo) -> Result<Layout, CompileError> {
        match ty.kind {
            TypeKind::Native(n) if n.size() > 0 => Ok(Layout {
                size: n.size(),
                alignment: n.alignment(),
            }),
            TypeKind::Native(_) => Err(layout_error(ErrorCode::E3003, "type has no storage")),
            TypeKind::Complex(id) => match self.get(id) {
                ComplexType::Span { element, len } => {
                    let element = self.layout(*element)?;
                    Ok(Layout {
                        size: element.repeat(*len).ok_or_else(too_large)?,
                        alignment: element.alignment,
                    })
                }
                ComplexType::Dyn { .. } => Ok(Layout {
                    size: DYN_SIZE,
                    alignment: DYN_ALIGNMENT,
                }),
                ComplexType::Struct(s) => s
                    .layout
                    .ok_or_else(|| layout_error(ErrorCode::E3003, "type is not finalised")),
            },
        }
    }

    pub fn size_of(&self, ty: TypeInfo) -> u32 {
        self.layout(ty).map_or(0, |l| l.size)
    }

    /// The register bank a value of `ty` occupies.
    ///
    /// Complex values are handled by address, except index types (an
    /// `int`) and `span<T, 1>` of a scalar, which report `T`'s class.
    pub fn register_class(&self, ty: TypeInfo) -> RegisterClass {
        match ty.kind {
            TypeKind::Native(n) => n.register_class(),
            TypeKind::Complex(id) => match self.get(id) {
                ComplexType::Span { element, len: 1 } if element.native_type().is_some() => {
                    self.register_class(*element)
                }
                ComplexType::Struct(s) if s.index_policy.is_some() => RegisterClass::Integer,
                _ => RegisterClass::Pointer,
            },
        }
    }

    /// The scalar a value of `ty` is held as, if it is held in one register.
    pub fn scalar(&self, ty: TypeInfo) -> Option<NativeType> {
        match ty.kind {
            TypeKind::Native(n) if n.size() > 0 => Some(n),
            TypeKind::Native(_) => None,
            TypeKind::Complex(id) => self
                .as_struct(id)
                .and_then(|s| s.index_policy)
                .map(|_| NativeType::Integer),
        }
    }

    /// Policy used when `ty` is a subscript index.
    pub fn index_policy(&self, ty: TypeInfo) -> Option<IndexPolicy> {
        match ty.kind {
            TypeKind::Native(NativeType::Integer) => Some(IndexPolicy::Checked),
            TypeKind::Native(_) => None,
            TypeKind::Complex(id) => self.as_struct(id).and_then(|s| s.index_policy),
        }
    }

    /// Compile-time bound of an index type (its template argument).
    pub fn index_limit(&self, ty: TypeInfo) -> Option<i32> {
        let s = self.as_struct(ty.complex_id()?)?;
        s.index_policy?;
        match s.template_args.first() {
            Some(TemplateArg::Int(limit)) if *limit > 0 => Some(*limit),
            _ => None,
        }
    }

    /// Element type and static length of a span or dyn.
    pub fn container(&self, ty: TypeInfo) -> Option<(TypeInfo, Option<u32>)> {
        match self.get(ty.complex_id()?) {
            ComplexType::Span { element, len } => Some((*element, Some(*len))),
            ComplexType::Dyn { element } => Some((*element, None)),
            ComplexType::Struct(_) => None,
        }
    }

    pub fn is_dyn(&self, ty: TypeInfo) -> bool {
        ty.complex_id()
            .is_some_and(|id| matches!(self.get(id), ComplexType::Dyn { .. }))
    }

    /// Find a member by name: own members first, then each base.
    ///
    /// A name reachable through more than one base is ambiguous and reported
    /// as a type error rather than resolved by order.
    pub fn find_member(
        &self,
        id: ComplexTypeId,
        name: Name,
    ) -> Result<Option<MemberLookup>, CompileError> {
        let Some(s) = self.as_struct(id) else {
            return Ok(None);
        };
        if let Some(m) = s.members.iter().find(|m| m.name == name) {
            return Ok(Some(MemberLookup {
                offset: m.offset,
                ty: m.ty,
                visibility: m.visibility,
                owner: id,
            }));
        }
        let mut found = None;
        for base in &s.bases {
            if let Some(mut hit) = self.find_member(base.ty, name)? {
                if found.is_some() {
                    return Err(ambiguous());
                }
                hit.offset += base.offset;
                found = Some(hit);
            }
        }
        Ok(found)
    }

    /// Find the overloads of a method by name, with the same search order
    /// and ambiguity rule as [`TypePool::find_member`].
    pub fn find_methods(
        &self,
        id: ComplexTypeId,
        name: Name,
    ) -> Result<Option<MethodLookup>, CompileError> {
        let Some(s) = self.as_struct(id) else {
            return Ok(None);
        };
        let overloads: Vec<FunctionId> = s
            .methods
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, f)| *f)
            .collect();
        if !overloads.is_empty() {
            return Ok(Some(MethodLookup {
                overloads,
                base_offset: 0,
                owner: id,
            }));
        }
        let mut found = None;
        for base in &s.bases {
            if let Some(mut hit) = self.find_methods(base.ty, name)? {
                if found.is_some() {
                    return Err(ambiguous());
                }
                hit.base_offset += base.offset;
                found = Some(hit);
            }
        }
        Ok(found)
    }

    /// `true` if creating a value of `ty` must run code beyond zero fill.
    pub fn needs_construction(&self, ty: TypeInfo) -> bool {
        let Some(id) = ty.complex_id() else {
            return false;
        };
        match self.get(id) {
            ComplexType::Span { element, .. } => self.needs_construction(*element),
            ComplexType::Dyn { .. } => false,
            ComplexType::Struct(s) => {
                s.default_constructor.is_some()
                    || s.members
                        .iter()
                        .any(|m| m.default.is_some() || self.needs_construction(m.ty))
                    || s
                        .bases
                        .iter()
                        .any(|b| self.needs_construction(TypeInfo::complex(b.ty)))
            }
        }
    }

    /// `true` if a value of `ty` has a destructor to run at scope exit.
    pub fn needs_destruction(&self, ty: TypeInfo) -> bool {
        let Some(id) = ty.complex_id() else {
            return false;
        };
        match self.get(id) {
            ComplexType::Span { element, .. } => self.needs_destruction(*element),
            ComplexType::Dyn { .. } => false,
            ComplexType::Struct(s) => {
                s.destructor.is_some()
                    || s.members.iter().any(|m| self.needs_destruction(m.ty))
                    || s
                        .bases
                        .iter()
                        .any(|b| self.needs_destruction(TypeInfo::complex(b.ty)))
            }
        }
    }

    /// Flat list of `(offset, value)` default stores for a zeroed `ty`.
    pub fn default_initializer(&self, ty: TypeInfo) -> Vec<(u32, Value)> {
        let mut out = Vec::new();
        self.collect_defaults(ty, 0, &mut out);
        out
    }

    fn collect_defaults(&self, ty: TypeInfo, at: u32, out: &mut Vec<(u32, Value)>) {
        let Some(id) = ty.complex_id() else {
            return;
        };
        match self.get(id) {
            ComplexType::Span { element, len } => {
                if !self.needs_construction(*element) || self.layout(ty).is_err() {
                    return;
                }
                let stride = self.layout(*element).map_or(0, Layout::stride);
                for i in 0..*len {
                    self.collect_defaults(*element, at + i * stride, out);
                }
            }
            ComplexType::Dyn { .. } => {}
            ComplexType::Struct(s) => {
                for base in &s.bases {
                    self.collect_defaults(TypeInfo::complex(base.ty), at + base.offset, out);
                }
                for m in &s.members {
                    match m.default {
                        Some(v) => out.push((at + m.offset, v)),
                        None => self.collect_defaults(m.ty, at + m.offset, out),
                    }
                }
            }
        }
    }

    /// Default constructors to run, in order: bases, members, then the
    /// type's own.
    pub fn construction_calls(&self, ty: TypeInfo) -> Vec<(u32, FunctionId)> {
        let mut out = Vec::new();
        self.collect_ctors(ty, 0, &mut out);
        out
    }

    fn collect_ctors(&self, ty: TypeInfo, at: u32, out: &mut Vec<(u32, FunctionId)>) {
        let Some(id) = ty.complex_id() else {
            return;
        };
        match self.get(id) {
            ComplexType::Span { element, len } => {
                if element.complex_id().is_none() || self.layout(ty).is_err() {
                    return;
                }
                let stride = self.layout(*element).map_or(0, Layout::stride);
                for i in 0..*len {
                    self.collect_ctors(*element, at + i * stride, out);
                }
            }
            ComplexType::Dyn { .. } => {}
            ComplexType::Struct(s) => {
                for base in &s.bases {
                    self.collect_ctors(TypeInfo::complex(base.ty), at + base.offset, out);
                }
                for m in &s.members {
                    self.collect_ctors(m.ty, at + m.offset, out);
                }
                if let Some(ctor) = s.default_constructor {
                    out.push((at, ctor));
                }
            }
        }
    }

    /// Destructors to run, in order: the type's own, members in reverse,
    /// then bases in reverse.
    pub fn destructor_calls(&self, ty: TypeInfo) -> Vec<(u32, FunctionId)> {
        let mut out = Vec::new();
        self.collect_dtors(ty, 0, &mut out);
        out
    }

    fn collect_dtors(&self, ty: TypeInfo, at: u32, out: &mut Vec<(u32, FunctionId)>) {
        let Some(id) = ty.complex_id() else {
            return;
        };
        match self.get(id) {
            ComplexType::Span { element, len } => {
                if element.complex_id().is_none() || self.layout(ty).is_err() {
                    return;
                }
                let stride = self.layout(*element).map_or(0, Layout::stride);
                for i in (0..*len).rev() {
                    self.collect_dtors(*element, at + i * stride, out);
                }
            }
            ComplexType::Dyn { .. } => {}
            ComplexType::Struct(s) => {
                if let Some(dtor) = s.destructor {
                    out.push((at, dtor));
                }
                for m in s.members.iter().rev() {
                    self.collect_dtors(m.ty, at + m.offset, out);
                }
                for base in s.bases.iter().rev() {
                    self.collect_dtors(TypeInfo::complex(base.ty), at + base.offset, out);
                }
            }
        }
    }

    /// `true` if `derived` is `base` or inherits from it; returns the
    /// sub-object offset.
    pub fn base_offset(&self, derived: ComplexTypeId, base: ComplexTypeId) -> Option<u32> {
        if derived == base {
            return Some(0);
        }
        let s = self.as_struct(derived)?;
        s.bases
            .iter()
            .find_map(|b| self.base_offset(b.ty, base).map(|o| o + b.offset))
    }

    /// Human readable type name for diagnostics.
    pub fn display(&self, ty: TypeInfo, interner: &StringInterner) -> String {
        let base = match ty.kind {
            TypeKind::Native(n) => n.name().to_string(),
            TypeKind::Complex(id) => match self.get(id) {
                ComplexType::Span { element, len } => {
                    format!("span<{}, {len}>", self.display(*element, interner))
                }
                ComplexType::Dyn { element } => format!("dyn<{}>", self.display(*element, interner)),
                ComplexType::Struct(s) => {
                    let mut name = s.id.display(interner);
                    if !s.template_args.is_empty() {
                        let args: Vec<String> = s
                            .template_args
                            .iter()
                            .map(|a| match a {
                                TemplateArg::Type(t) => self.display(*t, interner),
                                TemplateArg::Int(v) => v.to_string(),
                            })
                            .collect();
                        name = format!("{name}<{}>", args.join(", "));
                    }
                    name
                }
            },
        };
        if ty.is_const() {
            format!("const {base}")
        } else {
            base
        }
    }
}

fn ambiguous() -> CompileError {
    CompileError::type_error(
        ErrorCode::E2008,
        "member is ambiguous: found in more than one base class",
        CodeLocation::SYNTHETIC,
    )
}
