//! DWARF-to-IR builder (spec.md §4.5): the top-level driver
//! `read_debug_info_into_corpus` and its per-DIE dispatch.

use std::collections::HashMap;

use gimli::{AttributeValue, Reader};

use abg_elf::ElfInfo;
use abg_ir::{
    Access, BaseSpecifier, ClassData, ClassKind, CvQualifiers, DataMember, Decl, DeclData, DeclId,
    Environment, EnumTypeData, Enumerator, FunctionTypeData, MemberFunction, Parameter, Scope,
    ScopeId, ScopeKind, SourceLanguage, Subrange, TranslationUnit, Type, TypeData, TypeId,
};

use crate::die_index::{DieIndex, DieKey};
use crate::error::{DwarfError, Result};
use crate::expr;

/// spec.md SPEC_FULL §C.4/§C.5: options preserved from the original
/// `read_corpus_from_elf`/`create_reader` signatures.
#[derive(Copy, Clone, Debug)]
pub struct BuilderOptions {
    /// When false, only types reachable from an exported function/variable
    /// are kept; when true, every type DWARF describes is read.
    pub read_all_types: bool,
    /// Resolves declaration-only classes more aggressively across the whole
    /// corpus group, needed for the `vmlinux` + modules use case.
    pub linux_kernel_mode: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            read_all_types: false,
            linux_kernel_mode: false,
        }
    }
}

#[derive(Copy, Clone)]
enum BuiltNode {
    Type(TypeId),
    Decl(DeclId),
}

struct PendingFixup {
    decl: DeclId,
    linkage_name: String,
}

/// Per-corpus builder state; cleared at the start of each
/// `read_debug_info_into_corpus` call (spec.md §4.5 step 1).
pub struct Builder<'a, R: Reader> {
    env: &'a mut Environment,
    elf: &'a ElfInfo,
    options: BuilderOptions,
    main: &'a gimli::Dwarf<R>,
    alt: Option<&'a gimli::Dwarf<R>>,
    main_units: Vec<gimli::Unit<R>>,
    alt_units: Vec<gimli::Unit<R>>,
    unit_index_by_header: HashMap<(u64, bool), usize>,
    die_index: DieIndex,
    built: HashMap<DieKey, BuiltNode>,
    decl_only_classes: HashMap<String, Vec<TypeId>>,
    fixups: Vec<PendingFixup>,
    anon_counter: u32,
}

impl<'a, R: Reader> Builder<'a, R> {
    pub fn new(
        env: &'a mut Environment,
        elf: &'a ElfInfo,
        main: &'a gimli::Dwarf<R>,
        alt: Option<&'a gimli::Dwarf<R>>,
        options: BuilderOptions,
    ) -> Self {
        Builder {
            env,
            elf,
            options,
            main,
            alt,
            main_units: Vec::new(),
            alt_units: Vec::new(),
            unit_index_by_header: HashMap::new(),
            die_index: DieIndex::new(),
            built: HashMap::new(),
            decl_only_classes: HashMap::new(),
            fixups: Vec::new(),
            anon_counter: 0,
        }
    }

    /// Synthesizes `__anonymous_struct__N` / `__anonymous_union__N` (spec.md
    /// §4.4) for a class/union DIE with no `DW_AT_name`, so the canonicalizer
    /// has a name to compare modulo its numeric suffix instead of comparing
    /// two empty strings as always-equal.
    fn synthesize_anonymous_class_name(&mut self, kind: ClassKind) -> String {
        self.anon_counter += 1;
        let prefix = if kind == ClassKind::Union { "__anonymous_union__" } else { "__anonymous_struct__" };
        format!("{prefix}{}", self.anon_counter)
    }

    fn unit_for(&self, key: DieKey) -> Option<&gimli::Unit<R>> {
        let cu = self.die_index.cu_of(key)?;
        let idx = *self.unit_index_by_header.get(&(cu.offset, key.is_alt))?;
        Some(if key.is_alt { &self.alt_units[idx] } else { &self.main_units[idx] })
    }

    fn entry_for(&self, key: DieKey) -> Result<Option<gimli::UnitOffset<R::Offset>>> {
        let Some(unit) = self.unit_for(key) else { return Ok(None) };
        let header_offset = unit
            .header
            .offset()
            .as_debug_info_offset()
            .map(|o| o.0.into_u64())
            .unwrap_or(0);
        let rel = key.offset.saturating_sub(header_offset);
        Ok(Some(gimli::UnitOffset(R::Offset::from_u64(rel)?)))
    }

    /// Top-level driver (spec.md §4.5).
    #[tracing::instrument(skip(self), fields(path = %self.elf.path.display()))]
    pub fn read_debug_info_into_corpus(mut self) -> Result<abg_ir::Corpus> {
        tracing::debug!(read_all_types = self.options.read_all_types, linux_kernel_mode = self.options.linux_kernel_mode, "building corpus");
        let mut corpus = abg_ir::Corpus::new(
            self.elf.path.to_string_lossy().into_owned(),
            self.elf.architecture.clone(),
            abg_ir::CorpusOrigin::Dwarf,
        );
        corpus.soname = self.elf.soname.clone();
        corpus.needed = self.elf.needed.clone();

        // Step 2: DIE parent + import-point maps, over both partitions.
        self.index_partition(false)?;
        if self.alt.is_some() {
            self.index_partition(true)?;
        }

        // Step 3: canonicalization is not done while we read.
        debug_assert!(!self.env.canonicalization_is_done());

        // Step 4: build IR for every main-partition CU.
        let header_offsets: Vec<u64> = self.main_units.iter().map(cu_header_offset).collect();
        for header_offset in header_offsets {
            self.build_compile_unit(header_offset, &mut corpus)?;
        }

        // Step 5: resolve declaration-only classes.
        self.resolve_declaration_only_classes();

        // Step 6: fix up functions whose symbol bound late.
        self.run_fixups(&mut corpus);

        // Step 7: late canonicalization, both partitions having contributed
        // to the same environment.
        self.env.perform_late_type_canonicalizing();

        // Step 8: stable output order.
        corpus.sort_exported(&self.env.decls, |id| {
            let decl = &self.env.decls[id];
            (decl.qualified_name.clone(), decl.linkage_name.as_ref().map(|s| s.as_str().to_string()))
        });

        Ok(corpus)
    }

    fn index_partition(&mut self, is_alt: bool) -> Result<()> {
        let dwarf = if is_alt { self.alt.unwrap() } else { self.main };
        let mut headers = dwarf.units();
        while let Some(header) = headers.next()? {
            let unit = dwarf.unit(header)?;
            self.die_index.index_unit(&unit, is_alt)?;
            let offset = cu_header_offset(&unit);
            let list = if is_alt { &mut self.alt_units } else { &mut self.main_units };
            self.unit_index_by_header.insert((offset, is_alt), list.len());
            list.push(unit);
        }
        Ok(())
    }

    fn build_compile_unit(&mut self, header_offset: u64, corpus: &mut abg_ir::Corpus) -> Result<()> {
        let idx = self.unit_index_by_header[&(header_offset, false)];
        // SAFETY-free: index is stable, we only read through it below via
        // cloned handles to avoid holding a borrow of `self.main_units`
        // across calls that need `&mut self`.
        let (name, language) = {
            let unit = &self.main_units[idx];
            cu_root_name_and_language(self.main, unit)?
        };
        let address_size = self.main_units[idx].header.address_size();

        let top_scope = self.env.scopes.push(Scope::new(ScopeKind::Global, None));
        let tu = self.env.tus.push(TranslationUnit {
            name,
            address_size,
            language,
            locations: abg_ir::LocationManager::new(),
            top_scope,
            synthesized_function_types: Vec::new(),
        });
        corpus.translation_units.push(tu);

        let root_key = DieKey { offset: header_offset, is_alt: false };
        let children = self.direct_children(root_key)?;
        for child in children {
            self.build_die_as_member_of_scope(child, top_scope, tu, corpus)?;
        }
        Ok(())
    }

    fn direct_children(&self, parent: DieKey) -> Result<Vec<DieKey>> {
        Ok(self.die_index.children_of(parent).to_vec())
    }

    fn build_die_as_member_of_scope(
        &mut self,
        key: DieKey,
        scope: ScopeId,
        tu: abg_ir::TuId,
        corpus: &mut abg_ir::Corpus,
    ) -> Result<()> {
        let Some(tag) = self.die_index.tag_of(key) else { return Ok(()) };
        match tag {
            gimli::constants::DW_TAG_subprogram => {
                if let Some(decl) = self.build_function(key, scope, tu)? {
                    self.publish_function(decl, corpus);
                }
            }
            gimli::constants::DW_TAG_variable => {
                if let Some(decl) = self.build_variable(key, scope, tu)? {
                    self.publish_variable(decl, corpus);
                }
            }
            gimli::constants::DW_TAG_namespace | gimli::constants::DW_TAG_module => {
                self.build_namespace(key, scope, tu, corpus)?;
            }
            gimli::constants::DW_TAG_base_type
            | gimli::constants::DW_TAG_const_type
            | gimli::constants::DW_TAG_volatile_type
            | gimli::constants::DW_TAG_pointer_type
            | gimli::constants::DW_TAG_reference_type
            | gimli::constants::DW_TAG_rvalue_reference_type
            | gimli::constants::DW_TAG_array_type
            | gimli::constants::DW_TAG_enumeration_type
            | gimli::constants::DW_TAG_typedef
            | gimli::constants::DW_TAG_structure_type
            | gimli::constants::DW_TAG_class_type
            | gimli::constants::DW_TAG_union_type
            | gimli::constants::DW_TAG_subroutine_type => {
                self.build_type(key)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn build_namespace(
        &mut self,
        key: DieKey,
        parent_scope: ScopeId,
        tu: abg_ir::TuId,
        corpus: &mut abg_ir::Corpus,
    ) -> Result<()> {
        let name = self.attr_string(key, gimli::constants::DW_AT_name)?.unwrap_or_default();
        let scope = self.env.scopes.push(Scope::new(ScopeKind::Namespace, Some(parent_scope)));
        self.env.scopes[parent_scope].children.push(scope);
        let _ = name;
        for child in self.direct_children(key)? {
            self.build_die_as_member_of_scope(child, scope, tu, corpus)?;
        }
        Ok(())
    }

    fn publish_function(&mut self, decl: DeclId, corpus: &mut abg_ir::Corpus) {
        let d = &self.env.decls[decl];
        let symbol_name = d.linkage_name.as_ref().map(|s| s.as_str().to_string());
        if corpus.exported_decls_builder.accepts(&d.qualified_name, symbol_name.as_deref()) {
            corpus.exported_functions.push(decl);
        }
    }

    fn publish_variable(&mut self, decl: DeclId, corpus: &mut abg_ir::Corpus) {
        let d = &self.env.decls[decl];
        let symbol_name = d.linkage_name.as_ref().map(|s| s.as_str().to_string());
        if corpus.exported_decls_builder.accepts(&d.qualified_name, symbol_name.as_deref()) {
            corpus.exported_variables.push(decl);
        }
    }

    // ---- type builders ----

    fn build_type(&mut self, key: DieKey) -> Result<TypeId> {
        if let Some(BuiltNode::Type(id)) = self.built.get(&key) {
            return Ok(*id);
        }
        let Some(tag) = self.die_index.tag_of(key) else {
            return Ok(self.env.void_type());
        };
        let id = match tag {
            gimli::constants::DW_TAG_base_type => self.build_base_type(key)?,
            gimli::constants::DW_TAG_const_type | gimli::constants::DW_TAG_volatile_type => {
                self.build_qualified_type(key, tag)?
            }
            gimli::constants::DW_TAG_pointer_type => self.build_pointer_type(key)?,
            gimli::constants::DW_TAG_reference_type => self.build_reference_type(key, true)?,
            gimli::constants::DW_TAG_rvalue_reference_type => self.build_reference_type(key, false)?,
            gimli::constants::DW_TAG_array_type => self.build_array_type(key)?,
            gimli::constants::DW_TAG_enumeration_type => self.build_enum_type(key)?,
            gimli::constants::DW_TAG_typedef => self.build_typedef(key)?,
            gimli::constants::DW_TAG_structure_type
            | gimli::constants::DW_TAG_class_type
            | gimli::constants::DW_TAG_union_type => self.build_class_type(key, tag)?,
            gimli::constants::DW_TAG_subroutine_type => self.build_function_type(key)?,
            _ => self.env.void_type(),
        };
        // spec.md §4.4: classes are deferred to the late queue since their
        // members may still be in flight; everything else can canonicalize
        // as soon as it is built.
        self.env.canonicalize_type(id);
        self.built.insert(key, BuiltNode::Type(id));
        Ok(id)
    }

    fn type_attr(&mut self, key: DieKey) -> Result<TypeId> {
        match self.attr_ref(key, gimli::constants::DW_AT_type)? {
            Some(target) => self.build_type(target),
            None => Ok(self.env.void_type()),
        }
    }

    fn build_base_type(&mut self, key: DieKey) -> Result<TypeId> {
        let name = self.attr_string(key, gimli::constants::DW_AT_name)?.unwrap_or_default();
        let size_bits = self.attr_udata(key, gimli::constants::DW_AT_byte_size)?.unwrap_or(0) * 8;
        let interned = self.env.interner.intern(&name);
        Ok(self.env.types.push(
            Type::new(size_bits, size_bits, TypeData::Builtin { name: interned })
                .with_origin(die_origin(key)),
        ))
    }

    /// spec.md §4.5 "Qualified types": a `const` reference is re-emitted as
    /// just a reference, to avoid spurious diffs.
    fn build_qualified_type(&mut self, key: DieKey, tag: gimli::DwTag) -> Result<TypeId> {
        let underlying = self.type_attr(key)?;
        if tag == gimli::constants::DW_TAG_const_type {
            if matches!(
                self.env.types[underlying].data,
                TypeData::Reference { .. }
            ) {
                return Ok(underlying);
            }
        }
        let mut cv = CvQualifiers::NONE;
        if tag == gimli::constants::DW_TAG_const_type {
            cv.insert(CvQualifiers::CONST);
        }
        if tag == gimli::constants::DW_TAG_volatile_type {
            cv.insert(CvQualifiers::VOLATILE);
        }
        let size = self.env.types[underlying].size_bits;
        Ok(self.env.types.push(
            Type::new(size, size, TypeData::Qualified { underlying, cv }).with_origin(die_origin(key)),
        ))
    }

    fn address_size_bits(&self, key: DieKey) -> u64 {
        self.unit_for(key).map(|u| u.header.address_size() as u64 * 8).unwrap_or(64)
    }

    fn build_pointer_type(&mut self, key: DieKey) -> Result<TypeId> {
        let pointee = self.type_attr(key)?;
        let size_bits = self
            .attr_udata(key, gimli::constants::DW_AT_byte_size)?
            .map(|b| b * 8)
            .unwrap_or_else(|| self.address_size_bits(key));
        Ok(self.env.types.push(
            Type::new(size_bits, size_bits, TypeData::Pointer { pointee }).with_origin(die_origin(key)),
        ))
    }

    fn build_reference_type(&mut self, key: DieKey, is_lvalue: bool) -> Result<TypeId> {
        let referee = self.type_attr(key)?;
        let size_bits = self
            .attr_udata(key, gimli::constants::DW_AT_byte_size)?
            .map(|b| b * 8)
            .unwrap_or_else(|| self.address_size_bits(key));
        Ok(self.env.types.push(
            Type::new(size_bits, size_bits, TypeData::Reference { referee, is_lvalue })
                .with_origin(die_origin(key)),
        ))
    }

    fn build_array_type(&mut self, key: DieKey) -> Result<TypeId> {
        let element = self.type_attr(key)?;
        let language = self.tu_language(key)?;
        let default_lower = language.default_array_lower_bound();
        let mut subranges = Vec::new();
        for child in self.direct_children(key)? {
            if self.die_index.tag_of(child) != Some(gimli::constants::DW_TAG_subrange_type) {
                continue;
            }
            let lower_bound = self
                .attr_sdata(child, gimli::constants::DW_AT_lower_bound)?
                .unwrap_or(default_lower);
            let upper_bound = match self.attr_sdata(child, gimli::constants::DW_AT_upper_bound)? {
                Some(ub) => Some(ub),
                None => self
                    .attr_udata(child, gimli::constants::DW_AT_count)?
                    .map(|count| lower_bound + count as i64 - 1),
            };
            subranges.push(Subrange { lower_bound, upper_bound });
        }
        let element_size = self.env.types[element].size_bits;
        let count: u64 = subranges
            .iter()
            .map(|s| s.upper_bound.map(|ub| (ub - s.lower_bound + 1).max(0) as u64).unwrap_or(0))
            .product();
        Ok(self.env.types.push(
            Type::new(element_size * count, element_size.max(8), TypeData::Array { element, subranges })
                .with_origin(die_origin(key)),
        ))
    }

    fn build_enum_type(&mut self, key: DieKey) -> Result<TypeId> {
        let underlying = match self.attr_ref(key, gimli::constants::DW_AT_type)? {
            Some(target) => self.build_type(target)?,
            None => {
                // Synthesize an anonymous integer type_decl of the declared
                // size (spec.md §4.5 "Enums") and add it to the TU's global
                // scope.
                let size_bits = self.attr_udata(key, gimli::constants::DW_AT_byte_size)?.unwrap_or(4) * 8;
                let name = self.env.interner.intern(&format!("__anonymous_int__{size_bits}"));
                self.env.types.push(Type::new(size_bits, size_bits, TypeData::Builtin { name }))
            }
        };
        let mut enumerators = Vec::new();
        for child in self.direct_children(key)? {
            if self.die_index.tag_of(child) != Some(gimli::constants::DW_TAG_enumerator) {
                continue;
            }
            let name = self.attr_string(child, gimli::constants::DW_AT_name)?.unwrap_or_default();
            let value = self.attr_sdata(child, gimli::constants::DW_AT_const_value)?.unwrap_or(0);
            enumerators.push(Enumerator { name: self.env.interner.intern(&name), value });
        }
        let size_bits = self.env.types[underlying].size_bits;
        Ok(self.env.types.push(
            Type::new(size_bits, size_bits, TypeData::Enum(EnumTypeData { underlying, enumerators }))
                .with_origin(die_origin(key)),
        ))
    }

    fn build_typedef(&mut self, key: DieKey) -> Result<TypeId> {
        let underlying = self.type_attr(key)?;
        let name = self.attr_string(key, gimli::constants::DW_AT_name)?.unwrap_or_default();
        let size = self.env.types[underlying].size_bits;
        Ok(self.env.types.push(
            Type::new(
                size,
                size,
                TypeData::Typedef {
                    name: self.env.interner.intern(&name),
                    underlying,
                },
            )
            .with_origin(die_origin(key)),
        ))
    }

    /// spec.md §4.5 "Function types": the type is placed on the
    /// work-in-progress map before its parameters are built, so a cyclic
    /// reference through a parameter resolves to the same in-flight type.
    fn build_function_type(&mut self, key: DieKey) -> Result<TypeId> {
        let placeholder = self.env.types.push(Type::new(
            0,
            0,
            TypeData::Function(FunctionTypeData {
                return_type: self.env.void_type(),
                parameters: Vec::new(),
            }),
        ));
        self.built.insert(key, BuiltNode::Type(placeholder));

        let return_type = self.type_attr(key)?;
        let mut parameters = Vec::new();
        for child in self.direct_children(key)? {
            let tag = self.die_index.tag_of(child);
            if tag == Some(gimli::constants::DW_TAG_formal_parameter) {
                let ty = self.type_attr(child)?;
                let name = self.attr_string(child, gimli::constants::DW_AT_name)?;
                let is_artificial = self.attr_flag(child, gimli::constants::DW_AT_artificial)?;
                parameters.push(Parameter {
                    ty,
                    name: name.map(|n| self.env.interner.intern(&n)),
                    is_variadic: false,
                    is_artificial,
                });
            } else if tag == Some(gimli::constants::DW_TAG_unspecified_parameters) {
                parameters.push(Parameter {
                    ty: self.env.variadic_parameter_type(),
                    name: None,
                    is_variadic: true,
                    is_artificial: false,
                });
            }
        }
        if let TypeData::Function(f) = &mut self.env.types[placeholder].data {
            f.return_type = return_type;
            f.parameters = parameters;
        }
        Ok(placeholder)
    }

    /// spec.md §4.5 "Classes".
    fn build_class_type(&mut self, key: DieKey, tag: gimli::DwTag) -> Result<TypeId> {
        let raw_name = self.attr_string(key, gimli::constants::DW_AT_name)?.unwrap_or_default();
        let is_declaration_only = self.attr_flag(key, gimli::constants::DW_AT_declaration)?;
        let kind = if tag == gimli::constants::DW_TAG_union_type {
            ClassKind::Union
        } else if tag == gimli::constants::DW_TAG_structure_type {
            ClassKind::Struct
        } else {
            ClassKind::Class
        };
        let is_anonymous = raw_name.is_empty();
        let name = if is_anonymous { self.synthesize_anonymous_class_name(kind) } else { raw_name };
        let size_bits = self.attr_udata(key, gimli::constants::DW_AT_byte_size)?.unwrap_or(0) * 8;

        let placeholder = self.env.types.push(Type::new(
            size_bits,
            size_bits,
            TypeData::ClassOrUnion(ClassData {
                name: self.env.interner.intern(&name),
                kind,
                is_anonymous,
                is_declaration_only,
                definition_of_declaration: None,
                bases: Vec::new(),
                data_members: Vec::new(),
                member_functions: Vec::new(),
                member_types: Vec::new(),
            }),
        ));
        self.built.insert(key, BuiltNode::Type(placeholder));

        let mut bases = Vec::new();
        let mut data_members = Vec::new();
        let mut member_functions = Vec::new();
        let mut member_types = Vec::new();

        for child in self.direct_children(key)? {
            match self.die_index.tag_of(child) {
                Some(gimli::constants::DW_TAG_inheritance) => {
                    let base = self.type_attr(child)?;
                    let offset_bits = self
                        .member_offset_bits(child)?
                        .unwrap_or(0);
                    let is_virtual = self
                        .attr_udata(child, gimli::constants::DW_AT_virtuality)?
                        .map(|v| v != 0)
                        .unwrap_or(false);
                    let access = self.member_access(child, kind)?;
                    bases.push(BaseSpecifier { base, access, offset_bits, is_virtual });
                }
                Some(gimli::constants::DW_TAG_member) | Some(gimli::constants::DW_TAG_variable) => {
                    let member_name = self.attr_string(child, gimli::constants::DW_AT_name)?.unwrap_or_default();
                    if is_vtable_pointer_name(&member_name) {
                        continue;
                    }
                    let ty = self.type_attr(child)?;
                    let layout_offset_bits = self.member_offset_bits(child)?;
                    let is_laid_out = layout_offset_bits.is_some();
                    let is_static = !is_laid_out;
                    let access = self.member_access(child, kind)?;
                    let interned = self.env.interner.intern(&member_name);
                    let decl = self.env.decls.push(Decl::new(
                        interned,
                        member_name,
                        DeclData::Var { ty, is_in_public_symbol_table: false },
                    ));
                    data_members.push(DataMember {
                        decl,
                        access,
                        layout_offset_bits,
                        is_static,
                        is_laid_out,
                    });
                }
                Some(gimli::constants::DW_TAG_subprogram) => {
                    if let Some(decl) = self.build_member_function(child, kind)? {
                        let mf = self.finish_member_function(child, decl, &name, kind)?;
                        member_functions.push(mf);
                    }
                }
                Some(
                    gimli::constants::DW_TAG_structure_type
                    | gimli::constants::DW_TAG_class_type
                    | gimli::constants::DW_TAG_union_type
                    | gimli::constants::DW_TAG_enumeration_type
                    | gimli::constants::DW_TAG_typedef,
                ) => {
                    member_types.push(self.build_type(child)?);
                }
                _ => {}
            }
        }

        if let Some(c) = self.env.types[placeholder].as_class_mut() {
            c.bases = bases;
            c.data_members = data_members;
            c.member_functions = member_functions;
            c.member_types = member_types;
            // spec.md §3 invariant: a class with a non-static data member
            // cannot remain declaration-only, no matter what DWARF said.
            if c.has_non_static_data_member() {
                c.is_declaration_only = false;
            }
        }
        resort_virtual_functions(&mut self.env.types, placeholder);

        if self.env.types[placeholder].as_class().map(|c| c.is_declaration_only).unwrap_or(false) {
            self.decl_only_classes.entry(name).or_default().push(placeholder);
        }
        Ok(placeholder)
    }

    fn member_offset_bits(&mut self, key: DieKey) -> Result<Option<u64>> {
        let Some(target) = self.raw_attr(key, gimli::constants::DW_AT_data_member_location)? else {
            return Ok(None);
        };
        match target {
            AttributeValue::Udata(v) => Ok(Some(v * 8)),
            AttributeValue::Sdata(v) => Ok(Some((v * 8).max(0) as u64)),
            AttributeValue::Exprloc(expr_data) => {
                let bytes = expr_data.0.to_slice().map_err(DwarfError::from)?;
                let r = expr::evaluate_constant_prefix(&bytes, 8)?;
                Ok(Some((r.value * 8).max(0) as u64))
            }
            _ => Ok(None),
        }
    }

    fn member_access(&mut self, key: DieKey, owner_kind: ClassKind) -> Result<Access> {
        if let Some(v) = self.attr_udata(key, gimli::constants::DW_AT_accessibility)? {
            return Ok(match v as u8 {
                x if x == gimli::constants::DW_ACCESS_public.0 => Access::Public,
                x if x == gimli::constants::DW_ACCESS_protected.0 => Access::Protected,
                _ => Access::Private,
            });
        }
        Ok(match owner_kind {
            ClassKind::Struct | ClassKind::Union => Access::Public,
            ClassKind::Class => Access::Private,
        })
    }

    // ---- declarations ----

    fn build_function(&mut self, key: DieKey, scope: ScopeId, tu: abg_ir::TuId) -> Result<Option<DeclId>> {
        self.build_function_like(key, Some(scope), Some(tu))
    }

    fn build_member_function(&mut self, key: DieKey, _owner_kind: ClassKind) -> Result<Option<DeclId>> {
        self.build_function_like(key, None, None)
    }

    fn build_function_like(
        &mut self,
        key: DieKey,
        scope: Option<ScopeId>,
        tu: Option<abg_ir::TuId>,
    ) -> Result<Option<DeclId>> {
        if let Some(BuiltNode::Decl(id)) = self.built.get(&key) {
            return Ok(Some(*id));
        }

        // DW_AT_specification / DW_AT_abstract_origin: build the origin
        // first, then clone/extend it (spec.md §4.5 "Per-DIE dispatch").
        let origin_key = self
            .attr_ref(key, gimli::constants::DW_AT_specification)?
            .or(self.attr_ref(key, gimli::constants::DW_AT_abstract_origin)?);

        let name = self.attr_string(key, gimli::constants::DW_AT_name)?.unwrap_or_default();
        let linkage_name = self.attr_string(key, gimli::constants::DW_AT_linkage_name)?;
        let is_declaration_only = self.attr_flag(key, gimli::constants::DW_AT_declaration)?;

        let function_type = self.synthesize_subprogram_function_type(key)?;

        if let Some(origin) = origin_key {
            if let Some(origin_decl) = self.build_function_like(origin, scope, tu)? {
                let origin_linkage = self.env.decls[origin_decl].linkage_name.map(|s| s.as_str().to_string());
                if linkage_name.is_some() && linkage_name != origin_linkage {
                    // Clone: an inline-instance DIE referring to the
                    // out-of-line definition.
                    let clone_name = self.env.interner.intern(&name);
                    let mut decl = Decl::new(
                        clone_name,
                        name.clone(),
                        DeclData::Function {
                            function_type,
                            is_declaration_only,
                            cloned_from: Some(origin_decl),
                        },
                    );
                    decl.linkage_name = linkage_name.as_deref().map(|s| self.env.interner.intern(s));
                    decl.scope = scope;
                    let decl_id = self.env.decls.push(decl);
                    self.built.insert(key, BuiltNode::Decl(decl_id));
                    self.bind_function_symbol(decl_id)?;
                    return Ok(Some(decl_id));
                }
                self.built.insert(key, BuiltNode::Decl(origin_decl));
                return Ok(Some(origin_decl));
            }
        }

        let interned = self.env.interner.intern(&name);
        let mut decl = Decl::new(
            interned,
            name,
            DeclData::Function {
                function_type,
                is_declaration_only,
                cloned_from: None,
            },
        );
        decl.linkage_name = linkage_name.as_deref().map(|s| self.env.interner.intern(s));
        decl.scope = scope;
        let decl_id = self.env.decls.push(decl);
        self.built.insert(key, BuiltNode::Decl(decl_id));
        self.bind_function_symbol(decl_id)?;
        Ok(Some(decl_id))
    }

    /// spec.md §4.5 "Functions": bind the symbol now if possible, otherwise
    /// schedule a fixup for after all TUs are read.
    fn bind_function_symbol(&mut self, decl: DeclId) -> Result<()> {
        let Some(linkage) = self.env.decls[decl].linkage_name.map(|s| s.as_str().to_string()) else {
            return Ok(());
        };
        if let Some(sym) = self.elf.lookup_defined_function(&linkage).and_then(|syms| syms.first()) {
            self.env.decls[decl].symbol = Some(*sym);
        } else {
            self.fixups.push(PendingFixup { decl, linkage_name: linkage });
        }
        Ok(())
    }

    fn synthesize_subprogram_function_type(&mut self, key: DieKey) -> Result<TypeId> {
        let return_type = self.type_attr(key)?;
        let mut parameters = Vec::new();
        for child in self.direct_children(key)? {
            let tag = self.die_index.tag_of(child);
            if tag == Some(gimli::constants::DW_TAG_formal_parameter) {
                let ty = self.type_attr(child)?;
                let is_artificial = self.attr_flag(child, gimli::constants::DW_AT_artificial)?;
                parameters.push(Parameter { ty, name: None, is_variadic: false, is_artificial });
            } else if tag == Some(gimli::constants::DW_TAG_unspecified_parameters) {
                parameters.push(Parameter {
                    ty: self.env.variadic_parameter_type(),
                    name: None,
                    is_variadic: true,
                    is_artificial: false,
                });
            }
        }
        Ok(self
            .env
            .types
            .push(Type::new(0, 0, TypeData::Function(FunctionTypeData { return_type, parameters }))))
    }

    /// spec.md §4.5 "Member function finish pass".
    fn finish_member_function(
        &mut self,
        key: DieKey,
        decl: DeclId,
        class_name: &str,
        owner_kind: ClassKind,
    ) -> Result<MemberFunction> {
        let fn_name = self.env.decls[decl].name.as_str().to_string();
        let is_ctor = fn_name == class_name;
        let is_dtor = fn_name.starts_with('~');
        let virtuality = self.attr_udata(key, gimli::constants::DW_AT_virtuality)?.unwrap_or(0);
        let is_virtual = virtuality != 0;
        let vtable_offset = if is_virtual {
            self.raw_attr(key, gimli::constants::DW_AT_vtable_elem_location)?.and_then(|v| match v {
                AttributeValue::Udata(u) => Some(u),
                AttributeValue::Exprloc(e) => e
                    .0
                    .to_slice()
                    .ok()
                    .and_then(|b| expr::evaluate_constant_prefix(&b, 8).ok())
                    .map(|r| r.value as u64),
                _ => None,
            })
        } else {
            None
        };
        let access = self.member_access(key, owner_kind)?;

        // spec.md §4.5: `is_static` iff the first parameter is not an
        // artificial pointer to the enclosing class; `is_const` comes from
        // that same artificial `this` parameter pointing at a
        // const-qualified class, not from `DW_AT_const_value` (that
        // attribute holds compile-time constant values, e.g. enumerators).
        let this_param = self
            .direct_children(key)?
            .into_iter()
            .find(|c| self.die_index.tag_of(*c) == Some(gimli::constants::DW_TAG_formal_parameter));
        let this_is_artificial = match this_param {
            Some(p) => self.attr_flag(p, gimli::constants::DW_AT_artificial)?,
            None => false,
        };
        let is_static = !this_is_artificial;
        let is_const = if this_is_artificial {
            let this_ty = self.type_attr(this_param.unwrap())?;
            self.pointee_is_const(this_ty)
        } else {
            false
        };

        Ok(MemberFunction {
            decl,
            access,
            is_virtual,
            vtable_offset,
            is_ctor,
            is_dtor,
            is_const,
            is_static,
        })
    }

    /// True if `ty` is a pointer type whose pointee is `const`-qualified.
    fn pointee_is_const(&self, ty: TypeId) -> bool {
        match &self.env.types[ty].data {
            TypeData::Pointer { pointee } => {
                matches!(&self.env.types[*pointee].data, TypeData::Qualified { cv, .. } if cv.contains(CvQualifiers::CONST))
            }
            _ => false,
        }
    }

    fn build_variable(&mut self, key: DieKey, scope: ScopeId, _tu: abg_ir::TuId) -> Result<Option<DeclId>> {
        if let Some(BuiltNode::Decl(id)) = self.built.get(&key) {
            return Ok(Some(*id));
        }
        let name = self.attr_string(key, gimli::constants::DW_AT_name)?.unwrap_or_default();
        let mut linkage_name = self.attr_string(key, gimli::constants::DW_AT_linkage_name)?;
        let ty = self.type_attr(key)?;

        let interned = self.env.interner.intern(&name);
        let mut decl = Decl::new(interned, name, DeclData::Var { ty, is_in_public_symbol_table: false });
        decl.scope = Some(scope);

        // Variable address, to bind a symbol when no linkage name told us
        // which one (spec.md §4.5 "Variables").
        if let Some(loc) = self.raw_attr(key, gimli::constants::DW_AT_location)? {
            if let AttributeValue::Exprloc(e) = loc {
                if let Ok(bytes) = e.0.to_slice() {
                    if let Ok(r) = expr::evaluate_constant_prefix(&bytes, 8) {
                        if r.is_constant && !r.is_tls_address {
                            if let Some(sym) = self.elf.lookup_by_address(r.value as u64) {
                                let sym_name = self.elf.symbols[sym].name.as_str().to_string();
                                if linkage_name.as_deref().map(str::is_empty).unwrap_or(true) {
                                    linkage_name = Some(sym_name);
                                }
                                decl.symbol = Some(sym);
                                if let DeclData::Var { is_in_public_symbol_table, .. } = &mut decl.data {
                                    *is_in_public_symbol_table = true;
                                }
                            }
                        }
                    }
                }
            }
        }
        decl.linkage_name = linkage_name.as_deref().map(|s| self.env.interner.intern(s));
        let decl_id = self.env.decls.push(decl);
        self.built.insert(key, BuiltNode::Decl(decl_id));
        Ok(Some(decl_id))
    }

    // ---- declaration-only resolution & fixups ----

    /// spec.md §4.5 step 5 / §4.4: rewrite every declaration-only class's
    /// `definition_of_declaration` to the first real definition found with
    /// the same qualified name.
    fn resolve_declaration_only_classes(&mut self) {
        let mut definitions: HashMap<String, TypeId> = HashMap::new();
        for (id, ty) in self.env.types.iter() {
            if let Some(c) = ty.as_class() {
                if !c.is_declaration_only {
                    definitions.entry(c.name.as_str().to_string()).or_insert(id);
                }
            }
        }
        for (name, decls) in &self.decl_only_classes {
            if let Some(&def) = definitions.get(name) {
                for &decl_only in decls {
                    if let Some(c) = self.env.types.get_mut(decl_only).as_class_mut() {
                        c.definition_of_declaration = Some(def);
                    }
                }
            }
        }
    }

    /// spec.md §4.5 step 6.
    fn run_fixups(&mut self, _corpus: &mut abg_ir::Corpus) {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in fixups {
            if let Some(sym) = self.elf.lookup_defined_function(&fixup.linkage_name).and_then(|syms| syms.first()) {
                self.env.decls[fixup.decl].symbol = Some(*sym);
            }
        }
    }

    // ---- attribute helpers ----

    fn tu_language(&mut self, key: DieKey) -> Result<SourceLanguage> {
        let Some(cu_root) = self.die_index.cu_of(key) else { return Ok(SourceLanguage::Other) };
        let lang = self.attr_udata(cu_root, gimli::constants::DW_AT_language)?;
        Ok(lang.map(|v| dw_lang_to_source_language(gimli::DwLang(v as u16))).unwrap_or(SourceLanguage::Other))
    }

    fn raw_attr(&mut self, key: DieKey, at: gimli::DwAt) -> Result<Option<AttributeValue<R>>> {
        let Some(off) = self.entry_for(key)? else { return Ok(None) };
        let Some(unit) = self.unit_for(key) else { return Ok(None) };
        let entry = unit.entry(off)?;
        Ok(entry.attr_value(at)?)
    }

    fn attr_string(&mut self, key: DieKey, at: gimli::DwAt) -> Result<Option<String>> {
        let Some(value) = self.raw_attr(key, at)? else { return Ok(None) };
        let dwarf = if key.is_alt { self.alt.unwrap() } else { self.main };
        let Some(unit) = self.unit_for(key) else { return Ok(None) };
        match dwarf.attr_string(unit, value) {
            Ok(r) => Ok(Some(r.to_string_lossy()?.into_owned())),
            Err(_) => Ok(None),
        }
    }

    fn attr_ref(&mut self, key: DieKey, at: gimli::DwAt) -> Result<Option<DieKey>> {
        let Some(value) = self.raw_attr(key, at)? else { return Ok(None) };
        Ok(match value {
            AttributeValue::UnitRef(off) => {
                let unit = self.unit_for(key).unwrap();
                let header_offset = cu_header_offset(unit);
                let abs = off.to_debug_info_offset(&unit.header).map(|o| o.0.into_u64()).unwrap_or(header_offset + off.0.into_u64());
                Some(DieKey { offset: abs, is_alt: key.is_alt })
            }
            AttributeValue::DebugInfoRef(off) => Some(DieKey { offset: off.0.into_u64(), is_alt: key.is_alt }),
            AttributeValue::DebugInfoRefSup(off) => Some(DieKey { offset: off.0.into_u64(), is_alt: true }),
            _ => None,
        })
    }

    fn attr_udata(&mut self, key: DieKey, at: gimli::DwAt) -> Result<Option<u64>> {
        Ok(self.raw_attr(key, at)?.and_then(|v| v.udata_value()))
    }

    fn attr_sdata(&mut self, key: DieKey, at: gimli::DwAt) -> Result<Option<i64>> {
        Ok(self.raw_attr(key, at)?.and_then(|v| v.sdata_value()))
    }

    fn attr_flag(&mut self, key: DieKey, at: gimli::DwAt) -> Result<bool> {
        Ok(match self.raw_attr(key, at)? {
            Some(AttributeValue::Flag(b)) => b,
            Some(other) => other.udata_value().map(|v| v != 0).unwrap_or(false),
            None => false,
        })
    }
}

fn cu_header_offset<R: Reader>(unit: &gimli::Unit<R>) -> u64 {
    unit.header.offset().as_debug_info_offset().map(|o| o.0.into_u64()).unwrap_or(0)
}

fn die_origin(key: DieKey) -> abg_ir::DieOrigin {
    abg_ir::DieOrigin { offset: key.offset, is_alt: key.is_alt }
}

/// `_vptr[^0-9A-Za-z_]` (spec.md §4.5 "Classes"): the hidden vtable pointer,
/// skipped rather than surfaced as a data member.
fn is_vtable_pointer_name(name: &str) -> bool {
    name.strip_prefix("_vptr")
        .map(|rest| rest.chars().next().map(|c| !c.is_ascii_alphanumeric() && c != '_').unwrap_or(true))
        .unwrap_or(false)
}

fn resort_virtual_functions(types: &mut abg_ir::TypeArena, class: TypeId) {
    if let Some(c) = types.get_mut(class).as_class_mut() {
        c.member_functions.sort_by(|a, b| match (a.is_virtual, b.is_virtual) {
            (true, true) => a.vtable_offset.cmp(&b.vtable_offset),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => std::cmp::Ordering::Equal,
        });
    }
}

/// Reads `DW_AT_name` and `DW_AT_language` off the CU's root DIE in one walk.
fn cu_root_name_and_language<R: Reader>(
    dwarf: &gimli::Dwarf<R>,
    unit: &gimli::Unit<R>,
) -> Result<(String, SourceLanguage)> {
    let mut cursor = unit.entries();
    let Some((_, root)) = cursor.next_dfs()? else {
        return Ok((String::new(), SourceLanguage::Other));
    };
    let name = match root.attr_value(gimli::constants::DW_AT_name)? {
        Some(value) => match dwarf.attr_string(unit, value) {
            Ok(r) => r.to_string_lossy()?.into_owned(),
            Err(_) => String::new(),
        },
        None => String::new(),
    };
    let language = match root.attr_value(gimli::constants::DW_AT_language)? {
        Some(value) => value
            .udata_value()
            .map(|v| dw_lang_to_source_language(gimli::DwLang(v as u16)))
            .unwrap_or(SourceLanguage::Other),
        None => SourceLanguage::Other,
    };
    Ok((name, language))
}

/// `DW_AT_language` to the coarse families the builder needs
/// (spec.md §4.5 "Arrays"): the default lower bound and reporter output both
/// only care about the family, not the exact DWARF constant.
fn dw_lang_to_source_language(lang: gimli::DwLang) -> SourceLanguage {
    use gimli::constants::*;
    match lang {
        DW_LANG_C
        | DW_LANG_C89
        | DW_LANG_C99
        | DW_LANG_C11
        | DW_LANG_C17
        | DW_LANG_ObjC
        | DW_LANG_C_plus_plus
        | DW_LANG_C_plus_plus_03
        | DW_LANG_C_plus_plus_11
        | DW_LANG_C_plus_plus_14
        | DW_LANG_ObjC_plus_plus => {
            if matches!(
                lang,
                DW_LANG_C_plus_plus
                    | DW_LANG_C_plus_plus_03
                    | DW_LANG_C_plus_plus_11
                    | DW_LANG_C_plus_plus_14
                    | DW_LANG_ObjC_plus_plus
            ) {
                SourceLanguage::Cxx
            } else {
                SourceLanguage::C
            }
        }
        DW_LANG_Fortran77 | DW_LANG_Fortran90 | DW_LANG_Fortran95 | DW_LANG_Fortran03 | DW_LANG_Fortran08 => {
            SourceLanguage::Fortran
        }
        DW_LANG_Ada83 | DW_LANG_Ada95 => SourceLanguage::Ada,
        DW_LANG_Pascal83 => SourceLanguage::Pascal,
        DW_LANG_Cobol74 | DW_LANG_Cobol85 => SourceLanguage::Cobol,
        DW_LANG_PLI => SourceLanguage::Pl1,
        _ => SourceLanguage::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtable_pointer_name_is_recognized() {
        assert!(is_vtable_pointer_name("_vptr$Base"));
        assert!(is_vtable_pointer_name("_vptr.Base"));
        assert!(!is_vtable_pointer_name("_vptr_not_a_vtable"));
        assert!(!is_vtable_pointer_name("vptr"));
    }
}
