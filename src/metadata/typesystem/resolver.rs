//! Token and member reference resolution.
//!
//! Every token an image uses to name a type or member is resolved here:
//!
//! - `TypeDef` tokens name a definition of the same module
//! - `TypeRef` tokens are matched by name in the scope they declare: the same module, a
//!   registered image of the referenced assembly, the host, or an enclosing type
//! - `TypeSpec` tokens are decoded from their signature blob
//! - `MemberRef` tokens are matched by name and signature against their parent's members
//!
//! Results of type token resolution are cached per `(module, token)`.

use std::sync::Arc;

use tracing::trace;

use crate::{
    metadata::{
        signatures::{
            LocalVariableSignature, MethodSignature, MethodSpecSignature, SignatureParser,
            TypeTokenResolver, CALLING_CONVENTION,
        },
        tables::{
            AssemblyRefRaw, CodedIndex, MemberRefRaw, MethodImplRaw, MethodSpecRaw,
            StandAloneSigRaw, TableId, TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
        typesystem::{
            registry::TypeSystem, FieldRef, MemberReference, MethodId, MethodImplEntry,
            MethodRef, ModuleId, TypeDefId, TypeId, TypeKind,
        },
    },
    Error, Result,
};

/// Resolves the type tokens of one module's blobs through the type system.
pub(crate) struct ModuleResolver<'a> {
    system: &'a TypeSystem,
    module: ModuleId,
    depth: usize,
}

impl<'a> ModuleResolver<'a> {
    pub(crate) fn new(system: &'a TypeSystem, module: ModuleId) -> Self {
        ModuleResolver {
            system,
            module,
            depth: 0,
        }
    }
}

impl TypeTokenResolver for ModuleResolver<'_> {
    fn resolve_type_token(&self, token: Token) -> Result<TypeId> {
        self.system
            .resolve_type_token_at(self.module, token, self.depth + 1)
    }
}

impl TypeSystem {
    /// Resolve a TypeDef, TypeRef or TypeSpec token of `module` to a type handle.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailure`] for references that match nothing,
    /// [`Error::UnsupportedConstruct`] for module-scoped references and
    /// [`Error::BadImage`] for tokens of other tables.
    pub fn resolve_type_token(&self, module: ModuleId, token: Token) -> Result<TypeId> {
        self.resolve_type_token_at(module, token, 0)
    }

    pub(crate) fn resolve_type_token_at(
        &self,
        module: ModuleId,
        token: Token,
        depth: usize,
    ) -> Result<TypeId> {
        check_depth!(depth, self.config().max_signature_depth);

        if let Some(id) = self.type_tokens.get(&(module, token)) {
            return Ok(*id);
        }

        let image = self.require_image(module, token)?;
        let id = match TableId::from_u8(token.table()) {
            Some(TableId::TypeDef) => {
                let rows = image.tables().rows(TableId::TypeDef);
                if token.row() == 0 || token.row() > rows {
                    return Err(Error::RowOutOfRange {
                        table: TableId::TypeDef,
                        rid: token.row(),
                        rows,
                    });
                }
                self.pool().def(TypeDefId::new(module, token.row()))
            }
            Some(TableId::TypeRef) => {
                let definition = self.resolve_type_ref(module, token, depth)?;
                self.pool().def(definition)
            }
            Some(TableId::TypeSpec) => {
                let spec = image.row::<TypeSpecRaw>(token)?;
                let blob = image.blobs().get(spec.signature as usize)?;
                let resolver = ModuleResolver {
                    system: self,
                    module,
                    depth,
                };
                SignatureParser::new(
                    blob,
                    self.pool(),
                    &resolver,
                    self.config().max_signature_depth,
                )
                .parse_type_spec_signature()?
            }
            _ => {
                return Err(malformed_error!(
                    "Token {} does not name a type",
                    token
                ))
            }
        };

        self.type_tokens.insert((module, token), id);
        Ok(id)
    }

    /// Resolve a TypeRef of `module` to the definition it names.
    fn resolve_type_ref(
        &self,
        module: ModuleId,
        token: Token,
        depth: usize,
    ) -> Result<TypeDefId> {
        check_depth!(depth, self.config().max_signature_depth);

        let image = self.require_image(module, token)?;
        let row = image.row::<TypeRefRaw>(token)?;
        let name = image.strings().get(row.type_name as usize)?;
        let namespace = image.strings().get(row.type_namespace as usize)?;
        let failure = |context: String| Error::ResolutionFailure {
            token,
            name: if namespace.is_empty() {
                name.to_string()
            } else {
                format!("{namespace}.{name}")
            },
            context,
        };

        let scope = row.resolution_scope;
        let resolved = match scope.tag {
            _ if scope.is_null() => image
                .find_type(namespace, name)?
                .map(|rid| TypeDefId::new(module, rid)),
            TableId::Module => image
                .find_type(namespace, name)?
                .map(|rid| TypeDefId::new(module, rid)),
            TableId::AssemblyRef => {
                let assembly = image.row::<AssemblyRefRaw>(scope.token)?;
                let assembly = image.strings().get(assembly.name as usize)?;
                let resolved = self.find_type_in_assembly(assembly, namespace, name)?;
                if resolved.is_none() {
                    return Err(failure(format!("assembly {assembly}")));
                }
                resolved
            }
            TableId::TypeRef => {
                let enclosing = self.resolve_type_ref(module, scope.token, depth + 1)?;
                self.find_nested_type(enclosing, name)?
            }
            TableId::ModuleRef => {
                return Err(Error::UnsupportedConstruct(format!(
                    "TypeRef {token} is scoped to another module of a multi-module assembly"
                )))
            }
            _ => None,
        };

        let resolved = resolved.ok_or_else(|| failure(format!("scope {:?}", scope.tag)))?;
        trace!(
            %token,
            module = module.0,
            target = %resolved.token,
            target_module = resolved.module.0,
            "TypeRef resolved"
        );
        Ok(resolved)
    }

    /// Find a type nested directly in `enclosing` by name.
    ///
    /// # Errors
    /// Propagates row read failures.
    pub fn find_nested_type(&self, enclosing: TypeDefId, name: &str) -> Result<Option<TypeDefId>> {
        if enclosing.module.is_host() {
            return Ok(self.host().resolve_nested_type(enclosing, name));
        }

        let image = self.require_image(enclosing.module, enclosing.token)?;
        Ok(image
            .find_nested_type(enclosing.token.row(), name)?
            .map(|rid| TypeDefId::new(enclosing.module, rid)))
    }

    /// Resolve a MethodDef, MemberRef or MethodSpec token of `module` to a method.
    ///
    /// MethodSpec tokens resolve to the generic method they instantiate; use
    /// [`TypeSystem::method_spec`] for the arguments.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailure`] if no method matches and [`Error::BadImage`] for
    /// tokens of other tables or MemberRefs naming fields.
    pub fn resolve_method_token(&self, module: ModuleId, token: Token) -> Result<MethodRef> {
        match TableId::from_u8(token.table()) {
            Some(TableId::MethodDef) => {
                let method = MethodId::new(module, token.row());
                let owner = self.method_owner(method)?;
                Ok(MethodRef {
                    declaring: self.self_type(owner)?,
                    method,
                })
            }
            Some(TableId::MemberRef) => match self.resolve_member_ref(module, token)? {
                MemberReference::Method(method) => Ok(method),
                MemberReference::Field(_) => Err(malformed_error!(
                    "MemberRef {} names a field where a method is expected",
                    token
                )),
            },
            Some(TableId::MethodSpec) => Ok(self.method_spec(module, token)?.0),
            _ => Err(malformed_error!("Token {} does not name a method", token)),
        }
    }

    fn resolve_method_def_or_ref(&self, module: ModuleId, index: CodedIndex) -> Result<MethodRef> {
        self.resolve_method_token(module, index.token)
    }

    /// Resolve a MemberRef of `module` to the method or field it names.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailure`] if the parent has no member of that name and
    /// signature, and [`Error::UnsupportedConstruct`] for module-scoped parents.
    pub fn resolve_member_ref(&self, module: ModuleId, token: Token) -> Result<MemberReference> {
        let image = self.require_image(module, token)?;
        let row = image.row::<MemberRefRaw>(token)?;
        let name = image.strings().get(row.name as usize)?;
        let blob = image.blobs().get(row.signature as usize)?;

        let declaring = match row.class.tag {
            TableId::TypeDef => self.self_type(TypeDefId::new(module, row.class.row))?,
            TableId::TypeRef | TableId::TypeSpec => {
                let declaring = self.resolve_type_token(module, row.class.token)?;
                match self.pool().kind(declaring) {
                    Some(TypeKind::Def(definition)) => self.self_type(*definition)?,
                    _ => declaring,
                }
            }
            TableId::MethodDef => {
                // vararg call site of a method in this module
                let method = MethodId::new(module, row.class.row);
                let owner = self.method_owner(method)?;
                return Ok(MemberReference::Method(MethodRef {
                    declaring: self.self_type(owner)?,
                    method,
                }));
            }
            TableId::ModuleRef => {
                return Err(Error::UnsupportedConstruct(format!(
                    "MemberRef {token} on a global member of another module"
                )))
            }
            other => {
                return Err(malformed_error!(
                    "MemberRef {} has parent in table {:?}",
                    token,
                    other
                ))
            }
        };

        let failure = || Error::ResolutionFailure {
            token,
            name: name.to_string(),
            context: self.type_name(declaring),
        };

        let resolver = ModuleResolver::new(self, module);
        let max_depth = self.config().max_signature_depth;
        let mut parser = SignatureParser::new(blob, self.pool(), &resolver, max_depth);

        if blob.first() == Some(&CALLING_CONVENTION::FIELD) {
            let field_type = parser.parse_field_signature()?.field_type;
            let field = self
                .find_field(declaring, name, field_type)?
                .ok_or_else(failure)?;
            return Ok(MemberReference::Field(field));
        }

        let signature = parser.parse_method_signature()?;
        let method = self
            .find_method(declaring, name, &signature)?
            .ok_or_else(failure)?;
        Ok(MemberReference::Method(method))
    }

    /// Find a method by name and signature on `declaring` or its ancestors.
    ///
    /// `signature` may be written against the generic definition (`!0`) or against
    /// `declaring`'s instantiation; both match.
    ///
    /// # Errors
    /// Propagates definition load failures.
    pub fn find_method(
        &self,
        declaring: TypeId,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<Option<MethodRef>> {
        let mut current = Some(declaring);
        let mut depth = 0;

        while let Some(ty) = current {
            check_depth!(depth, self.config().max_build_depth);
            let Some(definition_id) = self.pool().definition_of(ty) else {
                break;
            };
            let definition = self.definition(definition_id)?;
            let args = self.pool().generic_args(ty).to_vec();

            for method in &definition.methods {
                if &*method.name != name {
                    continue;
                }
                if method.signature.matches(signature)
                    || method
                        .signature
                        .substitute(self.pool(), &args, &[])
                        .matches(signature)
                {
                    return Ok(Some(MethodRef {
                        declaring: ty,
                        method: method.id,
                    }));
                }
            }

            current = definition
                .parent
                .map(|parent| self.pool().substitute(parent, &args, &[]));
            depth += 1;
        }

        Ok(None)
    }

    /// Find a field by name and type on `declaring` or its ancestors.
    ///
    /// # Errors
    /// Propagates definition load failures.
    pub fn find_field(
        &self,
        declaring: TypeId,
        name: &str,
        field_type: TypeId,
    ) -> Result<Option<FieldRef>> {
        let mut current = Some(declaring);
        let mut depth = 0;

        while let Some(ty) = current {
            check_depth!(depth, self.config().max_build_depth);
            let Some(definition_id) = self.pool().definition_of(ty) else {
                break;
            };
            let definition = self.definition(definition_id)?;
            let args = self.pool().generic_args(ty).to_vec();

            for field in &definition.fields {
                if &*field.name == name
                    && (field.field_type == field_type
                        || self.pool().substitute(field.field_type, &args, &[]) == field_type)
                {
                    return Ok(Some(FieldRef {
                        declaring: ty,
                        field: field.id,
                    }));
                }
            }

            current = definition
                .parent
                .map(|parent| self.pool().substitute(parent, &args, &[]));
            depth += 1;
        }

        Ok(None)
    }

    /// The signature of `method` read through its declaring instantiation.
    ///
    /// # Errors
    /// Propagates definition load failures.
    pub fn method_signature_in(&self, method: &MethodRef) -> Result<MethodSignature> {
        let definition = self.method(method.method)?;
        let args = self.pool().generic_args(method.declaring);
        Ok(definition.signature.substitute(self.pool(), args, &[]))
    }

    /// Resolve a MethodSpec of `module` to its generic method and instantiation.
    ///
    /// # Errors
    /// Returns an error if the method or the instantiation blob cannot be resolved.
    pub fn method_spec(
        &self,
        module: ModuleId,
        token: Token,
    ) -> Result<(MethodRef, MethodSpecSignature)> {
        let image = self.require_image(module, token)?;
        let row = image.row::<MethodSpecRaw>(token)?;
        let method = self.resolve_method_def_or_ref(module, row.method)?;

        let blob = image.blobs().get(row.instantiation as usize)?;
        let resolver = ModuleResolver::new(self, module);
        let instantiation = SignatureParser::new(
            blob,
            self.pool(),
            &resolver,
            self.config().max_signature_depth,
        )
        .parse_method_spec_signature()?;

        Ok((method, instantiation))
    }

    /// Decode the StandAloneSig `token` of `module` as a local variable signature.
    ///
    /// # Errors
    /// Returns an error if the row or blob is invalid.
    pub fn local_signature(
        &self,
        module: ModuleId,
        token: Token,
    ) -> Result<LocalVariableSignature> {
        let image = self.require_image(module, token)?;
        let row = image.row::<StandAloneSigRaw>(token)?;
        let blob = image.blobs().get(row.signature as usize)?;
        let resolver = ModuleResolver::new(self, module);
        SignatureParser::new(
            blob,
            self.pool(),
            &resolver,
            self.config().max_signature_depth,
        )
        .parse_local_var_signature()
    }

    /// The local variable types of `method`'s body; empty for methods without locals.
    ///
    /// # Errors
    /// Returns an error if the body or its local signature cannot be decoded.
    pub fn method_locals(&self, method: MethodId) -> Result<LocalVariableSignature> {
        let image = self.require_image(method.module, method.token)?;
        match image.method_body(method.token)? {
            Some(body) if body.has_locals() => {
                self.local_signature(method.module, body.local_var_sig_token)
            }
            _ => Ok(LocalVariableSignature::default()),
        }
    }

    /// The explicit overrides declared by `definition`, resolved and cached.
    ///
    /// # Errors
    /// Returns an error if a MethodImpl row references an unresolvable method.
    pub fn method_impls(&self, definition: TypeDefId) -> Result<Arc<Vec<MethodImplEntry>>> {
        if let Some(entries) = self.method_impls.get(&definition) {
            return Ok(entries.clone());
        }

        let entries = if definition.module.is_host() {
            self.definition(definition)?.method_impls.clone()
        } else {
            let image = self.require_image(definition.module, definition.token)?;
            let mut entries = Vec::new();
            if let Some(table) = image.table::<MethodImplRaw>() {
                for row in table.iter() {
                    let row = row?;
                    if row.class != definition.token.row() {
                        continue;
                    }
                    entries.push(MethodImplEntry {
                        body: self.resolve_method_def_or_ref(definition.module, row.method_body)?,
                        declaration: self
                            .resolve_method_def_or_ref(definition.module, row.method_declaration)?,
                    });
                }
            }
            entries
        };

        let entries = Arc::new(entries);
        self.method_impls.insert(definition, entries.clone());
        Ok(entries)
    }
}
