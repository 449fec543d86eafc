//! The type system shared by every loaded image.
//!
//! [`TypeSystem`] owns the registered [`Image`]s, the [`TypePool`] and the caches that map
//! tokens to types and ids to loaded [`TypeDefinition`]s. Definitions are loaded on first
//! use, from their image or from the [`RuntimeHost`], and then never change.
//!
//! # Thread Safety
//!
//! Every cache is append-only and concurrent (`SkipMap`, `DashMap`, `boxcar`). Two threads
//! racing to load the same definition both decode it; the first insert wins and the host is
//! notified once.

use std::{
    fmt::Write,
    sync::{Arc, Mutex},
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use tracing::debug;

use crate::{
    config::LoadConfig,
    metadata::{
        image::Image,
        token::Token,
        typesystem::{
            MethodDefinition, MethodId, MethodImplEntry, ModuleId, PrimitiveKind, RuntimeHost,
            TypeDefId, TypeDefinition, TypeId, TypeKind, TypePool,
        },
    },
    Error, Result,
};

/// Resolution context for every image and host type.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use dotvtable::{metadata::{image::Image, typesystem::{NullHost, TypeSystem}}, LoadConfig};
///
/// let system = TypeSystem::new(Arc::new(NullHost), LoadConfig::default());
/// let module = system.add_image(Image::load(std::fs::read("Hello.dll")?)?)?;
/// let hello = system.find_type("Demo", "Hello")?.unwrap();
/// println!("{}", system.definition(hello)?.full_name());
/// ```
pub struct TypeSystem {
    images: boxcar::Vec<Arc<Image>>,
    registering: Mutex<()>,
    pool: Arc<TypePool>,
    host: Arc<dyn RuntimeHost>,
    config: LoadConfig,
    definitions: SkipMap<TypeDefId, Arc<TypeDefinition>>,
    pub(crate) method_owners: DashMap<MethodId, TypeDefId>,
    pub(crate) type_tokens: DashMap<(ModuleId, Token), TypeId>,
    pub(crate) method_impls: DashMap<TypeDefId, Arc<Vec<MethodImplEntry>>>,
}

impl TypeSystem {
    /// Create an empty type system with a fresh pool.
    #[must_use]
    pub fn new(host: Arc<dyn RuntimeHost>, config: LoadConfig) -> Self {
        Self::with_pool(Arc::new(TypePool::new()), host, config)
    }

    /// Create an empty type system interning into `pool`.
    #[must_use]
    pub fn with_pool(pool: Arc<TypePool>, host: Arc<dyn RuntimeHost>, config: LoadConfig) -> Self {
        TypeSystem {
            images: boxcar::Vec::new(),
            registering: Mutex::new(()),
            pool,
            host,
            config,
            definitions: SkipMap::new(),
            method_owners: DashMap::new(),
            type_tokens: DashMap::new(),
            method_impls: DashMap::new(),
        }
    }

    /// Register a loaded image and return its module id.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedConstruct`] once the image id range is exhausted.
    pub fn add_image(&self, image: Image) -> Result<ModuleId> {
        self.register(image, ModuleId::FIRST_HOST.0 as usize)
    }

    /// Push `image` unless `limit` images are registered already.
    fn register(&self, image: Image, limit: usize) -> Result<ModuleId> {
        let _guard = lock!(self.registering);
        if self.images.count() >= limit {
            return Err(Error::UnsupportedConstruct(format!(
                "too many images ({limit} registered)"
            )));
        }

        let module = ModuleId(self.images.push(Arc::new(image)) as u32);

        debug!(module = module.0, "image registered");
        Ok(module)
    }

    /// The image registered as `module`.
    #[must_use]
    pub fn image(&self, module: ModuleId) -> Option<&Arc<Image>> {
        if module.is_host() {
            return None;
        }
        self.images.get(module.0 as usize)
    }

    /// Number of registered images.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.count()
    }

    /// The shared type pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<TypePool> {
        &self.pool
    }

    /// The runtime host.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn RuntimeHost> {
        &self.host
    }

    /// The configuration depth limits are taken from.
    #[must_use]
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Number of definitions loaded so far.
    #[must_use]
    pub fn loaded_definitions(&self) -> usize {
        self.definitions.len()
    }

    /// The image registered as `module`, or a resolution failure naming `token`.
    pub(crate) fn require_image(&self, module: ModuleId, token: Token) -> Result<&Arc<Image>> {
        self.image(module).ok_or_else(|| Error::ResolutionFailure {
            token,
            name: String::new(),
            context: format!("unknown module {}", module.0),
        })
    }

    /// The loaded definition of `id`, loading it on first use.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailure`] for an unknown host type and any load error of
    /// the image row.
    pub fn definition(&self, id: TypeDefId) -> Result<Arc<TypeDefinition>> {
        if let Some(entry) = self.definitions.get(&id) {
            return Ok(entry.value().clone());
        }

        let definition = if id.module.is_host() {
            self.host
                .type_definition(id, &self.pool)
                .ok_or_else(|| Error::ResolutionFailure {
                    token: id.token,
                    name: String::new(),
                    context: "runtime host".to_string(),
                })?
        } else {
            self.load_definition(id)?
        };

        let definition = Arc::new(definition);
        let entry = self.definitions.get_or_insert(id, definition.clone());
        if Arc::ptr_eq(entry.value(), &definition) {
            for method in &definition.methods {
                self.method_owners.insert(method.id, id);
            }
            debug!(
                name = %definition.full_name(),
                token = %id.token,
                module = id.module.0,
                methods = definition.methods.len(),
                interfaces = definition.interfaces.len(),
                "type definition loaded"
            );
            self.host.type_loaded(&definition);
        }
        Ok(entry.value().clone())
    }

    /// The type definition declaring `method`.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailure`] if no loaded or loadable type owns it.
    pub fn method_owner(&self, method: MethodId) -> Result<TypeDefId> {
        if let Some(owner) = self.method_owners.get(&method) {
            return Ok(*owner);
        }

        if method.module.is_host() {
            return Err(Error::ResolutionFailure {
                token: method.token,
                name: String::new(),
                context: "method of an unloaded host type".to_string(),
            });
        }

        let image = self.require_image(method.module, method.token)?;
        let owner = TypeDefId::new(method.module, image.method_owner(method.token.row())?);
        self.method_owners.insert(method, owner);
        Ok(owner)
    }

    /// The loaded definition of `method`.
    ///
    /// # Errors
    /// See [`TypeSystem::method_owner`] and [`TypeSystem::definition`].
    pub fn method(&self, method: MethodId) -> Result<Arc<MethodDefinition>> {
        let owner = self.method_owner(method)?;
        self.definition(owner)?
            .method(method)
            .cloned()
            .ok_or_else(|| Error::ResolutionFailure {
                token: method.token,
                name: String::new(),
                context: format!("methods of {}", owner.token),
            })
    }

    /// The definition behind `id`: its own, or the generic definition of an instantiation.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedConstruct`] for types that have no definition, such as
    /// arrays and pointers.
    pub fn definition_of(&self, id: TypeId) -> Result<Arc<TypeDefinition>> {
        match self.pool.definition_of(id) {
            Some(definition) => self.definition(definition),
            None => Err(Error::UnsupportedConstruct(format!(
                "{} has no type definition",
                self.type_name(id)
            ))),
        }
    }

    /// The type a definition has inside its own body: the definition itself, or its open
    /// instantiation `T<!0, ..., !n>` if it is generic.
    ///
    /// The parameter count comes from the cached definition, loading it on first use.
    ///
    /// # Errors
    /// Propagates definition load and host failures.
    pub fn self_type(&self, id: TypeDefId) -> Result<TypeId> {
        let count = self.definition(id)?.generic_param_count() as u32;
        if count == 0 {
            return Ok(self.pool.def(id));
        }
        let args = (0..count).map(|index| self.pool.var(index)).collect();
        Ok(self.pool.generic_inst(id, args))
    }

    /// Find a top-level type by namespace and name across the registered images.
    ///
    /// # Errors
    /// Propagates row read failures.
    pub fn find_type(&self, namespace: &str, name: &str) -> Result<Option<TypeDefId>> {
        for (index, image) in self.images.iter() {
            if let Some(rid) = image.find_type(namespace, name)? {
                return Ok(Some(TypeDefId::new(ModuleId(index as u32), rid)));
            }
        }
        Ok(None)
    }

    /// Find a top-level type in the images whose assembly is named `assembly`, then ask
    /// the host.
    ///
    /// # Errors
    /// Propagates row read failures.
    pub fn find_type_in_assembly(
        &self,
        assembly: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TypeDefId>> {
        for (index, image) in self.images.iter() {
            if image.assembly_name()? != Some(assembly) {
                continue;
            }
            if let Some(rid) = image.find_type(namespace, name)? {
                return Ok(Some(TypeDefId::new(ModuleId(index as u32), rid)));
            }
        }
        Ok(self.host.resolve_type(assembly, namespace, name))
    }

    /// Human-readable name of a type, e.g. `Demo.Box<System.Int32>[]`.
    ///
    /// Definitions that cannot be loaded print as their token.
    #[must_use]
    pub fn type_name(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type_name(&mut out, id);
        out
    }

    fn write_type_name(&self, out: &mut String, id: TypeId) {
        let Some(kind) = self.pool.kind(id) else {
            let _ = write!(out, "{id:?}");
            return;
        };

        match kind {
            TypeKind::Primitive(primitive) => {
                let _ = write!(out, "System.{}", primitive.name());
            }
            TypeKind::Def(definition) => self.write_definition_name(out, *definition),
            TypeKind::GenericInst { definition, args } => {
                self.write_definition_name(out, *definition);
                out.push('<');
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    self.write_type_name(out, *arg);
                }
                out.push('>');
            }
            TypeKind::Var(index) => {
                let _ = write!(out, "!{index}");
            }
            TypeKind::MVar(index) => {
                let _ = write!(out, "!!{index}");
            }
            TypeKind::Ptr(inner) => {
                self.write_type_name(out, *inner);
                out.push('*');
            }
            TypeKind::ByRef(inner) => {
                self.write_type_name(out, *inner);
                out.push('&');
            }
            TypeKind::SzArray(inner) => {
                self.write_type_name(out, *inner);
                out.push_str("[]");
            }
            TypeKind::Array { element, shape } => {
                self.write_type_name(out, *element);
                out.push('[');
                for _ in 1..shape.rank {
                    out.push(',');
                }
                out.push(']');
            }
            TypeKind::Modified {
                required,
                modifier,
                inner,
            } => {
                self.write_type_name(out, *inner);
                out.push_str(if *required { " modreq(" } else { " modopt(" });
                self.write_type_name(out, *modifier);
                out.push(')');
            }
            TypeKind::Pinned(inner) => {
                self.write_type_name(out, *inner);
                out.push_str(" pinned");
            }
        }
    }

    fn write_definition_name(&self, out: &mut String, id: TypeDefId) {
        match self.definition(id) {
            Ok(definition) => {
                if let Some(enclosing) = definition.enclosing {
                    self.write_definition_name(out, enclosing);
                    out.push('/');
                }
                out.push_str(&definition.full_name());
            }
            Err(_) => {
                let _ = write!(out, "{}", id.token);
            }
        }
    }

    /// The host's definition of `object` or `string`, if it has one.
    #[must_use]
    pub fn core_type(&self, kind: PrimitiveKind) -> Option<TypeDefId> {
        self.host.core_type(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::typesystem::NullHost,
        test::{MetadataBuilder, StubHost},
    };

    fn image() -> Image {
        let mut builder = MetadataBuilder::new();
        builder.module("one.dll");
        builder.type_def(0, "", "<Module>", Token::default());
        builder.type_def(0x0010_0001, "Demo", "Plain", Token::default());
        let pair = builder.type_def(0x0010_0001, "Demo", "Pair`2", Token::default());
        builder.generic_param(0, pair, "T");
        builder.generic_param(1, pair, "U");
        Image::load(builder.build_metadata()).unwrap()
    }

    #[test]
    fn rejected_image_is_not_registered() {
        let system = TypeSystem::new(Arc::new(NullHost), LoadConfig::default());
        assert_eq!(system.register(image(), 1).unwrap(), ModuleId(0));
        assert!(matches!(
            system.register(image(), 1),
            Err(Error::UnsupportedConstruct(_))
        ));
        assert_eq!(system.image_count(), 1);
        assert!(system.image(ModuleId(1)).is_none());
        assert_eq!(system.add_image(image()).unwrap(), ModuleId(1));
    }

    #[test]
    fn self_type_reads_cached_definition() {
        let system = TypeSystem::new(Arc::new(StubHost::new()), LoadConfig::default());
        let module = system.add_image(image()).unwrap();
        let plain = TypeDefId::new(module, 2);
        let pair = TypeDefId::new(module, 3);

        assert_eq!(system.self_type(plain).unwrap(), system.pool().def(plain));
        let open = system.self_type(pair).unwrap();
        assert_eq!(
            system.pool().kind(open),
            Some(&TypeKind::GenericInst {
                definition: pair,
                args: vec![system.pool().var(0), system.pool().var(1)],
            })
        );
        assert_eq!(system.self_type(pair).unwrap(), open);
        assert_eq!(system.loaded_definitions(), 2);

        let object = system.core_type(PrimitiveKind::Object).unwrap();
        assert_eq!(system.self_type(object).unwrap(), system.pool().def(object));
    }
}
