use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            FieldSignature, LocalVariableSignature, MethodSignature, MethodSpecSignature,
            PropertySignature, CALLING_CONVENTION,
        },
        token::Token,
        typesystem::{ArrayShape, PrimitiveKind, TypeId, TypeKind, TypePool, ELEMENT_TYPE},
    },
    Error, Result,
};

/// Maps the TypeDef, TypeRef and TypeSpec tokens found in a blob to pool handles.
///
/// Implemented per module by the type system; tests use plain closures over a map.
pub trait TypeTokenResolver {
    /// Resolve a `TypeDefOrRefOrSpecEncoded` token.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResolutionFailure`] when the token names nothing.
    fn resolve_type_token(&self, token: Token) -> Result<TypeId>;
}

impl<F> TypeTokenResolver for F
where
    F: Fn(Token) -> Result<TypeId>,
{
    fn resolve_type_token(&self, token: Token) -> Result<TypeId> {
        self(token)
    }
}

/// Decoder for every signature blob kind of ECMA-335 II.23.2.
///
/// Types are interned into `pool` as they are read; class and value type tokens go through
/// `resolver`. Nesting deeper than `max_depth` fails with [`Error::RecursionLimit`].
///
/// A parser instance decodes exactly one blob.
///
/// # Example
///
/// ```rust
/// use dotvtable::metadata::{
///     signatures::SignatureParser,
///     token::Token,
///     typesystem::{PrimitiveKind, TypeId, TypePool},
/// };
///
/// let pool = TypePool::new();
/// let no_types = |token: Token| -> dotvtable::Result<TypeId> { unreachable!("{token}") };
/// let mut parser = SignatureParser::new(&[0x20, 0x01, 0x01, 0x0E], &pool, &no_types, 50);
/// let sig = parser.parse_method_signature()?;
/// assert_eq!(sig.params, [pool.primitive(PrimitiveKind::String)]);
/// # Ok::<(), dotvtable::Error>(())
/// ```
pub struct SignatureParser<'a> {
    parser: Parser<'a>,
    pool: &'a TypePool,
    resolver: &'a dyn TypeTokenResolver,
    depth: usize,
    max_depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// Create a parser over one blob.
    #[must_use]
    pub fn new(
        data: &'a [u8],
        pool: &'a TypePool,
        resolver: &'a dyn TypeTokenResolver,
        max_depth: usize,
    ) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            pool,
            resolver,
            depth: 0,
            max_depth,
        }
    }

    /// An empty vector for `count` entries read from this blob. Every entry takes at least
    /// one byte, so the reservation never exceeds what is left.
    fn entries<T>(&self, count: u32) -> Vec<T> {
        Vec::with_capacity((count as usize).min(self.parser.remaining()))
    }

    /// Parse a single type, including leading custom modifiers, `BYREF` and `PINNED`.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedConstruct`] for function pointers, [`Error::RecursionLimit`]
    /// for excessive nesting and [`Error::BadImage`] for unknown element types.
    pub fn parse_type(&mut self) -> Result<TypeId> {
        self.depth += 1;
        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeId> {
        check_depth!(self.depth, self.max_depth);

        let current_byte = self.parser.read_le::<u8>()?;
        if let Some(primitive) = PrimitiveKind::from_element_type(current_byte) {
            return Ok(self.pool.primitive(primitive));
        }

        match current_byte {
            ELEMENT_TYPE::PTR => {
                let inner = self.parse_type()?;
                Ok(self.pool.ptr(inner))
            }
            ELEMENT_TYPE::BYREF => {
                let inner = self.parse_type()?;
                Ok(self.pool.by_ref(inner))
            }
            ELEMENT_TYPE::SZARRAY => {
                let inner = self.parse_type()?;
                Ok(self.pool.sz_array(inner))
            }
            ELEMENT_TYPE::PINNED => {
                let inner = self.parse_type()?;
                Ok(self.pool.intern(TypeKind::Pinned(inner)))
            }
            ELEMENT_TYPE::VALUETYPE | ELEMENT_TYPE::CLASS => {
                let token = self.parser.read_compressed_token()?;
                self.resolver.resolve_type_token(token)
            }
            ELEMENT_TYPE::VAR => Ok(self.pool.var(self.parser.read_compressed_uint()?)),
            ELEMENT_TYPE::MVAR => Ok(self.pool.mvar(self.parser.read_compressed_uint()?)),
            ELEMENT_TYPE::ARRAY => {
                let element = self.parse_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                if num_sizes > rank {
                    return Err(malformed_error!(
                        "ARRAY - {} sizes for rank {}",
                        num_sizes,
                        rank
                    ));
                }
                let mut sizes = self.entries(num_sizes);
                for _ in 0..num_sizes {
                    sizes.push(self.parser.read_compressed_uint()?);
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                if num_lo_bounds > rank {
                    return Err(malformed_error!(
                        "ARRAY - {} lower bounds for rank {}",
                        num_lo_bounds,
                        rank
                    ));
                }
                let mut lower_bounds = self.entries(num_lo_bounds);
                for _ in 0..num_lo_bounds {
                    lower_bounds.push(self.parser.read_compressed_int()?);
                }

                Ok(self.pool.array(
                    element,
                    ArrayShape {
                        rank,
                        sizes,
                        lower_bounds,
                    },
                ))
            }
            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not CLASS or VALUETYPE - {}",
                        peek_byte
                    ));
                }

                let base = self.parse_type()?;
                let Some(definition) = self.pool.definition_of(base) else {
                    return Err(malformed_error!(
                        "GENERICINST - base {:?} is not a type definition",
                        base
                    ));
                };

                let arg_count = self.parser.read_compressed_uint()?;
                if arg_count == 0 {
                    return Err(malformed_error!("GENERICINST - no type arguments"));
                }
                let mut args = self.entries(arg_count);
                for _ in 0..arg_count {
                    args.push(self.parse_type()?);
                }

                Ok(self.pool.generic_inst(definition, args))
            }
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let token = self.parser.read_compressed_token()?;
                let modifier = self.resolver.resolve_type_token(token)?;
                let inner = self.parse_type()?;
                Ok(self.pool.intern(TypeKind::Modified {
                    required: current_byte == ELEMENT_TYPE::CMOD_REQD,
                    modifier,
                    inner,
                }))
            }
            ELEMENT_TYPE::FNPTR => Err(Error::UnsupportedConstruct(
                "function pointer signatures".to_string(),
            )),
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - 0x{:02X}",
                current_byte
            )),
        }
    }

    /// Parse a method signature - `MethodDefSig`, `MethodRefSig`, `StandAloneMethodSig`.
    ///
    /// # Errors
    /// Returns an error if the blob is truncated or holds an invalid type.
    pub fn parse_method_signature(&mut self) -> Result<MethodSignature> {
        let convention_byte = self.parser.read_le::<u8>()?;
        let calling_convention = convention_byte & CALLING_CONVENTION::KIND_MASK;
        if calling_convention > CALLING_CONVENTION::VARARG {
            return Err(malformed_error!(
                "MethodSignature - invalid calling convention 0x{:02X}",
                convention_byte
            ));
        }

        let generic_param_count = if convention_byte & CALLING_CONVENTION::GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };
        let param_count = self.parser.read_compressed_uint()?;
        let return_type = self.parse_type()?;

        let mut params = Vec::new();
        let mut varargs = Vec::new();
        for _ in 0..param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                // everything after the sentinel belongs to the call site
                self.parser.advance()?;
                if !varargs.is_empty() {
                    return Err(malformed_error!("MethodSignature - repeated SENTINEL"));
                }
                varargs.push(self.parse_type()?);
                continue;
            }

            let param = self.parse_type()?;
            if varargs.is_empty() {
                params.push(param);
            } else {
                varargs.push(param);
            }
        }

        Ok(MethodSignature {
            has_this: convention_byte & CALLING_CONVENTION::HAS_THIS != 0,
            explicit_this: convention_byte & CALLING_CONVENTION::EXPLICIT_THIS != 0,
            calling_convention,
            generic_param_count,
            return_type,
            params,
            varargs,
        })
    }

    /// Parse a field signature (II.23.2.4).
    ///
    /// # Errors
    /// Returns an error if the header byte is not `FIELD` or the type is invalid.
    pub fn parse_field_signature(&mut self) -> Result<FieldSignature> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != CALLING_CONVENTION::FIELD {
            return Err(malformed_error!(
                "FieldSignature - invalid start - 0x{:02X}",
                head_byte
            ));
        }

        Ok(FieldSignature {
            field_type: self.parse_type()?,
        })
    }

    /// Parse a property signature (II.23.2.5).
    ///
    /// # Errors
    /// Returns an error if the header byte lacks `PROPERTY` or a type is invalid.
    pub fn parse_property_signature(&mut self) -> Result<PropertySignature> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte & CALLING_CONVENTION::KIND_MASK != CALLING_CONVENTION::PROPERTY {
            return Err(malformed_error!(
                "PropertySignature - invalid start - 0x{:02X}",
                head_byte
            ));
        }

        let param_count = self.parser.read_compressed_uint()?;
        let property_type = self.parse_type()?;
        let mut params = self.entries(param_count);
        for _ in 0..param_count {
            params.push(self.parse_type()?);
        }

        Ok(PropertySignature {
            has_this: head_byte & CALLING_CONVENTION::HAS_THIS != 0,
            property_type,
            params,
        })
    }

    /// Parse a local variable signature (II.23.2.6).
    ///
    /// # Errors
    /// Returns an error if the header byte is not `LOCAL_SIG` or a type is invalid.
    pub fn parse_local_var_signature(&mut self) -> Result<LocalVariableSignature> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != CALLING_CONVENTION::LOCAL_SIG {
            return Err(malformed_error!(
                "LocalVarSignature - invalid start - 0x{:02X}",
                head_byte
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut locals = self.entries(count);
        for _ in 0..count {
            locals.push(self.parse_type()?);
        }

        Ok(LocalVariableSignature { locals })
    }

    /// Parse a TypeSpec blob (II.23.2.14).
    ///
    /// # Errors
    /// Returns an error if the type is invalid.
    pub fn parse_type_spec_signature(&mut self) -> Result<TypeId> {
        self.parse_type()
    }

    /// Parse a MethodSpec instantiation blob (II.23.2.15).
    ///
    /// # Errors
    /// Returns an error if the header byte is not `GENERIC_INST` or a type is invalid.
    pub fn parse_method_spec_signature(&mut self) -> Result<MethodSpecSignature> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != CALLING_CONVENTION::GENERIC_INST {
            return Err(malformed_error!(
                "MethodSpecSignature - invalid start - 0x{:02X}",
                head_byte
            ));
        }

        let arg_count = self.parser.read_compressed_uint()?;
        let mut args = self.entries(arg_count);
        for _ in 0..arg_count {
            args.push(self.parse_type()?);
        }

        Ok(MethodSpecSignature { args })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        file::compressed::MAX_COMPRESSED_UINT,
        metadata::typesystem::{ModuleId, TypeDefId},
    };

    struct Tokens {
        types: HashMap<Token, TypeId>,
    }

    impl TypeTokenResolver for Tokens {
        fn resolve_type_token(&self, token: Token) -> Result<TypeId> {
            self.types
                .get(&token)
                .copied()
                .ok_or_else(|| Error::ResolutionFailure {
                    token,
                    name: String::new(),
                    context: "test".to_string(),
                })
        }
    }

    fn setup() -> (TypePool, Tokens) {
        let pool = TypePool::new();
        let mut types = HashMap::new();
        // TypeDef 1 = List`1, TypeRef 0xD = IsVolatile
        types.insert(
            Token::new(0x0200_0001),
            pool.def(TypeDefId::new(ModuleId(0), 1)),
        );
        types.insert(
            Token::new(0x0100_000D),
            pool.def(TypeDefId::new(ModuleId(1), 9)),
        );
        (pool, Tokens { types })
    }

    fn parse(pool: &TypePool, tokens: &Tokens, data: &[u8]) -> Result<TypeId> {
        SignatureParser::new(data, pool, tokens, 50).parse_type()
    }

    #[test]
    fn primitives() {
        let (pool, tokens) = setup();
        let cases = [
            (0x01, PrimitiveKind::Void),
            (0x02, PrimitiveKind::Boolean),
            (0x08, PrimitiveKind::I4),
            (0x0E, PrimitiveKind::String),
            (0x16, PrimitiveKind::TypedByRef),
            (0x18, PrimitiveKind::I),
            (0x1C, PrimitiveKind::Object),
        ];
        for (byte, kind) in cases {
            assert_eq!(parse(&pool, &tokens, &[byte]).unwrap(), pool.primitive(kind));
        }
    }

    #[test]
    fn composites() {
        let (pool, tokens) = setup();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let list = TypeDefId::new(ModuleId(0), 1);

        assert_eq!(parse(&pool, &tokens, &[0x0F, 0x08]).unwrap(), pool.ptr(int32));
        assert_eq!(parse(&pool, &tokens, &[0x10, 0x08]).unwrap(), pool.by_ref(int32));
        assert_eq!(parse(&pool, &tokens, &[0x1D, 0x08]).unwrap(), pool.sz_array(int32));
        assert_eq!(parse(&pool, &tokens, &[0x13, 0x02]).unwrap(), pool.var(2));
        assert_eq!(parse(&pool, &tokens, &[0x1E, 0x00]).unwrap(), pool.mvar(0));
        assert_eq!(
            parse(&pool, &tokens, &[0x12, 0x04]).unwrap(),
            pool.def(list)
        );

        // List<int32[]>
        assert_eq!(
            parse(&pool, &tokens, &[0x15, 0x12, 0x04, 0x01, 0x1D, 0x08]).unwrap(),
            pool.generic_inst(list, vec![pool.sz_array(int32)])
        );

        // int32[2..., 3] with lower bounds -2, 0
        let array = parse(
            &pool,
            &tokens,
            &[0x14, 0x08, 0x02, 0x01, 0x03, 0x02, 0x7D, 0x00],
        )
        .unwrap();
        assert_eq!(
            pool.kind(array),
            Some(&TypeKind::Array {
                element: int32,
                shape: ArrayShape {
                    rank: 2,
                    sizes: vec![3],
                    lower_bounds: vec![-2, 0],
                },
            })
        );
    }

    #[test]
    fn custom_modifiers() {
        let (pool, tokens) = setup();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let modifier = pool.def(TypeDefId::new(ModuleId(1), 9));

        // modreq(IsVolatile) int32
        let volatile = parse(&pool, &tokens, &[0x1F, 0x35, 0x08]).unwrap();
        assert_eq!(
            pool.kind(volatile),
            Some(&TypeKind::Modified {
                required: true,
                modifier,
                inner: int32,
            })
        );
        assert_ne!(volatile, parse(&pool, &tokens, &[0x20, 0x35, 0x08]).unwrap());
    }

    #[test]
    fn errors() {
        let (pool, tokens) = setup();
        assert!(matches!(
            parse(&pool, &tokens, &[0x1B, 0x00, 0x00, 0x01]),
            Err(Error::UnsupportedConstruct(_))
        ));
        assert!(matches!(
            parse(&pool, &tokens, &[0x41]),
            Err(Error::BadImage { .. })
        ));
        assert!(matches!(
            parse(&pool, &tokens, &[0x15, 0x08, 0x01, 0x08]),
            Err(Error::BadImage { .. })
        ));
        assert!(matches!(
            parse(&pool, &tokens, &[0x12, 0x08]),
            Err(Error::ResolutionFailure { .. })
        ));
        assert!(parse(&pool, &tokens, &[0x1D]).is_err());
    }

    #[test]
    fn oversized_counts_fail_on_missing_entries() {
        let (pool, tokens) = setup();
        let huge = [0xDF, 0xFF, 0xFF, 0xFF];
        let blob = |head: &[u8], tail: &[u8]| [head, &huge[..], tail].concat();

        assert!(parse(&pool, &tokens, &blob(&[0x15, 0x12, 0x04], &[0x08])).is_err());
        assert!(parse(&pool, &tokens, &blob(&[0x14, 0x08], &huge)).is_err());
        assert!(SignatureParser::new(&blob(&[0x08], &[0x08]), &pool, &tokens, 50)
            .parse_property_signature()
            .is_err());
        assert!(SignatureParser::new(&blob(&[0x07], &[0x08]), &pool, &tokens, 50)
            .parse_local_var_signature()
            .is_err());
        assert!(SignatureParser::new(&blob(&[0x0A], &[0x08]), &pool, &tokens, 50)
            .parse_method_spec_signature()
            .is_err());

        let parser = SignatureParser::new(&huge, &pool, &tokens, 50);
        assert!(parser.entries::<TypeId>(MAX_COMPRESSED_UINT).capacity() < 0x100);
    }

    #[test]
    fn depth_limit() {
        let (pool, tokens) = setup();
        let mut nested = vec![0x1D; 10];
        nested.push(0x08);

        let mut parser = SignatureParser::new(&nested, &pool, &tokens, 5);
        assert!(matches!(parser.parse_type(), Err(Error::RecursionLimit(5))));

        // depth is released again after each sibling
        let mut params = vec![0x00, 0x08, 0x01];
        for _ in 0..8 {
            params.extend_from_slice(&[0x1D, 0x1D, 0x08]);
        }
        params[1] = 8;
        let sig = SignatureParser::new(&params, &pool, &tokens, 5)
            .parse_method_signature()
            .unwrap();
        assert_eq!(sig.params.len(), 8);
    }

    #[test]
    fn method_signatures() {
        let (pool, tokens) = setup();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let string = pool.primitive(PrimitiveKind::String);

        // instance string M(int32&, !!0) generic 1
        let data = [0x30, 0x01, 0x02, 0x0E, 0x10, 0x08, 0x1E, 0x00];
        let sig = SignatureParser::new(&data, &pool, &tokens, 50)
            .parse_method_signature()
            .unwrap();
        assert!(sig.has_this);
        assert_eq!(sig.generic_param_count, 1);
        assert_eq!(sig.return_type, string);
        assert_eq!(sig.params, [pool.by_ref(int32), pool.mvar(0)]);

        let closed = sig.substitute(&pool, &[], &[string]);
        assert_eq!(closed.params[1], string);
        assert!(!closed.matches(&sig));

        // vararg void M(int32, ..., string)
        let data = [0x05, 0x02, 0x01, 0x08, 0x41, 0x0E];
        let sig = SignatureParser::new(&data, &pool, &tokens, 50)
            .parse_method_signature()
            .unwrap();
        assert!(sig.is_vararg());
        assert_eq!(sig.params, [int32]);
        assert_eq!(sig.varargs, [string]);

        // definition without the call-site tail matches
        let def = SignatureParser::new(&[0x05, 0x01, 0x01, 0x08], &pool, &tokens, 50)
            .parse_method_signature()
            .unwrap();
        assert!(def.matches(&sig));
    }

    #[test]
    fn other_blobs() {
        let (pool, tokens) = setup();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let string = pool.primitive(PrimitiveKind::String);

        let field = SignatureParser::new(&[0x06, 0x08], &pool, &tokens, 50)
            .parse_field_signature()
            .unwrap();
        assert_eq!(field.field_type, int32);
        assert!(SignatureParser::new(&[0x07, 0x08], &pool, &tokens, 50)
            .parse_field_signature()
            .is_err());

        // instance string this[int32]
        let property = SignatureParser::new(&[0x28, 0x01, 0x0E, 0x08], &pool, &tokens, 50)
            .parse_property_signature()
            .unwrap();
        assert!(property.has_this);
        assert_eq!(property.property_type, string);
        assert_eq!(property.params, [int32]);

        // pinned int32&, string
        let locals = SignatureParser::new(&[0x07, 0x02, 0x45, 0x10, 0x08, 0x0E], &pool, &tokens, 50)
            .parse_local_var_signature()
            .unwrap();
        assert_eq!(
            locals.locals,
            [pool.intern(TypeKind::Pinned(pool.by_ref(int32))), string]
        );

        let spec = SignatureParser::new(&[0x0A, 0x02, 0x08, 0x0E], &pool, &tokens, 50)
            .parse_method_spec_signature()
            .unwrap();
        assert_eq!(spec.args, [int32, string]);
    }
}
