//! Building [`TypeDefinition`]s from image rows.
//!
//! Loading a definition decodes its row, its member lists and their signatures. Referenced
//! types are resolved to handles only; no other definition is loaded on the way, so a type
//! that mentions itself or its subclasses in a signature cannot recurse.

use std::sync::Arc;

use tracing::trace;

use crate::{
    metadata::{
        signatures::SignatureParser,
        tables::{
            CodedIndex, FieldRaw, GenericParamRaw, InterfaceImplRaw, MethodDefRaw, TableId,
            TypeDefRaw,
        },
        typesystem::{
            registry::TypeSystem, resolver::ModuleResolver, FieldDefinition, FieldId,
            MethodDefinition, MethodId, TypeAttributes, TypeDefId, TypeDefinition,
        },
    },
    Result,
};

impl TypeSystem {
    pub(crate) fn load_definition(&self, id: TypeDefId) -> Result<TypeDefinition> {
        let image = self.require_image(id.module, id.token)?;
        let rid = id.token.row();
        let row = image.row::<TypeDefRaw>(id.token)?;
        let resolver = ModuleResolver::new(self, id.module);
        let max_depth = self.config().max_signature_depth;

        let parent = if row.extends.is_null() {
            None
        } else {
            Some(self.resolve_type_token(id.module, row.extends.token)?)
        };

        let mut interfaces = Vec::new();
        if let Some(table) = image.table::<InterfaceImplRaw>() {
            for entry in table.iter() {
                let entry = entry?;
                if entry.class == rid {
                    interfaces.push(self.resolve_type_token(id.module, entry.interface.token)?);
                }
            }
        }

        let mut generic_params = Vec::new();
        if let Some(table) = image.table::<GenericParamRaw>() {
            let owner = CodedIndex::new(TableId::TypeDef, rid);
            for param in table.iter() {
                let param = param?;
                if param.owner == owner {
                    generic_params.push((param.number, image.strings().get(param.name as usize)?));
                }
            }
        }
        generic_params.sort_by_key(|(number, _)| *number);
        for (position, (number, name)) in generic_params.iter().enumerate() {
            if usize::from(*number) != position {
                return Err(malformed_error!(
                    "Generic parameter {} of {} is numbered {}",
                    name,
                    id.token,
                    number
                ));
            }
        }

        let mut fields = Vec::new();
        for field_rid in image.type_fields(rid)? {
            let field = image.row::<FieldRaw>(TableId::Field.token(field_rid))?;
            let signature = image.blobs().get(field.signature as usize)?;
            let field_type = SignatureParser::new(signature, self.pool(), &resolver, max_depth)
                .parse_field_signature()?
                .field_type;

            fields.push(FieldDefinition {
                id: FieldId {
                    module: id.module,
                    token: field.token,
                },
                name: Arc::from(image.strings().get(field.name as usize)?),
                flags: field.flags,
                field_type,
            });
        }

        let mut methods = Vec::new();
        for method_rid in image.type_methods(rid)? {
            let method = image.row::<MethodDefRaw>(TableId::MethodDef.token(method_rid))?;
            let signature = image.blobs().get(method.signature as usize)?;
            let signature = SignatureParser::new(signature, self.pool(), &resolver, max_depth)
                .parse_method_signature()?;

            methods.push(Arc::new(MethodDefinition {
                id: MethodId::new(id.module, method_rid),
                owner: id,
                name: Arc::from(image.strings().get(method.name as usize)?),
                flags: method.flags,
                impl_flags: method.impl_flags,
                rva: method.rva,
                signature,
            }));
        }

        let enclosing = image
            .enclosing_type(rid)?
            .map(|enclosing| TypeDefId::new(id.module, enclosing));

        trace!(
            token = %id.token,
            fields = fields.len(),
            methods = methods.len(),
            generic_params = generic_params.len(),
            "type definition decoded"
        );

        Ok(TypeDefinition {
            id,
            namespace: Arc::from(image.strings().get(row.type_namespace as usize)?),
            name: Arc::from(image.strings().get(row.type_name as usize)?),
            flags: TypeAttributes::from_bits_retain(row.flags),
            parent,
            interfaces,
            generic_params: generic_params
                .into_iter()
                .map(|(_, name)| Arc::from(name))
                .collect(),
            enclosing,
            methods,
            fields,
            method_impls: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        metadata::{
            image::Image,
            token::Token,
            typesystem::{NullHost, PrimitiveKind, TypeKind, TypeSystem},
        },
        test::MetadataBuilder,
        Error, LoadConfig,
    };

    #[test]
    fn load_generic_definition() {
        let mut builder = MetadataBuilder::new();
        builder.module("box.dll");
        builder.type_def(0, "", "<Module>", Token::default());
        let boxed = builder.type_def(0x0010_0001, "Demo", "Box`1", Token::default());
        builder.field(0x0001, "value", &[0x06, 0x13, 0x00]);
        // instance !0 Get()
        builder.method(0x01C6, "Get", &[0x20, 0x00, 0x13, 0x00], 0);
        // static void Put(!0[])
        builder.method(0x0016, "Put", &[0x00, 0x01, 0x01, 0x1D, 0x13, 0x00], 0);
        builder.generic_param(0, boxed, "T");

        let system = TypeSystem::new(Arc::new(NullHost), LoadConfig::default());
        let module = system
            .add_image(Image::load(builder.build_metadata()).unwrap())
            .unwrap();
        let id = system.find_type("Demo", "Box`1").unwrap().unwrap();
        assert_eq!(id.module, module);

        let definition = system.definition(id).unwrap();
        let pool = system.pool();
        assert_eq!(definition.full_name(), "Demo.Box`1");
        assert_eq!(definition.parent, None);
        assert_eq!(&*definition.generic_params[0], "T");
        assert_eq!(definition.fields[0].field_type, pool.var(0));
        assert_eq!(definition.methods.len(), 2);
        assert!(definition.methods[0].is_virtual());
        assert!(definition.methods[0].is_new_slot());
        assert_eq!(definition.methods[0].signature.return_type, pool.var(0));
        assert!(!definition.methods[1].is_virtual());
        assert_eq!(
            definition.methods[1].signature.params,
            [pool.sz_array(pool.var(0))]
        );
        assert_eq!(definition.virtual_methods().count(), 1);

        let own = system.self_type(id).unwrap();
        assert_eq!(
            pool.kind(own),
            Some(&TypeKind::GenericInst {
                definition: id,
                args: vec![pool.var(0)],
            })
        );
        assert_eq!(system.type_name(own), "Demo.Box`1<!0>");
        let int_box = pool.generic_inst(id, vec![pool.primitive(PrimitiveKind::I4)]);
        assert_eq!(system.type_name(int_box), "Demo.Box`1<System.Int32>");

        assert_eq!(system.method_owner(definition.methods[1].id).unwrap(), id);
        assert_eq!(system.loaded_definitions(), 1);
    }

    #[test]
    fn misnumbered_generic_params() {
        let mut builder = MetadataBuilder::new();
        builder.module("bad.dll");
        builder.type_def(0, "", "<Module>", Token::default());
        let pair = builder.type_def(0x0010_0001, "Demo", "Pair`2", Token::default());
        builder.generic_param(0, pair, "T");
        builder.generic_param(2, pair, "U");

        let system = TypeSystem::new(Arc::new(NullHost), LoadConfig::default());
        let module = system
            .add_image(Image::load(builder.build_metadata()).unwrap())
            .unwrap();
        let id = crate::metadata::typesystem::TypeDefId::new(module, pair.row());
        assert!(matches!(system.definition(id), Err(Error::BadImage { .. })));
    }
}
