use crate::jvm::annotations::{
    decode_annotations, encode_annotations, is_annotation_attribute, AnnotationEntry,
};
use crate::jvm::class_file::{self, Attribute, AttributeLike, Constant, ConstantIndex, ConstantValue};
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::{BaseType, Error, FieldAccessFlags, FieldType, ParseDescriptor, RenderDescriptor};

/// Mutable field
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: FieldType,

    /// Initial value of a static field (`ConstantValue` attribute)
    initial_value: Option<ConstantIndex>,

    annotations: Vec<AnnotationEntry>,

    /// Attributes of the field not modelled above
    attributes: Vec<Attribute>,
}

impl FieldBuilder {
    pub fn new(
        access_flags: FieldAccessFlags,
        name: impl Into<String>,
        descriptor: &str,
    ) -> Result<FieldBuilder, Error> {
        let descriptor = FieldType::parse(descriptor).map_err(Error::IoError)?;
        Ok(FieldBuilder {
            access_flags,
            name: name.into(),
            descriptor,
            initial_value: None,
            annotations: vec![],
            attributes: vec![],
        })
    }

    /// Wrap a parsed field, checking its indices against the pool
    pub fn from_field(field: &class_file::Field, pool: &ConstantPool) -> Result<FieldBuilder, Error> {
        let name = pool.get_utf8(field.name_index)?;
        let descriptor = pool.get_utf8(field.descriptor_index)?;
        let mut builder = FieldBuilder::new(field.access_flags, name, descriptor).map_err(|_| {
            Error::MalformedClass(format!("bad descriptor {:?} for field {}", descriptor, name))
        })?;

        for attribute in &field.attributes {
            let attribute_name = pool.attribute_name(attribute)?;
            if let Some(ConstantValue(value)) = pool.parse_attribute(attribute)? {
                builder.set_initial_value(pool, value)?;
            } else if !is_annotation_attribute(attribute_name) {
                builder.attributes.push(attribute.clone());
            }
        }
        builder.annotations = decode_annotations(pool, &field.attributes)?;

        log::debug!("wrapped field {} {}", builder.name, builder.descriptor.render());
        Ok(builder)
    }

    pub fn initial_value(&self) -> Option<ConstantIndex> {
        self.initial_value
    }

    /// Set the initial value, which must be a constant matching the field type
    ///
    /// `int`, `short`, `char`, `byte`, and `boolean` fields take `Integer` constants, `long`,
    /// `float`, and `double` take their own kind, and `java/lang/String` takes `String`.
    pub fn set_initial_value(
        &mut self,
        pool: &ConstantPool,
        value: ConstantIndex,
    ) -> Result<(), Error> {
        let constant = pool.get(value)?;
        let compatible = match (&self.descriptor, constant) {
            (
                FieldType::Base(
                    BaseType::Int
                    | BaseType::Short
                    | BaseType::Char
                    | BaseType::Byte
                    | BaseType::Boolean,
                ),
                Constant::Integer(_),
            ) => true,
            (FieldType::Base(BaseType::Long), Constant::Long(_)) => true,
            (FieldType::Base(BaseType::Float), Constant::Float(_)) => true,
            (FieldType::Base(BaseType::Double), Constant::Double(_)) => true,
            (descriptor, Constant::String(_)) => descriptor.is_string(),
            _ => false,
        };
        if !compatible {
            return Err(Error::IncompatibleConstant {
                descriptor: self.descriptor.render(),
                constant: constant.clone(),
            });
        }
        self.initial_value = Some(value);
        Ok(())
    }

    pub fn clear_initial_value(&mut self) {
        self.initial_value = None;
    }

    pub fn annotations(&self) -> &[AnnotationEntry] {
        &self.annotations
    }

    pub fn add_annotation(&mut self, annotation: AnnotationEntry) {
        self.annotations.push(annotation);
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn add_attribute(
        &mut self,
        pool: &mut ConstantPool,
        attribute: impl AttributeLike,
    ) -> Result<(), Error> {
        let attribute = pool.get_attribute(attribute)?;
        self.attributes.push(attribute);
        Ok(())
    }

    /// Produce the field, adding whatever constants it needs to the pool
    pub fn build(&self, pool: &mut ConstantPool) -> Result<class_file::Field, Error> {
        let name_index = pool.add_utf8(&self.name)?;
        let descriptor_index = pool.add_utf8(&self.descriptor.render())?;

        let mut attributes = vec![];
        if let Some(value) = self.initial_value {
            attributes.push(pool.get_attribute(ConstantValue(value))?);
        }
        attributes.extend(self.attributes.iter().cloned());
        attributes.extend(encode_annotations(pool, &self.annotations)?);

        Ok(class_file::Field {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn initial_value_must_match_type() {
        let mut pool = ConstantPool::new();
        let flags = FieldAccessFlags::STATIC | FieldAccessFlags::FINAL;
        let mut field = FieldBuilder::new(flags, "LIMIT", "S").unwrap();

        let long = pool.add_long(3).unwrap();
        assert!(matches!(
            field.set_initial_value(&pool, long),
            Err(Error::IncompatibleConstant { descriptor, constant: Constant::Long(3) })
                if descriptor == "S"
        ));
        assert_eq!(field.initial_value(), None);

        let int = pool.add_integer(3).unwrap();
        field.set_initial_value(&pool, int).unwrap();
        assert_eq!(field.initial_value(), Some(int));

        let mut name = FieldBuilder::new(flags, "NAME", "Ljava/lang/String;").unwrap();
        let string = pool.add_string("hello").unwrap();
        name.set_initial_value(&pool, string.index()).unwrap();
        assert!(name.set_initial_value(&pool, int).is_err());

        let mut other = FieldBuilder::new(flags, "OTHER", "Ljava/lang/Object;").unwrap();
        assert!(other.set_initial_value(&pool, string.index()).is_err());
    }

    #[test]
    fn build_then_wrap() {
        let mut pool = ConstantPool::new();
        let mut field = FieldBuilder::new(FieldAccessFlags::STATIC, "RATE", "D").unwrap();
        let value = pool.add_double(0.5).unwrap();
        field.set_initial_value(&pool, value).unwrap();
        field.add_annotation(AnnotationEntry::new(&mut pool, "Ljava/lang/Deprecated;", true).unwrap());

        let built = field.build(&mut pool).unwrap();
        assert_eq!(built.attributes.len(), 2);

        let wrapped = FieldBuilder::from_field(&built, &pool).unwrap();
        assert_eq!(wrapped.name, "RATE");
        assert_eq!(wrapped.descriptor, FieldType::Base(BaseType::Double));
        assert_eq!(wrapped.initial_value(), Some(value));
        assert_eq!(wrapped.annotations().len(), 1);
        assert!(wrapped.attributes().is_empty());

        field.clear_initial_value();
        assert_eq!(field.build(&mut pool).unwrap().attributes.len(), 1);
    }
}
