use crate::jvm::annotations::{
    decode_annotations, encode_annotations, is_annotation_attribute, AnnotationEntry,
};
use crate::jvm::class_file::{
    Attribute, AttributeLike, ClassConstantIndex, ClassFile, Field, Method, SourceFile, Version,
};
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::model::{FieldBuilder, MethodBuilder};
use crate::jvm::{ClassAccessFlags, Error};

/// Mutable class
///
/// The builder owns the constant pool of the class. Fields and methods are kept in their built
/// form (so that untouched members cost nothing) and go through `FieldBuilder`/`MethodBuilder`
/// to be edited.
#[derive(Debug)]
pub struct ClassBuilder {
    pub version: Version,
    pub access_flags: ClassAccessFlags,

    /// Constants pool, shared by every member of the class
    pub constants_pool: ConstantPool,

    this_class: ClassConstantIndex,
    super_class: Option<ClassConstantIndex>,
    interfaces: Vec<ClassConstantIndex>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    annotations: Vec<AnnotationEntry>,

    /// Attributes of the class not modelled above
    attributes: Vec<Attribute>,
}

impl ClassBuilder {
    /// Create a new class builder, with a fresh constant pool
    pub fn new(
        version: Version,
        access_flags: ClassAccessFlags,
        this_class: &str,
        super_class: Option<&str>,
        interfaces: &[&str],
    ) -> Result<ClassBuilder, Error> {
        let mut constants_pool = ConstantPool::new();
        let this_class = constants_pool.add_class(this_class)?;
        let super_class = match super_class {
            Some(super_class) => Some(constants_pool.add_class(super_class)?),
            None => None,
        };
        let mut builder = ClassBuilder {
            version,
            access_flags,
            constants_pool,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            annotations: vec![],
            attributes: vec![],
        };
        for interface in interfaces {
            builder.add_interface(interface)?;
        }
        Ok(builder)
    }

    /// Wrap a parsed class file
    ///
    /// The whole class is checked against its constant pool (including decoding every method
    /// body), so a class that wraps successfully also builds successfully.
    pub fn from_class_file(class: ClassFile) -> Result<ClassBuilder, Error> {
        let constants_pool = ConstantPool::from_constants(class.constants)?;
        let this_class = constants_pool.class_index(class.this_class.index())?;
        let class_name = constants_pool.get_class_name(this_class)?.to_owned();
        let super_class = match class.super_class {
            Some(super_class) => Some(constants_pool.class_index(super_class.index())?),
            None => None,
        };
        let mut interfaces = vec![];
        for interface in &class.interfaces {
            interfaces.push(constants_pool.class_index(interface.index())?);
        }

        for field in &class.fields {
            FieldBuilder::from_field(field, &constants_pool)?;
        }
        for method in &class.methods {
            MethodBuilder::from_method(&class_name, method, &constants_pool)?;
        }

        let mut attributes = vec![];
        for attribute in &class.attributes {
            if !is_annotation_attribute(constants_pool.attribute_name(attribute)?) {
                attributes.push(attribute.clone());
            }
        }
        let annotations = decode_annotations(&constants_pool, &class.attributes)?;

        log::debug!(
            "wrapped class {} ({} constants, {} fields, {} methods)",
            class_name,
            constants_pool.len(),
            class.fields.len(),
            class.methods.len()
        );
        Ok(ClassBuilder {
            version: class.version,
            access_flags: class.access_flags,
            constants_pool,
            this_class,
            super_class,
            interfaces,
            fields: class.fields,
            methods: class.methods,
            annotations,
            attributes,
        })
    }

    pub fn class_name(&self) -> Result<&str, Error> {
        self.constants_pool.get_class_name(self.this_class)
    }

    /// Name of the superclass (only `java/lang/Object` has none)
    pub fn super_class_name(&self) -> Result<Option<&str>, Error> {
        match self.super_class {
            Some(super_class) => self.constants_pool.get_class_name(super_class).map(Some),
            None => Ok(None),
        }
    }

    pub fn interface_names(&self) -> Result<Vec<&str>, Error> {
        self.interfaces
            .iter()
            .map(|interface| self.constants_pool.get_class_name(*interface))
            .collect()
    }

    /// Add an interface (adding it twice has no effect)
    pub fn add_interface(&mut self, interface: &str) -> Result<(), Error> {
        let interface = self.constants_pool.add_class(interface)?;
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        Ok(())
    }

    /// Remove an interface, returning whether it was there
    pub fn remove_interface(&mut self, interface: &str) -> bool {
        let pool = &self.constants_pool;
        let before = self.interfaces.len();
        self.interfaces
            .retain(|index| pool.get_class_name(*index).ok() != Some(interface));
        self.interfaces.len() != before
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Position of the method with this name and descriptor
    fn method_position(&self, name: &str, descriptor: &str) -> Option<usize> {
        let pool = &self.constants_pool;
        self.methods.iter().position(|method| {
            pool.get_utf8(method.name_index).ok() == Some(name)
                && pool.get_utf8(method.descriptor_index).ok() == Some(descriptor)
        })
    }

    pub fn contains_method(&self, name: &str, descriptor: &str) -> bool {
        self.method_position(name, descriptor).is_some()
    }

    /// Wrap one of the methods of the class for editing
    pub fn method(&self, name: &str, descriptor: &str) -> Result<MethodBuilder, Error> {
        let position = self
            .method_position(name, descriptor)
            .ok_or_else(|| self.missing("method", name, descriptor))?;
        let class_name = self.class_name()?;
        MethodBuilder::from_method(class_name, &self.methods[position], &self.constants_pool)
    }

    /// Build a method into the class, after all the other methods
    pub fn add_method(&mut self, method: &MethodBuilder) -> Result<(), Error> {
        let method = method.build(&mut self.constants_pool)?;
        self.methods.push(method);
        Ok(())
    }

    /// Swap the method with this name and descriptor for another one, keeping its position
    pub fn replace_method(
        &mut self,
        name: &str,
        descriptor: &str,
        method: &MethodBuilder,
    ) -> Result<Method, Error> {
        let position = self
            .method_position(name, descriptor)
            .ok_or_else(|| self.missing("method", name, descriptor))?;
        let method = method.build(&mut self.constants_pool)?;
        Ok(std::mem::replace(&mut self.methods[position], method))
    }

    pub fn remove_method(&mut self, name: &str, descriptor: &str) -> Result<Method, Error> {
        let position = self
            .method_position(name, descriptor)
            .ok_or_else(|| self.missing("method", name, descriptor))?;
        Ok(self.methods.remove(position))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn field_position(&self, name: &str, descriptor: &str) -> Option<usize> {
        let pool = &self.constants_pool;
        self.fields.iter().position(|field| {
            pool.get_utf8(field.name_index).ok() == Some(name)
                && pool.get_utf8(field.descriptor_index).ok() == Some(descriptor)
        })
    }

    pub fn contains_field(&self, name: &str, descriptor: &str) -> bool {
        self.field_position(name, descriptor).is_some()
    }

    /// Wrap one of the fields of the class for editing
    pub fn field(&self, name: &str, descriptor: &str) -> Result<FieldBuilder, Error> {
        let position = self
            .field_position(name, descriptor)
            .ok_or_else(|| self.missing("field", name, descriptor))?;
        FieldBuilder::from_field(&self.fields[position], &self.constants_pool)
    }

    pub fn add_field(&mut self, field: &FieldBuilder) -> Result<(), Error> {
        let field = field.build(&mut self.constants_pool)?;
        self.fields.push(field);
        Ok(())
    }

    /// Swap the field with this name and descriptor for another one, keeping its position
    pub fn replace_field(
        &mut self,
        name: &str,
        descriptor: &str,
        field: &FieldBuilder,
    ) -> Result<Field, Error> {
        let position = self
            .field_position(name, descriptor)
            .ok_or_else(|| self.missing("field", name, descriptor))?;
        let field = field.build(&mut self.constants_pool)?;
        Ok(std::mem::replace(&mut self.fields[position], field))
    }

    pub fn remove_field(&mut self, name: &str, descriptor: &str) -> Result<Field, Error> {
        let position = self
            .field_position(name, descriptor)
            .ok_or_else(|| self.missing("field", name, descriptor))?;
        Ok(self.fields.remove(position))
    }

    fn missing(&self, kind: &str, name: &str, descriptor: &str) -> Error {
        let class_name = self.class_name().unwrap_or("<unnamed class>");
        Error::MissingMember(format!("{} {}.{}:{}", kind, class_name, name, descriptor))
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

    /// Add an attribute to the class
    pub fn add_attribute(&mut self, attribute: impl AttributeLike) -> Result<(), Error> {
        let attribute = self.constants_pool.get_attribute(attribute)?;
        self.attributes.push(attribute);
        Ok(())
    }

    /// Set the `SourceFile` attribute, replacing any previous one
    pub fn set_source_file(&mut self, file_name: &str) -> Result<(), Error> {
        let file_name = self.constants_pool.add_utf8(file_name)?;
        let attribute = self.constants_pool.get_attribute(SourceFile(file_name))?;
        let pool = &self.constants_pool;
        self.attributes
            .retain(|existing| pool.attribute_name(existing).ok() != Some(SourceFile::NAME));
        self.attributes.push(attribute);
        Ok(())
    }

    /// Consume the builder and produce the class file
    pub fn build(mut self) -> Result<ClassFile, Error> {
        let mut attributes = self.attributes;
        attributes.extend(encode_annotations(
            &mut self.constants_pool,
            &self.annotations,
        )?);

        Ok(ClassFile {
            version: self.version,
            constants: self.constants_pool.to_offset_vec(),
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            attributes,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::Instruction;
    use crate::jvm::{FieldAccessFlags, MethodAccessFlags};

    fn example() -> ClassBuilder {
        ClassBuilder::new(
            Version::JAVA8,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            "me/Example",
            Some("java/lang/Object"),
            &["java/lang/Runnable"],
        )
        .unwrap()
    }

    fn returning(name: &str) -> MethodBuilder {
        let mut method =
            MethodBuilder::new(MethodAccessFlags::PUBLIC, name, "()V", "me/Example").unwrap();
        method.instructions.append(Instruction::Return).unwrap();
        method.compute_max_locals();
        method
    }

    #[test]
    fn members_keep_their_order() {
        let mut class = example();
        class.add_method(&returning("a")).unwrap();
        class.add_method(&returning("b")).unwrap();
        class.add_method(&returning("c")).unwrap();
        let field = FieldBuilder::new(FieldAccessFlags::PRIVATE, "count", "I").unwrap();
        class.add_field(&field).unwrap();

        let mut replacement = returning("b2");
        let first = replacement.instructions.first().unwrap();
        replacement
            .instructions
            .insert_before(first, Instruction::Nop)
            .unwrap();
        let old = class.replace_method("b", "()V", &replacement).unwrap();
        assert_eq!(class.constants_pool.get_utf8(old.name_index).unwrap(), "b");

        let names: Vec<&str> = class
            .methods()
            .iter()
            .map(|method| class.constants_pool.get_utf8(method.name_index).unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b2", "c"]);
        assert_eq!(class.method("b2", "()V").unwrap().instructions.len(), 2);

        assert!(matches!(
            class.replace_method("b", "()V", &replacement),
            Err(Error::MissingMember(_))
        ));
        class.remove_method("a", "()V").unwrap();
        assert!(!class.contains_method("a", "()V"));
        assert!(class.contains_field("count", "I"));
        assert!(!class.contains_field("count", "J"));
        class.remove_field("count", "I").unwrap();
        assert!(class.fields().is_empty());
    }

    #[test]
    fn interfaces_are_unique() {
        let mut class = example();
        class.add_interface("java/lang/Runnable").unwrap();
        class.add_interface("java/io/Serializable").unwrap();
        assert_eq!(
            class.interface_names().unwrap(),
            vec!["java/lang/Runnable", "java/io/Serializable"]
        );
        assert!(class.remove_interface("java/lang/Runnable"));
        assert!(!class.remove_interface("java/lang/Runnable"));
        assert_eq!(class.interface_names().unwrap(), vec!["java/io/Serializable"]);
    }

    #[test]
    fn build_and_wrap_class() {
        let mut class = example();
        class.set_source_file("Example.java").unwrap();
        class.set_source_file("Other.java").unwrap();
        let annotation =
            AnnotationEntry::new(&mut class.constants_pool, "Ljava/lang/Deprecated;", true)
                .unwrap();
        class.add_annotation(annotation);
        class.add_method(&returning("run")).unwrap();

        let class_file = class.build().unwrap();
        assert_eq!(class_file.attributes.len(), 2);
        assert_eq!(class_file.class_name().unwrap(), "me/Example");

        let bytes = class_file.to_bytes().unwrap();
        let parsed = ClassFile::from_bytes(&bytes).unwrap();
        let wrapped = ClassBuilder::from_class_file(parsed).unwrap();
        assert_eq!(wrapped.class_name().unwrap(), "me/Example");
        assert_eq!(wrapped.super_class_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(wrapped.annotations().len(), 1);
        assert_eq!(wrapped.attributes().len(), 1);
        let SourceFile(file_name) = wrapped
            .constants_pool
            .find_attribute(wrapped.attributes())
            .unwrap()
            .unwrap();
        assert_eq!(wrapped.constants_pool.get_utf8(file_name).unwrap(), "Other.java");
        assert!(wrapped.contains_method("run", "()V"));
    }

    #[test]
    fn dangling_super_class_is_rejected() {
        let mut class_file = example().build().unwrap();
        class_file.super_class = Some(class_file.this_class);
        assert!(ClassBuilder::from_class_file(class_file.clone()).is_ok());

        // Point the super class at the utf8 name instead of the class constant
        let utf8 = class_file
            .constants
            .iter()
            .find_map(|(offset, _, constant)| match constant {
                crate::jvm::class_file::Constant::Utf8(name) if name == "java/lang/Object" => {
                    Some(offset.0 as u16)
                }
                _ => None,
            })
            .unwrap();
        let bad = ClassConstantIndex(crate::jvm::class_file::ConstantIndex(utf8));
        class_file.super_class = Some(bad);
        assert!(matches!(
            ClassBuilder::from_class_file(class_file),
            Err(Error::UnexpectedConstant { expected: "Class", .. })
        ));
    }
}
