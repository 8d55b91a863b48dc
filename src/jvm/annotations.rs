//! Annotations and their attributes
//!
//! Annotations are stored in four attributes: `RuntimeVisibleAnnotations`,
//! `RuntimeInvisibleAnnotations`, and the two parameter variants of these. An
//! [`AnnotationEntry`] carries its visibility, and [`encode_annotations`] sorts a mixed list of
//! entries into the right attributes.
//!
//! Attribute names are only added to the constant pool for attributes that actually get emitted:
//! encoding no entries (or no entries of one visibility) never touches the pool.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16

use crate::jvm::class_file::{
    invalid_data, Attribute, AttributeLike, Constant, ConstantIndex, Deserialize, Serialize,
    Utf8ConstantIndex,
};
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::fmt::Write;
use std::io::Result;

/// Annotation, as it appears inside annotation attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface (eg. `Ljava/lang/Deprecated;`)
    pub type_index: Utf8ConstantIndex,
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementValuePair {
    pub name_index: Utf8ConstantIndex,
    pub value: ElementValue,
}

/// Value of an annotation element
///
/// Primitive values point to a constant of the matching kind (`Integer` for `Byte`, `Char`,
/// `Int`, `Short`, and `Boolean`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    Byte(ConstantIndex),
    Char(ConstantIndex),
    Double(ConstantIndex),
    Float(ConstantIndex),
    Int(ConstantIndex),
    Long(ConstantIndex),
    Short(ConstantIndex),
    Boolean(ConstantIndex),
    String(Utf8ConstantIndex),
    Enum {
        type_name: Utf8ConstantIndex,
        const_name: Utf8ConstantIndex,
    },
    /// Return descriptor of the class (eg. `Ljava/lang/Object;` or `V`)
    Class(Utf8ConstantIndex),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

/// Annotation on a class, field, method, or parameter, along with whether it is retained at
/// runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub annotation: Annotation,
    pub visible: bool,
}

impl AnnotationEntry {
    /// New annotation with no elements
    ///
    /// The type is given as a field descriptor (eg. `Ljava/lang/Deprecated;`).
    pub fn new(
        pool: &mut ConstantPool,
        type_descriptor: &str,
        visible: bool,
    ) -> std::result::Result<AnnotationEntry, Error> {
        Ok(AnnotationEntry {
            annotation: Annotation {
                type_index: pool.add_utf8(type_descriptor)?,
                element_value_pairs: vec![],
            },
            visible,
        })
    }

    /// Add a named element
    pub fn add_element(
        &mut self,
        pool: &mut ConstantPool,
        name: &str,
        value: ElementValue,
    ) -> std::result::Result<(), Error> {
        let name_index = pool.add_utf8(name)?;
        self.annotation
            .element_value_pairs
            .push(ElementValuePair { name_index, value });
        Ok(())
    }

    /// Field descriptor of the annotation type
    pub fn type_descriptor<'p>(&self, pool: &'p ConstantPool) -> std::result::Result<&'p str, Error> {
        pool.get_utf8(self.annotation.type_index)
    }

    /// Copy the annotation so that it refers to constants in another pool
    pub fn copy_into(
        &self,
        from: &ConstantPool,
        to: &mut ConstantPool,
    ) -> std::result::Result<AnnotationEntry, Error> {
        Ok(AnnotationEntry {
            annotation: self.annotation.copy_into(from, to)?,
            visible: self.visible,
        })
    }

    /// Render like source code (eg. `@Ljava/lang/Deprecated;(since="9")`)
    pub fn display(&self, pool: &ConstantPool) -> String {
        let mut out = String::new();
        self.annotation.render(pool, &mut out);
        out
    }
}

impl Annotation {
    fn copy_into(
        &self,
        from: &ConstantPool,
        to: &mut ConstantPool,
    ) -> std::result::Result<Annotation, Error> {
        let type_index = to.add_utf8(from.get_utf8(self.type_index)?)?;
        let element_value_pairs = self
            .element_value_pairs
            .iter()
            .map(|pair| {
                Ok(ElementValuePair {
                    name_index: to.add_utf8(from.get_utf8(pair.name_index)?)?,
                    value: pair.value.copy_into(from, to)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, Error>>()?;
        Ok(Annotation {
            type_index,
            element_value_pairs,
        })
    }

    fn render(&self, pool: &ConstantPool, out: &mut String) {
        out.push('@');
        out.push_str(&pool.display_constant(self.type_index.index()));
        out.push('(');
        for (i, pair) in self.element_value_pairs.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&pool.display_constant(pair.name_index.index()));
            out.push('=');
            pair.value.render(pool, out);
        }
        out.push(')');
    }
}

impl ElementValue {
    pub fn int(pool: &mut ConstantPool, value: i32) -> std::result::Result<ElementValue, Error> {
        Ok(ElementValue::Int(pool.add_integer(value)?))
    }

    pub fn boolean(pool: &mut ConstantPool, value: bool) -> std::result::Result<ElementValue, Error> {
        Ok(ElementValue::Boolean(pool.add_integer(value as i32)?))
    }

    pub fn long(pool: &mut ConstantPool, value: i64) -> std::result::Result<ElementValue, Error> {
        Ok(ElementValue::Long(pool.add_long(value)?))
    }

    pub fn string(pool: &mut ConstantPool, value: &str) -> std::result::Result<ElementValue, Error> {
        Ok(ElementValue::String(pool.add_utf8(value)?))
    }

    pub fn class(
        pool: &mut ConstantPool,
        descriptor: &str,
    ) -> std::result::Result<ElementValue, Error> {
        Ok(ElementValue::Class(pool.add_utf8(descriptor)?))
    }

    pub fn enumeration(
        pool: &mut ConstantPool,
        type_descriptor: &str,
        constant: &str,
    ) -> std::result::Result<ElementValue, Error> {
        Ok(ElementValue::Enum {
            type_name: pool.add_utf8(type_descriptor)?,
            const_name: pool.add_utf8(constant)?,
        })
    }

    /// Tag byte identifying the kind of value
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Byte(_) => b'B',
            ElementValue::Char(_) => b'C',
            ElementValue::Double(_) => b'D',
            ElementValue::Float(_) => b'F',
            ElementValue::Int(_) => b'I',
            ElementValue::Long(_) => b'J',
            ElementValue::Short(_) => b'S',
            ElementValue::Boolean(_) => b'Z',
            ElementValue::String(_) => b's',
            ElementValue::Enum { .. } => b'e',
            ElementValue::Class(_) => b'c',
            ElementValue::Annotation(_) => b'@',
            ElementValue::Array(_) => b'[',
        }
    }

    fn copy_into(
        &self,
        from: &ConstantPool,
        to: &mut ConstantPool,
    ) -> std::result::Result<ElementValue, Error> {
        let copy_utf8 = |to: &mut ConstantPool, index: Utf8ConstantIndex| {
            from.get_utf8(index).and_then(|utf8| to.add_utf8(utf8))
        };
        let copy_constant = |to: &mut ConstantPool, index: ConstantIndex| {
            from.get(index).and_then(|constant| to.add_constant(constant.clone()))
        };
        Ok(match self {
            ElementValue::Byte(idx) => ElementValue::Byte(copy_constant(to, *idx)?),
            ElementValue::Char(idx) => ElementValue::Char(copy_constant(to, *idx)?),
            ElementValue::Double(idx) => ElementValue::Double(copy_constant(to, *idx)?),
            ElementValue::Float(idx) => ElementValue::Float(copy_constant(to, *idx)?),
            ElementValue::Int(idx) => ElementValue::Int(copy_constant(to, *idx)?),
            ElementValue::Long(idx) => ElementValue::Long(copy_constant(to, *idx)?),
            ElementValue::Short(idx) => ElementValue::Short(copy_constant(to, *idx)?),
            ElementValue::Boolean(idx) => ElementValue::Boolean(copy_constant(to, *idx)?),
            ElementValue::String(idx) => ElementValue::String(copy_utf8(to, *idx)?),
            ElementValue::Enum {
                type_name,
                const_name,
            } => ElementValue::Enum {
                type_name: copy_utf8(to, *type_name)?,
                const_name: copy_utf8(to, *const_name)?,
            },
            ElementValue::Class(idx) => ElementValue::Class(copy_utf8(to, *idx)?),
            ElementValue::Annotation(annotation) => {
                ElementValue::Annotation(annotation.copy_into(from, to)?)
            }
            ElementValue::Array(values) => ElementValue::Array(
                values
                    .iter()
                    .map(|value| value.copy_into(from, to))
                    .collect::<std::result::Result<Vec<_>, Error>>()?,
            ),
        })
    }

    fn render(&self, pool: &ConstantPool, out: &mut String) {
        match self {
            ElementValue::Byte(idx)
            | ElementValue::Char(idx)
            | ElementValue::Double(idx)
            | ElementValue::Float(idx)
            | ElementValue::Int(idx)
            | ElementValue::Long(idx)
            | ElementValue::Short(idx) => out.push_str(&pool.display_constant(*idx)),
            ElementValue::Boolean(idx) => match pool.get(*idx) {
                Ok(Constant::Integer(0)) => out.push_str("false"),
                Ok(Constant::Integer(_)) => out.push_str("true"),
                _ => out.push_str(&pool.display_constant(*idx)),
            },
            ElementValue::String(idx) => match pool.get_utf8(*idx) {
                Ok(string) => {
                    let _ = write!(out, "{:?}", string);
                }
                Err(_) => out.push_str(&pool.display_constant(idx.index())),
            },
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                out.push_str(&pool.display_constant(type_name.index()));
                out.push('.');
                out.push_str(&pool.display_constant(const_name.index()));
            }
            ElementValue::Class(idx) => {
                out.push_str(&pool.display_constant(idx.index()));
                out.push_str(".class");
            }
            ElementValue::Annotation(annotation) => annotation.render(pool, out),
            ElementValue::Array(values) => {
                out.push('{');
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    value.render(pool, out);
                }
                out.push('}');
            }
        }
    }
}

impl Serialize for Annotation {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.type_index.serialize(writer)?;
        self.element_value_pairs.serialize(writer)
    }
}

impl Deserialize for Annotation {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let type_index = Utf8ConstantIndex::deserialize(reader)?;
        let element_value_pairs = Vec::<ElementValuePair>::deserialize(reader)?;
        Ok(Annotation {
            type_index,
            element_value_pairs,
        })
    }
}

impl Serialize for ElementValuePair {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.name_index.serialize(writer)?;
        self.value.serialize(writer)
    }
}

impl Deserialize for ElementValuePair {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let name_index = Utf8ConstantIndex::deserialize(reader)?;
        let value = ElementValue::deserialize(reader)?;
        Ok(ElementValuePair { name_index, value })
    }
}

impl Serialize for ElementValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.tag().serialize(writer)?;
        match self {
            ElementValue::Byte(idx)
            | ElementValue::Char(idx)
            | ElementValue::Double(idx)
            | ElementValue::Float(idx)
            | ElementValue::Int(idx)
            | ElementValue::Long(idx)
            | ElementValue::Short(idx)
            | ElementValue::Boolean(idx) => idx.serialize(writer),
            ElementValue::String(idx) | ElementValue::Class(idx) => idx.serialize(writer),
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                type_name.serialize(writer)?;
                const_name.serialize(writer)
            }
            ElementValue::Annotation(annotation) => annotation.serialize(writer),
            ElementValue::Array(values) => values.serialize(writer),
        }
    }
}

impl Deserialize for ElementValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let tag = u8::deserialize(reader)?;
        let value = match tag {
            b'B' => ElementValue::Byte(ConstantIndex::deserialize(reader)?),
            b'C' => ElementValue::Char(ConstantIndex::deserialize(reader)?),
            b'D' => ElementValue::Double(ConstantIndex::deserialize(reader)?),
            b'F' => ElementValue::Float(ConstantIndex::deserialize(reader)?),
            b'I' => ElementValue::Int(ConstantIndex::deserialize(reader)?),
            b'J' => ElementValue::Long(ConstantIndex::deserialize(reader)?),
            b'S' => ElementValue::Short(ConstantIndex::deserialize(reader)?),
            b'Z' => ElementValue::Boolean(ConstantIndex::deserialize(reader)?),
            b's' => ElementValue::String(Utf8ConstantIndex::deserialize(reader)?),
            b'e' => {
                let type_name = Utf8ConstantIndex::deserialize(reader)?;
                let const_name = Utf8ConstantIndex::deserialize(reader)?;
                ElementValue::Enum {
                    type_name,
                    const_name,
                }
            }
            b'c' => ElementValue::Class(Utf8ConstantIndex::deserialize(reader)?),
            b'@' => ElementValue::Annotation(Annotation::deserialize(reader)?),
            b'[' => ElementValue::Array(Vec::<ElementValue>::deserialize(reader)?),
            other => {
                return Err(invalid_data(format!(
                    "unknown element value tag {:?}",
                    other as char
                )))
            }
        };
        Ok(value)
    }
}

macro_rules! annotations_attribute {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub Vec<Annotation>);

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                Vec::<Annotation>::deserialize(reader).map($name)
            }
        }

        impl AttributeLike for $name {
            const NAME: &'static str = stringify!($name);
        }
    };
}

macro_rules! parameter_annotations_attribute {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub Vec<Vec<Annotation>>);

        /// Unlike most sequences in class files, the number of parameters is a single byte
        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                let parameters = u8::try_from(self.0.len()).map_err(|_| {
                    invalid_data(format!("{} parameters is too many to annotate", self.0.len()))
                })?;
                parameters.serialize(writer)?;
                for annotations in &self.0 {
                    annotations.serialize(writer)?;
                }
                Ok(())
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                let parameters = u8::deserialize(reader)?;
                let mut annotations = Vec::with_capacity(parameters as usize);
                for _ in 0..parameters {
                    annotations.push(Vec::<Annotation>::deserialize(reader)?);
                }
                Ok($name(annotations))
            }
        }

        impl AttributeLike for $name {
            const NAME: &'static str = stringify!($name);
        }
    };
}

annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16
    RuntimeVisibleAnnotations
);
annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.17
    RuntimeInvisibleAnnotations
);
parameter_annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.18
    RuntimeVisibleParameterAnnotations
);
parameter_annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.19
    RuntimeInvisibleParameterAnnotations
);

/// Is this the name of one of the four annotation attributes?
pub fn is_annotation_attribute(name: &str) -> bool {
    name == RuntimeVisibleAnnotations::NAME
        || name == RuntimeInvisibleAnnotations::NAME
        || name == RuntimeVisibleParameterAnnotations::NAME
        || name == RuntimeInvisibleParameterAnnotations::NAME
}

/// Turn annotation entries into (at most two) annotation attributes
///
/// Visible entries end up in a `RuntimeVisibleAnnotations` attribute and invisible ones in a
/// `RuntimeInvisibleAnnotations` attribute. An attribute that would hold no annotations is not
/// emitted, and its name is not added to the pool.
pub fn encode_annotations(
    pool: &mut ConstantPool,
    entries: &[AnnotationEntry],
) -> std::result::Result<Vec<Attribute>, Error> {
    let mut visible: Vec<u8> = vec![];
    let mut invisible: Vec<u8> = vec![];
    let (visible_entries, invisible_entries): (Vec<_>, Vec<_>) =
        entries.iter().partition(|entry| entry.visible);

    for (entries, buffer) in [
        (&visible_entries, &mut visible),
        (&invisible_entries, &mut invisible),
    ] {
        let count = u16::try_from(entries.len())
            .map_err(|_| invalid_data(format!("{} annotations is too many", entries.len())))?;
        count.serialize(buffer)?;
        for entry in entries.iter() {
            entry.annotation.serialize(buffer)?;
        }
    }

    // Anything beyond the count means there is at least one annotation
    let mut attributes = vec![];
    if visible.len() > 2 {
        let name_index = pool.add_utf8(RuntimeVisibleAnnotations::NAME)?;
        attributes.push(Attribute {
            name_index,
            info: visible,
        });
    }
    if invisible.len() > 2 {
        let name_index = pool.add_utf8(RuntimeInvisibleAnnotations::NAME)?;
        attributes.push(Attribute {
            name_index,
            info: invisible,
        });
    }
    Ok(attributes)
}

/// Turn per-parameter annotation entries into (at most two) parameter annotation attributes
///
/// Every parameter gets a slot in each emitted attribute, even parameters with no annotations of
/// that visibility. An attribute is only emitted if some parameter has an annotation of its
/// visibility.
pub fn encode_parameter_annotations(
    pool: &mut ConstantPool,
    parameters: &[Vec<AnnotationEntry>],
) -> std::result::Result<Vec<Attribute>, Error> {
    let split = |visible: bool| -> Vec<Vec<Annotation>> {
        parameters
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.visible == visible)
                    .map(|entry| entry.annotation.clone())
                    .collect()
            })
            .collect()
    };
    let visible = split(true);
    let invisible = split(false);
    let total = |annotations: &[Vec<Annotation>]| annotations.iter().map(Vec::len).sum::<usize>();

    let mut attributes = vec![];
    if total(&visible) > 0 {
        attributes.push(pool.get_attribute(RuntimeVisibleParameterAnnotations(visible))?);
    }
    if total(&invisible) > 0 {
        attributes.push(pool.get_attribute(RuntimeInvisibleParameterAnnotations(invisible))?);
    }
    Ok(attributes)
}

/// Read back the entries of the annotation attributes in a list of attributes
pub fn decode_annotations(
    pool: &ConstantPool,
    attributes: &[Attribute],
) -> std::result::Result<Vec<AnnotationEntry>, Error> {
    let mut entries = vec![];
    for attribute in attributes {
        if let Some(RuntimeVisibleAnnotations(annotations)) = pool.parse_attribute(attribute)? {
            entries.extend(annotations.into_iter().map(|annotation| AnnotationEntry {
                annotation,
                visible: true,
            }));
        } else if let Some(RuntimeInvisibleAnnotations(annotations)) =
            pool.parse_attribute(attribute)?
        {
            entries.extend(annotations.into_iter().map(|annotation| AnnotationEntry {
                annotation,
                visible: false,
            }));
        }
    }
    for entry in &entries {
        entry.annotation.check(pool)?;
    }
    Ok(entries)
}

/// Read back per-parameter entries of the parameter annotation attributes
pub fn decode_parameter_annotations(
    pool: &ConstantPool,
    attributes: &[Attribute],
) -> std::result::Result<Vec<Vec<AnnotationEntry>>, Error> {
    let mut parameters: Vec<Vec<AnnotationEntry>> = vec![];
    let mut merge = |annotations: Vec<Vec<Annotation>>, visible: bool| {
        if parameters.len() < annotations.len() {
            parameters.resize(annotations.len(), vec![]);
        }
        for (slot, annotations) in parameters.iter_mut().zip(annotations) {
            slot.extend(
                annotations
                    .into_iter()
                    .map(|annotation| AnnotationEntry { annotation, visible }),
            );
        }
    };
    for attribute in attributes {
        if let Some(RuntimeVisibleParameterAnnotations(annotations)) =
            pool.parse_attribute(attribute)?
        {
            merge(annotations, true);
        } else if let Some(RuntimeInvisibleParameterAnnotations(annotations)) =
            pool.parse_attribute(attribute)?
        {
            merge(annotations, false);
        }
    }
    for entry in parameters.iter().flatten() {
        entry.annotation.check(pool)?;
    }
    Ok(parameters)
}

impl Annotation {
    /// Check that every index points to the right kind of constant
    fn check(&self, pool: &ConstantPool) -> std::result::Result<(), Error> {
        pool.get_utf8(self.type_index)?;
        for pair in &self.element_value_pairs {
            pool.get_utf8(pair.name_index)?;
            pair.value.check(pool)?;
        }
        Ok(())
    }
}

impl ElementValue {
    fn check(&self, pool: &ConstantPool) -> std::result::Result<(), Error> {
        let expect = |index: ConstantIndex, expected: &'static str| {
            let matches = match (pool.get(index)?, expected) {
                (Constant::Integer(_), "Integer")
                | (Constant::Long(_), "Long")
                | (Constant::Float(_), "Float")
                | (Constant::Double(_), "Double") => true,
                _ => false,
            };
            if matches {
                Ok(())
            } else {
                Err(Error::UnexpectedConstant {
                    index: index.0,
                    expected,
                })
            }
        };
        match self {
            ElementValue::Byte(idx)
            | ElementValue::Char(idx)
            | ElementValue::Int(idx)
            | ElementValue::Short(idx)
            | ElementValue::Boolean(idx) => expect(*idx, "Integer"),
            ElementValue::Long(idx) => expect(*idx, "Long"),
            ElementValue::Float(idx) => expect(*idx, "Float"),
            ElementValue::Double(idx) => expect(*idx, "Double"),
            ElementValue::String(idx) | ElementValue::Class(idx) => pool.get_utf8(*idx).map(|_| ()),
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                pool.get_utf8(*type_name)?;
                pool.get_utf8(*const_name).map(|_| ())
            }
            ElementValue::Annotation(annotation) => annotation.check(pool),
            ElementValue::Array(values) => values.iter().try_for_each(|value| value.check(pool)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_entries_no_attributes() {
        let mut pool = ConstantPool::new();
        assert_eq!(encode_annotations(&mut pool, &[]).unwrap(), vec![]);
        assert_eq!(
            encode_parameter_annotations(&mut pool, &[vec![], vec![]]).unwrap(),
            vec![]
        );
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn one_visible_one_invisible() {
        let mut pool = ConstantPool::new();
        let visible = AnnotationEntry::new(&mut pool, "Ljava/lang/Deprecated;", true).unwrap();
        let invisible = AnnotationEntry::new(&mut pool, "Lcom/example/Internal;", false).unwrap();
        let before = pool.size();

        let attributes = encode_annotations(&mut pool, &[invisible, visible]).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(pool.size(), before + 2);
        assert_ne!(attributes[0].name_index, attributes[1].name_index);
        assert_eq!(
            pool.attribute_name(&attributes[0]).unwrap(),
            "RuntimeVisibleAnnotations"
        );
        assert_eq!(
            pool.attribute_name(&attributes[1]).unwrap(),
            "RuntimeInvisibleAnnotations"
        );
        for attribute in &attributes {
            assert_eq!(&attribute.info[..2], &[0, 1]);
        }
    }

    #[test]
    fn only_invisible_skips_visible_name() {
        let mut pool = ConstantPool::new();
        let invisible = AnnotationEntry::new(&mut pool, "Lcom/example/Internal;", false).unwrap();
        let attributes = encode_annotations(&mut pool, &[invisible]).unwrap();
        assert_eq!(attributes.len(), 1);
        assert!(pool.lookup_utf8("RuntimeVisibleAnnotations").is_none());
    }

    #[test]
    fn parameter_slots_are_dense() {
        let mut pool = ConstantPool::new();
        let entry = AnnotationEntry::new(&mut pool, "Ljavax/annotation/Nonnull;", true).unwrap();
        let attributes =
            encode_parameter_annotations(&mut pool, &[vec![], vec![entry.clone()], vec![]])
                .unwrap();
        assert_eq!(attributes.len(), 1);

        let info = &attributes[0].info;
        assert_eq!(info[0], 3);
        assert_eq!(&info[1..3], &[0, 0]);
        assert_eq!(&info[3..5], &[0, 1]);
        assert_eq!(&info[info.len() - 2..], &[0, 0]);

        let decoded = decode_parameter_annotations(&pool, &attributes).unwrap();
        assert_eq!(decoded, vec![vec![], vec![entry], vec![]]);
    }

    #[test]
    fn nested_values_survive_decoding() {
        let mut pool = ConstantPool::new();
        let mut entry = AnnotationEntry::new(&mut pool, "Lcom/example/Config;", true).unwrap();
        let answer = ElementValue::int(&mut pool, 42).unwrap();
        let names = ElementValue::Array(vec![
            ElementValue::string(&mut pool, "a").unwrap(),
            ElementValue::string(&mut pool, "b").unwrap(),
        ]);
        let mode = ElementValue::enumeration(&mut pool, "Lcom/example/Mode;", "FAST").unwrap();
        entry.add_element(&mut pool, "answer", answer).unwrap();
        entry.add_element(&mut pool, "names", names).unwrap();
        entry.add_element(&mut pool, "mode", mode).unwrap();

        let attributes = encode_annotations(&mut pool, &[entry.clone()]).unwrap();
        let decoded = decode_annotations(&pool, &attributes).unwrap();
        assert_eq!(decoded, vec![entry.clone()]);
        assert_eq!(
            entry.display(&pool),
            "@Lcom/example/Config;(answer=42,names={\"a\",\"b\"},mode=Lcom/example/Mode;.FAST)"
        );

        let mut other = ConstantPool::new();
        let copied = entry.copy_into(&pool, &mut other).unwrap();
        assert_eq!(copied.display(&other), entry.display(&pool));
    }
}
