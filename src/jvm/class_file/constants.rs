use crate::jvm::class_file::{invalid_data, read_bytes, Deserialize, Serialize};
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Result;

/// Constants as in the constant pool
///
/// Equality and hashing treat floating point constants by their bit pattern, so that `NaN`
/// constants deduplicate and `0.0` stays distinct from `-0.0`.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module
    Package(Utf8ConstantIndex),
}

impl Constant {
    /// Name of the kind of constant, as it appears in the JVM specification
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Class(_) => "Class",
            Constant::FieldRef(_, _) => "Fieldref",
            Constant::MethodRef {
                is_interface: false,
                ..
            } => "Methodref",
            Constant::MethodRef { .. } => "InterfaceMethodref",
            Constant::String(_) => "String",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::Utf8(_) => "Utf8",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module(_) => "Module",
            Constant::Package(_) => "Package",
        }
    }

    /// Constant pool indices referenced by this constant, along with the kind they must have
    pub fn references(&self) -> Vec<(ConstantIndex, &'static str)> {
        match self {
            Constant::Class(name)
            | Constant::String(name)
            | Constant::Module(name)
            | Constant::Package(name)
            | Constant::MethodType { descriptor: name } => vec![(name.0, "Utf8")],
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => vec![(class.0, "Class"), (name_and_type.0, "NameAndType")],
            Constant::NameAndType { name, descriptor } => {
                vec![(name.0, "Utf8"), (descriptor.0, "Utf8")]
            }
            Constant::MethodHandle { member, .. } => vec![(*member, "member reference")],
            Constant::Dynamic { name_and_type, .. }
            | Constant::InvokeDynamic {
                method_descriptor: name_and_type,
                ..
            } => vec![(name_and_type.0, "NameAndType")],
            Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_)
            | Constant::Utf8(_) => vec![],
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        use Constant::*;
        match (self, other) {
            (Class(a), Class(b)) => a == b,
            (FieldRef(c1, nt1), FieldRef(c2, nt2)) => c1 == c2 && nt1 == nt2,
            (
                MethodRef {
                    class: c1,
                    name_and_type: nt1,
                    is_interface: i1,
                },
                MethodRef {
                    class: c2,
                    name_and_type: nt2,
                    is_interface: i2,
                },
            ) => c1 == c2 && nt1 == nt2 && i1 == i2,
            (String(a), String(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Long(a), Long(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (
                NameAndType {
                    name: n1,
                    descriptor: d1,
                },
                NameAndType {
                    name: n2,
                    descriptor: d2,
                },
            ) => n1 == n2 && d1 == d2,
            (Utf8(a), Utf8(b)) => a == b,
            (
                MethodHandle {
                    handle_kind: k1,
                    member: m1,
                },
                MethodHandle {
                    handle_kind: k2,
                    member: m2,
                },
            ) => k1 == k2 && m1 == m2,
            (MethodType { descriptor: d1 }, MethodType { descriptor: d2 }) => d1 == d2,
            (
                Dynamic {
                    bootstrap_method: b1,
                    name_and_type: nt1,
                },
                Dynamic {
                    bootstrap_method: b2,
                    name_and_type: nt2,
                },
            ) => b1 == b2 && nt1 == nt2,
            (
                InvokeDynamic {
                    bootstrap_method: b1,
                    method_descriptor: nt1,
                },
                InvokeDynamic {
                    bootstrap_method: b2,
                    method_descriptor: nt2,
                },
            ) => b1 == b2 && nt1 == nt2,
            (Module(a), Module(b)) => a == b,
            (Package(a), Package(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Class(name)
            | Constant::String(name)
            | Constant::Module(name)
            | Constant::Package(name)
            | Constant::MethodType { descriptor: name } => name.hash(state),
            Constant::FieldRef(class, name_and_type) => {
                class.hash(state);
                name_and_type.hash(state);
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                class.hash(state);
                name_and_type.hash(state);
                is_interface.hash(state);
            }
            Constant::Integer(integer) => integer.hash(state),
            Constant::Float(float) => float.to_bits().hash(state),
            Constant::Long(long) => long.hash(state),
            Constant::Double(double) => double.to_bits().hash(state),
            Constant::NameAndType { name, descriptor } => {
                name.hash(state);
                descriptor.hash(state);
            }
            Constant::Utf8(string) => string.hash(state),
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                handle_kind.hash(state);
                member.hash(state);
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor: name_and_type,
            } => {
                bootstrap_method.hash(state);
                name_and_type.hash(state);
            }
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                let len = u16::try_from(buffer.len())
                    .map_err(|_| invalid_data("UTF-8 constant is longer than 65535 bytes"))?;
                len.serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let tag = u8::deserialize(reader)?;
        let constant = match tag {
            1 => {
                let len = u16::deserialize(reader)?;
                let bytes = read_bytes(reader, len as usize)?;
                Constant::Utf8(decode_modified_utf8(&bytes)?)
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            10 | 11 => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: HandleKind::deserialize(reader)?,
                member: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                method_descriptor: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            other => return Err(invalid_data(format!("unknown constant tag {}", other))),
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        let code = c as u32;
        if code != 0 && code < 0x80 {
            buffer.push(code as u8);
        } else if code < 0x800 {
            buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
            buffer.push((code & 0x3F) as u8 | 0b1000_0000);
        } else if code < 0x10000 {
            push_three_byte_unit(&mut buffer, code);
        } else {
            // Supplementary characters go through their UTF-16 surrogate pair
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                push_three_byte_unit(&mut buffer, *unit as u32);
            }
        }
    }
    buffer
}

fn push_three_byte_unit(buffer: &mut Vec<u8>, unit: u32) {
    buffer.push((unit >> 12 & 0x0F) as u8 | 0b1110_0000);
    buffer.push((unit >> 6 & 0x3F) as u8 | 0b1000_0000);
    buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
}

/// Inverse of `encode_modified_utf8`
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    let continuation = |byte: Option<u8>| -> Result<u16> {
        match byte {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Ok((b & 0x3F) as u16),
            _ => Err(invalid_data("truncated modified UTF-8 sequence")),
        }
    };
    while let Some(byte) = iter.next() {
        let unit = if byte & 0x80 == 0 && byte != 0 {
            byte as u16
        } else if byte & 0b1110_0000 == 0b1100_0000 {
            ((byte & 0x1F) as u16) << 6 | continuation(iter.next())?
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            let high = continuation(iter.next())?;
            let low = continuation(iter.next())?;
            ((byte & 0x0F) as u16) << 12 | high << 6 | low
        } else {
            return Err(invalid_data(format!("invalid modified UTF-8 byte {:#04x}", byte)));
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| invalid_data("unpaired surrogate in UTF-8 constant"))
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Index into the constant pool (starting at 1)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ConstantIndex(pub u16);

impl fmt::Display for ConstantIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        u16::deserialize(reader).map(ConstantIndex)
    }
}

/// Indices that are known to point at a particular kind of constant
///
/// These can only be obtained from the constant pool (which checks the kind), or from a parsed
/// class file (whose references get checked when it is wrapped).
macro_rules! typed_constant_index {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
        pub struct $name(pub(crate) ConstantIndex);

        impl $name {
            pub fn index(self) -> ConstantIndex {
                self.0
            }
        }

        impl From<$name> for ConstantIndex {
            fn from(typed: $name) -> ConstantIndex {
                typed.0
            }
        }

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                ConstantIndex::deserialize(reader).map($name)
            }
        }
    };
}

typed_constant_index!(Utf8ConstantIndex);
typed_constant_index!(StringConstantIndex);
typed_constant_index!(NameAndTypeConstantIndex);
typed_constant_index!(ClassConstantIndex);
typed_constant_index!(FieldRefConstantIndex);
typed_constant_index!(
    /// Index of a `Methodref` or `InterfaceMethodref`
    MethodRefConstantIndex
);
typed_constant_index!(InvokeDynamicConstantIndex);

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

impl Deserialize for HandleKind {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(match u8::deserialize(reader)? {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            other => return Err(invalid_data(format!("unknown method handle kind {}", other))),
        })
    }
}

#[cfg(test)]
mod modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");
    }

    #[test]
    fn two_and_three_byte_encodings() {
        assert_eq!(encode_modified_utf8("Ą"), vec![196, 132]);
        assert_eq!(encode_modified_utf8("ऄ"), vec![224, 164, 132]);
        assert_eq!(decode_modified_utf8(&[196, 132, 224, 164, 132]).unwrap(), "Ąऄ");
    }

    #[test]
    fn supplementary_characters() {
        let encoded = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"), encoded);
        assert_eq!(
            decode_modified_utf8(&encoded).unwrap(),
            "\u{10000}\u{dffff}\u{10FFFF}"
        );
    }

    #[test]
    fn rejects_raw_null_and_truncation() {
        assert!(decode_modified_utf8(&[0]).is_err());
        assert!(decode_modified_utf8(&[224, 164]).is_err());
    }

    #[test]
    fn float_constants_compare_by_bits() {
        assert_eq!(Constant::Float(f32::NAN), Constant::Float(f32::NAN));
        assert_ne!(Constant::Double(0.0), Constant::Double(-0.0));
        assert_ne!(Constant::Integer(1), Constant::Float(1.0));
    }
}
