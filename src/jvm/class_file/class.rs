use crate::jvm::class_file::{
    invalid_data, Attribute, ClassConstantIndex, Constant, Deserialize, Field, Method, Serialize,
    Version,
};
use crate::jvm::{ClassAccessFlags, Error};
use crate::util::{Offset, OffsetVec};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Representation of the [`class` file format of the JVM][0]
///
/// This is the immutable image: indices inside it are raw and only get checked when the class is
/// wrapped in a `ClassBuilder`.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: Option<ClassConstantIndex>,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a class file from its bytes
    pub fn from_bytes(mut bytes: &[u8]) -> Result<ClassFile, Error> {
        let class_file = ClassFile::deserialize(&mut bytes).map_err(|err| match err.kind() {
            ErrorKind::InvalidData => Error::MalformedClass(err.to_string()),
            ErrorKind::UnexpectedEof => Error::MalformedClass(String::from("truncated class file")),
            _ => Error::IoError(err),
        })?;
        if !bytes.is_empty() {
            let msg = format!("{} trailing bytes after class file", bytes.len());
            return Err(Error::MalformedClass(msg));
        }
        Ok(class_file)
    }

    /// Serialize the class file into a fresh buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Name of the class in internal form, read straight out of the raw constants
    pub fn class_name(&self) -> Result<&str, Error> {
        let this_class = self.this_class.index().0;
        let name_index = match self.constants.get_offset(Offset(this_class as usize)).ok() {
            Some(Constant::Class(name)) => name.index().0,
            _ => {
                return Err(Error::UnexpectedConstant {
                    index: this_class,
                    expected: "Class",
                })
            }
        };
        match self.constants.get_offset(Offset(name_index as usize)).ok() {
            Some(Constant::Utf8(name)) => Ok(name),
            _ => Err(Error::UnexpectedConstant {
                index: name_index,
                expected: "Utf8",
            }),
        }
    }

    /// Save the class file to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> std::io::Result<()> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut class_file = fs::File::create(path)?;
        self.serialize(&mut class_file)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;

        // Pool count is the offset of the next constant, counting phantom slots
        let count = u16::try_from(self.constants.offset_len().0)
            .map_err(|_| invalid_data("constant pool has more than 65535 slots"))?;
        count.serialize(writer)?;
        for (_, _, constant) in &self.constants {
            constant.serialize(writer)?;
        }

        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        match self.super_class {
            Some(super_class) => super_class.serialize(writer)?,
            None => 0u16.serialize(writer)?,
        }
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != ClassFile::MAGIC {
            return Err(invalid_data(format!("bad magic number {:02x?}", magic)));
        }
        let version = Version::deserialize(reader)?;

        let count = u16::deserialize(reader)?;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count as usize {
            constants.push(Constant::deserialize(reader)?);
        }
        if constants.offset_len().0 > count as usize {
            return Err(invalid_data("wide constant overruns the constant pool"));
        }

        let access_flags = ClassAccessFlags::deserialize(reader)?;
        let this_class = ClassConstantIndex::deserialize(reader)?;
        let super_class = ClassConstantIndex::deserialize(reader)?;
        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class: if super_class.index().0 == 0 {
                None
            } else {
                Some(super_class)
            },
            interfaces: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}
