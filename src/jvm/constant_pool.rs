//! Deduplicating constant pool
//!
//! The pool is append only. Every `add_*` method first looks the value up and only pushes a new
//! entry when there is no equal constant already in the pool. Indices start at 1 and `long` and
//! `double` constants take two slots, the second of which is never a valid index.

use crate::jvm::class_file::*;
use crate::jvm::Error;
use crate::util::{Offset, OffsetResult, OffsetVec, Width};
use std::collections::HashMap;
use std::fmt::Write;

/// What lives at a given index of the constant pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    /// Index 0, or past the end of the pool
    Unused,

    /// Regular entry
    Entry(&'a Constant),

    /// Second slot of a `long` or `double` constant
    Phantom,
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    constants: OffsetVec<Constant>,
    lookup: HashMap<Constant, ConstantIndex>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool::new()
    }
}

impl ConstantPool {
    /// Largest value the pool count (the index after the last slot) can take
    pub const MAX_SIZE: usize = u16::MAX as usize;

    /// Make a fresh empty constants pool
    pub fn new() -> ConstantPool {
        ConstantPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            lookup: HashMap::new(),
        }
    }

    /// Wrap the constants of a parsed class file
    ///
    /// All references between constants are checked here, so that a dangling index is reported
    /// when the class is wrapped rather than when it is next serialized. If the parsed pool holds
    /// duplicate entries, lookups resolve to the first one.
    pub fn from_constants(constants: OffsetVec<Constant>) -> Result<ConstantPool, Error> {
        if constants.offset_len().0 > ConstantPool::MAX_SIZE {
            return Err(Error::MalformedClass(String::from(
                "constant pool has more than 65535 slots",
            )));
        }
        let mut lookup = HashMap::new();
        for (offset, _, constant) in &constants {
            lookup
                .entry(constant.clone())
                .or_insert(ConstantIndex(offset.0 as u16));
        }
        let pool = ConstantPool { constants, lookup };

        for (_, _, constant) in &pool.constants {
            for (index, expected) in constant.references() {
                let referenced = pool.get(index)?;
                let matches = match (expected, referenced) {
                    ("Utf8", Constant::Utf8(_)) => true,
                    ("Class", Constant::Class(_)) => true,
                    ("NameAndType", Constant::NameAndType { .. }) => true,
                    ("member reference", Constant::FieldRef(..) | Constant::MethodRef { .. }) => {
                        true
                    }
                    _ => false,
                };
                if !matches {
                    return Err(Error::UnexpectedConstant {
                        index: index.0,
                        expected,
                    });
                }
            }
        }
        Ok(pool)
    }

    /// Index at which the next constant will land (this is also the `constant_pool_count` that
    /// gets serialized)
    pub fn size(&self) -> usize {
        self.constants.offset_len().0
    }

    /// Number of constants in the pool (wide constants count once)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Iterate over the constants along with their indices
    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> + '_ {
        self.constants
            .iter()
            .map(|(offset, _, constant)| (ConstantIndex(offset.0 as u16), constant))
    }

    /// Constants in the form the class file stores them
    pub fn to_offset_vec(&self) -> OffsetVec<Constant> {
        self.constants.clone()
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the pool count is a `u16`, indexing starts at 1, and some constants take two
    /// spaces. The check happens before anything is pushed, so a failed push leaves the pool as
    /// it was.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > ConstantPool::MAX_SIZE {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }

        let index = ConstantIndex(offset as u16);
        self.lookup.insert(constant.clone(), index);
        self.constants.push(constant);
        Ok(index)
    }

    /// Get or insert an arbitrary constant
    ///
    /// References inside the constant must already be valid indices in this pool.
    pub fn add_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        if let Some(index) = self.lookup.get(&constant) {
            return Ok(*index);
        }
        for (index, _) in constant.references() {
            self.get(index)?;
        }
        self.push_constant(constant)
    }

    /// Get or insert a utf8 constant
    pub fn add_utf8(&mut self, utf8: &str) -> Result<Utf8ConstantIndex, Error> {
        self.add_constant(Constant::Utf8(String::from(utf8)))
            .map(Utf8ConstantIndex)
    }

    /// Get or insert a string constant (and the utf8 constant it points to)
    pub fn add_string(&mut self, string: &str) -> Result<StringConstantIndex, Error> {
        let utf8 = self.add_utf8(string)?;
        self.add_constant(Constant::String(utf8))
            .map(StringConstantIndex)
    }

    pub fn add_integer(&mut self, integer: i32) -> Result<ConstantIndex, Error> {
        self.add_constant(Constant::Integer(integer))
    }

    pub fn add_float(&mut self, float: f32) -> Result<ConstantIndex, Error> {
        self.add_constant(Constant::Float(float))
    }

    /// Get or insert a long constant (this takes two slots when inserted)
    pub fn add_long(&mut self, long: i64) -> Result<ConstantIndex, Error> {
        self.add_constant(Constant::Long(long))
    }

    /// Get or insert a double constant (this takes two slots when inserted)
    pub fn add_double(&mut self, double: f64) -> Result<ConstantIndex, Error> {
        self.add_constant(Constant::Double(double))
    }

    /// Get or insert a class constant
    ///
    /// The name is in internal form (eg. `java/lang/Object`, or `[I` for array classes).
    pub fn add_class(&mut self, class_name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.add_utf8(class_name)?;
        self.add_constant(Constant::Class(name))
            .map(ClassConstantIndex)
    }

    pub fn add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.add_constant(Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)
    }

    pub fn add_field_ref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<FieldRefConstantIndex, Error> {
        let class = self.add_class(class_name)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.add_constant(Constant::FieldRef(class, name_and_type))
            .map(FieldRefConstantIndex)
    }

    pub fn add_method_ref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<MethodRefConstantIndex, Error> {
        self.add_any_method_ref(class_name, name, descriptor, false)
    }

    pub fn add_interface_method_ref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<MethodRefConstantIndex, Error> {
        self.add_any_method_ref(class_name, name, descriptor, true)
    }

    fn add_any_method_ref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let class = self.add_class(class_name)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        let constant = Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        };
        self.add_constant(constant).map(MethodRefConstantIndex)
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> Result<ConstantIndex, Error> {
        let descriptor = self.add_utf8(descriptor)?;
        self.add_constant(Constant::MethodType { descriptor })
    }

    /// Get or insert a method handle constant
    ///
    /// Field handle kinds need a field reference, the rest need a method reference.
    pub fn add_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, Error> {
        let is_field_kind = matches!(
            handle_kind,
            HandleKind::GetField | HandleKind::GetStatic | HandleKind::PutField | HandleKind::PutStatic
        );
        match (is_field_kind, self.get(member)?) {
            (true, Constant::FieldRef(..)) | (false, Constant::MethodRef { .. }) => (),
            _ => {
                return Err(Error::UnexpectedConstant {
                    index: member.0,
                    expected: if is_field_kind { "Fieldref" } else { "Methodref" },
                })
            }
        }
        self.add_constant(Constant::MethodHandle {
            handle_kind,
            member,
        })
    }

    pub fn add_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<InvokeDynamicConstantIndex, Error> {
        let method_descriptor = self.add_name_and_type(name, descriptor)?;
        let constant = Constant::InvokeDynamic {
            bootstrap_method,
            method_descriptor,
        };
        self.add_constant(constant).map(InvokeDynamicConstantIndex)
    }

    /// Find the index of a constant, without inserting anything
    pub fn lookup(&self, constant: &Constant) -> Option<ConstantIndex> {
        self.lookup.get(constant).copied()
    }

    pub fn lookup_utf8(&self, utf8: &str) -> Option<Utf8ConstantIndex> {
        self.lookup(&Constant::Utf8(String::from(utf8)))
            .map(Utf8ConstantIndex)
    }

    pub fn lookup_string(&self, string: &str) -> Option<StringConstantIndex> {
        let utf8 = self.lookup_utf8(string)?;
        self.lookup(&Constant::String(utf8)).map(StringConstantIndex)
    }

    pub fn lookup_class(&self, class_name: &str) -> Option<ClassConstantIndex> {
        let name = self.lookup_utf8(class_name)?;
        self.lookup(&Constant::Class(name)).map(ClassConstantIndex)
    }

    pub fn lookup_integer(&self, integer: i32) -> Option<ConstantIndex> {
        self.lookup(&Constant::Integer(integer))
    }

    pub fn lookup_long(&self, long: i64) -> Option<ConstantIndex> {
        self.lookup(&Constant::Long(long))
    }

    pub fn lookup_method_ref(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<MethodRefConstantIndex> {
        let class = self.lookup_class(class_name)?;
        let name = self.lookup_utf8(name)?;
        let descriptor = self.lookup_utf8(descriptor)?;
        let name_and_type = self
            .lookup(&Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)?;
        [false, true].iter().find_map(|is_interface| {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface: *is_interface,
            };
            self.lookup(&constant).map(MethodRefConstantIndex)
        })
    }

    /// Get the slot at an index, without ever failing
    ///
    /// This makes it possible to walk every index from `0` to `size()` and be told which ones
    /// are phantom slots.
    pub fn get_slot(&self, index: u16) -> Slot<'_> {
        match self.constants.get_offset(Offset(index as usize)) {
            OffsetResult::Ok(_, constant) => Slot::Entry(constant),
            OffsetResult::InvalidOffset(_) if index != 0 => Slot::Phantom,
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => Slot::Unused,
        }
    }

    /// Get the constant at an index
    pub fn get(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        match self.get_slot(index.0) {
            Slot::Entry(constant) => Ok(constant),
            Slot::Unused | Slot::Phantom => Err(Error::InvalidConstantIndex(index.0)),
        }
    }

    pub fn get_utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.get(index.0)? {
            Constant::Utf8(utf8) => Ok(utf8),
            _ => Err(unexpected(index, "Utf8")),
        }
    }

    /// Name of the class in internal form
    pub fn get_class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.get(index.0)? {
            Constant::Class(name) => self.get_utf8(*name),
            _ => Err(unexpected(index, "Class")),
        }
    }

    pub fn get_string(&self, index: StringConstantIndex) -> Result<&str, Error> {
        match self.get(index.0)? {
            Constant::String(utf8) => self.get_utf8(*utf8),
            _ => Err(unexpected(index, "String")),
        }
    }

    /// Name and descriptor
    pub fn get_name_and_type(
        &self,
        index: NameAndTypeConstantIndex,
    ) -> Result<(&str, &str), Error> {
        match self.get(index.0)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.get_utf8(*name)?, self.get_utf8(*descriptor)?))
            }
            _ => Err(unexpected(index, "NameAndType")),
        }
    }

    /// Class name, member name, and descriptor of a field or method reference
    pub fn get_member_ref(&self, index: ConstantIndex) -> Result<(&str, &str, &str), Error> {
        match self.get(index)? {
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                Ok((self.get_class_name(*class)?, name, descriptor))
            }
            _ => Err(unexpected(index, "Fieldref or Methodref")),
        }
    }

    /// Check that an index points to a utf8 constant
    pub fn utf8_index(&self, index: ConstantIndex) -> Result<Utf8ConstantIndex, Error> {
        match self.get(index)? {
            Constant::Utf8(_) => Ok(Utf8ConstantIndex(index)),
            _ => Err(unexpected(index, "Utf8")),
        }
    }

    /// Check that an index points to a class constant
    pub fn class_index(&self, index: ConstantIndex) -> Result<ClassConstantIndex, Error> {
        match self.get(index)? {
            Constant::Class(_) => Ok(ClassConstantIndex(index)),
            _ => Err(unexpected(index, "Class")),
        }
    }

    /// Check that an index points to a field reference
    pub fn field_ref_index(&self, index: ConstantIndex) -> Result<FieldRefConstantIndex, Error> {
        match self.get(index)? {
            Constant::FieldRef(..) => Ok(FieldRefConstantIndex(index)),
            _ => Err(unexpected(index, "Fieldref")),
        }
    }

    /// Check that an index points to a method reference (class or interface)
    pub fn method_ref_index(&self, index: ConstantIndex) -> Result<MethodRefConstantIndex, Error> {
        match self.get(index)? {
            Constant::MethodRef { .. } => Ok(MethodRefConstantIndex(index)),
            _ => Err(unexpected(index, "Methodref")),
        }
    }

    /// Check that an index points to an invoke dynamic call site
    pub fn invoke_dynamic_index(
        &self,
        index: ConstantIndex,
    ) -> Result<InvokeDynamicConstantIndex, Error> {
        match self.get(index)? {
            Constant::InvokeDynamic { .. } => Ok(InvokeDynamicConstantIndex(index)),
            _ => Err(unexpected(index, "InvokeDynamic")),
        }
    }

    /// Check that an index points to something `ldc` (or `ldc2_w` if `wide`) can load
    pub fn loadable_index(&self, index: ConstantIndex, wide: bool) -> Result<ConstantIndex, Error> {
        let loadable = match self.get(index)? {
            Constant::Long(_) | Constant::Double(_) => wide,
            Constant::Dynamic { .. } => true,
            Constant::Integer(_)
            | Constant::Float(_)
            | Constant::String(_)
            | Constant::Class(_)
            | Constant::MethodHandle { .. }
            | Constant::MethodType { .. } => !wide,
            _ => false,
        };
        if loadable {
            Ok(index)
        } else {
            let expected = if wide {
                "Long or Double"
            } else {
                "loadable constant"
            };
            Err(unexpected(index, expected))
        }
    }

    /// Encode an attribute, adding its name to the pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.add_utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info).map_err(Error::IoError)?;

        Ok(Attribute { name_index, info })
    }

    /// Name of an attribute
    pub fn attribute_name(&self, attribute: &Attribute) -> Result<&str, Error> {
        self.get_utf8(attribute.name_index)
    }

    /// Decode an attribute's payload, if it has the right name
    pub fn parse_attribute<A: AttributeLike>(
        &self,
        attribute: &Attribute,
    ) -> Result<Option<A>, Error> {
        if self.attribute_name(attribute)? != A::NAME {
            return Ok(None);
        }
        let mut info: &[u8] = &attribute.info;
        let parsed = A::deserialize(&mut info).map_err(|err| {
            Error::MalformedClass(format!("bad {} attribute: {}", A::NAME, err))
        })?;
        if !info.is_empty() {
            let msg = format!("{} trailing bytes in {} attribute", info.len(), A::NAME);
            return Err(Error::MalformedClass(msg));
        }
        Ok(Some(parsed))
    }

    /// Find and decode the first attribute with the right name
    pub fn find_attribute<A: AttributeLike>(
        &self,
        attributes: &[Attribute],
    ) -> Result<Option<A>, Error> {
        for attribute in attributes {
            if let Some(parsed) = self.parse_attribute(attribute)? {
                return Ok(Some(parsed));
            }
        }
        Ok(None)
    }

    /// Render a constant for humans (eg. `java/lang/String.length:()I` for a method reference)
    ///
    /// Invalid indices render as `<invalid #n>` rather than failing.
    pub fn display_constant(&self, index: ConstantIndex) -> String {
        let mut out = String::new();
        if self.render_constant(index, &mut out).is_err() {
            out.clear();
            let _ = write!(out, "<invalid {}>", index);
        }
        out
    }

    fn render_constant(&self, index: ConstantIndex, out: &mut String) -> Result<(), Error> {
        match self.get(index)? {
            Constant::Utf8(utf8) => out.push_str(utf8),
            Constant::Integer(integer) => out.push_str(&integer.to_string()),
            Constant::Float(float) => out.push_str(&format!("{:?}f", float)),
            Constant::Long(long) => out.push_str(&format!("{}L", long)),
            Constant::Double(double) => out.push_str(&format!("{:?}d", double)),
            Constant::String(utf8) => out.push_str(&format!("{:?}", self.get_utf8(*utf8)?)),
            Constant::Class(name) | Constant::Module(name) | Constant::Package(name) => {
                out.push_str(self.get_utf8(*name)?)
            }
            Constant::FieldRef(..) | Constant::MethodRef { .. } => {
                let (class, name, descriptor) = self.get_member_ref(index)?;
                out.push_str(&format!("{}.{}:{}", class, name, descriptor));
            }
            Constant::NameAndType { name, descriptor } => {
                let name = self.get_utf8(*name)?;
                let descriptor = self.get_utf8(*descriptor)?;
                out.push_str(&format!("{}:{}", name, descriptor));
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                out.push_str(&format!("{:?} ", handle_kind));
                self.render_constant(*member, out)?;
            }
            Constant::MethodType { descriptor } => out.push_str(self.get_utf8(*descriptor)?),
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor: name_and_type,
            } => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                out.push_str(&format!("#{}:{}:{}", bootstrap_method, name, descriptor));
            }
        }
        Ok(())
    }
}

fn unexpected(index: impl Into<ConstantIndex>, expected: &'static str) -> Error {
    Error::UnexpectedConstant {
        index: index.into().0,
        expected,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn adding_twice_returns_same_index() {
        let mut pool = ConstantPool::new();
        let first = pool.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        let size = pool.size();
        let second = pool.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.size(), size);

        assert_eq!(pool.add_integer(7).unwrap(), pool.add_integer(7).unwrap());
        assert_eq!(pool.add_double(1.5).unwrap(), pool.add_double(1.5).unwrap());
        assert_eq!(pool.add_string("hi").unwrap(), pool.add_string("hi").unwrap());
        assert_ne!(
            pool.add_method_ref("A", "m", "()V").unwrap(),
            pool.add_interface_method_ref("A", "m", "()V").unwrap()
        );
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.size(), 1);
        let long = pool.add_long(42).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(pool.size(), 3);
        let int = pool.add_integer(1).unwrap();
        assert_eq!(int, ConstantIndex(3));

        assert_eq!(pool.get_slot(0), Slot::Unused);
        assert_eq!(pool.get_slot(1), Slot::Entry(&Constant::Long(42)));
        assert_eq!(pool.get_slot(2), Slot::Phantom);
        assert_eq!(pool.get_slot(3), Slot::Entry(&Constant::Integer(1)));
        assert_eq!(pool.get_slot(4), Slot::Unused);
        assert!(matches!(
            pool.get(ConstantIndex(2)),
            Err(Error::InvalidConstantIndex(2))
        ));
        assert!(matches!(
            pool.get(ConstantIndex(0)),
            Err(Error::InvalidConstantIndex(0))
        ));
    }

    #[test]
    fn defensive_iteration_never_fails() {
        let mut pool = ConstantPool::new();
        pool.add_double(1.0).unwrap();
        pool.add_long(2).unwrap();
        pool.add_utf8("x").unwrap();
        let slots: Vec<Slot> = (0..pool.size() as u16 + 2).map(|i| pool.get_slot(i)).collect();
        let phantoms = slots.iter().filter(|s| **s == Slot::Phantom).count();
        assert_eq!(phantoms, 2);
    }

    #[test]
    fn filling_to_the_ceiling() {
        let mut pool = ConstantPool::new();
        for i in 0..32767 {
            pool.add_long(i).unwrap();
        }
        assert_eq!(pool.size(), ConstantPool::MAX_SIZE);

        match pool.add_long(-1) {
            Err(Error::ConstantPoolOverflow { offset, .. }) => assert_eq!(offset, 65535),
            other => panic!("expected overflow, got {:?}", other),
        }
        assert_eq!(pool.size(), ConstantPool::MAX_SIZE);
        assert!(pool.add_utf8("one more").is_err());
        assert_eq!(pool.size(), ConstantPool::MAX_SIZE);

        // Existing values are still found
        assert_eq!(pool.add_long(0).unwrap(), ConstantIndex(1));
    }

    #[test]
    fn typed_accessors() {
        let mut pool = ConstantPool::new();
        let field = pool.add_field_ref("Foo", "bar", "I").unwrap();
        assert_eq!(pool.get_member_ref(field.into()).unwrap(), ("Foo", "bar", "I"));
        assert_eq!(pool.display_constant(field.into()), "Foo.bar:I");
        assert!(pool.method_ref_index(field.into()).is_err());
        assert!(pool.loadable_index(field.into(), false).is_err());
        let long = pool.add_long(3).unwrap();
        assert!(pool.loadable_index(long, true).is_ok());
        assert!(pool.loadable_index(long, false).is_err());
        assert_eq!(pool.lookup_class("Foo"), pool.add_class("Foo").ok());
        assert_eq!(pool.lookup_class("Nope"), None);
        assert_eq!(pool.display_constant(ConstantIndex(999)), "<invalid #999>");
    }

    #[test]
    fn wrapping_checks_references() {
        let mut good = ConstantPool::new();
        good.add_method_ref("A", "b", "()V").unwrap();
        assert!(ConstantPool::from_constants(good.to_offset_vec()).is_ok());

        let mut dangling = OffsetVec::new_starting_at(Offset(1));
        dangling.push(Constant::Class(Utf8ConstantIndex(ConstantIndex(5))));
        assert!(matches!(
            ConstantPool::from_constants(dangling),
            Err(Error::InvalidConstantIndex(5))
        ));

        let mut wrong_kind = OffsetVec::new_starting_at(Offset(1));
        wrong_kind.push(Constant::Integer(0));
        wrong_kind.push(Constant::String(Utf8ConstantIndex(ConstantIndex(1))));
        assert!(matches!(
            ConstantPool::from_constants(wrong_kind),
            Err(Error::UnexpectedConstant { index: 1, .. })
        ));
    }
}
