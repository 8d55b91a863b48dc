use crate::jvm::annotations::{
    decode_annotations, decode_parameter_annotations, encode_annotations,
    encode_parameter_annotations, is_annotation_attribute, AnnotationEntry,
};
use crate::jvm::class_file::{
    self, Attribute, AttributeLike, BytecodeArray, BytecodeIndex, ClassConstantIndex, Code,
    Exceptions, LineNumber, LineNumberTable, LocalVariable, LocalVariableTable,
    LocalVariableTypeTable, Utf8ConstantIndex,
};
use crate::jvm::code::{decode, Instruction, InstructionHandle, InstructionList};
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::{Error, MethodAccessFlags, MethodDescriptor, ParseDescriptor, RenderDescriptor};
use crate::util::Offset;

/// Exception handler of a method, with its protected range given as handles
///
/// Both `start` and `end` are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandlerEntry {
    pub start: InstructionHandle,
    pub end: InstructionHandle,
    pub handler: InstructionHandle,

    /// Class of exceptions caught (`None` catches everything)
    pub catch_type: Option<ClassConstantIndex>,
}

/// Entry of a local variable (or local variable type) table
///
/// The variable is live from `start` to `end`, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start: InstructionHandle,
    pub end: InstructionHandle,
    pub name: Utf8ConstantIndex,

    /// Field descriptor for `LocalVariableTable`, generic signature for `LocalVariableTypeTable`
    pub descriptor: Utf8ConstantIndex,
    pub index: u16,
}

/// Mutable method
///
/// The method refers to constants in the pool of its class, which is why `build` and friends
/// take the pool as an argument. Debug tables (line numbers, local variables) are kept against
/// instruction handles and regenerated when the method is built.
#[derive(Debug)]
pub struct MethodBuilder {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: MethodDescriptor,

    /// Name of the class declaring the method
    pub class_name: String,

    pub instructions: InstructionList,
    pub max_stack: u16,
    pub max_locals: u16,

    exception_handlers: Vec<ExceptionHandlerEntry>,
    line_numbers: Vec<(InstructionHandle, u16)>,
    local_variables: Vec<LocalVariableEntry>,
    local_variable_types: Vec<LocalVariableEntry>,

    /// Checked exceptions the method declares (`Exceptions` attribute)
    exceptions: Vec<ClassConstantIndex>,

    annotations: Vec<AnnotationEntry>,
    parameter_annotations: Vec<Vec<AnnotationEntry>>,

    /// Attributes of the method not modelled above
    attributes: Vec<Attribute>,

    /// Attributes of the `Code` attribute not modelled above (eg. `StackMapTable`)
    code_attributes: Vec<Attribute>,
}

impl MethodBuilder {
    /// New method with no code
    pub fn new(
        access_flags: MethodAccessFlags,
        name: impl Into<String>,
        descriptor: &str,
        class_name: impl Into<String>,
    ) -> Result<MethodBuilder, Error> {
        let descriptor = MethodDescriptor::parse(descriptor).map_err(Error::IoError)?;
        Ok(MethodBuilder {
            access_flags,
            name: name.into(),
            descriptor,
            class_name: class_name.into(),
            instructions: InstructionList::new(),
            max_stack: 0,
            max_locals: 0,
            exception_handlers: vec![],
            line_numbers: vec![],
            local_variables: vec![],
            local_variable_types: vec![],
            exceptions: vec![],
            annotations: vec![],
            parameter_annotations: vec![],
            attributes: vec![],
            code_attributes: vec![],
        })
    }

    /// Wrap a parsed method of the class `class_name`
    ///
    /// Every index in the method is checked against the pool, and the code is decoded into an
    /// instruction list. Inconsistencies are reported right away.
    pub fn from_method(
        class_name: &str,
        method: &class_file::Method,
        pool: &ConstantPool,
    ) -> Result<MethodBuilder, Error> {
        let name = pool.get_utf8(method.name_index)?;
        let descriptor = pool.get_utf8(method.descriptor_index)?;
        let mut builder = MethodBuilder::new(method.access_flags, name, descriptor, class_name)
            .map_err(|_| {
                Error::MalformedClass(format!("bad descriptor {:?} for {}", descriptor, name))
            })?;

        for attribute in &method.attributes {
            let attribute_name = pool.attribute_name(attribute)?;
            if let Some(code) = pool.parse_attribute::<Code>(attribute)? {
                builder.wrap_code(code, pool)?;
            } else if let Some(Exceptions(exceptions)) = pool.parse_attribute(attribute)? {
                for exception in exceptions {
                    builder.exceptions.push(pool.class_index(exception.index())?);
                }
            } else if !is_annotation_attribute(attribute_name) {
                builder.attributes.push(attribute.clone());
            }
        }
        builder.annotations = decode_annotations(pool, &method.attributes)?;
        builder.parameter_annotations = decode_parameter_annotations(pool, &method.attributes)?;

        log::debug!(
            "wrapped method {}.{}{} ({} instructions)",
            class_name,
            builder.name,
            builder.descriptor.render(),
            builder.instructions.len()
        );
        Ok(builder)
    }

    fn wrap_code(&mut self, code: Code, pool: &ConstantPool) -> Result<(), Error> {
        let decoded = decode(&code.code_array.0, pool)?;
        let code_length = Offset(code.code_array.0.len());
        let malformed = |what: &str, pc: u16| {
            Error::MalformedClass(format!(
                "{} {} in {}.{} is not an instruction boundary",
                what, pc, self.class_name, self.name
            ))
        };

        // Ends of ranges are exclusive offsets in the class file, but inclusive handles here
        let range = |start: BytecodeIndex,
                     end: usize,
                     what: &str|
         -> Result<(InstructionHandle, InstructionHandle), Error> {
            let start_handle = decoded
                .handle_at(Offset(start.0 as usize))
                .ok_or_else(|| malformed(what, start.0))?;
            let on_boundary = end == code_length.0 || decoded.handle_at(Offset(end)).is_some();
            let end_handle = if on_boundary && end > start.0 as usize {
                decoded.handle_before(Offset(end))
            } else {
                None
            };
            let end_handle = end_handle.ok_or_else(|| malformed(what, end as u16))?;
            Ok((start_handle, end_handle))
        };

        let mut exception_handlers = vec![];
        for handler in &code.exception_table {
            let (start, end) = range(handler.start_pc, handler.end_pc.0 as usize, "handler range")?;
            let handler_handle = decoded
                .handle_at(Offset(handler.handler_pc.0 as usize))
                .ok_or_else(|| malformed("handler", handler.handler_pc.0))?;
            let catch_type = match handler.catch_type {
                Some(class) => Some(pool.class_index(class.index())?),
                None => None,
            };
            exception_handlers.push(ExceptionHandlerEntry {
                start,
                end,
                handler: handler_handle,
                catch_type,
            });
        }

        let mut line_numbers = vec![];
        let mut local_variables = vec![];
        let mut local_variable_types = vec![];
        let mut code_attributes = vec![];
        for attribute in &code.attributes {
            if let Some(LineNumberTable(lines)) = pool.parse_attribute(attribute)? {
                for line in lines {
                    let handle = decoded
                        .handle_at(Offset(line.start_pc.0 as usize))
                        .ok_or_else(|| malformed("line number", line.start_pc.0))?;
                    line_numbers.push((handle, line.line_number));
                }
            } else if let Some(LocalVariableTable(variables)) = pool.parse_attribute(attribute)? {
                wrap_local_variables(&variables, &range, pool, &mut local_variables)?;
            } else if let Some(LocalVariableTypeTable(variables)) =
                pool.parse_attribute(attribute)?
            {
                wrap_local_variables(&variables, &range, pool, &mut local_variable_types)?;
            } else {
                code_attributes.push(attribute.clone());
            }
        }

        self.max_stack = code.max_stack;
        self.max_locals = code.max_locals;
        self.instructions = decoded.instructions;
        self.exception_handlers = exception_handlers;
        self.line_numbers = line_numbers;
        self.local_variables = local_variables;
        self.local_variable_types = local_variable_types;
        self.code_attributes = code_attributes;
        Ok(())
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn exception_handlers(&self) -> &[ExceptionHandlerEntry] {
        &self.exception_handlers
    }

    /// Protect the instructions from `start` to `end` (inclusive) with a handler
    pub fn add_exception_handler(
        &mut self,
        start: InstructionHandle,
        end: InstructionHandle,
        handler: InstructionHandle,
        catch_type: Option<ClassConstantIndex>,
    ) -> Result<(), Error> {
        self.check_live(&[start, end, handler])?;
        self.exception_handlers.push(ExceptionHandlerEntry {
            start,
            end,
            handler,
            catch_type,
        });
        Ok(())
    }

    pub fn line_numbers(&self) -> &[(InstructionHandle, u16)] {
        &self.line_numbers
    }

    /// Mark `handle` as the start of the code for source line `line`
    pub fn add_line_number(&mut self, handle: InstructionHandle, line: u16) -> Result<(), Error> {
        self.check_live(&[handle])?;
        self.line_numbers.push((handle, line));
        Ok(())
    }

    pub fn local_variables(&self) -> &[LocalVariableEntry] {
        &self.local_variables
    }

    pub fn local_variable_types(&self) -> &[LocalVariableEntry] {
        &self.local_variable_types
    }

    /// Declare a local variable, live from `start` to `end` (inclusive)
    pub fn add_local_variable(
        &mut self,
        pool: &mut ConstantPool,
        name: &str,
        descriptor: &str,
        index: u16,
        start: InstructionHandle,
        end: InstructionHandle,
    ) -> Result<(), Error> {
        self.check_live(&[start, end])?;
        self.local_variables.push(LocalVariableEntry {
            start,
            end,
            name: pool.add_utf8(name)?,
            descriptor: pool.add_utf8(descriptor)?,
            index,
        });
        Ok(())
    }

    /// Drop the line number table
    pub fn strip_line_numbers(&mut self) {
        self.line_numbers.clear();
    }

    /// Drop the local variable and local variable type tables
    pub fn strip_local_variables(&mut self) {
        self.local_variables.clear();
        self.local_variable_types.clear();
    }

    pub fn exceptions(&self) -> &[ClassConstantIndex] {
        &self.exceptions
    }

    /// Declare a checked exception thrown by the method
    pub fn add_exception(&mut self, pool: &mut ConstantPool, class_name: &str) -> Result<(), Error> {
        let class = pool.add_class(class_name)?;
        if !self.exceptions.contains(&class) {
            self.exceptions.push(class);
        }
        Ok(())
    }

    pub fn annotations(&self) -> &[AnnotationEntry] {
        &self.annotations
    }

    pub fn add_annotation(&mut self, annotation: AnnotationEntry) {
        self.annotations.push(annotation);
    }

    pub fn parameter_annotations(&self) -> &[Vec<AnnotationEntry>] {
        &self.parameter_annotations
    }

    /// Annotate the parameter at `parameter` (counting from 0, not including `this`)
    pub fn add_parameter_annotation(
        &mut self,
        parameter: usize,
        annotation: AnnotationEntry,
    ) -> Result<(), Error> {
        let parameters = self.descriptor.parameters.len();
        if parameter >= parameters {
            return Err(Error::MissingMember(format!(
                "parameter {} of {}.{} (which has {} parameters)",
                parameter, self.class_name, self.name, parameters
            )));
        }
        if self.parameter_annotations.len() < parameters {
            self.parameter_annotations.resize(parameters, vec![]);
        }
        self.parameter_annotations[parameter].push(annotation);
        Ok(())
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Add an attribute to the method
    pub fn add_attribute(
        &mut self,
        pool: &mut ConstantPool,
        attribute: impl AttributeLike,
    ) -> Result<(), Error> {
        let attribute = pool.get_attribute(attribute)?;
        self.attributes.push(attribute);
        Ok(())
    }

    /// Remove an instruction, keeping the method tables consistent
    ///
    /// Line numbers on the removed instruction move to the next instruction, and exception
    /// handler or local variable ranges shrink around it (or disappear, if it was all they
    /// covered). Fails with `TargetLost` if the instruction is still targeted by a branch or is
    /// the entry point of an exception handler. Nothing changes when removal fails.
    pub fn remove_instruction(&mut self, handle: InstructionHandle) -> Result<Instruction, Error> {
        if self
            .exception_handlers
            .iter()
            .any(|entry| entry.handler == handle)
        {
            return Err(Error::TargetLost(vec![handle]));
        }

        let next = self.instructions.next(handle);
        let prev = self.instructions.prev(handle);
        let removed = self.instructions.remove(handle)?;

        // A line on the removed instruction moves to the next one, unless that has its own line
        let next_has_line = self
            .line_numbers
            .iter()
            .any(|(line_handle, _)| Some(*line_handle) == next);
        let mut line_numbers = vec![];
        for (line_handle, line) in self.line_numbers.drain(..) {
            if line_handle != handle {
                line_numbers.push((line_handle, line));
            } else if let (Some(next), false) = (next, next_has_line) {
                if !line_numbers.iter().any(|(existing, _)| *existing == next) {
                    line_numbers.push((next, line));
                }
            }
        }
        self.line_numbers = line_numbers;

        // A range covering the removed instruction shrinks. If the instruction was at one end of
        // the range, the neighbour inside the range takes its place.
        let shrink = |start: &mut InstructionHandle, end: &mut InstructionHandle| -> bool {
            if *start == handle && *end == handle {
                return false;
            }
            if *start == handle {
                if let Some(next) = next {
                    *start = next;
                }
            }
            if *end == handle {
                if let Some(prev) = prev {
                    *end = prev;
                }
            }
            true
        };
        self.exception_handlers
            .retain_mut(|entry| shrink(&mut entry.start, &mut entry.end));
        self.local_variables
            .retain_mut(|entry| shrink(&mut entry.start, &mut entry.end));
        self.local_variable_types
            .retain_mut(|entry| shrink(&mut entry.start, &mut entry.end));

        Ok(removed)
    }

    /// Compute (and set) `max_locals` from the descriptor and the local variable instructions
    pub fn compute_max_locals(&mut self) -> u16 {
        let parameters = self.descriptor.parameter_length(!self.is_static());
        let used = self
            .instructions
            .iter()
            .filter_map(|(_, instruction)| instruction.local_variable())
            .map(|(index, width)| index as usize + width as usize)
            .max()
            .unwrap_or(0);
        self.max_locals = u16::try_from(parameters.max(used)).unwrap_or(u16::MAX);
        self.max_locals
    }

    /// Produce the method, adding whatever constants it needs to the pool
    pub fn build(&self, pool: &mut ConstantPool) -> Result<class_file::Method, Error> {
        let name_index = pool.add_utf8(&self.name)?;
        let descriptor_index = pool.add_utf8(&self.descriptor.render())?;

        let mut attributes = vec![];
        if !self.instructions.is_empty() {
            let code = self.build_code(pool)?;
            attributes.push(pool.get_attribute(code)?);
        }
        if !self.exceptions.is_empty() {
            attributes.push(pool.get_attribute(Exceptions(self.exceptions.clone()))?);
        }
        attributes.extend(self.attributes.iter().cloned());
        attributes.extend(encode_annotations(pool, &self.annotations)?);
        attributes.extend(encode_parameter_annotations(
            pool,
            &self.parameter_annotations,
        )?);

        Ok(class_file::Method {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn build_code(&self, pool: &mut ConstantPool) -> Result<Code, Error> {
        let code_array = self.instructions.encode()?;
        let instructions = &self.instructions;
        let pc = |handle: InstructionHandle| -> Result<BytecodeIndex, Error> {
            let offset = instructions
                .offset_of(handle)
                .ok_or(Error::StaleHandle(handle))?;
            Ok(BytecodeIndex(offset.0 as u16))
        };

        // Offset just past an instruction
        let end_pc = |handle: InstructionHandle| -> Result<u16, Error> {
            let end = match instructions.next(handle) {
                Some(next) => instructions.offset_of(next),
                None if instructions.contains(handle) => Some(instructions.code_length()),
                None => None,
            };
            end.map(|end| end.0 as u16)
                .ok_or(Error::StaleHandle(handle))
        };

        let mut exception_table = vec![];
        for entry in &self.exception_handlers {
            exception_table.push(class_file::ExceptionHandler {
                start_pc: pc(entry.start)?,
                end_pc: BytecodeIndex(end_pc(entry.end)?),
                handler_pc: pc(entry.handler)?,
                catch_type: entry.catch_type,
            });
        }

        let mut attributes = vec![];
        if !self.line_numbers.is_empty() {
            let mut lines = vec![];
            for (handle, line_number) in &self.line_numbers {
                lines.push(LineNumber {
                    start_pc: pc(*handle)?,
                    line_number: *line_number,
                });
            }
            attributes.push(pool.get_attribute(LineNumberTable(lines))?);
        }

        let local_variable_table = |entries: &[LocalVariableEntry]| {
            entries
                .iter()
                .map(|entry| -> Result<LocalVariable, Error> {
                    let start_pc = pc(entry.start)?;
                    Ok(LocalVariable {
                        start_pc,
                        length: end_pc(entry.end)?.saturating_sub(start_pc.0),
                        name_index: entry.name,
                        descriptor_index: entry.descriptor,
                        index: entry.index,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()
        };
        if !self.local_variables.is_empty() {
            let variables = local_variable_table(&self.local_variables)?;
            attributes.push(pool.get_attribute(LocalVariableTable(variables))?);
        }
        if !self.local_variable_types.is_empty() {
            let variables = local_variable_table(&self.local_variable_types)?;
            attributes.push(pool.get_attribute(LocalVariableTypeTable(variables))?);
        }

        for attribute in &self.code_attributes {
            if pool.attribute_name(attribute)? == "StackMapTable" {
                log::warn!(
                    "carrying StackMapTable of {}.{} over unchanged, it may be stale",
                    self.class_name, self.name
                );
            }
            attributes.push(attribute.clone());
        }

        Ok(Code {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code_array: BytecodeArray(code_array),
            exception_table,
            attributes,
        })
    }

    fn check_live(&self, handles: &[InstructionHandle]) -> Result<(), Error> {
        for handle in handles {
            if !self.instructions.contains(*handle) {
                return Err(Error::StaleHandle(*handle));
            }
        }
        Ok(())
    }
}

/// Map local variable table entries onto handles
fn wrap_local_variables(
    variables: &[LocalVariable],
    range: &impl Fn(BytecodeIndex, usize, &str) -> Result<(InstructionHandle, InstructionHandle), Error>,
    pool: &ConstantPool,
    entries: &mut Vec<LocalVariableEntry>,
) -> Result<(), Error> {
    for variable in variables {
        if variable.length == 0 {
            log::warn!("dropping empty local variable range at {}", variable.start_pc.0);
            continue;
        }
        let end = variable.start_pc.0 as usize + variable.length as usize;
        let (start, end) = range(variable.start_pc, end, "local variable range")?;
        pool.get_utf8(variable.name_index)?;
        pool.get_utf8(variable.descriptor_index)?;
        entries.push(LocalVariableEntry {
            start,
            end,
            name: variable.name_index,
            descriptor: variable.descriptor_index,
            index: variable.index,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::OrdComparison;

    fn offset(builder: &MethodBuilder, handle: InstructionHandle) -> usize {
        builder.instructions.offset_of(handle).unwrap().0
    }

    #[test]
    fn tables_survive_build_and_wrap() {
        let mut pool = ConstantPool::new();
        let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
        let mut method = MethodBuilder::new(flags, "pick", "(I)I", "me/Example").unwrap();

        let load = method.instructions.append(Instruction::ILoad(0)).unwrap();
        let zero = method.instructions.append(Instruction::IConst0).unwrap();
        let branch = method
            .instructions
            .insert_after(load, Instruction::If(OrdComparison::EQ, zero))
            .unwrap();
        let one = method.instructions.insert_after(branch, Instruction::IConst1).unwrap();
        method.instructions.insert_after(one, Instruction::IReturn).unwrap();
        let last = method.instructions.append(Instruction::IReturn).unwrap();

        method.add_exception_handler(load, one, zero, None).unwrap();
        method.add_line_number(load, 10).unwrap();
        method.add_line_number(zero, 12).unwrap();
        method
            .add_local_variable(&mut pool, "x", "I", 0, load, last)
            .unwrap();
        method.max_stack = 1;
        assert_eq!(method.compute_max_locals(), 1);

        let built = method.build(&mut pool).unwrap();
        let code: Code = pool.find_attribute(&built.attributes).unwrap().unwrap();
        assert_eq!(code.code_array.0, vec![0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac]);
        assert_eq!(code.exception_table.len(), 1);
        let handler = code.exception_table[0];
        assert_eq!(
            (handler.start_pc.0, handler.end_pc.0, handler.handler_pc.0),
            (0, 5, 6)
        );
        let LocalVariableTable(variables) = pool.find_attribute(&code.attributes).unwrap().unwrap();
        assert_eq!((variables[0].start_pc.0, variables[0].length), (0, 8));

        let wrapped = MethodBuilder::from_method("me/Example", &built, &pool).unwrap();
        assert_eq!(wrapped.name, "pick");
        assert_eq!(wrapped.instructions.len(), 6);
        let entry = wrapped.exception_handlers()[0];
        assert_eq!(offset(&wrapped, entry.start), 0);
        assert_eq!(offset(&wrapped, entry.end), 4);
        assert_eq!(offset(&wrapped, entry.handler), 6);
        let lines: Vec<(usize, u16)> = wrapped
            .line_numbers()
            .iter()
            .map(|(handle, line)| (offset(&wrapped, *handle), *line))
            .collect();
        assert_eq!(lines, vec![(0, 10), (6, 12)]);
        let variable = wrapped.local_variables()[0];
        assert_eq!(offset(&wrapped, variable.end), 7);
        assert_eq!(pool.get_utf8(variable.name).unwrap(), "x");
    }

    #[test]
    fn removal_keeps_tables_consistent() {
        let mut method =
            MethodBuilder::new(MethodAccessFlags::STATIC, "run", "()V", "me/Example").unwrap();
        let a = method.instructions.append(Instruction::Nop).unwrap();
        let b = method.instructions.append(Instruction::Nop).unwrap();
        let c = method.instructions.append(Instruction::Return).unwrap();
        method.add_exception_handler(a, b, c, None).unwrap();
        method.add_line_number(a, 1).unwrap();

        // Handler entry points cannot go
        assert!(matches!(
            method.remove_instruction(c),
            Err(Error::TargetLost(lost)) if lost == vec![c]
        ));
        assert_eq!(method.instructions.len(), 3);

        method.remove_instruction(a).unwrap();
        assert_eq!(method.line_numbers(), &[(b, 1)]);
        assert_eq!(method.exception_handlers()[0].start, b);
        assert_eq!(method.exception_handlers()[0].end, b);

        // Range is now empty and disappears
        method.remove_instruction(b).unwrap();
        assert!(method.exception_handlers().is_empty());
        assert_eq!(method.line_numbers(), &[(c, 1)]);

        method.remove_instruction(c).unwrap();
        assert!(method.line_numbers().is_empty());
        assert!(matches!(
            method.add_line_number(c, 2),
            Err(Error::StaleHandle(handle)) if handle == c
        ));
    }

    #[test]
    fn moved_line_number_yields_to_existing_one() {
        let mut method =
            MethodBuilder::new(MethodAccessFlags::STATIC, "run", "()V", "me/Example").unwrap();
        let a = method.instructions.append(Instruction::Nop).unwrap();
        let b = method.instructions.append(Instruction::Nop).unwrap();
        let c = method.instructions.append(Instruction::Return).unwrap();
        method.add_line_number(b, 2).unwrap();
        method.add_line_number(c, 3).unwrap();
        method.add_line_number(a, 1).unwrap();

        method.remove_instruction(a).unwrap();
        assert_eq!(method.line_numbers(), &[(b, 2), (c, 3)]);
    }

    #[test]
    fn handler_ending_inside_an_instruction_is_rejected() {
        let mut pool = ConstantPool::new();
        // sipush 1; pop; return
        let code = Code {
            max_stack: 1,
            max_locals: 0,
            code_array: BytecodeArray(vec![0x11, 0x00, 0x01, 0x57, 0xb1]),
            exception_table: vec![class_file::ExceptionHandler {
                start_pc: BytecodeIndex(0),
                end_pc: BytecodeIndex(2),
                handler_pc: BytecodeIndex(4),
                catch_type: None,
            }],
            attributes: vec![],
        };
        let method = class_file::Method {
            access_flags: MethodAccessFlags::STATIC,
            name_index: pool.add_utf8("run").unwrap(),
            descriptor_index: pool.add_utf8("()V").unwrap(),
            attributes: vec![pool.get_attribute(code).unwrap()],
        };

        assert!(matches!(
            MethodBuilder::from_method("me/Example", &method, &pool),
            Err(Error::MalformedClass(_))
        ));
    }

    #[test]
    fn abstract_method_has_no_code() {
        let mut pool = ConstantPool::new();
        let method = MethodBuilder::new(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            "size",
            "()I",
            "me/Sized",
        )
        .unwrap();
        let built = method.build(&mut pool).unwrap();
        assert!(built.attributes.is_empty());
        assert_eq!(pool.get_utf8(built.descriptor_index).unwrap(), "()I");
    }

    #[test]
    fn parameter_annotations_are_bounded() {
        let mut pool = ConstantPool::new();
        let mut method =
            MethodBuilder::new(MethodAccessFlags::PUBLIC, "set", "(IJ)V", "me/Example").unwrap();
        let annotation = AnnotationEntry::new(&mut pool, "Lme/NonNull;", true).unwrap();
        method.add_parameter_annotation(1, annotation.clone()).unwrap();
        assert_eq!(method.parameter_annotations().len(), 2);
        assert!(method.parameter_annotations()[0].is_empty());
        assert!(matches!(
            method.add_parameter_annotation(2, annotation),
            Err(Error::MissingMember(_))
        ));
    }

    #[test]
    fn bad_descriptor_is_rejected() {
        assert!(matches!(
            MethodBuilder::new(MethodAccessFlags::PUBLIC, "f", "(I", "me/Example"),
            Err(Error::IoError(_))
        ));
    }
}
