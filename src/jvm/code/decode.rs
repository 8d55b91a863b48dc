//! Decode a code array into an `InstructionList`
//!
//! Decoding happens in two passes. The first reads instructions one by one, leaving their jump
//! targets unresolved but remembering which offsets they point to. The second pushes every
//! instruction into the list (which is what produces their handles) and then patches the jump
//! targets by mapping offsets to handles.
//!
//! Constant operands are checked against the pool, so an instruction in a decoded list always
//! refers to the kind of constant its opcode expects.

use super::encode::WIDE;
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, Deserialize, FieldRefConstantIndex, MethodRefConstantIndex,
};
use crate::jvm::code::{
    switch_padding, CompareMode, EqComparison, Instruction, InstructionHandle, InstructionList,
    InvokeType, OrdComparison, ShiftType,
};
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::{BaseType, Error};
use crate::util::Offset;
use std::collections::HashMap;
use std::io::Cursor;

/// Decoded instructions, along with the offset each one started at in the original code array
///
/// The offsets are sorted, so they can be binary searched (eg. to map exception table or line
/// number entries onto handles).
pub struct DecodedCode {
    pub instructions: InstructionList,
    pub offsets: Vec<(Offset, InstructionHandle)>,
}

impl DecodedCode {
    /// Handle of the instruction starting exactly at `offset`
    pub fn handle_at(&self, offset: Offset) -> Option<InstructionHandle> {
        self.offsets
            .binary_search_by_key(&offset, |(start, _)| *start)
            .ok()
            .map(|idx| self.offsets[idx].1)
    }

    /// Handle of the last instruction starting strictly before `offset`
    pub fn handle_before(&self, offset: Offset) -> Option<InstructionHandle> {
        let idx = match self.offsets.binary_search_by_key(&offset, |(start, _)| *start) {
            Ok(idx) | Err(idx) => idx,
        };
        idx.checked_sub(1).map(|idx| self.offsets[idx].1)
    }
}

/// Instruction whose jump targets are still offsets
struct Pending {
    offset: Offset,
    instruction: Instruction,
    targets: Vec<isize>,
}

/// Decode a full code array
pub fn decode(code: &[u8], pool: &ConstantPool) -> Result<DecodedCode, Error> {
    let mut pending: Vec<Pending> = vec![];
    let mut cursor = Cursor::new(code);
    while (cursor.position() as usize) < code.len() {
        let offset = Offset(cursor.position() as usize);
        let mut decoder = Decoder {
            cursor: &mut cursor,
            offset,
            pool,
            targets: vec![],
        };
        let instruction = decoder.instruction()?;
        let targets = decoder.targets;
        pending.push(Pending {
            offset,
            instruction,
            targets,
        });
    }
    log::trace!("decoded {} instructions from {} bytes", pending.len(), code.len());

    // Second pass: allocate handles, then resolve jump targets
    let mut instructions = InstructionList::new();
    let mut offsets = Vec::with_capacity(pending.len());
    let mut by_offset: HashMap<isize, InstructionHandle> = HashMap::with_capacity(pending.len());
    let mut to_patch = vec![];
    for Pending {
        offset,
        instruction,
        targets,
    } in pending
    {
        let handle = instructions.push_unchecked(instruction);
        offsets.push((offset, handle));
        by_offset.insert(offset.0 as isize, handle);
        if !targets.is_empty() {
            to_patch.push((offset, handle, targets));
        }
    }

    for (offset, handle, targets) in to_patch {
        let resolved = targets
            .into_iter()
            .map(|target| {
                by_offset
                    .get(&target)
                    .copied()
                    .ok_or_else(|| Error::MalformedCode {
                        offset,
                        reason: format!("jump target {} is not the start of an instruction", target),
                    })
            })
            .collect::<Result<Vec<InstructionHandle>, Error>>()?;
        if let Some(instruction) = instructions.get_mut(handle) {
            for (slot, target) in instruction.targets_mut().into_iter().zip(resolved) {
                *slot = target;
            }
        }
    }

    Ok(DecodedCode {
        instructions,
        offsets,
    })
}

struct Decoder<'a, 'b> {
    cursor: &'a mut Cursor<&'b [u8]>,
    offset: Offset,
    pool: &'a ConstantPool,

    /// Absolute offsets of jump targets, in the order `Instruction::targets` returns them
    targets: Vec<isize>,
}

impl<'a, 'b> Decoder<'a, 'b> {
    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedCode {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn read<A: Deserialize>(&mut self) -> Result<A, Error> {
        A::deserialize(&mut *self.cursor).map_err(|_| self.malformed("truncated instruction"))
    }

    fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.cursor.position() as usize
    }

    fn constant_u8(&mut self) -> Result<ConstantIndex, Error> {
        Ok(ConstantIndex(u16::from(self.read::<u8>()?)))
    }

    fn constant_u16(&mut self) -> Result<ConstantIndex, Error> {
        Ok(ConstantIndex(self.read::<u16>()?))
    }

    /// Read a 16-bit relative jump, returning a placeholder handle
    fn narrow_target(&mut self) -> Result<InstructionHandle, Error> {
        let displacement = self.read::<i16>()?;
        self.targets.push(self.offset.0 as isize + displacement as isize);
        Ok(InstructionHandle::UNRESOLVED)
    }

    /// Read a 32-bit relative jump, returning a placeholder handle
    fn wide_target(&mut self) -> Result<InstructionHandle, Error> {
        let displacement = self.read::<i32>()?;
        self.targets.push(self.offset.0 as isize + displacement as isize);
        Ok(InstructionHandle::UNRESOLVED)
    }

    fn skip_switch_padding(&mut self) -> Result<(), Error> {
        for _ in 0..switch_padding(self.offset.0) {
            self.read::<u8>()?;
        }
        Ok(())
    }

    fn instruction(&mut self) -> Result<Instruction, Error> {
        use Instruction::*;
        let opcode = self.read::<u8>()?;
        let instruction = match opcode {
            0x00 => Nop,
            0x01 => AConstNull,
            0x02 => IConstM1,
            0x03 => IConst0,
            0x04 => IConst1,
            0x05 => IConst2,
            0x06 => IConst3,
            0x07 => IConst4,
            0x08 => IConst5,
            0x09 => LConst0,
            0x0a => LConst1,
            0x0b => FConst0,
            0x0c => FConst1,
            0x0d => FConst2,
            0x0e => DConst0,
            0x0f => DConst1,
            0x10 => BiPush(self.read()?),
            0x11 => SiPush(self.read()?),
            0x12 => {
                let idx = self.constant_u8()?;
                Ldc(self.pool.loadable_index(idx, false)?)
            }
            0x13 => {
                let idx = self.constant_u16()?;
                Ldc(self.pool.loadable_index(idx, false)?)
            }
            0x14 => {
                let idx = self.constant_u16()?;
                Ldc2W(self.pool.loadable_index(idx, true)?)
            }
            0x15 => ILoad(u16::from(self.read::<u8>()?)),
            0x16 => LLoad(u16::from(self.read::<u8>()?)),
            0x17 => FLoad(u16::from(self.read::<u8>()?)),
            0x18 => DLoad(u16::from(self.read::<u8>()?)),
            0x19 => ALoad(u16::from(self.read::<u8>()?)),
            0x1a..=0x1d => ILoad(u16::from(opcode - 0x1a)),
            0x1e..=0x21 => LLoad(u16::from(opcode - 0x1e)),
            0x22..=0x25 => FLoad(u16::from(opcode - 0x22)),
            0x26..=0x29 => DLoad(u16::from(opcode - 0x26)),
            0x2a..=0x2d => ALoad(u16::from(opcode - 0x2a)),
            0x2e => IALoad,
            0x2f => LALoad,
            0x30 => FALoad,
            0x31 => DALoad,
            0x32 => AALoad,
            0x33 => BALoad,
            0x34 => CALoad,
            0x35 => SALoad,
            0x36 => IStore(u16::from(self.read::<u8>()?)),
            0x37 => LStore(u16::from(self.read::<u8>()?)),
            0x38 => FStore(u16::from(self.read::<u8>()?)),
            0x39 => DStore(u16::from(self.read::<u8>()?)),
            0x3a => AStore(u16::from(self.read::<u8>()?)),
            0x3b..=0x3e => IStore(u16::from(opcode - 0x3b)),
            0x3f..=0x42 => LStore(u16::from(opcode - 0x3f)),
            0x43..=0x46 => FStore(u16::from(opcode - 0x43)),
            0x47..=0x4a => DStore(u16::from(opcode - 0x47)),
            0x4b..=0x4e => AStore(u16::from(opcode - 0x4b)),
            0x4f => IAStore,
            0x50 => LAStore,
            0x51 => FAStore,
            0x52 => DAStore,
            0x53 => AAStore,
            0x54 => BAStore,
            0x55 => CAStore,
            0x56 => SAStore,
            0x57 => Pop,
            0x58 => Pop2,
            0x59 => Dup,
            0x5a => DupX1,
            0x5b => DupX2,
            0x5c => Dup2,
            0x5d => Dup2X1,
            0x5e => Dup2X2,
            0x5f => Swap,
            0x60 => IAdd,
            0x61 => LAdd,
            0x62 => FAdd,
            0x63 => DAdd,
            0x64 => ISub,
            0x65 => LSub,
            0x66 => FSub,
            0x67 => DSub,
            0x68 => IMul,
            0x69 => LMul,
            0x6a => FMul,
            0x6b => DMul,
            0x6c => IDiv,
            0x6d => LDiv,
            0x6e => FDiv,
            0x6f => DDiv,
            0x70 => IRem,
            0x71 => LRem,
            0x72 => FRem,
            0x73 => DRem,
            0x74 => INeg,
            0x75 => LNeg,
            0x76 => FNeg,
            0x77 => DNeg,
            0x78 => ISh(ShiftType::Left),
            0x79 => LSh(ShiftType::Left),
            0x7a => ISh(ShiftType::ArithmeticRight),
            0x7b => LSh(ShiftType::ArithmeticRight),
            0x7c => ISh(ShiftType::LogicalRight),
            0x7d => LSh(ShiftType::LogicalRight),
            0x7e => IAnd,
            0x7f => LAnd,
            0x80 => IOr,
            0x81 => LOr,
            0x82 => IXor,
            0x83 => LXor,
            0x84 => {
                let idx = self.read::<u8>()?;
                let diff = self.read::<i8>()?;
                IInc(u16::from(idx), i16::from(diff))
            }
            0x85 => I2L,
            0x86 => I2F,
            0x87 => I2D,
            0x88 => L2I,
            0x89 => L2F,
            0x8a => L2D,
            0x8b => F2I,
            0x8c => F2L,
            0x8d => F2D,
            0x8e => D2I,
            0x8f => D2L,
            0x90 => D2F,
            0x91 => I2B,
            0x92 => I2C,
            0x93 => I2S,
            0x94 => LCmp,
            0x95 => FCmp(CompareMode::L),
            0x96 => FCmp(CompareMode::G),
            0x97 => DCmp(CompareMode::L),
            0x98 => DCmp(CompareMode::G),
            0x99 => If(OrdComparison::EQ, self.narrow_target()?),
            0x9a => If(OrdComparison::NE, self.narrow_target()?),
            0x9b => If(OrdComparison::LT, self.narrow_target()?),
            0x9c => If(OrdComparison::GE, self.narrow_target()?),
            0x9d => If(OrdComparison::GT, self.narrow_target()?),
            0x9e => If(OrdComparison::LE, self.narrow_target()?),
            0x9f => IfICmp(OrdComparison::EQ, self.narrow_target()?),
            0xa0 => IfICmp(OrdComparison::NE, self.narrow_target()?),
            0xa1 => IfICmp(OrdComparison::LT, self.narrow_target()?),
            0xa2 => IfICmp(OrdComparison::GE, self.narrow_target()?),
            0xa3 => IfICmp(OrdComparison::GT, self.narrow_target()?),
            0xa4 => IfICmp(OrdComparison::LE, self.narrow_target()?),
            0xa5 => IfACmp(EqComparison::EQ, self.narrow_target()?),
            0xa6 => IfACmp(EqComparison::NE, self.narrow_target()?),
            0xa7 => Goto(self.narrow_target()?),
            0xa8 => Jsr(self.narrow_target()?),
            0xa9 => Ret(u16::from(self.read::<u8>()?)),
            0xaa => {
                self.skip_switch_padding()?;
                let default = self.wide_target()?;
                let low = self.read::<i32>()?;
                let high = self.read::<i32>()?;
                if high < low {
                    return Err(self.malformed(format!(
                        "tableswitch low {} is greater than high {}",
                        low, high
                    )));
                }
                let count = (i64::from(high) - i64::from(low) + 1) as usize;
                if count * 4 > self.remaining() {
                    return Err(self.malformed("truncated tableswitch"));
                }
                let targets = (0..count)
                    .map(|_| self.wide_target())
                    .collect::<Result<Vec<_>, Error>>()?;
                TableSwitch {
                    default,
                    low,
                    targets,
                }
            }
            0xab => {
                self.skip_switch_padding()?;
                let default = self.wide_target()?;
                let npairs = self.read::<i32>()?;
                if npairs < 0 || npairs as usize * 8 > self.remaining() {
                    return Err(self.malformed(format!("bad lookupswitch pair count {}", npairs)));
                }
                let mut targets = Vec::with_capacity(npairs as usize);
                for _ in 0..npairs {
                    let key = self.read::<i32>()?;
                    targets.push((key, self.wide_target()?));
                }
                LookupSwitch { default, targets }
            }
            0xac => IReturn,
            0xad => LReturn,
            0xae => FReturn,
            0xaf => DReturn,
            0xb0 => AReturn,
            0xb1 => Return,
            0xb2 => GetStatic(self.field_ref()?),
            0xb3 => PutStatic(self.field_ref()?),
            0xb4 => GetField(self.field_ref()?),
            0xb5 => PutField(self.field_ref()?),
            0xb6 => Invoke(InvokeType::Virtual, self.method_ref()?),
            0xb7 => Invoke(InvokeType::Special, self.method_ref()?),
            0xb8 => Invoke(InvokeType::Static, self.method_ref()?),
            0xb9 => {
                let method = self.method_ref()?;
                let count = self.read::<u8>()?;
                let _zero = self.read::<u8>()?;
                Invoke(InvokeType::Interface(count), method)
            }
            0xba => {
                let idx = self.constant_u16()?;
                let _zero = self.read::<u16>()?;
                InvokeDynamic(self.pool.invoke_dynamic_index(idx)?)
            }
            0xbb => New(self.class()?),
            0xbc => {
                let code = self.read::<u8>()?;
                match BaseType::from_array_type_code(code) {
                    Some(base_type) => NewArray(base_type),
                    None => return Err(self.malformed(format!("bad newarray type {}", code))),
                }
            }
            0xbd => ANewArray(self.class()?),
            0xbe => ArrayLength,
            0xbf => AThrow,
            0xc0 => CheckCast(self.class()?),
            0xc1 => InstanceOf(self.class()?),
            0xc2 => MonitorEnter,
            0xc3 => MonitorExit,
            WIDE => self.wide_instruction()?,
            0xc5 => {
                let class = self.class()?;
                MultiANewArray(class, self.read()?)
            }
            0xc6 => IfNull(EqComparison::EQ, self.narrow_target()?),
            0xc7 => IfNull(EqComparison::NE, self.narrow_target()?),
            0xc8 => GotoW(self.wide_target()?),
            0xc9 => JsrW(self.wide_target()?),
            0xca => Breakpoint,
            0xfe => Impdep1,
            0xff => Impdep2,
            other => return Err(self.malformed(format!("unknown opcode 0x{:02x}", other))),
        };
        Ok(instruction)
    }

    /// Instruction following a `wide` prefix
    fn wide_instruction(&mut self) -> Result<Instruction, Error> {
        use Instruction::*;
        let opcode = self.read::<u8>()?;
        let instruction = match opcode {
            0x15 => ILoad(self.read()?),
            0x16 => LLoad(self.read()?),
            0x17 => FLoad(self.read()?),
            0x18 => DLoad(self.read()?),
            0x19 => ALoad(self.read()?),
            0x36 => IStore(self.read()?),
            0x37 => LStore(self.read()?),
            0x38 => FStore(self.read()?),
            0x39 => DStore(self.read()?),
            0x3a => AStore(self.read()?),
            0xa9 => Ret(self.read()?),
            0x84 => {
                let idx = self.read::<u16>()?;
                IInc(idx, self.read()?)
            }
            other => {
                return Err(self.malformed(format!("opcode 0x{:02x} cannot be wide", other)))
            }
        };
        Ok(instruction)
    }

    fn field_ref(&mut self) -> Result<FieldRefConstantIndex, Error> {
        let idx = self.constant_u16()?;
        self.pool.field_ref_index(idx)
    }

    fn method_ref(&mut self) -> Result<MethodRefConstantIndex, Error> {
        let idx = self.constant_u16()?;
        self.pool.method_ref_index(idx)
    }

    fn class(&mut self) -> Result<ClassConstantIndex, Error> {
        let idx = self.constant_u16()?;
        self.pool.class_index(idx)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_and_wide_forms_fold_together() {
        let pool = ConstantPool::new();
        let code = [
            0x1b, // iload_1
            0x15, 0x01, // iload 1
            0xc4, 0x15, 0x00, 0x01, // wide iload 1
            0xc4, 0x84, 0x01, 0x00, 0x01, 0x00, // wide iinc 256 256
            0xb1, // return
        ];
        let decoded = decode(&code, &pool).unwrap();
        let instructions: Vec<Instruction> = decoded
            .instructions
            .iter()
            .map(|(_, insn)| insn.clone())
            .collect();
        assert_eq!(
            instructions,
            vec![
                Instruction::ILoad(1),
                Instruction::ILoad(1),
                Instruction::ILoad(1),
                Instruction::IInc(256, 256),
                Instruction::Return,
            ]
        );
        assert_eq!(
            decoded.offsets.iter().map(|(off, _)| off.0).collect::<Vec<_>>(),
            vec![0, 1, 3, 7, 13]
        );

        // Re-encoding picks the shortest forms
        assert_eq!(
            decoded.instructions.encode().unwrap(),
            vec![0x1b, 0x1b, 0x1b, 0xc4, 0x84, 0x01, 0x00, 0x01, 0x00, 0xb1]
        );
    }

    #[test]
    fn targets_resolve_to_handles() {
        let pool = ConstantPool::new();
        let code = [
            0x03, // 0: iconst_0
            0xaa, 0x00, 0x00, // 1: tableswitch, padding
            0x00, 0x00, 0x00, 0x17, // default: 24
            0x00, 0x00, 0x00, 0x00, // low: 0
            0x00, 0x00, 0x00, 0x01, // high: 1
            0x00, 0x00, 0x00, 0x17, // 0 => 24
            0x00, 0x00, 0x00, 0x18, // 1 => 25
            0x00, // 24: nop
            0xb1, // 25: return
        ];
        let decoded = decode(&code, &pool).unwrap();
        let nop = decoded.handle_at(Offset(24)).unwrap();
        let ret = decoded.handle_at(Offset(25)).unwrap();
        let switch = decoded.handle_at(Offset(1)).unwrap();
        assert_eq!(
            decoded.instructions.get(switch),
            Some(&Instruction::TableSwitch {
                default: nop,
                low: 0,
                targets: vec![nop, ret],
            })
        );
        assert_eq!(decoded.handle_before(Offset(25)), Some(nop));
        assert_eq!(decoded.handle_before(Offset(26)), Some(ret));
        assert_eq!(decoded.instructions.encode().unwrap(), code.to_vec());
    }

    #[test]
    fn bad_code_is_rejected() {
        let pool = ConstantPool::new();

        // Jump into the middle of an instruction
        let err = decode(&[0xa7, 0x00, 0x01, 0xb1], &pool);
        assert!(matches!(err, Err(Error::MalformedCode { offset: Offset(0), .. })));

        // Truncated operand
        let err = decode(&[0x11, 0x00], &pool);
        assert!(matches!(err, Err(Error::MalformedCode { .. })));

        // Unassigned opcode
        let err = decode(&[0xcb], &pool);
        assert!(matches!(err, Err(Error::MalformedCode { .. })));

        // Constant of the wrong kind
        let mut pool = ConstantPool::new();
        let utf8 = pool.add_utf8("hello").unwrap();
        let err = decode(&[0xbb, 0x00, utf8.index().0 as u8], &pool);
        assert!(matches!(err, Err(Error::UnexpectedConstant { .. })));
    }

    #[test]
    fn reserved_opcodes_decode() {
        let pool = ConstantPool::new();
        let decoded = decode(&[0xca, 0xfe, 0xff], &pool).unwrap();
        let instructions: Vec<&Instruction> =
            decoded.instructions.iter().map(|(_, insn)| insn).collect();
        assert_eq!(
            instructions,
            vec![
                &Instruction::Breakpoint,
                &Instruction::Impdep1,
                &Instruction::Impdep2
            ]
        );
    }
}
