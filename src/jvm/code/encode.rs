use crate::jvm::class_file::{ConstantIndex, Serialize};
use crate::jvm::code::{
    switch_padding, CompareMode, EqComparison, Instruction, InstructionHandle, InvokeType,
    OrdComparison, ShiftType,
};
use crate::jvm::Error;
use crate::util::Offset;
use std::convert::TryFrom;

/// Byte of the `wide` prefix
pub(crate) const WIDE: u8 = 0xc4;

impl Instruction {
    /// Write the bytes of the instruction, assuming it starts at `offset`
    ///
    /// `widened` selects the `goto_w`/`jsr_w` encoding of `goto`/`jsr`, and `displacement` maps
    /// a jump target to its offset relative to `offset`.
    pub(crate) fn encode(
        &self,
        offset: Offset,
        widened: bool,
        displacement: impl Fn(InstructionHandle) -> Result<isize, Error>,
        code: &mut Vec<u8>,
    ) -> Result<(), Error> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `iload` plus a byte operand
         *   - wide form (255-65535) use `wide iload` plus two byte operands
         */
        fn load_or_store(
            idx: u16,
            short_form_start: u8,
            normal_form: u8,
            code: &mut Vec<u8>,
        ) -> Result<(), Error> {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => (short_form_start + n).serialize(code)?,
                Ok(n) => {
                    normal_form.serialize(code)?;
                    n.serialize(code)?;
                }
                Err(_) => {
                    WIDE.serialize(code)?;
                    normal_form.serialize(code)?;
                    idx.serialize(code)?;
                }
            }
            Ok(())
        }

        let narrow = |target: InstructionHandle| -> Result<i16, Error> {
            let displacement = displacement(target)?;
            i16::try_from(displacement).map_err(|_| Error::BranchOutOfRange {
                offset,
                displacement,
            })
        };
        let wide = |target: InstructionHandle| -> Result<i32, Error> {
            let displacement = displacement(target)?;
            i32::try_from(displacement).map_err(|_| Error::BranchOutOfRange {
                offset,
                displacement,
            })
        };

        match self {
            Instruction::Nop => 0x00u8.serialize(code)?,
            Instruction::AConstNull => 0x01u8.serialize(code)?,
            Instruction::IConstM1 => 0x02u8.serialize(code)?,
            Instruction::IConst0 => 0x03u8.serialize(code)?,
            Instruction::IConst1 => 0x04u8.serialize(code)?,
            Instruction::IConst2 => 0x05u8.serialize(code)?,
            Instruction::IConst3 => 0x06u8.serialize(code)?,
            Instruction::IConst4 => 0x07u8.serialize(code)?,
            Instruction::IConst5 => 0x08u8.serialize(code)?,
            Instruction::LConst0 => 0x09u8.serialize(code)?,
            Instruction::LConst1 => 0x0au8.serialize(code)?,
            Instruction::FConst0 => 0x0bu8.serialize(code)?,
            Instruction::FConst1 => 0x0cu8.serialize(code)?,
            Instruction::FConst2 => 0x0du8.serialize(code)?,
            Instruction::DConst0 => 0x0eu8.serialize(code)?,
            Instruction::DConst1 => 0x0fu8.serialize(code)?,
            Instruction::BiPush(b) => {
                0x10u8.serialize(code)?;
                b.serialize(code)?;
            }
            Instruction::SiPush(s) => {
                0x11u8.serialize(code)?;
                s.serialize(code)?;
            }
            Instruction::Ldc(ConstantIndex(idx)) => match u8::try_from(*idx) {
                Ok(b) => {
                    0x12u8.serialize(code)?;
                    b.serialize(code)?;
                }
                Err(_) => {
                    0x13u8.serialize(code)?;
                    idx.serialize(code)?;
                }
            },
            Instruction::Ldc2W(idx) => {
                0x14u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::ILoad(idx) => load_or_store(*idx, 0x1a, 0x15, code)?,
            Instruction::LLoad(idx) => load_or_store(*idx, 0x1e, 0x16, code)?,
            Instruction::FLoad(idx) => load_or_store(*idx, 0x22, 0x17, code)?,
            Instruction::DLoad(idx) => load_or_store(*idx, 0x26, 0x18, code)?,
            Instruction::ALoad(idx) => load_or_store(*idx, 0x2a, 0x19, code)?,
            Instruction::IALoad => 0x2eu8.serialize(code)?,
            Instruction::LALoad => 0x2fu8.serialize(code)?,
            Instruction::FALoad => 0x30u8.serialize(code)?,
            Instruction::DALoad => 0x31u8.serialize(code)?,
            Instruction::AALoad => 0x32u8.serialize(code)?,
            Instruction::BALoad => 0x33u8.serialize(code)?,
            Instruction::CALoad => 0x34u8.serialize(code)?,
            Instruction::SALoad => 0x35u8.serialize(code)?,
            Instruction::IStore(idx) => load_or_store(*idx, 0x3b, 0x36, code)?,
            Instruction::LStore(idx) => load_or_store(*idx, 0x3f, 0x37, code)?,
            Instruction::FStore(idx) => load_or_store(*idx, 0x43, 0x38, code)?,
            Instruction::DStore(idx) => load_or_store(*idx, 0x47, 0x39, code)?,
            Instruction::AStore(idx) => load_or_store(*idx, 0x4b, 0x3a, code)?,
            Instruction::IAStore => 0x4fu8.serialize(code)?,
            Instruction::LAStore => 0x50u8.serialize(code)?,
            Instruction::FAStore => 0x51u8.serialize(code)?,
            Instruction::DAStore => 0x52u8.serialize(code)?,
            Instruction::AAStore => 0x53u8.serialize(code)?,
            Instruction::BAStore => 0x54u8.serialize(code)?,
            Instruction::CAStore => 0x55u8.serialize(code)?,
            Instruction::SAStore => 0x56u8.serialize(code)?,
            Instruction::Pop => 0x57u8.serialize(code)?,
            Instruction::Pop2 => 0x58u8.serialize(code)?,
            Instruction::Dup => 0x59u8.serialize(code)?,
            Instruction::DupX1 => 0x5au8.serialize(code)?,
            Instruction::DupX2 => 0x5bu8.serialize(code)?,
            Instruction::Dup2 => 0x5cu8.serialize(code)?,
            Instruction::Dup2X1 => 0x5du8.serialize(code)?,
            Instruction::Dup2X2 => 0x5eu8.serialize(code)?,
            Instruction::Swap => 0x5fu8.serialize(code)?,
            Instruction::IAdd => 0x60u8.serialize(code)?,
            Instruction::LAdd => 0x61u8.serialize(code)?,
            Instruction::FAdd => 0x62u8.serialize(code)?,
            Instruction::DAdd => 0x63u8.serialize(code)?,
            Instruction::ISub => 0x64u8.serialize(code)?,
            Instruction::LSub => 0x65u8.serialize(code)?,
            Instruction::FSub => 0x66u8.serialize(code)?,
            Instruction::DSub => 0x67u8.serialize(code)?,
            Instruction::IMul => 0x68u8.serialize(code)?,
            Instruction::LMul => 0x69u8.serialize(code)?,
            Instruction::FMul => 0x6au8.serialize(code)?,
            Instruction::DMul => 0x6bu8.serialize(code)?,
            Instruction::IDiv => 0x6cu8.serialize(code)?,
            Instruction::LDiv => 0x6du8.serialize(code)?,
            Instruction::FDiv => 0x6eu8.serialize(code)?,
            Instruction::DDiv => 0x6fu8.serialize(code)?,
            Instruction::IRem => 0x70u8.serialize(code)?,
            Instruction::LRem => 0x71u8.serialize(code)?,
            Instruction::FRem => 0x72u8.serialize(code)?,
            Instruction::DRem => 0x73u8.serialize(code)?,
            Instruction::INeg => 0x74u8.serialize(code)?,
            Instruction::LNeg => 0x75u8.serialize(code)?,
            Instruction::FNeg => 0x76u8.serialize(code)?,
            Instruction::DNeg => 0x77u8.serialize(code)?,
            Instruction::ISh(ShiftType::Left) => 0x78u8.serialize(code)?,
            Instruction::LSh(ShiftType::Left) => 0x79u8.serialize(code)?,
            Instruction::ISh(ShiftType::ArithmeticRight) => 0x7au8.serialize(code)?,
            Instruction::LSh(ShiftType::ArithmeticRight) => 0x7bu8.serialize(code)?,
            Instruction::ISh(ShiftType::LogicalRight) => 0x7cu8.serialize(code)?,
            Instruction::LSh(ShiftType::LogicalRight) => 0x7du8.serialize(code)?,
            Instruction::IAnd => 0x7eu8.serialize(code)?,
            Instruction::LAnd => 0x7fu8.serialize(code)?,
            Instruction::IOr => 0x80u8.serialize(code)?,
            Instruction::LOr => 0x81u8.serialize(code)?,
            Instruction::IXor => 0x82u8.serialize(code)?,
            Instruction::LXor => 0x83u8.serialize(code)?,
            Instruction::IInc(idx, diff) => match (u8::try_from(*idx), i8::try_from(*diff)) {
                (Ok(b), Ok(d)) => {
                    0x84u8.serialize(code)?;
                    b.serialize(code)?;
                    d.serialize(code)?;
                }
                _ => {
                    WIDE.serialize(code)?;
                    0x84u8.serialize(code)?;
                    idx.serialize(code)?;
                    diff.serialize(code)?;
                }
            },
            Instruction::I2L => 0x85u8.serialize(code)?,
            Instruction::I2F => 0x86u8.serialize(code)?,
            Instruction::I2D => 0x87u8.serialize(code)?,
            Instruction::L2I => 0x88u8.serialize(code)?,
            Instruction::L2F => 0x89u8.serialize(code)?,
            Instruction::L2D => 0x8au8.serialize(code)?,
            Instruction::F2I => 0x8bu8.serialize(code)?,
            Instruction::F2L => 0x8cu8.serialize(code)?,
            Instruction::F2D => 0x8du8.serialize(code)?,
            Instruction::D2I => 0x8eu8.serialize(code)?,
            Instruction::D2L => 0x8fu8.serialize(code)?,
            Instruction::D2F => 0x90u8.serialize(code)?,
            Instruction::I2B => 0x91u8.serialize(code)?,
            Instruction::I2C => 0x92u8.serialize(code)?,
            Instruction::I2S => 0x93u8.serialize(code)?,
            Instruction::LCmp => 0x94u8.serialize(code)?,
            Instruction::FCmp(CompareMode::L) => 0x95u8.serialize(code)?,
            Instruction::FCmp(CompareMode::G) => 0x96u8.serialize(code)?,
            Instruction::DCmp(CompareMode::L) => 0x97u8.serialize(code)?,
            Instruction::DCmp(CompareMode::G) => 0x98u8.serialize(code)?,
            Instruction::If(comp, target) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x99,
                    OrdComparison::NE => 0x9a,
                    OrdComparison::LT => 0x9b,
                    OrdComparison::GE => 0x9c,
                    OrdComparison::GT => 0x9d,
                    OrdComparison::LE => 0x9e,
                };
                opcode.serialize(code)?;
                narrow(*target)?.serialize(code)?;
            }
            Instruction::IfICmp(comp, target) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x9f,
                    OrdComparison::NE => 0xa0,
                    OrdComparison::LT => 0xa1,
                    OrdComparison::GE => 0xa2,
                    OrdComparison::GT => 0xa3,
                    OrdComparison::LE => 0xa4,
                };
                opcode.serialize(code)?;
                narrow(*target)?.serialize(code)?;
            }
            Instruction::IfACmp(comp, target) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xa5,
                    EqComparison::NE => 0xa6,
                };
                opcode.serialize(code)?;
                narrow(*target)?.serialize(code)?;
            }
            Instruction::Goto(target) if widened => {
                0xc8u8.serialize(code)?;
                wide(*target)?.serialize(code)?;
            }
            Instruction::Goto(target) => {
                0xa7u8.serialize(code)?;
                narrow(*target)?.serialize(code)?;
            }
            Instruction::Jsr(target) if widened => {
                0xc9u8.serialize(code)?;
                wide(*target)?.serialize(code)?;
            }
            Instruction::Jsr(target) => {
                0xa8u8.serialize(code)?;
                narrow(*target)?.serialize(code)?;
            }
            Instruction::Ret(idx) => match u8::try_from(*idx) {
                Ok(b) => {
                    0xa9u8.serialize(code)?;
                    b.serialize(code)?;
                }
                Err(_) => {
                    WIDE.serialize(code)?;
                    0xa9u8.serialize(code)?;
                    idx.serialize(code)?;
                }
            },
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                if targets.is_empty() {
                    return Err(Error::MalformedCode {
                        offset,
                        reason: String::from("tableswitch has no cases"),
                    });
                }
                0xaau8.serialize(code)?;
                for _ in 0..switch_padding(offset.0) {
                    0x00u8.serialize(code)?;
                }
                wide(*default)?.serialize(code)?;
                low.serialize(code)?;
                let high = i64::from(*low) + targets.len() as i64 - 1;
                let high = i32::try_from(high).map_err(|_| Error::MalformedCode {
                    offset,
                    reason: format!("tableswitch high value {} overflows", high),
                })?;
                high.serialize(code)?;
                for target in targets {
                    wide(*target)?.serialize(code)?;
                }
            }
            Instruction::LookupSwitch { default, targets } => {
                // Keys must be written in increasing order, with no repeats
                let mut pairs: Vec<&(i32, InstructionHandle)> = targets.iter().collect();
                pairs.sort_by_key(|(key, _)| *key);
                if let Some(pair) = pairs.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                    return Err(Error::MalformedCode {
                        offset,
                        reason: format!("lookupswitch has key {} twice", pair[0].0),
                    });
                }

                0xabu8.serialize(code)?;
                for _ in 0..switch_padding(offset.0) {
                    0x00u8.serialize(code)?;
                }
                wide(*default)?.serialize(code)?;
                (pairs.len() as i32).serialize(code)?;
                for (key, target) in pairs {
                    key.serialize(code)?;
                    wide(*target)?.serialize(code)?;
                }
            }
            Instruction::IReturn => 0xacu8.serialize(code)?,
            Instruction::LReturn => 0xadu8.serialize(code)?,
            Instruction::FReturn => 0xaeu8.serialize(code)?,
            Instruction::DReturn => 0xafu8.serialize(code)?,
            Instruction::AReturn => 0xb0u8.serialize(code)?,
            Instruction::Return => 0xb1u8.serialize(code)?,
            Instruction::GetStatic(idx) => {
                0xb2u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::PutStatic(idx) => {
                0xb3u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::GetField(idx) => {
                0xb4u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::PutField(idx) => {
                0xb5u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::Invoke(InvokeType::Virtual, idx) => {
                0xb6u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::Invoke(InvokeType::Special, idx) => {
                0xb7u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::Invoke(InvokeType::Static, idx) => {
                0xb8u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::Invoke(InvokeType::Interface(cnt), idx) => {
                0xb9u8.serialize(code)?;
                idx.serialize(code)?;
                cnt.serialize(code)?;
                0u8.serialize(code)?;
            }
            Instruction::InvokeDynamic(idx) => {
                0xbau8.serialize(code)?;
                idx.serialize(code)?;
                0u16.serialize(code)?;
            }
            Instruction::New(idx) => {
                0xbbu8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::NewArray(base_type) => {
                0xbcu8.serialize(code)?;
                base_type.array_type_code().serialize(code)?;
            }
            Instruction::ANewArray(idx) => {
                0xbdu8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::ArrayLength => 0xbeu8.serialize(code)?,
            Instruction::AThrow => 0xbfu8.serialize(code)?,
            Instruction::CheckCast(idx) => {
                0xc0u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::InstanceOf(idx) => {
                0xc1u8.serialize(code)?;
                idx.serialize(code)?;
            }
            Instruction::MonitorEnter => 0xc2u8.serialize(code)?,
            Instruction::MonitorExit => 0xc3u8.serialize(code)?,
            Instruction::MultiANewArray(idx, dimensions) => {
                0xc5u8.serialize(code)?;
                idx.serialize(code)?;
                dimensions.serialize(code)?;
            }
            Instruction::IfNull(comp, target) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                opcode.serialize(code)?;
                narrow(*target)?.serialize(code)?;
            }
            Instruction::GotoW(target) => {
                0xc8u8.serialize(code)?;
                wide(*target)?.serialize(code)?;
            }
            Instruction::JsrW(target) => {
                0xc9u8.serialize(code)?;
                wide(*target)?.serialize(code)?;
            }
            Instruction::Breakpoint => 0xcau8.serialize(code)?,
            Instruction::Impdep1 => 0xfeu8.serialize(code)?,
            Instruction::Impdep2 => 0xffu8.serialize(code)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::jvm::code::{Instruction, InstructionList};
    use crate::jvm::Error;
    use crate::util::Offset;

    #[test]
    fn empty_tableswitch_is_rejected() {
        let mut list = InstructionList::new();
        let ret = list.append(Instruction::Return).unwrap();
        list.insert_before(
            ret,
            Instruction::TableSwitch {
                default: ret,
                low: 0,
                targets: vec![],
            },
        )
        .unwrap();
        list.insert_before(ret, Instruction::IConst0).unwrap();

        assert!(matches!(
            list.encode(),
            Err(Error::MalformedCode {
                offset: Offset(0),
                ..
            })
        ));
    }

    #[test]
    fn lookupswitch_keys_are_sorted() {
        let mut list = InstructionList::new();
        let ret = list.append(Instruction::Return).unwrap();
        let switch = list
            .insert_before(
                ret,
                Instruction::LookupSwitch {
                    default: ret,
                    targets: vec![(7, ret), (-1, ret)],
                },
            )
            .unwrap();

        // opcode, 3 bytes padding, default, count, then (key, offset) pairs
        let code = list.encode().unwrap();
        assert_eq!(code.len(), 29);
        assert_eq!(&code[8..12], &[0, 0, 0, 2]);
        assert_eq!(&code[12..16], &(-1i32).to_be_bytes());
        assert_eq!(&code[20..24], &7i32.to_be_bytes());

        list.replace(
            switch,
            Instruction::LookupSwitch {
                default: ret,
                targets: vec![(3, ret), (3, ret)],
            },
        )
        .unwrap();
        assert!(matches!(list.encode(), Err(Error::MalformedCode { .. })));
    }
}
