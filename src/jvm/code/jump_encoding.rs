//! Lay out an instruction list, widening `goto` and `jsr` when their jumps are too far
//!
//! Instructions only know their targets as handles, so the offsets of everything need to be
//! computed before the code can be encoded. Most jumps use signed 16-bit relative offsets. When
//! a `goto` or `jsr` needs to jump further than that, it gets encoded as `goto_w` or `jsr_w`
//! instead (which take a signed 32-bit offset).
//!
//! ### Termination
//!
//! Widening an instruction makes it two bytes longer, which shifts the offsets of everything
//! after it and might push other jumps out of range (or change the padding of switches). So the
//! layout is repeated until no more jumps need widening. This always finishes: a widened jump is
//! never narrowed again, and there are only so many jumps to widen.
//!
//! Conditional branches (`if*`) have no wide form. Those are not rewritten here: encoding fails
//! with `BranchOutOfRange` instead.

use crate::jvm::code::{Instruction, InstructionHandle, InstructionList};
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

/// Range of relative jump offsets supported by `goto` and `if*` branch instructions
pub const SIGNED_16BIT_JUMP_RANGE: RangeInclusive<isize> =
    RangeInclusive::new(i16::MIN as isize, i16::MAX as isize);

/// Longest code array a method may have
pub const MAX_CODE_LENGTH: usize = 65535;

/// Instruction placed in the code array
#[derive(Copy, Clone, Debug)]
struct EncodedSlot {
    handle: InstructionHandle,
    width: usize,
}

impl Width for EncodedSlot {
    fn width(&self) -> usize {
        self.width
    }
}

/// Offsets of every instruction in a list, along with which jumps need their wide encoding
#[derive(Debug)]
pub struct Layout {
    slots: OffsetVec<EncodedSlot>,
    offsets: HashMap<InstructionHandle, Offset>,
    widened: HashSet<InstructionHandle>,
}

impl Layout {
    /// Lay out the list, widening jumps until everything fits
    pub fn compute(list: &InstructionList) -> Layout {
        Layout::compute_with_range(list, &SIGNED_16BIT_JUMP_RANGE)
    }

    /// Same as `compute`, but with a custom range for narrow jumps (smaller ranges make widening
    /// easy to exercise)
    pub(crate) fn compute_with_range(
        list: &InstructionList,
        narrow_range: &RangeInclusive<isize>,
    ) -> Layout {
        let mut widened: HashSet<InstructionHandle> = HashSet::new();
        let mut pass = 0;
        loop {
            pass += 1;
            let layout = Layout::place(list, widened.clone());

            let mut oversized: Vec<InstructionHandle> = vec![];
            for (offset, _, slot) in &layout.slots {
                if layout.widened.contains(&slot.handle) {
                    continue;
                }
                let target = match list.get(slot.handle) {
                    Some(Instruction::Goto(target)) | Some(Instruction::Jsr(target)) => *target,
                    _ => continue,
                };

                // Stale targets get reported when encoding
                if let Some(target_offset) = layout.offsets.get(&target) {
                    let displacement = *target_offset - offset;
                    if !narrow_range.contains(&displacement) {
                        log::trace!(
                            "widening jump at offset {} (displacement {})",
                            offset.0,
                            displacement
                        );
                        oversized.push(slot.handle);
                    }
                }
            }

            log::trace!(
                "layout pass {}: {} bytes, {} jumps newly widened",
                pass,
                layout.slots.offset_len().0,
                oversized.len()
            );
            if oversized.is_empty() {
                return layout;
            }
            widened.extend(oversized);
        }
    }

    /// Assign offsets given a fixed set of widened jumps
    fn place(list: &InstructionList, widened: HashSet<InstructionHandle>) -> Layout {
        let mut slots = OffsetVec::new();
        let mut offsets = HashMap::with_capacity(list.len());
        for (handle, instruction) in list {
            let offset = slots.offset_len();
            let mut width = instruction.length_at(offset.0);
            if widened.contains(&handle) {
                width += 2;
            }
            slots.push(EncodedSlot { handle, width });
            offsets.insert(handle, offset);
        }
        Layout {
            slots,
            offsets,
            widened,
        }
    }

    pub fn offset_of(&self, handle: InstructionHandle) -> Option<Offset> {
        self.offsets.get(&handle).copied()
    }

    pub fn handle_at(&self, offset: Offset) -> Option<InstructionHandle> {
        self.slots.get_offset(offset).ok().map(|slot| slot.handle)
    }

    pub fn code_length(&self) -> Offset {
        self.slots.offset_len()
    }

    /// Is this `goto`/`jsr` encoded in its wide form?
    pub fn is_widened(&self, handle: InstructionHandle) -> bool {
        self.widened.contains(&handle)
    }

    /// Encode the instructions of the list into a code array
    pub fn encode(&self, list: &InstructionList) -> Result<Vec<u8>, Error> {
        let code_length = self.code_length();
        if code_length.0 > MAX_CODE_LENGTH {
            return Err(Error::MethodCodeOverflow(code_length));
        }

        let mut code = Vec::with_capacity(code_length.0);
        for (offset, _, slot) in &self.slots {
            let instruction = list
                .get(slot.handle)
                .ok_or(Error::StaleHandle(slot.handle))?;
            let displacement = |target: InstructionHandle| -> Result<isize, Error> {
                let target_offset = self.offset_of(target).ok_or(Error::StaleHandle(target))?;
                Ok(target_offset - offset)
            };
            instruction.encode(offset, self.is_widened(slot.handle), displacement, &mut code)?;
            debug_assert_eq!(code.len(), offset.0 + slot.width);
        }

        Ok(code)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn far_goto_is_widened() {
        let mut list = InstructionList::new();
        let end = list.append(Instruction::Return).unwrap();
        let goto = list.insert_before(end, Instruction::Goto(end)).unwrap();
        for _ in 0..10 {
            list.insert_before(end, Instruction::Nop).unwrap();
        }

        let layout = Layout::compute_with_range(&list, &RangeInclusive::new(-8, 7));
        assert!(layout.is_widened(goto));
        assert_eq!(layout.offset_of(end), Some(Offset(15)));

        let code = layout.encode(&list).unwrap();
        assert_eq!(&code[..5], &[0xc8, 0x00, 0x00, 0x00, 0x0f]);
        assert_eq!(code.len(), 16);

        let layout = Layout::compute(&list);
        assert!(!layout.is_widened(goto));
        assert_eq!(&layout.encode(&list).unwrap()[..3], &[0xa7, 0x00, 0x0d]);
    }

    #[test]
    fn widening_cascades() {
        // The second goto only needs widening once the first one got bigger
        let mut list = InstructionList::new();
        let end = list.append(Instruction::Return).unwrap();
        let outer = list.insert_before(end, Instruction::Goto(end)).unwrap();
        for _ in 0..4 {
            list.insert_before(end, Instruction::Nop).unwrap();
        }
        let inner = list.insert_before(end, Instruction::Goto(outer)).unwrap();

        // outer: +10 > 9, widened. inner: -7 before widening, -9 after
        let layout = Layout::compute_with_range(&list, &RangeInclusive::new(-8, 9));
        assert!(layout.is_widened(outer));
        assert!(layout.is_widened(inner));
    }

    #[test]
    fn far_conditional_branch_fails() {
        let mut list = InstructionList::new();
        let end = list.append(Instruction::Return).unwrap();
        list.insert_before(end, Instruction::IConst0).unwrap();
        let branch = list
            .insert_before(
                end,
                Instruction::If(crate::jvm::code::OrdComparison::EQ, end),
            )
            .unwrap();
        for _ in 0..(i16::MAX as usize) {
            list.insert_before(end, Instruction::Nop).unwrap();
        }

        match list.encode() {
            Err(Error::BranchOutOfRange {
                offset,
                displacement,
            }) => {
                assert_eq!(Some(offset), list.offset_of(branch));
                assert_eq!(displacement, i16::MAX as isize + 3);
            }
            other => panic!("expected BranchOutOfRange, got {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn oversized_method_fails() {
        let mut list = InstructionList::new();
        for _ in 0..MAX_CODE_LENGTH {
            list.append(Instruction::Nop).unwrap();
        }
        assert_eq!(list.encode().unwrap().len(), MAX_CODE_LENGTH);

        list.append(Instruction::Return).unwrap();
        assert!(matches!(
            list.encode(),
            Err(Error::MethodCodeOverflow(Offset(65536)))
        ));
    }
}
