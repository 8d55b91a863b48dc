use crate::jvm::code::jump_encoding::Layout;
use crate::jvm::code::Instruction;
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::Error;
use crate::util::Offset;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Write;
use std::rc::Rc;

/// Stable reference to an instruction in an `InstructionList`
///
/// Handles survive every edit to the list other than the removal of the instruction they refer
/// to. Slots freed by a removal get reused, but with a bumped generation, so a handle to a removed
/// instruction never silently refers to its replacement.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InstructionHandle {
    index: u32,
    generation: u32,
}

impl InstructionHandle {
    /// Placeholder target, used while decoding before offsets are resolved into handles
    pub(crate) const UNRESOLVED: InstructionHandle = InstructionHandle {
        index: u32::MAX,
        generation: u32::MAX,
    };
}

impl fmt::Display for InstructionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "@{}", self.index)
        } else {
            write!(f, "@{}.{}", self.index, self.generation)
        }
    }
}

#[derive(Clone, Debug)]
struct Node {
    instruction: Instruction,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Clone, Debug)]
struct Entry {
    generation: u32,
    node: Option<Node>,
}

/// Ordered, editable sequence of instructions
///
/// Branches refer to their targets by `InstructionHandle`. Offsets are only computed (and
/// cached until the next edit) when something asks for them, so inserting or removing
/// instructions never requires patching branch operands.
///
/// Edits keep the invariant that every branch target is a live instruction of the same list:
/// inserting a branch to a dead handle fails with `StaleHandle`, and removing an instruction that
/// live branches still target fails with `TargetLost`.
#[derive(Clone, Debug, Default)]
pub struct InstructionList {
    entries: Vec<Entry>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
    layout: RefCell<Option<Rc<Layout>>>,
}

impl InstructionList {
    pub fn new() -> InstructionList {
        InstructionList::default()
    }

    /// Number of live instructions
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Is the handle a live instruction of this list?
    pub fn contains(&self, handle: InstructionHandle) -> bool {
        self.node(handle).is_some()
    }

    /// Instruction behind a handle
    pub fn get(&self, handle: InstructionHandle) -> Option<&Instruction> {
        self.node(handle).map(|node| &node.instruction)
    }

    pub fn first(&self) -> Option<InstructionHandle> {
        self.head.map(|index| self.handle_of(index))
    }

    pub fn last(&self) -> Option<InstructionHandle> {
        self.tail.map(|index| self.handle_of(index))
    }

    /// Instruction following `handle`
    pub fn next(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        let next = self.node(handle)?.next?;
        Some(self.handle_of(next))
    }

    /// Instruction preceding `handle`
    pub fn prev(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        let prev = self.node(handle)?.prev?;
        Some(self.handle_of(prev))
    }

    /// Iterate over instructions in order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Add an instruction to the end of the list
    pub fn append(&mut self, instruction: Instruction) -> Result<InstructionHandle, Error> {
        self.check_targets(&instruction)?;
        Ok(self.link(instruction, self.tail, None))
    }

    /// Insert an instruction right before `at`
    pub fn insert_before(
        &mut self,
        at: InstructionHandle,
        instruction: Instruction,
    ) -> Result<InstructionHandle, Error> {
        let prev = self.node(at).ok_or(Error::StaleHandle(at))?.prev;
        self.check_targets(&instruction)?;
        Ok(self.link(instruction, prev, Some(at.index)))
    }

    /// Insert an instruction right after `at`
    pub fn insert_after(
        &mut self,
        at: InstructionHandle,
        instruction: Instruction,
    ) -> Result<InstructionHandle, Error> {
        let next = self.node(at).ok_or(Error::StaleHandle(at))?.next;
        self.check_targets(&instruction)?;
        Ok(self.link(instruction, Some(at.index), next))
    }

    /// Remove an instruction, returning it
    ///
    /// Fails with `TargetLost` (leaving the list untouched) if other live instructions still
    /// branch to it. Use `redirect_branches` first to move those branches elsewhere. A branch
    /// targeting itself does not prevent its own removal.
    pub fn remove(&mut self, handle: InstructionHandle) -> Result<Instruction, Error> {
        if !self.contains(handle) {
            return Err(Error::StaleHandle(handle));
        }
        let targeters: Vec<InstructionHandle> = self
            .targeters(handle)
            .into_iter()
            .filter(|targeter| *targeter != handle)
            .collect();
        if !targeters.is_empty() {
            return Err(Error::TargetLost(targeters));
        }

        self.invalidate_layout();
        let entry = &mut self.entries[handle.index as usize];
        let node = match entry.node.take() {
            Some(node) => node,
            None => return Err(Error::StaleHandle(handle)),
        };
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;

        match node.prev {
            Some(prev) => self.node_at_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_at_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        Ok(node.instruction)
    }

    /// Swap out the instruction behind a handle, returning the old one
    ///
    /// The handle keeps referring to the same position, so branches to it are unaffected.
    pub fn replace(
        &mut self,
        handle: InstructionHandle,
        instruction: Instruction,
    ) -> Result<Instruction, Error> {
        if !self.contains(handle) {
            return Err(Error::StaleHandle(handle));
        }
        self.check_targets(&instruction)?;
        self.invalidate_layout();
        let node = self.node_at_mut(handle.index);
        Ok(std::mem::replace(&mut node.instruction, instruction))
    }

    /// Point a branch at a new target
    ///
    /// For switches, this changes the default target. Returns `false` if the instruction is not
    /// a branch (in which case nothing changes).
    pub fn set_target(
        &mut self,
        branch: InstructionHandle,
        target: InstructionHandle,
    ) -> Result<bool, Error> {
        if !self.contains(branch) {
            return Err(Error::StaleHandle(branch));
        }
        if !self.contains(target) {
            return Err(Error::StaleHandle(target));
        }
        self.invalidate_layout();
        let node = self.node_at_mut(branch.index);
        match node.instruction.targets_mut().into_iter().next() {
            Some(first) => {
                *first = target;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rewrite every branch to `old` so that it goes to `new` instead
    ///
    /// Returns how many jump targets were rewritten. `old` need not be live anymore.
    pub fn redirect_branches(
        &mut self,
        old: InstructionHandle,
        new: InstructionHandle,
    ) -> Result<usize, Error> {
        if !self.contains(new) {
            return Err(Error::StaleHandle(new));
        }
        let mut rewritten = 0;
        for entry in &mut self.entries {
            if let Some(node) = &mut entry.node {
                for target in node.instruction.targets_mut() {
                    if *target == old {
                        *target = new;
                        rewritten += 1;
                    }
                }
            }
        }
        if rewritten > 0 {
            self.invalidate_layout();
        }
        Ok(rewritten)
    }

    /// Live instructions with `handle` among their jump targets, in list order
    pub fn targeters(&self, handle: InstructionHandle) -> Vec<InstructionHandle> {
        self.iter()
            .filter(|(_, instruction)| instruction.targets().contains(&handle))
            .map(|(targeter, _)| targeter)
            .collect()
    }

    /// Handle of the first instruction equal to `instruction`
    pub fn find_handle(&self, instruction: &Instruction) -> Option<InstructionHandle> {
        self.iter()
            .find(|(_, candidate)| *candidate == instruction)
            .map(|(handle, _)| handle)
    }

    /// Offset of an instruction in the encoded code array
    pub fn offset_of(&self, handle: InstructionHandle) -> Option<Offset> {
        self.layout().offset_of(handle)
    }

    /// Instruction starting at an offset of the encoded code array
    pub fn handle_at_offset(&self, offset: Offset) -> Option<InstructionHandle> {
        self.layout().handle_at(offset)
    }

    /// Length of the encoded code array
    pub fn code_length(&self) -> Offset {
        self.layout().code_length()
    }

    /// Encode into a code array
    ///
    /// Fails with `BranchOutOfRange` if a conditional branch cannot reach its target, or with
    /// `MethodCodeOverflow` if the code array would exceed 65535 bytes.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.layout().encode(self)
    }

    /// Human readable listing, one instruction per line, with branch targets as offsets
    pub fn render(&self, pool: &ConstantPool) -> String {
        let layout = self.layout();
        let mut out = String::new();
        for (handle, instruction) in self.iter() {
            let offset = layout.offset_of(handle).map_or(0, |offset| offset.0);
            let rendered = instruction.display_with(pool, |target| {
                layout
                    .offset_of(target)
                    .map_or_else(|| target.to_string(), |offset| offset.0.to_string())
            });
            let _ = writeln!(out, "{:>5}: {}", offset, rendered);
        }
        out
    }

    /// Append without checking targets (which are patched afterwards by the decoder)
    pub(crate) fn push_unchecked(&mut self, instruction: Instruction) -> InstructionHandle {
        self.link(instruction, self.tail, None)
    }

    /// Mutable access to an instruction, for patching decoded targets
    pub(crate) fn get_mut(&mut self, handle: InstructionHandle) -> Option<&mut Instruction> {
        self.invalidate_layout();
        let entry = self.entries.get_mut(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        entry.node.as_mut().map(|node| &mut node.instruction)
    }

    fn layout(&self) -> Rc<Layout> {
        let mut cached = self.layout.borrow_mut();
        match &*cached {
            Some(layout) => Rc::clone(layout),
            None => {
                let layout = Rc::new(Layout::compute(self));
                *cached = Some(Rc::clone(&layout));
                layout
            }
        }
    }

    fn invalidate_layout(&mut self) {
        *self.layout.get_mut() = None;
    }

    fn check_targets(&self, instruction: &Instruction) -> Result<(), Error> {
        for target in instruction.targets() {
            if !self.contains(target) {
                return Err(Error::StaleHandle(target));
            }
        }
        Ok(())
    }

    /// Allocate a node and splice it between `prev` and `next`
    fn link(
        &mut self,
        instruction: Instruction,
        prev: Option<u32>,
        next: Option<u32>,
    ) -> InstructionHandle {
        self.invalidate_layout();
        let node = Node {
            instruction,
            prev,
            next,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize].node = Some(node);
                index
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    node: Some(node),
                });
                (self.entries.len() - 1) as u32
            }
        };
        self.len += 1;

        match prev {
            Some(prev) => self.node_at_mut(prev).next = Some(index),
            None => self.head = Some(index),
        }
        match next {
            Some(next) => self.node_at_mut(next).prev = Some(index),
            None => self.tail = Some(index),
        }

        self.handle_of(index)
    }

    fn node(&self, handle: InstructionHandle) -> Option<&Node> {
        let entry = self.entries.get(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        entry.node.as_ref()
    }

    /// Node at an index known to be live (linked from another live node or the list ends)
    fn node_at_mut(&mut self, index: u32) -> &mut Node {
        match &mut self.entries[index as usize].node {
            Some(node) => node,
            None => unreachable!("linked instruction slot {} is free", index),
        }
    }

    fn handle_of(&self, index: u32) -> InstructionHandle {
        InstructionHandle {
            index,
            generation: self.entries[index as usize].generation,
        }
    }
}

/// Iterator over the instructions of an `InstructionList`, in order
pub struct Iter<'a> {
    list: &'a InstructionList,
    cursor: Option<u32>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (InstructionHandle, &'a Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.list.entries[index as usize].node.as_ref()?;
        self.cursor = node.next;
        Some((self.list.handle_of(index), &node.instruction))
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = (InstructionHandle, &'a Instruction);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::OrdComparison;

    fn handles(list: &InstructionList) -> Vec<InstructionHandle> {
        list.iter().map(|(handle, _)| handle).collect()
    }

    #[test]
    fn handles_survive_insertion() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::IConst0).unwrap();
        let ret = list.append(Instruction::IReturn).unwrap();
        assert_eq!(list.offset_of(ret), Some(Offset(1)));

        let pushed = list.insert_before(ret, Instruction::IConst1).unwrap();
        let popped = list.insert_after(pushed, Instruction::Pop).unwrap();
        assert_eq!(handles(&list), vec![first, pushed, popped, ret]);
        assert_eq!(list.get(ret), Some(&Instruction::IReturn));
        assert_eq!(list.offset_of(ret), Some(Offset(3)));
        assert_eq!(list.handle_at_offset(Offset(2)), Some(popped));
        assert_eq!(list.next(first), Some(pushed));
        assert_eq!(list.prev(first), None);
        assert_eq!(list.last(), Some(ret));
    }

    #[test]
    fn branch_offsets_follow_edits() {
        let mut list = InstructionList::new();
        let start = list.append(Instruction::ILoad(0)).unwrap();
        let end = list.append(Instruction::Return).unwrap();
        let branch = list
            .insert_after(start, Instruction::If(OrdComparison::EQ, end))
            .unwrap();
        assert_eq!(list.encode().unwrap(), vec![0x1a, 0x99, 0x00, 0x03, 0xb1]);

        list.insert_after(branch, Instruction::Nop).unwrap();
        assert_eq!(
            list.encode().unwrap(),
            vec![0x1a, 0x99, 0x00, 0x04, 0x00, 0xb1]
        );
    }

    #[test]
    fn removing_a_target_fails_and_changes_nothing() {
        let mut list = InstructionList::new();
        let target = list.append(Instruction::Nop).unwrap();
        let goto = list.append(Instruction::Goto(target)).unwrap();

        match list.remove(target) {
            Err(Error::TargetLost(targeters)) => assert_eq!(targeters, vec![goto]),
            other => panic!("expected TargetLost, got {:?}", other),
        }
        assert_eq!(handles(&list), vec![target, goto]);

        let ret = list.append(Instruction::Return).unwrap();
        assert_eq!(list.redirect_branches(target, ret).unwrap(), 1);
        assert_eq!(list.remove(target).unwrap(), Instruction::Nop);
        assert_eq!(list.get(goto), Some(&Instruction::Goto(ret)));
        assert_eq!(list.targeters(ret), vec![goto]);
    }

    #[test]
    fn self_loop_can_be_removed() {
        let mut list = InstructionList::new();
        let nop = list.append(Instruction::Nop).unwrap();
        let spin = list.insert_after(nop, Instruction::Goto(nop)).unwrap();
        list.set_target(spin, spin).unwrap();
        assert_eq!(list.remove(spin).unwrap(), Instruction::Goto(spin));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut list = InstructionList::new();
        let removed = list.append(Instruction::Nop).unwrap();
        list.remove(removed).unwrap();

        // The slot gets reused, but the old handle stays dead
        let reused = list.append(Instruction::Nop).unwrap();
        assert_ne!(reused, removed);
        assert!(!list.contains(removed));
        assert_eq!(list.get(removed), None);

        assert!(matches!(
            list.append(Instruction::Goto(removed)),
            Err(Error::StaleHandle(h)) if h == removed
        ));
        assert!(matches!(
            list.insert_before(removed, Instruction::Nop),
            Err(Error::StaleHandle(_))
        ));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn find_and_replace() {
        let mut list = InstructionList::new();
        list.append(Instruction::IConst0).unwrap();
        let ret = list.append(Instruction::IReturn).unwrap();
        assert_eq!(list.find_handle(&Instruction::IReturn), Some(ret));
        assert_eq!(list.find_handle(&Instruction::LReturn), None);

        assert_eq!(
            list.replace(ret, Instruction::Return).unwrap(),
            Instruction::IReturn
        );
        assert_eq!(list.find_handle(&Instruction::Return), Some(ret));
        assert!(!list.set_target(ret, ret).unwrap());
    }
}
