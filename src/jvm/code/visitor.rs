//! Double dispatch over instructions
//!
//! Instructions belong to families (eg. `dstore` is a local variable instruction, and more
//! specifically a store). `Instruction::accept` calls the hooks of every family the instruction
//! belongs to, always going from the more general family to the more specific one, and finally
//! calls `visit_opcode`. All hooks do nothing by default, so a visitor only overrides what it
//! cares about.
//!
//! The order in which hooks fire is:
//!
//!   1. `visit_exception_thrower`
//!   2. `visit_stack_consumer`
//!   3. `visit_stack_producer`
//!   4. `visit_unconditional_branch`
//!   5. `visit_constant_pool_instruction`
//!   6. one structural family, followed by its sub-family where there is one
//!      (eg. `visit_local_variable_instruction` then `visit_store_instruction`, or
//!      `visit_branch_instruction` then `visit_if_instruction`)
//!   7. `visit_opcode`
//!
//! The reserved opcodes (`breakpoint`, `impdep1`, `impdep2`) are in no family.

use crate::jvm::code::{Instruction, Opcode};

#[allow(unused_variables)]
pub trait InstructionVisitor {
    /// Instructions that may throw an exception at runtime
    fn visit_exception_thrower(&mut self, instruction: &Instruction) {}

    /// Instructions that pop at least one value off the operand stack
    fn visit_stack_consumer(&mut self, instruction: &Instruction) {}

    /// Instructions that push at least one value onto the operand stack
    fn visit_stack_producer(&mut self, instruction: &Instruction) {}

    /// Instructions after which control never falls through to the next instruction
    fn visit_unconditional_branch(&mut self, instruction: &Instruction) {}

    /// Instructions with a constant pool operand
    fn visit_constant_pool_instruction(&mut self, instruction: &Instruction) {}

    /// Loads, stores, `iinc`, and `ret`
    fn visit_local_variable_instruction(&mut self, instruction: &Instruction) {}
    fn visit_load_instruction(&mut self, instruction: &Instruction) {}
    fn visit_store_instruction(&mut self, instruction: &Instruction) {}

    /// Instructions with jump targets
    fn visit_branch_instruction(&mut self, instruction: &Instruction) {}
    fn visit_if_instruction(&mut self, instruction: &Instruction) {}
    fn visit_goto_instruction(&mut self, instruction: &Instruction) {}
    fn visit_jsr_instruction(&mut self, instruction: &Instruction) {}
    fn visit_select(&mut self, instruction: &Instruction) {}

    fn visit_return_instruction(&mut self, instruction: &Instruction) {}

    /// Field access and method invocation
    fn visit_field_or_method(&mut self, instruction: &Instruction) {}
    fn visit_field_instruction(&mut self, instruction: &Instruction) {}
    fn visit_invoke_instruction(&mut self, instruction: &Instruction) {}

    fn visit_arithmetic_instruction(&mut self, instruction: &Instruction) {}
    fn visit_conversion_instruction(&mut self, instruction: &Instruction) {}

    /// Array element loads and stores
    fn visit_array_instruction(&mut self, instruction: &Instruction) {}

    /// Operand stack shuffles (`pop`, `dup`, `swap`, ...)
    fn visit_stack_instruction(&mut self, instruction: &Instruction) {}

    /// Pushes of a literal encoded in the instruction itself (`iconst_1`, `bipush`, ...)
    fn visit_constant_push_instruction(&mut self, instruction: &Instruction) {}

    /// `new`, `newarray`, `anewarray`, `multianewarray`
    fn visit_allocation_instruction(&mut self, instruction: &Instruction) {}

    /// Type checks and casts (`checkcast`, `instanceof`)
    fn visit_type_check_instruction(&mut self, instruction: &Instruction) {}

    /// `monitorenter` and `monitorexit`
    fn visit_monitor_instruction(&mut self, instruction: &Instruction) {}

    /// Most specific hook, called last for every instruction
    fn visit_opcode(&mut self, opcode: Opcode, instruction: &Instruction) {}
}

/// Structural family of an instruction
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Family {
    Load,
    Store,
    LocalVariable,
    If,
    Goto,
    Jsr,
    Select,
    Return,
    Field,
    Invoke,
    Arithmetic,
    Conversion,
    Array,
    Stack,
    ConstantPush,
    Allocation,
    TypeCheck,
    Monitor,

    /// In no structural family (`nop`, `athrow`)
    Other,

    /// Reserved opcodes, which only get the specific hook
    Reserved,
}

impl Instruction {
    /// Visit the instruction, calling the hooks from the most general to the most specific
    pub fn accept<V: InstructionVisitor + ?Sized>(&self, visitor: &mut V) {
        let family = self.family();
        if family == Family::Reserved {
            visitor.visit_opcode(self.opcode(), self);
            return;
        }

        if self.is_exception_thrower() {
            visitor.visit_exception_thrower(self);
        }
        if self.is_stack_consumer() {
            visitor.visit_stack_consumer(self);
        }
        if self.is_stack_producer() {
            visitor.visit_stack_producer(self);
        }
        if self.is_unconditional_branch() {
            visitor.visit_unconditional_branch(self);
        }
        if self.constant_index().is_some() {
            visitor.visit_constant_pool_instruction(self);
        }

        match family {
            Family::Load => {
                visitor.visit_local_variable_instruction(self);
                visitor.visit_load_instruction(self);
            }
            Family::Store => {
                visitor.visit_local_variable_instruction(self);
                visitor.visit_store_instruction(self);
            }
            Family::LocalVariable => visitor.visit_local_variable_instruction(self),
            Family::If => {
                visitor.visit_branch_instruction(self);
                visitor.visit_if_instruction(self);
            }
            Family::Goto => {
                visitor.visit_branch_instruction(self);
                visitor.visit_goto_instruction(self);
            }
            Family::Jsr => {
                visitor.visit_branch_instruction(self);
                visitor.visit_jsr_instruction(self);
            }
            Family::Select => {
                visitor.visit_branch_instruction(self);
                visitor.visit_select(self);
            }
            Family::Return => visitor.visit_return_instruction(self),
            Family::Field => {
                visitor.visit_field_or_method(self);
                visitor.visit_field_instruction(self);
            }
            Family::Invoke => {
                visitor.visit_field_or_method(self);
                visitor.visit_invoke_instruction(self);
            }
            Family::Arithmetic => visitor.visit_arithmetic_instruction(self),
            Family::Conversion => visitor.visit_conversion_instruction(self),
            Family::Array => visitor.visit_array_instruction(self),
            Family::Stack => visitor.visit_stack_instruction(self),
            Family::ConstantPush => visitor.visit_constant_push_instruction(self),
            Family::Allocation => visitor.visit_allocation_instruction(self),
            Family::TypeCheck => visitor.visit_type_check_instruction(self),
            Family::Monitor => visitor.visit_monitor_instruction(self),
            Family::Other | Family::Reserved => (),
        }

        visitor.visit_opcode(self.opcode(), self);
    }

    fn family(&self) -> Family {
        use Instruction::*;
        match self {
            ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) => Family::Load,
            IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) => Family::Store,
            IInc(_, _) | Ret(_) => Family::LocalVariable,
            If(_, _) | IfICmp(_, _) | IfACmp(_, _) | IfNull(_, _) => Family::If,
            Goto(_) | GotoW(_) => Family::Goto,
            Jsr(_) | JsrW(_) => Family::Jsr,
            TableSwitch { .. } | LookupSwitch { .. } => Family::Select,
            IReturn | LReturn | FReturn | DReturn | AReturn | Return => Family::Return,
            GetStatic(_) | PutStatic(_) | GetField(_) | PutField(_) => Family::Field,
            Invoke(_, _) | InvokeDynamic(_) => Family::Invoke,
            IAdd | LAdd | FAdd | DAdd | ISub | LSub | FSub | DSub | IMul | LMul | FMul | DMul
            | IDiv | LDiv | FDiv | DDiv | IRem | LRem | FRem | DRem | INeg | LNeg | FNeg
            | DNeg | ISh(_) | LSh(_) | IAnd | LAnd | IOr | LOr | IXor | LXor | LCmp | FCmp(_)
            | DCmp(_) => Family::Arithmetic,
            I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D | D2I | D2L | D2F | I2B | I2C
            | I2S => Family::Conversion,
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad | IAStore
            | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore
            | ArrayLength => Family::Array,
            Pop | Pop2 | Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap => Family::Stack,
            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | LConst0 | LConst1 | FConst0 | FConst1 | FConst2 | DConst0 | DConst1 | BiPush(_)
            | SiPush(_) | Ldc(_) | Ldc2W(_) => Family::ConstantPush,
            New(_) | NewArray(_) | ANewArray(_) | MultiANewArray(_, _) => Family::Allocation,
            CheckCast(_) | InstanceOf(_) => Family::TypeCheck,
            MonitorEnter | MonitorExit => Family::Monitor,
            AThrow | Nop => Family::Other,
            Breakpoint | Impdep1 | Impdep2 => Family::Reserved,
        }
    }

    fn is_exception_thrower(&self) -> bool {
        use Instruction::*;
        matches!(
            self,
            IALoad
                | LALoad
                | FALoad
                | DALoad
                | AALoad
                | BALoad
                | CALoad
                | SALoad
                | IAStore
                | LAStore
                | FAStore
                | DAStore
                | AAStore
                | BAStore
                | CAStore
                | SAStore
                | IDiv
                | LDiv
                | IRem
                | LRem
                | Ldc(_)
                | GetStatic(_)
                | PutStatic(_)
                | GetField(_)
                | PutField(_)
                | Invoke(_, _)
                | InvokeDynamic(_)
                | New(_)
                | NewArray(_)
                | ANewArray(_)
                | MultiANewArray(_, _)
                | ArrayLength
                | AThrow
                | CheckCast(_)
                | InstanceOf(_)
                | MonitorEnter
                | MonitorExit
                | IReturn
                | LReturn
                | FReturn
                | DReturn
                | AReturn
                | Return
        )
    }

    fn is_stack_consumer(&self) -> bool {
        use Instruction::*;
        match self {
            Invoke(_, _) | InvokeDynamic(_) => true,
            IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) => true,
            If(_, _) | IfICmp(_, _) | IfACmp(_, _) | IfNull(_, _) => true,
            TableSwitch { .. } | LookupSwitch { .. } => true,
            IReturn | LReturn | FReturn | DReturn | AReturn | AThrow => true,
            PutStatic(_) | PutField(_) | GetField(_) => true,
            NewArray(_) | ANewArray(_) | MultiANewArray(_, _) => true,
            CheckCast(_) | InstanceOf(_) | MonitorEnter | MonitorExit => true,
            Pop | Pop2 | Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap => true,
            _ => matches!(
                self.family(),
                Family::Arithmetic | Family::Conversion | Family::Array
            ),
        }
    }

    fn is_stack_producer(&self) -> bool {
        use Instruction::*;
        match self {
            Invoke(_, _) | InvokeDynamic(_) => true,
            Jsr(_) | JsrW(_) => true,
            GetStatic(_) | GetField(_) => true,
            New(_) | NewArray(_) | ANewArray(_) | MultiANewArray(_, _) => true,
            CheckCast(_) | InstanceOf(_) => true,
            Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap => true,
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad
            | ArrayLength => true,
            _ => matches!(
                self.family(),
                Family::Load | Family::ConstantPush | Family::Arithmetic | Family::Conversion
            ),
        }
    }

    fn is_unconditional_branch(&self) -> bool {
        use Instruction::*;
        matches!(
            self,
            Goto(_)
                | GotoW(_)
                | Ret(_)
                | AThrow
                | IReturn
                | LReturn
                | FReturn
                | DReturn
                | AReturn
                | Return
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantIndex;

    /// Records the order in which hooks fire
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl InstructionVisitor for Trace {
        fn visit_stack_consumer(&mut self, _: &Instruction) {
            self.0.push(String::from("stack_consumer"));
        }
        fn visit_local_variable_instruction(&mut self, _: &Instruction) {
            self.0.push(String::from("local_variable"));
        }
        fn visit_store_instruction(&mut self, _: &Instruction) {
            self.0.push(String::from("store"));
        }
        fn visit_constant_pool_instruction(&mut self, _: &Instruction) {
            self.0.push(String::from("constant_pool"));
        }
        fn visit_constant_push_instruction(&mut self, _: &Instruction) {
            self.0.push(String::from("constant_push"));
        }
        fn visit_opcode(&mut self, opcode: Opcode, _: &Instruction) {
            self.0.push(opcode.mnemonic().to_string());
        }
    }

    /// Counts general families separately from the specific `dstore` opcode
    #[derive(Default)]
    struct StoreCounter {
        stores: usize,
        dstores: usize,
        dstores_seen_before_store: usize,
    }

    impl InstructionVisitor for StoreCounter {
        fn visit_store_instruction(&mut self, _: &Instruction) {
            self.stores += 1;
        }
        fn visit_opcode(&mut self, opcode: Opcode, _: &Instruction) {
            if opcode == Opcode::DStore {
                if self.stores == self.dstores {
                    self.dstores_seen_before_store += 1;
                }
                self.dstores += 1;
            }
        }
    }

    #[test]
    fn general_hooks_fire_before_specific() {
        let mut trace = Trace::default();
        Instruction::DStore(4).accept(&mut trace);
        assert_eq!(
            trace.0,
            vec!["stack_consumer", "local_variable", "store", "dstore"]
        );

        let mut trace = Trace::default();
        Instruction::Ldc(ConstantIndex(3)).accept(&mut trace);
        assert_eq!(trace.0, vec!["constant_pool", "constant_push", "ldc"]);
    }

    #[test]
    fn counting_visitor_sees_one_of_each() {
        let mut counter = StoreCounter::default();
        Instruction::DStore(1).accept(&mut counter);
        assert_eq!(counter.stores, 1);
        assert_eq!(counter.dstores, 1);
        assert_eq!(counter.dstores_seen_before_store, 0);

        Instruction::IStore(2).accept(&mut counter);
        assert_eq!(counter.stores, 2);
        assert_eq!(counter.dstores, 1);
    }

    #[test]
    fn reserved_opcodes_only_get_the_specific_hook() {
        for insn in [Instruction::Impdep2, Instruction::Impdep1, Instruction::Breakpoint] {
            let mut trace = Trace::default();
            insn.accept(&mut trace);
            assert_eq!(trace.0, vec![insn.opcode().mnemonic()]);
        }
    }
}
