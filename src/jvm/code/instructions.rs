//! This module contains the AST of JVM bytecode. The representation is slightly different from
//! the usual presentation to make it more convenient to construct and edit bytecode:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify. Likewise, `iload_0` is just `ILoad(0)` and `ldc_w`
//!     is just `Ldc`. The shortest encoding gets picked when the code is laid out.
//!
//!   - Some instructions (like the conditional branches) get abstracted into one instruction with
//!     a field. This helps with repetitive pattern matches.
//!
//!   - Branch targets are `InstructionHandle`s into the owning `InstructionList`, never offsets.
//!
//!   - Constant operands are indices into the constant pool of the enclosing class. They are
//!     only resolved when the instruction is rendered or checked.

use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, InvokeDynamicConstantIndex,
    MethodRefConstantIndex,
};
use crate::jvm::code::{InstructionHandle, Opcode};
use crate::jvm::constant_pool::ConstantPool;
use crate::jvm::BaseType;
use std::fmt::Write;

/// JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantIndex), // covers both `ldc` and `ldc_w`
    Ldc2W(ConstantIndex),
    ILoad(u16), // covers `iload`, `iload_{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore_{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishl`, `ishr`, and `iushr`
    LSh(ShiftType), // covers `lshl`, `lshr`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, InstructionHandle), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, InstructionHandle), // covers `if_icmpeq`, ... `if_icmple`
    IfACmp(EqComparison, InstructionHandle), // covers `if_acmpeq`, `if_acmpne`
    Goto(InstructionHandle), // laid out as `goto_w` when the jump is too far
    Jsr(InstructionHandle),  // laid out as `jsr_w` when the jump is too far
    Ret(u16),
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: InstructionHandle,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<InstructionHandle>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: InstructionHandle,

        /// Jump targets (keys must be ascending)
        targets: Vec<(i32, InstructionHandle)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRefConstantIndex),
    PutStatic(FieldRefConstantIndex),
    GetField(FieldRefConstantIndex),
    PutField(FieldRefConstantIndex),
    Invoke(InvokeType, MethodRefConstantIndex),
    InvokeDynamic(InvokeDynamicConstantIndex),
    New(ClassConstantIndex),
    NewArray(BaseType),
    ANewArray(ClassConstantIndex),
    ArrayLength,
    AThrow,
    CheckCast(ClassConstantIndex),
    InstanceOf(ClassConstantIndex),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(ClassConstantIndex, u8),
    IfNull(EqComparison, InstructionHandle), // covers `ifnull`, `ifnonnull`
    GotoW(InstructionHandle),
    JsrW(InstructionHandle),
    Breakpoint,
    Impdep1,
    Impdep2,
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Constant::MethodRef`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

impl Instruction {
    /// Opcode of the instruction
    pub fn opcode(&self) -> Opcode {
        use Instruction::*;
        match self {
            Nop => Opcode::Nop,
            AConstNull => Opcode::AConstNull,
            IConstM1 => Opcode::IConstM1,
            IConst0 => Opcode::IConst0,
            IConst1 => Opcode::IConst1,
            IConst2 => Opcode::IConst2,
            IConst3 => Opcode::IConst3,
            IConst4 => Opcode::IConst4,
            IConst5 => Opcode::IConst5,
            LConst0 => Opcode::LConst0,
            LConst1 => Opcode::LConst1,
            FConst0 => Opcode::FConst0,
            FConst1 => Opcode::FConst1,
            FConst2 => Opcode::FConst2,
            DConst0 => Opcode::DConst0,
            DConst1 => Opcode::DConst1,
            BiPush(_) => Opcode::BiPush,
            SiPush(_) => Opcode::SiPush,
            Ldc(_) => Opcode::Ldc,
            Ldc2W(_) => Opcode::Ldc2W,
            ILoad(_) => Opcode::ILoad,
            LLoad(_) => Opcode::LLoad,
            FLoad(_) => Opcode::FLoad,
            DLoad(_) => Opcode::DLoad,
            ALoad(_) => Opcode::ALoad,
            IALoad => Opcode::IALoad,
            LALoad => Opcode::LALoad,
            FALoad => Opcode::FALoad,
            DALoad => Opcode::DALoad,
            AALoad => Opcode::AALoad,
            BALoad => Opcode::BALoad,
            CALoad => Opcode::CALoad,
            SALoad => Opcode::SALoad,
            IStore(_) => Opcode::IStore,
            LStore(_) => Opcode::LStore,
            FStore(_) => Opcode::FStore,
            DStore(_) => Opcode::DStore,
            AStore(_) => Opcode::AStore,
            IAStore => Opcode::IAStore,
            LAStore => Opcode::LAStore,
            FAStore => Opcode::FAStore,
            DAStore => Opcode::DAStore,
            AAStore => Opcode::AAStore,
            BAStore => Opcode::BAStore,
            CAStore => Opcode::CAStore,
            SAStore => Opcode::SAStore,
            Pop => Opcode::Pop,
            Pop2 => Opcode::Pop2,
            Dup => Opcode::Dup,
            DupX1 => Opcode::DupX1,
            DupX2 => Opcode::DupX2,
            Dup2 => Opcode::Dup2,
            Dup2X1 => Opcode::Dup2X1,
            Dup2X2 => Opcode::Dup2X2,
            Swap => Opcode::Swap,
            IAdd => Opcode::IAdd,
            LAdd => Opcode::LAdd,
            FAdd => Opcode::FAdd,
            DAdd => Opcode::DAdd,
            ISub => Opcode::ISub,
            LSub => Opcode::LSub,
            FSub => Opcode::FSub,
            DSub => Opcode::DSub,
            IMul => Opcode::IMul,
            LMul => Opcode::LMul,
            FMul => Opcode::FMul,
            DMul => Opcode::DMul,
            IDiv => Opcode::IDiv,
            LDiv => Opcode::LDiv,
            FDiv => Opcode::FDiv,
            DDiv => Opcode::DDiv,
            IRem => Opcode::IRem,
            LRem => Opcode::LRem,
            FRem => Opcode::FRem,
            DRem => Opcode::DRem,
            INeg => Opcode::INeg,
            LNeg => Opcode::LNeg,
            FNeg => Opcode::FNeg,
            DNeg => Opcode::DNeg,
            ISh(ShiftType::Left) => Opcode::IShl,
            ISh(ShiftType::ArithmeticRight) => Opcode::IShr,
            ISh(ShiftType::LogicalRight) => Opcode::IUShr,
            LSh(ShiftType::Left) => Opcode::LShl,
            LSh(ShiftType::ArithmeticRight) => Opcode::LShr,
            LSh(ShiftType::LogicalRight) => Opcode::LUShr,
            IAnd => Opcode::IAnd,
            LAnd => Opcode::LAnd,
            IOr => Opcode::IOr,
            LOr => Opcode::LOr,
            IXor => Opcode::IXor,
            LXor => Opcode::LXor,
            IInc(_, _) => Opcode::IInc,
            I2L => Opcode::I2L,
            I2F => Opcode::I2F,
            I2D => Opcode::I2D,
            L2I => Opcode::L2I,
            L2F => Opcode::L2F,
            L2D => Opcode::L2D,
            F2I => Opcode::F2I,
            F2L => Opcode::F2L,
            F2D => Opcode::F2D,
            D2I => Opcode::D2I,
            D2L => Opcode::D2L,
            D2F => Opcode::D2F,
            I2B => Opcode::I2B,
            I2C => Opcode::I2C,
            I2S => Opcode::I2S,
            LCmp => Opcode::LCmp,
            FCmp(CompareMode::L) => Opcode::FCmpL,
            FCmp(CompareMode::G) => Opcode::FCmpG,
            DCmp(CompareMode::L) => Opcode::DCmpL,
            DCmp(CompareMode::G) => Opcode::DCmpG,
            If(comp, _) => match comp {
                OrdComparison::EQ => Opcode::IfEq,
                OrdComparison::NE => Opcode::IfNe,
                OrdComparison::LT => Opcode::IfLt,
                OrdComparison::GE => Opcode::IfGe,
                OrdComparison::GT => Opcode::IfGt,
                OrdComparison::LE => Opcode::IfLe,
            },
            IfICmp(comp, _) => match comp {
                OrdComparison::EQ => Opcode::IfICmpEq,
                OrdComparison::NE => Opcode::IfICmpNe,
                OrdComparison::LT => Opcode::IfICmpLt,
                OrdComparison::GE => Opcode::IfICmpGe,
                OrdComparison::GT => Opcode::IfICmpGt,
                OrdComparison::LE => Opcode::IfICmpLe,
            },
            IfACmp(EqComparison::EQ, _) => Opcode::IfACmpEq,
            IfACmp(EqComparison::NE, _) => Opcode::IfACmpNe,
            Goto(_) => Opcode::Goto,
            Jsr(_) => Opcode::Jsr,
            Ret(_) => Opcode::Ret,
            TableSwitch { .. } => Opcode::TableSwitch,
            LookupSwitch { .. } => Opcode::LookupSwitch,
            IReturn => Opcode::IReturn,
            LReturn => Opcode::LReturn,
            FReturn => Opcode::FReturn,
            DReturn => Opcode::DReturn,
            AReturn => Opcode::AReturn,
            Return => Opcode::Return,
            GetStatic(_) => Opcode::GetStatic,
            PutStatic(_) => Opcode::PutStatic,
            GetField(_) => Opcode::GetField,
            PutField(_) => Opcode::PutField,
            Invoke(InvokeType::Virtual, _) => Opcode::InvokeVirtual,
            Invoke(InvokeType::Special, _) => Opcode::InvokeSpecial,
            Invoke(InvokeType::Static, _) => Opcode::InvokeStatic,
            Invoke(InvokeType::Interface(_), _) => Opcode::InvokeInterface,
            InvokeDynamic(_) => Opcode::InvokeDynamic,
            New(_) => Opcode::New,
            NewArray(_) => Opcode::NewArray,
            ANewArray(_) => Opcode::ANewArray,
            ArrayLength => Opcode::ArrayLength,
            AThrow => Opcode::AThrow,
            CheckCast(_) => Opcode::CheckCast,
            InstanceOf(_) => Opcode::InstanceOf,
            MonitorEnter => Opcode::MonitorEnter,
            MonitorExit => Opcode::MonitorExit,
            MultiANewArray(_, _) => Opcode::MultiANewArray,
            IfNull(EqComparison::EQ, _) => Opcode::IfNull,
            IfNull(EqComparison::NE, _) => Opcode::IfNonNull,
            GotoW(_) => Opcode::GotoW,
            JsrW(_) => Opcode::JsrW,
            Breakpoint => Opcode::Breakpoint,
            Impdep1 => Opcode::Impdep1,
            Impdep2 => Opcode::Impdep2,
        }
    }

    /// Number of bytes the instruction takes when it starts at `offset`
    ///
    /// The offset only matters for the switches (which are padded to a multiple of four bytes).
    /// `goto` and `jsr` are measured in their narrow form: widening them is up to the layout.
    pub fn length_at(&self, offset: usize) -> usize {
        use Instruction::*;
        match self {
            ILoad(0..=3) | LLoad(0..=3) | FLoad(0..=3) | DLoad(0..=3) | ALoad(0..=3) => 1,
            IStore(0..=3) | LStore(0..=3) | FStore(0..=3) | DStore(0..=3) | AStore(0..=3) => 1,

            BiPush(_)
            | ILoad(4..=255)
            | LLoad(4..=255)
            | FLoad(4..=255)
            | DLoad(4..=255)
            | ALoad(4..=255)
            | IStore(4..=255)
            | LStore(4..=255)
            | FStore(4..=255)
            | DStore(4..=255)
            | AStore(4..=255)
            | Ret(0..=255)
            | Ldc(ConstantIndex(0..=255))
            | NewArray(_) => 2,

            // Wide forms of local variable instructions
            ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) => 4,
            IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) | Ret(_) => 4,

            SiPush(_)
            | Ldc(_)
            | Ldc2W(_)
            | IInc(0..=255, -128..=127)
            | If(_, _)
            | IfICmp(_, _)
            | IfACmp(_, _)
            | IfNull(_, _)
            | Goto(_)
            | Jsr(_)
            | GetStatic(_)
            | PutStatic(_)
            | GetField(_)
            | PutField(_)
            | Invoke(InvokeType::Virtual | InvokeType::Special | InvokeType::Static, _)
            | New(_)
            | ANewArray(_)
            | CheckCast(_)
            | InstanceOf(_) => 3,

            MultiANewArray(_, _) => 4,
            Invoke(InvokeType::Interface(_), _) | InvokeDynamic(_) | GotoW(_) | JsrW(_) => 5,
            IInc(_, _) => 6,

            TableSwitch { targets, .. } => 1 + switch_padding(offset) + 4 * (3 + targets.len()),
            LookupSwitch { targets, .. } => 1 + switch_padding(offset) + 8 * (1 + targets.len()),

            _ => 1,
        }
    }

    /// Jump targets of the instruction (empty for non-branching instructions)
    ///
    /// For switches, the default target comes first.
    pub fn targets(&self) -> Vec<InstructionHandle> {
        use Instruction::*;
        match self {
            If(_, target)
            | IfICmp(_, target)
            | IfACmp(_, target)
            | IfNull(_, target)
            | Goto(target)
            | GotoW(target)
            | Jsr(target)
            | JsrW(target) => vec![*target],
            TableSwitch {
                default, targets, ..
            } => {
                let mut all = vec![*default];
                all.extend(targets.iter().copied());
                all
            }
            LookupSwitch { default, targets } => {
                let mut all = vec![*default];
                all.extend(targets.iter().map(|(_, target)| *target));
                all
            }
            _ => vec![],
        }
    }

    /// Mutable jump targets, in the same order as `targets`
    pub(crate) fn targets_mut(&mut self) -> Vec<&mut InstructionHandle> {
        use Instruction::*;
        match self {
            If(_, target)
            | IfICmp(_, target)
            | IfACmp(_, target)
            | IfNull(_, target)
            | Goto(target)
            | GotoW(target)
            | Jsr(target)
            | JsrW(target) => vec![target],
            TableSwitch {
                default, targets, ..
            } => {
                let mut all = vec![default];
                all.extend(targets.iter_mut());
                all
            }
            LookupSwitch { default, targets } => {
                let mut all = vec![default];
                all.extend(targets.iter_mut().map(|(_, target)| target));
                all
            }
            _ => vec![],
        }
    }

    /// Does this instruction transfer control to a target handle?
    pub fn is_branch(&self) -> bool {
        !self.targets().is_empty()
    }

    /// Constant pool index used by the instruction
    pub fn constant_index(&self) -> Option<ConstantIndex> {
        use Instruction::*;
        match self {
            Ldc(idx) | Ldc2W(idx) => Some(*idx),
            GetStatic(idx) | PutStatic(idx) | GetField(idx) | PutField(idx) => Some(idx.index()),
            Invoke(_, idx) => Some(idx.index()),
            InvokeDynamic(idx) => Some(idx.index()),
            New(idx) | ANewArray(idx) | CheckCast(idx) | InstanceOf(idx) => Some(idx.index()),
            MultiANewArray(idx, _) => Some(idx.index()),
            _ => None,
        }
    }

    /// Local variable index used by the instruction, along with how many slots it covers
    pub fn local_variable(&self) -> Option<(u16, u16)> {
        use Instruction::*;
        match self {
            ILoad(idx) | FLoad(idx) | ALoad(idx) | IStore(idx) | FStore(idx) | AStore(idx) => {
                Some((*idx, 1))
            }
            LLoad(idx) | DLoad(idx) | LStore(idx) | DStore(idx) => Some((*idx, 2)),
            IInc(idx, _) | Ret(idx) => Some((*idx, 1)),
            _ => None,
        }
    }

    /// Render the instruction, resolving constant operands through the pool
    ///
    /// Branch targets are shown as handles. See `InstructionList::render` for a rendering with
    /// offsets instead.
    pub fn display(&self, pool: &ConstantPool) -> String {
        self.display_with(pool, |handle| handle.to_string())
    }

    pub(crate) fn display_with(
        &self,
        pool: &ConstantPool,
        target: impl Fn(InstructionHandle) -> String,
    ) -> String {
        use Instruction::*;
        let mut out = String::from(self.opcode().mnemonic());
        let _ = match self {
            BiPush(b) => write!(out, " {}", b),
            SiPush(s) => write!(out, " {}", s),
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) | IStore(idx)
            | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) | Ret(idx) => {
                write!(out, " {}", idx)
            }
            IInc(idx, by) => write!(out, " {} {}", idx, by),
            NewArray(base_type) => write!(out, " {}", base_type.keyword()),
            MultiANewArray(class, dimensions) => write!(
                out,
                " {} {}",
                pool.display_constant(class.index()),
                dimensions
            ),
            Invoke(InvokeType::Interface(count), method) => write!(
                out,
                " {} {}",
                pool.display_constant(method.index()),
                count
            ),
            TableSwitch {
                default,
                low,
                targets,
            } => {
                for (i, case) in targets.iter().enumerate() {
                    let _ = write!(out, " {}: {}", *low as i64 + i as i64, target(*case));
                }
                write!(out, " default: {}", target(*default))
            }
            LookupSwitch { default, targets } => {
                for (key, case) in targets {
                    let _ = write!(out, " {}: {}", key, target(*case));
                }
                write!(out, " default: {}", target(*default))
            }
            other => {
                if let Some(idx) = other.constant_index() {
                    let _ = write!(out, " {}", pool.display_constant(idx));
                }
                for handle in other.targets() {
                    let _ = write!(out, " {}", target(handle));
                }
                Ok(())
            }
        };
        out
    }
}

/// Number of padding bytes after a switch opcode at `offset`, so that the operands start at a
/// multiple of four from the start of the code
pub fn switch_padding(offset: usize) -> usize {
    3 - (offset % 4)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lengths_depend_on_operands() {
        assert_eq!(Instruction::ILoad(3).length_at(0), 1);
        assert_eq!(Instruction::ILoad(4).length_at(0), 2);
        assert_eq!(Instruction::ILoad(256).length_at(0), 4);
        assert_eq!(Instruction::IInc(1, 1).length_at(0), 3);
        assert_eq!(Instruction::IInc(1, 200).length_at(0), 6);
        assert_eq!(Instruction::Ldc(ConstantIndex(255)).length_at(0), 2);
        assert_eq!(Instruction::Ldc(ConstantIndex(256)).length_at(0), 3);
        assert_eq!(Instruction::Impdep2.length_at(0), 1);
    }

    #[test]
    fn switch_padding_aligns_operands() {
        assert_eq!(switch_padding(0), 3);
        assert_eq!(switch_padding(1), 2);
        assert_eq!(switch_padding(3), 0);
        assert_eq!(switch_padding(4), 3);
    }

    #[test]
    fn render_resolves_constants() {
        let mut pool = ConstantPool::new();
        let method = pool
            .add_method_ref("java/io/PrintStream", "println", "(I)V")
            .unwrap();
        let insn = Instruction::Invoke(InvokeType::Virtual, method);
        assert_eq!(
            insn.display(&pool),
            "invokevirtual java/io/PrintStream.println:(I)V"
        );
        assert_eq!(Instruction::ISh(ShiftType::LogicalRight).display(&pool), "iushr");
        assert_eq!(Instruction::NewArray(BaseType::Int).display(&pool), "newarray int");
    }
}
