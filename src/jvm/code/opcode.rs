use std::fmt;

macro_rules! opcodes {
    ($($name:ident => $mnemonic:literal,)*) => {
        /// Opcode of an instruction, as named in the JVM instruction set
        ///
        /// Encoding variants are folded into the opcode they abbreviate: `iload_0` is `ILoad`,
        /// `ldc_w` is `Ldc`, and the `wide` prefix never shows up as an opcode of its own.
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            /// Every opcode, in the order the JVM specification assigns them bytes
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            /// Lower case mnemonic (eg. `iload`)
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    Nop => "nop",
    AConstNull => "aconst_null",
    IConstM1 => "iconst_m1",
    IConst0 => "iconst_0",
    IConst1 => "iconst_1",
    IConst2 => "iconst_2",
    IConst3 => "iconst_3",
    IConst4 => "iconst_4",
    IConst5 => "iconst_5",
    LConst0 => "lconst_0",
    LConst1 => "lconst_1",
    FConst0 => "fconst_0",
    FConst1 => "fconst_1",
    FConst2 => "fconst_2",
    DConst0 => "dconst_0",
    DConst1 => "dconst_1",
    BiPush => "bipush",
    SiPush => "sipush",
    Ldc => "ldc",
    Ldc2W => "ldc2_w",
    ILoad => "iload",
    LLoad => "lload",
    FLoad => "fload",
    DLoad => "dload",
    ALoad => "aload",
    IALoad => "iaload",
    LALoad => "laload",
    FALoad => "faload",
    DALoad => "daload",
    AALoad => "aaload",
    BALoad => "baload",
    CALoad => "caload",
    SALoad => "saload",
    IStore => "istore",
    LStore => "lstore",
    FStore => "fstore",
    DStore => "dstore",
    AStore => "astore",
    IAStore => "iastore",
    LAStore => "lastore",
    FAStore => "fastore",
    DAStore => "dastore",
    AAStore => "aastore",
    BAStore => "bastore",
    CAStore => "castore",
    SAStore => "sastore",
    Pop => "pop",
    Pop2 => "pop2",
    Dup => "dup",
    DupX1 => "dup_x1",
    DupX2 => "dup_x2",
    Dup2 => "dup2",
    Dup2X1 => "dup2_x1",
    Dup2X2 => "dup2_x2",
    Swap => "swap",
    IAdd => "iadd",
    LAdd => "ladd",
    FAdd => "fadd",
    DAdd => "dadd",
    ISub => "isub",
    LSub => "lsub",
    FSub => "fsub",
    DSub => "dsub",
    IMul => "imul",
    LMul => "lmul",
    FMul => "fmul",
    DMul => "dmul",
    IDiv => "idiv",
    LDiv => "ldiv",
    FDiv => "fdiv",
    DDiv => "ddiv",
    IRem => "irem",
    LRem => "lrem",
    FRem => "frem",
    DRem => "drem",
    INeg => "ineg",
    LNeg => "lneg",
    FNeg => "fneg",
    DNeg => "dneg",
    IShl => "ishl",
    LShl => "lshl",
    IShr => "ishr",
    LShr => "lshr",
    IUShr => "iushr",
    LUShr => "lushr",
    IAnd => "iand",
    LAnd => "land",
    IOr => "ior",
    LOr => "lor",
    IXor => "ixor",
    LXor => "lxor",
    IInc => "iinc",
    I2L => "i2l",
    I2F => "i2f",
    I2D => "i2d",
    L2I => "l2i",
    L2F => "l2f",
    L2D => "l2d",
    F2I => "f2i",
    F2L => "f2l",
    F2D => "f2d",
    D2I => "d2i",
    D2L => "d2l",
    D2F => "d2f",
    I2B => "i2b",
    I2C => "i2c",
    I2S => "i2s",
    LCmp => "lcmp",
    FCmpL => "fcmpl",
    FCmpG => "fcmpg",
    DCmpL => "dcmpl",
    DCmpG => "dcmpg",
    IfEq => "ifeq",
    IfNe => "ifne",
    IfLt => "iflt",
    IfGe => "ifge",
    IfGt => "ifgt",
    IfLe => "ifle",
    IfICmpEq => "if_icmpeq",
    IfICmpNe => "if_icmpne",
    IfICmpLt => "if_icmplt",
    IfICmpGe => "if_icmpge",
    IfICmpGt => "if_icmpgt",
    IfICmpLe => "if_icmple",
    IfACmpEq => "if_acmpeq",
    IfACmpNe => "if_acmpne",
    Goto => "goto",
    Jsr => "jsr",
    Ret => "ret",
    TableSwitch => "tableswitch",
    LookupSwitch => "lookupswitch",
    IReturn => "ireturn",
    LReturn => "lreturn",
    FReturn => "freturn",
    DReturn => "dreturn",
    AReturn => "areturn",
    Return => "return",
    GetStatic => "getstatic",
    PutStatic => "putstatic",
    GetField => "getfield",
    PutField => "putfield",
    InvokeVirtual => "invokevirtual",
    InvokeSpecial => "invokespecial",
    InvokeStatic => "invokestatic",
    InvokeInterface => "invokeinterface",
    InvokeDynamic => "invokedynamic",
    New => "new",
    NewArray => "newarray",
    ANewArray => "anewarray",
    ArrayLength => "arraylength",
    AThrow => "athrow",
    CheckCast => "checkcast",
    InstanceOf => "instanceof",
    MonitorEnter => "monitorenter",
    MonitorExit => "monitorexit",
    MultiANewArray => "multianewarray",
    IfNull => "ifnull",
    IfNonNull => "ifnonnull",
    GotoW => "goto_w",
    JsrW => "jsr_w",
    Breakpoint => "breakpoint",
    Impdep1 => "impdep1",
    Impdep2 => "impdep2",
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
