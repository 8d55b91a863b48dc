use classgen::jvm::annotations::{AnnotationEntry, ElementValue};
use classgen::jvm::class_file::{ClassFile, Code, Version};
use classgen::jvm::code::{
    decode, Instruction, InstructionVisitor, InvokeType, Opcode, OrdComparison,
};
use classgen::jvm::constant_pool::ConstantPool;
use classgen::jvm::model::{ClassBuilder, FieldBuilder, MethodBuilder};
use classgen::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `sum(n)` adds up `n + (n - 1) + ... + 1` with a loop
fn sum_method() -> MethodBuilder {
    let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
    let mut method = MethodBuilder::new(flags, "sum", "(I)I", "demo/Counter").unwrap();
    let code = &mut method.instructions;
    code.append(Instruction::IConst0).unwrap();
    code.append(Instruction::IStore(1)).unwrap();
    let head = code.append(Instruction::ILoad(0)).unwrap();
    code.append(Instruction::ILoad(1)).unwrap();
    code.append(Instruction::ILoad(0)).unwrap();
    code.append(Instruction::IAdd).unwrap();
    code.append(Instruction::IStore(1)).unwrap();
    let decrement = code.append(Instruction::IInc(0, -1)).unwrap();
    let done = code.append(Instruction::ILoad(1)).unwrap();
    code.append(Instruction::IReturn).unwrap();
    code.insert_after(head, Instruction::If(OrdComparison::EQ, done))
        .unwrap();
    code.insert_after(decrement, Instruction::Goto(head)).unwrap();

    method.max_stack = 2;
    method.compute_max_locals();
    method
}

fn counter_class() -> ClassFile {
    let mut class = ClassBuilder::new(
        Version::JAVA8,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        "demo/Counter",
        Some("java/lang/Object"),
        &[],
    )
    .unwrap();

    let mut seed = FieldBuilder::new(
        FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        "SEED",
        "J",
    )
    .unwrap();
    let seed_value = class.constants_pool.add_long(42).unwrap();
    seed.set_initial_value(&class.constants_pool, seed_value)
        .unwrap();
    class.add_field(&seed).unwrap();

    let mut sum = sum_method();
    let mut annotation =
        AnnotationEntry::new(&mut class.constants_pool, "Ldemo/Pure;", true).unwrap();
    let limit = ElementValue::int(&mut class.constants_pool, 1000).unwrap();
    annotation
        .add_element(&mut class.constants_pool, "limit", limit)
        .unwrap();
    sum.add_annotation(annotation);
    class.add_method(&sum).unwrap();

    let pool = &mut class.constants_pool;
    let out = pool
        .add_field_ref("java/lang/System", "out", "Ljava/io/PrintStream;")
        .unwrap();
    let println = pool
        .add_method_ref("java/io/PrintStream", "println", "(I)V")
        .unwrap();
    let sum_ref = pool.add_method_ref("demo/Counter", "sum", "(I)I").unwrap();
    let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
    let mut main = MethodBuilder::new(flags, "main", "([Ljava/lang/String;)V", "demo/Counter")
        .unwrap();
    for instruction in vec![
        Instruction::GetStatic(out),
        Instruction::BiPush(10),
        Instruction::Invoke(InvokeType::Static, sum_ref),
        Instruction::Invoke(InvokeType::Virtual, println),
        Instruction::Return,
    ] {
        main.instructions.append(instruction).unwrap();
    }
    main.max_stack = 2;
    main.compute_max_locals();
    class.add_method(&main).unwrap();

    class.build().unwrap()
}

fn code_of(class: &ClassFile, method: usize) -> Code {
    let pool = ConstantPool::from_constants(class.constants.clone()).unwrap();
    pool.find_attribute(&class.methods[method].attributes)
        .unwrap()
        .unwrap()
}

#[test]
fn parse_what_was_written() {
    init_logging();
    let class = counter_class();
    let bytes = class.to_bytes().unwrap();
    assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);

    let parsed = ClassFile::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, class);
    assert_eq!(parsed.class_name().unwrap(), "demo/Counter");
}

#[test]
fn untouched_rebuild_is_identical() {
    init_logging();
    let class = counter_class();
    let bytes = class.to_bytes().unwrap();

    let mut wrapped = ClassBuilder::from_class_file(ClassFile::from_bytes(&bytes).unwrap()).unwrap();
    for (name, descriptor) in [("sum", "(I)I"), ("main", "([Ljava/lang/String;)V")] {
        let method = wrapped.method(name, descriptor).unwrap();
        wrapped.replace_method(name, descriptor, &method).unwrap();
    }
    let field = wrapped.field("SEED", "J").unwrap();
    wrapped.replace_field("SEED", "J", &field).unwrap();

    let rebuilt = wrapped.build().unwrap();
    assert_eq!(code_of(&rebuilt, 0).code_array, code_of(&class, 0).code_array);
    assert_eq!(rebuilt.to_bytes().unwrap(), bytes);
}

#[test]
fn wrapped_method_keeps_its_shape() {
    init_logging();
    let class = ClassBuilder::from_class_file(counter_class()).unwrap();
    let sum = class.method("sum", "(I)I").unwrap();

    assert_eq!(sum.max_locals, 2);
    assert_eq!(sum.max_stack, 2);
    assert_eq!(sum.annotations().len(), 1);
    assert_eq!(
        sum.annotations()[0].display(&class.constants_pool),
        "@Ldemo/Pure;(limit=1000)"
    );

    let listing = sum.instructions.render(&class.constants_pool);
    let expected = [
        "    0: iconst_0",
        "    1: istore 1",
        "    2: iload 0",
        "    3: ifeq 16",
        "    6: iload 1",
        "    7: iload 0",
        "    8: iadd",
        "    9: istore 1",
        "   10: iinc 0 -1",
        "   13: goto 2",
        "   16: iload 1",
        "   17: ireturn",
    ];
    assert_eq!(listing.lines().collect::<Vec<_>>(), expected);
}

#[derive(Default)]
struct StoreCounter {
    events: Vec<&'static str>,
}

impl InstructionVisitor for StoreCounter {
    fn visit_store_instruction(&mut self, _: &Instruction) {
        self.events.push("store");
    }

    fn visit_opcode(&mut self, opcode: Opcode, _: &Instruction) {
        if opcode == Opcode::IStore {
            self.events.push("istore");
        }
    }
}

#[test]
fn visitor_sees_general_before_specific() {
    let sum = sum_method();
    let mut counter = StoreCounter::default();
    for (_, instruction) in &sum.instructions {
        instruction.accept(&mut counter);
    }
    assert_eq!(counter.events, vec!["store", "istore", "store", "istore"]);
}

#[test]
fn editing_keeps_branch_targets() {
    init_logging();
    let mut class = ClassBuilder::from_class_file(counter_class()).unwrap();
    let mut sum = class.method("sum", "(I)I").unwrap();

    let (branch, target) = sum
        .instructions
        .iter()
        .find_map(|(handle, instruction)| match instruction {
            Instruction::If(_, target) => Some((handle, *target)),
            _ => None,
        })
        .unwrap();
    let before = sum.instructions.offset_of(target).unwrap().0
        - sum.instructions.offset_of(branch).unwrap().0;

    for _ in 0..3 {
        sum.instructions.insert_before(target, Instruction::Nop).unwrap();
    }
    let after = sum.instructions.offset_of(target).unwrap().0
        - sum.instructions.offset_of(branch).unwrap().0;
    assert_eq!(after, before + 3);

    class.replace_method("sum", "(I)I", &sum).unwrap();
    let rebuilt = class.build().unwrap();
    let pool = ConstantPool::from_constants(rebuilt.constants.clone()).unwrap();
    let code = code_of(&rebuilt, 0);
    let decoded = decode(&code.code_array.0, &pool).unwrap();

    // The branch still lands on `iload 1`, now further away
    let (_, branch) = decoded.offsets[3];
    let target = match decoded.instructions.get(branch) {
        Some(Instruction::If(OrdComparison::EQ, target)) => *target,
        other => panic!("expected ifeq, got {:?}", other),
    };
    assert_eq!(decoded.instructions.get(target), Some(&Instruction::ILoad(1)));
    assert_eq!(decoded.instructions.offset_of(target).unwrap().0, 19);
}
