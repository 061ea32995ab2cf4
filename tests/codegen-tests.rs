use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;

fn compile_module<'ctx>(context: &'ctx Context, src: &str) -> Module<'ctx> {
    let ast = pclc::parse(src).unwrap();
    let program = pclc::analyze(ast).unwrap();
    pclc::compile(context, &program).unwrap()
}

fn block_names(function: FunctionValue) -> Vec<String> {
    function
        .get_basic_blocks()
        .iter()
        .map(|block| block.get_name().to_str().unwrap().to_string())
        .collect()
}

#[test]
fn user_functions_take_a_static_link() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/nested.pcl"));

    // main is plain, user functions carry the hidden frame parameter
    assert_eq!(module.get_function("main").unwrap().count_params(), 0);
    assert_eq!(module.get_function("outer").unwrap().count_params(), 1);
    assert_eq!(module.get_function("inner").unwrap().count_params(), 1);
}

#[test]
fn parameters_follow_the_frame() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/fact.pcl"));

    let fact = module.get_function("fact").unwrap();
    assert_eq!(fact.count_params(), 2);
    assert!(fact.get_nth_param(0).unwrap().is_pointer_value());
    assert!(fact.get_nth_param(1).unwrap().is_int_value());
}

#[test]
fn library_functions_take_no_frame() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/hello.pcl"));

    let write_string = module.get_function("writeString").unwrap();
    assert_eq!(write_string.count_params(), 1);
    assert!(write_string.get_first_basic_block().is_none());
}

#[test]
fn frames_hold_the_parent_then_the_locals() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/nested.pcl"));
    let ir = module.print_to_string().to_string();

    // the frame built for `inner` is { parent, &x }
    assert!(ir.contains("%new_frame = alloca { ptr, ptr }"), "{ir}");
    // and `inner` reads slot 1 to reach x
    assert!(ir.contains("getelementptr inbounds { ptr, ptr }"), "{ir}");
}

#[test]
fn short_circuit_evaluates_the_right_operand_in_its_own_block() {
    let context = Context::create();
    let module = compile_module(
        &context,
        "program sc; \
         var a, b : boolean; \
         begin \
           if a and b then writeBoolean(true); \
           if a or b then writeBoolean(false) \
         end.",
    );

    let names = block_names(module.get_function("main").unwrap());
    assert!(names.iter().any(|n| n == "and_right_operand"), "{names:?}");
    assert!(names.iter().any(|n| n == "and_false"), "{names:?}");
    assert!(names.iter().any(|n| n == "or_right_operand"), "{names:?}");
    assert!(names.iter().any(|n| n == "or_true"), "{names:?}");
}

#[test]
fn labels_become_basic_blocks() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/labels.pcl"));

    let names = block_names(module.get_function("main").unwrap());
    assert!(names.iter().any(|n| n == "label_L"), "{names:?}");
}

#[test]
fn while_loops_have_loop_body_after_blocks() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/sum.pcl"));

    let names = block_names(module.get_function("main").unwrap());
    for expected in ["loop", "body", "after"] {
        assert!(names.iter().any(|n| n == expected), "{names:?}");
    }
}

#[test]
fn calls_outward_walk_the_frame_chain() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/deep.pcl"));
    let ir = module.print_to_string().to_string();

    assert_eq!(module.get_function("level3").unwrap().count_params(), 1);
    assert!(ir.contains("parent_frame"), "{ir}");
}

#[test]
fn sized_new_calls_malloc_and_dispose_frees() {
    let context = Context::create();
    let module = compile_module(
        &context,
        "program a; \
         var v : ^array of integer; \
         begin \
           new[5](v); \
           v^[0] := 1; \
           dispose [] (v) \
         end.",
    );
    let ir = module.print_to_string().to_string();

    assert!(ir.contains("@malloc"), "{ir}");
    assert!(ir.contains("@free"), "{ir}");
    // the element count scales the element size
    assert!(ir.contains("alloc_size"), "{ir}");
}

#[test]
fn sibling_calls_copy_the_frame_by_name() {
    let context = Context::create();
    let module = compile_module(&context, include_str!("testfiles/siblings.pcl"));

    assert_eq!(module.get_function("first").unwrap().count_params(), 1);
    assert_eq!(module.get_function("second").unwrap().count_params(), 1);
}
