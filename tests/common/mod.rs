/// Drive a source string through the whole pipeline up to a verified module
pub fn run_pipeline(src: &str) {
    let ast = pclc::parse(src).unwrap();
    let program = pclc::analyze(ast).unwrap();
    let context = inkwell::context::Context::create();
    let _module = pclc::compile(&context, &program).unwrap();
}
