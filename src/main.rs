use std::fmt::Display;
use std::fs;
use std::io::{Read, Write};
use std::process::ExitCode;

use clap::Parser;
use inkwell::context::Context;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;

use pclc::{analyze, compile, parse, Span};

mod cli;

/// The passes `-O` applies to the generated code
const OPT_PIPELINE: &str = "mem2reg,instcombine,gvn,simplifycfg";

fn main() -> ExitCode {
    let args = cli::Args::parse();

    if args.input_file.is_none() && !args.intermediate && !args.final_code {
        eprintln!("Usage: pcl [-O] <input_file> || pcl [-O] [-i|-f]");
        return ExitCode::FAILURE;
    }

    let (source, base) = match &args.input_file {
        Some(path) => match fs::read_to_string(path) {
            Ok(source) => (source, Some(path.with_extension(""))),
            Err(err) => {
                eprintln!("Error: cannot read {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut source = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut source) {
                eprintln!("Error: cannot read standard input: {err}");
                return ExitCode::FAILURE;
            }
            (source, None)
        }
    };

    let program = match parse(&source) {
        Ok(program) => program,
        Err(errors) => {
            // the first error is fatal; later ones are usually noise
            if let Some(error) = errors.first() {
                report(&source, error.span(), error);
            }
            return ExitCode::FAILURE;
        }
    };

    let program = match analyze(program) {
        Ok(program) => program,
        Err(error) => {
            report(&source, error.span(), &error);
            return ExitCode::FAILURE;
        }
    };

    let context = Context::create();
    let module = match compile(&context, &program) {
        Ok(module) => module,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };

    Target::initialize_all(&InitializationConfig::default());
    let triple = TargetMachine::get_default_triple();
    let target = match Target::from_triple(&triple) {
        Ok(target) => target,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let Some(machine) = target.create_target_machine(
        &triple,
        "generic",
        "",
        OptimizationLevel::Default,
        RelocMode::Default,
        CodeModel::Default,
    ) else {
        eprintln!("Error: cannot create a target machine for {triple}");
        return ExitCode::FAILURE;
    };
    module.set_triple(&triple);

    if args.optimize {
        if let Err(err) = module.run_passes(OPT_PIPELINE, &machine, PassBuilderOptions::create()) {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    }

    if args.intermediate {
        print!("{}", module.print_to_string().to_string());
    } else if args.final_code {
        match machine.write_to_memory_buffer(&module, FileType::Assembly) {
            Ok(buffer) => {
                if std::io::stdout().write_all(buffer.as_slice()).is_err() {
                    return ExitCode::FAILURE;
                }
            }
            Err(err) => {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else if let Some(base) = base {
        let imm = base.with_extension("imm");
        if let Err(err) = module.print_to_file(&imm) {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }

        let asm = base.with_extension("asm");
        if let Err(err) = machine.write_to_file(&module, FileType::Assembly, &asm) {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

/// The user-visible error format: one line, source line number, message
fn report(source: &str, span: Span, message: &dyn Display) {
    eprintln!("Line: {} Error: {}", span.line(source), message);
}
