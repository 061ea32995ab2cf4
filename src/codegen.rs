//! LLVM IR generation
//!
//! A second post-order pass over the typed tree that builds an LLVM module
//! through [inkwell]. Expressions are emitted as an [`Emitted`] value that is
//! either already loaded or still an address; consumers load on demand and
//! keep the address only where storage is required (assignment targets,
//! by-reference arguments, `@`, `new`, `dispose`).
//!
//! User-defined functions receive a hidden first parameter, the static link:
//! a pointer to a struct holding the parent link followed by the addresses
//! of the outer variables recorded in the function's frame info. On entry a
//! function walks that chain once and caches every visible outer variable as
//! a plain storage handle, so variable access never searches at runtime.
//! The main interface is [`compile`].

use miette::Diagnostic;
use thiserror::Error;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, PointerType, StructType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, FloatValue, FunctionValue, IntValue, PointerValue,
};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate};

use crate::ast::{
    BinOp, Body, Call, Expr, ExprKind, Function, Local, Stmt, StmtKind, Typed, TypedProgram, UnOp,
};
use crate::builtin;
use crate::codegen_table::{CodegenTable, FunctionDef, Storage};
use crate::symbol_table::VarInfo;
use crate::Type;

#[derive(Debug, Error, Diagnostic)]
pub enum CodegenError {
    #[error("The LLVM builder failed")]
    Builder(#[from] inkwell::builder::BuilderError),

    #[error("The function {0} is unknown and cannot be called")]
    UnknownFunction(String),

    #[error("No storage handle for variable {0}")]
    MissingVariable(String),

    #[error("No basic block for label {0}")]
    MissingLabel(String),

    #[error("Expression does not denote storage")]
    NotAnAddress,

    #[error("Internal invariant broken: {0}")]
    Internal(&'static str),

    #[error("Generated module failed verification:\n{0}")]
    InvalidModule(String),
}

type Result<T> = std::result::Result<T, CodegenError>;

/// Compile an analyzed program into an LLVM module
pub fn compile<'ctx>(context: &'ctx Context, program: &TypedProgram) -> Result<Module<'ctx>> {
    let module = context.create_module(&program.name);
    let mut codegen = Codegen {
        context,
        builder: context.create_builder(),
        module,
        table: CodegenTable::new(),
    };
    codegen.compile_program(program)?;
    Ok(codegen.module)
}

/// The result of emitting an expression
///
/// An address remembers what type is stored behind it, since pointers
/// themselves are opaque.
#[derive(Debug, Clone, Copy)]
enum Emitted<'ctx> {
    Loaded(BasicValueEnum<'ctx>),
    Address(Storage<'ctx>),
}

struct Codegen<'ctx> {
    context: &'ctx Context,
    builder: Builder<'ctx>,
    module: Module<'ctx>,
    table: CodegenTable<'ctx>,
}

/// The variables of one nesting level, in frame-slot order
fn frame_group(vars: &[VarInfo], level: usize) -> impl Iterator<Item = &VarInfo> {
    vars.iter().filter(move |var| var.nesting_level == level)
}

fn group_size(vars: &[VarInfo], level: usize) -> usize {
    frame_group(vars, level).count()
}

impl<'ctx> Codegen<'ctx> {
    fn compile_program(&mut self, program: &TypedProgram) -> Result<()> {
        let fn_type = self.context.i32_type().fn_type(&[], false);
        let main = self.module.add_function("main", fn_type, None);
        let entry = self.context.append_basic_block(main, "entry");
        self.builder.position_at_end(entry);

        self.table.open_scope();
        self.declare_library()?;

        // `return` inside the program body returns this exit status
        let status_type: BasicTypeEnum = self.context.i32_type().into();
        let status = self.builder.build_alloca(status_type, "result")?;
        self.builder
            .build_store(status, self.context.i32_type().const_zero())?;
        self.table.set_result(Storage {
            ptr: status,
            pointee: status_type,
        });

        self.emit_body(&program.body)?;

        if self.no_terminator() {
            self.emit_return_value()?;
        }

        self.table.close_scope();

        self.module
            .verify()
            .map_err(|message| CodegenError::InvalidModule(message.to_string()))
    }

    /// Declare externs for the runtime library and the allocator
    fn declare_library(&mut self) -> Result<()> {
        for lib in builtin::library_functions() {
            let param_types: Vec<BasicMetadataTypeEnum> = lib
                .parameters
                .iter()
                .map(|(by_reference, typ)| {
                    if *by_reference {
                        self.ptr_type().into()
                    } else {
                        self.lower_type(typ).into()
                    }
                })
                .collect();

            let fn_type = match &lib.return_type {
                Some(typ) => self.lower_type(typ).fn_type(&param_types, false),
                None => self.context.void_type().fn_type(&param_types, false),
            };
            let function = self.module.add_function(lib.symbol, fn_type, None);

            self.table.insert_library_fun(
                lib.name,
                FunctionDef {
                    function,
                    return_type: lib.return_type,
                    parameters: lib.parameters,
                    prev_scope_vars: Vec::new(),
                    nesting_level: 0,
                    is_library: true,
                },
            );
        }

        let i64_type = self.context.i64_type();
        let malloc_type = self.ptr_type().fn_type(&[i64_type.into()], false);
        let malloc = self.module.add_function("malloc", malloc_type, None);
        self.table.insert_library_fun("malloc", allocator_def(malloc));

        let free_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_type().into()], false);
        let free = self.module.add_function("free", free_type, None);
        self.table.insert_library_fun("free", allocator_def(free));

        Ok(())
    }

    fn ptr_type(&self) -> PointerType<'ctx> {
        self.context.i8_type().ptr_type(AddressSpace::default())
    }

    /// Booleans and characters are bytes, integers 32-bit, reals doubles;
    /// sized arrays lower to array types, the open array to its element
    /// (always reached through a pointer), pointers to opaque pointers
    fn lower_type(&self, typ: &Type) -> BasicTypeEnum<'ctx> {
        match typ {
            Type::Boolean | Type::Char => self.context.i8_type().into(),
            Type::Integer => self.context.i32_type().into(),
            Type::Real => self.context.f64_type().into(),
            Type::Array { size, elem } => self.lower_type(elem).array_type(*size as u32).into(),
            Type::IArray { elem } => self.lower_type(elem),
            Type::Pointer { .. } => self.ptr_type().into(),
        }
    }

    /// A frame: the parent link followed by one pointer per variable slot
    fn frame_struct(&self, var_slots: usize) -> StructType<'ctx> {
        let field: BasicTypeEnum = self.ptr_type().into();
        self.context.struct_type(&vec![field; var_slots + 1], false)
    }

    fn current_function(&self) -> FunctionValue<'ctx> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .expect("builder is always positioned inside a function")
    }

    fn no_terminator(&self) -> bool {
        self.builder
            .get_insert_block()
            .is_some_and(|block| block.get_terminator().is_none())
    }

    fn load(&self, value: Emitted<'ctx>) -> Result<BasicValueEnum<'ctx>> {
        match value {
            Emitted::Loaded(value) => Ok(value),
            Emitted::Address(storage) => {
                Ok(self.builder.build_load(storage.ptr, "load")?)
            }
        }
    }

    fn int_to_real(&self, value: IntValue<'ctx>) -> Result<FloatValue<'ctx>> {
        Ok(self
            .builder
            .build_signed_int_to_float(value, self.context.f64_type(), "sitofp")?)
    }

    fn ensure_real(&self, value: BasicValueEnum<'ctx>) -> Result<FloatValue<'ctx>> {
        if value.is_int_value() {
            self.int_to_real(value.into_int_value())
        } else {
            Ok(value.into_float_value())
        }
    }

    fn emit_body(&mut self, body: &Body<Typed>) -> Result<()> {
        // register every function of this body first, so calls that appear
        // between a forward declaration and its body see the final record
        for local in &body.locals {
            if let Local::Fun(fun) = local {
                self.declare_function(fun)?;
            }
        }

        for local in &body.locals {
            match local {
                Local::Vars(groups) => {
                    for group in groups {
                        let pointee = self.lower_type(&group.typ);
                        for name in &group.names {
                            let slot = self.builder.build_alloca(pointee, name)?;
                            self.table.insert_var(name, Storage { ptr: slot, pointee });
                        }
                    }
                }
                Local::Labels { names, .. } => {
                    let function = self.current_function();
                    for name in names {
                        let block = self
                            .context
                            .append_basic_block(function, &format!("label_{name}"));
                        self.table.insert_label(name, block);
                    }
                }
                Local::Fun(fun) => self.emit_function(fun)?,
            }
        }

        self.emit_stmt(&body.block)
    }

    fn declare_function(&mut self, fun: &Function<Typed>) -> Result<()> {
        if self.table.current_scope_lookup_fun(&fun.name).is_some() {
            // second declaration: the body completing a forward one
            if !fun.is_forward() {
                self.table.set_fun_frame(
                    &fun.name,
                    fun.frame.nesting_level,
                    fun.frame.prev_scope_vars.clone(),
                );
            }
            return Ok(());
        }

        let mut param_types: Vec<BasicMetadataTypeEnum> = vec![self.ptr_type().into()];
        let mut parameters = Vec::new();
        for formal in &fun.formals {
            for _ in &formal.names {
                param_types.push(if formal.by_reference {
                    self.ptr_type().into()
                } else {
                    self.lower_type(&formal.typ).into()
                });
                parameters.push((formal.by_reference, formal.typ.clone()));
            }
        }

        let fn_type = match &fun.return_type {
            Some(typ) => self.lower_type(typ).fn_type(&param_types, false),
            None => self.context.void_type().fn_type(&param_types, false),
        };
        let function = self
            .module
            .add_function(&fun.name, fn_type, Some(Linkage::Private));

        self.table.insert_fun(
            &fun.name,
            FunctionDef {
                function,
                return_type: fun.return_type.clone(),
                parameters,
                prev_scope_vars: fun.frame.prev_scope_vars.clone(),
                nesting_level: fun.frame.nesting_level,
                is_library: false,
            },
        );
        Ok(())
    }

    fn emit_function(&mut self, fun: &Function<Typed>) -> Result<()> {
        let Some(body) = &fun.body else {
            return Ok(());
        };

        let def = self
            .table
            .current_scope_lookup_fun(&fun.name)
            .ok_or(CodegenError::Internal("function was not declared"))?;
        let parent = self.builder.get_insert_block();

        let entry = self.context.append_basic_block(def.function, "entry");
        self.builder.position_at_end(entry);

        self.table.open_scope();

        // formals land in fresh slots; a by-reference formal keeps the
        // caller's address so later uses read through it naturally
        let mut index = 1u32;
        for formal in &fun.formals {
            for name in &formal.names {
                let param = def
                    .function
                    .get_nth_param(index)
                    .ok_or(CodegenError::Internal("missing parameter"))?;
                let pointee = self.lower_type(&formal.typ);
                let storage = if formal.by_reference {
                    Storage {
                        ptr: param.into_pointer_value(),
                        pointee,
                    }
                } else {
                    let slot = self.builder.build_alloca(pointee, name)?;
                    self.builder.build_store(slot, param)?;
                    Storage { ptr: slot, pointee }
                };
                self.table.insert_var(name, storage);
                index += 1;
            }
        }

        let frame = def
            .function
            .get_nth_param(0)
            .ok_or(CodegenError::Internal("missing frame parameter"))?
            .into_pointer_value();
        self.table.set_frame(frame);
        self.cache_frame_vars(&def, frame)?;

        if let Some(return_type) = &fun.return_type {
            let pointee = self.lower_type(return_type);
            let slot = self.builder.build_alloca(pointee, "result")?;
            self.table.set_result(Storage { ptr: slot, pointee });
        }

        self.emit_body(body)?;

        if self.no_terminator() {
            self.emit_return_value()?;
        }

        self.table.close_scope();

        if let Some(parent) = parent {
            self.builder.position_at_end(parent);
        }
        Ok(())
    }

    /// Walk the incoming frame chain once and cache every visible outer
    /// variable as a storage handle
    ///
    /// The chain is walked from the innermost enclosing scope outwards,
    /// hopping to the parent frame whenever the variable list moves to a
    /// shallower level. Shadowed names keep their slot but are not cached.
    fn cache_frame_vars(&mut self, def: &FunctionDef<'ctx>, frame: PointerValue<'ctx>) -> Result<()> {
        let mut frame = frame;
        let mut depth = def.nesting_level - 1;
        let mut slot = 1u32;

        for var in &def.prev_scope_vars {
            while var.nesting_level < depth {
                let frame_type = self.frame_struct(group_size(&def.prev_scope_vars, depth));
                let parent = self
                    .builder
                    .build_struct_gep(frame, 0, "parent_frame")?;
                frame = self
                    .builder
                    .build_load(parent, "frame")?
                    .into_pointer_value();
                depth -= 1;
                slot = 1;
            }

            if !self.table.current_scope_has_var(&var.name) {
                let frame_type = self.frame_struct(group_size(&def.prev_scope_vars, depth));
                let addr = self
                    .builder
                    .build_struct_gep(frame, slot, &var.name)?;
                let ptr = self
                    .builder
                    .build_load(addr, &var.name)?
                    .into_pointer_value();
                let pointee = self.lower_type(&var.typ);
                self.table.insert_var(&var.name, Storage { ptr, pointee });
            }
            slot += 1;
        }
        Ok(())
    }

    /// Build the static link to pass for a call to `callee`
    fn build_frame_argument(&mut self, callee: &FunctionDef<'ctx>) -> Result<PointerValue<'ctx>> {
        let caller_depth = self.table.nesting_level();
        let my_frame = match self.table.frame() {
            Some(frame) => frame,
            None => {
                // the program body has no frame of its own
                let empty = self.context.struct_type(&[], false);
                self.builder.build_alloca(empty, "prev_frame")?
            }
        };

        let callee_level = callee.nesting_level;

        if caller_depth > callee_level {
            // callee is further out: hand over the ancestor frame at its level
            let mut frame = my_frame;
            for _ in 0..(caller_depth - callee_level) {
                let parent = self
                    .builder
                    .build_struct_gep(frame, 0, "parent_frame")?;
                frame = self
                    .builder
                    .build_load(parent, "frame")?
                    .into_pointer_value();
            }
            return Ok(frame);
        }

        if caller_depth == callee_level {
            let current = self.current_function();
            if callee.function == current {
                // direct recursion reuses the incoming frame
                return Ok(my_frame);
            }

            // a sibling shares our parent; its slots are copied from our own
            // frame by name, so shadowed variables keep the right address
            let group: Vec<&VarInfo> =
                frame_group(&callee.prev_scope_vars, callee_level - 1).collect();
            let frame_type = self.frame_struct(group.len());
            let new_frame = self.builder.build_alloca(frame_type, "new_frame")?;

            let caller_def = self
                .table
                .reverse_lookup_fun(current)
                .and_then(|name| self.table.lookup_fun(&name))
                .ok_or(CodegenError::Internal("caller has no function record"))?;
            let my_group: Vec<&VarInfo> =
                frame_group(&caller_def.prev_scope_vars, caller_depth - 1).collect();
            let my_frame_type = self.frame_struct(my_group.len());

            let parent_src = self
                .builder
                .build_struct_gep(my_frame, 0, "parent_frame")?;
            let parent = self.builder.build_load(parent_src, "parent")?;
            let parent_dst = self
                .builder
                .build_struct_gep(new_frame, 0, "frame_parent")?;
            self.builder.build_store(parent_dst, parent)?;

            for (callee_slot, var) in group.iter().enumerate() {
                if let Some(my_slot) = my_group.iter().position(|mine| mine.name == var.name) {
                    let src = self.builder.build_struct_gep(
                        my_frame,
                        my_slot as u32 + 1,
                        &var.name,
                    )?;
                    let addr = self.builder.build_load(src, &var.name)?;
                    let dst = self.builder.build_struct_gep(
                        new_frame,
                        callee_slot as u32 + 1,
                        &var.name,
                    )?;
                    self.builder.build_store(dst, addr)?;
                }
            }
            return Ok(new_frame);
        }

        // callee is nested directly below us: a fresh frame over our locals
        let group: Vec<&VarInfo> = frame_group(&callee.prev_scope_vars, callee_level - 1).collect();
        let frame_type = self.frame_struct(group.len());
        let new_frame = self.builder.build_alloca(frame_type, "new_frame")?;

        let parent_dst = self
            .builder
            .build_struct_gep(new_frame, 0, "frame_parent")?;
        self.builder.build_store(parent_dst, my_frame)?;

        for (slot, var) in group.iter().enumerate() {
            let storage = self
                .table
                .lookup_var(&var.name)
                .ok_or_else(|| CodegenError::MissingVariable(var.name.clone()))?;
            let dst = self.builder.build_struct_gep(
                new_frame,
                slot as u32 + 1,
                &var.name,
            )?;
            self.builder.build_store(dst, storage.ptr)?;
        }
        Ok(new_frame)
    }

    fn emit_return_value(&mut self) -> Result<()> {
        match self.table.result() {
            Some(result) => {
                let value = self
                    .builder
                    .build_load(result.ptr, "result")?;
                self.builder.build_return(Some(&value))?;
            }
            None => {
                self.builder.build_return(None)?;
            }
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt<Typed>) -> Result<()> {
        match &stmt.kind {
            StmtKind::Empty => Ok(()),

            StmtKind::Block(stmts) => {
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
                Ok(())
            }

            StmtKind::Assign { left, right } => {
                let target = self.emit_expr(left)?;
                let Emitted::Address(target) = target else {
                    return Err(CodegenError::NotAnAddress);
                };

                let value = self.emit_expr(right)?;
                let mut value = self.load(value)?;
                if left.typ == Type::Real && right.typ == Type::Integer {
                    value = self.int_to_real(value.into_int_value())?.into();
                }

                self.builder.build_store(target.ptr, value)?;
                Ok(())
            }

            StmtKind::Goto(label) => {
                let block = self
                    .table
                    .lookup_label(label)
                    .ok_or_else(|| CodegenError::MissingLabel(label.clone()))?;
                self.builder.build_unconditional_branch(block)?;

                // statements after the jump emit into their own block
                let cont = self
                    .context
                    .append_basic_block(self.current_function(), "after_goto");
                self.builder.position_at_end(cont);
                Ok(())
            }

            StmtKind::Label { label, stmt } => {
                let block = self
                    .table
                    .lookup_label(label)
                    .ok_or_else(|| CodegenError::MissingLabel(label.clone()))?;
                self.builder.build_unconditional_branch(block)?;
                self.builder.position_at_end(block);
                self.emit_stmt(stmt)
            }

            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                let cond = self.emit_expr(cond)?;
                let cond = self.load(cond)?.into_int_value();
                let truth = self.context.i8_type().const_int(1, false);
                let cmp = self
                    .builder
                    .build_int_compare(IntPredicate::EQ, cond, truth, "if_cmp")?;

                let function = self.current_function();
                let then_block = self.context.append_basic_block(function, "then");
                let else_block = self.context.append_basic_block(function, "else");
                let after_block = self.context.append_basic_block(function, "after");

                self.builder
                    .build_conditional_branch(cmp, then_block, else_block)?;

                self.builder.position_at_end(then_block);
                self.emit_stmt(then_stmt)?;
                if self.no_terminator() {
                    self.builder.build_unconditional_branch(after_block)?;
                }

                self.builder.position_at_end(else_block);
                if let Some(else_stmt) = else_stmt {
                    self.emit_stmt(else_stmt)?;
                }
                if self.no_terminator() {
                    self.builder.build_unconditional_branch(after_block)?;
                }

                self.builder.position_at_end(after_block);
                Ok(())
            }

            StmtKind::While { cond, body } => {
                let function = self.current_function();
                let loop_block = self.context.append_basic_block(function, "loop");
                let body_block = self.context.append_basic_block(function, "body");
                let after_block = self.context.append_basic_block(function, "after");

                self.builder.build_unconditional_branch(loop_block)?;
                self.builder.position_at_end(loop_block);

                let cond = self.emit_expr(cond)?;
                let cond = self.load(cond)?.into_int_value();
                let truth = self.context.i8_type().const_int(1, false);
                let cmp = self
                    .builder
                    .build_int_compare(IntPredicate::EQ, cond, truth, "while_cmp")?;
                self.builder
                    .build_conditional_branch(cmp, body_block, after_block)?;

                self.builder.position_at_end(body_block);
                self.emit_stmt(body)?;
                if self.no_terminator() {
                    self.builder.build_unconditional_branch(loop_block)?;
                }

                self.builder.position_at_end(after_block);
                Ok(())
            }

            StmtKind::Call(call) => {
                self.emit_call(call)?;
                Ok(())
            }

            StmtKind::Return => {
                self.emit_return_value()?;

                let cont = self
                    .context
                    .append_basic_block(self.current_function(), "after_return");
                self.builder.position_at_end(cont);
                Ok(())
            }

            StmtKind::New { size, target } => {
                let slot = self.emit_expr(target)?;
                let Emitted::Address(slot) = slot else {
                    return Err(CodegenError::NotAnAddress);
                };

                let Type::Pointer {
                    target: Some(pointee),
                } = &target.typ
                else {
                    return Err(CodegenError::Internal("new target is not a pointer"));
                };

                // element size via pointer arithmetic: the address one
                // element past nil, read as an integer
                let unit = self.lower_type(pointee);
                let nil = self.ptr_type().const_null();
                let one = self.context.i32_type().const_int(1, false);
                let end = unsafe { self.builder.build_gep(nil, &[one], "size_of") }?;
                let mut bytes =
                    self.builder
                        .build_ptr_to_int(end, self.context.i64_type(), "size_int")?;

                if let Some(size) = size {
                    let count = self.emit_expr(size)?;
                    let count = self.load(count)?.into_int_value();
                    let count = self.builder.build_int_s_extend(
                        count,
                        self.context.i64_type(),
                        "sext",
                    )?;
                    bytes = self.builder.build_int_mul(count, bytes, "alloc_size")?;
                }

                let malloc = self
                    .table
                    .lookup_fun("malloc")
                    .ok_or_else(|| CodegenError::UnknownFunction(String::from("malloc")))?;
                let raw = self
                    .builder
                    .build_call(malloc.function, &[bytes.into()], "")?
                    .try_as_basic_value()
                    .left()
                    .ok_or(CodegenError::Internal("malloc returns a value"))?;

                self.builder.build_store(slot.ptr, raw)?;
                Ok(())
            }

            StmtKind::Dispose { target, .. } => {
                let slot = self.emit_expr(target)?;
                let Emitted::Address(slot) = slot else {
                    return Err(CodegenError::NotAnAddress);
                };

                let ptr = self.load(Emitted::Address(slot))?;
                let free = self
                    .table
                    .lookup_fun("free")
                    .ok_or_else(|| CodegenError::UnknownFunction(String::from("free")))?;
                self.builder.build_call(free.function, &[ptr.into()], "")?;

                // the pointer is dead; store nil back
                self.builder
                    .build_store(slot.ptr, self.ptr_type().const_null())?;
                Ok(())
            }
        }
    }

    fn emit_expr(&mut self, expr: &Expr<Typed>) -> Result<Emitted<'ctx>> {
        match &expr.kind {
            ExprKind::Boolean(val) => Ok(Emitted::Loaded(
                self.context.i8_type().const_int(*val as u64, false).into(),
            )),
            ExprKind::Char(val) => Ok(Emitted::Loaded(
                self.context.i8_type().const_int(*val as u64, false).into(),
            )),
            ExprKind::Integer(val) => Ok(Emitted::Loaded(
                self.context
                    .i32_type()
                    .const_int(*val as u64, true)
                    .into(),
            )),
            ExprKind::Real(val) => Ok(Emitted::Loaded(
                self.context.f64_type().const_float(*val).into(),
            )),
            ExprKind::Nil => Ok(Emitted::Loaded(self.ptr_type().const_null().into())),

            ExprKind::Str(val) => {
                let global = self.builder.build_global_string_ptr(val, "str")?;
                let pointee = self
                    .context
                    .i8_type()
                    .array_type(val.len() as u32 + 1)
                    .into();
                Ok(Emitted::Address(Storage {
                    ptr: global.as_pointer_value(),
                    pointee,
                }))
            }

            ExprKind::Variable(name) => {
                let storage = self
                    .table
                    .lookup_var(name)
                    .ok_or_else(|| CodegenError::MissingVariable(name.clone()))?;
                Ok(Emitted::Address(storage))
            }

            ExprKind::Result => {
                let storage = self
                    .table
                    .result()
                    .ok_or(CodegenError::Internal("no result slot"))?;
                Ok(Emitted::Address(storage))
            }

            ExprKind::Index { array, index } => {
                let base = self.emit_expr(array)?;
                let Emitted::Address(base) = base else {
                    return Err(CodegenError::NotAnAddress);
                };

                let idx = self.emit_expr(index)?;
                let idx = self.load(idx)?.into_int_value();

                let ptr = if matches!(array.typ, Type::Array { .. }) {
                    let zero = self.context.i32_type().const_zero();
                    unsafe {
                        self.builder
                            .build_in_bounds_gep(base.ptr, &[zero, idx], "array_gep")
                    }?
                } else {
                    unsafe {
                        self.builder
                            .build_in_bounds_gep(base.ptr, &[idx], "iarray_gep")
                    }?
                };

                Ok(Emitted::Address(Storage {
                    ptr,
                    pointee: self.lower_type(&expr.typ),
                }))
            }

            ExprKind::Deref(ptr) => {
                let value = self.emit_expr(ptr)?;
                let value = self.load(value)?.into_pointer_value();
                Ok(Emitted::Address(Storage {
                    ptr: value,
                    pointee: self.lower_type(&expr.typ),
                }))
            }

            ExprKind::AddressOf(var) => {
                let inner = self.emit_expr(var)?;
                let Emitted::Address(storage) = inner else {
                    return Err(CodegenError::NotAnAddress);
                };
                Ok(Emitted::Loaded(storage.ptr.into()))
            }

            ExprKind::Call(call) => {
                let value = self
                    .emit_call(call)?
                    .ok_or(CodegenError::Internal("call expression has a value"))?;
                Ok(Emitted::Loaded(value))
            }

            ExprKind::Binary { op, left, right } => match op {
                BinOp::And => self.emit_short_circuit(left, right, false),
                BinOp::Or => self.emit_short_circuit(left, right, true),
                _ => self.emit_binary(*op, left, right, &expr.typ),
            },

            ExprKind::Unary { op, operand } => {
                let value = self.emit_expr(operand)?;
                let value = self.load(value)?;

                match op {
                    UnOp::Plus => Ok(Emitted::Loaded(value)),
                    UnOp::Minus => {
                        if expr.typ == Type::Integer {
                            let neg =
                                self.builder.build_int_neg(value.into_int_value(), "neg")?;
                            Ok(Emitted::Loaded(neg.into()))
                        } else {
                            let neg = self
                                .builder
                                .build_float_neg(value.into_float_value(), "fneg")?;
                            Ok(Emitted::Loaded(neg.into()))
                        }
                    }
                    UnOp::Not => {
                        // booleans are 0 or 1; flip the low bit
                        let one = self.context.i8_type().const_int(1, false);
                        let flipped =
                            self.builder
                                .build_xor(value.into_int_value(), one, "not")?;
                        Ok(Emitted::Loaded(flipped.into()))
                    }
                }
            }
        }
    }

    fn emit_binary(
        &mut self,
        op: BinOp,
        left: &Expr<Typed>,
        right: &Expr<Typed>,
        typ: &Type,
    ) -> Result<Emitted<'ctx>> {
        let lhs = self.emit_expr(left)?;
        let mut lhs = self.load(lhs)?;
        let rhs = self.emit_expr(right)?;
        let mut rhs = self.load(rhs)?;

        // an integer operand widens when the other side is real
        if left.typ == Type::Integer && right.typ == Type::Real {
            lhs = self.int_to_real(lhs.into_int_value())?.into();
        }
        if left.typ == Type::Real && right.typ == Type::Integer {
            rhs = self.int_to_real(rhs.into_int_value())?.into();
        }

        let value: BasicValueEnum = match op {
            BinOp::Add => {
                if *typ == Type::Integer {
                    self.builder
                        .build_int_add(lhs.into_int_value(), rhs.into_int_value(), "add_int")?
                        .into()
                } else {
                    self.builder
                        .build_float_add(lhs.into_float_value(), rhs.into_float_value(), "add_real")?
                        .into()
                }
            }
            BinOp::Sub => {
                if *typ == Type::Integer {
                    self.builder
                        .build_int_sub(lhs.into_int_value(), rhs.into_int_value(), "sub_int")?
                        .into()
                } else {
                    self.builder
                        .build_float_sub(lhs.into_float_value(), rhs.into_float_value(), "sub_real")?
                        .into()
                }
            }
            BinOp::Mul => {
                if *typ == Type::Integer {
                    self.builder
                        .build_int_mul(lhs.into_int_value(), rhs.into_int_value(), "mul_int")?
                        .into()
                } else {
                    self.builder
                        .build_float_mul(lhs.into_float_value(), rhs.into_float_value(), "mul_real")?
                        .into()
                }
            }
            BinOp::Div => {
                let lhs = self.ensure_real(lhs)?;
                let rhs = self.ensure_real(rhs)?;
                self.builder.build_float_div(lhs, rhs, "div_real")?.into()
            }
            BinOp::IntDiv => self
                .builder
                .build_int_signed_div(lhs.into_int_value(), rhs.into_int_value(), "div_int")?
                .into(),
            BinOp::Mod => self
                .builder
                .build_int_signed_rem(lhs.into_int_value(), rhs.into_int_value(), "mod_int")?
                .into(),

            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let cmp = if lhs.is_float_value() {
                    self.builder.build_float_compare(
                        float_predicate(op),
                        lhs.into_float_value(),
                        rhs.into_float_value(),
                        "fcmp",
                    )?
                } else if lhs.is_pointer_value() {
                    // pointers compare as plain addresses
                    let lhs = self.builder.build_ptr_to_int(
                        lhs.into_pointer_value(),
                        self.context.i64_type(),
                        "ptr_int",
                    )?;
                    let rhs = self.builder.build_ptr_to_int(
                        rhs.into_pointer_value(),
                        self.context.i64_type(),
                        "ptr_int",
                    )?;
                    self.builder
                        .build_int_compare(int_predicate(op), lhs, rhs, "icmp")?
                } else {
                    self.builder.build_int_compare(
                        int_predicate(op),
                        lhs.into_int_value(),
                        rhs.into_int_value(),
                        "icmp",
                    )?
                };
                return Ok(Emitted::Loaded(
                    self.builder
                        .build_int_z_extend(cmp, self.context.i8_type(), "bool")?
                        .into(),
                ));
            }

            BinOp::And | BinOp::Or => {
                return Err(CodegenError::Internal("short-circuit ops emitted elsewhere"));
            }
        };

        Ok(Emitted::Loaded(value))
    }

    /// Emit `and`/`or` without evaluating the right operand unless needed
    ///
    /// Both paths write an 8-bit slot that the merge block hands back, so
    /// the value survives whichever way control flow went.
    fn emit_short_circuit(
        &mut self,
        left: &Expr<Typed>,
        right: &Expr<Typed>,
        is_or: bool,
    ) -> Result<Emitted<'ctx>> {
        let i8_type = self.context.i8_type();
        let result = self
            .builder
            .build_alloca(i8_type, if is_or { "or_res" } else { "and_res" })?;

        let lhs = self.emit_expr(left)?;
        let lhs = self.load(lhs)?.into_int_value();

        // the value that decides the outcome without looking right
        let decisive = i8_type.const_int(is_or as u64, false);
        let cmp = self
            .builder
            .build_int_compare(IntPredicate::EQ, lhs, decisive, "icmp_eq")?;

        let function = self.current_function();
        let (short_name, right_name) = if is_or {
            ("or_true", "or_right_operand")
        } else {
            ("and_false", "and_right_operand")
        };
        let short_block = self.context.append_basic_block(function, short_name);
        let right_block = self.context.append_basic_block(function, right_name);
        let after_block = self.context.append_basic_block(function, "after");

        self.builder
            .build_conditional_branch(cmp, short_block, right_block)?;

        self.builder.position_at_end(short_block);
        self.builder.build_store(result, decisive)?;
        self.builder.build_unconditional_branch(after_block)?;

        self.builder.position_at_end(right_block);
        let rhs = self.emit_expr(right)?;
        let rhs = self.load(rhs)?.into_int_value();
        let one = i8_type.const_int(1, false);
        let normalized = self
            .builder
            .build_int_compare(IntPredicate::EQ, rhs, one, "icmp_eq")?;
        let normalized = self
            .builder
            .build_int_z_extend(normalized, i8_type, "bool")?;
        self.builder.build_store(result, normalized)?;
        self.builder.build_unconditional_branch(after_block)?;

        self.builder.position_at_end(after_block);
        Ok(Emitted::Address(Storage {
            ptr: result,
            pointee: i8_type.into(),
        }))
    }

    fn emit_call(&mut self, call: &Call<Typed>) -> Result<Option<BasicValueEnum<'ctx>>> {
        let def = self
            .table
            .lookup_fun(&call.name)
            .ok_or_else(|| CodegenError::UnknownFunction(call.name.clone()))?;

        let mut args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(call.args.len() + 1);
        if !def.is_library {
            let frame = self.build_frame_argument(&def)?;
            args.push(frame.into());
        }

        for (arg, (by_reference, param_typ)) in call.args.iter().zip(&def.parameters) {
            let emitted = self.emit_expr(arg)?;
            if *by_reference {
                let Emitted::Address(storage) = emitted else {
                    return Err(CodegenError::NotAnAddress);
                };
                args.push(storage.ptr.into());
            } else {
                let mut value = self.load(emitted)?;
                if *param_typ == Type::Real && arg.typ == Type::Integer {
                    value = self.int_to_real(value.into_int_value())?.into();
                }
                args.push(value.into());
            }
        }

        let call_site = self.builder.build_call(def.function, &args, "")?;
        Ok(call_site.try_as_basic_value().left())
    }
}

fn int_predicate(op: BinOp) -> IntPredicate {
    match op {
        BinOp::Eq => IntPredicate::EQ,
        BinOp::Neq => IntPredicate::NE,
        BinOp::Lt => IntPredicate::SLT,
        BinOp::Gt => IntPredicate::SGT,
        BinOp::Le => IntPredicate::SLE,
        BinOp::Ge => IntPredicate::SGE,
        _ => unreachable!("not a comparison"),
    }
}

fn float_predicate(op: BinOp) -> FloatPredicate {
    match op {
        BinOp::Eq => FloatPredicate::UEQ,
        BinOp::Neq => FloatPredicate::UNE,
        BinOp::Lt => FloatPredicate::ULT,
        BinOp::Gt => FloatPredicate::UGT,
        BinOp::Le => FloatPredicate::ULE,
        BinOp::Ge => FloatPredicate::UGE,
        _ => unreachable!("not a comparison"),
    }
}

fn allocator_def(function: FunctionValue<'_>) -> FunctionDef<'_> {
    FunctionDef {
        function,
        return_type: None,
        parameters: Vec::new(),
        prev_scope_vars: Vec::new(),
        nesting_level: 0,
        is_library: true,
    }
}
