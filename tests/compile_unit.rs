use std::sync::{Arc, Mutex};

use cinder::bytecode::{
    CodeImage, CompileContext, CompilerOptions, Diagnostic, DiagnosticKind, DiagnosticSink, FixKind, Ident,
    ResolveMode, TypeClass,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<DiagnosticKind>>>);

impl DiagnosticSink for Recorder {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.0.lock().unwrap().push(diagnostic.kind);
    }
}

fn context(mode: ResolveMode, chunk_words: usize) -> (CompileContext, Recorder) {
    let recorder = Recorder::default();
    let options = CompilerOptions {
        mode,
        chunk_words,
        ..CompilerOptions::default()
    };
    (CompileContext::with_sink(options, Box::new(recorder.clone())), recorder)
}

/// Two nested loops with a forward `if` jump, spread over many small chunks.
fn compile_nested_loops(ctx: &mut CompileContext) -> Vec<u32> {
    ctx.begin_unit(Some("nested.cs"));
    ctx.begin_function();

    let outer = ctx.assign_var("%row", TypeClass::UInt, false, 1).unwrap();
    let inner = ctx.assign_var("%col", TypeClass::UInt, false, 2).unwrap();
    assert_eq!((outer, inner), (0, 1));

    let cs = ctx.stream_mut();
    cs.mark_loop_fixup_scope();
    let outer_start = cs.tell();
    let outer_break = cs.emit_fix(FixKind::Break);

    cs.mark_loop_fixup_scope();
    let inner_start = cs.tell();
    cs.emit(0xaa);
    let inner_cont = cs.emit_fix(FixKind::Continue);
    let inner_break = cs.emit_fix(FixKind::Break);

    // Forward branch over the ident call, patched once its target is known.
    cs.emit(0xbb);
    let skip = cs.emit(0);
    ctx.emit_ident(Some(&Ident::new("echo", 0x77)));
    let after_call = ctx.stream().tell();
    ctx.stream_mut().patch(skip, after_call);

    let cs = ctx.stream_mut();
    let inner_restart = cs.emit_fix(FixKind::LoopBlockStart);
    let inner_end = cs.tell();
    cs.resolve_loop_fixups(inner_start, inner_end, inner_start + 1).unwrap();

    let outer_restart = cs.emit_fix(FixKind::LoopBlockStart);
    let outer_end = cs.tell();
    cs.resolve_loop_fixups(outer_start, outer_end, outer_start).unwrap();
    assert!(!cs.in_loop());

    ctx.end_function("Grid", "walk");

    let image = ctx.finish().unwrap();
    let code = image.code.code();
    assert_eq!(code[outer_break as usize], outer_end);
    assert_eq!(code[outer_restart as usize], outer_start);
    assert_eq!(code[inner_break as usize], inner_end);
    assert_eq!(code[inner_cont as usize], inner_start + 1);
    assert_eq!(code[inner_restart as usize], inner_start);
    assert_eq!(code[skip as usize], after_call);
    code.to_vec()
}

#[test]
fn nested_loops_resolve_identically_in_any_chunk_size() {
    let (mut small, _) = context(ResolveMode::Immediate, 2);
    let (mut large, _) = context(ResolveMode::Immediate, 4096);

    assert_eq!(compile_nested_loops(&mut small), compile_nested_loops(&mut large));
    assert!(small.stream().chunk_count() > 1);
    assert_eq!(large.stream().chunk_count(), 1);
}

#[test]
fn deferred_unit_round_trips_through_loader() {
    let (mut imm, _) = context(ResolveMode::Immediate, 3);
    let (mut def, _) = context(ResolveMode::Deferred, 3);

    let immediate_code = compile_nested_loops(&mut imm);
    compile_nested_loops(&mut def);

    let mut bytes = Vec::new();
    def.write_image(&mut bytes).unwrap();
    let mut image = CodeImage::read(&bytes).unwrap();

    assert_eq!(image.mode, ResolveMode::Deferred);
    assert_eq!(image.idents.len(), 1);
    assert_eq!(image.global_string(image.idents[0].offset), Some("echo"));

    image
        .resolve_identifiers(|name| if name == "echo" { 0x77 } else { 0 })
        .unwrap();
    assert_eq!(image.code.code(), immediate_code.as_slice());
}

#[test]
fn locals_are_persisted_per_function() {
    let (mut ctx, recorder) = context(ResolveMode::Deferred, 64);
    compile_nested_loops(&mut ctx);

    assert_eq!(ctx.lookup_local("Grid", "walk", "%col").unwrap(), Some(1));
    assert_eq!(ctx.lookup_local("Grid", "walk", "%missing").unwrap(), None);
    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![DiagnosticKind::UnresolvedLocalVariable]
    );
}

#[test]
fn literal_pools_dedup_across_a_unit() {
    let (mut ctx, _) = context(ResolveMode::Deferred, 64);
    ctx.begin_unit(Some("pools.cs"));

    let a = ctx.intern_string("Hello", true, false);
    let b = ctx.intern_string("hello", false, false);
    let tag = ctx.intern_string("t", true, true);
    let f = ctx.intern_float(0.5);
    assert_eq!(a, b);
    assert_eq!(ctx.intern_float(0.5), f);

    let image = ctx.finish().unwrap();
    assert_eq!(image.global_strings.len(), 6 + 7);
    assert_eq!(image.global_string(tag), Some("t"));
    assert_eq!(image.global_floats, vec![0.5]);

    ctx.begin_unit(Some("pools.cs"));
    assert_eq!(ctx.intern_string("Hello", true, false), a);
    assert_eq!(ctx.intern_float(0.5), f);
}

#[test]
fn warnings_as_errors_stops_at_first_diagnostic() {
    let recorder = Recorder::default();
    let options = CompilerOptions {
        warnings_as_errors: true,
        ..CompilerOptions::default()
    };
    let mut ctx = CompileContext::with_sink(options, Box::new(recorder.clone()));
    ctx.begin_unit(Some("strict.cs"));

    ctx.assign_var("%k", TypeClass::UInt, true, 1).unwrap();
    assert!(ctx.assign_var("%k", TypeClass::UInt, false, 2).is_err());
    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![DiagnosticKind::ConstantReassignment]
    );
}
