//! End-to-end scenarios: assemble, link, load, run.

use luz_asm::{Assembler, Linker};
use luz_sim::consts::USER_MEMORY_START;
use luz_sim::{AccessWidth, LuzSim};

fn link(sources: &[&str]) -> Vec<u8> {
    let asm = Assembler::new();
    let objects = sources
        .iter()
        .map(|source| asm.assemble(source).unwrap())
        .collect();
    Linker::default().link(objects).unwrap()
}

fn load(sources: &[&str]) -> LuzSim {
    LuzSim::new(link(sources))
}

#[test]
fn arithmetic_program() {
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            addi $r6, $r0, 25
            addi $r4, $r0, 400
            add $r8, $r6, $r4
            halt
    "#]);
    sim.run();
    assert!(sim.halted());
    assert_eq!(sim.reg_value(6), 25);
    assert_eq!(sim.reg_value(4), 400);
    assert_eq!(sim.reg_value(8), 425);
}

#[test]
fn startup_sets_stack_pointer_before_main() {
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            halt
    "#]);
    // li $sp (two words) then call asm_main.
    sim.step();
    sim.step();
    assert_eq!(sim.reg_named("$sp"), Some(0x0013_FFFC));
    sim.step();
    // call lands on asm_main, right after the 12-byte startup.
    assert_eq!(sim.pc(), USER_MEMORY_START + 12);
    assert_eq!(sim.reg_named("$ra"), Some(USER_MEMORY_START + 12));
}

#[test]
fn cross_object_call() {
    let main = r#"
            .segment text
            .global asm_main
        asm_main:
            call helper
            addi $r7, $r6, 1
            halt
    "#;
    let util = r#"
            .segment util
            .global helper
        helper:
            addi $r6, $r0, 41
            ret
    "#;
    let mut sim = load(&[main, util]);
    sim.run();
    assert_eq!(sim.reg_value(6), 41);
    assert_eq!(sim.reg_value(7), 42);
}

#[test]
fn data_segment_through_li_relocation() {
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            li $r9, table
            lw $r1, 0($r9)
            lw $r2, 4($r9)
            add $r3, $r1, $r2
            halt

            .segment data
        table: .word 100, 200
    "#]);
    sim.run();
    assert_eq!(sim.reg_value(1), 100);
    assert_eq!(sim.reg_value(2), 200);
    assert_eq!(sim.reg_value(3), 300);
}

#[test]
fn string_bytes_are_nul_terminated() {
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            li $r9, greeting
            lbu $r1, 0($r9)
            lbu $r2, 1($r9)
            lbu $r3, 2($r9)
            halt

            .segment data
        greeting: .string "hi"
    "#]);
    sim.run();
    assert_eq!(sim.reg_value(1), u32::from(b'h'));
    assert_eq!(sim.reg_value(2), u32::from(b'i'));
    assert_eq!(sim.reg_value(3), 0);
}

#[test]
fn debug_queue_collects_countdown() {
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            li $r9, 0xF0000
            addi $r5, $r0, 10
        loop:
            sw $r5, 0($r9)
            subi $r5, $r5, 1
            bnez $r5, loop
            halt
    "#]);
    sim.run();
    assert_eq!(
        sim.debug_queue().items(),
        &[10, 9, 8, 7, 6, 5, 4, 3, 2, 1]
    );
}

#[test]
fn heap_symbol_lands_after_all_segments() {
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            li $r9, __heap
            halt

            .segment data
            .word 1, 2, 3
    "#]);
    sim.run();
    // Layout: __startup (12 bytes), data (12), text (12), __heap.
    let heap_addr = sim.reg_value(9);
    assert_eq!(heap_addr, USER_MEMORY_START + 12 + 12 + 12);
    // The heap marker word is initialized to zero.
    assert_eq!(sim.memory().read_mem(heap_addr, AccessWidth::Word), Ok(0));
}

#[test]
fn image_and_memory_agree_word_for_word() {
    let image = link(&[r#"
            .segment text
            .global asm_main
        asm_main:
            addi $r1, $r0, 1
            halt

            .segment data
            .word 0xCAFEBABE, 0x8BADF00D
    "#]);
    let sim = LuzSim::new(image.clone());
    for (i, chunk) in image.chunks(4).enumerate() {
        let expected = u32::from_le_bytes(chunk.try_into().unwrap());
        assert_eq!(
            sim.memory()
                .read_instruction(USER_MEMORY_START + (i as u32) * 4),
            Ok(expected),
            "word {i}"
        );
    }
}

#[test]
fn exception_handler_installed_by_program() {
    // The program installs a handler, divides by zero, and the
    // handler records the cause before halting.
    let mut sim = load(&[r#"
            .segment text
            .global asm_main
        asm_main:
            li $r9, handler
            li $r8, 4
            sw $r9, 0($r8)
            div $r1, $r2, $r0
            halt

        handler:
            li $r8, 0x108
            lw $r5, 0($r8)
            halt
    "#]);
    sim.run();
    assert!(sim.halted());
    assert!(sim.in_exception());
    assert_eq!(sim.reg_value(5), 2);
    assert_eq!(sim.core_registers().exception_cause, 2);
}
