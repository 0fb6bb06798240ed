//! Instruction behaviour tests for the 65C816.

use emu_core::{Bus, Cpu, SimpleBus};
use wdc_65816::{Mode, Wdc65816, flags};

/// Fresh CPU in native mode with the given widths.
fn native_cpu(wide_a: bool, wide_index: bool) -> Wdc65816 {
    let mut cpu = Wdc65816::new();
    cpu.regs.e = false;
    cpu.regs.p.set_if(flags::M, !wide_a);
    cpu.regs.p.set_if(flags::X, !wide_index);
    cpu
}

/// Load a program at $00:8000 and point PC at it.
fn setup_program(bus: &mut SimpleBus, cpu: &mut Wdc65816, program: &[u8]) {
    bus.load(0x8000, program);
    cpu.regs.pb = 0;
    cpu.regs.pc = 0x8000;
}

fn run(cpu: &mut Wdc65816, bus: &mut SimpleBus, instructions: usize) {
    for _ in 0..instructions {
        cpu.step(bus);
    }
}

// ----------------------------------------------------------------------
// ADC / SBC
// ----------------------------------------------------------------------

#[test]
fn test_adc_8bit_all_operand_pairs() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    for a in 0..=0xFFu16 {
        for operand in 0..=0xFFu16 {
            for carry_in in [false, true] {
                bus.load(0x8000, &[0x69, operand as u8]);
                cpu.regs.pc = 0x8000;
                cpu.regs.a = 0x5500 | a;
                cpu.regs.p.set_if(flags::C, carry_in);
                cpu.step(&mut bus);

                let sum = a + operand + u16::from(carry_in);
                let result = sum & 0xFF;
                let overflow = !(a ^ operand) & (a ^ result) & 0x80 != 0;
                assert_eq!(cpu.regs.a, 0x5500 | result, "ADC {a:02X}+{operand:02X}");
                assert_eq!(cpu.regs.p.is_set(flags::C), sum > 0xFF, "carry {a:02X}+{operand:02X}");
                assert_eq!(cpu.regs.p.is_set(flags::V), overflow, "overflow {a:02X}+{operand:02X}");
                assert_eq!(cpu.regs.p.is_set(flags::Z), result == 0);
                assert_eq!(cpu.regs.p.is_set(flags::N), result & 0x80 != 0);
            }
        }
    }
}

#[test]
fn test_sbc_8bit_all_operand_pairs() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    for a in 0..=0xFFu16 {
        for operand in 0..=0xFFu16 {
            for carry_in in [false, true] {
                bus.load(0x8000, &[0xE9, operand as u8]);
                cpu.regs.pc = 0x8000;
                cpu.regs.a = a;
                cpu.regs.p.set_if(flags::C, carry_in);
                cpu.step(&mut bus);

                let inverted = !operand & 0xFF;
                let sum = a + inverted + u16::from(carry_in);
                let result = sum & 0xFF;
                let overflow = !(a ^ inverted) & (a ^ result) & 0x80 != 0;
                assert_eq!(cpu.regs.a, result, "SBC {a:02X}-{operand:02X}");
                assert_eq!(cpu.regs.p.is_set(flags::C), sum > 0xFF, "carry {a:02X}-{operand:02X}");
                assert_eq!(cpu.regs.p.is_set(flags::V), overflow, "overflow {a:02X}-{operand:02X}");
            }
        }
    }
}

#[test]
fn test_adc_sbc_16bit_operand_grid() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(true, false);
    for a in (0..=0xFFFFu32).step_by(251).chain([0x7FFF, 0x8000, 0xFFFF]) {
        for operand in (0..=0xFFFFu32).step_by(241).chain([0x0001, 0x7FFF, 0x8000, 0xFFFF]) {
            for carry_in in [false, true] {
                bus.load(0x8000, &[0x69, operand as u8, (operand >> 8) as u8]);
                cpu.regs.pc = 0x8000;
                cpu.regs.a = a as u16;
                cpu.regs.p.set_if(flags::C, carry_in);
                cpu.step(&mut bus);

                let sum = a + operand + u32::from(carry_in);
                let result = sum & 0xFFFF;
                assert_eq!(u32::from(cpu.regs.a), result, "ADC {a:04X}+{operand:04X}");
                assert_eq!(cpu.regs.p.is_set(flags::C), sum > 0xFFFF);
                assert_eq!(
                    cpu.regs.p.is_set(flags::V),
                    !(a ^ operand) & (a ^ result) & 0x8000 != 0
                );
                assert_eq!(cpu.regs.p.is_set(flags::N), result & 0x8000 != 0);

                bus.load(0x8000, &[0xE9, operand as u8, (operand >> 8) as u8]);
                cpu.regs.pc = 0x8000;
                cpu.regs.a = a as u16;
                cpu.regs.p.set_if(flags::C, carry_in);
                cpu.step(&mut bus);

                let inverted = !operand & 0xFFFF;
                let sum = a + inverted + u32::from(carry_in);
                let result = sum & 0xFFFF;
                assert_eq!(u32::from(cpu.regs.a), result, "SBC {a:04X}-{operand:04X}");
                assert_eq!(cpu.regs.p.is_set(flags::C), sum > 0xFFFF);
                assert_eq!(
                    cpu.regs.p.is_set(flags::V),
                    !(a ^ inverted) & (a ^ result) & 0x8000 != 0
                );
            }
        }
    }
}

#[test]
fn test_adc_decimal_mode() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    // SED; CLC; LDA #$19; ADC #$03
    setup_program(&mut bus, &mut cpu, &[0xF8, 0x18, 0xA9, 0x19, 0x69, 0x03]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.a & 0xFF, 0x22);
    assert!(!cpu.regs.p.is_set(flags::C));
}

// ----------------------------------------------------------------------
// Addressing
// ----------------------------------------------------------------------

#[test]
fn test_direct_page_wraps_in_bank_zero() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    let mut d_values: Vec<u16> = (0..=0xFFFFu32).step_by(0x101).map(|d| d as u16).collect();
    d_values.extend([0x00FF, 0xFF01, 0xFFFF]);
    for d in d_values {
        for offset in 0..=0xFFu16 {
            cpu.regs.d = d;
            cpu.regs.db = 0x7E;
            cpu.regs.pc = 0x8000;
            bus.write(0x8000, offset as u8);
            let addr = cpu.effective_address(&mut bus, Mode::Direct);
            assert_eq!(
                addr,
                u32::from(d.wrapping_add(offset)),
                "D={d:04X} dp={offset:02X} must stay in bank 0"
            );
            assert_eq!(cpu.regs.pc, 0x8001, "direct page operand is one byte");
        }
    }
}

#[test]
fn test_direct_page_16bit_read_wraps() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(true, true);
    cpu.regs.d = 0xFF00;
    bus.write(0xFFFF, 0x34);
    bus.write(0x0000, 0x12);
    bus.write(0x1_0000, 0xEE);
    // LDA $FF
    setup_program(&mut bus, &mut cpu, &[0xA5, 0xFF]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x1234, "high byte comes from $00:0000, not $01:0000");
}

#[test]
fn test_operand_widths_advance_pc() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(true, false);
    // LDA #$1234; LDA $1234; LDA $7E1234; LDX #$12
    setup_program(
        &mut bus,
        &mut cpu,
        &[0xA9, 0x34, 0x12, 0xAD, 0x34, 0x12, 0xAF, 0x34, 0x12, 0x7E, 0xA2, 0x12],
    );
    let expected = [0x8003, 0x8006, 0x800A, 0x800C];
    for pc in expected {
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, pc);
    }
}

// ----------------------------------------------------------------------
// Control flow
// ----------------------------------------------------------------------

#[test]
fn test_jsr_rts_returns_after_call_for_every_pc() {
    let mut bus = SimpleBus::new();
    let mut cpu = Wdc65816::new();
    // Code in bank 1 keeps it clear of the bank 0 stack.
    cpu.regs.pb = 0x01;
    for start in 0..=0xFFFDu16 {
        let target: u16 = if (0x3FFE..=0x4000).contains(&start) { 0xC000 } else { 0x4000 };
        let code = 0x01_0000 | u32::from(start);
        bus.write(code, 0x20);
        bus.write(0x01_0000 | u32::from(start.wrapping_add(1)), target as u8);
        bus.write(0x01_0000 | u32::from(start.wrapping_add(2)), (target >> 8) as u8);
        bus.write(0x01_0000 | u32::from(target), 0x60);

        cpu.regs.pc = start;
        cpu.regs.s = 0x01FF;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, target);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, start.wrapping_add(3), "RTS from JSR at {start:04X}");
        assert_eq!(cpu.regs.s, 0x01FF);
    }
}

#[test]
fn test_jsl_rtl_restores_bank() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.s = 0x1FFF;
    // JSL $02:9000
    setup_program(&mut bus, &mut cpu, &[0x22, 0x00, 0x90, 0x02]);
    bus.write(0x02_9000, 0x6B);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x02_9000);
    assert_eq!(bus.peek(0x1FFF), 0x00, "PB pushed first");
    assert_eq!(bus.peek(0x1FFE), 0x80);
    assert_eq!(bus.peek(0x1FFD), 0x03, "return address is PC-1");
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x00_8004);
}

#[test]
fn test_branch_taken_iff_predicate_holds() {
    let cases: [(u8, u8, bool); 8] = [
        (0x10, flags::N, false), // BPL
        (0x30, flags::N, true),  // BMI
        (0x50, flags::V, false), // BVC
        (0x70, flags::V, true),  // BVS
        (0x90, flags::C, false), // BCC
        (0xB0, flags::C, true),  // BCS
        (0xD0, flags::Z, false), // BNE
        (0xF0, flags::Z, true),  // BEQ
    ];
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    for (opcode, flag, taken_when_set) in cases {
        for flag_set in [false, true] {
            for displacement in [0x00u8, 0x05, 0x7F, 0x80, 0xFB] {
                setup_program(&mut bus, &mut cpu, &[opcode, displacement]);
                cpu.regs.p.set_if(flag, flag_set);
                cpu.step(&mut bus);
                let after_operand = 0x8002u16;
                let expected = if flag_set == taken_when_set {
                    after_operand.wrapping_add(displacement as i8 as u16)
                } else {
                    after_operand
                };
                assert_eq!(
                    cpu.regs.pc, expected,
                    "opcode {opcode:02X} flag {flag:02X}={flag_set} d={displacement:02X}"
                );
            }
        }
    }
}

#[test]
fn test_bra_and_brl_always_branch() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    setup_program(&mut bus, &mut cpu, &[0x80, 0xFE]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x8000, "BRA -2 loops on itself");

    setup_program(&mut bus, &mut cpu, &[0x82, 0x00, 0x10]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x9003);
}

#[test]
fn test_jmp_forms() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.pb = 0x03;
    cpu.regs.pc = 0x8000;
    cpu.regs.x = 0x0002;
    // JMP ($1000) with pointer in bank 0
    bus.load(0x03_8000, &[0x6C, 0x00, 0x10]);
    bus.load(0x00_1000, &[0x00, 0xA0]);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x03_A000, "JMP (abs) keeps PB");

    // JMP ($2000,X) with pointer in the program bank
    bus.load(0x03_A000, &[0x7C, 0x00, 0x20]);
    bus.load(0x03_2002, &[0x34, 0x12]);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x03_1234);

    // JML [$3000]
    bus.load(0x03_1234, &[0xDC, 0x00, 0x30]);
    bus.load(0x00_3000, &[0x78, 0x56, 0x05]);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x05_5678);
}

#[test]
fn test_brk_native_pushes_bank_and_uses_native_vector() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.s = 0x1FFF;
    cpu.regs.pb = 0x02;
    cpu.regs.pc = 0x8000;
    cpu.regs.p.clear(flags::I);
    bus.load(0x02_8000, &[0x00, 0xEA]);
    bus.load(0xFFE6, &[0x00, 0x90]);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x00_9000);
    assert!(cpu.regs.p.is_set(flags::I));
    assert_eq!(bus.peek(0x1FFF), 0x02, "PB pushed");
    assert_eq!(bus.peek(0x1FFE), 0x80);
    assert_eq!(bus.peek(0x1FFD), 0x02, "return skips the signature byte");

    // RTI
    bus.write(0x9000, 0x40);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), 0x02_8002);
    assert!(!cpu.regs.p.is_set(flags::I));
}

#[test]
fn test_brk_emulation_uses_fffe() {
    let mut bus = SimpleBus::new();
    let mut cpu = Wdc65816::new();
    bus.load(0xFFFE, &[0x00, 0xC0]);
    setup_program(&mut bus, &mut cpu, &[0x00, 0x00]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0xC000);
    assert_eq!(cpu.regs.s, 0x01FC, "three bytes pushed in emulation mode");
    assert!(bus.peek(0x01FD) & flags::B != 0, "B set on the pushed status");
}

#[test]
fn test_nmi_request_is_serviced_next_step() {
    let mut bus = SimpleBus::new();
    let mut cpu = Wdc65816::new();
    bus.load(0xFFFA, &[0x00, 0xD0]);
    setup_program(&mut bus, &mut cpu, &[0xEA]);
    cpu.nmi();
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0xD000);
}

#[test]
fn test_wai_resumes_on_irq() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.s = 0x1FFF;
    cpu.regs.p.clear(flags::I);
    bus.load(0xFFEE, &[0x00, 0xB0]);
    setup_program(&mut bus, &mut cpu, &[0xCB, 0xEA]);
    cpu.step(&mut bus);
    assert!(cpu.is_waiting());
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x8001, "WAI idles");
    assert!(cpu.interrupt());
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0xB000);
}

#[test]
fn test_stp_halts() {
    let mut bus = SimpleBus::new();
    let mut cpu = Wdc65816::new();
    setup_program(&mut bus, &mut cpu, &[0xDB, 0xEA]);
    cpu.step(&mut bus);
    assert!(cpu.is_halted());
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x8001);
    cpu.reset();
    assert!(!cpu.is_halted());
}

// ----------------------------------------------------------------------
// Stack
// ----------------------------------------------------------------------

#[test]
fn test_push_pull_registers() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(true, true);
    cpu.regs.s = 0x1FFF;
    cpu.regs.a = 0xBEEF;
    cpu.regs.x = 0x1234;
    cpu.regs.y = 0x0000;
    cpu.regs.d = 0x4300;
    cpu.regs.db = 0x7E;
    // PHA PHX PHD PHB LDA #0 PLB PLD PLY PLA
    setup_program(
        &mut bus,
        &mut cpu,
        &[0x48, 0xDA, 0x0B, 0x8B, 0xA9, 0x00, 0x00, 0xAB, 0x2B, 0x7A, 0x68],
    );
    run(&mut cpu, &mut bus, 9);
    assert_eq!(cpu.regs.db, 0x7E);
    assert_eq!(cpu.regs.d, 0x4300);
    assert_eq!(cpu.regs.y, 0x1234, "PLY pops what PHX pushed");
    assert_eq!(cpu.regs.a, 0xBEEF);
    assert_eq!(cpu.regs.s, 0x1FFF);
    assert!(!cpu.regs.p.is_set(flags::Z));
    assert!(cpu.regs.p.is_set(flags::N), "PLA sets N from bit 15");
}

#[test]
fn test_pla_sets_zero_flag() {
    let mut bus = SimpleBus::new();
    let mut cpu = Wdc65816::new();
    // LDA #$00; PHA; LDA #$44; PLA
    setup_program(&mut bus, &mut cpu, &[0xA9, 0x00, 0x48, 0xA9, 0x44, 0x68]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.a & 0xFF, 0x00);
    assert!(cpu.regs.p.is_set(flags::Z));
}

#[test]
fn test_pea_pei_per() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.s = 0x1FFF;
    bus.load(0x0010, &[0xCD, 0xAB]);
    // PEA $1234; PEI ($10); PER +$0100
    setup_program(
        &mut bus,
        &mut cpu,
        &[0xF4, 0x34, 0x12, 0xD4, 0x10, 0x62, 0x00, 0x01],
    );
    run(&mut cpu, &mut bus, 3);
    assert_eq!(bus.read_word(0x1FFE), 0x1234);
    assert_eq!(bus.read_word(0x1FFC), 0xABCD);
    assert_eq!(bus.read_word(0x1FFA), 0x8108);
}

// ----------------------------------------------------------------------
// Width-conditional flags
// ----------------------------------------------------------------------

#[test]
fn test_compare_uses_active_width() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, true);
    cpu.regs.a = 0x0180;
    // CMP #$80 in 8-bit mode ignores the hidden B byte
    setup_program(&mut bus, &mut cpu, &[0xC9, 0x80]);
    cpu.step(&mut bus);
    assert!(cpu.regs.p.is_set(flags::Z));
    assert!(cpu.regs.p.is_set(flags::C));

    // CPX #$8000 with X=$7FFF: borrow, N from bit 15 of the difference
    cpu.regs.x = 0x7FFF;
    setup_program(&mut bus, &mut cpu, &[0xE0, 0x00, 0x80]);
    cpu.step(&mut bus);
    assert!(!cpu.regs.p.is_set(flags::C));
    assert!(cpu.regs.p.is_set(flags::N));
    assert_eq!(cpu.regs.pc, 0x8003);
}

#[test]
fn test_shift_carry_comes_from_active_width() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.a = 0x0080;
    // ASL A (8-bit): bit 7 into carry
    setup_program(&mut bus, &mut cpu, &[0x0A]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x0000);
    assert!(cpu.regs.p.is_set(flags::C));
    assert!(cpu.regs.p.is_set(flags::Z));

    let mut cpu = native_cpu(true, false);
    cpu.regs.a = 0x0080;
    setup_program(&mut bus, &mut cpu, &[0x0A]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x0100);
    assert!(!cpu.regs.p.is_set(flags::C), "16-bit ASL carries from bit 15");
}

#[test]
fn test_inc_memory_16bit_wraps() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(true, false);
    bus.load(0x0020, &[0xFF, 0xFF]);
    // INC $20
    setup_program(&mut bus, &mut cpu, &[0xE6, 0x20]);
    cpu.step(&mut bus);
    assert_eq!(bus.read_word(0x0020), 0x0000);
    assert!(cpu.regs.p.is_set(flags::Z));
}

#[test]
fn test_tsb_trb() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(false, false);
    cpu.regs.a = 0x0F;
    bus.write(0x0030, 0xF0);
    // TSB $30; TRB $30
    setup_program(&mut bus, &mut cpu, &[0x04, 0x30, 0x14, 0x30]);
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x0030), 0xFF);
    assert!(cpu.regs.p.is_set(flags::Z), "no common bits before TSB");
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x0030), 0xF0);
    assert!(!cpu.regs.p.is_set(flags::Z));
}

#[test]
fn test_transfers_follow_widths() {
    let mut bus = SimpleBus::new();
    let mut cpu = native_cpu(true, false);
    cpu.regs.a = 0x1234;
    // TAX (8-bit index); XBA; TCD
    setup_program(&mut bus, &mut cpu, &[0xAA, 0xEB, 0x5B]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.x, 0x0034);
    assert_eq!(cpu.regs.a, 0x3412);
    assert_eq!(cpu.regs.d, 0x3412);
}

#[test]
fn test_observable_paths() {
    use emu_core::{Observable, Value};
    let cpu = native_cpu(true, true);
    assert_eq!(cpu.query("e"), Some(Value::Bool(false)));
    assert_eq!(cpu.query("flags.m"), Some(Value::Bool(false)));
    assert_eq!(cpu.query("nonsense"), None);
    for path in cpu.query_paths() {
        assert!(cpu.query(path).is_some(), "{path} should resolve");
    }
}
