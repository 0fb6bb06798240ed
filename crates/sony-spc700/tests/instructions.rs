//! SPC700 instruction behaviour tests.

use emu_core::{Bus, Cpu, SimpleBus};
use sony_spc700::{Spc700, flags};

fn setup(program: &[u8]) -> (Spc700, SimpleBus) {
    let mut bus = SimpleBus::with_size(0x1_0000);
    let mut cpu = Spc700::new();
    bus.load(0x0400, program);
    cpu.regs.pc = 0x0400;
    (cpu, bus)
}

fn run(cpu: &mut Spc700, bus: &mut SimpleBus, instructions: usize) -> u32 {
    (0..instructions).map(|_| cpu.step(bus)).sum()
}

#[test]
fn test_adc_all_operand_pairs() {
    let (mut cpu, mut bus) = setup(&[]);
    for a in 0..=0xFFu16 {
        for operand in 0..=0xFFu16 {
            for carry_in in [false, true] {
                // ADC A,#imm
                bus.load(0x0400, &[0x88, operand as u8]);
                cpu.regs.pc = 0x0400;
                cpu.regs.a = a as u8;
                cpu.regs.set_flag(flags::C, carry_in);
                cpu.step(&mut bus);

                let sum = a + operand + u16::from(carry_in);
                let result = sum & 0xFF;
                assert_eq!(u16::from(cpu.regs.a), result, "ADC {a:02X}+{operand:02X}");
                assert_eq!(cpu.regs.flag(flags::C), sum > 0xFF);
                assert_eq!(
                    cpu.regs.flag(flags::V),
                    !(a ^ operand) & (a ^ result) & 0x80 != 0
                );
                assert_eq!(cpu.regs.flag(flags::H), (a ^ operand ^ result) & 0x10 != 0);
            }
        }
    }
}

#[test]
fn test_sbc_borrow_clears_carry() {
    // SETC; MOV A,#$10; SBC A,#$20
    let (mut cpu, mut bus) = setup(&[0x80, 0xE8, 0x10, 0xA8, 0x20]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.a, 0xF0);
    assert!(!cpu.regs.flag(flags::C), "borrow");
    assert!(cpu.regs.flag(flags::N));
}

#[test]
fn test_call_ret_for_every_pc() {
    let (mut cpu, mut bus) = setup(&[]);
    // Stack lives at $01xx, keep code out of it.
    for start in (0x0200..=0xFFFCu16).step_by(3) {
        let target: u16 = if (0x3FFE..=0x4000).contains(&start) { 0x8000 } else { 0x4000 };
        let [lo, hi] = target.to_le_bytes();
        bus.load(u32::from(start), &[0x3F, lo, hi]);
        bus.write(u32::from(target), 0x6F);
        cpu.regs.pc = start;
        cpu.regs.sp = 0xEF;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, target);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, start.wrapping_add(3), "RET after CALL at {start:04X}");
        assert_eq!(cpu.regs.sp, 0xEF);
    }
}

#[test]
fn test_tcall_uses_descending_vectors() {
    for n in 0..16u8 {
        let (mut cpu, mut bus) = setup(&[(n << 4) | 0x01]);
        let vector = 0xFFDE - 2 * u32::from(n);
        bus.write_word(vector, 0x1200 + u16::from(n));
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 0x1200 + u16::from(n), "TCALL {n}");
        assert_eq!(bus.peek(0x01EF), 0x04, "return address high byte pushed first");
        assert_eq!(bus.peek(0x01EE), 0x01);
    }
}

#[test]
fn test_pcall_targets_page_ff() {
    let (mut cpu, mut bus) = setup(&[0x4F, 0x20]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0xFF20);
}

#[test]
fn test_brk_reti() {
    let (mut cpu, mut bus) = setup(&[0x0F]);
    bus.write_word(0xFFDE, 0x3000);
    bus.write(0x3000, 0x7F);
    cpu.regs.psw = flags::C;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x3000);
    assert!(cpu.regs.flag(flags::B));
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0401);
    assert_eq!(cpu.regs.psw, flags::C, "RETI restores PSW");
}

#[test]
fn test_branch_predicates() {
    let cases: [(u8, u8, bool); 8] = [
        (0x10, flags::N, false),
        (0x30, flags::N, true),
        (0x50, flags::V, false),
        (0x70, flags::V, true),
        (0x90, flags::C, false),
        (0xB0, flags::C, true),
        (0xD0, flags::Z, false),
        (0xF0, flags::Z, true),
    ];
    for (opcode, flag, taken_when_set) in cases {
        for set in [false, true] {
            let (mut cpu, mut bus) = setup(&[opcode, 0xF0]);
            cpu.regs.set_flag(flag, set);
            let cycles = cpu.step(&mut bus);
            if set == taken_when_set {
                assert_eq!(cpu.regs.pc, 0x0402u16.wrapping_sub(0x10));
                assert_eq!(cycles, 4);
            } else {
                assert_eq!(cpu.regs.pc, 0x0402);
                assert_eq!(cycles, 2);
            }
        }
    }
}

#[test]
fn test_dbnz_y_loop_counts_down() {
    // MOV Y,#5; loop: INC A; DBNZ Y,loop
    let (mut cpu, mut bus) = setup(&[0x8D, 0x05, 0xBC, 0xFE, 0xFD]);
    cpu.regs.a = 0;
    run(&mut cpu, &mut bus, 1 + 5 * 2);
    assert_eq!(cpu.regs.a, 5);
    assert_eq!(cpu.regs.y, 0);
    assert_eq!(cpu.regs.pc, 0x0405);
}

#[test]
fn test_cbne_waits_for_value() {
    // loop: CBNE $F4,loop
    let (mut cpu, mut bus) = setup(&[0x2E, 0xF4, 0xFD]);
    cpu.regs.a = 0xCC;
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.pc, 0x0400, "still spinning");
    bus.write(0x00F4, 0xCC);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0403);
}

#[test]
fn test_bbs_bbc_test_bits() {
    let (mut cpu, mut bus) = setup(&[0xE3, 0x30, 0x10]);
    bus.write(0x0030, 0x80);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0413, "BBS7 taken");

    let (mut cpu, mut bus) = setup(&[0xF3, 0x30, 0x10]);
    bus.write(0x0030, 0x80);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0403, "BBC7 not taken");
}

#[test]
fn test_set1_clr1() {
    // SET1 $40.3; CLR1 $40.0
    let (mut cpu, mut bus) = setup(&[0x62, 0x40, 0x12, 0x40]);
    bus.write(0x0040, 0x01);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.peek(0x0040), 0x08);
}

#[test]
fn test_mov_x_autoincrement_fills_memory() {
    // MOV X,#$20; MOV A,#$AA; MOV (X)+,A x3
    let (mut cpu, mut bus) = setup(&[0xCD, 0x20, 0xE8, 0xAA, 0xAF, 0xAF, 0xAF]);
    run(&mut cpu, &mut bus, 5);
    assert_eq!(cpu.regs.x, 0x23);
    for addr in 0x20..0x23 {
        assert_eq!(bus.peek(addr), 0xAA);
    }
    assert_eq!(bus.peek(0x23), 0x00);
}

#[test]
fn test_movw_incw_decw() {
    // MOVW YA,$10; INCW $10; DECW $12
    let (mut cpu, mut bus) = setup(&[0xBA, 0x10, 0x3A, 0x10, 0x1A, 0x12]);
    bus.load(0x10, &[0xFF, 0x12, 0x00, 0x00]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.ya(), 0x12FF);
    assert_eq!(bus.read_word(0x10), 0x1300);
    assert_eq!(bus.read_word(0x12), 0xFFFF);
    assert!(cpu.regs.flag(flags::N));
}

#[test]
fn test_indirect_modes() {
    // MOV A,[$10+X]; MOV A,[$20]+Y
    let (mut cpu, mut bus) = setup(&[0xE7, 0x10, 0xF7, 0x20]);
    cpu.regs.x = 2;
    cpu.regs.y = 3;
    bus.load(0x12, &[0x00, 0x30]);
    bus.load(0x20, &[0x00, 0x50]);
    bus.write(0x3000, 0x11);
    bus.write(0x5003, 0x22);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x11);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x22);
}

#[test]
fn test_push_pop_round_trip() {
    // PUSH A; PUSH X; PUSH Y; POP A; POP X; POP Y
    let (mut cpu, mut bus) = setup(&[0x2D, 0x4D, 0x6D, 0xAE, 0xCE, 0xEE]);
    cpu.regs.a = 1;
    cpu.regs.x = 2;
    cpu.regs.y = 3;
    run(&mut cpu, &mut bus, 6);
    assert_eq!((cpu.regs.a, cpu.regs.x, cpu.regs.y), (3, 2, 1));
    assert_eq!(cpu.regs.sp, 0xEF);
}

#[test]
fn test_stop_halts_until_reset() {
    let (mut cpu, mut bus) = setup(&[0xFF, 0x00]);
    cpu.step(&mut bus);
    assert!(cpu.is_halted());
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0401);

    bus.write_word(0xFFFE, 0x0400);
    cpu.reset_from_vector(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.regs.pc, 0x0400);
}

#[test]
fn test_observable_paths_resolve() {
    use emu_core::Observable;
    let cpu = Spc700::new();
    for path in cpu.query_paths() {
        assert!(cpu.query(path).is_some(), "{path}");
    }
}
