//! End-to-end kernel scenarios exercising the assembler and the cycle
//! simulator together, the way a user program would: assemble mnemonic
//! rows, load them into a `Cgra`, run, and inspect the resulting state.

use vwr2a::cgra::Cgra;
use vwr2a::consts::N_ELEMS_PER_VWR;
use vwr2a::error::AsmError;
use vwr2a::io::csv::{compile_asm_to_hex, load_kernel_hex, AsmRow};
use vwr2a::kmem::ColumnUsage;
use vwr2a::slots::lcu::{AluOp as LcuAluOp, Lcu, LcuWord};

fn nop_row() -> AsmRow {
    AsmRow {
        lcu: "NOP".to_string(),
        lsu: "NOP/NOP".to_string(),
        mxcu: "NOP".to_string(),
        rcs: std::array::from_fn(|_| "NOP".to_string()),
    }
}

/// Assemble and load a single-column kernel, then run it.
fn run_single_column_kernel(cgra: &mut Cgra, rows: Vec<AsmRow>) {
    let n = rows.len() as u32;
    cgra.kernel_config(ColumnUsage::Col0, n, 0, 0, 1).unwrap();
    let hex = compile_asm_to_hex(cgra, 1, 0, &rows).unwrap();
    load_kernel_hex(cgra, 1, &hex).unwrap();
    cgra.run(1).unwrap();
}

#[test]
fn vector_load_from_spm_line_lands_in_vwr_a() {
    let mut cgra = Cgra::new();
    let line: Vec<i32> = (1..=128).collect();
    cgra.spm.set_line(0, &line).unwrap();

    let mut row = nop_row();
    row.lsu = "NOP/LD.VWR VWR_A".to_string();
    run_single_column_kernel(&mut cgra, vec![row]);

    assert_eq!(cgra.columns[0].vwrs[0].as_slice(), line.as_slice());
}

#[test]
fn shuffle_even_interleaves_vwr_a_and_b_evens() {
    let mut cgra = Cgra::new();
    for i in 0..N_ELEMS_PER_VWR {
        cgra.columns[0].vwrs[0].set(i, i as i32).unwrap();
        cgra.columns[0].vwrs[1].set(i, 1000 + i as i32).unwrap();
    }

    let mut row = nop_row();
    row.lsu = "NOP/SH.EVEN".to_string();
    run_single_column_kernel(&mut cgra, vec![row]);

    let expected: Vec<i32> = (0..N_ELEMS_PER_VWR)
        .step_by(2)
        .map(|i| i as i32)
        .chain((0..N_ELEMS_PER_VWR).step_by(2).map(|i| 1000 + i as i32))
        .collect();
    assert_eq!(cgra.columns[0].vwrs[2].as_slice(), expected.as_slice());
}

/// Drives the LCU directly, cycle by cycle, rather than through `Cgra::run`:
/// the kernel branches back to its own first instruction every time the
/// condition holds, so running it to completion would loop forever. What's
/// under test is register persistence across cycles and the branch outcome
/// itself, both observable without actually looping.
#[test]
fn branch_loop_condition_holds_after_register_write() {
    let mut lcu = Lcu::new();

    let sadd = LcuWord {
        muxa_sel: 6, // ZERO
        muxb_sel: 7, // ONE
        alu_op: LcuAluOp::Sadd,
        rf_we: true,
        rf_wsel: 0,
        ..Default::default()
    };
    let outcome0 = lcu.run(&sadd, 0, &[(false, false); 4]);
    assert!(!outcome0.branch);
    assert_eq!(lcu.regs[0], 1);
    lcu.alu.commit();

    let beq = LcuWord {
        muxa_sel: 0, // R0
        muxb_sel: 7, // ONE
        alu_op: LcuAluOp::Beq,
        imm: 0,
        ..Default::default()
    };
    let outcome1 = lcu.run(&beq, 0, &[(false, false); 4]);
    assert!(outcome1.branch);
    assert_eq!(outcome1.branch_pc, 0);
    assert_eq!(lcu.regs[0], 1);
}

#[test]
fn mac_accumulate_end_to_end() {
    let mut cgra = Cgra::new();
    cgra.columns[0].rcs[0].regs[0] = 10;

    let mut row = nop_row();
    row.rcs[0] = "MAC R0, ONE, ONE".to_string();
    run_single_column_kernel(&mut cgra, vec![row]);

    let mut reference = vwr2a::alu::Alu::new();
    reference.mac(1, 1, 10);
    assert_eq!(cgra.columns[0].rcs[0].alu.res, reference.new_res);
    assert_eq!(cgra.columns[0].rcs[0].regs[0], reference.new_res);
}

#[test]
fn divergent_srf_reads_rejected_at_assemble_time() {
    let mut cgra = Cgra::new();
    cgra.kernel_config(ColumnUsage::Col0, 1, 0, 0, 1).unwrap();

    let mut row = nop_row();
    row.lcu = "SADD R0, SRF(1), ZERO".to_string();
    row.lsu = "SADD R0, SRF(2), ZERO/NOP".to_string();

    let err = compile_asm_to_hex(&mut cgra, 1, 0, &[row]).unwrap_err();
    match err {
        AsmError::Other { message, .. } => {
            assert!(message.contains("different registers"), "{message}");
        }
        other => panic!("expected AsmError::Other, got {other:?}"),
    }
}

#[test]
fn rc0_srf_write_is_not_visible_to_lcu_until_next_cycle() {
    let mut cgra = Cgra::new();
    cgra.columns[0].srf.write(2, 7);

    let mut row = nop_row();
    row.rcs[0] = "SADD SRF(2), ONE, ONE".to_string();
    row.lcu = "SADD R0, SRF(2), ZERO".to_string();
    run_single_column_kernel(&mut cgra, vec![row]);

    assert_eq!(cgra.columns[0].lcu.regs[0], 7, "LCU should see the pre-cycle SRF value");
    assert_eq!(cgra.columns[0].srf.read(2), 2, "RC0's result should land in the SRF after the cycle");
}
