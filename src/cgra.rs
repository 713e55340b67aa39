//! The full CGRA: two columns, each with an LCU, LSU, MXCU, and four RCs
//! wired into a torus, sharing one SPM, one kernel-memory table, and one
//! global instruction memory.

use crate::consts::{CGRA_COLS, CGRA_ROWS, N_VWR_PER_COL};
use crate::error::{ArbitrationError, SimError};
use crate::imem::Imem;
use crate::kmem::{ColumnUsage, KernelConfig, Kmem};
use crate::slots::lcu::Lcu;
use crate::slots::lsu::Lsu;
use crate::slots::mxcu::{ColumnAluResults, Mxcu};
use crate::slots::rc::{Neighbours, Rc};
use crate::spm::Spm;
use crate::srf::{self, Srf, SrfAccess};
use crate::vwr::Vwr;

/// One column's full datapath: one each of LCU/LSU/MXCU, four RCs, one
/// SRF, and three VWRs.
#[derive(Debug, Clone)]
pub struct Column {
    pub lcu: Lcu,
    pub lsu: Lsu,
    pub mxcu: Mxcu,
    pub rcs: [Rc; CGRA_ROWS],
    pub srf: Srf,
    pub vwrs: [Vwr; N_VWR_PER_COL],
    /// Branch target requested by this column's LCU this cycle, if any.
    pub lcu_branch: Option<usize>,
    /// Whether this column's LCU requested kernel exit this cycle.
    pub lcu_exit: bool,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            lcu: Lcu::new(),
            lsu: Lsu::new(),
            mxcu: Mxcu::new(),
            rcs: std::array::from_fn(|_| Rc::new()),
            srf: Srf::new(),
            vwrs: std::array::from_fn(|_| Vwr::new()),
            lcu_branch: None,
            lcu_exit: false,
        }
    }
}

/// The whole accelerator: both columns, the shared scratchpad, and the
/// kernel/instruction memories.
#[derive(Debug, Clone)]
pub struct Cgra {
    pub columns: [Column; CGRA_COLS],
    pub spm: Spm,
    pub kmem: Kmem,
    pub imem: Imem,
}

impl Default for Cgra {
    fn default() -> Self {
        Self::new()
    }
}

/// The torus neighbour lookup used by `RCT`/`RCB`/`RCL`/`RCR` reads:
/// top/bottom wrap across columns, left/right wrap across rows within a
/// column. This reproduces the reference wiring exactly, including its
/// perhaps-unexpected choice of which axis each name refers to.
fn neighbour_indices(col: usize, row: usize) -> ((usize, usize), (usize, usize), (usize, usize), (usize, usize)) {
    let rct_col = if col == 0 { CGRA_COLS - 1 } else { col - 1 };
    let rcb_col = if col + 1 >= CGRA_COLS { 0 } else { col + 1 };
    let rcl_row = if row == 0 { CGRA_ROWS - 1 } else { row - 1 };
    let rcr_row = if row + 1 >= CGRA_ROWS { 0 } else { row + 1 };
    ((rct_col, row), (rcb_col, row), (col, rcl_row), (col, rcr_row))
}

impl Cgra {
    pub fn new() -> Self {
        Self {
            columns: std::array::from_fn(|_| Column::default()),
            spm: Spm::new(),
            kmem: Kmem::new(),
            imem: Imem::new(),
        }
    }

    pub fn kernel_config(
        &mut self,
        column_usage: ColumnUsage,
        num_instructions_per_col: u32,
        imem_add_start: u32,
        srf_spm_address: u32,
        kernel_number: usize,
    ) -> Result<(), SimError> {
        self.kmem.add_kernel(
            num_instructions_per_col,
            imem_add_start,
            column_usage,
            srf_spm_address,
            kernel_number,
        )
    }

    /// Validate and install a [`KernelConfig`], logging the result the
    /// way the reference driver prints `get_kernel_info` after loading.
    pub fn configure_kernel(&mut self, config: KernelConfig, kernel_number: usize) -> Result<(), SimError> {
        self.kmem.configure(config, kernel_number)?;
        let info = self.kmem.kernel_info(kernel_number)?;
        tracing::info!(kernel = kernel_number, "{}", info);
        Ok(())
    }

    /// Validate that a kernel's configuration is loadable. Unlike the
    /// reference implementation, instruction words are read directly out
    /// of the shared global IMEM by address during `run` rather than
    /// copied into a per-slot resident table first; the two are
    /// observably identical since nothing else writes the global IMEM
    /// between `kernel_config` and `run`.
    pub fn kernel_load(&mut self, kernel_number: usize) -> Result<(), SimError> {
        self.kmem.get_params(kernel_number)?;
        Ok(())
    }

    /// Run one loaded kernel to completion (or until an `EXIT`).
    pub fn run(&mut self, kernel_number: usize) -> Result<(), SimError> {
        let _span = tracing::info_span!("kernel_run", kernel = kernel_number).entered();
        let params = self.kmem.get_params(kernel_number)?;
        let n_instr = (params.num_instructions_minus_one + 1) as usize;
        let (start_col, end_col) = ColumnUsage::from_one_hot(params.column_usage)?.col_range();
        let srf_spm_bank = params.srf_spm_address;

        for col in start_col..=end_col {
            self.columns[col].lsu.regs[7] = srf_spm_bank as i32;
        }

        let mut pc: usize = 0;
        let mut exited = false;

        while pc < n_instr && !exited {
            for col in start_col..=end_col {
                let addr = params.imem_add_start as usize + pc;
                let lcu_word = crate::slots::lcu::LcuWord::decode(self.imem.lcu.get(addr)).unwrap_or_default();
                let lsu_word = crate::slots::lsu::LsuWord::decode(self.imem.lsu.get(addr)).unwrap_or_default();
                let mxcu_word = crate::slots::mxcu::MxcuWord::decode(self.imem.mxcu.get(addr)).unwrap_or_default();
                let rc_words: [crate::slots::rc::RcWord; CGRA_ROWS] =
                    std::array::from_fn(|row| crate::slots::rc::RcWord::decode(self.imem.rcs[row].get(addr)).unwrap_or_default());

                self.run_column_cycle(col, &lcu_word, &lsu_word, &mxcu_word, &rc_words)?;
                tracing::debug!(pc, col, lcu = %lcu_word, lsu = %lsu_word, mxcu = %mxcu_word, "cycle");
            }

            self.commit_cycle();
            pc += 1;

            let mut branches = 0usize;
            let mut branch_pc = pc;
            for col in start_col..=end_col {
                if let Some(target) = self.columns[col].lcu_branch.take() {
                    branches += 1;
                    branch_pc = target;
                    tracing::debug!(col, target, "branch taken");
                }
            }
            if branches > 1 {
                return Err(SimError::MultipleBranches);
            }
            if branches == 1 {
                pc = branch_pc;
            }

            for col in start_col..=end_col {
                if self.columns[col].lcu_exit {
                    exited = true;
                }
            }
        }
        Ok(())
    }

    /// Run every slot of one column for one cycle, in the reference
    /// ordering: LSU, then all RCs, then MXCU (which may redirect VWR
    /// writes), then LCU last (it needs RC flags for RC-routed branches).
    fn run_column_cycle(
        &mut self,
        col: usize,
        lcu_word: &crate::slots::lcu::LcuWord,
        lsu_word: &crate::slots::lsu::LsuWord,
        mxcu_word: &crate::slots::mxcu::MxcuWord,
        rc_words: &[crate::slots::rc::RcWord; CGRA_ROWS],
    ) -> Result<(), SimError> {
        let arbitration = self.arbitrate_srf(col, lcu_word, lsu_word, mxcu_word, rc_words)?;
        let srf_sel = arbitration.srf_sel;
        let srf_val = self.columns[col].srf.read(srf_sel);

        {
            let column = &mut self.columns[col];
            let mut vwrs = column.vwrs.clone();
            let _ = column
                .lsu
                .run(lsu_word, &mut self.spm, &mut vwrs, &mut column.srf, srf_sel);
            column.vwrs = vwrs;
        }

        for row in 0..CGRA_ROWS {
            let ((tc, tr), (bc, br), (lc, lr), (rc, rr)) = neighbour_indices(col, row);
            let top = self.columns[tc].rcs[tr].alu;
            let bottom = self.columns[bc].rcs[br].alu;
            let left = self.columns[lc].rcs[lr].alu;
            let right = self.columns[rc].rcs[rr].alu;
            let neighbours = Neighbours {
                top: &top,
                bottom: &bottom,
                left: &left,
                right: &right,
            };
            let mxcu_r0 = self.columns[col].mxcu.regs[0];
            let masks = [
                self.columns[col].mxcu.regs[5],
                self.columns[col].mxcu.regs[6],
                self.columns[col].mxcu.regs[7],
            ];
            let vwrs = self.columns[col].vwrs.clone();
            let result = self.columns[col].rcs[row].run(&rc_words[row], &vwrs, mxcu_r0, masks, row, srf_val, &neighbours);
            if let Err(e) = result {
                // Faithfully unsupported at execution time; the ALU's
                // new_res is left at its previous value, matching an
                // operation that never reaches a write.
                tracing::warn!(col, row, error = %e, "unsupported RC operation reached at runtime");
            }
        }

        let rc_new_res: [i32; CGRA_ROWS] = std::array::from_fn(|row| self.columns[col].rcs[row].alu.new_res);
        let results = ColumnAluResults {
            lcu_new_res: self.columns[col].lcu.alu.new_res,
            rc0_new_res: rc_new_res[0],
            lsu_new_res: self.columns[col].lsu.alu.new_res,
            rc_new_res,
        };
        let srf_write = {
            let column = &mut self.columns[col];
            let mut vwr = column.vwrs[mxcu_word.vwr_sel as usize].clone();
            let write = column.mxcu.run(mxcu_word, srf_val, &results, &mut vwr);
            column.vwrs[mxcu_word.vwr_sel as usize] = vwr;
            write
        };

        let rc_flags: [(bool, bool); CGRA_ROWS] =
            std::array::from_fn(|row| (self.columns[col].rcs[row].alu.new_res == 0, self.columns[col].rcs[row].alu.new_res > 0));
        let outcome = self.columns[col].lcu.run(lcu_word, srf_val, &rc_flags);

        if let Some(value) = srf_write {
            self.columns[col].srf.write(srf_sel, value);
        }
        self.columns[col].lcu_branch = if outcome.branch { Some(outcome.branch_pc as usize) } else { None };
        self.columns[col].lcu_exit = outcome.exit;

        Ok(())
    }

    /// Re-derive each slot's SRF access for this cycle from its own decoded
    /// word and run it back through [`srf::arbitrate`] as a defensive
    /// run-time check. Whether a slot's own mux selects the SRF input is
    /// encoded directly in that slot's word, so the read side below comes
    /// from `lcu_word`/`lsu_word`/`rc_words` themselves; which slot (if
    /// any) is allowed to write is only ever encoded in the MXCU word's
    /// `alu_srf_write`/`srf_we` fields (the instruction format has no
    /// per-slot write-request bit), so the write side is derived from
    /// `mxcu_word` rather than invented. The resolved index handed back to
    /// the caller is always `mxcu_word.srf_sel`, the one value every slot
    /// in the column actually reads against this cycle; `arbitrate` here
    /// exists to reject a cycle whose words disagree, not to recompute it.
    fn arbitrate_srf(
        &self,
        _col: usize,
        lcu_word: &crate::slots::lcu::LcuWord,
        lsu_word: &crate::slots::lsu::LsuWord,
        mxcu_word: &crate::slots::mxcu::MxcuWord,
        rc_words: &[crate::slots::rc::RcWord; CGRA_ROWS],
    ) -> Result<srf::Arbitration, ArbitrationError> {
        use crate::slots::lcu::{MuxASel, MuxBSel};
        use crate::slots::mxcu::AluSrfWrite;

        let srf_sel = mxcu_word.srf_sel as usize;
        let writes_from = |source: AluSrfWrite| mxcu_word.srf_we && mxcu_word.alu_srf_write == source;

        let lcu_reads = lcu_word.muxa_sel == MuxASel::Srf as u8 || lcu_word.muxb_sel == MuxBSel::Srf as u8;
        let lcu_access = SrfAccess {
            read_idx: lcu_reads.then_some(srf_sel),
            write_idx: writes_from(AluSrfWrite::Lcu).then_some(srf_sel),
        };

        let lsu_reads = lsu_word.muxa_sel == 8 || lsu_word.muxb_sel == 8;
        let lsu_access = SrfAccess {
            read_idx: lsu_reads.then_some(srf_sel),
            write_idx: writes_from(AluSrfWrite::Lsu).then_some(srf_sel),
        };

        let rc_access: [SrfAccess; CGRA_ROWS] = std::array::from_fn(|row| SrfAccess {
            read_idx: (rc_words[row].muxa_sel == 3 || rc_words[row].muxb_sel == 3).then_some(srf_sel),
            write_idx: (row == 0 && writes_from(AluSrfWrite::Rc0)).then_some(srf_sel),
        });

        let arbitration = srf::arbitrate(lcu_access, lsu_access, &rc_access)?;
        Ok(srf::Arbitration {
            srf_sel,
            srf_we: mxcu_word.srf_we,
            write_source: arbitration.write_source,
        })
    }

    /// Commit every ALU in the CGRA exactly once: `res`/flags become
    /// visible to neighbours only after every slot in every column has
    /// run for the cycle.
    pub fn commit_cycle(&mut self) {
        for column in &mut self.columns {
            column.lcu.alu.commit();
            column.lsu.alu.commit();
            column.mxcu.alu.commit();
            for rc in &mut column.rcs {
                rc.alu.commit();
            }
        }
    }
}
