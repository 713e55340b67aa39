//! Load Store Unit: the only slot with a path to the shared scratchpad
//! memory. Moves whole 128-word lines between the SPM and a column's
//! VWRs, shuffles VWR A/B data into VWR C, and also owns a small ALU.

use crate::alu::Alu;
use crate::bits::{extract, insert};
use crate::consts::{N_ELEMS_PER_VWR, SPM_NWORDS, SRF_N_REGS};
use crate::error::{AsmError, DecodeError};
use crate::spm::Spm;
use crate::srf::Srf;
use crate::vwr::Vwr;
use std::fmt;

pub const NUM_DREG: usize = 8;
pub const NUM_CREG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluOp {
    Land = 0,
    Lor = 1,
    Lxor = 2,
    Sadd = 3,
    Ssub = 4,
    Sll = 5,
    Srl = 6,
    Bitrev = 7,
}

impl AluOp {
    fn from_field(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::Land,
            1 => Self::Lor,
            2 => Self::Lxor,
            3 => Self::Sadd,
            4 => Self::Ssub,
            5 => Self::Sll,
            6 => Self::Srl,
            _ => Self::Bitrev,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Land => "LAND",
            Self::Lor => "LOR",
            Self::Lxor => "LXOR",
            Self::Sadd => "SADD",
            Self::Ssub => "SSUB",
            Self::Sll => "SLL",
            Self::Srl => "SRL",
            Self::Bitrev => "BITREV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemOp {
    Nop = 0,
    Load = 1,
    Store = 2,
    Shuffle = 3,
}

impl MemOp {
    fn from_field(v: u32) -> Self {
        match v & 0x3 {
            0 => Self::Nop,
            1 => Self::Load,
            2 => Self::Store,
            _ => Self::Shuffle,
        }
    }
}

/// Which VWR (or the SRF) a LOAD/STORE targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VwrSel {
    VwrA,
    VwrB,
    VwrC,
    Srf,
}

impl VwrSel {
    fn from_field(v: u32) -> Self {
        match v {
            0 => Self::VwrA,
            1 => Self::VwrB,
            2 => Self::VwrC,
            _ => Self::Srf,
        }
    }

    fn field(self) -> u32 {
        match self {
            Self::VwrA => 0,
            Self::VwrB => 1,
            Self::VwrC => 2,
            Self::Srf => 3,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::VwrA => "VWR_A",
            Self::VwrB => "VWR_B",
            Self::VwrC => "VWR_C",
            Self::Srf => "SRF",
        }
    }
}

/// Which shuffle of VWR A/B data to write into VWR C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShuffleSel {
    InterleaveUpper,
    InterleaveLower,
    EvenIndices,
    OddIndices,
    ConcatBitrevUpper,
    ConcatBitrevLower,
    ConcatCshiftUpper,
    ConcatCshiftLower,
}

impl ShuffleSel {
    fn from_field(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::InterleaveUpper,
            1 => Self::InterleaveLower,
            2 => Self::EvenIndices,
            3 => Self::OddIndices,
            4 => Self::ConcatBitrevUpper,
            5 => Self::ConcatBitrevLower,
            6 => Self::ConcatCshiftUpper,
            _ => Self::ConcatCshiftLower,
        }
    }

    fn field(self) -> u32 {
        match self {
            Self::InterleaveUpper => 0,
            Self::InterleaveLower => 1,
            Self::EvenIndices => 2,
            Self::OddIndices => 3,
            Self::ConcatBitrevUpper => 4,
            Self::ConcatBitrevLower => 5,
            Self::ConcatCshiftUpper => 6,
            Self::ConcatCshiftLower => 7,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Self::InterleaveUpper => "SH.IL.UP",
            Self::InterleaveLower => "SH.IL.LO",
            Self::EvenIndices => "SH.EVEN",
            Self::OddIndices => "SH.ODD",
            Self::ConcatBitrevUpper => "SH.BRE.UP",
            Self::ConcatBitrevLower => "SH.BRE.LO",
            Self::ConcatCshiftUpper => "SH.CSHIFT.UP",
            Self::ConcatCshiftLower => "SH.CSHIFT.LO",
        }
    }

    fn from_mnemonic(s: &str) -> Option<Self> {
        Some(match s {
            "SH.IL.UP" => Self::InterleaveUpper,
            "SH.IL.LO" => Self::InterleaveLower,
            "SH.EVEN" => Self::EvenIndices,
            "SH.ODD" => Self::OddIndices,
            "SH.BRE.UP" => Self::ConcatBitrevUpper,
            "SH.BRE.LO" => Self::ConcatBitrevLower,
            "SH.CSHIFT.UP" => Self::ConcatCshiftUpper,
            "SH.CSHIFT.LO" => Self::ConcatCshiftLower,
            _ => return None,
        })
    }
}

/// The bit-reversal permutation applied by `BITREVERSAL` shuffles, over a
/// 7-bit (0..127) index space.
const BIT_REVERSAL_ORDER: [usize; 128] = [
    0, 64, 32, 96, 16, 80, 48, 112, 8, 72, 40, 104, 24, 88, 56, 120, 4, 68, 36, 100, 20, 84, 52,
    116, 12, 76, 44, 108, 28, 92, 60, 124, 2, 66, 34, 98, 18, 82, 50, 114, 10, 74, 42, 106, 26,
    90, 58, 122, 6, 70, 38, 102, 22, 86, 54, 118, 14, 78, 46, 110, 30, 94, 62, 126, 1, 65, 33, 97,
    17, 81, 49, 113, 9, 73, 41, 105, 25, 89, 57, 121, 5, 69, 37, 101, 21, 85, 53, 117, 13, 77, 45,
    109, 29, 93, 61, 125, 3, 67, 35, 99, 19, 83, 51, 115, 11, 75, 43, 107, 27, 91, 59, 123, 7, 71,
    39, 103, 23, 87, 55, 119, 15, 79, 47, 111, 31, 95, 63, 127,
];

const MEMOP_SHIFT: u32 = 18;
const MEMOP_WIDTH: u32 = 2;
const VWRSEL_SHIFT: u32 = 15;
const VWRSEL_WIDTH: u32 = 3;
const MUXA_SHIFT: u32 = 11;
const MUXA_WIDTH: u32 = 4;
const MUXB_SHIFT: u32 = 7;
const MUXB_WIDTH: u32 = 4;
const ALUOP_SHIFT: u32 = 4;
const ALUOP_WIDTH: u32 = 3;
const RFWE_SHIFT: u32 = 3;
const RFWE_WIDTH: u32 = 1;
const RFWSEL_SHIFT: u32 = 0;
const RFWSEL_WIDTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsuWord {
    pub mem_op: MemOp,
    /// VWR/SRF selector when `mem_op` is LOAD/STORE, shuffle selector when SHUFFLE.
    pub vwr_sel_shuf_op: u8,
    pub muxa_sel: u8,
    pub muxb_sel: u8,
    pub alu_op: AluOp,
    pub rf_we: bool,
    pub rf_wsel: u8,
}

impl Default for LsuWord {
    fn default() -> Self {
        Self {
            mem_op: MemOp::Nop,
            vwr_sel_shuf_op: 0,
            muxa_sel: 0,
            muxb_sel: 0,
            alu_op: AluOp::Land,
            rf_we: false,
            rf_wsel: 0,
        }
    }
}

impl LsuWord {
    pub fn encode(&self) -> u32 {
        insert(self.mem_op as u32, MEMOP_SHIFT, MEMOP_WIDTH)
            | insert(self.vwr_sel_shuf_op as u32, VWRSEL_SHIFT, VWRSEL_WIDTH)
            | insert(self.muxa_sel as u32, MUXA_SHIFT, MUXA_WIDTH)
            | insert(self.muxb_sel as u32, MUXB_SHIFT, MUXB_WIDTH)
            | insert(self.alu_op as u32, ALUOP_SHIFT, ALUOP_WIDTH)
            | insert(self.rf_we as u32, RFWE_SHIFT, RFWE_WIDTH)
            | insert(self.rf_wsel as u32, RFWSEL_SHIFT, RFWSEL_WIDTH)
    }

    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        Ok(Self {
            mem_op: MemOp::from_field(extract(word, MEMOP_SHIFT, MEMOP_WIDTH)),
            vwr_sel_shuf_op: extract(word, VWRSEL_SHIFT, VWRSEL_WIDTH) as u8,
            muxa_sel: extract(word, MUXA_SHIFT, MUXA_WIDTH) as u8,
            muxb_sel: extract(word, MUXB_SHIFT, MUXB_WIDTH) as u8,
            alu_op: AluOp::from_field(extract(word, ALUOP_SHIFT, ALUOP_WIDTH)),
            rf_we: extract(word, RFWE_SHIFT, RFWE_WIDTH) != 0,
            rf_wsel: extract(word, RFWSEL_SHIFT, RFWSEL_WIDTH) as u8,
        })
    }

    pub fn to_asm(&self, srf_sel: usize, alu_srf_write_is_lsu: bool, srf_we: bool) -> String {
        fn mux_name(raw: u8) -> &'static str {
            let v = if raw > 11 { 9 } else { raw };
            match v {
                0..=7 => match v {
                    0 => "R0",
                    1 => "R1",
                    2 => "R2",
                    3 => "R3",
                    4 => "R4",
                    5 => "R5",
                    6 => "R6",
                    _ => "R7",
                },
                8 => "SRF",
                9 => "ZERO",
                10 => "ONE",
                _ => "TWO",
            }
        }

        let mut muxa_asm = mux_name(self.muxa_sel).to_string();
        if muxa_asm == "SRF" {
            muxa_asm = format!("SRF({})", srf_sel);
        }
        let mut muxb_asm = mux_name(self.muxb_sel).to_string();
        if muxb_asm == "SRF" {
            muxb_asm = format!("SRF({})", srf_sel);
        }

        let mut dest = String::new();
        if self.rf_we {
            dest.push_str(&format!("R{}", self.rf_wsel));
        }
        if srf_we && alu_srf_write_is_lsu {
            if !dest.is_empty() {
                dest.push_str(", ");
            }
            dest.push_str(&format!("SRF({})", srf_sel));
        }

        let alu_asm = if dest.is_empty() {
            "NOP".to_string()
        } else {
            format!("{} {}, {}, {}", self.alu_op.name(), dest, muxa_asm, muxb_asm)
        };

        let mem_asm = match self.mem_op {
            MemOp::Nop => "NOP".to_string(),
            MemOp::Load => format!("LD.VWR {}", VwrSel::from_field(self.vwr_sel_shuf_op as u32).name()),
            MemOp::Store => format!("STR.VWR {}", VwrSel::from_field(self.vwr_sel_shuf_op as u32).name()),
            MemOp::Shuffle => ShuffleSel::from_field(self.vwr_sel_shuf_op as u32).mnemonic().to_string(),
        };

        format!("{}/{}", alu_asm, mem_asm)
    }
}

impl fmt::Display for LsuWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_asm(0, false, false))
    }
}

/// Load Store Unit state for one column.
#[derive(Debug, Clone)]
pub struct Lsu {
    pub regs: [i32; NUM_DREG],
    pub alu: Alu,
}

impl Default for Lsu {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsu {
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_DREG],
            alu: Alu::new(),
        }
    }

    fn mux_value(&self, mux: u8, srf: &Srf, srf_sel: usize) -> i32 {
        match mux {
            0..=7 => self.regs[mux as usize],
            8 => srf.read(srf_sel),
            9 => 0,
            10 => 1,
            11 => 2,
            _ => unreachable!("mux field is range-checked by bit width"),
        }
    }

    fn run_alu(&mut self, op: AluOp, a: i32, b: i32) {
        match op {
            AluOp::Land => self.alu.land(a, b),
            AluOp::Lor => self.alu.lor(a, b),
            AluOp::Lxor => self.alu.lxor(a, b),
            AluOp::Sadd => self.alu.sadd(a, b),
            AluOp::Ssub => self.alu.ssub(a, b),
            AluOp::Sll => self.alu.sll(a, b),
            AluOp::Srl => self.alu.srl(a, b),
            AluOp::Bitrev => self.alu.bitrev(a, b),
        }
    }

    fn bit_reversal_shuffle(a: &[i32], b: &[i32]) -> Vec<i32> {
        let mut out = Vec::with_capacity(2 * N_ELEMS_PER_VWR);
        for &idx in BIT_REVERSAL_ORDER.iter() {
            out.push(a[idx]);
            out.push(b[idx]);
        }
        out
    }

    /// Execute the memory/shuffle half of this instruction, reading/writing
    /// the shared SPM, VWRs, and SRF for this column.
    ///
    /// The "upper" shuffle variants copy only the first `SPM_NWORDS - 1`
    /// (127) elements into VWR C, leaving its last element untouched; this
    /// mirrors the reference implementation's one-element-short slice
    /// rather than padding it out to the full width.
    pub fn run_mem(
        &self,
        word: &LsuWord,
        spm: &mut Spm,
        vwrs: &mut [Vwr; 3],
        srf: &mut Srf,
    ) -> Result<(), crate::error::SimError> {
        match word.mem_op {
            MemOp::Nop => {}
            MemOp::Load => {
                let sel = VwrSel::from_field(word.vwr_sel_shuf_op as u32);
                let line = *spm.get_line(self.regs[7] as usize)?;
                match sel {
                    VwrSel::VwrA | VwrSel::VwrB | VwrSel::VwrC => {
                        let idx = sel.field() as usize;
                        vwrs[idx].as_mut_slice().copy_from_slice(&line);
                    }
                    VwrSel::Srf => {
                        for i in 0..SRF_N_REGS {
                            srf.write(i, line[i]);
                        }
                    }
                }
            }
            MemOp::Store => {
                let sel = VwrSel::from_field(word.vwr_sel_shuf_op as u32);
                match sel {
                    VwrSel::VwrA | VwrSel::VwrB | VwrSel::VwrC => {
                        let idx = sel.field() as usize;
                        let values: [i32; N_ELEMS_PER_VWR] =
                            vwrs[idx].as_slice().try_into().expect("VWR width matches SPM line width");
                        spm.set_line(self.regs[7] as usize, &values)?;
                    }
                    VwrSel::Srf => {
                        let mut line = [0i32; SPM_NWORDS];
                        for i in 0..SRF_N_REGS {
                            line[i] = srf.read(i);
                        }
                        spm.set_line(self.regs[7] as usize, &line)?;
                    }
                }
            }
            MemOp::Shuffle => {
                let a: Vec<i32> = vwrs[0].as_slice().to_vec();
                let b: Vec<i32> = vwrs[1].as_slice().to_vec();
                let shuf = ShuffleSel::from_field(word.vwr_sel_shuf_op as u32);

                let c = vwrs[2].as_mut_slice();
                match shuf {
                    ShuffleSel::InterleaveUpper | ShuffleSel::InterleaveLower => {
                        let mut interleaved = Vec::with_capacity(2 * N_ELEMS_PER_VWR);
                        for i in 0..N_ELEMS_PER_VWR {
                            interleaved.push(a[i]);
                            interleaved.push(b[i]);
                        }
                        if matches!(shuf, ShuffleSel::InterleaveUpper) {
                            c[..SPM_NWORDS - 1].copy_from_slice(&interleaved[..SPM_NWORDS - 1]);
                        } else {
                            c.copy_from_slice(&interleaved[SPM_NWORDS..]);
                        }
                    }
                    ShuffleSel::EvenIndices => {
                        let evens: Vec<i32> = a.iter().step_by(2).chain(b.iter().step_by(2)).copied().collect();
                        c.copy_from_slice(&evens);
                    }
                    ShuffleSel::OddIndices => {
                        let odds: Vec<i32> = a.iter().skip(1).step_by(2).chain(b.iter().skip(1).step_by(2)).copied().collect();
                        c.copy_from_slice(&odds);
                    }
                    ShuffleSel::ConcatBitrevUpper | ShuffleSel::ConcatBitrevLower => {
                        let brev = Self::bit_reversal_shuffle(&a, &b);
                        if matches!(shuf, ShuffleSel::ConcatBitrevUpper) {
                            c[..SPM_NWORDS - 1].copy_from_slice(&brev[..SPM_NWORDS - 1]);
                        } else {
                            c.copy_from_slice(&brev[SPM_NWORDS..]);
                        }
                    }
                    ShuffleSel::ConcatCshiftUpper | ShuffleSel::ConcatCshiftLower => {
                        let mut cshift = Vec::with_capacity(2 * N_ELEMS_PER_VWR);
                        cshift.extend_from_slice(&a[1..]);
                        cshift.extend_from_slice(&b);
                        cshift.push(a[0]);
                        if matches!(shuf, ShuffleSel::ConcatCshiftUpper) {
                            c[..SPM_NWORDS - 1].copy_from_slice(&cshift[..SPM_NWORDS - 1]);
                        } else {
                            c.copy_from_slice(&cshift[SPM_NWORDS..]);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Execute one cycle: memory/shuffle operation first, then the ALU op,
    /// matching the reference ordering within the LSU itself.
    pub fn run(
        &mut self,
        word: &LsuWord,
        spm: &mut Spm,
        vwrs: &mut [Vwr; 3],
        srf: &mut Srf,
        srf_sel: usize,
    ) -> Result<(), crate::error::SimError> {
        self.run_mem(word, spm, vwrs, srf)?;
        let muxa_val = self.mux_value(word.muxa_sel, srf, srf_sel);
        let muxb_val = self.mux_value(word.muxb_sel, srf, srf_sel);
        self.run_alu(word.alu_op, muxa_val, muxb_val);
        if word.rf_we {
            self.regs[word.rf_wsel as usize] = self.alu.new_res;
        }
        Ok(())
    }

    /// Assemble one `ALU_PART/MEM_PART` line of LSU mnemonic text.
    pub fn assemble(
        &self,
        line_no: usize,
        instr: &str,
    ) -> Result<(Option<usize>, Option<usize>, LsuWord), AsmError> {
        let mut parts = instr.splitn(2, '/');
        let alu_part = parts.next().unwrap_or("").trim();
        let mem_part = parts.next().unwrap_or("NOP").trim();

        let mut word = LsuWord::default();
        let mut srf_read = None;
        let mut srf_write = None;

        if alu_part != "NOP" && !alu_part.is_empty() {
            let tokens: Vec<String> = alu_part.replace(',', " ").split_whitespace().map(String::from).collect();
            let op = arith_op(&tokens[0]).ok_or_else(|| AsmError::UnknownMnemonic {
                line: line_no,
                mnemonic: tokens[0].clone(),
            })?;
            let operands = &tokens[1..];
            if operands.len() < 3 {
                return Err(AsmError::OperandCount { line: line_no, expected: 3, got: operands.len() });
            }
            let dests = &operands[..operands.len() - 2];
            let muxa_tok = &operands[operands.len() - 2];
            let muxb_tok = &operands[operands.len() - 1];

            let mut rf_we = false;
            let mut rf_wsel = 0u8;
            for d in dests {
                if let Some(r) = parse_reg(d) {
                    rf_we = true;
                    rf_wsel = r;
                } else if let Some(idx) = parse_srf(d) {
                    srf_write = Some(idx);
                }
            }
            let muxa_sel = parse_mux(muxa_tok).ok_or_else(|| AsmError::OperandRange {
                line: line_no,
                operand: muxa_tok.clone(),
            })?;
            let muxb_sel = parse_mux(muxb_tok).ok_or_else(|| AsmError::OperandRange {
                line: line_no,
                operand: muxb_tok.clone(),
            })?;
            if let Some(idx) = parse_srf(muxa_tok) {
                srf_read = Some(idx);
            }
            if let Some(idx) = parse_srf(muxb_tok) {
                srf_read = Some(idx);
            }

            word.alu_op = op;
            word.rf_we = rf_we;
            word.rf_wsel = rf_wsel;
            word.muxa_sel = muxa_sel;
            word.muxb_sel = muxb_sel;
        }

        if mem_part != "NOP" {
            if let Some(rest) = mem_part.strip_prefix("LD.VWR ") {
                word.mem_op = MemOp::Load;
                word.vwr_sel_shuf_op = parse_vwr_sel(rest.trim(), line_no)?.field() as u8;
            } else if let Some(rest) = mem_part.strip_prefix("STR.VWR ") {
                word.mem_op = MemOp::Store;
                word.vwr_sel_shuf_op = parse_vwr_sel(rest.trim(), line_no)?.field() as u8;
            } else if let Some(shuf) = ShuffleSel::from_mnemonic(mem_part) {
                word.mem_op = MemOp::Shuffle;
                word.vwr_sel_shuf_op = shuf.field() as u8;
            } else {
                return Err(AsmError::UnknownMnemonic { line: line_no, mnemonic: mem_part.to_string() });
            }
        }

        Ok((srf_read, srf_write, word))
    }
}

fn arith_op(name: &str) -> Option<AluOp> {
    Some(match name {
        "LAND" => AluOp::Land,
        "LOR" => AluOp::Lor,
        "LXOR" => AluOp::Lxor,
        "SADD" => AluOp::Sadd,
        "SSUB" => AluOp::Ssub,
        "SLL" => AluOp::Sll,
        "SRL" => AluOp::Srl,
        "BITREV" => AluOp::Bitrev,
        _ => return None,
    })
}

fn parse_reg(tok: &str) -> Option<u8> {
    let rest = tok.strip_prefix('R')?;
    let n: u8 = rest.parse().ok()?;
    if (n as usize) < NUM_DREG {
        Some(n)
    } else {
        None
    }
}

fn parse_srf(tok: &str) -> Option<usize> {
    let rest = tok.strip_prefix("SRF(")?.strip_suffix(')')?;
    rest.parse().ok()
}

fn parse_mux(tok: &str) -> Option<u8> {
    if let Some(r) = parse_reg(tok) {
        return Some(r);
    }
    if parse_srf(tok).is_some() {
        return Some(8);
    }
    match tok {
        "ZERO" => Some(9),
        "ONE" => Some(10),
        "TWO" => Some(11),
        _ => None,
    }
}

fn parse_vwr_sel(tok: &str, line_no: usize) -> Result<VwrSel, AsmError> {
    match tok {
        "VWR_A" => Ok(VwrSel::VwrA),
        "VWR_B" => Ok(VwrSel::VwrB),
        "VWR_C" => Ok(VwrSel::VwrC),
        "SRF" => Ok(VwrSel::Srf),
        _ => Err(AsmError::OperandRange { line: line_no, operand: tok.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip() {
        let w = LsuWord {
            mem_op: MemOp::Shuffle,
            vwr_sel_shuf_op: 5,
            muxa_sel: 9,
            muxb_sel: 3,
            alu_op: AluOp::Bitrev,
            rf_we: true,
            rf_wsel: 6,
        };
        assert_eq!(LsuWord::decode(w.encode()).unwrap(), w);
    }

    #[test]
    fn shuffle_upper_variant_leaves_last_element() {
        let mut lsu = Lsu::new();
        let mut spm = Spm::new();
        let mut vwrs = [Vwr::new(), Vwr::new(), Vwr::new()];
        for i in 0..N_ELEMS_PER_VWR {
            vwrs[0].set(i, i as i32).unwrap();
            vwrs[1].set(i, 1000 + i as i32).unwrap();
        }
        vwrs[2].set(N_ELEMS_PER_VWR - 1, 999).unwrap();
        let mut srf = Srf::new();
        let word = LsuWord {
            mem_op: MemOp::Shuffle,
            vwr_sel_shuf_op: ShuffleSel::InterleaveUpper.field() as u8,
            ..Default::default()
        };
        lsu.run_mem(&word, &mut spm, &mut vwrs, &mut srf).unwrap();
        assert_eq!(vwrs[2].get(0).unwrap(), 0);
        assert_eq!(vwrs[2].get(N_ELEMS_PER_VWR - 1).unwrap(), 999);
    }

    #[test]
    fn load_store_roundtrip_through_spm() {
        let mut lsu = Lsu::new();
        lsu.regs[7] = 3;
        let mut spm = Spm::new();
        let mut vwrs = [Vwr::new(), Vwr::new(), Vwr::new()];
        for i in 0..N_ELEMS_PER_VWR {
            vwrs[0].set(i, i as i32 * 2).unwrap();
        }
        let mut srf = Srf::new();
        let store = LsuWord { mem_op: MemOp::Store, vwr_sel_shuf_op: 0, ..Default::default() };
        lsu.run_mem(&store, &mut spm, &mut vwrs, &mut srf).unwrap();

        let mut vwrs2 = [Vwr::new(), Vwr::new(), Vwr::new()];
        let load = LsuWord { mem_op: MemOp::Load, vwr_sel_shuf_op: 1, ..Default::default() };
        lsu.run_mem(&load, &mut spm, &mut vwrs2, &mut srf).unwrap();
        assert_eq!(vwrs2[1].get(5).unwrap(), 10);
    }

    #[test]
    fn assemble_load_vwr() {
        let lsu = Lsu::new();
        let (_, _, word) = lsu.assemble(1, "NOP/LD.VWR VWR_B").unwrap();
        assert_eq!(word.mem_op, MemOp::Load);
        assert_eq!(word.vwr_sel_shuf_op, 1);
    }
}
