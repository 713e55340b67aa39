//! Multiplexer Control Unit: arbitrates which slot's ALU result reaches
//! the SRF, and drives the per-row write-enable fan-out from RC results
//! into a column's VWRs.

use crate::bits::{extract, insert};
use crate::consts::{CGRA_ROWS, SPM_NWORDS};
use crate::error::{AsmError, DecodeError};
use std::fmt;

pub const NUM_DREG: usize = 8;
pub const NUM_CREG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluOp {
    Nop = 0,
    Sadd = 1,
    Ssub = 2,
    Sll = 3,
    Srl = 4,
    Land = 5,
    Lor = 6,
    Lxor = 7,
}

impl AluOp {
    fn from_field(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::Nop,
            1 => Self::Sadd,
            2 => Self::Ssub,
            3 => Self::Sll,
            4 => Self::Srl,
            5 => Self::Land,
            6 => Self::Lor,
            _ => Self::Lxor,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Sadd => "SADD",
            Self::Ssub => "SSUB",
            Self::Sll => "SLL",
            Self::Srl => "SRL",
            Self::Land => "LAND",
            Self::Lor => "LOR",
            Self::Lxor => "LXOR",
        }
    }
}

/// Which specialized slot's ALU result gets written to the selected SRF register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluSrfWrite {
    Lcu = 0,
    Rc0 = 1,
    Mxcu = 2,
    Lsu = 3,
}

impl AluSrfWrite {
    fn from_field(v: u32) -> Self {
        match v & 0x3 {
            0 => Self::Lcu,
            1 => Self::Rc0,
            2 => Self::Mxcu,
            _ => Self::Lsu,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VwrSel {
    VwrA = 0,
    VwrB = 1,
    VwrC = 2,
}

impl VwrSel {
    fn from_field(v: u32) -> Self {
        match v & 0x3 {
            0 => Self::VwrA,
            1 => Self::VwrB,
            _ => Self::VwrC,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::VwrA => "VWR_A",
            Self::VwrB => "VWR_B",
            Self::VwrC => "VWR_C",
        }
    }
}

fn mux_name(raw: u8) -> &'static str {
    let v = if raw > 13 { 9 } else { raw };
    match v {
        0 => "R0",
        1 => "R1",
        2 => "R2",
        3 => "R3",
        4 => "R4",
        5 => "R5",
        6 => "R6",
        7 => "R7",
        8 => "SRF",
        9 => "ZERO",
        10 => "ONE",
        11 => "TWO",
        12 => "HALF",
        _ => "LAST",
    }
}

const MUXA_SHIFT: u32 = 23;
const MUXA_WIDTH: u32 = 4;
const MUXB_SHIFT: u32 = 19;
const MUXB_WIDTH: u32 = 4;
const ALUOP_SHIFT: u32 = 16;
const ALUOP_WIDTH: u32 = 3;
const RFWE_SHIFT: u32 = 15;
const RFWE_WIDTH: u32 = 1;
const RFWSEL_SHIFT: u32 = 12;
const RFWSEL_WIDTH: u32 = 3;
const SRFWE_SHIFT: u32 = 11;
const SRFWE_WIDTH: u32 = 1;
const ALUSRFWRITE_SHIFT: u32 = 9;
const ALUSRFWRITE_WIDTH: u32 = 2;
const SRFSEL_SHIFT: u32 = 6;
const SRFSEL_WIDTH: u32 = 3;
const VWRSEL_SHIFT: u32 = 4;
const VWRSEL_WIDTH: u32 = 2;
const VWRROWWE_SHIFT: u32 = 0;
const VWRROWWE_WIDTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MxcuWord {
    pub muxa_sel: u8,
    pub muxb_sel: u8,
    pub alu_op: AluOp,
    pub rf_we: bool,
    pub rf_wsel: u8,
    pub srf_we: bool,
    pub alu_srf_write: AluSrfWrite,
    pub srf_sel: u8,
    pub vwr_sel: VwrSel,
    /// One-hot per-row write enable, row-indexed: bit `row` of the packed
    /// field gates row `row`.
    pub vwr_row_we: [bool; CGRA_ROWS],
}

impl Default for MxcuWord {
    fn default() -> Self {
        Self {
            muxa_sel: 0,
            muxb_sel: 0,
            alu_op: AluOp::Nop,
            rf_we: false,
            rf_wsel: 0,
            srf_we: false,
            alu_srf_write: AluSrfWrite::Lcu,
            srf_sel: 0,
            vwr_sel: VwrSel::VwrA,
            vwr_row_we: [false; CGRA_ROWS],
        }
    }
}

impl MxcuWord {
    pub fn encode(&self) -> u32 {
        let mut packed_row_we = 0u32;
        for (row, &we) in self.vwr_row_we.iter().enumerate() {
            if we {
                packed_row_we |= 1 << row;
            }
        }
        insert(self.muxa_sel as u32, MUXA_SHIFT, MUXA_WIDTH)
            | insert(self.muxb_sel as u32, MUXB_SHIFT, MUXB_WIDTH)
            | insert(self.alu_op as u32, ALUOP_SHIFT, ALUOP_WIDTH)
            | insert(self.rf_we as u32, RFWE_SHIFT, RFWE_WIDTH)
            | insert(self.rf_wsel as u32, RFWSEL_SHIFT, RFWSEL_WIDTH)
            | insert(self.srf_we as u32, SRFWE_SHIFT, SRFWE_WIDTH)
            | insert(self.alu_srf_write as u32, ALUSRFWRITE_SHIFT, ALUSRFWRITE_WIDTH)
            | insert(self.srf_sel as u32, SRFSEL_SHIFT, SRFSEL_WIDTH)
            | insert(self.vwr_sel as u32, VWRSEL_SHIFT, VWRSEL_WIDTH)
            | insert(packed_row_we, VWRROWWE_SHIFT, VWRROWWE_WIDTH)
    }

    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        let packed_row_we = extract(word, VWRROWWE_SHIFT, VWRROWWE_WIDTH);
        let mut vwr_row_we = [false; CGRA_ROWS];
        for row in 0..CGRA_ROWS {
            vwr_row_we[row] = (packed_row_we >> row) & 1 != 0;
        }
        Ok(Self {
            muxa_sel: extract(word, MUXA_SHIFT, MUXA_WIDTH) as u8,
            muxb_sel: extract(word, MUXB_SHIFT, MUXB_WIDTH) as u8,
            alu_op: AluOp::from_field(extract(word, ALUOP_SHIFT, ALUOP_WIDTH)),
            rf_we: extract(word, RFWE_SHIFT, RFWE_WIDTH) != 0,
            rf_wsel: extract(word, RFWSEL_SHIFT, RFWSEL_WIDTH) as u8,
            srf_we: extract(word, SRFWE_SHIFT, SRFWE_WIDTH) != 0,
            alu_srf_write: AluSrfWrite::from_field(extract(word, ALUSRFWRITE_SHIFT, ALUSRFWRITE_WIDTH)),
            srf_sel: extract(word, SRFSEL_SHIFT, SRFSEL_WIDTH) as u8,
            vwr_sel: VwrSel::from_field(extract(word, VWRSEL_SHIFT, VWRSEL_WIDTH)),
            vwr_row_we,
        })
    }

    pub fn to_asm(&self) -> String {
        let mut muxa_asm = mux_name(self.muxa_sel).to_string();
        if muxa_asm == "SRF" {
            muxa_asm = format!("SRF({})", self.srf_sel);
        }
        let mut muxb_asm = mux_name(self.muxb_sel).to_string();
        if muxb_asm == "SRF" {
            muxb_asm = format!("SRF({})", self.srf_sel);
        }

        let mut dest = String::new();
        if self.rf_we {
            dest.push_str(&format!("R{}", self.rf_wsel));
        }
        if self.srf_we && matches!(self.alu_srf_write, AluSrfWrite::Mxcu) {
            if !dest.is_empty() {
                dest.push_str(", ");
            }
            dest.push_str(&format!("SRF({})", self.srf_sel));
        }

        if matches!(self.alu_op, AluOp::Nop) {
            return "NOP".to_string();
        }
        format!("{} {}, {}, {}", self.alu_op.name(), dest, muxa_asm, muxb_asm)
    }
}

impl fmt::Display for MxcuWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_asm())
    }
}

/// Multiplexer Control Unit state for one column.
#[derive(Debug, Clone)]
pub struct Mxcu {
    pub regs: [i32; NUM_DREG],
    pub alu: crate::alu::Alu,
}

impl Default for Mxcu {
    fn default() -> Self {
        Self::new()
    }
}

/// The four ALU results a column produces this cycle, needed to resolve
/// `alu_srf_write` and the VWR row write-enable fan-out.
pub struct ColumnAluResults {
    pub lcu_new_res: i32,
    pub rc0_new_res: i32,
    pub lsu_new_res: i32,
    pub rc_new_res: [i32; CGRA_ROWS],
}

impl Mxcu {
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_DREG],
            alu: crate::alu::Alu::new(),
        }
    }

    fn mux_value(&self, mux: u8, srf_val: i32) -> i32 {
        match mux {
            0..=7 => self.regs[mux as usize],
            8 => srf_val,
            9 => 0,
            10 => 1,
            11 => 2,
            12 => (SPM_NWORDS / CGRA_ROWS / 2) as i32 - 1,
            13 => (SPM_NWORDS / CGRA_ROWS) as i32 - 1,
            _ => unreachable!("mux field is range-checked by bit width"),
        }
    }

    fn run_alu(&mut self, op: AluOp, a: i32, b: i32) {
        match op {
            AluOp::Nop => self.alu.new_res = self.alu.res,
            AluOp::Sadd => self.alu.sadd(a, b),
            AluOp::Ssub => self.alu.ssub(a, b),
            AluOp::Sll => self.alu.sll(a, b),
            AluOp::Srl => self.alu.srl(a, b),
            AluOp::Land => self.alu.land(a, b),
            AluOp::Lor => self.alu.lor(a, b),
            AluOp::Lxor => self.alu.lxor(a, b),
        }
    }

    /// Execute one cycle. Returns the SRF write value (if `srf_we`) and
    /// applies the VWR row write-enable fan-out directly to `vwr`.
    ///
    /// Resolving `alu_srf_write == MXCU` uses this MXCU's own
    /// newly-computed ALU result; the reference source's matching branch
    /// references a nonexistent `vwr2a.mscus` attribute (a typo for the
    /// per-column MXCU itself), so there is nothing externally meaningful
    /// to reproduce there.
    pub fn run(
        &mut self,
        word: &MxcuWord,
        srf_val: i32,
        results: &ColumnAluResults,
        vwr: &mut crate::vwr::Vwr,
    ) -> Option<i32> {
        let muxa_val = self.mux_value(word.muxa_sel, srf_val);
        let muxb_val = self.mux_value(word.muxb_sel, srf_val);
        self.run_alu(word.alu_op, muxa_val, muxb_val);

        let srf_data = match word.alu_srf_write {
            AluSrfWrite::Lcu => results.lcu_new_res,
            AluSrfWrite::Rc0 => results.rc0_new_res,
            AluSrfWrite::Mxcu => self.alu.new_res,
            AluSrfWrite::Lsu => results.lsu_new_res,
        };

        let mxcu_r0 = self.regs[0];
        let mxcu_mask = self.regs[5 + word.vwr_sel as usize];
        let slice_idx = (mxcu_r0 & mxcu_mask) as usize;
        let slice_size = SPM_NWORDS / CGRA_ROWS;
        for row in 0..CGRA_ROWS {
            if word.vwr_row_we[row] {
                let idx = slice_idx + slice_size * row;
                let _ = vwr.set(idx, results.rc_new_res[row]);
            }
        }

        if word.rf_we {
            self.regs[word.rf_wsel as usize] = self.alu.new_res;
        }

        if word.srf_we {
            Some(srf_data)
        } else {
            None
        }
    }

    /// Assemble one line of MXCU mnemonic text.
    pub fn assemble(&self, line_no: usize, instr: &str) -> Result<(Option<usize>, Option<usize>, MxcuWord), AsmError> {
        let tokens: Vec<String> = instr.replace(',', " ").split_whitespace().map(String::from).collect();
        if tokens.is_empty() {
            return Err(AsmError::Other { line: line_no, message: "empty instruction".into() });
        }
        if tokens[0] == "NOP" {
            return Ok((None, None, MxcuWord::default()));
        }
        let op = arith_op(&tokens[0]).ok_or_else(|| AsmError::UnknownMnemonic {
            line: line_no,
            mnemonic: tokens[0].clone(),
        })?;
        let operands = &tokens[1..];
        if operands.len() < 2 {
            return Err(AsmError::OperandCount { line: line_no, expected: 2, got: operands.len() });
        }
        let dests = &operands[..operands.len() - 2];
        let muxa_tok = &operands[operands.len() - 2];
        let muxb_tok = &operands[operands.len() - 1];

        let mut rf_we = false;
        let mut rf_wsel = 0u8;
        let mut srf_write = None;
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
        let srf_read = parse_srf(muxa_tok).or_else(|| parse_srf(muxb_tok));

        let mut word = MxcuWord {
            muxa_sel,
            muxb_sel,
            alu_op: op,
            rf_we,
            rf_wsel,
            ..Default::default()
        };
        if let Some(idx) = srf_write {
            word.srf_we = true;
            word.alu_srf_write = AluSrfWrite::Mxcu;
            word.srf_sel = idx as u8;
        }
        Ok((srf_read, srf_write, word))
    }
}

fn arith_op(name: &str) -> Option<AluOp> {
    Some(match name {
        "SADD" => AluOp::Sadd,
        "SSUB" => AluOp::Ssub,
        "SLL" => AluOp::Sll,
        "SRL" => AluOp::Srl,
        "LAND" => AluOp::Land,
        "LOR" => AluOp::Lor,
        "LXOR" => AluOp::Lxor,
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
        "HALF" => Some(12),
        "LAST" => Some(13),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip() {
        let w = MxcuWord {
            muxa_sel: 4,
            muxb_sel: 13,
            alu_op: AluOp::Lxor,
            rf_we: true,
            rf_wsel: 3,
            srf_we: true,
            alu_srf_write: AluSrfWrite::Rc0,
            srf_sel: 2,
            vwr_sel: VwrSel::VwrB,
            vwr_row_we: [true, false, true, false],
        };
        assert_eq!(MxcuWord::decode(w.encode()).unwrap(), w);
    }

    #[test]
    fn vwr_row_we_roundtrips() {
        let mut w = MxcuWord::default();
        w.vwr_row_we = [true, false, false, false];
        let decoded = MxcuWord::decode(w.encode()).unwrap();
        assert_eq!(decoded.vwr_row_we, [true, false, false, false]);
    }

    #[test]
    fn run_writes_vwr_rows_from_rc_results() {
        let mut mxcu = Mxcu::new();
        mxcu.regs[0] = 0;
        mxcu.regs[5] = 0; // mask for VWR_A
        let word = MxcuWord {
            vwr_sel: VwrSel::VwrA,
            vwr_row_we: [true, false, false, true],
            ..Default::default()
        };
        let results = ColumnAluResults {
            lcu_new_res: 0,
            rc0_new_res: 0,
            lsu_new_res: 0,
            rc_new_res: [11, 22, 33, 44],
        };
        let mut vwr = crate::vwr::Vwr::new();
        mxcu.run(&word, 0, &results, &mut vwr);
        assert_eq!(vwr.get(0).unwrap(), 11);
        assert_eq!(vwr.get(32 * 3).unwrap(), 44);
    }

    #[test]
    fn assemble_nop() {
        let mxcu = Mxcu::new();
        let (_, _, word) = mxcu.assemble(1, "NOP").unwrap();
        assert_eq!(word.alu_op, AluOp::Nop);
    }
}
