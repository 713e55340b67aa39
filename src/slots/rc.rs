//! Reconfigurable Cell: the workhorse ALU slot. Four of them sit in a
//! column, wired in a torus to their four neighbours (top/bottom/left/
//! right), each able to read the others' last-committed result and flags.

use crate::alu::Alu;
use crate::bits::{extract, insert};
use crate::consts::{CGRA_ROWS, MAX_32B, MIN_32B, SPM_NWORDS};
use crate::error::{AsmError, DecodeError, UnsupportedError};
use std::fmt;

pub const NUM_DREG: usize = 2;
pub const NUM_CREG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluOp {
    Nop = 0,
    Sadd = 1,
    Ssub = 2,
    Smul = 3,
    Sdiv = 4,
    Sll = 5,
    Srl = 6,
    Sra = 7,
    Land = 8,
    Lor = 9,
    Lxor = 10,
    InbSfIna = 11,
    InbZfIna = 12,
    FxpMul = 13,
    FxpDiv = 14,
    Mac = 15,
}

impl AluOp {
    fn from_field(v: u32) -> Self {
        match v & 0xF {
            0 => Self::Nop,
            1 => Self::Sadd,
            2 => Self::Ssub,
            3 => Self::Smul,
            4 => Self::Sdiv,
            5 => Self::Sll,
            6 => Self::Srl,
            7 => Self::Sra,
            8 => Self::Land,
            9 => Self::Lor,
            10 => Self::Lxor,
            11 => Self::InbSfIna,
            12 => Self::InbZfIna,
            13 => Self::FxpMul,
            14 => Self::FxpDiv,
            _ => Self::Mac,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Sadd => "SADD",
            Self::Ssub => "SSUB",
            Self::Smul => "SMUL",
            Self::Sdiv => "SDIV",
            Self::Sll => "SLL",
            Self::Srl => "SRL",
            Self::Sra => "SRA",
            Self::Land => "LAND",
            Self::Lor => "LOR",
            Self::Lxor => "LXOR",
            Self::InbSfIna => "SFGA",
            Self::InbZfIna => "ZFGA",
            Self::FxpMul => "MUL.FXP",
            Self::FxpDiv => "DIV.FXP",
            Self::Mac => "MAC",
        }
    }
}

/// Which neighbour (or own) flag register `SFGA`/`ZFGA` read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MuxFSel {
    Own = 0,
    Rct = 1,
    Rcb = 2,
    Rcl = 3,
    Rcr = 4,
}

impl MuxFSel {
    fn from_field(v: u32) -> Self {
        match v & 0x7 {
            0 => Self::Own,
            1 => Self::Rct,
            2 => Self::Rcb,
            3 => Self::Rcl,
            _ => Self::Rcr,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Own => "OWN",
            Self::Rct => "RCT",
            Self::Rcb => "RCB",
            Self::Rcl => "RCL",
            Self::Rcr => "RCR",
        }
    }
}

/// Destination of an RC result: a local register, the SRF, or (via the
/// `ROUT` sentinel, handled by the MXCU) a VWR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestReg {
    R0,
    R1,
    Srf,
    /// Route the result to a VWR; which VWR is the MXCU's job, not the RC's.
    Vwr,
}

impl DestReg {
    fn from_field(v: u32) -> Self {
        match v & 0x1 {
            0 => Self::R0,
            _ => Self::R1,
        }
    }
}

fn mux_name(raw: u8) -> &'static str {
    let v = if raw > 13 { 10 } else { raw };
    match v {
        0 => "VWR_A",
        1 => "VWR_B",
        2 => "VWR_C",
        3 => "SRF",
        4 => "R0",
        5 => "R1",
        6 => "RCT",
        7 => "RCB",
        8 => "RCL",
        9 => "RCR",
        10 => "ZERO",
        11 => "ONE",
        12 => "MAX_INT",
        _ => "MIN_INT",
    }
}

const MUXA_SHIFT: u32 = 14;
const MUXA_WIDTH: u32 = 4;
const MUXB_SHIFT: u32 = 10;
const MUXB_WIDTH: u32 = 4;
const OPMODE_SHIFT: u32 = 9;
const OPMODE_WIDTH: u32 = 1;
const ALUOP_SHIFT: u32 = 5;
const ALUOP_WIDTH: u32 = 4;
const MUXF_SHIFT: u32 = 2;
const MUXF_WIDTH: u32 = 3;
const RFWE_SHIFT: u32 = 1;
const RFWE_WIDTH: u32 = 1;
const RFWSEL_SHIFT: u32 = 0;
const RFWSEL_WIDTH: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcWord {
    pub muxa_sel: u8,
    pub muxb_sel: u8,
    /// `false` = 32-bit precision, `true` = 16-bit (half) precision.
    pub op_mode_half: bool,
    pub alu_op: AluOp,
    pub muxf_sel: MuxFSel,
    pub rf_we: bool,
    pub rf_wsel: u8,
}

impl Default for RcWord {
    fn default() -> Self {
        Self {
            muxa_sel: 0,
            muxb_sel: 0,
            op_mode_half: false,
            alu_op: AluOp::Nop,
            muxf_sel: MuxFSel::Own,
            rf_we: false,
            rf_wsel: 0,
        }
    }
}

impl RcWord {
    pub fn encode(&self) -> u32 {
        insert(self.muxa_sel as u32, MUXA_SHIFT, MUXA_WIDTH)
            | insert(self.muxb_sel as u32, MUXB_SHIFT, MUXB_WIDTH)
            | insert(self.op_mode_half as u32, OPMODE_SHIFT, OPMODE_WIDTH)
            | insert(self.alu_op as u32, ALUOP_SHIFT, ALUOP_WIDTH)
            | insert(self.muxf_sel as u32, MUXF_SHIFT, MUXF_WIDTH)
            | insert(self.rf_we as u32, RFWE_SHIFT, RFWE_WIDTH)
            | insert(self.rf_wsel as u32, RFWSEL_SHIFT, RFWSEL_WIDTH)
    }

    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        Ok(Self {
            muxa_sel: extract(word, MUXA_SHIFT, MUXA_WIDTH) as u8,
            muxb_sel: extract(word, MUXB_SHIFT, MUXB_WIDTH) as u8,
            op_mode_half: extract(word, OPMODE_SHIFT, OPMODE_WIDTH) != 0,
            alu_op: AluOp::from_field(extract(word, ALUOP_SHIFT, ALUOP_WIDTH)),
            muxf_sel: MuxFSel::from_field(extract(word, MUXF_SHIFT, MUXF_WIDTH)),
            rf_we: extract(word, RFWE_SHIFT, RFWE_WIDTH) != 0,
            rf_wsel: extract(word, RFWSEL_SHIFT, RFWSEL_WIDTH) as u8,
        })
    }

    /// Render assembly text. `vwr_re`/`selected_vwr` describe whether this
    /// row's MXCU write-enable bit is set this cycle and which VWR letter
    /// to print; `srf_we`/`row0_writes_srf` mirror the MXCU's SRF write
    /// decision (only row 0 ever gets to show a trailing `SRF(k)` dest).
    pub fn to_asm(
        &self,
        srf_sel: usize,
        selected_vwr: &str,
        vwr_re: bool,
        srf_we: bool,
        row0_writes_srf: bool,
        row: usize,
    ) -> String {
        let precision = if self.op_mode_half { ".H" } else { "" };

        let mut muxa_asm = mux_name(self.muxa_sel).to_string();
        if muxa_asm == "SRF" {
            muxa_asm = format!("SRF({})", srf_sel);
        }
        let mut muxb_asm = mux_name(self.muxb_sel).to_string();
        if muxb_asm == "SRF" {
            muxb_asm = format!("SRF({})", srf_sel);
        }

        let mut dest = String::new();
        if vwr_re {
            dest.push_str(selected_vwr);
        }
        if self.rf_we {
            let name = match DestReg::from_field(self.rf_wsel as u32) {
                DestReg::R0 => "R0",
                DestReg::R1 => "R1",
                _ => unreachable!(),
            };
            if !dest.is_empty() {
                dest.push_str(", ");
            }
            dest.push_str(name);
        }
        if srf_we && row0_writes_srf && row == 0 {
            if !dest.is_empty() {
                dest.push_str(", ");
            }
            dest.push_str(&format!("SRF({})", srf_sel));
        }

        match self.alu_op {
            AluOp::InbSfIna | AluOp::InbZfIna => {
                let op = if matches!(self.alu_op, AluOp::InbSfIna) { "SFGA" } else { "ZFGA" };
                format!("{} {}, {}", op, dest, self.muxf_sel.name())
            }
            AluOp::Nop => "NOP".to_string(),
            AluOp::FxpMul | AluOp::FxpDiv => {
                format!("{} {}, {}, {}", self.alu_op.name(), dest, muxa_asm, muxb_asm)
            }
            _ => format!("{}{} {}, {}, {}", self.alu_op.name(), precision, dest, muxa_asm, muxb_asm),
        }
    }
}

impl fmt::Display for RcWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_asm(0, "VWR_A", false, false, false, 0))
    }
}

/// One RC's view of its four torus neighbours' committed ALUs.
pub struct Neighbours<'a> {
    pub top: &'a Alu,
    pub bottom: &'a Alu,
    pub left: &'a Alu,
    pub right: &'a Alu,
}

/// Reconfigurable Cell state for one row of a column.
#[derive(Debug, Clone)]
pub struct Rc {
    pub regs: [i32; NUM_DREG],
    pub alu: Alu,
}

impl Default for Rc {
    fn default() -> Self {
        Self::new()
    }
}

impl Rc {
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_DREG],
            alu: Alu::new(),
        }
    }

    fn mux_value(
        &self,
        mux: u8,
        vwrs: &[crate::vwr::Vwr; 3],
        mxcu_r0: i32,
        mxcu_masks: [i32; 3],
        row: usize,
        srf_val: i32,
        neighbours: &Neighbours,
    ) -> i32 {
        let vwr_offset = (SPM_NWORDS / CGRA_ROWS) * row;
        match mux {
            0..=2 => {
                let idx = (mxcu_r0 & mxcu_masks[mux as usize]) as usize + vwr_offset;
                vwrs[mux as usize].get(idx).unwrap_or(0)
            }
            3 => srf_val,
            4 => self.regs[0],
            5 => self.regs[1],
            6 => neighbours.top.res,
            7 => neighbours.bottom.res,
            8 => neighbours.left.res,
            9 => neighbours.right.res,
            10 => 0,
            11 => 1,
            12 => MAX_32B,
            13 => MIN_32B,
            _ => unreachable!("mux field is range-checked by bit width"),
        }
    }

    fn run_alu(
        &mut self,
        op: AluOp,
        a: i32,
        b: i32,
        half: bool,
        muxf: MuxFSel,
        neighbours: &Neighbours,
    ) -> Result<(), UnsupportedError> {
        match op {
            AluOp::Nop => self.alu.new_res = self.alu.res,
            AluOp::Sadd => {
                if half { self.alu.saddh(a, b) } else { self.alu.sadd(a, b) }
            }
            AluOp::Ssub => {
                if half { self.alu.ssubh(a, b) } else { self.alu.ssub(a, b) }
            }
            AluOp::Smul => {
                if half { self.alu.smulh(a, b) } else { self.alu.smul(a, b) }
            }
            AluOp::Sdiv => {
                if half { self.alu.sdivh(a, b)? } else { self.alu.sdiv(a, b) }
            }
            AluOp::Sll => {
                if half { self.alu.sllh()? } else { self.alu.sll(a, b) }
            }
            AluOp::Srl => {
                if half { self.alu.srlh()? } else { self.alu.srl(a, b) }
            }
            AluOp::Sra => {
                if half { self.alu.srah()? } else { self.alu.sra(a, b) }
            }
            AluOp::Land => {
                if half { self.alu.landh()? } else { self.alu.land(a, b) }
            }
            AluOp::Lor => {
                if half { self.alu.lorh()? } else { self.alu.lor(a, b) }
            }
            AluOp::Lxor => {
                if half { self.alu.lxorh()? } else { self.alu.lxor(a, b) }
            }
            AluOp::InbSfIna => {
                let flag = match muxf {
                    MuxFSel::Own => self.alu.sign_flag,
                    MuxFSel::Rct => neighbours.top.sign_flag,
                    MuxFSel::Rcb => neighbours.bottom.sign_flag,
                    MuxFSel::Rcl => neighbours.left.sign_flag,
                    MuxFSel::Rcr => neighbours.right.sign_flag,
                };
                self.alu.sfga(a, b, flag);
            }
            AluOp::InbZfIna => {
                let flag = match muxf {
                    MuxFSel::Own => self.alu.zero_flag,
                    MuxFSel::Rct => neighbours.top.zero_flag,
                    MuxFSel::Rcb => neighbours.bottom.zero_flag,
                    MuxFSel::Rcl => neighbours.left.zero_flag,
                    MuxFSel::Rcr => neighbours.right.zero_flag,
                };
                self.alu.zfga(a, b, flag);
            }
            AluOp::FxpMul => self.alu.mul_fp(a, b),
            AluOp::FxpDiv => self.alu.div_fp(a, b)?,
            AluOp::Mac => {
                if half {
                    self.alu.mach(a, b, self.regs[0]);
                } else {
                    self.alu.mac(a, b, self.regs[0]);
                }
            }
        }
        Ok(())
    }

    /// Execute one cycle of this RC. `mxcu_masks` holds the MXCU's
    /// `R5`/`R6`/`R7` address masks for `VWR_A`/`VWR_B`/`VWR_C`.
    pub fn run(
        &mut self,
        word: &RcWord,
        vwrs: &[crate::vwr::Vwr; 3],
        mxcu_r0: i32,
        mxcu_masks: [i32; 3],
        row: usize,
        srf_val: i32,
        neighbours: &Neighbours,
    ) -> Result<(), UnsupportedError> {
        let muxa_val = self.mux_value(word.muxa_sel, vwrs, mxcu_r0, mxcu_masks, row, srf_val, neighbours);
        let muxb_val = self.mux_value(word.muxb_sel, vwrs, mxcu_r0, mxcu_masks, row, srf_val, neighbours);
        self.run_alu(word.alu_op, muxa_val, muxb_val, word.op_mode_half, word.muxf_sel, neighbours)?;
        if word.rf_we {
            let idx = (word.rf_wsel & 0x1) as usize;
            self.regs[idx] = self.alu.new_res;
        }
        Ok(())
    }

    /// Assemble one line of RC mnemonic text. Returns the decoded word
    /// plus the SRF read index (if any) and the parsed destination:
    /// `(None, None)` for a local register, `Some(srf_idx)` for SRF, or a
    /// VWR letter (`'A'..'C'`) for `VWR_x`/`ROUT`.
    pub fn assemble(
        &self,
        line_no: usize,
        instr: &str,
    ) -> Result<(Option<usize>, Option<usize>, Option<char>, RcWord), AsmError> {
        let tokens: Vec<String> = instr.replace(',', " ").split_whitespace().map(String::from).collect();
        if tokens.is_empty() {
            return Err(AsmError::Other { line: line_no, message: "empty instruction".into() });
        }
        if tokens[0] == "NOP" {
            return Ok((None, None, None, RcWord::default()));
        }

        let mut op_name = tokens[0].as_str();
        let mut half = false;
        let owned;
        if let Some(stripped) = op_name.strip_suffix(".H") {
            half = true;
            owned = stripped.to_string();
            op_name = owned.as_str();
        }

        if op_name == "SFGA" || op_name == "ZFGA" {
            if tokens.len() < 3 {
                return Err(AsmError::OperandCount { line: line_no, expected: 2, got: tokens.len() - 1 });
            }
            let (srf_write, vwr_write, rf_we, rf_wsel) = parse_dest(&tokens[1], line_no)?;
            let flag = parse_muxf(&tokens[2]).ok_or_else(|| AsmError::OperandRange {
                line: line_no,
                operand: tokens[2].clone(),
            })?;
            let op = if op_name == "SFGA" { AluOp::InbSfIna } else { AluOp::InbZfIna };
            return Ok((
                None,
                srf_write,
                vwr_write,
                RcWord {
                    alu_op: op,
                    muxf_sel: flag,
                    rf_we,
                    rf_wsel,
                    ..Default::default()
                },
            ));
        }

        let op = arith_op(op_name).ok_or_else(|| AsmError::UnknownMnemonic {
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
        let mut srf_write = None;
        let mut vwr_write = None;
        for d in dests {
            let (srf, vwr, we, wsel) = parse_dest(d, line_no)?;
            if we {
                rf_we = true;
                rf_wsel = wsel;
            }
            srf_write = srf_write.or(srf);
            vwr_write = vwr_write.or(vwr);
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

        Ok((
            srf_read,
            srf_write,
            vwr_write,
            RcWord {
                muxa_sel,
                muxb_sel,
                op_mode_half: half,
                alu_op: op,
                rf_we,
                rf_wsel,
                ..Default::default()
            },
        ))
    }
}

fn arith_op(name: &str) -> Option<AluOp> {
    Some(match name {
        "SADD" => AluOp::Sadd,
        "SSUB" => AluOp::Ssub,
        "SMUL" => AluOp::Smul,
        "SDIV" => AluOp::Sdiv,
        "SLL" => AluOp::Sll,
        "SRL" => AluOp::Srl,
        "SRA" => AluOp::Sra,
        "LAND" => AluOp::Land,
        "LOR" => AluOp::Lor,
        "LXOR" => AluOp::Lxor,
        "MUL.FXP" => AluOp::FxpMul,
        "DIV.FXP" => AluOp::FxpDiv,
        "MAC" => AluOp::Mac,
        _ => return None,
    })
}

/// Parse a destination operand into `(srf_write_idx, vwr_write_letter, local_rf_we, local_rf_wsel)`.
fn parse_dest(tok: &str, line_no: usize) -> Result<(Option<usize>, Option<char>, bool, u8), AsmError> {
    if let Some(r) = parse_reg(tok) {
        return Ok((None, None, true, r));
    }
    if tok == "ROUT" {
        return Ok((None, Some('_'), false, 0));
    }
    if let Some(idx) = parse_srf(tok) {
        return Ok((Some(idx), None, false, 0));
    }
    if let Some(letter) = tok.strip_prefix("VWR_").and_then(|s| s.chars().next()) {
        return Ok((None, Some(letter), false, 0));
    }
    Err(AsmError::OperandRange { line: line_no, operand: tok.to_string() })
}

fn parse_reg(tok: &str) -> Option<u8> {
    match tok {
        "R0" => Some(0),
        "R1" => Some(1),
        _ => None,
    }
}

fn parse_srf(tok: &str) -> Option<usize> {
    let rest = tok.strip_prefix("SRF(")?.strip_suffix(')')?;
    rest.parse().ok()
}

fn parse_muxf(tok: &str) -> Option<MuxFSel> {
    Some(match tok {
        "OWN" => MuxFSel::Own,
        "RCT" => MuxFSel::Rct,
        "RCB" => MuxFSel::Rcb,
        "RCL" => MuxFSel::Rcl,
        "RCR" => MuxFSel::Rcr,
        _ => return None,
    })
}

fn parse_mux(tok: &str) -> Option<u8> {
    if let Some(r) = parse_reg(tok) {
        return Some(4 + r);
    }
    if parse_srf(tok).is_some() {
        return Some(3);
    }
    match tok {
        "VWR_A" => Some(0),
        "VWR_B" => Some(1),
        "VWR_C" => Some(2),
        "RCT" => Some(6),
        "RCB" => Some(7),
        "RCL" => Some(8),
        "RCR" => Some(9),
        "ZERO" => Some(10),
        "ONE" => Some(11),
        "MAX_INT" => Some(12),
        "MIN_INT" => Some(13),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vwr::Vwr;

    #[test]
    fn word_roundtrip() {
        let w = RcWord {
            muxa_sel: 9,
            muxb_sel: 13,
            op_mode_half: true,
            alu_op: AluOp::Mac,
            muxf_sel: MuxFSel::Rcl,
            rf_we: true,
            rf_wsel: 1,
        };
        assert_eq!(RcWord::decode(w.encode()).unwrap(), w);
    }

    #[test]
    fn fxp_div_fails_at_execution_only() {
        let mut rc = Rc::new();
        let word = RcWord { alu_op: AluOp::FxpDiv, ..Default::default() };
        let vwrs = [Vwr::new(), Vwr::new(), Vwr::new()];
        let zero = Alu::new();
        let neighbours = Neighbours { top: &zero, bottom: &zero, left: &zero, right: &zero };
        let result = rc.run(&word, &vwrs, 0, [0, 0, 0], 0, 0, &neighbours);
        assert!(result.is_err());
    }

    #[test]
    fn mac_uses_r0_as_third_operand() {
        let mut rc = Rc::new();
        rc.regs[0] = 5;
        let word = RcWord {
            alu_op: AluOp::Mac,
            muxa_sel: 11, // ONE
            muxb_sel: 11, // ONE
            ..Default::default()
        };
        let vwrs = [Vwr::new(), Vwr::new(), Vwr::new()];
        let zero = Alu::new();
        let neighbours = Neighbours { top: &zero, bottom: &zero, left: &zero, right: &zero };
        rc.run(&word, &vwrs, 0, [0, 0, 0], 0, 0, &neighbours).unwrap();
        let expected = 1i32.wrapping_mul(1) & MAX_32B.wrapping_add(5);
        assert_eq!(rc.alu.new_res, expected);
    }

    #[test]
    fn assemble_rout_marks_vwr_dest() {
        let rc = Rc::new();
        let (_, _, vwr, word) = rc.assemble(1, "SADD ROUT, R0, R1").unwrap();
        assert_eq!(vwr, Some('_'));
        assert_eq!(word.alu_op, AluOp::Sadd);
    }

    #[test]
    fn assemble_sfga() {
        let rc = Rc::new();
        let (_, _, _, word) = rc.assemble(1, "SFGA R0, RCT").unwrap();
        assert_eq!(word.alu_op, AluOp::InbSfIna);
        assert_eq!(word.muxf_sel, MuxFSel::Rct);
    }

    #[rstest::rstest]
    #[case("SADD R0, R0, R1", AluOp::Sadd)]
    #[case("SSUB R0, R0, R1", AluOp::Ssub)]
    #[case("SMUL R0, R0, R1", AluOp::Smul)]
    #[case("SDIV R0, R0, R1", AluOp::Sdiv)]
    #[case("LAND R0, R0, R1", AluOp::Land)]
    #[case("LOR R0, R0, R1", AluOp::Lor)]
    #[case("LXOR R0, R0, R1", AluOp::Lxor)]
    #[case("MAC R0, R0, R1", AluOp::Mac)]
    fn assemble_recognizes_every_arithmetic_mnemonic(#[case] line: &str, #[case] expected: AluOp) {
        let rc = Rc::new();
        let (_, _, _, word) = rc.assemble(1, line).unwrap();
        assert_eq!(word.alu_op, expected);
    }
}
