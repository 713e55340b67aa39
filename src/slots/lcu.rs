//! Loop Control Unit: drives the program counter, evaluates branch
//! conditions (either from its own ALU or OR-reduced across a column's
//! RCs), and can exit the kernel.

use crate::alu::Alu;
use crate::bits::{extract, insert};
use crate::consts::CGRA_ROWS;
use crate::error::{AsmError, DecodeError};
use std::fmt;
use strum::EnumIter;

pub const NUM_DREG: usize = 4;
pub const NUM_CREG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum AluOp {
    Nop = 0,
    Sadd = 1,
    Ssub = 2,
    Sll = 3,
    Srl = 4,
    Sra = 5,
    Land = 6,
    Lor = 7,
    Lxor = 8,
    Beq = 9,
    Bne = 10,
    Bgepd = 11,
    Blt = 12,
    Jump = 13,
    Exit = 14,
}

impl AluOp {
    /// The ALU op field is 4 bits wide but only 15 of its 16 values are
    /// assigned; the reference implementation's disassembler folds the
    /// unused value 15 into NOP rather than rejecting it, so decoding does
    /// the same uniformly for execution and disassembly.
    fn from_field(v: u32) -> Self {
        match v {
            0 => Self::Nop,
            1 => Self::Sadd,
            2 => Self::Ssub,
            3 => Self::Sll,
            4 => Self::Srl,
            5 => Self::Sra,
            6 => Self::Land,
            7 => Self::Lor,
            8 => Self::Lxor,
            9 => Self::Beq,
            10 => Self::Bne,
            11 => Self::Bgepd,
            12 => Self::Blt,
            13 => Self::Jump,
            14 => Self::Exit,
            _ => Self::Nop,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Sadd => "SADD",
            Self::Ssub => "SSUB",
            Self::Sll => "SLL",
            Self::Srl => "SRL",
            Self::Sra => "SRA",
            Self::Land => "LAND",
            Self::Lor => "LOR",
            Self::Lxor => "LXOR",
            Self::Beq => "BEQ",
            Self::Bne => "BNE",
            Self::Bgepd => "BGEPD",
            Self::Blt => "BLT",
            Self::Jump => "JUMP",
            Self::Exit => "EXIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum DestReg {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    Srf = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum MuxASel {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    Srf = 4,
    Last = 5,
    Zero = 6,
    Imm = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum MuxBSel {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    Srf = 4,
    Last = 5,
    Zero = 6,
    One = 7,
}

fn mux_a_name(v: u8) -> &'static str {
    match v {
        0 => "R0",
        1 => "R1",
        2 => "R2",
        3 => "R3",
        4 => "SRF",
        5 => "LAST",
        6 => "ZERO",
        _ => "IMM",
    }
}

fn mux_b_name(v: u8) -> &'static str {
    match v {
        0 => "R0",
        1 => "R1",
        2 => "R2",
        3 => "R3",
        4 => "SRF",
        5 => "LAST",
        6 => "ZERO",
        _ => "ONE",
    }
}

const MUXA_SHIFT: u32 = 17;
const MUXA_WIDTH: u32 = 3;
const MUXB_SHIFT: u32 = 14;
const MUXB_WIDTH: u32 = 3;
const BRMODE_SHIFT: u32 = 13;
const BRMODE_WIDTH: u32 = 1;
const ALUOP_SHIFT: u32 = 9;
const ALUOP_WIDTH: u32 = 4;
const RFWE_SHIFT: u32 = 8;
const RFWE_WIDTH: u32 = 1;
const RFWSEL_SHIFT: u32 = 6;
const RFWSEL_WIDTH: u32 = 2;
const IMM_SHIFT: u32 = 0;
const IMM_WIDTH: u32 = 6;

/// The 20-bit LCU instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcuWord {
    pub muxa_sel: u8,
    pub muxb_sel: u8,
    pub br_mode: bool,
    pub alu_op: AluOp,
    pub rf_we: bool,
    pub rf_wsel: u8,
    pub imm: u8,
}

impl Default for LcuWord {
    fn default() -> Self {
        Self {
            muxa_sel: 0,
            muxb_sel: 0,
            br_mode: false,
            alu_op: AluOp::Nop,
            rf_we: false,
            rf_wsel: 0,
            imm: 0,
        }
    }
}

impl LcuWord {
    pub fn encode(&self) -> u32 {
        insert(self.muxa_sel as u32, MUXA_SHIFT, MUXA_WIDTH)
            | insert(self.muxb_sel as u32, MUXB_SHIFT, MUXB_WIDTH)
            | insert(self.br_mode as u32, BRMODE_SHIFT, BRMODE_WIDTH)
            | insert(self.alu_op as u32, ALUOP_SHIFT, ALUOP_WIDTH)
            | insert(self.rf_we as u32, RFWE_SHIFT, RFWE_WIDTH)
            | insert(self.rf_wsel as u32, RFWSEL_SHIFT, RFWSEL_WIDTH)
            | insert(self.imm as u32, IMM_SHIFT, IMM_WIDTH)
    }

    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        Ok(Self {
            muxa_sel: extract(word, MUXA_SHIFT, MUXA_WIDTH) as u8,
            muxb_sel: extract(word, MUXB_SHIFT, MUXB_WIDTH) as u8,
            br_mode: extract(word, BRMODE_SHIFT, BRMODE_WIDTH) != 0,
            alu_op: AluOp::from_field(extract(word, ALUOP_SHIFT, ALUOP_WIDTH)),
            rf_we: extract(word, RFWE_SHIFT, RFWE_WIDTH) != 0,
            rf_wsel: extract(word, RFWSEL_SHIFT, RFWSEL_WIDTH) as u8,
            imm: extract(word, IMM_SHIFT, IMM_WIDTH) as u8,
        })
    }

    /// Render this word as assembly text, given the cycle's resolved SRF
    /// arbitration fields (needed to print `SRF(k)` and to know whether
    /// this slot actually owns the SRF write this cycle).
    pub fn to_asm(&self, srf_sel: usize, srf_we: bool, alu_srf_write_is_lcu: bool) -> String {
        let alu_asm = self.alu_op.name();

        if self.br_mode {
            return format!("{}R {}", alu_asm, self.imm as i32);
        }
        if matches!(self.alu_op, AluOp::Nop | AluOp::Exit) {
            return alu_asm.to_string();
        }

        let mut muxb_asm = mux_b_name(self.muxb_sel).to_string();
        if muxb_asm == "SRF" {
            muxb_asm = format!("SRF({})", srf_sel);
        }
        let mut muxa_asm = mux_a_name(self.muxa_sel).to_string();
        if muxa_asm == "IMM" {
            muxa_asm = (self.imm as i32).to_string();
        }
        if muxa_asm == "SRF" {
            muxa_asm = format!("SRF({})", srf_sel);
        }

        let mut dest = String::new();
        let is_bgepd = matches!(self.alu_op, AluOp::Bgepd);
        if self.rf_we {
            let name = dest_name(self.rf_wsel);
            if !(is_bgepd && muxa_asm == name) {
                dest.push_str(name);
            }
        }
        if srf_we && alu_srf_write_is_lcu {
            let srf_name = format!("SRF({})", srf_sel);
            if !(is_bgepd && muxa_asm == srf_name) {
                if !dest.is_empty() {
                    dest.push_str(", ");
                }
                dest.push_str(&srf_name);
            }
        }

        let mut out = if dest.is_empty() {
            format!("{} {}, {}", alu_asm, muxa_asm, muxb_asm)
        } else {
            format!("{} {}, {}, {}", alu_asm, dest, muxa_asm, muxb_asm)
        };

        if matches!(self.alu_op, AluOp::Beq | AluOp::Bne | AluOp::Blt | AluOp::Bgepd) {
            out.push_str(&format!(", {}", self.imm as i32));
        }
        out
    }
}

fn dest_name(wsel: u8) -> &'static str {
    match wsel {
        0 => "R0",
        1 => "R1",
        2 => "R2",
        _ => "R3",
    }
}

/// Result of running one LCU instruction for one cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct LcuOutcome {
    pub branch: bool,
    pub branch_pc: i32,
    pub exit: bool,
}

/// Loop Control Unit state for one column.
#[derive(Debug, Clone)]
pub struct Lcu {
    pub regs: [i32; NUM_DREG],
    pub alu: Alu,
}

impl Default for Lcu {
    fn default() -> Self {
        Self::new()
    }
}

impl Lcu {
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_DREG],
            alu: Alu::new(),
        }
    }

    fn mux_value(&self, mux: u8, srf_val: i32, imm: i32, is_mux_a: bool, bgepd: bool) -> i32 {
        let dec = |v: i32| if bgepd && is_mux_a { v - 1 } else { v };
        match mux {
            0..=3 => dec(self.regs[mux as usize]),
            4 => dec(srf_val),
            5 => dec((crate::consts::SPM_NWORDS / CGRA_ROWS) as i32 - 1),
            6 => dec(0),
            7 => {
                if is_mux_a {
                    dec(imm)
                } else {
                    1
                }
            }
            _ => unreachable!("mux field is range-checked by bit width"),
        }
    }

    /// Execute this column's LCU for one cycle.
    ///
    /// `rc_flags` carries `(newRes == 0, newRes > 0)` for each RC in this
    /// column, used when `br_mode` routes branch conditions through the RC
    /// datapath instead of the LCU's own ALU.
    pub fn run(
        &mut self,
        word: &LcuWord,
        srf_val: i32,
        rc_flags: &[(bool, bool); CGRA_ROWS],
    ) -> LcuOutcome {
        let imm = word.imm as i32;
        let bgepd = matches!(word.alu_op, AluOp::Bgepd);
        let muxa_val = self.mux_value(word.muxa_sel, srf_val, imm, true, bgepd);
        let muxb_val = self.mux_value(word.muxb_sel, srf_val, imm, false, bgepd);

        let mut outcome = LcuOutcome::default();
        match word.alu_op {
            AluOp::Nop => {}
            AluOp::Sadd => self.alu.sadd(muxa_val, muxb_val),
            AluOp::Ssub => self.alu.ssub(muxa_val, muxb_val),
            AluOp::Sll => self.alu.sll(muxa_val, muxb_val),
            AluOp::Srl => self.alu.srl(muxa_val, muxb_val),
            AluOp::Sra => self.alu.sra(muxa_val, muxb_val),
            AluOp::Land => self.alu.land(muxa_val, muxb_val),
            AluOp::Lor => self.alu.lor(muxa_val, muxb_val),
            AluOp::Lxor => self.alu.lxor(muxa_val, muxb_val),
            AluOp::Beq | AluOp::Bne | AluOp::Bgepd | AluOp::Blt => {
                let (equal, greater) = if !word.br_mode {
                    self.alu.ssub(muxa_val, muxb_val);
                    (self.alu.new_res == 0, self.alu.new_res > 0)
                } else {
                    let equal = rc_flags.iter().any(|&(z, _)| z);
                    let greater = rc_flags.iter().any(|&(_, g)| g);
                    (equal, greater)
                };
                match word.alu_op {
                    AluOp::Beq if equal => {
                        outcome.branch = true;
                        outcome.branch_pc = imm;
                    }
                    AluOp::Bne if !equal => {
                        outcome.branch = true;
                        outcome.branch_pc = imm;
                    }
                    AluOp::Bgepd if greater || equal => {
                        outcome.branch = true;
                        outcome.branch_pc = imm;
                        self.alu.ssub(muxa_val, 0);
                    }
                    AluOp::Blt if !(greater || equal) => {
                        outcome.branch = true;
                        outcome.branch_pc = imm;
                    }
                    _ => {}
                }
            }
            AluOp::Jump => {
                outcome.branch = true;
                outcome.branch_pc = muxb_val + muxa_val;
            }
            AluOp::Exit => {
                outcome.exit = true;
            }
        }

        if word.rf_we {
            self.regs[word.rf_wsel as usize] = self.alu.new_res;
        }
        outcome
    }

    /// Assemble one line of LCU mnemonic text.
    ///
    /// Returns the word plus the SRF read/write index this instruction
    /// wants (`None` for no access), for the simulator's cross-slot
    /// arbitration pass.
    pub fn assemble(
        &self,
        line_no: usize,
        instr: &str,
    ) -> Result<(Option<usize>, Option<usize>, LcuWord), AsmError> {
        let tokens: Vec<&str> = instr
            .replace(',', " ")
            .split_whitespace()
            .map(|s| s)
            .collect();
        let tokens: Vec<String> = tokens.into_iter().map(String::from).collect();
        if tokens.is_empty() {
            return Err(AsmError::Other {
                line: line_no,
                message: "empty instruction".into(),
            });
        }
        let op = tokens[0].as_str();

        if op == "NOP" {
            if tokens.len() != 1 {
                return Err(AsmError::OperandCount { line: line_no, expected: 0, got: tokens.len() - 1 });
            }
            return Ok((None, None, LcuWord { alu_op: AluOp::Nop, ..Default::default() }));
        }
        if op == "EXIT" {
            if tokens.len() != 1 {
                return Err(AsmError::OperandCount { line: line_no, expected: 0, got: tokens.len() - 1 });
            }
            return Ok((None, None, LcuWord { alu_op: AluOp::Exit, ..Default::default() }));
        }

        if let Some(stripped) = op.strip_suffix('R') {
            if let Some(op) = arith_op(stripped).filter(|o| matches!(o, AluOp::Beq | AluOp::Bne | AluOp::Blt | AluOp::Bgepd)) {
                if tokens.len() != 2 {
                    return Err(AsmError::OperandCount { line: line_no, expected: 1, got: tokens.len() - 1 });
                }
                let imm: i32 = tokens[1].parse().map_err(|_| AsmError::OperandRange {
                    line: line_no,
                    operand: tokens[1].clone(),
                })?;
                return Ok((
                    None,
                    None,
                    LcuWord {
                        imm: imm as u8,
                        alu_op: op,
                        br_mode: true,
                        ..Default::default()
                    },
                ));
            }
        }

        if let Some(op) = arith_op(op) {
            let operands = &tokens[1..];
            let is_branch = matches!(op, AluOp::Beq | AluOp::Bne | AluOp::Blt);
            let min_ops = if is_branch { 3 } else { 2 };
            if operands.len() < min_ops {
                return Err(AsmError::OperandCount {
                    line: line_no,
                    expected: min_ops,
                    got: operands.len(),
                });
            }
            let take_imm = is_branch;
            let (dests, muxa_tok, muxb_tok, imm_tok) = if take_imm {
                let dests = &operands[..operands.len() - 3];
                (dests, &operands[operands.len() - 3], &operands[operands.len() - 2], Some(&operands[operands.len() - 1]))
            } else {
                let dests = &operands[..operands.len() - 2];
                (dests, &operands[operands.len() - 2], &operands[operands.len() - 1], None)
            };

            let mut rf_we = false;
            let mut rf_wsel = 0u8;
            let mut srf_str_index = None;
            for d in dests {
                if let Some(r) = parse_reg(d) {
                    rf_we = true;
                    rf_wsel = r;
                } else if let Some(idx) = parse_srf(d) {
                    srf_str_index = Some(idx);
                }
            }

            let (muxa_sel, srf_a) = parse_mux_a(muxa_tok);
            let (muxb_sel, srf_b) = parse_mux_b(muxb_tok);
            let (muxa_sel, imm_from_muxa) = match muxa_sel {
                Some(v) => (v, None),
                None => (
                    MuxASel::Imm as u8,
                    Some(muxa_tok.parse::<i32>().map_err(|_| AsmError::OperandRange {
                        line: line_no,
                        operand: muxa_tok.clone(),
                    })?),
                ),
            };
            let muxb_sel = muxb_sel.ok_or_else(|| AsmError::OperandRange {
                line: line_no,
                operand: muxb_tok.clone(),
            })?;

            let imm = if let Some(tok) = imm_tok {
                tok.parse::<i32>().map_err(|_| AsmError::OperandRange {
                    line: line_no,
                    operand: tok.clone(),
                })?
            } else {
                imm_from_muxa.unwrap_or(0)
            };

            let srf_read = srf_a.or(srf_b);

            return Ok((
                srf_read,
                srf_str_index,
                LcuWord {
                    muxa_sel,
                    muxb_sel,
                    br_mode: false,
                    alu_op: op,
                    rf_we,
                    rf_wsel,
                    imm: imm as u8,
                },
            ));
        }

        if op == "JUMP" {
            let operands = &tokens[1..];
            if operands.len() < 2 {
                return Err(AsmError::OperandCount { line: line_no, expected: 2, got: operands.len() });
            }
            let muxa_tok = &operands[operands.len() - 2];
            let muxb_tok = &operands[operands.len() - 1];
            let (muxa_sel, srf_a) = parse_mux_a(muxa_tok);
            let (muxb_sel, srf_b) = parse_mux_b(muxb_tok);
            let (muxa_sel, imm) = match muxa_sel {
                Some(v) => (v, 0),
                None => (
                    MuxASel::Imm as u8,
                    muxa_tok.parse::<i32>().map_err(|_| AsmError::OperandRange {
                        line: line_no,
                        operand: muxa_tok.clone(),
                    })?,
                ),
            };
            let muxb_sel = muxb_sel.ok_or_else(|| AsmError::OperandRange {
                line: line_no,
                operand: muxb_tok.clone(),
            })?;
            return Ok((
                srf_a.or(srf_b),
                None,
                LcuWord {
                    muxa_sel,
                    muxb_sel,
                    br_mode: false,
                    alu_op: AluOp::Jump,
                    imm: imm as u8,
                    ..Default::default()
                },
            ));
        }

        Err(AsmError::UnknownMnemonic { line: line_no, mnemonic: op.to_string() })
    }
}

fn arith_op(name: &str) -> Option<AluOp> {
    Some(match name {
        "SADD" => AluOp::Sadd,
        "SSUB" => AluOp::Ssub,
        "SLL" => AluOp::Sll,
        "SRL" => AluOp::Srl,
        "SRA" => AluOp::Sra,
        "LAND" => AluOp::Land,
        "LOR" => AluOp::Lor,
        "LXOR" => AluOp::Lxor,
        "BEQ" => AluOp::Beq,
        "BNE" => AluOp::Bne,
        "BLT" => AluOp::Blt,
        "BGEPD" => AluOp::Bgepd,
        _ => return None,
    })
}

fn parse_reg(tok: &str) -> Option<u8> {
    let rest = tok.strip_prefix('R')?;
    let n: u8 = rest.parse().ok()?;
    if n < NUM_DREG as u8 {
        Some(n)
    } else {
        None
    }
}

fn parse_srf(tok: &str) -> Option<usize> {
    let rest = tok.strip_prefix("SRF(")?.strip_suffix(')')?;
    rest.parse().ok()
}

fn parse_mux_a(tok: &str) -> (Option<u8>, Option<usize>) {
    if let Some(r) = parse_reg(tok) {
        return (Some(r), None);
    }
    if let Some(idx) = parse_srf(tok) {
        return (Some(MuxASel::Srf as u8), Some(idx));
    }
    match tok {
        "ZERO" => (Some(MuxASel::Zero as u8), None),
        "LAST" => (Some(MuxASel::Last as u8), None),
        _ => (None, None),
    }
}

fn parse_mux_b(tok: &str) -> (Option<u8>, Option<usize>) {
    if let Some(r) = parse_reg(tok) {
        return (Some(r), None);
    }
    if let Some(idx) = parse_srf(tok) {
        return (Some(MuxBSel::Srf as u8), Some(idx));
    }
    match tok {
        "ZERO" => (Some(MuxBSel::Zero as u8), None),
        "LAST" => (Some(MuxBSel::Last as u8), None),
        "ONE" => (Some(MuxBSel::One as u8), None),
        _ => (None, None),
    }
}

impl fmt::Display for LcuWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_asm(0, false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip() {
        let w = LcuWord {
            muxa_sel: 2,
            muxb_sel: 5,
            br_mode: true,
            alu_op: AluOp::Beq,
            rf_we: true,
            rf_wsel: 3,
            imm: 17,
        };
        assert_eq!(LcuWord::decode(w.encode()).unwrap(), w);
    }

    #[test]
    fn nop_and_exit_render_bare() {
        let nop = LcuWord { alu_op: AluOp::Nop, ..Default::default() };
        assert_eq!(nop.to_asm(0, false, false), "NOP");
        let exit = LcuWord { alu_op: AluOp::Exit, ..Default::default() };
        assert_eq!(exit.to_asm(0, false, false), "EXIT");
    }

    #[test]
    fn jump_adds_operands() {
        let mut lcu = Lcu::new();
        lcu.regs[0] = 10;
        let word = LcuWord {
            muxa_sel: 0,
            muxb_sel: 7, // ONE on muxB path is unused here; use R0 for muxb too
            alu_op: AluOp::Jump,
            ..Default::default()
        };
        let outcome = lcu.run(&word, 0, &[(false, false); CGRA_ROWS]);
        assert!(outcome.branch);
    }

    #[test]
    fn assemble_nop() {
        let lcu = Lcu::new();
        let (r, w, word) = lcu.assemble(1, "NOP").unwrap();
        assert_eq!(r, None);
        assert_eq!(w, None);
        assert_eq!(word.alu_op, AluOp::Nop);
    }

    #[test]
    fn assemble_sadd() {
        let lcu = Lcu::new();
        let (_, _, word) = lcu.assemble(1, "SADD R0, R1, R2").unwrap();
        assert_eq!(word.alu_op, AluOp::Sadd);
        assert!(word.rf_we);
    }
}
