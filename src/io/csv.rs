//! CSV table I/O for kernel instruction streams: the hex and assembly
//! variants of the per-cycle instruction table exchanged with the build
//! tooling, plus the glue that resolves cross-slot SRF/VWR arbitration
//! when assembling a whole cycle's worth of mnemonics at once.

use std::io::{Read, Write};

use crate::cgra::Cgra;
use crate::consts::CGRA_ROWS;
use crate::error::{AsmError, DecodeError, IoError, SimError};
use crate::kmem::ColumnUsage;
use crate::slots::lcu::{Lcu, LcuWord};
use crate::slots::lsu::{Lsu, LsuWord};
use crate::slots::mxcu::{AluSrfWrite, Mxcu, MxcuWord, VwrSel};
use crate::slots::rc::{Rc, RcWord};
use crate::srf::{self, SrfAccess, SrfWriteSource};

/// One cycle's instruction words, already encoded, in `LCU,LSU,MXCU,RC0..RC3` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HexRow {
    pub lcu: u32,
    pub lsu: u32,
    pub mxcu: u32,
    pub rcs: [u32; CGRA_ROWS],
}

/// One cycle's instruction mnemonics, same column order.
#[derive(Debug, Clone)]
pub struct AsmRow {
    pub lcu: String,
    pub lsu: String,
    pub mxcu: String,
    pub rcs: [String; CGRA_ROWS],
}

fn column_names() -> Vec<String> {
    let mut names = vec!["LCU".to_string(), "LSU".to_string(), "MXCU".to_string()];
    for rc in 0..CGRA_ROWS {
        names.push(format!("RC{}", rc));
    }
    names
}

/// Resolve `LCU`/`LSU`/`MXCU`/`RC0..RCn` column positions out of a CSV
/// header row, tolerating any column order (mirrors `compileAsmToHex`'s
/// name-indexed header scan rather than assuming a fixed layout).
struct ColumnIndex {
    lcu: usize,
    lsu: usize,
    mxcu: usize,
    rcs: [usize; CGRA_ROWS],
}

impl ColumnIndex {
    fn from_header(header: &csv::StringRecord) -> Result<Self, IoError> {
        let mut lcu = None;
        let mut lsu = None;
        let mut mxcu = None;
        let mut rcs = [None; CGRA_ROWS];
        for (i, name) in header.iter().enumerate() {
            match name {
                "LCU" => lcu = Some(i),
                "LSU" => lsu = Some(i),
                "MXCU" => mxcu = Some(i),
                other => {
                    for (rc, slot) in rcs.iter_mut().enumerate() {
                        if other == format!("RC{}", rc) {
                            *slot = Some(i);
                        }
                    }
                }
            }
        }
        let missing = |name: &str| IoError::MissingColumn(name.to_string());
        Ok(Self {
            lcu: lcu.ok_or_else(|| missing("LCU"))?,
            lsu: lsu.ok_or_else(|| missing("LSU"))?,
            mxcu: mxcu.ok_or_else(|| missing("MXCU"))?,
            rcs: {
                let mut out = [0usize; CGRA_ROWS];
                for (i, slot) in rcs.iter().enumerate() {
                    out[i] = slot.ok_or_else(|| missing(&format!("RC{}", i)))?;
                }
                out
            },
        })
    }
}

pub fn read_hex_csv(src: impl Read) -> Result<Vec<HexRow>, IoError> {
    let mut reader = csv::Reader::from_reader(src);
    let header = reader.headers()?.clone();
    let idx = ColumnIndex::from_header(&header)?;

    let parse = |s: &str| -> Result<u32, IoError> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        u32::from_str_radix(digits, 16).map_err(|_| IoError::MissingColumn(s.to_string()))
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut rcs = [0u32; CGRA_ROWS];
        for (rc, col) in idx.rcs.iter().enumerate() {
            rcs[rc] = parse(&record[*col])?;
        }
        rows.push(HexRow {
            lcu: parse(&record[idx.lcu])?,
            lsu: parse(&record[idx.lsu])?,
            mxcu: parse(&record[idx.mxcu])?,
            rcs,
        });
    }
    Ok(rows)
}

pub fn write_hex_csv(dst: impl Write, rows: &[HexRow]) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_writer(dst);
    writer.write_record(column_names())?;
    for row in rows {
        let mut record = vec![
            format!("{:#x}", row.lcu),
            format!("{:#x}", row.lsu),
            format!("{:#x}", row.mxcu),
        ];
        record.extend(row.rcs.iter().map(|w| format!("{:#x}", w)));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(IoError::Io)
}

pub fn read_asm_csv(src: impl Read) -> Result<Vec<AsmRow>, IoError> {
    let mut reader = csv::Reader::from_reader(src);
    let header = reader.headers()?.clone();
    let idx = ColumnIndex::from_header(&header)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let rcs: [String; CGRA_ROWS] = std::array::from_fn(|rc| record[idx.rcs[rc]].to_string());
        rows.push(AsmRow {
            lcu: record[idx.lcu].to_string(),
            lsu: record[idx.lsu].to_string(),
            mxcu: record[idx.mxcu].to_string(),
            rcs,
        });
    }
    Ok(rows)
}

pub fn write_asm_csv(dst: impl Write, rows: &[AsmRow]) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_writer(dst);
    writer.write_record(column_names())?;
    for row in rows {
        let mut record = vec![row.lcu.clone(), row.lsu.clone(), row.mxcu.clone()];
        record.extend(row.rcs.iter().cloned());
        writer.write_record(&record)?;
    }
    writer.flush().map_err(IoError::Io)
}

/// Load one kernel's already-hex-encoded instruction stream into the
/// global IMEM. Columns are appended sequentially starting at
/// `imem_add_start` without resetting between columns, reproducing the
/// reference loader's addressing exactly (a kernel spanning both columns
/// therefore shares one instruction stream across both, since `run`
/// addresses the global IMEM identically for every active column).
pub fn load_kernel_hex(cgra: &mut Cgra, kernel_number: usize, rows: &[HexRow]) -> Result<(), SimError> {
    let params = cgra.kmem.get_params(kernel_number)?;
    let n_instr = (params.num_instructions_minus_one + 1) as usize;
    let (start_col, end_col) = ColumnUsage::from_one_hot(params.column_usage)?.col_range();
    let n_used_cols = end_col - start_col + 1;
    if rows.len() < n_instr * n_used_cols {
        return Err(SimError::InstructionCountRange(rows.len() as u32));
    }

    let mut addr = params.imem_add_start as usize;
    for row in rows.iter().take(n_instr * n_used_cols) {
        cgra.imem.lcu.set(addr, row.lcu);
        cgra.imem.lsu.set(addr, row.lsu);
        cgra.imem.mxcu.set(addr, row.mxcu);
        for (rc, word) in row.rcs.iter().enumerate() {
            cgra.imem.rcs[rc].set(addr, *word);
        }
        addr += 1;
    }
    Ok(())
}

/// Assemble one column's worth of mnemonic rows for one cycle into
/// their instruction words, resolving the cycle's SRF arbitration and
/// VWR write-enable fan-out the way `compileAsmToHex` does before
/// encoding the MXCU word last.
fn assemble_cycle(
    lcu: &Lcu,
    lsu: &Lsu,
    rcs: &[Rc; CGRA_ROWS],
    mxcu: &Mxcu,
    line_no: usize,
    row: &AsmRow,
) -> Result<HexRow, AsmError> {
    let (lcu_srf_read, lcu_srf_write, lcu_word) = lcu.assemble(line_no, &row.lcu)?;
    let (lsu_srf_read, lsu_srf_write, lsu_word) = lsu.assemble(line_no, &row.lsu)?;

    let mut rc_words = [Default::default(); CGRA_ROWS];
    let mut rc_srf = [SrfAccess::default(); CGRA_ROWS];
    let mut vwr_letters: [Option<char>; CGRA_ROWS] = [None; CGRA_ROWS];
    for r in 0..CGRA_ROWS {
        let (srf_read, srf_write, vwr_write, word) = rcs[r].assemble(line_no, &row.rcs[r])?;
        rc_srf[r] = SrfAccess { read_idx: srf_read, write_idx: srf_write };
        vwr_letters[r] = vwr_write;
        rc_words[r] = word;
    }

    let lcu_access = SrfAccess { read_idx: lcu_srf_read, write_idx: lcu_srf_write };
    let lsu_access = SrfAccess { read_idx: lsu_srf_read, write_idx: lsu_srf_write };
    let arbitration = srf::arbitrate(lcu_access, lsu_access, &rc_srf).map_err(|e| AsmError::Other {
        line: line_no,
        message: e.to_string(),
    })?;

    let mut vwr_row_we = [false; CGRA_ROWS];
    let mut concrete_letter = None;
    let mut rout_present = false;
    for (r, letter) in vwr_letters.iter().enumerate() {
        match letter {
            Some('_') => {
                vwr_row_we[r] = true;
                rout_present = true;
            }
            Some(c) => {
                vwr_row_we[r] = true;
                if let Some(prev) = concrete_letter {
                    if prev != *c {
                        return Err(AsmError::ConflictingDest {
                            line: line_no,
                            a: prev.to_string(),
                            b: c.to_string(),
                        });
                    }
                } else {
                    concrete_letter = Some(*c);
                }
            }
            None => {}
        }
    }
    let _ = rout_present;
    let vwr_sel = match concrete_letter {
        Some('B') => VwrSel::VwrB,
        Some('C') => VwrSel::VwrC,
        _ => VwrSel::VwrA,
    };

    let (_, _, mut mxcu_word) = mxcu.assemble(line_no, &row.mxcu)?;
    mxcu_word.srf_we = arbitration.srf_we;
    mxcu_word.srf_sel = arbitration.srf_sel as u8;
    mxcu_word.alu_srf_write = match arbitration.write_source {
        SrfWriteSource::Lcu => AluSrfWrite::Lcu,
        SrfWriteSource::Rc0 => AluSrfWrite::Rc0,
        SrfWriteSource::Mxcu => AluSrfWrite::Mxcu,
        SrfWriteSource::Lsu => AluSrfWrite::Lsu,
    };
    mxcu_word.vwr_sel = vwr_sel;
    mxcu_word.vwr_row_we = vwr_row_we;

    Ok(HexRow {
        lcu: lcu_word.encode(),
        lsu: lsu_word.encode(),
        mxcu: mxcu_word.encode(),
        rcs: std::array::from_fn(|r| rc_words[r].encode()),
    })
}

/// Assemble a whole kernel's asm rows and load the result straight into
/// the CGRA's IMEM, mirroring `compileAsmToHex`'s end-to-end behaviour.
pub fn compile_asm_to_hex(
    cgra: &mut Cgra,
    kernel_number: usize,
    col: usize,
    rows: &[AsmRow],
) -> Result<Vec<HexRow>, AsmError> {
    let column = &cgra.columns[col];
    let mut out = Vec::with_capacity(rows.len());
    for (line_no, row) in rows.iter().enumerate() {
        out.push(assemble_cycle(&column.lcu, &column.lsu, &column.rcs, &column.mxcu, line_no + 1, row)?);
    }
    Ok(out)
}

/// Render one cycle's already-decoded words back to mnemonic text. The MXCU
/// word alone carries the cycle's resolved SRF index/write-source and VWR
/// selector, since `assemble_cycle` folds every other slot's contribution
/// into it before encoding; disassembly just reads those fields back out
/// instead of re-arbitrating anything.
fn disassemble_cycle(lcu_word: &LcuWord, lsu_word: &LsuWord, mxcu_word: &MxcuWord, rc_words: &[RcWord; CGRA_ROWS]) -> AsmRow {
    let srf_sel = mxcu_word.srf_sel as usize;
    let srf_we = mxcu_word.srf_we;
    let alu_srf_write_is_lcu = matches!(mxcu_word.alu_srf_write, AluSrfWrite::Lcu);
    let alu_srf_write_is_lsu = matches!(mxcu_word.alu_srf_write, AluSrfWrite::Lsu);
    let row0_writes_srf = matches!(mxcu_word.alu_srf_write, AluSrfWrite::Rc0);
    let selected_vwr = match mxcu_word.vwr_sel {
        VwrSel::VwrA => "VWR_A",
        VwrSel::VwrB => "VWR_B",
        VwrSel::VwrC => "VWR_C",
    };

    AsmRow {
        lcu: lcu_word.to_asm(srf_sel, srf_we, alu_srf_write_is_lcu),
        lsu: lsu_word.to_asm(srf_sel, alu_srf_write_is_lsu, srf_we),
        mxcu: mxcu_word.to_asm(),
        rcs: std::array::from_fn(|r| {
            rc_words[r].to_asm(srf_sel, selected_vwr, mxcu_word.vwr_row_we[r], srf_we, row0_writes_srf, r)
        }),
    }
}

/// Disassemble a whole kernel's hex rows back to mnemonic text, mirroring
/// `compileHexToAsm`'s decode-then-render pass (the inverse of
/// [`compile_asm_to_hex`]).
pub fn compile_hex_to_asm(rows: &[HexRow]) -> Result<Vec<AsmRow>, DecodeError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let lcu_word = LcuWord::decode(row.lcu)?;
        let lsu_word = LsuWord::decode(row.lsu)?;
        let mxcu_word = MxcuWord::decode(row.mxcu)?;
        let rc_words: [RcWord; CGRA_ROWS] = {
            let mut words = [RcWord::default(); CGRA_ROWS];
            for (r, word) in words.iter_mut().enumerate() {
                *word = RcWord::decode(row.rcs[r])?;
            }
            words
        };
        out.push(disassemble_cycle(&lcu_word, &lsu_word, &mxcu_word, &rc_words));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_csv_roundtrip() {
        let rows = vec![HexRow {
            lcu: 0x1234,
            lsu: 0x5678,
            mxcu: 0xABCDE,
            rcs: [1, 2, 3, 4],
        }];
        let mut buf = Vec::new();
        write_hex_csv(&mut buf, &rows).unwrap();
        let parsed = read_hex_csv(buf.as_slice()).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn asm_csv_roundtrip() {
        let rows = vec![AsmRow {
            lcu: "NOP".to_string(),
            lsu: "NOP/NOP".to_string(),
            mxcu: "NOP".to_string(),
            rcs: std::array::from_fn(|_| "NOP".to_string()),
        }];
        let mut buf = Vec::new();
        write_asm_csv(&mut buf, &rows).unwrap();
        let parsed = read_asm_csv(buf.as_slice()).unwrap();
        assert_eq!(parsed[0].lcu, "NOP");
        assert_eq!(parsed[0].rcs[2], "NOP");
    }

    #[test]
    fn compile_asm_to_hex_resolves_srf_write_source() {
        let mut cgra = Cgra::new();
        cgra.kernel_config(ColumnUsage::Col0, 1, 0, 0, 1).unwrap();
        let rows = vec![AsmRow {
            lcu: "NOP".to_string(),
            lsu: "SADD R0, R0, R1/NOP".to_string(),
            mxcu: "NOP".to_string(),
            rcs: std::array::from_fn(|_| "NOP".to_string()),
        }];
        let hex = compile_asm_to_hex(&mut cgra, 1, 0, &rows).unwrap();
        assert_eq!(hex.len(), 1);
    }

    #[test]
    fn compile_hex_to_asm_recovers_srf_write_destination() {
        let mut cgra = Cgra::new();
        cgra.kernel_config(ColumnUsage::Col0, 1, 0, 0, 1).unwrap();
        let rows = vec![AsmRow {
            lcu: "NOP".to_string(),
            lsu: "SADD SRF(4), R0, R1/NOP".to_string(),
            mxcu: "NOP".to_string(),
            rcs: std::array::from_fn(|_| "NOP".to_string()),
        }];
        let hex = compile_asm_to_hex(&mut cgra, 1, 0, &rows).unwrap();
        let asm = compile_hex_to_asm(&hex).unwrap();
        assert_eq!(asm.len(), 1);
        assert!(asm[0].lsu.contains("SRF(4)"));
        assert_eq!(asm[0].mxcu, "NOP");
    }

    #[test]
    fn compile_hex_to_asm_of_all_nop_is_all_nop() {
        let rows = vec![HexRow {
            lcu: 0,
            lsu: 0,
            mxcu: 0,
            rcs: [0; CGRA_ROWS],
        }];
        let asm = compile_hex_to_asm(&rows).unwrap();
        assert_eq!(asm[0].lcu, "NOP");
        assert_eq!(asm[0].mxcu, "NOP");
        assert!(asm[0].lsu.starts_with("NOP"));
        assert!(asm[0].rcs.iter().all(|s| s == "NOP"));
    }
}
