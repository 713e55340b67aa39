//! Error taxonomy for the VWR2A simulator.
//!
//! Each axis of failure gets its own enum, following the shape of the slot
//! it originates from; [`Vwr2aError`] aggregates them for callers that just
//! want one type to match on.

use thiserror::Error;

/// A fixed-width instruction word could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("reserved/out-of-range opcode value {value} in field `{field}`")]
    InvalidOpcode { field: &'static str, value: u32 },
    #[error("field `{field}` value {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: u32,
        bits: u32,
    },
}

/// Assembly text could not be parsed into an instruction word.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { line: usize, mnemonic: String },
    #[error("line {line}: expected {expected} operands, got {got}")]
    OperandCount {
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: operand `{operand}` out of range")]
    OperandRange { line: usize, operand: String },
    #[error("line {line}: conflicting destination registers (`{a}` and `{b}`)")]
    ConflictingDest { line: usize, a: String, b: String },
    #[error("line {line}: {message}")]
    Other { line: usize, message: String },
}

/// A cross-slot SRF access this cycle violates the single-index-per-cycle rule.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationError {
    #[error("only the RC on row 0 may write the SRF")]
    NonRow0Write,
    #[error("detected reads to different registers of the SRF in the same cycle")]
    DivergentReads,
    #[error("detected multiple writes to the SRF in the same cycle")]
    DivergentWrites,
    #[error("detected reads and writes to different registers of the SRF in the same cycle")]
    ReadWriteMismatch,
}

/// A decodable operation was executed but is not implemented by the functional model.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedError {
    #[error("half precision {0} is not supported")]
    HalfPrecision(&'static str),
    #[error("fixed-point division is not supported")]
    FixedPointDivide,
}

/// Configuration and driver-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("kernel slot {0} is reserved")]
    ReservedKernelSlot(usize),
    #[error("kernel slot {0} out of range (must be in 1..{1})")]
    KernelSlotRange(usize, usize),
    #[error("invalid instruction count {0} (must be in 1..64)")]
    InstructionCountRange(u32),
    #[error("SPM line {0} out of range (must be in 0..{1})")]
    SpmLineRange(usize, usize),
    #[error("VWR element index {0} out of range (must be in 0..{1})")]
    VwrIndexRange(usize, usize),
    #[error("SRF/SPM bank {0} out of range (must be in 0..{1})")]
    SrfBankRange(usize, usize),
    #[error("more than one column branched in the same cycle")]
    MultipleBranches,
    #[error("column usage one-hot value {0} is invalid (must be 1, 2, or 3)")]
    InvalidColumnUsage(u32),
}

/// I/O failures from the CSV and header-file surfaces.
#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("CSV table is missing column `{0}`")]
    MissingColumn(String),
}

/// Aggregated crate error.
#[derive(Debug, Error)]
pub enum Vwr2aError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Asm(#[from] AsmError),
    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error(transparent)]
    Io(#[from] IoError),
}
