//! Cycle-accurate simulator and assembler/disassembler for the VWR2A
//! CGRA: a two-column, four-row coarse-grained reconfigurable array
//! with a Loop Control Unit, Load Store Unit, Multiplexer Control
//! Unit, and four Reconfigurable Cells per column, sharing a Scalar
//! Register File, three Vector Working Registers, and a global
//! scratchpad memory.

pub mod alu;
pub mod bits;
pub mod cgra;
pub mod consts;
pub mod error;
pub mod imem;
pub mod io;
pub mod kmem;
pub mod slots;
pub mod spm;
pub mod srf;
pub mod vwr;

pub mod prelude {
    pub use crate::alu::Alu;
    pub use crate::cgra::{Cgra, Column};
    pub use crate::consts::*;
    pub use crate::error::{ArbitrationError, AsmError, DecodeError, SimError, UnsupportedError, Vwr2aError};
    pub use crate::imem::{Imem, SlotImem};
    pub use crate::kmem::{ColumnUsage, KernelConfig, KernelInfo, Kmem};
    pub use crate::slots::lcu::Lcu;
    pub use crate::slots::lsu::Lsu;
    pub use crate::slots::mxcu::Mxcu;
    pub use crate::slots::rc::Rc;
    pub use crate::spm::Spm;
    pub use crate::srf::Srf;
    pub use crate::vwr::Vwr;
}
