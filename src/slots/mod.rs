//! The four specialized instruction slots that make up one column: the
//! Loop Control Unit, Load Store Unit, Multiplexer Control Unit, and the
//! Reconfigurable Cells.

pub mod lcu;
pub mod lsu;
pub mod mxcu;
pub mod rc;
