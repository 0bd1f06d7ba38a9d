//! Daemon command opcodes.
//!
//! Only the subset the client issues itself is named here. Any other opcode
//! can still be sent through a raw [`Command`](crate::Command).

/// Set line mode.
pub const MODES: u32 = 0;
/// Get line mode.
pub const MODEG: u32 = 1;
/// Set pull-up/down resistor.
pub const PUD: u32 = 2;
/// Read line level.
pub const READ: u32 = 3;
/// Write line level.
pub const WRITE: u32 = 4;
/// Read levels of bank 1 (lines 0-31).
pub const BR1: u32 = 10;
/// Clear lines of bank 1.
pub const BC1: u32 = 12;
/// Set lines of bank 1.
pub const BS1: u32 = 14;
/// Current daemon tick.
pub const TICK: u32 = 16;
/// Hardware revision.
pub const HWVER: u32 = 17;
/// Open notification handle.
pub const NO: u32 = 18;
/// Begin notifications with a monitor mask.
pub const NB: u32 = 19;
/// Pause notifications.
pub const NP: u32 = 20;
/// Close notification handle.
pub const NC: u32 = 21;
/// Daemon software version.
pub const PIGPV: u32 = 26;
/// Store script.
pub const PROC: u32 = 38;
/// Delete script.
pub const PROCD: u32 = 39;
/// Run script.
pub const PROCR: u32 = 40;
/// Stop script.
pub const PROCS: u32 = 41;
/// Script status and parameters.
pub const PROCP: u32 = 45;
/// Turn the current socket into a notification pipe.
pub const NOIB: u32 = 99;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(opcode: u32) -> &'static str {
    match opcode {
        MODES => "MODES",
        MODEG => "MODEG",
        PUD => "PUD",
        READ => "READ",
        WRITE => "WRITE",
        BR1 => "BR1",
        BC1 => "BC1",
        BS1 => "BS1",
        TICK => "TICK",
        HWVER => "HWVER",
        NO => "NO",
        NB => "NB",
        NP => "NP",
        NC => "NC",
        PIGPV => "PIGPV",
        PROC => "PROC",
        PROCD => "PROCD",
        PROCR => "PROCR",
        PROCS => "PROCS",
        PROCP => "PROCP",
        NOIB => "NOIB",
        _ => "OTHER",
    }
}

/// Returns true if the daemon answers this opcode with a length-announced
/// payload after the response header.
pub fn has_payload(opcode: u32) -> bool {
    matches!(opcode, PROCP)
}
