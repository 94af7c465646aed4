use crate::err::Qca8kError;
use crate::regs::{port_mib_counter, FlagReg, MibCtrl, ModuleEn, RegIo, Regmap, QCA8K_NUM_PORTS};

/// One MIB counter: its width in 32-bit words, offset inside the per-port
/// counter block, and display name.
#[derive(Debug, Clone, Copy)]
pub struct MibDesc {
    pub size: u8,
    pub offset: u16,
    pub name: &'static str,
}

const fn mib(size: u8, offset: u16, name: &'static str) -> MibDesc {
    MibDesc { size, offset, name }
}

/// AR8327-family counter layout, shared by the QCA8337.
pub const AR8327_MIB: [MibDesc; 39] = [
    mib(1, 0x00, "RxBroad"),
    mib(1, 0x04, "RxPause"),
    mib(1, 0x08, "RxMulti"),
    mib(1, 0x0c, "RxFcsErr"),
    mib(1, 0x10, "RxAlignErr"),
    mib(1, 0x14, "RxRunt"),
    mib(1, 0x18, "RxFragment"),
    mib(1, 0x1c, "Rx64Byte"),
    mib(1, 0x20, "Rx128Byte"),
    mib(1, 0x24, "Rx256Byte"),
    mib(1, 0x28, "Rx512Byte"),
    mib(1, 0x2c, "Rx1024Byte"),
    mib(1, 0x30, "Rx1518Byte"),
    mib(1, 0x34, "RxMaxByte"),
    mib(1, 0x38, "RxTooLong"),
    mib(2, 0x3c, "RxGoodByte"),
    mib(2, 0x44, "RxBadByte"),
    mib(1, 0x4c, "RxOverFlow"),
    mib(1, 0x50, "Filtered"),
    mib(1, 0x54, "TxBroad"),
    mib(1, 0x58, "TxPause"),
    mib(1, 0x5c, "TxMulti"),
    mib(1, 0x60, "TxUnderRun"),
    mib(1, 0x64, "Tx64Byte"),
    mib(1, 0x68, "Tx128Byte"),
    mib(1, 0x6c, "Tx256Byte"),
    mib(1, 0x70, "Tx512Byte"),
    mib(1, 0x74, "Tx1024Byte"),
    mib(1, 0x78, "Tx1518Byte"),
    mib(1, 0x7c, "TxMaxByte"),
    mib(1, 0x80, "TxOverSize"),
    mib(2, 0x84, "TxByte"),
    mib(1, 0x8c, "TxCollision"),
    mib(1, 0x90, "TxAbortCol"),
    mib(1, 0x94, "TxMultiCol"),
    mib(1, 0x98, "TxSingleCol"),
    mib(1, 0x9c, "TxExcDefer"),
    mib(1, 0xa0, "TxDefer"),
    mib(1, 0xa4, "TxLateCol"),
];

/// Flush the counter engine, keep CPU-bound frames counted, switch the
/// MIB block on.
pub fn mib_init<B: RegIo>(regs: &mut Regmap<B>) -> Result<(), Qca8kError> {
    regs.modify_reg(|v: MibCtrl| v | MibCtrl::FLUSH | MibCtrl::BUSY)?;
    regs.busy_wait(MibCtrl::REG, MibCtrl::BUSY.bits())?;
    regs.modify_reg(|v: MibCtrl| v | MibCtrl::CPU_KEEP)?;
    regs.write_reg(ModuleEn::MIB)
}

/// Discard all counters.
pub fn mib_flush<B: RegIo>(regs: &mut Regmap<B>) -> Result<(), Qca8kError> {
    regs.modify_reg(|v: MibCtrl| v | MibCtrl::FLUSH | MibCtrl::BUSY)?;
    regs.busy_wait(MibCtrl::REG, MibCtrl::BUSY.bits())
}

/// Read every counter of one port. Two-word counters are little-end first
/// in the block.
pub fn mib_read<B: RegIo>(
    regs: &mut Regmap<B>,
    port: usize,
) -> Result<[u64; AR8327_MIB.len()], Qca8kError> {
    if port >= QCA8K_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }

    let base = port_mib_counter(port);
    let mut out = [0u64; AR8327_MIB.len()];

    for (slot, desc) in out.iter_mut().zip(AR8327_MIB.iter()) {
        let mut val = regs.read_32(base + desc.offset as u32)? as u64;
        if desc.size == 2 {
            let hi = regs.read_32(base + desc.offset as u32 + 4)? as u64;
            val |= hi << 32;
        }
        *slot = val;
    }

    Ok(out)
}
