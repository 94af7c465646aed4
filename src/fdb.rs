use alloc::vec::Vec;
use log::debug;

use crate::err::Qca8kError;
use crate::regs::{
    AtuFunc, RegIo, Regmap, ATU_ADDR0_S, ATU_ADDR2_S, ATU_ADDR3_S, ATU_ADDR4_S, ATU_DATA0,
    ATU_DATA1, ATU_DATA2, ATU_FUNC_PORT_M, ATU_FUNC_PORT_S, ATU_PORT_M, ATU_PORT_S,
    ATU_STATUS_M, ATU_STATUS_STATIC, ATU_VID_M, ATU_VID_S, QCA8K_NUM_FDB_RECORDS,
};

/// ATU engine opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdbCommand {
    Flush = 1,
    Load = 2,
    Purge = 3,
    Next = 6,
    Search = 7,
}

/// One forwarding-database record, the software mirror of a hardware ATU
/// entry. The table holds [`QCA8K_NUM_FDB_RECORDS`] of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fdb {
    pub vid: u16,
    pub port_mask: u8,
    pub aging: u8,
    pub mac: [u8; 6],
}

impl Fdb {
    pub fn is_static(&self) -> bool {
        self.aging == ATU_STATUS_STATIC
    }
}

/* Key layout across the three data words:
 *   vid      83:72   data2
 *   aging    67:64   data2
 *   portmask 54:48   data1
 *   mac      47:0    data1/data0 */

fn fdb_write<B: RegIo>(
    regs: &mut Regmap<B>,
    vid: u16,
    port_mask: u8,
    mac: &[u8; 6],
    aging: u8,
) -> Result<(), Qca8kError> {
    let data2 = ((vid as u32 & ATU_VID_M) << ATU_VID_S) | (aging as u32 & ATU_STATUS_M);
    let data1 = ((port_mask as u32 & ATU_PORT_M) << ATU_PORT_S)
        | ((mac[0] as u32) << ATU_ADDR0_S)
        | mac[1] as u32;
    let data0 = ((mac[2] as u32) << ATU_ADDR2_S)
        | ((mac[3] as u32) << ATU_ADDR3_S)
        | ((mac[4] as u32) << ATU_ADDR4_S)
        | mac[5] as u32;

    regs.write_32(ATU_DATA0, data0)?;
    regs.write_32(ATU_DATA1, data1)?;
    regs.write_32(ATU_DATA2, data2)
}

fn fdb_read<B: RegIo>(regs: &mut Regmap<B>) -> Result<Fdb, Qca8kError> {
    let data0 = regs.read_32(ATU_DATA0)?;
    let data1 = regs.read_32(ATU_DATA1)?;
    let data2 = regs.read_32(ATU_DATA2)?;

    Ok(Fdb {
        vid: ((data2 >> ATU_VID_S) & ATU_VID_M) as u16,
        aging: (data2 & ATU_STATUS_M) as u8,
        port_mask: ((data1 >> ATU_PORT_S) & ATU_PORT_M) as u8,
        mac: [
            ((data1 >> ATU_ADDR0_S) & 0xff) as u8,
            (data1 & 0xff) as u8,
            ((data0 >> ATU_ADDR2_S) & 0xff) as u8,
            ((data0 >> ATU_ADDR3_S) & 0xff) as u8,
            ((data0 >> ATU_ADDR4_S) & 0xff) as u8,
            (data0 & 0xff) as u8,
        ],
    })
}

/// Kick the ATU engine: write the command with BUSY set, poll until the
/// hardware clears it, and on Load check whether the table rejected the
/// record for lack of space.
pub fn fdb_access<B: RegIo>(
    regs: &mut Regmap<B>,
    cmd: FdbCommand,
    port: Option<usize>,
) -> Result<(), Qca8kError> {
    let mut func = AtuFunc::BUSY | AtuFunc::from_bits_retain(cmd as u32);
    if let Some(port) = port {
        func |= AtuFunc::PORT_EN
            | AtuFunc::from_bits_retain((port as u32 & ATU_FUNC_PORT_M) << ATU_FUNC_PORT_S);
    }

    regs.write_reg(func)?;
    regs.wait_for::<AtuFunc>(|v| !v.contains(AtuFunc::BUSY), crate::regs::BUSY_WAIT_TRIES)?;

    if cmd == FdbCommand::Load {
        let func = regs.read_reg::<AtuFunc>()?;
        if func.contains(AtuFunc::FULL) {
            debug!("fdb load rejected, table full");
            return Err(Qca8kError::TableFull);
        }
    }

    Ok(())
}

/// Load a static entry into the hardware table.
pub fn fdb_add<B: RegIo>(regs: &mut Regmap<B>, fdb: &Fdb) -> Result<(), Qca8kError> {
    if fdb.vid as u32 > ATU_VID_M {
        return Err(Qca8kError::InvalidArg);
    }
    fdb_write(regs, fdb.vid, fdb.port_mask, &fdb.mac, fdb.aging)?;
    fdb_access(regs, FdbCommand::Load, None)
}

/// Purge the entry keyed by MAC and VLAN id.
pub fn fdb_del<B: RegIo>(regs: &mut Regmap<B>, vid: u16, mac: &[u8; 6]) -> Result<(), Qca8kError> {
    if vid as u32 > ATU_VID_M {
        return Err(Qca8kError::InvalidArg);
    }
    fdb_write(regs, vid, 0, mac, 0)?;
    fdb_access(regs, FdbCommand::Purge, None)
}

/// Flush learned entries, the whole table or one port's share of it.
pub fn fdb_flush<B: RegIo>(regs: &mut Regmap<B>, port: Option<usize>) -> Result<(), Qca8kError> {
    fdb_access(regs, FdbCommand::Flush, port)
}

/// Advance the walk: `fdb` is the current key going in, the successor
/// entry coming out. Returns false when the table is exhausted (the
/// hardware hands back an aged-out record).
pub fn fdb_next<B: RegIo>(
    regs: &mut Regmap<B>,
    fdb: &mut Fdb,
    port: Option<usize>,
) -> Result<bool, Qca8kError> {
    fdb_write(regs, fdb.vid, fdb.port_mask, &fdb.mac, fdb.aging)?;
    fdb_access(regs, FdbCommand::Next, port)?;
    *fdb = fdb_read(regs)?;
    Ok(fdb.aging != 0)
}

/// Walk the whole hardware table. Bounded by the record capacity so a
/// misbehaving ATU cannot spin us forever.
pub fn fdb_dump<B: RegIo>(
    regs: &mut Regmap<B>,
    port: Option<usize>,
) -> Result<Vec<Fdb>, Qca8kError> {
    let mut entries = Vec::new();
    let mut cursor = Fdb::default();

    for _ in 0..QCA8K_NUM_FDB_RECORDS {
        if !fdb_next(regs, &mut cursor, port)? {
            break;
        }
        entries.push(cursor);
    }

    Ok(entries)
}
