use log::error;

use crate::err::Qca8kError;
use crate::regs::{
    mdio_master_phy_addr, mdio_master_reg_addr, MdioMaster, RegIo, Regmap, BUSY_WAIT_TRIES,
    MDIO_MASTER_MAX_PORTS, MDIO_MASTER_MAX_REG, MII_ATH_MMD_ADDR, MII_ATH_MMD_DATA,
};

/// Clause-22 MDIO bus the switch hangs off. One transaction outstanding at
/// a time; callers serialize.
pub trait MdioBus {
    fn read(&mut self, phy: u8, reg: u8) -> Result<u16, Qca8kError>;
    fn write(&mut self, phy: u8, reg: u8, val: u16) -> Result<(), Qca8kError>;
}

/* Atheros MMD indirection: select the MMD, name the register, flip the
 * address register into data mode, then move the payload. */

pub fn mmd_write<M: MdioBus>(
    bus: &mut M,
    phy: u8,
    mmd: u16,
    reg: u16,
    val: u16,
) -> Result<(), Qca8kError> {
    bus.write(phy, MII_ATH_MMD_ADDR, mmd)?;
    bus.write(phy, MII_ATH_MMD_DATA, reg)?;
    bus.write(phy, MII_ATH_MMD_ADDR, 0x4000 | mmd)?;
    bus.write(phy, MII_ATH_MMD_DATA, val)
}

pub fn mmd_read<M: MdioBus>(bus: &mut M, phy: u8, mmd: u16, reg: u16) -> Result<u16, Qca8kError> {
    bus.write(phy, MII_ATH_MMD_ADDR, mmd)?;
    bus.write(phy, MII_ATH_MMD_DATA, reg)?;
    bus.write(phy, MII_ATH_MMD_ADDR, 0x4000 | mmd)?;
    bus.read(phy, MII_ATH_MMD_DATA)
}

/* MDIO master: the switch bit-bangs its internal PHYs through one control
 * word. Issue with BUSY set, poll until the hardware clears it. */

pub fn master_write<B: RegIo>(
    regs: &mut Regmap<B>,
    phy: u8,
    reg: u8,
    data: u16,
) -> Result<(), Qca8kError> {
    if phy >= MDIO_MASTER_MAX_PORTS || reg >= MDIO_MASTER_MAX_REG {
        return Err(Qca8kError::InvalidArg);
    }

    let ctrl = MdioMaster::BUSY
        | MdioMaster::EN
        | MdioMaster::from_bits_retain(
            mdio_master_phy_addr(phy) | mdio_master_reg_addr(reg) | data as u32,
        );
    regs.write_reg(ctrl)?;

    master_wait(regs)
}

pub fn master_read<B: RegIo>(regs: &mut Regmap<B>, phy: u8, reg: u8) -> Result<u16, Qca8kError> {
    if phy >= MDIO_MASTER_MAX_PORTS || reg >= MDIO_MASTER_MAX_REG {
        return Err(Qca8kError::InvalidArg);
    }

    let ctrl = MdioMaster::BUSY
        | MdioMaster::EN
        | MdioMaster::READ
        | MdioMaster::from_bits_retain(mdio_master_phy_addr(phy) | mdio_master_reg_addr(reg));
    regs.write_reg(ctrl)?;

    master_wait(regs)?;

    let val = regs.read_reg::<MdioMaster>()?;
    Ok((val & MdioMaster::DATA_MASK).bits() as u16)
}

fn master_wait<B: RegIo>(regs: &mut Regmap<B>) -> Result<(), Qca8kError> {
    let res = regs.wait_for::<MdioMaster>(|v| !v.contains(MdioMaster::BUSY), BUSY_WAIT_TRIES);
    if res.is_err() {
        error!("mdio master stuck busy");
    }
    res
}
