use bitflags::{bitflags, Flags};

use crate::err::Qca8kError;

pub const QCA8K_NUM_PORTS: usize = 7;
pub const AR40XX_NUM_PORTS: usize = 6;

pub const PHY_ID_QCA8337: u32 = 0x004d_d036;
pub const QCA8K_ID_QCA8337: u32 = 0x13;

pub const QCA8K_NUM_FDB_RECORDS: usize = 2048;

pub const QCA8K_CPU_PORT: usize = 0;

/* Global control registers */
pub const MASK_CTRL: u32 = 0x000;
pub const MASK_CTRL_ID_M: u32 = 0xff;
pub const MASK_CTRL_ID_S: u32 = 8;

pub const PORT0_PAD_CTRL: u32 = 0x004;
pub const PORT5_PAD_CTRL: u32 = 0x008;
pub const PORT6_PAD_CTRL: u32 = 0x00c;
pub const PORT_PAD_RGMII_EN: u32 = 1 << 26;
pub const PORT_PAD_RGMII_RX_DELAY_EN: u32 = 1 << 24;
pub const PORT_PAD_SGMII_EN: u32 = 1 << 7;
pub const MAX_DELAY: u32 = 3;

pub fn rgmii_tx_delay(x: u32) -> u32 {
    (0x8 + (x & MAX_DELAY)) << 22
}

pub fn rgmii_rx_delay(x: u32) -> u32 {
    (0x10 + (x & MAX_DELAY)) << 20
}

pub const MODULE_EN: u32 = 0x030;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ModuleEn: u32 {
        const MIB = 1 << 0;
    }
}

impl FlagReg for ModuleEn {
    const REG: u32 = MODULE_EN;
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MibCtrl: u32 {
        const FLUSH = 1 << 24;
        const CPU_KEEP = 1 << 20;
        const BUSY = 1 << 17;
    }
}

impl FlagReg for MibCtrl {
    const REG: u32 = 0x034;
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MdioMaster: u32 {
        const BUSY = 1 << 31;
        const EN = 1 << 30;
        const READ = 1 << 27;
        const SUP_PRE = 1 << 26;
        const DATA_MASK = 0xffff;
    }
}

impl FlagReg for MdioMaster {
    const REG: u32 = 0x3c;
}

pub const MDIO_MASTER_WRITE: u32 = 0;
pub const MDIO_MASTER_MAX_PORTS: u8 = 5;
pub const MDIO_MASTER_MAX_REG: u8 = 32;

pub fn mdio_master_phy_addr(x: u8) -> u32 {
    (x as u32) << 21
}

pub fn mdio_master_reg_addr(x: u8) -> u32 {
    (x as u32) << 16
}

pub const GOL_MAC_ADDR0: u32 = 0x60;
pub const GOL_MAC_ADDR1: u32 = 0x64;

pub fn port_status(i: usize) -> u32 {
    0x07c + (i as u32) * 4
}

/* PORT_STATUS fields; the low two bits are the speed code */
pub const PORT_STATUS_SPEED: u32 = 0b11;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PortStatus: u32 {
        const TXMAC = 1 << 2;
        const RXMAC = 1 << 3;
        const TXFLOW = 1 << 4;
        const RXFLOW = 1 << 5;
        const DUPLEX = 1 << 6;
        const TXHALF_FLOW = 1 << 7;
        const LINK_UP = 1 << 8;
        const LINK_AUTO = 1 << 9;
        const LINK_PAUSE = 1 << 10;
    }
}

pub fn port_hdr_ctrl(i: usize) -> u32 {
    0x9c + (i as u32) * 4
}

pub const PORT_HDR_CTRL_RX_M: u32 = 0b11;
pub const PORT_HDR_CTRL_RX_S: u32 = 2;
pub const PORT_HDR_CTRL_TX_M: u32 = 0b11;
pub const PORT_HDR_CTRL_TX_S: u32 = 0;

/* EEE control */
pub const EEE_CTRL: u32 = 0x100;

pub fn eee_ctrl_lpi_en(i: usize) -> u32 {
    ((i as u32) + 1) * 2
}

/* ACL registers */
pub fn port_vlan_ctrl0(i: usize) -> u32 {
    0x420 + (i as u32) * 8
}

pub fn port_vlan_ctrl1(i: usize) -> u32 {
    0x424 + (i as u32) * 8
}

pub fn port_vlan_cvid(x: u32) -> u32 {
    x << 16
}

pub fn port_vlan_svid(x: u32) -> u32 {
    x
}

pub const IPV4_PRI_BASE_ADDR: u32 = 0x470;
pub const IPV4_PRI_ADDR_MASK: u32 = 0x474;

/* Lookup registers */
pub const ATU_DATA0: u32 = 0x600;
pub const ATU_ADDR2_S: u32 = 24;
pub const ATU_ADDR3_S: u32 = 16;
pub const ATU_ADDR4_S: u32 = 8;
pub const ATU_DATA1: u32 = 0x604;
pub const ATU_PORT_M: u32 = 0x7f;
pub const ATU_PORT_S: u32 = 16;
pub const ATU_ADDR0_S: u32 = 8;
pub const ATU_DATA2: u32 = 0x608;
pub const ATU_VID_M: u32 = 0xfff;
pub const ATU_VID_S: u32 = 8;
pub const ATU_STATUS_M: u32 = 0xf;
pub const ATU_STATUS_STATIC: u8 = 0xf;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct AtuFunc: u32 {
        const BUSY = 1 << 31;
        const PORT_EN = 1 << 14;
        const MULTI_EN = 1 << 13;
        const FULL = 1 << 12;
    }
}

impl FlagReg for AtuFunc {
    const REG: u32 = 0x60c;
}

pub const ATU_FUNC_PORT_M: u32 = 0xf;
pub const ATU_FUNC_PORT_S: u32 = 8;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FwCtrl0: u32 {
        const CPU_PORT_EN = 1 << 10;
    }
}

impl FlagReg for FwCtrl0 {
    const REG: u32 = 0x620;
}

pub const GLOBAL_FW_CTRL1: u32 = 0x624;
pub const GLOBAL_FW_CTRL1_IGMP_DP_S: u32 = 24;
pub const GLOBAL_FW_CTRL1_BC_DP_S: u32 = 16;
pub const GLOBAL_FW_CTRL1_MC_DP_S: u32 = 8;
pub const GLOBAL_FW_CTRL1_UC_DP_S: u32 = 0;

pub fn port_lookup_ctrl(i: usize) -> u32 {
    0x660 + (i as u32) * 0xc
}

pub const PORT_LOOKUP_MEMBER: u32 = 0x7f;
pub const PORT_LOOKUP_STATE_M: u32 = 0b111;
pub const PORT_LOOKUP_STATE_S: u32 = 16;
pub const PORT_LOOKUP_LEARN: u32 = 1 << 20;
pub const PORT_LOOKUP_LOOPBACK: u32 = 1 << 21;

pub fn port_flowctrl_thresh(i: usize) -> u32 {
    0x9b0 + (i as u32) * 4
}

pub const PORT0_FC_THRESH_ON_DFLT: u32 = 0x60;
pub const PORT0_FC_THRESH_OFF_DFLT: u32 = 0x90;

/* Pkt edit registers */
pub fn egress_vlan(x: u32) -> u32 {
    0x0c70 + 4 * (x / 2)
}

/* L3 registers */
pub const HROUTER_CONTROL: u32 = 0xe00;
pub const HROUTER_CONTROL_GLB_LOCKTIME_M: u32 = 0b11;
pub const HROUTER_CONTROL_GLB_LOCKTIME_S: u32 = 16;
pub const HROUTER_CONTROL_ARP_AGE_MODE: u32 = 1;
pub const HROUTER_PBASED_CONTROL1: u32 = 0xe08;
pub const HROUTER_PBASED_CONTROL2: u32 = 0xe0c;
pub const HNAT_CONTROL: u32 = 0xe38;

/* MIB counter blocks, one 0x100 window per port */
pub fn port_mib_counter(i: usize) -> u32 {
    0x1000 + (i as u32) * 0x100
}

/* QCA specific MII registers */
pub const MII_ATH_MMD_ADDR: u8 = 0x0d;
pub const MII_ATH_MMD_DATA: u8 = 0x0e;

/* AR40xx queue manager debug window */
pub const QM_DEBUG_ADDR: u32 = 0x820;
pub const QM_DEBUG_VALUE: u32 = 0x824;
pub const QM_PORT0_3_QNUM: u32 = 0x1d;
pub const QM_PORT4_6_QNUM: u32 = 0x1e;

/* AR40xx PSGMII wrapper */
pub const PSGMII_MODE_CONTROL: u32 = 0x1b4;
pub const PSGMII_ATHR_CSCO_MODE_25M: u32 = 1 << 0;
pub const PSGMIIPHY_TX_CONTROL: u32 = 0x288;

pub const RGMII_CTRL: u32 = 0x0004;

pub const PHY_SPEC_STATUS: u8 = 0x11;
pub const PHY_SPEC_STATUS_LINK: u32 = 1 << 10;
pub const PHY_SPEC_STATUS_DUPLEX: u32 = 1 << 13;
pub const PHY_SPEC_STATUS_SPEED_M: u32 = 0b111;
pub const PHY_SPEC_STATUS_SPEED_S: u32 = 14;

pub const PSGMII_ID: u8 = 5;
pub const PSGMII_CALB_NUM: u32 = 100;
pub const MALIBU_PSGMII_MODE_CTRL: u16 = 0x6d;
pub const MALIBU_PHY_PSGMII_MODE_CTRL_ADJUST_VAL: u16 = 0x220c;
pub const MALIBU_PHY_MMD7_DAC_CTRL: u16 = 0x801a;
pub const MALIBU_DAC_CTRL_MASK: u16 = 0x380;
pub const MALIBU_DAC_CTRL_VALUE: u16 = 0x280;
pub const MALIBU_PHY_RLP_CTRL: u16 = 0x805a;
pub const PSGMII_TX_DRIVER_1_CTRL: u8 = 0xb;
pub const MALIBU_PHY_PSGMII_REDUCE_SERDES_TX_AMP: u16 = 0x8a;
pub const MALIBU_PHY_LAST_ADDR: u8 = 4;

/// Poll budget for every busy-bit wait in the driver.
pub const BUSY_WAIT_TRIES: usize = 2000;

/// Register transport supplied by the platform: MMIO window, paged MDIO
/// access, whatever reaches the switch register file. One call per 32-bit
/// register; multi-step sequences are serialized by the caller.
pub trait RegIo {
    fn read_32(&mut self, reg: u32) -> Result<u32, Qca8kError>;
    fn write_32(&mut self, reg: u32, val: u32) -> Result<(), Qca8kError>;
}

pub trait FlagReg: Flags<Bits = u32> {
    const REG: u32;
}

/// Typed access on top of a [`RegIo`] transport.
pub struct Regmap<B> {
    bus: B,
}

impl<B: RegIo> Regmap<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn read_32(&mut self, reg: u32) -> Result<u32, Qca8kError> {
        self.bus.read_32(reg)
    }

    pub fn write_32(&mut self, reg: u32, val: u32) -> Result<(), Qca8kError> {
        self.bus.write_32(reg, val)
    }

    pub fn read_reg<F: FlagReg>(&mut self) -> Result<F, Qca8kError> {
        Ok(F::from_bits_retain(self.read_32(F::REG)?))
    }

    pub fn write_reg<F: FlagReg>(&mut self, val: F) -> Result<(), Qca8kError> {
        self.write_32(F::REG, val.bits())
    }

    pub fn modify_reg<F: FlagReg>(&mut self, f: impl Fn(F) -> F) -> Result<(), Qca8kError> {
        let old = self.read_reg::<F>()?;
        self.write_reg(f(old))
    }

    pub fn set_bits(&mut self, reg: u32, mask: u32) -> Result<(), Qca8kError> {
        let val = self.read_32(reg)?;
        self.write_32(reg, val | mask)
    }

    pub fn clear_bits(&mut self, reg: u32, mask: u32) -> Result<(), Qca8kError> {
        let val = self.read_32(reg)?;
        self.write_32(reg, val & !mask)
    }

    pub fn rmw(&mut self, reg: u32, mask: u32, val: u32) -> Result<(), Qca8kError> {
        let old = self.read_32(reg)?;
        self.write_32(reg, (old & !mask) | val)
    }

    pub fn wait_for<F: FlagReg>(
        &mut self,
        f: impl Fn(F) -> bool,
        try_count: usize,
    ) -> Result<(), Qca8kError> {
        for _ in 0..try_count {
            if f(self.read_reg::<F>()?) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(Qca8kError::Timeout)
    }

    /// Poll `reg` until every bit in `mask` has cleared.
    pub fn busy_wait(&mut self, reg: u32, mask: u32) -> Result<(), Qca8kError> {
        for _ in 0..BUSY_WAIT_TRIES {
            if self.read_32(reg)? & mask == 0 {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(Qca8kError::Timeout)
    }
}
