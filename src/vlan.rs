use log::debug;

use crate::err::Qca8kError;
use crate::regs::{
    port_hdr_ctrl, port_lookup_ctrl, port_vlan_ctrl0, port_vlan_cvid, port_vlan_svid, FwCtrl0,
    RegIo, Regmap, ATU_VID_M, GLOBAL_FW_CTRL1, GLOBAL_FW_CTRL1_BC_DP_S, GLOBAL_FW_CTRL1_IGMP_DP_S,
    GLOBAL_FW_CTRL1_MC_DP_S, GLOBAL_FW_CTRL1_UC_DP_S, PORT_HDR_CTRL_RX_S, PORT_HDR_CTRL_TX_S,
    PORT_LOOKUP_LEARN, PORT_LOOKUP_MEMBER, PORT_LOOKUP_STATE_M, PORT_LOOKUP_STATE_S,
    QCA8K_NUM_PORTS,
};

/// Lookup-table forwarding state, the switch's spanning-tree port states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupState {
    Disabled = 0,
    Blocking = 1,
    Listening = 2,
    Learning = 3,
    Forward = 4,
}

/// Atheros header tagging on a port: none, management frames only, all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdrMode {
    None = 0,
    Mgmt = 1,
    All = 2,
}

/// Program the port's default CVID and SVID.
pub fn set_pvid<B: RegIo>(regs: &mut Regmap<B>, port: usize, pvid: u16) -> Result<(), Qca8kError> {
    if port >= QCA8K_NUM_PORTS || pvid as u32 > ATU_VID_M {
        return Err(Qca8kError::InvalidArg);
    }
    regs.write_32(
        port_vlan_ctrl0(port),
        port_vlan_cvid(pvid as u32) | port_vlan_svid(pvid as u32),
    )
}

/// Program a port's lookup entry: who it may forward to, its forwarding
/// state, and whether it learns source addresses.
pub fn set_lookup<B: RegIo>(
    regs: &mut Regmap<B>,
    port: usize,
    members: u8,
    state: LookupState,
    learn: bool,
) -> Result<(), Qca8kError> {
    if port >= QCA8K_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }

    let mut val = (members as u32) & PORT_LOOKUP_MEMBER;
    val |= (state as u32 & PORT_LOOKUP_STATE_M) << PORT_LOOKUP_STATE_S;
    if learn {
        val |= PORT_LOOKUP_LEARN;
    }
    regs.write_32(port_lookup_ctrl(port), val)
}

/// Set the Atheros header mode for both directions on a port.
pub fn set_header_mode<B: RegIo>(
    regs: &mut Regmap<B>,
    port: usize,
    mode: HdrMode,
) -> Result<(), Qca8kError> {
    if port >= QCA8K_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }
    let val = ((mode as u32) << PORT_HDR_CTRL_RX_S) | ((mode as u32) << PORT_HDR_CTRL_TX_S);
    regs.write_32(port_hdr_ctrl(port), val)
}

/// Point unknown-unicast, multicast, broadcast and IGMP floods at the
/// given port mask.
pub fn set_flood_mask<B: RegIo>(regs: &mut Regmap<B>, mask: u8) -> Result<(), Qca8kError> {
    let mask = mask as u32 & PORT_LOOKUP_MEMBER;
    regs.write_32(
        GLOBAL_FW_CTRL1,
        mask << GLOBAL_FW_CTRL1_IGMP_DP_S
            | mask << GLOBAL_FW_CTRL1_BC_DP_S
            | mask << GLOBAL_FW_CTRL1_MC_DP_S
            | mask << GLOBAL_FW_CTRL1_UC_DP_S,
    )
}

/// Default isolation topology: every user port talks only to the CPU
/// port, the CPU port talks to everyone, and CPU forwarding is switched
/// on globally.
pub fn setup_isolation<B: RegIo>(regs: &mut Regmap<B>, cpu_port: usize) -> Result<(), Qca8kError> {
    if cpu_port >= QCA8K_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }

    regs.modify_reg(|v: FwCtrl0| v | FwCtrl0::CPU_PORT_EN)?;

    let mut cpu_members = 0u8;
    for port in 0..QCA8K_NUM_PORTS {
        if port == cpu_port {
            continue;
        }
        cpu_members |= 1 << port;
        set_lookup(regs, port, 1 << cpu_port, LookupState::Forward, true)?;
    }
    debug!("cpu port {} fronts members {:#04x}", cpu_port, cpu_members);
    set_lookup(regs, cpu_port, cpu_members, LookupState::Forward, false)
}
