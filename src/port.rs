use log::debug;

use crate::err::Qca8kError;
use crate::mdio::MdioBus;
use crate::regs::{
    port_status, PortStatus, RegIo, Regmap, PHY_SPEC_STATUS, PHY_SPEC_STATUS_DUPLEX,
    PHY_SPEC_STATUS_LINK, PHY_SPEC_STATUS_SPEED_M, PHY_SPEC_STATUS_SPEED_S, PORT_STATUS_SPEED,
};

/// The two-bit speed code in PORT_STATUS. Code 3 is the reserved pattern
/// the hardware reports on a broken link; it never converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpeed {
    Speed10 = 0,
    Speed100 = 1,
    Speed1000 = 2,
}

impl TryFrom<u32> for PortSpeed {
    type Error = Qca8kError;

    fn try_from(code: u32) -> Result<Self, Qca8kError> {
        match code {
            0 => Ok(PortSpeed::Speed10),
            1 => Ok(PortSpeed::Speed100),
            2 => Ok(PortSpeed::Speed1000),
            _ => Err(Qca8kError::InvalidArg),
        }
    }
}

/// Decoded PORT_STATUS word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLink {
    pub speed: PortSpeed,
    pub duplex: bool,
    pub tx_flow: bool,
    pub rx_flow: bool,
    pub link_up: bool,
}

impl PortLink {
    pub fn decode(word: u32) -> Result<Self, Qca8kError> {
        let flags = PortStatus::from_bits_retain(word);
        Ok(Self {
            speed: PortSpeed::try_from(word & PORT_STATUS_SPEED)?,
            duplex: flags.contains(PortStatus::DUPLEX),
            tx_flow: flags.contains(PortStatus::TXFLOW),
            rx_flow: flags.contains(PortStatus::RXFLOW),
            link_up: flags.contains(PortStatus::LINK_UP),
        })
    }

    pub fn encode(&self) -> u32 {
        let mut flags = PortStatus::empty();
        if self.duplex {
            flags |= PortStatus::DUPLEX;
        }
        if self.tx_flow {
            flags |= PortStatus::TXFLOW;
        }
        if self.rx_flow {
            flags |= PortStatus::RXFLOW;
        }
        if self.link_up {
            flags |= PortStatus::LINK_UP;
        }
        flags.bits() | self.speed as u32
    }
}

/// Software-side per-port state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortSts {
    pub enabled: bool,
}

/// Per-port array tied to the chip's port count. Indexing is checked; a
/// bad port number is an error, never an out-of-bounds access.
pub struct Ports<T, const N: usize>([T; N]);

impl<T: Default + Copy, const N: usize> Default for Ports<T, N> {
    fn default() -> Self {
        Self([T::default(); N])
    }
}

impl<T, const N: usize> Ports<T, N> {
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn get(&self, port: usize) -> Result<&T, Qca8kError> {
        self.0.get(port).ok_or(Qca8kError::InvalidArg)
    }

    pub fn get_mut(&mut self, port: usize) -> Result<&mut T, Qca8kError> {
        self.0.get_mut(port).ok_or(Qca8kError::InvalidArg)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.0.iter()
    }
}

/// Enable or disable a port's MAC. Ports 1-5 sit behind internal PHYs, so
/// their link state tracks PHY autonegotiation; ports 0 and 6 do not.
pub fn port_set_status<B: RegIo>(
    regs: &mut Regmap<B>,
    port: usize,
    enable: bool,
) -> Result<(), Qca8kError> {
    if port >= crate::regs::QCA8K_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }

    let mut mask = PortStatus::TXMAC | PortStatus::RXMAC;
    if port > 0 && port < 6 {
        mask |= PortStatus::LINK_AUTO;
    }

    debug!("port {} mac {}", port, if enable { "on" } else { "off" });
    if enable {
        regs.set_bits(port_status(port), mask.bits())
    } else {
        regs.clear_bits(port_status(port), mask.bits())
    }
}

/// Force a port's MAC configuration, bypassing autonegotiation. The MAC
/// is switched on whenever the forced state says the link is up.
pub fn port_force_link<B: RegIo>(
    regs: &mut Regmap<B>,
    port: usize,
    link: &PortLink,
) -> Result<(), Qca8kError> {
    if port >= crate::regs::QCA8K_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }

    let mut word = link.encode();
    if link.link_up {
        word |= (PortStatus::TXMAC | PortStatus::RXMAC).bits();
    }
    regs.write_32(port_status(port), word)
}

/// Raw PHY link state out of the Atheros specific-status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhyLink {
    pub link_up: bool,
    pub duplex: bool,
    pub speed_code: u8,
}

pub fn phy_link_state<M: MdioBus>(bus: &mut M, phy: u8) -> Result<PhyLink, Qca8kError> {
    let status = bus.read(phy, PHY_SPEC_STATUS)? as u32;
    Ok(PhyLink {
        link_up: status & PHY_SPEC_STATUS_LINK != 0,
        duplex: status & PHY_SPEC_STATUS_DUPLEX != 0,
        speed_code: ((status >> PHY_SPEC_STATUS_SPEED_S) & PHY_SPEC_STATUS_SPEED_M) as u8,
    })
}
