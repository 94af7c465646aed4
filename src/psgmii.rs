use log::{debug, info, warn};

use crate::err::Qca8kError;
use crate::mdio::{mmd_read, mmd_write, MdioBus};
use crate::port::phy_link_state;
use crate::regs::{
    RegIo, Regmap, MALIBU_DAC_CTRL_MASK, MALIBU_DAC_CTRL_VALUE, MALIBU_PHY_LAST_ADDR,
    MALIBU_PHY_MMD7_DAC_CTRL, MALIBU_PHY_PSGMII_MODE_CTRL_ADJUST_VAL,
    MALIBU_PHY_PSGMII_REDUCE_SERDES_TX_AMP, MALIBU_PHY_RLP_CTRL, MALIBU_PSGMII_MODE_CTRL,
    PSGMIIPHY_TX_CONTROL, PSGMII_CALB_NUM, PSGMII_ID, PSGMII_MODE_CONTROL,
    PSGMII_TX_DRIVER_1_CTRL, RGMII_CTRL,
};

/// ESS port-wrapper configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacMode {
    Psgmii = 0,
    Rgmii = 3,
}

impl TryFrom<u32> for MacMode {
    type Error = Qca8kError;

    fn try_from(mode: u32) -> Result<Self, Qca8kError> {
        match mode {
            0 => Ok(MacMode::Psgmii),
            3 => Ok(MacMode::Rgmii),
            _ => Err(Qca8kError::InvalidArg),
        }
    }
}

/// Malibu PHY package fixups that must precede calibration.
pub fn malibu_init<M: MdioBus>(bus: &mut M) -> Result<(), Qca8kError> {
    // enable AZ transmitting ability
    mmd_write(
        bus,
        PSGMII_ID,
        1,
        MALIBU_PSGMII_MODE_CTRL,
        MALIBU_PHY_PSGMII_MODE_CTRL_ADJUST_VAL,
    )?;

    for phy in 0..=MALIBU_PHY_LAST_ADDR {
        let mut val = mmd_read(bus, phy, 7, MALIBU_PHY_MMD7_DAC_CTRL)?;
        val &= !MALIBU_DAC_CTRL_MASK;
        val |= MALIBU_DAC_CTRL_VALUE;
        mmd_write(bus, phy, 7, MALIBU_PHY_MMD7_DAC_CTRL, val)?;

        if phy == MALIBU_PHY_LAST_ADDR {
            // keep the last PHY out of hibernation
            let val = mmd_read(bus, phy, 3, MALIBU_PHY_RLP_CTRL)?;
            mmd_write(bus, phy, 3, MALIBU_PHY_RLP_CTRL, val & 0x7fff)?;
        }
    }

    // tone down the serdes tx amplitude
    bus.write(
        PSGMII_ID,
        PSGMII_TX_DRIVER_1_CTRL,
        MALIBU_PHY_PSGMII_REDUCE_SERDES_TX_AMP,
    )
}

/// Program the ESS wrapper for the chosen MAC mode. PSGMII gets the
/// Atheros/Cisco 25 MHz reference setup; RGMII only needs its control
/// register.
pub fn mac_mode_init<B: RegIo>(
    base: &mut Regmap<B>,
    psgmii: &mut Regmap<B>,
    mode: MacMode,
) -> Result<(), Qca8kError> {
    match mode {
        MacMode::Psgmii => {
            psgmii.write_32(PSGMII_MODE_CONTROL, 0x2200)?;
            psgmii.write_32(PSGMIIPHY_TX_CONTROL, 0x8380)
        }
        MacMode::Rgmii => base.write_32(RGMII_CTRL, 0x400),
    }
}

/* Reset the PHY-side PSGMII block: hold it with the 20-bit RX quirk
 * applied, then release. */
fn psgmii_phy_reset<M: MdioBus>(bus: &mut M) -> Result<(), Qca8kError> {
    bus.write(PSGMII_ID, 0x0, 0x005b)?;
    bus.write(PSGMII_ID, 0x0, 0x001b)?;
    bus.write(PSGMII_ID, 0x0, 0x005b)
}

fn link_test<M: MdioBus>(bus: &mut M) -> Result<u32, Qca8kError> {
    let mut failed = 0;
    for phy in 0..=MALIBU_PHY_LAST_ADDR {
        if !phy_link_state(bus, phy)?.link_up {
            failed |= 1 << phy;
        }
    }
    Ok(failed)
}

/// Bring the PSGMII lane into a state where every attached PHY passes
/// its link test. Retries the reset-and-test cycle up to
/// [`PSGMII_CALB_NUM`] times. `phy_t_status` tracks the bitmask of PHYs
/// still failing, for the caller to keep.
pub fn psgmii_self_test<M: MdioBus>(
    bus: &mut M,
    phy_t_status: &mut u32,
) -> Result<(), Qca8kError> {
    for attempt in 0..PSGMII_CALB_NUM {
        psgmii_phy_reset(bus)?;

        *phy_t_status = link_test(bus)?;
        if *phy_t_status == 0 {
            if attempt > 0 {
                info!("psgmii calibrated after {} retries", attempt);
            }
            return Ok(());
        }

        debug!(
            "psgmii calibration attempt {}: phys {:#04x} failing",
            attempt, *phy_t_status
        );
    }

    warn!(
        "psgmii calibration exhausted, phys {:#04x} still down",
        *phy_t_status
    );
    Err(Qca8kError::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{PHY_SPEC_STATUS, PHY_SPEC_STATUS_LINK};
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    #[test]
    fn mac_mode_uses_the_wrapper_encodings() {
        assert_eq!(MacMode::Psgmii as u32, 0);
        assert_eq!(MacMode::Rgmii as u32, 3);
        assert_eq!(MacMode::try_from(0), Ok(MacMode::Psgmii));
        assert_eq!(MacMode::try_from(3), Ok(MacMode::Rgmii));
        assert_eq!(MacMode::try_from(1), Err(Qca8kError::InvalidArg));
    }

    /// MDIO bus whose PHYs come up after a configurable number of resets.
    struct FlakyBus {
        resets_needed: u32,
        resets_seen: u32,
        writes: Vec<(u8, u8, u16)>,
        mmd_latch: BTreeMap<u8, u16>,
    }

    impl FlakyBus {
        fn new(resets_needed: u32) -> Self {
            Self {
                resets_needed,
                resets_seen: 0,
                writes: Vec::new(),
                mmd_latch: BTreeMap::new(),
            }
        }
    }

    impl MdioBus for FlakyBus {
        fn read(&mut self, _phy: u8, reg: u8) -> Result<u16, Qca8kError> {
            if reg == PHY_SPEC_STATUS {
                if self.resets_seen >= self.resets_needed {
                    return Ok(PHY_SPEC_STATUS_LINK as u16);
                }
                return Ok(0);
            }
            Ok(*self.mmd_latch.get(&reg).unwrap_or(&0))
        }

        fn write(&mut self, phy: u8, reg: u8, val: u16) -> Result<(), Qca8kError> {
            if phy == PSGMII_ID && reg == 0 && val == 0x001b {
                self.resets_seen += 1;
            }
            self.writes.push((phy, reg, val));
            self.mmd_latch.insert(reg, val);
            Ok(())
        }
    }

    #[test]
    fn self_test_retries_until_all_phys_link() {
        let mut bus = FlakyBus::new(3);
        let mut status = 0;
        psgmii_self_test(&mut bus, &mut status).unwrap();
        assert_eq!(bus.resets_seen, 3);
        assert_eq!(status, 0);
    }

    #[test]
    fn self_test_gives_up_after_the_retry_budget() {
        let mut bus = FlakyBus::new(PSGMII_CALB_NUM + 1);
        let mut status = 0;
        assert_eq!(
            psgmii_self_test(&mut bus, &mut status),
            Err(Qca8kError::Timeout)
        );
        assert_eq!(bus.resets_seen, PSGMII_CALB_NUM);
        assert_ne!(status, 0);
    }

    #[test]
    fn malibu_init_touches_every_phy_and_the_serdes() {
        let mut bus = FlakyBus::new(0);
        malibu_init(&mut bus).unwrap();
        // serdes amplitude write goes straight to the PSGMII id
        assert!(bus.writes.contains(&(
            PSGMII_ID,
            PSGMII_TX_DRIVER_1_CTRL,
            MALIBU_PHY_PSGMII_REDUCE_SERDES_TX_AMP
        )));
    }
}
