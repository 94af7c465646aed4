use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use log::{debug, info};
use spin::Mutex;

use crate::err::Qca8kError;
use crate::fdb::{self, Fdb};
use crate::mdio::{self, MdioBus};
use crate::mib;
use crate::port::{self, phy_link_state, Ports, PortSts};
use crate::psgmii::{self, MacMode};
use crate::qm::{self, QmState};
use crate::regs::{
    PortStatus, RegIo, Regmap, AR40XX_NUM_PORTS, MASK_CTRL, MASK_CTRL_ID_M, MASK_CTRL_ID_S,
    PORT0_FC_THRESH_OFF_DFLT, PORT0_FC_THRESH_ON_DFLT, QCA8K_CPU_PORT, QCA8K_ID_QCA8337,
    QCA8K_NUM_PORTS,
};
use crate::vlan::{self, HdrMode, LookupState};

/// How long the reset line is held on either edge.
const RESET_HOLD_SPINS: usize = 50_000;

/// Construction-time switch configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub cpu_port: usize,
    pub mac_mode: MacMode,
    /// Bring the MIB block up during setup.
    pub mib: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cpu_port: QCA8K_CPU_PORT,
            mac_mode: MacMode::Psgmii,
            mib: true,
        }
    }
}

/// AR40xx auxiliary register windows: the ESS base block and the PSGMII
/// wrapper.
pub struct EssRegs<B> {
    pub base: Regmap<B>,
    pub psgmii: Regmap<B>,
}

/// Everything behind the general register lock.
struct RegFile<B> {
    sw: Regmap<B>,
    ess: Option<EssRegs<B>>,
}

/// Mutable link-monitoring state.
#[derive(Default)]
struct LinkMonitor {
    port_sts: Ports<PortSts, QCA8K_NUM_PORTS>,
    port_link_up: Ports<bool, AR40XX_NUM_PORTS>,
    port_old_link: Ports<bool, AR40XX_NUM_PORTS>,
    phy_t_status: u32,
}

/// Stand-in for switches whose reset line the platform keeps to itself.
pub struct NoResetGpio;

impl OutputPin for NoResetGpio {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// The one long-lived handle per switch. Owns the register windows, the
/// MDIO bus, both locks and all per-port state; everything is released
/// together when it drops.
///
/// Lock order where paths nest: register lock, then QM lock, then the
/// link monitor. The MDIO bus lock never nests inside the others.
pub struct Qca8k<B, M, P = NoResetGpio> {
    regs: Mutex<RegFile<B>>,
    mii: Mutex<M>,
    qm: Mutex<QmState>,
    monitor: Mutex<LinkMonitor>,
    reset_gpio: Option<P>,
    cfg: Config,
}

impl<B, M, P> Qca8k<B, M, P>
where
    B: RegIo,
    M: MdioBus,
    P: OutputPin,
{
    pub fn new(sw: B, ess: Option<(B, B)>, mii: M, reset_gpio: Option<P>, cfg: Config) -> Self {
        Self {
            regs: Mutex::new(RegFile {
                sw: Regmap::new(sw),
                ess: ess.map(|(base, psgmii)| EssRegs {
                    base: Regmap::new(base),
                    psgmii: Regmap::new(psgmii),
                }),
            }),
            mii: Mutex::new(mii),
            qm: Mutex::new(QmState::default()),
            monitor: Mutex::new(LinkMonitor::default()),
            reset_gpio,
            cfg,
        }
    }

    /// Read MASK_CTRL and check the device id field.
    pub fn read_switch_id(&self) -> Result<u32, Qca8kError> {
        let mut regs = self.regs.lock();
        let val = regs.sw.read_32(MASK_CTRL)?;
        let id = (val >> MASK_CTRL_ID_S) & MASK_CTRL_ID_M;
        if id != QCA8K_ID_QCA8337 {
            return Err(Qca8kError::UnsupportedDevice);
        }
        Ok(id)
    }

    fn hardware_reset(&mut self) -> Result<(), Qca8kError> {
        if let Some(gpio) = self.reset_gpio.as_mut() {
            debug!("pulsing switch reset line");
            gpio.set_high().map_err(|_| Qca8kError::Bus)?;
            for _ in 0..RESET_HOLD_SPINS {
                core::hint::spin_loop();
            }
            gpio.set_low().map_err(|_| Qca8kError::Bus)?;
            for _ in 0..RESET_HOLD_SPINS {
                core::hint::spin_loop();
            }
        }
        Ok(())
    }

    /// One-shot bring-up: reset, identify, counters, forwarding topology,
    /// MAC wrapper, CPU port.
    pub fn setup(&mut self) -> Result<(), Qca8kError> {
        self.hardware_reset()?;
        self.read_switch_id()?;

        {
            let mut regs = self.regs.lock();

            if self.cfg.mib {
                mib::mib_init(&mut regs.sw)?;
            }

            // CPU port carries the Atheros header; floods and unknown
            // unicast all land there
            vlan::set_header_mode(&mut regs.sw, self.cfg.cpu_port, HdrMode::All)?;
            vlan::setup_isolation(&mut regs.sw, self.cfg.cpu_port)?;
            vlan::set_flood_mask(&mut regs.sw, 1 << self.cfg.cpu_port)?;

            regs.sw.write_32(
                crate::regs::port_flowctrl_thresh(0),
                (PORT0_FC_THRESH_ON_DFLT << 16) | PORT0_FC_THRESH_OFF_DFLT,
            )?;

            fdb::fdb_flush(&mut regs.sw, None)?;
        }

        self.mac_mode_setup()?;
        self.port_enable(self.cfg.cpu_port)?;

        info!("qca8k switch up, cpu port {}", self.cfg.cpu_port);
        Ok(())
    }

    fn mac_mode_setup(&self) -> Result<(), Qca8kError> {
        let has_ess = {
            let mut regs = self.regs.lock();
            match regs.ess.as_mut() {
                Some(ess) => {
                    psgmii::mac_mode_init(&mut ess.base, &mut ess.psgmii, self.cfg.mac_mode)?;
                    true
                }
                None => false,
            }
        };

        if has_ess && self.cfg.mac_mode == MacMode::Psgmii {
            let mut status = 0;
            let res = {
                let mut mii = self.mii.lock();
                psgmii::malibu_init(&mut *mii)?;
                psgmii::psgmii_self_test(&mut *mii, &mut status)
            };
            self.monitor.lock().phy_t_status = status;
            res?;
        }
        Ok(())
    }

    pub fn port_enable(&self, port: usize) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        port::port_set_status(&mut regs.sw, port, true)?;
        self.monitor.lock().port_sts.get_mut(port)?.enabled = true;
        Ok(())
    }

    pub fn port_disable(&self, port: usize) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        port::port_set_status(&mut regs.sw, port, false)?;
        self.monitor.lock().port_sts.get_mut(port)?.enabled = false;
        Ok(())
    }

    pub fn port_enabled(&self, port: usize) -> Result<bool, Qca8kError> {
        Ok(self.monitor.lock().port_sts.get(port)?.enabled)
    }

    /// Force a port's speed, duplex and flow-control state.
    pub fn port_force_link(&self, port: usize, link: &port::PortLink) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        port::port_force_link(&mut regs.sw, port, link)
    }

    /// Indirect PHY register access through the switch's MDIO master.
    pub fn phy_read(&self, phy: u8, reg: u8) -> Result<u16, Qca8kError> {
        let mut regs = self.regs.lock();
        mdio::master_read(&mut regs.sw, phy, reg)
    }

    pub fn phy_write(&self, phy: u8, reg: u8, val: u16) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        mdio::master_write(&mut regs.sw, phy, reg, val)
    }

    pub fn fdb_add(&self, entry: &Fdb) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        fdb::fdb_add(&mut regs.sw, entry)
    }

    pub fn fdb_del(&self, vid: u16, mac: &[u8; 6]) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        fdb::fdb_del(&mut regs.sw, vid, mac)
    }

    pub fn fdb_flush(&self) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        fdb::fdb_flush(&mut regs.sw, None)
    }

    pub fn fdb_dump(&self) -> Result<alloc::vec::Vec<Fdb>, Qca8kError> {
        let mut regs = self.regs.lock();
        fdb::fdb_dump(&mut regs.sw, None)
    }

    pub fn mib_read(&self, port: usize) -> Result<[u64; mib::AR8327_MIB.len()], Qca8kError> {
        let mut regs = self.regs.lock();
        mib::mib_read(&mut regs.sw, port)
    }

    pub fn mib_flush(&self) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        mib::mib_flush(&mut regs.sw)
    }

    pub fn set_pvid(&self, port: usize, pvid: u16) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        vlan::set_pvid(&mut regs.sw, port, pvid)
    }

    pub fn set_lookup(
        &self,
        port: usize,
        members: u8,
        state: LookupState,
        learn: bool,
    ) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        vlan::set_lookup(&mut regs.sw, port, members, state, learn)
    }

    /// Periodic queue-manager poll (the embedder's deferred work).
    pub fn poll_qm(&self) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();
        let Some(ess) = regs.ess.as_mut() else {
            return Ok(());
        };
        let mut qm = self.qm.lock();
        qm::qm_refresh(&mut ess.base, &mut qm)
    }

    /// Last observed queue occupancy for a port.
    pub fn qm_occupancy(&self, port: usize) -> Result<u8, Qca8kError> {
        Ok(*self.qm.lock().qm_buf.get(port)?)
    }

    /// Most recent PHY link state recorded by [`Self::poll_links`].
    pub fn link_up(&self, port: usize) -> Result<bool, Qca8kError> {
        Ok(*self.monitor.lock().port_link_up.get(port)?)
    }

    /// Bitmask of PHYs that failed the last PSGMII calibration round;
    /// zero after a clean calibration.
    pub fn phy_calibration_status(&self) -> u32 {
        self.monitor.lock().phy_t_status
    }

    /// Periodic link monitor for the AR40xx PHY-backed ports. Detects
    /// link edges, forces a dropped port's MAC down while its queue
    /// still holds traffic, flushes the stranded FDB entries, and
    /// re-arms the MAC when the link returns.
    pub fn poll_links(&self) -> Result<(), Qca8kError> {
        for port in 1..AR40XX_NUM_PORTS {
            let phy = (port - 1) as u8;
            let link_up = {
                let mut mii = self.mii.lock();
                phy_link_state(&mut *mii, phy)?.link_up
            };

            let old_link = {
                let monitor = self.monitor.lock();
                *monitor.port_old_link.get(port)?
            };

            if link_up != old_link {
                if old_link {
                    self.link_down_recovery(port)?;
                } else {
                    debug!("port {} link up", port);
                    let mut regs = self.regs.lock();
                    port::port_set_status(&mut regs.sw, port, true)?;
                    let mut qm = self.qm.lock();
                    *qm.qm_buf.get_mut(port)? = 0;
                }
                let mut monitor = self.monitor.lock();
                *monitor.port_old_link.get_mut(port)? = link_up;
            }

            let mut monitor = self.monitor.lock();
            *monitor.port_link_up.get_mut(port)? = link_up;
        }
        Ok(())
    }

    fn link_down_recovery(&self, port: usize) -> Result<(), Qca8kError> {
        let mut regs = self.regs.lock();

        // stop advertising link while the PHY is down
        regs.sw.clear_bits(
            crate::regs::port_status(port),
            PortStatus::LINK_AUTO.bits(),
        )?;

        let occupancy = match regs.ess.as_mut() {
            Some(ess) => qm::qm_buffer_occupancy(&mut ess.base, port)?,
            None => 0,
        };

        if occupancy != 0 {
            debug!("port {} down with {} stuck buffers", port, occupancy);
            let mut qm = self.qm.lock();
            *qm.qm_buf.get_mut(port)? = occupancy;
        }

        port::port_set_status(&mut regs.sw, port, false)?;
        fdb::fdb_flush(&mut regs.sw, Some(port))?;
        debug!("port {} link down, mac off, fdb flushed", port);
        Ok(())
    }
}
