//! Drives the full driver context against a register file that emulates
//! the switch's self-clearing busy bits.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use qca8k_driver::err::Qca8kError;
use qca8k_driver::fdb::{Fdb, FdbCommand};
use qca8k_driver::mdio::MdioBus;
use qca8k_driver::psgmii::MacMode;
use qca8k_driver::qca8k::{Config, NoResetGpio, Qca8k};
use qca8k_driver::regs::{
    self, AtuFunc, FlagReg, MdioMaster, MibCtrl, PortStatus, RegIo,
};

#[derive(Default)]
struct SwitchModel {
    regs: BTreeMap<u32, u32>,
    atu_records: Vec<Fdb>,
    atu_cursor: usize,
    atu_full: bool,
    /// data served by MDIO-master reads, keyed by (phy, reg)
    phy_regs: BTreeMap<(u8, u8), u16>,
}

impl SwitchModel {
    fn latch_atu(&mut self, fdb: &Fdb) {
        let data2 = ((fdb.vid as u32 & 0xfff) << 8) | (fdb.aging as u32 & 0xf);
        let data1 = ((fdb.port_mask as u32 & 0x7f) << 16)
            | ((fdb.mac[0] as u32) << 8)
            | fdb.mac[1] as u32;
        let data0 = ((fdb.mac[2] as u32) << 24)
            | ((fdb.mac[3] as u32) << 16)
            | ((fdb.mac[4] as u32) << 8)
            | fdb.mac[5] as u32;
        self.regs.insert(regs::ATU_DATA0, data0);
        self.regs.insert(regs::ATU_DATA1, data1);
        self.regs.insert(regs::ATU_DATA2, data2);
    }

    fn read_atu(&self) -> Fdb {
        let data0 = *self.regs.get(&regs::ATU_DATA0).unwrap_or(&0);
        let data1 = *self.regs.get(&regs::ATU_DATA1).unwrap_or(&0);
        let data2 = *self.regs.get(&regs::ATU_DATA2).unwrap_or(&0);
        Fdb {
            vid: ((data2 >> 8) & 0xfff) as u16,
            aging: (data2 & 0xf) as u8,
            port_mask: ((data1 >> 16) & 0x7f) as u8,
            mac: [
                ((data1 >> 8) & 0xff) as u8,
                (data1 & 0xff) as u8,
                ((data0 >> 24) & 0xff) as u8,
                ((data0 >> 16) & 0xff) as u8,
                ((data0 >> 8) & 0xff) as u8,
                (data0 & 0xff) as u8,
            ],
        }
    }

    fn atu_command(&mut self, val: u32) -> u32 {
        let cmd = val & 0xf;
        let mut done = val & !AtuFunc::BUSY.bits();

        if cmd == FdbCommand::Load as u32 {
            if self.atu_full {
                done |= AtuFunc::FULL.bits();
            } else {
                let rec = self.read_atu();
                self.atu_records.push(rec);
            }
        }
        if cmd == FdbCommand::Next as u32 {
            let next = self
                .atu_records
                .get(self.atu_cursor)
                .copied()
                .unwrap_or_default();
            self.atu_cursor += 1;
            self.latch_atu(&next);
        }
        if cmd == FdbCommand::Flush as u32 {
            self.atu_records.clear();
            self.atu_cursor = 0;
        }
        done
    }

    fn mdio_master(&mut self, val: u32) -> u32 {
        let mut done = val & !MdioMaster::BUSY.bits();
        let phy = ((val >> 21) & 0x1f) as u8;
        let reg = ((val >> 16) & 0x1f) as u8;
        if val & MdioMaster::READ.bits() != 0 {
            let data = *self.phy_regs.get(&(phy, reg)).unwrap_or(&0);
            done = (done & !0xffff) | data as u32;
        } else {
            self.phy_regs.insert((phy, reg), (val & 0xffff) as u16);
        }
        done
    }
}

/// Cloneable handle onto the model so the test can inspect state after
/// the driver takes ownership of its bus ends.
#[derive(Clone, Default)]
struct Model(Rc<RefCell<SwitchModel>>);

impl Model {
    fn with_id() -> Self {
        let model = Model::default();
        model
            .0
            .borrow_mut()
            .regs
            .insert(regs::MASK_CTRL, regs::QCA8K_ID_QCA8337 << 8);
        model
    }

    fn reg(&self, reg: u32) -> u32 {
        *self.0.borrow().regs.get(&reg).unwrap_or(&0)
    }
}

impl RegIo for Model {
    fn read_32(&mut self, reg: u32) -> Result<u32, Qca8kError> {
        Ok(*self.0.borrow().regs.get(&reg).unwrap_or(&0))
    }

    fn write_32(&mut self, reg: u32, val: u32) -> Result<(), Qca8kError> {
        let mut model = self.0.borrow_mut();
        let stored = if reg == AtuFunc::REG && val & AtuFunc::BUSY.bits() != 0 {
            model.atu_command(val)
        } else if reg == MdioMaster::REG && val & MdioMaster::BUSY.bits() != 0 {
            model.mdio_master(val)
        } else if reg == MibCtrl::REG {
            val & !MibCtrl::BUSY.bits()
        } else {
            val
        };
        model.regs.insert(reg, stored);
        Ok(())
    }
}

/// External MDIO bus: per-PHY link state plus a write log.
#[derive(Clone, Default)]
struct Mdio(Rc<RefCell<MdioState>>);

#[derive(Default)]
struct MdioState {
    link_down: u32,
    writes: Vec<(u8, u8, u16)>,
}

impl MdioBus for Mdio {
    fn read(&mut self, phy: u8, reg: u8) -> Result<u16, Qca8kError> {
        if reg == regs::PHY_SPEC_STATUS {
            if self.0.borrow().link_down & (1 << phy) != 0 {
                return Ok(0);
            }
            return Ok(regs::PHY_SPEC_STATUS_LINK as u16);
        }
        Ok(0)
    }

    fn write(&mut self, phy: u8, reg: u8, val: u16) -> Result<(), Qca8kError> {
        self.0.borrow_mut().writes.push((phy, reg, val));
        Ok(())
    }
}

fn bring_up(model: &Model, mdio: &Mdio) -> Qca8k<Model, Mdio> {
    let mut sw = Qca8k::new(
        model.clone(),
        Some((model.clone(), model.clone())),
        mdio.clone(),
        None::<NoResetGpio>,
        Config {
            mac_mode: MacMode::Psgmii,
            ..Config::default()
        },
    );
    sw.setup().expect("switch bring-up");
    sw
}

#[test]
fn setup_programs_identity_isolation_and_cpu_port() {
    let model = Model::with_id();
    let mdio = Mdio::default();
    let sw = bring_up(&model, &mdio);

    // every user port is pinned to the CPU port
    for port in 1..regs::QCA8K_NUM_PORTS {
        assert_eq!(model.reg(regs::port_lookup_ctrl(port)) & 0x7f, 1);
    }
    assert_eq!(model.reg(regs::port_lookup_ctrl(0)) & 0x7f, 0x7e);

    // MIB block enabled, CPU port MAC on
    assert_eq!(model.reg(regs::MODULE_EN), 1);
    let cpu = model.reg(regs::port_status(0));
    assert_ne!(cpu & PortStatus::TXMAC.bits(), 0);
    assert_ne!(cpu & PortStatus::RXMAC.bits(), 0);
    assert!(sw.port_enabled(0).unwrap());

    // PSGMII wrapper programmed
    assert_eq!(model.reg(regs::PSGMII_MODE_CONTROL), 0x2200);
    assert_eq!(model.reg(regs::PSGMIIPHY_TX_CONTROL), 0x8380);
}

#[test]
fn setup_rejects_an_unknown_switch_id() {
    let model = Model::default(); // MASK_CTRL reads as zero
    let mdio = Mdio::default();
    let mut sw = Qca8k::new(
        model.clone(),
        None,
        mdio,
        None::<NoResetGpio>,
        Config::default(),
    );
    assert_eq!(sw.setup(), Err(Qca8kError::UnsupportedDevice));
}

#[test]
fn fdb_entries_round_trip_through_the_hardware_table() {
    let model = Model::with_id();
    let mdio = Mdio::default();
    let sw = bring_up(&model, &mdio);

    let entry = Fdb {
        vid: 100,
        port_mask: 0x02,
        aging: 0xf,
        mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
    };
    sw.fdb_add(&entry).unwrap();

    let dumped = sw.fdb_dump().unwrap();
    assert_eq!(dumped, vec![entry]);
}

#[test]
fn phy_access_goes_through_the_mdio_master() {
    let model = Model::with_id();
    let mdio = Mdio::default();
    let sw = bring_up(&model, &mdio);

    sw.phy_write(2, 1, 0x1234).unwrap();
    assert_eq!(sw.phy_read(2, 1).unwrap(), 0x1234);
    assert_eq!(sw.phy_read(5, 1), Err(Qca8kError::InvalidArg));
}

#[test]
fn a_dropped_link_takes_the_mac_down_and_flushes_the_fdb() {
    let model = Model::with_id();
    let mdio = Mdio::default();
    let sw = bring_up(&model, &mdio);

    sw.port_enable(3).unwrap();
    sw.fdb_add(&Fdb {
        vid: 1,
        port_mask: 0x08,
        aging: 0xf,
        mac: [0, 0, 0, 0, 0, 3],
    })
    .unwrap();

    // all links up: records the baseline
    sw.poll_links().unwrap();

    // port 3 (phy 2) drops
    mdio.0.borrow_mut().link_down = 1 << 2;
    sw.poll_links().unwrap();
    assert!(!sw.link_up(3).unwrap());

    let status = model.reg(regs::port_status(3));
    assert_eq!(status & PortStatus::TXMAC.bits(), 0);
    assert_eq!(status & PortStatus::LINK_AUTO.bits(), 0);
    assert!(model.0.borrow().atu_records.is_empty());

    // link returns: the MAC is re-armed
    mdio.0.borrow_mut().link_down = 0;
    sw.poll_links().unwrap();
    let status = model.reg(regs::port_status(3));
    assert_ne!(status & PortStatus::TXMAC.bits(), 0);
    assert_ne!(status & PortStatus::LINK_AUTO.bits(), 0);
}

#[test]
fn qm_poll_records_queue_occupancy() {
    let model = Model::with_id();
    let mdio = Mdio::default();
    let sw = bring_up(&model, &mdio);

    // park two buffers on port 1
    model
        .0
        .borrow_mut()
        .regs
        .insert(regs::QM_DEBUG_ADDR, regs::QM_PORT0_3_QNUM);
    // the model's VALUE register is plain storage; seed it directly
    model
        .0
        .borrow_mut()
        .regs
        .insert(regs::QM_DEBUG_VALUE, 0x0000_0200);

    sw.poll_qm().unwrap();
    assert_eq!(sw.qm_occupancy(1).unwrap(), 2);
    assert_eq!(sw.qm_occupancy(0).unwrap(), 0);
}

#[test]
fn a_full_table_surfaces_as_an_error() {
    let model = Model::with_id();
    let mdio = Mdio::default();
    let sw = bring_up(&model, &mdio);

    model.0.borrow_mut().atu_full = true;
    let res = sw.fdb_add(&Fdb {
        vid: 1,
        port_mask: 1,
        aging: 0xf,
        mac: [0; 6],
    });
    assert_eq!(res, Err(Qca8kError::TableFull));
}
