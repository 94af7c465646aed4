use crate::err::Qca8kError;
use crate::port::Ports;
use crate::regs::{
    RegIo, Regmap, AR40XX_NUM_PORTS, QM_DEBUG_ADDR, QM_DEBUG_VALUE, QM_PORT0_3_QNUM,
    QM_PORT4_6_QNUM,
};

/// Per-port queue-manager bookkeeping, guarded by the QM lock.
#[derive(Default)]
pub struct QmState {
    /// Last observed buffer occupancy per port.
    pub qm_buf: Ports<u8, AR40XX_NUM_PORTS>,
    /// Consecutive polls a port spent with traffic stuck in its queue.
    pub qm_err_cnt: Ports<u32, AR40XX_NUM_PORTS>,
}

/// Read one port's queue occupancy through the QM debug window. Ports
/// 0-3 share one probe word, 4-6 the other, one byte per port.
pub fn qm_buffer_occupancy<B: RegIo>(
    base: &mut Regmap<B>,
    port: usize,
) -> Result<u8, Qca8kError> {
    if port >= AR40XX_NUM_PORTS {
        return Err(Qca8kError::InvalidArg);
    }

    let probe = if port < 4 {
        QM_PORT0_3_QNUM
    } else {
        QM_PORT4_6_QNUM
    };
    base.write_32(QM_DEBUG_ADDR, probe)?;
    let val = base.read_32(QM_DEBUG_VALUE)?;

    Ok(((val >> ((port % 4) * 8)) & 0xff) as u8)
}

/// Refresh the whole occupancy table in one pass over the two probe
/// words.
pub fn qm_refresh<B: RegIo>(base: &mut Regmap<B>, qm: &mut QmState) -> Result<(), Qca8kError> {
    for port in 0..AR40XX_NUM_PORTS {
        let occ = qm_buffer_occupancy(base, port)?;
        *qm.qm_buf.get_mut(port)? = occ;
        let cnt = qm.qm_err_cnt.get_mut(port)?;
        if occ != 0 {
            *cnt += 1;
        } else {
            *cnt = 0;
        }
    }
    Ok(())
}
