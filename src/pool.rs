//! Fixed set of connection slots with paced, one-way admission.
//!
//! Slot `i` is filled at most once per run: admission always takes the
//! next never-used slot, and a removed slot stays empty.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::transport::Dialer;

pub struct ConnectionPool<D: Dialer> {
    dialer: D,
    slots: Vec<Option<Connection<D::Stream>>>,
    admitted: usize,
    target: usize,
    followup_budget: u64,
}

impl<D: Dialer> ConnectionPool<D> {
    pub fn new(dialer: D, target: usize, followup_budget: u64) -> Self {
        let mut slots = Vec::with_capacity(target);
        slots.resize_with(target, || None);
        Self {
            dialer,
            slots,
            admitted: 0,
            target,
            followup_budget,
        }
    }

    /// Connections ever admitted this run.
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    /// How many connections the run still aims for. Only ever shrinks.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_full(&self) -> bool {
        self.admitted >= self.target
    }

    /// Opens the next connection. `Ok(None)` when the target is reached.
    ///
    /// A failed open caps the target at what has been admitted so far and
    /// returns [`Error::Capacity`]; the caller is expected to carry on.
    pub fn admit_one(&mut self) -> Result<Option<usize>> {
        if self.is_full() {
            return Ok(None);
        }
        let index = self.admitted;
        match Connection::open(&mut self.dialer, self.followup_budget) {
            Ok(conn) => {
                self.slots[index] = Some(conn);
                self.admitted += 1;
                Ok(Some(index))
            }
            Err(source) => {
                self.target = self.admitted;
                Err(Error::Capacity {
                    admitted: self.admitted,
                    source,
                })
            }
        }
    }

    /// Takes the connection out of its slot. Removing an empty slot (or an
    /// index outside the pool) does nothing.
    pub fn remove(&mut self, index: usize) -> Option<Connection<D::Stream>> {
        let mut conn = self.slots.get_mut(index)?.take()?;
        conn.close();
        Some(conn)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Connection<D::Stream>> {
        self.slots
            .get_mut(index)?
            .as_mut()
            .filter(|conn| !conn.is_closed())
    }

    /// Live connections with their slot indices.
    pub fn active(&self) -> impl Iterator<Item = (usize, &Connection<D::Stream>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((index, slot.as_ref()?)))
            .filter(|(_, conn)| !conn.is_closed())
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = (usize, &mut Connection<D::Stream>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| Some((index, slot.as_mut()?)))
            .filter(|(_, conn)| !conn.is_closed())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Empties every slot, returning what was still open.
    pub fn drain(&mut self) -> Vec<Connection<D::Stream>> {
        (0..self.slots.len())
            .filter_map(|index| self.remove(index))
            .collect()
    }
}
