// src/marks.rs

//! Serial and mark allocation.
//!
//! Serials are internal handles assigned in generation order; marks are
//! the external handles that appear in the output stream, assigned in
//! emission order. The table maps one onto the other. Slot 0 is reserved
//! in both spaces.

use crate::error::{Error, Result};

pub type Serial = u32;
pub type Mark = u32;

pub struct Marks {
    /// Indexed by serial; 0 means "no mark bound yet".
    mark_of: Vec<Mark>,
    next_serial: Serial,
    next_mark: Mark,
    limit: Serial,
}

impl Marks {
    pub fn new(limit: Serial) -> Self {
        Marks {
            mark_of: vec![0],
            next_serial: 1,
            next_mark: 1,
            limit,
        }
    }

    /// Hand out the next serial; running past the configured limit is a
    /// fatal resource-exhaustion error.
    pub fn next_serial(&mut self) -> Result<Serial> {
        if self.next_serial >= self.limit {
            return Err(Error::SerialOverflow { limit: self.limit });
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        Ok(serial)
    }

    pub fn next_mark(&mut self) -> Mark {
        let mark = self.next_mark;
        self.next_mark += 1;
        mark
    }

    /// Bind a serial to a mark. Rebinding overwrites silently: in the
    /// canonical path a file revision is serial-numbered at generation
    /// time and mark-numbered at emission time.
    pub fn bind(&mut self, serial: Serial, mark: Mark) {
        let index = serial as usize;
        if index >= self.mark_of.len() {
            self.mark_of.resize(index + 1, 0);
        }
        self.mark_of[index] = mark;
    }

    pub fn mark_of(&self, serial: Serial) -> Option<Mark> {
        match self.mark_of.get(serial as usize) {
            Some(&mark) if mark != 0 => Some(mark),
            _ => None,
        }
    }

    /// Serials handed out so far.
    pub fn serials_used(&self) -> u32 {
        self.next_serial - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serials_and_marks_start_at_one() {
        let mut m = Marks::new(u32::MAX);
        assert_eq!(m.next_serial().unwrap(), 1);
        assert_eq!(m.next_serial().unwrap(), 2);
        assert_eq!(m.next_mark(), 1);
        assert_eq!(m.next_mark(), 2);
        assert_eq!(m.serials_used(), 2);
    }

    #[test]
    fn test_bind_and_lookup() {
        let mut m = Marks::new(u32::MAX);
        let s = m.next_serial().unwrap();
        assert_eq!(m.mark_of(s), None);
        m.bind(s, 7);
        assert_eq!(m.mark_of(s), Some(7));
    }

    #[test]
    fn test_rebind_overwrites_silently() {
        let mut m = Marks::new(u32::MAX);
        m.bind(3, 1);
        m.bind(3, 9);
        assert_eq!(m.mark_of(3), Some(9));
    }

    #[test]
    fn test_slot_zero_is_reserved() {
        let m = Marks::new(u32::MAX);
        assert_eq!(m.mark_of(0), None);
    }

    #[test]
    fn test_serial_overflow_is_fatal() {
        let mut m = Marks::new(3);
        assert!(m.next_serial().is_ok());
        assert!(m.next_serial().is_ok());
        match m.next_serial() {
            Err(Error::SerialOverflow { limit: 3 }) => {}
            other => panic!("expected overflow, got {:?}", other.map(|_| ())),
        }
    }
}
