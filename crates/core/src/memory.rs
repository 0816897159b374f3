//! Memory bus abstraction.
//!
//! The CPU core talks to memory only through the [`Memory`] trait. Storage never
//! counts cycles; the core charges one cycle per byte it moves over the bus.

use std::fmt::Write as _;

/// Size of the 16-bit address space.
pub const MEMORY_SIZE: usize = 0x10000;

/// Location of the little-endian reset vector ($FFFC low, $FFFD high).
pub const RESET_VECTOR: u16 = 0xFFFC;

/// Byte-addressable storage consumed by the CPU core.
///
/// Every `u16` is a valid address; implementations must not fail on access.
pub trait Memory {
    /// Bring the store to its power-on state.
    fn init(&mut self);

    /// Read a byte from memory at the given address
    fn read_byte(&self, addr: u16) -> u8;

    /// Write a byte to memory at the given address.
    ///
    /// Plain writes are volatile: [`Memory::init`] (and so a CPU reset) may
    /// discard them. Loaders must go through [`Memory::load_image`].
    fn write_byte(&mut self, addr: u16, value: u8);

    /// Read a little-endian address: low byte at `addr`, high byte at `addr + 1`.
    fn read_address(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Write a little-endian address, low byte first. Volatile like
    /// [`Memory::write_byte`]; a reset vector written this way before reset
    /// is lost on stores with a boot image.
    fn write_address(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }

    /// Loader write path. Stores that keep a boot image override this so the
    /// bytes survive [`Memory::init`]. Programs and the reset vector belong here.
    fn load_image(&mut self, origin: u16, bytes: &[u8]) {
        for (offset, &byte) in bytes.iter().enumerate() {
            self.write_byte(origin.wrapping_add(offset as u16), byte);
        }
    }
}

/// Flat 64 KiB RAM with a replayable boot image.
///
/// `init` zero-fills the store and then lays the boot image back down, so a
/// program placed by a loader is still there after the CPU resets memory.
/// The image is a per-cell shadow: reloading an address overwrites its
/// earlier image byte.
#[derive(Debug, Clone)]
pub struct Ram {
    data: Vec<u8>,
    image: Vec<Option<u8>>,
}

impl Ram {
    pub fn new() -> Self {
        Self {
            data: vec![0; MEMORY_SIZE],
            image: vec![None; MEMORY_SIZE],
        }
    }

    /// Point the reset vector at `addr`. Part of the boot image.
    pub fn set_reset_vector(&mut self, addr: u16) {
        self.load_image(RESET_VECTOR, &addr.to_le_bytes());
    }

    /// Forget the boot image. The current contents are left as they are.
    pub fn clear_image(&mut self) {
        self.image.fill(None);
    }

    /// Number of cells covered by the boot image.
    pub fn image_len(&self) -> usize {
        self.image.iter().filter(|cell| cell.is_some()).count()
    }

    /// Raw view of the whole store.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Hex dump of `len` bytes starting at `start`, 16 per row.
    pub fn hexdump(&self, start: u16, len: usize) -> String {
        let mut out = String::new();
        let mut addr = start;
        let mut remaining = len;
        while remaining > 0 {
            let row = remaining.min(16);
            let _ = write!(out, "{:04X}:", addr);
            for i in 0..row {
                let _ = write!(out, " {:02X}", self.read_byte(addr.wrapping_add(i as u16)));
            }
            out.push('\n');
            addr = addr.wrapping_add(row as u16);
            remaining -= row;
        }
        out
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory for Ram {
    fn init(&mut self) {
        for (cell, shadow) in self.data.iter_mut().zip(&self.image) {
            *cell = shadow.unwrap_or(0);
        }
    }

    #[inline]
    fn read_byte(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    #[inline]
    fn write_byte(&mut self, addr: u16, value: u8) {
        self.data[addr as usize] = value;
    }

    fn load_image(&mut self, origin: u16, bytes: &[u8]) {
        for (offset, &byte) in bytes.iter().enumerate() {
            let addr = origin.wrapping_add(offset as u16) as usize;
            self.data[addr] = byte;
            self.image[addr] = Some(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ram_is_zeroed() {
        let ram = Ram::new();
        assert_eq!(ram.as_slice().len(), MEMORY_SIZE);
        assert!(ram.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn address_is_little_endian() {
        let mut ram = Ram::new();
        ram.write_address(0x0200, 0x1234);
        assert_eq!(ram.read_byte(0x0200), 0x34);
        assert_eq!(ram.read_byte(0x0201), 0x12);
        assert_eq!(ram.read_address(0x0200), 0x1234);
    }

    #[test]
    fn address_read_wraps_at_top_of_memory() {
        let mut ram = Ram::new();
        ram.write_byte(0xFFFF, 0xCD);
        ram.write_byte(0x0000, 0xAB);
        assert_eq!(ram.read_address(0xFFFF), 0xABCD);

        ram.write_address(0xFFFF, 0x5678);
        assert_eq!(ram.read_byte(0xFFFF), 0x78);
        assert_eq!(ram.read_byte(0x0000), 0x56);
    }

    #[test]
    fn init_clears_plain_writes() {
        let mut ram = Ram::new();
        ram.write_byte(0x0010, 0x42);
        ram.init();
        assert_eq!(ram.read_byte(0x0010), 0);
    }

    #[test]
    fn init_replays_boot_image() {
        let mut ram = Ram::new();
        ram.load_image(0x0200, &[0xA9, 0x01]);
        ram.set_reset_vector(0x0200);
        ram.write_byte(0x0200, 0xEA); // clobbered, restored by init
        ram.write_byte(0x0300, 0x99);

        ram.init();
        assert_eq!(ram.read_byte(0x0200), 0xA9);
        assert_eq!(ram.read_byte(0x0201), 0x01);
        assert_eq!(ram.read_address(RESET_VECTOR), 0x0200);
        assert_eq!(ram.read_byte(0x0300), 0);
    }

    #[test]
    fn later_image_segments_win() {
        let mut ram = Ram::new();
        ram.set_reset_vector(0x0200);
        ram.set_reset_vector(0x0400);
        ram.init();
        assert_eq!(ram.read_address(RESET_VECTOR), 0x0400);
    }

    #[test]
    fn reloading_overwrites_the_image_in_place() {
        let mut ram = Ram::new();
        for i in 0..10_000u32 {
            ram.set_reset_vector(i as u16);
            ram.load_image(0x0200, &[i as u8, 0xEA]);
        }
        assert_eq!(ram.image_len(), 4);

        ram.init();
        assert_eq!(ram.read_address(RESET_VECTOR), 9_999);
        assert_eq!(ram.read_byte(0x0200), (9_999u32 & 0xFF) as u8);
        assert_eq!(ram.image_len(), 4);
    }

    #[test]
    fn plain_vector_write_does_not_survive_init() {
        let mut ram = Ram::new();
        ram.write_address(RESET_VECTOR, 0x0400);
        ram.init();
        assert_eq!(ram.read_address(RESET_VECTOR), 0x0000);

        ram.load_image(RESET_VECTOR, &0x0400u16.to_le_bytes());
        ram.init();
        assert_eq!(ram.read_address(RESET_VECTOR), 0x0400);
    }

    #[test]
    fn clear_image_stops_replay() {
        let mut ram = Ram::new();
        ram.load_image(0x0000, &[1, 2, 3]);
        ram.clear_image();
        assert_eq!(ram.image_len(), 0);
        assert_eq!(ram.read_byte(0x0001), 2);
        ram.init();
        assert_eq!(ram.read_byte(0x0001), 0);
    }

    #[test]
    fn image_wraps_past_ffff() {
        let mut ram = Ram::new();
        ram.load_image(0xFFFE, &[1, 2, 3]);
        assert_eq!(ram.read_byte(0xFFFE), 1);
        assert_eq!(ram.read_byte(0xFFFF), 2);
        assert_eq!(ram.read_byte(0x0000), 3);
    }

    #[test]
    fn hexdump_rows() {
        let mut ram = Ram::new();
        ram.load_image(0x0200, &[0xA9, 0xF9, 0x75, 0x0F]);
        let dump = ram.hexdump(0x0200, 20);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0200: A9 F9 75 0F 00"));
        assert_eq!(lines[1], "0210: 00 00 00 00");
    }
}
