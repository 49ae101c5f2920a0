use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub const WIDTH: usize = 131;
pub const HEIGHT: usize = 16;
pub const BYTES_PER_LINE: usize = 17;
pub const SIZE: usize = BYTES_PER_LINE * HEIGHT;

/// ## Logical display
///
/// The engine only tracks pixels; turning them into glyphs or a window
/// is the host's job.
#[derive(Clone, PartialEq, Eq)]
pub struct Display {
    bits: [u8; SIZE],
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.bits.iter().map(|b| b.count_ones()).sum::<u32>();
        write!(f, "Display {{ {} pixels on }}", lit)
    }
}

impl Default for Display {
    fn default() -> Display {
        Display { bits: [0; SIZE] }
    }
}

impl Display {
    pub fn from_bytes(bytes: &[u8]) -> Result<Display> {
        if bytes.len() != SIZE {
            return Err(error!(InvalidData; "DISPLAY SIZE"));
        }
        let mut bits = [0; SIZE];
        bits.copy_from_slice(bytes);
        Ok(Display { bits })
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn clear(&mut self) {
        self.bits = [0; SIZE];
    }

    /// Zero based; out of range is an error.
    pub fn set_pixel(&mut self, x: usize, y: usize) -> Result<()> {
        if x >= WIDTH || y >= HEIGHT {
            return Err(error!(OutOfRange));
        }
        self.bits[y * BYTES_PER_LINE + x / 8] |= 1 << (x % 8);
        Ok(())
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.bits[y * BYTES_PER_LINE + x / 8] & (1 << (x % 8)) != 0
    }
}
