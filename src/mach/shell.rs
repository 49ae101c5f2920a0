/// ## Host collaborator
///
/// Everything the engine needs from the outside world to show and print
/// things. The display is a 131×16 bitmap, 17 bytes per row, least
/// significant bit leftmost.
pub trait Shell {
    /// A rectangle of the display changed.
    fn blit(&mut self, bits: &[u8], bytes_per_line: usize, x: usize, y: usize, w: usize, h: usize);
    /// The whole display changed.
    fn repaint(&mut self, bits: &[u8]);
    /// Printer output. Text lines are the calculator's character set.
    fn print_lines(&mut self, bytes: &[u8], is_graphic: bool);
    /// Informational text stored in state file headers.
    fn platform(&self) -> String {
        format!("rpn-engine {}", env!("CARGO_PKG_VERSION"))
    }
}

/// A host that ignores everything.
#[derive(Debug, Default)]
pub struct NullShell;

impl Shell for NullShell {
    fn blit(&mut self, _bits: &[u8], _bpl: usize, _x: usize, _y: usize, _w: usize, _h: usize) {}
    fn repaint(&mut self, _bits: &[u8]) {}
    fn print_lines(&mut self, _bytes: &[u8], _is_graphic: bool) {}
}
