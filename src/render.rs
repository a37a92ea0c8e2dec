use std::io;

use log::debug;
use ratatui::{
    buffer::{Buffer, Cell},
    layout::Rect,
};
use thiserror::Error;

/// Minimal terminal surface the renderer draws on. `draw` receives one
/// frame's changed cells in row-major order.
pub trait Screen {
    fn size(&self) -> io::Result<(u16, u16)>;
    fn clear(&mut self) -> io::Result<()>;
    fn draw(&mut self, cells: &[(u16, u16, &Cell)]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("terminal write failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub cells_written: usize,
    pub full_repaint: bool,
    pub flushed: bool,
}

/// Cells of `next` that differ from `previous`, in row-major order.
/// Both frames must cover the same area.
pub fn diff_frames<'a>(previous: &Buffer, next: &'a Buffer) -> Vec<(u16, u16, &'a Cell)> {
    previous.diff(next)
}

/// Keeps the last presented frame and writes only what changed since.
#[derive(Debug, Default)]
pub struct Renderer {
    last: Option<Buffer>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next `present` to clear and repaint everything.
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Area of the frame currently on screen, if any.
    pub fn last_area(&self) -> Option<Rect> {
        self.last.as_ref().map(|frame| frame.area)
    }

    pub fn present<S: Screen>(
        &mut self,
        frame: Buffer,
        screen: &mut S,
    ) -> Result<RenderStats, RenderError> {
        let blank;
        let (previous, full_repaint) = match &self.last {
            Some(last) if last.area == frame.area => (last, false),
            _ => {
                blank = Buffer::empty(frame.area);
                (&blank, true)
            }
        };
        let updates = diff_frames(previous, &frame);

        if let Err(err) = write_updates(screen, &updates, full_repaint) {
            self.last = None;
            return Err(err.into());
        }
        let stats = RenderStats {
            cells_written: updates.len(),
            full_repaint,
            flushed: full_repaint || !updates.is_empty(),
        };
        if full_repaint {
            debug!(
                "full repaint at {}x{}: {} cells",
                frame.area.width, frame.area.height, stats.cells_written
            );
        }
        self.last = Some(frame);
        Ok(stats)
    }
}

fn write_updates<S: Screen>(
    screen: &mut S,
    updates: &[(u16, u16, &Cell)],
    full_repaint: bool,
) -> io::Result<()> {
    if full_repaint {
        screen.clear()?;
    }
    if !updates.is_empty() {
        screen.draw(updates)?;
    }
    if full_repaint || !updates.is_empty() {
        screen.flush()?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ratatui::style::{Color, Style};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Op {
        Clear,
        Put(u16, u16, String),
        Flush,
    }

    pub(crate) struct RecordingScreen {
        pub(crate) size: (u16, u16),
        pub(crate) ops: Vec<Op>,
        pub(crate) fail: bool,
    }

    impl RecordingScreen {
        pub(crate) fn new(width: u16, height: u16) -> Self {
            Self {
                size: (width, height),
                ops: Vec::new(),
                fail: false,
            }
        }

        pub(crate) fn take(&mut self) -> Vec<Op> {
            std::mem::take(&mut self.ops)
        }
    }

    impl Screen for RecordingScreen {
        fn size(&self) -> io::Result<(u16, u16)> {
            Ok(self.size)
        }

        fn clear(&mut self) -> io::Result<()> {
            self.ops.push(Op::Clear);
            Ok(())
        }

        fn draw(&mut self, cells: &[(u16, u16, &Cell)]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.ops.extend(
                cells
                    .iter()
                    .map(|(x, y, cell)| Op::Put(*x, *y, cell.symbol().to_string())),
            );
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.ops.push(Op::Flush);
            Ok(())
        }
    }

    fn frame(width: u16, height: u16, lines: &[&str]) -> Buffer {
        let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
        for (y, line) in lines.iter().enumerate() {
            buf.set_string(0, y as u16, line, Style::default());
        }
        buf
    }

    #[test]
    fn test_first_present_is_full_repaint() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(4, 2);
        let stats = renderer.present(frame(4, 2, &["ab"]), &mut screen).unwrap();
        assert!(stats.full_repaint);
        assert_eq!(
            screen.take(),
            vec![
                Op::Clear,
                Op::Put(0, 0, "a".to_string()),
                Op::Put(1, 0, "b".to_string()),
                Op::Flush
            ]
        );
    }

    #[test]
    fn test_identical_frame_writes_nothing() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(10, 3);
        renderer
            .present(frame(10, 3, &["hello", "world"]), &mut screen)
            .unwrap();
        screen.take();
        let stats = renderer
            .present(frame(10, 3, &["hello", "world"]), &mut screen)
            .unwrap();
        assert_eq!(stats, RenderStats::default());
        assert!(screen.take().is_empty());
    }

    #[test]
    fn test_only_changed_cells_are_written_in_row_major_order() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(6, 2);
        renderer
            .present(frame(6, 2, &["abc", "xyz"]), &mut screen)
            .unwrap();
        screen.take();
        renderer
            .present(frame(6, 2, &["abd", "wyz"]), &mut screen)
            .unwrap();
        assert_eq!(
            screen.take(),
            vec![
                Op::Put(2, 0, "d".to_string()),
                Op::Put(0, 1, "w".to_string()),
                Op::Flush
            ]
        );
    }

    #[test]
    fn test_style_change_alone_is_a_write() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(3, 1);
        renderer.present(frame(3, 1, &["a"]), &mut screen).unwrap();
        screen.take();
        let mut recolored = frame(3, 1, &["a"]);
        recolored.set_style(Rect::new(0, 0, 1, 1), Style::default().fg(Color::Green));
        let stats = renderer.present(recolored, &mut screen).unwrap();
        assert_eq!(stats.cells_written, 1);
    }

    #[test]
    fn test_resize_repaints_once_then_settles() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(5, 2);
        renderer.present(frame(5, 2, &["abc"]), &mut screen).unwrap();
        screen.take();

        let stats = renderer.present(frame(8, 3, &["abc"]), &mut screen).unwrap();
        assert!(stats.full_repaint);
        let ops = screen.take();
        assert_eq!(ops.first(), Some(&Op::Clear));
        assert_eq!(ops.iter().filter(|op| **op == Op::Clear).count(), 1);

        let stats = renderer.present(frame(8, 3, &["abc"]), &mut screen).unwrap();
        assert!(!stats.full_repaint);
        assert!(screen.take().is_empty());
    }

    #[test]
    fn test_failed_write_forces_next_full_repaint() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(3, 1);
        renderer.present(frame(3, 1, &["a"]), &mut screen).unwrap();
        screen.fail = true;
        assert!(renderer.present(frame(3, 1, &["b"]), &mut screen).is_err());
        screen.fail = false;
        screen.take();
        let stats = renderer.present(frame(3, 1, &["b"]), &mut screen).unwrap();
        assert!(stats.full_repaint);
    }

    #[test]
    fn test_invalidate() {
        let mut renderer = Renderer::new();
        let mut screen = RecordingScreen::new(3, 1);
        assert_eq!(renderer.last_area(), None);
        renderer.present(frame(3, 1, &["a"]), &mut screen).unwrap();
        assert_eq!(renderer.last_area(), Some(Rect::new(0, 0, 3, 1)));
        renderer.invalidate();
        let stats = renderer.present(frame(3, 1, &["a"]), &mut screen).unwrap();
        assert!(stats.full_repaint);
    }
}
