use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor::MoveUp,
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use tracing::trace;

use crate::buffer::BlockRead;
use crate::capture::SampleSource;
use crate::error::Result;
use crate::fft;
use crate::loudness::LoudnessIndicator;
use crate::spectrum::SpectrumTracker;

const DOT: char = '●';

/// Columns taken by the dot, the space after it, and a spare so lines never wrap.
const RESERVED_COLUMNS: u16 = 3;

/// What one frame puts on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub color: (u8, u8, u8),
    pub bar: String,
}

/// Per-run analysis state: the smoothed spectrum and the loudness envelopes.
pub struct Monitor {
    window: usize,
    tracker: SpectrumTracker,
    indicator: LoudnessIndicator,
}

impl Monitor {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            tracker: SpectrumTracker::new(window / 2 + 1),
            indicator: LoudnessIndicator::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Turn one block of samples into the dot color and the bar glyphs.
    pub fn process(&mut self, samples: &[f32], width: usize) -> Result<Frame> {
        let amplitudes = fft::transform(samples)?;
        let powers = fft::power_spectrum(&amplitudes);

        let total_power: f32 = powers.iter().sum();
        let color = self.indicator.update(total_power);
        let bar = self.tracker.plot(&powers, width)?;

        trace!(
            "frame: total_power={:.6}, norm={:.6}, width={}",
            total_power,
            self.tracker.norm(),
            width
        );

        Ok(Frame { color, bar })
    }
}

pub fn display_width(columns: u16) -> usize {
    columns.saturating_sub(RESERVED_COLUMNS) as usize
}

/// Overwrite the previous frame's line in place.
pub fn render<W: Write>(out: &mut W, frame: &Frame) -> io::Result<()> {
    let (r, g, b) = frame.color;
    queue!(
        out,
        MoveUp(1),
        SetForegroundColor(Color::Rgb { r, g, b }),
        Print(DOT),
        ResetColor,
        Print(' '),
        Print(&frame.bar),
        Print('\n')
    )?;
    out.flush()
}

/// How the render loop ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Cancelled,
}

/// Read, analyze and draw frames until `shutdown` is set.
///
/// The loop has no natural end; every error stops it.
pub fn run<S, W, F>(
    source: &mut S,
    out: &mut W,
    monitor: &mut Monitor,
    shutdown: &AtomicBool,
    mut terminal_size: F,
) -> Result<Outcome>
where
    S: SampleSource,
    W: Write,
    F: FnMut() -> io::Result<(u16, u16)>,
{
    let mut block = vec![0.0; monitor.window()];

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Ok(Outcome::Cancelled);
        }
        if source.read_block(&mut block, shutdown)? == BlockRead::Cancelled {
            return Ok(Outcome::Cancelled);
        }

        let (columns, _rows) = terminal_size()?;
        let frame = monitor.process(&block, display_width(columns))?;
        render(out, &frame)?;
    }
}
