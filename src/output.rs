//! Preview window for the binary.

use anyhow::Result;

pub struct PreviewWindow {
    window: minifb::Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl PreviewWindow {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let width = width as usize;
        let height = height as usize;
        let mut window = minifb::Window::new(
            title,
            width,
            height,
            minifb::WindowOptions {
                resize: true,
                ..minifb::WindowOptions::default()
            },
        )
        .map_err(|e| anyhow::anyhow!("failed to create window: {e}"))?;

        // ~60 FPS; this is the display-refresh pacing for the frame loop.
        window.limit_update_rate(Some(std::time::Duration::from_micros(16600)));

        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn escape_pressed(&self) -> bool {
        self.window.is_key_down(minifb::Key::Escape)
    }

    /// Present a packed RGB8 buffer.
    pub fn update(&mut self, rgb: &[u8]) -> Result<()> {
        for (dst, chunk) in self.buffer.iter_mut().zip(rgb.chunks_exact(3)) {
            let r = chunk[0] as u32;
            let g = chunk[1] as u32;
            let b = chunk[2] as u32;
            *dst = (r << 16) | (g << 8) | b;
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow::anyhow!(e))
    }
}
