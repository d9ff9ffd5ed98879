use std::{
    fmt::{self, Display},
    time::{Duration, Instant},
};

/// Minimum time between two published FPS samples.
pub const FPS_SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Counts composed frames and turns them into a frame rate once per
/// [`FPS_SAMPLE_INTERVAL`].
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    last_sample: Instant,
    fps: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Normal,
    Warning,
    Critical,
}

/// GPU memory as reported by the driver, in kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total_kb: u64,
    pub available_kb: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub fps: Option<f32>,
    pub memory: Option<MemoryUsage>,
    pub device: String,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            last_sample: now,
            fps: None,
        }
    }

    /// Records a frame. Returns the new rate if a sample was taken.
    pub fn frame(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.last_sample);
        if elapsed < FPS_SAMPLE_INTERVAL {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.last_sample = now;
        self.fps = Some(fps);
        Some(fps)
    }

    /// The last published rate.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }
}

impl Level {
    pub fn for_fps(fps: f32) -> Self {
        if fps < 10.0 {
            Level::Critical
        } else if fps < 25.0 {
            Level::Warning
        } else {
            Level::Normal
        }
    }

    fn for_fraction(used: f32) -> Self {
        if used > 0.9 {
            Level::Critical
        } else if used > 0.75 {
            Level::Warning
        } else {
            Level::Normal
        }
    }
}

impl MemoryUsage {
    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }

    pub fn used_mb(&self) -> u64 {
        self.used_kb() / 1024
    }

    pub fn total_mb(&self) -> u64 {
        self.total_kb / 1024
    }

    pub fn used_fraction(&self) -> f32 {
        if self.total_kb == 0 {
            return 0.0;
        }

        self.used_kb() as f32 / self.total_kb as f32
    }

    pub fn level(&self) -> Level {
        Level::for_fraction(self.used_fraction())
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Normal => "normal",
            Level::Warning => "warning",
            Level::Critical => "critical",
        })
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fps {
            Some(fps) => writeln!(f, "FPS: {fps:.1} ({})", Level::for_fps(fps))?,
            None => writeln!(f, "FPS: -")?,
        }

        if let Some(memory) = self.memory {
            writeln!(
                f,
                "GPU memory: {} / {} MB ({})",
                memory.used_mb(),
                memory.total_mb(),
                memory.level()
            )?;
        }

        write!(f, "Device: {}", self.device)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{Diagnostics, FpsCounter, Level, MemoryUsage};

    #[test]
    fn fps_published_once_per_second() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 1..60 {
            let now = start + Duration::from_millis(i * 16);
            assert_eq!(counter.frame(now), None);
        }
        assert_eq!(counter.fps(), None);

        let fps = counter.frame(start + Duration::from_millis(1000)).unwrap();
        assert_eq!(fps, 60.0);

        // counter was reset by the sample
        let fps = counter.frame(start + Duration::from_millis(2000)).unwrap();
        assert_eq!(fps, 1.0);
        assert_eq!(counter.fps(), Some(1.0));
    }

    #[test]
    fn levels() {
        assert_eq!(Level::for_fps(5.0), Level::Critical);
        assert_eq!(Level::for_fps(24.9), Level::Warning);
        assert_eq!(Level::for_fps(60.0), Level::Normal);

        let memory = |available_kb| MemoryUsage {
            total_kb: 1000,
            available_kb,
        };
        assert_eq!(memory(500).level(), Level::Normal);
        assert_eq!(memory(200).level(), Level::Warning);
        assert_eq!(memory(50).level(), Level::Critical);
        assert_eq!(memory(2000).level(), Level::Normal);
    }

    #[test]
    fn display() {
        let diagnostics = Diagnostics {
            fps: Some(8.0),
            memory: Some(MemoryUsage {
                total_kb: 8 * 1024 * 1024,
                available_kb: 2 * 1024 * 1024,
            }),
            device: "Test Device".into(),
        };
        assert_eq!(
            diagnostics.to_string(),
            "FPS: 8.0 (critical)\nGPU memory: 6144 / 8192 MB (normal)\nDevice: Test Device"
        );

        let diagnostics = Diagnostics {
            fps: None,
            memory: None,
            device: "Test Device".into(),
        };
        assert_eq!(diagnostics.to_string(), "FPS: -\nDevice: Test Device");
    }
}
