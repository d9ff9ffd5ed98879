use std::{
    any::Any,
    fs::File,
    io::BufReader,
    mem,
    path::Path,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{Context, Result};
use bitflags::bitflags;
use clone_macro::clone;
use common::progress::Progress;
use nalgebra::Vector2;
use tracing::{debug, info, warn};
use track_format::{parse_tracks, Format};

use crate::{
    camera::OrbitCamera,
    config::Config,
    dataset::Dataset,
    diagnostics::{Diagnostics, MemoryUsage},
    frame::{FrameComposer, FrameStats, FrameTimer, RenderMode},
    geometry::DatasetGeometry,
    normalize::Normalizer,
    render::{upload_geometry, RenderBackend, TrackBuffer},
    style::SharedStyle,
    Pos,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseButtons: u8 {
        const Left = 1 << 0;
        const Right = 1 << 1;
        const Middle = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Press { x: f32, y: f32 },
    /// Pointer moved to `(x, y)` while `buttons` were held.
    Drag { x: f32, y: f32, buttons: MouseButtons },
    Wheel { delta: f32 },
    Resize { width: u32, height: u32 },
}

/// Things observers of the viewer may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Status(String),
    Loaded { tracks: usize, vertices: usize },
    LoadFailed(String),
    Fps(f32),
    Memory(MemoryUsage),
}

/// Owns the camera, the current dataset and its uploaded buffers, and drives
/// loads and frames. Everything here runs on the thread that owns the
/// backend, only parsing and geometry building happen on a worker.
pub struct Viewer<B: RenderBackend> {
    backend: B,
    camera: OrbitCamera,
    style: SharedStyle,
    composer: FrameComposer,
    timer: FrameTimer,

    rotate_sensitivity: f32,
    zoom_divisor: f32,
    normalizer: Normalizer,

    dataset: Arc<Dataset>,
    buffers: Vec<TrackBuffer<B::Buffer>>,
    loading: Option<PendingLoad>,

    pointer: Option<Vector2<f32>>,
    events: Vec<ViewerEvent>,
}

struct PendingLoad {
    name: String,
    progress: Progress,
    join: JoinHandle<Result<LoadedDataset>>,
}

struct LoadedDataset {
    dataset: Dataset,
    geometry: DatasetGeometry,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(backend: B, config: &Config, now: Instant) -> Self {
        Self {
            backend,
            camera: OrbitCamera::new(),
            style: config.style.clone().shared(),
            composer: FrameComposer::new(config.render_mode, now),
            timer: FrameTimer::new(config.frame_interval(), now),

            rotate_sensitivity: config.rotate_sensitivity,
            zoom_divisor: config.zoom_divisor,
            normalizer: config.normalizer(),

            dataset: Arc::new(Dataset::default()),
            buffers: Vec::new(),
            loading: None,

            pointer: None,
            events: Vec::new(),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Press { x, y } => self.pointer = Some(Vector2::new(x, y)),
            InputEvent::Drag { x, y, buttons } => {
                let pointer = Vector2::new(x, y);
                let rotate = buttons.intersects(MouseButtons::Left | MouseButtons::Right);
                if let (Some(last), true) = (self.pointer, rotate) {
                    let delta = (pointer - last) * self.rotate_sensitivity;
                    self.camera.rotate_azimuth(delta.x);
                    self.camera.rotate_polar(delta.y);
                }
                self.pointer = Some(pointer);
            }
            InputEvent::Wheel { delta } => self.camera.zoom(delta / self.zoom_divisor),
            InputEvent::Resize { width, height } => {
                self.camera.set_aspect(width as f32 / height as f32)
            }
        }
    }

    /// Starts loading a track file in the background. The format is checked
    /// and the file opened before anything else happens, so a bad path never
    /// affects the dataset currently shown. A load that is already running
    /// is abandoned.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let start = Format::from_path(path).and_then(|format| {
            let file = File::open(path)
                .with_context(|| format!("Failed to open `{}`", path.display()))?;
            let size = file.metadata().map(|x| x.len()).unwrap_or_default();
            self.spawn_load(name.clone(), BufReader::new(file), size, format)
        });

        match start {
            Ok(load) => {
                if let Some(pending) = self.loading.replace(load) {
                    debug!("Discarding pending load of `{}`", pending.name);
                }
                self.events.push(ViewerEvent::Status(format!("Loading `{name}`")));
                Ok(())
            }
            Err(err) => {
                self.load_failed(&name, &err);
                Err(err)
            }
        }
    }

    fn spawn_load(
        &self,
        name: String,
        reader: BufReader<File>,
        size: u64,
        format: Format,
    ) -> Result<PendingLoad> {
        let progress = Progress::new();
        progress.set_total(size);

        let normalizer = self.normalizer;
        let join = thread::Builder::new()
            .name("track_load".into())
            .spawn(clone!([progress], move || -> Result<LoadedDataset> {
                let tracks = parse_tracks(reader, format, &progress);
                progress.set_finished();

                let dataset = Dataset::normalized(tracks?, &normalizer);
                let geometry = DatasetGeometry::build(&dataset);
                Ok(LoadedDataset { dataset, geometry })
            }))?;

        Ok(PendingLoad {
            name,
            progress,
            join,
        })
    }

    /// Hands a finished background load over to the renderer.
    pub fn poll(&mut self) {
        if !(self.loading.as_ref()).is_some_and(|x| x.join.is_finished()) {
            return;
        }

        let Some(load) = self.loading.take() else {
            return;
        };

        let result = match load.join.join() {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!(panic_message(panic))),
        };

        match result.and_then(|loaded| self.install(loaded)) {
            Ok(()) => self.loaded(&load.name),
            Err(err) => self.load_failed(&load.name, &err),
        }
    }

    /// Replaces the dataset with `tracks` right away, on this thread.
    pub fn load_tracks(&mut self, tracks: Vec<Vec<Pos>>) -> Result<()> {
        let dataset = Dataset::normalized(tracks, &self.normalizer);
        let geometry = DatasetGeometry::build(&dataset);

        match self.install(LoadedDataset { dataset, geometry }) {
            Ok(()) => {
                self.loaded("tracks");
                Ok(())
            }
            Err(err) => {
                self.load_failed("tracks", &err);
                Err(err)
            }
        }
    }

    pub fn generate_test_data(&mut self) -> Result<()> {
        self.load_tracks(Dataset::test_data())
    }

    /// Drops the current dataset and its buffers.
    pub fn close_dataset(&mut self) {
        self.buffers.clear();
        self.dataset = Arc::new(Dataset::default());
    }

    fn install(&mut self, loaded: LoadedDataset) -> Result<()> {
        // New buffers are fully uploaded before the old ones are released.
        let buffers = upload_geometry(&mut self.backend, &loaded.geometry)?;
        self.buffers = buffers;
        self.dataset = Arc::new(loaded.dataset);
        Ok(())
    }

    fn loaded(&mut self, name: &str) {
        let tracks = self.dataset.tracks().len();
        let vertices = self.buffers.iter().map(|x| x.vertex_count as usize).sum();
        info!("Loaded `{name}` with {tracks} tracks and {vertices} vertices");

        self.events.push(ViewerEvent::Loaded { tracks, vertices });
        self.events.push(ViewerEvent::Status(format!(
            "Loaded `{name}`: {tracks} tracks"
        )));
    }

    fn load_failed(&mut self, name: &str, err: &anyhow::Error) {
        warn!("Failed to load `{name}`: {err:#}");
        self.events.push(ViewerEvent::LoadFailed(format!("{err:#}")));
        self.events.push(ViewerEvent::Status(format!(
            "Failed to load `{name}`: {err:#}"
        )));
    }

    /// Polls the pending load and draws a frame.
    pub fn tick(&mut self, now: Instant) -> Result<FrameStats> {
        self.poll();

        let style = self.style.read().clone();
        let stats = (self.composer).compose(
            &mut self.backend,
            &self.camera,
            &style,
            &self.buffers,
            now,
        )?;

        if let Some(fps) = stats.fps {
            self.events.push(ViewerEvent::Fps(fps));
            if let Some(memory) = self.backend.memory() {
                self.events.push(ViewerEvent::Memory(memory));
            }
        }

        Ok(stats)
    }

    /// Ticks if a frame interval has passed since the last tick.
    pub fn tick_if_due(&mut self, now: Instant) -> Result<Option<FrameStats>> {
        if !self.timer.is_due(now) {
            return Ok(None);
        }

        self.tick(now).map(Some)
    }

    /// Saves the last drawn frame to `path`, in the format implied by its
    /// extension.
    pub fn snapshot(&mut self, path: &Path) -> Result<()> {
        let image = (self.backend.capture()?)
            .context("Frame capture is not supported by this backend")?;
        image
            .save(path)
            .with_context(|| format!("Failed to save snapshot to `{}`", path.display()))?;

        info!("Saved {}x{} snapshot", image.width(), image.height());
        Ok(())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            fps: self.composer.fps(),
            memory: self.backend.memory(),
            device: self.backend.device_info(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        mem::take(&mut self.events)
    }
}

impl<B: RenderBackend> Viewer<B> {
    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn style(&self) -> SharedStyle {
        self.style.clone()
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        self.dataset.clone()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.composer.mode
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.composer.mode = mode;
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Progress of the running load, from 0 to 1.
    pub fn load_progress(&self) -> Option<f32> {
        self.loading.as_ref().map(|x| x.progress.progress())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        format!("{panic:?}")
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        path::PathBuf,
        process,
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use super::{InputEvent, MouseButtons, Viewer, ViewerEvent};
    use crate::{
        camera::OrbitCamera,
        config::Config,
        diagnostics::MemoryUsage,
        render::test::{Command, RecordingBackend},
    };

    fn viewer() -> Viewer<RecordingBackend> {
        Viewer::new(RecordingBackend::default(), &Config::default(), Instant::now())
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("ribbon-viewer-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn wait_for_load(viewer: &mut Viewer<RecordingBackend>) {
        for _ in 0..1000 {
            viewer.poll();
            if !viewer.is_loading() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("Load did not finish");
    }

    #[test]
    fn input_drives_camera() {
        let mut viewer = viewer();
        let reference = OrbitCamera::new();

        // no pointer position yet
        viewer.handle_input(InputEvent::Drag {
            x: 50.0,
            y: 50.0,
            buttons: MouseButtons::Left,
        });
        assert_eq!(viewer.camera().azimuth(), reference.azimuth());

        viewer.handle_input(InputEvent::Press { x: 0.0, y: 0.0 });
        viewer.handle_input(InputEvent::Drag {
            x: 30.0,
            y: -10.0,
            buttons: MouseButtons::Right,
        });
        assert!((viewer.camera().azimuth() - 0.3).abs() < 1e-6);
        assert!((viewer.camera().polar() - (reference.polar() - 0.1)).abs() < 1e-6);

        viewer.handle_input(InputEvent::Drag {
            x: 100.0,
            y: 100.0,
            buttons: MouseButtons::Middle,
        });
        assert!((viewer.camera().azimuth() - 0.3).abs() < 1e-6);

        viewer.handle_input(InputEvent::Wheel { delta: 120.0 });
        assert_eq!(viewer.camera().field_of_view(), reference.field_of_view() - 4.0);

        viewer.handle_input(InputEvent::Resize {
            width: 800,
            height: 400,
        });
        assert_eq!(viewer.camera().aspect(), 2.0);

        viewer.handle_input(InputEvent::Resize {
            width: 800,
            height: 0,
        });
        assert_eq!(viewer.camera().aspect(), 2.0);
    }

    #[test]
    fn test_data_is_drawn() {
        let mut viewer = viewer();
        viewer.generate_test_data().unwrap();

        assert_eq!(viewer.dataset().point_count(), 4);
        assert_eq!(
            viewer.drain_events()[0],
            ViewerEvent::Loaded {
                tracks: 1,
                vertices: 8
            }
        );

        let stats = viewer.tick(Instant::now()).unwrap();
        assert_eq!((stats.draws, stats.vertices), (1, 8));
        assert_eq!(viewer.backend().draws().count(), 1);

        viewer.close_dataset();
        assert_eq!(viewer.tick(Instant::now()).unwrap().draws, 0);
    }

    #[test]
    fn loads_file_in_background() {
        let path = temp_file("tracks.txt", "0 0 0\n4 0 0\n\n0 0 0\n0 2 0\n0 2 2\n");
        let mut viewer = viewer();

        viewer.load_file(&path).unwrap();
        assert!(viewer.is_loading());
        wait_for_load(&mut viewer);

        let dataset = viewer.dataset();
        assert_eq!(dataset.tracks().len(), 2);
        assert_eq!(dataset.normalization().unwrap().scale, 0.5);

        let events = viewer.drain_events();
        assert_eq!(events[0], ViewerEvent::Status("Loading `tracks.txt`".into()));
        assert!(events.contains(&ViewerEvent::Loaded {
            tracks: 2,
            vertices: 10
        }));
        assert_eq!(viewer.load_progress(), None);
    }

    #[test]
    fn failed_load_keeps_dataset() {
        let mut viewer = viewer();
        viewer.generate_test_data().unwrap();
        viewer.drain_events();
        let before = viewer.dataset();

        // rejected before anything is touched
        assert!(viewer.load_file(&PathBuf::from("brain.nc")).is_err());
        assert!(!viewer.is_loading());

        // rejected once parsed
        let path = temp_file("broken.obj", "v 0 0 0\nl 1 2\n");
        viewer.load_file(&path).unwrap();
        wait_for_load(&mut viewer);

        assert!(Arc::ptr_eq(&before, &viewer.dataset()));
        assert_eq!(viewer.tick(Instant::now()).unwrap().draws, 1);

        let events = viewer.drain_events();
        let failures = events
            .iter()
            .filter(|x| matches!(x, ViewerEvent::LoadFailed(_)))
            .count();
        assert_eq!(failures, 2);
        assert!(events.iter().any(
            |x| matches!(x, ViewerEvent::Status(status) if status.starts_with("Failed to load `brain.nc`"))
        ));
    }

    #[test]
    fn publishes_fps_and_memory() {
        let start = Instant::now();
        let backend = RecordingBackend::with_memory(MemoryUsage {
            total_kb: 4096,
            available_kb: 1024,
        });
        let mut viewer = Viewer::new(backend, &Config::default(), start);

        assert!(viewer.tick_if_due(start).unwrap().is_some());
        assert!(viewer
            .tick_if_due(start + Duration::from_millis(5))
            .unwrap()
            .is_none());
        viewer.tick(start + Duration::from_millis(1000)).unwrap();

        assert_eq!(
            viewer.drain_events(),
            [
                ViewerEvent::Fps(2.0),
                ViewerEvent::Memory(MemoryUsage {
                    total_kb: 4096,
                    available_kb: 1024
                })
            ]
        );

        let diagnostics = viewer.diagnostics();
        assert_eq!(diagnostics.fps, Some(2.0));
        assert_eq!(diagnostics.device, "Recording Backend");
        assert!(viewer.drain_events().is_empty());
    }

    #[test]
    fn snapshot() {
        let mut viewer = viewer();
        let path = temp_file("snapshot.png", "");
        assert!(viewer.snapshot(&path).is_err());

        viewer.backend_mut().capture = true;
        viewer.tick(Instant::now()).unwrap();
        viewer.snapshot(&path).unwrap();

        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert!(matches!(viewer.backend().commands[0], Command::Clear));
    }
}
