//! Split screen demo application
//!
//! Renders one scene through two side-by-side viewports, each with its own
//! camera. Runs headless: frames are recorded into a `CommandRecorder` and
//! summarized in the log. Pass a `.toml` or `.ron` path to load a
//! `FrameworkConfig` instead of the built-in split screen layout.

use glint_engine::prelude::*;
use glint_engine::render::{GpuCommand, Primitive};

struct SplitScreenApp {
    scene: SceneGraph,
    cameras: CameraRegistry,
    viewports: Vec<Viewport>,
    window: WindowExtent,
    gpu: CommandRecorder,
    spinner: NodeId,
}

impl SplitScreenApp {
    fn new(config: &FrameworkConfig) -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Creating split screen demo...");
        let mut scene = SceneGraph::new();
        let mut cameras = CameraRegistry::new();

        let world = scene.create_node("world");
        let spinner = scene.create_node("spinner");
        let orbit = Transform::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let satellite = scene.create_node_with("satellite", orbit);
        scene.attach(world, spinner)?;
        scene.attach(spinner, satellite)?;

        scene.set_renderable(spinner, |gpu: &mut dyn GpuCommands, _: &Mat4| {
            gpu.draw_arrays(Primitive::Triangles, 0, 36);
        })?;
        scene.set_renderable(satellite, |gpu: &mut dyn GpuCommands, world: &Mat4| {
            log::trace!("Satellite at {:?}", world.column(3).xyz());
            gpu.draw_arrays(Primitive::Triangles, 0, 12);
        })?;

        let viewports = config.build(&mut scene, &mut cameras, Some(world))?;
        log::info!("Scene has {} nodes, {} viewports", scene.len(), viewports.len());

        Ok(Self {
            scene,
            cameras,
            viewports,
            window: config.window.extent(),
            gpu: CommandRecorder::new(),
            spinner,
        })
    }

    fn render_frame(&mut self, frame: u32) -> Result<(), Box<dyn std::error::Error>> {
        let angle = frame as f32 * 0.25;
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), angle);
        self.scene.set_rotation(self.spinner, rotation)?;

        for viewport in &self.viewports {
            viewport.clear(&self.window, ClearMask::default(), &mut self.gpu)?;
            viewport.render(&self.window, &self.cameras, &self.scene, &mut self.gpu);
        }

        let commands = self.gpu.take_commands();
        let draws = commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::DrawArrays { .. }))
            .count();
        log::info!(
            "Frame {}: {}x{} window, {} commands, {} draw calls, balanced: {}",
            frame,
            self.window.width,
            self.window.height,
            commands.len(),
            draws,
            self.gpu.is_balanced()
        );
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::info!("Window resized to {}x{}", width, height);
        self.window = WindowExtent::new(width, height);
    }

    /// Cast a ray through the viewport under the cursor
    fn pick(&self, cursor: Vec2) {
        let Some((index, viewport)) = self
            .viewports
            .iter()
            .enumerate()
            .find(|(_, viewport)| viewport.is_point_within_viewport(&self.window, cursor))
        else {
            log::info!("Cursor {:?} is outside every viewport", cursor);
            return;
        };

        match viewport.point_to_ray(&self.window, cursor, &self.cameras, &self.scene) {
            Ok(ray) => log::info!(
                "Viewport {} ray: origin {:?}, direction {:?}",
                index,
                ray.origin,
                ray.direction
            ),
            Err(e) => log::warn!("Viewport {} picking failed: {}", index, e),
        }
    }

    fn remove_camera(&mut self, viewport: usize) {
        let Some(id) = self.viewports.get(viewport).and_then(Viewport::camera) else {
            return;
        };
        if self.cameras.remove(id, &mut self.scene).is_some() {
            log::info!("Removed camera of viewport {}", viewport);
        }
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for frame in 0..3 {
            self.render_frame(frame)?;
        }

        let (width, height) = (self.window.width, self.window.height);
        self.pick(Vec2::new(width as f32 * 0.25, height as f32 * 0.5));
        self.pick(Vec2::new(width as f32 * 0.75, height as f32 * 0.5));

        self.resize(width * 2, height);
        self.render_frame(3)?;
        self.pick(Vec2::new(width as f32 * 1.5, height as f32 * 0.5));

        self.remove_camera(1);
        self.render_frame(4)?;
        self.pick(Vec2::new(width as f32 * 1.5, height as f32 * 0.5));
        Ok(())
    }
}

fn load_config() -> Result<FrameworkConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => FrameworkConfig::load_from_file(path),
        None => Ok(FrameworkConfig::split_screen()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    config.init_logging();

    log::info!("Starting split screen demo");
    let mut app = SplitScreenApp::new(&config)?;
    app.run()?;
    log::info!("Split screen demo finished");
    Ok(())
}
