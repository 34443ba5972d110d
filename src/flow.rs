//! Frame driving and the application event loop.
//!
//! All scene state is mutated on the event loop thread. Asset requests run on
//! tokio natively and on the browser's local executor on the web; each one
//! posts its result back to the loop as a [`FlowEvent`] where it is inserted
//! by [`SceneContext::insert_outcome`].
//!
//! # Frame order
//!
//! [`FrameDriver::frame`] runs once per redraw:
//! 1. camera orbit controls
//! 2. active vehicle movement
//! 3. animation mixers
//! 4. video screen refresh
//! 5. particle effects
//! 6. registered animators (bobbing, neon cycle)
//! 7. one draw through the [`DrawTarget`]

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{DeviceEvent, DeviceId, ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::Key,
    window::Window,
};

use crate::{
    config::SceneDefinition,
    render::Renderer,
    resources::{AssetLoader, FetchSource, LoadOutcome, TextureOutcome},
    scene::SceneContext,
    ui::{UiCommand, UiSurface},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Whatever presents the scene at the end of a frame.
pub trait DrawTarget {
    fn draw(&mut self, scene: &mut SceneContext) -> anyhow::Result<()>;
}

/// Runs the per-frame update steps in a fixed order until stopped.
#[derive(Debug)]
pub struct FrameDriver {
    running: bool,
    frames: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            running: true,
            frames: 0,
        }
    }

    /// After this every call to [`Self::frame`] does nothing.
    pub fn stop(&mut self) {
        if self.running {
            log::info!("frame driver stopped after {} frames", self.frames);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns `Ok(false)` once stopped.
    pub fn frame(&mut self, scene: &mut SceneContext, target: &mut dyn DrawTarget, dt: Duration) -> anyhow::Result<bool> {
        if !self.running {
            return Ok(false);
        }
        self.frames += 1;

        scene.rig.controls.update(&mut scene.rig.camera, dt);

        if let Some(transform) = scene
            .vehicles
            .active()
            .and_then(|id| scene.registry.transform_mut(id))
        {
            scene.vehicle.apply(transform);
        }

        if let Some(door) = &mut scene.door {
            door.mixer.update(&mut scene.registry, dt);
        }

        if let Some(video) = &mut scene.video {
            video.refresh(&mut scene.registry);
        }

        for effect in scene.registry.particles_mut() {
            effect.tick();
        }

        for animator in &mut scene.animators {
            animator.tick(&mut scene.registry, dt);
        }

        target.draw(scene)?;
        log::trace!("frame {} took {:?}", self.frames, dt);
        Ok(true)
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) enum FlowEvent {
    /// The GPU finished initialising (web only; native blocks on it).
    #[allow(dead_code)]
    Initialized(Renderer),
    Loaded(LoadOutcome),
    Texture(TextureOutcome),
}

impl std::fmt::Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Loaded(outcome) => f.debug_tuple("Loaded").field(&outcome.record.asset).finish(),
            Self::Texture(outcome) => f.debug_tuple("Texture").field(&outcome.primitive).finish(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn(async_runtime: &tokio::runtime::Runtime, fut: impl Future<Output = ()> + Send + 'static) {
    async_runtime.spawn(fut);
}

#[cfg(target_arch = "wasm32")]
fn spawn(fut: impl Future<Output = ()> + 'static) {
    wasm_bindgen_futures::spawn_local(fut);
}

fn send(proxy: &EventLoopProxy<FlowEvent>, event: FlowEvent) {
    if let Err(err) = proxy.send_event(event) {
        log::warn!("event loop closed before {:?} was delivered", err.0);
    }
}

pub(crate) struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    definition: Option<SceneDefinition>,
    window: Option<Arc<Window>>,
    scene: Option<SceneContext>,
    renderer: Option<Renderer>,
    ui: Box<dyn UiSurface>,
    driver: FrameDriver,
    last_time: Instant,
    cursor: PhysicalPosition<f64>,
    rotating: bool,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, definition: SceneDefinition, ui: Box<dyn UiSurface>) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            definition: Some(definition),
            window: None,
            scene: None,
            renderer: None,
            ui,
            driver: FrameDriver::new(),
            last_time: Instant::now(),
            cursor: PhysicalPosition::new(0.0, 0.0),
            rotating: false,
        })
    }

    fn apply(&mut self, commands: Vec<UiCommand>) {
        for command in &commands {
            self.ui.apply(command);
        }
    }

    /// Issues every placement and texture request at once.
    fn request_assets(&self, scene: &SceneContext) {
        let loader = AssetLoader::new(Arc::new(FetchSource::new()));
        for fut in loader.placements(&scene.definition.placements) {
            let proxy = self.proxy.clone();
            spawn(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                async move { send(&proxy, FlowEvent::Loaded(fut.await)) },
            );
        }
        for fut in loader.textures(scene.texture_requests()) {
            let proxy = self.proxy.clone();
            spawn(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                async move { send(&proxy, FlowEvent::Texture(fut.await)) },
            );
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(width, height);
        }
        if let Some(scene) = &mut self.scene {
            let commands = scene.resize(width, height);
            self.apply(commands);
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("room-scene");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            // touches drive picking, not page scroll or pinch zoom
            canvas.set_attribute("style", "touch-action:none;").unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes
                .with_canvas(Some(html_canvas_element))
                .with_prevent_default(true);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let Some(definition) = self.definition.take() else {
            return;
        };
        let size = window.inner_size();
        let sky = definition.sky.color;
        let scene = SceneContext::new(definition, size.width.max(1), size.height.max(1));
        self.request_assets(&scene);
        self.scene = Some(scene);

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(Renderer::new(window.clone(), sky)) {
                Ok(renderer) => {
                    self.renderer = Some(renderer);
                    self.resize(size.width, size.height);
                }
                Err(e) => {
                    log::error!("GPU initialisation failed: {}", e);
                    event_loop.exit();
                    return;
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let window = window.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Renderer::new(window, sky).await {
                    Ok(renderer) => send(&proxy, FlowEvent::Initialized(renderer)),
                    Err(e) => log::error!("GPU initialisation failed: {}", e),
                }
            });
        }

        window.request_redraw();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Initialized(renderer) => {
                self.renderer = Some(renderer);
                if let Some(window) = self.window.clone() {
                    let size = window.inner_size();
                    self.resize(size.width, size.height);
                    window.request_redraw();
                }
            }
            FlowEvent::Loaded(outcome) => {
                if let Some(scene) = &mut self.scene {
                    scene.insert_outcome(outcome);
                }
            }
            FlowEvent::Texture(outcome) => {
                if let Some(scene) = &mut self.scene {
                    scene.apply_texture(outcome);
                }
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let (Some(scene), Some(window)) = (&mut self.scene, &self.window) else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.rotating {
                scene.rig.controls.rotate(dx, dy, window.inner_size().height);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: winit::window::WindowId, event: WindowEvent) {
        let Some(scene) = &mut self.scene else {
            return;
        };

        let commands = match event {
            WindowEvent::CloseRequested => {
                self.driver.stop();
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(size) => {
                self.resize(size.width, size.height);
                return;
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                if self.ui.take_dismissed() {
                    scene.input.overlay_dismissed();
                }
                if let Some(renderer) = &mut self.renderer {
                    if let Err(e) = self.driver.frame(scene, renderer, dt) {
                        log::error!("Unable to render {}", e);
                    }
                }
                if self.driver.is_running() {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                return;
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                scene.pointer_moved(position.x, position.y)
            }
            WindowEvent::MouseInput { state, button, .. } => match (button, state) {
                (MouseButton::Left, ElementState::Pressed) => scene.clicked(self.cursor.x, self.cursor.y),
                (MouseButton::Right, state) => {
                    self.rotating = state.is_pressed();
                    return;
                }
                _ => return,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 100.0) as f32,
                };
                scene.rig.controls.zoom(lines);
                return;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.repeat {
                    return;
                }
                match &event.logical_key {
                    Key::Character(key) => scene.key(&key.to_lowercase(), event.state.is_pressed()),
                    _ => return,
                }
            }
            WindowEvent::Touch(touch) => {
                self.cursor = touch.location;
                scene.touch(touch.phase, touch.location.x, touch.location.y)
            }
            _ => return,
        };
        self.apply(commands);
    }
}

/// Opens a window and runs `definition` until the window closes.
pub fn run(definition: SceneDefinition) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    #[cfg(not(target_arch = "wasm32"))]
    let ui: Box<dyn UiSurface> = Box::new(crate::ui::LogSurface::default());
    #[cfg(target_arch = "wasm32")]
    let ui: Box<dyn UiSurface> =
        Box::new(crate::ui::DomSurface::new().map_err(|e| anyhow::anyhow!("{:?}", e))?);

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, definition, ui)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    let definition = SceneDefinition::builtin().map_err(|e| JsValue::from_str(&e.to_string()))?;
    run(definition).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(usize);

    impl DrawTarget for Counter {
        fn draw(&mut self, _scene: &mut SceneContext) -> anyhow::Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn stopped_driver_skips_frames() {
        let mut scene = SceneContext::new(SceneDefinition::default(), 640, 480);
        let mut driver = FrameDriver::new();
        let mut target = Counter(0);
        assert!(driver.frame(&mut scene, &mut target, Duration::from_millis(16)).unwrap());
        driver.stop();
        assert!(!driver.frame(&mut scene, &mut target, Duration::from_millis(16)).unwrap());
        assert_eq!(target.0, 1);
        assert_eq!(driver.frames(), 1);
    }
}
