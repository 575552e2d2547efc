//! Windowed playback: a winit event loop driving the guest against an
//! OpenGL 3.3 core context.

use std::{
    num::NonZeroU32,
    time::{Duration, Instant},
};

use color_eyre::eyre::{Report, Result, eyre};
use glutin::{
    config::{ConfigTemplateBuilder, GlConfig},
    context::{
        ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SwapInterval, WindowSurface},
};
use glutin_winit::DisplayBuilder;
use palcon_host::{FileStore, Session};
use palcon_screen::{GlScreen, GlslVersion};
use raw_window_handle::HasWindowHandle;
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use crate::cli::Cli;

/// Guest frames tick at a fixed 30 fps.
const FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// Runs the guest in a window until close or failure.
pub fn run(cli: &Cli, wasm: Vec<u8>, files: FileStore) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App {
        cli,
        wasm,
        files: Some(files),
        state: None,
        error: None,
    };
    event_loop.run_app(&mut app)?;

    // Release GPU resources while the context is still current.
    if let Some(state) = app.state {
        state.session.into_screen().delete();
    }

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App<'a> {
    cli: &'a Cli,
    wasm: Vec<u8>,
    files: Option<FileStore>,
    state: Option<AppState>,
    error: Option<Report>,
}

struct AppState {
    window: Window,
    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
    session: Session<GlScreen>,
    next_frame: Instant,
}

impl App<'_> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Report) {
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }
        let Some(files) = self.files.take() else {
            return;
        };

        match build_state(self.cli, &self.wasm, files, event_loop) {
            Ok(state) => self.state = Some(state),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                event_loop.exit();
            },
            WindowEvent::Resized(new_size) => {
                let (Some(w), Some(h)) = (
                    NonZeroU32::new(new_size.width),
                    NonZeroU32::new(new_size.height),
                ) else {
                    return;
                };
                debug!(width = new_size.width, height = new_size.height, "window resized");
                state.gl_surface.resize(&state.gl_context, w, h);
                state
                    .session
                    .screen_mut()
                    .set_viewport(new_size.width, new_size.height);
                state.window.request_redraw();
            },
            WindowEvent::RedrawRequested => {
                if let Err(err) = state.session.render_frame() {
                    self.fail(event_loop, err.into());
                    return;
                }
                if let Err(err) = state.gl_surface.swap_buffers(&state.gl_context) {
                    self.fail(event_loop, err.into());
                }
            },
            _ => {},
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let now = Instant::now();
        if now >= state.next_frame {
            // keep the cadence even after a long frame
            while state.next_frame <= now {
                state.next_frame += FRAME_INTERVAL;
            }
            state.window.request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(state.next_frame));
    }
}

fn build_state(
    cli: &Cli,
    wasm: &[u8],
    files: FileStore,
    event_loop: &ActiveEventLoop,
) -> Result<AppState> {
    let window_attrs = WindowAttributes::default()
        .with_title("palcon")
        .with_inner_size(LogicalSize::new(cli.width * cli.scale, cli.height * cli.scale));

    let config_template = ConfigTemplateBuilder::new().with_alpha_size(8);

    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(window_attrs))
        .build(event_loop, config_template, |configs| {
            configs
                .reduce(|accum, config| {
                    if config.num_samples() > accum.num_samples() { config } else { accum }
                })
                .unwrap()
        })
        .map_err(|e| eyre!("failed to build display: {e}"))?;

    let window = window.ok_or_else(|| eyre!("no window was created"))?;
    let gl_display = gl_config.display();

    // Request OpenGL 3.3 Core
    let context_attrs = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(window.window_handle()?.into()));

    let not_current_context = unsafe { gl_display.create_context(&gl_config, &context_attrs) }?;

    let size = window.inner_size();
    let (surface_w, surface_h) = (
        NonZeroU32::new(size.width).ok_or_else(|| eyre!("window surface has zero width"))?,
        NonZeroU32::new(size.height).ok_or_else(|| eyre!("window surface has zero height"))?,
    );
    let surface_attrs = glutin::surface::SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window.window_handle()?.into(),
        surface_w,
        surface_h,
    );

    let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attrs) }?;
    let gl_context = not_current_context.make_current(&gl_surface)?;

    // Try vsync, but don't fail if unsupported
    let _ = gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN));

    // Create glow context from glutin's GL loader
    let gl = unsafe {
        glow::Context::from_loader_function_cstr(|name| gl_display.get_proc_address(name))
    };

    let mut screen = GlScreen::new(gl, cli.width, cli.height, GlslVersion::Gl330)?;
    screen.set_viewport(size.width, size.height);

    let mut session = Session::new(wasm, screen, files)?;
    session.init()?;

    if let Some(name) = &cli.load {
        if !session.load_file(name)? {
            warn!(name = %name, "guest rejected the file");
        }
    }

    info!(
        width = cli.width,
        height = cli.height,
        scale = cli.scale,
        "window up, guest running"
    );

    Ok(AppState {
        window,
        gl_context,
        gl_surface,
        session,
        next_frame: Instant::now(),
    })
}
