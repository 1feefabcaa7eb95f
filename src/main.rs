use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use visorpdf::config::{Args, ViewerConfig};
use visorpdf::pdf::{DocumentSession, PdfSystem, PdfiumEngine, RenderFlags};
use visorpdf::state::State;
use visorpdf::viewer::Viewer;
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = ViewerConfig::from_args(Args::parse());

    // Una sola instancia de PDFium para todo el proceso
    let pdf_system = PdfSystem::init(config.pdfium_dir.as_deref()).context("failed to bind PDFium")?;

    let result = match (&config.export, &config.file) {
        (Some(output), Some(file)) => export(&pdf_system, &config, file, output),
        _ => run_window(&pdf_system, &config),
    };

    pdf_system.shutdown();
    result
}

fn new_session<'a>(pdf_system: &'a PdfSystem, config: &ViewerConfig) -> DocumentSession<PdfiumEngine<'a>> {
    let mut session = DocumentSession::new(pdf_system.engine());
    let mut options = *session.render_options();
    options.flags.set(RenderFlags::GRAYSCALE, config.grayscale);
    session.set_render_options(options);
    session
}

/// Renderiza una página a PNG sin abrir ventana.
fn export(pdf_system: &PdfSystem, config: &ViewerConfig, file: &Path, output: &Path) -> anyhow::Result<()> {
    let mut session = new_session(pdf_system, config);
    session
        .open_with_password(file, config.password.as_deref())
        .with_context(|| format!("cannot open {}", file.display()))?;

    let (width, height) = config.fallback_viewport;
    let page = session.render_page(config.start_page, width, height)?;
    page.save_png(output).with_context(|| format!("cannot write {}", output.display()))?;
    info!("page {} written to {} ({}x{})", config.start_page + 1, output.display(), page.width, page.height);
    Ok(())
}

fn run_window(pdf_system: &PdfSystem, config: &ViewerConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("visorpdf")
            .with_inner_size(winit::dpi::PhysicalSize::new(1200, 800))
            .with_decorations(true)
            .build(&event_loop)?,
    );

    let viewer = Viewer::new(new_session(pdf_system, config), config.fallback_viewport);
    let mut state = pollster::block_on(State::new(window, viewer, config))?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == state.window().id() => {
            if !state.input(event) {
                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => elwt.exit(),

                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }

                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => state.resize(state.size()),
                            Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                            Err(e) => warn!("{e:?}"),
                        }
                    }
                    _ => {}
                }
            }
        }
        Event::AboutToWait => {
            state.window().request_redraw();
        }
        _ => {}
    })?;

    Ok(())
}
