use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use wgpu::util::DeviceExt;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::PhysicalKey,
    window::Window,
};

use crate::config::ViewerConfig;
use crate::gpu::{texture::Texture, GpuContext};
use crate::pdf::{import, PdfError, PdfiumEngine};
use crate::ui::{action_for_key, NavBar, UiAction};
use crate::viewer::{Frame, Viewer};

const APP_TITLE: &str = "visorpdf";
const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 10.0;
// Píxeles de movimiento a partir de los cuales un click pasa a ser arrastre
const DRAG_THRESHOLD: f64 = 4.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    tex_coords: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    scale: [f32; 2],
    translation: [f32; 2],
}

const VERTICES: &[Vertex] = &[
    Vertex { position: [-1.0, 1.0, 0.0], tex_coords: [0.0, 0.0] },
    Vertex { position: [-1.0, -1.0, 0.0], tex_coords: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0, 0.0], tex_coords: [1.0, 1.0] },
    Vertex { position: [1.0, 1.0, 0.0], tex_coords: [1.0, 0.0] },
];

const INDICES: &[u16] = &[0, 1, 2, 2, 3, 0];

/// Escala del quad (-1..1) para que la página conserve su aspecto dentro de la ventana.
fn fit_scale(page_width: u32, page_height: u32, win_width: u32, win_height: u32) -> [f32; 2] {
    if page_width == 0 || page_height == 0 || win_width == 0 || win_height == 0 {
        return [1.0, 1.0];
    }
    let page_aspect = page_width as f32 / page_height as f32;
    let win_aspect = win_width as f32 / win_height as f32;
    if page_aspect > win_aspect {
        [1.0, win_aspect / page_aspect]
    } else {
        [page_aspect / win_aspect, 1.0]
    }
}

/// Píxel de ventana → píxel del bitmap mostrado, deshaciendo la cámara.
fn window_to_bitmap(
    cursor: (f64, f64),
    window: (u32, u32),
    camera: &CameraUniform,
    bitmap: (u32, u32),
) -> Option<(f64, f64)> {
    let (win_width, win_height) = (f64::from(window.0), f64::from(window.1));
    if win_width <= 0.0 || win_height <= 0.0 || camera.scale[0] == 0.0 || camera.scale[1] == 0.0 {
        return None;
    }
    let ndc_x = cursor.0 / win_width * 2.0 - 1.0;
    let ndc_y = 1.0 - cursor.1 / win_height * 2.0;
    let quad_x = (ndc_x - f64::from(camera.translation[0])) / f64::from(camera.scale[0]);
    let quad_y = (ndc_y - f64::from(camera.translation[1])) / f64::from(camera.scale[1]);
    let u = (quad_x + 1.0) * 0.5;
    let v = (1.0 - quad_y) * 0.5;
    if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
        return None;
    }
    Some((u * f64::from(bitmap.0), v * f64::from(bitmap.1)))
}

fn describe(err: &PdfError) -> String {
    err.load_message().map(|m| m.into_owned()).unwrap_or_else(|| err.to_string())
}

struct PageTexture {
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

pub struct State<'a> {
    window: Arc<Window>,
    gpu: GpuContext,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,

    texture_layout: wgpu::BindGroupLayout,
    page: Option<PageTexture>,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    camera_uniform: CameraUniform,
    zoom: f32,
    pan: [f32; 2],

    viewer: Viewer<PdfiumEngine<'a>>,
    nav: NavBar,
    cache_dir: PathBuf,

    mouse_pressed: bool,
    dragged: bool,
    press_pos: PhysicalPosition<f64>,
    cursor: PhysicalPosition<f64>,
}

impl<'a> State<'a> {
    pub async fn new(
        window: Arc<Window>,
        mut viewer: Viewer<PdfiumEngine<'a>>,
        config: &ViewerConfig,
    ) -> anyhow::Result<State<'a>> {
        let gpu = GpuContext::new(window.clone()).await?;
        viewer.set_surface_size(gpu.size.width as i32, gpu.size.height as i32);

        let texture_layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("Page BG Layout"),
        });

        let camera_uniform = CameraUniform { scale: [1.0, 1.0], translation: [0.0, 0.0] };
        let camera_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("Camera BG Layout"),
        });

        let camera_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() }],
            label: Some("Camera BG"),
        });

        let shader = gpu.device.create_shader_module(wgpu::include_wgsl!("../assets/shaders/shader.wgsl"));
        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pipeline Layout"),
            bind_group_layouts: &[&texture_layout, &camera_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vertex_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut state = Self {
            window,
            gpu,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            num_indices: INDICES.len() as u32,
            texture_layout,
            page: None,
            camera_buffer,
            camera_bind_group,
            camera_uniform,
            zoom: 1.0,
            pan: [0.0, 0.0],
            viewer,
            nav: NavBar::default(),
            cache_dir: config.cache_dir.clone(),
            mouse_pressed: false,
            dragged: false,
            press_pos: PhysicalPosition::new(0.0, 0.0),
            cursor: PhysicalPosition::new(0.0, 0.0),
        };

        match &config.file {
            Some(path) => {
                state.open(path, config.password.as_deref());
                if config.start_page > 0 {
                    match state.viewer.go_to(config.start_page) {
                        Some(result) => state.present(result),
                        None => warn!("start page {} is out of range", config.start_page + 1),
                    }
                }
            }
            None => state.window.set_title(&format!("{APP_TITLE} - drop a PDF file here")),
        }

        Ok(state)
    }

    // --- DOCUMENTO ---

    fn open(&mut self, path: &Path, password: Option<&str>) {
        info!("opening {}", path.display());
        self.zoom = 1.0;
        self.pan = [0.0, 0.0];
        let result = self.viewer.load(path, password);
        self.present(result);
    }

    fn open_dropped(&mut self, path: &Path) {
        // La copia pisa el archivo anterior, que PDFium no debe tener abierto
        self.viewer.close();
        self.page = None;
        match import::stage_file(path, &self.cache_dir) {
            Ok(staged) => self.open(&staged, None),
            Err(err) => {
                error!("failed to stage {}: {err}", path.display());
                self.window.set_title(&format!("{APP_TITLE} - cannot read {}", path.display()));
            }
        }
    }

    fn apply(&mut self, action: UiAction) {
        let result = match action {
            UiAction::PreviousPage => self.viewer.previous_page(),
            UiAction::NextPage => self.viewer.next_page(),
            UiAction::FirstPage => self.viewer.first_page(),
            UiAction::LastPage => self.viewer.last_page(),
        };
        if let Some(result) = result {
            self.present(result);
        }
    }

    fn present(&mut self, result: Result<Frame, PdfError>) {
        match result {
            Ok(frame) => {
                self.upload(&frame);
                self.window.set_title(&format!("{APP_TITLE} - {}", frame.status.replace('\n', ", ")));
            }
            Err(err) => {
                let message = describe(&err);
                error!("{err}");
                self.window.set_title(&format!("{APP_TITLE} - {message}"));
            }
        }
    }

    /// Sube el frame a la GPU; la textura se recrea solo si cambia de tamaño.
    fn upload(&mut self, frame: &Frame) {
        let rgba = frame.page.to_rgba_image().into_raw();
        if let Some(page) = &self.page {
            if page.texture.width == frame.page.width && page.texture.height == frame.page.height {
                page.texture.write(&self.gpu.queue, &rgba);
                return;
            }
        }

        let texture = match Texture::from_rgba(
            &self.gpu.device,
            &self.gpu.queue,
            &rgba,
            frame.page.width,
            frame.page.height,
            Some("Page"),
        ) {
            Ok(texture) => texture,
            Err(err) => {
                error!("failed to upload page texture: {err:#}");
                return;
            }
        };
        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&texture.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&texture.sampler) },
            ],
            label: Some("Page BG"),
        });
        self.page = Some(PageTexture { texture, bind_group });
    }

    fn page_click(&self, position: PhysicalPosition<f64>) {
        let Some(page) = &self.page else { return };
        let bitmap = (page.texture.width, page.texture.height);
        let window = (self.gpu.size.width, self.gpu.size.height);
        let point = window_to_bitmap((position.x, position.y), window, &self.camera_uniform, bitmap)
            .and_then(|(x, y)| self.viewer.page_point_at(x, y));
        if let Some((x, y)) = point {
            info!("page {} at ({x:.2}, {y:.2}) pts", self.viewer.current_page() + 1);
        }
    }

    // --- VENTANA ---

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.gpu.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.viewer.set_surface_size(new_size.width as i32, new_size.height as i32);
        if self.viewer.session().is_open() && new_size.width > 0 && new_size.height > 0 {
            let result = self.viewer.render_current();
            self.present(result);
        }
    }

    pub fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                let pressed = *state == ElementState::Pressed;
                if pressed {
                    self.press_pos = self.cursor;
                    self.dragged = false;
                } else if self.mouse_pressed && !self.dragged {
                    let size = self.gpu.size;
                    let (x, y) = (self.cursor.x, self.cursor.y);
                    match self.nav.hit_test(x, y, f64::from(size.width), f64::from(size.height)) {
                        Some(action) => self.apply(action),
                        None => self.page_click(self.cursor),
                    }
                }
                self.mouse_pressed = pressed;
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let size = self.gpu.size;
                if self.mouse_pressed && size.width > 0 && size.height > 0 {
                    let dx = (position.x - self.cursor.x) / f64::from(size.width) * 2.0;
                    let dy = -(position.y - self.cursor.y) / f64::from(size.height) * 2.0;
                    self.pan[0] += dx as f32;
                    self.pan[1] += dy as f32;
                    let moved = (position.x - self.press_pos.x).hypot(position.y - self.press_pos.y);
                    self.dragged |= moved > DRAG_THRESHOLD;
                }
                self.cursor = *position;
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y * 0.1,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.001,
                };
                self.zoom = (self.zoom + scroll).clamp(MIN_ZOOM, MAX_ZOOM);
                true
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { state: ElementState::Pressed, physical_key: PhysicalKey::Code(keycode), .. },
                ..
            } => match action_for_key(*keycode) {
                Some(action) => {
                    self.apply(action);
                    true
                }
                None => false,
            },
            WindowEvent::DroppedFile(path) => {
                self.open_dropped(path);
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self) {
        let [sx, sy] = match &self.page {
            Some(page) => fit_scale(page.texture.width, page.texture.height, self.gpu.size.width, self.gpu.size.height),
            None => [1.0, 1.0],
        };
        self.camera_uniform.scale = [sx * self.zoom, sy * self.zoom];
        self.camera_uniform.translation = self.pan;
        self.gpu.queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Render Encoder") });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r: 0.05, g: 0.05, b: 0.08, a: 1.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            // Sin documento solo queda el fondo
            if let Some(page) = &self.page {
                render_pass.set_pipeline(&self.render_pipeline);
                render_pass.set_bind_group(0, &page.bind_group, &[]);
                render_pass.set_bind_group(1, &self.camera_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..self.num_indices, 0, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
