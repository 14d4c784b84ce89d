// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lumen sandbox.
//!
//! Renders a grid of textured cubes with an orbiting camera. Culling runs on
//! the GPU by default; press `C` to switch to host culling with direct draws.

use std::borrow::Cow;
use std::time::Instant;

use anyhow::{anyhow, Result};
use lumen_core::math::{degrees_to_radians, Extent2D, Mat4, Vec3};
use lumen_core::platform::window::LumenWindow;
use lumen_core::renderer::api::{BufferDescriptor, BufferType, RenderSettings};
use lumen_core::renderer::visibility::{
    record_visible_draws, CameraFrame, CullInstance, CullStats, Frustum,
};
use lumen_core::renderer::{BufferHandle, FrameStatus, PresentStatus, RenderError};
use lumen_core::scene::{
    GpuScene, ImagePixels, ImageSource, MaterialData, MeshData, SceneDescription, SceneNode,
    Vertex,
};
use lumen_infra::graphics::wgpu::{BINDLESS_SHADER_PRELUDE, DEPTH_FORMAT};
use lumen_infra::{GpuCuller, WgpuRenderContext, WinitWindow, WinitWindowBuilder};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

const SCENE_SHADER: &str = include_str!("scene.wgsl");

const GRID_SIDE: usize = 15;
const GRID_SPACING: f32 = 3.0;
const FOV_Y_DEGREES: f32 = 60.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 200.0;
const STATS_INTERVAL: u64 = 240;

/// GPU state built once the window and renderer exist.
struct SceneState {
    scene: GpuScene,
    instances: Vec<CullInstance>,
    culler: GpuCuller,
    frame_buffer: BufferHandle,
    pipeline: wgpu::RenderPipeline,
}

struct Sandbox {
    window: Option<WinitWindow>,
    renderer: Option<WgpuRenderContext>,
    state: Option<SceneState>,
    settings: RenderSettings,
    start: Instant,
    gpu_culling: bool,
}

impl Sandbox {
    fn new(settings: RenderSettings) -> Self {
        Self {
            window: None,
            renderer: None,
            state: None,
            settings,
            start: Instant::now(),
            gpu_culling: true,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = WinitWindowBuilder::new()
            .with_title("Lumen Sandbox")
            .with_dimensions(1280, 720)
            .with_min_dimensions(320, 240)
            .build(event_loop)?;

        let mut renderer =
            WgpuRenderContext::new("Lumen Sandbox", "Lumen", &window, self.settings.clone())?;
        let state = build_scene_state(&mut renderer)?;

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.state = Some(state);
        Ok(())
    }

    fn render(&mut self) -> Result<(), RenderError> {
        let (Some(window), Some(renderer), Some(state)) =
            (self.window.as_ref(), self.renderer.as_mut(), self.state.as_mut())
        else {
            return Ok(());
        };

        let extent = window.inner_extent();
        let token = match renderer.begin_frame(extent)? {
            FrameStatus::Ready(token) => token,
            FrameStatus::Skipped(reason) => {
                log::debug!("Frame skipped: {reason:?}");
                return Ok(());
            }
        };

        let (view_proj, frustum) = orbit_camera(self.start.elapsed().as_secs_f32(), extent);
        write_frame_uniforms(renderer, state, &view_proj)?;

        let (vertex_id, index_id) = {
            let resources = renderer.resources();
            let vertex = resources.buffer(state.scene.vertex_buffer).map(|r| r.id);
            let index = resources.buffer(state.scene.index_buffer).map(|r| r.id);
            (vertex, index)
        };
        let (Some(vertex_id), Some(index_id)) = (vertex_id, index_id) else {
            return Err(RenderError::Internal("scene buffers vanished".to_string()));
        };

        let recorder = renderer.recorder(&token);
        if self.gpu_culling {
            if let Some(encoder) = recorder.encoder() {
                state.culler.dispatch(encoder, &frustum);
            }
        }

        let clear = wgpu::Color {
            r: 0.02,
            g: 0.02,
            b: 0.04,
            a: 1.0,
        };
        let stats = match recorder.begin_draw_pass("Sandbox Pass", Some(clear)) {
            Some(mut pass) => {
                pass.set_pipeline(&state.pipeline);
                pass.set_vertex_buffer(0, vertex_id);
                pass.set_index_buffer(index_id);
                if self.gpu_culling {
                    state.culler.draw_indirect(&mut pass);
                    None
                } else {
                    Some(record_visible_draws(&mut pass, &frustum, &state.instances))
                }
            }
            None => None,
        };

        let frame_number = token.frame_number();
        if renderer.end_frame(token)? == PresentStatus::Resized {
            log::info!("Swapchain resized to {}", renderer.frames().extents().swapchain);
        }

        if frame_number % STATS_INTERVAL == 0 {
            let culled = stats.unwrap_or_else(|| CullStats {
                total: state.instances.len(),
                visible: state
                    .instances
                    .iter()
                    .filter(|i| frustum.is_sphere_visible(&i.bounds, &i.transform))
                    .count(),
            });
            log::info!(
                "{} culling: {}/{} visible, {:?}",
                if self.gpu_culling { "GPU" } else { "CPU" },
                culled.visible,
                culled.total,
                renderer.stats()
            );
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let (Some(renderer), Some(state)) = (self.renderer.as_mut(), self.state.take()) {
            if let Err(e) = release_scene(renderer, state) {
                log::error!("Shutdown failed: {e}");
            }
        }
        self.renderer = None;
        self.window = None;
    }
}

impl ApplicationHandler for Sandbox {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        log::info!("Application resumed. Initializing window and renderer...");
        if let Err(e) = self.initialize(event_loop) {
            log::error!("Failed to initialize the sandbox: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(WinitWindow::window_id) != Some(id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Shutdown requested, exiting event loop...");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    let extent = Extent2D::new(size.width, size.height);
                    if let Err(e) = renderer.notify_resized(extent) {
                        log::error!("Resize to {extent} failed: {e}");
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::KeyC),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.gpu_culling = !self.gpu_culling;
                log::info!(
                    "Switched to {} culling",
                    if self.gpu_culling { "GPU" } else { "CPU" }
                );
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    log::error!("Frame failed: {e}");
                    if e.is_fatal() {
                        self.shutdown();
                        event_loop.exit();
                        return;
                    }
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn build_scene_state(renderer: &mut WgpuRenderContext) -> Result<SceneState> {
    let scene = renderer.upload_scene(&grid_scene())?;
    let instances = scene.cull_instances();
    log::info!(
        "Scene uploaded: {} instances, {} uploads, {} staged bytes",
        instances.len(),
        scene.upload.uploads,
        scene.upload.staged_bytes
    );

    let mut culler = renderer.create_culler();
    culler.upload(&instances);

    // View-projection followed by one matrix per instance.
    let matrix_bytes = std::mem::size_of::<[[f32; 4]; 4]>() as u64;
    let frame_buffer = renderer.resources_mut().create_buffer(&BufferDescriptor {
        label: Some(Cow::Borrowed("Sandbox Frame Uniforms")),
        size: matrix_bytes * (1 + instances.len() as u64),
        buffer_type: BufferType::Uniform,
    })?;
    let transforms: Vec<[[f32; 4]; 4]> = instances
        .iter()
        .map(|instance| instance.transform.to_cols_array_2d())
        .collect();
    renderer.resources_mut().upload_to_buffer(
        frame_buffer,
        bytemuck::cast_slice(&transforms),
        matrix_bytes,
    )?;

    let resources = renderer.resources();
    let frame_slot = resources
        .buffer(frame_buffer)
        .and_then(|record| record.bindless)
        .ok_or_else(|| anyhow!("frame uniforms have no bindless slot"))?;
    let checker_slot = scene
        .images
        .first()
        .copied()
        .flatten()
        .and_then(|image| resources.image(image))
        .and_then(|record| record.sampled.first().copied())
        .ok_or_else(|| anyhow!("checker texture has no bindless slot"))?;

    let pipeline = create_pipeline(renderer, frame_slot.index, checker_slot.index)?;
    Ok(SceneState {
        scene,
        instances,
        culler,
        frame_buffer,
        pipeline,
    })
}

fn create_pipeline(
    renderer: &WgpuRenderContext,
    frame_slot: u32,
    checker_slot: u32,
) -> Result<wgpu::RenderPipeline> {
    let device = renderer.device().wgpu_device();
    let source = format!(
        "const FRAME_SLOT: u32 = {frame_slot}u;\nconst CHECKER_SLOT: u32 = {checker_slot}u;\n{BINDLESS_SHADER_PRELUDE}\n{SCENE_SHADER}"
    );
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Sandbox Scene Shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
    });

    let bindless_layout = renderer.device().bindless_layout()?;
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Sandbox Pipeline Layout"),
        bind_group_layouts: &[Some(&bindless_layout)],
        immediate_size: 0,
    });

    let vertex_attributes = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
    ];
    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Sandbox Scene Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &vertex_attributes,
            }],
        },
        primitive: wgpu::PrimitiveState {
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: renderer.surface_format(),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview_mask: None,
        cache: None,
    }))
}

fn release_scene(renderer: &mut WgpuRenderContext, state: SceneState) -> Result<(), RenderError> {
    renderer.resources_mut().destroy_buffer(state.frame_buffer)?;
    state.scene.destroy(renderer.resources_mut())?;
    renderer.shutdown()
}

fn write_frame_uniforms(
    renderer: &mut WgpuRenderContext,
    state: &SceneState,
    view_proj: &Mat4,
) -> Result<(), RenderError> {
    let matrix = view_proj.to_cols_array_2d();
    renderer
        .resources_mut()
        .upload_to_buffer(state.frame_buffer, bytemuck::bytes_of(&matrix), 0)
}

/// Camera circling the grid; returns the view-projection matrix and frustum.
fn orbit_camera(seconds: f32, extent: Extent2D) -> (Mat4, Frustum) {
    let angle = seconds * 0.2;
    let eye = Vec3::new(angle.sin() * 18.0, 8.0, angle.cos() * 18.0);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).unwrap_or(Mat4::IDENTITY);

    let fov_y = degrees_to_radians(FOV_Y_DEGREES);
    let aspect = extent.aspect_ratio();
    let projection = Mat4::perspective_rh_zo(fov_y, aspect, Z_NEAR, Z_FAR);
    let camera = CameraFrame::from_view_matrix(&view, fov_y, aspect, Z_NEAR, Z_FAR);
    (projection * view, Frustum::from_camera(&camera))
}

/// A unit cube with per-face normals and UVs.
fn cube_mesh() -> MeshData {
    // (normal, u axis, v axis) per face.
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = [
                normal[0] * 0.5 + u[0] * su + v[0] * sv,
                normal[1] * 0.5 + u[1] * su + v[1] * sv,
                normal[2] * 0.5 + u[2] * su + v[2] * sv,
            ];
            vertices.push(Vertex::new(position, normal, [su + 0.5, 0.5 - sv]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData {
        name: "cube".to_string(),
        vertices,
        indices,
        material: Some(0),
    }
}

fn checker_pixels(size: u32) -> ImagePixels {
    let mut rgba8 = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let shade = if (x / 8 + y / 8) % 2 == 0 { 230 } else { 60 };
            rgba8.extend_from_slice(&[shade, shade, shade, 255]);
        }
    }
    ImagePixels {
        width: size,
        height: size,
        rgba8,
    }
}

/// A root node with a `GRID_SIDE` x `GRID_SIDE` grid of cubes as children.
fn grid_scene() -> SceneDescription {
    let half = (GRID_SIDE as f32 - 1.0) * GRID_SPACING * 0.5;
    let mut nodes = vec![SceneNode {
        name: "grid".to_string(),
        ..Default::default()
    }];
    for row in 0..GRID_SIDE {
        for column in 0..GRID_SIDE {
            let position = Vec3::new(
                column as f32 * GRID_SPACING - half,
                0.0,
                row as f32 * GRID_SPACING - half,
            );
            let turn = degrees_to_radians(((row * GRID_SIDE + column) * 17 % 90) as f32);
            nodes.push(SceneNode {
                name: format!("cube {row}x{column}"),
                local_transform: Mat4::from_translation(position) * Mat4::from_rotation_y(turn),
                mesh: Some(0),
                children: Vec::new(),
            });
        }
    }
    nodes[0].children = (1..nodes.len()).collect();

    SceneDescription {
        meshes: vec![cube_mesh()],
        materials: vec![MaterialData {
            name: "checker".to_string(),
            base_color: [1.0; 4],
            base_color_texture: Some(0),
        }],
        images: vec![ImageSource {
            uri: "generated://checker".to_string(),
            pixels: Some(checker_pixels(64)),
        }],
        nodes,
        roots: vec![0],
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = Sandbox::new(RenderSettings::default());
    event_loop.run_app(&mut app)?;
    app.shutdown();
    Ok(())
}
