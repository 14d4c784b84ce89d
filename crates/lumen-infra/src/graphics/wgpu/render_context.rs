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

//! The assembled wgpu renderer: context, resource manager and frame loop.

use std::sync::Arc;

use lumen_core::math::Extent2D;
use lumen_core::platform::window::LumenWindow;
use lumen_core::renderer::api::RenderSettings;
use lumen_core::renderer::traits::GraphicsDevice;
use lumen_core::renderer::{
    FrameOrchestrator, FrameStats, FrameStatus, FrameToken, PresentStatus, RenderError,
    ResourceManager,
};
use lumen_core::scene::{upload_scene, GpuScene, SceneDescription};

use super::context::WgpuGraphicsContext;
use super::culling::GpuCuller;
use super::device::WgpuDevice;
use super::swapchain::{WgpuFrameRecorder, WgpuSwapchain};

/// Owns everything a windowed application needs to render with wgpu.
///
/// Dropping the context without calling [`shutdown`](Self::shutdown) still
/// waits for the GPU and releases every resource, logging any failure.
pub struct WgpuRenderContext {
    graphics: WgpuGraphicsContext,
    device: WgpuDevice,
    resources: ResourceManager,
    frames: FrameOrchestrator<WgpuSwapchain>,
    settings: RenderSettings,
    is_shut_down: bool,
}

impl WgpuRenderContext {
    /// Creates the context for `window`, blocking on adapter and device creation.
    ///
    /// ## Arguments
    /// * `app_name` - Application name, used in labels and logs.
    /// * `engine_name` - Engine name, used in labels and logs.
    /// * `window` - The window to present to.
    /// * `settings` - Renderer configuration.
    ///
    /// # Errors
    ///
    /// * [`RenderError::MissingCapability`] if no adapter satisfies the requirements.
    /// * [`RenderError::InitializationFailed`] for any other bootstrap failure.
    pub fn new(
        app_name: &str,
        engine_name: &str,
        window: &dyn LumenWindow,
        settings: RenderSettings,
    ) -> Result<Self, RenderError> {
        let (graphics, surface) = pollster::block_on(WgpuGraphicsContext::with_surface(
            app_name,
            engine_name,
            window.clone_handle_arc(),
            &settings,
        ))
        .map_err(|e| match e.downcast::<RenderError>() {
            Ok(err) => err,
            Err(e) => {
                log::error!("Failed to initialize the wgpu context: {e:#}");
                RenderError::InitializationFailed(format!("{e:#}"))
            }
        })?;

        let device = graphics.device.clone();
        let swapchain = WgpuSwapchain::new(&graphics, surface, window.inner_extent(), &settings)?;
        let frames = FrameOrchestrator::new(swapchain, settings.fence_timeout());

        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let resources = ResourceManager::new(shared, &settings)?;

        log::info!(
            "WgpuRenderContext ready on \"{}\" with {} frame slots.",
            graphics.adapter_info.name,
            settings.frames_in_flight
        );

        Ok(Self {
            graphics,
            device,
            resources,
            frames,
            settings,
            is_shut_down: false,
        })
    }

    /// Starts a frame. See [`FrameOrchestrator::begin_frame`].
    pub fn begin_frame(&mut self, surface_extent: Extent2D) -> Result<FrameStatus, RenderError> {
        self.frames.begin_frame(surface_extent)
    }

    /// The recording scope of the frame `token` belongs to.
    pub fn recorder(&mut self, token: &FrameToken) -> &mut WgpuFrameRecorder {
        self.frames.recorder(token)
    }

    /// Submits and presents a frame. See [`FrameOrchestrator::end_frame`].
    pub fn end_frame(&mut self, token: FrameToken) -> Result<PresentStatus, RenderError> {
        self.frames.end_frame(token)
    }

    /// Forwards a window resize to the frame loop.
    pub fn notify_resized(&mut self, surface_extent: Extent2D) -> Result<(), RenderError> {
        self.frames.notify_resized(surface_extent)
    }

    /// Uploads a scene description in one transfer session.
    pub fn upload_scene(&mut self, scene: &SceneDescription) -> Result<GpuScene, RenderError> {
        upload_scene(&mut self.resources, scene)
    }

    /// Builds a GPU culler with the configured workgroup size.
    pub fn create_culler(&self) -> GpuCuller {
        GpuCuller::new(&self.device, self.settings.cull_workgroup_size)
    }

    /// The resource manager.
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// The resource manager, mutably.
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    /// The wgpu device wrapper.
    pub fn device(&self) -> &WgpuDevice {
        &self.device
    }

    /// The graphics queue, for overlays that submit their own work.
    pub fn queue(&self) -> &wgpu::Queue {
        self.device.wgpu_queue()
    }

    /// The bootstrap context (instance, adapter, queue assignment).
    pub fn graphics_context(&self) -> &WgpuGraphicsContext {
        &self.graphics
    }

    /// The swapchain image format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.frames.backend().format()
    }

    /// The frame loop.
    pub fn frames(&self) -> &FrameOrchestrator<WgpuSwapchain> {
        &self.frames
    }

    /// Frame counters.
    pub fn stats(&self) -> FrameStats {
        self.frames.stats()
    }

    /// The active settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Waits for the GPU to go idle, then releases every live resource.
    ///
    /// Calling it more than once is a no-op.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.is_shut_down {
            return Ok(());
        }
        self.is_shut_down = true;
        log::info!("WgpuRenderContext shutting down...");
        self.frames.wait_idle()?;
        self.resources.destroy_all()
    }
}

impl Drop for WgpuRenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("WgpuRenderContext: shutdown failed: {e}");
        }
    }
}

impl std::fmt::Debug for WgpuRenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuRenderContext")
            .field("adapter", &self.graphics.adapter_info.name)
            .field("frames", &self.frames.stats())
            .field("resources", &self.resources)
            .finish()
    }
}
