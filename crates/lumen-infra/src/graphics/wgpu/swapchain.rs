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

//! The wgpu frame backend: surface, frame slots and per-frame targets.

use std::time::Duration;

use lumen_core::math::Extent2D;
use lumen_core::renderer::api::{ImageFormat, RenderSettings};
use lumen_core::renderer::traits::{
    AcquireOutcome, FenceStatus, FrameBackend, PresentOutcome, TargetExtents,
};
use lumen_core::renderer::RenderError;

use super::command::WgpuDrawPass;
use super::context::WgpuGraphicsContext;
use super::conversions::{from_wgpu_texture_format, IntoWgpu};
use super::device::WgpuDevice;

/// Format of the shared depth target.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The command recording scope of one frame slot.
///
/// Only populated between the orchestrator's `begin_frame` and `end_frame`;
/// outside that window every accessor returns `None`.
#[derive(Debug)]
pub struct WgpuFrameRecorder {
    device: WgpuDevice,
    encoder: Option<wgpu::CommandEncoder>,
    color_view: Option<wgpu::TextureView>,
    depth_view: Option<wgpu::TextureView>,
    bind_group: Option<wgpu::BindGroup>,
    color_format: wgpu::TextureFormat,
    extent: Extent2D,
}

impl WgpuFrameRecorder {
    fn new(device: WgpuDevice, color_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            encoder: None,
            color_view: None,
            depth_view: None,
            bind_group: None,
            color_format,
            extent: Extent2D::default(),
        }
    }

    /// The slot's command encoder.
    pub fn encoder(&mut self) -> Option<&mut wgpu::CommandEncoder> {
        self.encoder.as_mut()
    }

    /// The view draws should target this frame.
    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.color_view.as_ref()
    }

    /// The shared depth target.
    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth_view.as_ref()
    }

    /// Format of [`color_view`](Self::color_view), needed to build pipelines.
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Extent of the color and depth targets.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// The bindless bind group captured when the frame began.
    pub fn bindless_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    /// Opens a render pass over the color and depth targets with the bindless
    /// group bound at index 0.
    ///
    /// ## Arguments
    /// * `label` - Debug label of the pass.
    /// * `clear_color` - Clears color and depth when set, loads both otherwise.
    ///
    /// ## Returns
    /// `None` if the slot is not recording.
    pub fn begin_draw_pass(
        &mut self,
        label: &str,
        clear_color: Option<wgpu::Color>,
    ) -> Option<WgpuDrawPass<'_>> {
        let encoder = self.encoder.as_mut()?;
        let color_view = self.color_view.as_ref()?;
        let depth_view = self.depth_view.as_ref()?;

        let (color_load, depth_load) = match clear_color {
            Some(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        if let Some(bind_group) = self.bind_group.as_ref() {
            pass.set_bind_group(0, bind_group, &[]);
        }

        Some(WgpuDrawPass {
            pass,
            device: &self.device,
        })
    }

    fn clear(&mut self) {
        self.encoder = None;
        self.color_view = None;
        self.depth_view = None;
        self.bind_group = None;
    }
}

#[derive(Debug)]
struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent2D,
}

impl RenderTarget {
    fn new(
        device: &wgpu::Device,
        label: &str,
        extent: Extent2D,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent.into_wgpu(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            extent,
        }
    }
}

#[derive(Debug)]
struct FrameSlot {
    last_submission: Option<wgpu::SubmissionIndex>,
    surface_texture: Option<wgpu::SurfaceTexture>,
    recorder: WgpuFrameRecorder,
}

/// The wgpu swapchain: surface configuration, the shared render and depth
/// targets, and one [`FrameSlot`] per frame in flight.
///
/// A slot's fence is the submission index of its last submit. Acquire and
/// present semaphores are handled by wgpu.
#[derive(Debug)]
pub struct WgpuSwapchain {
    device: WgpuDevice,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    copy_to_surface: bool,
    render_target: Option<RenderTarget>,
    depth_target: RenderTarget,
    slots: Vec<FrameSlot>,
}

impl WgpuSwapchain {
    /// Configures `surface` and creates the frame targets.
    ///
    /// ## Arguments
    /// * `context` - The context whose adapter and device drive the surface.
    /// * `surface` - The surface created alongside the context.
    /// * `extent` - The current drawable size of the window.
    /// * `settings` - Frames in flight, present mode and offscreen target toggle.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MissingCapability`] if the surface reports no formats.
    pub fn new(
        context: &WgpuGraphicsContext,
        surface: wgpu::Surface<'static>,
        extent: Extent2D,
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        let device = context.device.clone();
        let caps = surface.get_capabilities(&context.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                RenderError::MissingCapability("surface reports no formats".to_string())
            })?;

        let preferred: wgpu::PresentMode = settings.present_mode.into_wgpu();
        let present_mode = if caps.present_modes.contains(&preferred) {
            preferred
        } else {
            // Fifo is guaranteed to be supported
            wgpu::PresentMode::Fifo
        };

        let copy_to_surface = settings.offscreen_render_target
            && caps.usages.contains(wgpu::TextureUsages::COPY_DST);
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if copy_to_surface {
            usage |= wgpu::TextureUsages::COPY_DST;
        }

        let slot_count = settings.frames_in_flight.max(1);
        let config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width: extent.width.max(1),
            height: extent.height.max(1),
            present_mode,
            desired_maximum_frame_latency: slot_count as u32,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(device.wgpu_device(), &config);

        let target_extent = Extent2D::new(config.width, config.height);
        let (render_target, depth_target) =
            Self::create_targets(&device, target_extent, format, copy_to_surface);

        let slots = (0..slot_count)
            .map(|_| FrameSlot {
                last_submission: None,
                surface_texture: None,
                recorder: WgpuFrameRecorder::new(device.clone(), format),
            })
            .collect();

        log::info!(
            "Swapchain configured: {target_extent} {format:?}, {present_mode:?}, {slot_count} frame slots, {}",
            if copy_to_surface {
                "offscreen render target"
            } else {
                "direct to surface"
            }
        );

        Ok(Self {
            device,
            surface,
            config,
            copy_to_surface,
            render_target,
            depth_target,
            slots,
        })
    }

    fn create_targets(
        device: &WgpuDevice,
        extent: Extent2D,
        format: wgpu::TextureFormat,
        copy_to_surface: bool,
    ) -> (Option<RenderTarget>, RenderTarget) {
        let render_target = copy_to_surface.then(|| {
            RenderTarget::new(
                device.wgpu_device(),
                "Lumen Render Target",
                extent,
                format,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::TEXTURE_BINDING,
            )
        });
        let depth_target = RenderTarget::new(
            device.wgpu_device(),
            "Lumen Depth Target",
            extent,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        (render_target, depth_target)
    }

    /// The swapchain image format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// The swapchain image format as an [`ImageFormat`], if it is one Lumen knows.
    pub fn image_format(&self) -> Option<ImageFormat> {
        from_wgpu_texture_format(self.config.format)
    }

    /// The active surface configuration.
    pub fn surface_configuration(&self) -> &wgpu::SurfaceConfiguration {
        &self.config
    }

    /// Returns `true` if frames render offscreen and are copied to the surface.
    pub fn uses_offscreen_target(&self) -> bool {
        self.copy_to_surface
    }

    fn swapchain_extent(&self) -> Extent2D {
        Extent2D::new(self.config.width, self.config.height)
    }
}

impl FrameBackend for WgpuSwapchain {
    type Recorder = WgpuFrameRecorder;

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn wait_slot(&mut self, slot: usize, timeout: Duration) -> Result<FenceStatus, RenderError> {
        let Some(submission) = self.slots[slot].last_submission.clone() else {
            return Ok(FenceStatus::Signaled);
        };
        if self.device.wait_for_submission(submission, Some(timeout))? {
            Ok(FenceStatus::Signaled)
        } else {
            Ok(FenceStatus::TimedOut)
        }
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, RenderError> {
        match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture) => {
                self.slots[slot].surface_texture = Some(texture);
                // wgpu hides swapchain image indices; the slot stands in for it.
                Ok(AcquireOutcome::Acquired {
                    image_index: slot as u32,
                })
            }
            wgpu::CurrentSurfaceTexture::Suboptimal(_) => Ok(AcquireOutcome::Suboptimal),
            wgpu::CurrentSurfaceTexture::Outdated => Ok(AcquireOutcome::OutOfDate),
            wgpu::CurrentSurfaceTexture::Lost => {
                log::warn!("Surface lost, reconfiguring.");
                Ok(AcquireOutcome::OutOfDate)
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                Ok(AcquireOutcome::Unavailable)
            }
            wgpu::CurrentSurfaceTexture::Validation => Err(RenderError::SurfaceAcquisitionFailed(
                "validation error while acquiring the surface texture".to_string(),
            )),
        }
    }

    fn reset_slot(&mut self, slot: usize) -> Result<(), RenderError> {
        let bind_group = self.device.bindless_bind_group()?;
        let extent = self.swapchain_extent();
        let state = &mut self.slots[slot];
        state.last_submission = None;

        let color_view = match (&self.render_target, &state.surface_texture) {
            (Some(target), _) if self.copy_to_surface => target.view.clone(),
            (_, Some(texture)) => texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            (_, None) => {
                return Err(RenderError::FrameOutOfOrder(format!(
                    "slot {slot} has no acquired image"
                )))
            }
        };

        let label = format!("Frame Slot {slot}");
        let recorder = &mut state.recorder;
        recorder.encoder = Some(
            self.device
                .wgpu_device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(&label),
                }),
        );
        recorder.color_view = Some(color_view);
        recorder.depth_view = Some(self.depth_target.view.clone());
        recorder.bind_group = Some(bind_group);
        recorder.color_format = self.config.format;
        recorder.extent = extent;
        Ok(())
    }

    fn recorder(&mut self, slot: usize) -> &mut Self::Recorder {
        &mut self.slots[slot].recorder
    }

    fn submit(&mut self, slot: usize) -> Result<(), RenderError> {
        let extent = self.swapchain_extent();
        let state = &mut self.slots[slot];
        let mut encoder = state.recorder.encoder.take().ok_or_else(|| {
            RenderError::FrameOutOfOrder(format!("slot {slot} is not recording"))
        })?;

        if let (Some(target), Some(surface_texture)) =
            (&self.render_target, &state.surface_texture)
        {
            encoder.copy_texture_to_texture(
                target.texture.as_image_copy(),
                surface_texture.texture.as_image_copy(),
                extent.into_wgpu(),
            );
        }
        state.recorder.clear();

        let submission = self
            .device
            .wgpu_queue()
            .submit(std::iter::once(encoder.finish()));
        state.last_submission = Some(submission);
        Ok(())
    }

    fn present(&mut self, slot: usize) -> Result<PresentOutcome, RenderError> {
        let texture = self.slots[slot].surface_texture.take().ok_or_else(|| {
            RenderError::Internal(format!("slot {slot} has no image to present"))
        })?;
        texture.present();
        Ok(PresentOutcome::Presented)
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<(), RenderError> {
        if extent.is_empty() {
            log::warn!("WgpuSwapchain: Ignoring recreate request to zero dimensions: {extent}");
            return Ok(());
        }
        for state in &mut self.slots {
            state.surface_texture = None;
        }

        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface
            .configure(self.device.wgpu_device(), &self.config);

        let (render_target, depth_target) =
            Self::create_targets(&self.device, extent, self.config.format, self.copy_to_surface);
        self.render_target = render_target;
        self.depth_target = depth_target;

        log::info!("WgpuSwapchain: Recreated swapchain and targets at {extent}");
        Ok(())
    }

    fn extents(&self) -> TargetExtents {
        let swapchain = self.swapchain_extent();
        TargetExtents {
            swapchain,
            render_target: self
                .render_target
                .as_ref()
                .map_or(swapchain, |target| target.extent),
            depth_target: self.depth_target.extent,
        }
    }
}
