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

use anyhow::{anyhow, Result};
use lumen_core::platform::window::LumenWindowHandle;
use lumen_core::renderer::api::RenderSettings;
use lumen_core::renderer::{
    assign_queue_families, select_adapter, AdapterCandidate, QueueAssignment, QueueFamilyInfo,
};

use super::conversions::{from_wgpu_device_type, IntoWgpu};
use super::device::WgpuDevice;

/// Features a device must expose to host the bindless arrays and the
/// indirect culling pass, with the names used in diagnostics.
const REQUIRED_FEATURES: [(wgpu::Features, &str); 7] = [
    (wgpu::Features::TEXTURE_BINDING_ARRAY, "TEXTURE_BINDING_ARRAY"),
    (wgpu::Features::BUFFER_BINDING_ARRAY, "BUFFER_BINDING_ARRAY"),
    (
        wgpu::Features::STORAGE_RESOURCE_BINDING_ARRAY,
        "STORAGE_RESOURCE_BINDING_ARRAY",
    ),
    (
        wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
        "SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING",
    ),
    (
        wgpu::Features::STORAGE_TEXTURE_ARRAY_NON_UNIFORM_INDEXING,
        "STORAGE_TEXTURE_ARRAY_NON_UNIFORM_INDEXING",
    ),
    (
        wgpu::Features::PARTIALLY_BOUND_BINDING_ARRAY,
        "PARTIALLY_BOUND_BINDING_ARRAY",
    ),
    (wgpu::Features::INDIRECT_FIRST_INSTANCE, "INDIRECT_FIRST_INSTANCE"),
];

/// The union of every feature the renderer requests.
pub fn required_features() -> wgpu::Features {
    REQUIRED_FEATURES
        .iter()
        .fold(wgpu::Features::empty(), |acc, (feature, _)| acc | *feature)
}

/// Holds the core wgpu state objects: the instance, the selected adapter and
/// the logical device built on it.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: WgpuDevice,

    // Store info for easy access
    pub adapter_info: wgpu::AdapterInfo,
    pub queues: QueueAssignment,
    pub active_device_features: wgpu::Features,
}

impl WgpuGraphicsContext {
    /// Asynchronously creates the context and a surface for `window`.
    ///
    /// Every enumerated adapter is scored; adapters lacking a required
    /// feature, presentation support for the surface or any surface format
    /// are rejected.
    ///
    /// ## Arguments
    /// * `app_name` - Application name, used in device labels and logs.
    /// * `engine_name` - Engine name, used in device labels and logs.
    /// * `window_handle` - The window the surface is created for.
    /// * `settings` - Backend mask and bindless configuration.
    ///
    /// ## Returns
    /// The context and the surface to build a swapchain from.
    ///
    /// # Errors
    ///
    /// Fails if the surface cannot be created, no adapter qualifies or device
    /// creation fails.
    pub async fn with_surface(
        app_name: &str,
        engine_name: &str,
        window_handle: LumenWindowHandle,
        settings: &RenderSettings,
    ) -> Result<(Self, wgpu::Surface<'static>)> {
        log::info!("Initializing wgpu context for \"{app_name}\" ({engine_name})...");
        let instance = Self::create_instance(settings);

        let surface = instance
            .create_surface(window_handle)
            .map_err(|e| anyhow!("Failed to create surface: {e}"))?;
        log::debug!("wgpu surface created for the window.");

        let context =
            Self::bootstrap(instance, Some(&surface), app_name, engine_name, settings).await?;
        Ok((context, surface))
    }

    /// Asynchronously creates a context without a presentation surface, for
    /// offscreen and compute work.
    ///
    /// # Errors
    ///
    /// Fails if no adapter qualifies or device creation fails.
    pub async fn headless(app_name: &str, settings: &RenderSettings) -> Result<Self> {
        log::info!("Initializing headless wgpu context for \"{app_name}\"...");
        let instance = Self::create_instance(settings);
        Self::bootstrap(instance, None, app_name, "headless", settings).await
    }

    fn create_instance(settings: &RenderSettings) -> wgpu::Instance {
        let mut descriptor = wgpu::InstanceDescriptor::new_without_display_handle();
        descriptor.backends = settings.backends.into_wgpu();
        wgpu::Instance::new(descriptor)
    }

    async fn bootstrap(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'static>>,
        app_name: &str,
        engine_name: &str,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let adapters = instance
            .enumerate_adapters(settings.backends.into_wgpu())
            .await;
        log::info!("Found {} adapter(s).", adapters.len());

        let candidates: Vec<AdapterCandidate> = adapters
            .iter()
            .map(|adapter| describe_adapter(adapter, surface))
            .collect();
        let index = select_adapter(&candidates).map_err(|e| {
            log::error!("{e}");
            anyhow!(e)
        })?;
        let queues = assign_queue_families(&candidates[index].queue_families)
            .ok_or_else(|| anyhow!("Selected adapter lost its graphics queue family"))?;
        let adapter = adapters
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow!("Adapter index {index} out of range"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?}, queues: {:?}{})",
            adapter_info.name,
            adapter_info.backend,
            queues,
            if queues.is_shared() { ", shared" } else { "" }
        );

        let label = format!("{app_name} ({engine_name}) Logical Device");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label.as_str()),
                required_features: required_features(),
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(std::sync::Arc::new(|e: wgpu::Error| {
            log::error!("wgpu uncaptured error: {e:?}");
        }));

        let active_device_features = device.features();
        log::debug!("Active device features: {active_device_features:?}");

        let device = WgpuDevice::new(device, queue, &adapter_info, settings);

        Ok(Self {
            instance,
            adapter,
            device,
            adapter_info,
            queues,
            active_device_features,
        })
    }
}

/// Describes a wgpu adapter for scoring.
///
/// wgpu exposes a single queue, reported as one family able to do everything.
fn describe_adapter(
    adapter: &wgpu::Adapter,
    surface: Option<&wgpu::Surface<'static>>,
) -> AdapterCandidate {
    let info = adapter.get_info();
    let features = adapter.features();
    let missing_features = REQUIRED_FEATURES
        .iter()
        .filter(|(feature, _)| !features.contains(*feature))
        .map(|(_, name)| (*name).to_string())
        .collect();

    let surface_supported = surface.is_none_or(|surface| {
        adapter.is_surface_supported(surface)
            && !surface.get_capabilities(adapter).formats.is_empty()
    });

    AdapterCandidate {
        name: info.name,
        device_type: from_wgpu_device_type(info.device_type),
        max_image_dimension_2d: adapter.limits().max_texture_dimension_2d,
        queue_families: vec![QueueFamilyInfo::universal(0)],
        missing_features,
        surface_supported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_features_cover_the_named_list() {
        let features = required_features();
        for (feature, _) in REQUIRED_FEATURES {
            assert!(features.contains(feature));
        }
        assert!(features.contains(wgpu::Features::PARTIALLY_BOUND_BINDING_ARRAY));
    }
}
