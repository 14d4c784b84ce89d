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

//! [`LumenWindow`] over a `winit` window.

use lumen_core::math::Extent2D;
use lumen_core::platform::window::{LumenWindow, LumenWindowHandle};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::error::OsError;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

/// A shared `winit` window the renderer can present to.
///
/// Cloning is cheap; the surface keeps its own clone alive through
/// [`LumenWindow::clone_handle_arc`].
#[derive(Debug, Clone)]
pub struct WinitWindow {
    inner: Arc<Window>,
}

impl WinitWindow {
    /// Wraps a window created elsewhere.
    pub fn from_window(window: Window) -> Self {
        Self {
            inner: Arc::new(window),
        }
    }

    /// The wrapped window, for state this wrapper does not cover.
    pub fn winit_window(&self) -> &Window {
        &self.inner
    }

    /// The `winit` id, to match incoming window events.
    pub fn window_id(&self) -> WindowId {
        self.inner.id()
    }

    /// Sets the window title.
    pub fn set_title(&self, title: &str) {
        self.inner.set_title(title);
    }
}

/// Window creation parameters.
#[derive(Debug, Clone)]
pub struct WinitWindowBuilder {
    title: String,
    width: u32,
    height: u32,
    resizable: bool,
    min_extent: Option<Extent2D>,
}

impl WinitWindowBuilder {
    /// A resizable 1280x720 window titled "Lumen".
    pub fn new() -> Self {
        Self {
            title: "Lumen".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
            min_extent: None,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the initial logical inner size.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Allows or forbids user resizing.
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Sets the smallest logical inner size the user can resize to.
    pub fn with_min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.min_extent = Some(Extent2D::new(width, height));
        self
    }

    /// Creates the window on `event_loop`.
    ///
    /// # Errors
    /// Returns an `OsError` if `winit` cannot create the window.
    pub fn build(self, event_loop: &ActiveEventLoop) -> Result<WinitWindow, OsError> {
        log::info!(
            "Building window '{}' at {}x{}",
            self.title,
            self.width,
            self.height
        );

        let mut attributes = Window::default_attributes()
            .with_title(self.title)
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
            .with_visible(true);
        if let Some(min) = self.min_extent {
            attributes = attributes.with_min_inner_size(LogicalSize::new(min.width, min.height));
        }

        let window = event_loop.create_window(attributes)?;
        log::info!("Winit window created (id: {:?}).", window.id());
        Ok(WinitWindow::from_window(window))
    }
}

impl Default for WinitWindowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.inner.window_handle()
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.inner.display_handle()
    }
}

impl LumenWindow for WinitWindow {
    fn inner_extent(&self) -> Extent2D {
        extent_from_physical(self.inner.inner_size())
    }

    fn scale_factor(&self) -> f64 {
        self.inner.scale_factor()
    }

    fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    fn clone_handle_arc(&self) -> LumenWindowHandle {
        self.inner.clone()
    }

    fn id(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.inner.id().hash(&mut hasher);
        hasher.finish()
    }
}

/// Converts a `winit` physical size into an [`Extent2D`].
pub fn extent_from_physical(size: PhysicalSize<u32>) -> Extent2D {
    Extent2D::new(size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_and_overrides() {
        let builder = WinitWindowBuilder::default();
        assert_eq!(builder.title, "Lumen");
        assert!(builder.resizable);

        let builder = builder
            .with_title("Sandbox")
            .with_dimensions(800, 600)
            .with_resizable(false)
            .with_min_dimensions(320, 240);
        assert_eq!((builder.width, builder.height), (800, 600));
        assert!(!builder.resizable);
        assert_eq!(builder.min_extent, Some(Extent2D::new(320, 240)));
    }

    #[test]
    fn physical_size_maps_to_extent() {
        let extent = extent_from_physical(PhysicalSize::new(1920, 1080));
        assert_eq!(extent, Extent2D::new(1920, 1080));
        assert!(extent_from_physical(PhysicalSize::new(0, 0)).is_empty());
    }
}
