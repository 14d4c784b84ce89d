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

//! The window contract the renderer consumes.

use crate::math::Extent2D;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// Both raw handle traits behind one name, so they can form a trait object.
pub trait WindowHandle: HasWindowHandle + HasDisplayHandle {}

impl<T: HasWindowHandle + HasDisplayHandle> WindowHandle for T {}

/// A shared, thread-safe handle a surface can be created from.
pub type LumenWindowHandle = Arc<dyn WindowHandle + Send + Sync>;

/// A window a swapchain can present to.
///
/// The frame loop reads [`LumenWindow::inner_extent`] every frame to detect resizes.
pub trait LumenWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {
    /// Physical size of the drawable area.
    fn inner_extent(&self) -> Extent2D;

    /// The window's DPI scale factor.
    fn scale_factor(&self) -> f64;

    /// Asks the windowing system for another redraw event.
    fn request_redraw(&self);

    /// A shared handle for surface creation.
    fn clone_handle_arc(&self) -> LumenWindowHandle;

    /// A stable identifier of the window.
    fn id(&self) -> u64;
}
