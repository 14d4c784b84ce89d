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

//! Defines the hierarchy of error types for the rendering core.
//!
//! Errors fall in three groups. Fatal conditions (a missing device capability,
//! a failed submission, a fence that never signals) are reported through
//! [`RenderError`] and flagged by [`RenderError::is_fatal`]; the caller is expected
//! to shut down. Swapchain invalidation is never an error: it is absorbed by the
//! frame orchestrator's resize transition. Caller-contract violations that are
//! cheap to detect (stale handles, out-of-range uploads) surface as [`ResourceError`].

use crate::renderer::bindless::DescriptorKind;
use std::fmt;
use std::time::Duration;

/// An error related to the creation or use of a GPU resource (buffers, images, samplers, shaders).
#[derive(Debug)]
pub enum ResourceError {
    /// A generic resource could not be found.
    NotFound,
    /// The handle refers to a destroyed resource (its slot generation moved on).
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// A write would run past the end of the allocation.
    OutOfBounds {
        /// Byte offset of the write.
        offset: u64,
        /// Byte length of the write.
        size: u64,
        /// Allocated (padded) size of the target.
        capacity: u64,
    },
    /// Every slot of a bindless array is live.
    DescriptorSpaceExhausted {
        /// The descriptor kind whose table is full.
        kind: DescriptorKind,
        /// The table capacity.
        capacity: u32,
    },
    /// `begin_transfer` was called while a transfer session is already recording.
    TransferAlreadyActive,
    /// `end_transfer` was called without a matching `begin_transfer`.
    NoActiveTransfer,
    /// The requested operation or format is not supported for this resource.
    Unsupported(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds {
                offset,
                size,
                capacity,
            } => write!(
                f,
                "Resource access out of bounds: {size} bytes at offset {offset} exceeds {capacity} bytes."
            ),
            ResourceError::DescriptorSpaceExhausted { kind, capacity } => {
                write!(
                    f,
                    "Bindless {kind} array is full ({capacity} descriptors)."
                )
            }
            ResourceError::TransferAlreadyActive => {
                write!(f, "A transfer session is already recording.")
            }
            ResourceError::NoActiveTransfer => write!(f, "No transfer session is recording."),
            ResourceError::Unsupported(msg) => write!(f, "Unsupported resource operation: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// A high-level error raised by context bootstrap, the frame loop or submission.
#[derive(Debug)]
pub enum RenderError {
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// No adapter satisfies a hard requirement (feature, limit, surface support).
    MissingCapability(String),
    /// Failed to acquire the next image from the swapchain for a reason other than
    /// it being out of date.
    SurfaceAcquisitionFailed(String),
    /// A frame slot's fence did not signal within the configured timeout.
    FenceTimeout {
        /// The frame slot being waited on.
        slot: usize,
        /// The timeout that elapsed.
        timeout: Duration,
    },
    /// Submitting recorded work to a queue failed.
    SubmissionFailed(String),
    /// `end_frame` received a token that does not belong to the frame being recorded.
    FrameOutOfOrder(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The graphics device was lost (e.g., GPU driver crashed or was updated).
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl RenderError {
    /// Returns `true` for errors after which the device contract is presumed violated
    /// and the renderer cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::InitializationFailed(_)
                | RenderError::MissingCapability(_)
                | RenderError::FenceTimeout { .. }
                | RenderError::SubmissionFailed(_)
                | RenderError::DeviceLost
        )
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::MissingCapability(msg) => {
                write!(f, "No suitable graphics device: {msg}")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::FenceTimeout { slot, timeout } => write!(
                f,
                "Frame slot {slot} did not finish within {} ms.",
                timeout.as_millis()
            ),
            RenderError::SubmissionFailed(msg) => {
                write!(f, "Queue submission failed: {msg}")
            }
            RenderError::FrameOutOfOrder(msg) => {
                write!(f, "Frame protocol violated: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn resource_error_display() {
        let err = ResourceError::OutOfBounds {
            offset: 16,
            size: 64,
            capacity: 64,
        };
        assert_eq!(
            format!("{err}"),
            "Resource access out of bounds: 64 bytes at offset 16 exceeds 64 bytes."
        );

        let full = ResourceError::DescriptorSpaceExhausted {
            kind: DescriptorKind::StorageBuffer,
            capacity: 8,
        };
        assert_eq!(
            format!("{full}"),
            "Bindless storage buffer array is full (8 descriptors)."
        );
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let render_err: RenderError = ResourceError::InvalidHandle.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Invalid resource handle or ID."
        );
        assert!(render_err.source().is_some());
        assert!(!render_err.is_fatal());
    }

    #[test]
    fn fatal_classification() {
        let timeout = RenderError::FenceTimeout {
            slot: 1,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(format!("{timeout}"), "Frame slot 1 did not finish within 5000 ms.");
        assert!(timeout.is_fatal());
        assert!(RenderError::SubmissionFailed("queue".into()).is_fatal());
        assert!(RenderError::MissingCapability("bindless".into()).is_fatal());
        assert!(!RenderError::SurfaceAcquisitionFailed("occluded".into()).is_fatal());
        assert!(!RenderError::FrameOutOfOrder("slot".into()).is_fatal());
    }
}
