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

//! Backend-agnostic adapter scoring and queue family assignment.
//!
//! Backends describe every adapter they enumerate as an [`AdapterCandidate`];
//! [`select_adapter`] disqualifies candidates missing a hard requirement and picks
//! the highest scoring survivor.

use crate::renderer::api::RendererDeviceType;
use crate::renderer::error::RenderError;
use std::fmt;

/// Score bonus of a discrete GPU.
pub const DISCRETE_GPU_BONUS: u64 = 1_000_000;
/// Score bonus of an integrated GPU.
pub const INTEGRATED_GPU_BONUS: u64 = 100_000;

/// Capabilities of one queue family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    /// Family index as reported by the backend.
    pub index: u32,
    /// Supports graphics commands.
    pub graphics: bool,
    /// Supports compute commands.
    pub compute: bool,
    /// Supports copy commands.
    pub transfer: bool,
    /// Can present to the target surface.
    pub present: bool,
}

impl QueueFamilyInfo {
    /// A family that can do everything, the only kind a single-queue backend reports.
    pub const fn universal(index: u32) -> Self {
        Self {
            index,
            graphics: true,
            compute: true,
            transfer: true,
            present: true,
        }
    }

    fn is_dedicated_transfer(&self) -> bool {
        self.transfer && !self.graphics && !self.compute
    }
}

/// Everything adapter selection needs to know about one adapter.
#[derive(Debug, Clone)]
pub struct AdapterCandidate {
    /// Adapter name, for logs.
    pub name: String,
    /// Physical device type.
    pub device_type: RendererDeviceType,
    /// Largest supported 2D image dimension.
    pub max_image_dimension_2d: u32,
    /// Queue families exposed by the adapter.
    pub queue_families: Vec<QueueFamilyInfo>,
    /// Names of required features the adapter lacks.
    pub missing_features: Vec<String>,
    /// Whether the adapter can present to the target surface at all.
    pub surface_supported: bool,
}

/// Why a candidate cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disqualification {
    /// One or more required features are absent.
    MissingFeatures(Vec<String>),
    /// The adapter cannot present to the surface.
    NoSurfaceSupport,
    /// No queue family supports both graphics and present.
    NoGraphicsPresentQueue,
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::MissingFeatures(features) => {
                write!(f, "missing features [{}]", features.join(", "))
            }
            Disqualification::NoSurfaceSupport => write!(f, "cannot present to the surface"),
            Disqualification::NoGraphicsPresentQueue => {
                write!(f, "no queue family with graphics and present support")
            }
        }
    }
}

/// Scores a candidate, or reports the first hard requirement it fails.
///
/// Score = device type bonus + the maximum 2D image dimension. The bonuses are
/// far above any real dimension limit, so the type always dominates and larger
/// image limits break ties within a type.
pub fn score_candidate(candidate: &AdapterCandidate) -> Result<u64, Disqualification> {
    if !candidate.missing_features.is_empty() {
        return Err(Disqualification::MissingFeatures(
            candidate.missing_features.clone(),
        ));
    }
    if !candidate.surface_supported {
        return Err(Disqualification::NoSurfaceSupport);
    }
    if assign_queue_families(&candidate.queue_families).is_none() {
        return Err(Disqualification::NoGraphicsPresentQueue);
    }

    let type_bonus = match candidate.device_type {
        RendererDeviceType::DiscreteGpu => DISCRETE_GPU_BONUS,
        RendererDeviceType::IntegratedGpu => INTEGRATED_GPU_BONUS,
        _ => 0,
    };
    Ok(type_bonus + u64::from(candidate.max_image_dimension_2d))
}

/// Picks the highest scoring candidate. Ties keep the earliest enumerated one.
///
/// # Errors
///
/// Returns [`RenderError::MissingCapability`] listing every rejection when no
/// candidate qualifies.
pub fn select_adapter(candidates: &[AdapterCandidate]) -> Result<usize, RenderError> {
    let mut best: Option<(usize, u64)> = None;
    let mut rejections = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        match score_candidate(candidate) {
            Ok(score) => {
                log::debug!("Adapter \"{}\" scored {score}", candidate.name);
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((index, score));
                }
            }
            Err(reason) => {
                log::debug!("Adapter \"{}\" rejected: {reason}", candidate.name);
                rejections.push(format!("\"{}\": {reason}", candidate.name));
            }
        }
    }

    match best {
        Some((index, score)) => {
            log::info!(
                "Selected adapter \"{}\" ({:?}, score {score})",
                candidates[index].name,
                candidates[index].device_type
            );
            Ok(index)
        }
        None if candidates.is_empty() => Err(RenderError::MissingCapability(
            "no adapters were enumerated".to_string(),
        )),
        None => Err(RenderError::MissingCapability(rejections.join("; "))),
    }
}

/// The queue family chosen for each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAssignment {
    /// Graphics + present family.
    pub graphics: u32,
    /// Compute family.
    pub compute: u32,
    /// Transfer family.
    pub transfer: u32,
}

impl QueueAssignment {
    /// Returns `true` if every role ended up on the same family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.compute && self.compute == self.transfer
    }
}

/// Assigns families to the graphics, compute and transfer roles.
///
/// Graphics needs graphics and present support. Compute prefers a family other
/// than graphics. Transfer prefers a dedicated copy family, then any family not
/// already used, then any family other than graphics, and only then shares the
/// graphics family. Returns `None` without a graphics + present family.
pub fn assign_queue_families(families: &[QueueFamilyInfo]) -> Option<QueueAssignment> {
    let graphics = families.iter().find(|f| f.graphics && f.present)?.index;

    let compute = families
        .iter()
        .find(|f| f.compute && f.index != graphics)
        .or_else(|| families.iter().find(|f| f.compute))
        .map_or(graphics, |f| f.index);

    let transfer = families
        .iter()
        .find(|f| f.is_dedicated_transfer())
        .or_else(|| {
            families
                .iter()
                .find(|f| f.transfer && f.index != graphics && f.index != compute)
        })
        .or_else(|| families.iter().find(|f| f.transfer && f.index != graphics))
        .map_or(graphics, |f| f.index);

    Some(QueueAssignment {
        graphics,
        compute,
        transfer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, device_type: RendererDeviceType, max_dim: u32) -> AdapterCandidate {
        AdapterCandidate {
            name: name.to_string(),
            device_type,
            max_image_dimension_2d: max_dim,
            queue_families: vec![QueueFamilyInfo::universal(0)],
            missing_features: Vec::new(),
            surface_supported: true,
        }
    }

    #[test]
    fn discrete_beats_integrated_regardless_of_limits() {
        let candidates = [
            candidate("igpu", RendererDeviceType::IntegratedGpu, 32768),
            candidate("dgpu", RendererDeviceType::DiscreteGpu, 8192),
        ];
        assert_eq!(select_adapter(&candidates).unwrap(), 1);
    }

    #[test]
    fn image_dimension_breaks_ties_within_a_type() {
        let score = |max_dim| {
            score_candidate(&candidate("gpu", RendererDeviceType::DiscreteGpu, max_dim)).unwrap()
        };
        assert_eq!(score(8192), DISCRETE_GPU_BONUS + 8192);
        assert!(score(16384) > score(8192));
        // Limits that are not powers of two still rank.
        assert!(score(12288) > score(8192));

        let candidates = [
            candidate("8k", RendererDeviceType::DiscreteGpu, 8192),
            candidate("12k", RendererDeviceType::DiscreteGpu, 12288),
        ];
        assert_eq!(select_adapter(&candidates).unwrap(), 1);
    }

    #[test]
    fn equal_scores_keep_enumeration_order() {
        let candidates = [
            candidate("first", RendererDeviceType::DiscreteGpu, 16384),
            candidate("second", RendererDeviceType::DiscreteGpu, 16384),
        ];
        assert_eq!(select_adapter(&candidates).unwrap(), 0);
    }

    #[test]
    fn missing_requirements_disqualify() {
        let mut no_features = candidate("old", RendererDeviceType::DiscreteGpu, 16384);
        no_features.missing_features = vec!["PARTIALLY_BOUND_BINDING_ARRAY".to_string()];
        let mut headless = candidate("headless", RendererDeviceType::DiscreteGpu, 16384);
        headless.surface_supported = false;
        let cpu = candidate("llvmpipe", RendererDeviceType::Cpu, 8192);

        assert_eq!(select_adapter(&[no_features.clone(), headless.clone(), cpu]).unwrap(), 2);

        let err = select_adapter(&[no_features, headless]).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("PARTIALLY_BOUND_BINDING_ARRAY"));
        assert!(err.to_string().contains("cannot present"));
    }

    #[test]
    fn distinct_families_are_preferred() {
        let families = [
            QueueFamilyInfo::universal(0),
            QueueFamilyInfo {
                index: 1,
                graphics: false,
                compute: true,
                transfer: true,
                present: false,
            },
            QueueFamilyInfo {
                index: 2,
                graphics: false,
                compute: false,
                transfer: true,
                present: false,
            },
        ];
        let assignment = assign_queue_families(&families).unwrap();
        assert_eq!(
            assignment,
            QueueAssignment {
                graphics: 0,
                compute: 1,
                transfer: 2
            }
        );
    }

    #[test]
    fn single_family_is_shared() {
        let assignment = assign_queue_families(&[QueueFamilyInfo::universal(0)]).unwrap();
        assert!(assignment.is_shared());
    }

    #[test]
    fn transfer_falls_back_to_any_unused_family() {
        let families = [
            QueueFamilyInfo::universal(0),
            QueueFamilyInfo {
                index: 1,
                graphics: false,
                compute: true,
                transfer: true,
                present: false,
            },
            QueueFamilyInfo {
                index: 2,
                graphics: true,
                compute: false,
                transfer: true,
                present: false,
            },
        ];
        let assignment = assign_queue_families(&families).unwrap();
        assert_eq!(assignment.compute, 1);
        assert_eq!(assignment.transfer, 2);
    }

    #[test]
    fn transfer_shares_the_compute_family_before_graphics() {
        let families = [
            QueueFamilyInfo::universal(0),
            QueueFamilyInfo {
                index: 1,
                graphics: false,
                compute: true,
                transfer: true,
                present: false,
            },
        ];
        let assignment = assign_queue_families(&families).unwrap();
        assert_eq!(
            assignment,
            QueueAssignment {
                graphics: 0,
                compute: 1,
                transfer: 1
            }
        );
        assert!(!assignment.is_shared());
    }
}
