//! Queue-family partitioning and queue handles.
//!
//! A device exposes its queues grouped in families, each family advertising a set of
//! capabilities. The [`partition_queue_families`] function assigns up to three roles:
//!
//! - **Main**: the first family supporting both graphics and compute. Reserves up to
//!   [`MAX_MAIN_QUEUES`] queues so compute and transfer work can borrow from it.
//! - **Compute**: the first compute family without graphics. Reserves one queue.
//! - **Transfer**: the first transfer family without graphics or compute. Reserves
//!   every queue in the family for parallel uploads.
//!
//! When a dedicated family is missing, [`DeviceQueues::compute_queue`] and
//! [`DeviceQueues::transfer_queues`] fall back to spare queues of the main family.

use ash::vk;
use smallvec::SmallVec;

use crate::{Device, HasDevice, utils::AsVkHandle};

/// Number of queues the main role reserves when the family has that many.
pub const MAX_MAIN_QUEUES: u32 = 4;

/// A queue family picked for a role, and how many of its queues the role reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyAssignment {
    pub family_index: u32,
    pub queue_count: u32,
}

/// The position of a single queue on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLocation {
    pub family_index: u32,
    pub queue_index: u32,
}

/// Role assignments produced by [`partition_queue_families`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceQueues {
    pub main: QueueFamilyAssignment,
    pub compute: Option<QueueFamilyAssignment>,
    pub transfer: Option<QueueFamilyAssignment>,
}

fn is_main_family(flags: vk::QueueFlags) -> bool {
    flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
}

fn is_compute_family(flags: vk::QueueFlags) -> bool {
    flags.contains(vk::QueueFlags::COMPUTE) && !flags.contains(vk::QueueFlags::GRAPHICS)
}

fn is_transfer_family(flags: vk::QueueFlags) -> bool {
    flags.contains(vk::QueueFlags::TRANSFER)
        && !flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
}

/// Partitions queue families into the main, compute and transfer roles.
///
/// Families are visited once, in index order, and each role takes the first family
/// matching its predicate. Families with no queues are ignored.
///
/// Returns `None` if no family supports both graphics and compute.
pub fn partition_queue_families(families: &[vk::QueueFamilyProperties]) -> Option<DeviceQueues> {
    let mut main = None;
    let mut compute = None;
    let mut transfer = None;
    for (index, family) in families.iter().enumerate() {
        let flags = family.queue_flags;
        let count = family.queue_count;
        if count == 0 {
            continue;
        }
        let family_index = index as u32;
        if main.is_none() && is_main_family(flags) {
            main = Some(QueueFamilyAssignment {
                family_index,
                queue_count: count.min(MAX_MAIN_QUEUES),
            });
        } else if compute.is_none() && is_compute_family(flags) {
            compute = Some(QueueFamilyAssignment {
                family_index,
                queue_count: 1,
            });
        } else if transfer.is_none() && is_transfer_family(flags) {
            transfer = Some(QueueFamilyAssignment {
                family_index,
                queue_count: count,
            });
        }
    }
    let main = main?;

    tracing::info!(
        component = "context",
        "using main queue from queue family #{}",
        main.family_index
    );
    if let Some(compute) = compute {
        tracing::info!(
            component = "context",
            "using compute queue from queue family #{}",
            compute.family_index
        );
    }
    if let Some(transfer) = transfer {
        tracing::info!(
            component = "context",
            "using transfer queue from queue family #{}",
            transfer.family_index
        );
    }
    Some(DeviceQueues {
        main,
        compute,
        transfer,
    })
}

impl DeviceQueues {
    /// The main queue is always queue 0 of the main family.
    pub fn main_queue(&self) -> QueueLocation {
        QueueLocation {
            family_index: self.main.family_index,
            queue_index: 0,
        }
    }

    /// The compute queue, borrowing queue 1 of the main family when there is no
    /// dedicated compute family.
    pub fn compute_queue(&self) -> Option<QueueLocation> {
        match self.compute {
            Some(compute) => Some(QueueLocation {
                family_index: compute.family_index,
                queue_index: 0,
            }),
            None if self.main.queue_count > 1 => Some(QueueLocation {
                family_index: self.main.family_index,
                queue_index: 1,
            }),
            None => None,
        }
    }

    /// The transfer queues, borrowing queues 2.. of the main family when there is no
    /// dedicated transfer family. Empty when neither is available.
    pub fn transfer_queues(&self) -> SmallVec<[QueueLocation; 4]> {
        match self.transfer {
            Some(transfer) => (0..transfer.queue_count)
                .map(|queue_index| QueueLocation {
                    family_index: transfer.family_index,
                    queue_index,
                })
                .collect(),
            None if self.main.queue_count > 2 => (2..self.main.queue_count)
                .map(|queue_index| QueueLocation {
                    family_index: self.main.family_index,
                    queue_index,
                })
                .collect(),
            None => SmallVec::new(),
        }
    }

    /// Assigned families, main first.
    pub fn assignments(&self) -> impl Iterator<Item = QueueFamilyAssignment> + '_ {
        std::iter::once(self.main)
            .chain(self.compute)
            .chain(self.transfer)
    }

    /// Enough priorities for the largest assignment; every queue gets 1.0.
    pub fn priorities(&self) -> Vec<f32> {
        let max = self.assignments().map(|a| a.queue_count).max().unwrap_or(0);
        vec![1.0; max as usize]
    }

    /// Builds one queue create info per assigned family.
    ///
    /// `priorities` must come from [`DeviceQueues::priorities`].
    pub fn queue_create_infos<'a>(
        &self,
        priorities: &'a [f32],
    ) -> SmallVec<[vk::DeviceQueueCreateInfo<'a>; 3]> {
        self.assignments()
            .map(|assignment| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(assignment.family_index)
                    .queue_priorities(&priorities[..assignment.queue_count as usize])
            })
            .collect()
    }
}

/// A Vulkan queue retrieved from the device.
///
/// Submission is left to the caller; the queue only carries what is needed to
/// issue work on it.
pub struct Queue {
    device: Device,
    handle: vk::Queue,
    location: QueueLocation,
    capabilities: vk::QueueFlags,
}

impl HasDevice for Queue {
    fn device(&self) -> &Device {
        &self.device
    }
}

impl AsVkHandle for Queue {
    type Handle = vk::Queue;
    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

impl Queue {
    /// Returns the queue family index.
    pub fn family_index(&self) -> u32 {
        self.location.family_index
    }
    /// Returns the index of the queue within its family.
    pub fn queue_index(&self) -> u32 {
        self.location.queue_index
    }
    /// Returns the capabilities supported by the queue family that this queue belongs to.
    pub fn capabilities(&self) -> vk::QueueFlags {
        self.capabilities
    }
    pub(crate) fn retrieve(device: Device, location: QueueLocation, caps: vk::QueueFlags) -> Self {
        let handle = unsafe { device.get_device_queue(location.family_index, location.queue_index) };
        Self {
            device,
            handle,
            location,
            capabilities: caps,
        }
    }
    /// Blocks until all work submitted to this queue has completed.
    pub fn wait_idle(&self) -> ash::prelude::VkResult<()> {
        unsafe { self.device.queue_wait_idle(self.handle) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: vk::QueueFlags = vk::QueueFlags::GRAPHICS;
    const C: vk::QueueFlags = vk::QueueFlags::COMPUTE;
    const T: vk::QueueFlags = vk::QueueFlags::TRANSFER;
    const SB: vk::QueueFlags = vk::QueueFlags::SPARSE_BINDING;

    fn family(flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count,
            ..Default::default()
        }
    }

    fn loc(family_index: u32, queue_index: u32) -> QueueLocation {
        QueueLocation {
            family_index,
            queue_index,
        }
    }

    /// NVIDIA discrete GPU layout: a big universal family, a transfer-only family
    /// and an async compute family.
    #[test]
    fn test_nvidia_layout() {
        let families = [
            family(G | C | T | SB, 16),
            family(T | SB, 2),
            family(C | T | SB, 8),
        ];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(
            queues.main,
            QueueFamilyAssignment {
                family_index: 0,
                queue_count: 4
            },
            "main should cap at four queues"
        );
        assert_eq!(
            queues.compute,
            Some(QueueFamilyAssignment {
                family_index: 2,
                queue_count: 1
            })
        );
        assert_eq!(
            queues.transfer,
            Some(QueueFamilyAssignment {
                family_index: 1,
                queue_count: 2
            }),
            "transfer should reserve the whole family"
        );
        assert_eq!(queues.compute_queue(), Some(loc(2, 0)));
        assert_eq!(queues.transfer_queues().as_slice(), &[loc(1, 0), loc(1, 1)]);
    }

    /// Intel integrated GPUs often expose a single universal family with one queue.
    #[test]
    fn test_single_family_single_queue() {
        let families = [family(G | C | T, 1)];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(queues.main.queue_count, 1);
        assert_eq!(queues.compute, None);
        assert_eq!(queues.transfer, None);
        assert_eq!(queues.compute_queue(), None, "no spare queue to borrow");
        assert!(queues.transfer_queues().is_empty());
    }

    #[test]
    fn test_fallback_borrows_from_main() {
        let families = [family(G | C | T, 4)];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(queues.main_queue(), loc(0, 0));
        assert_eq!(queues.compute_queue(), Some(loc(0, 1)));
        assert_eq!(queues.transfer_queues().as_slice(), &[loc(0, 2), loc(0, 3)]);

        let families = [family(G | C | T, 2)];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(queues.compute_queue(), Some(loc(0, 1)));
        assert!(
            queues.transfer_queues().is_empty(),
            "transfer needs more than two main queues to borrow"
        );
    }

    #[test]
    fn test_main_requires_graphics_and_compute() {
        // A graphics-only family must not become main.
        let families = [family(G | T, 1), family(G | C | T, 2)];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(queues.main.family_index, 1);

        let families = [family(G | T, 1), family(C, 1), family(T, 1)];
        assert_eq!(partition_queue_families(&families), None);
    }

    #[test]
    fn test_first_matching_family_wins() {
        let families = [
            family(C, 1),
            family(G | C | T, 1),
            family(C | T, 3),
            family(G | C, 8),
            family(T, 1),
            family(T, 5),
        ];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(queues.main.family_index, 1);
        assert_eq!(queues.compute.map(|c| c.family_index), Some(0));
        assert_eq!(queues.transfer.map(|t| t.family_index), Some(4));
    }

    #[test]
    fn test_roles_never_share_a_family() {
        let layouts: [&[vk::QueueFamilyProperties]; 4] = [
            &[family(G | C | T, 16), family(T, 2), family(C | T, 8)],
            &[family(C | T, 2), family(G | C | T, 1)],
            &[family(G | C | T | SB, 1), family(T | SB, 1)],
            &[family(G | C, 0), family(G | C | T, 1), family(C, 0), family(C, 2)],
        ];
        for families in layouts {
            let queues = partition_queue_families(families).unwrap();
            let indices: Vec<u32> = queues.assignments().map(|a| a.family_index).collect();
            let mut deduped = indices.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(indices.len(), deduped.len(), "{indices:?} reuses a family");
        }
    }

    #[test]
    fn test_empty_families_are_skipped() {
        let families = [family(G | C | T, 0), family(G | C | T, 2)];
        let queues = partition_queue_families(&families).unwrap();
        assert_eq!(queues.main.family_index, 1);
    }

    #[test]
    fn test_queue_create_infos() {
        let families = [family(G | C | T, 16), family(T, 6), family(C, 4)];
        let queues = partition_queue_families(&families).unwrap();
        let priorities = queues.priorities();
        assert_eq!(priorities.len(), 6);
        assert!(priorities.iter().all(|&p| p == 1.0));
        let infos = queues.queue_create_infos(&priorities);
        let summary: Vec<(u32, u32)> = infos
            .iter()
            .map(|info| (info.queue_family_index, info.queue_count))
            .collect();
        assert_eq!(summary, vec![(0, 4), (2, 1), (1, 6)]);
    }
}
