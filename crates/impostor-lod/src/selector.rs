//! Bounded selection of which objects are serviced this frame.
//!
//! Mode transitions are always admitted. Texture refreshes share a per-frame
//! budget: the most urgent visible candidates first, then invisible ones
//! with whatever is left, capped by the background budget. Each pass keeps
//! a size-k min-heap, so selection is O(n log k) with no full sort.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::object::{RequiredAction, TrackedObject};

/// Per-frame limits on texture refreshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateBudget {
    /// Total queue length, counting mode transitions.
    pub max_updates: usize,
    /// Refreshes of invisible objects.
    pub max_background_updates: usize,
}

impl Default for UpdateBudget {
    fn default() -> Self {
        Self {
            max_updates: 20,
            max_background_updates: 10,
        }
    }
}

/// Ranks refresh candidates. Larger priorities are serviced first.
pub trait UpdatePrioritizer: Send + Sync {
    /// Urgency of refreshing `object` at time `now`.
    fn priority(&self, object: &TrackedObject, now: f32) -> f32;

    /// Append the indices of this frame's work queue to `queue`.
    fn select(
        &self,
        objects: &[TrackedObject],
        budget: UpdateBudget,
        now: f32,
        queue: &mut Vec<usize>,
    ) {
        select_updates(objects, budget, |o| self.priority(o, now), queue);
    }
}

/// Prominent and stale first: `screen_size × (now − last_update.time)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByScreenSizeAndStaleness;

impl UpdatePrioritizer for ByScreenSizeAndStaleness {
    fn priority(&self, object: &TrackedObject, now: f32) -> f32 {
        object.screen_size * (now - object.last_update.time)
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    priority: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Build the frame's work queue.
///
/// Immediate actions come first in table order, then the chosen visible
/// refreshes, then the chosen background refreshes, each group in
/// descending priority.
pub fn select_updates<F>(
    objects: &[TrackedObject],
    budget: UpdateBudget,
    priority: F,
    queue: &mut Vec<usize>,
) where
    F: Fn(&TrackedObject) -> f32,
{
    let start = queue.len();
    queue.extend(
        objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.action.is_immediate())
            .map(|(i, _)| i),
    );

    let admitted = queue.len() - start;
    if admitted < budget.max_updates {
        let k = budget.max_updates - admitted;
        top_k(objects, true, k, &priority, queue);
    }

    let admitted = queue.len() - start;
    if admitted < budget.max_updates {
        let k = budget
            .max_background_updates
            .min(budget.max_updates - admitted);
        top_k(objects, false, k, &priority, queue);
    }
}

fn top_k<F>(objects: &[TrackedObject], visible: bool, k: usize, priority: &F, out: &mut Vec<usize>)
where
    F: Fn(&TrackedObject) -> f32,
{
    if k == 0 {
        return;
    }
    let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k);
    for (index, object) in objects.iter().enumerate() {
        if object.visible != visible || object.action != RequiredAction::UpdateImpostorTexture {
            continue;
        }
        let candidate = Candidate {
            priority: priority(object),
            index,
        };
        if heap.len() < k {
            heap.push(Reverse(candidate));
        } else if let Some(mut min) = heap.peek_mut() {
            if candidate.priority > min.0.priority {
                *min = Reverse(candidate);
            }
        }
    }
    out.extend(heap.into_sorted_vec().into_iter().map(|Reverse(c)| c.index));
}
