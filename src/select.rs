//! Photo selection
//!
//! Picks up to `count` photos from the library in a single streaming pass:
//! - `Random` keeps a reservoir of `count` slots (uniform sample, O(count)
//!   memory, stream length unknown up front)
//! - `Newest` / `Oldest` keep a heap bounded to `count` entries keyed by the
//!   resolved capture date, so the listing is never materialized or sorted
//!
//! Photos already in the view history are skipped. When fewer than `count`
//! unviewed photos match, the history is reset and the pass is repeated over
//! every matching photo.

use crate::cancel::CancelToken;
use crate::config::{OrderMode, OrientationFilter};
use crate::history::ViewHistory;
use crate::metadata::{MetadataStore, matches_filter};
use crate::scan::{PhotoSource, photo_name};
use crate::time::Timestamp;
use rand::Rng;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, error, info, span};

/// What to select
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    /// Directory to pick from
    pub source_dir: PathBuf,
    /// Maximum number of photos
    pub count: usize,
    /// Ordering policy
    pub order: OrderMode,
    /// Orientation filter
    pub orientation: OrientationFilter,
}

/// Outcome of a selection
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected photos, best first for date orderings
    pub photos: Vec<PathBuf>,
    /// The view history was cleared to satisfy the request
    pub history_reset: bool,
    /// The scan stopped early; `photos` is partial
    pub cancelled: bool,
}

impl Selection {
    /// Names of the selected photos
    pub fn names(&self) -> Vec<String> {
        self.photos.iter().filter_map(|p| photo_name(p)).collect()
    }
}

/// Streaming selector over one library directory
pub struct Selector<'a, R: Rng> {
    metadata: &'a mut MetadataStore,
    history: &'a ViewHistory,
    cancel: &'a CancelToken,
    rng: &'a mut R,
    extensions: &'a [String],
    flush_interval: usize,
}

impl<'a, R: Rng> Selector<'a, R> {
    pub fn new(
        metadata: &'a mut MetadataStore,
        history: &'a ViewHistory,
        cancel: &'a CancelToken,
        rng: &'a mut R,
        extensions: &'a [String],
    ) -> Self {
        Self {
            metadata,
            history,
            cancel,
            rng,
            extensions,
            flush_interval: 5_000,
        }
    }

    /// Flush the metadata cache every `interval` photos scanned by date
    pub fn with_flush_interval(mut self, interval: usize) -> Self {
        self.flush_interval = interval.max(1);
        self
    }

    /// Select photos for a request
    pub fn select(&mut self, request: &SelectionRequest) -> Selection {
        let _span = span!(Level::INFO, "select", order = ?request.order).entered();
        let source = PhotoSource::new(&request.source_dir, self.extensions);

        let photos = self.pass(&source, request, true);
        if self.cancel.is_cancelled() {
            info!(selected = photos.len(), "Selection cancelled");
            return Selection {
                photos,
                history_reset: false,
                cancelled: true,
            };
        }
        if photos.len() >= request.count {
            return Selection {
                photos,
                ..Selection::default()
            };
        }

        info!(
            found = photos.len(),
            requested = request.count,
            "Resetting history - not enough unviewed photos"
        );
        self.history.clear();
        if let Err(e) = self.history.flush() {
            error!(error = %e, "Error saving viewed photos");
        }

        let photos = self.pass(&source, request, false);
        Selection {
            photos,
            history_reset: true,
            cancelled: self.cancel.is_cancelled(),
        }
    }

    fn pass(
        &mut self,
        source: &PhotoSource,
        request: &SelectionRequest,
        skip_viewed: bool,
    ) -> Vec<PathBuf> {
        match request.order {
            OrderMode::Random => self.sample(source, request, skip_viewed),
            OrderMode::Newest | OrderMode::Oldest => self.by_date(source, request, skip_viewed),
        }
    }

    fn sample(
        &mut self,
        source: &PhotoSource,
        request: &SelectionRequest,
        skip_viewed: bool,
    ) -> Vec<PathBuf> {
        let cancel = self.cancel;
        let history = self.history;
        let metadata = &mut *self.metadata;
        let rng = &mut *self.rng;

        let candidates = source
            .photos()
            .take_while(|_| !cancel.is_cancelled())
            .filter(|path| {
                is_eligible(metadata, history, path, request.orientation, skip_viewed).is_some()
            });

        let selected = reservoir_sample(candidates, request.count, rng);
        debug!(selected = selected.len(), skip_viewed, "Reservoir pass complete");
        selected
    }

    fn by_date(
        &mut self,
        source: &PhotoSource,
        request: &SelectionRequest,
        skip_viewed: bool,
    ) -> Vec<PathBuf> {
        info!(
            count = request.count,
            order = ?request.order,
            "Selecting photos by date (scanning library)..."
        );

        let mut top = BoundedTopK::new(request.count);
        let mut processed = 0usize;

        for (seq, path) in source.photos().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(name) =
                is_eligible(self.metadata, self.history, &path, request.orientation, skip_viewed)
            else {
                continue;
            };

            processed += 1;
            if processed % self.flush_interval == 0 {
                info!(processed, "Scanned photos...");
                if let Err(e) = self.metadata.flush() {
                    error!(error = %e, "Error saving metadata cache");
                }
            }

            let date = self.metadata.date(&name, &path);
            top.push(rank(request.order, date, seq), path);
        }

        info!(processed, "Scan complete");
        if let Err(e) = self.metadata.flush() {
            error!(error = %e, "Error saving metadata cache");
        }

        top.into_sorted_vec()
    }
}

/// Name of the photo when it passes the history and orientation checks
fn is_eligible(
    metadata: &mut MetadataStore,
    history: &ViewHistory,
    path: &Path,
    filter: OrientationFilter,
    skip_viewed: bool,
) -> Option<String> {
    let name = photo_name(path)?;
    if skip_viewed && history.contains(&name) {
        return None;
    }
    if filter != OrientationFilter::Both
        && !matches_filter(metadata.orientation(&name, path), filter)
    {
        return None;
    }
    Some(name)
}

/// Uniform sample of up to `k` items from a stream of unknown length.
///
/// The first `k` items fill the reservoir; the item at position `i` after that
/// replaces a uniformly chosen slot with probability `k / (i + 1)`.
pub fn reservoir_sample<T, I, R>(items: I, k: usize, rng: &mut R) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    R: Rng,
{
    let mut reservoir = Vec::with_capacity(k.min(1024));
    if k == 0 {
        return reservoir;
    }

    for (i, item) in items.into_iter().enumerate() {
        if i < k {
            reservoir.push(item);
        } else {
            let j = rng.random_range(0..=i);
            if j < k {
                reservoir[j] = item;
            }
        }
    }

    reservoir
}

/// Total order over timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
struct DateKey(Timestamp);

impl Eq for DateKey {}

impl PartialOrd for DateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Rank of a photo: greater is better. Ties on the date go to the photo seen
/// first in the directory stream.
type Rank = (DateKey, Reverse<usize>);

fn rank(order: OrderMode, date: Timestamp, seq: usize) -> Rank {
    let date = match order {
        OrderMode::Oldest => -date,
        _ => date,
    };
    (DateKey(date), Reverse(seq))
}

struct Ranked<K, T> {
    key: K,
    item: T,
}

impl<K: Ord, T> PartialEq for Ranked<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Ord, T> Eq for Ranked<K, T> {}

impl<K: Ord, T> PartialOrd for Ranked<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> Ord for Ranked<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Keeps the `capacity` greatest-keyed items of a stream.
///
/// A min-heap holds the current winners; its root is the weakest one and is
/// evicted when a better item arrives.
struct BoundedTopK<K: Ord, T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<K, T>>>,
}

impl<K: Ord, T> BoundedTopK<K, T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
        }
    }

    fn push(&mut self, key: K, item: T) {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(Ranked { key, item }));
            return;
        }
        if let Some(Reverse(weakest)) = self.heap.peek()
            && key > weakest.key
        {
            self.heap.pop();
            self.heap.push(Reverse(Ranked { key, item }));
        }
    }

    /// Items ordered best first
    fn into_sorted_vec(self) -> Vec<T> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked.item)
            .collect()
    }
}
