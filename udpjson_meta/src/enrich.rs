//! Per-frame enrichment of tracked objects.
//!
//! The host pipeline exposes its frames through [`Frame`] and
//! [`TrackedObject`] and receives values through a [`MetadataSink`]. Once per
//! processing cycle it hands its frames to [`Enricher::process`], which looks
//! every tracked object up in the cache and attaches a copy of each fresh
//! value.
//!
//! Each frame is served from one shared-lock scope. The lock wait is bounded;
//! a frame whose scope could not be acquired in time is skipped for this cycle
//! rather than stalling the pipeline or the writer.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use udpjson_common::consts::UNTRACKED_OBJECT_ID;
use udpjson_common::meta::ObjectUserMeta;

use crate::cache::{CacheKey, TtlCache};
use crate::clock;

/// An object with a tracker-assigned identity.
pub trait TrackedObject {
    /// Tracker id, or [`UNTRACKED_OBJECT_ID`] when not yet assigned.
    fn object_id(&self) -> u64;
}

/// A frame of one source carrying tracked objects.
pub trait Frame {
    /// Object type enumerated by this frame.
    type Object: TrackedObject;

    /// Source (camera stream) the frame came from.
    fn source_id(&self) -> u32;

    /// Objects of the frame.
    fn objects_mut(&mut self) -> impl Iterator<Item = &mut Self::Object>;
}

/// Receiver of attached values.
///
/// The value is handed over by ownership; its lifetime is independent of the
/// cache entry it was copied from.
pub trait MetadataSink<O> {
    /// Attach `meta` to `object`.
    fn attach(&mut self, object: &mut O, meta: ObjectUserMeta);
}

impl<O, F> MetadataSink<O> for F
where
    F: FnMut(&mut O, ObjectUserMeta),
{
    fn attach(&mut self, object: &mut O, meta: ObjectUserMeta) {
        self(object, meta)
    }
}

/// Counters of one [`Enricher::process`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Frames seen.
    pub frames: u64,
    /// Frames skipped because shared access timed out.
    pub frames_skipped: u64,
    /// Objects seen in processed frames.
    pub objects: u64,
    /// Objects skipped as untracked.
    pub untracked: u64,
    /// Values attached.
    pub hits: u64,
    /// Tracked objects without a fresh value.
    pub misses: u64,
}

impl EnrichStats {
    fn merge(&mut self, other: EnrichStats) {
        self.frames += other.frames;
        self.frames_skipped += other.frames_skipped;
        self.objects += other.objects;
        self.untracked += other.untracked;
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

/// Cache reader for the processing cycle.
#[derive(Debug, Clone)]
pub struct Enricher {
    cache: Arc<TtlCache>,
    meta_key: String,
    lock_timeout: Duration,
}

impl Enricher {
    /// Create an enricher over `cache`.
    ///
    /// # Arguments
    /// * `meta_key` - Name stored in every attached value
    /// * `lock_timeout` - Upper bound on waiting for shared access per frame
    pub fn new(cache: Arc<TtlCache>, meta_key: impl Into<String>, lock_timeout: Duration) -> Self {
        Self {
            cache,
            meta_key: meta_key.into(),
            lock_timeout,
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    /// Enrich every frame of one processing cycle.
    pub fn process<'a, F, I, S>(&self, frames: I, sink: &mut S) -> EnrichStats
    where
        F: Frame + 'a,
        I: IntoIterator<Item = &'a mut F>,
        S: MetadataSink<F::Object>,
    {
        let ttl_ms = self.cache.ttl_ms();
        let mut stats = EnrichStats::default();
        for frame in frames {
            stats.merge(self.process_frame_with_ttl(frame, sink, ttl_ms));
        }
        stats
    }

    /// Enrich a single frame.
    pub fn process_frame<F, S>(&self, frame: &mut F, sink: &mut S) -> EnrichStats
    where
        F: Frame,
        S: MetadataSink<F::Object>,
    {
        self.process_frame_with_ttl(frame, sink, self.cache.ttl_ms())
    }

    fn process_frame_with_ttl<F, S>(&self, frame: &mut F, sink: &mut S, ttl_ms: u64) -> EnrichStats
    where
        F: Frame,
        S: MetadataSink<F::Object>,
    {
        let source_id = frame.source_id();
        let mut stats = EnrichStats {
            frames: 1,
            ..Default::default()
        };

        let done = self.cache.read_for(self.lock_timeout, |reader| {
            let now = Instant::now();
            for object in frame.objects_mut() {
                stats.objects += 1;
                let object_id = object.object_id();
                if object_id == UNTRACKED_OBJECT_ID {
                    stats.untracked += 1;
                    continue;
                }

                match reader.lookup(CacheKey::new(source_id, object_id), ttl_ms, now) {
                    Some(hit) => {
                        stats.hits += 1;
                        sink.attach(
                            object,
                            ObjectUserMeta {
                                key: self.meta_key.clone(),
                                value: hit.value.to_string(),
                                recv_ts_us: clock::monotonic_us(hit.received_at),
                            },
                        );
                    }
                    None => stats.misses += 1,
                }
            }
        });

        if done.is_none() {
            stats.frames_skipped = 1;
            debug!(
                "Skipped frame of source {}: cache busy for {:?}",
                source_id, self.lock_timeout
            );
        }
        stats
    }
}

/// Owned tracked object, for hosts without their own object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchObject {
    /// Tracker id.
    pub object_id: u64,
    /// Values attached so far.
    pub metadata: Vec<ObjectUserMeta>,
}

impl BatchObject {
    /// Object without metadata.
    pub fn new(object_id: u64) -> Self {
        Self {
            object_id,
            metadata: Vec::new(),
        }
    }

    /// Object without a tracker identity.
    pub fn untracked() -> Self {
        Self::new(UNTRACKED_OBJECT_ID)
    }
}

impl TrackedObject for BatchObject {
    fn object_id(&self) -> u64 {
        self.object_id
    }
}

/// Owned frame, for hosts without their own frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFrame {
    /// Source id.
    pub source_id: u32,
    /// Objects of the frame.
    pub objects: Vec<BatchObject>,
}

impl Frame for BatchFrame {
    type Object = BatchObject;

    fn source_id(&self) -> u32 {
        self.source_id
    }

    fn objects_mut(&mut self) -> impl Iterator<Item = &mut BatchObject> {
        self.objects.iter_mut()
    }
}

/// Sink appending to [`BatchObject::metadata`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendMetadata;

impl MetadataSink<BatchObject> for AppendMetadata {
    fn attach(&mut self, object: &mut BatchObject, meta: ObjectUserMeta) {
        object.metadata.push(meta);
    }
}
