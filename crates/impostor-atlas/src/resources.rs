//! Lease/return pools for chunk textures and materials.
//!
//! Pools mint opaque handles and recycle returned ones, so evicting a chunk
//! and creating another of the same atlas size reuses the GPU texture.
//! Access is single-threaded: leases and returns only happen on the frame
//! thread, outside the parallel stages.

use impostor_render::{MaterialHandle, TextureHandle};
use rustc_hash::FxHashMap;

/// First handle value minted by the pools. Values below it are left to the
/// host for its own scene textures and materials.
pub const POOL_HANDLE_BASE: u64 = 1 << 48;

/// Atlas render textures bucketed by resolution.
#[derive(Debug)]
pub struct TexturePool {
    free: FxHashMap<u32, Vec<TextureHandle>>,
    resolution_of: FxHashMap<TextureHandle, u32>,
    next: u64,
    leased: usize,
    use_mip_maps: bool,
}

impl TexturePool {
    /// Create an empty pool.
    pub fn new(use_mip_maps: bool) -> Self {
        Self {
            free: FxHashMap::default(),
            resolution_of: FxHashMap::default(),
            next: POOL_HANDLE_BASE,
            leased: 0,
            use_mip_maps,
        }
    }

    /// Lease a texture of `resolution × resolution`, reusing a returned one
    /// when available.
    pub fn lease(&mut self, resolution: u32) -> TextureHandle {
        self.leased += 1;
        if let Some(handle) = self.free.get_mut(&resolution).and_then(Vec::pop) {
            return handle;
        }
        let handle = TextureHandle(self.next);
        self.next += 1;
        self.resolution_of.insert(handle, resolution);
        log::debug!("Created atlas texture {:?} ({resolution}px)", handle);
        handle
    }

    /// Return a leased texture.
    pub fn give_back(&mut self, handle: TextureHandle) {
        let Some(&resolution) = self.resolution_of.get(&handle) else {
            log::warn!("Texture {:?} was not leased from this pool", handle);
            return;
        };
        self.leased = self.leased.saturating_sub(1);
        self.free.entry(resolution).or_default().push(handle);
    }

    /// Resolution of a texture created by this pool.
    pub fn resolution(&self, handle: TextureHandle) -> Option<u32> {
        self.resolution_of.get(&handle).copied()
    }

    /// Whether textures are created with a mip chain.
    pub fn use_mip_maps(&self) -> bool {
        self.use_mip_maps
    }

    /// Textures currently leased.
    pub fn leased_count(&self) -> usize {
        self.leased
    }

    /// Textures waiting for reuse.
    pub fn pooled_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Estimated GPU bytes across leased and pooled textures, assuming
    /// 4 bytes per texel and a full mip chain when mips are enabled.
    pub fn gpu_bytes(&self) -> u64 {
        let base: u64 = self
            .resolution_of
            .values()
            .map(|&r| u64::from(r) * u64::from(r) * 4)
            .sum();
        if self.use_mip_maps {
            base * 4 / 3
        } else {
            base
        }
    }
}

/// Chunk materials.
#[derive(Debug)]
pub struct MaterialPool {
    free: Vec<MaterialHandle>,
    next: u64,
    leased: usize,
}

impl MaterialPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            next: POOL_HANDLE_BASE,
            leased: 0,
        }
    }

    /// Lease a material.
    pub fn lease(&mut self) -> MaterialHandle {
        self.leased += 1;
        self.free.pop().unwrap_or_else(|| {
            let handle = MaterialHandle(self.next);
            self.next += 1;
            handle
        })
    }

    /// Return a leased material.
    pub fn give_back(&mut self, handle: MaterialHandle) {
        self.leased = self.leased.saturating_sub(1);
        self.free.push(handle);
    }

    /// Materials currently leased.
    pub fn leased_count(&self) -> usize {
        self.leased
    }

    /// Materials waiting for reuse.
    pub fn pooled_count(&self) -> usize {
        self.free.len()
    }
}

impl Default for MaterialPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_reused_per_resolution() {
        let mut pool = TexturePool::new(false);
        let a = pool.lease(2048);
        pool.give_back(a);
        assert_eq!(pool.pooled_count(), 1);

        let b = pool.lease(1024);
        assert_ne!(a, b);
        let c = pool.lease(2048);
        assert_eq!(a, c);
        assert_eq!(pool.leased_count(), 2);
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn test_unknown_texture_return_is_ignored() {
        let mut pool = TexturePool::new(false);
        pool.give_back(TextureHandle(1));
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn test_gpu_bytes_with_mips() {
        let mut pool = TexturePool::new(true);
        pool.lease(256);
        assert_eq!(pool.gpu_bytes(), 256 * 256 * 4 * 4 / 3);
    }

    #[test]
    fn test_material_round_trip() {
        let mut pool = MaterialPool::new();
        let a = pool.lease();
        assert!(a.0 >= POOL_HANDLE_BASE);
        pool.give_back(a);
        assert_eq!(pool.lease(), a);
        assert_eq!(pool.leased_count(), 1);
    }
}
