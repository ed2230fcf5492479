use std::fmt;

use crate::backend::{ContextProvider, GpuBackend};
use crate::error::EngineError;

/// Negotiated feature level of an acquired context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityTier {
    /// Native-class backend with the adapter's full limits.
    Full,
    /// GL-class backend restricted to WebGL2-level limits.
    Reduced,
}

impl CapabilityTier {
    /// Acquisition order: best tier first.
    pub const PREFERENCE: [CapabilityTier; 2] = [CapabilityTier::Full, CapabilityTier::Reduced];

    pub fn name(self) -> &'static str {
        match self {
            CapabilityTier::Full => "full",
            CapabilityTier::Reduced => "reduced",
        }
    }

    /// Preprocessor symbol defined for shader sources built at this tier.
    pub fn shader_define(self) -> &'static str {
        match self {
            CapabilityTier::Full => "BACKDROP_TIER_FULL",
            CapabilityTier::Reduced => "BACKDROP_TIER_REDUCED",
        }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel size of the drawing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Owns the backend for one engine lifetime along with the surface size the
/// next draw will use.
pub struct GraphicsContext<B: GpuBackend> {
    backend: B,
    tier: CapabilityTier,
    surface: SurfaceSize,
}

impl<B: GpuBackend> GraphicsContext<B> {
    /// Tries each tier in [`CapabilityTier::PREFERENCE`] order and keeps the
    /// first backend that comes up.
    pub fn acquire<P>(provider: &mut P, surface: SurfaceSize) -> Result<Self, EngineError>
    where
        P: ContextProvider<Backend = B>,
    {
        let mut failures = Vec::new();
        for tier in CapabilityTier::PREFERENCE {
            match provider.try_acquire(tier, surface) {
                Ok(backend) => {
                    match tier {
                        CapabilityTier::Full => {
                            tracing::info!(%tier, "rendering context initialised")
                        }
                        CapabilityTier::Reduced => tracing::warn!(
                            %tier,
                            "rendering context initialised at reduced tier; some shader features may be unavailable"
                        ),
                    }
                    return Ok(Self {
                        backend,
                        tier,
                        surface,
                    });
                }
                Err(err) => {
                    tracing::debug!(%tier, error = %err, "context acquisition failed");
                    failures.push(format!("{tier}: {err:#}"));
                }
            }
        }
        Err(EngineError::ContextUnavailable {
            details: failures.join("; "),
        })
    }

    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    /// Records the new surface size. Safe to call at any time; the next draw
    /// picks it up.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.width == width && self.surface.height == height {
            return;
        }
        tracing::debug!(width, height, "surface resized");
        self.surface.width = width;
        self.surface.height = height;
        self.backend.resize(width, height);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
