use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use winit::window::Window;

use crate::backend::ContextProvider;
use crate::context::{CapabilityTier, SurfaceSize};

use super::backend::WgpuBackend;

/// Instance, device and configured surface for one acquired tier.
pub(crate) struct DeviceContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl DeviceContext {
    fn new(window: Arc<Window>, tier: CapabilityTier, size: SurfaceSize) -> Result<Self> {
        let backends = match tier {
            CapabilityTier::Full => wgpu::Backends::PRIMARY,
            CapabilityTier::Reduced => wgpu::Backends::GL,
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            %tier,
            "selected GPU adapter"
        );

        let required_limits = match tier {
            CapabilityTier::Full => {
                let downlevel = adapter.get_downlevel_capabilities();
                if !downlevel.is_webgpu_compliant() {
                    anyhow::bail!(
                        "adapter {} lacks downlevel flags {:?}",
                        adapter_info.name,
                        wgpu::DownlevelFlags::compliant() - downlevel.flags
                    );
                }
                adapter.limits()
            }
            CapabilityTier::Reduced => {
                wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
            }
        };

        let max_dimension = required_limits.max_texture_dimension_2d;
        let width = size.width.max(1);
        let height = size.height.max(1);
        if width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
            );
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("backdrop device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| surface_caps.present_modes.first().copied())
            .context("surface reports no present modes")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?format, ?present_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
        })
    }

    /// Reconfigures the swapchain when the size actually changed. Zero sizes
    /// are skipped; the surface keeps its last valid configuration.
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if self.config.width == width && self.config.height == height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Creates [`WgpuBackend`]s drawing into one window.
pub struct WgpuProvider {
    window: Arc<Window>,
}

impl WgpuProvider {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl ContextProvider for WgpuProvider {
    type Backend = WgpuBackend;

    fn try_acquire(&mut self, tier: CapabilityTier, surface: SurfaceSize) -> Result<WgpuBackend> {
        let context = DeviceContext::new(self.window.clone(), tier, surface)
            .with_context(|| format!("{tier} tier unavailable"))?;
        Ok(WgpuBackend::new(context))
    }
}
