use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use wgpu::TextureFormatFeatureFlags;
use winit::window::Window;

use crate::types::{ContextOptions, PixelSize, PowerPreference};

/// Sample count requested when antialiasing is enabled.
const MSAA_SAMPLES: u32 = 4;

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
    pub transparent: bool,
}

impl GpuContext {
    pub(crate) fn new(window: Arc<Window>, options: &ContextOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let initial = window.inner_size();
        let surface = instance
            .create_surface(window)
            .context("failed to create rendering surface")?;

        let power_preference = match options.power_preference {
            PowerPreference::Low => wgpu::PowerPreference::LowPower,
            PowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        let is_software = info.device_type == wgpu::DeviceType::Cpu;
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            is_software,
            "selected GPU adapter"
        );
        if is_software && options.fail_if_major_performance_caveat {
            anyhow::bail!(
                "adapter {} is a software rasterizer and performance caveats are not allowed",
                info.name
            );
        }

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let format_features = adapter.get_texture_format_features(format);
        let mut sample_count = 1;
        if options.antialias {
            let supported = format_features.flags.supported_sample_counts();
            let resolvable = format_features
                .flags
                .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE);
            if supported.contains(&MSAA_SAMPLES) && resolvable && !is_software {
                sample_count = MSAA_SAMPLES;
            } else {
                tracing::warn!(
                    ?format,
                    ?supported,
                    "antialiasing requested but unavailable; rendering without MSAA"
                );
            }
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shadermount device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let alpha_mode = if options.alpha {
            caps.alpha_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::CompositeAlphaMode::PreMultiplied
                            | wgpu::CompositeAlphaMode::PostMultiplied
                    )
                })
                .unwrap_or(caps.alpha_modes[0])
        } else {
            caps.alpha_modes
                .iter()
                .copied()
                .find(|mode| *mode == wgpu::CompositeAlphaMode::Opaque)
                .unwrap_or(caps.alpha_modes[0])
        };
        let transparent = alpha_mode != wgpu::CompositeAlphaMode::Opaque;

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(caps.present_modes[0]);
        tracing::debug!(?format, ?alpha_mode, ?present_mode, sample_count, "surface configured");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: initial.width.max(1),
            height: initial.height.max(1),
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
            sample_count,
            transparent,
        })
    }

    pub(crate) fn size(&self) -> PixelSize {
        PixelSize::new(self.config.width, self.config.height)
    }

    /// Zero-sized requests are ignored; the surface keeps its last size.
    pub(crate) fn resize(&mut self, size: PixelSize) {
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

pub(crate) struct MultisampleTarget {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl MultisampleTarget {
    pub(crate) fn new(context: &GpuContext) -> Self {
        let extent = wgpu::Extent3d {
            width: context.config.width.max(1),
            height: context.config.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count: context.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: context.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
