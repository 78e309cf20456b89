/// GPU layer settings.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when one is offered.
    pub prefer_srgb: bool,

    /// Requested present mode. Falls back to FIFO when unsupported.
    ///
    /// FIFO paces frames to the display, which is the cadence the compositor expects.
    pub present_mode: wgpu::PresentMode,

    /// Alpha mode preference; a supported mode is chosen when this one is not.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Maximum queued frames hint.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
