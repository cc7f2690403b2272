//! Synthetic test material: noise source and reverb impulse response

/// Xorshift noise source, reproducible from its seed
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        // Xorshift has a fixed point at zero
        Self { state: seed.max(1) }
    }

    /// Next value in [-1.0, 1.0]
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
    }
}

/// Shape of the generated impulse response
#[derive(Debug, Clone, Copy)]
pub struct IrShape {
    /// Total length in milliseconds
    pub length_ms: f32,
    /// Time for the envelope to fall by 60dB, in seconds
    pub rt60: f32,
    /// Number of discrete reflections ahead of the diffuse tail
    pub reflections: usize,
}

/// Decaying noise tail plus discrete reflections, scaled to unit energy
///
/// Reflections sit one and a half blocks apart, so most of them straddle a
/// block boundary of the engine that will run the response.
pub fn synthetic_ir(sample_rate: u32, block_size: usize, shape: IrShape) -> Vec<f32> {
    let len = ((shape.length_ms * 0.001 * sample_rate as f32) as usize).max(1);
    // exp(-k·t) reaches -60dB (1/1000) at t = rt60
    let decay = 1000.0f32.ln() / shape.rt60.max(1e-3) / sample_rate as f32;
    let envelope = |pos: usize| (-decay * pos as f32).exp();

    let mut noise = Noise::new(sample_rate ^ (block_size as u32).rotate_left(16));
    let mut ir: Vec<f32> = (0..len)
        .map(|pos| 0.3 * noise.next_bipolar() * envelope(pos))
        .collect();
    ir[0] = 1.0;

    let spacing = (block_size * 3 / 2).max(1);
    for (pos, n) in (spacing..len).step_by(spacing).zip(0..shape.reflections) {
        let sign = if noise.next_bipolar() < 0.0 { -1.0 } else { 1.0 };
        ir[pos] += sign * 0.5 * envelope(pos) / (n + 1) as f32;
    }

    let energy: f32 = ir.iter().map(|s| s * s).sum();
    let scale = 1.0 / energy.sqrt();
    for s in ir.iter_mut() {
        *s *= scale;
    }
    ir
}

/// Input signal for the run: a 220Hz tone over low-level noise
pub struct TestSignal {
    noise: Noise,
    phase: f32,
    increment: f32,
}

impl TestSignal {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            noise: Noise::new(0x1234_5678),
            phase: 0.0,
            increment: 220.0 / sample_rate as f32,
        }
    }

    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let tone = (self.phase * std::f32::consts::TAU).sin();
            *sample = 0.5 * tone + 0.1 * self.noise.next_bipolar();
            self.phase = (self.phase + self.increment).fract();
        }
    }
}
