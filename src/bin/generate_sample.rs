//! Writes a synthetic band directory and optical parameter table:
//!
//! ```text
//! generate_sample [OUT_DIR]      (default: sample_data)
//!   OUT_DIR/K_band/<name>_K.txt
//!   OUT_DIR/optical_params.txt
//! ```

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Absolute magnitude of a double-humped NIR light curve. Brighter is more
/// negative, so each maximum is a dip.
fn magnitude(phase: f64, first: (f64, f64), second: (f64, f64)) -> f64 {
    -16.0 + 0.015 * phase - gaussian(phase, first.0, 5.0, first.1) - gaussian(phase, second.0, 7.0, second.1)
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct SyntheticObject {
    name: String,
    mu: f64,
    x0: f64,
    x1: f64,
    c: f64,
    m_b: f64,
    epochs: Vec<(f64, f64, f64)>,
}

fn synthesize(rng: &mut SimpleRng, name: String, n_epochs: usize) -> SyntheticObject {
    let first = (rng.uniform(-3.0, 3.0), rng.uniform(2.0, 2.5));
    let second = (rng.uniform(22.0, 35.0), rng.uniform(1.0, 1.6));
    let mu = rng.uniform(31.0, 36.0);
    // stretch tracks the second-maximum phase
    let x1 = (second.0 - 28.0) / 5.0 + rng.gauss(0.0, 0.2);
    let c = rng.gauss(0.0, 0.08);
    let m_b = mu - 19.3 - 0.14 * x1 + 3.1 * c + rng.gauss(0.0, 0.1);
    let x0 = 10f64.powf(-0.4 * (m_b - 10.6));

    let mut epochs = Vec::with_capacity(n_epochs);
    let mut phase = rng.uniform(-10.0, -5.0);
    for _ in 0..n_epochs {
        let err = rng.uniform(0.02, 0.08);
        let mag = magnitude(phase, first, second) + rng.gauss(0.0, err / 2.0);
        epochs.push((phase, mag, err));
        phase += rng.uniform(1.5, 5.0);
    }

    SyntheticObject {
        name,
        mu,
        x0,
        x1,
        c,
        m_b,
        epochs,
    }
}

fn photometry_file(obj: &SyntheticObject, band: &str) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "# {}   {band} band   synthetic", obj.name)?;
    // Hubble law with H0 = 70
    let z = 10f64.powf((obj.mu - 25.0) / 5.0) * 70.0 / 2.998e5;
    writeln!(out, "{z:.5} {z:.5} # (zhelio, zcmb)")?;
    writeln!(
        out,
        "{:.3} 0.050 {:.3} # (mu_Snoopy, err_mu_Snoopy, mu_LCDM)",
        obj.mu,
        obj.mu + 0.05
    )?;
    writeln!(out, "synthetic 1 # (survey, quality)")?;
    writeln!(out, "#")?;
    writeln!(out, "# Phase(T_Bmax) | App mag | Error App mag | Abs mag | Error Abs mag")?;
    for &(phase, mag, err) in &obj.epochs {
        writeln!(
            out,
            "{phase:8.3} {:8.3} {err:6.3} {mag:8.3} {err:6.3}",
            mag + obj.mu
        )?;
    }
    Ok(out)
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "sample_data".to_string());
    let out_dir = Path::new(&out_dir);
    let band = "K";
    let band_dir = out_dir.join(format!("{band}_band"));
    std::fs::create_dir_all(&band_dir)
        .with_context(|| format!("creating {}", band_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let mut objects: Vec<SyntheticObject> = (0..24)
        .map(|i| {
            let name = format!("sn20{:02}{}", 4 + i / 4, ["ab", "cd", "ef", "gh"][i % 4]);
            synthesize(&mut rng, name, 22)
        })
        .collect();
    // too few epochs to resample; reported as skipped
    objects.push(synthesize(&mut rng, "sn2003sparse".to_string(), 3));

    for obj in &objects {
        let path = band_dir.join(format!("{}_{band}.txt", obj.name));
        std::fs::write(&path, photometry_file(obj, band)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let mut table = String::from("# synthetic SALT2 and SNooPy fit parameters\n");
    table.push_str("SN_name mB x0 x1 c mu_Snoopy\n");
    // leave the last two out so the join has something to report
    for obj in &objects[..objects.len() - 2] {
        writeln!(
            table,
            "{} {:.3} {:.5e} {:.3} {:.3} {:.3}",
            obj.name, obj.m_b, obj.x0, obj.x1, obj.c, obj.mu
        )?;
    }
    let table_path = out_dir.join("optical_params.txt");
    std::fs::write(&table_path, table)
        .with_context(|| format!("writing {}", table_path.display()))?;

    log::info!("seed 42, {} objects", objects.len());
    println!(
        "Wrote {} light curves to {} and optical parameters to {}",
        objects.len(),
        band_dir.display(),
        table_path.display()
    );
    Ok(())
}
