use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use scan_cleaner::data::writer::save_scans;
use scan_cleaner::{Matrix, ScanRecord, ScanSet};

/// Write a synthetic dataset: metadata CSV, raw scans and background scans.
#[derive(Parser)]
#[command(name = "generate-sample", version)]
struct Args {
    /// Output directory
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Scan file format: json or parquet
    #[arg(long, default_value = "json")]
    format: String,

    /// Number of sensors
    #[arg(long, default_value_t = 4)]
    sensors: usize,

    /// Rows (samples) per scan
    #[arg(long, default_value_t = 200)]
    rows: usize,

    /// Columns (channels) per scan
    #[arg(long, default_value_t = 3)]
    channels: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// One scan: a few Gaussian peaks per channel plus noise, as a rows x channels matrix.
fn generate_scan(
    rows: usize,
    peaks: &[(f64, f64, f64)],
    channels: usize,
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Result<Matrix> {
    let mut data = Vec::with_capacity(rows * channels);
    for i in 0..rows {
        for ch in 0..channels {
            let gain = 1.0 + 0.25 * ch as f64;
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(i as f64, mu, sigma, amp * gain))
                .sum();
            data.push(signal + rng.gauss(0.0, noise_level));
        }
    }
    Matrix::new(rows, channels, data).context("scan size does not match its shape")
}

struct MetadataEntry {
    filename: String,
    sensor: String,
    repeat: usize,
    operator: &'static str,
}

fn write_metadata(path: &Path, entries: &[MetadataEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["filename", "sensor", "repeat", "operator"])?;
    for entry in entries {
        writer.write_record([
            entry.filename.as_str(),
            entry.sensor.as_str(),
            entry.repeat.to_string().as_str(),
            entry.operator,
        ])?;
    }
    writer.flush()?;
    Ok(())
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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Uniform integer in `-limit..=limit`.
    fn shift(&mut self, limit: usize) -> isize {
        let span = 2 * limit as u64 + 1;
        (self.next_u64() % span) as isize - limit as isize
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);
    let ext = match args.format.as_str() {
        "json" => "json",
        "parquet" => "parquet",
        other => anyhow::bail!("Unsupported format: {other}"),
    };

    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("creating {}", args.dir.display()))?;

    let rows = args.rows.max(8) as f64;
    let mut raw = ScanSet::new();
    let mut background = ScanSet::new();
    let mut metadata = Vec::new();
    let operators = ["Alice", "Bob"];

    for s in 0..args.sensors {
        let sensor = format!("S{}", s + 1);
        let peaks = vec![
            (rows * (0.2 + 0.1 * s as f64), rows / 40.0, 1.0),
            (rows * 0.6, rows / 25.0, 0.5 + 0.1 * s as f64),
        ];

        let base = generate_scan(args.rows, &peaks, args.channels, 0.0, &mut rng)?;
        for repeat in 0..3 {
            // repeat 0 is the reference position, later repeats drift
            let drift = if repeat == 0 { 0 } else { rng.shift(args.rows / 20) };
            let noise = generate_scan(args.rows, &[], args.channels, 0.02, &mut rng)?;
            let scan = base
                .roll_rows(drift)
                .zip_map(&noise, |a, b| a + b)
                .context("scan and noise shapes differ")?;
            let key = format!("{sensor}_{repeat}");
            metadata.push(MetadataEntry {
                filename: key.clone(),
                sensor: sensor.clone(),
                repeat,
                operator: operators[(s + repeat) % operators.len()],
            });
            raw.insert(key, ScanRecord { matrix: scan });
        }

        let ambient = generate_scan(
            args.rows,
            &[(rows * 0.5, rows / 3.0, 0.2)],
            args.channels,
            0.01,
            &mut rng,
        )?;
        background.insert(sensor, ScanRecord { matrix: ambient });
    }

    let metadata_path = args.dir.join("X_Metadata.csv");
    write_metadata(&metadata_path, &metadata)
        .with_context(|| format!("writing {}", metadata_path.display()))?;

    let raw_path = args.dir.join(format!("x_raw.{ext}"));
    save_scans(&raw_path, &raw).with_context(|| format!("writing {}", raw_path.display()))?;

    let background_path = args.dir.join(format!("X_background.{ext}"));
    save_scans(&background_path, &background)
        .with_context(|| format!("writing {}", background_path.display()))?;

    println!(
        "Wrote {} sensors ({} scans, {} x {} each) to {}",
        args.sensors,
        raw.len(),
        args.rows,
        args.channels,
        args.dir.display()
    );
    Ok(())
}
