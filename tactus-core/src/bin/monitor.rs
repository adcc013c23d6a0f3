#[cfg(not(feature = "audio-cpal"))]
fn main() {
    eprintln!("tactus monitor requires the 'audio-cpal' feature");
    std::process::exit(1);
}

#[cfg(feature = "audio-cpal")]
fn main() {
    if let Err(e) = run() {
        eprintln!("monitor failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(feature = "audio-cpal")]
fn run() -> Result<(), String> {
    use serde::Serialize;
    use std::path::PathBuf;
    use std::sync::{atomic::AtomicBool, Arc};
    use std::time::{Duration, Instant};

    use tactus_core::{FrameBuffer, RingCapture, SampleTime};

    /// Ring capacity: 2^17 = 131 072 frames ≈ 2.7 s at 48 kHz, plenty of
    /// headroom for a monitor that reads a sub-second tail.
    const RING_CAPACITY: usize = 1 << 17;

    #[derive(Debug)]
    struct Args {
        seconds: u64,
        tail_ms: u64,
        device: Option<String>,
        output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct Tick {
        elapsed_ms: u64,
        start_time: SampleTime,
        end_time: SampleTime,
        span_frames: usize,
        position: SampleTime,
        rms: Vec<f32>,
    }

    #[derive(Debug, Serialize)]
    struct Report {
        sample_rate: u32,
        channel_count: usize,
        capacity_frames: usize,
        tail_frames: usize,
        ticks: Vec<Tick>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut seconds: u64 = 5;
        let mut tail_ms: u64 = 100;
        let mut device: Option<String> = None;
        let mut output: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--seconds" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --seconds".into());
                    };
                    seconds = v
                        .parse::<u64>()
                        .map_err(|_| "invalid value for --seconds".to_string())?
                        .clamp(1, 600);
                }
                "--tail-ms" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --tail-ms".into());
                    };
                    tail_ms = v
                        .parse::<u64>()
                        .map_err(|_| "invalid value for --tail-ms".to_string())?
                        .clamp(1, 2_000);
                }
                "--device" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --device".into());
                    };
                    device = Some(v);
                }
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p tactus-core --bin monitor -- \\
  [--seconds <n>] [--tail-ms <n>] [--device <name>] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        Ok(Args {
            seconds,
            tail_ms,
            device,
            output,
        })
    }

    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;

    let running = Arc::new(AtomicBool::new(true));
    let (capture, consumer) = RingCapture::open_with_preference(
        RING_CAPACITY,
        Arc::clone(&running),
        args.device.as_deref(),
    )
    .map_err(|e| e.to_string())?;

    let tail_frames = ((capture.sample_rate as u64 * args.tail_ms / 1000) as usize)
        .clamp(1, consumer.capacity_frames());

    println!(
        "Monitoring {} ch @ {} Hz for {} s (tail {} frames)",
        capture.channel_count, capture.sample_rate, args.seconds, tail_frames
    );

    let mut sink = FrameBuffer::<f32>::new(capture.channel_count, tail_frames);
    let mut ticks = Vec::new();
    let started = Instant::now();

    while started.elapsed() < Duration::from_secs(args.seconds) {
        std::thread::sleep(Duration::from_millis(100));

        let position = capture.position();
        let start_read = position - tail_frames as SampleTime;
        consumer
            .fetch(&mut sink, tail_frames, start_read)
            .map_err(|e| e.to_string())?;

        let bounds = consumer.time_bounds();
        let levels: Vec<f32> = (0..capture.channel_count)
            .map(|ch| rms(sink.channel(ch)))
            .collect();

        println!(
            "{:>6} ms  window=[{}, {})  pos={}  rms={:?}",
            started.elapsed().as_millis(),
            bounds.start,
            bounds.end,
            position,
            levels
        );

        ticks.push(Tick {
            elapsed_ms: started.elapsed().as_millis() as u64,
            start_time: bounds.start,
            end_time: bounds.end,
            span_frames: bounds.span(),
            position,
            rms: levels,
        });
    }

    capture.stop();

    let report = Report {
        sample_rate: capture.sample_rate,
        channel_count: capture.channel_count,
        capacity_frames: consumer.capacity_frames(),
        tail_frames,
        ticks,
    };

    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote monitor report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
