use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tracing::{debug, info, warn};

use crate::buffer::{BlockRead, SampleQueue};
use crate::error;

/// Blocks of audio held in the queue before old samples start being dropped.
const QUEUE_BLOCKS: usize = 8;

/// Anything that can hand the render loop one full block of mono samples.
pub trait SampleSource {
    /// Fill `out` completely, or report cancellation once `shutdown` is set.
    fn read_block(&mut self, out: &mut [f32], shutdown: &AtomicBool)
        -> error::Result<BlockRead>;
}

/// Mono f32 input stream from a cpal device.
pub struct Capture {
    queue: Arc<SampleQueue>,
    _stream: Stream,
}

impl Capture {
    pub fn open(device_name: Option<&str>, sample_rate: u32, window: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, device_name)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("using input device: {}", name);

        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        info!(
            "opening stream: {}hz, 1 channel, f32, {} samples per frame",
            sample_rate, window
        );

        let queue = Arc::new(SampleQueue::new(window * QUEUE_BLOCKS));
        let producer = Arc::clone(&queue);
        let failures = Arc::clone(&queue);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let dropped = producer.push(data);
                    if dropped > 0 {
                        debug!("sample queue full, dropped {} samples", dropped);
                    }
                },
                move |err| {
                    tracing::error!("audio stream error: {}", err);
                    failures.fail(err.to_string());
                },
                None,
            )
            .with_context(|| format!("failed to open input stream on {}", name))?;

        stream.play().context("failed to start input stream")?;

        Ok(Self {
            queue,
            _stream: stream,
        })
    }
}

impl SampleSource for Capture {
    fn read_block(
        &mut self,
        out: &mut [f32],
        shutdown: &AtomicBool,
    ) -> error::Result<BlockRead> {
        self.queue.read_block(out, shutdown)
    }
}

fn select_device(host: &cpal::Host, device_name: Option<&str>) -> Result<Device> {
    match device_name {
        Some(wanted) => {
            let mut devices = host
                .input_devices()
                .context("failed to enumerate input devices")?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| anyhow!("input device {:?} not found", wanted))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device available")),
    }
}

/// Print every input device with its first supported config.
pub fn list_input_devices() -> Result<()> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("failed to enumerate input devices")?;

    for device in devices {
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown device".to_string());
        match device.supported_input_configs() {
            Ok(mut configs) => match configs.next() {
                Some(config) => println!(
                    "{} ({}-{}hz, {} channels, {:?})",
                    name,
                    config.min_sample_rate().0,
                    config.max_sample_rate().0,
                    config.channels(),
                    config.sample_format()
                ),
                None => println!("{} (no supported configs)", name),
            },
            Err(e) => {
                warn!("config query failed for {}: {}", name, e);
                println!("{} (config query failed)", name);
            }
        }
    }
    Ok(())
}
