use std::{hint::black_box, io::Cursor, sync::Arc, time::Duration};

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hound::{SampleFormat as HoundFormat, WavSpec};
use wav_codec::{ContainerKind, WavReader, WavWriter, WriteFormat};

const SAMPLE_RATES: &[u32] = &[44_100, 96_000];
const CHANNEL_OPTIONS: &[u16] = &[1, 2, 6];
const CONTAINERS: &[ContainerKind] = &[
    ContainerKind::Riff,
    ContainerKind::Rf64,
    ContainerKind::Wave64,
];
const SIGNAL_DURATION_MS: u64 = 250;
const READ_CHUNK_FRAMES: usize = 4096;

type Group<'a> = criterion::BenchmarkGroup<'a, criterion::measurement::WallTime>;

fn bench_wav_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("wav_read");
    configure_group(&mut group);

    for &sample_rate in SAMPLE_RATES {
        for &channels in CHANNEL_OPTIONS {
            let label = case_label(sample_rate, channels);
            let signal = generate_signal(sample_rate, channels);

            let pcm16 = encode(WriteFormat::pcm(channels, sample_rate, 16), &signal);
            group.throughput(Throughput::Bytes(pcm16.len() as u64));
            bench_codec_read_i16(&mut group, Arc::clone(&pcm16), &label);
            bench_hound_read_i16(&mut group, pcm16, &label);

            let float = encode(WriteFormat::float(channels, sample_rate, 32), &signal);
            group.throughput(Throughput::Bytes(float.len() as u64));
            bench_codec_read_f32(&mut group, Arc::clone(&float), &label);
            bench_hound_read_f32(&mut group, float, &label);
        }
    }

    group.finish();
}

fn bench_wav_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("wav_write");
    configure_group(&mut group);

    for &sample_rate in SAMPLE_RATES {
        for &channels in CHANNEL_OPTIONS {
            let label = case_label(sample_rate, channels);
            let signal = Arc::new(generate_signal(sample_rate, channels));
            let payload_bytes = (signal.len() * 2) as u64;

            group.throughput(Throughput::Bytes(payload_bytes));
            for &container in CONTAINERS {
                let format = WriteFormat::pcm(channels, sample_rate, 16).in_container(container);
                bench_codec_write(&mut group, format, Arc::clone(&signal), &label);
            }
            bench_hound_write(&mut group, sample_rate, channels, signal, &label);
        }
    }

    group.finish();
}

fn bench_wav_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("wav_seek");
    configure_group(&mut group);

    let signal = generate_signal(48_000, 2);
    for &container in CONTAINERS {
        let format = WriteFormat::pcm(2, 48_000, 24).in_container(container);
        let bytes = encode(format, &signal);
        let total_frames = (signal.len() / 2) as u64;
        let targets: Vec<u64> = (0..64u64)
            .map(|i| (i * 7919) % total_frames)
            .collect();

        group.bench_function(BenchmarkId::new("scattered", container.as_str()), |b| {
            b.iter_batched(
                || WavReader::open(Cursor::new(Arc::clone(&bytes))).expect("open wav"),
                |mut reader| {
                    let mut frame = [0i32; 2];
                    for &target in &targets {
                        reader.seek_to_frame(target).expect("seek");
                        reader.read_pcm_frames_s32(&mut frame).expect("read");
                        black_box(frame);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_codec_read_i16(group: &mut Group<'_>, bytes: Arc<[u8]>, case_label: &str) {
    let bench_id = BenchmarkId::new("codec-i16", case_label);
    group.bench_function(bench_id, move |b| {
        b.iter_batched(
            || WavReader::open(Cursor::new(Arc::clone(&bytes))).expect("open wav"),
            |mut reader| {
                let channels = reader.channels() as usize;
                let mut chunk = vec![0i16; READ_CHUNK_FRAMES * channels];
                let mut samples = Vec::with_capacity(reader.total_frames() as usize * channels);
                loop {
                    let frames = reader.read_pcm_frames_s16(&mut chunk).expect("read wav");
                    if frames == 0 {
                        break;
                    }
                    samples.extend_from_slice(&chunk[..frames as usize * channels]);
                }
                black_box(samples);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_codec_read_f32(group: &mut Group<'_>, bytes: Arc<[u8]>, case_label: &str) {
    let bench_id = BenchmarkId::new("codec-f32", case_label);
    group.bench_function(bench_id, move |b| {
        b.iter_batched(
            || WavReader::open(Cursor::new(Arc::clone(&bytes))).expect("open wav"),
            |mut reader| {
                let channels = reader.channels() as usize;
                let mut samples = vec![0f32; reader.total_frames() as usize * channels];
                let frames = reader.read_pcm_frames_f32(&mut samples).expect("read wav");
                black_box((frames, samples));
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_hound_read_i16(group: &mut Group<'_>, bytes: Arc<[u8]>, case_label: &str) {
    let bench_id = BenchmarkId::new("hound-i16", case_label);
    group.bench_function(bench_id, move |b| {
        b.iter_batched(
            || hound::WavReader::new(Cursor::new(Arc::clone(&bytes))).expect("open wav"),
            |mut reader| {
                let samples: Vec<i16> = reader
                    .samples::<i16>()
                    .map(|result| result.expect("hound read"))
                    .collect();
                black_box(samples);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_hound_read_f32(group: &mut Group<'_>, bytes: Arc<[u8]>, case_label: &str) {
    let bench_id = BenchmarkId::new("hound-f32", case_label);
    group.bench_function(bench_id, move |b| {
        b.iter_batched(
            || hound::WavReader::new(Cursor::new(Arc::clone(&bytes))).expect("open wav"),
            |mut reader| {
                let samples: Vec<f32> = reader
                    .samples::<f32>()
                    .map(|result| result.expect("hound read"))
                    .collect();
                black_box(samples);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_codec_write(
    group: &mut Group<'_>,
    format: WriteFormat,
    signal: Arc<Vec<i16>>,
    case_label: &str,
) {
    let bench_id = BenchmarkId::new(format!("codec-{}", format.container), case_label);
    let capacity = buffer_capacity(signal.len() * 2);
    group.bench_function(bench_id, move |b| {
        b.iter_batched(
            || Cursor::new(Vec::with_capacity(capacity)),
            |mut out| {
                let mut writer = WavWriter::create(&mut out, format).expect("writer");
                writer.write_frames_i16(&signal).expect("write wav");
                writer.finalize().expect("finalize");
                drop(writer);
                black_box(out);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_hound_write(
    group: &mut Group<'_>,
    sample_rate: u32,
    channels: u16,
    signal: Arc<Vec<i16>>,
    case_label: &str,
) {
    let bench_id = BenchmarkId::new("hound-RIFF", case_label);
    let capacity = buffer_capacity(signal.len() * 2);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: HoundFormat::Int,
    };
    group.bench_function(bench_id, move |b| {
        b.iter_batched(
            || Cursor::new(Vec::with_capacity(capacity)),
            |writer| {
                let mut wav_writer = hound::WavWriter::new(writer, spec).expect("hound writer");
                for sample in signal.iter() {
                    wav_writer.write_sample(*sample).expect("hound write");
                }
                wav_writer.finalize().expect("finalize");
            },
            BatchSize::SmallInput,
        );
    });
}

fn configure_group(group: &mut Group<'_>) {
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(8));
}

/// Interleaved chirp with a different phase per channel
fn generate_signal(sample_rate: u32, channels: u16) -> Vec<i16> {
    let frames = (sample_rate as u64 * SIGNAL_DURATION_MS / 1000) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for n in 0..frames {
        let t = n as f64 / sample_rate as f64;
        let freq = 220.0 + 1760.0 * t;
        for ch in 0..channels {
            let phase = ch as f64 * std::f64::consts::FRAC_PI_3;
            let value = (2.0 * std::f64::consts::PI * freq * t + phase).sin() * 0.8;
            samples.push((value * i16::MAX as f64) as i16);
        }
    }
    samples
}

fn encode(format: WriteFormat, signal: &[i16]) -> Arc<[u8]> {
    let mut out = Cursor::new(Vec::with_capacity(buffer_capacity(signal.len() * 4)));
    let mut writer = WavWriter::create(&mut out, format).expect("writer");
    writer.write_frames_i16(signal).expect("write wav");
    writer.finalize().expect("finalize");
    drop(writer);
    Arc::from(out.into_inner())
}

fn case_label(sample_rate: u32, channels: u16) -> String {
    format!("{}Hz_{}ch", sample_rate, channels)
}

fn buffer_capacity(payload: usize) -> usize {
    payload + 1024
}

criterion_group!(
    name = wav_benches;
    config = Criterion::default()
        .sample_size(50)
        .warm_up_time(Duration::from_secs(3))
        .measurement_time(Duration::from_secs(8))
        .configure_from_args();
    targets = bench_wav_read, bench_wav_write, bench_wav_seek
);
criterion_main!(wav_benches);
