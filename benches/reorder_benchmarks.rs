use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::io;

use ferrous_emit::{
    AlignmentRecord, OrderingPolicy, PairedOrder, RecordWriter, ReorderingBuffer, SingleEndOrder,
    StreamFlags, record_flags,
};

/// Records in the order an emitter produces them: mostly increasing
/// positions with local jitter up to `jitter` bases back.
fn generate_records(n: usize, jitter: u64, seed: u64) -> Vec<AlignmentRecord> {
    let mut rng = seed;
    let mut records = Vec::with_capacity(n);
    let mut pos = 1_000u64;

    for i in 0..n {
        rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
        pos += rng % 8;
        let back = (rng >> 16) % (jitter + 1);
        records.push(AlignmentRecord {
            reference_id: 0,
            start_position: (pos - back.min(pos)) as i32,
            read_id: (i as u32).wrapping_mul(2654435761) % 100_000,
            flags: if rng & 1 == 1 { record_flags::REVERSE } else { 0 },
            cigar: b"100=".to_vec(),
            score: (rng % 5) as i32,
            mate_position: (pos + 250) as i32,
            combo_score: (rng % 9) as i32,
            ..AlignmentRecord::default()
        });
    }
    records
}

fn bench_buffer_jitter(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_buffer_jitter");
    let n = 10_000;
    let distance = 607;

    for jitter in [0u64, 50, 300, 600].iter() {
        let records = generate_records(n, *jitter, 42);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("single_end", jitter), &records, |b, records| {
            b.iter(|| {
                let mut buffer = ReorderingBuffer::<_, SingleEndOrder>::new(
                    Vec::with_capacity(records.len()),
                    distance,
                    OrderingPolicy::Lenient,
                );
                for record in records {
                    let _ = buffer.add(record.clone());
                }
                black_box(buffer.into_sink().map(|out| out.len()))
            })
        });

        group.bench_with_input(BenchmarkId::new("paired", jitter), &records, |b, records| {
            b.iter(|| {
                let mut buffer = ReorderingBuffer::<_, PairedOrder>::new(
                    Vec::with_capacity(records.len()),
                    distance,
                    OrderingPolicy::Lenient,
                );
                for record in records {
                    let _ = buffer.add(record.clone());
                }
                black_box(buffer.into_sink().map(|out| out.len()))
            })
        });
    }

    group.finish();
}

/// Buffer plus encoding, as a worker runs it
fn bench_buffer_to_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_buffer_stream");
    let records = generate_records(10_000, 300, 7);
    group.throughput(Throughput::Elements(records.len() as u64));

    for (name, flags) in [
        ("single_end", StreamFlags::single_end()),
        ("paired_md", StreamFlags::paired().with_md(true)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let writer = RecordWriter::new(io::sink(), flags);
                let mut buffer =
                    ReorderingBuffer::<_, SingleEndOrder>::new(writer, 607, OrderingPolicy::Lenient);
                for record in &records {
                    let _ = buffer.add(record.clone());
                }
                black_box(buffer.into_sink().map(|w| w.records()))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_buffer_jitter, bench_buffer_to_stream);
criterion_main!(benches);
