#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use color_eyre::eyre;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gltracesim::{
    analyzer::Node,
    cache::{filter::IntraJob, Bypass, CacheModel, Config},
    classification, config,
    context::Context,
    packet::Packet,
    sink::Recorder,
    trace,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use trace_model::{Access, Device};

const NUM_PACKETS: u64 = 1 << 16;

fn context() -> eyre::Result<Context> {
    let config = config::Simulation {
        virtual_memory: config::VirtualMemory {
            enabled: false,
            ..config::VirtualMemory::default()
        },
        ..config::Simulation::default()
    };
    let ctx = Context::new(
        &config,
        Box::new(trace::Memory::new()),
        Box::new(classification::Memory::new()),
        Box::new(Recorder::new()),
    )?;
    Ok(ctx)
}

/// Random accesses over `working_set` bytes, grouped into jobs of 256 accesses.
fn random_packets(working_set: u64, seed: u64) -> Vec<Packet> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_PACKETS)
        .map(|i| {
            let addr = rng.gen_range(0..working_set) & !0x3;
            let access = if rng.gen_bool(0.2) {
                Access::write(addr, 4, None)
            } else {
                Access::read(addr, 4, None)
            };
            let mut packet = Packet::from_access(&access, i / 256, Device::GPU);
            packet.core_id = 1 + (i % 4) as usize;
            packet
        })
        .collect()
}

fn hierarchy(with_filter: bool) -> eyre::Result<Node> {
    let filters: Vec<Box<dyn gltracesim::cache::filter::SharingFilter>> = if with_filter {
        vec![Box::new(IntraJob::default())]
    } else {
        vec![]
    };
    let l1 = CacheModel::new("l1", Config::new(16 * 1024, 4, 64), Bypass::Never, filters)?;
    let l2 = CacheModel::new("l2", Config::new(512 * 1024, 16, 64), Bypass::Never, vec![])?;
    Ok(Node::new(Box::new(l1)).with_child(Node::new(Box::new(l2))))
}

fn run(node: &mut Node, ctx: &mut Context, packets: &[Packet]) -> eyre::Result<()> {
    for packet in packets {
        node.process(packet, ctx)?;
    }
    Ok(())
}

pub fn cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    group.throughput(Throughput::Elements(NUM_PACKETS));

    for working_set in [64 * 1024, 4 * 1024 * 1024] {
        let packets = random_packets(working_set, 42);
        for with_filter in [false, true] {
            let name = if with_filter { "intra-job-filter" } else { "plain" };
            group.bench_with_input(
                BenchmarkId::new(name, working_set),
                &packets,
                |b, packets| {
                    let mut ctx = context().unwrap();
                    let mut node = hierarchy(with_filter).unwrap();
                    b.iter(|| run(&mut node, &mut ctx, black_box(packets)).unwrap());
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, cache_benchmark);
criterion_main!(benches);
