// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CI Microbenchmarks
//!
//! Purpose:
//! - Provide a fast, stable(ish) microbenchmark pack suitable for CI gating.
//! - Focus on CPU hot paths relevant to real-time behavior.
//!
//! Notes:
//! - Keep runtime low (GitHub-hosted runners are noisy and slower).
//! - Prefer fixed inputs and avoid I/O.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use feagi_npu_burst_engine::{
    BackendConfig, BackendType, CPUBackend, ComputeBackend, NpuConfig, RustNPU,
    SynapticPropagationEngine,
};
use feagi_npu_neural::types::{FireCandidateList, NeuronId, QuantizationRange, SynapseType};
use feagi_npu_neural::LIFParameters;
use feagi_npu_runtime::{
    IdReusePolicy, NeuronStorage, SourceIndex, StdNeuronArray, StdSynapseArray, SynapseStorage,
};

fn create_test_network(
    neuron_count: usize,
    synapses_per_neuron: usize,
) -> (StdNeuronArray<f32>, StdSynapseArray) {
    let mut neurons = StdNeuronArray::new(
        neuron_count,
        QuantizationRange::default(),
        IdReusePolicy::Tombstone,
    );
    let mut synapses = StdSynapseArray::new(
        neuron_count * synapses_per_neuron,
        IdReusePolicy::Tombstone,
    );

    let params = vec![LIFParameters::with_threshold(10.0); neuron_count];
    let areas = vec![0u32; neuron_count];
    let coords: Vec<_> = (0..neuron_count as u32).map(|i| (i, 0, 0)).collect();
    neurons
        .add_neurons_batch(&params, &areas, &coords)
        .expect("neurons fit");

    // Deterministic neighborhood connectivity, 25% inhibitory
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    let mut types = Vec::new();
    for source in 0..neuron_count {
        for offset in 0..synapses_per_neuron {
            sources.push(source as u32);
            targets.push(((source + offset + 1) % neuron_count) as u32);
            types.push(if offset % 4 == 0 {
                SynapseType::Inhibitory
            } else {
                SynapseType::Excitatory
            });
        }
    }
    let weights = vec![128u8; sources.len()];
    let psps = vec![200u8; sources.len()];
    synapses
        .add_synapses_batch(&sources, &targets, &weights, &psps, &types)
        .expect("synapses fit");

    (neurons, synapses)
}

fn fired_sample(neuron_count: usize, firing_rate: f32) -> Vec<u32> {
    let fire_count = ((neuron_count as f32 * firing_rate) as usize).max(1);
    let stride = neuron_count / fire_count;
    (0..fire_count).map(|i| (i * stride) as u32).collect()
}

fn bench_source_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("ci_source_index");
    for neuron_count in [1_000usize, 10_000] {
        let (_, synapses) = create_test_network(neuron_count, 10);
        group.throughput(Throughput::Elements(synapses.count() as u64));
        group.bench_with_input(
            BenchmarkId::new("build", neuron_count),
            &synapses,
            |b, synapses| b.iter(|| SourceIndex::build(black_box(synapses))),
        );
    }
    group.finish();
}

fn bench_ci_cpu_backend(c: &mut Criterion) {
    let mut group = c.benchmark_group("ci_cpu_backend");

    for neuron_count in [1_000usize, 10_000] {
        let (mut neurons, synapses) = create_test_network(neuron_count, 10);
        let fired = fired_sample(neuron_count, 0.01);

        let mut engine = SynapticPropagationEngine::new();
        engine.build_synapse_index(&synapses);
        group.throughput(Throughput::Elements((fired.len() * 10) as u64));
        group.bench_with_input(
            BenchmarkId::new("synaptic_propagation", neuron_count),
            &fired,
            |b, fired| {
                b.iter(|| {
                    let mut fcl = FireCandidateList::new();
                    engine.propagate(black_box(fired), &synapses, &mut fcl);
                    fcl
                })
            },
        );

        let mut backend = CPUBackend::new();
        let mut fcl = FireCandidateList::new();
        for i in (0..neuron_count).step_by(10) {
            fcl.add_candidate(NeuronId(i as u32), 0.5);
        }
        group.bench_function(BenchmarkId::new("neural_dynamics", neuron_count), |b| {
            b.iter(|| {
                <CPUBackend as ComputeBackend<f32, StdNeuronArray<f32>, StdSynapseArray>>::process_neural_dynamics(
                    &mut backend,
                    black_box(&fcl),
                    &mut neurons,
                    1,
                )
                .expect("dynamics")
            })
        });
    }

    group.finish();
}

fn bench_full_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("ci_full_burst");
    let neuron_count = 10_000usize;

    let mut npu = RustNPU::<f32>::new(NpuConfig {
        neuron_capacity: neuron_count,
        synapse_capacity: neuron_count * 10,
        backend: BackendConfig::default().with_override(BackendType::CPU),
        ..NpuConfig::default()
    })
    .expect("npu");
    let (_, template) = create_test_network(neuron_count, 10);
    let params = vec![LIFParameters::with_threshold(10.0); neuron_count];
    let areas = vec![2u32; neuron_count];
    let coords: Vec<_> = (0..neuron_count as u32).map(|i| (i, 0, 0)).collect();
    npu.add_neurons_batch(&params, &areas, &coords).expect("neurons");
    npu.add_synapses_batch(
        template.source_neurons(),
        template.target_neurons(),
        template.weights(),
        template.postsynaptic_potentials(),
        template.types(),
    )
    .expect("synapses");
    for id in fired_sample(neuron_count, 0.01) {
        npu.add_power_neuron(NeuronId(id)).expect("power neuron");
    }
    npu.set_power_amount(20.0);
    npu.finalize_network().expect("finalize");

    group.bench_function("process_burst_10k", |b| {
        b.iter(|| npu.process_burst().expect("burst"))
    });
    group.finish();
}

fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(1))
        .sample_size(20)
}

criterion_group! {
    name = ci_microbench;
    config = criterion_config();
    targets = bench_source_index, bench_ci_cpu_backend, bench_full_burst
}
criterion_main!(ci_microbench);
