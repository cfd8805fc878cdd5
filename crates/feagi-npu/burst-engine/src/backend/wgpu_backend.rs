// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # WGPU Backend
//!
//! GPU-accelerated backend using WGPU (cross-platform GPU compute library).
//! Supports Metal (macOS), Vulkan (Linux), DirectX 12 (Windows).
//!
//! ## Data flow per burst
//!
//! ```text
//! propagation:  fired ids ──upload──▶ propagation_main (hash lookup, i32 atomicAdd)
//!                                     gather_main (compact touched targets)
//!               FCL ◀──download── [count, ids..] + [values..]
//!
//! dynamics:     FCL ──upload──▶ dynamics_main (sparse, one invocation per candidate)
//!               host stores ◀──download── [fired mask] + [potential, state] per candidate
//! ```
//!
//! Neuron parameters, membrane state and the synapse index stay resident between bursts.
//! The host store remains the source of truth: every dynamics download writes the visited
//! neurons back, so queries and a later switch to the CPU backend see the same state.
//!
//! Synaptic contributions are whole numbers (`weight × psp`, both 0-255), so accumulation
//! in `i32` is exact and independent of the order the GPU happens to run the atomics in.

use super::{ComputeBackend, DynamicsOutput};
use feagi_npu_neural::types::*;
use feagi_npu_runtime::{NeuronStorage, SourceIndex, SynapseStorage};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 256;
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Device encoding of "no upper bound" for the firing window
const NO_THRESHOLD_LIMIT: f32 = f32::MAX;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PropagationParams {
    fired_count: u32,
    hash_mask: u32,
    gather_bound: u32,
    _pad0: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DynamicsParams {
    fcl_count: u32,
    burst_count: u32,
    /// 0.0 for full precision networks
    quant_step: f32,
    code_lo: f32,
    code_hi: f32,
    _pad: [u32; 3],
}

/// Resident neuron state (one entry per slot)
struct NeuronBuffers {
    slots: usize,
    membrane_potentials: wgpu::Buffer,
    f32_params: wgpu::Buffer,
    static_params: wgpu::Buffer,
    dynamic_state: wgpu::Buffer,
    accumulator: wgpu::Buffer,
    touched_flags: wgpu::Buffer,
    touched_list: wgpu::Buffer,
    quant_step: f32,
    code_bounds: (f32, f32),
}

/// Resident synapse table plus its source index
struct SynapseBuffers {
    synapse_data: wgpu::Buffer,
    hash_keys: wgpu::Buffer,
    hash_metadata: wgpu::Buffer,
    synapse_list: wgpu::Buffer,
    /// Host copy, used to bound the gather dispatch and detect stale uploads
    index: SourceIndex,
}

/// WGPU backend for GPU acceleration
pub struct WGPUBackend {
    /// Backend name for logging
    name: String,

    device: wgpu::Device,
    queue: wgpu::Queue,

    propagation_pipeline: wgpu::ComputePipeline,
    gather_pipeline: wgpu::ComputePipeline,
    dynamics_pipeline: wgpu::ComputePipeline,

    neurons: Option<NeuronBuffers>,
    synapses: Option<SynapseBuffers>,

    max_binding_size: u64,
}

macro_rules! get_buffers {
    ($opt:expr, $what:literal) => {
        $opt.as_ref().ok_or_else(|| {
            Error::ComputationError(format!(
                "{} not uploaded; call initialize_persistent_data first",
                $what
            ))
        })?
    };
}

/// Whether a usable GPU adapter exists on this machine
pub(super) fn probe_adapter() -> bool {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .is_some()
}

/// (x, y) workgroup counts covering `items` invocations
fn dispatch_dims(items: usize) -> (u32, u32) {
    let groups = (items as u64).div_ceil(WORKGROUP_SIZE as u64).max(1);
    if groups <= MAX_WORKGROUPS_PER_DIM as u64 {
        (groups as u32, 1)
    } else {
        let rows = groups.div_ceil(MAX_WORKGROUPS_PER_DIM as u64);
        (MAX_WORKGROUPS_PER_DIM, rows as u32)
    }
}

impl WGPUBackend {
    /// Create a new WGPU backend and compile its pipelines
    pub fn new() -> Result<Self> {
        // Initialize WGPU
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Request adapter (GPU)
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| {
            Error::BackendInitializationFailed("Failed to find WGPU adapter".to_string())
        })?;

        let adapter_info = adapter.get_info();
        let backend_name = format!("WGPU ({} - {:?})", adapter_info.name, adapter_info.backend);

        // Request device and queue
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("FEAGI NPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| Error::BackendInitializationFailed(format!("Failed to create device: {}", e)))?;

        let propagation_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Synaptic Propagation Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("shaders/synaptic_propagation.wgsl").into(),
            ),
        });
        let dynamics_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("FCL Neural Dynamics Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("shaders/neural_dynamics_fcl.wgsl").into(),
            ),
        });

        let propagation_pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Synaptic Propagation Pipeline"),
                layout: None, // Auto-layout from shader
                module: &propagation_shader,
                entry_point: "propagation_main",
            });
        let gather_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("FCL Gather Pipeline"),
            layout: None,
            module: &propagation_shader,
            entry_point: "gather_main",
        });
        let dynamics_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("FCL Neural Dynamics Pipeline"),
            layout: None,
            module: &dynamics_shader,
            entry_point: "dynamics_main",
        });

        let max_binding_size = device.limits().max_storage_buffer_binding_size as u64;
        info!("{} ready (max storage binding {} bytes)", backend_name, max_binding_size);

        Ok(Self {
            name: backend_name,
            device,
            queue,
            propagation_pipeline,
            gather_pipeline,
            dynamics_pipeline,
            neurons: None,
            synapses: None,
            max_binding_size,
        })
    }

    /// Storage buffer initialized from `data`; empty inputs get one zero word
    fn storage_buffer<P: bytemuck::Pod>(&self, label: &str, data: &[P]) -> Result<wgpu::Buffer> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let zero = [0u8; 4];
        let contents = if bytes.is_empty() { &zero[..] } else { bytes };

        if contents.len() as u64 > self.max_binding_size {
            return Err(Error::CapacityExceeded {
                resource: "GPU storage buffer",
                requested: contents.len(),
                available: self.max_binding_size as usize,
            });
        }

        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            }))
    }

    fn uniform_buffer<P: bytemuck::Pod>(&self, label: &str, value: &P) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(value),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn bind_group(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        entries: &[(u32, &wgpu::Buffer)],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = entries
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        })
    }

    /// Copy `(buffer, byte_len)` regions into one staging buffer and read them back as u32 words
    fn read_back(&self, label: &str, regions: &[(&wgpu::Buffer, u64)]) -> Result<Vec<Vec<u32>>> {
        let total: u64 = regions.iter().map(|(_, len)| *len).sum();
        if total == 0 {
            return Ok(regions.iter().map(|_| Vec::new()).collect());
        }

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: total,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        let mut offset = 0u64;
        for (buffer, len) in regions {
            if *len > 0 {
                encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, offset, *len);
            }
            offset += len;
        }
        self.queue.submit(Some(encoder.finish()));

        // Map staging buffer to CPU memory (blocking)
        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        // Wait for mapping to complete
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| Error::ComputationError(format!("{}: map result never arrived", label)))?
            .map_err(|e| Error::ComputationError(format!("{}: failed to map buffer: {:?}", label, e)))?;

        let data = buffer_slice.get_mapped_range();
        let words: &[u32] = bytemuck::cast_slice(&data);
        let mut out = Vec::with_capacity(regions.len());
        let mut start = 0usize;
        for (_, len) in regions {
            let n = (*len / 4) as usize;
            out.push(words[start..start + n].to_vec());
            start += n;
        }

        // Unmap buffer
        drop(data);
        staging_buffer.unmap();

        Ok(out)
    }

    fn upload_neuron_arrays<N: NeuronStorage>(&mut self, neuron_array: &N) -> Result<()> {
        let range = *neuron_array.range();
        let n = neuron_array.slot_count();
        let slots = n.max(1);

        let membrane: Vec<f32> = neuron_array.membrane_potentials()[..n]
            .iter()
            .map(|v| v.to_f32(&range))
            .collect();

        // Interleaved: [threshold, threshold_limit, leak, resting, excitability]
        let mut f32_params = Vec::with_capacity(n * 5);
        // Interleaved: [refractory_period, consecutive_fire_limit]
        let mut static_params = Vec::with_capacity(n * 2);
        // Packed: countdown | count << 16
        let mut dynamic_state = Vec::with_capacity(n);
        for i in 0..n {
            f32_params.push(neuron_array.thresholds()[i].to_f32(&range));
            f32_params.push(
                neuron_array.threshold_limits()[i]
                    .map_or(NO_THRESHOLD_LIMIT, |limit| limit.to_f32(&range)),
            );
            f32_params.push(neuron_array.leak_coefficients()[i]);
            f32_params.push(neuron_array.resting_potentials()[i].to_f32(&range));
            f32_params.push(neuron_array.excitabilities()[i]);

            static_params.push(neuron_array.refractory_periods()[i] as u32);
            static_params.push(neuron_array.consecutive_fire_limits()[i] as u32);

            dynamic_state.push(
                neuron_array.refractory_countdowns()[i] as u32
                    | (neuron_array.consecutive_fire_counts()[i] as u32) << 16,
            );
        }

        let (quant_step, code_bounds) = match N::Value::PRECISION {
            Precision::INT8 => {
                let (lo, hi) = range.code_bounds();
                (range.step(), (lo as f32, hi as f32))
            }
            Precision::FP32 => (0.0, (0.0, 0.0)),
        };

        self.neurons = Some(NeuronBuffers {
            slots,
            membrane_potentials: self.storage_buffer("Membrane Potentials", &membrane)?,
            f32_params: self.storage_buffer("Neuron F32 Params", &f32_params)?,
            static_params: self.storage_buffer("Neuron Static Params", &static_params)?,
            dynamic_state: self.storage_buffer("Neuron Dynamic State", &dynamic_state)?,
            accumulator: self.storage_buffer("FCL Accumulator", &vec![0i32; slots])?,
            touched_flags: self.storage_buffer("FCL Touched Flags", &vec![0u32; slots])?,
            touched_list: self.storage_buffer("FCL Touched List", &vec![0u32; slots + 1])?,
            quant_step,
            code_bounds,
        });

        debug!("[WGPU] uploaded {} neuron slots ({})", n, N::Value::PRECISION);
        Ok(())
    }

    fn upload_synapse_arrays<S: SynapseStorage>(&mut self, synapse_array: &S) -> Result<()> {
        let n = synapse_array.slot_count();
        let mut synapse_data = Vec::with_capacity(n * 3);
        for i in 0..n {
            let syn_type: u32 = match synapse_array.types()[i] {
                SynapseType::Excitatory => 0,
                SynapseType::Inhibitory => 1,
            };
            synapse_data.push(synapse_array.source_neurons()[i]);
            synapse_data.push(synapse_array.target_neurons()[i]);
            synapse_data.push(
                (syn_type << 16)
                    | (synapse_array.postsynaptic_potentials()[i] as u32) << 8
                    | synapse_array.weights()[i] as u32,
            );
        }

        let index = SourceIndex::build(synapse_array);

        self.synapses = Some(SynapseBuffers {
            synapse_data: self.storage_buffer("Synapse Data", &synapse_data)?,
            hash_keys: self.storage_buffer("Synapse Hash Keys", index.keys())?,
            hash_metadata: self.storage_buffer("Synapse Hash Metadata", index.metadata())?,
            synapse_list: self.storage_buffer("Synapse List", index.synapse_list())?,
            index,
        });

        debug!("[WGPU] uploaded {} synapse slots", n);
        Ok(())
    }
}

impl<N: NeuronStorage, S: SynapseStorage> ComputeBackend<N::Value, N, S> for WGPUBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn process_synaptic_propagation(
        &mut self,
        fired_neurons: &[u32],
        synapse_storage: &S,
        fcl: &mut FireCandidateList,
    ) -> Result<usize> {
        let stale = self
            .synapses
            .as_ref()
            .map_or(true, |s| s.index.is_stale(synapse_storage));
        if stale {
            self.upload_synapse_arrays(synapse_storage)?;
        }

        let neurons = get_buffers!(self.neurons, "neuron arrays");
        let synapses = get_buffers!(self.synapses, "synapse arrays");

        let traversed: usize = fired_neurons
            .iter()
            .map(|&id| synapses.index.lookup(id).len())
            .sum();
        if traversed == 0 {
            return Ok(0);
        }
        let gather_bound = traversed.min(neurons.slots);

        let params = PropagationParams {
            fired_count: fired_neurons.len() as u32,
            hash_mask: (synapses.index.capacity() - 1) as u32,
            gather_bound: gather_bound as u32,
            _pad0: 0,
        };
        let fired_buffer = self.storage_buffer("Fired Neurons", fired_neurons)?;
        let gathered_buffer = self.storage_buffer("FCL Gathered", &vec![0f32; gather_bound])?;
        let params_buffer = self.uniform_buffer("Propagation Params", &params);

        // Previous burst left the flags and accumulator clear; only the counter is reset
        self.queue
            .write_buffer(&neurons.touched_list, 0, bytemuck::bytes_of(&0u32));

        let propagation_bind_group = self.bind_group(
            "Synaptic Propagation Bind Group",
            &self.propagation_pipeline,
            &[
                (0, &synapses.synapse_data),
                (1, &synapses.hash_keys),
                (2, &synapses.hash_metadata),
                (3, &synapses.synapse_list),
                (4, &fired_buffer),
                (5, &neurons.accumulator),
                (6, &neurons.touched_flags),
                (7, &neurons.touched_list),
                (8, &params_buffer),
            ],
        );
        let gather_bind_group = self.bind_group(
            "FCL Gather Bind Group",
            &self.gather_pipeline,
            &[
                (5, &neurons.accumulator),
                (6, &neurons.touched_flags),
                (7, &neurons.touched_list),
                (8, &params_buffer),
                (9, &gathered_buffer),
            ],
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Synaptic Propagation"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Synaptic Propagation Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.propagation_pipeline);
            pass.set_bind_group(0, &propagation_bind_group, &[]);
            let (x, y) = dispatch_dims(fired_neurons.len());
            pass.dispatch_workgroups(x, y, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("FCL Gather Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.gather_pipeline);
            pass.set_bind_group(0, &gather_bind_group, &[]);
            let (x, y) = dispatch_dims(gather_bound);
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        let words = self.read_back(
            "Download FCL",
            &[
                (&neurons.touched_list, (gather_bound as u64 + 1) * 4),
                (&gathered_buffer, gather_bound as u64 * 4),
            ],
        )?;
        let (touched, values) = (&words[0], &words[1]);
        let count = (touched[0] as usize).min(gather_bound);

        fcl.reserve(count);
        for i in 0..count {
            fcl.add_candidate(NeuronId(touched[i + 1]), f32::from_bits(values[i]));
        }

        Ok(traversed)
    }

    fn process_neural_dynamics(
        &mut self,
        fcl: &FireCandidateList,
        neuron_storage: &mut N,
        burst_count: u64,
    ) -> Result<DynamicsOutput> {
        let neurons = get_buffers!(self.neurons, "neuron arrays");
        if neuron_storage.slot_count() > neurons.slots {
            return Err(Error::ComputationError(format!(
                "neuron store grew to {} slots but only {} are resident",
                neuron_storage.slot_count(),
                neurons.slots
            )));
        }

        let candidates: Vec<(u32, f32)> = fcl
            .sorted_entries()
            .into_iter()
            .filter(|(id, _)| neuron_storage.is_valid(NeuronId(*id)))
            .collect();
        if candidates.is_empty() {
            return Ok(DynamicsOutput::default());
        }

        let neurons_in_refractory = candidates
            .iter()
            .filter(|(id, _)| neuron_storage.refractory_countdowns()[*id as usize] > 0)
            .count();

        let ids: Vec<u32> = candidates.iter().map(|(id, _)| *id).collect();
        let potentials: Vec<f32> = candidates.iter().map(|(_, p)| *p).collect();
        let count = candidates.len();
        let mask_words = count.div_ceil(32);

        let params = DynamicsParams {
            fcl_count: count as u32,
            burst_count: burst_count as u32,
            quant_step: neurons.quant_step,
            code_lo: neurons.code_bounds.0,
            code_hi: neurons.code_bounds.1,
            _pad: [0; 3],
        };
        let ids_buffer = self.storage_buffer("FCL Neuron IDs", &ids)?;
        let potentials_buffer = self.storage_buffer("FCL Potentials", &potentials)?;
        let mask_buffer = self.storage_buffer("FCL Fired Mask", &vec![0u32; mask_words])?;
        let out_buffer = self.storage_buffer("FCL Dynamics Output", &vec![0u32; count * 2])?;
        let params_buffer = self.uniform_buffer("Dynamics Params", &params);

        let bind_group = self.bind_group(
            "FCL Neural Dynamics Bind Group",
            &self.dynamics_pipeline,
            &[
                (0, &ids_buffer),
                (1, &potentials_buffer),
                (2, &neurons.membrane_potentials),
                (3, &neurons.f32_params),
                (4, &neurons.static_params),
                (5, &neurons.dynamic_state),
                (6, &mask_buffer),
                (7, &out_buffer),
                (8, &params_buffer),
            ],
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FCL Neural Dynamics"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("FCL Neural Dynamics Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.dynamics_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (x, y) = dispatch_dims(count);
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        let words = self.read_back(
            "Download FCL Dynamics",
            &[
                (&mask_buffer, mask_words as u64 * 4),
                (&out_buffer, count as u64 * 8),
            ],
        )?;
        let (mask, out) = (&words[0], &words[1]);

        // Write visited neurons back so the host store stays authoritative
        let range = *neuron_storage.range();
        let mut output = DynamicsOutput {
            neurons_processed: count,
            neurons_in_refractory,
            ..DynamicsOutput::default()
        };
        for (i, &id) in ids.iter().enumerate() {
            let idx = id as usize;
            let fired = mask[i / 32] & (1 << (i % 32)) != 0;
            let potential = f32::from_bits(out[i * 2]);
            let state = out[i * 2 + 1];

            neuron_storage.refractory_countdowns_mut()[idx] = (state & 0xffff) as u16;
            neuron_storage.consecutive_fire_counts_mut()[idx] = (state >> 16) as u16;
            if fired {
                let resting = neuron_storage.resting_potentials()[idx];
                neuron_storage.membrane_potentials_mut()[idx] = resting;
                output.fired_neurons.push(id);
                output.fired_potentials.push(potential);
            } else {
                neuron_storage.membrane_potentials_mut()[idx] =
                    N::Value::from_f32(potential, &range);
            }
        }

        Ok(output)
    }

    fn initialize_persistent_data(&mut self, neuron_array: &N, synapse_array: &S) -> Result<()> {
        self.upload_neuron_arrays(neuron_array)?;
        self.upload_synapse_arrays(synapse_array)?;
        info!(
            "[WGPU] persistent data resident: {} neurons, {} synapses",
            neuron_array.count(),
            synapse_array.count()
        );
        Ok(())
    }

    fn on_genome_change(&mut self) -> Result<()> {
        self.neurons = None;
        self.synapses = None;
        debug!("[WGPU] resident buffers dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_npu_neural::LIFParameters;
    use feagi_npu_runtime::{IdReusePolicy, StdNeuronArray, StdSynapseArray};

    type Gpu = dyn ComputeBackend<f32, StdNeuronArray<f32>, StdSynapseArray>;

    fn gpu_or_skip() -> Option<WGPUBackend> {
        match WGPUBackend::new() {
            Ok(backend) => Some(backend),
            Err(e) => {
                eprintln!("skipping: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_dispatch_dims_split_large_counts() {
        assert_eq!(dispatch_dims(0), (1, 1));
        assert_eq!(dispatch_dims(256), (1, 1));
        assert_eq!(dispatch_dims(257), (2, 1));
        let (x, y) = dispatch_dims(256 * 65_535 + 1);
        assert_eq!((x, y), (65_535, 2));
    }

    #[test]
    fn test_uniform_layouts_match_shader() {
        assert_eq!(std::mem::size_of::<PropagationParams>(), 16);
        assert_eq!(std::mem::size_of::<DynamicsParams>(), 32);
    }

    #[test]
    fn test_wgpu_backend_creation() {
        let Some(backend) = gpu_or_skip() else { return };
        assert!(backend.name.starts_with("WGPU ("));
    }

    #[test]
    fn test_wgpu_propagation_and_dynamics() {
        let Some(backend) = gpu_or_skip() else { return };

        let mut neurons: StdNeuronArray<f32> =
            StdNeuronArray::new(8, QuantizationRange::default(), IdReusePolicy::Tombstone);
        let p = LIFParameters::with_threshold(1.0);
        let a = neurons.add_neuron(&p, 1, (0, 0, 0)).unwrap();
        let b = neurons.add_neuron(&p, 2, (0, 0, 0)).unwrap();
        let c = neurons.add_neuron(&p, 2, (1, 0, 0)).unwrap();
        let mut synapses = StdSynapseArray::new(8, IdReusePolicy::Tombstone);
        synapses
            .add_synapse(a, b, 1, 2, SynapseType::Excitatory)
            .unwrap();
        synapses
            .add_synapse(a, c, 3, 1, SynapseType::Inhibitory)
            .unwrap();

        let mut backend: Box<Gpu> = Box::new(backend);
        backend.initialize_persistent_data(&neurons, &synapses).unwrap();

        let mut fcl = FireCandidateList::new();
        let result = backend
            .process_burst(&[a.0], &synapses, &mut fcl, &mut neurons, 1)
            .unwrap();

        assert_eq!(result.synapses_processed, 2);
        assert_eq!(fcl.get(b), Some(2.0));
        assert_eq!(fcl.get(c), Some(-3.0));
        assert_eq!(result.fired_neurons, vec![b.0]);
        assert!((result.fired_potentials[0] - 1.8).abs() < 1e-5);
        assert_eq!(neurons.membrane_potentials()[b.index()], 0.0);
        assert!((neurons.membrane_potentials()[c.index()] + 2.7).abs() < 1e-5);
    }
}
