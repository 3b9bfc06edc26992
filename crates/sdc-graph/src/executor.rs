//! Reference in-process executor.
//!
//! Nodes run one after another in topological order. Fan-out nodes dispatch
//! their elements on the rayon pool and gather results in input order. There
//! is no retry, caching or resume: the first failing node aborts the run.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use burn::tensor::backend::Backend;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::capability::Capabilities;
use crate::error::ExecutionError;
use crate::node::{FanOut, Node, NodeKind};
use crate::port::PortType;
use crate::value::{Report, Value};
use crate::workflow::{Workflow, INPUT_NODE, OUTPUT_NODE};
use sdc_core::jacobian::jacobian_determinant;
use sdc_core::{
    units, AcquisitionTable, CompositeTransform, DisplacementField, Image, PhaseEncodingDirection, Series,
    SdcError, SidecarMetadata, VoxelShiftMap,
};

/// Values keyed by port name.
pub type PortValues<B> = BTreeMap<String, Value<B>>;

type Result<T> = std::result::Result<T, ExecutionError>;

/// Runs workflows against a bound set of capabilities.
pub struct Executor<B: Backend> {
    capabilities: Capabilities<B>,
}

impl<B: Backend> Executor<B> {
    pub fn new(capabilities: Capabilities<B>) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &Capabilities<B> {
        &self.capabilities
    }

    /// Run `workflow` on the given boundary inputs and return its outputs.
    pub fn run(&self, workflow: &Workflow, inputs: PortValues<B>) -> Result<PortValues<B>> {
        workflow.validate()?;
        let order = workflow.topological_order()?;
        info!(workflow = workflow.name(), nodes = order.len(), "running workflow");
        let started = Instant::now();

        let mut results: HashMap<&str, PortValues<B>> = HashMap::new();
        for node in order {
            let node_inputs = if node.name == INPUT_NODE {
                Self::boundary_inputs(workflow, &inputs)?
            } else {
                Self::gather(workflow, node, &results)?
            };

            let outputs = match &node.fan_out {
                Some(fan_out) => self.run_fan_out(node, fan_out, node_inputs)?,
                None => self.invoke(node, node_inputs)?,
            };
            results.insert(node.name.as_str(), outputs);
        }

        info!(
            workflow = workflow.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workflow finished"
        );
        results
            .remove(OUTPUT_NODE)
            .ok_or_else(|| ExecutionError::MissingInput(OUTPUT_NODE.to_string()))
    }

    fn boundary_inputs(workflow: &Workflow, inputs: &PortValues<B>) -> Result<PortValues<B>> {
        let mut values = PortValues::new();
        for spec in workflow.input_ports() {
            match inputs.get(&spec.name) {
                Some(value) => {
                    values.insert(spec.name, value.clone());
                }
                None if spec.required => return Err(ExecutionError::MissingInput(spec.name)),
                None => {}
            }
        }
        Ok(values)
    }

    /// Collect the values feeding every input port of `node`.
    fn gather(workflow: &Workflow, node: &Node, results: &HashMap<&str, PortValues<B>>) -> Result<PortValues<B>> {
        let mut values = PortValues::new();
        for spec in node.kind.inputs() {
            let mut sources: Vec<Value<B>> = Vec::new();
            if let Some(literal) = workflow.literal(&node.name, &spec.name) {
                sources.push(Value::from(literal));
            }
            for edge in workflow.edges_into(&node.name, &spec.name) {
                let value = results
                    .get(edge.src.as_str())
                    .and_then(|outputs| outputs.get(&edge.src_port))
                    .ok_or_else(|| ExecutionError::MissingValue {
                        node: edge.src.clone(),
                        port: edge.src_port.clone(),
                    })?;
                sources.push(value.clone());
            }

            let value = if spec.collection {
                let mut items = Vec::new();
                for source in sources {
                    match source {
                        Value::List(list) => items.extend(list),
                        single => items.push(single),
                    }
                }
                Value::List(items)
            } else {
                match sources.into_iter().next() {
                    Some(value) => value,
                    None => continue,
                }
            };
            values.insert(spec.name, value);
        }
        Ok(values)
    }

    fn run_fan_out(&self, node: &Node, fan_out: &FanOut, inputs: PortValues<B>) -> Result<PortValues<B>> {
        let width = fan_out.width;
        let mut lists: HashMap<&str, Vec<Value<B>>> = HashMap::new();
        for field in &fan_out.iterfields {
            let items = match inputs.get(field) {
                Some(Value::List(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                None => {
                    return Err(ExecutionError::MissingValue {
                        node: node.name.clone(),
                        port: field.clone(),
                    })
                }
            };
            if items.len() != width {
                return Err(ExecutionError::FanOutLength {
                    node: node.name.clone(),
                    port: field.clone(),
                    expected: width,
                    actual: items.len(),
                });
            }
            lists.insert(field.as_str(), items);
        }

        let elements: Vec<PortValues<B>> = (0..width)
            .map(|i| {
                inputs
                    .iter()
                    .map(|(port, value)| {
                        let value = match lists.get(port.as_str()) {
                            Some(items) => items[i].clone(),
                            None => value.clone(),
                        };
                        (port.clone(), value)
                    })
                    .collect()
            })
            .collect();

        debug!(node = %node.name, width, "dispatching fan-out");
        let results = elements
            .into_par_iter()
            .map(|element| self.invoke(node, element))
            .collect::<Result<Vec<_>>>()?;

        let mut outputs = PortValues::new();
        for spec in node.kind.outputs() {
            let gathered = results
                .iter()
                .map(|r| {
                    r.get(&spec.name).cloned().ok_or_else(|| ExecutionError::MissingValue {
                        node: node.name.clone(),
                        port: spec.name.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            outputs.insert(spec.name, Value::List(gathered));
        }
        Ok(outputs)
    }

    /// Run one (non-fan-out) invocation of `node`.
    fn invoke(&self, node: &Node, inputs: PortValues<B>) -> Result<PortValues<B>> {
        let name = node.name.as_str();
        let args = Args { node: name, values: inputs };
        let caps = &self.capabilities;
        let unit = |e: SdcError| ExecutionError::unit(name, e);
        debug!(node = name, op = %node.kind.label(), "running node");

        let outputs = match &node.kind {
            NodeKind::Boundary { .. } => args.values,
            NodeKind::ReadMetadata => {
                let source = args.identifier("source")?;
                let reader = require(name, "metadata_reader", &caps.metadata_reader)?;
                let metadata = reader
                    .read(&source)
                    .map_err(|e| ExecutionError::capability(name, "metadata_reader", e))?;
                ports([("metadata", Value::Metadata(metadata))])
            }
            NodeKind::ReadImage => {
                let path = args.path("path")?;
                let reader = require(name, "image_reader", &caps.image_reader)?;
                let image = reader
                    .read(&path)
                    .map_err(|e| ExecutionError::capability(name, "image_reader", e))?;
                ports([("image", image.into())])
            }
            NodeKind::EchoSpacing => {
                let spacing = args.metadata("metadata")?.effective_echo_spacing().map_err(unit)?;
                ports([("echo_spacing", Value::Scalar(spacing))])
            }
            NodeKind::PeDirection => {
                let pe = args.metadata("metadata")?.phase_encoding_direction().map_err(unit)?;
                ports([("pe_direction", Value::PeDirection(pe))])
            }
            NodeKind::ApplyMask => {
                let masked = units::apply_mask(args.image("in_file")?, args.image("mask_file")?).map_err(unit)?;
                ports([("out_file", masked.into())])
            }
            NodeKind::Register { preset } => {
                let registration = require(name, "registration", &caps.registration)?;
                let out = registration
                    .register(args.image("moving")?, args.image("fixed")?, *preset)
                    .map_err(|e| ExecutionError::capability(name, "registration", e))?;
                ports([
                    ("transform", Value::Transform(out.transform)),
                    ("warped_image", out.warped.into()),
                    ("out_report", out.report.into()),
                ])
            }
            NodeKind::ApplyTransform { interpolation } => {
                let applier = require(name, "transform_applier", &caps.transform_applier)?;
                let transform = args.transform("transforms")?;
                let out = applier
                    .apply(
                        &transform,
                        args.image("reference_image")?,
                        args.image("input_image")?,
                        *interpolation,
                    )
                    .map_err(|e| ExecutionError::capability(name, "transform_applier", e))?;
                ports([("output_image", out.image.into()), ("out_report", out.report.into())])
            }
            NodeKind::HzToRadPerSec => {
                ports([("out_file", units::hz_to_rad_per_sec(args.image("in_file")?).into())])
            }
            NodeKind::FieldmapUnwarp => {
                let estimator = require(name, "fieldmap_unwarp", &caps.fieldmap_unwarp)?;
                let vsm = estimator
                    .estimate(
                        args.image("fmap_in_file")?,
                        args.scalar("dwell_time")?,
                        args.pe_direction("unwarp_direction")?,
                        args.optional_image("mask_file")?,
                    )
                    .map_err(|e| ExecutionError::capability(name, "fieldmap_unwarp", e))?;
                ports([("shift_out_file", vsm.into())])
            }
            NodeKind::Demean => {
                let shift = args.shift_map("in_file")?;
                let demeaned = units::demean(shift.image(), args.image("in_mask")?).map_err(unit)?;
                ports([("out_file", VoxelShiftMap::new(demeaned).into())])
            }
            NodeKind::ShiftToField => {
                let field = units::shift_to_displacement_field(args.shift_map("in_file")?, args.pe_direction("pe_dir")?)
                    .map_err(unit)?;
                ports([("out_file", field.into())])
            }
            NodeKind::Jacobian => {
                let jacobian = jacobian_determinant(args.field("deformation_field")?).map_err(unit)?;
                ports([("jacobian_image", jacobian.into())])
            }
            NodeKind::FillWithOnes => ports([("out_file", units::fill_with_ones(args.image("in_file")?).into())]),
            NodeKind::EstimateMask => {
                let estimator = require(name, "mask_estimator", &caps.mask_estimator)?;
                let out = estimator
                    .estimate(args.image("in_file")?)
                    .map_err(|e| ExecutionError::capability(name, "mask_estimator", e))?;
                ports([("mask_file", out.mask.into()), ("out_report", out.report.into())])
            }
            NodeKind::BiasCorrect => {
                let corrector = require(name, "bias_corrector", &caps.bias_corrector)?;
                let corrected = corrector
                    .correct(args.image("input_image")?)
                    .map_err(|e| ExecutionError::capability(name, "bias_corrector", e))?;
                ports([("output_image", corrected.into())])
            }
            NodeKind::CopyHeader => {
                let repair = require(name, "header_repair", &caps.header_repair)?;
                let repaired = repair
                    .repair(args.image("hdr_file")?, args.image("in_file")?)
                    .map_err(|e| ExecutionError::capability(name, "header_repair", e))?;
                ports([("out_file", repaired.into())])
            }
            NodeKind::CopyHeaderSeries => {
                let repair = require(name, "header_repair", &caps.header_repair)?;
                let repaired = repair
                    .repair_series(args.image("hdr_file")?, args.series("in_file")?)
                    .map_err(|e| ExecutionError::capability(name, "header_repair", e))?;
                ports([("out_file", repaired.into())])
            }
            NodeKind::Concatenate => {
                let volumes = args.images("in_files")?;
                let merged = units::concatenate(&volumes).map_err(unit)?;
                ports([("merged_file", merged.into())])
            }
            NodeKind::AcquisitionTable => {
                let reference = args.metadata("reference")?;
                let others = args.metadata_list("volumes")?;
                let table = AcquisitionTable::synthesize(reference, &others).map_err(unit)?;
                debug!(node = name, rows = table.len(), "synthesized acquisition table");
                ports([("table", Value::Table(table))])
            }
            NodeKind::BlipPair => {
                let volumes = args.series("in_file")?;
                let table = args.table("encoding_file")?;
                table.ensure_covers(volumes.num_volumes()).map_err(unit)?;
                let estimator = require(name, "blip_pair_estimator", &caps.blip_pair_estimator)?;
                let out = estimator
                    .estimate(volumes, table)
                    .map_err(|e| ExecutionError::capability(name, "blip_pair_estimator", e))?;
                ports([
                    ("out_warps", Value::List(out.fields.into_iter().map(Value::from).collect())),
                    ("out_jacs", Value::List(out.jacobians.into_iter().map(Value::from).collect())),
                ])
            }
            NodeKind::PickFirst { .. } => {
                let first = units::pick_first(args.list("items")?).map_err(unit)?;
                ports([("first", first)])
            }
            NodeKind::PromoteToVectorField { component } => {
                let field = units::promote_to_vector_field(args.series("in_file")?, *component).map_err(unit)?;
                ports([("out_file", field.into())])
            }
            NodeKind::Multiply => {
                let product = units::multiply(args.image("in_file")?, args.image("operand_file")?).map_err(unit)?;
                ports([("out_file", product.into())])
            }
            NodeKind::ReportSink { tag, base_directory } => {
                let sink = require(name, "report_sink", &caps.report_sink)?;
                let source = args.identifier("source_file")?;
                sink.write(base_directory, &source, args.artifact("in_file")?, tag)
                    .map_err(|e| ExecutionError::capability(name, "report_sink", e))?;
                PortValues::new()
            }
        };

        debug!(node = name, outputs = outputs.len(), "node finished");
        Ok(outputs)
    }
}

fn require<'a, T: ?Sized>(node: &str, capability: &'static str, slot: &'a Option<Arc<T>>) -> Result<&'a T> {
    slot.as_deref()
        .ok_or_else(|| ExecutionError::missing_capability(node, capability))
}

fn ports<B: Backend, const N: usize>(pairs: [(&str, Value<B>); N]) -> PortValues<B> {
    pairs.into_iter().map(|(port, value)| (port.to_string(), value)).collect()
}

/// Typed access to the input values of one invocation.
struct Args<'a, B: Backend> {
    node: &'a str,
    values: PortValues<B>,
}

impl<B: Backend> Args<'_, B> {
    fn get(&self, port: &str) -> Result<&Value<B>> {
        self.values.get(port).ok_or_else(|| ExecutionError::MissingValue {
            node: self.node.to_string(),
            port: port.to_string(),
        })
    }

    fn unexpected(&self, port: &str, expected: PortType, value: &Value<B>) -> ExecutionError {
        ExecutionError::UnexpectedValue {
            node: self.node.to_string(),
            port: port.to_string(),
            expected,
            actual: value.kind(),
        }
    }

    fn image(&self, port: &str) -> Result<&Image<B, 3>> {
        let value = self.get(port)?;
        value.as_image().ok_or_else(|| self.unexpected(port, PortType::Image, value))
    }

    fn optional_image(&self, port: &str) -> Result<Option<&Image<B, 3>>> {
        match self.values.get(port) {
            None => Ok(None),
            Some(value) => value
                .as_image()
                .map(Some)
                .ok_or_else(|| self.unexpected(port, PortType::Image, value)),
        }
    }

    fn images(&self, port: &str) -> Result<Vec<Image<B, 3>>> {
        self.list(port)?
            .iter()
            .map(|v| v.as_image().cloned().ok_or_else(|| self.unexpected(port, PortType::Image, v)))
            .collect()
    }

    fn series(&self, port: &str) -> Result<&Series<B>> {
        let value = self.get(port)?;
        value.as_series().ok_or_else(|| self.unexpected(port, PortType::Series, value))
    }

    fn field(&self, port: &str) -> Result<&DisplacementField<B>> {
        let value = self.get(port)?;
        value.as_field().ok_or_else(|| self.unexpected(port, PortType::Field, value))
    }

    fn shift_map(&self, port: &str) -> Result<&VoxelShiftMap<B>> {
        match self.get(port)? {
            Value::ShiftMap(vsm) => Ok(vsm),
            other => Err(self.unexpected(port, PortType::ShiftMap, other)),
        }
    }

    /// A composite transform; a bare displacement field is wrapped.
    fn transform(&self, port: &str) -> Result<CompositeTransform<B>> {
        match self.get(port)? {
            Value::Transform(transform) => Ok(transform.clone()),
            Value::Field(field) => Ok(CompositeTransform::identity().then(field.clone())),
            other => Err(self.unexpected(port, PortType::Transform, other)),
        }
    }

    fn scalar(&self, port: &str) -> Result<f64> {
        match self.get(port)? {
            Value::Scalar(value) => Ok(*value),
            other => Err(self.unexpected(port, PortType::Scalar, other)),
        }
    }

    fn identifier(&self, port: &str) -> Result<String> {
        match self.get(port)? {
            Value::Text(text) => Ok(text.clone()),
            Value::Path(path) => Ok(path.display().to_string()),
            other => Err(self.unexpected(port, PortType::Identifier, other)),
        }
    }

    fn path(&self, port: &str) -> Result<PathBuf> {
        match self.get(port)? {
            Value::Path(path) => Ok(path.clone()),
            Value::Text(text) => Ok(PathBuf::from(text)),
            other => Err(self.unexpected(port, PortType::Path, other)),
        }
    }

    fn metadata(&self, port: &str) -> Result<&SidecarMetadata> {
        match self.get(port)? {
            Value::Metadata(meta) => Ok(meta),
            other => Err(self.unexpected(port, PortType::Metadata, other)),
        }
    }

    fn metadata_list(&self, port: &str) -> Result<Vec<SidecarMetadata>> {
        self.list(port)?
            .iter()
            .map(|v| match v {
                Value::Metadata(meta) => Ok(meta.clone()),
                other => Err(self.unexpected(port, PortType::Metadata, other)),
            })
            .collect()
    }

    fn pe_direction(&self, port: &str) -> Result<PhaseEncodingDirection> {
        match self.get(port)? {
            Value::PeDirection(pe) => Ok(*pe),
            other => Err(self.unexpected(port, PortType::PeDirection, other)),
        }
    }

    fn table(&self, port: &str) -> Result<&AcquisitionTable> {
        match self.get(port)? {
            Value::Table(table) => Ok(table),
            other => Err(self.unexpected(port, PortType::Table, other)),
        }
    }

    fn artifact(&self, port: &str) -> Result<&Report> {
        match self.get(port)? {
            Value::Artifact(report) => Ok(report),
            other => Err(self.unexpected(port, PortType::Artifact, other)),
        }
    }

    /// Items of a list value; a single value reads as a one-element list.
    fn list(&self, port: &str) -> Result<&[Value<B>]> {
        let value = self.get(port)?;
        Ok(value.as_list().unwrap_or(std::slice::from_ref(value)))
    }
}
