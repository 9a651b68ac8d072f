use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
};

use log::{debug, info};
use ndarray::{ArrayD, IxDyn};
use tract_onnx::prelude::*;

use super::{Provider, ProviderError};

type TractRunnableModel =
    RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Number of optimized plans kept alive by default.
pub const DEFAULT_PLAN_CAPACITY: usize = 4;

/// Execution provider backed by `tract-onnx`.
///
/// The ONNX graph is parsed once when the provider is created. Vision models such as
/// Depth Anything accept any spatial size, so an optimized plan is built for each concrete
/// input shape the first time it is seen. Only the most recently used plans are kept,
/// since every plan holds its own optimized copy of the weights.
pub struct TractProvider {
    model: InferenceModel,
    capacity: usize,
    // most recently used first
    plans: Mutex<VecDeque<(Vec<usize>, Arc<TractRunnableModel>)>>,
}

impl TractProvider {
    pub fn from_path<P>(path: P) -> Result<Self, ProviderError>
    where
        P: AsRef<Path>,
    {
        let model_path = path.as_ref();
        info!("Loading ONNX model from {}", model_path.display());
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| ProviderError::CouldNotLoad(e.into()))?;

        Ok(Self {
            model,
            capacity: DEFAULT_PLAN_CAPACITY,
            plans: Mutex::new(VecDeque::new()),
        })
    }

    /// Sets how many optimized plans are cached at once. A capacity of zero is treated as one.
    pub fn with_plan_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn plan_capacity(&self) -> usize {
        self.capacity
    }

    fn cached_plan(&self, shape: &[usize]) -> Option<Arc<TractRunnableModel>> {
        // cached plans stay valid after a panicked inference
        let mut plans = self.plans.lock().unwrap_or_else(|e| e.into_inner());
        let position = plans.iter().position(|(cached, _)| cached.as_slice() == shape)?;
        let entry = plans.remove(position)?;
        let plan = Arc::clone(&entry.1);
        plans.push_front(entry);
        Some(plan)
    }

    fn plan_for(&self, shape: &[usize]) -> Result<Arc<TractRunnableModel>, ProviderError> {
        if let Some(plan) = self.cached_plan(shape) {
            return Ok(plan);
        }

        debug!("Optimizing model for input shape {:?}", shape);
        let plan = self
            .model
            .clone()
            .with_input_fact(0, f32::fact(shape.to_vec()).into())
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ProviderError::CouldNotRun {
                shape: shape.to_vec(),
                source: e.into(),
            })?;
        let plan = Arc::new(plan);

        let mut plans = self.plans.lock().unwrap_or_else(|e| e.into_inner());
        // another thread may have built the same plan meanwhile
        if let Some((_, cached)) = plans.iter().find(|(cached, _)| cached.as_slice() == shape) {
            return Ok(Arc::clone(cached));
        }
        plans.push_front((shape.to_vec(), Arc::clone(&plan)));
        while plans.len() > self.capacity {
            if let Some((evicted, _)) = plans.pop_back() {
                debug!("Evicting optimized plan for input shape {:?}", evicted);
            }
        }
        Ok(plan)
    }
}

impl Provider for TractProvider {
    fn name(&self) -> &str {
        "tract"
    }

    fn run(&self, input: ArrayD<f32>) -> Result<ArrayD<f32>, ProviderError> {
        let shape = input.shape().to_vec();
        let plan = self.plan_for(&shape)?;
        let run_error = |e: Box<dyn std::error::Error + Send + Sync>| ProviderError::CouldNotRun {
            shape: shape.clone(),
            source: e,
        };

        // tract carries its own ndarray, so tensors cross the boundary as flat buffers
        let input = input.as_standard_layout();
        let data = input
            .as_slice()
            .ok_or_else(|| run_error("input is not contiguous".into()))?;
        let tensor = Tensor::from_shape(&shape, data).map_err(|e| run_error(e.into()))?;

        let outputs = plan
            .run(tvec!(tensor.into()))
            .map_err(|e| run_error(e.into()))?;
        let output = outputs.first().ok_or(ProviderError::MissingOutput)?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| run_error(e.into()))?;

        ArrayD::from_shape_vec(IxDyn(view.shape()), view.iter().copied().collect())
            .map_err(|e| run_error(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ndarray::{Array, Array4};
    use prost::Message;
    use tract_onnx::pb::{
        tensor_proto::DataType, type_proto, GraphProto, ModelProto, NodeProto,
        OperatorSetIdProto, TypeProto, ValueInfoProto,
    };

    use super::*;

    fn float_value(name: &str) -> ValueInfoProto {
        ValueInfoProto {
            name: name.to_string(),
            r#type: Some(TypeProto {
                value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                    elem_type: DataType::Float as i32,
                    shape: None,
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Writes a single-node `Relu` model with an unconstrained input shape.
    fn write_relu_model(file_name: &str) -> PathBuf {
        let model = ModelProto {
            ir_version: 7,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            producer_name: "vision-predictors-tests".to_string(),
            graph: Some(GraphProto {
                name: "relu".to_string(),
                node: vec![NodeProto {
                    input: vec!["x".to_string()],
                    output: vec!["y".to_string()],
                    name: "relu".to_string(),
                    op_type: "Relu".to_string(),
                    ..Default::default()
                }],
                input: vec![float_value("x")],
                output: vec![float_value("y")],
                ..Default::default()
            }),
            ..Default::default()
        };

        let path = std::env::temp_dir().join(format!(
            "vision-predictors-{}-{}.onnx",
            file_name,
            std::process::id()
        ));
        std::fs::write(&path, model.encode_to_vec()).unwrap();
        path
    }

    fn ramp(shape: (usize, usize, usize, usize)) -> Array4<f32> {
        let len = shape.0 * shape.1 * shape.2 * shape.3;
        Array::from_shape_fn(shape, |(b, c, y, x)| {
            let index = ((b * shape.1 + c) * shape.2 + y) * shape.3 + x;
            index as f32 - len as f32 / 2.0
        })
    }

    #[test]
    fn runs_onnx_model() {
        let path = write_relu_model("runs");
        let provider = TractProvider::from_path(&path).unwrap();
        assert_eq!(provider.name(), "tract");

        let input = ramp((1, 3, 4, 5));
        let output = provider.run(input.clone().into_dyn()).unwrap();

        assert_eq!(output.shape(), &[1, 3, 4, 5]);
        let expected = input.mapv(|v| v.max(0.0)).into_dyn();
        assert_eq!(output, expected);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn non_standard_layout_input() {
        let path = write_relu_model("layout");
        let provider = TractProvider::from_path(&path).unwrap();

        let input = ramp((1, 2, 3, 4));
        let permuted = input.clone().permuted_axes([0, 1, 3, 2]);
        let output = provider.run(permuted.clone().into_dyn()).unwrap();

        assert_eq!(output.shape(), &[1, 2, 4, 3]);
        assert_eq!(output, permuted.mapv(|v| v.max(0.0)).into_dyn());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn reuses_plan_for_repeated_shape() {
        let path = write_relu_model("reuse");
        let provider = TractProvider::from_path(&path).unwrap();

        let first = provider.plan_for(&[1, 3, 8, 8]).unwrap();
        let second = provider.plan_for(&[1, 3, 8, 8]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.plans.lock().unwrap().len(), 1);

        let other = provider.plan_for(&[1, 3, 8, 16]).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(provider.plans.lock().unwrap().len(), 2);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn plan_cache_is_bounded() {
        let path = write_relu_model("bounded");
        let provider = TractProvider::from_path(&path).unwrap().with_plan_capacity(2);
        assert_eq!(provider.plan_capacity(), 2);

        for height in 1..=6 {
            let output = provider.run(ramp((1, 1, height, 3)).into_dyn()).unwrap();
            assert_eq!(output.shape(), &[1, 1, height, 3]);
            assert!(provider.plans.lock().unwrap().len() <= 2);
        }

        // most recently used shapes survive eviction
        let plans = provider.plans.lock().unwrap();
        let shapes: Vec<_> = plans.iter().map(|(shape, _)| shape.clone()).collect();
        assert_eq!(shapes, vec![vec![1, 1, 6, 3], vec![1, 1, 5, 3]]);
        drop(plans);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn recently_used_plan_is_kept() {
        let path = write_relu_model("recent");
        let provider = TractProvider::from_path(&path).unwrap().with_plan_capacity(2);

        let kept = provider.plan_for(&[1, 1, 2, 2]).unwrap();
        provider.plan_for(&[1, 1, 3, 3]).unwrap();
        // touching the first shape makes the second the eviction candidate
        provider.plan_for(&[1, 1, 2, 2]).unwrap();
        provider.plan_for(&[1, 1, 4, 4]).unwrap();

        let again = provider.plan_for(&[1, 1, 2, 2]).unwrap();
        assert!(Arc::ptr_eq(&kept, &again));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_model_file() {
        let result = TractProvider::from_path("does/not/exist.onnx");
        assert!(matches!(result, Err(ProviderError::CouldNotLoad(_))));
    }
}
