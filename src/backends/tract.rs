//! Tract backend for super-resolution models
//!
//! Pure Rust inference with no external dependencies. Tract plans are
//! specialized to one input shape, and tiles come in a handful of sizes
//! (interior, edge and corner tiles), so a runnable plan is built lazily
//! for each tile shape and reused afterwards. Only the most recently used
//! shapes are kept; a new image size or pass evicts the oldest plans.

use crate::config::UpscaleConfig;
use crate::error::{Result, UpscaleError};
use crate::inference::UpscaleBackend;
use crate::models::{ModelData, TensorLayout};
use crate::utils::{chunk_to_tensor, tensor_to_chunk};
use image::RgbaImage;
use ndarray::Array4;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Plans kept alive at once. One pass has at most three tile widths and three
/// tile heights, so a whole pass fits.
pub const MAX_CACHED_PLANS: usize = 9;

/// Least-recently-used cache of shape-specialized plans
struct PlanCache<T> {
    capacity: usize,
    /// Oldest first
    entries: VecDeque<((u32, u32), Arc<T>)>,
}

impl<T> PlanCache<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn get(&mut self, key: (u32, u32)) -> Option<Arc<T>> {
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        let entry = self.entries.remove(index)?;
        let plan = Arc::clone(&entry.1);
        self.entries.push_back(entry);
        Some(plan)
    }

    /// Insert a freshly built plan. If another worker inserted the same
    /// shape first, its plan is kept and returned.
    fn insert(&mut self, key: (u32, u32), plan: Arc<T>) -> Arc<T> {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        self.entries.push_back((key, Arc::clone(&plan)));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        plan
    }
}

impl<T> Default for PlanCache<T> {
    fn default() -> Self {
        Self::new(MAX_CACHED_PLANS)
    }
}

/// Tract backend for running models with pure Rust inference
#[derive(Default)]
pub struct TractBackend {
    model: Option<InferenceModel>,
    plans: Mutex<PlanCache<TractModel>>,
    layout: TensorLayout,
}

impl TractBackend {
    /// List all Tract execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create an unloaded backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shape-specialized plans currently cached, at most [`MAX_CACHED_PLANS`]
    #[must_use]
    pub fn cached_plans(&self) -> usize {
        self.plans.lock().map(|plans| plans.len()).unwrap_or(0)
    }

    fn plan_for(&self, width: u32, height: u32) -> Result<Arc<TractModel>> {
        if let Some(plan) = self.lock_plans()?.get((width, height)) {
            return Ok(plan);
        }

        let model = self
            .model
            .as_ref()
            .ok_or_else(|| UpscaleError::inference("Tract model not initialized"))?;
        let shape = self.layout.input_shape(width as usize, height as usize);

        // Built without holding the lock so workers with cached shapes keep running
        let plan_error = |stage: &str, e: TractError| {
            UpscaleError::inference_error_with_provider("tract", stage, &e.to_string())
        };
        let plan = model
            .clone()
            .with_input_fact(0, f32::fact(shape).into())
            .map_err(|e| plan_error("Setting input shape", e))?
            .into_optimized()
            .map_err(|e| plan_error("Model optimization", e))?
            .into_runnable()
            .map_err(|e| plan_error("Plan creation", e))?;

        tracing::debug!(width, height, "Built Tract plan for tile shape");
        Ok(self.lock_plans()?.insert((width, height), Arc::new(plan)))
    }

    fn lock_plans(&self) -> Result<std::sync::MutexGuard<'_, PlanCache<TractModel>>> {
        self.plans
            .lock()
            .map_err(|_| UpscaleError::internal("Tract plan cache lock poisoned"))
    }
}

impl std::fmt::Debug for TractBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractBackend")
            .field("initialized", &self.model.is_some())
            .field("cached_plans", &self.cached_plans())
            .field("layout", &self.layout)
            .finish()
    }
}

impl UpscaleBackend for TractBackend {
    fn load(&mut self, model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        let parsed = onnx()
            .model_for_read(&mut std::io::Cursor::new(&model.bytes))
            .map_err(|e| UpscaleError::model_load(format!("Failed to load ONNX model: {e}")))?;

        tracing::info!(model = %model.name, "Tract backend initialized");

        self.model = Some(parsed);
        self.layout = model.layout;
        if let Ok(mut plans) = self.plans.lock() {
            plans.clear();
        }
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = chunk.dimensions();
        let plan = self.plan_for(width, height)?;

        let input = Tensor::from(chunk_to_tensor(chunk, self.layout));
        let outputs = plan.run(tvec![input.into()]).map_err(|e| {
            UpscaleError::inference_error_with_provider("tract", "Inference", &e.to_string())
        })?;

        let output = outputs
            .first()
            .ok_or_else(|| UpscaleError::inference("No output tensor found"))?;
        let shape: [usize; 4] = output.shape().try_into().map_err(|_| {
            UpscaleError::inference(format!(
                "Expected 4D output tensor, got shape {:?}",
                output.shape()
            ))
        })?;
        let data = output
            .as_slice::<f32>()
            .map_err(|e| UpscaleError::inference(format!("Failed to read output tensor: {e}")))?;
        let array = Array4::from_shape_vec(shape, data.to_vec())
            .map_err(|e| UpscaleError::inference(format!("Failed to reshape output tensor: {e}")))?;

        tensor_to_chunk(&array, self.layout)
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_backend_is_not_initialized() {
        let backend = TractBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.cached_plans(), 0);
        assert!(backend.upscale_chunk(&RgbaImage::new(2, 2)).is_err());
    }

    #[test]
    fn test_invalid_model_bytes_fail_to_load() {
        let mut backend = TractBackend::new();
        let model = ModelData {
            name: "garbage.onnx".to_string(),
            bytes: b"definitely not a protobuf".to_vec(),
            layout: TensorLayout::NchwUnit,
        };
        assert!(matches!(
            backend.load(&model, &UpscaleConfig::default()),
            Err(UpscaleError::ModelLoad(_))
        ));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_plan_cache_stays_bounded() {
        let mut cache = PlanCache::new(MAX_CACHED_PLANS);
        for size in 1..=40u32 {
            cache.insert((size, size + 1), Arc::new(size));
            assert!(cache.len() <= MAX_CACHED_PLANS);
        }
        assert_eq!(cache.len(), MAX_CACHED_PLANS);
        assert_eq!(cache.get((40, 41)).as_deref(), Some(&40));
        assert!(cache.get((1, 2)).is_none());
    }

    #[test]
    fn test_plan_cache_evicts_least_recently_used() {
        let mut cache = PlanCache::new(2);
        cache.insert((1, 1), Arc::new("a"));
        cache.insert((2, 2), Arc::new("b"));
        assert!(cache.get((1, 1)).is_some());

        cache.insert((3, 3), Arc::new("c"));
        assert!(cache.get((2, 2)).is_none());
        assert_eq!(cache.get((1, 1)).as_deref(), Some(&"a"));
        assert_eq!(cache.get((3, 3)).as_deref(), Some(&"c"));
    }

    #[test]
    fn test_plan_cache_keeps_first_insert_of_a_shape() {
        let mut cache = PlanCache::new(4);
        let first = cache.insert((8, 8), Arc::new(1));
        let second = cache.insert((8, 8), Arc::new(2));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert!(providers[0].1);
    }
}
