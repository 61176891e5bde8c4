// SPDX-License-Identifier: AGPL-3.0-only

//! Network and layer descriptors

use crate::error::{ModelError, Result};
use crate::shapes::Dims;
use std::str::FromStr;

/// Neural network: an ordered pipeline of layers
#[derive(Debug, Clone)]
pub struct Network {
    /// Network name
    name: String,

    /// Layers in execution order
    layers: Vec<Layer>,
}

/// One layer of a network
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Layer name
    pub name: String,

    /// Layer type
    pub layer_type: LayerType,

    /// Input dims of one image. For convolutions this includes the zero
    /// padding border.
    pub inputs: Dims,

    /// Weight dims of one kernel (convolution) or of the whole matrix
    /// including the bias row (inner product)
    pub weights: Dims,

    /// Output dims of one image
    pub outputs: Dims,

    /// Activation applied to the layer's result
    pub activation: Activation,

    /// Pooling kind (pooling layers only)
    pub pool: Option<PoolingKind>,

    /// Transformation applied to the input before the layer runs
    pub input_preprocessing: Preprocessing,

    /// Zero padding on each border of the input (convolution only)
    pub c_padding: usize,

    /// Kernel or pooling window edge
    pub field_size: usize,

    /// Window stride
    pub stride: usize,

    /// Input must be transferred from host memory
    pub needs_input_transfer: bool,

    /// Output must be transferred back to host memory
    pub needs_output_transfer: bool,

    /// Final result lives in the second host buffer
    pub result_in_temp: bool,
}

/// Layer type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    /// Network entry point
    Input,

    /// Standard 3-D convolution
    Convolution,

    /// Fully connected layer
    InnerProduct,

    /// Pooling layer
    Pooling,

    /// Softmax classifier
    Softmax,
}

/// Activation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activation {
    /// Identity
    #[default]
    None,
    /// Rectified linear unit
    Relu,
    /// Logistic sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

/// Pooling kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolingKind {
    /// Max pooling
    Max,
    /// Average pooling
    Average,
}

/// Input preprocessing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preprocessing {
    /// Input used as-is
    #[default]
    None,
    /// Multi-channel input flattened into one row per image
    Flatten,
}

impl Network {
    /// Create a network from layers
    ///
    /// # Errors
    ///
    /// Returns error if the network has no layers, or if a softmax
    /// classifier is followed by another layer.
    pub fn new(name: impl Into<String>, layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(ModelError::invalid_layer("network has no layers"));
        }
        if let Some(softmax) = layers[..layers.len() - 1]
            .iter()
            .find(|l| l.layer_type == LayerType::Softmax)
        {
            return Err(ModelError::invalid_layer(format!(
                "{}: softmax must be the last layer",
                softmax.name
            )));
        }
        Ok(Self {
            name: name.into(),
            layers,
        })
    }

    /// Network name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of layers
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Layers in execution order
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access to the layers
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Offset of layer `lnum`'s weights in the flat weight array
    #[must_use]
    pub fn weights_offset(&self, lnum: usize) -> usize {
        self.layers[..lnum].iter().map(Layer::num_weights).sum()
    }

    /// Total weight elements across all layers
    #[must_use]
    pub fn total_weights(&self) -> usize {
        self.layers.iter().map(Layer::num_weights).sum()
    }

    /// Largest per-image tensor any layer reads or writes, in elements
    #[must_use]
    pub fn max_tensor_elements(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| [l.inputs.elements(), l.outputs.elements()])
            .max()
            .unwrap_or(0)
    }
}

impl Layer {
    /// Create a layer with default flags
    pub fn new(name: impl Into<String>, layer_type: LayerType) -> Self {
        Self {
            name: name.into(),
            layer_type,
            inputs: Dims::default(),
            weights: Dims::default(),
            outputs: Dims::default(),
            activation: Activation::None,
            pool: None,
            input_preprocessing: Preprocessing::None,
            c_padding: 0,
            field_size: 0,
            stride: 1,
            needs_input_transfer: false,
            needs_output_transfer: false,
            result_in_temp: false,
        }
    }

    /// Number of weight elements this layer owns, padding included
    #[must_use]
    pub fn num_weights(&self) -> usize {
        match self.layer_type {
            LayerType::Convolution => self.outputs.height * self.weights.elements(),
            LayerType::InnerProduct => self.weights.elements(),
            LayerType::Input | LayerType::Pooling | LayerType::Softmax => 0,
        }
    }

    /// Input dims before the zero padding border is added
    #[must_use]
    pub fn unpadded_inputs(&self) -> Dims {
        let p = 2 * self.c_padding;
        Dims::aligned(
            self.inputs.rows.saturating_sub(p),
            self.inputs.cols.saturating_sub(p),
            self.inputs.height,
        )
    }
}

impl Activation {
    /// Whether the result must leave the accelerator for post-processing
    #[must_use]
    pub const fn needs_host_postprocessing(&self) -> bool {
        matches!(self, Self::Sigmoid)
    }
}

impl FromStr for Activation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "linear" | "identity" => Ok(Self::None),
            "relu" => Ok(Self::Relu),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            other => Err(ModelError::invalid_layer(format!(
                "unknown activation `{other}`"
            ))),
        }
    }
}

impl FromStr for PoolingKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "avg" | "average" => Ok(Self::Average),
            other => Err(ModelError::invalid_layer(format!(
                "unknown pooling kind `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "Input"),
            Self::Convolution => write!(f, "Convolution"),
            Self::InnerProduct => write!(f, "InnerProduct"),
            Self::Pooling => write!(f, "Pooling"),
            Self::Softmax => write!(f, "Softmax"),
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Relu => write!(f, "relu"),
            Self::Sigmoid => write!(f, "sigmoid"),
            Self::Tanh => write!(f, "tanh"),
        }
    }
}

impl std::fmt::Display for PoolingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Average => write!(f, "avg"),
        }
    }
}

/// Builds a network layer by layer, inferring each layer's dims from the
/// previous layer's output.
///
/// Errors are deferred to [`NetworkBuilder::build`] so that calls chain.
#[derive(Debug)]
pub struct NetworkBuilder {
    name: String,
    layers: Vec<Layer>,
    error: Option<ModelError>,
}

impl NetworkBuilder {
    /// Start a network whose input images are `rows × cols × channels`
    pub fn new(name: impl Into<String>, rows: usize, cols: usize, channels: usize) -> Self {
        let mut input = Layer::new("input", LayerType::Input);
        input.inputs = Dims::aligned(rows, cols, channels);
        input.outputs = input.inputs;
        let error = (rows == 0 || cols == 0 || channels == 0)
            .then(|| ModelError::invalid_layer("input dims must be non-zero"));
        Self {
            name: name.into(),
            layers: vec![input],
            error,
        }
    }

    fn current(&self) -> Dims {
        self.layers.last().map(|l| l.outputs).unwrap_or_default()
    }

    fn next_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.layers.len())
    }

    fn fail(mut self, reason: String) -> Self {
        if self.error.is_none() {
            self.error = Some(ModelError::invalid_layer(reason));
        }
        self
    }

    /// Append a convolution with `kernels` output channels and a
    /// `size × size` window
    #[must_use]
    pub fn conv(
        self,
        kernels: usize,
        size: usize,
        stride: usize,
        padding: usize,
        activation: Activation,
    ) -> Self {
        let prev = self.current();
        let inputs = Dims::aligned(prev.rows + 2 * padding, prev.cols + 2 * padding, prev.height);
        if kernels == 0 || size == 0 || stride == 0 {
            return self.fail("convolution needs non-zero kernels, size and stride".into());
        }
        if size > inputs.rows || size > inputs.cols {
            return self.fail(format!("{size}x{size} kernel larger than input {inputs}"));
        }
        let mut layer = Layer::new(self.next_name("conv"), LayerType::Convolution);
        layer.inputs = inputs;
        layer.weights = Dims::aligned(size, size, prev.height);
        layer.outputs = Dims::aligned(
            (inputs.rows - size) / stride + 1,
            (inputs.cols - size) / stride + 1,
            kernels,
        );
        layer.activation = activation;
        layer.c_padding = padding;
        layer.field_size = size;
        layer.stride = stride;
        self.push(layer)
    }

    /// Append a pooling layer with a `size × size` window
    #[must_use]
    pub fn pool(self, kind: PoolingKind, size: usize, stride: usize) -> Self {
        let inputs = self.current();
        if size == 0 || stride == 0 {
            return self.fail("pooling needs non-zero size and stride".into());
        }
        if size > inputs.rows || size > inputs.cols {
            return self.fail(format!("{size}x{size} pooling window larger than input {inputs}"));
        }
        let mut layer = Layer::new(self.next_name("pool"), LayerType::Pooling);
        layer.inputs = inputs;
        layer.outputs = Dims::aligned(
            (inputs.rows - size) / stride + 1,
            (inputs.cols - size) / stride + 1,
            inputs.height,
        );
        layer.pool = Some(kind);
        layer.field_size = size;
        layer.stride = stride;
        self.push(layer)
    }

    /// Append a fully connected layer with `outputs` neurons. Multi-channel
    /// or multi-row inputs are flattened.
    #[must_use]
    pub fn fc(self, outputs: usize, activation: Activation) -> Self {
        let prev = self.current();
        if outputs == 0 {
            return self.fail("fully connected layer needs at least one output".into());
        }
        let mut layer = Layer::new(self.next_name("fc"), LayerType::InnerProduct);
        if prev.rows > 1 || prev.height > 1 {
            layer.input_preprocessing = Preprocessing::Flatten;
            layer.inputs = Dims::aligned(1, prev.unpadded_elements(), 1);
        } else {
            layer.inputs = prev;
        }
        // The extra weight row holds the biases.
        layer.weights = Dims::aligned(layer.inputs.cols + 1, outputs, 1);
        layer.outputs = Dims::aligned(1, outputs, 1);
        layer.activation = activation;
        self.push(layer)
    }

    /// Append a softmax classifier over the previous layer's outputs
    #[must_use]
    pub fn softmax(self) -> Self {
        let prev = self.current();
        if prev.rows > 1 || prev.height > 1 {
            return self.fail(format!("softmax needs a flat input, got {prev}"));
        }
        let mut layer = Layer::new(self.next_name("softmax"), LayerType::Softmax);
        layer.inputs = prev;
        layer.outputs = prev;
        self.push(layer)
    }

    fn push(mut self, layer: Layer) -> Self {
        tracing::debug!(
            "{}: {} {} -> {}",
            layer.name,
            layer.layer_type,
            layer.inputs,
            layer.outputs
        );
        self.layers.push(layer);
        self
    }

    /// Finish the network
    ///
    /// # Errors
    ///
    /// Returns the first error encountered while adding layers.
    pub fn build(self) -> Result<Network> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Network::new(self.name, self.layers)
    }
}
