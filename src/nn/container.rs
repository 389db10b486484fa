//! Container modules for composing neural networks.

use super::hooks::ForwardHooks;
use super::module::Module;
use crate::autograd::Tensor;

/// Sequential container for chaining modules.
///
/// Modules are executed in order, each through [`Module::call`] so their own
/// hooks fire. Children added with [`Sequential::add`] are named by position
/// (`"0"`, `"1"`, ...); [`Sequential::add_named`] picks the name explicitly.
///
/// ```
/// use podar::nn::{Linear, Module, ReLU, Sequential};
///
/// let model = Sequential::new()
///     .add(Linear::with_seed(4, 8, Some(0)))
///     .add(ReLU::new())
///     .add(Linear::with_seed(8, 2, Some(1)));
///
/// let names: Vec<String> = model.named_parameters().into_iter().map(|(n, _)| n).collect();
/// assert_eq!(names, ["0.weight", "0.bias", "2.weight", "2.bias"]);
/// ```
#[derive(Default)]
pub struct Sequential {
    modules: Vec<(String, Box<dyn Module>)>,
    hooks: ForwardHooks,
}

impl Sequential {
    /// Create an empty Sequential container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module named by its position.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: Module + 'static>(self, module: M) -> Self {
        let name = self.modules.len().to_string();
        self.add_named(name, module)
    }

    /// Append a module under an explicit name.
    ///
    /// Names must not contain `.`.
    pub fn add_named<M: Module + 'static>(mut self, name: impl Into<String>, module: M) -> Self {
        let name = name.into();
        debug_assert!(!name.contains('.'), "module names must not contain '.'");
        self.modules.push((name, Box::new(module)));
        self
    }

    /// Get the number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the container is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.modules
            .iter()
            .fold(input.clone(), |x, (_, module)| module.call(&x))
    }

    fn hooks(&self) -> &ForwardHooks {
        &self.hooks
    }

    fn named_children(&self) -> Vec<(String, &dyn Module)> {
        self.modules
            .iter()
            .map(|(name, module)| {
                let module: &dyn Module = module.as_ref();
                (name.clone(), module)
            })
            .collect()
    }

    fn named_children_mut(&mut self) -> Vec<(String, &mut dyn Module)> {
        self.modules
            .iter_mut()
            .map(|(name, module)| {
                let module: &mut dyn Module = module.as_mut();
                (name.clone(), module)
            })
            .collect()
    }
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.modules.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Sequential").field("modules", &names).finish()
    }
}
