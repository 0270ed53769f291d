mod builder;
pub mod layers;
pub mod loss;
mod model;
mod param_manager;
mod sequential;

pub use builder::{INPUT_SHAPE, ModelKind};
pub use model::Model;
pub use param_manager::{BackIter, FrontIter, FrontIterMut, ParamManager};
pub use sequential::Sequential;
