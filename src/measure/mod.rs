mod lag;

pub use lag::{LagMeasurer, LagStats};
