pub mod grid;

pub use grid::{GridConfig, GridState, GridStrategy};
