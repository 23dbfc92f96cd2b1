pub mod etl;
pub mod pipeline;
pub mod shortener;
pub mod table;
pub mod transformer;

pub use crate::domain::model::{InputRow, OutputRow, ShortenFailure, ShortenResult, Table};
pub use crate::domain::ports::{RowObserver, Shortener, Storage};
pub use crate::utils::error::Result;
