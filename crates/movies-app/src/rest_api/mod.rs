pub mod movie;
pub mod patch;
mod paging;

pub use paging::Paging;
