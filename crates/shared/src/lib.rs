pub mod domain;
pub mod error;
pub mod filter;
pub mod forms;
pub mod lifecycle;
pub mod protocol;
