pub mod auto_refresh;
pub mod current;
pub mod error;
pub mod sky;
