pub mod enhancer;
pub mod object_store;
