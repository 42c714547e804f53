//! IO modules - archive side effects

pub mod extract;
