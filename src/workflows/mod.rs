pub mod fixes;
pub mod processor;
pub mod registry;
