//! Storage adapters: in-memory and Kubernetes custom-resource backed.

mod in_memory;
mod kubernetes;

pub use in_memory::InMemoryStorage;
pub use kubernetes::{KubernetesStorage, KubernetesStorageConfig};
