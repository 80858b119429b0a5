pub mod mapping;
pub mod registry;
pub mod resolver;

pub use mapping::{MappingStatus, PortMapping, Protocol};
pub use registry::DomainRegistry;
pub use resolver::MappingResolver;
