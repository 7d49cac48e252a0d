//! Infrastructure layer - External integrations

pub mod clients;
pub mod database;
pub mod memory;
pub mod settings;

pub use clients::{DeviceEndpoint, Gen1HttpClient, Gen2RpcClient, StaticClientFactory};
pub use database::{
    PostgresDeviceRepository, PostgresResolutionRepository, PostgresTagRepository,
    PostgresTemplateRepository, run_migrations,
};
pub use memory::{
    MemoryDeviceRepository, MemoryResolutionRepository, MemoryStore, MemoryTagRepository,
    MemoryTemplateRepository,
};
pub use settings::Settings;
