pub mod backend;
pub mod error;
pub mod memory_backend;
pub mod s3_backend;
pub mod signer;
pub mod storage_service;
