pub mod archive_service;
pub mod batch_service;
pub mod conversion_service;
pub mod janitor_service;
