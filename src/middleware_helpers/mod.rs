pub mod idempotency;
pub mod request_id;

pub use idempotency::{request_fingerprint, IdempotencyStore, IDEMPOTENCY_KEY_HEADER};
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
