//! Identifier pools backing the member, connection and island arenas.

pub mod managed_id_pool;

pub use managed_id_pool::ManagedIdPool;
