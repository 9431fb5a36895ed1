pub mod mongo;
pub mod mysql;
pub mod redis;
