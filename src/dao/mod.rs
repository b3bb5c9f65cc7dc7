/// Content and battle persistence backends.
pub mod battle_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
#[cfg(test)]
pub(crate) mod test_support;
