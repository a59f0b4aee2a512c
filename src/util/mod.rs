/*!
Small shared utilities: the matcher-context pool and byte-level UTF-8
decoding for the matching runtime.
*/

pub mod pool;
pub(crate) mod utf8;
