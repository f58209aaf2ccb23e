mod generational_pool;

pub use generational_pool::{GenerationalPool, Handle};
