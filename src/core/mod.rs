// Detection and resolution pipeline:
// enumerate -> fingerprint in parallel -> group -> resolve -> act

pub mod actions;
pub mod duplicate;
pub mod frame;
pub mod hash;
pub mod media;
pub mod pool;
pub mod progress;
pub mod resolution;
pub mod scanner;

#[cfg(test)]
pub(crate) mod test_support;
