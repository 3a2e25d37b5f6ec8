pub use rustc_hash::FxHashMap;
