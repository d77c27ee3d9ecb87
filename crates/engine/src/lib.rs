//! Voxel chunk streaming engine: chunked world model, terrain generators,
//! a persisting LRU streaming cache, and greedy surface meshing with an
//! off-thread mesh cache.

pub mod generation;
pub mod meshing;
pub mod storage;
pub mod streaming;
pub mod world;
