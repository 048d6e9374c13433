mod concurrency;
mod execution;
mod fixtures;
mod loader;
