//! Engine-level tests exercising the hierarchical bandit end to end
//! against the in-memory model store.
