//! Test modules for the queue system
