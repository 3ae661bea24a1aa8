//! Scripted collaborators for unit tests.
